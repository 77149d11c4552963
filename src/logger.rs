use std::fs;
use std::path::Path;

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize structured logging.
///
/// - File output: `{log_dir}/tts-reader.*.log`, daily rotation, 5 files kept.
/// - Console output on stderr. Stdout carries the message protocol.
/// - Filter from `RUST_LOG`, defaulting to `info`.
///
/// Fails if the log directory cannot be used or a subscriber is already set.
pub fn init(log_dir: &Path) -> anyhow::Result<()> {
    fs::create_dir_all(log_dir)?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("tts-reader")
        .filename_suffix("log")
        .max_log_files(5)
        .build(log_dir)?;

    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true);

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(true)
        .compact();

    // reqwest, hyper and symphonia are chatty at debug level.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("info,reqwest=warn,hyper=warn,mio=warn,symphonia=warn")
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()?;

    tracing::info!(log_dir = %log_dir.display(), "Logger initialized");
    Ok(())
}
