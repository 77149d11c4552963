//! tts-reader: entry point. Wires the stdio bridge, the router and the
//! background controller, then runs until stdin closes.

use std::sync::Arc;

use tracing::{info, warn};

use tts_reader::config::{paths, SettingsStore};
use tts_reader::controller::Controller;
use tts_reader::helper::AudioThreadHost;
use tts_reader::ipc::bridge::{spawn_stdin_reader, spawn_stdout_writers};
use tts_reader::ipc::{ContextId, Message, Router};
use tts_reader::tts::SystemVoice;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tts_reader::logger::init(&paths::get_log_dir())?;

    let store = SettingsStore::open_default();
    let settings = store.load();
    info!(
        dir = %store.dir().display(),
        provider = %settings.tts_provider,
        "Settings loaded"
    );

    let router = Arc::new(Router::new());
    let mut inbox = router.register(ContextId::Background);
    spawn_stdout_writers(&router);
    let stdin_closed = spawn_stdin_reader(Arc::clone(&router));

    let host = AudioThreadHost::new(settings.output_device.clone(), settings.volume);
    let native = match settings.native_command.as_deref() {
        Some(program) if !program.trim().is_empty() => SystemVoice::new(program.trim()),
        _ => SystemVoice::default(),
    };

    let mut controller = Controller::new(
        settings,
        store,
        Arc::clone(&router),
        Arc::new(host.clone()),
        Arc::new(host),
        Arc::new(native),
    );

    router.route(ContextId::Background, Message::status("Ready"));
    info!("Reader ready");

    tokio::select! {
        _ = controller.run(&mut inbox) => {}
        result = stdin_closed => {
            if result.is_err() {
                warn!("stdin reader exited without signalling");
            }
            info!("stdin closed, shutting down");
        }
    }

    controller.shutdown();
    router.unregister(ContextId::Background);
    info!("Reader stopped");
    Ok(())
}
