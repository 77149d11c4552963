//! Stdio bridge: the UI and page contexts live in the host process and
//! talk to the reader as JSON lines.
//!
//! Inbound (stdin):  `{"from": "panel", "action": "speakText", ...}`
//! Outbound (stdout): `{"to": "popup", "action": "audioStateChange", ...}`
//!
//! `from` defaults to the side panel when absent.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, warn};

use super::{ContextId, Message, Router};

/// Split an inbound line into its origin and message.
pub fn parse_inbound(line: &str) -> Result<(ContextId, Message), serde_json::Error> {
    let mut obj: Map<String, Value> = serde_json::from_str(line)?;
    let origin = match obj.remove("from") {
        Some(from) => serde_json::from_value(from)?,
        None => ContextId::Panel,
    };
    let message = serde_json::from_value(Value::Object(obj))?;
    Ok((origin, message))
}

/// Serialize a message addressed to `to`.
pub fn encode_outbound(to: ContextId, message: &Message) -> Result<String, serde_json::Error> {
    let mut value = serde_json::to_value(message)?;
    if let Value::Object(obj) = &mut value {
        obj.insert("to".to_string(), serde_json::to_value(to)?);
    }
    serde_json::to_string(&value)
}

/// Emit a message as a JSON line on stdout and flush.
pub fn emit(to: ContextId, message: &Message) {
    let json = match encode_outbound(to, message) {
        Ok(j) => j,
        Err(e) => {
            error!("Failed to serialize {}: {}", message.action(), e);
            return;
        }
    };
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    // Ignore write/flush errors, the pipe may be closed.
    let _ = writeln!(handle, "{}", json);
    let _ = handle.flush();
}

/// Register every remote context with the router and forward what it
/// receives to stdout.
pub fn spawn_stdout_writers(router: &Router) {
    for id in ContextId::REMOTE {
        let rx = router.register(id);
        tokio::spawn(forward_to_stdout(id, rx));
    }
}

async fn forward_to_stdout(id: ContextId, mut rx: mpsc::UnboundedReceiver<Message>) {
    while let Some(message) = rx.recv().await {
        emit(id, &message);
    }
    debug!(context = ?id, "stdout writer exiting");
}

/// Spawn a blocking thread that reads JSON lines from stdin and routes
/// them. The returned receiver resolves when stdin closes.
pub fn spawn_stdin_reader(router: Arc<Router>) -> oneshot::Receiver<()> {
    let (done_tx, done_rx) = oneshot::channel();

    std::thread::spawn(move || {
        let stdin = io::stdin();
        let reader = stdin.lock();
        for line in reader.lines() {
            match line {
                Ok(text) => {
                    let trimmed = text.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    match parse_inbound(trimmed) {
                        Ok((origin, message)) => {
                            debug!(from = ?origin, action = message.action(), "Received message");
                            if router.route(origin, message) == 0 {
                                warn!("Message from {:?} had no receiver", origin);
                            }
                        }
                        Err(e) => {
                            error!("Invalid message: {} (input: {})", e, trimmed);
                            emit(ContextId::Panel, &Message::status(format!("Invalid message: {}", e)));
                        }
                    }
                }
                Err(e) => {
                    error!("stdin read error: {}", e);
                    break;
                }
            }
        }
        debug!("stdin reader thread exiting");
        let _ = done_tx.send(());
    });

    done_rx
}
