//! The audio helper: a dedicated thread that owns the rodio output stream.
//!
//! `OutputStream` is not `Send`, so it lives on its own thread and is
//! driven by [`HelperCommand`]s. The thread exists only while audio is
//! playing; the lifecycle manager creates it on demand and closes it when
//! the session goes idle.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait};
use rodio::buffer::SamplesBuffer;
use rodio::source::EmptyCallback;
use rodio::{OutputStream, OutputStreamHandle, Sink, Source};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use super::HelperHost;
use crate::audio::decode::decode_to_mono;
use crate::audio::{AudioBackend, AudioHandle, AudioResource, HandleEventSink};
use crate::error::{CreationError, PlaybackError};

/// How often a playing sink reports its position.
const TICK_PERIOD: Duration = Duration::from_millis(250);

/// Commands understood by the helper thread. `id` is the session
/// generation that opened the audio; commands for any other id are stale
/// and ignored.
pub enum HelperCommand {
    Play {
        id: u64,
        resource: AudioResource,
        events: HandleEventSink,
        reply: oneshot::Sender<Result<f64, String>>,
    },
    Pause { id: u64 },
    Resume { id: u64 },
    Stop { id: u64 },
    Seek { id: u64, position: f64 },
    /// Sent by the playing source every [`TICK_PERIOD`].
    Tick { id: u64 },
    /// Sent when the source runs dry.
    Finished { id: u64 },
    Shutdown,
}

#[derive(Debug, Clone, PartialEq)]
struct OutputConfig {
    device: Option<String>,
    volume: f32,
}

/// Hosts the audio helper thread and doubles as the playback backend that
/// talks to it.
#[derive(Clone)]
pub struct AudioThreadHost {
    link: Arc<Mutex<Option<mpsc::UnboundedSender<HelperCommand>>>>,
    config: Arc<Mutex<OutputConfig>>,
}

impl AudioThreadHost {
    pub fn new(output_device: Option<String>, volume: f32) -> Self {
        Self {
            link: Arc::new(Mutex::new(None)),
            config: Arc::new(Mutex::new(OutputConfig {
                device: output_device,
                volume,
            })),
        }
    }

    fn sender(&self) -> Option<mpsc::UnboundedSender<HelperCommand>> {
        lock(&self.link).as_ref().filter(|tx| !tx.is_closed()).cloned()
    }
}

impl HelperHost for AudioThreadHost {
    fn is_running(&self) -> bool {
        self.sender().is_some()
    }

    fn create(&self) -> Pin<Box<dyn Future<Output = Result<(), CreationError>> + Send>> {
        let link = Arc::clone(&self.link);
        let config = lock(&self.config).clone();
        Box::pin(async move {
            let (tx, rx) = mpsc::unbounded_channel();
            let (ready_tx, ready_rx) = oneshot::channel();
            let loopback = tx.clone();

            std::thread::Builder::new()
                .name("audio-helper".into())
                .spawn(move || run_helper(config, rx, loopback, ready_tx))
                .map_err(|e| CreationError(format!("failed to spawn audio thread: {}", e)))?;

            match ready_rx.await {
                Ok(Ok(())) => {
                    *lock(&link) = Some(tx);
                    Ok(())
                }
                Ok(Err(e)) => Err(CreationError(e)),
                Err(_) => Err(CreationError("audio thread exited during startup".into())),
            }
        })
    }

    fn close(&self) {
        if let Some(tx) = lock(&self.link).take() {
            let _ = tx.send(HelperCommand::Shutdown);
        }
    }

    fn configure(&self, output_device: Option<String>, volume: f32) {
        *lock(&self.config) = OutputConfig {
            device: output_device,
            volume,
        };
    }
}

impl AudioBackend for AudioThreadHost {
    fn open(
        &self,
        resource: AudioResource,
        events: HandleEventSink,
    ) -> Pin<Box<dyn Future<Output = Result<Box<dyn AudioHandle>, PlaybackError>> + Send + '_>> {
        Box::pin(async move {
            let tx = self
                .sender()
                .ok_or_else(|| PlaybackError("Audio helper is not running".into()))?;
            let id = events.generation();
            let (reply_tx, reply_rx) = oneshot::channel();

            tx.send(HelperCommand::Play {
                id,
                resource,
                events,
                reply: reply_tx,
            })
            .map_err(|_| PlaybackError("Audio helper has exited".into()))?;

            let duration = reply_rx
                .await
                .map_err(|_| PlaybackError("Audio helper exited before playback started".into()))?
                .map_err(PlaybackError)?;

            Ok(Box::new(HelperHandle {
                id,
                tx,
                duration,
                stopped: false,
            }) as Box<dyn AudioHandle>)
        })
    }
}

/// Session-side view of audio playing on the helper thread.
struct HelperHandle {
    id: u64,
    tx: mpsc::UnboundedSender<HelperCommand>,
    duration: f64,
    stopped: bool,
}

impl HelperHandle {
    fn send(&self, command: HelperCommand) {
        // A closed channel means the helper is gone and the audio with it.
        let _ = self.tx.send(command);
    }
}

impl AudioHandle for HelperHandle {
    fn pause(&mut self) {
        self.send(HelperCommand::Pause { id: self.id });
    }

    fn resume(&mut self) {
        self.send(HelperCommand::Resume { id: self.id });
    }

    fn stop(&mut self) {
        if !self.stopped {
            self.stopped = true;
            self.send(HelperCommand::Stop { id: self.id });
        }
    }

    fn seek(&mut self, position: f64) {
        self.send(HelperCommand::Seek {
            id: self.id,
            position,
        });
    }

    fn duration(&self) -> Option<f64> {
        Some(self.duration)
    }
}

impl Drop for HelperHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

// ── Helper thread ───────────────────────────────────────────────────

/// Reported when a player is dropped without being stopped or finishing,
/// e.g. the helper thread exited or panicked mid-play.
const HELPER_GONE: &str = "Audio helper stopped unexpectedly";

/// The sink behind the current handle. Dropping a player that is neither
/// stopped nor finished reports a failure to its session.
struct Player {
    id: u64,
    sink: Sink,
    events: HandleEventSink,
    settled: bool,
}

impl Player {
    fn new(id: u64, sink: Sink, events: HandleEventSink) -> Self {
        Self {
            id,
            sink,
            events,
            settled: false,
        }
    }

    /// Stopped on request; the session already knows.
    fn stop(mut self) {
        self.sink.stop();
        self.settled = true;
    }

    fn finish(mut self) {
        self.settled = true;
        self.events.ended();
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        if !self.settled {
            self.sink.stop();
            self.events.failed(HELPER_GONE);
        }
    }
}

fn run_helper(
    config: OutputConfig,
    mut rx: mpsc::UnboundedReceiver<HelperCommand>,
    loopback: mpsc::UnboundedSender<HelperCommand>,
    ready: oneshot::Sender<Result<(), String>>,
) {
    let (_stream, stream_handle) = match open_output_stream(config.device.as_deref()) {
        Ok(pair) => pair,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };
    if ready.send(Ok(())).is_err() {
        return;
    }
    info!("Audio helper ready");

    let mut current: Option<Player> = None;

    while let Some(command) = rx.blocking_recv() {
        match command {
            HelperCommand::Play {
                id,
                resource,
                events,
                reply,
            } => {
                if let Some(old) = current.take() {
                    old.stop();
                }
                match start_sink(&stream_handle, &loopback, id, &resource, config.volume) {
                    Ok((sink, duration)) => {
                        debug!(id, duration, mime = %resource.mime, "Helper playing");
                        current = Some(Player::new(id, sink, events));
                        let _ = reply.send(Ok(duration));
                    }
                    Err(e) => {
                        let _ = reply.send(Err(e));
                    }
                }
            }
            HelperCommand::Shutdown => break,
            command => apply(&mut current, command),
        }
    }

    if current.is_some() {
        warn!("Audio helper exiting while audio is still playing");
    }
    drop(current);
    info!("Audio helper exiting");
}

/// Apply a transport command to the current player. Commands for any other
/// id belong to a handle that was already replaced and are ignored.
fn apply(current: &mut Option<Player>, command: HelperCommand) {
    match command {
        HelperCommand::Pause { id } => {
            if let Some(player) = player_for(current, id) {
                player.sink.pause();
            }
        }
        HelperCommand::Resume { id } => {
            if let Some(player) = player_for(current, id) {
                player.sink.play();
            }
        }
        HelperCommand::Stop { id } => {
            if player_for(current, id).is_some() {
                if let Some(player) = current.take() {
                    player.stop();
                }
            }
        }
        HelperCommand::Seek { id, position } => {
            if let Some(player) = player_for(current, id) {
                if let Err(e) = player.sink.try_seek(Duration::from_secs_f64(position)) {
                    warn!("Seek to {:.2}s failed: {}", position, e);
                }
            }
        }
        HelperCommand::Tick { id } => {
            if let Some(player) = player_for(current, id) {
                if !player.sink.is_paused() {
                    player.events.progress(player.sink.get_pos().as_secs_f64());
                }
            }
        }
        HelperCommand::Finished { id } => {
            if player_for(current, id).is_some() {
                if let Some(player) = current.take() {
                    player.finish();
                }
            }
        }
        HelperCommand::Play { .. } | HelperCommand::Shutdown => {
            debug!("Not a transport command");
        }
    }
}

fn player_for(current: &Option<Player>, id: u64) -> Option<&Player> {
    current.as_ref().filter(|player| player.id == id)
}

/// Decode the resource and queue it on a fresh sink, followed by a
/// callback that reports the natural end.
fn start_sink(
    stream_handle: &OutputStreamHandle,
    loopback: &mpsc::UnboundedSender<HelperCommand>,
    id: u64,
    resource: &AudioResource,
    volume: f32,
) -> Result<(Sink, f64), String> {
    let decoded = decode_to_mono(&resource.bytes, &resource.mime).map_err(|e| e.to_string())?;
    let duration = decoded.duration_secs();

    let sink =
        Sink::try_new(stream_handle).map_err(|e| format!("Failed to create audio sink: {}", e))?;
    sink.set_volume(volume.clamp(0.0, 2.0));

    let tick_tx = loopback.clone();
    let source = SamplesBuffer::new(1, decoded.sample_rate, decoded.samples)
        .periodic_access(TICK_PERIOD, move |_| {
            let _ = tick_tx.send(HelperCommand::Tick { id });
        });
    sink.append(source);

    let done_tx = loopback.clone();
    sink.append(EmptyCallback::<f32>::new(Box::new(move || {
        let _ = done_tx.send(HelperCommand::Finished { id });
    })));

    Ok((sink, duration))
}

/// Open the named output device, falling back to the system default when
/// it is not found.
fn open_output_stream(
    output_device_name: Option<&str>,
) -> Result<(OutputStream, OutputStreamHandle), String> {
    if let Some(name) = output_device_name {
        let host = cpal::default_host();
        let device = host
            .output_devices()
            .map_err(|e| format!("Failed to enumerate output devices: {}", e))?
            .find(|d| d.name().map(|n| n == name).unwrap_or(false));

        match device {
            Some(dev) => {
                info!(device = %name, "Using configured output device");
                OutputStream::try_from_device(&dev)
                    .map_err(|e| format!("Failed to open output device '{}': {}", name, e))
            }
            None => {
                warn!(
                    device = %name,
                    "Configured output device not found, falling back to default"
                );
                OutputStream::try_default()
                    .map_err(|e| format!("No audio output device available: {}", e))
            }
        }
    } else {
        OutputStream::try_default().map_err(|e| format!("No audio output device available: {}", e))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
