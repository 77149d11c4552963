//! Background controller: owns the playback session and reacts to
//! messages, finished background jobs and handle events one at a time.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::audio::{
    AudioBackend, AudioResource, HandleEvent, PlaybackRequest, PlaybackSession, PlaybackState,
    StateChange, Ticket,
};
use crate::config::{Settings, SettingsStore};
use crate::error::{PlaybackError, ProviderError, ReaderError};
use crate::helper::{HelperHost, HelperLifecycle};
use crate::ipc::{ContextId, Control, Message, Router};
use crate::tts::{NativeSpeech, SpeechParams, SpeechProvider, Synthesis};

/// Work that ran off the controller loop, tagged with the session it was
/// started for.
enum Finished {
    /// A cloud fetch.
    Synthesis {
        ticket: Ticket,
        result: Result<Synthesis, ProviderError>,
    },
    /// A native render.
    Render {
        ticket: Ticket,
        result: Result<AudioResource, PlaybackError>,
    },
}

pub struct Controller {
    settings: Settings,
    store: SettingsStore,
    router: Arc<Router>,
    provider: SpeechProvider,
    native: Arc<dyn NativeSpeech>,
    lifecycle: HelperLifecycle,
    session: PlaybackSession,
    changes: mpsc::UnboundedReceiver<StateChange>,
    handle_events: mpsc::UnboundedReceiver<HandleEvent>,
    jobs_tx: mpsc::UnboundedSender<Finished>,
    jobs_rx: mpsc::UnboundedReceiver<Finished>,
}

impl Controller {
    pub fn new(
        settings: Settings,
        store: SettingsStore,
        router: Arc<Router>,
        host: Arc<dyn HelperHost>,
        backend: Arc<dyn AudioBackend>,
        native: Arc<dyn NativeSpeech>,
    ) -> Self {
        let (notify_tx, changes) = mpsc::unbounded_channel();
        let (events_tx, handle_events) = mpsc::unbounded_channel();
        let (jobs_tx, jobs_rx) = mpsc::unbounded_channel();
        let provider = SpeechProvider::new(settings.endpoint.as_deref());

        Self {
            settings,
            store,
            router,
            provider,
            native: Arc::clone(&native),
            lifecycle: HelperLifecycle::new(host),
            session: PlaybackSession::new(backend, native, notify_tx, events_tx),
            changes,
            handle_events,
            jobs_tx,
            jobs_rx,
        }
    }

    pub fn state(&self) -> &PlaybackState {
        self.session.state()
    }

    /// Process inputs until the inbox closes.
    pub async fn run(&mut self, inbox: &mut mpsc::UnboundedReceiver<Message>) {
        info!("Controller running");
        loop {
            tokio::select! {
                message = inbox.recv() => match message {
                    Some(message) => self.handle_message(message).await,
                    None => break,
                },
                Some(job) = self.jobs_rx.recv() => self.on_finished(job).await,
                Some(event) = self.handle_events.recv() => self.session.on_handle_event(event),
            }
            self.settle();
        }
        info!("Controller inbox closed");
    }

    /// Stop whatever is playing and release the helper.
    pub fn shutdown(&mut self) {
        self.session.stop();
        self.settle();
        self.lifecycle.teardown();
    }

    /// Handle one message and publish the resulting state changes.
    pub async fn dispatch(&mut self, message: Message) {
        self.handle_message(message).await;
        self.settle();
    }

    async fn handle_message(&mut self, message: Message) {
        debug!(action = message.action(), "Controller received message");
        match message {
            Message::SpeakText { text } => {
                let params = SpeechParams::from_settings(&self.settings);
                self.speak(text, params);
            }
            Message::SpeakWithProvider {
                text,
                api_key,
                voice,
                rate,
                pitch,
                provider,
            } => {
                let params = SpeechParams {
                    provider: provider.unwrap_or(self.settings.tts_provider),
                    api_key,
                    voice: voice.clone(),
                    remote_voice: voice,
                    rate: rate.unwrap_or(self.settings.rate),
                    pitch: pitch.unwrap_or(self.settings.pitch),
                };
                self.speak(text, params);
            }
            Message::AudioControl { control, time } => self.control(control, time).await,
            Message::SaveSettings { settings } => self.save_settings(settings),
            Message::GetVoices {} => self.list_voices(),
            Message::AudioStateChange(_)
            | Message::GetSelectedText {}
            | Message::SelectedText { .. }
            | Message::Voices { .. }
            | Message::Status { .. } => {
                debug!(action = message.action(), "Not a background message, ignoring");
            }
        }
    }

    /// Start a session. Fetching or rendering runs on its own task; the
    /// result comes back through `jobs_rx` and is dropped if the session
    /// was stopped or replaced in the meantime.
    fn speak(&mut self, text: String, params: SpeechParams) {
        if text.trim().is_empty() {
            return self.surface(ReaderError::Selection);
        }
        info!(provider = %params.provider, text_len = text.len(), "Speak");
        let tx = self.jobs_tx.clone();

        if params.provider.is_remote() {
            let ticket = self.session.begin_generating();
            let provider = self.provider.clone();
            tokio::spawn(async move {
                let result = provider.synthesize(&text, &params).await;
                let _ = tx.send(Finished::Synthesis { ticket, result });
            });
            return;
        }

        let utterance = params.utterance(&text);
        let ticket = self.session.begin_rendering();
        let native = Arc::clone(&self.native);
        tokio::spawn(async move {
            let result = native.render(&utterance).await;
            let _ = tx.send(Finished::Render { ticket, result });
        });
    }

    async fn on_finished(&mut self, job: Finished) {
        match job {
            Finished::Synthesis { ticket, result } => self.on_synthesized(ticket, result).await,
            Finished::Render { ticket, result } => self.on_rendered(ticket, result).await,
        }
    }

    async fn on_synthesized(&mut self, ticket: Ticket, result: Result<Synthesis, ProviderError>) {
        if !self.session.is_current(ticket) {
            debug!(ticket = ticket.generation(), "Synthesis result is stale, dropping");
            return;
        }
        let synthesis = match result {
            Ok(synthesis) => synthesis,
            Err(e) => return self.fail_session(ticket, e.into()),
        };
        if let Some(audio) = synthesis.generated() {
            if let Err(e) = self.store.save_last_audio(audio) {
                warn!("Could not persist generated audio: {}", e);
            }
        }
        if let Err(e) = self.lifecycle.ensure().await {
            return self.fail_session(ticket, e.into());
        }
        self.session
            .complete_generation(ticket, Ok(synthesis.into_request()))
            .await;
    }

    async fn on_rendered(&mut self, ticket: Ticket, result: Result<AudioResource, PlaybackError>) {
        if !self.session.is_current(ticket) {
            debug!(ticket = ticket.generation(), "Rendered speech is stale, dropping");
            return;
        }
        let resource = match result {
            Ok(resource) => resource,
            Err(e) => return self.fail_session(ticket, e.into()),
        };
        if let Err(e) = self.lifecycle.ensure().await {
            return self.fail_session(ticket, e.into());
        }
        self.session.complete_render(ticket, resource).await;
    }

    async fn control(&mut self, control: Control, time: Option<f64>) {
        match control {
            Control::Pause => self.session.pause(),
            Control::Resume => self.session.resume(),
            Control::Stop => self.session.stop(),
            Control::Seek => match time {
                Some(position) => {
                    self.session.seek(position);
                }
                None => warn!("Seek without a time, ignoring"),
            },
            Control::Play => match self.session.state() {
                PlaybackState::Paused => self.session.resume(),
                PlaybackState::Playing | PlaybackState::Generating => {
                    debug!("Play while active, ignoring");
                }
                PlaybackState::Idle | PlaybackState::Ended | PlaybackState::Error(_) => {
                    self.replay_last().await;
                }
            },
        }
    }

    /// Play the most recent generated audio again without a network call.
    async fn replay_last(&mut self) {
        let Some(stored) = self.store.load_last_audio() else {
            self.status("Nothing to replay yet.");
            return;
        };
        info!(mime = %stored.audio.mime_type, saved_at = %stored.saved_at, "Replaying last audio");
        if let Err(e) = self.lifecycle.ensure().await {
            return self.surface(e.into());
        }
        let request: PlaybackRequest = stored.audio.to_request();
        self.session.start(request).await;
    }

    /// Answer `getVoices` from its own task; listing spawns the engine.
    fn list_voices(&self) {
        let native = Arc::clone(&self.native);
        let router = Arc::clone(&self.router);
        tokio::spawn(async move {
            let reply = match native.voices().await {
                Ok(voices) => Message::Voices { voices },
                Err(e) => {
                    warn!("Could not list native voices: {}", e);
                    Message::status(format!("Could not list voices: {}", e))
                }
            };
            router.route(ContextId::Background, reply);
        });
    }

    fn save_settings(&mut self, settings: Settings) {
        if settings.endpoint != self.settings.endpoint {
            self.provider = SpeechProvider::new(settings.endpoint.as_deref());
        }
        self.lifecycle
            .configure(settings.output_device.clone(), settings.volume);
        if let Err(e) = self.store.save(&settings) {
            error!("Failed to save settings: {}", e);
            self.status(format!("Could not save settings: {}", e));
        }
        self.settings = settings;
        info!(provider = %self.settings.tts_provider, "Settings updated");
    }

    /// Fail the pending session started by `ticket`.
    fn fail_session(&mut self, ticket: Ticket, err: ReaderError) {
        warn!(ticket = ticket.generation(), "Speak failed: {}", err);
        self.session.fail_generation(ticket, err.to_string());
    }

    /// Benign errors become a status line; the rest put the session in
    /// `Error`.
    fn surface(&mut self, err: ReaderError) {
        if err.is_benign() {
            self.status(err.to_string());
        } else {
            self.session.report_error(err.to_string());
        }
    }

    fn status(&self, message: impl Into<String>) {
        self.router
            .route(ContextId::Background, Message::status(message));
    }

    /// Publish queued state changes, then release the helper if nothing
    /// is playing any more.
    fn settle(&mut self) {
        while let Ok(change) = self.changes.try_recv() {
            debug!(state = change.name(), "Broadcasting state change");
            self.router
                .route(ContextId::Background, Message::AudioStateChange(change));
        }
        if !self.session.is_active() {
            self.lifecycle.teardown();
        }
    }
}
