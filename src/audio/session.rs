//! Playback session state machine.
//!
//! One session owns at most one audio handle and the resource backing it.
//! Both are released together on stop, natural end, failure or supersede.
//! Every operation runs on the controller task, so transitions are strictly
//! ordered and nothing here needs a lock.
//!
//! Staleness is tracked with a generation counter. Each new session (and
//! each stop) bumps it; a network result or handle event carrying an older
//! generation is dropped instead of resurrecting playback.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::state::{PlaybackState, StateChange};
use super::wav::{self, DEFAULT_SAMPLE_RATE};
use super::{
    AudioBackend, AudioHandle, AudioResource, AudioSource, HandleEvent, HandleEventKind,
    HandleEventSink, PlaybackRequest,
};
use crate::error::{PlaybackError, ProviderError};
use crate::tts::NativeSpeech;

/// Proof that a `Generating` phase was started for a particular session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

impl Ticket {
    pub fn generation(&self) -> u64 {
        self.0
    }
}

pub struct PlaybackSession {
    backend: Arc<dyn AudioBackend>,
    native: Arc<dyn NativeSpeech>,
    notify: mpsc::UnboundedSender<StateChange>,
    handle_events: mpsc::UnboundedSender<HandleEvent>,
    state: PlaybackState,
    handle: Option<Box<dyn AudioHandle>>,
    resource: Option<AudioResource>,
    generation: u64,
}

impl PlaybackSession {
    /// `notify` receives every state change; `handle_events` is the channel
    /// backends report progress/end/failure on and must be drained into
    /// [`PlaybackSession::on_handle_event`].
    pub fn new(
        backend: Arc<dyn AudioBackend>,
        native: Arc<dyn NativeSpeech>,
        notify: mpsc::UnboundedSender<StateChange>,
        handle_events: mpsc::UnboundedSender<HandleEvent>,
    ) -> Self {
        Self {
            backend,
            native,
            notify,
            handle_events,
            state: PlaybackState::Idle,
            handle: None,
            resource: None,
            generation: 0,
        }
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    pub fn has_handle(&self) -> bool {
        self.handle.is_some()
    }

    pub fn has_resource(&self) -> bool {
        self.resource.is_some()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether `ticket` still belongs to the session waiting on the network.
    pub fn is_current(&self, ticket: Ticket) -> bool {
        ticket.0 == self.generation && self.state == PlaybackState::Generating
    }

    // ── Starting ────────────────────────────────────────────────────

    /// Enter `Generating` for a request that needs a network fetch.
    /// Any active session is superseded first.
    pub fn begin_generating(&mut self) -> Ticket {
        self.supersede();
        self.generation += 1;
        self.state = PlaybackState::Generating;
        self.emit(StateChange::Generating);
        Ticket(self.generation)
    }

    /// Enter the rendering phase of a native request. Same staleness rules
    /// as `begin_generating`, but the UI sees nothing until playback starts.
    pub fn begin_rendering(&mut self) -> Ticket {
        self.supersede();
        self.generation += 1;
        self.state = PlaybackState::Generating;
        Ticket(self.generation)
    }

    /// Open the audio rendered for `ticket`. Returns `false` and drops the
    /// resource when the ticket went stale while rendering.
    pub async fn complete_render(&mut self, ticket: Ticket, resource: AudioResource) -> bool {
        if !self.is_current(ticket) {
            debug!(
                ticket = ticket.0,
                current = self.generation,
                "Discarding stale rendered speech"
            );
            return false;
        }
        self.open(resource).await;
        true
    }

    /// Deliver the outcome of the fetch started by `ticket`.
    ///
    /// Returns `false` when the ticket is stale (the session was stopped or
    /// superseded meanwhile); the result is then discarded untouched.
    pub async fn complete_generation(
        &mut self,
        ticket: Ticket,
        result: Result<PlaybackRequest, ProviderError>,
    ) -> bool {
        if !self.is_current(ticket) {
            debug!(
                ticket = ticket.0,
                current = self.generation,
                "Discarding stale synthesis result"
            );
            return false;
        }
        match result {
            Ok(request) => self.load(request).await,
            Err(e) => self.fail(e.to_string()),
        }
        true
    }

    /// Fail the generating session identified by `ticket` (e.g. the helper
    /// could not be created). Stale tickets are ignored.
    pub fn fail_generation(&mut self, ticket: Ticket, message: impl Into<String>) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        self.fail(message.into());
        true
    }

    /// Start playing an already-materialized request, superseding any
    /// active session.
    pub async fn start(&mut self, request: PlaybackRequest) {
        self.supersede();
        self.generation += 1;
        self.load(request).await;
    }

    /// Put the session into `Error` without a request, superseding whatever
    /// was active.
    pub fn report_error(&mut self, message: impl Into<String>) {
        self.supersede();
        self.generation += 1;
        self.fail(message.into());
    }

    async fn load(&mut self, request: PlaybackRequest) {
        match materialize(self.native.as_ref(), request.source).await {
            Ok(resource) => self.open(resource).await,
            Err(e) => self.fail(e.to_string()),
        }
    }

    async fn open(&mut self, resource: AudioResource) {
        let sink = HandleEventSink::new(self.generation, self.handle_events.clone());
        match self.backend.open(resource.clone(), sink).await {
            Ok(handle) => {
                let duration = handle.duration();
                info!(
                    generation = self.generation,
                    mime = %resource.mime,
                    bytes = resource.bytes.len(),
                    ?duration,
                    "Playback started"
                );
                self.handle = Some(handle);
                self.resource = Some(resource);
                self.state = PlaybackState::Playing;
                self.emit(StateChange::Playing { duration });
            }
            Err(e) => self.fail(e.to_string()),
        }
    }

    // ── Transport controls ──────────────────────────────────────────

    pub fn pause(&mut self) {
        if self.state != PlaybackState::Playing {
            debug!(state = %self.state, "pause ignored");
            return;
        }
        if let Some(handle) = self.handle.as_mut() {
            handle.pause();
        }
        self.state = PlaybackState::Paused;
        self.emit(StateChange::Paused);
    }

    pub fn resume(&mut self) {
        if self.state != PlaybackState::Paused {
            debug!(state = %self.state, "resume ignored");
            return;
        }
        let duration = self.handle.as_mut().and_then(|handle| {
            handle.resume();
            handle.duration()
        });
        self.state = PlaybackState::Playing;
        self.emit(StateChange::Playing { duration });
    }

    /// Stop immediately. In-flight fetches become stale. A no-op when
    /// nothing is active, so repeated stops emit a single `ended`.
    pub fn stop(&mut self) {
        if !self.state.is_active() {
            debug!(state = %self.state, "stop ignored");
            return;
        }
        info!(generation = self.generation, "Playback stopped");
        self.release();
        self.generation += 1;
        self.state = PlaybackState::Idle;
        self.emit(StateChange::Ended);
    }

    /// Seek to `position` seconds, clamped into `[0, duration]`.
    /// Returns the position actually applied.
    pub fn seek(&mut self, position: f64) -> Option<f64> {
        if !self.state.holds_handle() {
            debug!(state = %self.state, "seek ignored");
            return None;
        }
        let handle = self.handle.as_mut()?;
        let duration = handle.duration();
        let target = clamp_position(position, duration);
        handle.seek(target);
        if self.state == PlaybackState::Playing {
            self.emit(StateChange::TimeUpdate {
                current_time: target,
                duration,
            });
        }
        Some(target)
    }

    // ── Handle events ───────────────────────────────────────────────

    pub fn on_handle_event(&mut self, event: HandleEvent) {
        if event.generation != self.generation || self.handle.is_none() {
            debug!(
                event_generation = event.generation,
                current = self.generation,
                "Dropping stale handle event"
            );
            return;
        }
        match event.kind {
            HandleEventKind::Progress { position } => {
                if self.state == PlaybackState::Playing {
                    let duration = self.handle.as_ref().and_then(|h| h.duration());
                    self.emit(StateChange::TimeUpdate {
                        current_time: position,
                        duration,
                    });
                }
            }
            HandleEventKind::Ended => {
                info!(generation = self.generation, "Playback finished");
                self.release();
                self.state = PlaybackState::Ended;
                self.emit(StateChange::Ended);
                self.state = PlaybackState::Idle;
            }
            HandleEventKind::Failed(message) => self.fail(message),
        }
    }

    // ── Internals ───────────────────────────────────────────────────

    /// Silently end the active session before a new one starts: resources
    /// are released but no event is emitted on the old session's behalf.
    fn supersede(&mut self) {
        if self.state.is_active() {
            info!(
                generation = self.generation,
                state = %self.state,
                "Superseding active session"
            );
            self.release();
        }
    }

    fn fail(&mut self, message: String) {
        warn!(generation = self.generation, error = %message, "Playback failed");
        self.release();
        self.state = PlaybackState::Error(message.clone());
        self.emit(StateChange::Error { error: message });
    }

    fn release(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            handle.stop();
        }
        self.resource = None;
    }

    fn emit(&self, change: StateChange) {
        debug!(state = change.name(), "State change");
        let _ = self.notify.send(change);
    }
}

/// Turn a request into container bytes the backend can play.
async fn materialize(
    native: &dyn NativeSpeech,
    source: AudioSource,
) -> Result<AudioResource, PlaybackError> {
    match source {
        AudioSource::NativeVoice(utterance) => native.render(&utterance).await,
        AudioSource::EncodedAudio { payload, mime } => {
            let bytes = wav::decode_base64(&payload)
                .map_err(|e| PlaybackError(format!("Invalid audio payload: {}", e)))?;
            Ok(AudioResource::new(bytes, mime))
        }
        AudioSource::RawPcm {
            payload,
            sample_rate,
        } => {
            let bytes = wav::decode_base64(&payload)
                .map_err(|e| PlaybackError(format!("Invalid audio payload: {}", e)))?;
            let samples = wav::pcm_bytes_to_samples(&bytes);
            let rate = sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE);
            Ok(AudioResource::new(wav::encode_wav(&samples, rate), "audio/wav"))
        }
    }
}

fn clamp_position(position: f64, duration: Option<f64>) -> f64 {
    let position = if position.is_finite() { position } else { 0.0 };
    match duration {
        Some(d) if d.is_finite() => position.clamp(0.0, d.max(0.0)),
        _ => position.max(0.0),
    }
}

#[cfg(test)]
mod tests {
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Mutex;

    use super::*;

    type Log = Arc<Mutex<Vec<String>>>;

    struct MockHandle {
        log: Log,
        duration: Option<f64>,
    }

    impl AudioHandle for MockHandle {
        fn pause(&mut self) {
            self.log.lock().unwrap().push("pause".into());
        }
        fn resume(&mut self) {
            self.log.lock().unwrap().push("resume".into());
        }
        fn stop(&mut self) {
            self.log.lock().unwrap().push("stop".into());
        }
        fn seek(&mut self, position: f64) {
            self.log.lock().unwrap().push(format!("seek {}", position));
        }
        fn duration(&self) -> Option<f64> {
            self.duration
        }
    }

    struct MockBackend {
        log: Log,
        duration: Option<f64>,
        fail: bool,
        opened: Mutex<Vec<AudioResource>>,
    }

    impl MockBackend {
        fn new(duration: Option<f64>) -> Arc<Self> {
            Arc::new(Self {
                log: Arc::new(Mutex::new(Vec::new())),
                duration,
                fail: false,
                opened: Mutex::new(Vec::new()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                log: Arc::new(Mutex::new(Vec::new())),
                duration: None,
                fail: true,
                opened: Mutex::new(Vec::new()),
            })
        }

        fn log(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }
    }

    impl AudioBackend for MockBackend {
        fn open(
            &self,
            resource: AudioResource,
            _events: HandleEventSink,
        ) -> Pin<Box<dyn Future<Output = Result<Box<dyn AudioHandle>, PlaybackError>> + Send + '_>>
        {
            Box::pin(async move {
                if self.fail {
                    return Err(PlaybackError("device unplugged".into()));
                }
                self.opened.lock().unwrap().push(resource);
                Ok(Box::new(MockHandle {
                    log: Arc::clone(&self.log),
                    duration: self.duration,
                }) as Box<dyn AudioHandle>)
            })
        }
    }

    struct MockNative;

    impl NativeSpeech for MockNative {
        fn render<'a>(
            &'a self,
            utterance: &'a crate::audio::Utterance,
        ) -> Pin<Box<dyn Future<Output = Result<AudioResource, PlaybackError>> + Send + 'a>>
        {
            Box::pin(async move {
                if utterance.text.is_empty() {
                    return Err(PlaybackError("nothing to say".into()));
                }
                Ok(AudioResource::new(wav::encode_wav(&[0; 240], 24_000), "audio/wav"))
            })
        }
    }

    struct Harness {
        session: PlaybackSession,
        backend: Arc<MockBackend>,
        changes: mpsc::UnboundedReceiver<StateChange>,
        _handle_rx: mpsc::UnboundedReceiver<HandleEvent>,
    }

    impl Harness {
        fn new(backend: Arc<MockBackend>) -> Self {
            let (notify, changes) = mpsc::unbounded_channel();
            let (handle_tx, handle_rx) = mpsc::unbounded_channel();
            let session = PlaybackSession::new(
                backend.clone(),
                Arc::new(MockNative),
                notify,
                handle_tx,
            );
            Self {
                session,
                backend,
                changes,
                _handle_rx: handle_rx,
            }
        }

        fn drain(&mut self) -> Vec<StateChange> {
            let mut out = Vec::new();
            while let Ok(change) = self.changes.try_recv() {
                out.push(change);
            }
            out
        }

        fn names(&mut self) -> Vec<&'static str> {
            self.drain().iter().map(|c| c.name()).collect()
        }

        fn assert_handle_invariant(&self) {
            assert_eq!(
                self.session.has_handle(),
                self.session.state().holds_handle(),
                "handle presence must match state {}",
                self.session.state()
            );
        }

        fn end_current(&mut self) {
            let generation = self.session.generation();
            self.session.on_handle_event(HandleEvent {
                generation,
                kind: HandleEventKind::Ended,
            });
        }
    }

    fn hello() -> PlaybackRequest {
        PlaybackRequest::native(crate::audio::Utterance {
            text: "Hello".into(),
            voice: None,
            rate: 1.0,
            pitch: 1.0,
        })
    }

    fn pcm_request() -> PlaybackRequest {
        PlaybackRequest::raw_pcm("AAAAAAAAAAA=", Some(24_000))
    }

    #[tokio::test]
    async fn test_native_happy_path() {
        let mut h = Harness::new(MockBackend::new(Some(0.01)));
        h.session.start(hello()).await;
        assert_eq!(h.session.state(), &PlaybackState::Playing);
        h.assert_handle_invariant();

        h.end_current();
        assert_eq!(h.names(), vec!["playing", "ended"]);
        assert_eq!(h.session.state(), &PlaybackState::Idle);
        assert!(!h.session.has_resource());
        h.assert_handle_invariant();
    }

    #[tokio::test]
    async fn test_remote_failure_allocates_nothing() {
        let mut h = Harness::new(MockBackend::new(None));
        let ticket = h.session.begin_generating();
        h.assert_handle_invariant();

        let applied = h
            .session
            .complete_generation(ticket, Err(ProviderError::new("API key invalid")))
            .await;
        assert!(applied);
        assert_eq!(
            h.session.state(),
            &PlaybackState::Error("API key invalid".into())
        );
        assert!(!h.session.has_handle());
        assert!(h.backend.opened.lock().unwrap().is_empty());
        assert_eq!(
            h.drain(),
            vec![
                StateChange::Generating,
                StateChange::error("API key invalid")
            ]
        );
    }

    #[tokio::test]
    async fn test_raw_pcm_is_wrapped_in_wav() {
        let mut h = Harness::new(MockBackend::new(Some(1.0)));
        let ticket = h.session.begin_generating();
        h.session.complete_generation(ticket, Ok(pcm_request())).await;

        let opened = h.backend.opened.lock().unwrap();
        assert_eq!(opened.len(), 1);
        assert_eq!(opened[0].mime, "audio/wav");
        // 4 zero samples behind a 44-byte header
        assert_eq!(opened[0].bytes.len(), 52);
        assert_eq!(&opened[0].bytes[0..4], b"RIFF");
    }

    #[tokio::test]
    async fn test_stop_twice_from_idle_is_silent() {
        let mut h = Harness::new(MockBackend::new(None));
        h.session.stop();
        h.session.stop();
        assert!(h.drain().is_empty());
        assert_eq!(h.session.state(), &PlaybackState::Idle);
    }

    #[tokio::test]
    async fn test_stop_twice_while_playing_emits_one_ended() {
        let mut h = Harness::new(MockBackend::new(Some(3.0)));
        h.session.start(hello()).await;
        h.session.stop();
        h.session.stop();
        assert_eq!(h.names(), vec!["playing", "ended"]);
        assert_eq!(h.backend.log(), vec!["stop"]);
        assert!(!h.session.has_resource());
        h.assert_handle_invariant();
    }

    #[tokio::test]
    async fn test_supersede_before_playing() {
        let mut h = Harness::new(MockBackend::new(Some(2.0)));
        let ticket_a = h.session.begin_generating();
        h.drain();

        let ticket_b = h.session.begin_generating();
        assert!(!h.session.is_current(ticket_a));

        // A's fetch lands late: nothing happens downstream.
        let applied = h.session.complete_generation(ticket_a, Ok(pcm_request())).await;
        assert!(!applied);
        assert!(h.backend.opened.lock().unwrap().is_empty());

        h.session.complete_generation(ticket_b, Ok(pcm_request())).await;
        assert_eq!(h.names(), vec!["generating", "playing"]);
        assert_eq!(h.backend.opened.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_supersede_while_playing_releases_old_handle() {
        let mut h = Harness::new(MockBackend::new(Some(2.0)));
        h.session.start(hello()).await;
        let old_generation = h.session.generation();
        h.drain();

        let _ticket = h.session.begin_generating();
        assert_eq!(h.backend.log(), vec!["stop"]);
        assert!(!h.session.has_handle());
        assert!(!h.session.has_resource());
        // no "ended" for the superseded session
        assert_eq!(h.names(), vec!["generating"]);

        // a late end-of-audio from the old handle is ignored
        h.session.on_handle_event(HandleEvent {
            generation: old_generation,
            kind: HandleEventKind::Ended,
        });
        assert_eq!(h.session.state(), &PlaybackState::Generating);
        assert!(h.drain().is_empty());
    }

    #[tokio::test]
    async fn test_stop_during_generating_makes_fetch_stale() {
        let mut h = Harness::new(MockBackend::new(Some(2.0)));
        let ticket = h.session.begin_generating();
        h.session.stop();
        assert_eq!(h.session.state(), &PlaybackState::Idle);

        let applied = h.session.complete_generation(ticket, Ok(pcm_request())).await;
        assert!(!applied);
        assert!(!h.session.has_handle());
        assert_eq!(h.names(), vec!["generating", "ended"]);
    }

    #[tokio::test]
    async fn test_pause_resume() {
        let mut h = Harness::new(MockBackend::new(Some(4.0)));
        h.session.start(hello()).await;
        h.session.pause();
        assert_eq!(h.session.state(), &PlaybackState::Paused);
        h.assert_handle_invariant();
        h.session.pause();
        h.session.resume();
        assert_eq!(h.session.state(), &PlaybackState::Playing);
        assert_eq!(h.backend.log(), vec!["pause", "resume"]);
        assert_eq!(
            h.drain(),
            vec![
                StateChange::Playing { duration: Some(4.0) },
                StateChange::Paused,
                StateChange::Playing { duration: Some(4.0) },
            ]
        );
    }

    #[tokio::test]
    async fn test_seek_clamps() {
        let mut h = Harness::new(MockBackend::new(Some(10.0)));
        h.session.start(hello()).await;
        assert_eq!(h.session.seek(-5.0), Some(0.0));
        assert_eq!(h.session.seek(999.0), Some(10.0));
        assert_eq!(h.session.seek(4.5), Some(4.5));
        assert_eq!(h.backend.log(), vec!["seek 0", "seek 10", "seek 4.5"]);
        assert_eq!(h.session.state(), &PlaybackState::Playing);
    }

    #[tokio::test]
    async fn test_seek_without_handle_is_ignored() {
        let mut h = Harness::new(MockBackend::new(Some(10.0)));
        assert_eq!(h.session.seek(3.0), None);
        assert!(h.backend.log().is_empty());
    }

    #[tokio::test]
    async fn test_progress_emits_timeupdate_only_while_playing() {
        let mut h = Harness::new(MockBackend::new(Some(8.0)));
        h.session.start(hello()).await;
        let generation = h.session.generation();
        h.drain();

        h.session.on_handle_event(HandleEvent {
            generation,
            kind: HandleEventKind::Progress { position: 1.0 },
        });
        h.session.pause();
        h.session.on_handle_event(HandleEvent {
            generation,
            kind: HandleEventKind::Progress { position: 1.1 },
        });
        assert_eq!(
            h.drain(),
            vec![
                StateChange::TimeUpdate {
                    current_time: 1.0,
                    duration: Some(8.0)
                },
                StateChange::Paused,
            ]
        );
    }

    #[tokio::test]
    async fn test_handle_failure_is_terminal() {
        let mut h = Harness::new(MockBackend::new(Some(8.0)));
        h.session.start(hello()).await;
        let generation = h.session.generation();
        h.session.on_handle_event(HandleEvent {
            generation,
            kind: HandleEventKind::Failed("output device lost".into()),
        });
        assert_eq!(
            h.session.state(),
            &PlaybackState::Error("output device lost".into())
        );
        assert!(!h.session.has_resource());
        h.assert_handle_invariant();
        assert_eq!(h.backend.log(), vec!["stop"]);
    }

    #[tokio::test]
    async fn test_backend_open_failure() {
        let mut h = Harness::new(MockBackend::failing());
        h.session.start(hello()).await;
        assert_eq!(
            h.session.state(),
            &PlaybackState::Error("device unplugged".into())
        );
        h.assert_handle_invariant();
        assert!(!h.session.has_resource());
    }

    #[tokio::test]
    async fn test_bad_payload_is_terminal() {
        let mut h = Harness::new(MockBackend::new(None));
        let ticket = h.session.begin_generating();
        h.session
            .complete_generation(ticket, Ok(PlaybackRequest::encoded("%%%", "audio/mpeg")))
            .await;
        assert!(matches!(h.session.state(), PlaybackState::Error(_)));
        assert!(h.backend.opened.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_restart_after_error() {
        let mut h = Harness::new(MockBackend::new(Some(1.0)));
        h.session.report_error("Could not start audio helper: no device");
        assert!(matches!(h.session.state(), PlaybackState::Error(_)));
        h.session.start(hello()).await;
        assert_eq!(h.session.state(), &PlaybackState::Playing);
    }

    #[tokio::test]
    async fn test_rendering_is_silent_until_playback() {
        let mut h = Harness::new(MockBackend::new(Some(1.0)));
        let ticket = h.session.begin_rendering();
        assert!(h.session.is_active());
        assert!(h.drain().is_empty());

        let wav = AudioResource::new(wav::encode_wav(&[0; 240], 24_000), "audio/wav");
        assert!(h.session.complete_render(ticket, wav).await);
        assert_eq!(h.names(), vec!["playing"]);
        h.assert_handle_invariant();
    }

    #[tokio::test]
    async fn test_stop_during_rendering_drops_the_audio() {
        let mut h = Harness::new(MockBackend::new(Some(1.0)));
        let ticket = h.session.begin_rendering();
        h.session.stop();

        let wav = AudioResource::new(wav::encode_wav(&[0; 240], 24_000), "audio/wav");
        assert!(!h.session.complete_render(ticket, wav).await);
        assert!(h.backend.opened.lock().unwrap().is_empty());
        assert_eq!(h.names(), vec!["ended"]);
        assert_eq!(h.session.state(), &PlaybackState::Idle);
    }

    #[test]
    fn test_clamp_position() {
        assert_eq!(clamp_position(-5.0, Some(10.0)), 0.0);
        assert_eq!(clamp_position(999.0, Some(10.0)), 10.0);
        assert_eq!(clamp_position(3.0, None), 3.0);
        assert_eq!(clamp_position(f64::NAN, Some(10.0)), 0.0);
    }
}
