//! Message router: relays messages between contexts.
//!
//! Each message kind has exactly one audience. A context never receives a
//! message it sent, and no context both produces and consumes the same
//! kind, so one relay step cannot loop.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, trace};

use super::Message;

/// The execution contexts that exchange messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextId {
    /// The controller that owns the playback session.
    Background,
    /// The page-side script that knows the current selection.
    Content,
    /// Side panel UI.
    Panel,
    /// Toolbar popup UI.
    Popup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Audience {
    Background,
    Content,
    Ui,
}

fn audience(message: &Message) -> Audience {
    match message {
        Message::SpeakText { .. }
        | Message::SpeakWithProvider { .. }
        | Message::AudioControl { .. }
        | Message::SaveSettings { .. }
        | Message::GetVoices {} => Audience::Background,
        Message::GetSelectedText {} => Audience::Content,
        Message::AudioStateChange(_)
        | Message::SelectedText { .. }
        | Message::Voices { .. }
        | Message::Status { .. } => Audience::Ui,
    }
}

impl ContextId {
    /// Contexts that live outside this process and reach it over the bridge.
    pub const REMOTE: [ContextId; 3] = [Self::Content, Self::Panel, Self::Popup];

    /// Whether this context consumes `message`.
    pub fn accepts(&self, message: &Message) -> bool {
        matches!(
            (self, audience(message)),
            (Self::Background, Audience::Background)
                | (Self::Content, Audience::Content)
                | (Self::Panel | Self::Popup, Audience::Ui)
        )
    }
}

/// Broadcast relay over per-context channels.
#[derive(Default)]
pub struct Router {
    routes: Mutex<HashMap<ContextId, mpsc::UnboundedSender<Message>>>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a context. Replaces any previous registration for `id`.
    pub fn register(&self, id: ContextId) -> mpsc::UnboundedReceiver<Message> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.routes().insert(id, tx);
        debug!(context = ?id, "Context registered");
        rx
    }

    pub fn unregister(&self, id: ContextId) {
        if self.routes().remove(&id).is_some() {
            debug!(context = ?id, "Context unregistered");
        }
    }

    /// Deliver `message` to every registered context that accepts it,
    /// except `origin`. Returns the number of deliveries.
    pub fn route(&self, origin: ContextId, message: Message) -> usize {
        let mut routes = self.routes();
        let mut delivered = 0;
        routes.retain(|id, tx| {
            if *id == origin || !id.accepts(&message) {
                return true;
            }
            if tx.send(message.clone()).is_ok() {
                delivered += 1;
                true
            } else {
                debug!(context = ?id, "Dropping closed context");
                false
            }
        });
        trace!(action = message.action(), from = ?origin, delivered, "Routed message");
        delivered
    }

    fn routes(&self) -> std::sync::MutexGuard<'_, HashMap<ContextId, mpsc::UnboundedSender<Message>>> {
        match self.routes.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
