//! Helper lifecycle: the audio helper is created lazily, at most once at a
//! time, and torn down as soon as nothing is playing.

pub mod audio_thread;

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use futures_util::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, info, warn};

use crate::error::CreationError;

pub use audio_thread::AudioThreadHost;

/// Something that hosts the audio helper (dyn-compatible).
pub trait HelperHost: Send + Sync {
    /// Whether a helper exists and is accepting commands.
    fn is_running(&self) -> bool;

    /// Bring a helper up. Resolves once it is ready for commands.
    fn create(&self) -> Pin<Box<dyn Future<Output = Result<(), CreationError>> + Send>>;

    /// Tear the helper down. No-op when nothing runs.
    fn close(&self);

    /// Output device and volume for helpers created from now on.
    fn configure(&self, _output_device: Option<String>, _volume: f32) {}
}

type PendingCreation = Shared<BoxFuture<'static, Result<(), CreationError>>>;

/// De-duplicates helper creation. Every caller that arrives while a
/// creation is in flight awaits that same creation.
pub struct HelperLifecycle {
    host: Arc<dyn HelperHost>,
    pending: Mutex<Option<PendingCreation>>,
}

impl HelperLifecycle {
    pub fn new(host: Arc<dyn HelperHost>) -> Self {
        Self {
            host,
            pending: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.host.is_running()
    }

    /// Make sure the helper exists.
    ///
    /// A failed creation is reported to every waiter and clears the latch,
    /// so the next call tries again.
    pub async fn ensure(&self) -> Result<(), CreationError> {
        if self.host.is_running() {
            return Ok(());
        }

        let creation = {
            let mut pending = match self.pending.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            match pending.as_ref() {
                Some(existing) => {
                    debug!("Joining in-flight helper creation");
                    existing.clone()
                }
                None => {
                    info!("Creating audio helper");
                    let fresh = self.host.create().shared();
                    *pending = Some(fresh.clone());
                    fresh
                }
            }
        };

        let result = creation.clone().await;

        {
            let mut pending = match self.pending.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if pending.as_ref().is_some_and(|p| p.ptr_eq(&creation)) {
                *pending = None;
            }
        }

        if let Err(e) = &result {
            warn!("Audio helper creation failed: {}", e);
        }
        result
    }

    pub fn configure(&self, output_device: Option<String>, volume: f32) {
        self.host.configure(output_device, volume);
    }

    /// Close the helper if one exists.
    pub fn teardown(&self) {
        if self.host.is_running() {
            info!("Tearing down audio helper");
            self.host.close();
        }
    }
}
