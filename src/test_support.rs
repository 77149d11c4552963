//! Test doubles shared across modules.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::audio::{AudioBackend, AudioHandle, AudioResource, HandleEventSink, Utterance};
use crate::error::{CreationError, PlaybackError};
use crate::helper::HelperHost;
use crate::tts::{NativeSpeech, VoiceInfo};

// ── Local HTTP server ───────────────────────────────────────────────

pub struct CannedResponse {
    status_line: &'static str,
    body: String,
    content_length: usize,
}

impl CannedResponse {
    pub fn json(status_line: &'static str, body: &str) -> Self {
        Self {
            status_line,
            body: body.to_string(),
            content_length: body.len(),
        }
    }

    /// Announce `content_length` bytes but close after `body`.
    pub fn truncated(status_line: &'static str, body: &str, content_length: usize) -> Self {
        Self {
            status_line,
            body: body.to_string(),
            content_length,
        }
    }
}

pub struct OneShotServer {
    pub base_url: String,
    task: JoinHandle<String>,
}

impl OneShotServer {
    /// The raw request the server received (request line, headers, body).
    pub async fn request(self) -> String {
        self.task.await.unwrap()
    }
}

/// Serve exactly one HTTP request on a loopback port with a canned reply.
pub async fn serve_once(response: CannedResponse) -> OneShotServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let task = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let request = read_request(&mut socket).await;
        let reply = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            response.status_line,
            response.content_length,
            response.body
        );
        socket.write_all(reply.as_bytes()).await.unwrap();
        let _ = socket.shutdown().await;
        request
    });
    OneShotServer {
        base_url: format!("http://{}", addr),
        task,
    }
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        let text = String::from_utf8_lossy(&buf);
        if let Some(header_end) = text.find("\r\n\r\n") {
            let content_length = text[..header_end]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if buf.len() >= header_end + 4 + content_length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

// ── Helper host ─────────────────────────────────────────────────────

#[derive(Default)]
struct HostState {
    running: AtomicBool,
    fail: AtomicBool,
    creations: AtomicUsize,
    closes: AtomicUsize,
}

/// Counts creations and closes. Creation takes a few milliseconds so
/// concurrent callers overlap.
#[derive(Clone, Default)]
pub struct MockHost {
    state: Arc<HostState>,
}

impl MockHost {
    pub fn creations(&self) -> usize {
        self.state.creations.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.state.closes.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, fail: bool) {
        self.state.fail.store(fail, Ordering::SeqCst);
    }
}

impl HelperHost for MockHost {
    fn is_running(&self) -> bool {
        self.state.running.load(Ordering::SeqCst)
    }

    fn create(&self) -> Pin<Box<dyn Future<Output = Result<(), CreationError>> + Send>> {
        let state = Arc::clone(&self.state);
        Box::pin(async move {
            state.creations.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            if state.fail.load(Ordering::SeqCst) {
                return Err(CreationError("no output device".into()));
            }
            state.running.store(true, Ordering::SeqCst);
            Ok(())
        })
    }

    fn close(&self) {
        if self.state.running.swap(false, Ordering::SeqCst) {
            self.state.closes.fetch_add(1, Ordering::SeqCst);
        }
    }
}

// ── Audio backend ───────────────────────────────────────────────────

/// Records every resource opened. Handles report a fixed duration.
#[derive(Clone, Default)]
pub struct MockBackend {
    opened: Arc<Mutex<Vec<AudioResource>>>,
    sinks: Arc<Mutex<Vec<HandleEventSink>>>,
}

impl MockBackend {
    pub fn opened(&self) -> Vec<AudioResource> {
        self.opened.lock().unwrap().clone()
    }

    /// Event sink of the most recently opened handle.
    pub fn last_sink(&self) -> HandleEventSink {
        self.sinks.lock().unwrap().last().cloned().unwrap()
    }
}

struct MockHandle;

impl AudioHandle for MockHandle {
    fn pause(&mut self) {}
    fn resume(&mut self) {}
    fn stop(&mut self) {}
    fn seek(&mut self, _position: f64) {}
    fn duration(&self) -> Option<f64> {
        Some(2.0)
    }
}

impl AudioBackend for MockBackend {
    fn open(
        &self,
        resource: AudioResource,
        events: HandleEventSink,
    ) -> Pin<Box<dyn Future<Output = Result<Box<dyn AudioHandle>, PlaybackError>> + Send + '_>> {
        self.opened.lock().unwrap().push(resource);
        self.sinks.lock().unwrap().push(events);
        Box::pin(async { Ok(Box::new(MockHandle) as Box<dyn AudioHandle>) })
    }
}

// ── Native speech ───────────────────────────────────────────────────

fn silent_wav() -> AudioResource {
    AudioResource::new(crate::audio::wav::encode_wav(&[0; 240], 24_000), "audio/wav")
}

/// Renders every utterance to a tiny silent WAV and offers one voice.
pub struct MockNative;

impl NativeSpeech for MockNative {
    fn render<'a>(
        &'a self,
        _utterance: &'a Utterance,
    ) -> Pin<Box<dyn Future<Output = Result<AudioResource, PlaybackError>> + Send + 'a>> {
        Box::pin(async { Ok(silent_wav()) })
    }

    fn voices(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<VoiceInfo>, PlaybackError>> + Send + '_>> {
        Box::pin(async {
            Ok(vec![VoiceInfo {
                id: "en-us".into(),
                name: "English (America)".into(),
            }])
        })
    }
}

/// Like `MockNative`, but rendering takes a while.
pub struct SlowNative(pub Duration);

impl NativeSpeech for SlowNative {
    fn render<'a>(
        &'a self,
        _utterance: &'a Utterance,
    ) -> Pin<Box<dyn Future<Output = Result<AudioResource, PlaybackError>> + Send + 'a>> {
        Box::pin(async move {
            tokio::time::sleep(self.0).await;
            Ok(silent_wav())
        })
    }
}
