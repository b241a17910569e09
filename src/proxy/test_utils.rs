//! In-process upstream double that records every call it receives, plus a
//! process-wide capturing logger for asserting on log output.

use async_trait::async_trait;
use log::{ LevelFilter, Log, Metadata, Record };
use reqwest::StatusCode;
use std::collections::VecDeque;
use std::sync::{ Mutex, Once };
use std::sync::atomic::{ AtomicUsize, Ordering };
use std::time::Duration;

use crate::config::Credential;
use crate::llm::chat::{ TransportError, UpstreamClient, UpstreamReply };
use crate::models::chat::UpstreamChatRequest;

#[derive(Default)]
pub struct FakeUpstream {
    replies: Mutex<VecDeque<Result<UpstreamReply, TransportError>>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    last_request: Mutex<Option<UpstreamChatRequest>>,
    last_credential: Mutex<Option<String>>,
}

impl FakeUpstream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, status: u16, body: &str) -> Self {
        let status = StatusCode::from_u16(status).unwrap();
        self.replies.lock().unwrap().push_back(Ok(UpstreamReply::new(status, body.as_bytes())));
        self
    }

    pub fn fail(self, err: TransportError) -> Self {
        self.replies.lock().unwrap().push_back(Err(err));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<UpstreamChatRequest> {
        self.last_request.lock().unwrap().clone()
    }

    pub fn last_credential(&self) -> Option<String> {
        self.last_credential.lock().unwrap().clone()
    }
}

#[async_trait]
impl UpstreamClient for FakeUpstream {
    async fn send(
        &self,
        request: &UpstreamChatRequest,
        credential: &Credential
    ) -> Result<UpstreamReply, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());
        *self.last_credential.lock().unwrap() = Some(credential.expose().to_string());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = self.replies.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(UpstreamReply::new(StatusCode::OK, "{}")))
    }
}

static CAPTURED: Mutex<Vec<(log::Level, String)>> = Mutex::new(Vec::new());
static LOGGER: CapturingLogger = CapturingLogger;
static INSTALL: Once = Once::new();

struct CapturingLogger;

impl Log for CapturingLogger {
    fn enabled(&self, _: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        CAPTURED.lock().unwrap().push((record.level(), record.args().to_string()));
    }

    fn flush(&self) {}
}

/// Installs the capturing logger once per test binary. Records from every
/// test end up in the same buffer, so assert on distinctive text.
pub fn capture_logs() {
    INSTALL.call_once(|| {
        log::set_logger(&LOGGER).unwrap();
        log::set_max_level(LevelFilter::Trace);
    });
}

/// Captured lines at `level` containing `needle`.
pub fn logged(level: log::Level, needle: &str) -> Vec<String> {
    CAPTURED.lock()
        .unwrap()
        .iter()
        .filter(|(l, line)| *l == level && line.contains(needle))
        .map(|(_, line)| line.clone())
        .collect()
}
