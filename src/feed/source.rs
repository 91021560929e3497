// src/feed/source.rs
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::ACCEPT;
use std::time::Duration;

use crate::feed::config::FeedConfig;
use crate::feed::decode::FeedFormat;
use crate::feed::error::FetchError;

/// Where raw feed bytes come from. One call is one upstream attempt.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch(&self) -> Result<Bytes, FetchError>;
    fn name(&self) -> &'static str;
}

/// Production source: a single GET against the configured feed URL.
pub struct HttpFeedSource {
    client: reqwest::Client,
    url: String,
    format: FeedFormat,
    timeout: Duration,
}

impl HttpFeedSource {
    pub fn new(cfg: &FeedConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(cfg.user_agent.as_str())
            .connect_timeout(cfg.fetch_timeout().min(Duration::from_secs(4)))
            .timeout(cfg.fetch_timeout())
            .build()
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            url: cfg.url.clone(),
            format: cfg.format,
            timeout: cfg.fetch_timeout(),
        })
    }

    fn classify_err(&self, e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else {
            FetchError::from(e)
        }
    }
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    async fn fetch(&self) -> Result<Bytes, FetchError> {
        let resp = self
            .client
            .get(&self.url)
            .header(ACCEPT, self.format.accept_header())
            .send()
            .await
            .map_err(|e| self.classify_err(e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        resp.bytes().await.map_err(|e| self.classify_err(e))
    }

    fn name(&self) -> &'static str {
        "ttc-gtfsrt"
    }
}

// --- Test helper ---

/// Replays queued responses in order; once the queue is drained the last
/// response repeats. Counts calls and can be slowed down to hold a refresh
/// in flight.
pub struct ScriptedSource {
    queue: parking_lot::Mutex<std::collections::VecDeque<Result<Bytes, FetchError>>>,
    last: parking_lot::Mutex<Option<Result<Bytes, FetchError>>>,
    delay: Duration,
    calls: std::sync::atomic::AtomicUsize,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self {
            queue: parking_lot::Mutex::new(Default::default()),
            last: parking_lot::Mutex::new(None),
            delay: Duration::ZERO,
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn push_ok(&self, body: impl Into<Bytes>) {
        self.queue.lock().push_back(Ok(body.into()));
    }

    pub fn push_err(&self, err: FetchError) {
        self.queue.lock().push_back(Err(err));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

impl Default for ScriptedSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FeedSource for ScriptedSource {
    async fn fetch(&self) -> Result<Bytes, FetchError> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let next = self.queue.lock().pop_front();
        let mut last = self.last.lock();
        match next {
            Some(r) => {
                *last = Some(r.clone());
                r
            }
            None => last
                .clone()
                .unwrap_or_else(|| Err(FetchError::Transport("no scripted response".into()))),
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}
