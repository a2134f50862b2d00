//! Rate-limited handler
//!
//! Wraps a [`TextHandler`] so that it is invoked at most once per interval.
//! Updates arriving inside the window are held back; only the latest one is
//! kept and it is delivered when the window closes, provided the caller
//! drives [`TextHandler::flush`] at [`TextHandler::flush_at`]. The
//! end-of-stream call always goes through, so the final text is never dropped.

use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;

use crate::handler::TextHandler;

/// Throttling wrapper around another handler
pub struct Throttled<H> {
    inner: H,
    interval: Duration,
    last_delivery: Option<Instant>,
    /// Latest update suppressed by the window
    pending: Option<String>,
}

impl<H: TextHandler> Throttled<H> {
    /// A zero interval delivers every update.
    pub fn new(interval: Duration, inner: H) -> Self {
        Self {
            inner,
            interval,
            last_delivery: None,
            pending: None,
        }
    }

    pub fn from_millis(millis: u64, inner: H) -> Self {
        Self::new(Duration::from_millis(millis), inner)
    }

    /// Latest held-back update, if any
    pub fn pending(&self) -> Option<&str> {
        self.pending.as_deref()
    }

    pub fn into_inner(self) -> H {
        self.inner
    }

    fn window_open(&self, now: Instant) -> bool {
        self.last_delivery
            .map_or(true, |last| now.duration_since(last) >= self.interval)
    }
}

#[async_trait]
impl<H: TextHandler> TextHandler for Throttled<H> {
    async fn on_text(&mut self, text: &str) {
        let now = Instant::now();
        if self.window_open(now) {
            self.pending = None;
            self.last_delivery = Some(now);
            self.inner.on_text(text).await;
        } else {
            self.pending = Some(text.to_owned());
        }
    }

    async fn on_end(&mut self, text: &str) {
        self.pending = None;
        self.last_delivery = Some(Instant::now());
        self.inner.on_end(text).await;
    }

    fn flush_at(&self) -> Option<Instant> {
        self.pending.as_ref()?;
        self.last_delivery.map(|last| last + self.interval)
    }

    /// Deliver a held-back update now, ignoring the window.
    async fn flush(&mut self) {
        if let Some(text) = self.pending.take() {
            self.last_delivery = Some(Instant::now());
            self.inner.on_text(&text).await;
        }
    }
}
