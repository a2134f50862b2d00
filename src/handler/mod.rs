//! Text update handlers
//!
//! A handler receives the full accumulated text every time it changes and
//! once more when the stream ends. The reassembler awaits each call before
//! reading the next chunk, so a handler is never invoked concurrently with
//! itself.
//!
//! A handler that holds updates back reports a deadline through
//! [`TextHandler::flush_at`]; the reassembler calls [`TextHandler::flush`]
//! once it passes while a read is still outstanding.

pub mod throttle;

use async_trait::async_trait;
use std::future::Future;
use tokio::time::Instant;

pub use throttle::Throttled;

/// Consumer of accumulated completion text
#[async_trait]
pub trait TextHandler: Send {
    /// Called with the accumulated text after it changed.
    async fn on_text(&mut self, text: &str);

    /// Called exactly once with the final text when the stream ends.
    async fn on_end(&mut self, text: &str) {
        self.on_text(text).await
    }

    /// When held-back text is due, if any is held.
    fn flush_at(&self) -> Option<Instant> {
        None
    }

    /// Deliver held-back text.
    async fn flush(&mut self) {}
}

#[async_trait]
impl<F, Fut> TextHandler for F
where
    F: FnMut(String) -> Fut + Send,
    Fut: Future<Output = ()> + Send,
{
    async fn on_text(&mut self, text: &str) {
        (self)(text.to_owned()).await
    }
}
