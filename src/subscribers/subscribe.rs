//! # Core subscriber trait
//!
//! `Subscribe` is the extension point for plugging custom event handlers into the
//! runtime: it is the "logger" the application core talks to. Events are awaited
//! inline, in emission order, by the [`SubscriberSet`](crate::SubscriberSet).
//!
//! ## Contract
//! - `on_event` is awaited on the emitting task (application start/stop or a post-init
//!   task) before the lifecycle moves on, so keep it short; hand heavy work off to a
//!   channel of your own.
//! - Implementations must be safe for concurrent use: post-init tasks emit in parallel.
//! - A panicking subscriber is caught and logged; it never breaks the lifecycle.
//!
//! ## Example
//! ```rust
//! use appvisor::{Event, EventKind, Subscribe};
//! use async_trait::async_trait;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! #[derive(Default)]
//! struct FailureCounter(AtomicUsize);
//!
//! #[async_trait]
//! impl Subscribe for FailureCounter {
//!     async fn on_event(&self, ev: &Event) {
//!         if matches!(ev.kind, EventKind::ServiceStartFailed | EventKind::PostInitFailed) {
//!             self.0.fetch_add(1, Ordering::Relaxed);
//!         }
//!     }
//!     fn name(&self) -> &'static str { "failure-counter" }
//! }
//! ```

use crate::events::Event;
use async_trait::async_trait;

/// Contract for event subscribers.
///
/// Awaited by the emitting task. Implementations should avoid blocking the async
/// runtime (prefer async I/O and cooperative waits).
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handle a single event for this subscriber.
    ///
    /// # Parameters
    /// - `event`: Reference to the event (does not transfer ownership)
    async fn on_event(&self, event: &Event);

    /// Human-readable name (for logs/metrics).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}
