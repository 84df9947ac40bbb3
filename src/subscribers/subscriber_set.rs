//! # Event fan-out to multiple subscribers.
//!
//! Provides [`SubscriberSet`] which delivers every event to each subscriber in turn.
//!
//! ## Architecture
//! ```text
//! emit(event).await
//!     │
//!     ├──► subscriber1.on_event().await   ── panic → caught, logged
//!     ├──► subscriber2.on_event().await
//!     └──► subscriberN.on_event().await
//! ```
//!
//! ## Rules
//! - **Inline**: `emit()` completes after every subscriber has handled the event,
//!   so no delivery work outlives the application.
//! - **Isolation**: a panicking subscriber doesn't affect the others or the emitter.
//! - **Per-emitter FIFO**: events emitted by one task arrive in emission order.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;

use crate::events::Event;
use crate::subscribers::Subscribe;

/// Fan-out coordinator for multiple event subscribers.
#[derive(Clone, Default)]
pub struct SubscriberSet {
    subs: Vec<Arc<dyn Subscribe>>,
}

impl SubscriberSet {
    /// Creates a new set delivering to `subs` in order.
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>) -> Self {
        Self { subs }
    }

    /// Adds a subscriber at the end of the set.
    pub fn push(&mut self, sub: Arc<dyn Subscribe>) {
        self.subs.push(sub);
    }

    /// Delivers `event` to all subscribers.
    ///
    /// **Warning**: `AssertUnwindSafe` is used, which can leave shared state inconsistent
    /// if a subscriber uses `Mutex<T>` and panics while holding the lock.
    pub async fn emit(&self, event: &Event) {
        for sub in &self.subs {
            if let Err(panic_err) = AssertUnwindSafe(sub.on_event(event)).catch_unwind().await {
                tracing::error!(
                    subscriber = sub.name(),
                    panic = %panic_message(panic_err.as_ref()),
                    event = event.kind.as_label(),
                    "subscriber panicked"
                );
            }
        }
    }
}

/// Extracts a printable message from a panic payload.
pub(crate) fn panic_message(any: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = any.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = any.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    struct Collect(Mutex<Vec<EventKind>>);

    #[async_trait]
    impl Subscribe for Collect {
        async fn on_event(&self, ev: &Event) {
            self.0.lock().unwrap().push(ev.kind);
        }
    }

    struct Explode;

    #[async_trait]
    impl Subscribe for Explode {
        async fn on_event(&self, _ev: &Event) {
            panic!("subscriber exploded");
        }
    }

    /// Suspends before recording, so a later event could overtake it if delivery
    /// were not awaited.
    struct Slow(Mutex<Vec<EventKind>>);

    #[async_trait]
    impl Subscribe for Slow {
        async fn on_event(&self, ev: &Event) {
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.0.lock().unwrap().push(ev.kind);
        }
    }

    #[tokio::test]
    async fn panicking_subscriber_does_not_block_others() {
        let collect = Arc::new(Collect(Mutex::new(Vec::new())));
        let set = SubscriberSet::new(vec![Arc::new(Explode), collect.clone()]);

        set.emit(&Event::now(EventKind::AppStarting)).await;
        set.emit(&Event::now(EventKind::AppStarted)).await;

        assert_eq!(
            *collect.0.lock().unwrap(),
            vec![EventKind::AppStarting, EventKind::AppStarted]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn emit_completes_after_async_handlers() {
        let slow = Arc::new(Slow(Mutex::new(Vec::new())));
        let set = SubscriberSet::new(vec![slow.clone()]);

        set.emit(&Event::now(EventKind::ServiceStarting)).await;
        assert_eq!(*slow.0.lock().unwrap(), vec![EventKind::ServiceStarting]);

        set.emit(&Event::now(EventKind::ServiceStarted)).await;
        assert_eq!(
            *slow.0.lock().unwrap(),
            vec![EventKind::ServiceStarting, EventKind::ServiceStarted]
        );
    }

    #[test]
    fn panic_message_handles_both_payload_kinds() {
        let s: Box<dyn std::any::Any + Send> = Box::new("static");
        assert_eq!(panic_message(s.as_ref()), "static");
        let s: Box<dyn std::any::Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(s.as_ref()), "owned");
        let s: Box<dyn std::any::Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(s.as_ref()), "unknown panic");
    }
}
