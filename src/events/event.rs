//! # Lifecycle events emitted by the application runtime.
//!
//! The [`EventKind`] enum classifies event types across three categories:
//! - **Application events**: whole-application phase boundaries (starting, started, stopping, stopped)
//! - **Service events**: per-service start/stop boundaries and their contained failures
//! - **Post-init events**: outcome of each service's post-init task
//!
//! The [`Event`] struct carries additional metadata such as timestamps, service name,
//! error messages and the timeout that was exceeded.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Start/stop events of one application are emitted sequentially; post-init events of
//! different services may interleave.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use appvisor::{Event, EventKind};
//!
//! let ev = Event::now(EventKind::ServiceStartTimeout)
//!     .with_service("cache")
//!     .with_timeout(Duration::from_secs(5))
//!     .with_optional(true);
//!
//! assert_eq!(ev.kind, EventKind::ServiceStartTimeout);
//! assert_eq!(ev.service.as_deref(), Some("cache"));
//! assert_eq!(ev.timeout_ms, Some(5_000));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    // === Application events ===
    /// Application start requested.
    ///
    /// Sets:
    /// - `app`: application name
    AppStarting,

    /// Every required service is ready; post-init fan-out launched.
    ///
    /// Sets:
    /// - `app`: application name
    AppStarted,

    /// Application stop requested.
    ///
    /// Sets:
    /// - `app`: application name
    AppStopping,

    /// Every started service was asked to stop; application is closed.
    ///
    /// Sets:
    /// - `app`: application name
    AppStopped,

    /// A required service failed; already started services are being stopped.
    ///
    /// Sets:
    /// - `app`: application name
    /// - `service`: the failed service
    /// - `error`: failure message
    Rollback,

    // === Service lifecycle events ===
    /// Service start is about to run.
    ///
    /// Sets:
    /// - `service`: service name
    ServiceStarting,

    /// Service reached `READY`.
    ///
    /// Sets:
    /// - `service`: service name
    ServiceStarted,

    /// Service start failed (init error, unhealthy, panic).
    ///
    /// Sets:
    /// - `service`: service name
    /// - `error`: failure message
    /// - `optional`: `true` if the failure is tolerated
    ServiceStartFailed,

    /// Service start exceeded the per-service timeout.
    ///
    /// Sets:
    /// - `service`: service name
    /// - `timeout_ms`: configured timeout (ms)
    /// - `optional`: `true` if the failure is tolerated
    ServiceStartTimeout,

    /// Service stop is about to run.
    ///
    /// Sets:
    /// - `service`: service name
    ServiceStopping,

    /// Service reached `CLOSED`.
    ///
    /// Sets:
    /// - `service`: service name
    ServiceStopped,

    /// Service `close` failed (contained).
    ///
    /// Sets:
    /// - `service`: service name
    /// - `error`: failure message
    ServiceStopFailed,

    /// Service stop exceeded the per-service timeout (contained).
    ///
    /// Sets:
    /// - `service`: service name
    /// - `timeout_ms`: configured timeout (ms)
    ServiceStopTimeout,

    // === Post-init events ===
    /// Post-init task finished successfully.
    ///
    /// Sets:
    /// - `service`: service name
    PostInitDone,

    /// Post-init task failed (contained).
    ///
    /// Sets:
    /// - `service`: service name
    /// - `error`: failure message
    PostInitFailed,

    /// Post-init task was still running at the aggregate deadline (contained).
    ///
    /// Sets:
    /// - `service`: service name
    /// - `timeout_ms`: aggregate post-init timeout (ms)
    PostInitTimeout,

    /// Post-init task was cancelled by application stop.
    ///
    /// Sets:
    /// - `service`: service name
    PostInitCancelled,
}

impl EventKind {
    /// Returns a short stable label (kebab-case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            EventKind::AppStarting => "app-starting",
            EventKind::AppStarted => "app-started",
            EventKind::AppStopping => "app-stopping",
            EventKind::AppStopped => "app-stopped",
            EventKind::Rollback => "rollback",
            EventKind::ServiceStarting => "service-starting",
            EventKind::ServiceStarted => "service-started",
            EventKind::ServiceStartFailed => "service-start-failed",
            EventKind::ServiceStartTimeout => "service-start-timeout",
            EventKind::ServiceStopping => "service-stopping",
            EventKind::ServiceStopped => "service-stopped",
            EventKind::ServiceStopFailed => "service-stop-failed",
            EventKind::ServiceStopTimeout => "service-stop-timeout",
            EventKind::PostInitDone => "post-init-done",
            EventKind::PostInitFailed => "post-init-failed",
            EventKind::PostInitTimeout => "post-init-timeout",
            EventKind::PostInitCancelled => "post-init-cancelled",
        }
    }
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Name of the application, if applicable.
    pub app: Option<Arc<str>>,
    /// Name of the service, if applicable.
    pub service: Option<Arc<str>>,
    /// Human-readable error message.
    pub error: Option<Arc<str>>,
    /// Exceeded timeout in milliseconds (compact).
    pub timeout_ms: Option<u32>,
    /// Whether the failing service is optional.
    pub optional: bool,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn now(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            app: None,
            service: None,
            error: None,
            timeout_ms: None,
            optional: false,
        }
    }

    /// Attaches the application name.
    #[inline]
    pub fn with_app(mut self, app: impl Into<Arc<str>>) -> Self {
        self.app = Some(app.into());
        self
    }

    /// Attaches the service name.
    #[inline]
    pub fn with_service(mut self, service: impl Into<Arc<str>>) -> Self {
        self.service = Some(service.into());
        self
    }

    /// Attaches an error message.
    #[inline]
    pub fn with_error(mut self, error: impl Into<Arc<str>>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Attaches a timeout duration (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.timeout_ms = Some(ms);
        self
    }

    /// Marks whether the service is optional.
    #[inline]
    pub fn with_optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_numbers_increase() {
        let a = Event::now(EventKind::AppStarting);
        let b = Event::now(EventKind::AppStarted);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn timeout_saturates_to_u32() {
        let ev = Event::now(EventKind::PostInitTimeout).with_timeout(Duration::from_secs(u64::MAX));
        assert_eq!(ev.timeout_ms, Some(u32::MAX));
    }
}
