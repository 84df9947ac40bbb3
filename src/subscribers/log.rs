//! # LogWriter: lifecycle events as `tracing` records
//!
//! The default subscriber installed by [`ApplicationBuilder`](crate::ApplicationBuilder)
//! (unless `AppConfig::log_events` is off). Each [`Event`] becomes one structured
//! `tracing` record; install a `tracing_subscriber` to see them.
//!
//! ## Example output (`RUST_LOG=debug`)
//! ```text
//! INFO  app="shop" starting
//! DEBUG service="cache" starting
//! DEBUG service="cache" started
//! ERROR service="users" error="connection refused" service failed on start
//! WARN  service="metrics" optional=true timeout_ms=30000 service took too long to start
//! ERROR service="search" error="index missing" service post-init failed
//! INFO  app="shop" stopped
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let app = e.app.as_deref().unwrap_or("");
        let service = e.service.as_deref().unwrap_or("");
        let error = e.error.as_deref().unwrap_or("");

        match e.kind {
            EventKind::AppStarting => tracing::info!(app, "starting"),
            EventKind::AppStarted => tracing::info!(app, "started"),
            EventKind::AppStopping => tracing::info!(app, "stopping"),
            EventKind::AppStopped => tracing::info!(app, "stopped"),
            EventKind::Rollback => {
                tracing::error!(app, service, error, "required service failed, rolling back")
            }
            EventKind::ServiceStarting => tracing::debug!(service, "starting"),
            EventKind::ServiceStarted => tracing::debug!(service, "started"),
            EventKind::ServiceStopping => tracing::debug!(service, "stopping"),
            EventKind::ServiceStopped => tracing::debug!(service, "stopped"),
            EventKind::ServiceStartFailed if e.optional => {
                tracing::warn!(service, error, optional = true, "service failed on start")
            }
            EventKind::ServiceStartFailed => {
                tracing::error!(service, error, "service failed on start")
            }
            EventKind::ServiceStartTimeout => tracing::warn!(
                service,
                optional = e.optional,
                timeout_ms = e.timeout_ms,
                "service took too long to start"
            ),
            EventKind::ServiceStopFailed => {
                tracing::error!(service, error, "service stop failed")
            }
            EventKind::ServiceStopTimeout => {
                tracing::error!(service, timeout_ms = e.timeout_ms, "service stop timeout")
            }
            EventKind::PostInitDone => tracing::debug!(service, "post-init done"),
            EventKind::PostInitFailed => {
                tracing::error!(service, error, "service post-init failed")
            }
            EventKind::PostInitTimeout => tracing::error!(
                service,
                max_timeout_ms = e.timeout_ms,
                "service post-init timeout"
            ),
            EventKind::PostInitCancelled => tracing::debug!(service, "post-init cancelled"),
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
