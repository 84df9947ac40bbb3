//! # Timed execution of one lifecycle step.
//!
//! Wraps a service start or stop in an optional timeout and reports the outcome to the
//! [`SubscriberSet`].
//!
//! ```text
//! start: ServiceStarting ─► Ok      ─► ServiceStarted
//!                         ├► Err     ─► ServiceStartFailed
//!                         └► timeout ─► ServiceStartTimeout
//!
//! stop:  ServiceStopping ─► Ok      ─► ServiceStopped
//!                         ├► Err     ─► ServiceStopFailed
//!                         └► timeout ─► ServiceStopTimeout
//! ```
//!
//! ## Rules
//! - `None` limit means no timeout.
//! - On timeout the step future is dropped; the scoped state transition inside it
//!   restores the service state.
//! - Exactly one terminal event per step.

use std::future::Future;
use std::time::Duration;

use tokio::time;

use crate::error::StartError;
use crate::events::{Event, EventKind};
use crate::services::{Context, ServiceRef};
use crate::subscribers::SubscriberSet;

/// Outcome of a timed start.
#[derive(Debug)]
pub(crate) enum StartOutcome {
    Started,
    Failed(StartError),
    TimedOut(Duration),
}

/// Runs `fut`, bounded by `limit` when set.
pub(crate) async fn with_limit<F: Future>(
    limit: Option<Duration>,
    fut: F,
) -> Result<F::Output, time::error::Elapsed> {
    match limit {
        Some(dur) => time::timeout(dur, fut).await,
        None => Ok(fut.await),
    }
}

/// Starts one service and emits its lifecycle events.
pub(crate) async fn start_service(
    app: &str,
    service: &ServiceRef,
    ctx: &Context,
    limit: Option<Duration>,
    optional: bool,
    subs: &SubscriberSet,
) -> StartOutcome {
    let event = |kind| {
        Event::now(kind)
            .with_app(app)
            .with_service(service.name_arc())
            .with_optional(optional)
    };
    subs.emit(&event(EventKind::ServiceStarting)).await;

    match with_limit(limit, service.start(ctx)).await {
        Ok(Ok(())) => {
            subs.emit(&event(EventKind::ServiceStarted)).await;
            StartOutcome::Started
        }
        Ok(Err(err)) => {
            subs.emit(&event(EventKind::ServiceStartFailed).with_error(err.as_message()))
                .await;
            StartOutcome::Failed(err)
        }
        Err(_elapsed) => {
            let dur = limit.unwrap_or_default();
            subs.emit(&event(EventKind::ServiceStartTimeout).with_timeout(dur))
                .await;
            StartOutcome::TimedOut(dur)
        }
    }
}

/// Stops one service and emits its lifecycle events. Failures are contained.
pub(crate) async fn stop_service(
    app: &str,
    service: &ServiceRef,
    ctx: &Context,
    limit: Option<Duration>,
    subs: &SubscriberSet,
) {
    let event = |kind| Event::now(kind).with_app(app).with_service(service.name_arc());
    subs.emit(&event(EventKind::ServiceStopping)).await;

    let terminal = match with_limit(limit, service.stop(ctx)).await {
        Ok(Ok(())) => event(EventKind::ServiceStopped),
        Ok(Err(err)) => event(EventKind::ServiceStopFailed).with_error(err.as_message()),
        Err(_elapsed) => event(EventKind::ServiceStopTimeout).with_timeout(limit.unwrap_or_default()),
    };
    subs.emit(&terminal).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn limit_is_optional() {
        let slow = async {
            time::sleep(Duration::from_secs(10)).await;
            7
        };
        assert_eq!(with_limit(None, slow).await.unwrap(), 7);

        let slow = time::sleep(Duration::from_secs(10));
        assert!(with_limit(Some(Duration::from_secs(1)), slow).await.is_err());
    }
}
