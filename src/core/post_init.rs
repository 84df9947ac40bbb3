//! # Post-init fan-out.
//!
//! After a successful start every started service runs its `post_init` hook
//! concurrently. The fan-out is one cancellable unit: a driver task owns a
//! [`JoinSet`] of per-service tasks and a [`CancellationToken`].
//!
//! ```text
//! PostInit::spawn ──► driver ──► JoinSet
//!                       │          ├─► a.post_init() ─► PostInitDone
//!                       │          ├─► b.post_init() ─► PostInitFailed
//!                       │          └─► c.post_init() ─► PostInitTimeout   (shared deadline)
//!                       │
//!                       └── token cancelled ──► JoinSet::shutdown ─► PostInitCancelled
//! ```
//!
//! ## Rules
//! - All tasks share **one deadline** computed when the fan-out starts; a slow task can
//!   make a sibling that started later look timed out.
//! - A limit too large to add to the current instant means no deadline.
//! - Failures and timeouts are emitted and recorded, never propagated.
//! - [`PostInit::cancel`] returns only after every task has finished or been aborted.
//! - A hook returning [`HookError::Canceled`] counts as cancelled, not failed.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::error::HookError;
use crate::events::{Event, EventKind};
use crate::services::{Context, ServiceRef};
use crate::subscribers::SubscriberSet;

/// Status of one post-init task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// The hook is still running.
    Running,
    /// The hook returned successfully.
    Done,
    /// The hook failed or panicked.
    Failed,
    /// The shared deadline passed first.
    TimedOut,
    /// The fan-out was cancelled, or the hook observed cancellation.
    Cancelled,
}

/// Post-init task entry of an [`Inspection`](crate::Inspection).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskReport {
    /// Service the task belongs to.
    pub name: String,
    /// Current status.
    pub status: TaskStatus,
}

/// Status table shared by the fan-out tasks and inspection.
#[derive(Clone, Default)]
pub(crate) struct TaskTable(Arc<Mutex<Vec<TaskReport>>>);

impl TaskTable {
    fn reset(&self, services: &[ServiceRef]) {
        *self.lock() = services
            .iter()
            .map(|s| TaskReport {
                name: s.name().to_string(),
                status: TaskStatus::Running,
            })
            .collect();
    }

    fn set(&self, idx: usize, status: TaskStatus) {
        if let Some(entry) = self.lock().get_mut(idx) {
            entry.status = status;
        }
    }

    /// Marks every running entry cancelled and returns their positions.
    fn cancel_running(&self) -> Vec<usize> {
        let mut tasks = self.lock();
        tasks
            .iter_mut()
            .enumerate()
            .filter(|(_, t)| t.status == TaskStatus::Running)
            .map(|(i, t)| {
                t.status = TaskStatus::Cancelled;
                i
            })
            .collect()
    }

    pub(crate) fn snapshot(&self) -> Vec<TaskReport> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<TaskReport>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handle of a running fan-out.
pub(crate) struct PostInit {
    token: CancellationToken,
    done: CancellationToken,
    driver: JoinHandle<()>,
}

impl PostInit {
    /// Spawns one post-init task per service under a shared deadline.
    pub(crate) fn spawn(
        app: Arc<str>,
        services: Vec<ServiceRef>,
        ctx: &Context,
        limit: Option<Duration>,
        subs: SubscriberSet,
        table: TaskTable,
    ) -> Self {
        let token = ctx.token().child_token();
        let done = CancellationToken::new();
        table.reset(&services);

        // A limit past the clock's range is no deadline at all.
        let deadline = limit.and_then(|d| Instant::now().checked_add(d));
        let mut set = JoinSet::new();
        for (idx, service) in services.iter().enumerate() {
            let service = Arc::clone(service);
            let ctx = ctx
                .for_service(service.name_arc())
                .with_token(token.child_token());
            let app = Arc::clone(&app);
            let subs = subs.clone();
            let table = table.clone();

            set.spawn(async move {
                let outcome = match deadline {
                    Some(at) => time::timeout_at(at, service.post_init(&ctx)).await,
                    None => Ok(service.post_init(&ctx).await),
                };
                let event = Event::now(EventKind::PostInitDone)
                    .with_app(app)
                    .with_service(service.name_arc());
                let (status, event) = match outcome {
                    Ok(Ok(())) => (TaskStatus::Done, event),
                    Ok(Err(HookError::Canceled)) => (
                        TaskStatus::Cancelled,
                        Event {
                            kind: EventKind::PostInitCancelled,
                            ..event
                        },
                    ),
                    Ok(Err(err)) => (
                        TaskStatus::Failed,
                        Event {
                            kind: EventKind::PostInitFailed,
                            ..event
                        }
                        .with_error(err.as_message()),
                    ),
                    Err(_elapsed) => (
                        TaskStatus::TimedOut,
                        Event {
                            kind: EventKind::PostInitTimeout,
                            ..event
                        }
                        .with_timeout(limit.unwrap_or_default()),
                    ),
                };
                table.set(idx, status);
                subs.emit(&event).await;
            });
        }

        let driver = {
            let token = token.clone();
            let done = done.clone();
            tokio::spawn(async move {
                let cancelled = loop {
                    tokio::select! {
                        _ = token.cancelled() => break true,
                        joined = set.join_next() => match joined {
                            Some(Err(e)) if e.is_panic() => {
                                tracing::error!(app = %app, "post-init task panicked");
                            }
                            Some(_) => {}
                            None => break false,
                        },
                    }
                };
                if cancelled {
                    set.shutdown().await;
                    for idx in table.cancel_running() {
                        let event = Event::now(EventKind::PostInitCancelled)
                            .with_app(Arc::clone(&app))
                            .with_service(services[idx].name_arc());
                        subs.emit(&event).await;
                    }
                }
                done.cancel();
            })
        };

        Self {
            token,
            done,
            driver,
        }
    }

    /// Token completing when every task has finished.
    pub(crate) fn done(&self) -> CancellationToken {
        self.done.clone()
    }

    /// Cancels the fan-out and waits until every task has unwound.
    pub(crate) async fn cancel(self) {
        self.token.cancel();
        if let Err(e) = self.driver.await {
            tracing::error!(error = %e, "post-init driver failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{Service, ServiceHandle};
    use async_trait::async_trait;

    struct Sleepy {
        secs: u64,
        fail: bool,
    }

    #[async_trait]
    impl Service for Sleepy {
        async fn post_init(&self, _ctx: &Context) -> Result<(), HookError> {
            time::sleep(Duration::from_secs(self.secs)).await;
            if self.fail {
                return Err(HookError::fail("post-init broke"));
            }
            Ok(())
        }
    }

    fn sleepy(name: &str, secs: u64, fail: bool) -> ServiceRef {
        Arc::new(ServiceHandle::new(name, Sleepy { secs, fail }))
    }

    fn statuses(table: &TaskTable) -> Vec<TaskStatus> {
        table.snapshot().into_iter().map(|t| t.status).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn shared_deadline_bounds_every_task() {
        let table = TaskTable::default();
        let fan = PostInit::spawn(
            Arc::from("app"),
            vec![sleepy("a", 1, false), sleepy("b", 2, true), sleepy("c", 10, false)],
            &Context::new("app", "test"),
            Some(Duration::from_secs(5)),
            SubscriberSet::default(),
            table.clone(),
        );
        fan.done().cancelled().await;

        assert_eq!(
            statuses(&table),
            [TaskStatus::Done, TaskStatus::Failed, TaskStatus::TimedOut]
        );
        fan.cancel().await;
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_waits_for_every_task() {
        let table = TaskTable::default();
        let fan = PostInit::spawn(
            Arc::from("app"),
            vec![sleepy("a", 1, false), sleepy("b", 100, false)],
            &Context::new("app", "test"),
            None,
            SubscriberSet::default(),
            table.clone(),
        );
        time::sleep(Duration::from_secs(2)).await;
        let done = fan.done();
        fan.cancel().await;

        assert!(done.is_cancelled());
        assert_eq!(statuses(&table), [TaskStatus::Done, TaskStatus::Cancelled]);
    }

    #[tokio::test(start_paused = true)]
    async fn unrepresentable_deadline_means_unbounded() {
        let table = TaskTable::default();
        let fan = PostInit::spawn(
            Arc::from("app"),
            vec![sleepy("a", 3, false)],
            &Context::new("app", "test"),
            Some(Duration::MAX),
            SubscriberSet::default(),
            table.clone(),
        );
        fan.done().cancelled().await;

        assert_eq!(statuses(&table), [TaskStatus::Done]);
        fan.cancel().await;
    }
}
