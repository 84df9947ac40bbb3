//! # Application: orchestrated lifecycle of resolved services.
//!
//! [`Application`] owns the services in their resolved loading order and drives them
//! through start and stop.
//!
//! ## Start
//! ```text
//! CLOSED ─► STARTING ─► for s in loading order:
//!                          start(s) within service_timeout
//!                          ├─ ok                 ─► record as started
//!                          ├─ fail, optional     ─► emit, keep going
//!                          └─ fail, required     ─► rollback (stop started, reverse) ─► Err
//!                     ─► spawn post-init fan-out (shared deadline)
//!                     ─► READY
//! ```
//!
//! ## Stop
//! ```text
//! READY ─► CLOSING ─► cancel post-init, wait for it
//!                  ─► for s in started.rev(): stop(s) within service_timeout (failures contained)
//!                  ─► CLOSED
//! ```
//!
//! ## Rules
//! - Only services that actually started are ever stopped, each exactly once.
//! - Start and stop are serialized; an application starts at most once.
//! - Stop never fails and always ends `CLOSED`.
//! - Post-init failures never affect the application state.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use crate::config::AppConfig;
use crate::core::builder::ApplicationBuilder;
use crate::core::post_init::{PostInit, TaskReport, TaskTable};
use crate::core::runner::{self, StartOutcome};
use crate::core::shutdown;
use crate::error::StartError;
use crate::events::{Event, EventKind};
use crate::services::{Context, Health, ServiceRef};
use crate::state::{ServiceState, StateMachine};
use crate::subscribers::SubscriberSet;

/// Mutable lifecycle data, guarded by the lifecycle lock.
#[derive(Default)]
struct Lifecycle {
    started: Vec<ServiceRef>,
    post_init: Option<PostInit>,
}

/// An application: resolved services plus their orchestrated lifecycle.
///
/// Built with [`Application::builder`] or the [`Loader`](crate::Loader).
pub struct Application {
    name: Arc<str>,
    env: Arc<str>,
    debug: bool,
    show_inspection_on_start: bool,
    metadata: Map<String, Value>,
    service_timeout: Option<Duration>,
    post_init_timeout: Option<Duration>,
    optional: HashSet<String>,

    order: Vec<ServiceRef>,
    index: HashMap<Arc<str>, usize>,
    state: StateMachine<ServiceState>,
    ctx: Context,
    subs: SubscriberSet,
    tasks: TaskTable,
    lifecycle: Mutex<Lifecycle>,
    used: AtomicBool,
}

impl Application {
    /// Starts building an application from `cfg`.
    pub fn builder(cfg: AppConfig) -> ApplicationBuilder {
        ApplicationBuilder::new(cfg)
    }

    pub(crate) fn from_parts(cfg: AppConfig, order: Vec<ServiceRef>, subs: SubscriberSet) -> Self {
        let index = order
            .iter()
            .enumerate()
            .map(|(i, s)| (s.name_arc(), i))
            .collect();
        let service_timeout = cfg.service_limit();
        let post_init_timeout = cfg.post_init_limit();
        let name: Arc<str> = Arc::from(cfg.name);
        let env: Arc<str> = Arc::from(cfg.env);
        Self {
            ctx: Context::new(Arc::clone(&name), Arc::clone(&env)),
            name,
            env,
            debug: cfg.debug,
            show_inspection_on_start: cfg.show_inspection_on_start,
            metadata: cfg.metadata,
            service_timeout,
            post_init_timeout,
            optional: cfg.optional_services.into_iter().collect(),
            order,
            index,
            state: StateMachine::new(ServiceState::Closed),
            subs,
            tasks: TaskTable::default(),
            lifecycle: Mutex::new(Lifecycle::default()),
            used: AtomicBool::new(false),
        }
    }

    /// Application name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Environment name.
    pub fn env(&self) -> &str {
        &self.env
    }

    /// Current application state.
    pub fn state(&self) -> ServiceState {
        self.state.get()
    }

    /// Root context handed (scoped per service) to every hook.
    ///
    /// Cancelling its token cancels post-init work and makes [`run`](Self::run) stop.
    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Service registered as `name`.
    pub fn service(&self, name: &str) -> Option<&ServiceRef> {
        self.index.get(name).map(|&i| &self.order[i])
    }

    /// Services in loading order.
    pub fn services(&self) -> &[ServiceRef] {
        &self.order
    }

    /// Service names in loading order.
    pub fn loading_order(&self) -> Vec<&str> {
        self.order.iter().map(|s| s.name()).collect()
    }

    /// Returns `true` if `name` may fail to start without failing the application.
    pub fn is_optional(&self, name: &str) -> bool {
        self.optional.contains(name)
    }

    /// Suspends until the application reaches `state`.
    pub async fn wait(&self, state: ServiceState) {
        // Every ServiceState value is registered with the machine.
        let _ = self.state.wait(state).await;
    }

    /// Suspends until every post-init task has finished.
    ///
    /// Returns immediately when no post-init work is in flight.
    pub async fn wait_post_init(&self) {
        let done = {
            let life = self.lifecycle.lock().await;
            life.post_init.as_ref().map(PostInit::done)
        };
        if let Some(done) = done {
            done.cancelled().await;
        }
    }

    /// Starts every service in loading order, then spawns post-init work.
    ///
    /// A required service failing (error, unhealthy, panic or timeout) stops the
    /// services started before it in reverse order, then the error is returned.
    /// An application can only be started once.
    pub async fn start(&self) -> Result<(), StartError> {
        let mut life = self.lifecycle.lock().await;
        if self.used.swap(true, Ordering::SeqCst) {
            return Err(StartError::Reused {
                app: self.name.to_string(),
            });
        }

        let step = self.state.transition();
        // Every ServiceState value is registered with the machine.
        let _ = step.set(ServiceState::Starting);
        self.emit(EventKind::AppStarting).await;
        if self.debug {
            tracing::warn!(app = %self.name, "running in debug mode");
        }

        for service in &self.order {
            let optional = self.is_optional(service.name());
            let ctx = self.ctx.for_service(service.name_arc());
            let outcome = runner::start_service(
                &self.name,
                service,
                &ctx,
                self.service_timeout,
                optional,
                &self.subs,
            )
            .await;

            let err = match outcome {
                StartOutcome::Started => {
                    life.started.push(Arc::clone(service));
                    continue;
                }
                _ if optional => continue,
                StartOutcome::Failed(err) => err,
                StartOutcome::TimedOut(timeout) => StartError::ServiceInitTimeout {
                    service: service.name().to_string(),
                    timeout,
                },
            };

            self.subs.emit(
                &Event::now(EventKind::Rollback)
                    .with_app(Arc::clone(&self.name))
                    .with_service(service.name_arc())
                    .with_error(err.as_message()),
            )
            .await;
            self.teardown(&mut life).await;
            return Err(err);
        }

        life.post_init = Some(PostInit::spawn(
            Arc::clone(&self.name),
            life.started.clone(),
            &self.ctx,
            self.post_init_timeout,
            self.subs.clone(),
            self.tasks.clone(),
        ));
        let _ = step.set(ServiceState::Ready);
        step.commit();
        self.emit(EventKind::AppStarted).await;
        drop(life);

        if self.show_inspection_on_start || self.debug {
            let inspection = self.inspect(&[]).await;
            match serde_json::to_string(&inspection) {
                Ok(doc) => tracing::info!(app = %self.name, inspection = %doc, "inspection data"),
                Err(e) => tracing::warn!(app = %self.name, error = %e, "inspection not serializable"),
            }
        }
        Ok(())
    }

    /// Cancels post-init work and stops the started services in reverse order.
    ///
    /// Stop failures and timeouts are emitted, never returned. Always ends `CLOSED`.
    pub async fn stop(&self) {
        let mut life = self.lifecycle.lock().await;
        if self.state.is(ServiceState::Closed) && life.started.is_empty() && life.post_init.is_none() {
            return;
        }

        let step = self.state.transition();
        let _ = step.set(ServiceState::Closing);
        self.emit(EventKind::AppStopping).await;

        self.teardown(&mut life).await;

        let _ = step.set(ServiceState::Closed);
        step.commit();
        self.emit(EventKind::AppStopped).await;
    }

    /// Starts the application, waits for a termination signal, then stops it.
    ///
    /// Cancelling the [`context`](Self::context) token also ends the wait.
    pub async fn run(&self) -> Result<(), StartError> {
        self.start().await?;
        tokio::select! {
            res = shutdown::wait_for_shutdown_signal() => {
                if let Err(e) = res {
                    tracing::error!(app = %self.name, error = %e, "cannot listen for termination signals");
                } else {
                    tracing::info!(app = %self.name, "termination signal received");
                }
            }
            _ = self.ctx.cancelled() => {}
        }
        self.stop().await;
        Ok(())
    }

    /// Reports services, post-init tasks and health.
    ///
    /// Health is collected only for services named in `filter` (all when empty);
    /// overall health is the conjunction of the collected reports. Read-only.
    pub async fn inspect(&self, filter: &[&str]) -> Inspection {
        let mut healthy = true;
        let mut services = Vec::with_capacity(self.order.len());
        for service in &self.order {
            let health = if filter.is_empty() || filter.iter().any(|f| *f == service.name()) {
                let health = service.health().await;
                healthy &= health.healthy;
                Some(health)
            } else {
                None
            };
            services.push(ServiceReport {
                name: service.name().to_string(),
                state: service.state(),
                info: service.describe(),
                health,
            });
        }

        Inspection {
            name: self.name.to_string(),
            env: self.env.to_string(),
            debug: self.debug,
            state: self.state(),
            metadata: self.metadata.clone(),
            services,
            tasks: self.tasks.snapshot(),
            health: Health {
                healthy,
                ..Health::default()
            },
        }
    }

    /// Cancels post-init work, then stops every started service in reverse order.
    async fn teardown(&self, life: &mut Lifecycle) {
        if let Some(post_init) = life.post_init.take() {
            post_init.cancel().await;
        }
        while let Some(service) = life.started.pop() {
            let ctx = self.ctx.for_service(service.name_arc());
            runner::stop_service(&self.name, &service, &ctx, self.service_timeout, &self.subs).await;
        }
    }

    async fn emit(&self, kind: EventKind) {
        self.subs.emit(&Event::now(kind).with_app(Arc::clone(&self.name))).await;
    }
}

impl std::fmt::Debug for Application {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Application")
            .field("name", &self.name)
            .field("env", &self.env)
            .field("state", &self.state.get())
            .field("loading_order", &self.loading_order())
            .finish()
    }
}

/// Inspection document returned by [`Application::inspect`].
#[derive(Debug, Clone, Serialize)]
pub struct Inspection {
    /// Application name.
    pub name: String,
    /// Environment name.
    pub env: String,
    /// Debug mode.
    pub debug: bool,
    /// Application state.
    pub state: ServiceState,
    /// Application metadata from the configuration.
    pub metadata: Map<String, Value>,
    /// Services in loading order.
    pub services: Vec<ServiceReport>,
    /// Post-init tasks of the last start.
    pub tasks: Vec<TaskReport>,
    /// Conjunction of the collected service health reports.
    pub health: Health,
}

/// Service entry of an [`Inspection`].
#[derive(Debug, Clone, Serialize)]
pub struct ServiceReport {
    /// Service name.
    pub name: String,
    /// Service state.
    pub state: ServiceState,
    /// Output of [`Service::describe`](crate::Service::describe).
    pub info: Value,
    /// Health report, if collected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health: Option<Health>,
}
