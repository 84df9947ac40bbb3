//! # Registered service with its lifecycle state.
//!
//! [`ServiceHandle`] pairs a [`Service`] implementation with its name and a
//! [`StateMachine<ServiceState>`]. It is the only place that moves a service between
//! states:
//!
//! ```text
//! start:  CLOSED ──► STARTING ──init──► health ──► READY
//!                        │                 │
//!                        └── failure ──────┴──► close() once ──► CLOSED
//!
//! stop:   READY ──► CLOSING ──close──► CLOSED   (CLOSED even when close fails)
//! ```
//!
//! Both paths run inside a scoped [`Transition`](crate::Transition): a `start` or
//! `stop` future dropped half-way (for example by a timeout) puts the state back to
//! where it was, so a service is never left `STARTING` or `CLOSING`.
//!
//! Hook panics are caught and reported as [`HookError::Panicked`].

use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde_json::Value;

use crate::error::{HookError, StartError};
use crate::services::{Capability, Context, Health, Interfaces, Service, Slot};
use crate::state::{ServiceState, StateMachine};
use crate::subscribers::panic_message;

/// Shared handle to a registered service.
pub type ServiceRef = Arc<ServiceHandle>;

/// A named service instance and its lifecycle state.
///
/// The state can be read and awaited, but only [`start`](Self::start) and
/// [`stop`](Self::stop) change it:
///
/// ```compile_fail
/// use appvisor::{Service, ServiceHandle, ServiceState};
///
/// struct Noop;
/// impl Service for Noop {}
///
/// let handle = ServiceHandle::new("noop", Noop);
/// handle.state_machine().set(ServiceState::Closed);
/// ```
pub struct ServiceHandle {
    name: Arc<str>,
    state: StateMachine<ServiceState>,
    service: Arc<dyn Service>,
    interfaces: Interfaces,
    capabilities: Vec<Capability>,
}

impl ServiceHandle {
    /// Wraps `service` under `name`, in state `CLOSED`.
    pub fn new<S: Service>(name: impl Into<Arc<str>>, service: S) -> Self {
        Self::from_arc(name, Arc::new(service))
    }

    /// Like [`new`](Self::new) for a service that is already shared.
    pub fn from_arc<S: Service>(name: impl Into<Arc<str>>, service: Arc<S>) -> Self {
        let mut interfaces = Interfaces::default();
        interfaces.insert(Arc::clone(&service));
        Arc::clone(&service).interfaces(&mut interfaces);

        let mut capabilities = service.capabilities();
        for tag in interfaces.tags() {
            if !capabilities.contains(tag) {
                capabilities.push(tag.clone());
            }
        }
        Self {
            name: name.into(),
            state: StateMachine::new(ServiceState::Closed),
            service,
            interfaces,
            capabilities,
        }
    }

    /// Registered name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn name_arc(&self) -> Arc<str> {
        Arc::clone(&self.name)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ServiceState {
        self.state.get()
    }

    /// Tags this service answers to.
    pub fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    /// Returns `true` if the service answers to `capability`.
    pub fn answers_to(&self, capability: &Capability) -> bool {
        self.capabilities.contains(capability)
    }

    /// Returns `true` if the service is a `T` or exposes a `T` view.
    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.interfaces.contains::<T>()
    }

    /// Returns the service as a `T`: its concrete type or an exposed interface.
    pub fn downcast<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.interfaces.get::<T>()
    }

    /// Wrapped service as a trait object.
    pub fn service(&self) -> &Arc<dyn Service> {
        &self.service
    }

    /// Dependency slots declared by the service.
    pub fn slots(&self) -> Vec<&dyn Slot> {
        self.service.slots()
    }

    /// Service description for inspection.
    pub fn describe(&self) -> Value {
        self.service.describe()
    }

    /// Runs `init` and the health check, moving `CLOSED → STARTING → READY`.
    ///
    /// On any failure `close` runs exactly once and the state ends `CLOSED`.
    /// Starting a service that is not `CLOSED` fails without touching it.
    pub async fn start(&self, ctx: &Context) -> Result<(), StartError> {
        let step = self.state.transition();
        let from = step.fallback();
        if from != ServiceState::Closed {
            return Err(self.init_failed(format!("service is {from}, expected CLOSED"), Vec::new(), None));
        }
        if let Err(e) = step.set(ServiceState::Starting) {
            return Err(self.init_failed(e.to_string(), Vec::new(), None));
        }
        tracing::debug!(service = %self.name, "starting service");

        if let Err(err) = contain(self.service.init(ctx)).await {
            let mut notes = Vec::new();
            self.close_after_failure(ctx, &mut notes).await;
            return Err(self.init_failed("init failed", notes, Some(err)));
        }

        let health = self.health().await;
        if !health.healthy {
            let mut notes = health.errors;
            self.close_after_failure(ctx, &mut notes).await;
            return Err(self.init_failed("service is not healthy", notes, None));
        }

        if let Err(e) = step.set(ServiceState::Ready) {
            return Err(self.init_failed(e.to_string(), Vec::new(), None));
        }
        step.commit();
        tracing::debug!(service = %self.name, "service ready");
        Ok(())
    }

    /// Runs `close`, moving `READY → CLOSING → CLOSED`.
    ///
    /// A `CLOSED` service is left alone. The state ends `CLOSED` even when `close`
    /// fails; the hook error is returned.
    pub async fn stop(&self, ctx: &Context) -> Result<(), HookError> {
        let step = self.state.transition();
        match step.fallback() {
            ServiceState::Closed => {
                step.commit();
                return Ok(());
            }
            ServiceState::Ready => {}
            other => return Err(HookError::fail(format!("service is {other}, expected READY"))),
        }
        step.set(ServiceState::Closing).map_err(HookError::fail)?;
        tracing::debug!(service = %self.name, "stopping service");

        let res = contain(self.service.close(ctx)).await;

        step.set(ServiceState::Closed).map_err(HookError::fail)?;
        step.commit();
        match &res {
            Ok(()) => tracing::debug!(service = %self.name, "service closed"),
            Err(e) => tracing::debug!(service = %self.name, error = %e, "service closed with error"),
        }
        res
    }

    /// Runs `post_init` with panics contained.
    pub async fn post_init(&self, ctx: &Context) -> Result<(), HookError> {
        contain(self.service.post_init(ctx)).await
    }

    /// Runs the health check; a panicking check reports unhealthy.
    pub async fn health(&self) -> Health {
        match AssertUnwindSafe(self.service.health()).catch_unwind().await {
            Ok(health) => health,
            Err(panic) => Health::unhealthy([format!(
                "health check panicked: {}",
                panic_message(panic.as_ref())
            )]),
        }
    }

    /// Suspends until the service reaches `target`.
    pub async fn wait(&self, target: ServiceState) {
        // Every ServiceState value is registered with the machine.
        let _ = self.state.wait(target).await;
    }

    /// Suspends until the service is `READY`.
    pub async fn wait_ready(&self) {
        self.wait(ServiceState::Ready).await;
    }

    async fn close_after_failure(&self, ctx: &Context, notes: &mut Vec<String>) {
        if let Err(e) = contain(self.service.close(ctx)).await {
            tracing::warn!(service = %self.name, error = %e, "close after failed start");
            notes.push(format!("close failed: {e}"));
        }
    }

    fn init_failed(
        &self,
        reason: impl Into<String>,
        notes: Vec<String>,
        source: Option<HookError>,
    ) -> StartError {
        StartError::ServiceInitFailed {
            service: self.name.to_string(),
            reason: reason.into(),
            notes,
            source,
        }
    }
}

impl fmt::Debug for ServiceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceHandle")
            .field("name", &self.name)
            .field("state", &self.state.get())
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

async fn contain<F>(fut: F) -> Result<(), HookError>
where
    F: Future<Output = Result<(), HookError>>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(res) => res,
        Err(panic) => Err(HookError::Panicked {
            info: panic_message(panic.as_ref()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Stub {
        fail_init: bool,
        panic_init: bool,
        unhealthy: bool,
        fail_close: bool,
        closes: AtomicUsize,
    }

    #[async_trait]
    impl Service for Stub {
        async fn init(&self, _ctx: &Context) -> Result<(), HookError> {
            if self.panic_init {
                panic!("boom");
            }
            if self.fail_init {
                return Err(HookError::fail("no connection"));
            }
            Ok(())
        }

        async fn close(&self, _ctx: &Context) -> Result<(), HookError> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            if self.fail_close {
                return Err(HookError::fail("close failed"));
            }
            Ok(())
        }

        async fn health(&self) -> Health {
            if self.unhealthy {
                Health::unhealthy(["pool empty"])
            } else {
                Health::healthy()
            }
        }
    }

    fn ctx() -> Context {
        Context::new("app", "test")
    }

    #[tokio::test]
    async fn start_then_stop() {
        let h = ServiceHandle::new("stub", Stub::default());
        assert_eq!(h.state(), ServiceState::Closed);

        h.start(&ctx()).await.unwrap();
        assert_eq!(h.state(), ServiceState::Ready);

        h.stop(&ctx()).await.unwrap();
        assert_eq!(h.state(), ServiceState::Closed);

        let stub = h.downcast::<Stub>().unwrap();
        assert_eq!(stub.closes.load(Ordering::SeqCst), 1);

        // second stop is a no-op
        h.stop(&ctx()).await.unwrap();
        assert_eq!(stub.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unhealthy_start_closes_once() {
        let h = ServiceHandle::new(
            "stub",
            Stub {
                unhealthy: true,
                ..Stub::default()
            },
        );
        let err = h.start(&ctx()).await.unwrap_err();
        match err {
            StartError::ServiceInitFailed { service, notes, .. } => {
                assert_eq!(service, "stub");
                assert_eq!(notes, vec!["pool empty".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(h.state(), ServiceState::Closed);
        assert_eq!(h.downcast::<Stub>().unwrap().closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failing_init_ends_closed() {
        let h = ServiceHandle::new(
            "stub",
            Stub {
                fail_init: true,
                fail_close: true,
                ..Stub::default()
            },
        );
        let err = h.start(&ctx()).await.unwrap_err();
        match err {
            StartError::ServiceInitFailed { source, notes, .. } => {
                assert_eq!(source, Some(HookError::fail("no connection")));
                assert_eq!(notes, vec!["close failed: close failed".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(h.state(), ServiceState::Closed);
        assert_eq!(h.downcast::<Stub>().unwrap().closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn panicking_init_is_contained() {
        let h = ServiceHandle::new(
            "stub",
            Stub {
                panic_init: true,
                ..Stub::default()
            },
        );
        let err = h.start(&ctx()).await.unwrap_err();
        match err {
            StartError::ServiceInitFailed {
                source: Some(HookError::Panicked { info }),
                ..
            } => assert_eq!(info, "boom"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(h.state(), ServiceState::Closed);
    }

    #[tokio::test]
    async fn failing_close_still_ends_closed() {
        let h = ServiceHandle::new(
            "stub",
            Stub {
                fail_close: true,
                ..Stub::default()
            },
        );
        h.start(&ctx()).await.unwrap();
        assert!(h.stop(&ctx()).await.is_err());
        assert_eq!(h.state(), ServiceState::Closed);
    }

    #[tokio::test]
    async fn start_requires_closed() {
        let h = ServiceHandle::new("stub", Stub::default());
        h.start(&ctx()).await.unwrap();
        assert!(h.start(&ctx()).await.is_err());
        assert_eq!(h.state(), ServiceState::Ready);
    }
}
