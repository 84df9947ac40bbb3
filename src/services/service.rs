//! # Service abstraction.
//!
//! This module defines the [`Service`] trait: the lifecycle hooks an application calls
//! and the declarations (dependency slots, capabilities) the resolver reads.
//!
//! Every hook receives an explicit [`Context`] and may suspend. Hooks never change the
//! service state themselves; [`ServiceHandle`](crate::ServiceHandle) drives the state
//! machine around them.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::HookError;
use crate::services::{Capability, Context, Health, Interfaces, Slot};

/// # Lifecycle hooks of an application service.
///
/// All hooks have no-op defaults; `health` defaults to healthy.
///
/// # Example
/// ```
/// use appvisor::{Context, Dependency, HookError, Service, Slot};
/// use async_trait::async_trait;
///
/// struct Cache;
/// impl Service for Cache {}
///
/// struct Users {
///     cache: Dependency<Cache>,
/// }
///
/// #[async_trait]
/// impl Service for Users {
///     async fn init(&self, _ctx: &Context) -> Result<(), HookError> {
///         let _cache = self.cache.require()?;
///         Ok(())
///     }
///
///     fn slots(&self) -> Vec<&dyn Slot> {
///         vec![&self.cache]
///     }
/// }
/// ```
#[async_trait]
pub trait Service: Send + Sync + 'static {
    /// Acquires resources. Runs during application start, bounded by the per-service timeout.
    ///
    /// Dependencies that are not `nowait` are `READY` when this runs.
    async fn init(&self, _ctx: &Context) -> Result<(), HookError> {
        Ok(())
    }

    /// Additional work after the whole application is started.
    ///
    /// Runs concurrently with the other services' post-init under one aggregate
    /// deadline. The context is cancelled when the application stops.
    async fn post_init(&self, _ctx: &Context) -> Result<(), HookError> {
        Ok(())
    }

    /// Releases resources. Called once after a failed start, or on application stop.
    async fn close(&self, _ctx: &Context) -> Result<(), HookError> {
        Ok(())
    }

    /// Reports health. Called right after `init` and by inspection.
    async fn health(&self) -> Health {
        Health::healthy()
    }

    /// Dependency slots declared by this service.
    fn slots(&self) -> Vec<&dyn Slot> {
        Vec::new()
    }

    /// Tags other services can use to find this one.
    fn capabilities(&self) -> Vec<Capability> {
        vec![Capability::of::<Self>()]
    }

    /// Trait-object views other services can depend on, such as `Dependency<dyn Store>`.
    ///
    /// Called once when the service is registered. Each view added here is also a
    /// capability of the service.
    fn interfaces(self: Arc<Self>, _out: &mut Interfaces) {}

    /// Service information for inspection or logging.
    fn describe(&self) -> Value {
        Value::Object(Map::new())
    }
}
