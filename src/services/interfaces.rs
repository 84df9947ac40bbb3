//! # Interfaces a service can be bound as.
//!
//! A [`Dependency<T>`](crate::Dependency) holds an `Arc<T>`. For a concrete `T` that is
//! the service itself; for a trait object such as `Dependency<dyn Store>` the service
//! has to expose that view through [`Service::interfaces`](crate::Service::interfaces).
//!
//! Every exposed interface also becomes a capability tag of the service, so
//! `Dependency::<dyn Store>::new()` finds any service exposing `dyn Store`.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use appvisor::{Dependency, Interfaces, Service, ServiceHandle};
//!
//! trait Store: Send + Sync {
//!     fn get(&self, key: &str) -> Option<String>;
//! }
//!
//! struct Memory;
//!
//! impl Store for Memory {
//!     fn get(&self, _key: &str) -> Option<String> {
//!         None
//!     }
//! }
//!
//! impl Service for Memory {
//!     fn interfaces(self: Arc<Self>, out: &mut Interfaces) {
//!         out.add::<dyn Store>(self);
//!     }
//! }
//!
//! let handle = ServiceHandle::new("memory", Memory);
//! assert!(handle.is::<dyn Store>());
//! assert!(handle.downcast::<dyn Store>().is_some());
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::services::Capability;

/// Views of one service instance, keyed by the viewed type.
#[derive(Default)]
pub struct Interfaces {
    views: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
    tags: Vec<Capability>,
}

impl Interfaces {
    /// Exposes `value` as a `T` and tags the service with [`Capability::of::<T>`].
    ///
    /// Usually called with `self` coerced to a trait object:
    /// `out.add::<dyn Store>(self)`.
    pub fn add<T>(&mut self, value: Arc<T>) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.insert(value);
        let tag = Capability::of::<T>();
        if !self.tags.contains(&tag) {
            self.tags.push(tag);
        }
        self
    }

    /// Records the view without adding a capability tag.
    pub(crate) fn insert<T>(&mut self, value: Arc<T>)
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.views.insert(TypeId::of::<T>(), Box::new(value));
    }

    /// Returns `true` if a `T` view is exposed.
    pub fn contains<T: ?Sized + 'static>(&self) -> bool {
        self.views.contains_key(&TypeId::of::<T>())
    }

    /// Returns the `T` view, if exposed.
    pub fn get<T>(&self) -> Option<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.views
            .get(&TypeId::of::<T>())
            .and_then(|view| view.downcast_ref::<Arc<T>>())
            .cloned()
    }

    pub(crate) fn tags(&self) -> &[Capability] {
        &self.tags
    }
}

impl fmt::Debug for Interfaces {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interfaces")
            .field("views", &self.views.len())
            .field("tags", &self.tags)
            .finish()
    }
}
