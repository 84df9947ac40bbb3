//! # Dependency slots.
//!
//! A service declares the siblings it needs as [`Dependency<T>`] fields and exposes
//! them through [`Service::slots`](crate::Service::slots). The resolver binds every
//! slot once, before the first service starts, to a non-owning reference of the
//! matching sibling.
//!
//! ## Targets
//! - **Capability** (default): the first other service answering to the tag, in
//!   registration order. [`Dependency::new`] uses the tag of `T` itself.
//! - **Name**: the service registered under an explicit name.
//!
//! In both cases the service must be a `T`. `T` may be a trait object
//! (`Dependency<dyn Store>`): any service exposing that view through
//! [`Service::interfaces`](crate::Service::interfaces) fits, whatever its concrete type.
//!
//! ## Flags
//! - `required` (default): no match is a [`ConfigError::DependencyNotFound`](crate::ConfigError).
//! - `nowait`: the slot is bound but adds no start-order constraint; this is how a
//!   dependency cycle is broken by hand.
//!
//! ## Example
//! ```rust
//! use appvisor::{Dependency, Service, Slot};
//!
//! struct Cache;
//! impl Service for Cache {}
//!
//! struct Users {
//!     cache: Dependency<Cache>,
//!     audit: Dependency<Cache>,
//! }
//!
//! impl Service for Users {
//!     fn slots(&self) -> Vec<&dyn Slot> {
//!         vec![&self.cache, &self.audit]
//!     }
//! }
//!
//! let users = Users {
//!     cache: Dependency::new(),
//!     audit: Dependency::named("audit-cache").optional().nowait(),
//! };
//! assert!(users.cache.get().is_none()); // bound by the resolver
//! ```

use std::borrow::Cow;
use std::fmt;
use std::sync::{Arc, OnceLock, Weak};

use crate::error::HookError;
use crate::services::ServiceHandle;

/// Tag a service answers to when dependencies are resolved by capability.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Capability(Cow<'static, str>);

impl Capability {
    /// Tag of the concrete type `T`.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self(Cow::Borrowed(std::any::type_name::<T>()))
    }

    /// Custom tag.
    pub fn named(tag: impl Into<Cow<'static, str>>) -> Self {
        Self(tag.into())
    }

    /// Tag as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a slot asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// A service registered under this name.
    Name(String),
    /// Any other service answering to this capability.
    Capability(Capability),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Name(name) => f.write_str(name),
            Target::Capability(cap) => write!(f, "<{cap}>"),
        }
    }
}

/// Object-safe view of a dependency slot used by the resolver.
pub trait Slot: Send + Sync {
    /// Requested target.
    fn target(&self) -> &Target;

    /// A missing target is a configuration error.
    fn required(&self) -> bool;

    /// The slot adds no start-order constraint.
    fn nowait(&self) -> bool;

    /// Returns `true` if `candidate` has the type this slot can hold.
    fn accepts(&self, candidate: &ServiceHandle) -> bool;

    /// Binds the slot to `candidate`; returns `false` if the type does not fit or the
    /// slot was already bound.
    fn bind(&self, candidate: &ServiceHandle) -> bool;

    /// Name of the bound service, if bound.
    fn bound_to(&self) -> Option<&str>;
}

/// Typed dependency slot holding a non-owning reference to a sibling service.
pub struct Dependency<T: ?Sized + Send + Sync + 'static> {
    target: Target,
    required: bool,
    nowait: bool,
    bound: OnceLock<(Arc<str>, Weak<T>)>,
}

impl<T: ?Sized + Send + Sync + 'static> Dependency<T> {
    /// Required, ordered dependency on any other service of type `T`, or exposing `T`
    /// when `T` is a trait object.
    pub fn new() -> Self {
        Self::with_target(Target::Capability(Capability::of::<T>()))
    }

    /// Required, ordered dependency on the service registered as `name`.
    pub fn named(name: impl Into<String>) -> Self {
        Self::with_target(Target::Name(name.into()))
    }

    /// Required, ordered dependency on any other service answering to `capability`.
    pub fn with_capability(capability: Capability) -> Self {
        Self::with_target(Target::Capability(capability))
    }

    fn with_target(target: Target) -> Self {
        Self {
            target,
            required: true,
            nowait: false,
            bound: OnceLock::new(),
        }
    }

    /// Marks the dependency optional: an unresolved slot stays empty.
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Drops the start-order constraint while keeping the binding.
    #[must_use]
    pub fn nowait(mut self) -> Self {
        self.nowait = true;
        self
    }

    /// Returns the bound service, if bound and still alive.
    pub fn get(&self) -> Option<Arc<T>> {
        self.bound.get().and_then(|(_, weak)| weak.upgrade())
    }

    /// Like [`get`](Self::get) but fails with a [`HookError`] suitable for `?` in hooks.
    pub fn require(&self) -> Result<Arc<T>, HookError> {
        self.get()
            .ok_or_else(|| HookError::fail(format!("dependency `{}` is not available", self.target)))
    }

    /// Name of the bound service, if bound.
    pub fn name(&self) -> Option<&str> {
        self.bound.get().map(|(name, _)| name.as_ref())
    }
}

impl<T: ?Sized + Send + Sync + 'static> Default for Dependency<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized + Send + Sync + 'static> fmt::Debug for Dependency<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dependency")
            .field("target", &self.target)
            .field("required", &self.required)
            .field("nowait", &self.nowait)
            .field("bound", &self.name())
            .finish()
    }
}

impl<T: ?Sized + Send + Sync + 'static> Slot for Dependency<T> {
    fn target(&self) -> &Target {
        &self.target
    }

    fn required(&self) -> bool {
        self.required
    }

    fn nowait(&self) -> bool {
        self.nowait
    }

    fn accepts(&self, candidate: &ServiceHandle) -> bool {
        candidate.is::<T>()
    }

    fn bind(&self, candidate: &ServiceHandle) -> bool {
        match candidate.downcast::<T>() {
            Some(service) => self
                .bound
                .set((Arc::from(candidate.name()), Arc::downgrade(&service)))
                .is_ok(),
            None => false,
        }
    }

    fn bound_to(&self) -> Option<&str> {
        self.name()
    }
}
