//! # Services managed by an application.
//!
//! - [`Service`]: lifecycle hooks implemented by user code.
//! - [`ServiceHandle`]: a named service plus its [`ServiceState`](crate::ServiceState) register.
//! - [`Dependency`]: typed slot naming a sibling service, bound by the resolver.
//! - [`Interfaces`]: trait-object views a service exposes to dependency slots.
//! - [`Context`]: explicit per-call context handed to every hook.
//! - [`Health`]: report returned by the health check.

mod context;
mod dependency;
mod handle;
mod health;
mod interfaces;
mod service;

pub use context::Context;
pub use dependency::{Capability, Dependency, Slot, Target};
pub use handle::{ServiceHandle, ServiceRef};
pub use health::Health;
pub use interfaces::Interfaces;
pub use service::Service;
