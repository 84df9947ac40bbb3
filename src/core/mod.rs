//! Runtime core: dependency resolution and orchestration.
//!
//! The public API of this module is [`Application`] and its [`ApplicationBuilder`].
//!
//! Internal modules:
//! - [`registry`]: registered services by name, in registration order;
//! - [`resolver`]: slot binding and loading order;
//! - [`runner`]: one timed service start/stop with event publishing;
//! - [`post_init`]: the cancellable post-init fan-out;
//! - [`application`]: start with rollback, reverse stop, inspection;
//! - [`shutdown`]: termination signal handling for `run`.

mod application;
mod builder;
mod post_init;
mod registry;
mod resolver;
mod runner;
mod shutdown;

pub use application::{Application, Inspection, ServiceReport};
pub use builder::ApplicationBuilder;
pub use post_init::{TaskReport, TaskStatus};
