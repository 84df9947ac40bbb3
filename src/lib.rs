//! # appvisor
//!
//! **Appvisor** is an in-process application supervisor for Rust.
//!
//! It wires together independently developed services, resolves their startup
//! dependencies into a safe order and drives their lifecycle (start, post-start work,
//! stop) under timeouts with a well-defined partial-failure policy.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │   Service    │   │   Service    │   │   Service    │
//!     │ (user impl)  │   │ (user impl)  │   │ (user impl)  │
//!     │ Dependency<T>│   │ Dependency<T>│   │              │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            ▼                  ▼                  ▼
//!     ┌───────────────────────────────────────────────────┐
//!     │  ApplicationBuilder / Loader (AppConfig)          │
//!     │  - Registry (unique names, registration order)    │
//!     │  - Resolver (bind slots, edges, Kahn sort)        │
//!     └────────────────────────┬──────────────────────────┘
//!                              ▼
//!     ┌───────────────────────────────────────────────────┐
//!     │  Application                                      │
//!     │  - StateMachine<ServiceState>                     │
//!     │  - start: timed, sequential, rollback on failure  │
//!     │  - post-init fan-out (shared deadline)            │
//!     │  - stop: reverse of started, failures contained   │
//!     └────────────────────────┬──────────────────────────┘
//!                              │ Event
//!                              ▼
//!                        SubscriberSet
//!                    ┌─────────┼─────────┐
//!                    ▼         ▼         ▼
//!                LogWriter   sub2      subN
//! ```
//!
//! ### Service lifecycle
//! ```text
//! CLOSED ──start──► STARTING ──init + health──► READY ──stop──► CLOSING ──close──► CLOSED
//!                       │
//!                       └── failure / timeout ──► close() once ──► CLOSED
//! ```
//!
//! ## Features
//! | Area              | Description                                                     | Key types / traits                        |
//! |-------------------|-----------------------------------------------------------------|-------------------------------------------|
//! | **Services**      | Lifecycle hooks and typed (or trait-object) dependency slots.   | [`Service`], [`Dependency`], [`Interfaces`] |
//! | **Orchestration** | Ordered start with rollback, post-init, reverse stop, inspect.  | [`Application`], [`ApplicationBuilder`]   |
//! | **Loading**       | Build an application from configuration.                        | [`Loader`], [`AppConfig`]                 |
//! | **State**         | Awaitable state register with scoped transitions.               | [`StateMachine`], [`Transition`]          |
//! | **Subscriber API**| Hook into lifecycle events (logging, metrics, tests).           | [`Subscribe`], [`LogWriter`]              |
//! | **Errors**        | Typed configuration, start and hook errors.                     | [`ConfigError`], [`StartError`]           |
//!
//! ## Example
//! ```rust
//! use appvisor::{AppConfig, Application, Context, Dependency, HookError, Service, ServiceState, Slot};
//! use async_trait::async_trait;
//!
//! struct Db;
//! impl Service for Db {}
//!
//! struct Users {
//!     db: Dependency<Db>,
//! }
//!
//! #[async_trait]
//! impl Service for Users {
//!     async fn init(&self, _ctx: &Context) -> Result<(), HookError> {
//!         self.db.require()?;
//!         Ok(())
//!     }
//!
//!     fn slots(&self) -> Vec<&dyn Slot> {
//!         vec![&self.db]
//!     }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let app = Application::builder(AppConfig::default())
//!         .service("users", Users { db: Dependency::new() })?
//!         .service("db", Db)?
//!         .build()?;
//!     assert_eq!(app.loading_order(), ["db", "users"]);
//!
//!     app.start().await?;
//!     assert_eq!(app.state(), ServiceState::Ready);
//!
//!     app.stop().await;
//!     assert_eq!(app.state(), ServiceState::Closed);
//!     Ok(())
//! }
//! ```
mod config;
mod core;
mod error;
mod events;
mod loader;
mod services;
mod state;
mod subscribers;

// ---- Public re-exports ----

pub use config::{AppConfig, ServiceConfig};
pub use core::{
    Application, ApplicationBuilder, Inspection, ServiceReport, TaskReport, TaskStatus,
};
pub use error::{ConfigError, HookError, StartError, StateError};
pub use events::{Event, EventKind};
pub use loader::Loader;
pub use services::{
    Capability, Context, Dependency, Health, Interfaces, Service, ServiceHandle, ServiceRef, Slot,
    Target,
};
pub use state::{ServiceState, StateMachine, StateSet, Transition};
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
