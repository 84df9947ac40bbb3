//! # Event subscribers for the appvisor runtime.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`] fan-out and the
//! built-in [`LogWriter`].
//!
//! ## Architecture
//! ```text
//! Event flow:
//!   Application / post-init task ── emit(&Event) ──► SubscriberSet
//!                                                        │
//!                                          ┌─────────────┼─────────────┐
//!                                          ▼             ▼             ▼
//!                                      LogWriter      Metrics        Custom
//!                                      (tracing)
//! ```
//!
//! ## Subscriber types
//! - **Passive subscribers** - observe and react to events (logging, metrics, alerts)
//! - **Recording subscribers** - keep events for later assertions (tests, audits)

mod log;
mod subscribe;
mod subscriber_set;

pub use log::LogWriter;
pub use subscribe::Subscribe;
pub use subscriber_set::SubscriberSet;

pub(crate) use subscriber_set::panic_message;
