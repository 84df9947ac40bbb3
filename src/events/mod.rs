//! Runtime events: types only.
//!
//! This module groups the event **data model** emitted by the application runtime
//! and delivered to [`Subscribe`](crate::Subscribe) implementations through the
//! [`SubscriberSet`](crate::SubscriberSet).
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//!
//! ## Quick reference
//! - **Publishers**: `Application::start`/`stop` (app and service boundaries),
//!   the post-init fan-out (one event per service outcome).
//! - **Consumers**: the built-in [`LogWriter`](crate::LogWriter) and any user subscriber.

mod event;

pub use event::{Event, EventKind};
