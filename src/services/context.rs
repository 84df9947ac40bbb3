//! # Explicit call context passed to every service hook.
//!
//! A [`Context`] is threaded as an ordinary parameter through `init`, `post_init` and
//! `close`. It carries the owning application's identity, the service name, a
//! [`CancellationToken`] and an immutable map of request-scoped values.
//!
//! Values are never stored in process-wide state: [`Context::with_var`] returns a new
//! context and leaves the original untouched.
//!
//! ## Example
//! ```rust
//! use appvisor::Context;
//! use serde_json::json;
//!
//! let ctx = Context::new("shop", "dev");
//! let scoped = ctx.with_var("request_id", json!("r-42"));
//!
//! assert_eq!(scoped.var("request_id"), Some(&json!("r-42")));
//! assert!(ctx.var("request_id").is_none());
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// Per-call context for service hooks.
#[derive(Clone, Debug)]
pub struct Context {
    app: Arc<str>,
    env: Arc<str>,
    service: Option<Arc<str>>,
    token: CancellationToken,
    vars: Arc<BTreeMap<String, Value>>,
}

impl Context {
    /// Creates a root context for application `app` running in environment `env`.
    pub fn new(app: impl Into<Arc<str>>, env: impl Into<Arc<str>>) -> Self {
        Self {
            app: app.into(),
            env: env.into(),
            service: None,
            token: CancellationToken::new(),
            vars: Arc::new(BTreeMap::new()),
        }
    }

    /// Application name.
    pub fn app(&self) -> &str {
        &self.app
    }

    /// Application environment (`prod`, `dev`, `test`, ...).
    pub fn env(&self) -> &str {
        &self.env
    }

    /// Name of the service the hook belongs to, if any.
    pub fn service(&self) -> Option<&str> {
        self.service.as_deref()
    }

    /// Cancellation token of this call.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Returns `true` once the call has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Completes when the call is cancelled.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }

    /// Looks up a request-scoped value.
    pub fn var(&self, key: &str) -> Option<&Value> {
        self.vars.get(key)
    }

    /// Returns a copy of this context with `key` set to `value`.
    #[must_use]
    pub fn with_var(&self, key: impl Into<String>, value: Value) -> Self {
        let mut vars = (*self.vars).clone();
        vars.insert(key.into(), value);
        Self {
            vars: Arc::new(vars),
            ..self.clone()
        }
    }

    /// Returns a copy of this context scoped to `service`.
    #[must_use]
    pub fn for_service(&self, service: impl Into<Arc<str>>) -> Self {
        Self {
            service: Some(service.into()),
            ..self.clone()
        }
    }

    /// Returns a copy driven by `token` instead of this context's token.
    #[must_use]
    pub(crate) fn with_token(&self, token: CancellationToken) -> Self {
        Self {
            token,
            ..self.clone()
        }
    }
}
