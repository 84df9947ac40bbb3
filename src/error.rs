//! Error types used by the appvisor runtime and services.
//!
//! This module defines the error enums surfaced by the crate:
//!
//! - [`ConfigError`]: dependency graph and loader errors, raised before any service starts.
//! - [`StartError`]: a required service could not be started (after rollback).
//! - [`HookError`]: returned by individual service hooks (`init`, `post_init`, `close`).
//! - [`StateError`]: misuse of a [`StateMachine`](crate::StateMachine) value set.
//!
//! All types provide helper methods (`as_label`, `as_message`) for logging/metrics.

use std::time::Duration;
use thiserror::Error;

/// # Configuration errors.
///
/// Raised synchronously while the service graph is built. They are never retried:
/// the fix is always a change to the service declarations or the config.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required dependency slot has no matching service.
    #[error("dependency `{dependency}` not found for service `{service}`")]
    DependencyNotFound {
        /// Service declaring the slot.
        service: String,
        /// Requested service name or capability tag.
        dependency: String,
    },

    /// Services require each other (directly or transitively) without a `nowait` slot.
    #[error("dependency cycle detected in services: {services:?}")]
    DependencyCycle {
        /// Members of the detected cycle, in dependency order.
        services: Vec<String>,
    },

    /// Two services were registered under the same name.
    #[error("two services with the same name exist: `{name}`")]
    ServiceNameConflict {
        /// The conflicting name.
        name: String,
    },

    /// The loader has no factory registered for a configured class.
    #[error("service class not found: `{class}`")]
    UnknownServiceClass {
        /// The class name from the config.
        class: String,
    },

    /// A factory rejected the configured settings.
    #[error("invalid settings for service `{service}`: {reason}")]
    InvalidSettings {
        /// Name of the service being constructed.
        service: String,
        /// Factory error message.
        reason: String,
    },
}

impl ConfigError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use appvisor::ConfigError;
    ///
    /// let err = ConfigError::ServiceNameConflict { name: "cache".into() };
    /// assert_eq!(err.as_label(), "service_name_conflict");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ConfigError::DependencyNotFound { .. } => "dependency_not_found",
            ConfigError::DependencyCycle { .. } => "dependency_cycle",
            ConfigError::ServiceNameConflict { .. } => "service_name_conflict",
            ConfigError::UnknownServiceClass { .. } => "unknown_service_class",
            ConfigError::InvalidSettings { .. } => "invalid_settings",
        }
    }

    /// Returns a human-readable message with a hint on how to fix the configuration.
    pub fn as_message(&self) -> String {
        match self {
            ConfigError::DependencyNotFound {
                service,
                dependency,
            } => format!(
                "dependency failed for service `{service}`; \
                 fix: check that a service `{dependency}` is present in the config"
            ),
            ConfigError::DependencyCycle { services } => format!(
                "dependency cycle detected in services: {services:?}; \
                 fix: mark one of the dependency slots in the cycle as `nowait`"
            ),
            ConfigError::ServiceNameConflict { name } => format!(
                "two services with the same name exist: `{name}`; \
                 fix: rename one of the services or allow name overrides in the loader"
            ),
            ConfigError::UnknownServiceClass { class } => format!(
                "service class not found: `{class}`; \
                 fix: register a factory for this class in the loader"
            ),
            ConfigError::InvalidSettings { service, reason } => format!(
                "invalid configuration for service `{service}`: {reason}; \
                 fix: check the service settings in the config"
            ),
        }
    }
}

/// # Errors produced while starting an application.
///
/// Returned by [`Application::start`](crate::Application::start) after every service
/// that had already started has been stopped again (rollback).
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum StartError {
    /// A required service failed in `init`, failed its health check, or panicked.
    #[error("service `{service}` failed on start: {reason}")]
    ServiceInitFailed {
        /// Failed service name.
        service: String,
        /// Short description of the failure.
        reason: String,
        /// Extra diagnostics (health-check error strings).
        notes: Vec<String>,
        /// Underlying hook error, if the failure came from a hook.
        #[source]
        source: Option<HookError>,
    },

    /// A required service did not finish starting within the per-service timeout.
    #[error("service `{service}` took too long to start (timeout {timeout:?})")]
    ServiceInitTimeout {
        /// Slow service name.
        service: String,
        /// The configured per-service timeout.
        timeout: Duration,
    },

    /// The application has already been started once; services are not reusable.
    #[error("application `{app}` was already started")]
    Reused {
        /// Application name.
        app: String,
    },
}

impl StartError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use appvisor::StartError;
    /// use std::time::Duration;
    ///
    /// let err = StartError::ServiceInitTimeout { service: "db".into(), timeout: Duration::from_secs(1) };
    /// assert_eq!(err.as_label(), "service_init_timeout");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            StartError::ServiceInitFailed { .. } => "service_init_failed",
            StartError::ServiceInitTimeout { .. } => "service_init_timeout",
            StartError::Reused { .. } => "application_reused",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            StartError::ServiceInitFailed {
                service,
                reason,
                notes,
                ..
            } if notes.is_empty() => format!("service `{service}` failed on start: {reason}"),
            StartError::ServiceInitFailed {
                service,
                reason,
                notes,
                ..
            } => format!(
                "service `{service}` failed on start: {reason}; notes: {}",
                notes.join("; ")
            ),
            StartError::ServiceInitTimeout { service, timeout } => format!(
                "service `{service}` took too long to start ({timeout:?}); \
                 fix: move slow code to `post_init` or increase the service timeout"
            ),
            StartError::Reused { app } => {
                format!("application `{app}` cannot be started twice; build a new one")
            }
        }
    }

    /// Name of the service that caused the failure, if any.
    pub fn service(&self) -> Option<&str> {
        match self {
            StartError::ServiceInitFailed { service, .. }
            | StartError::ServiceInitTimeout { service, .. } => Some(service),
            StartError::Reused { .. } => None,
        }
    }
}

/// # Errors produced by service hooks.
///
/// `Canceled` is a graceful exit: a hook that observed its context cancellation
/// returns it and the runtime does not report it as a failure.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HookError {
    /// Hook execution failed.
    #[error("{error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Hook panicked; the panic was caught by the runtime.
    #[error("hook panicked: {info}")]
    Panicked {
        /// Panic payload, when it was a string.
        info: String,
    },

    /// Hook exited because its context was cancelled.
    #[error("context cancelled")]
    Canceled,
}

impl HookError {
    /// Builds a [`HookError::Fail`] from anything printable.
    ///
    /// # Example
    /// ```
    /// use appvisor::HookError;
    ///
    /// let err = HookError::fail("connection refused");
    /// assert_eq!(err.to_string(), "connection refused");
    /// ```
    pub fn fail(error: impl std::fmt::Display) -> Self {
        HookError::Fail {
            error: error.to_string(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            HookError::Fail { .. } => "hook_failed",
            HookError::Panicked { .. } => "hook_panicked",
            HookError::Canceled => "hook_canceled",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            HookError::Fail { error } => format!("error: {error}"),
            HookError::Panicked { info } => format!("panic: {info}"),
            HookError::Canceled => "context cancelled".to_string(),
        }
    }
}

/// # State register misuse.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    /// The value is not part of the machine's legal value set.
    #[error("state `{value}` is not allowed by this state machine")]
    InvalidState {
        /// Debug representation of the rejected value.
        value: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_error_message_lists_notes() {
        let err = StartError::ServiceInitFailed {
            service: "db".into(),
            reason: "service is not healthy".into(),
            notes: vec!["no connection".into(), "pool empty".into()],
            source: None,
        };
        assert_eq!(err.service(), Some("db"));
        assert_eq!(
            err.as_message(),
            "service `db` failed on start: service is not healthy; notes: no connection; pool empty"
        );
    }

    #[test]
    fn start_error_keeps_hook_source() {
        use std::error::Error as _;

        let err = StartError::ServiceInitFailed {
            service: "db".into(),
            reason: "init failed".into(),
            notes: Vec::new(),
            source: Some(HookError::fail("boom")),
        };
        assert_eq!(err.source().map(|s| s.to_string()), Some("boom".into()));
    }

    #[test]
    fn config_error_labels_are_stable() {
        let err = ConfigError::DependencyCycle {
            services: vec!["a".into(), "b".into()],
        };
        assert_eq!(err.as_label(), "dependency_cycle");
        assert!(err.as_message().contains("nowait"));
    }
}
