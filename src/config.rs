//! # Application configuration.
//!
//! [`AppConfig`] holds the settings of one application: identity, timeouts, optional
//! services and, for the [`Loader`](crate::Loader), the list of services to create.
//! Both structs deserialize from any `serde` format; missing fields take defaults.
//!
//! ## Sentinel values
//! - `service_timeout = 0` → no per-service start/stop timeout
//! - `post_init_timeout = 0` → post-init tasks are not bounded
//!
//! Timeouts are written in seconds and may be fractional.
//!
//! # Example
//! ```
//! use std::time::Duration;
//! use appvisor::AppConfig;
//!
//! let cfg: AppConfig = serde_json::from_value(serde_json::json!({
//!     "name": "shop",
//!     "env": "dev",
//!     "service_timeout": 2.5,
//!     "optional_services": ["metrics"],
//!     "services": [{"cls": "Cache"}, {"cls": "Cache", "name": "sessions"}]
//! }))
//! .unwrap();
//!
//! assert_eq!(cfg.service_limit(), Some(Duration::from_millis(2500)));
//! assert_eq!(cfg.post_init_limit(), Some(Duration::from_secs(300)));
//! assert_eq!(cfg.services[0].name(), "Cache");
//! assert_eq!(cfg.services[1].name(), "sessions");
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Settings of one application.
///
/// ## Field semantics
/// - `service_timeout`: bound of each service `start` and `stop` (`0s` = none)
/// - `post_init_timeout`: one shared deadline for all post-init tasks (`0s` = none)
/// - `optional_services`: names whose start failures are logged and skipped
/// - `log_events`: install the built-in [`LogWriter`](crate::LogWriter)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Unique application name.
    pub name: String,

    /// Environment name: `prod`, `test`, `qa`, ...
    pub env: String,

    /// Debug mode; also logs the inspection document after start.
    pub debug: bool,

    /// Per-service start and stop timeout.
    #[serde(with = "secs")]
    pub service_timeout: Duration,

    /// Aggregate post-init timeout.
    #[serde(with = "secs")]
    pub post_init_timeout: Duration,

    /// Log the inspection document after a successful start.
    pub show_inspection_on_start: bool,

    /// Install the built-in `LogWriter` subscriber.
    pub log_events: bool,

    /// Application metadata, reported by inspection and not used otherwise.
    pub metadata: Map<String, Value>,

    /// Names of services that may fail to start without failing the application.
    pub optional_services: Vec<String>,

    /// Services created by the loader, in registration order.
    pub services: Vec<ServiceConfig>,
}

impl AppConfig {
    /// Returns the per-service timeout as an `Option`.
    pub fn service_limit(&self) -> Option<Duration> {
        limit(self.service_timeout)
    }

    /// Returns the aggregate post-init timeout as an `Option`.
    pub fn post_init_limit(&self) -> Option<Duration> {
        limit(self.post_init_timeout)
    }
}

impl Default for AppConfig {
    /// Default configuration:
    /// - `name = "app"`, `env = "prod"`
    /// - `service_timeout = 30s`
    /// - `post_init_timeout = 300s`
    /// - `log_events = true`
    fn default() -> Self {
        Self {
            name: "app".to_string(),
            env: "prod".to_string(),
            debug: false,
            service_timeout: Duration::from_secs(30),
            post_init_timeout: Duration::from_secs(300),
            show_inspection_on_start: false,
            log_events: true,
            metadata: Map::new(),
            optional_services: Vec::new(),
            services: Vec::new(),
        }
    }
}

/// Loader entry for one service.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Registered service class.
    pub cls: String,

    /// Service name; defaults to `cls`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Disabled services are skipped by the loader.
    #[serde(default = "enabled")]
    pub enabled: bool,

    /// Constructor settings handed to the class factory.
    #[serde(default)]
    pub settings: Value,
}

impl ServiceConfig {
    /// Entry for `cls` with default name and no settings.
    pub fn new(cls: impl Into<String>) -> Self {
        Self {
            cls: cls.into(),
            name: None,
            enabled: true,
            settings: Value::Null,
        }
    }

    /// Sets a custom name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets constructor settings.
    #[must_use]
    pub fn with_settings(mut self, settings: Value) -> Self {
        self.settings = settings;
        self
    }

    /// Effective service name.
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.cls)
    }
}

fn enabled() -> bool {
    true
}

fn limit(d: Duration) -> Option<Duration> {
    (!d.is_zero()).then_some(d)
}

mod secs {
    use std::time::Duration;

    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Duration::try_from_secs_f64(secs).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn zero_means_unbounded() {
        let cfg: AppConfig =
            serde_json::from_value(json!({"service_timeout": 0, "post_init_timeout": 0})).unwrap();
        assert_eq!(cfg.service_limit(), None);
        assert_eq!(cfg.post_init_limit(), None);
        assert_eq!(cfg.name, "app");
        assert!(cfg.log_events);
    }

    #[test]
    fn negative_timeout_is_rejected() {
        let res: Result<AppConfig, _> = serde_json::from_value(json!({"service_timeout": -1}));
        assert!(res.is_err());
    }

    #[test]
    fn service_entries_default_to_enabled() {
        let entry: ServiceConfig = serde_json::from_value(json!({"cls": "Db"})).unwrap();
        assert_eq!(entry, ServiceConfig::new("Db"));
        assert_eq!(entry.name(), "Db");
    }
}
