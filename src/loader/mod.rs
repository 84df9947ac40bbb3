//! # Loading an application from configuration.
//!
//! [`Loader`] maps service class names to factories and turns an [`AppConfig`] into a
//! resolved [`Application`]:
//!
//! ```text
//! AppConfig.services ──► skip disabled ──► factory(cls)(settings) ──► registry ──► resolver ──► Application
//!                                              │                        │
//!                                              ├─ UnknownServiceClass   └─ ServiceNameConflict
//!                                              └─ InvalidSettings
//! ```
//!
//! ## Example
//! ```rust
//! use appvisor::{AppConfig, Loader, Service, ServiceConfig};
//! use serde::Deserialize;
//! use serde_json::json;
//!
//! #[derive(Deserialize, Default)]
//! #[serde(default)]
//! struct CacheSettings {
//!     capacity: usize,
//! }
//!
//! struct Cache {
//!     capacity: usize,
//! }
//! impl Service for Cache {}
//!
//! let loader = Loader::new().register_settings("Cache", |s: CacheSettings| Cache {
//!     capacity: s.capacity,
//! });
//!
//! let mut cfg = AppConfig::default();
//! cfg.services.push(ServiceConfig::new("Cache").with_settings(json!({"capacity": 16})));
//! cfg.services.push(ServiceConfig::new("Cache").named("sessions"));
//!
//! let app = loader.load(cfg).unwrap();
//! assert_eq!(app.loading_order(), ["Cache", "sessions"]);
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::config::AppConfig;
use crate::core::Application;
use crate::error::ConfigError;
use crate::services::{Service, ServiceHandle, ServiceRef};
use crate::subscribers::Subscribe;

type Factory = Box<dyn Fn(&str, &Value) -> Result<ServiceRef, ConfigError> + Send + Sync>;

/// Builds applications from configuration using registered service factories.
#[derive(Default)]
pub struct Loader {
    classes: HashMap<String, Factory>,
    allow_overrides: bool,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl Loader {
    /// Creates a loader with no registered classes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `cls` with a factory that ignores settings.
    #[must_use]
    pub fn register<S, F>(mut self, cls: impl Into<String>, factory: F) -> Self
    where
        S: Service,
        F: Fn() -> S + Send + Sync + 'static,
    {
        self.classes.insert(
            cls.into(),
            Box::new(move |name: &str, _settings: &Value| -> Result<ServiceRef, ConfigError> {
                Ok(Arc::new(ServiceHandle::new(name, factory())))
            }),
        );
        self
    }

    /// Registers `cls` with a constructor taking deserialized settings.
    ///
    /// Missing settings deserialize from an empty object.
    #[must_use]
    pub fn register_settings<T, S, F>(mut self, cls: impl Into<String>, ctor: F) -> Self
    where
        T: DeserializeOwned,
        S: Service,
        F: Fn(T) -> S + Send + Sync + 'static,
    {
        self.classes.insert(
            cls.into(),
            Box::new(move |name: &str, settings: &Value| -> Result<ServiceRef, ConfigError> {
                let settings = match settings {
                    Value::Null => Value::Object(Map::new()),
                    other => other.clone(),
                };
                let settings = serde_json::from_value(settings).map_err(|e| {
                    ConfigError::InvalidSettings {
                        service: name.to_string(),
                        reason: e.to_string(),
                    }
                })?;
                Ok(Arc::new(ServiceHandle::new(name, ctor(settings))))
            }),
        );
        self
    }

    /// Lets services with the same name override each other instead of failing.
    #[must_use]
    pub fn allow_name_overrides(mut self, allow: bool) -> Self {
        self.allow_overrides = allow;
        self
    }

    /// Sets event subscribers handed to every loaded application.
    #[must_use]
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Creates the configured services and returns the resolved application.
    pub fn load(&self, mut cfg: AppConfig) -> Result<Application, ConfigError> {
        let entries = std::mem::take(&mut cfg.services);
        let mut builder = Application::builder(cfg)
            .allow_name_overrides(self.allow_overrides)
            .with_subscribers(self.subscribers.clone());

        for entry in &entries {
            if !entry.enabled {
                tracing::debug!(service = %entry.name(), cls = %entry.cls, "service disabled");
                continue;
            }
            let factory = self
                .classes
                .get(&entry.cls)
                .ok_or_else(|| ConfigError::UnknownServiceClass {
                    class: entry.cls.clone(),
                })?;
            builder = builder.handle(factory(entry.name(), &entry.settings)?)?;
        }
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceConfig;
    use serde::Deserialize;
    use serde_json::json;

    struct Db;
    impl Service for Db {}

    #[derive(Deserialize)]
    struct PoolSettings {
        size: u32,
    }

    struct Pool {
        size: u32,
    }
    impl Service for Pool {}

    fn loader() -> Loader {
        Loader::new()
            .register("Db", || Db)
            .register_settings("Pool", |s: PoolSettings| Pool { size: s.size })
    }

    fn config(services: Vec<ServiceConfig>) -> AppConfig {
        AppConfig {
            services,
            log_events: false,
            ..AppConfig::default()
        }
    }

    #[test]
    fn loads_enabled_services_with_settings() {
        let mut disabled = ServiceConfig::new("Db").named("legacy");
        disabled.enabled = false;
        let app = loader()
            .load(config(vec![
                ServiceConfig::new("Db"),
                ServiceConfig::new("Pool").with_settings(json!({"size": 4})),
                disabled,
            ]))
            .unwrap();

        assert_eq!(app.loading_order(), ["Db", "Pool"]);
        let pool = app.service("Pool").unwrap().downcast::<Pool>().unwrap();
        assert_eq!(pool.size, 4);
    }

    #[test]
    fn unknown_class_and_bad_settings_are_config_errors() {
        let err = loader().load(config(vec![ServiceConfig::new("Nope")])).unwrap_err();
        assert_eq!(err, ConfigError::UnknownServiceClass { class: "Nope".into() });

        let err = loader()
            .load(config(vec![ServiceConfig::new("Pool").with_settings(json!({"size": "big"}))]))
            .unwrap_err();
        assert_eq!(err.as_label(), "invalid_settings");
    }

    #[test]
    fn name_conflicts_follow_override_flag() {
        let services = vec![ServiceConfig::new("Db"), ServiceConfig::new("Db")];
        let err = loader().load(config(services.clone())).unwrap_err();
        assert_eq!(err, ConfigError::ServiceNameConflict { name: "Db".into() });

        let app = loader().allow_name_overrides(true).load(config(services)).unwrap();
        assert_eq!(app.loading_order(), ["Db"]);
    }
}
