use std::sync::Arc;

use crate::config::AppConfig;
use crate::core::application::Application;
use crate::core::registry::Registry;
use crate::core::resolver;
use crate::error::ConfigError;
use crate::services::{Service, ServiceHandle, ServiceRef};
use crate::subscribers::{LogWriter, Subscribe, SubscriberSet};

/// Builder for constructing an [`Application`] from individually registered services.
///
/// # Example
/// ```
/// use appvisor::{AppConfig, Application, Service};
///
/// struct Cache;
/// impl Service for Cache {}
///
/// # fn main() -> Result<(), appvisor::ConfigError> {
/// let app = Application::builder(AppConfig::default())
///     .service("cache", Cache)?
///     .build()?;
/// assert_eq!(app.loading_order(), ["cache"]);
/// # Ok(())
/// # }
/// ```
pub struct ApplicationBuilder {
    cfg: AppConfig,
    registry: Registry,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl ApplicationBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: AppConfig) -> Self {
        Self {
            cfg,
            registry: Registry::new(false),
            subscribers: Vec::new(),
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive lifecycle events in emission order; each handler is awaited inline.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Adds one event subscriber.
    pub fn subscriber(mut self, subscriber: Arc<dyn Subscribe>) -> Self {
        self.subscribers.push(subscriber);
        self
    }

    /// Lets a later registration replace an earlier one with the same name.
    ///
    /// Applies to registrations made after this call.
    pub fn allow_name_overrides(mut self, allow: bool) -> Self {
        self.registry.set_allow_override(allow);
        self
    }

    /// Registers `service` under `name`.
    pub fn service<S: Service>(self, name: impl Into<Arc<str>>, service: S) -> Result<Self, ConfigError> {
        self.handle(Arc::new(ServiceHandle::new(name, service)))
    }

    /// Registers an already wrapped service.
    pub fn handle(mut self, handle: ServiceRef) -> Result<Self, ConfigError> {
        self.registry.insert(handle)?;
        Ok(self)
    }

    /// Binds dependencies, computes the loading order and returns the application.
    ///
    /// Installs the built-in [`LogWriter`] first when `log_events` is set.
    pub fn build(self) -> Result<Application, ConfigError> {
        let order = resolver::resolve(&self.registry)?;

        for name in &self.cfg.optional_services {
            if self.registry.position(name).is_none() {
                tracing::warn!(app = %self.cfg.name, service = %name, "unknown optional service");
            }
        }

        let mut subs = SubscriberSet::default();
        if self.cfg.log_events {
            subs.push(Arc::new(LogWriter));
        }
        for sub in self.subscribers {
            subs.push(sub);
        }

        tracing::debug!(
            app = %self.cfg.name,
            count = self.registry.len(),
            order = ?order.iter().map(|s| s.name()).collect::<Vec<_>>(),
            "services resolved"
        );
        Ok(Application::from_parts(self.cfg, order, subs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{Dependency, Slot};

    struct Db;
    impl Service for Db {}

    struct Repo {
        db: Dependency<Db>,
    }

    impl Service for Repo {
        fn slots(&self) -> Vec<&dyn Slot> {
            vec![&self.db]
        }
    }

    #[test]
    fn builds_in_dependency_order() {
        let app = Application::builder(AppConfig::default())
            .service("repo", Repo { db: Dependency::new() })
            .unwrap()
            .service("db", Db)
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(app.loading_order(), ["db", "repo"]);
        assert!(app.service("repo").is_some());
    }

    #[test]
    fn duplicate_name_conflicts_unless_allowed() {
        let err = Application::builder(AppConfig::default())
            .service("db", Db)
            .unwrap()
            .service("db", Db)
            .err()
            .unwrap();
        assert_eq!(err, ConfigError::ServiceNameConflict { name: "db".into() });

        let app = Application::builder(AppConfig::default())
            .allow_name_overrides(true)
            .service("db", Db)
            .unwrap()
            .service("db", Db)
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(app.loading_order(), ["db"]);
    }
}
