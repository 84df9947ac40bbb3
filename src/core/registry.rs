//! # Service registry.
//!
//! Keeps registered services in registration order and indexes them by name.
//!
//! ## Rules
//! - Names are unique; a duplicate is [`ConfigError::ServiceNameConflict`] unless
//!   overrides are allowed.
//! - An allowed override replaces the earlier service in place, keeping its position.
//! - Registration order is the tie-breaker for the loading order and for capability
//!   lookups.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::ConfigError;
use crate::services::ServiceRef;

/// Services of one application, in registration order.
#[derive(Default)]
pub(crate) struct Registry {
    entries: Vec<ServiceRef>,
    index: HashMap<Arc<str>, usize>,
    allow_override: bool,
}

impl Registry {
    pub(crate) fn new(allow_override: bool) -> Self {
        Self {
            allow_override,
            ..Self::default()
        }
    }

    pub(crate) fn set_allow_override(&mut self, allow: bool) {
        self.allow_override = allow;
    }

    /// Registers `handle` under its own name.
    pub(crate) fn insert(&mut self, handle: ServiceRef) -> Result<(), ConfigError> {
        let name = handle.name_arc();
        match self.index.get(&name) {
            Some(&pos) if self.allow_override => {
                tracing::debug!(service = %name, "service registration overridden");
                self.entries[pos] = handle;
                Ok(())
            }
            Some(_) => Err(ConfigError::ServiceNameConflict {
                name: name.to_string(),
            }),
            None => {
                self.index.insert(name, self.entries.len());
                self.entries.push(handle);
                Ok(())
            }
        }
    }

    pub(crate) fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub(crate) fn entries(&self) -> &[ServiceRef] {
        &self.entries
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{Service, ServiceHandle};

    struct Noop;
    impl Service for Noop {}

    fn handle(name: &str) -> ServiceRef {
        Arc::new(ServiceHandle::new(name, Noop))
    }

    #[test]
    fn rejects_duplicate_names() {
        let mut reg = Registry::new(false);
        reg.insert(handle("a")).unwrap();
        let err = reg.insert(handle("a")).unwrap_err();
        assert_eq!(err, ConfigError::ServiceNameConflict { name: "a".into() });
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn override_replaces_in_place() {
        let mut reg = Registry::new(true);
        let first = handle("a");
        reg.insert(first.clone()).unwrap();
        reg.insert(handle("b")).unwrap();

        let replacement = handle("a");
        reg.insert(replacement.clone()).unwrap();

        assert_eq!(reg.len(), 2);
        assert_eq!(reg.position("a"), Some(0));
        assert!(Arc::ptr_eq(&reg.entries()[0], &replacement));
        assert!(!Arc::ptr_eq(&reg.entries()[0], &first));
    }
}
