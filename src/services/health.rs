//! Service health report.

use serde::Serialize;
use serde_json::{Map, Value};

/// Health statistics returned by [`Service::health`](crate::Service::health).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Health {
    /// Service is healthy.
    pub healthy: bool,
    /// Reserved for stats and metrics.
    pub stats: Map<String, Value>,
    /// Every error message observed by the check.
    pub errors: Vec<String>,
}

impl Health {
    /// A healthy report without stats.
    pub fn healthy() -> Self {
        Self {
            healthy: true,
            stats: Map::new(),
            errors: Vec::new(),
        }
    }

    /// An unhealthy report carrying `errors`.
    pub fn unhealthy<I, S>(errors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            healthy: false,
            stats: Map::new(),
            errors: errors.into_iter().map(Into::into).collect(),
        }
    }

    /// Adds a stat entry.
    #[must_use]
    pub fn with_stat(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.stats.insert(key.into(), value.into());
        self
    }
}

impl Default for Health {
    fn default() -> Self {
        Self::healthy()
    }
}
