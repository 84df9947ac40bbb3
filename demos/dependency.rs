//! # Example: Loading From Config
//!
//! Builds an application from a JSON config with the [`Loader`]:
//! - `Broker` and `Registry` need each other; the `nowait` slot breaks the cycle.
//! - `Mailer` is optional and fails to start; the application comes up anyway.
//! - `Broker` finds its notifier through the `dyn Notifier` interface, not a concrete type.
//! - The application runs until Ctrl-C (or SIGTERM), then stops in reverse order.
//!
//! ```bash
//! RUST_LOG=info cargo run --example dependency
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing_subscriber::EnvFilter;

use appvisor::{AppConfig, Context, Dependency, HookError, Interfaces, Loader, Service, Slot};

struct Registry {
    broker: Dependency<Broker>,
}

#[async_trait]
impl Service for Registry {
    async fn init(&self, _ctx: &Context) -> Result<(), HookError> {
        // bound, but not started yet
        println!("[registry] broker bound: {:?}", self.broker.name());
        Ok(())
    }

    fn slots(&self) -> Vec<&dyn Slot> {
        vec![&self.broker]
    }
}

#[derive(Deserialize)]
#[serde(default)]
struct BrokerSettings {
    url: String,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            url: "memory://".into(),
        }
    }
}

/// Anything that can deliver a notice.
trait Notifier: Send + Sync {
    fn notify(&self, text: &str);
}

struct Broker {
    url: String,
    registry: Dependency<Registry>,
    notifier: Dependency<dyn Notifier>,
}

#[async_trait]
impl Service for Broker {
    async fn init(&self, _ctx: &Context) -> Result<(), HookError> {
        self.registry.require()?;
        println!("[broker] connected to {}", self.url);
        if let Some(notifier) = self.notifier.get() {
            notifier.notify("broker is up");
        }
        Ok(())
    }

    async fn close(&self, _ctx: &Context) -> Result<(), HookError> {
        println!("[broker] disconnected");
        Ok(())
    }

    fn slots(&self) -> Vec<&dyn Slot> {
        vec![&self.registry, &self.notifier]
    }
}

struct Mailer;

impl Notifier for Mailer {
    fn notify(&self, text: &str) {
        println!("[mailer] queued notice: {text}");
    }
}

#[async_trait]
impl Service for Mailer {
    async fn init(&self, _ctx: &Context) -> Result<(), HookError> {
        Err(HookError::fail("smtp server unreachable"))
    }

    fn interfaces(self: Arc<Self>, out: &mut Interfaces) {
        out.add::<dyn Notifier>(self);
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cfg: AppConfig = serde_json::from_value(json!({
        "name": "dependency-demo",
        "env": "dev",
        "service_timeout": 5,
        "show_inspection_on_start": true,
        "optional_services": ["mailer"],
        "services": [
            {"cls": "Broker", "settings": {"url": "amqp://localhost"}},
            {"cls": "Registry"},
            {"cls": "Mailer", "name": "mailer"},
            {"cls": "Mailer", "name": "legacy-mailer", "enabled": false}
        ]
    }))?;

    let loader = Loader::new()
        .register_settings("Broker", |s: BrokerSettings| Broker {
            url: s.url,
            registry: Dependency::new(),
            notifier: Dependency::new().optional(),
        })
        .register("Registry", || Registry {
            broker: Dependency::new().nowait(),
        })
        .register("Mailer", || Mailer);

    let app = loader.load(cfg)?;
    println!("loading order: {:?}", app.loading_order());

    println!("running, press Ctrl-C to stop");
    app.run().await?;
    Ok(())
}
