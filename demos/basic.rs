//! # Example: Basic Lifecycle
//!
//! Two services, one depending on the other. The application starts them in order,
//! runs post-init work, prints the inspection document and stops.
//!
//! ```bash
//! RUST_LOG=debug cargo run --example basic
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

use appvisor::{AppConfig, Application, Context, Dependency, Health, HookError, Service, Slot};

/// In-memory counter store.
#[derive(Default)]
struct Store {
    hits: AtomicU64,
}

#[async_trait]
impl Service for Store {
    async fn init(&self, ctx: &Context) -> Result<(), HookError> {
        println!("[{}] opening store (env={})", ctx.service().unwrap_or("?"), ctx.env());
        Ok(())
    }

    async fn health(&self) -> Health {
        Health::healthy().with_stat("hits", self.hits.load(Ordering::Relaxed))
    }
}

/// Warms the store after the application is up.
struct Warmer {
    store: Dependency<Store>,
}

#[async_trait]
impl Service for Warmer {
    async fn post_init(&self, ctx: &Context) -> Result<(), HookError> {
        let store = self.store.require()?;
        for _ in 0..5 {
            tokio::select! {
                _ = ctx.cancelled() => return Err(HookError::Canceled),
                _ = tokio::time::sleep(Duration::from_millis(50)) => {
                    store.hits.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
        println!("[warmer] store warmed");
        Ok(())
    }

    fn slots(&self) -> Vec<&dyn Slot> {
        vec![&self.store]
    }

    fn describe(&self) -> Value {
        json!({ "store": self.store.name() })
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cfg = AppConfig {
        name: "basic".into(),
        env: "dev".into(),
        service_timeout: Duration::from_secs(2),
        ..AppConfig::default()
    };

    let app = Application::builder(cfg)
        .service("warmer", Warmer { store: Dependency::new() })?
        .service("store", Store::default())?
        .build()?;
    println!("loading order: {:?}", app.loading_order());

    app.start().await?;
    app.wait_post_init().await;

    let doc = app.inspect(&[]).await;
    println!("{}", serde_json::to_string_pretty(&doc)?);

    app.stop().await;
    println!("state: {}", app.state());
    Ok(())
}
