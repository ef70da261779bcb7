//! Lifecycle demo: one registry per process
//!
//! This example demonstrates:
//! - Constructing the registry once in the entry point
//! - Sharing it with request handlers by cloning
//! - Concurrent first use of an expensive resource (one construction)
//! - Blocking, inline and async factories
//! - Closing everything once at shutdown
//!
//! Run with `RUST_LOG=ferrous_registry=debug cargo run --example lifecycle`.

use ferrous_registry::*;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

/// Embedding model that takes a while to load from disk.
struct EmbeddingModel {
    dims: usize,
}

impl EmbeddingModel {
    fn load(path: &str) -> Result<Self, BoxError> {
        println!("Loading embedding model from {}", path);
        std::thread::sleep(Duration::from_millis(200));
        Ok(Self { dims: 768 })
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        vec![text.len() as f32; self.dims]
    }
}

/// Connection pool that needs an async handshake and a graceful close.
struct ConnectionPool {
    url: String,
}

impl ConnectionPool {
    async fn connect(url: &str) -> Result<Self, BoxError> {
        println!("Connecting to {}", url);
        sleep(Duration::from_millis(100)).await;
        Ok(Self { url: url.to_string() })
    }
}

#[async_trait]
impl Teardown for ConnectionPool {
    fn shapes(&self) -> &'static [TeardownShape] {
        &[TeardownShape::AsyncClose]
    }

    async fn aclose(&self) -> TeardownResult {
        println!("Closing pool for {}", self.url);
        sleep(Duration::from_millis(50)).await;
        Ok(())
    }
}

/// Cheap text splitter, built inline.
#[derive(Default)]
struct TextSplitter {
    chunk_size: usize,
}

#[async_trait]
impl Teardown for TextSplitter {
    fn shapes(&self) -> &'static [TeardownShape] {
        &[TeardownShape::Close]
    }

    fn close(&self) -> TeardownResult {
        println!("Splitter released ({} byte chunks)", self.chunk_size);
        Ok(())
    }
}

async fn handle_request(registry: Registry, id: usize) -> Result<usize, RegistryError> {
    let model = registry
        .create(
            Key::of::<EmbeddingModel>(),
            Some(Factory::sync(|| EmbeddingModel::load("models/minilm.onnx"))),
        )
        .await?;
    let pool = registry
        .create(
            "pool",
            Some(Factory::future(|| ConnectionPool::connect("postgres://localhost/app")).closeable()),
        )
        .await?;
    let splitter = registry
        .create::<TextSplitter>(Key::closeable::<TextSplitter>(), None)
        .await?;

    let vector = model.embed(&format!("request {}", id));
    println!(
        "request {} -> {} dims via {} (chunk size {})",
        id,
        vector.len(),
        pool.url,
        splitter.chunk_size
    );
    Ok(vector.len())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("ferrous-registry lifecycle demo\n");

    let metrics = Arc::new(MetricsObserver::new());
    let registry = Registry::builder()
        .config(RegistryConfig::from_env()?)
        .teardown_timeout(Duration::from_secs(5))
        .observer(metrics.clone())
        .observer(Arc::new(LoggingObserver::with_prefix("demo")))
        .build();

    let handlers: Vec<_> = (0..8)
        .map(|id| tokio::spawn(handle_request(registry.clone(), id)))
        .collect();
    for handler in handlers {
        handler.await??;
    }

    println!("\nState: {}", registry.state());
    println!("Stored keys:");
    for key in registry.keys() {
        println!("  {}", key);
    }
    println!(
        "Constructions: {}, joins: {}",
        metrics.constructions(),
        metrics.joins()
    );

    println!("\nShutting down");
    for (key, outcome) in registry.close_all().await {
        println!("  {} -> {:?}", key, outcome);
    }
    println!("State: {}", registry.state());
    Ok(())
}
