use ferrous_registry::{
    Factory, Key, MetricsObserver, NormalizedKey, Registry, RegistryConfig, RegistryState,
    Teardown, TeardownOutcome, TeardownResult, TeardownShape,
};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Log = Arc<Mutex<Vec<String>>>;

struct AsyncClient {
    log: Log,
}

#[async_trait]
impl Teardown for AsyncClient {
    fn shapes(&self) -> &'static [TeardownShape] {
        &[TeardownShape::AsyncClose]
    }

    async fn aclose(&self) -> TeardownResult {
        tokio::time::sleep(Duration::from_millis(5)).await;
        self.log.lock().unwrap().push("client.aclose".into());
        Ok(())
    }
}

struct SyncFlavoredClient {
    log: Log,
}

#[async_trait]
impl Teardown for SyncFlavoredClient {
    fn shapes(&self) -> &'static [TeardownShape] {
        &[TeardownShape::AsyncCloseSync]
    }

    fn aclose_sync(&self) -> TeardownResult {
        self.log.lock().unwrap().push("sync_client.aclose_sync".into());
        Ok(())
    }
}

struct Pool {
    log: Log,
}

#[async_trait]
impl Teardown for Pool {
    fn shapes(&self) -> &'static [TeardownShape] {
        &[TeardownShape::Close]
    }

    fn close(&self) -> TeardownResult {
        self.log.lock().unwrap().push("pool.close".into());
        Err("pool already closed".into())
    }
}

struct Socket {
    log: Log,
}

#[async_trait]
impl Teardown for Socket {
    fn shapes(&self) -> &'static [TeardownShape] {
        &[TeardownShape::Disconnect]
    }

    fn disconnect(&self) -> TeardownResult {
        self.log.lock().unwrap().push("socket.disconnect".into());
        Ok(())
    }
}

/// Supports every shape; only the highest-priority one may run.
struct Everything {
    log: Log,
}

#[async_trait]
impl Teardown for Everything {
    fn shapes(&self) -> &'static [TeardownShape] {
        &[
            TeardownShape::Disconnect,
            TeardownShape::Close,
            TeardownShape::AsyncCloseSync,
            TeardownShape::AsyncClose,
        ]
    }

    async fn aclose(&self) -> TeardownResult {
        self.log.lock().unwrap().push("everything.aclose".into());
        Ok(())
    }

    fn aclose_sync(&self) -> TeardownResult {
        self.log.lock().unwrap().push("everything.aclose_sync".into());
        Ok(())
    }

    fn close(&self) -> TeardownResult {
        self.log.lock().unwrap().push("everything.close".into());
        Ok(())
    }

    fn disconnect(&self) -> TeardownResult {
        self.log.lock().unwrap().push("everything.disconnect".into());
        Ok(())
    }
}

struct Panicky;

#[async_trait]
impl Teardown for Panicky {
    fn shapes(&self) -> &'static [TeardownShape] {
        &[TeardownShape::Close]
    }

    fn close(&self) -> TeardownResult {
        panic!("close exploded");
    }
}

struct Hanging;

#[async_trait]
impl Teardown for Hanging {
    fn shapes(&self) -> &'static [TeardownShape] {
        &[TeardownShape::AsyncClose]
    }

    async fn aclose(&self) -> TeardownResult {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(())
    }
}

#[derive(Default)]
struct Settings;

#[async_trait]
impl Teardown for Settings {
    fn shapes(&self) -> &'static [TeardownShape] {
        &[]
    }
}

fn sorted(log: &Log) -> Vec<String> {
    let mut entries = log.lock().unwrap().clone();
    entries.sort();
    entries
}

#[tokio::test]
async fn test_every_shape_runs_even_when_one_fails() {
    let log: Log = Arc::default();
    let registry = Registry::new();

    let l = log.clone();
    registry
        .create("client", Some(Factory::from_fn(move || AsyncClient { log: l }).closeable()))
        .await
        .unwrap();
    let l = log.clone();
    registry
        .create("sync_client", Some(Factory::from_fn(move || SyncFlavoredClient { log: l }).closeable()))
        .await
        .unwrap();
    let l = log.clone();
    registry
        .create("pool", Some(Factory::from_fn(move || Pool { log: l }).closeable()))
        .await
        .unwrap();
    let l = log.clone();
    registry
        .create("socket", Some(Factory::from_fn(move || Socket { log: l }).closeable()))
        .await
        .unwrap();

    let outcomes = registry.close_all().await;

    assert_eq!(
        sorted(&log),
        vec![
            "client.aclose",
            "pool.close",
            "socket.disconnect",
            "sync_client.aclose_sync",
        ]
    );
    assert_eq!(outcomes.len(), 4);
    let failures: Vec<_> = outcomes.iter().filter(|(_, o)| o.is_failure()).collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, NormalizedKey::String("pool".into()));
    assert!(registry.is_empty());
    assert_eq!(registry.state(), RegistryState::Empty);
}

#[tokio::test]
async fn test_only_highest_priority_shape_runs() {
    let log: Log = Arc::default();
    let registry = Registry::new();

    let l = log.clone();
    registry
        .create("everything", Some(Factory::from_fn(move || Everything { log: l }).inline().closeable()))
        .await
        .unwrap();

    let outcomes = registry.close_all().await;
    assert_eq!(sorted(&log), vec!["everything.aclose"]);
    assert_eq!(outcomes[0].1, TeardownOutcome::Closed(TeardownShape::AsyncClose));
}

#[tokio::test]
async fn test_instances_without_teardown_are_skipped() {
    let registry = Registry::new();
    registry
        .create("plain", Some(Factory::from_fn(|| 42u64).inline()))
        .await
        .unwrap();
    registry
        .create::<Settings>(Key::closeable::<Settings>(), None)
        .await
        .unwrap();

    let outcomes = registry.close_all().await;
    assert!(outcomes.iter().all(|(_, o)| *o == TeardownOutcome::Skipped));
    assert!(registry.is_empty());
}

#[tokio::test]
async fn test_panicking_teardown_is_contained() {
    let log: Log = Arc::default();
    let metrics = Arc::new(MetricsObserver::new());
    let registry = Registry::builder().observer(metrics.clone()).build();

    registry
        .create("panicky", Some(Factory::from_fn(|| Panicky).inline().closeable()))
        .await
        .unwrap();
    let l = log.clone();
    registry
        .create("socket", Some(Factory::from_fn(move || Socket { log: l }).inline().closeable()))
        .await
        .unwrap();

    let outcomes = registry.close_all().await;

    assert_eq!(
        outcomes[0],
        (
            NormalizedKey::String("panicky".into()),
            TeardownOutcome::Failed(TeardownShape::Close, "panicked: close exploded".into())
        )
    );
    assert_eq!(outcomes[1].1, TeardownOutcome::Closed(TeardownShape::Disconnect));
    assert_eq!(sorted(&log), vec!["socket.disconnect"]);
    assert_eq!(metrics.teardowns(), 2);
    assert_eq!(metrics.teardown_failures(), 1);
}

#[tokio::test]
async fn test_teardown_deadline() {
    let registry = Registry::with_config(
        RegistryConfig::default().with_teardown_timeout(Duration::from_millis(20)),
    );
    registry
        .create("hanging", Some(Factory::from_fn(|| Hanging).inline().closeable()))
        .await
        .unwrap();

    let started = std::time::Instant::now();
    let outcomes = registry.close_all().await;

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(outcomes[0].1, TeardownOutcome::TimedOut(TeardownShape::AsyncClose));
    assert!(registry.is_empty());
}

#[tokio::test]
async fn test_registry_is_reusable_after_close() {
    let log: Log = Arc::default();
    let registry = Registry::new();

    let l = log.clone();
    let first = registry
        .create("socket", Some(Factory::from_fn(move || Socket { log: l }).inline().closeable()))
        .await
        .unwrap();
    registry.close_all().await;

    let l = log.clone();
    let second = registry
        .create("socket", Some(Factory::from_fn(move || Socket { log: l }).inline().closeable()))
        .await
        .unwrap();

    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(registry.len(), 1);
    registry.close_all().await;
    assert_eq!(sorted(&log), vec!["socket.disconnect", "socket.disconnect"]);
}

#[tokio::test]
async fn test_close_all_on_empty_registry() {
    let registry = Registry::new();
    assert!(registry.close_all().await.is_empty());
    assert!(registry.close_all().await.is_empty());
}
