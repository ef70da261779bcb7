/// Memory leak integration tests
///
/// These tests verify that the registry releases its references:
/// 1. `close_all` drops every stored instance after its teardown ran
/// 2. Dropping the last registry handle drops whatever is still stored
/// 3. Failed constructions leave nothing behind

use ferrous_registry::{Factory, Registry, Teardown, TeardownResult, TeardownShape};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

// ===== Test Service Base =====

#[derive(Debug)]
pub struct TrackedService {
    drops: Arc<AtomicU32>,
    data: Vec<u8>,
}

impl TrackedService {
    pub fn new(drops: Arc<AtomicU32>) -> Self {
        Self {
            drops,
            data: vec![0u8; 1024],
        }
    }
}

impl Drop for TrackedService {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Teardown for TrackedService {
    fn shapes(&self) -> &'static [TeardownShape] {
        &[TeardownShape::Close]
    }

    fn close(&self) -> TeardownResult {
        Ok(())
    }
}

#[tokio::test]
async fn test_close_all_releases_instances() {
    let drops = Arc::new(AtomicU32::new(0));
    let registry = Registry::new();

    let d = drops.clone();
    let service = registry
        .create("tracked", Some(Factory::from_fn(move || TrackedService::new(d)).inline().closeable()))
        .await
        .unwrap();
    assert_eq!(service.data.len(), 1024);

    // One reference held here, one by the store, one by the teardown handle.
    assert_eq!(Arc::strong_count(&service), 3);

    registry.close_all().await;
    assert_eq!(Arc::strong_count(&service), 1);
    assert_eq!(drops.load(Ordering::SeqCst), 0);

    drop(service);
    assert_eq!(drops.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_dropping_registry_releases_instances() {
    let drops = Arc::new(AtomicU32::new(0));

    {
        let registry = Registry::new();
        for name in ["a", "b", "c"] {
            let d = drops.clone();
            registry
                .create(name, Some(Factory::from_fn(move || TrackedService::new(d)).inline()))
                .await
                .unwrap();
        }
        let clone = registry.clone();
        drop(registry);
        assert_eq!(drops.load(Ordering::SeqCst), 0);
        assert_eq!(clone.len(), 3);
    }

    assert_eq!(drops.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_repeated_cycles_do_not_accumulate() {
    let drops = Arc::new(AtomicU32::new(0));
    let registry = Registry::new();

    for _ in 0..50 {
        let d = drops.clone();
        registry
            .create("cycled", Some(Factory::from_fn(move || TrackedService::new(d)).closeable()))
            .await
            .unwrap();
        registry.close_all().await;
    }

    assert_eq!(drops.load(Ordering::SeqCst), 50);
    assert!(registry.is_empty());
    assert_eq!(Arc::strong_count(&drops), 1);
}

#[tokio::test]
async fn test_failed_construction_leaves_nothing() {
    let registry = Registry::new();
    for _ in 0..10 {
        let _ = registry
            .create::<TrackedService>("broken", Some(Factory::sync(|| Err::<TrackedService, _>("nope"))))
            .await;
    }
    assert!(registry.is_empty());
    assert!(registry.keys().is_empty());
}
