use ferrous_registry::{Factory, Registry, RegistryConfig, RunMode};
use std::thread::{self, ThreadId};

#[tokio::test(flavor = "current_thread")]
async fn test_inline_factory_runs_on_caller_thread_in_current_thread_runtime() {
    let registry = Registry::new();
    let caller = thread::current().id();

    let ran_on = registry
        .create("inline", Some(Factory::from_fn(|| thread::current().id()).inline()))
        .await
        .unwrap();

    assert_eq!(*ran_on, caller);
}

#[tokio::test(flavor = "current_thread")]
async fn test_threaded_factory_runs_off_runtime_thread() {
    let registry = Registry::new();
    let caller = thread::current().id();

    let ran_on = registry
        .create("threaded", Some(Factory::from_fn(|| thread::current().id())))
        .await
        .unwrap();

    assert_ne!(*ran_on, caller);
}

#[tokio::test(flavor = "current_thread")]
async fn test_configured_default_run_mode() {
    let registry = Registry::with_config(
        RegistryConfig::default().with_default_run_mode(RunMode::Inline),
    );
    let caller = thread::current().id();

    let inline = registry
        .create("default", Some(Factory::from_fn(|| thread::current().id())))
        .await
        .unwrap();
    let forced = registry
        .create(
            "forced",
            Some(Factory::from_fn(|| thread::current().id()).run_mode(RunMode::Thread)),
        )
        .await
        .unwrap();

    assert_eq!(*inline, caller);
    assert_ne!(*forced, caller);
}

#[tokio::test(flavor = "current_thread")]
async fn test_async_factory_is_awaited_on_runtime() {
    let registry = Registry::new();
    let caller = thread::current().id();

    let ran_on = registry
        .create(
            "async",
            Some(Factory::future(|| async {
                tokio::task::yield_now().await;
                Ok::<ThreadId, std::io::Error>(thread::current().id())
            })),
        )
        .await
        .unwrap();

    assert_eq!(*ran_on, caller);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn test_inline_factory_runs_on_runtime_worker() {
    let registry = Registry::new();
    let worker = tokio::spawn(async { thread::current().id() }).await.unwrap();

    let inline = registry
        .create("inline", Some(Factory::from_fn(|| thread::current().id()).inline()))
        .await
        .unwrap();
    let threaded = registry
        .create("threaded", Some(Factory::from_fn(|| thread::current().id())))
        .await
        .unwrap();

    // The only worker polls every construction task; blocking work goes elsewhere.
    assert_eq!(*inline, worker);
    assert_ne!(*threaded, worker);
}
