use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::test_utils::enable_logger;
use crate::test_utils::objects;
use crate::test_utils::FakeListerWatcher;
use crate::test_utils::TestBinding;
use crate::test_utils::TestObject;
use crate::CacheSyncWaiter;
use crate::Error;
use crate::Informer;
use crate::InformerError;
use crate::InformerFactory;
use crate::KonnectorConfig;
use crate::ListerWatcher;
use crate::SystemError;

fn factory() -> InformerFactory {
    InformerFactory::new("provider", &KonnectorConfig::default())
}

fn lister_watcher(lw: &Arc<FakeListerWatcher>) -> impl FnOnce() -> Arc<dyn ListerWatcher<TestObject>> {
    let lw: Arc<dyn ListerWatcher<TestObject>> = lw.clone();
    move || lw
}

#[test]
fn test_informer_for_returns_shared_instance() {
    let factory = factory();
    let lw = FakeListerWatcher::new(objects(&["a"]));

    let first = factory.informer_for("pods", lister_watcher(&lw)).unwrap();
    let second = factory
        .informer_for::<TestObject, _>("pods", || panic!("informer must be reused"))
        .unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(factory.resources(), vec!["pods"]);
}

#[test]
fn test_informer_for_rejects_other_item_type() {
    let factory = factory();
    let lw = FakeListerWatcher::new(objects(&["a"]));
    factory.informer_for("pods", lister_watcher(&lw)).unwrap();

    let result = factory.informer_for::<TestBinding, _>("pods", || panic!("informer must not be created"));

    assert!(matches!(
        result,
        Err(Error::System(SystemError::Informer(InformerError::ResourceTypeMismatch { resource, .. }))) if resource == "pods"
    ));
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_cache_sync_reports_started_informers() {
    enable_logger();
    let factory = factory();
    let pods = FakeListerWatcher::new(objects(&["a"]));
    let secrets = FakeListerWatcher::new(objects(&["s"]));
    let pods_informer = factory.informer_for("pods", lister_watcher(&pods)).unwrap();
    factory.informer_for("secrets", lister_watcher(&secrets)).unwrap();

    let token = CancellationToken::new();
    factory.start(token.clone());
    // requested after start, not started yet
    factory
        .informer_for("configmaps", lister_watcher(&FakeListerWatcher::new(vec![])))
        .unwrap();

    let status = timeout(Duration::from_secs(5), factory.wait_for_cache_sync(token.child_token()))
        .await
        .unwrap();

    assert_eq!(
        status,
        HashMap::from([("pods".to_string(), true), ("secrets".to_string(), true)])
    );
    assert!(pods_informer.has_synced());

    token.cancel();
    factory.wait_stopped().await;
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_cache_sync_returns_partial_status_on_cancel() {
    enable_logger();
    let factory = factory();
    let fast = FakeListerWatcher::new(objects(&["a"]));
    let slow = FakeListerWatcher::new(objects(&["b"]));
    slow.set_list_delay(Duration::from_secs(60));
    factory.informer_for("fast", lister_watcher(&fast)).unwrap();
    factory.informer_for("slow", lister_watcher(&slow)).unwrap();

    let token = CancellationToken::new();
    factory.start(token.clone());

    let wait = token.child_token();
    let canceller = wait.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(2)).await;
        canceller.cancel();
    });
    let status = factory.wait_for_cache_sync(wait).await;

    assert_eq!(
        status,
        HashMap::from([("fast".to_string(), true), ("slow".to_string(), false)])
    );

    token.cancel();
    factory.wait_stopped().await;
}

#[tokio::test(start_paused = true)]
async fn test_start_is_idempotent() {
    enable_logger();
    let factory = factory();
    let lw = FakeListerWatcher::new(objects(&["a"]));
    factory.informer_for("pods", lister_watcher(&lw)).unwrap();

    let token = CancellationToken::new();
    factory.start(token.clone());
    factory.start(token.clone());
    factory.wait_for_cache_sync(token.child_token()).await;

    assert_eq!(lw.list_calls(), 1);

    token.cancel();
    factory.wait_stopped().await;
}
