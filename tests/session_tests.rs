use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tether::descriptor::EndpointDescriptor;
use tether::engine::session::{
    create_pooled_client, ClientFactory, ConnectionLimits, SessionManager, TimeoutConfig,
};
use tether::error::Error;

#[derive(Default)]
struct CountingFactory {
    created: AtomicUsize,
    per_route: Option<usize>,
}

impl ClientFactory for CountingFactory {
    fn create_client(&self, _endpoint: &EndpointDescriptor) -> Result<reqwest::Client, Error> {
        self.created.fetch_add(1, Ordering::SeqCst);
        create_pooled_client(&TimeoutConfig::default(), 1)
    }

    fn max_per_route(&self) -> Option<usize> {
        self.per_route
    }
}

fn limits() -> ConnectionLimits {
    ConnectionLimits {
        max_total: 8,
        max_per_route: 2,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_first_use_creates_one_session() {
    let factory = Arc::new(CountingFactory::default());
    let manager = Arc::new(SessionManager::with_factory(
        limits(),
        Arc::clone(&factory) as Arc<dyn ClientFactory>,
    ));
    let endpoint = Arc::new(EndpointDescriptor::new("svc", "localhost"));

    let handles: Vec<_> = (0..32)
        .map(|_| {
            let manager = Arc::clone(&manager);
            let endpoint = Arc::clone(&endpoint);
            tokio::spawn(async move { manager.get_session(&endpoint).unwrap() })
        })
        .collect();

    let mut sessions = Vec::new();
    for handle in handles {
        sessions.push(handle.await.unwrap());
    }

    assert_eq!(factory.created.load(Ordering::SeqCst), 1);
    assert_eq!(manager.len(), 1);
    assert!(sessions.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
}

#[test]
fn test_endpoints_get_separate_sessions() {
    let manager = SessionManager::default();
    let a = manager
        .get_session(&EndpointDescriptor::new("a", "localhost"))
        .unwrap();
    let b = manager
        .get_session(&EndpointDescriptor::new("b", "localhost"))
        .unwrap();
    assert!(!Arc::ptr_eq(&a, &b));
    assert!(!Arc::ptr_eq(a.cookies(), b.cookies()));
    assert_eq!(manager.len(), 2);
}

#[test]
fn test_endpoint_factory_overrides_default() {
    let default_factory = Arc::new(CountingFactory::default());
    let override_factory = Arc::new(CountingFactory {
        created: AtomicUsize::new(0),
        per_route: Some(7),
    });
    let manager = SessionManager::with_factory(
        limits(),
        Arc::clone(&default_factory) as Arc<dyn ClientFactory>,
    );
    let endpoint = EndpointDescriptor::new("svc", "localhost")
        .with_client_factory(Arc::clone(&override_factory) as Arc<dyn ClientFactory>);

    let session = manager.get_session(&endpoint).unwrap();

    assert_eq!(override_factory.created.load(Ordering::SeqCst), 1);
    assert_eq!(default_factory.created.load(Ordering::SeqCst), 0);
    assert_eq!(session.available_route_permits(), 7);
}

#[test]
fn test_default_route_ceiling_comes_from_limits() {
    let manager = SessionManager::with_factory(limits(), Arc::new(CountingFactory::default()));
    let session = manager
        .get_session(&EndpointDescriptor::new("svc", "localhost"))
        .unwrap();
    assert_eq!(session.available_route_permits(), 2);
}

#[tokio::test]
async fn test_permits_are_released_on_drop() {
    let manager = SessionManager::with_factory(limits(), Arc::new(CountingFactory::default()));
    let session = manager
        .get_session(&EndpointDescriptor::new("svc", "localhost"))
        .unwrap();
    let first = session.acquire().await.unwrap();
    let _second = session.acquire().await.unwrap();
    assert_eq!(session.available_route_permits(), 0);
    drop(first);
    assert_eq!(session.available_route_permits(), 1);
}

#[test]
fn test_evict_forces_a_new_session() {
    let factory = Arc::new(CountingFactory::default());
    let manager = SessionManager::with_factory(limits(), Arc::clone(&factory) as Arc<dyn ClientFactory>);
    let endpoint = EndpointDescriptor::new("svc", "localhost");
    let first = manager.get_session(&endpoint).unwrap();
    assert!(manager.evict("svc"));
    assert!(manager.is_empty());
    let second = manager.get_session(&endpoint).unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(factory.created.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_queued_route_does_not_starve_other_endpoints() {
    let manager = Arc::new(SessionManager::with_factory(
        ConnectionLimits {
            max_total: 2,
            max_per_route: 1,
        },
        Arc::new(CountingFactory::default()),
    ));
    let a = manager
        .get_session(&EndpointDescriptor::new("a", "localhost"))
        .unwrap();
    let b = manager
        .get_session(&EndpointDescriptor::new("b", "localhost"))
        .unwrap();

    let _held = a.acquire().await.unwrap();
    let queued = {
        let a = Arc::clone(&a);
        tokio::spawn(async move { a.acquire().await.map(|_| ()) })
    };
    tokio::task::yield_now().await;

    let permit = tokio::time::timeout(Duration::from_millis(500), b.acquire())
        .await
        .expect("endpoint b should not wait behind endpoint a's queue")
        .unwrap();
    drop(permit);
    assert!(!queued.is_finished());
    queued.abort();
}
