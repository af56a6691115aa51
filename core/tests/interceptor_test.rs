use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use http::Method;
use offline_core::{
    CacheError, CacheKey, CacheRegion, CacheStorage, Destination, DiskCacheStorage, FetchError,
    InstallError, Interceptor, MemoryCacheStorage, Network, NetworkError, Request, Response,
    ShimConfig,
};
use parking_lot::Mutex;
use url::Url;

const CACHE: &str = "adore-moveis-v1";

/// Scripted network keyed by URL path.
#[derive(Debug, Default)]
struct FakeNetwork {
    routes: Mutex<HashMap<String, (u16, Vec<u8>)>>,
    offline: AtomicBool,
    calls: AtomicUsize,
}

impl FakeNetwork {
    fn with_site() -> Arc<Self> {
        let network = Arc::new(Self::default());
        network.serve("/", 200, "<html>home</html>");
        network.serve("/static/css/consolidado.css", 200, "body{}");
        network.serve("/static/manifest.json", 200, "{}");
        network
    }

    fn serve(&self, path: &str, status: u16, body: &str) {
        self.routes.lock().insert(path.to_string(), (status, body.as_bytes().to_vec()));
    }

    fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Network for FakeNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, NetworkError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(NetworkError::new(request.url.as_str(), "offline"));
        }
        match self.routes.lock().get(request.url.path()) {
            Some((status, body)) => Ok(Response::new(request.url.clone(), *status, body.clone())),
            None => Err(NetworkError::new(request.url.as_str(), "connection refused")),
        }
    }
}

fn url(path: &str) -> Url {
    Url::parse("http://localhost:5000/").unwrap().join(path).unwrap()
}

fn interceptor(
    network: &Arc<FakeNetwork>,
) -> (Interceptor<MemoryCacheStorage, Arc<FakeNetwork>>, MemoryCacheStorage) {
    let storage = MemoryCacheStorage::new();
    let interceptor = Interceptor::new(ShimConfig::default(), storage.clone(), Arc::clone(network));
    (interceptor, storage)
}

#[tokio::test]
async fn install_stores_every_manifest_entry() {
    let network = FakeNetwork::with_site();
    let (interceptor, storage) = interceptor(&network);

    let report = interceptor.install().await.expect("install");
    assert_eq!(report.cache_name, CACHE);
    assert_eq!(report.keys.len(), 3);
    assert!(interceptor.is_installed());

    let region = storage.open(CACHE).await.unwrap();
    assert_eq!(region.len().await.unwrap(), 3);
    for path in ["/", "/static/css/consolidado.css", "/static/manifest.json"] {
        let cached = region.lookup(&Request::new(url(path))).await.unwrap();
        assert!(cached.is_some(), "{path} should be cached");
    }
    assert_eq!(interceptor.stats().snapshot().installed_entries, 3);
}

#[tokio::test]
async fn one_unreachable_asset_aborts_the_install() {
    let network = FakeNetwork::with_site();
    network.routes.lock().remove("/static/manifest.json");
    let (interceptor, storage) = interceptor(&network);

    let err = interceptor.install().await.expect_err("install should fail");
    assert!(matches!(err, InstallError::Fetch { ref path, .. } if path == "/static/manifest.json"));
    assert!(!interceptor.is_installed());

    let region = storage.open(CACHE).await.unwrap();
    assert_eq!(region.len().await.unwrap(), 0, "no partial population");
}

#[tokio::test]
async fn error_status_during_install_counts_as_failure() {
    let network = FakeNetwork::with_site();
    network.serve("/static/css/consolidado.css", 404, "missing");
    let (interceptor, _storage) = interceptor(&network);

    let err = interceptor.install().await.expect_err("install should fail");
    assert!(matches!(err, InstallError::BadStatus { status: 404, .. }));
    assert!(!interceptor.is_installed());
}

#[tokio::test]
async fn failed_install_can_be_retried() {
    let network = FakeNetwork::with_site();
    network.set_offline(true);
    let (interceptor, _storage) = interceptor(&network);
    assert!(interceptor.install().await.is_err());

    network.set_offline(false);
    interceptor.install().await.expect("second install");
    assert!(interceptor.is_installed());
}

#[tokio::test]
async fn navigation_prefers_the_live_response() {
    let network = FakeNetwork::with_site();
    let (interceptor, _storage) = interceptor(&network);
    interceptor.install().await.unwrap();
    network.serve("/", 200, "<html>fresh</html>");

    let response = interceptor.handle_fetch(&Request::navigate(url("/"))).await.unwrap();
    assert_eq!(response.body, b"<html>fresh</html>".to_vec());
    let snap = interceptor.stats().snapshot();
    assert_eq!(snap.cache_hits + snap.cache_misses, 0, "cache not consulted");
}

#[tokio::test]
async fn navigation_falls_back_to_cached_page_when_offline() {
    let network = FakeNetwork::with_site();
    let (interceptor, storage) = interceptor(&network);
    interceptor.install().await.unwrap();
    network.set_offline(true);

    let response = interceptor.handle_fetch(&Request::navigate(url("/"))).await.unwrap();
    let cached = storage.open(CACHE).await.unwrap().lookup(&Request::new(url("/"))).await.unwrap();
    assert_eq!(Some(response), cached);
    assert_eq!(interceptor.stats().snapshot().fallbacks_served, 1);
}

#[tokio::test]
async fn navigation_offline_without_cache_entry_fails() {
    let network = FakeNetwork::with_site();
    let (interceptor, _storage) = interceptor(&network);
    interceptor.install().await.unwrap();
    network.set_offline(true);

    let err = interceptor.handle_fetch(&Request::navigate(url("/produtos"))).await.unwrap_err();
    assert!(matches!(err, FetchError::Offline { ref key, .. } if key.ends_with("/produtos")));
}

#[tokio::test]
async fn http_error_status_is_not_a_network_failure() {
    let network = FakeNetwork::with_site();
    let (interceptor, _storage) = interceptor(&network);
    interceptor.install().await.unwrap();
    network.serve("/", 500, "boom");

    let response = interceptor.handle_fetch(&Request::navigate(url("/"))).await.unwrap();
    assert_eq!(response.status, 500);
}

#[tokio::test]
async fn cached_static_asset_never_hits_the_network() {
    let network = FakeNetwork::with_site();
    let (interceptor, _storage) = interceptor(&network);
    interceptor.install().await.unwrap();
    let before = network.calls();

    let request = Request::asset(url("/static/css/consolidado.css"), Destination::Style);
    let response = interceptor.handle_fetch(&request).await.unwrap();
    assert_eq!(response.body, b"body{}".to_vec());
    assert_eq!(network.calls(), before);
}

#[tokio::test]
async fn static_asset_miss_is_fetched_but_not_stored() {
    let network = FakeNetwork::with_site();
    network.serve("/static/img/logo.png", 200, "png");
    let (interceptor, storage) = interceptor(&network);
    interceptor.install().await.unwrap();

    let request = Request::asset(url("/static/img/logo.png"), Destination::Image);
    let response = interceptor.handle_fetch(&request).await.unwrap();
    assert_eq!(response.body, b"png".to_vec());

    let region = storage.open(CACHE).await.unwrap();
    assert_eq!(region.len().await.unwrap(), 3);
    assert!(region.lookup(&request).await.unwrap().is_none());
}

#[tokio::test]
async fn static_asset_miss_while_offline_propagates() {
    let network = FakeNetwork::with_site();
    let (interceptor, _storage) = interceptor(&network);
    interceptor.install().await.unwrap();
    network.set_offline(true);

    let request = Request::asset(url("/static/js/app.js"), Destination::Script);
    let err = interceptor.handle_fetch(&request).await.unwrap_err();
    assert!(matches!(err, FetchError::Network(_)));
}

#[tokio::test]
async fn other_requests_fall_back_to_cache() {
    let network = FakeNetwork::with_site();
    let (interceptor, _storage) = interceptor(&network);
    interceptor.install().await.unwrap();
    network.set_offline(true);

    let request = Request::asset(url("/static/manifest.json"), Destination::Manifest);
    let response = interceptor.handle_fetch(&request).await.unwrap();
    assert_eq!(response.body, b"{}".to_vec());
}

#[tokio::test]
async fn non_get_requests_never_match_the_cache() {
    let network = FakeNetwork::with_site();
    let (interceptor, _storage) = interceptor(&network);
    interceptor.install().await.unwrap();
    network.set_offline(true);

    let request = Request::navigate(url("/")).with_method(Method::POST);
    let err = interceptor.handle_fetch(&request).await.unwrap_err();
    assert!(matches!(err, FetchError::Offline { .. }));
}

#[tokio::test]
async fn uninstalled_interceptor_passes_requests_through() {
    let network = FakeNetwork::with_site();
    let (interceptor, _storage) = interceptor(&network);

    let request = Request::asset(url("/static/css/consolidado.css"), Destination::Style);
    assert!(interceptor.handle_fetch(&request).await.is_ok());

    network.set_offline(true);
    let err = interceptor.handle_fetch(&Request::navigate(url("/"))).await.unwrap_err();
    assert!(matches!(err, FetchError::Network(_)));
}

#[tokio::test]
async fn disk_region_survives_a_restart() {
    let temp = tempfile::tempdir().unwrap();
    let network = FakeNetwork::with_site();
    let config = ShimConfig::default().with_storage_root(temp.path());

    {
        let storage = DiskCacheStorage::new(temp.path()).unwrap();
        let first = Interceptor::new(config.clone(), storage, Arc::clone(&network));
        first.install().await.unwrap();
    }

    network.set_offline(true);
    let storage = DiskCacheStorage::new(temp.path()).unwrap();
    let restarted = Interceptor::new(config, storage, Arc::clone(&network));
    assert!(!restarted.is_installed());
    assert!(restarted.resume().await.unwrap());
    assert_eq!(restarted.cached_keys().await.unwrap().len(), 3);

    let response = restarted.handle_fetch(&Request::navigate(url("/"))).await.unwrap();
    assert_eq!(response.body, b"<html>home</html>".to_vec());
}

#[tokio::test]
async fn resume_without_region_stays_inactive() {
    let network = FakeNetwork::with_site();
    let (interceptor, _storage) = interceptor(&network);

    assert!(!interceptor.resume().await.unwrap());
    assert!(!interceptor.is_installed());
    assert!(interceptor.cached_keys().await.unwrap().is_empty());
}

#[tokio::test]
async fn disk_write_failure_rolls_back_the_install() {
    let temp = tempfile::tempdir().unwrap();
    let network = FakeNetwork::with_site();
    let config = ShimConfig::default().with_storage_root(temp.path());
    let storage = DiskCacheStorage::new(temp.path()).unwrap();

    // A directory where the manifest.json body belongs makes that one write fail.
    let region = storage.open(CACHE).await.unwrap();
    let blocked = region.path_for(&CacheKey::from_url(&url("/static/manifest.json")));
    std::fs::create_dir_all(&blocked).unwrap();

    let interceptor = Interceptor::new(config.clone(), storage, Arc::clone(&network));
    let err = interceptor.install().await.expect_err("install should fail");
    assert!(matches!(err, InstallError::Cache(CacheError::Io(_))));
    assert!(!interceptor.is_installed());
    assert!(interceptor.cached_keys().await.unwrap().is_empty(), "no partial population");
    assert!(!region.is_sealed().await.unwrap());

    let restarted =
        Interceptor::new(config, DiskCacheStorage::new(temp.path()).unwrap(), network);
    assert!(!restarted.resume().await.unwrap());
    assert!(!restarted.is_installed());
}

#[tokio::test]
async fn resume_ignores_a_region_left_by_a_failed_install() {
    let network = FakeNetwork::with_site();
    network.routes.lock().remove("/static/manifest.json");
    let (interceptor, storage) = interceptor(&network);
    interceptor.install().await.expect_err("install should fail");
    assert!(storage.has(CACHE).await.unwrap());

    let restarted = Interceptor::new(ShimConfig::default(), storage, Arc::clone(&network));
    assert!(!restarted.resume().await.unwrap());

    network.set_offline(true);
    let err = restarted.handle_fetch(&Request::navigate(url("/"))).await.unwrap_err();
    assert!(matches!(err, FetchError::Network(_)), "inactive interceptor passes through");
}
