//! Lives in its own test binary: it rewrites the process proxy environment.

use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::response::Html;
use axum::Router;
use pagesift_core::{
    BlockPolicy, FetchOptions, FetchRequest, Fetcher, PrivateNetworkPolicy, StaticResolver,
};
use tokio::net::TcpListener;

// ── Helpers ──────────────────────────────────────────────────────────

struct LoopbackAllowed;

impl BlockPolicy for LoopbackAllowed {
    fn is_blocked(&self, ip: IpAddr) -> bool {
        !ip.is_loopback() && PrivateNetworkPolicy.is_blocked(ip)
    }
}

async fn record(State(hits): State<Arc<AtomicUsize>>) -> Html<&'static str> {
    hits.fetch_add(1, Ordering::SeqCst);
    Html("<html><head><title>Foo</title></head><body><p>Hello world</p></body></html>")
}

/// Serves every path and absolute-form request URI, counting hits.
async fn start_recorder() -> (SocketAddr, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let app = Router::new().fallback(record).with_state(hits.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, hits)
}

// ── Tests ────────────────────────────────────────────────────────────

#[tokio::test]
async fn environment_proxy_is_never_used() {
    let (origin, origin_hits) = start_recorder().await;
    let (proxy, proxy_hits) = start_recorder().await;

    let proxy_url = format!("http://{proxy}");
    for key in [
        "HTTP_PROXY",
        "http_proxy",
        "HTTPS_PROXY",
        "https_proxy",
        "ALL_PROXY",
        "all_proxy",
    ] {
        std::env::set_var(key, &proxy_url);
    }
    for key in ["NO_PROXY", "no_proxy"] {
        std::env::remove_var(key);
    }

    let url = format!("http://site.test:{}/page", origin.port());

    // A client that honours the environment goes through the proxy.
    let plain = reqwest::Client::new();
    let response = plain.get(&url).send().await.unwrap();
    assert!(response.status().is_success());
    assert_eq!(proxy_hits.load(Ordering::SeqCst), 1);

    let fetcher = Fetcher::new(FetchOptions::default())
        .with_policy(Arc::new(LoopbackAllowed))
        .with_resolver(Arc::new(
            StaticResolver::new().with_host("site.test", vec!["127.0.0.1".parse().unwrap()]),
        ));
    let page = fetcher
        .fetch(&FetchRequest::new(url, Duration::from_secs(10), 0))
        .await
        .unwrap();

    assert_eq!(page.status, 200);
    assert_eq!(origin_hits.load(Ordering::SeqCst), 1);
    assert_eq!(proxy_hits.load(Ordering::SeqCst), 1);
}
