//! Scripted origin and layer helpers shared by the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::{CacheStorage, HttpClient, HttpRequest, HttpResponse};
use core_cache::router::request_path;
use core_cache::{CacheLayer, MemoryCacheStorage};
use core_runtime::config::CoreConfig;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const ORIGIN: &str = "https://music.test";

#[derive(Clone)]
struct Script {
    status: u16,
    content_type: String,
    body: Vec<u8>,
    delay: Duration,
}

/// Origin that answers from a path → response script.
///
/// Ranged requests are answered with `206` slices like a media server.
#[derive(Default)]
pub struct FakeOrigin {
    scripts: Mutex<HashMap<String, Script>>,
    offline: AtomicBool,
    calls: AtomicUsize,
    seen: Mutex<Vec<HttpRequest>>,
}

impl FakeOrigin {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn serve(&self, path: &str, content_type: &str, body: impl Into<Vec<u8>>) {
        self.serve_with(path, 200, content_type, body, Duration::ZERO);
    }

    pub fn serve_with(
        &self,
        path: &str,
        status: u16,
        content_type: &str,
        body: impl Into<Vec<u8>>,
        delay: Duration,
    ) {
        self.scripts.lock().unwrap().insert(
            path.to_string(),
            Script {
                status,
                content_type: content_type.to_string(),
                body: body.into(),
                delay,
            },
        );
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn calls_for(&self, path: &str) -> usize {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .filter(|request| request_path(&request.url) == path)
            .count()
    }
}

#[async_trait]
impl HttpClient for FakeOrigin {
    async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(request.clone());

        let script = self
            .scripts
            .lock()
            .unwrap()
            .get(&request_path(&request.url))
            .cloned();

        if let Some(script) = &script {
            if !script.delay.is_zero() {
                tokio::time::sleep(script.delay).await;
            }
        }

        if self.offline.load(Ordering::SeqCst) {
            return Err(BridgeError::NetworkUnavailable("offline".to_string()));
        }

        let Some(script) = script else {
            return Ok(HttpResponse::new(404).with_body("not found"));
        };

        let full = HttpResponse::new(script.status)
            .with_header("content-type", script.content_type.clone())
            .with_header("content-length", script.body.len().to_string())
            .with_body(script.body.clone());

        match request.range() {
            Some(range) => {
                let stored = full.clone();
                Ok(core_cache::range::slice("origin", &stored, range).unwrap_or(full))
            }
            None => Ok(full),
        }
    }
}

/// Deterministic body of `size` bytes.
pub fn audio_body(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 256) as u8).collect()
}

pub fn config(origin: Arc<FakeOrigin>) -> CoreConfig {
    CoreConfig::builder()
        .version("v1")
        .http_client(origin)
        .build()
        .unwrap()
}

/// Layer over fresh in-memory storage; returns the storage for inspection.
pub fn layer(origin: Arc<FakeOrigin>) -> (CacheLayer, Arc<MemoryCacheStorage>) {
    let storage = Arc::new(MemoryCacheStorage::new());
    let layer = CacheLayer::new(config(origin), storage.clone() as Arc<dyn CacheStorage>);
    (layer, storage)
}
