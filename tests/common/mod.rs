//! Shared fixtures for integration tests.

#![allow(dead_code)]

use livesync::patch::{apply, Patch};
use livesync::storage::Storage;
use livesync::subscriptions::relax_json;
use livesync::{
    model, Connection, ConnectionId, Gateway, ModelController, RegistryConfig, Request,
    Response, Result, Route, Store, StoreConfig, SubscriptionRegistry, SyncError,
};
use parking_lot::Mutex;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

model! {
    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    pub struct Product {
        pub id: String => ID,
        pub name: String => NAME_FIELD,
        pub price: f64 => PRICE,
    }
}

pub fn product(id: &str, name: &str, price: f64) -> Product {
    Product {
        id: id.into(),
        name: name.into(),
        price,
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// A connection that records every pushed frame.
pub struct Recorder {
    id: ConnectionId,
    frames: Mutex<Vec<String>>,
    closed: AtomicBool,
}

impl Recorder {
    pub fn new(id: u64) -> Arc<Self> {
        Arc::new(Self {
            id: ConnectionId(id),
            frames: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        })
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// Push frames addressed to one subscription, oldest first.
    pub fn frames_for(&self, subscription: &str) -> Vec<String> {
        self.frames
            .lock()
            .iter()
            .filter(|frame| {
                let values: Vec<serde_json::Value> = serde_json::from_str(frame).unwrap();
                values[0] == subscription
            })
            .cloned()
            .collect()
    }

    /// Snapshot text rebuilt by applying a subscription's frames in order.
    pub fn snapshot(&self, subscription: &str) -> Option<String> {
        let frames = self.frames_for(subscription);
        if frames.is_empty() {
            return None;
        }
        Some(frames.iter().fold(String::new(), |text, frame| {
            let mut values: Vec<serde_json::Value> = serde_json::from_str(frame).unwrap();
            values.remove(0);
            let patch: Patch = serde_json::from_value(serde_json::Value::Array(values)).unwrap();
            apply(&text, &patch)
        }))
    }
}

impl Connection for Recorder {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn send(&self, text: &str) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SyncError::ConnectionClosed);
        }
        self.frames.lock().push(text.to_string());
        Ok(())
    }
}

pub fn wait_for(what: &str, mut done: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !done() {
        assert!(Instant::now() < deadline, "timed out waiting for {}", what);
        std::thread::sleep(Duration::from_millis(5));
    }
}

/// Store, registry and gateway wired together with three product routes.
pub struct App {
    pub store: Arc<Store>,
    pub registry: Arc<SubscriptionRegistry>,
    pub gateway: Gateway,
}

impl App {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self::with_config(storage, StoreConfig::default(), RegistryConfig::default())
    }

    pub fn with_config(
        storage: Arc<dyn Storage>,
        store_config: StoreConfig,
        registry_config: RegistryConfig,
    ) -> Self {
        let store = Arc::new(Store::new(storage, store_config));
        let registry = Arc::new(SubscriptionRegistry::new(registry_config));
        registry.attach(&store).unwrap();

        let guard = Regex::new(r"^(name|price)=eq\.[a-z0-9-]+$").unwrap();
        let products = Arc::new(ModelController::<Product>::for_store(&store).with_delete_guard(
            move |ctx| {
                if guard.is_match(&ctx.query) {
                    Ok(())
                } else {
                    Err(SyncError::Forbidden(
                        "403 Forbidden Delete Not By Name Or Price".into(),
                    ))
                }
            },
        ));

        let gateway = Gateway::new(Arc::clone(&registry))
            .route(Route::new("/products", products.clone()).watching::<Product>())
            .route(Route::new("/different-route", products.clone()).watching::<Product>())
            .route(Route::new("/yet-another-route", products).watching::<Product>());

        Self {
            store,
            registry,
            gateway,
        }
    }

    /// Send `METHOD /path?query` with an optional body.
    pub fn fetch(
        &self,
        connection: &Arc<dyn Connection>,
        id: &str,
        method: &str,
        url: &str,
        body: Option<serde_json::Value>,
    ) -> Response {
        let (path, query) = url.split_once('?').unwrap_or((url, ""));
        let mut request = Request::new(id, method, path).with_query(query);
        if let Some(body) = body {
            request = request.with_body(body);
        }
        self.gateway.handle(connection, request)
    }

    /// Relaxed snapshot text a subscription to `url` should converge to.
    pub fn expected_snapshot(&self, connection: &Arc<dyn Connection>, url: &str) -> String {
        let response = self.fetch(connection, "expected", "GET", url, None);
        assert_eq!(response.status(), None, "GET {} failed: {:?}", url, response);
        relax_json(response.body().unwrap()).unwrap()
    }

    /// Block until the subscription's rebuilt snapshot matches a fresh GET.
    pub fn wait_synced(&self, connection: &Arc<dyn Connection>, recorder: &Recorder, id: &str, url: &str) {
        wait_for(id, || {
            recorder.snapshot(id).as_deref() == Some(self.expected_snapshot(connection, url).as_str())
        });
    }
}

impl Drop for App {
    fn drop(&mut self) {
        self.registry.shutdown();
    }
}
