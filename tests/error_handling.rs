//! Error handling and edge case tests.

mod common;

use common::{product, wait_for, App, Product, Recorder};
use livesync::storage::{Parameters, Prepared, Statement, Storage};
use livesync::{
    model, Connection, MemoryStorage, Query, RegistryConfig, Result, Row, Store, StoreConfig,
    SyncError,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Memory storage whose next `n` executions fail.
struct FlakyStorage {
    inner: MemoryStorage,
    failures: AtomicUsize,
}

impl FlakyStorage {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryStorage::with_relations(["Product"]),
            failures: AtomicUsize::new(0),
        })
    }

    fn fail_next(&self, n: usize) {
        self.failures.store(n, Ordering::SeqCst);
    }

    fn pending_failures(&self) -> usize {
        self.failures.load(Ordering::SeqCst)
    }
}

impl Storage for FlakyStorage {
    fn prepare(&self, statement: &Statement) -> Result<Prepared> {
        self.inner.prepare(statement)
    }

    fn execute(&self, prepared: &Prepared, parameters: &Parameters) -> Result<Vec<Row>> {
        let failed = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(SyncError::Storage("disk offline".into()));
        }
        self.inner.execute(prepared, parameters)
    }
}

// --- Direct Requests ---

#[test]
fn test_storage_failure_is_500() {
    let storage = FlakyStorage::new();
    let app = App::new(storage.clone());
    let connection: Arc<dyn Connection> = Recorder::new(1);

    storage.fail_next(1);
    let response = app.fetch(&connection, "1", "GET", "/products", None);
    assert_eq!(response.status(), Some(500));
    assert_eq!(response.body(), Some(&json!("Storage error: disk offline")));

    // Nothing was cached, the next read goes to storage.
    let response = app.fetch(&connection, "2", "GET", "/products", None);
    assert_eq!(response.status(), None);
    assert_eq!(response.body(), Some(&json!([])));
}

#[test]
fn test_failed_mutation_keeps_cache_and_publishes_nothing() {
    let storage = FlakyStorage::new();
    let store = Store::new(storage.clone(), StoreConfig::default());
    let changes = store.changes();
    let repo = store.repo::<Product>();

    repo.post(&[product("p1", "chair", 2.0)]).unwrap();
    assert!(changes.try_recv().is_ok());
    repo.get(&Query::new()).unwrap();

    storage.fail_next(1);
    let err = repo.delete(&Query::new()).unwrap_err();
    assert_eq!(err.status(), 500);
    assert!(changes.try_recv().is_err());
    assert_eq!(repo.untyped().cached_queries(), 1);
}

#[test]
fn test_client_errors() {
    let app = App::new(FlakyStorage::new());
    let connection: Arc<dyn Connection> = Recorder::new(1);

    let response = app.fetch(&connection, "1", "toString", "/products", None);
    assert_eq!(response.status(), Some(405));
    assert_eq!(response.body(), Some(&json!("405 Method Not Allowed")));

    let response = app.fetch(&connection, "2", "DELETE", "/products", None);
    assert_eq!(response.status(), Some(403));

    let response = app.fetch(&connection, "3", "POST", "/products", Some(json!("chair")));
    assert_eq!(response.status(), Some(400));

    let response = app.fetch(
        &connection,
        "4",
        "POST",
        "/products",
        Some(json!([{"id": "p1", "name": "chair"}])),
    );
    assert_eq!(response.status(), Some(400));

    let response = app.fetch(&connection, "5", "PATCH", "/products", Some(json!([{"colour": "red"}])));
    assert_eq!(response.status(), Some(400));

    let response = app.fetch(&connection, "6", "GET", "/products?colour=eq.red", None);
    assert_eq!(response.status(), Some(400));
}

#[test]
fn test_malformed_query_fragments_ignored() {
    let app = App::new(FlakyStorage::new());
    let connection: Arc<dyn Connection> = Recorder::new(1);
    app.fetch(
        &connection,
        "1",
        "POST",
        "/products",
        Some(json!([{"id": "p1", "name": "chair", "price": 2}])),
    );

    let response = app.fetch(
        &connection,
        "2",
        "GET",
        "/products?foo=bogus.value&limit=abc&&order=price.sideways",
        None,
    );
    assert_eq!(response.status(), None);
    assert_eq!(response.body().unwrap().as_array().unwrap().len(), 1);
}

#[test]
fn test_unknown_relation() {
    model! {
        #[derive(Clone, Debug, Serialize, Deserialize)]
        struct Ghost {
            id: String => ID,
        }
    }

    let store = Store::new(Arc::new(MemoryStorage::new()), StoreConfig::default());
    let err = store.repo::<Ghost>().get(&Query::new()).unwrap_err();
    assert!(matches!(err, SyncError::UnknownRelation(ref name) if name == "Ghost"));
    assert_eq!(err.status(), 500);
}

// --- Subscriptions ---

#[test]
fn test_recompute_failure_keeps_baseline() {
    let storage = FlakyStorage::new();
    let app = App::new(storage.clone());
    let recorder = Recorder::new(1);
    let connection: Arc<dyn Connection> = recorder.clone();

    app.fetch(&connection, "s", "SUBSCRIBE", "/products", None);
    app.fetch(
        &connection,
        "1",
        "POST",
        "/products",
        Some(json!([{"id": "p1", "name": "chair", "price": 2}])),
    );
    app.wait_synced(&connection, &recorder, "s", "/products");
    let delivered = recorder.frames_for("s").len();

    // Force the next recompute to reach storage, and fail there.
    app.store.repo::<Product>().untyped().invalidate();
    storage.fail_next(1);
    assert_eq!(app.registry.notify("Product"), 1);
    wait_for("failed recompute", || storage.pending_failures() == 0);

    app.fetch(
        &connection,
        "2",
        "POST",
        "/products",
        Some(json!([{"id": "p2", "name": "table", "price": 5}])),
    );
    app.wait_synced(&connection, &recorder, "s", "/products");
    assert_eq!(recorder.frames_for("s").len(), delivered + 1);
}

#[test]
fn test_closed_connection_drops_delivery() {
    let app = App::new(FlakyStorage::new());
    let recorder = Recorder::new(1);
    let connection: Arc<dyn Connection> = recorder.clone();

    app.fetch(&connection, "s", "SUBSCRIBE", "/products", None);
    recorder.close();

    app.fetch(
        &connection,
        "1",
        "POST",
        "/products",
        Some(json!([{"id": "p1", "name": "chair", "price": 2}])),
    );
    app.registry.shutdown();

    assert!(recorder.frames_for("s").is_empty());
}

#[test]
fn test_dropped_connection_is_not_kept_alive() {
    let app = App::new(FlakyStorage::new());
    let recorder = Recorder::new(7);
    let connection: Arc<dyn Connection> = recorder.clone();

    app.fetch(&connection, "s", "SUBSCRIBE", "/products", None);
    drop(connection);
    assert_eq!(Arc::strong_count(&recorder), 1);

    let writer: Arc<dyn Connection> = Recorder::new(8);
    app.fetch(
        &writer,
        "1",
        "POST",
        "/products",
        Some(json!([{"id": "p1", "name": "chair", "price": 2}])),
    );
    app.registry.shutdown();
    assert!(recorder.frames_for("s").is_empty());
}

#[test]
fn test_unsubscribe_unknown_id_is_acknowledged() {
    let app = App::new(FlakyStorage::new());
    let connection: Arc<dyn Connection> = Recorder::new(1);

    let response = app.fetch(&connection, "missing", "UNSUBSCRIBE", "/products", None);
    assert_eq!(response.status(), None);
    assert_eq!(response.id(), "missing");
}

#[test]
fn test_subscription_id_with_nul_is_served() {
    let app = App::new(Arc::new(MemoryStorage::with_relations(["Product"])));
    let recorder = Recorder::new(1);
    let connection: Arc<dyn Connection> = recorder.clone();

    let frame = r#"{"id":"a\u0000b","method":"SUBSCRIBE","path":"/products"}"#;
    let reply: serde_json::Value =
        serde_json::from_str(&app.gateway.handle_text(&connection, frame).unwrap()).unwrap();
    assert_eq!(reply["id"], "a\u{0}b");
    assert!(reply.get("status").is_none());
    assert_eq!(app.registry.subscription_count(), 1);

    app.fetch(
        &connection,
        "post",
        "POST",
        "/products",
        Some(json!({"id": "p1", "name": "chair", "price": 2.5})),
    );
    app.wait_synced(&connection, &recorder, "a\u{0}b", "/products");
}

#[test]
fn test_subscription_limit_is_400() {
    let app = App::with_config(
        Arc::new(MemoryStorage::with_relations(["Product"])),
        StoreConfig::default(),
        RegistryConfig {
            max_per_connection: 1,
            ..RegistryConfig::default()
        },
    );
    let connection: Arc<dyn Connection> = Recorder::new(1);

    let first = app.fetch(&connection, "a", "SUBSCRIBE", "/products", None);
    assert_eq!(first.status(), None);

    let second = app.fetch(&connection, "b", "SUBSCRIBE", "/products", None);
    assert_eq!(second.status(), Some(400));

    let again = app.fetch(&connection, "a", "SUBSCRIBE", "/products?price=lte.3", None);
    assert_eq!(again.status(), None);
    assert_eq!(app.registry.subscription_count(), 1);

    let other: Arc<dyn Connection> = Recorder::new(2);
    let response = app.fetch(&other, "b", "SUBSCRIBE", "/products", None);
    assert_eq!(response.status(), None);
}

#[test]
fn test_empty_post_is_noop() {
    let storage = FlakyStorage::new();
    let store = Store::new(storage.clone(), StoreConfig::default());
    let changes = store.changes();

    storage.fail_next(1);
    store.repo::<Product>().post(&[]).unwrap();
    assert_eq!(storage.pending_failures(), 1);
    assert!(changes.try_recv().is_err());
}
