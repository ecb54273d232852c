//! # livesync
//!
//! Cached record queries with live, diff-patched subscriptions.
//!
//! ## Core Concepts
//!
//! - **Query**: Canonical filters, ordering and pagination; doubles as a cache key
//! - **Repo**: Cached reads and invalidating writes for one record type
//! - **Patch**: Bounded text diff pushed to subscribers instead of full results
//! - **Subscriptions**: One ordered delivery worker per live query
//! - **Gateway**: Decoded requests in, responses and push frames out
//!
//! ## Example
//!
//! ```
//! use livesync::storage::MemoryStorage;
//! use livesync::{model, Store, StoreConfig};
//! use serde::{Deserialize, Serialize};
//! use std::sync::Arc;
//!
//! model! {
//!     #[derive(Clone, Debug, Serialize, Deserialize)]
//!     pub struct Product {
//!         pub id: String => ID,
//!         pub name: String => NAME_FIELD,
//!         pub price: f64 => PRICE,
//!     }
//! }
//!
//! let storage = Arc::new(MemoryStorage::with_relations(["Product"]));
//! let store = Store::new(storage, StoreConfig::default());
//! let products = store.repo::<Product>();
//!
//! products.post(&[
//!     Product { id: "p1".into(), name: "chair".into(), price: 2.0 },
//!     Product { id: "p2".into(), name: "table".into(), price: 5.0 },
//! ])?;
//!
//! let query = Product::query().lte(Product::PRICE, 3.0).build();
//! assert_eq!(query.to_string(), "price=lte.3");
//! assert_eq!(products.get(&query)?[0].name, "chair");
//! # Ok::<(), livesync::SyncError>(())
//! ```

pub mod error;
pub mod gateway;
pub mod model;
pub mod patch;
pub mod query;
pub mod repo;
pub mod storage;
pub mod store;
pub mod subscriptions;
pub mod types;

// Re-exports
pub use error::{Result, SyncError};
pub use gateway::{Context, Controller, Gateway, Method, ModelController, Request, Response, Route};
pub use model::{Model, Schema};
pub use patch::{apply, diff, Patch, PatchOp};
pub use query::{Direction, Field, Filter, Operator, Order, Query, QueryBuilder};
pub use repo::{ChangeEvent, ChangeFeed, Repo, RepoConfig, TypedRepo};
pub use storage::{MemoryStorage, Storage};
pub use store::{Store, StoreConfig};
pub use subscriptions::{
    Connection, RegistryConfig, SnapshotSource, SubscriptionId, SubscriptionRegistry,
};
pub use types::*;
