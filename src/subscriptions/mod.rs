//! Live query subscriptions.
//!
//! A subscription binds a client-chosen id on one connection to a
//! [`SnapshotSource`] and the record types it watches. When one of those
//! record types changes, the subscription's worker recomputes the snapshot,
//! diffs it against the last text it delivered, and pushes
//! `[id, ...ops]` to the connection.
//!
//! # Example
//!
//! ```ignore
//! let registry = Arc::new(SubscriptionRegistry::new(RegistryConfig::default()));
//! registry.attach(&store)?;
//!
//! let repo = store.repo::<Product>();
//! let query = Product::query().desc(Product::PRICE).build();
//! registry.subscribe(
//!     &connection,
//!     SubscriptionId::from("cheapest"),
//!     vec![Product::NAME.to_string()],
//!     Arc::new(move || Ok(serde_json::to_value(repo.get(&query)?)?)),
//! )?;
//! ```

mod manager;
mod snapshot;
mod types;
mod worker;

pub use manager::SubscriptionRegistry;
pub use snapshot::{push_frame, relax_json};
pub use types::{
    Connection, RegistryConfig, SnapshotSource, SubscriptionId, SubscriptionSummary,
};
