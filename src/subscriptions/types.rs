//! Subscription types for live query updates.

use crate::error::Result;
use crate::types::ConnectionId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Client-chosen subscription id, echoed in every push frame.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(pub String);

impl SubscriptionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SubscriptionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for SubscriptionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A client connection as seen by the registry.
///
/// The registry only holds connections weakly; the transport owns their
/// lifecycle and reports closure through `connection_closed`.
pub trait Connection: Send + Sync {
    fn id(&self) -> ConnectionId;

    /// Send one text frame. Fails when the connection is gone.
    fn send(&self, text: &str) -> Result<()>;
}

/// Recomputes the current result of a subscribed query.
pub trait SnapshotSource: Send + Sync {
    fn snapshot(&self) -> Result<serde_json::Value>;
}

impl<F> SnapshotSource for F
where
    F: Fn() -> Result<serde_json::Value> + Send + Sync,
{
    fn snapshot(&self) -> Result<serde_json::Value> {
        self()
    }
}

/// Registry configuration.
#[derive(Clone, Debug)]
pub struct RegistryConfig {
    /// Pending recompute jobs per subscription. Further notifications are
    /// coalesced into the jobs already queued.
    /// Default: 64
    pub queue_capacity: usize,

    /// Active subscriptions one connection may hold. Each one owns a worker
    /// thread; replacing an existing id does not count against the limit.
    /// Default: 256
    pub max_per_connection: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 64,
            max_per_connection: 256,
        }
    }
}

/// Public view of an active subscription.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubscriptionSummary {
    pub id: SubscriptionId,
    pub connection: ConnectionId,
    pub record_types: Vec<String>,
}
