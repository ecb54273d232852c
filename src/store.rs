//! Main Store struct tying storage, repos and the change feed together.

use crate::model::{Model, Schema};
use crate::repo::{ChangeEvent, ChangeFeed, Repo, RepoConfig, TypedRepo};
use crate::storage::Storage;
use crossbeam_channel::Receiver;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Store configuration.
#[derive(Clone, Debug, Default)]
pub struct StoreConfig {
    /// Applied to every repo the store creates.
    pub repo: RepoConfig,
}

/// Owns the storage handle and one [`Repo`] per record type.
///
/// Every repo publishes to the same [`ChangeFeed`], so one receiver from
/// [`Store::changes`] sees mutations of all record types.
pub struct Store {
    config: StoreConfig,
    storage: Arc<dyn Storage>,
    repos: RwLock<HashMap<&'static str, Arc<Repo>>>,
    feed: ChangeFeed,
}

impl Store {
    pub fn new(storage: Arc<dyn Storage>, config: StoreConfig) -> Self {
        Self {
            config,
            storage,
            repos: RwLock::new(HashMap::new()),
            feed: ChangeFeed::new(),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Typed repo for `M`.
    pub fn repo<M: Model>(&self) -> TypedRepo<M> {
        TypedRepo::new(self.repo_for(M::schema()))
    }

    /// The repo for a record type, created on first use.
    pub fn repo_for(&self, schema: Schema) -> Arc<Repo> {
        if let Some(repo) = self.repos.read().get(schema.name) {
            return Arc::clone(repo);
        }

        let mut repos = self.repos.write();
        let repo = repos.entry(schema.name).or_insert_with(|| {
            debug!(record_type = schema.name, "creating repo");
            Arc::new(Repo::new(
                schema,
                Arc::clone(&self.storage),
                self.config.repo.clone(),
                self.feed.clone(),
            ))
        });
        Arc::clone(repo)
    }

    /// Receive every change event published from now on.
    pub fn changes(&self) -> Receiver<ChangeEvent> {
        self.feed.subscribe()
    }

    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    /// Record types with a repo so far.
    pub fn record_types(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.repos.read().keys().copied().collect();
        names.sort_unstable();
        names
    }
}
