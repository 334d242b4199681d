//! Strategy service
//!
//! The single query surface over a shared [`StrategyCatalog`] and a
//! [`CollectionRegistry`]. Lookups that find nothing return `None` or an empty
//! list; only collection mutations return errors.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use clap::ValueEnum;
use serde::Serialize;
use tracing::debug;

use crate::cache::{CacheStats, LruCache};
use crate::catalog::{CatalogState, CatalogStats, CategoryMetadata, Source, StrategyCatalog, StrategyDocument};
use crate::collections::{Collection, CollectionRegistry, CollectionUpdate, CollectionValidation, CollectionsSnapshot};
use crate::config::CacheConfig;
use crate::error::Result;

/// Which documents a listing includes by origin
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum SourceFilter {
    #[default]
    All,
    #[value(name = "built-in")]
    BuiltIn,
    Custom,
}

impl SourceFilter {
    pub fn matches(self, source: Source) -> bool {
        match self {
            SourceFilter::All => true,
            SourceFilter::BuiltIn => source == Source::BuiltIn,
            SourceFilter::Custom => source == Source::Custom,
        }
    }
}

/// Listing filter for [`StrategyService::list_strategies`]
#[derive(Debug, Clone, Default)]
pub struct StrategyFilter {
    pub source: SourceFilter,
    /// Restrict to the members of this collection
    pub collection: Option<String>,
}

/// Point-in-time view of the service
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub healthy: bool,
    pub catalog: CatalogStats,
    pub collections: usize,
    pub collection_cache: Option<CacheStats>,
}

type Resolved = Arc<Vec<Arc<StrategyDocument>>>;

pub struct StrategyService {
    catalog: Arc<StrategyCatalog>,
    registry: Mutex<CollectionRegistry>,
    /// (collection key, catalog generation) → resolved documents
    resolved: Mutex<LruCache<(String, u64), Resolved>>,
    ttl: Option<Duration>,
}

impl std::fmt::Debug for StrategyService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyService")
            .field("catalog", &self.catalog)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl StrategyService {
    pub fn new(catalog: Arc<StrategyCatalog>, registry: CollectionRegistry, cache: &CacheConfig) -> Self {
        debug!(?cache, "StrategyService::new: called");
        Self {
            catalog,
            registry: Mutex::new(registry),
            resolved: Mutex::new(LruCache::new(cache.capacity)),
            ttl: cache.ttl(),
        }
    }

    pub fn catalog(&self) -> &Arc<StrategyCatalog> {
        &self.catalog
    }

    fn registry(&self) -> MutexGuard<'_, CollectionRegistry> {
        self.registry.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn invalidate(&self) {
        if let Ok(mut resolved) = self.resolved.lock() {
            resolved.clear();
        }
    }

    pub fn get_strategy(&self, key: &str) -> Option<Arc<StrategyDocument>> {
        self.catalog.get_strategy(key)
    }

    pub fn get_all_categories_metadata(&self) -> BTreeMap<String, CategoryMetadata> {
        self.catalog.get_all_categories_metadata()
    }

    pub fn get_category(&self, category: &str) -> Option<CategoryMetadata> {
        self.catalog.get_category(category)
    }

    /// Documents matching `filter`, in key order
    ///
    /// With a collection, documents follow the collection's order and dangling
    /// references are left out. An unknown collection yields nothing.
    pub fn list_strategies(&self, filter: &StrategyFilter) -> Vec<Arc<StrategyDocument>> {
        debug!(?filter, "StrategyService::list_strategies: called");
        let docs = match &filter.collection {
            Some(key) => match self.resolve_collection(key) {
                Some(resolved) => resolved.as_ref().clone(),
                None => return Vec::new(),
            },
            None => self.catalog.strategies(),
        };
        docs.into_iter().filter(|doc| filter.source.matches(doc.source)).collect()
    }

    /// Strategy keys stored in a collection, empty if it does not exist
    pub fn get_collection_strategies(&self, key: &str) -> Vec<String> {
        self.registry().strategies(key)
    }

    /// Documents a collection refers to, skipping unknown keys
    ///
    /// Returns `None` if the collection does not exist. Results are memoized
    /// per catalog generation, so a reload never serves stale documents.
    pub fn resolve_collection(&self, key: &str) -> Option<Resolved> {
        let memo_key = (key.to_string(), self.catalog.generation());
        if let Ok(mut resolved) = self.resolved.lock()
            && let Some(hit) = resolved.get(&memo_key)
        {
            debug!(%key, "resolve_collection: cache hit");
            return Some(hit);
        }

        let members = self.registry().get(key)?.strategies.clone();
        let docs: Resolved = Arc::new(
            members
                .iter()
                .filter_map(|member| self.catalog.get_strategy(member))
                .collect(),
        );
        debug!(%key, members = members.len(), resolved = docs.len(), "resolve_collection: resolved");

        if let Ok(mut resolved) = self.resolved.lock() {
            resolved.set(memo_key, Arc::clone(&docs), self.ttl);
        }
        Some(docs)
    }

    pub fn get_collection(&self, key: &str) -> Option<Collection> {
        self.registry().get(key).cloned()
    }

    pub fn list_collections(&self) -> BTreeMap<String, Collection> {
        self.registry().list().clone()
    }

    pub fn create_collection(&self, key: &str, name: &str, description: &str) -> Result<()> {
        self.registry().create(key, name, description)?;
        self.invalidate();
        Ok(())
    }

    pub fn delete_collection(&self, key: &str) -> Result<()> {
        self.registry().delete(key)?;
        self.invalidate();
        Ok(())
    }

    pub fn add_to_collection(&self, key: &str, strategy: &str) -> Result<bool> {
        let changed = self.registry().add_strategy(key, strategy)?;
        if changed {
            self.invalidate();
        }
        Ok(changed)
    }

    pub fn remove_from_collection(&self, key: &str, strategy: &str) -> Result<bool> {
        let changed = self.registry().remove_strategy(key, strategy)?;
        if changed {
            self.invalidate();
        }
        Ok(changed)
    }

    pub fn update_collection(&self, key: &str, update: CollectionUpdate) -> Result<()> {
        self.registry().update(key, update)
    }

    pub fn export_collections(&self) -> CollectionsSnapshot {
        self.registry().export()
    }

    pub fn import_collections(&self, snapshot: CollectionsSnapshot) -> Result<()> {
        self.registry().import(snapshot)?;
        self.invalidate();
        Ok(())
    }

    /// Split a collection's references into known and unknown keys
    pub fn validate_collection(&self, key: &str) -> Option<CollectionValidation> {
        self.registry().validate(key, self.catalog.as_ref())
    }

    pub fn health(&self) -> HealthReport {
        let catalog = self.catalog.stats();
        HealthReport {
            healthy: matches!(catalog.state, CatalogState::Ready | CatalogState::Refreshing),
            catalog,
            collections: self.registry().len(),
            collection_cache: self.resolved.lock().ok().map(|c| c.stats()),
        }
    }
}
