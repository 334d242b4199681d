//! promptcatalog - layered, hot-reloading catalog of prompt strategies
//!
//! Strategy documents are JSON files grouped into category directories under a
//! built-in root and an optional custom root. The catalog merges both into one
//! keyed, in-memory view, reloads it when the directories change, and lets
//! users group strategies into persisted collections.
//!
//! # Architecture
//!
//! ```text
//! StrategyService
//! ├── Arc<StrategyCatalog>      # merged maps, reload gate, content cache
//! │   └── CatalogWatcher        # notify subscription → coalesced reloads
//! ├── CollectionRegistry        # collections.json
//! └── LruCache                  # resolved collections per catalog generation
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use promptcatalog::{CatalogRoots, CollectionRegistry, StrategyCatalog, StrategyService};
//! use promptcatalog::config::CacheConfig;
//!
//! let catalog = Arc::new(StrategyCatalog::initialize(CatalogRoots::new("metaprompts", None))?);
//! let service = StrategyService::new(catalog, CollectionRegistry::open_default(), &CacheConfig::default());
//! let star = service.get_strategy("star");
//! ```

pub mod cache;
pub mod catalog;
pub mod cli;
pub mod collections;
pub mod config;
pub mod error;
pub mod schema;
pub mod service;

pub use catalog::{
    CatalogRoots, CatalogState, CatalogStats, CatalogWatcher, CategoryMetadata, Level, PLACEHOLDER, Source,
    StrategyCatalog, StrategyDocument, StrategyLookup, StrategySummary,
};
pub use collections::{Collection, CollectionRegistry, CollectionUpdate, CollectionValidation, CollectionsSnapshot};
pub use error::{CatalogError, ErrorKind, Result, Severity};
pub use service::{HealthReport, SourceFilter, StrategyFilter, StrategyService};
