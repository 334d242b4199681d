//! Strategy catalog
//!
//! The catalog is the merged, in-memory view of every strategy document and
//! category metadata file found under two roots:
//!
//! ```text
//! metaprompts/                 # built-in root (mandatory)
//! ├── core/
//! │   ├── _metadata.json       # category metadata
//! │   ├── star.json            # key: star
//! │   └── arpe.json            # key: arpe
//! └── analysis/
//!     └── ...
//! custom/                      # custom root (optional)
//! └── extra/
//!     └── star.json            # key: custom_extra_star
//! ```
//!
//! Every scan rebuilds both maps from scratch and swaps them in whole, so a
//! query sees either the previous catalog or the new one, never a mix.
//! [`StrategyCatalog::request_reload`] is the entry point for watch-driven
//! reloads and coalesces overlapping requests through a [`ReloadGate`].

mod gate;
mod loader;
pub mod model;
pub mod watch;

pub use gate::ReloadGate;
pub use loader::SkippedFile;
pub use model::{CategoryMetadata, Level, PLACEHOLDER, Source, StrategyDocument, StrategySummary};
pub use watch::CatalogWatcher;

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard};
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::cache::{CacheStats, ContentStore};
use crate::error::Result;
use loader::{CatalogMaps, FileCache};

/// The two directory roots a catalog is built from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogRoots {
    /// Mandatory built-in strategies root
    pub builtin: PathBuf,
    /// Optional user override/addition root
    pub custom: Option<PathBuf>,
}

impl CatalogRoots {
    pub fn new(builtin: impl Into<PathBuf>, custom: Option<PathBuf>) -> Self {
        Self {
            builtin: builtin.into(),
            custom,
        }
    }

    /// All configured roots, built-in first
    pub fn all(&self) -> Vec<PathBuf> {
        let mut roots = vec![self.builtin.clone()];
        roots.extend(self.custom.clone());
        roots
    }
}

/// Lifecycle of a catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogState {
    Uninitialized,
    Loading,
    Ready,
    Refreshing,
    /// First load failed; terminal
    Failed,
    /// Maps cleared by [`StrategyCatalog::shutdown`]; terminal
    Shutdown,
}

impl fmt::Display for CatalogState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CatalogState::Uninitialized => "uninitialized",
            CatalogState::Loading => "loading",
            CatalogState::Ready => "ready",
            CatalogState::Refreshing => "refreshing",
            CatalogState::Failed => "failed",
            CatalogState::Shutdown => "shutdown",
        };
        f.write_str(s)
    }
}

/// Point-in-time counters for a catalog
#[derive(Debug, Clone, Serialize)]
pub struct CatalogStats {
    pub state: CatalogState,
    /// Number of completed loads (initial load counts as 1)
    pub generation: u64,
    pub strategies: usize,
    pub builtin: usize,
    pub custom: usize,
    pub categories: usize,
    pub skipped: Vec<SkippedFile>,
    pub content_cache: Option<CacheStats>,
}

/// Anything that can answer "does this strategy key exist"
pub trait StrategyLookup {
    fn contains_strategy(&self, key: &str) -> bool;
}

impl StrategyLookup for HashSet<String> {
    fn contains_strategy(&self, key: &str) -> bool {
        self.contains(key)
    }
}

/// In-memory merged catalog of strategy documents
pub struct StrategyCatalog {
    roots: CatalogRoots,
    maps: RwLock<CatalogMaps>,
    state: Mutex<CatalogState>,
    generation: AtomicU64,
    gate: ReloadGate,
    /// Held for the whole of a refresh so scans install in the order they ran
    scan: Mutex<()>,
    content: FileCache,
}

impl fmt::Debug for StrategyCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrategyCatalog")
            .field("roots", &self.roots)
            .field("state", &self.state())
            .field("generation", &self.generation())
            .finish()
    }
}

/// Default lifetime of cached file parses
pub const DEFAULT_CONTENT_TTL: Duration = Duration::from_secs(300);

impl StrategyCatalog {
    /// Load the catalog synchronously
    ///
    /// Fails if the built-in root (or one of its category directories) cannot
    /// be read. A missing or unreadable custom root is skipped with a warning.
    pub fn initialize(roots: CatalogRoots) -> Result<Self> {
        Self::initialize_with_ttl(roots, DEFAULT_CONTENT_TTL)
    }

    /// Like [`initialize`](Self::initialize) with an explicit content cache TTL
    pub fn initialize_with_ttl(roots: CatalogRoots, content_ttl: Duration) -> Result<Self> {
        debug!(?roots, ?content_ttl, "StrategyCatalog::initialize: called");
        let catalog = Self {
            roots,
            maps: RwLock::new(CatalogMaps::default()),
            state: Mutex::new(CatalogState::Uninitialized),
            generation: AtomicU64::new(0),
            gate: ReloadGate::new(),
            scan: Mutex::new(()),
            content: Mutex::new(ContentStore::new(content_ttl)),
        };

        catalog.set_state(CatalogState::Loading);
        match loader::scan(&catalog.roots, &catalog.content) {
            Ok(maps) => {
                catalog.install(maps);
                catalog.set_state(CatalogState::Ready);
                info!(
                    strategies = catalog.len(),
                    builtin = %catalog.roots.builtin.display(),
                    "Strategy catalog ready"
                );
                Ok(catalog)
            }
            Err(e) => {
                catalog.set_state(CatalogState::Failed);
                e.log();
                Err(e)
            }
        }
    }

    pub fn roots(&self) -> &CatalogRoots {
        &self.roots
    }

    pub fn state(&self) -> CatalogState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, next: CatalogState) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let from = *state;
        debug!(%from, to = %next, "StrategyCatalog::set_state");
        *state = next;
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn read(&self) -> RwLockReadGuard<'_, CatalogMaps> {
        self.maps.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Swap in freshly scanned maps unless the catalog was shut down meanwhile
    ///
    /// The state is checked while the maps write lock is held, and `shutdown`
    /// clears the maps under the same lock after setting its state, so a
    /// discarded or installed scan can never outlive a shutdown.
    fn install(&self, maps: CatalogMaps) -> bool {
        let mut guard = self.maps.write().unwrap_or_else(|e| e.into_inner());
        if self.state() == CatalogState::Shutdown {
            debug!("install: catalog shut down during scan, discarding");
            return false;
        }
        *guard = maps;
        self.generation.fetch_add(1, Ordering::SeqCst);
        true
    }

    /// Move an active catalog to `Refreshing` in one step
    ///
    /// Returns the state that blocked the transition, if any.
    fn begin_refresh(&self) -> std::result::Result<(), CatalogState> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        match *state {
            CatalogState::Shutdown | CatalogState::Failed => Err(*state),
            from => {
                debug!(%from, to = %CatalogState::Refreshing, "StrategyCatalog::begin_refresh");
                *state = CatalogState::Refreshing;
                Ok(())
            }
        }
    }

    /// Rebuild the whole catalog from disk
    ///
    /// On failure the previous maps stay in place and the error is returned.
    /// Two calls with no filesystem change in between produce identical maps.
    /// Concurrent calls run one at a time. A refresh that overlaps
    /// [`shutdown`](Self::shutdown) discards its scan.
    pub fn refresh(&self) -> Result<()> {
        debug!("StrategyCatalog::refresh: called");
        let _scan = self.scan.lock().unwrap_or_else(|e| e.into_inner());

        if let Err(state) = self.begin_refresh() {
            warn!(%state, "Ignoring refresh on inactive catalog");
            return Ok(());
        }

        let result = loader::scan(&self.roots, &self.content);
        let outcome = match result {
            Ok(maps) => {
                if self.install(maps) {
                    info!(
                        strategies = self.len(),
                        generation = self.generation(),
                        "Strategy catalog refreshed"
                    );
                }
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Catalog refresh failed, keeping previous catalog");
                Err(e)
            }
        };
        // shutdown() may have run while the scan was in flight
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if *state == CatalogState::Refreshing {
            *state = CatalogState::Ready;
        }
        outcome
    }

    /// Reload unless a reload is already running; in that case mark one more
    /// reload as pending for the running reloader to pick up
    ///
    /// Returns the number of reload passes this call performed (0 when the
    /// request was folded into an in-flight reload).
    pub fn request_reload(&self) -> usize {
        if !self.gate.try_begin() {
            debug!("request_reload: coalesced into in-flight reload");
            return 0;
        }

        let mut passes = 0;
        loop {
            passes += 1;
            // Errors are already logged by refresh; the previous catalog stays live
            let _ = self.refresh();
            if !self.gate.finish() {
                break;
            }
        }
        debug!(passes, "request_reload: complete");
        passes
    }

    pub fn reload_gate(&self) -> &ReloadGate {
        &self.gate
    }

    /// Drop expired parses from the content cache
    pub fn sweep_content_cache(&self) -> usize {
        match self.content.lock() {
            Ok(mut cache) => cache.cleanup(),
            Err(_) => 0,
        }
    }

    /// Clear every map and stop accepting refreshes
    ///
    /// The state flips before the maps are cleared, so a scan still in flight
    /// sees `Shutdown` when it tries to install and is dropped.
    pub fn shutdown(&self) {
        debug!("StrategyCatalog::shutdown: called");
        self.set_state(CatalogState::Shutdown);
        {
            let mut maps = self.maps.write().unwrap_or_else(|e| e.into_inner());
            maps.strategies.clear();
            maps.categories.clear();
            maps.skipped.clear();
        }
        if let Ok(mut cache) = self.content.lock() {
            cache.clear();
        }
        info!("Strategy catalog shut down");
    }

    pub fn get_strategy(&self, key: &str) -> Option<Arc<StrategyDocument>> {
        let found = self.read().strategies.get(key).cloned();
        debug!(%key, found = found.is_some(), "StrategyCatalog::get_strategy");
        found
    }

    pub fn get_all_categories_metadata(&self) -> BTreeMap<String, CategoryMetadata> {
        self.read().categories.clone()
    }

    pub fn get_category(&self, category: &str) -> Option<CategoryMetadata> {
        self.read().categories.get(category).cloned()
    }

    /// Strategy keys, sorted
    pub fn list_keys(&self) -> Vec<String> {
        self.read().strategies.keys().cloned().collect()
    }

    /// All documents, sorted by key
    pub fn strategies(&self) -> Vec<Arc<StrategyDocument>> {
        self.read().strategies.values().cloned().collect()
    }

    /// Documents whose stored `category` field matches
    pub fn strategies_in_category(&self, category: &str) -> Vec<Arc<StrategyDocument>> {
        self.read()
            .strategies
            .values()
            .filter(|doc| doc.category == category)
            .cloned()
            .collect()
    }

    pub fn strategies_by_source(&self, source: Source) -> Vec<Arc<StrategyDocument>> {
        self.read()
            .strategies
            .values()
            .filter(|doc| doc.source == source)
            .cloned()
            .collect()
    }

    /// Key → (name, description) for every strategy
    pub fn list_strategies(&self) -> BTreeMap<String, (String, String)> {
        self.read()
            .strategies
            .iter()
            .map(|(key, doc)| (key.clone(), (doc.name.clone(), doc.description.clone())))
            .collect()
    }

    /// Every `(example, key)` pair across the catalog
    pub fn strategy_examples(&self) -> Vec<(String, String)> {
        self.read()
            .strategies
            .iter()
            .flat_map(|(key, doc)| doc.examples.iter().map(move |ex| (ex.clone(), key.clone())))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.read().strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().strategies.is_empty()
    }

    pub fn stats(&self) -> CatalogStats {
        let maps = self.read();
        let custom = maps.strategies.values().filter(|d| d.source == Source::Custom).count();
        CatalogStats {
            state: self.state(),
            generation: self.generation(),
            strategies: maps.strategies.len(),
            builtin: maps.strategies.len() - custom,
            custom,
            categories: maps.categories.len(),
            skipped: maps.skipped.clone(),
            content_cache: self.content.lock().ok().map(|c| c.stats()),
        }
    }
}

impl StrategyLookup for StrategyCatalog {
    fn contains_strategy(&self, key: &str) -> bool {
        self.read().strategies.contains_key(key)
    }
}
