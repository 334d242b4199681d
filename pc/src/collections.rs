//! Collection registry
//!
//! Collections are user-named, ordered groupings of strategy keys. They are
//! stored independently of the catalog in a single JSON file:
//!
//! ```json
//! { "collections": { "demo": { "name": "...", "description": "...",
//!   "strategies": ["star"], "created": "...", "updated": "..." } } }
//! ```
//!
//! Every mutation rewrites the whole file before the in-memory state is
//! committed. Strategy keys are soft references; [`CollectionRegistry::validate`]
//! reports the dangling ones without touching anything.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::catalog::StrategyLookup;
use crate::error::{CatalogError, ErrorKind, Result};

/// Environment variable naming an explicit collections file
pub const COLLECTIONS_ENV: &str = "PROMPTCATALOG_COLLECTIONS_FILE";

static KEY_FORMAT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("valid key regex"));

/// A named grouping of strategy keys
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub strategies: Vec<String>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

/// Full registry state, also the on-disk format
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionsSnapshot {
    #[serde(default)]
    pub collections: BTreeMap<String, Collection>,
}

/// Partial update for [`CollectionRegistry::update`]
#[derive(Debug, Clone, Default)]
pub struct CollectionUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// Strategy references of a collection split by whether the catalog knows them
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CollectionValidation {
    pub valid: Vec<String>,
    pub invalid: Vec<String>,
}

/// Default registry file: `$PROMPTCATALOG_COLLECTIONS_FILE`, else the user config dir
pub fn default_collections_path() -> PathBuf {
    if let Ok(path) = std::env::var(COLLECTIONS_ENV)
        && !path.is_empty()
    {
        return PathBuf::from(path);
    }
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("promptcatalog")
        .join("collections.json")
}

/// Check a collection key against the allowed format
pub fn validate_key(key: &str) -> Result<()> {
    if KEY_FORMAT.is_match(key) {
        Ok(())
    } else {
        Err(CatalogError::new(
            ErrorKind::InvalidKey,
            format!("Invalid collection key '{}': use letters, digits, '_' or '-'", key),
        )
        .with("collection", key))
    }
}

/// Persistent store of collections
#[derive(Debug)]
pub struct CollectionRegistry {
    path: PathBuf,
    data: CollectionsSnapshot,
}

impl CollectionRegistry {
    /// Open the registry at `path`
    ///
    /// A missing file yields an empty registry. An unreadable or corrupt file
    /// is logged and also yields an empty registry; the file is left alone
    /// until the next mutation.
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        debug!(?path, "CollectionRegistry::open: called");

        let data = if path.exists() {
            match load(&path) {
                Ok(data) => {
                    info!(
                        count = data.collections.len(),
                        path = %path.display(),
                        "Loaded collections"
                    );
                    data
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to load collections file, starting empty");
                    CollectionsSnapshot::default()
                }
            }
        } else {
            debug!(?path, "No collections file found, starting empty");
            CollectionsSnapshot::default()
        };

        Self { path, data }
    }

    /// Open the registry at [`default_collections_path`]
    pub fn open_default() -> Self {
        Self::open(default_collections_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist `next` and only then make it the live state
    fn commit(&mut self, next: CollectionsSnapshot) -> Result<()> {
        save(&self.path, &next)?;
        self.data = next;
        Ok(())
    }

    pub fn create(&mut self, key: &str, name: &str, description: &str) -> Result<()> {
        debug!(%key, %name, "CollectionRegistry::create: called");
        validate_key(key)?;
        if self.data.collections.contains_key(key) {
            return Err(
                CatalogError::new(ErrorKind::CollectionExists, format!("Collection '{}' already exists", key))
                    .with("collection", key),
            );
        }

        let now = Utc::now();
        let mut next = self.data.clone();
        next.collections.insert(
            key.to_string(),
            Collection {
                name: name.to_string(),
                description: description.to_string(),
                strategies: Vec::new(),
                created: now,
                updated: now,
            },
        );
        self.commit(next)?;
        info!(collection = %key, "Created collection");
        Ok(())
    }

    pub fn delete(&mut self, key: &str) -> Result<()> {
        debug!(%key, "CollectionRegistry::delete: called");
        let mut next = self.data.clone();
        if next.collections.remove(key).is_none() {
            return Err(CatalogError::collection_not_found(key));
        }
        self.commit(next)?;
        info!(collection = %key, "Deleted collection");
        Ok(())
    }

    /// Append `strategy` to the collection; a no-op if already present
    ///
    /// Returns whether the collection changed.
    pub fn add_strategy(&mut self, key: &str, strategy: &str) -> Result<bool> {
        debug!(%key, %strategy, "CollectionRegistry::add_strategy: called");
        let mut next = self.data.clone();
        let collection = next
            .collections
            .get_mut(key)
            .ok_or_else(|| CatalogError::collection_not_found(key))?;
        if collection.strategies.iter().any(|s| s == strategy) {
            debug!(%key, %strategy, "add_strategy: already present");
            return Ok(false);
        }
        collection.strategies.push(strategy.to_string());
        collection.updated = Utc::now();
        self.commit(next)?;
        info!(collection = %key, %strategy, "Added strategy to collection");
        Ok(true)
    }

    /// Remove `strategy` from the collection; a no-op if absent
    ///
    /// Returns whether the collection changed.
    pub fn remove_strategy(&mut self, key: &str, strategy: &str) -> Result<bool> {
        debug!(%key, %strategy, "CollectionRegistry::remove_strategy: called");
        let mut next = self.data.clone();
        let collection = next
            .collections
            .get_mut(key)
            .ok_or_else(|| CatalogError::collection_not_found(key))?;
        let Some(index) = collection.strategies.iter().position(|s| s == strategy) else {
            debug!(%key, %strategy, "remove_strategy: not present");
            return Ok(false);
        };
        collection.strategies.remove(index);
        collection.updated = Utc::now();
        self.commit(next)?;
        info!(collection = %key, %strategy, "Removed strategy from collection");
        Ok(true)
    }

    pub fn update(&mut self, key: &str, update: CollectionUpdate) -> Result<()> {
        debug!(%key, ?update, "CollectionRegistry::update: called");
        let mut next = self.data.clone();
        let collection = next
            .collections
            .get_mut(key)
            .ok_or_else(|| CatalogError::collection_not_found(key))?;
        if let Some(name) = update.name {
            collection.name = name;
        }
        if let Some(description) = update.description {
            collection.description = description;
        }
        collection.updated = Utc::now();
        self.commit(next)?;
        info!(collection = %key, "Updated collection");
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&Collection> {
        self.data.collections.get(key)
    }

    pub fn list(&self) -> &BTreeMap<String, Collection> {
        &self.data.collections
    }

    pub fn names(&self) -> Vec<String> {
        self.data.collections.keys().cloned().collect()
    }

    /// Strategy keys of a collection, empty if it does not exist
    pub fn strategies(&self, key: &str) -> Vec<String> {
        self.data
            .collections
            .get(key)
            .map(|c| c.strategies.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.data.collections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.collections.is_empty()
    }

    /// Full copy of the registry state for backup
    pub fn export(&self) -> CollectionsSnapshot {
        self.data.clone()
    }

    /// Replace the whole registry with `snapshot` and persist it
    pub fn import(&mut self, snapshot: CollectionsSnapshot) -> Result<()> {
        debug!(count = snapshot.collections.len(), "CollectionRegistry::import: called");
        for key in snapshot.collections.keys() {
            validate_key(key)?;
        }
        self.commit(snapshot)?;
        info!(count = self.data.collections.len(), "Imported collections");
        Ok(())
    }

    /// Partition a collection's strategy keys into known and unknown
    ///
    /// Read-only: dangling references are reported, never dropped.
    /// Returns `None` if the collection does not exist.
    pub fn validate(&self, key: &str, catalog: &impl StrategyLookup) -> Option<CollectionValidation> {
        let collection = self.data.collections.get(key)?;
        let (valid, invalid) = collection
            .strategies
            .iter()
            .cloned()
            .partition(|s| catalog.contains_strategy(s));
        Some(CollectionValidation { valid, invalid })
    }
}

fn load(path: &Path) -> Result<CollectionsSnapshot> {
    let content = fs::read_to_string(path).map_err(|e| CatalogError::io(path, e))?;
    serde_json::from_str(&content).map_err(|e| CatalogError::parse(path, e))
}

fn save(path: &Path, data: &CollectionsSnapshot) -> Result<()> {
    let persistence = |message: String| CatalogError::new(ErrorKind::Persistence, message).with("path", path.display());

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .map_err(|e| persistence(format!("Failed to create {}: {}", parent.display(), e)).with_source(e))?;
    }

    let content = serde_json::to_string_pretty(data)
        .map_err(|e| persistence(format!("Failed to serialize collections: {}", e)).with_source(e))?;

    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, content)
        .map_err(|e| persistence(format!("Failed to write {}: {}", tmp.display(), e)).with_source(e))?;
    fs::rename(&tmp, path)
        .map_err(|e| persistence(format!("Failed to replace {}: {}", path.display(), e)).with_source(e))?;

    debug!(path = %path.display(), count = data.collections.len(), "Saved collections");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::collections::HashSet;
    use tempfile::TempDir;

    fn registry(temp: &TempDir) -> CollectionRegistry {
        CollectionRegistry::open(temp.path().join("nested/collections.json"))
    }

    #[test]
    fn test_create_persists_immediately() {
        let temp = TempDir::new().unwrap();
        let mut reg = registry(&temp);
        reg.create("demo", "Demo", "A demo").unwrap();

        let reopened = registry(&temp);
        let demo = reopened.get("demo").unwrap();
        assert_eq!(demo.name, "Demo");
        assert!(demo.strategies.is_empty());
        assert_eq!(demo.created, demo.updated);
    }

    #[test]
    fn test_create_duplicate_fails() {
        let temp = TempDir::new().unwrap();
        let mut reg = registry(&temp);
        reg.create("demo", "Demo", "d").unwrap();
        let err = reg.create("demo", "Again", "d").unwrap_err();
        assert_eq!(err.kind, ErrorKind::CollectionExists);
        assert_eq!(reg.get("demo").unwrap().name, "Demo");
    }

    #[test]
    fn test_create_rejects_bad_key() {
        let temp = TempDir::new().unwrap();
        let mut reg = registry(&temp);
        let err = reg.create("bad key!", "n", "d").unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidKey);
        assert!(reg.is_empty());
        assert!(!reg.path().exists());
    }

    #[test]
    fn test_add_and_remove_are_idempotent() {
        let temp = TempDir::new().unwrap();
        let mut reg = registry(&temp);
        reg.create("demo", "Demo", "d").unwrap();

        assert!(reg.add_strategy("demo", "star").unwrap());
        assert!(!reg.add_strategy("demo", "star").unwrap());
        assert!(reg.add_strategy("demo", "arpe").unwrap());
        assert_eq!(reg.strategies("demo"), vec!["star", "arpe"]);

        assert!(reg.remove_strategy("demo", "star").unwrap());
        assert!(!reg.remove_strategy("demo", "star").unwrap());
        assert_eq!(reg.strategies("demo"), vec!["arpe"]);

        assert_eq!(registry(&temp).strategies("demo"), vec!["arpe"]);
    }

    #[test]
    fn test_mutations_on_missing_collection_fail() {
        let temp = TempDir::new().unwrap();
        let mut reg = registry(&temp);
        assert_eq!(
            reg.add_strategy("nope", "star").unwrap_err().kind,
            ErrorKind::CollectionNotFound
        );
        assert_eq!(
            reg.remove_strategy("nope", "star").unwrap_err().kind,
            ErrorKind::CollectionNotFound
        );
        assert_eq!(reg.delete("nope").unwrap_err().kind, ErrorKind::CollectionNotFound);
        assert!(reg.strategies("nope").is_empty());
    }

    #[test]
    fn test_update_refreshes_timestamp() {
        let temp = TempDir::new().unwrap();
        let mut reg = registry(&temp);
        reg.create("demo", "Demo", "d").unwrap();
        let before = reg.get("demo").unwrap().clone();

        std::thread::sleep(std::time::Duration::from_millis(5));
        reg.update(
            "demo",
            CollectionUpdate {
                description: Some("new".to_string()),
                ..Default::default()
            },
        )
        .unwrap();

        let after = reg.get("demo").unwrap();
        assert_eq!(after.name, "Demo");
        assert_eq!(after.description, "new");
        assert_eq!(after.created, before.created);
        assert!(after.updated > before.updated);
    }

    #[test]
    fn test_delete() {
        let temp = TempDir::new().unwrap();
        let mut reg = registry(&temp);
        reg.create("demo", "Demo", "d").unwrap();
        reg.delete("demo").unwrap();
        assert!(registry(&temp).get("demo").is_none());
    }

    #[test]
    fn test_export_import_round_trip() {
        let temp = TempDir::new().unwrap();
        let mut source = CollectionRegistry::open(temp.path().join("a.json"));
        source.create("demo", "Demo", "d").unwrap();
        source.add_strategy("demo", "star").unwrap();
        source.create("other", "Other", "o").unwrap();

        let mut target = CollectionRegistry::open(temp.path().join("b.json"));
        target.import(source.export()).unwrap();

        assert_eq!(target.export(), source.export());
        assert_eq!(CollectionRegistry::open(temp.path().join("b.json")).export(), source.export());
    }

    #[test]
    fn test_validate_partitions_references() {
        let temp = TempDir::new().unwrap();
        let mut reg = registry(&temp);
        reg.create("demo", "demo", "d").unwrap();
        reg.add_strategy("demo", "star").unwrap();
        reg.add_strategy("demo", "ghost").unwrap();

        let known: HashSet<String> = ["star".to_string()].into_iter().collect();
        let result = reg.validate("demo", &known).unwrap();
        assert_eq!(result.valid, vec!["star"]);
        assert_eq!(result.invalid, vec!["ghost"]);
        // Dangling reference is still there
        assert_eq!(reg.strategies("demo"), vec!["star", "ghost"]);
        assert!(reg.validate("nope", &known).is_none());
    }

    #[test]
    fn test_corrupt_file_starts_empty() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("collections.json");
        fs::write(&path, "{not json").unwrap();
        let reg = CollectionRegistry::open(&path);
        assert!(reg.is_empty());
        assert_eq!(fs::read_to_string(&path).unwrap(), "{not json");
    }

    #[test]
    #[serial]
    fn test_default_path_honors_env() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("custom.json");
        // SAFETY: serialized with the other env-mutating tests
        unsafe { std::env::set_var(COLLECTIONS_ENV, &path) };
        assert_eq!(default_collections_path(), path);
        unsafe { std::env::remove_var(COLLECTIONS_ENV) };
        assert!(default_collections_path().ends_with("promptcatalog/collections.json"));
    }
}
