//! Directory walking and per-file loading
//!
//! A scan reads every category directory under the built-in root and then the
//! custom root, validates each JSON file and builds a fresh pair of maps. A
//! bad file is logged and skipped; only an unreadable built-in root or
//! built-in category directory aborts the scan.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::CatalogRoots;
use super::model::{
    CategoryMetadata, METADATA_FILE, MetadataFile, PLACEHOLDER, Source, StrategyDocument, StrategyFile,
    StrategySummary, builtin_key, category_key, custom_key,
};
use crate::cache::ContentStore;
use crate::error::{CatalogError, ErrorKind, Result};
use crate::schema;

/// Parsed JSON plus the file metadata it was read with
#[derive(Debug, Clone)]
pub(crate) struct CachedFile {
    modified: Option<SystemTime>,
    len: u64,
    value: Arc<Value>,
}

pub(crate) type FileCache = Mutex<ContentStore<PathBuf, CachedFile>>;

/// A file that was excluded from the catalog during a scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Result of one full scan
#[derive(Debug, Clone, Default)]
pub(crate) struct CatalogMaps {
    pub strategies: BTreeMap<String, Arc<StrategyDocument>>,
    pub categories: BTreeMap<String, CategoryMetadata>,
    pub skipped: Vec<SkippedFile>,
}

/// Scan both roots into a fresh set of maps
pub(crate) fn scan(roots: &CatalogRoots, cache: &FileCache) -> Result<CatalogMaps> {
    debug!(builtin = ?roots.builtin, custom = ?roots.custom, "scan: called");
    let mut scanner = Scanner {
        cache,
        maps: CatalogMaps::default(),
        output_focus: BTreeMap::new(),
    };

    let builtin_dirs = list_category_dirs(&roots.builtin).map_err(|e| CatalogError::missing_root(&roots.builtin, e))?;
    for dir in builtin_dirs {
        scanner.load_category(&dir, Source::BuiltIn)?;
    }

    if let Some(custom) = &roots.custom {
        match list_category_dirs(custom) {
            Ok(dirs) => {
                for dir in dirs {
                    if let Err(e) = scanner.load_category(&dir, Source::Custom) {
                        warn!(dir = %dir.display(), error = %e, "Skipping unreadable custom category");
                    }
                }
            }
            Err(e) => {
                warn!(path = %custom.display(), error = %e, "Custom strategies directory not readable, skipping");
            }
        }
    } else {
        debug!("scan: no custom root configured");
    }

    let maps = scanner.finish();
    info!(
        strategies = maps.strategies.len(),
        categories = maps.categories.len(),
        skipped = maps.skipped.len(),
        "Scanned strategy catalog"
    );
    Ok(maps)
}

/// Sorted, non-hidden subdirectories of a root
fn list_category_dirs(root: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut dirs: Vec<PathBuf> = fs::read_dir(root)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir() && !is_hidden(p))
        .collect();
    dirs.sort();
    Ok(dirs)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(true)
}

fn is_json(path: &Path) -> bool {
    path.extension().map(|e| e == "json").unwrap_or(false)
}

struct Scanner<'a> {
    cache: &'a FileCache,
    maps: CatalogMaps,
    /// `output_focus` hints from metadata files, keyed by category then strategy key
    output_focus: BTreeMap<String, BTreeMap<String, String>>,
}

impl Scanner<'_> {
    /// Load one category directory
    ///
    /// The only error returned is a failure to list `dir`; the caller decides
    /// whether that is fatal. Everything else is logged and skipped here.
    fn load_category(&mut self, dir: &Path, source: Source) -> Result<()> {
        let Some(dir_name) = dir.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
            let e = CatalogError::new(ErrorKind::Io, format!("Invalid directory name: {}", dir.display()))
                .with("path", dir.display());
            e.log();
            self.maps.skipped.push(SkippedFile {
                path: dir.to_path_buf(),
                reason: e.message,
            });
            return Ok(());
        };
        let category = category_key(source, &dir_name);
        debug!(?dir, %category, %source, "load_category: called");

        let entries = fs::read_dir(dir).map_err(|e| match source {
            Source::BuiltIn => CatalogError::missing_root(dir, e),
            Source::Custom => CatalogError::io(dir, e),
        })?;
        let mut files: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file() && is_json(p) && !is_hidden(p))
            .collect();
        files.sort();

        for path in files {
            let is_metadata = path.file_name().map(|n| n == METADATA_FILE).unwrap_or(false);
            let outcome = if is_metadata {
                self.load_metadata(&path, &category)
            } else {
                self.load_strategy(&path, &category, &dir_name, source)
            };
            if let Err(e) = outcome {
                e.log();
                self.maps.skipped.push(SkippedFile {
                    path: path.clone(),
                    reason: e.message,
                });
            }
        }

        debug!(%category, "load_category: complete");
        Ok(())
    }

    fn load_strategy(&mut self, path: &Path, category: &str, dir_name: &str, source: Source) -> Result<()> {
        debug!(?path, "load_strategy: called");
        let value = self.read_json(path)?;

        let violations = schema::validate(&value, &schema::strategy_shape(), "Strategy");
        if !violations.is_empty() {
            return Err(invalid(ErrorKind::InvalidDocument, path, &violations));
        }
        let file: StrategyFile =
            serde_json::from_value((*value).clone()).map_err(|e| CatalogError::parse(path, e))?;
        if !file.template.contains(PLACEHOLDER) {
            return Err(invalid(
                ErrorKind::InvalidDocument,
                path,
                &[format!("Strategy.template must contain placeholder: {}", PLACEHOLDER)],
            ));
        }

        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| CatalogError::new(ErrorKind::Io, format!("Invalid filename: {}", path.display())))?;
        let key = match source {
            Source::BuiltIn => builtin_key(stem),
            Source::Custom => custom_key(dir_name, stem),
        };

        if let Some(existing) = self.maps.strategies.get(&key) {
            return Err(CatalogError::new(
                ErrorKind::InvalidDocument,
                format!(
                    "Duplicate strategy key '{}' in {} (already loaded from category '{}')",
                    key,
                    path.display(),
                    existing.category
                ),
            )
            .with("path", path.display())
            .with("key", &key));
        }

        let document = StrategyDocument::from_file(key.clone(), category.to_string(), source, dir_name, file);
        debug!(%key, %category, "load_strategy: admitted");
        self.maps.strategies.insert(key, Arc::new(document));
        Ok(())
    }

    fn load_metadata(&mut self, path: &Path, category: &str) -> Result<()> {
        debug!(?path, %category, "load_metadata: called");
        let value = self.read_json(path)?;

        let violations = schema::validate(&value, &schema::category_metadata_shape(), "Category metadata");
        if !violations.is_empty() {
            return Err(invalid(ErrorKind::InvalidMetadata, path, &violations));
        }
        let file: MetadataFile = serde_json::from_value((*value).clone()).map_err(|e| CatalogError::parse(path, e))?;

        let focus: BTreeMap<String, String> = file
            .strategies
            .iter()
            .filter_map(|s| s.output_focus.clone().map(|f| (s.key.clone(), f)))
            .collect();
        if !focus.is_empty() {
            self.output_focus.insert(category.to_string(), focus);
        }

        self.maps.categories.insert(
            category.to_string(),
            CategoryMetadata {
                category: file.category,
                description: file.description,
                use_cases: file.use_cases,
                strategies: Vec::new(),
            },
        );
        Ok(())
    }

    /// Read and parse a JSON file, reusing the cached parse when the file is unchanged
    fn read_json(&self, path: &Path) -> Result<Arc<Value>> {
        let meta = fs::metadata(path).map_err(|e| CatalogError::io(path, e))?;
        let modified = meta.modified().ok();
        let len = meta.len();
        let key = path.to_path_buf();

        // A poisoned cache lock just means no caching for this read
        if let Ok(mut cache) = self.cache.lock()
            && let Some(cached) = cache.get(&key)
            && cached.modified == modified
            && cached.len == len
        {
            debug!(?path, "read_json: content cache hit");
            return Ok(cached.value);
        }

        let content = fs::read_to_string(path).map_err(|e| CatalogError::io(path, e))?;
        let value: Value = serde_json::from_str(&content).map_err(|e| CatalogError::parse(path, e))?;
        let value = Arc::new(value);

        if let Ok(mut cache) = self.cache.lock() {
            cache.set(
                key,
                CachedFile {
                    modified,
                    len,
                    value: Arc::clone(&value),
                },
                None,
            );
        }
        Ok(value)
    }

    /// Fill each category's denormalized strategy list from the loaded documents
    fn finish(mut self) -> CatalogMaps {
        let mut by_category: BTreeMap<String, Vec<StrategySummary>> = BTreeMap::new();
        for doc in self.maps.strategies.values() {
            let mut summary = doc.summary();
            summary.output_focus = self
                .output_focus
                .get(&doc.category)
                .and_then(|f| f.get(&doc.key))
                .cloned();
            by_category.entry(doc.category.clone()).or_default().push(summary);
        }

        for (category, metadata) in self.maps.categories.iter_mut() {
            metadata.strategies = by_category.remove(category).unwrap_or_default();
        }
        for category in by_category.keys() {
            debug!(%category, "finish: category has strategies but no metadata file");
        }
        self.maps
    }
}

fn invalid(kind: ErrorKind, path: &Path, violations: &[String]) -> CatalogError {
    CatalogError::new(
        kind,
        format!("{} failed validation: {}", path.display(), violations.join("; ")),
    )
    .with("path", path.display())
    .with("violations", violations.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    const TEMPLATE: &str = "Improve this: [Insert initial prompt here]";

    fn cache() -> FileCache {
        Mutex::new(ContentStore::new(Duration::from_secs(300)))
    }

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn strategy(name: &str) -> String {
        serde_json::json!({"name": name, "description": "d", "template": TEMPLATE}).to_string()
    }

    #[test]
    fn test_missing_builtin_root_is_fatal() {
        let temp = TempDir::new().unwrap();
        let roots = CatalogRoots::new(temp.path().join("missing"), None);
        let err = scan(&roots, &cache()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::MissingRoot);
    }

    fn scanner(cache: &FileCache) -> Scanner<'_> {
        Scanner {
            cache,
            maps: CatalogMaps::default(),
            output_focus: BTreeMap::new(),
        }
    }

    #[test]
    fn test_unlistable_builtin_category_is_missing_root() {
        let temp = TempDir::new().unwrap();
        let cache = cache();
        let err = scanner(&cache)
            .load_category(&temp.path().join("gone"), Source::BuiltIn)
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::MissingRoot);
    }

    #[test]
    fn test_unlistable_custom_category_is_io() {
        let temp = TempDir::new().unwrap();
        let cache = cache();
        let err = scanner(&cache)
            .load_category(&temp.path().join("gone"), Source::Custom)
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Io);
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_category_name_is_skipped_not_fatal() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let temp = TempDir::new().unwrap();
        let dir = temp.path().join(OsStr::from_bytes(b"bad\xffname"));
        let cache = cache();
        let mut scanner = scanner(&cache);

        scanner.load_category(&dir, Source::BuiltIn).unwrap();
        assert!(scanner.maps.strategies.is_empty());
        assert_eq!(scanner.maps.skipped.len(), 1);
        assert_eq!(scanner.maps.skipped[0].path, dir);
    }

    #[test]
    fn test_missing_custom_root_is_skipped() {
        let temp = TempDir::new().unwrap();
        write(&temp.path().join("builtin/core/star.json"), &strategy("STAR"));
        let roots = CatalogRoots::new(temp.path().join("builtin"), Some(temp.path().join("nope")));
        let maps = scan(&roots, &cache()).unwrap();
        assert_eq!(maps.strategies.len(), 1);
    }

    #[test]
    fn test_template_without_placeholder_rejected() {
        let temp = TempDir::new().unwrap();
        write(
            &temp.path().join("core/bad.json"),
            r#"{"name": "Bad", "template": "no token here"}"#,
        );
        write(&temp.path().join("core/good.json"), &strategy("Good"));
        let maps = scan(&CatalogRoots::new(temp.path(), None), &cache()).unwrap();
        assert!(maps.strategies.contains_key("good"));
        assert!(!maps.strategies.contains_key("bad"));
        assert_eq!(maps.skipped.len(), 1);
        assert!(maps.skipped[0].reason.contains("placeholder"));
    }

    #[test]
    fn test_non_json_and_hidden_files_ignored() {
        let temp = TempDir::new().unwrap();
        write(&temp.path().join("core/notes.txt"), "hello");
        write(&temp.path().join("core/.draft.json"), &strategy("Draft"));
        write(&temp.path().join("core/star.json"), &strategy("STAR"));
        let maps = scan(&CatalogRoots::new(temp.path(), None), &cache()).unwrap();
        assert_eq!(maps.strategies.keys().collect::<Vec<_>>(), vec!["star"]);
        assert!(maps.skipped.is_empty());
    }

    #[test]
    fn test_duplicate_builtin_key_first_category_wins() {
        let temp = TempDir::new().unwrap();
        write(&temp.path().join("alpha/star.json"), &strategy("Alpha STAR"));
        write(&temp.path().join("beta/star.json"), &strategy("Beta STAR"));
        let maps = scan(&CatalogRoots::new(temp.path(), None), &cache()).unwrap();
        assert_eq!(maps.strategies["star"].name, "Alpha STAR");
        assert_eq!(maps.skipped.len(), 1);
    }

    #[test]
    fn test_invalid_metadata_skipped() {
        let temp = TempDir::new().unwrap();
        write(
            &temp.path().join("core/_metadata.json"),
            r#"{"category": "Core", "description": "d", "use_cases": []}"#,
        );
        write(&temp.path().join("core/star.json"), &strategy("STAR"));
        let maps = scan(&CatalogRoots::new(temp.path(), None), &cache()).unwrap();
        assert!(maps.categories.is_empty());
        assert_eq!(maps.strategies.len(), 1);
        assert_eq!(maps.skipped.len(), 1);
    }

    #[test]
    fn test_summaries_denormalized_with_output_focus() {
        let temp = TempDir::new().unwrap();
        write(
            &temp.path().join("core/_metadata.json"),
            r#"{"category": "Core", "description": "d", "use_cases": ["x"],
                "strategies": [{"key": "star", "name": "STAR", "description": "d", "output_focus": "structure"}]}"#,
        );
        write(&temp.path().join("core/star.json"), &strategy("STAR"));
        write(&temp.path().join("core/arpe.json"), &strategy("ARPE"));
        let maps = scan(&CatalogRoots::new(temp.path(), None), &cache()).unwrap();

        let core = &maps.categories["core"];
        let keys: Vec<&str> = core.strategies.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(keys, vec!["arpe", "star"]);
        assert_eq!(core.strategies[1].output_focus.as_deref(), Some("structure"));
        assert_eq!(core.strategies[0].output_focus, None);
    }

    #[test]
    fn test_content_cache_reused_and_invalidated_by_edit() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("core/star.json");
        write(&path, &strategy("STAR"));
        let roots = CatalogRoots::new(temp.path(), None);
        let cache = cache();

        scan(&roots, &cache).unwrap();
        scan(&roots, &cache).unwrap();
        assert_eq!(cache.lock().unwrap().stats().hits, 1);

        // Different length guarantees a metadata mismatch even on coarse mtime clocks
        write(&path, &strategy("STAR renamed"));
        let maps = scan(&roots, &cache).unwrap();
        assert_eq!(maps.strategies["star"].name, "STAR renamed");
    }
}
