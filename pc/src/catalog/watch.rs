//! Filesystem watch subscription for live catalog reloads
//!
//! The notify callback only pushes a unit notification into a channel. A
//! tokio task drains the channel, waits out a short debounce window and hands
//! the reload to the blocking pool, where the catalog's reload gate folds
//! overlapping requests together. The same task periodically sweeps expired
//! entries out of the catalog's content cache.
//!
//! A root that does not exist yet is tracked through its parent directory.
//! Once it appears it is watched recursively and the catalog reloads.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::StrategyCatalog;
use crate::config::WatchConfig;
use crate::error::{CatalogError, ErrorKind, Result};

/// Live watch on a catalog's roots
///
/// Dropping the watcher (or calling [`shutdown`](Self::shutdown)) ends the
/// subscription and stops the reload task.
pub struct CatalogWatcher {
    task: JoinHandle<()>,
}

/// Watches owned by the reload task
struct RootWatches {
    watcher: RecommendedWatcher,
    /// Roots that did not exist yet, with the parent being watched in their place
    pending: Vec<(PathBuf, Option<PathBuf>)>,
}

fn watch_error(path: &Path, e: notify::Error) -> CatalogError {
    CatalogError::new(ErrorKind::Watch, format!("Failed to watch {}: {}", path.display(), e))
        .with("path", path.display())
        .with_source(e)
}

impl RootWatches {
    fn watch_root(&mut self, root: &Path) -> Result<()> {
        self.watcher
            .watch(root, RecursiveMode::Recursive)
            .map_err(|e| watch_error(root, e))?;
        info!(root = %root.display(), "Watching strategies directory");
        Ok(())
    }

    /// Watch the parent of a missing root so its creation is noticed
    fn track_missing(&mut self, root: PathBuf) {
        let parent = root
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let watched = if parent.is_dir() {
            match self.watcher.watch(&parent, RecursiveMode::NonRecursive) {
                Ok(()) => {
                    debug!(?root, ?parent, "root missing, watching parent");
                    Some(parent)
                }
                Err(e) => {
                    warn!(root = %root.display(), error = %e, "Cannot watch parent of missing root");
                    None
                }
            }
        } else {
            warn!(root = %root.display(), "Root and its parent are missing, not watching");
            None
        };
        self.pending.push((root, watched));
    }

    /// Start watching any pending root that now exists
    ///
    /// Returns how many roots were picked up.
    fn promote_pending(&mut self) -> usize {
        let (ready, missing): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.pending).into_iter().partition(|(root, _)| root.is_dir());
        self.pending = missing;

        let mut promoted = 0;
        for (root, parent) in ready {
            if let Err(e) = self.watch_root(&root) {
                e.log();
                self.pending.push((root, parent));
                continue;
            }
            promoted += 1;
            // The parent stays watched while another missing root needs it
            if let Some(parent) = parent
                && !self.pending.iter().any(|(_, p)| p.as_ref() == Some(&parent))
            {
                let _ = self.watcher.unwatch(&parent);
            }
        }
        promoted
    }
}

/// Whether a notify event concerns a strategy document or a category directory
fn is_relevant(event: &Event) -> bool {
    if matches!(event.kind, EventKind::Access(_)) {
        return false;
    }
    event.paths.iter().any(|p| is_document_path(p))
}

fn is_document_path(path: &Path) -> bool {
    let hidden = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(false);
    if hidden {
        return false;
    }
    match path.extension() {
        Some(ext) => ext == "json",
        // Category directories have no extension
        None => true,
    }
}

impl CatalogWatcher {
    /// Subscribe to every existing root of `catalog`
    ///
    /// Must be called from inside a tokio runtime.
    pub fn spawn(catalog: Arc<StrategyCatalog>, config: &WatchConfig) -> Result<Self> {
        debug!(?config, "CatalogWatcher::spawn: called");
        let (tx, rx) = mpsc::unbounded_channel::<()>();

        let watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) if is_relevant(&event) => {
                // Receiver gone means the watcher is shutting down
                let _ = tx.send(());
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Filesystem watch error"),
        })
        .map_err(|e| CatalogError::new(ErrorKind::Watch, format!("Failed to create watcher: {}", e)).with_source(e))?;

        let mut watches = RootWatches {
            watcher,
            pending: Vec::new(),
        };
        for root in catalog.roots().all() {
            if root.is_dir() {
                watches.watch_root(&root)?;
            } else {
                watches.track_missing(root);
            }
        }

        let task = tokio::spawn(run(catalog, watches, rx, config.debounce(), config.sweep_interval()));

        Ok(Self { task })
    }

    /// Stop watching and end the reload task
    ///
    /// A reload already handed to the blocking pool runs to completion.
    pub fn shutdown(mut self) {
        self.stop();
        info!("Catalog watcher stopped");
    }

    /// Aborting the task drops the notify watcher it owns
    fn stop(&mut self) {
        self.task.abort();
    }
}

impl Drop for CatalogWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run(
    catalog: Arc<StrategyCatalog>,
    mut watches: RootWatches,
    mut rx: mpsc::UnboundedReceiver<()>,
    debounce: Duration,
    sweep_interval: Duration,
) {
    let mut sweep = tokio::time::interval(sweep_interval);
    // The first tick completes immediately
    sweep.tick().await;

    loop {
        tokio::select! {
            msg = rx.recv() => {
                if msg.is_none() {
                    debug!("catalog watch channel closed");
                    break;
                }
                if !debounce.is_zero() {
                    tokio::time::sleep(debounce).await;
                }
                let mut burst = 1usize;
                while rx.try_recv().is_ok() {
                    burst += 1;
                }
                debug!(burst, "catalog change detected, scheduling reload");

                // Watch new roots before the scan so nothing written into them is missed
                let promoted = watches.promote_pending();
                if promoted > 0 {
                    info!(promoted, "Previously missing strategies root appeared");
                }

                let catalog = Arc::clone(&catalog);
                let reload = tokio::task::spawn_blocking(move || catalog.request_reload());
                tokio::spawn(async move {
                    if let Err(e) = reload.await {
                        error!(error = %e, "Catalog reload task panicked");
                    }
                });
            }
            _ = sweep.tick() => {
                let removed = catalog.sweep_content_cache();
                if removed > 0 {
                    debug!(removed, "swept content cache");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, ModifyKind, RemoveKind};
    use std::path::PathBuf;

    fn event(kind: EventKind, path: &str) -> Event {
        Event::new(kind).add_path(PathBuf::from(path))
    }

    #[test]
    fn test_json_changes_are_relevant() {
        assert!(is_relevant(&event(EventKind::Create(CreateKind::File), "/s/core/star.json")));
        assert!(is_relevant(&event(EventKind::Modify(ModifyKind::Any), "/s/core/star.json")));
        assert!(is_relevant(&event(EventKind::Remove(RemoveKind::File), "/s/core/_metadata.json")));
    }

    #[test]
    fn test_directory_changes_are_relevant() {
        assert!(is_relevant(&event(EventKind::Create(CreateKind::Folder), "/s/newcat")));
    }

    #[test]
    fn test_missing_root_is_promoted_once_created() {
        let temp = tempfile::TempDir::new().unwrap();
        let root = temp.path().join("custom");
        let watcher = notify::recommended_watcher(|_: notify::Result<Event>| {}).unwrap();
        let mut watches = RootWatches {
            watcher,
            pending: Vec::new(),
        };

        watches.track_missing(root.clone());
        assert_eq!(watches.pending, vec![(root.clone(), Some(temp.path().to_path_buf()))]);
        assert_eq!(watches.promote_pending(), 0);
        assert_eq!(watches.pending.len(), 1);

        std::fs::create_dir(&root).unwrap();
        assert_eq!(watches.promote_pending(), 1);
        assert!(watches.pending.is_empty());
    }

    #[test]
    fn test_irrelevant_events() {
        assert!(!is_relevant(&event(EventKind::Access(AccessKind::Any), "/s/core/star.json")));
        assert!(!is_relevant(&event(EventKind::Modify(ModifyKind::Any), "/s/core/notes.txt")));
        assert!(!is_relevant(&event(EventKind::Create(CreateKind::File), "/s/core/.star.json")));
    }
}
