//! Save detection.
//!
//! Watches files and directories and reports every debounced write to a
//! source file as a save event.

use anyhow::{Context, Result};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use notify_debouncer_mini::{new_debouncer, DebouncedEvent, DebouncedEventKind, Debouncer};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;

/// Whether `path` has one of `extensions` (compared without the dot, case-insensitive).
pub(crate) fn is_source_file(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| {
            extensions
                .iter()
                .any(|want| want.trim_start_matches('.').eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

/// What the user asked to watch. Single files are watched through their
/// parent directory, so events for siblings have to be filtered out.
#[derive(Debug, Default)]
pub(crate) struct WatchScope {
    dirs: Vec<PathBuf>,
    files: Vec<PathBuf>,
}

impl WatchScope {
    pub fn add_dir(&mut self, dir: PathBuf) {
        self.dirs.push(dir);
    }

    pub fn add_file(&mut self, file: PathBuf) {
        self.files.push(file);
    }

    pub fn covers(&self, path: &Path) -> bool {
        self.files.iter().any(|f| f == path) || self.dirs.iter().any(|d| path.starts_with(d))
    }
}

/// Source files touched in one debounced batch, each reported once.
pub(crate) fn saved_files(
    events: &[DebouncedEvent],
    scope: &WatchScope,
    extensions: &[String],
) -> Vec<PathBuf> {
    let mut out: Vec<PathBuf> = Vec::new();
    for event in events {
        if !matches!(event.kind, DebouncedEventKind::Any) {
            continue;
        }
        if !scope.covers(&event.path) {
            continue;
        }
        if !is_source_file(&event.path, extensions) || !event.path.is_file() {
            continue;
        }
        if !out.contains(&event.path) {
            out.push(event.path.clone());
        }
    }
    out
}

/// Live watcher. Dropping it stops watching.
pub(crate) struct SaveWatcher {
    _debouncer: Debouncer<RecommendedWatcher>,
    paths: Vec<PathBuf>,
}

impl SaveWatcher {
    pub fn start(
        paths: &[PathBuf],
        debounce: Duration,
        extensions: Vec<String>,
        save_tx: UnboundedSender<PathBuf>,
    ) -> Result<Self> {
        let mut scope = WatchScope::default();
        let mut targets = Vec::with_capacity(paths.len());
        for path in paths {
            let path = path
                .canonicalize()
                .with_context(|| format!("resolve {}", path.display()))?;
            if path.is_dir() {
                scope.add_dir(path.clone());
                targets.push((path.clone(), path, RecursiveMode::Recursive));
            } else {
                // Editors often save by renaming a temp file over the
                // original; a watch on the old inode would go quiet.
                let parent = path
                    .parent()
                    .with_context(|| format!("no parent directory for {}", path.display()))?
                    .to_path_buf();
                scope.add_file(path.clone());
                targets.push((path, parent, RecursiveMode::NonRecursive));
            }
        }

        let mut debouncer = new_debouncer(
            debounce,
            move |res: Result<Vec<DebouncedEvent>, notify::Error>| match res {
                Ok(events) => {
                    for path in saved_files(&events, &scope, &extensions) {
                        log::debug!("saved: {}", path.display());
                        let _ = save_tx.send(path);
                    }
                }
                Err(e) => log::error!("watch error: {e:?}"),
            },
        )
        .context("create file watcher")?;

        let mut watched = Vec::with_capacity(targets.len());
        for (path, watch_root, mode) in targets {
            debouncer
                .watcher()
                .watch(&watch_root, mode)
                .with_context(|| format!("watch {}", watch_root.display()))?;
            log::info!("watching {}", path.display());
            watched.push(path);
        }

        Ok(Self {
            _debouncer: debouncer,
            paths: watched,
        })
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }
}
