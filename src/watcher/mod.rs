//! On-save watcher: turns file writes in a workspace into "On Save" dispatches

mod handler;

pub use handler::SaveDebouncer;

use anyhow::{Context, Result};
use notify::{Config as NotifyConfig, RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::config::WatchConfig;
use crate::rules::{Dispatcher, Trigger};

/// Watches a workspace and fires "On Save" rules for every saved file
pub struct SaveWatcher {
    watcher: RecommendedWatcher,
    rx: mpsc::Receiver<Result<notify::Event, notify::Error>>,
    debouncer: SaveDebouncer,
    dispatcher: Dispatcher,
    ignore: Vec<glob::Pattern>,
    root: Option<PathBuf>,
    saves_dispatched: u64,
}

impl SaveWatcher {
    /// Create a watcher that dispatches through `dispatcher`
    pub fn new(dispatcher: Dispatcher, config: &WatchConfig) -> Result<Self> {
        let (tx, rx) = mpsc::channel();

        let watcher = RecommendedWatcher::new(
            move |res| {
                if let Err(e) = tx.send(res) {
                    error!("Failed to send watch event: {}", e);
                }
            },
            NotifyConfig::default()
                .with_poll_interval(Duration::from_secs(config.polling_interval_secs)),
        )?;

        let ignore = config
            .ignore
            .iter()
            .map(|p| {
                glob::Pattern::new(p).with_context(|| format!("Invalid ignore pattern: {}", p))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            watcher,
            rx,
            debouncer: SaveDebouncer::new(config.debounce_seconds),
            dispatcher,
            ignore,
            root: None,
            saves_dispatched: 0,
        })
    }

    /// Start watching a workspace root
    pub fn watch(&mut self, root: &Path, recursive: bool) -> Result<()> {
        let mode = if recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };

        self.watcher
            .watch(root, mode)
            .with_context(|| format!("Failed to watch {}", root.display()))?;
        self.root = Some(std::fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf()));
        info!("Watching: {} (recursive: {})", root.display(), recursive);
        Ok(())
    }

    /// Drain pending events (non-blocking)
    pub fn poll(&self) -> Vec<notify::Event> {
        let mut events = Vec::new();

        while let Ok(result) = self.rx.try_recv() {
            match result {
                Ok(event) => events.push(event),
                Err(e) => {
                    error!("Watch error: {}", e);
                    let root = self
                        .root
                        .as_deref()
                        .map(|r| r.display().to_string())
                        .unwrap_or_default();
                    crate::notifications::notify_watch_error(&root, &e.to_string());
                }
            }
        }

        events
    }

    /// Dispatch "On Save" for every fresh save among `events`; returns the dispatch count
    pub fn process_polled_events(&mut self, events: Vec<notify::Event>) -> usize {
        let now = Instant::now();
        let mut saved = Vec::new();

        for event in events {
            match event.kind {
                notify::EventKind::Create(_) | notify::EventKind::Modify(_) => {
                    saved.extend(self.debouncer.accept(&event, now));
                }
                _ => debug!("Ignoring event kind: {:?}", event.kind),
            }
        }
        self.debouncer.cleanup(now);

        saved.retain(|p| p.is_file());
        if saved.is_empty() {
            return 0;
        }

        let excluded = self.excluded_dirs();
        let mut dispatched = 0;
        for path in saved {
            if self.is_ignored(&path, &excluded) {
                debug!("Ignoring save of {}", path.display());
                continue;
            }

            let ext = path
                .extension()
                .map(|e| e.to_string_lossy().to_string())
                .unwrap_or_default();
            info!("Saved: {} (ext: {})", path.display(), ext);

            let report = self.dispatcher.process_rules(&Trigger::OnSave, Some(&ext));
            for (title, message) in report.failed() {
                warn!("Rule '{}' failed for {}: {}", title, path.display(), message);
            }
            dispatched += 1;
        }

        self.saves_dispatched += dispatched as u64;
        dispatched
    }

    /// Poll and process in one step
    pub fn process_events(&mut self) -> usize {
        let events = self.poll();
        self.process_polled_events(events)
    }

    /// Total saves that triggered a dispatch
    pub fn saves_dispatched(&self) -> u64 {
        self.saves_dispatched
    }

    /// Directories whose writes are never saves: the rules directory and every
    /// active rule's output folder (copies landing there would re-trigger the rule)
    fn excluded_dirs(&self) -> Vec<PathBuf> {
        let store = self.dispatcher.store();
        let mut dirs = vec![canonical(store.dir())];

        match store.list_all() {
            Ok(rules) => dirs.extend(
                rules
                    .into_iter()
                    .filter(|(_, r)| r.is_active && !r.output_folder.trim().is_empty())
                    .map(|(_, r)| canonical(&crate::expand_path(Path::new(r.output_folder.trim())))),
            ),
            Err(e) => warn!("Failed to list rules for ignore set: {}", e),
        }

        dirs
    }

    fn is_ignored(&self, path: &Path, excluded: &[PathBuf]) -> bool {
        is_ignored_path(&canonical(path), self.root.as_deref(), &self.ignore, excluded)
    }
}

fn canonical(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Whether a saved path is inside an excluded directory or matches an ignore glob
/// (globs are matched against the path relative to the watched root)
pub fn is_ignored_path(
    path: &Path,
    root: Option<&Path>,
    patterns: &[glob::Pattern],
    excluded: &[PathBuf],
) -> bool {
    if excluded.iter().any(|dir| path.starts_with(dir)) {
        return true;
    }

    let relative = root
        .and_then(|r| path.strip_prefix(r).ok())
        .unwrap_or(path);
    patterns.iter().any(|p| p.matches_path(relative))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns(raw: &[&str]) -> Vec<glob::Pattern> {
        raw.iter().map(|p| glob::Pattern::new(p).unwrap()).collect()
    }

    #[test]
    fn test_excluded_dirs() {
        let root = Path::new("/work");
        let excluded = vec![
            PathBuf::from("/work/SavedEventActions"),
            PathBuf::from("/work/out"),
        ];

        assert!(is_ignored_path(
            Path::new("/work/SavedEventActions/Backup.txt"),
            Some(root),
            &[],
            &excluded
        ));
        assert!(is_ignored_path(
            Path::new("/work/out/a.txt"),
            Some(root),
            &[],
            &excluded
        ));
        assert!(!is_ignored_path(
            Path::new("/work/src/a.txt"),
            Some(root),
            &[],
            &excluded
        ));
        assert!(!is_ignored_path(
            Path::new("/work/outside.txt"),
            Some(root),
            &[],
            &excluded
        ));
    }

    fn saved(path: PathBuf) -> notify::Event {
        notify::Event {
            kind: notify::EventKind::Modify(notify::event::ModifyKind::Any),
            paths: vec![path],
            attrs: Default::default(),
        }
    }

    #[test]
    fn test_saves_in_rules_and_output_dirs_do_not_dispatch() {
        use crate::rules::{ActionKind, RuleRecord};
        use crate::store::RuleStore;

        let tmp = tempfile::tempdir().unwrap();
        let workspace = tmp.path();
        let source = workspace.join("src").join("main.cs");
        let out = workspace.join("out");
        std::fs::create_dir_all(source.parent().unwrap()).unwrap();
        std::fs::create_dir_all(&out).unwrap();
        std::fs::write(&source, "class Program {}").unwrap();
        std::fs::write(out.join("a.txt"), "copied earlier").unwrap();

        let store = RuleStore::for_workspace(Some(workspace));
        let rule = RuleRecord::new(Trigger::OnSave, ActionKind::CopyFile, source.to_string_lossy())
            .with_output_folder(out.to_string_lossy())
            .with_extensions(["cs"]);
        store.create("Mirror", &rule).unwrap();
        let rule_file = store.dir().join("Mirror.txt");

        let mut watcher =
            SaveWatcher::new(Dispatcher::new(store), &WatchConfig::default()).unwrap();
        let dispatched = watcher.process_polled_events(vec![
            saved(out.join("a.txt")),
            saved(rule_file),
            saved(source.clone()),
        ]);

        assert_eq!(dispatched, 1);
        assert_eq!(watcher.saves_dispatched(), 1);
        assert_eq!(
            std::fs::read_to_string(out.join("main.cs")).unwrap(),
            "class Program {}"
        );
    }

    #[test]
    fn test_ignore_globs_are_relative_to_root() {
        let root = Path::new("/work");
        let ignore = patterns(&["**/target/*", "*.tmp"]);

        assert!(is_ignored_path(
            Path::new("/work/crate/target/debug/app.d"),
            Some(root),
            &ignore,
            &[]
        ));
        assert!(is_ignored_path(
            Path::new("/work/scratch.tmp"),
            Some(root),
            &ignore,
            &[]
        ));
        assert!(!is_ignored_path(
            Path::new("/work/src/main.rs"),
            Some(root),
            &ignore,
            &[]
        ));
    }
}
