//! Debouncing of save events

use indexmap::IndexMap;
use notify::Event;
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Maximum number of entries in the debounce map before forcing a cleanup
const MAX_DEBOUNCE_ENTRIES: usize = 10_000;

/// Collapses bursts of write events for one file into a single save
pub struct SaveDebouncer {
    /// Last accepted save per path (insertion order keeps cleanup fair)
    recent: IndexMap<PathBuf, Instant>,
    window: Duration,
}

impl SaveDebouncer {
    pub fn new(debounce_seconds: u64) -> Self {
        Self::with_window(Duration::from_secs(debounce_seconds))
    }

    pub fn with_window(window: Duration) -> Self {
        Self {
            recent: IndexMap::new(),
            window,
        }
    }

    /// Paths of an event that count as a fresh save at `now`
    pub fn accept(&mut self, event: &Event, now: Instant) -> Vec<PathBuf> {
        let mut saved = Vec::new();

        for path in &event.paths {
            let fresh = self
                .recent
                .get(path)
                .is_none_or(|&last| now.duration_since(last) > self.window);

            if fresh {
                self.recent.insert(path.clone(), now);
                saved.push(path.clone());
            }
        }

        if self.recent.len() > MAX_DEBOUNCE_ENTRIES {
            self.cleanup(now);
        }

        saved
    }

    /// Forget paths not seen for ten debounce windows
    pub fn cleanup(&mut self, now: Instant) {
        let threshold = self.window * 10;
        self.recent
            .retain(|_, &mut last| now.duration_since(last) < threshold);
    }

    pub fn len(&self) -> usize {
        self.recent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recent.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::EventKind;

    fn modify(path: &str) -> Event {
        Event {
            kind: EventKind::Modify(notify::event::ModifyKind::Any),
            paths: vec![PathBuf::from(path)],
            attrs: Default::default(),
        }
    }

    #[test]
    fn test_burst_counts_once() {
        let mut debouncer = SaveDebouncer::new(1);
        let start = Instant::now();
        let event = modify("/tmp/test.cs");

        assert_eq!(debouncer.accept(&event, start).len(), 1);
        assert!(debouncer.accept(&event, start + Duration::from_millis(200)).is_empty());
        assert_eq!(debouncer.accept(&event, start + Duration::from_secs(2)).len(), 1);
    }

    #[test]
    fn test_distinct_paths_are_independent() {
        let mut debouncer = SaveDebouncer::new(5);
        let now = Instant::now();

        assert_eq!(debouncer.accept(&modify("/tmp/a.cs"), now).len(), 1);
        assert_eq!(debouncer.accept(&modify("/tmp/b.cs"), now).len(), 1);
        assert_eq!(debouncer.len(), 2);
    }

    #[test]
    fn test_cleanup_forgets_old_paths() {
        let mut debouncer = SaveDebouncer::new(1);
        let start = Instant::now();
        debouncer.accept(&modify("/tmp/a.cs"), start);

        debouncer.cleanup(start + Duration::from_secs(30));
        assert!(debouncer.is_empty());
    }
}
