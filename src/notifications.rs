//! Desktop notifications for failed rules
//!
//! Rules fire unattended, so failures are the only thing worth interrupting for.

use notify_rust::{Notification, Timeout};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;

static NOTIFICATIONS_ENABLED: AtomicBool = AtomicBool::new(false);

/// Enable or disable notifications (from `general.notifications_enabled`)
pub fn init(enabled: bool) {
    NOTIFICATIONS_ENABLED.store(enabled, Ordering::SeqCst);
}

pub fn is_enabled() -> bool {
    NOTIFICATIONS_ENABLED.load(Ordering::SeqCst)
}

#[derive(Debug, Clone, Copy)]
pub enum NotificationKind {
    /// A rule's action failed
    RuleError,
    /// The on-save watcher hit a problem
    WatchError,
}

impl NotificationKind {
    fn icon(&self) -> &'static str {
        match self {
            NotificationKind::RuleError => "dialog-error",
            NotificationKind::WatchError => "dialog-warning",
        }
    }

    fn prefix(&self) -> &'static str {
        match self {
            NotificationKind::RuleError => "Rule Failed",
            NotificationKind::WatchError => "Watch Error",
        }
    }
}

/// Send a notification if enabled. Delivery errors are logged, never returned.
pub fn notify(kind: NotificationKind, message: &str) {
    if !is_enabled() {
        return;
    }

    let result = Notification::new()
        .appname("onevent")
        .summary(&format!("onevent: {}", kind.prefix()))
        .body(message)
        .icon(kind.icon())
        .timeout(Timeout::Milliseconds(5000))
        .show();

    if let Err(e) = result {
        warn!("Failed to send notification: {}", e);
    }
}

pub fn notify_rule_error(title: &str, error: &str) {
    notify(
        NotificationKind::RuleError,
        &format!("Rule '{}' failed: {}", title, truncate(error, 200)),
    );
}

pub fn notify_watch_error(path: &str, error: &str) {
    notify(
        NotificationKind::WatchError,
        &format!("Watch '{}': {}", path, error),
    );
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let head: String = text.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_on_char_boundary() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("ééééééé", 5), "éé...");
    }
}
