//! onevent - file automation rules fired on save and build events
//!
//! Rules live as flat `key=value` files in a rules directory. A trigger source
//! (the on-save watcher, a build wrapper, or any embedding host) calls
//! [`Dispatcher::process_rules`]; editors manage rules through [`RuleStore`].

pub mod config;
pub mod notifications;
pub mod rules;
pub mod store;
pub mod watcher;

pub use config::Config;
pub use rules::{ActionKind, DispatchReport, Dispatcher, RuleOutcome, RuleRecord, Trigger};
pub use store::{RuleEditorBackend, RuleStore, StoreError};
pub use watcher::SaveWatcher;

/// Current version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Expand ~ and environment variables ($VAR, ${VAR}) in a path
pub fn expand_path(path: &std::path::Path) -> std::path::PathBuf {
    let path_str = path.to_string_lossy();

    let expanded = match path_str.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with(['/', '\\']) => {
            match dirs::home_dir() {
                Some(home) => format!("{}{}", home.to_string_lossy(), rest),
                None => path_str.to_string(),
            }
        }
        _ => path_str.to_string(),
    };

    use std::sync::LazyLock;
    static ENV_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
        regex::Regex::new(r"\$\{([^}]+)\}|\$([A-Za-z_][A-Za-z0-9_]*)").expect("invalid env regex")
    });

    let result = ENV_RE.replace_all(&expanded, |caps: &regex::Captures| {
        let var_name = caps
            .get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str())
            .unwrap_or("");
        std::env::var(var_name).unwrap_or_else(|_| caps[0].to_string())
    });

    std::path::PathBuf::from(result.as_ref())
}
