//! Rule record store - one `<title>.txt` file per rule in the rules directory

mod backend;

pub use backend::RuleEditorBackend;

use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::rules::{RuleRecord, format};

/// Name of the rules directory beside the workspace or executable
pub const RULES_DIR_NAME: &str = "SavedEventActions";

const RULE_EXTENSION: &str = "txt";
const LOCK_FILE: &str = ".onevent.lock";

/// Store failures surfaced to the rule editor
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("rule '{0}' not found")]
    NotFound(String),

    #[error("a rule titled '{0}' already exists")]
    DuplicateTitle(String),

    #[error("invalid rule title '{0}'")]
    InvalidTitle(String),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Rules directory for a workspace root, or beside `exe_dir` when no workspace is open
pub fn rules_directory_for(workspace: Option<&Path>, exe_dir: &Path) -> PathBuf {
    workspace.unwrap_or(exe_dir).join(RULES_DIR_NAME)
}

/// Resolve the rules directory without touching the filesystem
pub fn resolve_rules_directory(workspace: Option<&Path>) -> PathBuf {
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."));
    rules_directory_for(workspace, &exe_dir)
}

/// Check that a title is usable as a file stem
pub fn validate_title(title: &str) -> StoreResult<&str> {
    let trimmed = title.trim();
    let invalid = trimmed.is_empty()
        || trimmed == "."
        || trimmed == ".."
        || trimmed
            .chars()
            .any(|c| c.is_control() || matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|'));

    if invalid {
        return Err(StoreError::InvalidTitle(title.to_string()));
    }
    Ok(trimmed)
}

/// Handle on a rules directory
#[derive(Debug, Clone)]
pub struct RuleStore {
    dir: PathBuf,
}

impl RuleStore {
    /// Create a store over an explicit directory
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Create a store over the resolved rules directory for a workspace
    pub fn for_workspace(workspace: Option<&Path>) -> Self {
        Self::new(resolve_rules_directory(workspace))
    }

    /// The rules directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Whether the rules directory exists
    pub fn exists(&self) -> bool {
        self.dir.is_dir()
    }

    fn path_for(&self, title: &str) -> PathBuf {
        self.dir.join(format!("{title}.{RULE_EXTENSION}"))
    }

    /// All rules as `(title, record)`, sorted by title. A missing directory is empty.
    pub fn list_all(&self) -> StoreResult<Vec<(String, RuleRecord)>> {
        if !self.exists() {
            debug!("Rules directory not found: {}", self.dir.display());
            return Ok(Vec::new());
        }

        let pattern = format!(
            "{}/*.{RULE_EXTENSION}",
            glob::Pattern::escape(&self.dir.to_string_lossy())
        );
        let paths = glob::glob(&pattern).map_err(|e| StoreError::Io {
            path: self.dir.clone(),
            source: io::Error::new(io::ErrorKind::InvalidInput, e),
        })?;

        let mut rules = Vec::new();
        for entry in paths {
            let path = match entry {
                Ok(path) => path,
                Err(e) => {
                    warn!("Skipping unreadable rule entry: {}", e);
                    continue;
                }
            };
            if !path.is_file() {
                continue;
            }
            let Some(title) = path.file_stem().and_then(|s| s.to_str()) else {
                warn!("Skipping rule file with non UTF-8 name: {}", path.display());
                continue;
            };

            match std::fs::read_to_string(&path) {
                Ok(content) => rules.push((title.to_string(), format::decode(&content))),
                Err(e) => warn!("Failed to read rule file {}: {}", path.display(), e),
            }
        }

        rules.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(rules)
    }

    /// Whether a rule with this title exists
    pub fn contains(&self, title: &str) -> bool {
        validate_title(title)
            .map(|t| self.path_for(t).is_file())
            .unwrap_or(false)
    }

    /// Load one rule
    pub fn load(&self, title: &str) -> StoreResult<RuleRecord> {
        let title = validate_title(title)?;
        let path = self.path_for(title);

        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(format::decode(&content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(title.to_string()))
            }
            Err(e) => Err(io_error(&path)(e)),
        }
    }

    /// Write a rule, replacing any existing content
    pub fn save(&self, title: &str, record: &RuleRecord) -> StoreResult<()> {
        let title = validate_title(title)?;
        let _lock = self.lock()?;
        self.write_record(title, record)
    }

    /// Add a new rule; fails if the title is taken
    pub fn create(&self, title: &str, record: &RuleRecord) -> StoreResult<()> {
        let title = validate_title(title)?;
        let _lock = self.lock()?;

        if self.path_for(title).exists() {
            return Err(StoreError::DuplicateTitle(title.to_string()));
        }

        info!("Creating rule '{}'", title);
        self.write_record(title, record)
    }

    /// Replace an existing rule
    pub fn update(&self, title: &str, record: &RuleRecord) -> StoreResult<()> {
        let title = validate_title(title)?;
        self.require(title)?;
        let _lock = self.lock()?;
        self.require(title)?;

        debug!("Updating rule '{}'", title);
        self.write_record(title, record)
    }

    /// Rename a rule's backing file without overwriting another rule
    pub fn rename(&self, old_title: &str, new_title: &str) -> StoreResult<()> {
        let old_title = validate_title(old_title)?;
        let new_title = validate_title(new_title)?;
        if old_title == new_title {
            return Ok(());
        }

        self.require(old_title)?;
        let _lock = self.lock()?;
        let old_path = self.path_for(old_title);
        let new_path = self.path_for(new_title);

        if new_path.exists() {
            return Err(StoreError::DuplicateTitle(new_title.to_string()));
        }
        if !old_path.is_file() {
            return Err(StoreError::NotFound(old_title.to_string()));
        }

        info!("Renaming rule '{}' -> '{}'", old_title, new_title);
        std::fs::rename(&old_path, &new_path).map_err(io_error(&old_path))
    }

    /// Remove a rule; absent rules are not an error
    pub fn delete(&self, title: &str) -> StoreResult<()> {
        let title = validate_title(title)?;
        let path = self.path_for(title);
        if !path.exists() {
            return Ok(());
        }

        let _lock = self.lock()?;
        info!("Deleting rule '{}'", title);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(&path)(e)),
        }
    }

    /// Toggle whether a rule fires
    pub fn set_active(&self, title: &str, active: bool) -> StoreResult<()> {
        let title = validate_title(title)?;
        self.require(title)?;
        let _lock = self.lock()?;

        let mut record = self.load(title)?;
        if record.is_active != active {
            record.is_active = active;
            debug!("Setting rule '{}' active={}", title, active);
            self.write_record(title, &record)?;
        }
        Ok(())
    }

    /// `NotFound` unless the rule file exists
    fn require(&self, title: &str) -> StoreResult<()> {
        if self.path_for(title).is_file() {
            Ok(())
        } else {
            Err(StoreError::NotFound(title.to_string()))
        }
    }

    /// Write through a temporary sibling and rename so readers never see a torn file.
    /// Callers hold the store lock.
    fn write_record(&self, title: &str, record: &RuleRecord) -> StoreResult<()> {
        let path = self.path_for(title);
        let tmp_path = self.dir.join(format!(".{title}.{RULE_EXTENSION}.tmp"));

        std::fs::write(&tmp_path, format::encode(record)).map_err(io_error(&tmp_path))?;
        if let Err(e) = std::fs::rename(&tmp_path, &path) {
            let _ = std::fs::remove_file(&tmp_path);
            return Err(io_error(&path)(e));
        }
        Ok(())
    }

    /// Take the advisory lock that serialises writers, creating the directory if needed
    fn lock(&self) -> StoreResult<StoreLock> {
        std::fs::create_dir_all(&self.dir).map_err(io_error(&self.dir))?;

        let lock_path = self.dir.join(LOCK_FILE);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&lock_path)
            .map_err(io_error(&lock_path))?;
        file.lock_exclusive().map_err(io_error(&lock_path))?;

        Ok(StoreLock(file))
    }
}

struct StoreLock(File);

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.0);
    }
}
