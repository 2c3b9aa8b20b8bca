//! Rule model - triggers, action kinds and the persisted rule record

mod action;
mod engine;
pub mod format;
mod sound;

pub use action::{Launcher, SystemLauncher};
pub use engine::{DispatchReport, Dispatcher, RuleOutcome, SkipReason};
pub use sound::SoundKind;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Event category that fires rules
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Trigger {
    /// A document was saved
    OnSave,
    /// A build finished
    OnBuild,
    /// Free text that is not a known trigger (kept verbatim)
    Other(String),
}

impl Trigger {
    /// Label used in rule files
    pub fn label(&self) -> &str {
        match self {
            Trigger::OnSave => "On Save",
            Trigger::OnBuild => "On Build",
            Trigger::Other(text) => text,
        }
    }

    /// Parse a label, ignoring case and separators (`On Save`, `on-save`, `OnSave`)
    pub fn parse(text: &str) -> Self {
        match squash(text).as_str() {
            "onsave" => Trigger::OnSave,
            "onbuild" => Trigger::OnBuild,
            _ => Trigger::Other(text.trim().to_string()),
        }
    }
}

impl Default for Trigger {
    fn default() -> Self {
        Trigger::Other(String::new())
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl From<String> for Trigger {
    fn from(text: String) -> Self {
        Trigger::parse(&text)
    }
}

impl From<Trigger> for String {
    fn from(trigger: Trigger) -> Self {
        trigger.label().to_string()
    }
}

/// What a rule does when it fires
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActionKind {
    /// Copy a single file into the output folder
    CopyFile,
    /// Copy a directory tree into a subfolder of the output folder
    CopyFolder,
    /// Play an audio file
    PlaySound,
    /// Launch a shell command line
    RunCommand,
    /// Unrecognised action text (never executed)
    Other(String),
}

impl ActionKind {
    /// Label used in rule files
    pub fn label(&self) -> &str {
        match self {
            ActionKind::CopyFile => "Copy File",
            ActionKind::CopyFolder => "Copy Folder",
            ActionKind::PlaySound => "Play Sound",
            ActionKind::RunCommand => "Run Command",
            ActionKind::Other(text) => text,
        }
    }

    /// Parse a label, ignoring case and separators (`Copy File`, `copy-file`)
    pub fn parse(text: &str) -> Self {
        match squash(text).as_str() {
            "copyfile" => ActionKind::CopyFile,
            "copyfolder" => ActionKind::CopyFolder,
            "playsound" => ActionKind::PlaySound,
            "runcommand" => ActionKind::RunCommand,
            _ => ActionKind::Other(text.trim().to_string()),
        }
    }
}

impl Default for ActionKind {
    fn default() -> Self {
        ActionKind::Other(String::new())
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl From<String> for ActionKind {
    fn from(text: String) -> Self {
        ActionKind::parse(&text)
    }
}

impl From<ActionKind> for String {
    fn from(kind: ActionKind) -> Self {
        kind.label().to_string()
    }
}

fn squash(text: &str) -> String {
    text.chars()
        .filter(|c| !matches!(c, ' ' | '-' | '_'))
        .flat_map(char::to_lowercase)
        .collect()
}

/// A persisted automation rule.
///
/// The title is not part of the record: it is the file stem the store keeps it under.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleRecord {
    /// Event that fires the rule
    pub trigger: Trigger,

    /// Action performed when the rule fires
    pub action: ActionKind,

    /// File, folder or command line depending on `action`
    #[serde(default)]
    pub source_path: String,

    /// Destination directory for copy actions
    #[serde(default)]
    pub output_folder: String,

    /// Destination file name override for `CopyFile`
    #[serde(default)]
    pub output_file: String,

    /// Inactive rules never fire
    #[serde(default)]
    pub is_active: bool,

    /// Lower-cased, dot-stripped extensions; empty means no filter
    #[serde(default)]
    pub allowed_extensions: Vec<String>,
}

impl RuleRecord {
    /// Create an active rule with no extension filter
    pub fn new(trigger: Trigger, action: ActionKind, source_path: impl Into<String>) -> Self {
        Self {
            trigger,
            action,
            source_path: source_path.into(),
            is_active: true,
            ..Default::default()
        }
    }

    /// Set the output folder
    pub fn with_output_folder(mut self, folder: impl Into<String>) -> Self {
        self.output_folder = folder.into();
        self
    }

    /// Set the extension filter from raw entries (normalised on the way in)
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.allowed_extensions = extensions
            .into_iter()
            .map(|e| normalize_extension(e.as_ref()))
            .filter(|e| !e.is_empty())
            .collect();
        self
    }

    /// Whether the extension filter lets this rule fire for a document extension.
    ///
    /// With no extension context (e.g. a build) a configured filter is not consulted.
    pub fn applies_to(&self, doc_extension: Option<&str>) -> bool {
        if self.allowed_extensions.is_empty() {
            return true;
        }

        match doc_extension.map(normalize_extension) {
            Some(ext) if !ext.is_empty() => self.allowed_extensions.contains(&ext),
            _ => true,
        }
    }
}

/// Lower-case an extension and strip surrounding whitespace and leading dots
pub fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_lowercase()
}

/// Split a comma-separated extension list, dropping empty entries
pub fn parse_extensions(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(normalize_extension)
        .filter(|e| !e.is_empty())
        .collect()
}
