//! Flat `key=value` rule file format
//!
//! Every rule file holds exactly eight lines in a fixed order:
//!
//! ```text
//! eTrigger=On Save
//! eType=Copy File
//! sourceFolder=
//! sourceFile=/src/a.txt
//! outputFolder=/out
//! outputFile=a.txt
//! isActive=True
//! allowedExtensions=cs,txt
//! ```

use tracing::warn;

use super::{ActionKind, RuleRecord, Trigger, parse_extensions};

const KEY_TRIGGER: &str = "eTrigger";
const KEY_TYPE: &str = "eType";
const KEY_SOURCE_FOLDER: &str = "sourceFolder";
const KEY_SOURCE_FILE: &str = "sourceFile";
const KEY_OUTPUT_FOLDER: &str = "outputFolder";
const KEY_OUTPUT_FILE: &str = "outputFile";
const KEY_IS_ACTIVE: &str = "isActive";
const KEY_EXTENSIONS: &str = "allowedExtensions";

/// Serialize a record into its eight-line file content
pub fn encode(record: &RuleRecord) -> String {
    let (source_folder, source_file) = if record.action == ActionKind::CopyFolder {
        (record.source_path.as_str(), "")
    } else {
        ("", record.source_path.as_str())
    };

    let is_active = if record.is_active { "True" } else { "False" };

    [
        format!("{KEY_TRIGGER}={}", record.trigger.label()),
        format!("{KEY_TYPE}={}", record.action.label()),
        format!("{KEY_SOURCE_FOLDER}={source_folder}"),
        format!("{KEY_SOURCE_FILE}={source_file}"),
        format!("{KEY_OUTPUT_FOLDER}={}", record.output_folder),
        format!("{KEY_OUTPUT_FILE}={}", record.output_file),
        format!("{KEY_IS_ACTIVE}={is_active}"),
        format!("{KEY_EXTENSIONS}={}", record.allowed_extensions.join(",")),
    ]
    .join("\n")
}

/// Parse file content into a record.
///
/// Never fails: unknown keys are ignored, missing keys keep their defaults and a
/// malformed `isActive` reads as `false`.
pub fn decode(content: &str) -> RuleRecord {
    let mut record = RuleRecord::default();
    let mut source_folder = String::new();
    let mut source_file = String::new();

    for line in content.lines() {
        let line = line.strip_suffix('\r').unwrap_or(line);
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };

        match key.trim() {
            KEY_TRIGGER => record.trigger = Trigger::parse(value),
            KEY_TYPE => record.action = ActionKind::parse(value),
            KEY_SOURCE_FOLDER => source_folder = value.to_string(),
            KEY_SOURCE_FILE => source_file = value.to_string(),
            KEY_OUTPUT_FOLDER => record.output_folder = value.to_string(),
            KEY_OUTPUT_FILE => record.output_file = value.to_string(),
            KEY_IS_ACTIVE => record.is_active = parse_bool(value),
            KEY_EXTENSIONS => record.allowed_extensions = parse_extensions(value),
            _ => {}
        }
    }

    let (preferred, fallback) = if record.action == ActionKind::CopyFolder {
        (source_folder, source_file)
    } else {
        (source_file, source_folder)
    };
    record.source_path = if preferred.trim().is_empty() {
        fallback
    } else {
        preferred
    };

    record
}

fn parse_bool(value: &str) -> bool {
    let value = value.trim();
    if value.eq_ignore_ascii_case("true") {
        true
    } else if value.eq_ignore_ascii_case("false") {
        false
    } else {
        warn!("Malformed isActive value '{}', treating as False", value);
        false
    }
}
