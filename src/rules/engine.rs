//! Trigger dispatcher - matches stored rules against a fired trigger and runs them

use chrono::{DateTime, Local};
use std::sync::Arc;
use tracing::{debug, error, trace, warn};

use super::action::{self, Launcher, SystemLauncher};
use super::{ActionKind, RuleRecord, Trigger, normalize_extension};
use crate::store::RuleStore;

/// Why a rule was passed over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    TriggerMismatch,
    Inactive,
    ExtensionFiltered,
    UnknownAction,
}

/// What happened to one rule during a dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleOutcome {
    Executed,
    Skipped(SkipReason),
    Failed(String),
}

/// Result of one `process_rules` pass
#[derive(Debug, Clone)]
pub struct DispatchReport {
    pub fired_at: DateTime<Local>,
    pub trigger: Trigger,
    pub extension: Option<String>,
    /// One entry per rule file, in enumeration order
    pub outcomes: Vec<(String, RuleOutcome)>,
}

impl DispatchReport {
    fn new(trigger: &Trigger, extension: Option<String>) -> Self {
        Self {
            fired_at: Local::now(),
            trigger: trigger.clone(),
            extension,
            outcomes: Vec::new(),
        }
    }

    /// Titles of rules whose action ran
    pub fn executed(&self) -> impl Iterator<Item = &str> {
        self.outcomes
            .iter()
            .filter(|(_, o)| *o == RuleOutcome::Executed)
            .map(|(t, _)| t.as_str())
    }

    /// Titles and messages of rules whose action failed
    pub fn failed(&self) -> impl Iterator<Item = (&str, &str)> {
        self.outcomes.iter().filter_map(|(t, o)| match o {
            RuleOutcome::Failed(msg) => Some((t.as_str(), msg.as_str())),
            _ => None,
        })
    }

    /// Outcome for a rule title
    pub fn outcome(&self, title: &str) -> Option<&RuleOutcome> {
        self.outcomes
            .iter()
            .find(|(t, _)| t == title)
            .map(|(_, o)| o)
    }
}

/// Runs every active rule that matches a fired trigger
pub struct Dispatcher {
    store: RuleStore,
    launcher: Arc<dyn Launcher>,
}

impl Dispatcher {
    /// Create a dispatcher that launches processes through the operating system
    pub fn new(store: RuleStore) -> Self {
        Self::with_launcher(store, Arc::new(SystemLauncher::default()))
    }

    /// Create a dispatcher with a custom launcher
    pub fn with_launcher(store: RuleStore, launcher: Arc<dyn Launcher>) -> Self {
        Self { store, launcher }
    }

    /// The store rules are read from
    pub fn store(&self) -> &RuleStore {
        &self.store
    }

    /// Match and execute all rules for a trigger.
    ///
    /// Each rule is isolated: a failing action is logged and reported, and the
    /// remaining rules still run.
    pub fn process_rules(&self, trigger: &Trigger, doc_extension: Option<&str>) -> DispatchReport {
        let extension = doc_extension
            .map(normalize_extension)
            .filter(|e| !e.is_empty());
        let mut report = DispatchReport::new(trigger, extension.clone());

        if !self.store.exists() {
            debug!("Rules folder not found: {}", self.store.dir().display());
            return report;
        }

        let rules = match self.store.list_all() {
            Ok(rules) => rules,
            Err(e) => {
                error!("Failed to list rules: {}", e);
                return report;
            }
        };

        for (title, rule) in rules {
            let outcome = self.dispatch_one(&title, &rule, trigger, extension.as_deref());
            report.outcomes.push((title, outcome));
        }

        debug!(
            "Dispatch of '{}' done: {} executed, {} failed",
            trigger,
            report.executed().count(),
            report.failed().count()
        );
        report
    }

    fn dispatch_one(
        &self,
        title: &str,
        rule: &RuleRecord,
        trigger: &Trigger,
        extension: Option<&str>,
    ) -> RuleOutcome {
        if rule.trigger != *trigger {
            trace!("Rule '{}' listens for '{}'", title, rule.trigger);
            return RuleOutcome::Skipped(SkipReason::TriggerMismatch);
        }
        if !rule.is_active {
            trace!("Skipping inactive rule: {}", title);
            return RuleOutcome::Skipped(SkipReason::Inactive);
        }
        if !rule.applies_to(extension) {
            debug!(
                "Rule '{}' does not apply to extension {:?} (allowed: {})",
                title,
                extension,
                rule.allowed_extensions.join(", ")
            );
            return RuleOutcome::Skipped(SkipReason::ExtensionFiltered);
        }
        if let ActionKind::Other(kind) = &rule.action {
            warn!("Rule '{}' has unknown action type '{}'", title, kind);
            return RuleOutcome::Skipped(SkipReason::UnknownAction);
        }

        debug!("Rule '{}' applies: {}", title, rule.action);
        match action::execute(rule, self.launcher.as_ref()) {
            Ok(()) => RuleOutcome::Executed,
            Err(e) => {
                let message = format!("{:#}", e);
                error!("Rule '{}' failed: {}", title, message);
                crate::notifications::notify_rule_error(title, &message);
                RuleOutcome::Failed(message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::SoundKind;
    use anyhow::Result;
    use std::path::Path;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        commands: Mutex<Vec<String>>,
    }

    impl Launcher for Recorder {
        fn run_command(&self, command_line: &str) -> Result<()> {
            self.commands.lock().unwrap().push(command_line.to_string());
            Ok(())
        }

        fn play_sound(&self, _path: &Path, _kind: SoundKind) -> Result<()> {
            Ok(())
        }
    }

    fn setup() -> (tempfile::TempDir, RuleStore, Arc<Recorder>, Dispatcher) {
        let tmp = tempfile::tempdir().unwrap();
        let store = RuleStore::new(tmp.path().join("rules"));
        let recorder = Arc::new(Recorder::default());
        let dispatcher = Dispatcher::with_launcher(store.clone(), recorder.clone());
        (tmp, store, recorder, dispatcher)
    }

    fn command_rule(trigger: Trigger, cmd: &str) -> RuleRecord {
        RuleRecord::new(trigger, ActionKind::RunCommand, cmd)
    }

    #[test]
    fn test_missing_rules_dir_is_noop() {
        let (_tmp, _store, recorder, dispatcher) = setup();
        let report = dispatcher.process_rules(&Trigger::OnSave, Some("cs"));
        assert!(report.outcomes.is_empty());
        assert!(recorder.commands.lock().unwrap().is_empty());
    }

    #[test]
    fn test_inactive_rules_never_fire() {
        let (_tmp, store, recorder, dispatcher) = setup();
        let mut rule = command_rule(Trigger::OnSave, "echo off");
        rule.is_active = false;
        store.save("Off", &rule).unwrap();

        for ext in [Some("cs"), None] {
            let report = dispatcher.process_rules(&Trigger::OnSave, ext);
            assert_eq!(
                report.outcome("Off"),
                Some(&RuleOutcome::Skipped(SkipReason::Inactive))
            );
        }
        assert!(recorder.commands.lock().unwrap().is_empty());
    }

    #[test]
    fn test_trigger_must_match() {
        let (_tmp, store, recorder, dispatcher) = setup();
        store.save("Build", &command_rule(Trigger::OnBuild, "make")).unwrap();

        let report = dispatcher.process_rules(&Trigger::OnSave, None);

        assert_eq!(
            report.outcome("Build"),
            Some(&RuleOutcome::Skipped(SkipReason::TriggerMismatch))
        );
        assert!(recorder.commands.lock().unwrap().is_empty());
    }

    #[test]
    fn test_extension_filter_policy() {
        let (_tmp, store, recorder, dispatcher) = setup();
        store
            .save(
                "Filtered",
                &command_rule(Trigger::OnSave, "lint").with_extensions(["cs", "txt"]),
            )
            .unwrap();

        assert_eq!(dispatcher.process_rules(&Trigger::OnSave, Some("cs")).executed().count(), 1);
        assert_eq!(
            dispatcher
                .process_rules(&Trigger::OnSave, Some("json"))
                .outcome("Filtered"),
            Some(&RuleOutcome::Skipped(SkipReason::ExtensionFiltered))
        );
        assert_eq!(dispatcher.process_rules(&Trigger::OnSave, None).executed().count(), 1);

        assert_eq!(recorder.commands.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_failure_does_not_stop_other_rules() {
        let (tmp, store, recorder, dispatcher) = setup();
        let broken = RuleRecord::new(
            Trigger::OnBuild,
            ActionKind::CopyFile,
            tmp.path().join("missing.txt").to_string_lossy(),
        )
        .with_output_folder(tmp.path().join("out").to_string_lossy());
        store.save("A-Broken", &broken).unwrap();
        store.save("B-Command", &command_rule(Trigger::OnBuild, "make")).unwrap();

        let report = dispatcher.process_rules(&Trigger::OnBuild, None);

        assert!(matches!(report.outcome("A-Broken"), Some(RuleOutcome::Failed(_))));
        assert_eq!(report.outcome("B-Command"), Some(&RuleOutcome::Executed));
        assert_eq!(*recorder.commands.lock().unwrap(), vec!["make".to_string()]);
    }

    #[test]
    fn test_unknown_action_is_skipped() {
        let (_tmp, store, _recorder, dispatcher) = setup();
        let rule = RuleRecord::new(
            Trigger::OnSave,
            ActionKind::Other("Send Email".to_string()),
            "x",
        );
        store.save("Mail", &rule).unwrap();

        let report = dispatcher.process_rules(&Trigger::OnSave, None);
        assert_eq!(
            report.outcome("Mail"),
            Some(&RuleOutcome::Skipped(SkipReason::UnknownAction))
        );
        assert_eq!(report.failed().count(), 0);
    }
}
