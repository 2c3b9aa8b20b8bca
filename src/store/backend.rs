//! Capability interface the rule editor talks to

use super::{RuleStore, StoreResult};
use crate::rules::RuleRecord;

/// Operations a rule editor needs, called directly rather than through events
pub trait RuleEditorBackend {
    /// All rules with their titles
    fn list(&self) -> StoreResult<Vec<(String, RuleRecord)>>;

    /// Add a rule under a new title
    fn create(&self, title: &str, record: &RuleRecord) -> StoreResult<()>;

    /// Read one rule
    fn load(&self, title: &str) -> StoreResult<RuleRecord>;

    /// Overwrite an existing rule
    fn update(&self, title: &str, record: &RuleRecord) -> StoreResult<()>;

    /// Change a rule's title
    fn rename(&self, old_title: &str, new_title: &str) -> StoreResult<()>;

    /// Remove a rule
    fn delete(&self, title: &str) -> StoreResult<()>;

    /// Enable or disable a rule
    fn set_active(&self, title: &str, active: bool) -> StoreResult<()>;
}

impl RuleEditorBackend for RuleStore {
    fn list(&self) -> StoreResult<Vec<(String, RuleRecord)>> {
        self.list_all()
    }

    fn create(&self, title: &str, record: &RuleRecord) -> StoreResult<()> {
        RuleStore::create(self, title, record)
    }

    fn load(&self, title: &str) -> StoreResult<RuleRecord> {
        RuleStore::load(self, title)
    }

    fn update(&self, title: &str, record: &RuleRecord) -> StoreResult<()> {
        RuleStore::update(self, title, record)
    }

    fn rename(&self, old_title: &str, new_title: &str) -> StoreResult<()> {
        RuleStore::rename(self, old_title, new_title)
    }

    fn delete(&self, title: &str) -> StoreResult<()> {
        RuleStore::delete(self, title)
    }

    fn set_active(&self, title: &str, active: bool) -> StoreResult<()> {
        RuleStore::set_active(self, title, active)
    }
}
