//! Change detection over the fact store.
//!
//! Fingerprints are the previously observed values of facts and template
//! digests, stored under a detector key that may differ from the fact name
//! so the same fact can be watched under multiple concerns. They are used
//! only for equality comparison, never for reconstructing state.

use serde_json::Value;
use tracing::debug;

use crate::{FactStore, StoreError};

/// Namespace prefix separating fingerprints from facts.
const FINGERPRINT_PREFIX: &str = "fingerprint.";

/// Namespace prefix for template-content digests.
const TEMPLATE_PREFIX: &str = "template.";

impl FactStore {
    /// Report whether `value` differs from the fingerprint recorded under
    /// `key`, updating the record.
    ///
    /// Returns true when no fingerprint exists yet or the stored one is
    /// unequal (deep structural equality, order-sensitive for sequences);
    /// the new value is then recorded. Returns false and leaves storage
    /// untouched otherwise.
    ///
    /// Callers must canonicalize sequences whose source order is not
    /// significant (runtime-argument lists are sorted before comparison),
    /// otherwise spurious changes fire on every pass.
    pub fn changed(&mut self, key: &str, value: &Value) -> Result<bool, StoreError> {
        let stored_key = format!("{}{}", FINGERPRINT_PREFIX, key);
        let previous = self.raw().get(&stored_key)?;
        if previous.as_ref() == Some(value) {
            return Ok(false);
        }
        debug!(key, first = previous.is_none(), "fact changed");
        self.raw_mut().set(&stored_key, value.clone())?;
        Ok(true)
    }

    /// Template-content variant of [`FactStore::changed`], keyed by
    /// template name.
    ///
    /// A template counts as changed when its observed digest differs from
    /// the one recorded at last generation, which lets operators force
    /// regeneration by editing a template and keeps the engine correct
    /// across upgrades that ship new templates.
    pub fn template_changed(&mut self, template: &str, digest: &str) -> Result<bool, StoreError> {
        self.changed(
            &format!("{}{}", TEMPLATE_PREFIX, template),
            &Value::String(digest.to_string()),
        )
    }
}
