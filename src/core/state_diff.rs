// src/core/state_diff.rs

//! Coarse observable-state comparison for mutating commands.
//!
//! The gateway never diffs DOM trees. It compares three cheap signals taken
//! before and after a mutating primitive (URL, title, and a structural
//! signature of the element population) and reports which of them moved.
//! A changed envelope is also what drives result-cache invalidation.

use crate::driver::DomSignature;
use serde::{Deserialize, Serialize};

/// The state-diff envelope attached to mutating command results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateDiff {
    pub url_changed: bool,
    pub title_changed: bool,
    pub dom_changed: bool,
    /// Post-command URL, so clients can track where the page landed without
    /// issuing a follow-up extract.
    pub current_url: String,
    pub current_title: String,
}

impl StateDiff {
    /// Compares two signature snapshots.
    pub fn between(before: &DomSignature, after: &DomSignature) -> Self {
        Self {
            url_changed: before.url != after.url,
            title_changed: before.title != after.title,
            dom_changed: before.element_count != after.element_count
                || before.structure_hash != after.structure_hash,
            current_url: after.url.clone(),
            current_title: after.title.clone(),
        }
    }

    /// True when any observable signal moved.
    pub fn changed(&self) -> bool {
        self.url_changed || self.title_changed || self.dom_changed
    }
}
