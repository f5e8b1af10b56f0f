//! Attribute change tracking.
//!
//! [`AttributeDiffTracker`] keeps, per attribute name, the net operation that
//! must reach storage since the last flush boundary. Recording is a small
//! state machine over `(prior record, attribute held in memory, operation)`:
//!
//! ```text
//! prior     held  op      -> record
//! ------------------------------------
//! none      no    set     -> Added
//! none      yes   set     -> Updated
//! Added     yes   set     -> Added      (row never written)
//! Updated   yes   set     -> Updated
//! Removed   no    set     -> Updated    (row still exists in storage)
//! none      no    remove  -> none       (nothing to delete)
//! Added     yes   remove  -> none
//! Updated   yes   remove  -> Removed
//! none      yes   remove  -> Removed
//! *         no    remove  -> unchanged
//! none      yes   touch   -> Updated
//! *         *     touch   -> unchanged
//! ```
//!
//! The outcome of any sequence depends only on whether the attribute existed
//! in storage at the last boundary and whether it is held now, so chains of
//! three or more operations collapse the same way pairs do.

use std::collections::HashMap;

use crate::AttributeValue;

/// Net operation recorded for one attribute.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Added,
    Updated,
    Removed,
}

/// A coalesced change with the value to persist.
#[derive(Clone, Debug, PartialEq)]
pub enum AttributeChange {
    Added(String, AttributeValue),
    Updated(String, AttributeValue),
    Removed(String),
}

impl AttributeChange {
    pub fn name(&self) -> &str {
        match self {
            AttributeChange::Added(name, _)
            | AttributeChange::Updated(name, _)
            | AttributeChange::Removed(name) => name,
        }
    }

    pub fn kind(&self) -> ChangeKind {
        match self {
            AttributeChange::Added(..) => ChangeKind::Added,
            AttributeChange::Updated(..) => ChangeKind::Updated,
            AttributeChange::Removed(_) => ChangeKind::Removed,
        }
    }

    /// The value to write, `None` for removals.
    pub fn value(&self) -> Option<&AttributeValue> {
        match self {
            AttributeChange::Added(_, v) | AttributeChange::Updated(_, v) => Some(v),
            AttributeChange::Removed(_) => None,
        }
    }
}

/// Per-session record of attribute changes since the last flush boundary.
#[derive(Clone, Debug, Default)]
pub struct AttributeDiffTracker {
    changes: HashMap<String, ChangeKind>,
}

impl AttributeDiffTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a write. `held` is whether the attribute was present in memory
    /// before this write.
    pub fn record_set(&mut self, name: &str, held: bool) {
        let next = match (self.changes.get(name).copied(), held) {
            (Some(ChangeKind::Added), _) => ChangeKind::Added,
            (Some(ChangeKind::Removed), false) => ChangeKind::Updated,
            (None, false) => ChangeKind::Added,
            (_, true) | (Some(ChangeKind::Updated), false) => ChangeKind::Updated,
        };
        self.changes.insert(name.to_string(), next);
    }

    /// Record a removal. `held` is whether the attribute was present in memory
    /// before this removal.
    pub fn record_remove(&mut self, name: &str, held: bool) {
        if !held {
            return;
        }
        match self.changes.get(name).copied() {
            Some(ChangeKind::Added) => {
                self.changes.remove(name);
            }
            _ => {
                self.changes.insert(name.to_string(), ChangeKind::Removed);
            }
        }
    }

    /// Record a read of a held attribute; only marks it if nothing else has.
    pub fn record_touch(&mut self, name: &str) {
        self.changes
            .entry(name.to_string())
            .or_insert(ChangeKind::Updated);
    }

    pub fn get(&self, name: &str) -> Option<ChangeKind> {
        self.changes.get(name).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Names recorded with the given kind, sorted for stable statement order.
    pub fn names_of(&self, kind: ChangeKind) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .changes
            .iter()
            .filter(|(_, k)| **k == kind)
            .map(|(n, _)| n.as_str())
            .collect();
        names.sort_unstable();
        names
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, ChangeKind)> {
        self.changes.iter().map(|(n, k)| (n.as_str(), *k))
    }

    /// Forget everything recorded (after a save or a fresh load).
    pub fn clear(&mut self) {
        self.changes.clear();
    }
}
