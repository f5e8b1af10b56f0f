//! The session entity.
//!
//! A `Session` is plain data plus local change tracking. It knows nothing
//! about SQL: the repository reads its pending changes, issues statements,
//! and then calls [`Session::mark_persisted`].

use std::collections::HashMap;
use std::time::Duration;

use crate::delta::{AttributeChange, AttributeDiffTracker, ChangeKind};
use crate::ids::{PrimaryKey, SessionId};
use crate::policy::{AttributeAccess, SaveMode};
use crate::AttributeValue;

/// Attribute holding the principal name directly (a JSON string).
pub const PRINCIPAL_NAME_INDEX_NAME: &str = "PRINCIPAL_NAME_INDEX_NAME";

/// Attribute holding a security context; its `authentication.name` field is
/// used as the principal name when [`PRINCIPAL_NAME_INDEX_NAME`] is absent.
pub const SECURITY_CONTEXT_ATTRIBUTE: &str = "SECURITY_CONTEXT";

/// Default max inactive interval (30 minutes).
pub const DEFAULT_MAX_INACTIVE_INTERVAL: Duration = Duration::from_secs(1800);

/// Stored fields of a session, as read back from a database row.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionState {
    pub primary_key: PrimaryKey,
    pub id: SessionId,
    /// Unix millis.
    pub creation_time: u64,
    /// Unix millis.
    pub last_accessed_time: u64,
    pub max_inactive_interval: Duration,
    pub attributes: HashMap<String, AttributeValue>,
}

/// In-memory view of one session and what changed since the last flush.
#[derive(Clone, Debug)]
pub struct Session {
    primary_key: PrimaryKey,
    id: SessionId,
    creation_time: u64,
    last_accessed_time: u64,
    max_inactive_interval: Duration,
    attributes: HashMap<String, AttributeValue>,
    is_new: bool,
    /// The session row itself (id, timestamps, principal) needs an UPDATE.
    changed: bool,
    delta: AttributeDiffTracker,
    save_mode: SaveMode,
}

impl Session {
    /// A brand-new, unsaved session.
    pub fn new(max_inactive_interval: Duration, save_mode: SaveMode) -> Self {
        let now = crate::now_millis();
        Self {
            primary_key: PrimaryKey::new(),
            id: SessionId::generate(),
            creation_time: now,
            last_accessed_time: now,
            max_inactive_interval: whole_seconds(max_inactive_interval),
            attributes: HashMap::new(),
            is_new: true,
            changed: false,
            delta: AttributeDiffTracker::new(),
            save_mode,
        }
    }

    /// Rebuild a persisted session. Change tracking starts out clean.
    pub fn from_state(state: SessionState, save_mode: SaveMode) -> Self {
        Self {
            primary_key: state.primary_key,
            id: state.id,
            creation_time: state.creation_time,
            last_accessed_time: state.last_accessed_time,
            max_inactive_interval: state.max_inactive_interval,
            attributes: state.attributes,
            is_new: false,
            changed: false,
            delta: AttributeDiffTracker::new(),
            save_mode,
        }
    }

    pub fn primary_key(&self) -> PrimaryKey {
        self.primary_key
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn creation_time(&self) -> u64 {
        self.creation_time
    }

    pub fn last_accessed_time(&self) -> u64 {
        self.last_accessed_time
    }

    pub fn max_inactive_interval(&self) -> Duration {
        self.max_inactive_interval
    }

    pub fn save_mode(&self) -> SaveMode {
        self.save_mode
    }

    pub fn is_new(&self) -> bool {
        self.is_new
    }

    /// Whether the session row needs an UPDATE.
    pub fn is_changed(&self) -> bool {
        self.changed
    }

    /// Unix millis after which the session is expired.
    pub fn expiry_time(&self) -> u64 {
        let interval_millis =
            u64::try_from(self.max_inactive_interval.as_millis()).unwrap_or(u64::MAX);
        self.last_accessed_time.saturating_add(interval_millis)
    }

    pub fn is_expired_at(&self, now_millis: u64) -> bool {
        now_millis > self.expiry_time()
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(crate::now_millis())
    }

    // ========================================================================
    // Attributes
    // ========================================================================

    /// Read an attribute. Under [`SaveMode::OnGetAttribute`] this marks a held
    /// attribute for rewrite on the next save.
    pub fn attribute(&mut self, name: &str) -> Option<&AttributeValue> {
        if self.save_mode.records(AttributeAccess::Get) && self.attributes.contains_key(name) {
            self.delta.record_touch(name);
        }
        self.attributes.get(name)
    }

    /// Read an attribute without going through the save policy.
    pub fn peek_attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }

    /// Snapshot of attribute names; safe to iterate while removing.
    pub fn attribute_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.attributes.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    pub fn attribute_count(&self) -> usize {
        self.attributes.len()
    }

    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<AttributeValue>) {
        let name = name.into();
        let held = self.attributes.contains_key(&name);
        if self.save_mode.records(AttributeAccess::Set) {
            self.delta.record_set(&name, held);
        }
        if is_principal_attribute(&name) {
            self.changed = true;
        }
        self.attributes.insert(name, value.into());
    }

    /// Remove an attribute, returning its value if it was held.
    pub fn remove_attribute(&mut self, name: &str) -> Option<AttributeValue> {
        let removed = self.attributes.remove(name);
        if self.save_mode.records(AttributeAccess::Remove) {
            self.delta.record_remove(name, removed.is_some());
        }
        if removed.is_some() && is_principal_attribute(name) {
            self.changed = true;
        }
        removed
    }

    // ========================================================================
    // Row fields
    // ========================================================================

    pub fn set_last_accessed_time(&mut self, millis: u64) {
        self.last_accessed_time = millis;
        self.changed = true;
    }

    /// Sub-second precision is dropped; the interval is stored in seconds.
    pub fn set_max_inactive_interval(&mut self, interval: Duration) {
        self.max_inactive_interval = whole_seconds(interval);
        self.changed = true;
    }

    /// Rotate the external id. The primary key is untouched.
    pub fn change_session_id(&mut self) -> &SessionId {
        self.id = SessionId::generate();
        self.changed = true;
        &self.id
    }

    /// Principal name stored alongside the row for index lookups.
    pub fn principal_name(&self) -> Option<String> {
        if let Some(name) = self
            .attributes
            .get(PRINCIPAL_NAME_INDEX_NAME)
            .and_then(|v| v.as_str())
        {
            return Some(name.to_string());
        }
        self.attributes
            .get(SECURITY_CONTEXT_ATTRIBUTE)
            .and_then(|ctx| ctx.pointer("/authentication/name"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
    }

    // ========================================================================
    // Change tracking
    // ========================================================================

    /// Whether a save would have to write anything.
    pub fn has_pending_writes(&self) -> bool {
        self.is_new
            || self.changed
            || !self.delta.is_empty()
            || (self.save_mode.rewrites_all() && !self.attributes.is_empty())
    }

    /// Recorded change kind for one attribute, ignoring [`SaveMode::Always`].
    pub fn recorded_change(&self, name: &str) -> Option<ChangeKind> {
        self.delta.get(name)
    }

    /// Changes of one kind, materialized with their current values and
    /// sorted by name.
    ///
    /// Under [`SaveMode::Always`] every held attribute without a record is
    /// reported as `Updated`.
    pub fn pending_changes(&self, kind: ChangeKind) -> Vec<AttributeChange> {
        let mut names: Vec<&str> = self.delta.names_of(kind);
        if kind == ChangeKind::Updated && self.save_mode.rewrites_all() {
            names.extend(
                self.attributes
                    .keys()
                    .map(String::as_str)
                    .filter(|n| self.delta.get(n).is_none()),
            );
            names.sort_unstable();
        }

        names
            .into_iter()
            .filter_map(|name| match kind {
                ChangeKind::Removed => Some(AttributeChange::Removed(name.to_string())),
                ChangeKind::Added => self
                    .attributes
                    .get(name)
                    .map(|v| AttributeChange::Added(name.to_string(), v.clone())),
                ChangeKind::Updated => self
                    .attributes
                    .get(name)
                    .map(|v| AttributeChange::Updated(name.to_string(), v.clone())),
            })
            .collect()
    }

    /// Every held attribute as an `Added` change (first insert of a new session).
    pub fn all_attributes_as_added(&self) -> Vec<AttributeChange> {
        let mut changes: Vec<AttributeChange> = self
            .attributes
            .iter()
            .map(|(n, v)| AttributeChange::Added(n.clone(), v.clone()))
            .collect();
        changes.sort_by(|a, b| a.name().cmp(b.name()));
        changes
    }

    /// Start a new change cycle: nothing recorded, row clean.
    pub fn clear_change_flags(&mut self) {
        self.delta.clear();
        self.changed = false;
    }

    /// Called by the repository after a successful save.
    pub fn mark_persisted(&mut self) {
        self.is_new = false;
        self.clear_change_flags();
    }
}

fn whole_seconds(interval: Duration) -> Duration {
    Duration::from_secs(interval.as_secs())
}

fn is_principal_attribute(name: &str) -> bool {
    name == PRINCIPAL_NAME_INDEX_NAME || name == SECURITY_CONTEXT_ATTRIBUTE
}

// ============================================================================
// Tests
// ============================================================================
