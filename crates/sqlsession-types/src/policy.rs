//! Save and flush policies.
//!
//! Both are repository-wide settings. The repository injects its [`SaveMode`]
//! into every session it creates or loads, so the session can classify
//! attribute accesses locally; [`FlushMode`] stays on the repository.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Which attribute accesses count as changes that must be persisted.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum SaveMode {
    /// Only `set_attribute` / `remove_attribute` are persisted.
    #[default]
    OnSetAttribute,
    /// Explicit writes, plus any attribute that was read. Covers values that
    /// were mutated in place after being handed out.
    OnGetAttribute,
    /// Every held attribute is rewritten on each save.
    Always,
}

/// When recorded changes are written to storage.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum FlushMode {
    /// Changes are deferred until an explicit save.
    #[default]
    OnSave,
    /// Every mutating call persists before it returns.
    Immediate,
}

/// Kind of attribute access made by application code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttributeAccess {
    Set,
    Remove,
    Get,
}

impl SaveMode {
    /// Whether an access should be forwarded to the diff tracker.
    ///
    /// Under `Always` reads are not tracked individually; the full rewrite is
    /// applied when the change set is materialized (see [`SaveMode::rewrites_all`]).
    pub fn records(self, access: AttributeAccess) -> bool {
        match access {
            AttributeAccess::Set | AttributeAccess::Remove => true,
            AttributeAccess::Get => self == SaveMode::OnGetAttribute,
        }
    }

    /// Whether every held attribute is treated as changed at save time.
    pub fn rewrites_all(self) -> bool {
        self == SaveMode::Always
    }
}

impl FlushMode {
    pub fn is_immediate(self) -> bool {
        self == FlushMode::Immediate
    }
}
