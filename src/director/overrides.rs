//! Operator overrides of server availability
//!
//! Effective availability is reconciled from two inputs: the static filter
//! list loaded at startup, and the runtime override map mutated by operator
//! toggles. An override entry only exists while the effective state differs
//! from what the static list alone would give, except `PermDisabled`, which
//! records that a temporarily enabled server was disabled again.
//!
//! ```text
//!   current           disable            enable
//!   ---------------   ----------------   ----------------
//!   enabled           -> TempDisabled    conflict
//!   TempDisabled      conflict           -> (entry removed)
//!   static/Perm       conflict           -> TempEnabled
//!   TempEnabled       -> PermDisabled    conflict
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{PoisonError, RwLock, RwLockReadGuard};

use crate::common::{Error, Result};

/// A stored runtime override
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OverrideState {
    /// Disabled at runtime; not in the static filter list
    TempDisabled,
    /// Statically filtered server that was re-disabled after a `TempEnabled`
    PermDisabled,
    /// Statically filtered server temporarily allowed
    TempEnabled,
}

/// Why a server has its current availability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DisabledReason {
    None,
    Static,
    TempDisabled,
    PermDisabled,
    TempEnabled,
}

impl From<OverrideState> for DisabledReason {
    fn from(state: OverrideState) -> Self {
        match state {
            OverrideState::TempDisabled => DisabledReason::TempDisabled,
            OverrideState::PermDisabled => DisabledReason::PermDisabled,
            OverrideState::TempEnabled => DisabledReason::TempEnabled,
        }
    }
}

impl fmt::Display for DisabledReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DisabledReason::None => "none",
            DisabledReason::Static => "static",
            DisabledReason::TempDisabled => "tempDisabled",
            DisabledReason::PermDisabled => "permDisabled",
            DisabledReason::TempEnabled => "tempEnabled",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EffectiveAvailability {
    pub disabled: bool,
    pub reason: DisabledReason,
}

impl EffectiveAvailability {
    fn derive(
        overrides: &HashMap<String, OverrideState>,
        filtered: &HashSet<String>,
        server_id: &str,
    ) -> Self {
        match overrides.get(server_id) {
            Some(OverrideState::TempEnabled) => Self {
                disabled: false,
                reason: DisabledReason::TempEnabled,
            },
            Some(state) => Self {
                disabled: true,
                reason: (*state).into(),
            },
            None if filtered.contains(server_id) => Self {
                disabled: true,
                reason: DisabledReason::Static,
            },
            None => Self {
                disabled: false,
                reason: DisabledReason::None,
            },
        }
    }
}

/// Change to the override map produced by a valid toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Set(OverrideState),
    Remove,
}

/// Apply one row of the toggle table.
pub fn transition(current: EffectiveAvailability, disable: bool) -> Result<Transition> {
    let reason = current.reason;
    match (reason, disable) {
        (DisabledReason::None, true) => Ok(Transition::Set(OverrideState::TempDisabled)),
        (DisabledReason::TempEnabled, true) => Ok(Transition::Set(OverrideState::PermDisabled)),
        (DisabledReason::TempDisabled, false) => Ok(Transition::Remove),
        (DisabledReason::Static | DisabledReason::PermDisabled, false) => {
            Ok(Transition::Set(OverrideState::TempEnabled))
        }
        (DisabledReason::None, false) => Err(Error::Conflict {
            reason,
            message: "Can't enable a server that is not disabled or does not exist".to_string(),
        }),
        (_, true) => Err(Error::Conflict {
            reason,
            message: format!(
                "Can't disable a server that already has been disabled with reason: {}",
                reason
            ),
        }),
        (_, false) => Err(Error::Conflict {
            reason,
            message: format!(
                "Can't enable a server that already has been enabled with reason: {}",
                reason
            ),
        }),
    }
}

/// Runtime overrides on top of the immutable static filter list.
#[derive(Debug, Default)]
pub struct ServerOverrideRegistry {
    overrides: RwLock<HashMap<String, OverrideState>>,
    filtered: HashSet<String>,
}

impl ServerOverrideRegistry {
    pub fn new(filtered: impl IntoIterator<Item = String>) -> Self {
        Self {
            overrides: RwLock::new(HashMap::new()),
            filtered: filtered.into_iter().collect(),
        }
    }

    pub fn is_statically_filtered(&self, server_id: &str) -> bool {
        self.filtered.contains(server_id)
    }

    pub fn effective_availability(&self, server_id: &str) -> EffectiveAvailability {
        self.read().effective_availability(server_id)
    }

    pub fn override_state(&self, server_id: &str) -> Option<OverrideState> {
        self.read().overrides.get(server_id).copied()
    }

    /// Disable or re-enable a server. The state check and the mutation happen
    /// under one write lock; a rejected toggle leaves the map untouched.
    pub fn toggle(&self, server_id: &str, disable: bool) -> Result<EffectiveAvailability> {
        let mut overrides = self
            .overrides
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        let current = EffectiveAvailability::derive(&overrides, &self.filtered, server_id);
        match transition(current, disable)? {
            Transition::Set(state) => {
                overrides.insert(server_id.to_string(), state);
            }
            Transition::Remove => {
                overrides.remove(server_id);
            }
        }

        let updated = EffectiveAvailability::derive(&overrides, &self.filtered, server_id);
        tracing::info!(
            server = %server_id,
            from = %current.reason,
            to = %updated.reason,
            disabled = updated.disabled,
            "server override updated"
        );
        Ok(updated)
    }

    /// Hold the read lock for a composed read across many servers.
    pub fn read(&self) -> OverrideView<'_> {
        OverrideView {
            overrides: self.overrides.read().unwrap_or_else(PoisonError::into_inner),
            filtered: &self.filtered,
        }
    }
}

/// A consistent read of the override registry.
pub struct OverrideView<'a> {
    overrides: RwLockReadGuard<'a, HashMap<String, OverrideState>>,
    filtered: &'a HashSet<String>,
}

impl OverrideView<'_> {
    pub fn effective_availability(&self, server_id: &str) -> EffectiveAvailability {
        EffectiveAvailability::derive(&self.overrides, self.filtered, server_id)
    }

    pub fn is_disabled(&self, server_id: &str) -> bool {
        self.effective_availability(server_id).disabled
    }
}
