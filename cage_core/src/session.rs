//! Presence state owned by the poll loop.
use std::time::Instant;

use cage_traits::TagId;
use chrono::NaiveDateTime;

use crate::record::AnimalRecord;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceState {
    /// No recognized animal.
    Idle,
    /// A tag was read; registry lookup pending.
    Identifying(TagId),
    /// Unknown tag in range; waiting for the presence signal to clear.
    Unrecognized,
    /// Animal present; weighing and dispensing.
    Active,
    /// Presence lost at `since`; waiting for the same tag or the timeout.
    GracePeriod {
        since: Instant,
        last_seen: NaiveDateTime,
    },
}

impl PresenceState {
    pub fn name(&self) -> &'static str {
        match self {
            PresenceState::Idle => "idle",
            PresenceState::Identifying(_) => "identifying",
            PresenceState::Unrecognized => "unrecognized",
            PresenceState::Active => "active",
            PresenceState::GracePeriod { .. } => "grace",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionState {
    pub state: PresenceState,
    /// Record of the animal in the cage; set in `Active` and `GracePeriod`.
    pub active_animal: Option<AnimalRecord>,
    /// Unknown-tag identifications since start-up; never reset.
    pub unknown_tag_count: u32,
    pub reboot_requested: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            state: PresenceState::Idle,
            active_animal: None,
            unknown_tag_count: 0,
            reboot_requested: false,
        }
    }
}

impl SessionState {
    pub fn in_grace_period(&self) -> bool {
        matches!(self.state, PresenceState::GracePeriod { .. })
    }

    pub fn is_active(&self) -> bool {
        self.state == PresenceState::Active
    }

    pub fn active_tag(&self) -> Option<TagId> {
        self.active_animal.as_ref().map(|a| a.tag)
    }
}
