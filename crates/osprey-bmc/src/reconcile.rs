//! Slot reconciliation engine
//!
//! Accounts and LDAP role groups live in fixed-capacity, vendor-indexed
//! slots. Reconciling either kind is the same algorithm: read the full slot
//! map, match each desired entry by natural key among enabled slots, reuse
//! the matched slot or allocate the lowest free one, and turn disables into
//! removals. Planning is pure; the vendor client applies the plan and
//! collects per-entry outcomes.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::BmcError;
use crate::types::{DesiredUser, LdapRoleGroup, LdapRoleGroupCfg, UserSlot};

/// Current state of one slot, as the planner sees it
pub trait SlotRecord {
    /// Natural key (username or group DN); empty on a free slot
    fn key(&self) -> &str;

    /// Whether the record is active. Matching only considers enabled slots;
    /// keys are unique among them.
    fn is_enabled(&self) -> bool;

    fn is_free(&self) -> bool {
        self.key().is_empty()
    }
}

/// One desired entry, as the planner sees it
pub trait DesiredEntry {
    fn key(&self) -> &str;
    fn enabled(&self) -> bool;
}

impl SlotRecord for UserSlot {
    fn key(&self) -> &str {
        &self.username
    }

    fn is_enabled(&self) -> bool {
        UserSlot::is_enabled(self)
    }
}

impl DesiredEntry for DesiredUser {
    fn key(&self) -> &str {
        &self.name
    }

    fn enabled(&self) -> bool {
        self.enable
    }
}

impl SlotRecord for LdapRoleGroup {
    fn key(&self) -> &str {
        &self.dn
    }

    // A role group with a DN is live; the tombstone form is both free and
    // disabled.
    fn is_enabled(&self) -> bool {
        !self.dn.is_empty()
    }
}

impl DesiredEntry for LdapRoleGroupCfg {
    fn key(&self) -> &str {
        &self.group_dn
    }

    fn enabled(&self) -> bool {
        self.enable
    }
}

/// What the planner decided for one desired entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannedAction {
    /// Write the desired payload to this slot (create or update)
    Write { slot: u8 },
    /// Remove whatever occupies this slot
    Remove { slot: u8 },
    /// Nothing to do (disable requested, no matching record)
    Skip,
    /// Enable requested but every writable slot is taken
    NoFreeSlot,
}

#[derive(Debug, Clone)]
pub struct PlannedEntry {
    /// Position in the caller's desired list
    pub index: usize,
    pub key: String,
    pub action: PlannedAction,
}

/// Compute slot actions for a desired list against a current slot map.
///
/// Entries are planned in caller order. Allocation is deterministic: the
/// lowest free, non-reserved slot wins, and a slot handed to an earlier
/// entry is not free for a later one. Slots freed by removals in the same
/// pass are not reallocated until the next read of the device.
pub fn plan<S, D>(current: &BTreeMap<u8, S>, desired: &[D], reserved: &[u8]) -> Vec<PlannedEntry>
where
    S: SlotRecord,
    D: DesiredEntry,
{
    let mut allocated: BTreeSet<u8> = BTreeSet::new();
    let mut entries = Vec::with_capacity(desired.len());

    for (index, entry) in desired.iter().enumerate() {
        let matched = current
            .iter()
            .find(|(_, slot)| slot.is_enabled() && slot.key() == entry.key())
            .map(|(id, _)| *id);

        let action = match (entry.enabled(), matched) {
            (true, Some(slot)) => PlannedAction::Write { slot },
            (true, None) => {
                let free = current
                    .iter()
                    .find(|(id, slot)| {
                        !reserved.contains(*id) && slot.is_free() && !allocated.contains(*id)
                    })
                    .map(|(id, _)| *id);
                match free {
                    Some(slot) => {
                        allocated.insert(slot);
                        PlannedAction::Write { slot }
                    }
                    None => PlannedAction::NoFreeSlot,
                }
            }
            (false, Some(slot)) => PlannedAction::Remove { slot },
            (false, None) => PlannedAction::Skip,
        };

        entries.push(PlannedEntry {
            index,
            key: entry.key().to_string(),
            action,
        });
    }

    entries
}

/// A per-entry failure that did not stop the batch
#[derive(Debug)]
pub struct EntryFailure {
    pub entity: String,
    pub error: BmcError,
}

/// Outcome of one reconciliation pass.
///
/// Reconciliation is best-effort per entry: a failed write is recorded here
/// and the remaining entries still run. Only validation and session errors
/// abort the whole batch.
#[derive(Debug, Default)]
pub struct ReconcileReport {
    /// (entity key, slot) pairs written
    pub written: Vec<(String, u8)>,
    /// (entity key, slot) pairs removed or tombstoned
    pub removed: Vec<(String, u8)>,
    /// Entities that needed no action
    pub skipped: Vec<String>,
    pub failures: Vec<EntryFailure>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn fail(&mut self, entity: impl Into<String>, error: BmcError) {
        self.failures.push(EntryFailure {
            entity: entity.into(),
            error,
        });
    }
}
