//! At most one active run per submission slot
//!
//! Starting a run in a slot trips the kill switch of whatever was running
//! there. When the old run's answer finally arrives it is recognised as
//! stale by its generation and never reported as the slot's result.

use std::collections::HashMap;
use std::sync::Mutex;

use thiserror::Error;
use tracing::debug;

use crate::sandbox::KillSwitch;

/// The run was replaced by a newer one in the same slot
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("run in slot '{slot}' was superseded by a newer submission")]
pub struct Superseded {
    pub slot: String,
}

/// Ticket for one run in a slot
#[derive(Debug, Clone)]
pub struct SlotTicket {
    slot: String,
    generation: u64,
    kill: KillSwitch,
}

impl SlotTicket {
    pub fn slot(&self) -> &str {
        &self.slot
    }

    /// Kill switch handed to this run's worker
    pub fn kill_switch(&self) -> &KillSwitch {
        &self.kill
    }
}

#[derive(Debug, Default)]
struct SlotTable {
    next_generation: u64,
    active: HashMap<String, (u64, KillSwitch)>,
}

/// Registry of the active run per slot
#[derive(Debug, Default)]
pub struct SubmissionSlots {
    table: Mutex<SlotTable>,
}

impl SubmissionSlots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new run in `slot`, killing the previous one
    pub fn begin(&self, slot: &str) -> SlotTicket {
        let mut table = self.lock();
        table.next_generation += 1;
        let generation = table.next_generation;
        let kill = KillSwitch::new();
        if let Some((previous, old_kill)) = table
            .active
            .insert(slot.to_string(), (generation, kill.clone()))
        {
            debug!(slot, previous, "superseding active run");
            old_kill.trip();
        }
        SlotTicket {
            slot: slot.to_string(),
            generation,
            kill,
        }
    }

    /// Close the ticket's run; `Err` when a newer run took the slot
    pub fn finish(&self, ticket: &SlotTicket) -> Result<(), Superseded> {
        let mut table = self.lock();
        match table.active.get(&ticket.slot) {
            Some((generation, _)) if *generation == ticket.generation => {
                table.active.remove(&ticket.slot);
                Ok(())
            }
            _ => Err(Superseded {
                slot: ticket.slot.clone(),
            }),
        }
    }

    /// Check if a run is active in `slot`
    pub fn is_active(&self, slot: &str) -> bool {
        self.lock().active.contains_key(slot)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SlotTable> {
        // The table stays consistent even if a holder panicked
        self.table.lock().unwrap_or_else(|e| e.into_inner())
    }
}
