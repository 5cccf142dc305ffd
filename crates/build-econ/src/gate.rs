//! Suspend/restore state machine for the gated bonus tree.
//!
//! Exactly one of {live, backup} is authoritative: live while the gating
//! condition holds, backup while it does not. While suspended, anything that
//! shows up in live is swept into the backup on every observation, so the
//! backup only ever grows until the next restore. Restores are computed
//! against the previously recorded condition, so batched updates that end
//! where they started produce no transition and repeated observations are
//! no-ops.

use build_core::{GatedSelections, GatedState};
use tracing::info;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GatePhase {
    Active,
    Suspended,
}

impl GatePhase {
    pub fn from_condition(open: bool) -> Self {
        if open {
            GatePhase::Active
        } else {
            GatePhase::Suspended
        }
    }
}

/// A transition that actually moved selections.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GateTransition {
    /// Live selections were cleared into the backup slot.
    Suspended { cleared: GatedSelections },
    /// Backed-up selections were moved back to live.
    Restored { restored: GatedSelections },
}

/// Append `from` to `into`, skipping node and pick ids already present.
fn merge(into: &mut GatedSelections, from: &GatedSelections) {
    for node in &from.nodes {
        if !into.nodes.contains(node) {
            into.nodes.push(node.clone());
        }
    }
    for pick in &from.picks {
        if !into.picks.iter().any(|p| p.id == pick.id) {
            into.picks.push(pick.clone());
        }
    }
}

/// Record `open` and apply the transition it implies.
///
/// Suspended: any live selection is moved into the backup, even if the
/// condition did not change. Active: the backup is merged back into live,
/// but only on a closed-to-open edge.
pub fn observe_gate(gated: &mut GatedState, open: bool) -> Option<GateTransition> {
    let previous = gated.last_condition.replace(open);
    match GatePhase::from_condition(open) {
        GatePhase::Suspended => {
            if gated.live.is_empty() {
                return None;
            }
            let cleared = std::mem::take(&mut gated.live);
            merge(&mut gated.backup, &cleared);
            info!(
                nodes = cleared.nodes.len(),
                picks = cleared.picks.len(),
                backed_up = gated.backup.nodes.len(),
                "gated tree suspended"
            );
            Some(GateTransition::Suspended { cleared })
        }
        GatePhase::Active => {
            if previous == Some(true) || gated.backup.is_empty() {
                return None;
            }
            let restored = std::mem::take(&mut gated.backup);
            merge(&mut gated.live, &restored);
            info!(
                nodes = restored.nodes.len(),
                picks = restored.picks.len(),
                "gated tree restored"
            );
            Some(GateTransition::Restored { restored })
        }
    }
}
