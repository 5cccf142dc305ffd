//! Sigil inventory: acquired, used and available per tier.

use crate::prices::PriceBook;
use build_core::{BuildState, TierTable};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierInventory {
    pub acquired: i64,
    pub used: i64,
    /// `acquired - used`; never clamped, negative means underflow.
    pub available: i64,
}

/// Derive the six-tier inventory table.
///
/// An exempt tier reports nothing acquired or used: its nodes are charged
/// per node by the ledger instead. The gated tree draws one unit of its tier
/// per live node only while that tier is not exempt.
pub fn compute_inventory(state: &BuildState, book: &PriceBook<'_>) -> TierTable<TierInventory> {
    let pricing = book.pricing();
    let usage = state.tree_usage();
    let headroom = if state.flags.debug {
        i64::from(pricing.debug.headroom)
    } else {
        0
    };
    let gated_nodes = state.gated.live.nodes.len() as i64;

    usage.map(|tier, &tree_used| {
        let (acquired, used) = if book.is_exempt(tier) {
            (0, 0)
        } else {
            let acquired =
                i64::from(state.sigils.total(tier)) + i64::from(book.extra_units(tier));
            let mut used = i64::from(tree_used);
            if tier == pricing.gated_tier {
                used += gated_nodes;
            }
            (acquired, used)
        };
        let acquired = acquired + headroom;
        TierInventory {
            acquired,
            used,
            available: acquired - used,
        }
    })
}
