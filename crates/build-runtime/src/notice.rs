//! One-time user-visible messages raised by recomputation.

use build_core::{BuildFlags, Currency, GatedSelections, PricingConfig, SigilTier};
use build_econ::{GateTransition, PriceBook};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Resources released or re-charged by a gate transition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Refund {
    Sigils { tier: SigilTier, units: u32 },
    Currency { currency: Currency, amount: i64 },
}

impl fmt::Display for Refund {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Refund::Sigils { tier, units } => write!(f, "{units} {tier}"),
            Refund::Currency { currency, amount } => write!(f, "{amount} {currency}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Notice {
    GateSuspended {
        nodes: usize,
        picks: Vec<String>,
        refund: Refund,
    },
    GateRestored {
        nodes: usize,
        picks: Vec<String>,
        charge: Refund,
    },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::GateSuspended {
                nodes,
                picks,
                refund,
            } => {
                write!(f, "Bonus tree sealed: {nodes} node(s) cleared, {refund} refunded")?;
                if !picks.is_empty() {
                    write!(f, "; picks set aside: {}", picks.join(", "))?;
                }
                Ok(())
            }
            Notice::GateRestored {
                nodes,
                picks,
                charge,
            } => {
                write!(f, "Bonus tree restored: {nodes} node(s) back, {charge} drawn again")?;
                if !picks.is_empty() {
                    write!(f, "; picks returned: {}", picks.join(", "))?;
                }
                Ok(())
            }
        }
    }
}

/// What clearing (or restoring) `sel` releases under the current flags.
pub fn describe_refund(
    sel: &GatedSelections,
    flags: &BuildFlags,
    pricing: &PricingConfig,
) -> Refund {
    let book = PriceBook::new(pricing, flags);
    let nodes = sel.nodes.len();
    match book.exempt_node_charge() {
        Some((price, currency)) if book.is_exempt(pricing.gated_tier) => Refund::Currency {
            currency,
            amount: price * nodes as i64,
        },
        _ => Refund::Sigils {
            tier: pricing.gated_tier,
            units: u32::try_from(nodes).unwrap_or(u32::MAX),
        },
    }
}

pub(crate) fn notice_for(
    transition: &GateTransition,
    flags: &BuildFlags,
    pricing: &PricingConfig,
) -> Notice {
    let pick_ids =
        |sel: &GatedSelections| -> Vec<String> { sel.picks.iter().map(|p| p.id.clone()).collect() };
    match transition {
        GateTransition::Suspended { cleared } => Notice::GateSuspended {
            nodes: cleared.nodes.len(),
            picks: pick_ids(cleared),
            refund: describe_refund(cleared, flags, pricing),
        },
        GateTransition::Restored { restored } => Notice::GateRestored {
            nodes: restored.nodes.len(),
            picks: pick_ids(restored),
            charge: describe_refund(restored, flags, pricing),
        },
    }
}
