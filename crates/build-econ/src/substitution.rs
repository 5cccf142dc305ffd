//! Alternate-currency substitution: nodes paid with another currency than BP.

use crate::ledger::Ledger;
use crate::prices::PriceBook;
use build_core::{BuildState, Currency, NodeKey, PricingConfig, SigilTier};
use tracing::{debug, info};

/// Whether an override to `currency` may exist under the given flags.
fn override_allowed(state: &BuildState, pricing: &PricingConfig, currency: Currency) -> bool {
    currency != Currency::Tertiary || state.flags.has_pact(pricing.tertiary_pact)
}

/// Drop overrides whose node is no longer selected, or whose target currency is locked.
///
/// Returns the removed keys in order.
pub fn prune_substitutions(state: &mut BuildState, pricing: &PricingConfig) -> Vec<NodeKey> {
    let stale: Vec<NodeKey> = state
        .substitutions
        .iter()
        .filter(|(key, currency)| {
            state.node(key).is_none() || !override_allowed(state, pricing, **currency)
        })
        .map(|(key, _)| key.clone())
        .collect();
    for key in &stale {
        state.substitutions.remove(key);
        info!(node = %key, "substitution override pruned");
    }
    stale
}

/// Currency a node's draw was paid in before any override.
///
/// Exempt tiers use the per-node charge currency. Otherwise BP, unless the
/// tier was bought with FP only.
fn default_currency(state: &BuildState, book: &PriceBook<'_>, tier: SigilTier) -> Currency {
    if book.is_exempt(tier) {
        return book
            .exempt_node_charge()
            .map_or(Currency::Primary, |(_, currency)| currency);
    }
    if state.sigils.primary[tier] == 0 && state.sigils.secondary[tier] > 0 {
        Currency::Secondary
    } else {
        Currency::Primary
    }
}

/// Move each overridden node's price from its default currency to the override.
///
/// Runs after base aggregation. Sigil consumption is untouched. Stale entries
/// are skipped so evaluation stays pure even before pruning.
pub fn resolve_substitutions(ledger: &mut Ledger, state: &BuildState, book: &PriceBook<'_>) {
    for (key, target) in &state.substitutions {
        let Some(node) = state.node(key) else {
            debug!(node = %key, "override for unselected node skipped");
            continue;
        };
        if !override_allowed(state, book.pricing(), *target) {
            debug!(node = %key, "override to locked currency skipped");
            continue;
        }
        let source = default_currency(state, book, node.tier);
        if source == *target {
            continue;
        }
        let price = book.node_price(&key.tree, node);
        let line = format!("substitution:{key}");
        ledger.record(line.clone(), source, 0, -price);
        ledger.record(line, *target, 0, price);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::aggregate_ledger;
    use build_core::{Pact, TreeNode};

    fn flagged_state() -> BuildState {
        let mut s = BuildState::default();
        s.flags.pacts.insert(Pact::Kindred);
        s.sigils.primary.juathas = 2;
        s.select_node("verdant", TreeNode::new("thornwall", SigilTier::Juathas));
        s.substitutions
            .insert(NodeKey::new("verdant", "thornwall"), Currency::Tertiary);
        s
    }

    #[test]
    fn moves_price_between_currencies() {
        let pricing = PricingConfig::default();
        let s = flagged_state();
        let book = PriceBook::new(&pricing, &s.flags);
        let mut ledger = aggregate_ledger(&s, &book);
        assert_eq!(ledger.tally(Currency::Primary).spent, 16);
        resolve_substitutions(&mut ledger, &s, &book);
        assert_eq!(ledger.tally(Currency::Primary).spent, 8);
        assert_eq!(ledger.tally(Currency::Tertiary).spent, 8);
    }

    #[test]
    fn fp_bought_tier_is_debited_from_fp() {
        let pricing = PricingConfig::default();
        let mut s = BuildState::default();
        s.flags.pacts.insert(Pact::Kindred);
        s.sigils.secondary.kaarn = 3;
        s.select_node("verdant", TreeNode::new("seedling", SigilTier::Kaarn));
        s.substitutions
            .insert(NodeKey::new("verdant", "seedling"), Currency::Tertiary);
        let book = PriceBook::new(&pricing, &s.flags);
        let mut ledger = aggregate_ledger(&s, &book);
        resolve_substitutions(&mut ledger, &s, &book);
        assert_eq!(ledger.tally(Currency::Primary).spent, 0);
        assert_eq!(ledger.tally(Currency::Secondary).spent, 2);
        assert_eq!(ledger.tally(Currency::Tertiary).spent, 1);
    }

    #[test]
    fn prune_removes_deselected_nodes() {
        let pricing = PricingConfig::default();
        let mut s = flagged_state();
        s.deselect_node(&NodeKey::new("verdant", "thornwall"));
        let pruned = prune_substitutions(&mut s, &pricing);
        assert_eq!(pruned, vec![NodeKey::new("verdant", "thornwall")]);
        assert!(s.substitutions.is_empty());
    }

    #[test]
    fn prune_removes_tertiary_without_pact() {
        let pricing = PricingConfig::default();
        let mut s = flagged_state();
        s.flags.pacts.clear();
        assert_eq!(prune_substitutions(&mut s, &pricing).len(), 1);
    }

    #[test]
    fn prune_keeps_live_overrides() {
        let pricing = PricingConfig::default();
        let mut s = flagged_state();
        assert!(prune_substitutions(&mut s, &pricing).is_empty());
        assert_eq!(s.substitutions.len(), 1);
    }

    #[test]
    fn stale_override_has_no_effect() {
        let pricing = PricingConfig::default();
        let mut s = flagged_state();
        s.trees.clear();
        let book = PriceBook::new(&pricing, &s.flags);
        let mut ledger = aggregate_ledger(&s, &book);
        let before = ledger.clone();
        resolve_substitutions(&mut ledger, &s, &book);
        assert_eq!(ledger, before);
    }
}
