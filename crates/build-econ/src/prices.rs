//! Effective prices for one evaluation.
//!
//! Modifiers compose in a fixed order:
//! 1. faction discount (trial price, flat tier price, node discounts, floored at zero)
//! 2. pact multiplier or zeroing
//! 3. pact partial refund
//! 4. pact extra-unit purchase
//!
//! Stages 3 and 4 are quantities rather than prices; they are exposed here and
//! charged by the ledger.

use build_core::{
    BuildFlags, Currency, PactEffect, PricingConfig, SigilTier, TierTable, TreeId, TreeNode,
};

/// Resolved per-tier prices for a fixed set of flags.
#[derive(Clone, Debug)]
pub struct PriceBook<'a> {
    pricing: &'a PricingConfig,
    flags: &'a BuildFlags,
    /// Unit price after stage 1.
    discounted: TierTable<i64>,
    /// Stage 2 factor; zero when a pact zeroes the tier.
    factor: TierTable<i64>,
    refund_units: TierTable<u32>,
    extra_units: TierTable<u32>,
}

impl<'a> PriceBook<'a> {
    pub fn new(pricing: &'a PricingConfig, flags: &'a BuildFlags) -> Self {
        let faction = flags.faction;
        let discounted = pricing.tiers.map(|tier, tp| {
            let base = if tier == pricing.trial.tier {
                pricing.trial.prices.for_faction(faction)
            } else {
                tp.price
            };
            pricing
                .flat_prices
                .iter()
                .filter(|r| r.faction == faction && r.tier == tier)
                .map(|r| r.price)
                .last()
                .unwrap_or(base)
        });

        let mut factor = TierTable {
            kaarn: 1,
            purth: 1,
            juathas: 1,
            xuth: 1,
            sinthru: 1,
            lekolu: 1,
        };
        let mut zeroed = TierTable::<bool>::default();
        let mut refund_units = TierTable::<u32>::default();
        let mut extra_units = TierTable::<u32>::default();
        for rule in pricing.pact_rules.iter().filter(|r| flags.has_pact(r.pact)) {
            match rule.effect {
                PactEffect::Multiply { factor: f } => factor[rule.tier] *= f,
                PactEffect::Zero => zeroed[rule.tier] = true,
                PactEffect::Refund { units } => {
                    refund_units[rule.tier] = refund_units[rule.tier].saturating_add(units)
                }
                PactEffect::ExtraUnits { units } => {
                    extra_units[rule.tier] = extra_units[rule.tier].saturating_add(units)
                }
            }
        }
        for (tier, z) in zeroed.iter() {
            if *z {
                factor[tier] = 0;
            }
        }

        Self {
            pricing,
            flags,
            discounted,
            factor,
            refund_units,
            extra_units,
        }
    }

    pub fn flags(&self) -> &BuildFlags {
        self.flags
    }

    pub fn pricing(&self) -> &PricingConfig {
        self.pricing
    }

    /// Effective direct-purchase price of one unit (stages 1 and 2).
    pub fn unit_price(&self, tier: SigilTier) -> i64 {
        self.discounted[tier] * self.factor[tier]
    }

    pub fn refund_units(&self, tier: SigilTier) -> u32 {
        self.refund_units[tier]
    }

    pub fn extra_units(&self, tier: SigilTier) -> u32 {
        self.extra_units[tier]
    }

    /// Whether the tier is bypassed by its exemption pact.
    pub fn is_exempt(&self, tier: SigilTier) -> bool {
        self.pricing
            .exemption
            .as_ref()
            .is_some_and(|ex| ex.tier == tier && self.flags.has_pact(ex.pact))
    }

    /// Per-node price and currency charged for exempt-tier nodes, when the exemption is active.
    pub fn exempt_node_charge(&self) -> Option<(i64, Currency)> {
        let ex = self.pricing.exemption.as_ref()?;
        self.flags
            .has_pact(ex.pact)
            .then(|| (ex.per_node.for_faction(self.flags.faction), ex.currency))
    }

    /// Faction discount per unit for a tier inside a tree; tree-scoped and
    /// cross-tree rules add up.
    pub fn node_discount(&self, tree: &TreeId, tier: SigilTier) -> i64 {
        self.pricing
            .node_discounts
            .iter()
            .filter(|r| r.faction == self.flags.faction && r.tier == tier)
            .filter(|r| r.tree.as_ref().map_or(true, |t| t == tree))
            .map(|r| r.per_unit)
            .sum()
    }

    /// Price of a node before node discounts: what its sigils cost to buy.
    pub fn nominal_node_price(&self, node: &TreeNode) -> i64 {
        self.unit_price(node.tier) * i64::from(node.units)
    }

    /// Price actually borne by a node once every modifier applies.
    ///
    /// Exempt-tier nodes are charged the flat per-node price instead.
    pub fn node_price(&self, tree: &TreeId, node: &TreeNode) -> i64 {
        if self.is_exempt(node.tier) {
            return self.exempt_node_charge().map_or(0, |(price, _)| price);
        }
        let per_unit = (self.discounted[node.tier] - self.node_discount(tree, node.tier)).max(0);
        per_unit * self.factor[node.tier] * i64::from(node.units)
    }
}
