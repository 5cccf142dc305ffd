//! Pricing configuration: every constant the economy engine reads.
//!
//! Defaults mirror the shipped content tables; a YAML document can override
//! any subset of fields.

use crate::{Currency, CurrencyTable, Faction, Pact, SigilTier, TierTable, TreeId, ValidationError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Direct-purchase price of one sigil unit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierPrice {
    pub price: i64,
    /// Whether the tier may also be bought with FP at the same unit price.
    #[serde(default)]
    pub secondary: bool,
}

/// A price that depends on the active faction.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactionPrice {
    pub default: i64,
    #[serde(default)]
    pub by_faction: BTreeMap<Faction, i64>,
}

impl FactionPrice {
    pub fn for_faction(&self, faction: Faction) -> i64 {
        self.by_faction.get(&faction).copied().unwrap_or(self.default)
    }
}

/// The trial tier's base unit price is chosen by faction before any pact applies.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialPricing {
    pub tier: SigilTier,
    pub prices: FactionPrice,
}

/// Faction replaces a tier's unit price globally.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatPriceRule {
    pub faction: Faction,
    pub tier: SigilTier,
    pub price: i64,
}

/// Faction discount on a tier's units, inside one tree or (with `tree: None`) every tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDiscountRule {
    pub faction: Faction,
    pub tier: SigilTier,
    /// Tree the discount is scoped to; `None` spans every tree.
    #[serde(default)]
    pub tree: Option<TreeId>,
    pub per_unit: i64,
}

/// How an active pact alters one tier's economics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PactEffect {
    /// Multiply the unit price.
    Multiply { factor: i64 },
    /// Unit price becomes zero.
    Zero,
    /// Refund up to `units` purchased units at the effective price.
    Refund { units: u32 },
    /// Buy `units` extra units at the effective price; they join the inventory.
    ExtraUnits { units: u32 },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PactRule {
    pub pact: Pact,
    pub tier: SigilTier,
    pub effect: PactEffect,
}

/// While `pact` is active, `tier` is never bought directly; every node that would
/// draw it is charged `per_node` in `currency` instead.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExemptionRule {
    pub pact: Pact,
    pub tier: SigilTier,
    pub per_node: FactionPrice,
    pub currency: Currency,
}

/// Headcount categories: a non-linear family table and a flat household rate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadcountPricing {
    /// Cost by family size; index is the headcount.
    pub family_size: Vec<i64>,
    /// Added per member beyond the end of the table.
    pub family_overflow_step: i64,
    pub household_per_resident: i64,
    pub currency: Currency,
}

impl HeadcountPricing {
    pub fn family_cost(&self, size: u32) -> i64 {
        let size = size as usize;
        match self.family_size.get(size) {
            Some(cost) => *cost,
            None => {
                let last_idx = self.family_size.len().saturating_sub(1);
                let last = self.family_size.last().copied().unwrap_or(0);
                let beyond = (size - last_idx) as i64;
                last + beyond * self.family_overflow_step
            }
        }
    }

    pub fn household_cost(&self, residents: u32) -> i64 {
        i64::from(residents) * self.household_per_resident
    }
}

/// Per-member fees for companion rosters with the shared same-origin discount.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterPricing {
    pub classmate_fee: i64,
    pub colleague_fee: i64,
    pub same_origin_discount: i64,
    pub currency: Currency,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugPricing {
    /// Balance reported for every currency while debug is on.
    pub sentinel: i64,
    /// Units added to every tier's acquired count while debug is on.
    pub headroom: u32,
}

/// Every constant the engine reads, with shipped defaults.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    pub baselines: CurrencyTable<i64>,
    pub tiers: TierTable<TierPrice>,
    pub trial: TrialPricing,
    pub flat_prices: Vec<FlatPriceRule>,
    pub node_discounts: Vec<NodeDiscountRule>,
    pub pact_rules: Vec<PactRule>,
    pub exemption: Option<ExemptionRule>,
    /// Tier each node of the gated bonus tree draws one unit of.
    pub gated_tier: SigilTier,
    /// Pact that unlocks the tertiary currency and substitution overrides.
    pub tertiary_pact: Pact,
    pub headcount: HeadcountPricing,
    pub rosters: RosterPricing,
    pub debug: DebugPricing,
}

impl Default for PricingConfig {
    fn default() -> Self {
        let tier = |price| TierPrice {
            price,
            secondary: false,
        };
        Self {
            baselines: CurrencyTable {
                primary: 100,
                secondary: 100,
                tertiary: 0,
            },
            tiers: TierTable {
                kaarn: TierPrice {
                    price: 1,
                    secondary: true,
                },
                purth: tier(3),
                juathas: tier(8),
                xuth: tier(12),
                sinthru: tier(20),
                lekolu: tier(30),
            },
            trial: TrialPricing {
                tier: SigilTier::Lekolu,
                prices: FactionPrice {
                    default: 30,
                    by_faction: BTreeMap::from([(Faction::Gilded, 24)]),
                },
            },
            flat_prices: vec![FlatPriceRule {
                faction: Faction::Ashen,
                tier: SigilTier::Purth,
                price: 2,
            }],
            node_discounts: vec![
                NodeDiscountRule {
                    faction: Faction::Sylvan,
                    tier: SigilTier::Purth,
                    tree: Some(TreeId("verdant".into())),
                    per_unit: 2,
                },
                NodeDiscountRule {
                    faction: Faction::Tidal,
                    tier: SigilTier::Xuth,
                    tree: Some(TreeId("tidecaller".into())),
                    per_unit: 4,
                },
                NodeDiscountRule {
                    faction: Faction::Hollow,
                    tier: SigilTier::Juathas,
                    tree: None,
                    per_unit: 2,
                },
            ],
            pact_rules: vec![
                PactRule {
                    pact: Pact::Bloodprice,
                    tier: SigilTier::Xuth,
                    effect: PactEffect::Multiply { factor: 2 },
                },
                PactRule {
                    pact: Pact::Tithe,
                    tier: SigilTier::Xuth,
                    effect: PactEffect::Refund { units: 1 },
                },
                PactRule {
                    pact: Pact::Covenant,
                    tier: SigilTier::Purth,
                    effect: PactEffect::ExtraUnits { units: 1 },
                },
                PactRule {
                    pact: Pact::Ironvow,
                    tier: SigilTier::Kaarn,
                    effect: PactEffect::Zero,
                },
            ],
            exemption: Some(ExemptionRule {
                pact: Pact::Hearthbound,
                tier: SigilTier::Sinthru,
                per_node: FactionPrice {
                    default: 10,
                    by_faction: BTreeMap::from([(Faction::Hollow, 8)]),
                },
                currency: Currency::Primary,
            }),
            gated_tier: SigilTier::Sinthru,
            tertiary_pact: Pact::Kindred,
            headcount: HeadcountPricing {
                family_size: vec![0, 0, 1, 2, 4, 7, 11],
                family_overflow_step: 5,
                household_per_resident: 2,
                currency: Currency::Secondary,
            },
            rosters: RosterPricing {
                classmate_fee: 3,
                colleague_fee: 5,
                same_origin_discount: 4,
                currency: Currency::Secondary,
            },
            debug: DebugPricing {
                sentinel: 9999,
                headroom: 999,
            },
        }
    }
}

/// Validate that prices, fees and multipliers are non-negative and tables are usable.
pub fn validate_pricing(p: &PricingConfig) -> Result<(), ValidationError> {
    if p.tiers.iter().any(|(_, t)| t.price < 0) {
        return Err(ValidationError::NegativePrice("tiers"));
    }
    let trial = &p.trial.prices;
    if trial.default < 0 || trial.by_faction.values().any(|v| *v < 0) {
        return Err(ValidationError::NegativePrice("trial"));
    }
    if p.flat_prices.iter().any(|r| r.price < 0) {
        return Err(ValidationError::NegativePrice("flat_prices"));
    }
    if p.node_discounts.iter().any(|r| r.per_unit < 0) {
        return Err(ValidationError::NegativePrice("node_discounts"));
    }
    if p.pact_rules
        .iter()
        .any(|r| matches!(r.effect, PactEffect::Multiply { factor } if factor < 0))
    {
        return Err(ValidationError::NegativePrice("pact_rules"));
    }
    if let Some(ex) = &p.exemption {
        if ex.per_node.default < 0 || ex.per_node.by_faction.values().any(|v| *v < 0) {
            return Err(ValidationError::NegativePrice("exemption"));
        }
    }
    let h = &p.headcount;
    if h.family_size.is_empty() {
        return Err(ValidationError::EmptyFamilyTable);
    }
    if h.family_size.iter().any(|v| *v < 0)
        || h.family_overflow_step < 0
        || h.household_per_resident < 0
    {
        return Err(ValidationError::NegativePrice("headcount"));
    }
    let r = &p.rosters;
    if r.classmate_fee < 0 || r.colleague_fee < 0 || r.same_origin_discount < 0 {
        return Err(ValidationError::NegativePrice("rosters"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        validate_pricing(&PricingConfig::default()).unwrap();
    }

    #[test]
    fn family_table_is_non_linear_with_overflow() {
        let h = PricingConfig::default().headcount;
        assert_eq!(h.family_cost(0), 0);
        assert_eq!(h.family_cost(3), 2);
        assert_eq!(h.family_cost(6), 11);
        assert_eq!(h.family_cost(7), 16);
        assert_eq!(h.family_cost(9), 26);
        assert_eq!(h.household_cost(4), 8);
    }

    #[test]
    fn faction_price_falls_back_to_default() {
        let p = PricingConfig::default();
        assert_eq!(p.trial.prices.for_faction(Faction::Gilded), 24);
        assert_eq!(p.trial.prices.for_faction(Faction::Ashen), 30);
    }

    #[test]
    fn yaml_override_keeps_unlisted_defaults() {
        let yaml = "
debug:
  sentinel: 500
  headroom: 10
pact_rules:
  - pact: bloodprice
    tier: juathas
    effect:
      kind: multiply
      factor: 3
";
        let p: PricingConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(p.debug.sentinel, 500);
        assert_eq!(p.pact_rules.len(), 1);
        assert_eq!(
            p.pact_rules[0].effect,
            PactEffect::Multiply { factor: 3 }
        );
        assert_eq!(p.tiers.juathas.price, 8);
        assert_eq!(p.baselines.primary, 100);
    }

    #[test]
    fn negative_values_rejected() {
        let mut p = PricingConfig::default();
        p.rosters.colleague_fee = -1;
        assert_eq!(
            validate_pricing(&p),
            Err(ValidationError::NegativePrice("rosters"))
        );
        let mut p = PricingConfig::default();
        p.headcount.family_size.clear();
        assert_eq!(validate_pricing(&p), Err(ValidationError::EmptyFamilyTable));
    }
}
