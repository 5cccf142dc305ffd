//! Ledger aggregation over every selection category.

use crate::cost::pick_contribution;
use crate::prices::PriceBook;
use build_core::{BuildState, Companion, Contribution, Currency, CurrencyTable, Pick, SigilTier};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Cumulative gained and spent amounts for one currency.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub gained: i64,
    pub spent: i64,
}

/// One itemized ledger entry. Rebates and refunds appear as negative `spent`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerLine {
    pub source: String,
    pub currency: Currency,
    pub gained: i64,
    pub spent: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ledger {
    pub totals: CurrencyTable<Tally>,
    pub lines: Vec<LedgerLine>,
}

impl Ledger {
    /// Record a raw gained/spent pair; zero entries are skipped.
    pub fn record(&mut self, source: impl Into<String>, currency: Currency, gained: i64, spent: i64) {
        if gained == 0 && spent == 0 {
            return;
        }
        let tally = &mut self.totals[currency];
        tally.gained += gained;
        tally.spent += spent;
        self.lines.push(LedgerLine {
            source: source.into(),
            currency,
            gained,
            spent,
        });
    }

    /// Record a signed contribution: positive amounts are spent, negative gained.
    pub fn apply(&mut self, source: &str, contribution: &Contribution) {
        for (currency, amount) in contribution.iter() {
            match amount.signum() {
                1 => self.record(source, currency, 0, *amount),
                -1 => self.record(source, currency, -*amount, 0),
                _ => {}
            }
        }
    }

    pub fn tally(&self, currency: Currency) -> Tally {
        self.totals[currency]
    }
}

fn apply_picks(ledger: &mut Ledger, category: &str, picks: &[Pick]) {
    for pick in picks {
        let source = format!("{category}:{}", pick.id);
        ledger.apply(&source, &pick_contribution(pick));
    }
}

/// Per-member fee minus the same-origin discount, never below zero.
pub fn roster_fee(fee: i64, discount: i64, same_origin: bool) -> i64 {
    if same_origin {
        (fee - discount).max(0)
    } else {
        fee
    }
}

fn apply_roster(
    ledger: &mut Ledger,
    book: &PriceBook<'_>,
    category: &str,
    fee: i64,
    members: &[Companion],
) {
    let rosters = &book.pricing().rosters;
    let faction = book.flags().faction;
    for m in members {
        let charged = roster_fee(
            fee,
            rosters.same_origin_discount,
            faction.shares_origin(m.origin),
        );
        ledger.record(format!("{category}:{}", m.id), rosters.currency, 0, charged);
    }
}

/// Direct sigil purchases with pact refund and extra-unit stages.
fn apply_sigil_purchases(ledger: &mut Ledger, state: &BuildState, book: &PriceBook<'_>) {
    for tier in SigilTier::ALL {
        if book.is_exempt(tier) {
            continue;
        }
        let unit = book.unit_price(tier);
        let primary = i64::from(state.sigils.primary[tier]);
        let secondary = i64::from(state.sigils.secondary[tier]);
        ledger.record(format!("sigils:{tier}"), Currency::Primary, 0, primary * unit);
        ledger.record(format!("sigils:{tier}"), Currency::Secondary, 0, secondary * unit);

        let mut refund = i64::from(book.refund_units(tier)).min(primary + secondary);
        if refund > 0 {
            let from_primary = refund.min(primary);
            ledger.record(format!("refund:{tier}"), Currency::Primary, 0, -from_primary * unit);
            refund -= from_primary;
            ledger.record(format!("refund:{tier}"), Currency::Secondary, 0, -refund * unit);
        }

        let extra = i64::from(book.extra_units(tier));
        ledger.record(format!("extra:{tier}"), Currency::Primary, 0, extra * unit);
    }
}

/// Node-level pricing: faction rebates and exempt-tier per-node charges.
fn apply_nodes(ledger: &mut Ledger, state: &BuildState, book: &PriceBook<'_>) {
    let exempt = book.exempt_node_charge();
    for (tree, node) in state.nodes() {
        let source = format!("node:{}/{}", tree.0, node.id.0);
        if book.is_exempt(node.tier) {
            if let Some((price, currency)) = exempt {
                ledger.record(source, currency, 0, price);
            }
            continue;
        }
        let rebate = book.nominal_node_price(node) - book.node_price(tree, node);
        ledger.record(source, Currency::Primary, 0, -rebate);
    }
    if let Some((price, currency)) = exempt {
        for tier in SigilTier::ALL.into_iter().filter(|t| book.is_exempt(*t)) {
            let units = i64::from(state.extra_usage[tier]);
            ledger.record(format!("usage:{tier}"), currency, 0, units * price);
        }
    }
}

fn apply_gated(ledger: &mut Ledger, state: &BuildState, book: &PriceBook<'_>) {
    let gated_tier = book.pricing().gated_tier;
    if book.is_exempt(gated_tier) {
        if let Some((price, currency)) = book.exempt_node_charge() {
            for node in &state.gated.live.nodes {
                ledger.record(format!("gated:{}", node.0), currency, 0, price);
            }
        }
    }
    apply_picks(ledger, "gated", &state.gated.live.picks);
}

/// Fold every category into per-currency gained/spent totals.
///
/// Deterministic and idempotent: the same state always yields the same ledger.
pub fn aggregate_ledger(state: &BuildState, book: &PriceBook<'_>) -> Ledger {
    let pricing = book.pricing();
    let sel = &state.selections;
    let mut ledger = Ledger::default();

    apply_sigil_purchases(&mut ledger, state, book);
    apply_nodes(&mut ledger, state, book);

    let head = &pricing.headcount;
    ledger.record("family:size", head.currency, 0, head.family_cost(sel.family.size));
    apply_picks(&mut ledger, "family", &sel.family.traits);

    ledger.record(
        "housing:residents",
        head.currency,
        0,
        head.household_cost(sel.housing.residents),
    );
    apply_picks(&mut ledger, "housing", &sel.housing.picks);

    apply_picks(&mut ledger, "schooling", &sel.schooling.picks);
    apply_roster(
        &mut ledger,
        book,
        "classmate",
        pricing.rosters.classmate_fee,
        &sel.schooling.members,
    );

    apply_picks(&mut ledger, "blessing", &sel.blessings);
    apply_picks(&mut ledger, "spell", &sel.custom_spells);

    apply_picks(&mut ledger, "career", &sel.career.picks);
    apply_roster(
        &mut ledger,
        book,
        "colleague",
        pricing.rosters.colleague_fee,
        &sel.career.members,
    );

    apply_picks(&mut ledger, "retirement", &sel.retirement);
    apply_gated(&mut ledger, state, book);

    debug!(
        primary_spent = ledger.totals.primary.spent,
        secondary_spent = ledger.totals.secondary.spent,
        lines = ledger.lines.len(),
        "ledger aggregated"
    );
    ledger
}
