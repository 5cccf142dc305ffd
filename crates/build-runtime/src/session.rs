//! Live build session: owns the selection state and recomputes on every change.

use crate::notice::{notice_for, Notice};
use build_core::{BuildState, Currency, NodeKey, PricingConfig};
use build_econ::{evaluate, observe_gate, prune_substitutions, EconomyReport};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    /// Override target currency is not unlocked.
    #[error("{0} is locked")]
    CurrencyLocked(Currency),
    #[error("node {0} is not selected")]
    NodeNotSelected(NodeKey),
}

/// Outcome of one recomputation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Recompute {
    pub report: EconomyReport,
    /// One-time messages; shown once, never re-raised.
    pub notices: Vec<Notice>,
    /// Overrides garbage-collected during this pass.
    pub pruned: Vec<NodeKey>,
}

/// Owns a [`BuildState`] and applies the two compensating writes the engine is
/// allowed: pruning stale substitution overrides and swapping gated
/// selections between live and backup.
#[derive(Clone, Debug)]
pub struct Session {
    state: BuildState,
    pricing: PricingConfig,
}

impl Session {
    pub fn new(state: BuildState, pricing: PricingConfig) -> Self {
        Self { state, pricing }
    }

    /// Start from restored state, pruning overrides the save no longer backs.
    pub fn from_restored(state: BuildState, pricing: PricingConfig) -> (Self, Vec<NodeKey>) {
        let mut session = Self::new(state, pricing);
        let pruned = prune_substitutions(&mut session.state, &session.pricing);
        if !pruned.is_empty() {
            info!(count = pruned.len(), "stale overrides dropped after restore");
        }
        (session, pruned)
    }

    pub fn state(&self) -> &BuildState {
        &self.state
    }

    pub fn pricing(&self) -> &PricingConfig {
        &self.pricing
    }

    /// Prune, transition the gate, then evaluate the settled state.
    pub fn recompute(&mut self) -> Recompute {
        let pruned = prune_substitutions(&mut self.state, &self.pricing);
        let notices = observe_gate(&mut self.state.gated, self.state.gate_open)
            .map(|t| notice_for(&t, &self.state.flags, &self.pricing))
            .into_iter()
            .collect();
        let report = evaluate(&self.state, &self.pricing);
        debug!(pruned = pruned.len(), "session recomputed");
        Recompute {
            report,
            notices,
            pruned,
        }
    }

    /// Apply a batch of external edits, then recompute once.
    pub fn update(&mut self, edit: impl FnOnce(&mut BuildState)) -> Recompute {
        edit(&mut self.state);
        self.recompute()
    }

    /// Opt a selected node into being paid with `currency`.
    pub fn flag_substitution(
        &mut self,
        key: NodeKey,
        currency: Currency,
    ) -> Result<Recompute, SessionError> {
        if currency == Currency::Tertiary && !self.state.flags.has_pact(self.pricing.tertiary_pact)
        {
            return Err(SessionError::CurrencyLocked(currency));
        }
        if self.state.node(&key).is_none() {
            return Err(SessionError::NodeNotSelected(key));
        }
        self.state.substitutions.insert(key, currency);
        Ok(self.recompute())
    }

    pub fn clear_substitution(&mut self, key: &NodeKey) -> Recompute {
        self.state.substitutions.remove(key);
        self.recompute()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use build_core::{Pact, SigilTier, TreeNode};

    fn session() -> Session {
        let mut state = BuildState::default();
        state.flags.pacts.insert(Pact::Kindred);
        state.sigils.primary.juathas = 2;
        state.select_node("verdant", TreeNode::new("thornwall", SigilTier::Juathas));
        Session::new(state, PricingConfig::default())
    }

    #[test]
    fn flag_requires_pact_and_selection() {
        let mut s = session();
        let missing = NodeKey::new("verdant", "nowhere");
        assert_eq!(
            s.flag_substitution(missing.clone(), Currency::Tertiary),
            Err(SessionError::NodeNotSelected(missing))
        );
        s.update(|st| {
            st.flags.pacts.clear();
        });
        assert_eq!(
            s.flag_substitution(NodeKey::new("verdant", "thornwall"), Currency::Tertiary),
            Err(SessionError::CurrencyLocked(Currency::Tertiary))
        );
    }

    #[test]
    fn clear_restores_primary_charge() {
        let mut s = session();
        let key = NodeKey::new("verdant", "thornwall");
        let r = s.flag_substitution(key.clone(), Currency::Tertiary).unwrap();
        assert_eq!(r.report.balance(Currency::Primary), 92);
        let r = s.clear_substitution(&key);
        assert_eq!(r.report.balance(Currency::Primary), 84);
        assert_eq!(r.report.balance(Currency::Tertiary), 0);
    }

    #[test]
    fn dropping_the_pact_prunes_overrides() {
        let mut s = session();
        let key = NodeKey::new("verdant", "thornwall");
        s.flag_substitution(key.clone(), Currency::Tertiary).unwrap();
        let r = s.update(|st| {
            st.flags.pacts.remove(&Pact::Kindred);
        });
        assert_eq!(r.pruned, vec![key]);
        assert_eq!(r.report.balance(Currency::Primary), 84);
    }
}
