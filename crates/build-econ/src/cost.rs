//! Cost descriptor grammar.
//!
//! `("Costs"|"Grants") <int> <unit> [("and"|"or") <int> <unit>]*`, or the
//! literals `Free` and `Varies`. "and" and "or" are presentational only; every
//! clause contributes.

use build_core::{Contribution, Currency, Pick};
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verb {
    Costs,
    Grants,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CostClause {
    pub amount: i64,
    pub currency: Currency,
}

/// A parsed cost descriptor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CostDescriptor {
    Free,
    /// Excluded from aggregation; the item supplies its own contribution.
    Varies,
    Priced {
        verb: Verb,
        clauses: Vec<CostClause>,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CostParseError {
    #[error("empty cost descriptor")]
    Empty,
    #[error("expected Costs or Grants, found {0:?}")]
    UnknownVerb(String),
    #[error("expected an amount after {0:?}")]
    MissingAmount(String),
    #[error("invalid amount {0:?}")]
    BadAmount(String),
    #[error("expected a currency unit after the amount")]
    MissingUnit,
    #[error("unknown currency unit {0:?}")]
    UnknownUnit(String),
    #[error("expected and/or, found {0:?}")]
    UnexpectedToken(String),
}

impl FromStr for CostDescriptor {
    type Err = CostParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut tokens = s.split_whitespace();
        let head = tokens.next().ok_or(CostParseError::Empty)?;
        let verb = match head {
            "Free" | "Varies" => {
                if let Some(extra) = tokens.next() {
                    return Err(CostParseError::UnexpectedToken(extra.to_string()));
                }
                return Ok(if head == "Free" {
                    CostDescriptor::Free
                } else {
                    CostDescriptor::Varies
                });
            }
            "Costs" => Verb::Costs,
            "Grants" => Verb::Grants,
            other => return Err(CostParseError::UnknownVerb(other.to_string())),
        };

        let mut clauses = Vec::new();
        let mut joiner = head;
        loop {
            let amount_tok = tokens
                .next()
                .ok_or_else(|| CostParseError::MissingAmount(joiner.to_string()))?;
            let amount: i64 = amount_tok
                .parse()
                .map_err(|_| CostParseError::BadAmount(amount_tok.to_string()))?;
            let unit = tokens.next().ok_or(CostParseError::MissingUnit)?;
            let currency = Currency::from_unit(unit)
                .ok_or_else(|| CostParseError::UnknownUnit(unit.to_string()))?;
            clauses.push(CostClause { amount, currency });
            match tokens.next() {
                None => break,
                Some(j @ ("and" | "or")) => joiner = j,
                Some(other) => return Err(CostParseError::UnexpectedToken(other.to_string())),
            }
        }
        Ok(CostDescriptor::Priced { verb, clauses })
    }
}

impl CostDescriptor {
    /// Signed contribution, positive = spend. `None` for `Varies`.
    pub fn contribution(&self) -> Option<Contribution> {
        match self {
            CostDescriptor::Free => Some(Contribution::default()),
            CostDescriptor::Varies => None,
            CostDescriptor::Priced { verb, clauses } => {
                let sign = match verb {
                    Verb::Costs => 1,
                    Verb::Grants => -1,
                };
                let mut c = Contribution::default();
                for clause in clauses {
                    c[clause.currency] += sign * clause.amount;
                }
                Some(c)
            }
        }
    }
}

/// Parse `text`, treating a malformed descriptor as zero and logging it.
pub fn parse_or_zero(text: &str, item: &str) -> Option<Contribution> {
    match text.parse::<CostDescriptor>() {
        Ok(d) => d.contribution(),
        Err(e) => {
            warn!(item, descriptor = text, error = %e, "malformed cost descriptor, counting as zero");
            Some(Contribution::default())
        }
    }
}

/// Resolve a catalog pick to its contribution.
///
/// Fixed descriptors win over any explicit amount; `Varies` items must carry
/// `explicit`, otherwise they count as zero with a diagnostic.
pub fn pick_contribution(pick: &Pick) -> Contribution {
    let Some(text) = pick.cost.as_deref() else {
        return pick.explicit.unwrap_or_default();
    };
    match parse_or_zero(text, &pick.id) {
        Some(c) => {
            if pick.explicit.is_some() {
                debug!(item = %pick.id, "explicit amount ignored for fixed-cost item");
            }
            c
        }
        None => pick.explicit.unwrap_or_else(|| {
            warn!(item = %pick.id, "variable-cost item without explicit amount");
            Contribution::default()
        }),
    }
}
