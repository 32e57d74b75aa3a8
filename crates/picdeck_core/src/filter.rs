//! Particle selection predicates.
//!
//! A filter is a conjunction of comparisons between one particle quantity
//! and a constant, written the way decks write them:
//!
//! ```text
//! x < 0.02 && px >= 0
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::types::ParticleQuantity;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterParseError {
    #[error("empty filter expression")]
    Empty,
    #[error("missing comparison operator in '{0}'")]
    MissingOperator(String),
    #[error("{0}")]
    UnknownQuantity(String),
    #[error("invalid number '{0}'")]
    InvalidNumber(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparison {
    Less,
    LessEq,
    Greater,
    GreaterEq,
    Equal,
    NotEqual,
}

impl Comparison {
    // Two-character operators first so "<=" is not read as "<"
    const TOKENS: [(&'static str, Comparison); 6] = [
        ("<=", Comparison::LessEq),
        (">=", Comparison::GreaterEq),
        ("==", Comparison::Equal),
        ("!=", Comparison::NotEqual),
        ("<", Comparison::Less),
        (">", Comparison::Greater),
    ];

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Less => "<",
            Self::LessEq => "<=",
            Self::Greater => ">",
            Self::GreaterEq => ">=",
            Self::Equal => "==",
            Self::NotEqual => "!=",
        }
    }

    pub fn holds(&self, lhs: f64, rhs: f64) -> bool {
        match self {
            Self::Less => lhs < rhs,
            Self::LessEq => lhs <= rhs,
            Self::Greater => lhs > rhs,
            Self::GreaterEq => lhs >= rhs,
            Self::Equal => lhs == rhs,
            Self::NotEqual => lhs != rhs,
        }
    }
}

/// `quantity <op> value`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    pub quantity: ParticleQuantity,
    pub op: Comparison,
    pub value: f64,
}

impl FromStr for Predicate {
    type Err = FilterParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (pos, token, op) = Comparison::TOKENS
            .iter()
            .filter_map(|(token, op)| s.find(token).map(|pos| (pos, *token, *op)))
            .min_by_key(|(pos, token, _)| (*pos, std::cmp::Reverse(token.len())))
            .ok_or_else(|| FilterParseError::MissingOperator(s.to_string()))?;

        let lhs = s[..pos].trim();
        let rhs = s[pos + token.len()..].trim();
        let quantity = lhs
            .parse::<ParticleQuantity>()
            .map_err(FilterParseError::UnknownQuantity)?;
        let value = rhs
            .parse::<f64>()
            .map_err(|_| FilterParseError::InvalidNumber(rhs.to_string()))?;

        Ok(Self { quantity, op, value })
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.quantity, self.op.symbol(), self.value)
    }
}

/// Conjunction of predicates over particle state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ParticleFilter {
    predicates: Vec<Predicate>,
}

impl ParticleFilter {
    pub fn new(predicates: Vec<Predicate>) -> Self {
        Self { predicates }
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    /// Quantities the filter needs to be evaluated
    pub fn quantities(&self) -> impl Iterator<Item = ParticleQuantity> + '_ {
        self.predicates.iter().map(|p| p.quantity)
    }

    /// Evaluate against one particle. `None` when a needed quantity is unavailable.
    pub fn matches(&self, lookup: impl Fn(ParticleQuantity) -> Option<f64>) -> Option<bool> {
        for predicate in &self.predicates {
            let value = lookup(predicate.quantity)?;
            if !predicate.op.holds(value, predicate.value) {
                return Some(false);
            }
        }
        Some(true)
    }
}

impl FromStr for ParticleFilter {
    type Err = FilterParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err(FilterParseError::Empty);
        }
        let predicates = s
            .split("&&")
            .map(str::parse)
            .collect::<Result<Vec<Predicate>, _>>()?;
        Ok(Self { predicates })
    }
}

impl TryFrom<String> for ParticleFilter {
    type Error = FilterParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ParticleFilter> for String {
    fn from(filter: ParticleFilter) -> Self {
        filter.to_string()
    }
}

impl fmt::Display for ParticleFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, predicate) in self.predicates.iter().enumerate() {
            if i > 0 {
                f.write_str(" && ")?;
            }
            write!(f, "{predicate}")?;
        }
        Ok(())
    }
}
