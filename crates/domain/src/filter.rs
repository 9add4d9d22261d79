//! Typed filter requests.
//!
//! A [`FilterSpec`] is an ordered list of `(field, operator, value)` clauses
//! that are ANDed together. It is validated once against an entity schema
//! before any storage or network work starts.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::DomainError;
use crate::value_objects::ScalarValue;

/// Wildcard marker accepted in name-like filter values.
pub const WILDCARD: char = '*';

/// Comparison operator of a filter clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    /// Exact match.
    Eq,
    /// Case-insensitive exact match.
    Ieq,
    /// Case-insensitive substring match; `*` marks explicit wildcard positions.
    Contains,
    /// Numeric `>=`.
    RangeGte,
    /// Numeric `<=`.
    RangeLte,
    /// Membership in a set of values.
    InSet,
}

impl FilterOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOp::Eq => "eq",
            FilterOp::Ieq => "ieq",
            FilterOp::Contains => "contains",
            FilterOp::RangeGte => "range_gte",
            FilterOp::RangeLte => "range_lte",
            FilterOp::InSet => "in_set",
        }
    }
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterOp {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "eq" => Ok(Self::Eq),
            "ieq" => Ok(Self::Ieq),
            "contains" => Ok(Self::Contains),
            "range_gte" | "gte" => Ok(Self::RangeGte),
            "range_lte" | "lte" => Ok(Self::RangeLte),
            "in_set" | "in" => Ok(Self::InSet),
            _ => Err(DomainError::parse(format!("Unknown filter operator: {}", s))),
        }
    }
}

/// Right-hand side of a filter clause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Set(Vec<ScalarValue>),
    Scalar(ScalarValue),
}

impl FilterValue {
    pub fn as_scalar(&self) -> Option<&ScalarValue> {
        match self {
            FilterValue::Scalar(value) => Some(value),
            FilterValue::Set(_) => None,
        }
    }

    /// Whether a text value carries the wildcard marker.
    pub fn has_wildcard(&self) -> bool {
        self.as_scalar()
            .and_then(ScalarValue::as_str)
            .is_some_and(|s| s.contains(WILDCARD))
    }
}

impl From<ScalarValue> for FilterValue {
    fn from(value: ScalarValue) -> Self {
        FilterValue::Scalar(value)
    }
}

impl From<Vec<ScalarValue>> for FilterValue {
    fn from(values: Vec<ScalarValue>) -> Self {
        FilterValue::Set(values)
    }
}

/// One `(field, operator, value)` triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterClause {
    pub field: String,
    pub op: FilterOp,
    pub value: FilterValue,
}

impl FilterClause {
    pub fn new(field: impl Into<String>, op: FilterOp, value: impl Into<FilterValue>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    /// An `in_set` clause whose set is empty can never match anything.
    pub fn is_empty_set(&self) -> bool {
        self.op == FilterOp::InSet && matches!(&self.value, FilterValue::Set(values) if values.is_empty())
    }
}

/// Ordered, ANDed list of filter clauses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterSpec {
    clauses: Vec<FilterClause>,
}

impl FilterSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_clauses(clauses: Vec<FilterClause>) -> Self {
        Self { clauses }
    }

    pub fn clause(mut self, clause: FilterClause) -> Self {
        self.clauses.push(clause);
        self
    }

    pub fn eq(self, field: &str, value: impl Into<ScalarValue>) -> Self {
        self.clause(FilterClause::new(field, FilterOp::Eq, value.into()))
    }

    pub fn ieq(self, field: &str, value: impl Into<ScalarValue>) -> Self {
        self.clause(FilterClause::new(field, FilterOp::Ieq, value.into()))
    }

    pub fn contains(self, field: &str, value: impl Into<ScalarValue>) -> Self {
        self.clause(FilterClause::new(field, FilterOp::Contains, value.into()))
    }

    pub fn gte(self, field: &str, value: impl Into<ScalarValue>) -> Self {
        self.clause(FilterClause::new(field, FilterOp::RangeGte, value.into()))
    }

    pub fn lte(self, field: &str, value: impl Into<ScalarValue>) -> Self {
        self.clause(FilterClause::new(field, FilterOp::RangeLte, value.into()))
    }

    pub fn in_set(self, field: &str, values: Vec<ScalarValue>) -> Self {
        self.clause(FilterClause::new(field, FilterOp::InSet, values))
    }

    pub fn clauses(&self) -> &[FilterClause] {
        &self.clauses
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// True when some clause is an empty `in_set`, so the filter matches nothing.
    pub fn has_empty_set(&self) -> bool {
        self.clauses.iter().any(FilterClause::is_empty_set)
    }
}

impl<'a> IntoIterator for &'a FilterSpec {
    type Item = &'a FilterClause;
    type IntoIter = std::slice::Iter<'a, FilterClause>;

    fn into_iter(self) -> Self::IntoIter {
        self.clauses.iter()
    }
}
