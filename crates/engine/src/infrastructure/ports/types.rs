//! Store-level predicate types produced by the filter compiler.
//!
//! These are storage-agnostic: the SQLite adapter renders them
//! with bound parameters, a test double can inspect them.

use grimoire_domain::{AttributeKind, ScalarValue};

/// Which stored column a condition targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Column {
    /// The natural key.
    Key,
    /// The display name (and its case-folded twin).
    DisplayName,
    /// A promoted attribute, by attribute name.
    Attribute(String),
}

/// A comparison against a column. Text comparisons ending in `Folded` and
/// `Like` patterns are already lowercased by the compiler.
#[derive(Debug, Clone, PartialEq)]
pub enum Comparison {
    /// Exact equality (text or number depending on the field kind).
    Equals(ScalarValue),
    /// Equality on case-folded text.
    EqualsFolded(String),
    /// `LIKE` on case-folded text, `%` wildcards, `\` escapes.
    Like(String),
    AtLeast(f64),
    AtMost(f64),
    /// Exact membership.
    OneOf(Vec<ScalarValue>),
    /// Membership on case-folded text.
    OneOfFolded(Vec<String>),
}

/// One ANDed condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub column: Column,
    pub kind: AttributeKind,
    pub comparison: Comparison,
}

impl Condition {
    pub fn new(column: Column, kind: AttributeKind, comparison: Comparison) -> Self {
        Self {
            column,
            kind,
            comparison,
        }
    }

    /// Pattern matches cannot use an index seek.
    pub fn is_scan(&self) -> bool {
        matches!(self.comparison, Comparison::Like(_))
    }
}

/// Conjunction of conditions. Index-backed conditions always come before
/// scans so scans only run over rows the indexed conditions already narrowed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StorePredicate {
    conditions: Vec<Condition>,
}

impl StorePredicate {
    pub fn new(mut conditions: Vec<Condition>) -> Self {
        // Stable sort keeps caller order within each group.
        conditions.sort_by_key(Condition::is_scan);
        Self { conditions }
    }

    /// Matches every record of the entity type.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// This predicate with one more condition ANDed in.
    pub fn and(&self, condition: Condition) -> Self {
        let mut conditions = self.conditions.clone();
        conditions.push(condition);
        Self::new(conditions)
    }
}

/// Pagination window for store queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryWindow {
    pub limit: u32,
    pub offset: u32,
}

impl QueryWindow {
    pub fn new(limit: u32, offset: u32) -> Self {
        Self { limit, offset }
    }

    /// Rows `0..limit+offset`, used when results are merged before paging.
    pub fn through(limit: u32, offset: u32) -> Self {
        Self {
            limit: limit.saturating_add(offset),
            offset: 0,
        }
    }
}
