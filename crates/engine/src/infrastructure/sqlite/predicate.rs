//! Rendering [`StorePredicate`]s into SQL.
//!
//! Every value goes through `push_bind`; only column names chosen here are
//! ever written into the query text.

use grimoire_domain::{AttributeKind, ScalarValue};
use sqlx::{QueryBuilder, Sqlite};

use crate::infrastructure::ports::{Column, Comparison, Condition, StorePredicate};

/// Columns the comparison may use for one target.
struct Target {
    /// Column for exact text comparisons.
    text: &'static str,
    /// Column for case-folded comparisons and patterns.
    folded: &'static str,
    /// Column for numeric and boolean comparisons, if the target has one.
    numeric: Option<&'static str>,
}

const KEY: Target = Target {
    text: "r.key",
    folded: "r.key_folded",
    numeric: None,
};

const DISPLAY_NAME: Target = Target {
    text: "r.display_name",
    folded: "r.display_name_folded",
    numeric: None,
};

const ATTRIBUTE: Target = Target {
    text: "a.value_text",
    folded: "a.value_folded",
    numeric: Some("a.value_num"),
};

/// Append ` AND <condition>` for every condition of the predicate.
pub(super) fn push_predicate(
    qb: &mut QueryBuilder<'_, Sqlite>,
    entity_type: &str,
    predicate: &StorePredicate,
) {
    for condition in predicate.conditions() {
        qb.push(" AND ");
        push_condition(qb, entity_type, condition);
    }
}

fn push_condition(qb: &mut QueryBuilder<'_, Sqlite>, entity_type: &str, condition: &Condition) {
    match &condition.column {
        Column::Key => push_comparison(qb, &KEY, condition),
        Column::DisplayName => push_comparison(qb, &DISPLAY_NAME, condition),
        Column::Attribute(name) => {
            // Uncorrelated subquery so SQLite can seek the attribute indexes.
            qb.push("r.key IN (SELECT a.record_key FROM record_attributes a WHERE a.entity_type = ");
            qb.push_bind(entity_type.to_string());
            qb.push(" AND a.name = ");
            qb.push_bind(name.clone());
            qb.push(" AND ");
            push_comparison(qb, &ATTRIBUTE, condition);
            qb.push(")");
        }
    }
}

fn push_comparison(qb: &mut QueryBuilder<'_, Sqlite>, target: &Target, condition: &Condition) {
    let numeric_column = match condition.kind {
        AttributeKind::Text => None,
        AttributeKind::Integer | AttributeKind::Float | AttributeKind::Bool => target.numeric,
    };
    let exact = numeric_column.unwrap_or(target.text);

    match &condition.comparison {
        Comparison::Equals(value) => {
            qb.push(exact).push(" = ");
            push_scalar(qb, value, numeric_column.is_some());
        }
        Comparison::EqualsFolded(folded) => {
            qb.push(target.folded).push(" = ");
            qb.push_bind(folded.clone());
        }
        Comparison::Like(pattern) => {
            qb.push(target.folded).push(" LIKE ");
            qb.push_bind(pattern.clone());
            qb.push(" ESCAPE '\\'");
        }
        Comparison::AtLeast(bound) => {
            qb.push(target.numeric.unwrap_or(target.text)).push(" >= ");
            qb.push_bind(*bound);
        }
        Comparison::AtMost(bound) => {
            qb.push(target.numeric.unwrap_or(target.text)).push(" <= ");
            qb.push_bind(*bound);
        }
        Comparison::OneOf(values) => {
            qb.push(exact).push(" IN (");
            let mut separated = qb.separated(", ");
            for value in values {
                match (numeric_column.is_some(), numeric_value(value)) {
                    (true, Some(n)) => separated.push_bind(n),
                    _ => separated.push_bind(value.to_text()),
                };
            }
            separated.push_unseparated(")");
        }
        Comparison::OneOfFolded(values) => {
            qb.push(target.folded).push(" IN (");
            let mut separated = qb.separated(", ");
            for value in values {
                separated.push_bind(value.clone());
            }
            separated.push_unseparated(")");
        }
    }
}

fn push_scalar(qb: &mut QueryBuilder<'_, Sqlite>, value: &ScalarValue, numeric: bool) {
    match (numeric, numeric_value(value)) {
        (true, Some(n)) => {
            qb.push_bind(n);
        }
        _ => {
            qb.push_bind(value.to_text());
        }
    }
}

/// Numeric storage form: numbers as-is, booleans as 1/0.
pub(super) fn numeric_value(value: &ScalarValue) -> Option<f64> {
    match value {
        ScalarValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        other => other.as_f64(),
    }
}
