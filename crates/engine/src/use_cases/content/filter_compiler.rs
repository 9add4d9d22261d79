//! Compiling [`FilterSpec`]s into store predicates.
//!
//! Name-like fields get the enhancement policy: a `*` makes the value a
//! pattern, otherwise it is a case-insensitive exact match, and an exact name
//! miss may be retried once against the natural key.

use grimoire_domain::{
    fold_case, AttributeKind, DomainError, EntityRecord, EntitySchema, EntityType, FieldRef,
    FilterClause, FilterOp, FilterSpec, FilterValue, ScalarValue, SchemaRegistry, WILDCARD,
};
use std::sync::Arc;

use crate::infrastructure::ports::{
    Column, Comparison, Condition, EntityStore, QueryWindow, StoreError, StorePredicate,
};

/// Result of compiling a filter.
#[derive(Debug, Clone, PartialEq)]
pub enum CompiledFilter {
    /// An empty set membership makes the whole conjunction unsatisfiable.
    MatchNothing,
    Query {
        predicate: StorePredicate,
        /// Retried once, only when `predicate` matched nothing.
        fallback: Option<StorePredicate>,
    },
}

impl CompiledFilter {
    pub fn is_match_nothing(&self) -> bool {
        matches!(self, CompiledFilter::MatchNothing)
    }

    /// The same filter, limited to records whose key is in `keys`.
    pub fn restricted_to_keys(&self, keys: impl IntoIterator<Item = String>) -> CompiledFilter {
        match self {
            CompiledFilter::MatchNothing => CompiledFilter::MatchNothing,
            CompiledFilter::Query {
                predicate,
                fallback,
            } => {
                let keys = Condition::new(
                    Column::Key,
                    AttributeKind::Text,
                    Comparison::OneOf(keys.into_iter().map(ScalarValue::Text).collect()),
                );
                CompiledFilter::Query {
                    predicate: predicate.and(keys.clone()),
                    fallback: fallback.as_ref().map(|fallback| fallback.and(keys)),
                }
            }
        }
    }

    /// Run against the store, applying the key fallback at most once.
    pub async fn execute(
        &self,
        store: &dyn EntityStore,
        entity_type: &EntityType,
        window: QueryWindow,
    ) -> Result<Vec<EntityRecord>, StoreError> {
        let (predicate, fallback) = match self {
            CompiledFilter::MatchNothing => return Ok(Vec::new()),
            CompiledFilter::Query {
                predicate,
                fallback,
            } => (predicate, fallback),
        };

        let records = store.query(entity_type, predicate, window).await?;
        match fallback {
            Some(fallback) if records.is_empty() => {
                tracing::debug!(entity_type = %entity_type, "Name lookup missed, retrying by key");
                store.query(entity_type, fallback, window).await
            }
            _ => Ok(records),
        }
    }
}

/// Validates filters against the entity schemas and compiles them.
#[derive(Clone)]
pub struct FilterCompiler {
    registry: Arc<SchemaRegistry>,
}

impl FilterCompiler {
    pub fn new(registry: Arc<SchemaRegistry>) -> Self {
        Self { registry }
    }

    /// Resolve an entity type name to its schema.
    pub fn schema(&self, entity_type: &str) -> Result<&EntitySchema, DomainError> {
        self.registry.resolve(entity_type)
    }

    /// Validate every clause, then compile.
    ///
    /// # Errors
    ///
    /// Unknown entity types, unknown fields, operators the field does not
    /// support and values that do not fit the field kind.
    pub fn compile(
        &self,
        entity_type: &EntityType,
        filters: &FilterSpec,
    ) -> Result<CompiledFilter, DomainError> {
        let schema = self.registry.resolve(entity_type.as_str())?;

        let mut conditions = Vec::with_capacity(filters.clauses().len());
        let mut fallback: Option<(usize, Condition)> = None;

        for clause in filters {
            let field = schema.field(&clause.field)?;
            let compiled = compile_clause(field, clause)?;
            match compiled {
                CompiledClause::Nothing => {}
                CompiledClause::Condition {
                    condition,
                    key_fallback,
                } => {
                    if fallback.is_none() && schema.fallback_to_key {
                        if let Some(alternate) = key_fallback {
                            fallback = Some((conditions.len(), alternate));
                        }
                    }
                    conditions.push(condition);
                }
            }
        }

        // Checked only after every clause validated.
        if filters.has_empty_set() {
            return Ok(CompiledFilter::MatchNothing);
        }

        let fallback = fallback.map(|(index, alternate)| {
            let mut replaced = conditions.clone();
            replaced[index] = alternate;
            StorePredicate::new(replaced)
        });
        let predicate = StorePredicate::new(conditions);

        tracing::debug!(
            entity_type = %entity_type,
            predicate = ?predicate,
            has_fallback = fallback.is_some(),
            "Compiled filter"
        );

        Ok(CompiledFilter::Query {
            predicate,
            fallback,
        })
    }
}

enum CompiledClause {
    Nothing,
    Condition {
        condition: Condition,
        /// Natural-key replacement for an exact name lookup.
        key_fallback: Option<Condition>,
    },
}

impl From<Condition> for CompiledClause {
    fn from(condition: Condition) -> Self {
        CompiledClause::Condition {
            condition,
            key_fallback: None,
        }
    }
}

fn compile_clause(field: FieldRef<'_>, clause: &FilterClause) -> Result<CompiledClause, DomainError> {
    let kind = field.kind();

    if clause.op == FilterOp::InSet {
        let values = match &clause.value {
            FilterValue::Set(values) => values.clone(),
            FilterValue::Scalar(value) => vec![value.clone()],
        };
        if values.is_empty() {
            return Ok(CompiledClause::Nothing);
        }
        let values = values
            .iter()
            .map(|v| v.conform_to(kind))
            .collect::<Result<Vec<_>, _>>()?;
        let comparison = match field {
            FieldRef::Name => Comparison::OneOfFolded(values.iter().map(ScalarValue::folded).collect()),
            FieldRef::Key | FieldRef::Attribute(_) => Comparison::OneOf(values),
        };
        return Ok(Condition::new(column(field), kind, comparison).into());
    }

    let value = clause.value.as_scalar().ok_or_else(|| {
        DomainError::validation(format!(
            "operator {} on '{}' takes a single value",
            clause.op, clause.field
        ))
    })?;
    let value = value.conform_to(kind)?;

    match field {
        FieldRef::Name => compile_name(clause, value),
        FieldRef::Key => compile_text(field, clause, value),
        FieldRef::Attribute(_) => match kind {
            AttributeKind::Text => compile_text(field, clause, value),
            AttributeKind::Integer | AttributeKind::Float => compile_numeric(field, clause, value),
            AttributeKind::Bool => compile_bool(field, clause, value),
        },
    }
}

fn compile_name(clause: &FilterClause, value: ScalarValue) -> Result<CompiledClause, DomainError> {
    let literal = value.to_text();
    let comparison = match clause.op {
        FilterOp::Eq | FilterOp::Ieq | FilterOp::Contains if literal.contains(WILDCARD) => {
            Comparison::Like(wildcard_pattern(&literal))
        }
        FilterOp::Contains => Comparison::Like(format!("%{}%", escape_like(&fold_case(&literal)))),
        FilterOp::Eq | FilterOp::Ieq => {
            return Ok(CompiledClause::Condition {
                condition: Condition::new(
                    Column::DisplayName,
                    AttributeKind::Text,
                    Comparison::EqualsFolded(fold_case(&literal)),
                ),
                key_fallback: Some(Condition::new(
                    Column::Key,
                    AttributeKind::Text,
                    Comparison::Equals(ScalarValue::Text(literal)),
                )),
            });
        }
        op => return Err(unsupported(op, &clause.field)),
    };
    Ok(Condition::new(Column::DisplayName, AttributeKind::Text, comparison).into())
}

fn compile_text(
    field: FieldRef<'_>,
    clause: &FilterClause,
    value: ScalarValue,
) -> Result<CompiledClause, DomainError> {
    let comparison = match clause.op {
        FilterOp::Eq => Comparison::Equals(value),
        FilterOp::Ieq => Comparison::EqualsFolded(value.folded()),
        FilterOp::Contains => {
            let literal = value.to_text();
            if literal.contains(WILDCARD) {
                Comparison::Like(wildcard_pattern(&literal))
            } else {
                Comparison::Like(format!("%{}%", escape_like(&fold_case(&literal))))
            }
        }
        op => return Err(unsupported(op, &clause.field)),
    };
    Ok(Condition::new(column(field), AttributeKind::Text, comparison).into())
}

fn compile_numeric(
    field: FieldRef<'_>,
    clause: &FilterClause,
    value: ScalarValue,
) -> Result<CompiledClause, DomainError> {
    let kind = field.kind();
    let comparison = match clause.op {
        FilterOp::Eq | FilterOp::Ieq => Comparison::Equals(value),
        FilterOp::RangeGte | FilterOp::RangeLte => {
            let bound = value.as_f64().ok_or_else(|| {
                DomainError::validation(format!("'{}' needs a numeric bound", clause.field))
            })?;
            if clause.op == FilterOp::RangeGte {
                Comparison::AtLeast(bound)
            } else {
                Comparison::AtMost(bound)
            }
        }
        op => return Err(unsupported(op, &clause.field)),
    };
    Ok(Condition::new(column(field), kind, comparison).into())
}

fn compile_bool(
    field: FieldRef<'_>,
    clause: &FilterClause,
    value: ScalarValue,
) -> Result<CompiledClause, DomainError> {
    match clause.op {
        FilterOp::Eq | FilterOp::Ieq => {
            Ok(Condition::new(column(field), AttributeKind::Bool, Comparison::Equals(value)).into())
        }
        op => Err(unsupported(op, &clause.field)),
    }
}

fn column(field: FieldRef<'_>) -> Column {
    match field {
        FieldRef::Key => Column::Key,
        FieldRef::Name => Column::DisplayName,
        FieldRef::Attribute(def) => Column::Attribute(def.name.clone()),
    }
}

fn unsupported(op: FilterOp, field: &str) -> DomainError {
    DomainError::validation(format!("operator {} is not supported on '{}'", op, field))
}

/// Escape `LIKE` metacharacters so literal text matches literally.
fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// `fire*` → `fire%`, case-folded, with the literal parts escaped.
fn wildcard_pattern(literal: &str) -> String {
    fold_case(literal)
        .split(WILDCARD)
        .map(escape_like)
        .collect::<Vec<_>>()
        .join("%")
}
