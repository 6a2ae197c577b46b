use super::schema::{ColumnSchema, DatasetSchema, MeasureType};
use super::transform::{AggregateOp, AggregateTransform};
use crate::core::value::ValueType;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DerivationError {
    #[error("Field '{0}' does not exist in the source schema")]
    UnknownField(String),

    #[error("Aggregate has {ops} ops but {fields} fields")]
    ArityMismatch { ops: usize, fields: usize },

    #[error("Aggregate has {ops} ops but {aliases} output names")]
    AliasMismatch { ops: usize, aliases: usize },

    #[error("Aggregate op '{0}' requires a field")]
    MissingField(AggregateOp),

    #[error("Aggregate produces column '{0}' more than once")]
    DuplicateOutput(String),
}

/// Computes the schema a transform produces from its source schema.
///
/// Implementations must be pure: the same inputs always give the same
/// schema, and nothing outside the return value is touched.
pub trait SchemaDeriver: Send + Sync {
    fn derive_aggregate_schema(
        &self,
        source: &DatasetSchema,
        transform: &AggregateTransform,
    ) -> Result<DatasetSchema, DerivationError>;
}

/// Default deriver following Vega aggregate naming.
///
/// Group-by columns keep their source definitions; each measure is named by
/// its alias, or `<op>_<field>`, or `count` for a field-less count. An
/// aggregate with no ops yields a single `count` measure.
#[derive(Debug, Clone, Copy, Default)]
pub struct AggregateSchemaDeriver;

impl SchemaDeriver for AggregateSchemaDeriver {
    fn derive_aggregate_schema(
        &self,
        source: &DatasetSchema,
        transform: &AggregateTransform,
    ) -> Result<DatasetSchema, DerivationError> {
        let mut out = DatasetSchema::default();
        let mut seen = HashSet::new();

        for name in &transform.groupby {
            let col = source
                .get_column(name)
                .ok_or_else(|| DerivationError::UnknownField(name.clone()))?;
            push_unique(&mut out, &mut seen, col.clone())?;
        }

        if transform.ops.is_empty() {
            if !transform.fields.is_empty() {
                return Err(DerivationError::ArityMismatch {
                    ops: 0,
                    fields: transform.fields.len(),
                });
            }
            let count = ColumnSchema::of_type("count", ValueType::Integer);
            push_unique(&mut out, &mut seen, count)?;
            return Ok(out);
        }

        let ops = transform.ops.len();
        if transform.fields.len() != ops {
            return Err(DerivationError::ArityMismatch {
                ops,
                fields: transform.fields.len(),
            });
        }
        if !transform.alias.is_empty() && transform.alias.len() != ops {
            return Err(DerivationError::AliasMismatch {
                ops,
                aliases: transform.alias.len(),
            });
        }

        for (i, (op, field)) in transform.ops.iter().zip(&transform.fields).enumerate() {
            let source_col = match field {
                Some(f) => Some(
                    source
                        .get_column(f)
                        .ok_or_else(|| DerivationError::UnknownField(f.clone()))?,
                ),
                None if *op == AggregateOp::Count => None,
                None => return Err(DerivationError::MissingField(*op)),
            };

            let name = match (transform.alias.get(i), field) {
                (Some(alias), _) => alias.clone(),
                (None, Some(f)) => format!("{}_{}", op, f),
                (None, None) => op.to_string(),
            };

            let column = match (op, source_col) {
                (AggregateOp::Min | AggregateOp::Max, Some(src)) => {
                    ColumnSchema::new(name, src.value_type, src.measure)
                }
                (op, _) if op.is_counting() => ColumnSchema::of_type(name, ValueType::Integer),
                _ => ColumnSchema::new(name, ValueType::Float, MeasureType::Quantitative),
            };
            push_unique(&mut out, &mut seen, column)?;
        }

        Ok(out)
    }
}

fn push_unique(
    schema: &mut DatasetSchema,
    seen: &mut HashSet<String>,
    column: ColumnSchema,
) -> Result<(), DerivationError> {
    if !seen.insert(column.name.clone()) {
        return Err(DerivationError::DuplicateOutput(column.name));
    }
    schema.add_column(column);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sales_schema() -> DatasetSchema {
        DatasetSchema::new(vec![
            ColumnSchema::of_type("amt", ValueType::Integer),
            ColumnSchema::of_type("day", ValueType::Date),
            ColumnSchema::of_type("region", ValueType::String),
        ])
    }

    #[test]
    fn test_groupby_and_measures() {
        let t = AggregateTransform::group_by(["region"]).sum("amt").count();
        let schema = AggregateSchemaDeriver
            .derive_aggregate_schema(&sales_schema(), &t)
            .unwrap();

        assert_eq!(schema.column_names(), vec!["region", "sum_amt", "count"]);
        let sum = schema.get_column("sum_amt").unwrap();
        assert_eq!(sum.value_type, ValueType::Float);
        assert_eq!(sum.measure, MeasureType::Quantitative);
        assert_eq!(schema.get_column("count").unwrap().value_type, ValueType::Integer);
    }

    #[test]
    fn test_min_keeps_source_type() {
        let t = AggregateTransform::group_by(["region"])
            .measure(AggregateOp::Min, Some("day"))
            .with_alias(["first_day"]);
        let schema = AggregateSchemaDeriver
            .derive_aggregate_schema(&sales_schema(), &t)
            .unwrap();
        let col = schema.get_column("first_day").unwrap();
        assert_eq!(col.value_type, ValueType::Date);
        assert_eq!(col.measure, MeasureType::Temporal);
    }

    #[test]
    fn test_no_ops_defaults_to_count() {
        let t = AggregateTransform::group_by(["region"]);
        let schema = AggregateSchemaDeriver
            .derive_aggregate_schema(&sales_schema(), &t)
            .unwrap();
        assert_eq!(schema.column_names(), vec!["region", "count"]);
    }

    #[test]
    fn test_errors() {
        let d = AggregateSchemaDeriver;
        let src = sales_schema();

        let unknown = AggregateTransform::group_by(["nope"]).count();
        assert_eq!(
            d.derive_aggregate_schema(&src, &unknown),
            Err(DerivationError::UnknownField("nope".into()))
        );

        let unknown_measure = AggregateTransform::group_by(["region"]).sum("nope");
        assert_eq!(
            d.derive_aggregate_schema(&src, &unknown_measure),
            Err(DerivationError::UnknownField("nope".into()))
        );

        let missing = AggregateTransform::group_by(["region"]).measure(AggregateOp::Sum, None);
        assert_eq!(
            d.derive_aggregate_schema(&src, &missing),
            Err(DerivationError::MissingField(AggregateOp::Sum))
        );

        let mut arity = AggregateTransform::group_by(["region"]).sum("amt");
        arity.fields.push(None);
        assert_eq!(
            d.derive_aggregate_schema(&src, &arity),
            Err(DerivationError::ArityMismatch { ops: 1, fields: 2 })
        );

        let dup = AggregateTransform::group_by(["region"])
            .sum("amt")
            .with_alias(["region"]);
        assert_eq!(
            d.derive_aggregate_schema(&src, &dup),
            Err(DerivationError::DuplicateOutput("region".into()))
        );
    }
}
