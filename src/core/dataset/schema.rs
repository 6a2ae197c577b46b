use crate::core::value::{Datum, Value, ValueType};
use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How a column is meant to be encoded visually.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeasureType {
    Nominal,
    Ordinal,
    Quantitative,
    Temporal,
}

impl MeasureType {
    /// Default measure type for a primitive value type.
    pub fn for_type(value_type: ValueType) -> Self {
        match value_type {
            ValueType::Integer | ValueType::Float => MeasureType::Quantitative,
            ValueType::Date => MeasureType::Temporal,
            ValueType::Boolean | ValueType::String => MeasureType::Nominal,
        }
    }
}

/// Metadata about a single column in a dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    pub value_type: ValueType,
    pub measure: MeasureType,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, value_type: ValueType, measure: MeasureType) -> Self {
        Self {
            name: name.into(),
            value_type,
            measure,
        }
    }

    /// Column with the default measure type for its value type.
    pub fn of_type(name: impl Into<String>, value_type: ValueType) -> Self {
        Self::new(name, value_type, MeasureType::for_type(value_type))
    }
}

/// Defines the structure of a dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DatasetSchema {
    pub columns: Vec<ColumnSchema>,
}

impl DatasetSchema {
    pub fn new(columns: Vec<ColumnSchema>) -> Self {
        Self { columns }
    }

    pub fn add_column(&mut self, col: ColumnSchema) {
        self.columns.push(col);
    }

    pub fn get_column(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Infer a schema from raw rows.
    ///
    /// Columns come out sorted by name. Nulls are ignored, so a field that is
    /// null in every row is typed as a nominal string. Strings that all parse
    /// as dates become temporal columns.
    pub fn infer(rows: &[Datum]) -> Self {
        let mut observed: BTreeMap<&str, Option<ValueType>> = BTreeMap::new();

        for row in rows {
            for (field, value) in row {
                let slot = observed.entry(field.as_str()).or_insert(None);
                if let Some(t) = observed_type(value) {
                    *slot = Some(match *slot {
                        Some(prev) => unify_observed(prev, t),
                        None => t,
                    });
                }
            }
        }

        let columns = observed
            .into_iter()
            .map(|(name, t)| ColumnSchema::of_type(name, t.unwrap_or(ValueType::String)))
            .collect();
        Self { columns }
    }
}

fn observed_type(value: &Value) -> Option<ValueType> {
    match value {
        Value::String(s) if parses_as_date(s) => Some(ValueType::Date),
        other => other.value_type(),
    }
}

// Dates mixed with other strings degrade to plain strings.
fn unify_observed(a: ValueType, b: ValueType) -> ValueType {
    match (a, b) {
        (ValueType::Date, ValueType::String) | (ValueType::String, ValueType::Date) => {
            ValueType::String
        }
        _ => a.unify(b),
    }
}

fn parses_as_date(s: &str) -> bool {
    DateTime::parse_from_rfc3339(s).is_ok() || NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(json: &str) -> Vec<Datum> {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_infer_basic_types() {
        let schema = DatasetSchema::infer(&rows(
            r#"[{"region": "E", "amt": 10, "on": "2024-01-02"},
                {"region": "W", "amt": 20.5, "on": "2024-02-03"}]"#,
        ));

        assert_eq!(schema.column_names(), vec!["amt", "on", "region"]);
        let amt = schema.get_column("amt").unwrap();
        assert_eq!(amt.value_type, ValueType::Float);
        assert_eq!(amt.measure, MeasureType::Quantitative);

        let on = schema.get_column("on").unwrap();
        assert_eq!(on.value_type, ValueType::Date);
        assert_eq!(on.measure, MeasureType::Temporal);

        let region = schema.get_column("region").unwrap();
        assert_eq!(region.measure, MeasureType::Nominal);
    }

    #[test]
    fn test_infer_conflicts_and_nulls() {
        let schema = DatasetSchema::infer(&rows(
            r#"[{"a": 1, "b": null, "c": "2024-01-01"},
                {"a": "x", "b": null, "c": "later"}]"#,
        ));
        assert_eq!(schema.get_column("a").unwrap().value_type, ValueType::String);
        assert_eq!(schema.get_column("b").unwrap().value_type, ValueType::String);
        assert_eq!(schema.get_column("c").unwrap().value_type, ValueType::String);
    }

    #[test]
    fn test_infer_empty() {
        assert!(DatasetSchema::infer(&[]).is_empty());
    }
}
