use serde::{Deserialize, Serialize};
use std::fmt;

/// Declarative description of a data-shaping operation attached to a
/// derived dataset. Transforms are never edited once attached; a different
/// parameterisation means a different dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Transform {
    Aggregate(AggregateTransform),
}

impl Transform {
    pub fn kind(&self) -> &'static str {
        match self {
            Transform::Aggregate(_) => "aggregate",
        }
    }
}

/// Summary operation applied per group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateOp {
    Count,
    Valid,
    Missing,
    Distinct,
    Sum,
    Mean,
    Average,
    Median,
    Variance,
    Stdev,
    Min,
    Max,
}

impl AggregateOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregateOp::Count => "count",
            AggregateOp::Valid => "valid",
            AggregateOp::Missing => "missing",
            AggregateOp::Distinct => "distinct",
            AggregateOp::Sum => "sum",
            AggregateOp::Mean => "mean",
            AggregateOp::Average => "average",
            AggregateOp::Median => "median",
            AggregateOp::Variance => "variance",
            AggregateOp::Stdev => "stdev",
            AggregateOp::Min => "min",
            AggregateOp::Max => "max",
        }
    }

    /// Ops whose result is a row count rather than a value of the field.
    pub fn is_counting(&self) -> bool {
        matches!(
            self,
            AggregateOp::Count | AggregateOp::Valid | AggregateOp::Missing | AggregateOp::Distinct
        )
    }
}

impl fmt::Display for AggregateOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Group-by aggregation in the Vega layout: `fields`, `ops` and `as` are
/// parallel arrays, one entry per output measure.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AggregateTransform {
    pub groupby: Vec<String>,
    #[serde(default)]
    pub fields: Vec<Option<String>>,
    #[serde(default)]
    pub ops: Vec<AggregateOp>,
    #[serde(default, rename = "as", skip_serializing_if = "Vec::is_empty")]
    pub alias: Vec<String>,
}

impl AggregateTransform {
    pub fn group_by<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            groupby: fields.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Append a measure.
    pub fn measure(mut self, op: AggregateOp, field: Option<&str>) -> Self {
        self.ops.push(op);
        self.fields.push(field.map(str::to_string));
        self
    }

    pub fn count(self) -> Self {
        self.measure(AggregateOp::Count, None)
    }

    pub fn sum(self, field: &str) -> Self {
        self.measure(AggregateOp::Sum, Some(field))
    }

    pub fn mean(self, field: &str) -> Self {
        self.measure(AggregateOp::Mean, Some(field))
    }

    /// Output names for the measures, one per op.
    pub fn with_alias<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.alias = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn grouping_key(&self) -> GroupingKey {
        GroupingKey::from_fields(&self.groupby)
    }
}

impl From<AggregateTransform> for Transform {
    fn from(t: AggregateTransform) -> Self {
        Transform::Aggregate(t)
    }
}

/// Canonical signature of a grouping field list.
///
/// Fields are joined with `|` in their given order, so `["a","b"]` and
/// `["b","a"]` are different keys.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupingKey(String);

impl GroupingKey {
    pub const DELIMITER: char = '|';

    pub fn from_fields<S: AsRef<str>>(fields: &[S]) -> Self {
        let mut key = String::new();
        for (i, field) in fields.iter().enumerate() {
            if i > 0 {
                key.push(Self::DELIMITER);
            }
            key.push_str(field.as_ref());
        }
        Self(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for GroupingKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}
