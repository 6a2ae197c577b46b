use crate::core::dataset::transform::GroupingKey;
use crate::core::ids::Identifier;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Caller-supplied pipeline properties.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineDraft {
    /// Pre-assigned id; allocated by the store when absent.
    #[serde(default)]
    pub id: Option<Identifier>,
    pub name: String,
}

impl PipelineDraft {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
        }
    }

    pub fn with_id(mut self, id: Identifier) -> Self {
        self.id = Some(id);
        self
    }
}

/// A logical processing stage: one root dataset plus the datasets derived
/// from it, keyed by grouping signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pipeline {
    pub id: Identifier,
    pub name: String,
    /// Root dataset. Fixed at creation.
    pub source_id: Identifier,
    #[serde(default)]
    pub derived: BTreeMap<GroupingKey, Identifier>,
}

impl Pipeline {
    pub fn new(id: Identifier, name: impl Into<String>, source_id: Identifier) -> Self {
        Self {
            id,
            name: name.into(),
            source_id,
            derived: BTreeMap::new(),
        }
    }

    pub fn derived_dataset(&self, key: &GroupingKey) -> Option<Identifier> {
        self.derived.get(key).copied()
    }

    /// Name given to the root dataset of this pipeline.
    pub fn source_name(name: &str, id: Identifier) -> String {
        format!("{}_{}_source", name, id)
    }

    /// Name given to a dataset aggregated from this pipeline.
    pub fn groupby_name(&self, key: &GroupingKey) -> String {
        format!("{}_groupby_{}", self.name, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names() {
        assert_eq!(Pipeline::source_name("sales", Identifier(7)), "sales_7_source");

        let p = Pipeline::new(Identifier(7), "sales", Identifier(8));
        let key = GroupingKey::from_fields(&["region", "year"]);
        assert_eq!(p.groupby_name(&key), "sales_groupby_region|year");
        assert_eq!(p.derived_dataset(&key), None);
    }
}
