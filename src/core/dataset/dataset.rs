use super::schema::DatasetSchema;
use super::transform::Transform;
use crate::core::ids::Identifier;
use crate::core::value::Datum;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Caller-supplied dataset properties. Identity and linkage are assigned by
/// the store, never taken from the draft.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatasetDraft {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Explicit schema; inferred from the raw values when absent.
    #[serde(default)]
    pub schema: Option<DatasetSchema>,
}

impl DatasetDraft {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn with_schema(mut self, schema: DatasetSchema) -> Self {
        self.schema = Some(schema);
        self
    }
}

/// A dataset record as held by the registry.
///
/// Root datasets carry their raw `values`; derived datasets carry a
/// `source_id` and the transforms that produce them from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub id: Identifier,
    pub name: String,
    pub source_id: Option<Identifier>,
    pub parent_id: Option<Identifier>,
    pub schema: DatasetSchema,
    #[serde(default)]
    pub transforms: Vec<Transform>,
    #[serde(default)]
    pub values: Option<Arc<Vec<Datum>>>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl Dataset {
    /// Build a root dataset holding raw rows.
    pub fn root(
        id: Identifier,
        name: impl Into<String>,
        draft: DatasetDraft,
        values: Vec<Datum>,
    ) -> Self {
        let schema = draft
            .schema
            .unwrap_or_else(|| DatasetSchema::infer(&values));
        Self {
            id,
            name: name.into(),
            source_id: None,
            parent_id: None,
            schema,
            transforms: Vec::new(),
            values: Some(Arc::new(values)),
            url: draft.url,
            format: draft.format,
            description: draft.description,
        }
    }

    /// Build a dataset computed from `source_id` by `transforms`.
    pub fn derived(
        id: Identifier,
        name: impl Into<String>,
        source_id: Identifier,
        transforms: Vec<Transform>,
        schema: DatasetSchema,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            source_id: Some(source_id),
            parent_id: None,
            schema,
            transforms,
            values: None,
            url: None,
            format: None,
            description: None,
        }
    }

    pub fn with_parent(mut self, parent: Identifier) -> Self {
        self.parent_id = Some(parent);
        self
    }

    pub fn is_derived(&self) -> bool {
        self.source_id.is_some()
    }

    pub fn row_count(&self) -> Option<usize> {
        self.values.as_ref().map(|v| v.len())
    }

    /// Check the record-local shape rules: derived datasets carry at least
    /// one transform, root datasets carry raw values.
    pub fn check_shape(&self) -> Result<(), String> {
        match self.source_id {
            Some(_) if self.transforms.is_empty() => Err(format!(
                "Derived dataset {} has no transforms",
                self.id
            )),
            None if self.values.is_none() => Err(format!(
                "Root dataset {} has no raw values",
                self.id
            )),
            _ => Ok(()),
        }
    }
}
