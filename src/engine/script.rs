//! JSON command scripts, as run by the `pipegraph run` subcommand.
//!
//! A script is an array of commands:
//!
//! ```json
//! [
//!   {"op": "create_pipeline", "pipeline": {"id": 1, "name": "sales"},
//!    "values": [{"region": "E", "amt": 10}]},
//!   {"op": "aggregate_pipeline", "pipeline_id": 1,
//!    "transform": {"groupby": ["region"], "fields": ["amt"], "ops": ["sum"]}}
//! ]
//! ```

use super::store::PipelineStore;
use crate::core::dataset::{AggregateTransform, DatasetDraft, GroupingKey, SchemaDeriver};
use crate::core::error::PipelineResult;
use crate::core::ids::Identifier;
use crate::core::pipeline::PipelineDraft;
use crate::core::value::Datum;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Command {
    CreatePipeline {
        pipeline: PipelineDraft,
        #[serde(default)]
        dataset: DatasetDraft,
        #[serde(default)]
        values: Option<Vec<Datum>>,
    },
    AggregatePipeline {
        pipeline_id: Identifier,
        transform: AggregateTransform,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum CommandOutput {
    PipelineCreated {
        pipeline_id: Identifier,
    },
    PipelineAggregated {
        pipeline_id: Identifier,
        dataset_id: Identifier,
        key: GroupingKey,
    },
}

pub fn parse_script(script: &str) -> PipelineResult<Vec<Command>> {
    Ok(serde_json::from_str(script)?)
}

pub fn execute<D: SchemaDeriver>(
    store: &mut PipelineStore<D>,
    command: Command,
) -> PipelineResult<CommandOutput> {
    match command {
        Command::CreatePipeline {
            pipeline,
            dataset,
            values,
        } => {
            let pipeline_id = store.create_pipeline(pipeline, dataset, values)?;
            Ok(CommandOutput::PipelineCreated { pipeline_id })
        }
        Command::AggregatePipeline {
            pipeline_id,
            transform,
        } => {
            let aggregation = store.aggregate_pipeline(pipeline_id, transform)?;
            Ok(CommandOutput::PipelineAggregated {
                pipeline_id,
                dataset_id: aggregation.dataset_id,
                key: aggregation.key,
            })
        }
    }
}

/// Run every command in order, stopping at the first failure.
/// Commands before the failure stay committed.
pub fn execute_script<D: SchemaDeriver>(
    store: &mut PipelineStore<D>,
    script: &str,
) -> PipelineResult<Vec<CommandOutput>> {
    let commands = parse_script(script)?;
    let mut outputs = Vec::with_capacity(commands.len());
    for (i, command) in commands.into_iter().enumerate() {
        debug!(index = i, "executing script command");
        outputs.push(execute(store, command)?);
    }
    Ok(outputs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::PipelineError;

    const SCRIPT: &str = r#"[
        {"op": "create_pipeline", "pipeline": {"id": 10, "name": "sales"},
         "values": [{"region": "E", "amt": 10}, {"region": "W", "amt": 20}]},
        {"op": "aggregate_pipeline", "pipeline_id": 10,
         "transform": {"type": "aggregate", "groupby": ["region"], "fields": ["amt"], "ops": ["sum"]}}
    ]"#;

    #[test]
    fn test_execute_script() {
        let mut store = PipelineStore::new();
        let outputs = execute_script(&mut store, SCRIPT).unwrap();

        assert_eq!(
            outputs[0],
            CommandOutput::PipelineCreated {
                pipeline_id: Identifier(10)
            }
        );
        match &outputs[1] {
            CommandOutput::PipelineAggregated { dataset_id, key, .. } => {
                assert_eq!(key.as_str(), "region");
                assert_eq!(
                    store.dataset(*dataset_id).unwrap().name,
                    "sales_groupby_region"
                );
            }
            other => panic!("unexpected output {:?}", other),
        }
    }

    #[test]
    fn test_missing_values_in_script() {
        let mut store = PipelineStore::new();
        let err = execute_script(
            &mut store,
            r#"[{"op": "create_pipeline", "pipeline": {"name": "empty"}}]"#,
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::MissingValues { .. }));
    }

    #[test]
    fn test_malformed_script() {
        let mut store = PipelineStore::new();
        let err = execute_script(&mut store, r#"[{"op": "drop_everything"}]"#).unwrap_err();
        assert!(matches!(err, PipelineError::Script(_)));
    }
}
