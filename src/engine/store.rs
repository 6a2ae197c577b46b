use super::events::{RegistryEvent, StoreEvent};
use super::journal::Journal;
use super::sequencer::{Aggregation, Sequencer, Transaction};
use super::state::VisState;
use crate::core::config::EngineConfig;
use crate::core::dataset::{
    AggregateSchemaDeriver, AggregateTransform, Dataset, DatasetDraft, DatasetGraph,
    IntegrityIssue, SchemaDeriver,
};
use crate::core::error::PipelineResult;
use crate::core::ids::{Identifier, TransactionId};
use crate::core::pipeline::{Pipeline, PipelineDraft};
use crate::core::value::Datum;
use tracing::{info, warn};

/// Callback invoked for every published event, in commit order.
pub type Listener = Box<dyn Fn(&StoreEvent) + Send + Sync>;

/// Owns the pipeline/dataset state and is the only way to change it.
///
/// Each public operation is planned, verified and committed as a unit;
/// because it holds `&mut self` throughout, no other operation or reader can
/// see the registries in between.
pub struct PipelineStore<D = AggregateSchemaDeriver> {
    state: VisState,
    deriver: D,
    journal: Journal,
    listeners: Vec<Listener>,
}

impl PipelineStore<AggregateSchemaDeriver> {
    pub fn new() -> Self {
        Self::with_deriver(AggregateSchemaDeriver)
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::with_state(
            VisState::with_id_start(config.ids.start),
            AggregateSchemaDeriver,
            Journal::new(config.journal.enabled),
        )
    }

    /// Rebuild a store from previously published registry events.
    pub fn replay<'e, I>(events: I) -> PipelineResult<Self>
    where
        I: IntoIterator<Item = &'e RegistryEvent>,
    {
        let state = VisState::replay(events)?;
        Ok(Self::with_state(state, AggregateSchemaDeriver, Journal::default()))
    }
}

impl Default for PipelineStore<AggregateSchemaDeriver> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: SchemaDeriver> PipelineStore<D> {
    pub fn with_deriver(deriver: D) -> Self {
        Self::with_state(VisState::new(), deriver, Journal::default())
    }

    fn with_state(state: VisState, deriver: D, journal: Journal) -> Self {
        Self {
            state,
            deriver,
            journal,
            listeners: Vec::new(),
        }
    }

    /// Create a pipeline together with its root dataset holding `values`.
    ///
    /// Emits `DatasetCreated`, then `PipelineCreated`, then
    /// `PipelineSelected`. Fails with `MissingValues` when `values` is
    /// `None` and `DuplicateIdentifier` when the draft's id is taken.
    pub fn create_pipeline(
        &mut self,
        pipeline: PipelineDraft,
        dataset: DatasetDraft,
        values: Option<Vec<Datum>>,
    ) -> PipelineResult<Identifier> {
        let (pipeline_id, events) = self.create_pipeline_deferred(pipeline, dataset, values)?;
        self.notify(&events);
        Ok(pipeline_id)
    }

    /// Aggregate a pipeline into a new derived dataset and link it under the
    /// transform's grouping key, replacing any earlier link for that key.
    pub fn aggregate_pipeline(
        &mut self,
        pipeline_id: Identifier,
        transform: AggregateTransform,
    ) -> PipelineResult<Aggregation> {
        let (aggregation, events) = self.aggregate_pipeline_deferred(pipeline_id, transform)?;
        self.notify(&events);
        Ok(aggregation)
    }

    /// [`Self::create_pipeline`] without calling listeners. The committed
    /// events are journaled and handed back for the caller to deliver.
    pub(crate) fn create_pipeline_deferred(
        &mut self,
        pipeline: PipelineDraft,
        dataset: DatasetDraft,
        values: Option<Vec<Datum>>,
    ) -> PipelineResult<(Identifier, Vec<StoreEvent>)> {
        let name = pipeline.name.clone();
        let planned =
            Sequencer::new(&mut self.state, &self.deriver).create_pipeline(pipeline, dataset, values);
        let (pipeline_id, txn) = planned.map_err(|e| {
            warn!(pipeline = %name, error = %e, "create_pipeline rejected");
            e
        })?;

        let (tx, events) = self.commit(txn)?;
        info!(pipeline = %name, id = pipeline_id.0, %tx, "pipeline created");
        Ok((pipeline_id, events))
    }

    pub(crate) fn aggregate_pipeline_deferred(
        &mut self,
        pipeline_id: Identifier,
        transform: AggregateTransform,
    ) -> PipelineResult<(Aggregation, Vec<StoreEvent>)> {
        let planned = Sequencer::new(&mut self.state, &self.deriver)
            .aggregate_pipeline(pipeline_id, transform);
        let (aggregation, txn) = planned.map_err(|e| {
            warn!(pipeline = pipeline_id.0, error = %e, "aggregate_pipeline rejected");
            e
        })?;

        let (tx, events) = self.commit(txn)?;
        info!(
            pipeline = pipeline_id.0,
            dataset = aggregation.dataset_id.0,
            key = %aggregation.key,
            %tx,
            "pipeline aggregated"
        );
        Ok((aggregation, events))
    }

    fn commit(&mut self, txn: Transaction) -> PipelineResult<(TransactionId, Vec<StoreEvent>)> {
        if let Err(e) = self.state.commit(&txn.events) {
            warn!(error = %e, "transaction rejected during verification");
            return Err(e);
        }

        let tx = TransactionId::new();
        let events: Vec<StoreEvent> = txn
            .events
            .into_iter()
            .map(StoreEvent::from)
            .chain(txn.notifications.into_iter().map(StoreEvent::from))
            .collect();
        for event in &events {
            self.journal.record(tx, event.clone());
        }
        Ok((tx, events))
    }

    fn notify(&self, events: &[StoreEvent]) {
        for event in events {
            for listener in &self.listeners {
                listener(event);
            }
        }
    }

    /// Register a callback for every event published from now on.
    pub fn subscribe<F>(&mut self, listener: F)
    where
        F: Fn(&StoreEvent) + Send + Sync + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    /// Hand the registered listeners over to a wrapper that delivers events
    /// itself.
    pub(crate) fn take_listeners(&mut self) -> Vec<Listener> {
        std::mem::take(&mut self.listeners)
    }

    pub fn state(&self) -> &VisState {
        &self.state
    }

    pub fn dataset(&self, id: Identifier) -> Option<&Dataset> {
        self.state.datasets().get(id)
    }

    pub fn pipeline(&self, id: Identifier) -> Option<&Pipeline> {
        self.state.pipelines().get(id)
    }

    /// Root dataset of a pipeline.
    pub fn source_of(&self, pipeline: Identifier) -> Option<&Dataset> {
        self.pipeline(pipeline)
            .and_then(|p| self.state.datasets().get(p.source_id))
    }

    pub fn graph(&self) -> DatasetGraph<'_> {
        self.state.graph()
    }

    pub fn verify(&self) -> Vec<IntegrityIssue> {
        self.state.integrity_issues()
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    pub fn deriver(&self) -> &D {
        &self.deriver
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::dataset::{DerivationError, DatasetSchema};
    use crate::core::error::PipelineError;
    use std::sync::{Arc, Mutex};

    struct FailingDeriver;

    impl SchemaDeriver for FailingDeriver {
        fn derive_aggregate_schema(
            &self,
            _source: &DatasetSchema,
            _transform: &AggregateTransform,
        ) -> Result<DatasetSchema, DerivationError> {
            Err(DerivationError::UnknownField("boom".into()))
        }
    }

    #[test]
    fn test_listener_sees_commit_order() {
        let mut store = PipelineStore::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        store.subscribe(move |e| {
            let label = match e {
                StoreEvent::Registry(r) => r.name(),
                StoreEvent::Notification(_) => "pipeline_selected",
            };
            sink.lock().unwrap().push(label);
        });

        store
            .create_pipeline(PipelineDraft::new("p"), DatasetDraft::new(), Some(Vec::new()))
            .unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec!["dataset_created", "pipeline_created", "pipeline_selected"]
        );
        assert_eq!(store.journal().len(), 3);
    }

    #[test]
    fn test_derivation_error_leaves_no_trace() {
        let mut store = PipelineStore::with_deriver(FailingDeriver);
        let pid = store
            .create_pipeline(PipelineDraft::new("p"), DatasetDraft::new(), Some(Vec::new()))
            .unwrap();
        let before = store.state().clone();
        let journal_len = store.journal().len();

        let err = store
            .aggregate_pipeline(pid, AggregateTransform::group_by(["a"]))
            .unwrap_err();

        assert!(matches!(
            err,
            PipelineError::Derivation(DerivationError::UnknownField(_))
        ));
        assert_eq!(store.state(), &before);
        assert_eq!(store.journal().len(), journal_len);
    }

    #[test]
    fn test_from_config() {
        let mut config = EngineConfig::default();
        config.ids.start = 100;
        config.journal.enabled = false;

        let mut store = PipelineStore::from_config(&config);
        let pid = store
            .create_pipeline(PipelineDraft::new("p"), DatasetDraft::new(), Some(Vec::new()))
            .unwrap();
        assert_eq!(pid, Identifier(100));
        assert_eq!(store.source_of(pid).unwrap().id, Identifier(101));
        assert!(store.journal().is_empty());
    }
}
