use super::events::StoreEvent;
use super::sequencer::Aggregation;
use super::state::VisState;
use super::store::{Listener, PipelineStore};
use crate::core::dataset::{AggregateSchemaDeriver, AggregateTransform, DatasetDraft, SchemaDeriver};
use crate::core::error::{PipelineError, PipelineResult};
use crate::core::ids::Identifier;
use crate::core::pipeline::PipelineDraft;
use crate::core::value::Datum;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

/// Thread-safe handle to a [`PipelineStore`].
///
/// Operations hold the write lock from identifier allocation through the
/// last journal entry; readers take the read lock, so they only ever see the
/// state between whole operations.
///
/// Listeners run after the write lock is released, so a listener may call
/// [`SharedStore::read`] or [`SharedStore::snapshot`]. Events reach
/// listeners in commit order, and the events of one operation are delivered
/// back to back. A listener must not start a write operation or subscribe
/// from inside its callback.
pub struct SharedStore<D = AggregateSchemaDeriver> {
    inner: Arc<RwLock<PipelineStore<D>>>,
    /// Committed but undelivered events, one batch per operation.
    pending: Arc<Mutex<VecDeque<Vec<StoreEvent>>>>,
    listeners: Arc<Mutex<Vec<Listener>>>,
}

impl<D> Clone for SharedStore<D> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            pending: Arc::clone(&self.pending),
            listeners: Arc::clone(&self.listeners),
        }
    }
}

impl<D: SchemaDeriver> SharedStore<D> {
    /// Wrap `store`. Listeners already subscribed on it move to the handle.
    pub fn new(mut store: PipelineStore<D>) -> Self {
        let listeners = store.take_listeners();
        Self {
            inner: Arc::new(RwLock::new(store)),
            pending: Arc::new(Mutex::new(VecDeque::new())),
            listeners: Arc::new(Mutex::new(listeners)),
        }
    }

    /// Register a callback for every event committed from now on.
    pub fn subscribe<F>(&self, listener: F)
    where
        F: Fn(&StoreEvent) + Send + Sync + 'static,
    {
        lock(&self.listeners).push(Box::new(listener));
    }

    pub fn create_pipeline(
        &self,
        pipeline: PipelineDraft,
        dataset: DatasetDraft,
        values: Option<Vec<Datum>>,
    ) -> PipelineResult<Identifier> {
        let pipeline_id = {
            let mut store = self.inner.write().map_err(|_| PipelineError::LockPoisoned)?;
            let (pipeline_id, events) = store.create_pipeline_deferred(pipeline, dataset, values)?;
            lock(&self.pending).push_back(events);
            pipeline_id
        };
        self.deliver();
        Ok(pipeline_id)
    }

    pub fn aggregate_pipeline(
        &self,
        pipeline_id: Identifier,
        transform: AggregateTransform,
    ) -> PipelineResult<Aggregation> {
        let aggregation = {
            let mut store = self.inner.write().map_err(|_| PipelineError::LockPoisoned)?;
            let (aggregation, events) = store.aggregate_pipeline_deferred(pipeline_id, transform)?;
            lock(&self.pending).push_back(events);
            aggregation
        };
        self.deliver();
        Ok(aggregation)
    }

    /// Drain pending batches to the listeners.
    ///
    /// Batches are queued under the write lock, so queue order is commit
    /// order. Holding the listener lock while draining keeps one deliverer
    /// at a time; a batch queued meanwhile is picked up by whoever drains
    /// next, including the current deliverer.
    fn deliver(&self) {
        let listeners = lock(&self.listeners);
        loop {
            let Some(batch) = lock(&self.pending).pop_front() else {
                break;
            };
            for event in &batch {
                for listener in listeners.iter() {
                    listener(event);
                }
            }
        }
    }

    /// Run `f` against the store under the read lock.
    pub fn read<R>(&self, f: impl FnOnce(&PipelineStore<D>) -> R) -> PipelineResult<R> {
        let store = self.inner.read().map_err(|_| PipelineError::LockPoisoned)?;
        Ok(f(&store))
    }

    pub fn snapshot(&self) -> PipelineResult<VisState> {
        self.read(|store| store.state().clone())
    }
}

impl Default for SharedStore<AggregateSchemaDeriver> {
    fn default() -> Self {
        Self::new(PipelineStore::new())
    }
}

// Poisoning left by a panicking listener is ignored
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
