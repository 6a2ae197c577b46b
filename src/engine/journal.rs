use super::events::{RegistryEvent, StoreEvent};
use crate::core::ids::TransactionId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One observed event with its position in the commit order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub seq: u64,
    pub transaction: TransactionId,
    pub at: DateTime<Utc>,
    pub event: StoreEvent,
}

/// Append-only record of everything the store has published.
///
/// Sequence numbers advance even while recording is disabled, so they stay
/// comparable across a toggle.
#[derive(Debug, Clone)]
pub struct Journal {
    enabled: bool,
    next_seq: u64,
    entries: Vec<JournalEntry>,
}

impl Default for Journal {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Journal {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            next_seq: 0,
            entries: Vec::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub(crate) fn record(&mut self, transaction: TransactionId, event: StoreEvent) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        if self.enabled {
            self.entries.push(JournalEntry {
                seq,
                transaction,
                at: Utc::now(),
                event,
            });
        }
        seq
    }

    pub fn entries(&self) -> &[JournalEntry] {
        &self.entries
    }

    /// Entries with a sequence number at or after `seq`.
    pub fn since(&self, seq: u64) -> &[JournalEntry] {
        let start = self.entries.partition_point(|e| e.seq < seq);
        &self.entries[start..]
    }

    /// Registry writes only, in commit order; enough to rebuild the state.
    pub fn registry_events(&self) -> impl Iterator<Item = &RegistryEvent> {
        self.entries.iter().filter_map(|e| match &e.event {
            StoreEvent::Registry(r) => Some(r),
            StoreEvent::Notification(_) => None,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ids::Identifier;
    use crate::engine::events::Notification;

    fn selected(id: u64) -> StoreEvent {
        Notification::PipelineSelected {
            pipeline_id: Identifier(id),
        }
        .into()
    }

    #[test]
    fn test_since() {
        let mut journal = Journal::default();
        let tx = TransactionId::new();
        for i in 0..5 {
            journal.record(tx, selected(i));
        }
        assert_eq!(journal.since(3).len(), 2);
        assert_eq!(journal.since(3)[0].seq, 3);
        assert_eq!(journal.since(10).len(), 0);
        assert_eq!(journal.registry_events().count(), 0);
    }

    #[test]
    fn test_disabled_keeps_counting() {
        let mut journal = Journal::new(false);
        let tx = TransactionId::new();
        assert_eq!(journal.record(tx, selected(1)), 0);
        assert_eq!(journal.record(tx, selected(1)), 1);
        assert!(journal.is_empty());
    }
}
