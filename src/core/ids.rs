// src/core/ids.rs

use super::error::{PipelineError, PipelineResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;
use uuid::Uuid;

/// Session-unique identifier shared by datasets and pipelines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identifier(pub u64);

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Identifier {
    /// The id right after this one, if the id space is not used up.
    pub fn successor(self) -> PipelineResult<Identifier> {
        self.0
            .checked_add(1)
            .map(Identifier)
            .ok_or(PipelineError::IdentifierExhausted(self))
    }
}

impl From<u64> for Identifier {
    fn from(v: u64) -> Self {
        Identifier(v)
    }
}

/// Unique identifier for one committed store operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionId(pub Uuid);

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic identifier counter.
///
/// Every call to [`IdAllocator::allocate`] returns a value strictly greater
/// than anything issued or reserved before, so ids are never reused even
/// after the record they named is gone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdAllocator {
    next: u64,
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::starting_at(1)
    }
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(start: u64) -> Self {
        Self { next: start }
    }

    /// Issue the next identifier.
    ///
    /// `u64::MAX` is never handed out; once the counter reaches it every
    /// call fails and the counter stays put.
    pub fn allocate(&mut self) -> PipelineResult<Identifier> {
        let id = Identifier(self.next);
        self.next = id.successor()?.0;
        debug!(id = id.0, "allocated identifier");
        Ok(id)
    }

    /// Record an explicitly chosen id so later allocations skip past it.
    /// Fails without moving the floor when no id would be left after it.
    pub fn reserve(&mut self, id: Identifier) -> PipelineResult<()> {
        let next = id.successor()?;
        if next.0 > self.next {
            self.next = next.0;
        }
        Ok(())
    }

    /// The value the next allocation will return.
    pub fn peek(&self) -> Identifier {
        Identifier(self.next)
    }
}
