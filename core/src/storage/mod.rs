// Copyright (c) Concord Contributors
// SPDX-License-Identifier: Apache-2.0

pub(crate) mod mem_store;

use std::collections::BTreeMap;

use concord_config::CreatorId;

use crate::{
    error::ConsensusResult,
    event::{EventHash, Generation, VerifiedEvent},
};

pub use mem_store::MemStore;

/// A common interface for event persistence. The consensus core reads recent
/// history and ancestor events through it; the gossip responder additionally
/// needs per-creator scans and head tracking.
pub trait EventStore: Send + Sync {
    /// Writes verified events to the store.
    fn write_events(&self, events: Vec<VerifiedEvent>) -> ConsensusResult<()>;

    /// Returns all merge events that have not reached consensus yet. The
    /// returned set is closed under the parent relation restricted to
    /// non-consensus merge events.
    fn load_recent_history(&self) -> ConsensusResult<Vec<VerifiedEvent>>;

    /// Reads events for the given hashes, used to realize the regular events
    /// referenced by committed merge events.
    fn load_ancestors(&self, hashes: &[EventHash]) -> ConsensusResult<Vec<Option<VerifiedEvent>>>;

    /// Checks which of the given events exist in the store.
    fn contains_events(&self, hashes: &[EventHash]) -> ConsensusResult<Vec<bool>>;

    /// The latest known merge-event generation per creator.
    fn creator_heads(&self) -> ConsensusResult<BTreeMap<CreatorId, Generation>>;

    /// Reads a creator's merge events at generations strictly greater than
    /// `after`, in generation order.
    fn scan_events_by_creator(
        &self,
        creator: &CreatorId,
        after: Generation,
    ) -> ConsensusResult<Vec<VerifiedEvent>>;

    /// Marks events as having reached consensus, retracting them from recent
    /// history.
    fn mark_consensus(&self, hashes: &[EventHash]) -> ConsensusResult<()>;
}
