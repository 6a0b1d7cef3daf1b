// Copyright (c) Concord Contributors
// SPDX-License-Identifier: Apache-2.0

use std::{
    cmp::Reverse,
    collections::{BinaryHeap, HashMap},
};

use concord_config::CreatorId;

use crate::{
    error::{ConsensusError, ConsensusResult},
    event::{EventAPI, EventHash, VerifiedEvent},
    storage::EventStore,
};

/// Index of an event within one [`HistorySnapshot`]. Indices are assigned in
/// lexicographic hash order, so any index-ordered iteration is hash-ordered
/// and therefore identical across nodes holding the same event set.
pub(crate) type EventIndex = usize;

/// A node's view of recent non-consensus history: a finite set of merge
/// events with parent links resolved against the events present in the set.
/// Parents pointing at genesis or already-consensus events stay unresolved.
///
/// The snapshot is immutable for the duration of a `decide` call; all
/// algorithm state lives in per-call scratch structures keyed by
/// [`EventIndex`].
pub struct HistorySnapshot {
    events: Vec<VerifiedEvent>,
    index_by_hash: HashMap<EventHash, EventIndex>,
    parents: Vec<Vec<EventIndex>>,
    children: Vec<Vec<EventIndex>>,
    topo: Vec<EventIndex>,
}

impl HistorySnapshot {
    /// Builds a snapshot from a set of merge events, checking the structural
    /// invariants: every merge event lists its tree parent among its parents,
    /// every event names a creator, and the parent relation is acyclic.
    /// Non-merge events are dropped; duplicates collapse by hash.
    pub fn build(events: Vec<VerifiedEvent>) -> ConsensusResult<Self> {
        let mut events: Vec<VerifiedEvent> = events
            .into_iter()
            .filter(|event| event.event_type() == crate::event::EventType::Merge)
            .collect();
        events.sort_by_key(|event| event.digest());
        events.dedup_by_key(|event| event.digest());

        let mut index_by_hash = HashMap::with_capacity(events.len());
        for (index, event) in events.iter().enumerate() {
            if event.creator().is_empty() {
                return Err(ConsensusError::MissingCreator {
                    event: event.digest(),
                });
            }
            if let Some(tree_hash) = event.tree_hash() {
                if !event.parents().contains(tree_hash) {
                    return Err(ConsensusError::TreeParentNotInParents {
                        event: event.digest(),
                    });
                }
            }
            index_by_hash.insert(event.digest(), index);
        }

        let mut parents: Vec<Vec<EventIndex>> = vec![Vec::new(); events.len()];
        let mut children: Vec<Vec<EventIndex>> = vec![Vec::new(); events.len()];
        for (index, event) in events.iter().enumerate() {
            for parent_hash in event.parents() {
                if let Some(&parent) = index_by_hash.get(parent_hash) {
                    if !parents[index].contains(&parent) {
                        parents[index].push(parent);
                        children[parent].push(index);
                    }
                }
            }
            parents[index].sort_unstable();
        }

        let topo = Self::topological_order(&events, &parents, &children)?;

        Ok(Self {
            events,
            index_by_hash,
            parents,
            children,
            topo,
        })
    }

    /// Convenience constructor reading the recent history from a store.
    pub fn load(store: &dyn EventStore) -> ConsensusResult<Self> {
        Self::build(store.load_recent_history()?)
    }

    /// Ancestors-first order with lexicographic tie-break on hashes. A cycle
    /// leaves events unordered and fails the build.
    fn topological_order(
        events: &[VerifiedEvent],
        parents: &[Vec<EventIndex>],
        children: &[Vec<EventIndex>],
    ) -> ConsensusResult<Vec<EventIndex>> {
        let mut remaining: Vec<usize> = parents.iter().map(Vec::len).collect();
        let mut ready: BinaryHeap<Reverse<EventIndex>> = remaining
            .iter()
            .enumerate()
            .filter(|(_, &count)| count == 0)
            .map(|(index, _)| Reverse(index))
            .collect();

        let mut topo = Vec::with_capacity(events.len());
        while let Some(Reverse(index)) = ready.pop() {
            topo.push(index);
            for &child in &children[index] {
                remaining[child] -= 1;
                if remaining[child] == 0 {
                    ready.push(Reverse(child));
                }
            }
        }

        if topo.len() < events.len() {
            let stuck = remaining
                .iter()
                .position(|&count| count > 0)
                .expect("some event must remain unordered");
            return Err(ConsensusError::CyclicHistory {
                event: events[stuck].digest(),
            });
        }
        Ok(topo)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn contains(&self, hash: &EventHash) -> bool {
        self.index_by_hash.contains_key(hash)
    }

    pub fn events(&self) -> impl Iterator<Item = &VerifiedEvent> {
        self.events.iter()
    }

    pub(crate) fn event(&self, index: EventIndex) -> &VerifiedEvent {
        &self.events[index]
    }

    pub(crate) fn hash(&self, index: EventIndex) -> EventHash {
        self.events[index].digest()
    }

    pub(crate) fn creator(&self, index: EventIndex) -> &CreatorId {
        self.events[index].creator()
    }

    pub(crate) fn parents(&self, index: EventIndex) -> &[EventIndex] {
        &self.parents[index]
    }

    pub(crate) fn index_of(&self, hash: &EventHash) -> Option<EventIndex> {
        self.index_by_hash.get(hash).copied()
    }

    pub(crate) fn topo_order(&self) -> &[EventIndex] {
        &self.topo
    }
}
