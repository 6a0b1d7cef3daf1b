// Copyright (c) Concord Contributors
// SPDX-License-Identifier: Apache-2.0

use std::collections::{BTreeMap, HashMap, HashSet};

use concord_config::CreatorId;
use parking_lot::RwLock;

use crate::{
    error::ConsensusResult,
    event::{EventAPI, EventHash, EventType, Generation, VerifiedEvent},
    storage::EventStore,
};

/// In-memory event store, for tests and volatile deployments.
pub struct MemStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    events: BTreeMap<EventHash, VerifiedEvent>,
    generations: HashMap<EventHash, Generation>,
    merge_events_by_creator: BTreeMap<CreatorId, BTreeMap<Generation, Vec<EventHash>>>,
    consensus: HashSet<EventHash>,
}

impl MemStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EventStore for MemStore {
    fn write_events(&self, events: Vec<VerifiedEvent>) -> ConsensusResult<()> {
        let mut inner = self.inner.write();
        for event in events {
            let hash = event.digest();
            if inner.events.contains_key(&hash) {
                continue;
            }
            if event.event_type() == EventType::Merge {
                // Generation within the creator's full chain: one past the
                // tree parent when known, otherwise a tail.
                let generation = event
                    .tree_hash()
                    .and_then(|tree_hash| inner.generations.get(tree_hash).copied())
                    .map_or(1, |parent_generation| parent_generation + 1);
                inner.generations.insert(hash, generation);
                inner
                    .merge_events_by_creator
                    .entry(event.creator().clone())
                    .or_default()
                    .entry(generation)
                    .or_default()
                    .push(hash);
            }
            inner.events.insert(hash, event);
        }
        Ok(())
    }

    fn load_recent_history(&self) -> ConsensusResult<Vec<VerifiedEvent>> {
        let inner = self.inner.read();
        Ok(inner
            .events
            .values()
            .filter(|event| {
                event.event_type() == EventType::Merge && !inner.consensus.contains(&event.digest())
            })
            .cloned()
            .collect())
    }

    fn load_ancestors(&self, hashes: &[EventHash]) -> ConsensusResult<Vec<Option<VerifiedEvent>>> {
        let inner = self.inner.read();
        Ok(hashes
            .iter()
            .map(|hash| inner.events.get(hash).cloned())
            .collect())
    }

    fn contains_events(&self, hashes: &[EventHash]) -> ConsensusResult<Vec<bool>> {
        let inner = self.inner.read();
        Ok(hashes
            .iter()
            .map(|hash| inner.events.contains_key(hash))
            .collect())
    }

    fn creator_heads(&self) -> ConsensusResult<BTreeMap<CreatorId, Generation>> {
        let inner = self.inner.read();
        Ok(inner
            .merge_events_by_creator
            .iter()
            .filter_map(|(creator, generations)| {
                generations
                    .keys()
                    .next_back()
                    .map(|&head| (creator.clone(), head))
            })
            .collect())
    }

    fn scan_events_by_creator(
        &self,
        creator: &CreatorId,
        after: Generation,
    ) -> ConsensusResult<Vec<VerifiedEvent>> {
        let inner = self.inner.read();
        let Some(generations) = inner.merge_events_by_creator.get(creator) else {
            return Ok(Vec::new());
        };
        Ok(generations
            .range(after + 1..)
            .flat_map(|(_, hashes)| hashes.iter())
            .map(|hash| inner.events[hash].clone())
            .collect())
    }

    fn mark_consensus(&self, hashes: &[EventHash]) -> ConsensusResult<()> {
        let mut inner = self.inner.write();
        inner.consensus.extend(hashes.iter().copied());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::event::TestEvent;

    use super::*;

    fn chain(creator: &str, length: u64) -> Vec<VerifiedEvent> {
        let mut events: Vec<VerifiedEvent> = Vec::new();
        for i in 0..length {
            let mut builder = TestEvent::new(creator).set_timestamp_ms(i);
            if let Some(previous) = events.last() {
                builder = builder.set_tree_hash(previous.digest());
            }
            events.push(VerifiedEvent::new_for_test(builder.build()));
        }
        events
    }

    #[test]
    fn test_write_and_load_recent_history() {
        let store = MemStore::new();
        let events = chain("A", 3);
        store.write_events(events.clone()).unwrap();

        let history = store.load_recent_history().unwrap();
        assert_eq!(history.len(), 3);

        store.mark_consensus(&[events[0].digest()]).unwrap();
        let history = store.load_recent_history().unwrap();
        assert_eq!(history.len(), 2);
        assert!(history.iter().all(|event| event.digest() != events[0].digest()));
    }

    #[test]
    fn test_creator_heads_and_scan() {
        let store = MemStore::new();
        store.write_events(chain("A", 3)).unwrap();
        store.write_events(chain("B", 1)).unwrap();

        let heads = store.creator_heads().unwrap();
        assert_eq!(heads[&CreatorId::from("A")], 3);
        assert_eq!(heads[&CreatorId::from("B")], 1);

        let missing = store
            .scan_events_by_creator(&CreatorId::from("A"), 1)
            .unwrap();
        assert_eq!(missing.len(), 2);
        assert!(store
            .scan_events_by_creator(&CreatorId::from("C"), 0)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_load_ancestors_and_contains() {
        let store = MemStore::new();
        let events = chain("A", 2);
        store.write_events(vec![events[0].clone()]).unwrap();

        let loaded = store
            .load_ancestors(&[events[0].digest(), events[1].digest()])
            .unwrap();
        assert!(loaded[0].is_some());
        assert!(loaded[1].is_none());

        let contained = store
            .contains_events(&[events[0].digest(), events[1].digest()])
            .unwrap();
        assert_eq!(contained, vec![true, false]);
    }
}
