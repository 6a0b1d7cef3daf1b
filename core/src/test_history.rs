// Copyright (c) Concord Contributors
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;

use concord_config::{Committee, CreatorId};

use crate::{
    event::{Event, EventAPI, EventHash, TestEvent, VerifiedEvent},
    snapshot::HistorySnapshot,
};

/// Initializes tracing output for tests, honoring `RUST_LOG`.
pub(crate) fn init_tracing_for_test() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Builds merge-event DAGs declaratively, by label. Branches are per-creator
/// chains, so layers are expressed as "mesh rounds": one new merge event per
/// creator, tree-linked to its previous event and referencing the other
/// creators' latest events.
pub(crate) struct HistoryBuilder {
    creators: Vec<String>,
    events: Vec<Event>,
    hashes_by_label: HashMap<String, EventHash>,
    latest_label: HashMap<String, String>,
    generations: HashMap<String, u32>,
    next_timestamp: u64,
}

impl HistoryBuilder {
    pub(crate) fn new(creators: &[&str]) -> Self {
        Self {
            creators: creators.iter().map(|creator| creator.to_string()).collect(),
            events: Vec::new(),
            hashes_by_label: HashMap::new(),
            latest_label: HashMap::new(),
            generations: HashMap::new(),
            next_timestamp: 0,
        }
    }

    /// Adds one merge event. `tree` and `others` name earlier events by
    /// label; the tree parent is automatically part of the parents.
    pub(crate) fn merge(
        &mut self,
        label: &str,
        creator: &str,
        tree: Option<&str>,
        others: &[&str],
    ) -> EventHash {
        self.merge_full(label, creator, tree, others, &[])
    }

    /// Like [`Self::merge`], with extra raw parent hashes pointing outside
    /// the snapshot (regular events, prior-block merge events).
    pub(crate) fn merge_full(
        &mut self,
        label: &str,
        creator: &str,
        tree: Option<&str>,
        others: &[&str],
        external_parents: &[EventHash],
    ) -> EventHash {
        let mut parents: Vec<EventHash> = others.iter().map(|other| self.hash(other)).collect();
        parents.extend(external_parents.iter().copied());

        let mut builder = TestEvent::new(creator)
            .set_timestamp_ms(self.next_timestamp)
            .set_parents(parents);
        self.next_timestamp += 1;
        if let Some(tree) = tree {
            builder = builder.set_tree_hash(self.hash(tree));
        }
        let event = builder.build();
        let hash = event.digest();

        assert!(
            self.hashes_by_label
                .insert(label.to_string(), hash)
                .is_none(),
            "duplicate label {label}"
        );
        self.latest_label
            .insert(creator.to_string(), label.to_string());
        *self.generations.entry(creator.to_string()).or_default() += 1;
        self.events.push(event);
        hash
    }

    /// One full-mesh generation across all creators.
    pub(crate) fn mesh_round(&mut self) {
        let creators = self.creators.clone();
        let creators: Vec<&str> = creators.iter().map(String::as_str).collect();
        self.mesh_round_among(&creators);
    }

    pub(crate) fn mesh_rounds(&mut self, rounds: u32) {
        for _ in 0..rounds {
            self.mesh_round();
        }
    }

    /// One mesh generation among a subset of creators: each gets a new event
    /// tree-linked to its own latest and referencing the others' latest, as
    /// they stood at the start of the round. Labels follow the
    /// `{lowercase creator}{generation}` convention.
    pub(crate) fn mesh_round_among(&mut self, creators: &[&str]) {
        let starting_labels: HashMap<String, Option<String>> = creators
            .iter()
            .map(|&creator| (creator.to_string(), self.latest_label.get(creator).cloned()))
            .collect();

        for &creator in creators {
            let generation = self.generations.get(creator).copied().unwrap_or(0) + 1;
            let label = format!("{}{generation}", creator.to_lowercase());
            let tree = starting_labels[creator].clone();
            let others: Vec<&str> = creators
                .iter()
                .copied()
                .filter(|&other| other != creator)
                .filter_map(|other| starting_labels[other].as_deref())
                .collect();
            self.merge(&label, creator, tree.as_deref(), &others);
        }
    }

    pub(crate) fn hash(&self, label: &str) -> EventHash {
        *self
            .hashes_by_label
            .get(label)
            .unwrap_or_else(|| panic!("unknown label {label}"))
    }

    pub(crate) fn hashes(&self, labels: &[&str]) -> Vec<EventHash> {
        let mut hashes: Vec<EventHash> = labels.iter().map(|label| self.hash(label)).collect();
        hashes.sort_unstable();
        hashes
    }

    pub(crate) fn committee(&self) -> Committee {
        Committee::new(
            self.creators
                .iter()
                .map(|creator| CreatorId::new(creator.clone()))
                .collect(),
        )
    }

    pub(crate) fn verified_events(&self) -> Vec<VerifiedEvent> {
        self.events
            .iter()
            .cloned()
            .map(VerifiedEvent::new_for_test)
            .collect()
    }

    /// Builds a fresh snapshot plus the committee of all creators.
    pub(crate) fn build(&self) -> (HistorySnapshot, Committee) {
        let snapshot = HistorySnapshot::build(self.verified_events()).unwrap();
        (snapshot, self.committee())
    }
}
