// Copyright (c) Concord Contributors
// SPDX-License-Identifier: Apache-2.0

use concord_config::Committee;
use itertools::Itertools as _;
use tracing::debug;

use crate::{
    candidate::Candidates,
    commit::{BlockHeight, Decision},
    dag::flatten_descendants,
    event::{EventAPI, EventHash},
    protocol::YSet,
    snapshot::{EventIndex, HistorySnapshot},
};

/// Derives the block content from a decided Y-set: the committed event
/// hashes are the closed ancestries of the paired Xs, swept together with
/// every hash those ancestors list as parents (pulling in regular events and
/// boundary hashes); the consensus proof is the endorsement paths between
/// each X and its Y.
pub(crate) struct Committer<'a> {
    snapshot: &'a HistorySnapshot,
    electors: &'a Committee,
    candidates: &'a Candidates,
}

impl<'a> Committer<'a> {
    pub(crate) fn new(
        snapshot: &'a HistorySnapshot,
        electors: &'a Committee,
        candidates: &'a Candidates,
    ) -> Self {
        Self {
            snapshot,
            electors,
            candidates,
        }
    }

    pub(crate) fn commit(&self, decided_ys: &YSet, block_height: BlockHeight) -> Decision {
        let xs: Vec<EventIndex> = decided_ys
            .iter()
            .map(|&y| {
                let elector = self
                    .electors
                    .index_of(self.snapshot.creator(y))
                    .expect("decided Ys are authored by electors");
                self.candidates.x_by_elector[elector.value()]
                    .expect("every decided Y has a paired X")
            })
            .collect();

        let event_hashes = self.committed_event_hashes(&xs);
        let consensus_proof_hashes = self.consensus_proof_hashes(decided_ys, &xs);
        debug!(
            "Committing {} events with a proof of {} events at height {block_height}",
            event_hashes.len(),
            consensus_proof_hashes.len()
        );

        Decision {
            block_height,
            event_hashes,
            consensus_proof_hashes,
        }
    }

    /// All ancestors of the paired Xs present in the snapshot, plus every
    /// hash those ancestors list as a parent. Hashes pointing outside the
    /// snapshot are swept in as-is; filtering against prior blocks is the
    /// block assembler's concern.
    fn committed_event_hashes(&self, xs: &[EventIndex]) -> Vec<EventHash> {
        let mut reached = vec![false; self.snapshot.len()];
        let mut stack: Vec<EventIndex> = Vec::new();
        for &x in xs {
            if !reached[x] {
                reached[x] = true;
                stack.push(x);
            }
        }

        let mut hashes = Vec::new();
        while let Some(current) = stack.pop() {
            hashes.push(self.snapshot.hash(current));
            hashes.extend(self.snapshot.event(current).parents().iter().copied());
            for &parent in self.snapshot.parents(current) {
                if !reached[parent] {
                    reached[parent] = true;
                    stack.push(parent);
                }
            }
        }
        hashes.into_iter().sorted_unstable().dedup().collect()
    }

    /// The flattened endorsement paths from each X to its Y. With a single
    /// elector there is no path; X itself stands in as the proof, preserving
    /// the elector's continuity into the next block.
    fn consensus_proof_hashes(&self, decided_ys: &YSet, xs: &[EventIndex]) -> Vec<EventHash> {
        let threshold = self.electors.supermajority_threshold();
        let mut hashes: Vec<EventHash> = Vec::new();
        if threshold == 1 {
            hashes.extend(xs.iter().map(|&x| self.snapshot.hash(x)));
        } else {
            for (&y, &x) in decided_ys.iter().zip(xs) {
                let elector = self
                    .electors
                    .index_of(self.snapshot.creator(y))
                    .expect("decided Ys are authored by electors");
                let endorsements = flatten_descendants(
                    self.snapshot,
                    x,
                    &self.candidates.x_descendants[elector.value()],
                );
                hashes.extend(endorsements.iter().map(|&event| self.snapshot.hash(event)));
            }
        }
        hashes.into_iter().sorted_unstable().dedup().collect()
    }
}
