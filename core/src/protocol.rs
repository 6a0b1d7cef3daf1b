// Copyright (c) Concord Contributors
// SPDX-License-Identifier: Apache-2.0

use concord_config::Committee;
use tracing::{debug, warn};

use crate::{
    branch::Branches,
    candidate::Candidates,
    context::Context,
    dag::{
        build_ancestry_map, find_descendants_in_path, find_diverse_pedigree_merge_event,
        AncestrySet, DescendantMap,
    },
    snapshot::{EventIndex, HistorySnapshot},
    utils::format_event_set,
};

#[cfg(test)]
#[path = "tests/proof_protocol_tests.rs"]
mod proof_protocol_tests;

/// A set of Y candidates, kept as sorted event indices so equality and union
/// are cheap and every iteration over it is hash-ordered.
pub(crate) type YSet = Vec<EventIndex>;

/// The most recent voting event of one elector observable at some point of a
/// branch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Vote {
    Unresolved,
    Voting(EventIndex),
    Byzantine,
}

/// The voting and precommit state machine deciding which Y-set a
/// supermajority of electors commits to.
///
/// Every elector's branch is walked forward from its Y. Each branch event
/// tallies the supports of the latest votes it can observe, chooses its own
/// support (following an active precommit's union when one exists, the union
/// of observed Ys otherwise), and precommits once a supermajority agrees.
/// A precommit whose branch support moves on is rejected; one whose confirm
/// point still agrees decides consensus.
///
/// Safety rests on containment: concurrent precommits overlap, so the
/// longest observable precommit support equals the union of all of them, and
/// at most `n - s` precommits can fail before every branch converges on that
/// union.
pub(crate) struct ProofProtocol<'a> {
    context: &'a Context,
    snapshot: &'a HistorySnapshot,
    electors: &'a Committee,
    branches: &'a Branches,
    candidates: &'a Candidates,

    // Scratch state, one slot per snapshot event, discarded with the run.
    supporting: Vec<Option<YSet>>,
    votes: Vec<Option<Vec<Vote>>>,
    pre_commit: Vec<Option<EventIndex>>,
    confirm_point: Vec<Option<EventIndex>>,
    to_confirm: Vec<Option<EventIndex>>,
    branch_y: Vec<Option<EventIndex>>,

    // Per-elector state.
    y_descendants: Vec<DescendantMap>,
    y_ancestry: Vec<AncestrySet>,
    byzantine_votes: Vec<bool>,
}

impl<'a> ProofProtocol<'a> {
    pub(crate) fn new(
        context: &'a Context,
        snapshot: &'a HistorySnapshot,
        electors: &'a Committee,
        branches: &'a Branches,
        candidates: &'a Candidates,
    ) -> Self {
        let events = snapshot.len();
        Self {
            context,
            snapshot,
            electors,
            branches,
            candidates,
            supporting: vec![None; events],
            votes: vec![None; events],
            pre_commit: vec![None; events],
            confirm_point: vec![None; events],
            to_confirm: vec![None; events],
            branch_y: vec![None; events],
            y_descendants: vec![DescendantMap::new(); electors.size()],
            y_ancestry: vec![Vec::new(); electors.size()],
            byzantine_votes: vec![false; electors.size()],
        }
    }

    /// Runs the protocol to completion: either some branch confirms a
    /// precommit and the decided Y-set is returned, or every branch exhausts
    /// and the result is empty.
    pub(crate) fn run(&mut self) -> YSet {
        let ys = self.initialize_ys();
        let voting = self.voting_events(&ys);

        for &event in self.snapshot.topo_order() {
            if !voting[event] || self.supporting[event].is_some() {
                continue;
            }
            if let Some(decided) = self.step(event) {
                debug!(
                    "Consensus reached at {}: {}",
                    self.snapshot.hash(event),
                    format_event_set(self.snapshot, &decided)
                );
                return decided;
            }
        }
        YSet::new()
    }

    /// Electors whose votes were marked byzantine during the run.
    pub(crate) fn byzantine_votes(&self) -> &[bool] {
        &self.byzantine_votes
    }

    /// Every Y starts out supporting the Ys in its own ancestry plus itself,
    /// with votes recorded for each of them.
    fn initialize_ys(&mut self) -> Vec<EventIndex> {
        // Y-sets are compared structurally, so keep every set sorted by
        // event index.
        let mut ys: Vec<EventIndex> = self
            .candidates
            .y_by_elector
            .iter()
            .flatten()
            .copied()
            .collect();
        ys.sort_unstable();

        for elector in 0..self.electors.size() {
            if let Some(y) = self.candidates.y_by_elector[elector] {
                self.y_ancestry[elector] = build_ancestry_map(self.snapshot, y);
            }
        }

        for elector in 0..self.electors.size() {
            let Some(y) = self.candidates.y_by_elector[elector] else {
                continue;
            };
            let ancestry = &self.y_ancestry[elector];
            let supported: YSet = ys.iter().copied().filter(|&other| ancestry[other]).collect();

            let mut votes = vec![Vote::Unresolved; self.electors.size()];
            for &supported_y in &supported {
                let voter = self
                    .electors
                    .index_of(self.snapshot.creator(supported_y))
                    .expect("Y candidates are authored by electors");
                votes[voter.value()] = Vote::Voting(supported_y);
            }

            self.supporting[y] = Some(supported);
            self.votes[y] = Some(votes);
            self.branch_y[y] = Some(y);
        }
        ys
    }

    /// Marks the events to be stepped: the linear stretch of each elector's
    /// branch after its Y. A fork ends the stretch.
    fn voting_events(&self, ys: &[EventIndex]) -> Vec<bool> {
        let mut voting = vec![false; self.snapshot.len()];
        for &y in ys {
            let mut current = y;
            voting[y] = true;
            while let [next] = self.branches.tree_children[current][..] {
                voting[next] = true;
                current = next;
            }
        }
        voting
    }

    /// One protocol step at a branch event. Returns the decided Y-set if this
    /// event confirms a precommit.
    fn step(&mut self, event: EventIndex) -> Option<YSet> {
        let threshold = self.electors.supermajority_threshold();
        let parent = self.branches.tree_parent[event]
            .expect("every stepped event descends from its branch Y");

        let votes = self.collect_votes(event, parent);
        let tally = self.tally(&votes);
        let (next_set, mut next_count) = self.choose_support(parent, &votes, tally);

        let previous = self.supporting[parent]
            .as_ref()
            .expect("branch parents are resolved before their children");
        if previous != &next_set {
            next_count += 1;
        }
        self.supporting[event] = Some(next_set.clone());

        // Precommit handling: inherit, reject if support moved on, create on
        // a fresh supermajority, then check whether this event confirms.
        self.pre_commit[event] = self.pre_commit[parent];
        if let Some(pre_commit) = self.pre_commit[event] {
            let committed_support = self.supporting[pre_commit]
                .as_ref()
                .expect("precommits are resolved events");
            if committed_support != &next_set {
                if let Some(confirm_point) = self.confirm_point[pre_commit] {
                    self.to_confirm[confirm_point] = None;
                }
                self.pre_commit[event] = None;
                self.context
                    .metrics
                    .node_metrics
                    .precommits_rejected_total
                    .inc();
                debug!(
                    "Rejected precommit {} at {}: support moved to {}",
                    self.snapshot.hash(pre_commit),
                    self.snapshot.hash(event),
                    format_event_set(self.snapshot, &next_set)
                );
            }
        }

        if next_count >= threshold && self.pre_commit[event].is_none() {
            self.pre_commit[event] = Some(event);
            self.context
                .metrics
                .node_metrics
                .precommits_created_total
                .inc();
            let confirm_point = find_diverse_pedigree_merge_event(
                self.snapshot,
                &self.branches.tree_children,
                event,
                self.electors,
                threshold,
            );
            if let Some(confirm_point) = confirm_point {
                self.confirm_point[event] = Some(confirm_point);
                self.to_confirm[confirm_point] = Some(event);
            }
            debug!(
                "Created precommit at {} for {}, confirm point {:?}",
                self.snapshot.hash(event),
                format_event_set(self.snapshot, &next_set),
                confirm_point.map(|point| self.snapshot.hash(point))
            );
        }

        if let Some(pre_commit) = self.to_confirm[event] {
            let committed_support = self.supporting[pre_commit]
                .as_ref()
                .expect("precommits are resolved events");
            if committed_support == &next_set && next_count >= threshold {
                return Some(committed_support.clone());
            }
        }

        // Publish: this event becomes its elector's latest vote.
        let mut votes = votes;
        let elector = self
            .electors
            .index_of(self.snapshot.creator(event))
            .expect("stepped events are authored by electors");
        votes[elector.value()] = Vote::Voting(event);
        self.votes[event] = Some(votes);
        self.branch_y[event] = self.branch_y[parent];
        None
    }

    /// Inherits the branch's votes and refreshes them with every voting event
    /// on the paths from each elector's Y to this event. A second event at an
    /// already-voted generation marks its elector byzantine for good.
    fn collect_votes(&mut self, event: EventIndex, parent: EventIndex) -> Vec<Vote> {
        let mut votes = self.votes[parent]
            .clone()
            .expect("branch parents are resolved before their children");
        for (elector, byzantine) in self.byzantine_votes.iter().enumerate() {
            if *byzantine {
                votes[elector] = Vote::Byzantine;
            }
        }

        for elector in 0..self.electors.size() {
            let Some(y) = self.candidates.y_by_elector[elector] else {
                continue;
            };
            let path = find_descendants_in_path(
                self.snapshot,
                y,
                event,
                &mut self.y_descendants[elector],
                &self.y_ancestry[elector],
            );
            for voting_event in path {
                if voting_event == event {
                    continue;
                }
                self.observe_vote(&mut votes, voting_event);
            }
        }
        votes
    }

    fn observe_vote(&mut self, votes: &mut [Vote], voting_event: EventIndex) {
        let Some(voter) = self.electors.index_of(self.snapshot.creator(voting_event)) else {
            return;
        };
        let Some(voter_y) = self.candidates.y_by_elector[voter.value()] else {
            return;
        };
        let generation = self.branches.generation[voting_event];
        if generation < self.branches.generation[voter_y] {
            return;
        }

        match votes[voter.value()] {
            Vote::Byzantine => {}
            Vote::Voting(known) if known == voting_event => {}
            Vote::Voting(known) if self.branches.generation[known] == generation => {
                warn!(
                    "Elector {voter} voted twice at generation {generation}: {} and {}",
                    self.snapshot.hash(known),
                    self.snapshot.hash(voting_event)
                );
                votes[voter.value()] = Vote::Byzantine;
                self.byzantine_votes[voter.value()] = true;
            }
            Vote::Voting(known) if self.branches.generation[known] < generation => {
                votes[voter.value()] = Vote::Voting(voting_event);
            }
            Vote::Voting(_) => {}
            Vote::Unresolved => votes[voter.value()] = Vote::Voting(voting_event),
        }
    }

    /// Groups the resolved votes by identical supporting set. Votes whose
    /// target has not been stepped yet stay out of the tally.
    fn tally(&self, votes: &[Vote]) -> Vec<(YSet, usize)> {
        let mut tally: Vec<(YSet, usize)> = Vec::new();
        for vote in votes {
            let Vote::Voting(voting_event) = vote else {
                continue;
            };
            let Some(set) = &self.supporting[*voting_event] else {
                continue;
            };
            match tally.iter_mut().find(|(tallied, _)| tallied == set) {
                Some((_, count)) => *count += 1,
                None => tally.push((set.clone(), 1)),
            }
        }
        tally
    }

    /// Chooses the support this event moves to. A branch holding a precommit
    /// follows the union of all observable precommits; otherwise the union of
    /// the Ys behind the observed votes.
    fn choose_support(
        &self,
        parent: EventIndex,
        votes: &[Vote],
        tally: Vec<(YSet, usize)>,
    ) -> (YSet, usize) {
        let union = if let Some(own) = self.pre_commit[parent] {
            let mut union = self.supporting[own]
                .clone()
                .expect("precommits are resolved events");
            for vote in votes {
                let Vote::Voting(voting_event) = vote else {
                    continue;
                };
                let Some(observed) = self.pre_commit[*voting_event] else {
                    continue;
                };
                let observed_support = self.supporting[observed]
                    .as_ref()
                    .expect("precommits are resolved events");
                // Containment makes the longest support the union of all.
                if observed_support.len() > union.len()
                    || (observed_support.len() == union.len() && *observed_support < union)
                {
                    union = observed_support.clone();
                }
            }
            union
        } else {
            let mut union: YSet = votes
                .iter()
                .filter_map(|vote| match vote {
                    Vote::Voting(voting_event) => self.branch_y[*voting_event],
                    _ => None,
                })
                .collect();
            union.sort_unstable();
            union.dedup();
            union
        };

        for (set, count) in tally {
            if set == union {
                return (set, count);
            }
        }
        (union, 0)
    }
}
