// Copyright (c) Concord Contributors
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use concord_config::{CreatorId, Parameters};

use crate::{
    commit::DecisionOutcome,
    context::Context,
    error::ConsensusError,
    event::EventHash,
    test_history::{init_tracing_for_test, HistoryBuilder},
};

use super::ConsensusEngine;

fn engine_for(committee_size: usize) -> (ConsensusEngine, Arc<Context>) {
    let (context, _) = Context::new_for_test(committee_size);
    let context = Arc::new(context);
    (ConsensusEngine::new(context.clone()), context)
}

fn decide(history: &HistoryBuilder) -> (DecisionOutcome, Arc<Context>) {
    let (snapshot, electors) = history.build();
    let (engine, context) = engine_for(electors.size());
    let outcome = engine.decide(&snapshot, &electors, 1).unwrap();
    (outcome, context)
}

/// A single elector deciding over its own branch: the tail is both X and Y,
/// the committed set is the tail, and the tail stands in as its own proof.
#[test]
fn test_single_elector_trivial_round() {
    init_tracing_for_test();
    let mut history = HistoryBuilder::new(&["A"]);
    history.merge("a1", "A", None, &[]);
    history.merge("a2", "A", Some("a1"), &[]);
    history.merge("a3", "A", Some("a2"), &[]);

    let (outcome, _) = decide(&history);
    let decision = outcome.decision.unwrap();
    assert_eq!(decision.event_hashes, history.hashes(&["a1"]));
    assert_eq!(decision.consensus_proof_hashes, history.hashes(&["a1"]));
    assert!(outcome.byzantine_electors.is_empty());
}

/// Four electors, fully meshed: everyone's Y lands at generation 3, the
/// protocol converges on all four Ys, and the block commits the four tails
/// with the X-to-Y endorsement paths as proof.
#[test]
fn test_four_electors_clean_round() {
    init_tracing_for_test();
    let mut history = HistoryBuilder::new(&["A", "B", "C", "D"]);
    history.mesh_rounds(7);

    let (outcome, context) = decide(&history);
    let decision = outcome.decision.unwrap();
    assert_eq!(decision.event_hashes, history.hashes(&["a1", "b1", "c1", "d1"]));
    assert_eq!(
        decision.consensus_proof_hashes,
        history.hashes(&["a2", "b2", "c2", "d2", "a3", "b3", "c3", "d3"])
    );
    assert!(outcome.byzantine_electors.is_empty());
    assert_eq!(context.metrics.node_metrics.decisions_total.get(), 1);
}

/// An elector forking its branch is excluded, and the three honest electors
/// still carry the round.
#[test]
fn test_byzantine_fork_is_excluded() {
    init_tracing_for_test();
    let mut history = HistoryBuilder::new(&["A", "B", "C", "D"]);
    history.mesh_rounds(1);
    history.merge("d2", "D", Some("d1"), &[]);
    history.merge("d2x", "D", Some("d1"), &[]);
    for _ in 0..6 {
        history.mesh_round_among(&["A", "B", "C"]);
    }

    let (outcome, _) = decide(&history);
    let decision = outcome.decision.unwrap();
    assert_eq!(decision.event_hashes, history.hashes(&["a1", "b1", "c1"]));
    assert_eq!(
        decision.consensus_proof_hashes,
        history.hashes(&["a2", "b2", "c2", "a3", "b3", "c3"])
    );
    assert_eq!(outcome.byzantine_electors, vec![CreatorId::from("D")]);
}

/// Two 2-2 partitions first support different Y pairs; once the partitions
/// heal, every branch moves to the union of the observed Ys and the decision
/// covers all four.
#[test]
fn test_split_support_resolves_to_union() {
    init_tracing_for_test();
    let mut history = HistoryBuilder::new(&["A", "B", "C", "D"]);
    history.mesh_rounds(3);
    for _ in 0..3 {
        history.mesh_round_among(&["A", "B"]);
        history.mesh_round_among(&["C", "D"]);
    }
    history.mesh_rounds(4);

    let (outcome, _) = decide(&history);
    let decision = outcome.decision.unwrap();
    // All four tails committed: the decision landed on the union, not on
    // either partition's pair.
    assert_eq!(decision.event_hashes, history.hashes(&["a1", "b1", "c1", "d1"]));
    assert_eq!(
        decision.consensus_proof_hashes,
        history.hashes(&["a2", "b2", "c2", "d2", "a3", "b3", "c3", "d3"])
    );
}

/// Branches too short to produce proof candidates yield no consensus.
#[test]
fn test_insufficient_history() {
    init_tracing_for_test();
    let mut history = HistoryBuilder::new(&["A", "B", "C", "D"]);
    history.merge("a1", "A", None, &[]);
    history.merge("b1", "B", None, &[]);
    history.merge("c1", "C", None, &[]);

    let (outcome, context) = decide(&history);
    assert!(outcome.decision.is_none());
    assert!(outcome.byzantine_electors.is_empty());
    assert_eq!(context.metrics.node_metrics.no_consensus_total.get(), 1);
}

#[test]
fn test_fewer_tails_than_supermajority() {
    init_tracing_for_test();
    let mut history = HistoryBuilder::new(&["A", "B", "C", "D"]);
    history.merge("a1", "A", None, &[]);
    history.merge("b1", "B", None, &[]);

    let (outcome, _) = decide(&history);
    assert!(outcome.decision.is_none());
}

/// A branch precommits to the three-elector set, then observes the fourth
/// elector's votes and a union precommit: the stale precommit is rejected and
/// the decision lands on the union at a later confirm point.
#[test]
fn test_precommit_rejected_then_union_decides() {
    init_tracing_for_test();
    let mut history = HistoryBuilder::new(&["A", "B", "C", "D"]);
    history.mesh_rounds(3);
    // D falls silent; A, B and C race ahead, and A precommits {Ya, Yb, Yc}.
    history.merge("a4", "A", Some("a3"), &["b3", "c3"]);
    history.merge("b4", "B", Some("b3"), &["a3", "c3"]);
    history.merge("c4", "C", Some("c3"), &["a3", "b3"]);
    history.merge("a5", "A", Some("a4"), &["b4", "c4"]);
    // D reconnects before B and C reach a supermajority of their own.
    history.merge("d4", "D", Some("d3"), &["a4"]);
    history.merge("b5", "B", Some("b4"), &["a4", "c4", "d4"]);
    history.merge("c5", "C", Some("c4"), &["a4", "b4", "d4"]);
    history.merge("d5", "D", Some("d4"), &["b5", "c5"]);
    history.merge("a6", "A", Some("a5"), &["b5", "c5", "d5"]);
    history.mesh_rounds(2);

    let (outcome, context) = decide(&history);
    let decision = outcome.decision.unwrap();
    assert_eq!(decision.event_hashes, history.hashes(&["a1", "b1", "c1", "d1"]));
    assert!(outcome.byzantine_electors.is_empty());
    assert!(context.metrics.node_metrics.precommits_rejected_total.get() >= 1);
    assert!(context.metrics.node_metrics.precommits_created_total.get() >= 2);
}

/// `decide` is a pure function: re-running it, with or without rebuilding the
/// snapshot, yields the same outcome.
#[test]
fn test_decide_is_idempotent() {
    init_tracing_for_test();
    let mut history = HistoryBuilder::new(&["A", "B", "C", "D"]);
    history.mesh_rounds(7);

    let (snapshot, electors) = history.build();
    let (engine, _) = engine_for(4);
    let first = engine.decide(&snapshot, &electors, 1).unwrap();
    let again = engine.decide(&snapshot, &electors, 1).unwrap();
    assert_eq!(first, again);

    let (rebuilt, _) = history.build();
    let rebuilt_outcome = engine.decide(&rebuilt, &electors, 1).unwrap();
    assert_eq!(first, rebuilt_outcome);
}

/// Events by creators outside the elector set never influence the decision.
#[test]
fn test_non_elector_events_do_not_change_decision() {
    init_tracing_for_test();
    let mut history = HistoryBuilder::new(&["A", "B", "C", "D"]);
    history.mesh_rounds(7);
    let (outcome_before, _) = decide(&history);

    history.merge("e1", "E", None, &[]);
    history.merge("e2", "E", Some("e1"), &["a1", "b3"]);
    let (outcome_after, _) = decide(&history);

    assert_eq!(
        outcome_before.decision.unwrap(),
        outcome_after.decision.unwrap()
    );
}

/// Hashes listed in committed events' parents are swept into the block even
/// when they point outside the snapshot, pulling in regular events.
#[test]
fn test_regular_event_parents_are_committed() {
    init_tracing_for_test();
    let regular = EventHash::new([7; 32]);

    let mut history = HistoryBuilder::new(&["A"]);
    history.merge_full("a1", "A", None, &[], &[regular]);
    history.merge("a2", "A", Some("a1"), &[]);
    history.merge("a3", "A", Some("a2"), &[]);

    let (outcome, _) = decide(&history);
    let decision = outcome.decision.unwrap();
    assert!(decision.event_hashes.contains(&regular));
    assert!(decision.event_hashes.contains(&history.hash("a1")));
    assert_eq!(decision.event_hashes.len(), 2);
}

/// Snapshots beyond the configured cap are refused outright.
#[test]
fn test_oversized_snapshot_is_fatal() {
    init_tracing_for_test();
    let mut history = HistoryBuilder::new(&["A", "B", "C", "D"]);
    history.mesh_rounds(3);

    let (snapshot, electors) = history.build();
    let (context, _) = Context::new_for_test(4);
    let context = Arc::new(context.with_parameters(Parameters {
        max_history_events: 4,
        ..Parameters::default()
    }));
    let engine = ConsensusEngine::new(context);
    assert!(matches!(
        engine.decide(&snapshot, &electors, 1),
        Err(ConsensusError::HistoryTooLarge { .. })
    ));
}
