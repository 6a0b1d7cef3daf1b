// Copyright (c) Concord Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::{
    branch::Branches,
    candidate::Candidates,
    context::Context,
    event::EventHash,
    test_history::{init_tracing_for_test, HistoryBuilder},
};

use super::ProofProtocol;

fn run_protocol(history: &HistoryBuilder) -> (Vec<EventHash>, Context) {
    let (snapshot, electors) = history.build();
    let (context, _) = Context::new_for_test(electors.size());

    let branches = Branches::build(&snapshot, &electors);
    let candidates =
        Candidates::find(&snapshot, &electors, &branches).expect("candidates should exist");
    let mut protocol = ProofProtocol::new(&context, &snapshot, &electors, &branches, &candidates);
    let decided = protocol.run();
    let hashes = decided.iter().map(|&y| snapshot.hash(y)).collect();
    (hashes, context)
}

#[test]
fn test_full_mesh_converges_on_all_ys() {
    init_tracing_for_test();
    let mut history = HistoryBuilder::new(&["A", "B", "C", "D"]);
    history.mesh_rounds(7);

    let (decided, context) = run_protocol(&history);
    assert_eq!(decided, history.hashes(&["a3", "b3", "c3", "d3"]));
    assert!(context.metrics.node_metrics.precommits_created_total.get() >= 1);
    assert_eq!(
        context.metrics.node_metrics.precommits_rejected_total.get(),
        0
    );
}

/// With no branch events beyond the Ys there is nothing to vote with.
#[test]
fn test_no_votes_beyond_ys_yields_nothing() {
    init_tracing_for_test();
    let mut history = HistoryBuilder::new(&["A", "B", "C", "D"]);
    history.mesh_rounds(3);

    let (decided, context) = run_protocol(&history);
    assert!(decided.is_empty());
    assert_eq!(
        context.metrics.node_metrics.precommits_created_total.get(),
        0
    );
}

/// Five rounds are enough to precommit but leave no descendants diverse
/// enough to confirm: the round ends undecided, to be retried on a longer
/// history.
#[test]
fn test_precommit_without_confirm_point_stays_undecided() {
    init_tracing_for_test();
    let mut history = HistoryBuilder::new(&["A", "B", "C", "D"]);
    history.mesh_rounds(5);

    let (decided, context) = run_protocol(&history);
    assert!(decided.is_empty());
    assert!(context.metrics.node_metrics.precommits_created_total.get() >= 1);
}

/// Healed 2-2 partitions settle on the union of both Y pairs.
#[test]
fn test_partition_heals_to_union() {
    init_tracing_for_test();
    let mut history = HistoryBuilder::new(&["A", "B", "C", "D"]);
    history.mesh_rounds(3);
    for _ in 0..3 {
        history.mesh_round_among(&["A", "B"]);
        history.mesh_round_among(&["C", "D"]);
    }
    history.mesh_rounds(4);

    let (decided, _) = run_protocol(&history);
    assert_eq!(decided, history.hashes(&["a3", "b3", "c3", "d3"]));
}
