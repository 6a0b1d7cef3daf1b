// Copyright (c) Concord Contributors
// SPDX-License-Identifier: Apache-2.0

use std::{sync::Arc, time::Instant};

use concord_config::Committee;
use tracing::{debug, warn};

use crate::{
    branch::Branches,
    candidate::Candidates,
    commit::{BlockHeight, Decision, DecisionOutcome},
    committer::Committer,
    context::Context,
    error::{ConsensusError, ConsensusResult},
    protocol::ProofProtocol,
    snapshot::HistorySnapshot,
};

#[cfg(test)]
#[path = "tests/engine_tests.rs"]
mod engine_tests;

#[cfg(test)]
#[path = "tests/randomized_tests.rs"]
mod randomized_tests;

/// The consensus decision engine. `decide` is a pure, synchronous function of
/// a history snapshot, an elector committee, and a block height: it either
/// derives the next block's event set with its consensus proof, or reports
/// that this history does not support a decision yet.
///
/// The caller owns serialization: no other thread may touch the snapshot for
/// the duration of the call. All intermediate state is scoped to the call.
pub struct ConsensusEngine {
    context: Arc<Context>,
}

impl ConsensusEngine {
    pub fn new(context: Arc<Context>) -> Self {
        Self { context }
    }

    /// Decides which merge events have reached consensus. Returns a decision
    /// with committed event hashes and consensus proof hashes, or an empty
    /// outcome when the history is insufficient; byzantine electors detected
    /// along the way are reported in both cases.
    ///
    /// Deterministic: hash-equal inputs produce bitwise identical outcomes.
    pub fn decide(
        &self,
        snapshot: &HistorySnapshot,
        electors: &Committee,
        block_height: BlockHeight,
    ) -> ConsensusResult<DecisionOutcome> {
        let cap = self.context.parameters.max_history_events;
        if snapshot.len() > cap {
            return Err(ConsensusError::HistoryTooLarge {
                events: snapshot.len(),
                cap,
            });
        }

        let start = Instant::now();
        let metrics = &self.context.metrics.node_metrics;
        metrics.snapshot_events.observe(snapshot.len() as f64);

        let branches = Branches::build(snapshot, electors);
        let mut byzantine = branches.byzantine.clone();
        let decision = self.try_decide(snapshot, electors, &branches, &mut byzantine, block_height);

        let byzantine_electors: Vec<_> = electors
            .electors()
            .filter(|(index, _)| byzantine[index.value()])
            .map(|(_, id)| {
                warn!("Elector {id} behaved byzantine at height {block_height}");
                metrics
                    .byzantine_electors_total
                    .with_label_values(&[id.as_str()])
                    .inc();
                id.clone()
            })
            .collect();

        match &decision {
            Some(decision) => {
                metrics.decisions_total.inc();
                metrics
                    .committed_events_per_decision
                    .observe(decision.event_hashes.len() as f64);
                metrics
                    .proof_events_per_decision
                    .observe(decision.consensus_proof_hashes.len() as f64);
            }
            None => metrics.no_consensus_total.inc(),
        }
        metrics.decide_latency.observe(start.elapsed().as_secs_f64());

        Ok(DecisionOutcome {
            decision,
            byzantine_electors,
        })
    }

    fn try_decide(
        &self,
        snapshot: &HistorySnapshot,
        electors: &Committee,
        branches: &Branches,
        byzantine: &mut [bool],
        block_height: BlockHeight,
    ) -> Option<Decision> {
        let candidates = Candidates::find(snapshot, electors, branches)?;

        let mut protocol =
            ProofProtocol::new(&self.context, snapshot, electors, branches, &candidates);
        let decided_ys = protocol.run();
        for (elector, flagged) in protocol.byzantine_votes().iter().enumerate() {
            byzantine[elector] |= *flagged;
        }
        if decided_ys.is_empty() {
            debug!("No supermajority support at height {block_height}");
            return None;
        }

        Some(Committer::new(snapshot, electors, &candidates).commit(&decided_ys, block_height))
    }
}
