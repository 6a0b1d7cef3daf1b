// Copyright (c) Concord Contributors
// SPDX-License-Identifier: Apache-2.0

mod branch;
mod candidate;
mod commit;
mod committer;
mod context;
mod dag;
mod elector;
mod engine;
mod error;
mod event;
mod gossip;
mod metrics;
mod protocol;
mod snapshot;
mod storage;
#[cfg(test)]
mod test_history;
mod utils;

pub use commit::{BlockHeight, Decision, DecisionOutcome};
pub use concord_config::two_thirds_majority;
pub use context::Context;
pub use elector::{ElectorSelector, RotatingElectorSelector};
pub use engine::ConsensusEngine;
pub use error::{ConsensusError, ConsensusResult};
pub use event::{
    Event, EventAPI, EventHash, EventTimestampMs, EventType, EventV1, Generation, OperationHash,
    SignedEvent, VerifiedEvent,
};
pub use gossip::{
    CreatorHeads, GossipClient, GossipRequest, GossipResponder, GossipResponse, GossipService,
};
pub use metrics::{initialise_metrics, Metrics, NodeMetrics};
pub use snapshot::HistorySnapshot;
pub use storage::{EventStore, MemStore};
