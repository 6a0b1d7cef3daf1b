// Copyright (c) Concord Contributors
// SPDX-License-Identifier: Apache-2.0

use concord_config::CreatorId;
use thiserror::Error;

use crate::event::EventHash;

/// Errors that can occur when building a history snapshot, deciding on it, or
/// talking to the event store and gossip layers.
///
/// A snapshot that fails one of the structural checks is fatal for that
/// snapshot; retrying `decide` on it cannot succeed. Byzantine electors are
/// not errors: they are excluded from the decision and reported through
/// [`crate::commit::DecisionOutcome`].
#[derive(Clone, Debug, Error)]
pub enum ConsensusError {
    #[error("history contains a cycle through event {event}")]
    CyclicHistory { event: EventHash },

    #[error("merge event {event} does not list its tree parent among its parents")]
    TreeParentNotInParents { event: EventHash },

    #[error("event {event} has no creator")]
    MissingCreator { event: EventHash },

    #[error("snapshot of {events} events exceeds the configured cap of {cap}")]
    HistoryTooLarge { events: usize, cap: usize },

    #[error("invalid signature on event {event}")]
    InvalidSignature { event: EventHash },

    #[error("malformed serialized event: {0}")]
    MalformedEvent(String),

    #[error("event store failure: {0}")]
    StoreFailure(String),

    #[error("gossip failure with peer {peer}: {reason}")]
    GossipFailure { peer: CreatorId, reason: String },
}

impl From<bcs::Error> for ConsensusError {
    fn from(err: bcs::Error) -> Self {
        ConsensusError::MalformedEvent(err.to_string())
    }
}

pub type ConsensusResult<T> = Result<T, ConsensusError>;
