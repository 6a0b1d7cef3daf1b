// Copyright (c) Concord Contributors
// SPDX-License-Identifier: Apache-2.0

use concord_config::CreatorId;
use serde::{Deserialize, Serialize};

use crate::event::EventHash;

/// Height of the next block to be decided. The first block after genesis has
/// height 1.
pub type BlockHeight = u64;

/// One consensus decision: the events of the next block and the merge events
/// proving their endorsement by a supermajority of electors.
///
/// Both collections are deduplicated and sorted lexicographically by hash, so
/// two honest nodes deciding on hash-equal snapshots produce bitwise
/// identical decisions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    /// Height this decision was made for.
    pub block_height: BlockHeight,
    /// Hashes of all events committed into the block: the closed ancestries
    /// of the decided proof events, regular events included.
    pub event_hashes: Vec<EventHash>,
    /// Hashes of the merge events establishing the supermajority endorsement.
    pub consensus_proof_hashes: Vec<EventHash>,
}

/// Result of one `decide` attempt. `decision` is `None` when the history does
/// not yet support consensus; the caller gossips and retries later.
/// Detected byzantine electors are reported here for telemetry either way.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DecisionOutcome {
    pub decision: Option<Decision>,
    pub byzantine_electors: Vec<CreatorId>,
}

impl DecisionOutcome {
    pub fn decided(&self) -> bool {
        self.decision.is_some()
    }
}
