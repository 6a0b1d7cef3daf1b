// Copyright (c) Concord Contributors
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use concord_config::Committee;
use rand::{prelude::IteratorRandom as _, rngs::StdRng, SeedableRng as _};
use tracing::debug;

use crate::{commit::BlockHeight, context::Context};

/// Supplies the elector set per block height. Must be deterministic: a
/// function only of the block height and the ledger's configuration, so every
/// honest node derives the same committee.
pub trait ElectorSelector: Send + Sync {
    fn electors_for_block(&self, block_height: BlockHeight) -> Committee;
}

/// Default policy: draws `electors_per_height` members (or everyone) from the
/// node committee, seeding the draw with the block height.
pub struct RotatingElectorSelector {
    context: Arc<Context>,
}

impl RotatingElectorSelector {
    pub fn new(context: Arc<Context>) -> Self {
        Self { context }
    }
}

impl ElectorSelector for RotatingElectorSelector {
    fn electors_for_block(&self, block_height: BlockHeight) -> Committee {
        let committee = &self.context.committee;
        let count = self
            .context
            .parameters
            .electors_per_height
            .unwrap_or(committee.size())
            .min(committee.size());

        if count == committee.size() {
            return committee.clone();
        }

        let mut rng = StdRng::seed_from_u64(block_height);
        let chosen: Vec<_> = committee
            .electors()
            .map(|(_, id)| id.clone())
            .choose_multiple(&mut rng, count);
        let electors = Committee::new(chosen);
        debug!(
            "Selected {} electors for height {block_height}",
            electors.size()
        );
        electors
    }
}
