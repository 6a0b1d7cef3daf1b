// Copyright (c) Concord Contributors
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use concord_config::{Committee, Parameters};
#[cfg(test)]
use concord_config::{CreatorId, ProtocolKeyPair};

#[cfg(test)]
use crate::metrics::test_metrics;
use crate::metrics::Metrics;

/// Context contains the configuration and metrics shared by all components of
/// one ledger node.
#[derive(Clone)]
pub struct Context {
    /// All known creators eligible for elector selection.
    pub committee: Committee,
    /// Parameters of this node.
    pub parameters: Parameters,
    /// Metrics of this node.
    pub metrics: Arc<Metrics>,
}

impl Context {
    pub fn new(committee: Committee, parameters: Parameters, metrics: Arc<Metrics>) -> Self {
        Self {
            committee,
            parameters,
            metrics,
        }
    }

    /// Create a test context with a committee of the given size.
    #[cfg(test)]
    pub(crate) fn new_for_test(committee_size: usize) -> (Self, Vec<(CreatorId, ProtocolKeyPair)>) {
        let (committee, keys) = concord_config::local_committee_and_keys(0, committee_size);
        let context = Context::new(committee, Parameters::default(), test_metrics());
        (context, keys)
    }

    #[cfg(test)]
    pub(crate) fn with_parameters(mut self, parameters: Parameters) -> Self {
        self.parameters = parameters;
        self
    }
}
