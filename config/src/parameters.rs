// Copyright (c) Concord Contributors
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Operator-tunable parameters of a ledger node. All fields have sensible
/// defaults, so a default-constructed value is usable in tests and local
/// deployments.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Parameters {
    /// Upper bound on the number of merge events admitted into one
    /// recent-history snapshot.
    #[serde(default = "Parameters::default_max_history_events")]
    pub max_history_events: usize,

    /// Maximum number of events returned in a single gossip response before
    /// the responder sets the `truncated` flag.
    #[serde(default = "Parameters::default_max_gossip_events")]
    pub max_gossip_events: usize,

    /// Time budget for one gossip exchange with a peer.
    #[serde(default = "Parameters::default_gossip_timeout")]
    pub gossip_timeout: Duration,

    /// Number of electors drawn per block height. `None` selects the whole
    /// committee.
    #[serde(default)]
    pub electors_per_height: Option<usize>,
}

impl Parameters {
    fn default_max_history_events() -> usize {
        10_000
    }

    fn default_max_gossip_events() -> usize {
        500
    }

    fn default_gossip_timeout() -> Duration {
        Duration::from_secs(5)
    }
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            max_history_events: Self::default_max_history_events(),
            max_gossip_events: Self::default_max_gossip_events(),
            gossip_timeout: Self::default_gossip_timeout(),
            electors_per_height: None,
        }
    }
}
