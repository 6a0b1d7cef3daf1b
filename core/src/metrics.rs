// Copyright (c) Concord Contributors
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use prometheus::{
    register_histogram_with_registry, register_int_counter_vec_with_registry,
    register_int_counter_with_registry, Histogram, IntCounter, IntCounterVec, Registry,
};

pub struct Metrics {
    pub node_metrics: NodeMetrics,
}

pub fn initialise_metrics(registry: Registry) -> Arc<Metrics> {
    let node_metrics = NodeMetrics::new(&registry);

    Arc::new(Metrics { node_metrics })
}

#[cfg(test)]
pub(crate) fn test_metrics() -> Arc<Metrics> {
    initialise_metrics(Registry::new())
}

pub struct NodeMetrics {
    pub decisions_total: IntCounter,
    pub no_consensus_total: IntCounter,
    pub byzantine_electors_total: IntCounterVec,
    pub precommits_created_total: IntCounter,
    pub precommits_rejected_total: IntCounter,
    pub snapshot_events: Histogram,
    pub committed_events_per_decision: Histogram,
    pub proof_events_per_decision: Histogram,
    pub decide_latency: Histogram,
}

impl NodeMetrics {
    pub fn new(registry: &Registry) -> Self {
        Self {
            decisions_total: register_int_counter_with_registry!(
                "decisions_total",
                "Number of decide calls that reached consensus",
                registry,
            )
            .unwrap(),
            no_consensus_total: register_int_counter_with_registry!(
                "no_consensus_total",
                "Number of decide calls that ended without consensus",
                registry,
            )
            .unwrap(),
            byzantine_electors_total: register_int_counter_vec_with_registry!(
                "byzantine_electors_total",
                "Byzantine behavior detections per elector. An elector forking its branch is counted once per decide call.",
                &["elector"],
                registry,
            )
            .unwrap(),
            precommits_created_total: register_int_counter_with_registry!(
                "precommits_created_total",
                "Number of precommits created while walking elector branches",
                registry,
            )
            .unwrap(),
            precommits_rejected_total: register_int_counter_with_registry!(
                "precommits_rejected_total",
                "Number of precommits rejected because branch support moved on",
                registry,
            )
            .unwrap(),
            snapshot_events: register_histogram_with_registry!(
                "snapshot_events",
                "Number of merge events per history snapshot handed to decide",
                registry,
            )
            .unwrap(),
            committed_events_per_decision: register_histogram_with_registry!(
                "committed_events_per_decision",
                "Number of event hashes committed per decision",
                registry,
            )
            .unwrap(),
            proof_events_per_decision: register_histogram_with_registry!(
                "proof_events_per_decision",
                "Number of consensus proof hashes per decision",
                registry,
            )
            .unwrap(),
            decide_latency: register_histogram_with_registry!(
                "decide_latency",
                "Wall time of one decide call in seconds",
                registry,
            )
            .unwrap(),
        }
    }
}
