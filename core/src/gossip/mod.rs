// Copyright (c) Concord Contributors
// SPDX-License-Identifier: Apache-2.0

use std::{collections::BTreeMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use concord_config::CreatorId;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    context::Context,
    error::ConsensusResult,
    event::{EventHash, Generation},
    storage::EventStore,
};

/// Per-creator latest-known merge-event generations, the anti-entropy
/// currency of gossip: a peer returns the events the caller's heads miss.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatorHeads {
    pub heads: BTreeMap<CreatorId, Generation>,
}

/// One gossip exchange request. `event_hash` optionally announces the
/// caller's newest event.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GossipRequest {
    pub event_hash: Option<EventHash>,
    pub creator_heads: CreatorHeads,
}

/// Response to a gossip exchange: the responder's heads and the serialized
/// events the caller lacks. `truncated` signals the caller should come back
/// for more.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GossipResponse {
    pub creator_heads: CreatorHeads,
    pub history: Vec<Bytes>,
    pub truncated: bool,
}

/// Client side of gossip, implemented by the transport layer.
///
/// The timeout parameter helps saving resources at client and potentially
/// server, but it is up to the transport whether it is honored.
#[async_trait]
pub trait GossipClient: Send + Sync + 'static {
    async fn exchange(
        &self,
        peer: &CreatorId,
        request: GossipRequest,
        timeout: Duration,
    ) -> ConsensusResult<GossipResponse>;
}

/// Server side of gossip, handling exchanges from peers.
#[async_trait]
pub trait GossipService: Send + Sync + 'static {
    async fn handle_exchange(
        &self,
        peer: &CreatorId,
        request: GossipRequest,
    ) -> ConsensusResult<GossipResponse>;
}

/// Store-backed [`GossipService`]: answers an exchange with the events whose
/// generations lie beyond the caller's heads, truncated at the configured
/// budget. Transport-agnostic; a server wires it behind whatever RPC layer it
/// uses.
pub struct GossipResponder<S: EventStore> {
    context: Arc<Context>,
    store: Arc<S>,
}

impl<S: EventStore + 'static> GossipResponder<S> {
    pub fn new(context: Arc<Context>, store: Arc<S>) -> Self {
        Self { context, store }
    }
}

#[async_trait]
impl<S: EventStore + 'static> GossipService for GossipResponder<S> {
    async fn handle_exchange(
        &self,
        peer: &CreatorId,
        request: GossipRequest,
    ) -> ConsensusResult<GossipResponse> {
        let budget = self.context.parameters.max_gossip_events;
        let own_heads = self.store.creator_heads()?;

        let mut history = Vec::new();
        let mut truncated = false;
        'creators: for (creator, &head) in &own_heads {
            let known = request
                .creator_heads
                .heads
                .get(creator)
                .copied()
                .unwrap_or(0);
            if known >= head {
                continue;
            }
            for event in self.store.scan_events_by_creator(creator, known)? {
                if history.len() >= budget {
                    truncated = true;
                    break 'creators;
                }
                history.push(event.serialized().clone());
            }
        }

        debug!(
            "Returning {} events to {peer}, truncated: {truncated}",
            history.len()
        );
        Ok(GossipResponse {
            creator_heads: CreatorHeads { heads: own_heads },
            history,
            truncated,
        })
    }
}
