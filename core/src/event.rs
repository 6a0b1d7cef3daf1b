// Copyright (c) Concord Contributors
// SPDX-License-Identifier: Apache-2.0

use std::{
    sync::OnceLock,
    fmt,
    hash::{Hash, Hasher},
    ops::Deref,
};

use blake2::Digest as _;
use bytes::{Buf as _, Bytes};
use concord_config::{
    CreatorId, DefaultHashFunction, ProtocolKeyPair, ProtocolPublicKey, DIGEST_LENGTH,
};
use enum_dispatch::enum_dispatch;
use serde::{Deserialize, Serialize};

use crate::error::{ConsensusError, ConsensusResult};

/// 1-based position of a merge event along its creator's branch, counted
/// within the current non-consensus history.
pub type Generation = u32;

/// Timestamp carried by an event, milliseconds since the UNIX epoch.
pub type EventTimestampMs = u64;

/// Kind of an event in the ledger DAG. The consensus core only walks merge
/// events; regular and configuration events enter blocks through the
/// `parent_hash` sweep of the committer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    Regular,
    Merge,
    Configuration,
}

/// An event is a signed record in a node's DAG: either an operation-carrying
/// regular event or a merge event tying together the heads of other branches.
/// Well behaved creators extend their branch linearly, one merge event at a
/// time; byzantine creators can fork it.
#[derive(Clone, Deserialize, Serialize)]
#[enum_dispatch(EventAPI)]
pub enum Event {
    V1(EventV1),
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.digest() == other.digest()
    }
}

impl Eq for Event {}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Event {} {{ creator={}, type={:?}, parents({})={:?} }}",
            self.digest(),
            self.creator(),
            self.event_type(),
            self.parents().len(),
            self.parents(),
        )
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.digest())
    }
}

#[enum_dispatch]
pub trait EventAPI {
    fn digest(&self) -> EventHash;
    fn creator(&self) -> &CreatorId;
    fn event_type(&self) -> EventType;
    /// The creator's immediately prior merge event on its own branch. Absent
    /// only on the genesis event of a branch.
    fn tree_hash(&self) -> Option<&EventHash>;
    /// Unordered ancestor hashes. For merge events this includes the tree
    /// hash.
    fn parents(&self) -> &[EventHash];
    fn operations(&self) -> &[OperationHash];
    fn timestamp_ms(&self) -> EventTimestampMs;
}

#[derive(Clone, Deserialize, Serialize)]
pub struct EventV1 {
    creator: CreatorId,
    event_type: EventType,
    tree_hash: Option<EventHash>,
    parents: Vec<EventHash>,
    operations: Vec<OperationHash>,
    timestamp_ms: EventTimestampMs,

    #[serde(skip)]
    digest: OnceLock<EventHash>,
}

impl EventV1 {
    pub fn new(
        creator: CreatorId,
        event_type: EventType,
        tree_hash: Option<EventHash>,
        parents: Vec<EventHash>,
        operations: Vec<OperationHash>,
        timestamp_ms: EventTimestampMs,
    ) -> Self {
        Self {
            creator,
            event_type,
            tree_hash,
            parents,
            operations,
            timestamp_ms,
            digest: OnceLock::new(),
        }
    }
}

impl EventAPI for EventV1 {
    fn digest(&self) -> EventHash {
        *self.digest.get_or_init(|| {
            let mut hasher = DefaultHashFunction::new();
            hasher.update(bcs::to_bytes(&self).expect("Serialization should not fail"));
            EventHash(hasher.finalize().into())
        })
    }

    fn creator(&self) -> &CreatorId {
        &self.creator
    }

    fn event_type(&self) -> EventType {
        self.event_type
    }

    fn tree_hash(&self) -> Option<&EventHash> {
        self.tree_hash.as_ref()
    }

    fn parents(&self) -> &[EventHash] {
        &self.parents
    }

    fn operations(&self) -> &[OperationHash] {
        &self.operations
    }

    fn timestamp_ms(&self) -> EventTimestampMs {
        self.timestamp_ms
    }
}

/// Content address of an event, covering all fields except the signature.
#[derive(Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct EventHash([u8; DIGEST_LENGTH]);

impl EventHash {
    pub fn new(bytes: [u8; DIGEST_LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl Hash for EventHash {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write(&self.0[..8]);
    }
}

impl fmt::Display for EventHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        write!(
            f,
            "{}",
            base64::Engine::encode(&base64::engine::general_purpose::STANDARD, self.0)
                .get(0..4)
                .ok_or(fmt::Error)?
        )
    }
}

impl fmt::Debug for EventHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        write!(
            f,
            "{}",
            base64::Engine::encode(&base64::engine::general_purpose::STANDARD, self.0)
        )
    }
}

/// Hash of a user operation carried by a regular event. Opaque to the core.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OperationHash(pub [u8; DIGEST_LENGTH]);

/// Unverified event as it arrives from a peer. Only allows limited access to
/// its content until the signature checks out.
#[derive(Deserialize, Serialize)]
pub struct SignedEvent {
    event: Event,
    signature: Bytes,

    #[serde(skip)]
    serialized: Bytes,
}

impl SignedEvent {
    pub fn new(event: Event, keypair: &ProtocolKeyPair) -> Self {
        let message = bcs::to_bytes(&event).expect("Serialization should not fail");
        let signature: Bytes = keypair.sign(&message).to_vec().into();
        let serialized: Bytes = bcs::to_bytes(&(&event, &signature))
            .expect("Serialization should not fail")
            .into();
        Self {
            event,
            signature,
            serialized,
        }
    }

    /// Parses a serialized event received over the network.
    pub fn parse(serialized: Bytes) -> ConsensusResult<Self> {
        let mut signed: SignedEvent = bcs::from_bytes(serialized.chunk())?;
        signed.serialized = serialized;
        Ok(signed)
    }

    pub fn digest(&self) -> EventHash {
        self.event.digest()
    }

    pub fn serialized(&self) -> &Bytes {
        &self.serialized
    }

    /// Checks the signature against the creator's public key and, on success,
    /// upgrades to a [`VerifiedEvent`]. Must happen before an event enters a
    /// history snapshot.
    pub fn verify(self, public_key: &ProtocolPublicKey) -> ConsensusResult<VerifiedEvent> {
        let message = bcs::to_bytes(&self.event).expect("Serialization should not fail");
        public_key
            .verify(&message, &self.signature)
            .map_err(|_| ConsensusError::InvalidSignature {
                event: self.event.digest(),
            })?;
        Ok(VerifiedEvent {
            event: self.event,
            signature: self.signature,
            serialized: self.serialized,
        })
    }
}

/// Verified event allows full access to its content.
#[derive(Clone, Deserialize, PartialEq)]
pub struct VerifiedEvent {
    event: Event,
    signature: Bytes,

    #[serde(skip)]
    serialized: Bytes,
}

impl VerifiedEvent {
    /// Parses a serialized event from storage, where the event has been
    /// verified. This should never be called on unverified data received over
    /// the network.
    pub fn parse_from_storage(serialized: Bytes) -> ConsensusResult<Self> {
        let mut event: VerifiedEvent = bcs::from_bytes(serialized.chunk())?;
        event.serialized = serialized;
        Ok(event)
    }

    pub fn serialized(&self) -> &Bytes {
        &self.serialized
    }

    pub fn new_for_test(event: Event) -> Self {
        let serialized: Bytes = bcs::to_bytes(&(&event, Bytes::default()))
            .expect("Serialization should not fail")
            .into();
        VerifiedEvent {
            event,
            signature: Default::default(),
            serialized,
        }
    }
}

impl Deref for VerifiedEvent {
    type Target = Event;

    fn deref(&self) -> &Self::Target {
        &self.event
    }
}

impl fmt::Display for VerifiedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "{}", self.event.digest())
    }
}

impl fmt::Debug for VerifiedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "{:?}(v)", self.event)
    }
}

/// Creates events for testing.
#[cfg(test)]
pub(crate) struct TestEvent {
    event: EventV1,
}

#[cfg(test)]
impl TestEvent {
    pub(crate) fn new(creator: &str) -> Self {
        Self {
            event: EventV1::new(
                CreatorId::from(creator),
                EventType::Merge,
                None,
                vec![],
                vec![],
                0,
            ),
        }
    }

    pub(crate) fn set_event_type(mut self, event_type: EventType) -> Self {
        self.event.event_type = event_type;
        self
    }

    pub(crate) fn set_tree_hash(mut self, tree_hash: EventHash) -> Self {
        self.event.tree_hash = Some(tree_hash);
        if !self.event.parents.contains(&tree_hash) {
            self.event.parents.push(tree_hash);
        }
        self
    }

    pub(crate) fn set_parents(mut self, parents: Vec<EventHash>) -> Self {
        self.event.parents = parents;
        if let Some(tree_hash) = self.event.tree_hash {
            if !self.event.parents.contains(&tree_hash) {
                self.event.parents.push(tree_hash);
            }
        }
        self
    }

    pub(crate) fn set_operations(mut self, operations: Vec<OperationHash>) -> Self {
        self.event.operations = operations;
        self
    }

    pub(crate) fn set_timestamp_ms(mut self, timestamp_ms: EventTimestampMs) -> Self {
        self.event.timestamp_ms = timestamp_ms;
        self
    }

    pub(crate) fn build(self) -> Event {
        Event::V1(self.event)
    }
}
