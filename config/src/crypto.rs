// Copyright (c) Concord Contributors
// SPDX-License-Identifier: Apache-2.0

use blake2::digest::consts::U32;
use ed25519_dalek::{Signer as _, Verifier as _};
use rand::{CryptoRng, RngCore};

/// Length in bytes of an event hash.
pub const DIGEST_LENGTH: usize = 32;

/// Hash function used for content-addressing events.
pub type DefaultHashFunction = blake2::Blake2b<U32>;

/// Ed25519 keypair an elector signs its events with.
pub struct ProtocolKeyPair(ed25519_dalek::SigningKey);

impl ProtocolKeyPair {
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        Self(ed25519_dalek::SigningKey::generate(rng))
    }

    pub fn from_bytes(bytes: &[u8; 32]) -> Self {
        Self(ed25519_dalek::SigningKey::from_bytes(bytes))
    }

    pub fn public(&self) -> ProtocolPublicKey {
        ProtocolPublicKey(self.0.verifying_key())
    }

    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.0.sign(message).to_bytes()
    }
}

/// Public half of a [`ProtocolKeyPair`], distributed with the committee.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProtocolPublicKey(ed25519_dalek::VerifyingKey);

impl ProtocolPublicKey {
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self, ed25519_dalek::SignatureError> {
        Ok(Self(ed25519_dalek::VerifyingKey::from_bytes(bytes)?))
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }

    pub fn verify(
        &self,
        message: &[u8],
        signature: &[u8],
    ) -> Result<(), ed25519_dalek::SignatureError> {
        let signature = ed25519_dalek::Signature::from_slice(signature)?;
        self.0.verify(message, &signature)
    }
}
