// Copyright (c) Concord Contributors
// SPDX-License-Identifier: Apache-2.0

use rand::{rngs::StdRng, SeedableRng};

use crate::{Committee, CreatorId, ProtocolKeyPair};

/// Creates a committee of the given size with deterministic identities and
/// keypairs, for tests and local clusters. Identities are single letters for
/// small committees so they line up with [`crate::ElectorIndex`] display.
pub fn local_committee_and_keys(seed: u64, size: usize) -> (Committee, Vec<(CreatorId, ProtocolKeyPair)>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut keys = Vec::with_capacity(size);
    for i in 0..size {
        let id = if i < 26 {
            CreatorId::new(((b'A' + i as u8) as char).to_string())
        } else {
            CreatorId::new(format!("node-{i:03}"))
        };
        keys.push((id, ProtocolKeyPair::generate(&mut rng)));
    }
    let committee = Committee::new(keys.iter().map(|(id, _)| id.clone()).collect());
    (committee, keys)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_committee() {
        let (committee, keys) = local_committee_and_keys(0, 4);
        assert_eq!(committee.size(), 4);
        assert_eq!(keys.len(), 4);
        for (id, _) in &keys {
            assert!(committee.contains(id));
        }

        // Same seed, same keys.
        let (_, keys_again) = local_committee_and_keys(0, 4);
        assert_eq!(
            keys[0].1.public().to_bytes(),
            keys_again[0].1.public().to_bytes()
        );
    }
}
