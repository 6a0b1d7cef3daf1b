// Copyright (c) Concord Contributors
// SPDX-License-Identifier: Apache-2.0

mod committee;
mod crypto;
mod parameters;
mod test_committee;

pub use committee::*;
pub use crypto::*;
pub use parameters::*;
pub use test_committee::*;
