// Copyright 2025 Fondazione LINKS

// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at

//     http://www.apache.org/licenses/LICENSE-2.0

// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use bls12_381_plus::G2Projective;
use serde::{Deserialize, Serialize};

use crate::errors::Error;

/// Upper bound (inclusive) of the try-and-increment counter used by
/// [`hash_to_point`](super::hash::hash_to_point).
pub const HASH_TO_POINT_BOUND: u32 = 232;

/// Largest accepted counter bound: the counter is hashed as a signed 32 bit varint.
pub const MAX_HASH_TO_POINT_BOUND: u32 = i32::MAX as u32;

/// Immutable curve parameters shared by every ECDAA engine.
///
/// Every party of a deployment (issuer, members, verifiers and the TPM) must use the
/// same values, otherwise keys and credentials do not verify.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct CurveParameters {
    g2: G2Projective,
    hash_to_point_bound: u32,
}

impl Default for CurveParameters {
    fn default() -> Self {
        Self {
            g2: G2Projective::GENERATOR,
            hash_to_point_bound: HASH_TO_POINT_BOUND,
        }
    }
}

impl CurveParameters {
    pub fn new(g2: G2Projective, hash_to_point_bound: u32) -> Result<Self, Error> {
        if bool::from(g2.is_identity()) {
            return Err(Error::KeyGenError("G2 base point is the identity".to_owned()));
        }
        if hash_to_point_bound > MAX_HASH_TO_POINT_BOUND {
            return Err(Error::KeyGenError(format!(
                "hash to point bound {} exceeds {}",
                hash_to_point_bound, MAX_HASH_TO_POINT_BOUND
            )));
        }
        Ok(Self {
            g2,
            hash_to_point_bound,
        })
    }

    /// Base point of G2, the group the issuer keys live in
    pub fn g2(&self) -> G2Projective {
        self.g2
    }

    pub fn hash_to_point_bound(&self) -> u32 {
        self.hash_to_point_bound
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_uses_standard_generator() {
        let params = CurveParameters::default();
        assert_eq!(params.g2(), G2Projective::GENERATOR);
        assert_eq!(params.hash_to_point_bound(), 232);
    }

    #[test]
    fn identity_base_point_is_rejected() {
        assert!(CurveParameters::new(G2Projective::identity(), 232).is_err());
        assert!(CurveParameters::new(G2Projective::GENERATOR.double(), 10).is_ok());
    }

    #[test]
    fn oversized_bound_is_rejected() {
        assert!(CurveParameters::new(G2Projective::GENERATOR, MAX_HASH_TO_POINT_BOUND).is_ok());
        assert!(matches!(
            CurveParameters::new(G2Projective::GENERATOR, u32::MAX),
            Err(Error::KeyGenError(_))
        ));
    }
}
