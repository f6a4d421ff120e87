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

use bls12_381_plus::{G1Affine, G1Projective, G2Projective, Scalar};
use digest::Digest;
use elliptic_curve::{group::cofactor::CofactorGroup, Group};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use super::params::CurveParameters;
use crate::errors::Error;
use crate::utils::util::{g1_to_bytes, g2_to_bytes, varint, ScalarExt, FP_BYTES, G1_BYTES};

/// Fiat-Shamir transcript: canonical encodings of the inputs are concatenated,
/// hashed with SHA-256 and reduced modulo the group order.
///
/// Points are written compressed, scalars as 32 big-endian bytes, byte strings verbatim.
#[derive(Clone, Debug, Default)]
pub struct ChallengeHash {
    buffer: Vec<u8>,
}

impl ChallengeHash {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn g1(mut self, point: &G1Projective) -> Self {
        self.buffer.extend_from_slice(&g1_to_bytes(point));
        self
    }

    pub fn g2(mut self, point: &G2Projective) -> Self {
        self.buffer.extend_from_slice(&g2_to_bytes(point));
        self
    }

    pub fn scalar(mut self, scalar: &Scalar) -> Self {
        self.buffer.extend_from_slice(&scalar.to_bytes_be());
        self
    }

    pub fn bytes(mut self, data: &[u8]) -> Self {
        self.buffer.extend_from_slice(data);
        self
    }

    /// Raw SHA-256 digest of the transcript
    pub fn digest(&self) -> [u8; 32] {
        Sha256::digest(&self.buffer).into()
    }

    pub fn finalize(&self) -> Scalar {
        hash_to_scalar(&self.buffer)
    }
}

/// # Description
/// SHA-256 of `data`, interpreted as a big-endian integer and reduced modulo r.
pub fn hash_to_scalar(data: &[u8]) -> Scalar {
    let digest = Sha256::digest(data);
    let mut okm = [0u8; 48];
    okm[16..].copy_from_slice(&digest);
    Scalar::from_okm(&okm)
}

/// A point obtained by [`hash_to_point`], together with what a constrained party
/// (a TPM) needs to rebuild it in one step.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct HashedPoint {
    pub point: G1Projective,
    /// Value of the counter that produced the point
    pub index: u32,
    /// y-coordinate of the candidate point, before clearing the cofactor
    #[serde(with = "crate::utils::util::serde_fp")]
    pub y2: [u8; FP_BYTES],
}

impl HashedPoint {
    /// `s2 = varint(index) || seed`, the string whose hash is the x-coordinate
    /// of the candidate point.
    pub fn s2(&self, seed: &[u8]) -> Vec<u8> {
        [&varint(self.index)[..], seed].concat()
    }
}

fn candidate_x(s2: &[u8]) -> [u8; FP_BYTES] {
    let x = hash_to_scalar(s2).to_bytes_be();
    let mut out = [0u8; FP_BYTES];
    out[FP_BYTES - x.len()..].copy_from_slice(&x);
    out
}

/// https://fidoalliance.org/specs/fido-v2.0-id-20180227/fido-ecdaa-algorithm-v2.0-id-20180227.html#hash-to-point
///
/// # Description
/// Deterministic try-and-increment map from an octet string to a point of G1
/// ("BigNumberToB"). For `i = 0..=bound`, `x = H(varint(i) || seed)` is tried as
/// the x-coordinate of a point (the root with the smaller y is taken), the cofactor
/// is cleared and the first non-identity result is returned.
///
/// # Inputs:
/// * `params` (REQUIRED), curve parameters, giving the iteration bound.
/// * `seed` (REQUIRED), an octet string.
///
/// # Output:
/// a [`HashedPoint`] or [`Error::HashFailure`] if no counter value up to the bound works.
pub fn hash_to_point(params: &CurveParameters, seed: &[u8]) -> Result<HashedPoint, Error> {
    for i in 0..=params.hash_to_point_bound() {
        let s2 = [&varint(i)[..], seed].concat();
        let mut compressed = [0u8; G1_BYTES];
        compressed.copy_from_slice(&candidate_x(&s2));
        // compression flag set, infinity and sort flags cleared
        compressed[0] |= 0x80;

        let candidate = match Option::<G1Affine>::from(G1Affine::from_compressed_unchecked(&compressed)) {
            Some(candidate) => candidate,
            None => continue,
        };

        let point = G1Projective::from(candidate).clear_cofactor();
        if bool::from(point.is_identity()) {
            continue;
        }

        let mut y2 = [0u8; FP_BYTES];
        y2.copy_from_slice(&candidate.to_uncompressed()[FP_BYTES..]);

        log::debug!("hash_to_point: point found after {} iteration(s)", i + 1);
        return Ok(HashedPoint { point, index: i, y2 });
    }

    log::warn!(
        "hash_to_point: no point found within {} iterations",
        params.hash_to_point_bound().saturating_add(1)
    );
    Err(Error::HashFailure)
}

/// # Description
/// Rebuilds the point of [`hash_to_point`] from `s2 = varint(i) || seed` and the
/// y-coordinate `y2` of the candidate, without searching.
///
/// # Inputs:
/// * `s2` (REQUIRED), counter-prefixed seed.
/// * `y2` (REQUIRED), big-endian y-coordinate of the candidate point.
///
/// # Output:
/// the point of G1, or [`Error::EncodingError`] if `(H(s2), y2)` is not a valid
/// candidate.
pub fn point_from_seed(s2: &[u8], y2: &[u8; FP_BYTES]) -> Result<G1Projective, Error> {
    let mut uncompressed = [0u8; 2 * FP_BYTES];
    uncompressed[..FP_BYTES].copy_from_slice(&candidate_x(s2));
    uncompressed[FP_BYTES..].copy_from_slice(y2);

    let candidate = Option::<G1Affine>::from(G1Affine::from_uncompressed_unchecked(&uncompressed))
        .filter(|p| bool::from(p.is_on_curve()))
        .ok_or_else(|| Error::EncodingError("seed does not describe a curve point".to_owned()))?;

    let point = G1Projective::from(candidate).clear_cofactor();
    if bool::from(point.is_identity()) {
        return Err(Error::EncodingError("seed maps to the identity".to_owned()));
    }
    Ok(point)
}

#[cfg(test)]
mod tests {
    use super::*;
    use elliptic_curve::group::Curve;

    #[test]
    fn hash_to_point_is_deterministic() {
        let params = CurveParameters::default();
        let h1 = hash_to_point(&params, b"fuga").unwrap();
        let h2 = hash_to_point(&params, b"fuga").unwrap();
        assert_eq!(h1, h2);

        let other = hash_to_point(&params, b"fuga3").unwrap();
        assert_ne!(h1.point, other.point);
    }

    #[test]
    fn hashed_point_is_in_the_prime_order_subgroup() {
        let params = CurveParameters::default();
        let h = hash_to_point(&params, b"hoge").unwrap();
        assert!(bool::from(h.point.to_affine().is_torsion_free()));
    }

    #[test]
    fn point_from_seed_rebuilds_the_hashed_point() {
        let params = CurveParameters::default();
        for seed in [&b""[..], b"fuga", b"a longer basename used for linking"] {
            let h = hash_to_point(&params, seed).unwrap();
            let rebuilt = point_from_seed(&h.s2(seed), &h.y2).unwrap();
            assert_eq!(rebuilt, h.point);
        }
    }

    #[test]
    fn point_from_seed_rejects_a_foreign_y() {
        let params = CurveParameters::default();
        let h = hash_to_point(&params, b"fuga").unwrap();
        let mut y2 = h.y2;
        y2[FP_BYTES - 1] ^= 1;
        assert!(matches!(
            point_from_seed(&h.s2(b"fuga"), &y2),
            Err(Error::EncodingError(_))
        ));
    }

    #[test]
    fn exhausted_counter_is_a_hash_failure() {
        // "fuga" needs three attempts
        let params = CurveParameters::new(G2Projective::GENERATOR, 1).unwrap();
        assert_eq!(hash_to_point(&params, b"fuga"), Err(Error::HashFailure));

        let params = CurveParameters::new(G2Projective::GENERATOR, 2).unwrap();
        assert_eq!(hash_to_point(&params, b"fuga").unwrap().index, 2);
    }

    #[test]
    fn challenge_hash_concatenates_in_order() {
        let a = ChallengeHash::new().bytes(b"ab").bytes(b"c").finalize();
        let b = ChallengeHash::new().bytes(b"abc").finalize();
        let c = ChallengeHash::new().bytes(b"c").bytes(b"ab").finalize();
        assert_eq!(a, b);
        assert_ne!(a, c);

        let s = Scalar::from(7u64);
        let with_scalar = ChallengeHash::new().scalar(&s).finalize();
        assert_eq!(with_scalar, hash_to_scalar(&s.to_bytes_be()));
    }
}
