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

use bls12_381_plus::{G1Projective, Scalar};
use ff::Field;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use super::hash::{hash_to_point, ChallengeHash};
use super::params::CurveParameters;
use crate::errors::Error;
use crate::utils::util::{g1_to_bytes, random_scalar, ByteReader, ScalarExt};

/// Dual-base Schnorr proof of knowledge of `sk` such that `W = S^sk`, optionally
/// also proving `K = B^sk` for `B = HashToPoint(basename)`.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct SchnorrProof {
    pub(crate) c: Scalar,
    pub(crate) s: Scalar,
    pub(crate) n: Scalar,
    pub(crate) K: Option<G1Projective>,
}

/// `c' = H(E, S, W, [L, B, K], basename, message)`
pub(crate) fn challenge_prime(
    E: &G1Projective,
    S: &G1Projective,
    W: &G1Projective,
    linking: Option<(&G1Projective, &G1Projective, &G1Projective)>,
    basename: &[u8],
    message: &[u8],
) -> Scalar {
    let mut transcript = ChallengeHash::new().g1(E).g1(S).g1(W);
    if let Some((L, B, K)) = linking {
        transcript = transcript.g1(L).g1(B).g1(K);
    }
    transcript.bytes(basename).bytes(message).finalize()
}

/// `c = H(n, c')`
pub(crate) fn challenge(n: &Scalar, c_prime: &Scalar) -> Scalar {
    ChallengeHash::new().scalar(n).scalar(c_prime).finalize()
}

impl SchnorrProof {
    const FLAG_NO_K: u8 = 0;
    const FLAG_K: u8 = 1;

    pub fn c(&self) -> Scalar {
        self.c
    }

    pub fn s(&self) -> Scalar {
        self.s
    }

    pub fn n(&self) -> Scalar {
        self.n
    }

    /// Pseudonym `B^sk`, present iff the proof was made with a basename
    pub fn K(&self) -> Option<G1Projective> {
        self.K
    }

    /// # Description
    /// Proves knowledge of `sk` with `W = S^sk` bound to `message` and, when given,
    /// to `basename` through the pseudonym `K = HashToPoint(basename)^sk`.
    ///
    /// # Inputs:
    /// * `params` (REQUIRED), curve parameters.
    /// * `message` (REQUIRED), octet string the proof is bound to.
    /// * `basename` (OPTIONAL), linking base name.
    /// * `sk` (REQUIRED), the secret exponent.
    /// * `S`, `W` (REQUIRED), the public base and target, `W = S^sk`.
    /// * `rng` (REQUIRED), cryptographically secure random number generator.
    ///
    /// # Output:
    /// a [`SchnorrProof`], or [`Error::HashFailure`] if the basename cannot be mapped.
    pub fn prove<R: RngCore + CryptoRng>(
        params: &CurveParameters,
        message: &[u8],
        basename: Option<&[u8]>,
        sk: &Scalar,
        S: &G1Projective,
        W: &G1Projective,
        rng: &mut R,
    ) -> Result<Self, Error> {
        let r = random_scalar(rng);
        let E = S * r;

        let (c_prime, K) = match basename {
            Some(bsn) => {
                let B = hash_to_point(params, bsn)?.point;
                let L = B * r;
                let K = B * sk;
                (challenge_prime(&E, S, W, Some((&L, &B, &K)), bsn, message), Some(K))
            }
            None => (challenge_prime(&E, S, W, None, &[], message), None),
        };

        let n = Scalar::random(&mut *rng);
        let c = challenge(&n, &c_prime);
        let s = r + c * sk;

        Ok(Self { c, s, n, K })
    }

    /// # Description
    /// Recomputes `E' = S^s - W^c` (and `L' = B^s - K^c` with a basename) and checks
    /// the challenge.
    ///
    /// # Output:
    /// `Ok(())`, [`Error::InvalidProof`], or [`Error::HashFailure`] if the basename
    /// cannot be mapped.
    pub fn verify(
        &self,
        params: &CurveParameters,
        message: &[u8],
        basename: Option<&[u8]>,
        S: &G1Projective,
        W: &G1Projective,
    ) -> Result<(), Error> {
        let E = S * self.s - W * self.c;

        let c_prime = match (basename, self.K.as_ref()) {
            (Some(bsn), Some(K)) => {
                let B = hash_to_point(params, bsn)?.point;
                let L = B * self.s - K * self.c;
                challenge_prime(&E, S, W, Some((&L, &B, K)), bsn, message)
            }
            (None, None) => challenge_prime(&E, S, W, None, &[], message),
            _ => {
                log::debug!("schnorr proof rejected: pseudonym does not match basename usage");
                return Err(Error::InvalidProof);
            }
        };

        if challenge(&self.n, &c_prime) != self.c {
            return Err(Error::InvalidProof);
        }
        Ok(())
    }

    /// `c || s || n || flag || [K]`
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(Self::MAX_BYTES);
        bytes.extend_from_slice(&self.c.to_bytes_be());
        bytes.extend_from_slice(&self.s.to_bytes_be());
        bytes.extend_from_slice(&self.n.to_bytes_be());
        match &self.K {
            Some(K) => {
                bytes.push(Self::FLAG_K);
                bytes.extend_from_slice(&g1_to_bytes(K));
            }
            None => bytes.push(Self::FLAG_NO_K),
        }
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let mut reader = ByteReader::new(bytes);
        let proof = Self::read(&mut reader)?;
        reader.finish()?;
        Ok(proof)
    }

    pub(crate) const MAX_BYTES: usize = 3 * 32 + 1 + 48;

    pub(crate) fn read(reader: &mut ByteReader<'_>) -> Result<Self, Error> {
        let c = reader.scalar()?;
        let s = reader.scalar()?;
        let n = reader.scalar()?;
        let K = match reader.take_u8()? {
            Self::FLAG_NO_K => None,
            Self::FLAG_K => Some(reader.g1()?),
            flag => {
                return Err(Error::EncodingError(format!(
                    "invalid pseudonym flag {flag}"
                )))
            }
        };
        Ok(Self { c, s, n, K })
    }
}
