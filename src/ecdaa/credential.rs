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

use bls12_381_plus::{multi_miller_loop, G1Projective, G2Prepared, Gt, Scalar};
use elliptic_curve::group::Curve;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use super::keys::{IssuerPublicKey, IssuerSecretKey};
use super::params::CurveParameters;
use crate::errors::Error;
use crate::utils::util::{g1_to_bytes, random_scalar, ByteReader, G1_BYTES};

/// Membership credential `(A, B, C, D)` issued over the member key `Q = B^sk`,
/// with `A = B^(1/y)`, `C = (A + Q)^x` and `D = Q`.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Credential {
    pub(crate) A: G1Projective,
    pub(crate) B: G1Projective,
    pub(crate) C: G1Projective,
    pub(crate) D: G1Projective,
}

impl Credential {
    pub const BYTES: usize = 4 * G1_BYTES;

    pub fn A(&self) -> G1Projective {
        self.A
    }

    pub fn B(&self) -> G1Projective {
        self.B
    }

    pub fn C(&self) -> G1Projective {
        self.C
    }

    pub fn D(&self) -> G1Projective {
        self.D
    }

    /// # Description
    /// Issues a credential on the member key `Q` for the base `B`. The join proof
    /// must be checked by the caller before.
    ///
    /// # Inputs:
    /// * `isk` (REQUIRED), issuer secret key.
    /// * `B` (REQUIRED), join base point.
    /// * `Q` (REQUIRED), member public key, `Q = B^sk`.
    ///
    /// # Output:
    /// a new [`Credential`].
    pub fn issue(isk: &IssuerSecretKey, B: &G1Projective, Q: &G1Projective) -> Result<Self, Error> {
        let y_inv = Option::<Scalar>::from(isk.y.invert())
            .ok_or_else(|| Error::KeyGenError("issuer secret y is not invertible".to_owned()))?;
        let A = B * y_inv;
        let C = (A + Q) * isk.x;

        Ok(Self { A, B: *B, C, D: *Q })
    }

    /// # Description
    /// Checks `e(Y, A) == e(g2, B)` and `e(g2, C) == e(X, A + D)`. A credential with
    /// `A` or `B` at infinity is never valid.
    ///
    /// # Output:
    /// `Ok(())` or [`Error::InvalidCredential`].
    pub fn verify(&self, params: &CurveParameters, ipk: &IssuerPublicKey) -> Result<(), Error> {
        if bool::from(self.A.is_identity()) || bool::from(self.B.is_identity()) {
            return Err(Error::InvalidCredential);
        }

        let identity_GT = Gt::IDENTITY;
        let g2 = params.g2();

        // e(A, Y) * e(B, -g2)
        let term1 = (&self.A.to_affine(), &G2Prepared::from(ipk.Y.to_affine()));
        let term2 = (&self.B.to_affine(), &G2Prepared::from(-g2.to_affine()));
        let pairing1 = multi_miller_loop(&[term1, term2]).final_exponentiation();

        // e(C, g2) * e(A + D, -X)
        let term3 = (&self.C.to_affine(), &G2Prepared::from(g2.to_affine()));
        let term4 = (&(self.A + self.D).to_affine(), &G2Prepared::from(-ipk.X.to_affine()));
        let pairing2 = multi_miller_loop(&[term3, term4]).final_exponentiation();

        if pairing1 == identity_GT && pairing2 == identity_GT {
            Ok(())
        } else {
            Err(Error::InvalidCredential)
        }
    }

    /// # Description
    /// Raises all four points to a fresh random non-zero `l`, giving an unlinkable
    /// credential which verifies under the same issuer key.
    pub fn randomize<R: RngCore + CryptoRng>(&self, rng: &mut R) -> Self {
        let l = random_scalar(rng);
        Self {
            A: self.A * l,
            B: self.B * l,
            C: self.C * l,
            D: self.D * l,
        }
    }

    /// `A || B || C || D`, compressed
    pub fn to_bytes(&self) -> [u8; Self::BYTES] {
        let mut bytes = [0u8; Self::BYTES];
        for (i, point) in [&self.A, &self.B, &self.C, &self.D].into_iter().enumerate() {
            bytes[i * G1_BYTES..(i + 1) * G1_BYTES].copy_from_slice(&g1_to_bytes(point));
        }
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let mut reader = ByteReader::new(bytes);
        let credential = Self::read(&mut reader)?;
        reader.finish()?;
        Ok(credential)
    }

    pub(crate) fn read(reader: &mut ByteReader<'_>) -> Result<Self, Error> {
        Ok(Self {
            A: reader.g1()?,
            B: reader.g1()?,
            C: reader.g1()?,
            D: reader.g1()?,
        })
    }
}
