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

use bls12_381_plus::{G2Projective, Scalar};
use ff::Field;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use super::hash::ChallengeHash;
use super::params::CurveParameters;
use crate::errors::Error;
use crate::keys::pair::KeyPair;
use crate::keys::traits::{PrivateKey, PublicKey};
use crate::utils::util::{g2_to_bytes, random_scalar, ByteReader, ScalarExt, G2_BYTES, SCALAR_BYTES};

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct IssuerSecretKey {
    pub(crate) x: Scalar,
    pub(crate) y: Scalar,
}

impl IssuerSecretKey {
    pub const BYTES: usize = 2 * SCALAR_BYTES;

    pub fn new(x: Scalar, y: Scalar) -> Result<Self, Error> {
        if bool::from(x.is_zero()) || bool::from(y.is_zero()) {
            return Err(Error::KeyGenError("issuer secret scalars must be non-zero".to_owned()));
        }
        Ok(Self { x, y })
    }

    /// `x || y`, big-endian
    pub fn to_bytes(&self) -> [u8; Self::BYTES] {
        let mut bytes = [0u8; Self::BYTES];
        bytes[..SCALAR_BYTES].copy_from_slice(&self.x.to_bytes_be());
        bytes[SCALAR_BYTES..].copy_from_slice(&self.y.to_bytes_be());
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let mut reader = ByteReader::new(bytes);
        let x = reader.scalar()?;
        let y = reader.scalar()?;
        reader.finish()?;
        Self::new(x, y).map_err(|_| Error::EncodingError("zero issuer secret scalar".to_owned()))
    }

    pub fn encode(&self) -> String {
        hex::encode(self.to_bytes())
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct IssuerPublicKey {
    pub(crate) X: G2Projective,
    pub(crate) Y: G2Projective,
    pub(crate) c: Scalar,
    pub(crate) sx: Scalar,
    pub(crate) sy: Scalar,
}

impl IssuerPublicKey {
    pub const BYTES: usize = 2 * G2_BYTES + 3 * SCALAR_BYTES;

    pub fn X(&self) -> G2Projective {
        self.X
    }

    pub fn Y(&self) -> G2Projective {
        self.Y
    }

    /// # Description
    /// Checks the proof of knowledge of `(x, y)` carried by the key:
    /// `Ux' = g2^sx - X^c`, `Uy' = g2^sy - Y^c`, then `c == H(Ux', Uy', g2, X, Y)`.
    ///
    /// # Inputs:
    /// * `params` (REQUIRED), curve parameters the key was generated with.
    ///
    /// # Output:
    /// `Ok(())` or [`Error::InvalidIssuerKey`].
    pub fn verify(&self, params: &CurveParameters) -> Result<(), Error> {
        let g2 = params.g2();
        if bool::from(self.X.is_identity()) || bool::from(self.Y.is_identity()) {
            return Err(Error::InvalidIssuerKey);
        }

        let Ux = g2 * self.sx - self.X * self.c;
        let Uy = g2 * self.sy - self.Y * self.c;
        let c = issuer_challenge(&Ux, &Uy, &g2, &self.X, &self.Y);

        if c != self.c {
            log::warn!("issuer public key rejected: challenge mismatch");
            return Err(Error::InvalidIssuerKey);
        }
        Ok(())
    }

    /// `X || Y || c || sx || sy`
    pub fn to_bytes(&self) -> [u8; Self::BYTES] {
        let mut bytes = [0u8; Self::BYTES];
        let mut offset = 0;
        for point in [&self.X, &self.Y] {
            bytes[offset..offset + G2_BYTES].copy_from_slice(&g2_to_bytes(point));
            offset += G2_BYTES;
        }
        for scalar in [&self.c, &self.sx, &self.sy] {
            bytes[offset..offset + SCALAR_BYTES].copy_from_slice(&scalar.to_bytes_be());
            offset += SCALAR_BYTES;
        }
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let mut reader = ByteReader::new(bytes);
        let X = reader.g2()?;
        let Y = reader.g2()?;
        let c = reader.scalar()?;
        let sx = reader.scalar()?;
        let sy = reader.scalar()?;
        reader.finish()?;
        Ok(Self { X, Y, c, sx, sy })
    }

    pub fn encode(&self) -> String {
        hex::encode(self.to_bytes())
    }
}

fn issuer_challenge(
    Ux: &G2Projective,
    Uy: &G2Projective,
    g2: &G2Projective,
    X: &G2Projective,
    Y: &G2Projective,
) -> Scalar {
    ChallengeHash::new()
        .g2(Ux)
        .g2(Uy)
        .g2(g2)
        .g2(X)
        .g2(Y)
        .finalize()
}

impl PublicKey for IssuerPublicKey {
    type Output = [u8; IssuerPublicKey::BYTES];

    fn to_bytes(&self) -> Self::Output {
        self.to_bytes()
    }

    fn encode(&self) -> String {
        self.encode()
    }
}

impl PrivateKey for IssuerSecretKey {
    type Output = [u8; IssuerSecretKey::BYTES];

    fn to_bytes(&self) -> Self::Output {
        self.to_bytes()
    }

    fn encode(&self) -> String {
        self.encode()
    }
}

pub type IssuerKeyPair = KeyPair<IssuerPublicKey, IssuerSecretKey>;

impl KeyPair<IssuerPublicKey, IssuerSecretKey> {
    /// # Description
    /// Generates the issuer secret `(x, y)`, the public `(X, Y) = (g2^x, g2^y)` and a
    /// Schnorr proof of knowledge `(c, sx, sy)` of both exponents.
    ///
    /// # Inputs:
    /// * `params` (REQUIRED), curve parameters.
    /// * `rng` (REQUIRED), cryptographically secure random number generator.
    ///
    /// # Output:
    /// a new [`IssuerKeyPair`].
    pub fn generate<R: RngCore + CryptoRng>(params: &CurveParameters, rng: &mut R) -> Self {
        let g2 = params.g2();

        let x = random_scalar(rng);
        let y = random_scalar(rng);
        let X = g2 * x;
        let Y = g2 * y;

        let rx = Scalar::random(&mut *rng);
        let ry = Scalar::random(&mut *rng);
        let Ux = g2 * rx;
        let Uy = g2 * ry;

        let c = issuer_challenge(&Ux, &Uy, &g2, &X, &Y);
        let sx = rx + c * x;
        let sy = ry + c * y;

        Self {
            public: IssuerPublicKey { X, Y, c, sx, sy },
            private: IssuerSecretKey { x, y },
        }
    }
}

/// Secret key of a member whose key is held in software.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct MemberSecretKey(pub(crate) Scalar);

impl MemberSecretKey {
    pub fn new(sk: Scalar) -> Result<Self, Error> {
        if bool::from(sk.is_zero()) {
            return Err(Error::KeyGenError("member secret key must be non-zero".to_owned()));
        }
        Ok(Self(sk))
    }

    pub fn to_scalar(&self) -> Scalar {
        self.0
    }

    //in BE order
    pub fn to_bytes(&self) -> [u8; SCALAR_BYTES] {
        self.0.to_bytes_be()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let mut reader = ByteReader::new(bytes);
        let sk = reader.scalar()?;
        reader.finish()?;
        Self::new(sk).map_err(|_| Error::EncodingError("zero member secret key".to_owned()))
    }

    pub fn encode(&self) -> String {
        hex::encode(self.to_bytes())
    }
}

impl PrivateKey for MemberSecretKey {
    type Output = [u8; SCALAR_BYTES];

    fn to_bytes(&self) -> Self::Output {
        self.to_bytes()
    }

    fn encode(&self) -> String {
        self.encode()
    }
}
