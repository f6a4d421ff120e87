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

//! Hardware-backed members.
//!
//! A member may keep its ECDAA secret inside a TPM 2.0. The host then drives the
//! transcript through the two-phase `TPM2_Commit` / `TPM2_Sign` exchange and never
//! sees `sk`. The [`Tpm`] trait is the narrow view of the device the protocol needs;
//! [`software::SoftwareTpm`] implements it in memory for tests and demos.

pub mod delivery;
pub mod software;

use bls12_381_plus::{G1Affine, G1Projective, Scalar};
use elliptic_curve::group::Curve;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::ecdaa::schnorr::challenge;
use crate::errors::Error;
use crate::utils::util::{serde_fp, ScalarExt, FP_BYTES};

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct TpmHandle(pub u32);

/// Handles of the objects a member uses: the ECDAA signing key, the endorsement
/// key and the storage root key (with its name, which binds credential delivery).
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct KeyHandles {
    pub key: TpmHandle,
    pub ek: TpmHandle,
    pub srk: TpmHandle,
    pub srk_name: Vec<u8>,
}

/// Affine point as exchanged with the TPM (`TPMS_ECC_POINT`)
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct EccPoint {
    #[serde(with = "serde_fp")]
    pub x: [u8; FP_BYTES],
    #[serde(with = "serde_fp")]
    pub y: [u8; FP_BYTES],
}

impl EccPoint {
    pub fn from_g1(point: &G1Projective) -> Self {
        let uncompressed = point.to_affine().to_uncompressed();
        let mut x = [0u8; FP_BYTES];
        let mut y = [0u8; FP_BYTES];
        x.copy_from_slice(&uncompressed[..FP_BYTES]);
        y.copy_from_slice(&uncompressed[FP_BYTES..]);
        Self { x, y }
    }

    /// Fails with [`Error::TpmCommError`] if the coordinates are not a point of G1
    pub fn to_g1(&self) -> Result<G1Projective, Error> {
        let mut uncompressed = [0u8; 2 * FP_BYTES];
        uncompressed[..FP_BYTES].copy_from_slice(&self.x);
        uncompressed[FP_BYTES..].copy_from_slice(&self.y);
        Option::<G1Affine>::from(G1Affine::from_uncompressed(&uncompressed))
            .map(G1Projective::from)
            .ok_or_else(|| Error::TpmCommError("TPM returned an invalid point".to_owned()))
    }
}

/// Result of `TPM2_Commit`: `E = P1^r` and, when a base was given through
/// `(s2, y2)`, `L = B^r` and `K = B^sk`. `r` stays in the TPM, bound to `counter`.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct CommitResponse {
    pub counter: u16,
    pub E: EccPoint,
    pub L: Option<EccPoint>,
    pub K: Option<EccPoint>,
}

/// Result of `TPM2_Sign` with the ECDAA scheme: nonce `n` and `s = r + H(n || digest)·sk`
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct SignResponse {
    pub n: [u8; 32],
    pub s: [u8; 32],
}

pub trait Tpm {
    /// `TPM2_Commit` on the ECDAA key `key`. An empty `s2` means no base point.
    fn commit(
        &mut self,
        key: TpmHandle,
        p1: &EccPoint,
        s2: &[u8],
        y2: &[u8; FP_BYTES],
    ) -> Result<CommitResponse, Error>;

    /// `TPM2_Sign` of `digest`, consuming the commitment `counter`.
    fn sign(&mut self, digest: &[u8; 32], counter: u16, key: TpmHandle) -> Result<SignResponse, Error>;

    /// `TPM2_ActivateCredential`: recovers the secret wrapped by
    /// [`CredentialMaker::make_credential`] for this TPM.
    fn activate_credential(
        &mut self,
        ek: TpmHandle,
        srk: TpmHandle,
        id_object: &[u8],
        wrapped_secret: &[u8],
    ) -> Result<Vec<u8>, Error>;

    fn read_endorsement_cert(&mut self) -> Result<Vec<u8>, Error>;
}

impl<T: Tpm + ?Sized> Tpm for &mut T {
    fn commit(
        &mut self,
        key: TpmHandle,
        p1: &EccPoint,
        s2: &[u8],
        y2: &[u8; FP_BYTES],
    ) -> Result<CommitResponse, Error> {
        (**self).commit(key, p1, s2, y2)
    }

    fn sign(&mut self, digest: &[u8; 32], counter: u16, key: TpmHandle) -> Result<SignResponse, Error> {
        (**self).sign(digest, counter, key)
    }

    fn activate_credential(
        &mut self,
        ek: TpmHandle,
        srk: TpmHandle,
        id_object: &[u8],
        wrapped_secret: &[u8],
    ) -> Result<Vec<u8>, Error> {
        (**self).activate_credential(ek, srk, id_object, wrapped_secret)
    }

    fn read_endorsement_cert(&mut self) -> Result<Vec<u8>, Error> {
        (**self).read_endorsement_cert()
    }
}

/// Issuer side of the TCG `MakeCredential` handshake: wraps `secret` so that only the
/// TPM owning `ek_cert`, with a storage key named `srk_name`, can recover it.
///
/// Returns `(id_object, wrapped_secret)`. Any randomness is drawn from `rng`.
pub trait CredentialMaker {
    fn make_credential<R: RngCore + CryptoRng>(
        &self,
        ek_cert: &[u8],
        srk_name: &[u8],
        secret: &[u8],
        rng: &mut R,
    ) -> Result<(Vec<u8>, Vec<u8>), Error>;
}

/// Consumes the commitment `counter` when its response cannot be used, so it does
/// not stay pending on the device. The throwaway signature is discarded.
pub(crate) fn release_commit<T: Tpm>(tpm: &mut T, key: TpmHandle, counter: u16) {
    if let Err(e) = tpm.sign(&[0u8; 32], counter, key) {
        log::warn!("could not release TPM commitment {counter}: {e}");
    }
}

/// Second half of a split signature: the TPM signs `c'`, answering `(n, s)`, and
/// the host derives `c = H(n, c')`. Returns `(c, s, n)`.
pub(crate) fn finish_signature<T: Tpm>(
    tpm: &mut T,
    key: TpmHandle,
    counter: u16,
    c_prime: &Scalar,
) -> Result<(Scalar, Scalar, Scalar), Error> {
    let response = tpm.sign(&c_prime.to_bytes_be(), counter, key)?;
    let n = Scalar::from_bytes_be(&response.n)
        .map_err(|_| Error::TpmCommError("TPM nonce is not a scalar".to_owned()))?;
    let s = Scalar::from_bytes_be(&response.s)
        .map_err(|_| Error::TpmCommError("TPM response is not a scalar".to_owned()))?;
    Ok((challenge(&n, c_prime), s, n))
}
