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

use std::collections::HashMap;

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes128Gcm, Nonce};
use bls12_381_plus::Scalar;
use digest::Digest;
use rand::rngs::StdRng;
use rand::{CryptoRng, RngCore, SeedableRng};
use sha2::Sha256;
use zeroize::Zeroizing;

use super::delivery::{NONCE_BYTES, SECRET_BYTES};
use super::{CommitResponse, CredentialMaker, EccPoint, KeyHandles, SignResponse, Tpm, TpmHandle};
use crate::ecdaa::hash::{point_from_seed, ChallengeHash};
use crate::ecdaa::keys::MemberSecretKey;
use crate::errors::Error;
use crate::utils::util::{random_bytes, random_scalar, ScalarExt, FP_BYTES};

const EK_HANDLE: TpmHandle = TpmHandle(0x8101_0001);
const SRK_HANDLE: TpmHandle = TpmHandle(0x8100_0001);
const FIRST_KEY_HANDLE: u32 = 0x8100_0002;
/// TPM_ALG_SHA256, prefix of object names
const NAME_ALG_SHA256: [u8; 2] = [0x00, 0x0b];

struct Commitment {
    key: TpmHandle,
    r: Scalar,
}

/// In-memory TPM holding ECDAA keys.
///
/// Commitments are kept per counter and consumed by the matching `sign`, so several
/// sessions may be interleaved on one device. Credential activation is simulated
/// with AES-128-GCM under a key derived from the endorsement certificate and the
/// SRK name; the RSA-OAEP seed encryption of a real TPM is not modelled.
pub struct SoftwareTpm {
    rng: StdRng,
    keys: HashMap<TpmHandle, Scalar>,
    commits: HashMap<u16, Commitment>,
    next_handle: u32,
    next_counter: u16,
    ek_cert: Vec<u8>,
    srk_name: Vec<u8>,
}

impl SoftwareTpm {
    pub fn new<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut seed = [0u8; 32];
        rng.fill_bytes(&mut seed);
        let mut rng = StdRng::from_seed(seed);

        let ek_cert = random_bytes(&mut rng, 64);
        let srk_name = [&NAME_ALG_SHA256[..], &random_bytes(&mut rng, 32)].concat();

        Self {
            rng,
            keys: HashMap::new(),
            commits: HashMap::new(),
            next_handle: FIRST_KEY_HANDLE,
            next_counter: 0,
            ek_cert,
            srk_name,
        }
    }

    /// Creates a new ECDAA signing key under the SRK.
    pub fn create_key(&mut self) -> KeyHandles {
        let key = TpmHandle(self.next_handle);
        self.next_handle += 1;
        self.keys.insert(key, random_scalar(&mut self.rng));
        log::debug!("software TPM: created ECDAA key {:#x}", key.0);

        KeyHandles {
            key,
            ek: EK_HANDLE,
            srk: SRK_HANDLE,
            srk_name: self.srk_name.clone(),
        }
    }

    /// Reveals the secret of `key`, as an attacker extracting it would.
    pub fn disclose_key(&self, key: TpmHandle) -> Result<MemberSecretKey, Error> {
        let sk = self.secret(key)?;
        MemberSecretKey::new(sk)
    }

    /// Number of commitments not yet consumed by a `sign`
    pub fn pending_commits(&self) -> usize {
        self.commits.len()
    }

    /// Next counter with no pending commitment; counters skip slots still in use
    /// after wrapping around.
    fn allocate_counter(&mut self) -> Result<u16, Error> {
        if self.commits.len() > usize::from(u16::MAX) {
            return Err(Error::TpmCommError("no free commit counter".to_owned()));
        }
        loop {
            let counter = self.next_counter;
            self.next_counter = counter.wrapping_add(1);
            if !self.commits.contains_key(&counter) {
                return Ok(counter);
            }
        }
    }

    fn secret(&self, key: TpmHandle) -> Result<Scalar, Error> {
        self.keys
            .get(&key)
            .copied()
            .ok_or_else(|| Error::TpmCommError(format!("unknown key handle {:#x}", key.0)))
    }
}

impl Tpm for SoftwareTpm {
    fn commit(
        &mut self,
        key: TpmHandle,
        p1: &EccPoint,
        s2: &[u8],
        y2: &[u8; FP_BYTES],
    ) -> Result<CommitResponse, Error> {
        let sk = self.secret(key)?;
        let P1 = p1.to_g1()?;

        let r = random_scalar(&mut self.rng);
        let E = EccPoint::from_g1(&(P1 * r));

        let (L, K) = if s2.is_empty() {
            (None, None)
        } else {
            let B = point_from_seed(s2, y2)
                .map_err(|_| Error::TpmCommError("commit base point is not on the curve".to_owned()))?;
            (Some(EccPoint::from_g1(&(B * r))), Some(EccPoint::from_g1(&(B * sk))))
        };

        let counter = self.allocate_counter()?;
        self.commits.insert(counter, Commitment { key, r });
        log::debug!("software TPM: commit {counter} on key {:#x}", key.0);

        Ok(CommitResponse { counter, E, L, K })
    }

    fn sign(&mut self, digest: &[u8; 32], counter: u16, key: TpmHandle) -> Result<SignResponse, Error> {
        let commitment = self
            .commits
            .remove(&counter)
            .ok_or_else(|| Error::TpmCommError(format!("no commitment with counter {counter}")))?;
        if commitment.key != key {
            return Err(Error::TpmCommError(format!(
                "commitment {counter} was made with another key"
            )));
        }
        let sk = self.secret(key)?;

        let n = random_scalar(&mut self.rng);
        let c = ChallengeHash::new().scalar(&n).bytes(digest).finalize();
        let s = commitment.r + c * sk;

        Ok(SignResponse {
            n: n.to_bytes_be(),
            s: s.to_bytes_be(),
        })
    }

    fn activate_credential(
        &mut self,
        ek: TpmHandle,
        srk: TpmHandle,
        id_object: &[u8],
        wrapped_secret: &[u8],
    ) -> Result<Vec<u8>, Error> {
        if ek != EK_HANDLE || srk != SRK_HANDLE {
            return Err(Error::TpmCommError("unknown endorsement or storage key".to_owned()));
        }
        if id_object.len() != NONCE_BYTES {
            return Err(Error::CredentialDecryptionError);
        }

        let key = wrapping_key(&self.ek_cert, &self.srk_name);
        let cipher =
            Aes128Gcm::new_from_slice(&key[..]).map_err(|_| Error::CredentialDecryptionError)?;
        cipher
            .decrypt(Nonce::from_slice(id_object), wrapped_secret)
            .map_err(|_| Error::CredentialDecryptionError)
    }

    fn read_endorsement_cert(&mut self) -> Result<Vec<u8>, Error> {
        Ok(self.ek_cert.clone())
    }
}

/// `MakeCredential` counterpart of [`SoftwareTpm`].
#[derive(Clone, Copy, Debug, Default)]
pub struct SoftwareCredentialMaker;

impl CredentialMaker for SoftwareCredentialMaker {
    fn make_credential<R: RngCore + CryptoRng>(
        &self,
        ek_cert: &[u8],
        srk_name: &[u8],
        secret: &[u8],
        rng: &mut R,
    ) -> Result<(Vec<u8>, Vec<u8>), Error> {
        let key = wrapping_key(ek_cert, srk_name);
        let cipher = Aes128Gcm::new_from_slice(&key[..])
            .map_err(|e| Error::KeyGenError(format!("cipher init failed: {e}")))?;

        let mut nonce = [0u8; NONCE_BYTES];
        rng.fill_bytes(&mut nonce);
        let wrapped = cipher
            .encrypt(Nonce::from_slice(&nonce), secret)
            .map_err(|e| Error::KeyGenError(format!("secret wrapping failed: {e}")))?;

        Ok((nonce.to_vec(), wrapped))
    }
}

/// KDF label of the TCG identity protection key
fn wrapping_key(ek_cert: &[u8], srk_name: &[u8]) -> Zeroizing<[u8; SECRET_BYTES]> {
    let digest = Sha256::new()
        .chain_update(b"IDENTITY\0")
        .chain_update(ek_cert)
        .chain_update(srk_name)
        .finalize();
    let mut key = Zeroizing::new([0u8; SECRET_BYTES]);
    key.copy_from_slice(&digest[..SECRET_BYTES]);
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecdaa::params::CurveParameters;
    use crate::ecdaa::hash::hash_to_point;
    use bls12_381_plus::G1Projective;
    use elliptic_curve::Group;

    #[test]
    fn commit_and_sign_follow_the_schnorr_equations() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut tpm = SoftwareTpm::new(&mut rng);
        let handles = tpm.create_key();
        let sk = tpm.disclose_key(handles.key).unwrap().to_scalar();

        let params = CurveParameters::default();
        let P1 = G1Projective::random(&mut rng);
        let hashed = hash_to_point(&params, b"fuga").unwrap();

        let commit = tpm
            .commit(handles.key, &EccPoint::from_g1(&P1), &hashed.s2(b"fuga"), &hashed.y2)
            .unwrap();
        let K = commit.K.unwrap().to_g1().unwrap();
        assert_eq!(K, hashed.point * sk);

        let digest = [7u8; 32];
        let response = tpm.sign(&digest, commit.counter, handles.key).unwrap();
        let n = Scalar::from_bytes_be(&response.n).unwrap();
        let s = Scalar::from_bytes_be(&response.s).unwrap();
        let c = ChallengeHash::new().scalar(&n).bytes(&digest).finalize();

        // E = P1^s - (P1^sk)^c and L = B^s - K^c
        assert_eq!(commit.E.to_g1().unwrap(), P1 * s - (P1 * sk) * c);
        assert_eq!(commit.L.unwrap().to_g1().unwrap(), hashed.point * s - K * c);
    }

    #[test]
    fn commit_without_base_has_no_pseudonym() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut tpm = SoftwareTpm::new(&mut rng);
        let handles = tpm.create_key();
        let P1 = EccPoint::from_g1(&G1Projective::random(&mut rng));

        let commit = tpm.commit(handles.key, &P1, &[], &[0u8; FP_BYTES]).unwrap();
        assert!(commit.L.is_none() && commit.K.is_none());
    }

    #[test]
    fn counters_are_single_use() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut tpm = SoftwareTpm::new(&mut rng);
        let handles = tpm.create_key();
        let P1 = EccPoint::from_g1(&G1Projective::random(&mut rng));

        let first = tpm.commit(handles.key, &P1, &[], &[0u8; FP_BYTES]).unwrap();
        let second = tpm.commit(handles.key, &P1, &[], &[0u8; FP_BYTES]).unwrap();
        assert_ne!(first.counter, second.counter);
        assert_eq!(tpm.pending_commits(), 2);

        // interleaved: the second session signs first
        assert!(tpm.sign(&[1u8; 32], second.counter, handles.key).is_ok());
        assert!(tpm.sign(&[1u8; 32], first.counter, handles.key).is_ok());
        assert!(matches!(
            tpm.sign(&[1u8; 32], first.counter, handles.key),
            Err(Error::TpmCommError(_))
        ));
        assert!(matches!(
            tpm.sign(&[1u8; 32], 999, handles.key),
            Err(Error::TpmCommError(_))
        ));
    }

    #[test]
    fn wrapped_counter_skips_pending_commitments() {
        let mut rng = StdRng::seed_from_u64(6);
        let mut tpm = SoftwareTpm::new(&mut rng);
        let handles = tpm.create_key();
        let sk = tpm.disclose_key(handles.key).unwrap().to_scalar();
        let P1 = G1Projective::random(&mut rng);
        let base = EccPoint::from_g1(&P1);

        let first = tpm.commit(handles.key, &base, &[], &[0u8; FP_BYTES]).unwrap();
        assert_eq!(first.counter, 0);

        tpm.next_counter = u16::MAX;
        let last = tpm.commit(handles.key, &base, &[], &[0u8; FP_BYTES]).unwrap();
        assert_eq!(last.counter, u16::MAX);
        let wrapped = tpm.commit(handles.key, &base, &[], &[0u8; FP_BYTES]).unwrap();
        assert_eq!(wrapped.counter, 1);
        assert_eq!(tpm.pending_commits(), 3);

        // the first session still answers with its own nonce
        let digest = [9u8; 32];
        let response = tpm.sign(&digest, first.counter, handles.key).unwrap();
        let n = Scalar::from_bytes_be(&response.n).unwrap();
        let s = Scalar::from_bytes_be(&response.s).unwrap();
        let c = ChallengeHash::new().scalar(&n).bytes(&digest).finalize();
        assert_eq!(first.E.to_g1().unwrap(), P1 * s - (P1 * sk) * c);
    }

    #[test]
    fn unknown_key_is_refused() {
        let mut rng = StdRng::seed_from_u64(4);
        let mut tpm = SoftwareTpm::new(&mut rng);
        let P1 = EccPoint::from_g1(&G1Projective::random(&mut rng));
        assert!(matches!(
            tpm.commit(TpmHandle(1), &P1, &[], &[0u8; FP_BYTES]),
            Err(Error::TpmCommError(_))
        ));
    }

    #[test]
    fn wrapped_secret_is_bound_to_the_srk_name() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut tpm = SoftwareTpm::new(&mut rng);
        let handles = tpm.create_key();
        let ek_cert = tpm.read_endorsement_cert().unwrap();

        let (id, wrapped) = SoftwareCredentialMaker
            .make_credential(&ek_cert, &handles.srk_name, b"0123456789abcdef", &mut rng)
            .unwrap();
        assert_eq!(
            tpm.activate_credential(handles.ek, handles.srk, &id, &wrapped).unwrap(),
            b"0123456789abcdef".to_vec()
        );

        let (id, wrapped) = SoftwareCredentialMaker
            .make_credential(&ek_cert, b"another name", b"0123456789abcdef", &mut rng)
            .unwrap();
        assert_eq!(
            tpm.activate_credential(handles.ek, handles.srk, &id, &wrapped),
            Err(Error::CredentialDecryptionError)
        );
    }

    #[test]
    fn seeded_credential_wrapping_is_reproducible() {
        let wrap = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            SoftwareCredentialMaker
                .make_credential(b"ek cert", b"srk name", b"0123456789abcdef", &mut rng)
                .unwrap()
        };
        assert_eq!(wrap(7), wrap(7));
        assert_ne!(wrap(7).0, wrap(8).0);
    }
}
