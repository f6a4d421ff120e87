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

use bls12_381_plus::G1Projective;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use super::credential::Credential;
use super::keys::{IssuerPublicKey, MemberSecretKey};
use super::params::CurveParameters;
use super::revocation::RevocationList;
use super::schnorr::SchnorrProof;
use crate::errors::Error;
use crate::utils::util::ByteReader;

#[cfg(feature = "tpm")]
use super::hash::hash_to_point;
#[cfg(feature = "tpm")]
use super::schnorr::challenge_prime;
#[cfg(feature = "tpm")]
use crate::tpm::{finish_signature, release_commit, EccPoint, KeyHandles, Tpm};
#[cfg(feature = "tpm")]
use crate::utils::util::FP_BYTES;

/// ECDAA signature: a randomized credential and a Schnorr proof of knowledge of the
/// member key over the randomized `(B, D)`.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Signature {
    pub(crate) proof: SchnorrProof,
    pub(crate) randomized_cred: Credential,
}

impl Signature {
    pub fn proof(&self) -> &SchnorrProof {
        &self.proof
    }

    pub fn randomized_credential(&self) -> &Credential {
        &self.randomized_cred
    }

    /// `K = HashToPoint(basename)^sk`, equal for two signatures of the same member
    /// with the same basename
    pub fn pseudonym(&self) -> Option<G1Projective> {
        self.proof.K
    }

    /// # Description
    /// Verifies an ECDAA signature: first the Schnorr proof over the randomized
    /// `(B, D)`, then the credential against the issuer key, then the revocation list.
    ///
    /// # Inputs:
    /// * `params` (REQUIRED), curve parameters.
    /// * `message` (REQUIRED), signed message.
    /// * `basename` (OPTIONAL), basename the signature must be linked to.
    /// * `ipk` (REQUIRED), issuer public key.
    /// * `revocation_list` (REQUIRED), disclosed member secret keys, may be empty.
    ///
    /// # Output:
    /// `Ok(())`, [`Error::InvalidProof`], [`Error::InvalidCredential`] or [`Error::Revoked`].
    pub fn verify(
        &self,
        params: &CurveParameters,
        message: &[u8],
        basename: Option<&[u8]>,
        ipk: &IssuerPublicKey,
        revocation_list: &RevocationList,
    ) -> Result<(), Error> {
        let cred = &self.randomized_cred;
        self.proof.verify(params, message, basename, &cred.B, &cred.D)?;
        cred.verify(params, ipk)?;
        revocation_list.check(cred)
    }

    /// `randomized credential || proof`
    pub fn to_bytes(&self) -> Vec<u8> {
        [&self.randomized_cred.to_bytes()[..], &self.proof.to_bytes()].concat()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let mut reader = ByteReader::new(bytes);
        let randomized_cred = Credential::read(&mut reader)?;
        let proof = SchnorrProof::read(&mut reader)?;
        reader.finish()?;
        Ok(Self {
            proof,
            randomized_cred,
        })
    }
}

/// Something able to produce ECDAA signatures for a member.
pub trait Signer {
    fn sign<R: RngCore + CryptoRng>(
        &mut self,
        message: &[u8],
        basename: Option<&[u8]>,
        rng: &mut R,
    ) -> Result<Signature, Error>;
}

/// Member whose secret key is held by the host.
#[derive(Clone, Debug)]
pub struct SoftwareSigner {
    params: CurveParameters,
    credential: Credential,
    sk: MemberSecretKey,
}

impl SoftwareSigner {
    pub fn new(params: CurveParameters, credential: Credential, sk: MemberSecretKey) -> Self {
        Self {
            params,
            credential,
            sk,
        }
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }
}

impl Signer for SoftwareSigner {
    fn sign<R: RngCore + CryptoRng>(
        &mut self,
        message: &[u8],
        basename: Option<&[u8]>,
        rng: &mut R,
    ) -> Result<Signature, Error> {
        let randomized_cred = self.credential.randomize(rng);
        let proof = SchnorrProof::prove(
            &self.params,
            message,
            basename,
            &self.sk.0,
            &randomized_cred.B,
            &randomized_cred.D,
            rng,
        )?;

        Ok(Signature {
            proof,
            randomized_cred,
        })
    }
}

/// Member whose secret key lives in a TPM: the host randomizes the credential and
/// builds the transcript, the TPM contributes `E`, `L`, `K` and `s`.
#[cfg(feature = "tpm")]
#[derive(Debug)]
pub struct TpmSigner<T: Tpm> {
    params: CurveParameters,
    credential: Credential,
    handles: KeyHandles,
    tpm: T,
}

#[cfg(feature = "tpm")]
impl<T: Tpm> TpmSigner<T> {
    pub fn new(params: CurveParameters, credential: Credential, handles: KeyHandles, tpm: T) -> Self {
        Self {
            params,
            credential,
            handles,
            tpm,
        }
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// Gives the TPM back
    pub fn into_inner(self) -> T {
        self.tpm
    }
}

#[cfg(feature = "tpm")]
impl<T: Tpm> Signer for TpmSigner<T> {
    fn sign<R: RngCore + CryptoRng>(
        &mut self,
        message: &[u8],
        basename: Option<&[u8]>,
        rng: &mut R,
    ) -> Result<Signature, Error> {
        let randomized_cred = self.credential.randomize(rng);
        let S = randomized_cred.B;
        let W = randomized_cred.D;

        let hashed = basename
            .map(|bsn| hash_to_point(&self.params, bsn).map(|h| (h.s2(bsn), h)))
            .transpose()?;
        let (s2, y2) = match &hashed {
            Some((s2, h)) => (s2.as_slice(), h.y2),
            None => (&[][..], [0u8; FP_BYTES]),
        };

        let commit = self
            .tpm
            .commit(self.handles.key, &EccPoint::from_g1(&S), s2, &y2)?;
        let transcript = || -> Result<_, Error> {
            let E = commit.E.to_g1()?;
            match (&hashed, basename) {
                (Some((_, h)), Some(bsn)) => {
                    let missing = || Error::TpmCommError("commit did not return L and K".to_owned());
                    let L = commit.L.ok_or_else(missing)?.to_g1()?;
                    let K = commit.K.ok_or_else(missing)?.to_g1()?;
                    let c_prime = challenge_prime(&E, &S, &W, Some((&L, &h.point, &K)), bsn, message);
                    Ok((c_prime, Some(K)))
                }
                _ => Ok((challenge_prime(&E, &S, &W, None, &[], message), None)),
            }
        };
        let (c_prime, K) = match transcript() {
            Ok(transcript) => transcript,
            Err(e) => {
                release_commit(&mut self.tpm, self.handles.key, commit.counter);
                return Err(e);
            }
        };

        let (c, s, n) = finish_signature(&mut self.tpm, self.handles.key, commit.counter, &c_prime)?;

        Ok(Signature {
            proof: SchnorrProof { c, s, n, K },
            randomized_cred,
        })
    }
}

/// Either kind of member, chosen at runtime.
#[cfg(feature = "tpm")]
#[derive(Debug)]
pub enum MemberSigner<T: Tpm> {
    Software(SoftwareSigner),
    Tpm(TpmSigner<T>),
}

#[cfg(feature = "tpm")]
impl<T: Tpm> Signer for MemberSigner<T> {
    fn sign<R: RngCore + CryptoRng>(
        &mut self,
        message: &[u8],
        basename: Option<&[u8]>,
        rng: &mut R,
    ) -> Result<Signature, Error> {
        match self {
            MemberSigner::Software(signer) => signer.sign(message, basename, rng),
            MemberSigner::Tpm(signer) => signer.sign(message, basename, rng),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecdaa::join::{JoinRequest, JoinSeed};
    use crate::ecdaa::keys::IssuerKeyPair;
    use rand::{rngs::StdRng, SeedableRng};

    fn member(seed: u64) -> (CurveParameters, StdRng, IssuerPublicKey, SoftwareSigner) {
        let params = CurveParameters::default();
        let mut rng = StdRng::seed_from_u64(seed);
        let (isk, ipk) = IssuerKeyPair::generate(&params, &mut rng).into_parts();
        let (seed, session) = JoinSeed::generate(&params, &mut rng).unwrap();
        let (request, sk) = JoinRequest::generate(&params, &seed, &mut rng).unwrap();
        let cred = session.issue(&params, &isk, &request).unwrap();
        (params, rng, ipk, SoftwareSigner::new(params, cred, sk))
    }

    #[test]
    fn sign_and_verify() {
        let (params, mut rng, ipk, mut signer) = member(1);
        let rl = RevocationList::new();

        let sig = signer.sign(b"hoge", Some(b"fuga"), &mut rng).unwrap();
        assert!(sig.verify(&params, b"hoge", Some(b"fuga"), &ipk, &rl).is_ok());
        assert_eq!(
            sig.verify(&params, b"hoge2", Some(b"fuga"), &ipk, &rl),
            Err(Error::InvalidProof)
        );
        assert_eq!(
            sig.verify(&params, b"hoge", Some(b"fuga3"), &ipk, &rl),
            Err(Error::InvalidProof)
        );

        let sig = signer.sign(b"hoge", None, &mut rng).unwrap();
        assert!(sig.pseudonym().is_none());
        assert!(sig.verify(&params, b"hoge", None, &ipk, &rl).is_ok());
    }

    #[test]
    fn signatures_are_unlinkable_without_basename() {
        let (_, mut rng, _, mut signer) = member(2);
        let s1 = signer.sign(b"m", None, &mut rng).unwrap();
        let s2 = signer.sign(b"m", None, &mut rng).unwrap();
        assert_ne!(s1.randomized_credential().B(), s2.randomized_credential().B());
        assert_ne!(s1.randomized_credential().B(), signer.credential().B());
    }

    #[test]
    fn checks_run_in_order() {
        let (params, mut rng, ipk, mut signer) = member(3);
        let sig = signer.sign(b"m", None, &mut rng).unwrap();

        // a proof that fails and a credential from another issuer: the proof is reported
        let other = *IssuerKeyPair::generate(&params, &mut rng).public_key();
        assert_eq!(
            sig.verify(&params, b"x", None, &other, &RevocationList::new()),
            Err(Error::InvalidProof)
        );
        assert_eq!(
            sig.verify(&params, b"m", None, &other, &RevocationList::new()),
            Err(Error::InvalidCredential)
        );

        let rl: RevocationList = [signer.sk.to_scalar()].into_iter().collect();
        assert_eq!(other.verify(&params), Ok(()));
        assert_eq!(
            sig.verify(&params, b"m", None, &other, &rl),
            Err(Error::InvalidCredential)
        );
        assert_eq!(sig.verify(&params, b"m", None, &ipk, &rl), Err(Error::Revoked));
    }

    #[test]
    fn signature_decodes_its_encoding() {
        let (_, mut rng, _, mut signer) = member(4);
        for basename in [None, Some(&b"fuga"[..])] {
            let sig = signer.sign(b"hoge", basename, &mut rng).unwrap();
            let bytes = sig.to_bytes();
            assert_eq!(Signature::from_bytes(&bytes).unwrap(), sig);
            assert!(Signature::from_bytes(&bytes[..bytes.len() - 1]).is_err());
        }
    }

    #[cfg(feature = "tpm")]
    mod tpm {
        use super::*;
        use crate::tpm::software::SoftwareTpm;
        use crate::tpm::{CommitResponse, SignResponse, TpmHandle};

        /// Device answering commits without the pseudonym points
        struct NoPseudonym(SoftwareTpm);

        impl Tpm for NoPseudonym {
            fn commit(
                &mut self,
                key: TpmHandle,
                p1: &EccPoint,
                s2: &[u8],
                y2: &[u8; FP_BYTES],
            ) -> Result<CommitResponse, Error> {
                let mut response = self.0.commit(key, p1, s2, y2)?;
                response.L = None;
                response.K = None;
                Ok(response)
            }

            fn sign(&mut self, digest: &[u8; 32], counter: u16, key: TpmHandle) -> Result<SignResponse, Error> {
                self.0.sign(digest, counter, key)
            }

            fn activate_credential(
                &mut self,
                ek: TpmHandle,
                srk: TpmHandle,
                id_object: &[u8],
                wrapped_secret: &[u8],
            ) -> Result<Vec<u8>, Error> {
                self.0.activate_credential(ek, srk, id_object, wrapped_secret)
            }

            fn read_endorsement_cert(&mut self) -> Result<Vec<u8>, Error> {
                self.0.read_endorsement_cert()
            }
        }

        #[test]
        fn failed_commit_is_released() {
            let (params, mut rng, _, signer) = member(5);
            let mut device = SoftwareTpm::new(&mut rng);
            let handles = device.create_key();
            let mut signer = TpmSigner::new(params, *signer.credential(), handles, NoPseudonym(device));

            assert!(matches!(
                signer.sign(b"hoge", Some(b"fuga"), &mut rng),
                Err(Error::TpmCommError(_))
            ));
            assert_eq!(signer.into_inner().0.pending_commits(), 0);
        }
    }
}
