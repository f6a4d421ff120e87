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
use super::hash::{hash_to_point, point_from_seed};
use super::keys::{IssuerSecretKey, MemberSecretKey};
use super::params::CurveParameters;
use super::schnorr::SchnorrProof;
use crate::errors::Error;
use crate::utils::util::{
    g1_to_bytes, put_var, random_bytes, random_scalar, serde_fp, ByteReader, FP_BYTES, VARINT_LEN,
};

#[cfg(feature = "tpm")]
use super::keys::IssuerPublicKey;
#[cfg(feature = "tpm")]
use super::schnorr::challenge_prime;
#[cfg(feature = "tpm")]
use crate::tpm::{
    delivery::CredentialCipher, finish_signature, release_commit, CredentialMaker, EccPoint, KeyHandles, Tpm,
};

/// Length of the random basename drawn for each join
pub const JOIN_BASENAME_BYTES: usize = 32;

/// Challenge sent by the issuer to start a join.
///
/// `B = HashToPoint(basename)` can be rebuilt in one step from `(s2, y2)`, with
/// `s2 = varint(i) || basename`. A seed must be used for a single join.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct JoinSeed {
    pub(crate) basename: Vec<u8>,
    pub(crate) s2: Vec<u8>,
    #[serde(with = "serde_fp")]
    pub(crate) y2: [u8; FP_BYTES],
}

/// What the issuer remembers between the seed and the request.
/// Consumed by the issuance, so a seed cannot be answered twice.
#[derive(Debug, PartialEq, Eq)]
pub struct IssuerJoinSession {
    B: G1Projective,
}

/// Member public key `Q = B^sk` with a proof of knowledge of `sk`.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct JoinRequest {
    pub(crate) proof: SchnorrProof,
    pub(crate) Q: G1Projective,
}

impl JoinSeed {
    /// # Description
    /// Draws a random basename and maps it to the join base `B`.
    ///
    /// # Inputs:
    /// * `params` (REQUIRED), curve parameters.
    /// * `rng` (REQUIRED), cryptographically secure random number generator.
    ///
    /// # Output:
    /// the seed to send to the member and the issuer session holding `B`.
    pub fn generate<R: RngCore + CryptoRng>(
        params: &CurveParameters,
        rng: &mut R,
    ) -> Result<(Self, IssuerJoinSession), Error> {
        let basename = random_bytes(rng, JOIN_BASENAME_BYTES);
        let hashed = hash_to_point(params, &basename)?;

        let seed = Self {
            s2: hashed.s2(&basename),
            basename,
            y2: hashed.y2,
        };
        Ok((seed, IssuerJoinSession { B: hashed.point }))
    }

    pub fn basename(&self) -> &[u8] {
        &self.basename
    }

    pub fn s2(&self) -> &[u8] {
        &self.s2
    }

    pub fn y2(&self) -> &[u8; FP_BYTES] {
        &self.y2
    }

    /// Join base `B`, rebuilt from `(s2, y2)`
    pub fn base_point(&self) -> Result<G1Projective, Error> {
        point_from_seed(&self.s2, &self.y2)
    }

    /// `len || basename || len || s2 || y2`
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(8 + self.basename.len() + self.s2.len() + FP_BYTES);
        put_var(&mut bytes, &self.basename);
        put_var(&mut bytes, &self.s2);
        bytes.extend_from_slice(&self.y2);
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let mut reader = ByteReader::new(bytes);
        let basename = reader.take_var()?.to_vec();
        let s2 = reader.take_var()?.to_vec();
        let mut y2 = [0u8; FP_BYTES];
        y2.copy_from_slice(reader.take(FP_BYTES)?);
        reader.finish()?;

        if s2.len() != VARINT_LEN + basename.len() || !s2.ends_with(&basename) {
            return Err(Error::EncodingError("s2 does not carry the basename".to_owned()));
        }
        Ok(Self { basename, s2, y2 })
    }
}

impl JoinRequest {
    /// # Description
    /// Software member side of the join: draws `sk`, computes `Q = B^sk` and proves
    /// knowledge of `sk` (no message, no basename).
    ///
    /// # Output:
    /// the request for the issuer and the member secret key.
    pub fn generate<R: RngCore + CryptoRng>(
        params: &CurveParameters,
        seed: &JoinSeed,
        rng: &mut R,
    ) -> Result<(Self, MemberSecretKey), Error> {
        let B = seed.base_point()?;
        let sk = random_scalar(rng);
        let Q = B * sk;
        let proof = SchnorrProof::prove(params, &[], None, &sk, &B, &Q, rng)?;

        Ok((Self { proof, Q }, MemberSecretKey(sk)))
    }

    pub fn Q(&self) -> G1Projective {
        self.Q
    }

    pub fn proof(&self) -> &SchnorrProof {
        &self.proof
    }

    /// Checks the proof of knowledge of `sk` with `Q = B^sk`.
    pub fn verify(&self, params: &CurveParameters, B: &G1Projective) -> Result<(), Error> {
        if bool::from(self.Q.is_identity()) {
            return Err(Error::InvalidProof);
        }
        self.proof.verify(params, &[], None, B, &self.Q)
    }

    /// `Q || proof`
    pub fn to_bytes(&self) -> Vec<u8> {
        [&g1_to_bytes(&self.Q)[..], &self.proof.to_bytes()].concat()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let mut reader = ByteReader::new(bytes);
        let request = Self::read(&mut reader)?;
        reader.finish()?;
        Ok(request)
    }

    pub(crate) fn read(reader: &mut ByteReader<'_>) -> Result<Self, Error> {
        let Q = reader.g1()?;
        let proof = SchnorrProof::read(reader)?;
        Ok(Self { proof, Q })
    }
}

impl IssuerJoinSession {
    pub fn B(&self) -> G1Projective {
        self.B
    }

    /// # Description
    /// Verifies the join request against the session base and issues the credential.
    ///
    /// # Output:
    /// the credential, or [`Error::InvalidProof`] if the request does not verify.
    pub fn issue(
        self,
        params: &CurveParameters,
        isk: &IssuerSecretKey,
        request: &JoinRequest,
    ) -> Result<Credential, Error> {
        request.verify(params, &self.B)?;
        log::debug!("join request verified, issuing credential");
        Credential::issue(isk, &self.B, &request.Q)
    }

    /// # Description
    /// Same as [`IssuerJoinSession::issue`] for a TPM member: `(A, C)` is encrypted so
    /// that only the TPM which produced the request can activate it.
    ///
    /// # Output:
    /// the credential cipher to send, and the credential for the issuer's records.
    #[cfg(feature = "tpm")]
    pub fn issue_encrypted<M, R>(
        self,
        params: &CurveParameters,
        isk: &IssuerSecretKey,
        request: &JoinRequestTpm,
        maker: &M,
        rng: &mut R,
    ) -> Result<(CredentialCipher, Credential), Error>
    where
        M: CredentialMaker,
        R: RngCore + CryptoRng,
    {
        let credential = self.issue(params, isk, &request.request)?;
        let cipher =
            CredentialCipher::seal(&credential, &request.ek_cert, &request.srk_name, maker, rng)?;
        Ok((cipher, credential))
    }
}

/// Join request of a TPM member, with what the issuer needs to encrypt the
/// credential for that TPM.
#[cfg(feature = "tpm")]
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct JoinRequestTpm {
    pub(crate) request: JoinRequest,
    pub(crate) ek_cert: Vec<u8>,
    pub(crate) srk_name: Vec<u8>,
}

/// What a TPM member remembers until its credential is activated.
#[cfg(feature = "tpm")]
#[derive(Debug, PartialEq, Eq)]
pub struct MemberJoinSession {
    B: G1Projective,
    D: G1Projective,
    handles: KeyHandles,
}

#[cfg(feature = "tpm")]
impl JoinRequestTpm {
    /// # Description
    /// TPM member side of the join. `TPM2_Commit` with the base given as `(s2, y2)`
    /// returns `E = B^r` and `K = B^sk`, which is the member key `Q`; the TPM then
    /// signs `c' = H(E, B, Q)`.
    ///
    /// # Inputs:
    /// * `params` (REQUIRED), curve parameters.
    /// * `seed` (REQUIRED), join seed received from the issuer.
    /// * `tpm` (REQUIRED), the member TPM.
    /// * `handles` (REQUIRED), handles of the ECDAA key, EK and SRK.
    ///
    /// # Output:
    /// the request and the member session needed to activate the credential.
    pub fn generate<T: Tpm>(
        params: &CurveParameters,
        seed: &JoinSeed,
        tpm: &mut T,
        handles: &KeyHandles,
    ) -> Result<(Self, MemberJoinSession), Error> {
        let B = seed.base_point()?;

        let commit = tpm.commit(handles.key, &EccPoint::from_g1(&B), &seed.s2, &seed.y2)?;
        let points = || -> Result<_, Error> {
            let E = commit.E.to_g1()?;
            let Q = commit
                .K
                .ok_or_else(|| Error::TpmCommError("commit did not return K".to_owned()))?
                .to_g1()?;
            Ok((E, Q))
        };
        let (E, Q) = match points() {
            Ok(points) => points,
            Err(e) => {
                release_commit(tpm, handles.key, commit.counter);
                return Err(e);
            }
        };

        let c_prime = challenge_prime(&E, &B, &Q, None, &[], &[]);
        let (c, s, n) = finish_signature(tpm, handles.key, commit.counter, &c_prime)?;
        let request = JoinRequest {
            proof: SchnorrProof { c, s, n, K: None },
            Q,
        };
        // the TPM answer is checked before it leaves the host
        request.verify(params, &B)?;

        let ek_cert = tpm.read_endorsement_cert()?;
        let session = MemberJoinSession {
            B,
            D: Q,
            handles: handles.clone(),
        };
        Ok((
            Self {
                request,
                ek_cert,
                srk_name: handles.srk_name.clone(),
            },
            session,
        ))
    }

    pub fn request(&self) -> &JoinRequest {
        &self.request
    }

    /// `request || len || ek_cert || len || srk_name`
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = self.request.to_bytes();
        put_var(&mut bytes, &self.ek_cert);
        put_var(&mut bytes, &self.srk_name);
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let mut reader = ByteReader::new(bytes);
        let request = JoinRequest::read(&mut reader)?;
        let ek_cert = reader.take_var()?.to_vec();
        let srk_name = reader.take_var()?.to_vec();
        reader.finish()?;
        Ok(Self {
            request,
            ek_cert,
            srk_name,
        })
    }
}

#[cfg(feature = "tpm")]
impl MemberJoinSession {
    pub fn handles(&self) -> &KeyHandles {
        &self.handles
    }

    /// # Description
    /// Decrypts `(A, C)` through `TPM2_ActivateCredential`, completes the credential
    /// with the `B` and `D` of the join and checks it against the issuer key.
    ///
    /// # Output:
    /// the credential, [`Error::CredentialDecryptionError`] or
    /// [`Error::InvalidCredential`].
    pub fn activate_credential<T: Tpm>(
        self,
        params: &CurveParameters,
        cipher: &CredentialCipher,
        ipk: &IssuerPublicKey,
        tpm: &mut T,
    ) -> Result<Credential, Error> {
        let (A, C) = cipher.open(tpm, &self.handles)?;
        let credential = Credential {
            A,
            B: self.B,
            C,
            D: self.D,
        };
        credential.verify(params, ipk)?;
        Ok(credential)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecdaa::keys::IssuerKeyPair;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn software_join() {
        let params = CurveParameters::default();
        let mut rng = StdRng::seed_from_u64(1);
        let (isk, ipk) = IssuerKeyPair::generate(&params, &mut rng).into_parts();

        let (seed, session) = JoinSeed::generate(&params, &mut rng).unwrap();
        assert_eq!(seed.base_point().unwrap(), session.B());

        let (request, sk) = JoinRequest::generate(&params, &seed, &mut rng).unwrap();
        assert_eq!(request.Q(), session.B() * sk.to_scalar());

        let cred = session.issue(&params, &isk, &request).unwrap();
        assert!(cred.verify(&params, &ipk).is_ok());
        assert_eq!(cred.D(), request.Q());
    }

    #[test]
    fn request_for_another_seed_is_rejected() {
        let params = CurveParameters::default();
        let mut rng = StdRng::seed_from_u64(2);
        let (isk, _) = IssuerKeyPair::generate(&params, &mut rng).into_parts();

        let (_, session) = JoinSeed::generate(&params, &mut rng).unwrap();
        let (other_seed, _) = JoinSeed::generate(&params, &mut rng).unwrap();
        let (request, _) = JoinRequest::generate(&params, &other_seed, &mut rng).unwrap();

        assert_eq!(session.issue(&params, &isk, &request), Err(Error::InvalidProof));
    }

    #[test]
    fn tampered_request_is_rejected() {
        let params = CurveParameters::default();
        let mut rng = StdRng::seed_from_u64(3);
        let (seed, session) = JoinSeed::generate(&params, &mut rng).unwrap();
        let (request, _) = JoinRequest::generate(&params, &seed, &mut rng).unwrap();

        let mut bad = request;
        bad.Q = bad.Q.double();
        assert_eq!(bad.verify(&params, &session.B()), Err(Error::InvalidProof));

        let mut bad = request;
        bad.Q = G1Projective::IDENTITY;
        assert_eq!(bad.verify(&params, &session.B()), Err(Error::InvalidProof));
    }

    #[test]
    fn seed_and_request_decode_their_encoding() {
        let params = CurveParameters::default();
        let mut rng = StdRng::seed_from_u64(4);
        let (seed, _) = JoinSeed::generate(&params, &mut rng).unwrap();
        assert_eq!(seed.basename().len(), JOIN_BASENAME_BYTES);
        assert_eq!(JoinSeed::from_bytes(&seed.to_bytes()).unwrap(), seed);

        let mut bad = seed.clone();
        bad.s2[VARINT_LEN] ^= 1;
        assert!(matches!(JoinSeed::from_bytes(&bad.to_bytes()), Err(Error::EncodingError(_))));

        let (request, _) = JoinRequest::generate(&params, &seed, &mut rng).unwrap();
        let bytes = request.to_bytes();
        assert_eq!(JoinRequest::from_bytes(&bytes).unwrap(), request);
        assert!(JoinRequest::from_bytes(&bytes[1..]).is_err());
    }

    #[cfg(feature = "tpm")]
    mod tpm {
        use super::*;
        use crate::tpm::software::{SoftwareCredentialMaker, SoftwareTpm};

        #[test]
        fn tpm_join_with_encrypted_credential() {
            let params = CurveParameters::default();
            let mut rng = StdRng::seed_from_u64(5);
            let (isk, ipk) = IssuerKeyPair::generate(&params, &mut rng).into_parts();
            let mut tpm = SoftwareTpm::new(&mut rng);
            let handles = tpm.create_key();

            let (seed, issuer_session) = JoinSeed::generate(&params, &mut rng).unwrap();
            let (request, member_session) =
                JoinRequestTpm::generate(&params, &seed, &mut tpm, &handles).unwrap();
            let sk = tpm.disclose_key(handles.key).unwrap().to_scalar();
            assert_eq!(request.request().Q(), issuer_session.B() * sk);

            let (cipher, issued) = issuer_session
                .issue_encrypted(&params, &isk, &request, &SoftwareCredentialMaker, &mut rng)
                .unwrap();
            let cred = member_session
                .activate_credential(&params, &cipher, &ipk, &mut tpm)
                .unwrap();
            assert_eq!(cred, issued);
            assert_eq!(tpm.pending_commits(), 0);
        }

        #[test]
        fn activation_under_another_issuer_fails_closed() {
            let params = CurveParameters::default();
            let mut rng = StdRng::seed_from_u64(6);
            let (isk, _) = IssuerKeyPair::generate(&params, &mut rng).into_parts();
            let other_ipk = *IssuerKeyPair::generate(&params, &mut rng).public_key();
            let mut tpm = SoftwareTpm::new(&mut rng);
            let handles = tpm.create_key();

            let (seed, issuer_session) = JoinSeed::generate(&params, &mut rng).unwrap();
            let (request, member_session) =
                JoinRequestTpm::generate(&params, &seed, &mut tpm, &handles).unwrap();
            let (cipher, _) = issuer_session
                .issue_encrypted(&params, &isk, &request, &SoftwareCredentialMaker, &mut rng)
                .unwrap();

            assert_eq!(
                member_session.activate_credential(&params, &cipher, &other_ipk, &mut tpm),
                Err(Error::InvalidCredential)
            );
        }

        #[test]
        fn tpm_request_decodes_its_encoding() {
            let params = CurveParameters::default();
            let mut rng = StdRng::seed_from_u64(7);
            let mut tpm = SoftwareTpm::new(&mut rng);
            let handles = tpm.create_key();
            let (seed, _) = JoinSeed::generate(&params, &mut rng).unwrap();
            let (request, _) = JoinRequestTpm::generate(&params, &seed, &mut tpm, &handles).unwrap();

            let bytes = request.to_bytes();
            assert_eq!(JoinRequestTpm::from_bytes(&bytes).unwrap(), request);
            assert!(JoinRequestTpm::from_bytes(&bytes[..bytes.len() - 1]).is_err());
        }
    }
}
