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

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes128Gcm, Nonce};
use bls12_381_plus::G1Projective;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use super::{CredentialMaker, KeyHandles, Tpm};
use crate::ecdaa::credential::Credential;
use crate::errors::Error;
use crate::utils::util::{g1_to_bytes, put_var, ByteReader, G1_BYTES};

/// Length of the AES-128 key wrapped through `MakeCredential`
pub const SECRET_BYTES: usize = 16;
/// AES-GCM standard nonce size
pub const NONCE_BYTES: usize = 12;
/// Size of the sealed `A || C` including the GCM tag
pub const SEALED_CREDENTIAL_BYTES: usize = 2 * G1_BYTES + 16;

/// `A || C` of a credential encrypted for a single TPM.
///
/// `B` and `D` are not sent: the member already holds both from the join.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct CredentialCipher {
    pub(crate) enc_cred: Vec<u8>,
    pub(crate) nonce: [u8; NONCE_BYTES],
    pub(crate) id_object: Vec<u8>,
    pub(crate) wrapped_secret: Vec<u8>,
}

impl CredentialCipher {
    /// # Description
    /// Encrypts `A || C` with AES-128-GCM under a fresh secret, then wraps the
    /// secret for the TPM identified by `ek_cert` and `srk_name`.
    pub(crate) fn seal<M, R>(
        credential: &Credential,
        ek_cert: &[u8],
        srk_name: &[u8],
        maker: &M,
        rng: &mut R,
    ) -> Result<Self, Error>
    where
        M: CredentialMaker,
        R: RngCore + CryptoRng,
    {
        let mut secret = Zeroizing::new([0u8; SECRET_BYTES]);
        rng.fill_bytes(&mut secret[..]);
        let mut nonce = [0u8; NONCE_BYTES];
        rng.fill_bytes(&mut nonce);

        let plaintext = Zeroizing::new([g1_to_bytes(&credential.A), g1_to_bytes(&credential.C)].concat());
        let cipher = Aes128Gcm::new_from_slice(&secret[..])
            .map_err(|e| Error::KeyGenError(format!("cipher init failed: {e}")))?;
        let enc_cred = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_slice())
            .map_err(|e| Error::KeyGenError(format!("credential encryption failed: {e}")))?;

        let (id_object, wrapped_secret) = maker.make_credential(ek_cert, srk_name, &secret[..], rng)?;

        Ok(Self {
            enc_cred,
            nonce,
            id_object,
            wrapped_secret,
        })
    }

    /// # Description
    /// Recovers the wrapping secret through `TPM2_ActivateCredential` and decrypts
    /// `(A, C)`.
    ///
    /// # Output:
    /// `(A, C)` or [`Error::CredentialDecryptionError`].
    pub(crate) fn open<T: Tpm>(
        &self,
        tpm: &mut T,
        handles: &KeyHandles,
    ) -> Result<(G1Projective, G1Projective), Error> {
        let secret = Zeroizing::new(tpm.activate_credential(
            handles.ek,
            handles.srk,
            &self.id_object,
            &self.wrapped_secret,
        )?);
        if secret.len() != SECRET_BYTES {
            return Err(Error::CredentialDecryptionError);
        }

        let cipher = Aes128Gcm::new_from_slice(&secret[..])
            .map_err(|_| Error::CredentialDecryptionError)?;
        let plaintext = Zeroizing::new(
            cipher
                .decrypt(Nonce::from_slice(&self.nonce), self.enc_cred.as_slice())
                .map_err(|_| Error::CredentialDecryptionError)?,
        );

        let mut reader = ByteReader::new(&plaintext);
        let (A, C) = match (reader.g1(), reader.g1()) {
            (Ok(A), Ok(C)) => (A, C),
            _ => return Err(Error::CredentialDecryptionError),
        };
        reader.finish().map_err(|_| Error::CredentialDecryptionError)?;
        Ok((A, C))
    }

    /// `len || enc_cred || nonce || len || id_object || len || wrapped_secret`,
    /// lengths on 4 bytes big-endian
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(
            12 + NONCE_BYTES + self.enc_cred.len() + self.id_object.len() + self.wrapped_secret.len(),
        );
        put_var(&mut bytes, &self.enc_cred);
        bytes.extend_from_slice(&self.nonce);
        put_var(&mut bytes, &self.id_object);
        put_var(&mut bytes, &self.wrapped_secret);
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let mut reader = ByteReader::new(bytes);
        let enc_cred = reader.take_var()?.to_vec();
        let mut nonce = [0u8; NONCE_BYTES];
        nonce.copy_from_slice(reader.take(NONCE_BYTES)?);
        let id_object = reader.take_var()?.to_vec();
        let wrapped_secret = reader.take_var()?.to_vec();
        reader.finish()?;
        Ok(Self {
            enc_cred,
            nonce,
            id_object,
            wrapped_secret,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tpm::software::{SoftwareCredentialMaker, SoftwareTpm};
    use elliptic_curve::Group;
    use rand::{rngs::StdRng, SeedableRng};

    fn credential(rng: &mut StdRng) -> Credential {
        Credential {
            A: G1Projective::random(&mut *rng),
            B: G1Projective::random(&mut *rng),
            C: G1Projective::random(&mut *rng),
            D: G1Projective::random(&mut *rng),
        }
    }

    #[test]
    fn sealed_credential_opens_on_the_right_tpm() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut tpm = SoftwareTpm::new(&mut rng);
        let handles = tpm.create_key();
        let ek_cert = tpm.read_endorsement_cert().unwrap();
        let cred = credential(&mut rng);

        let sealed =
            CredentialCipher::seal(&cred, &ek_cert, &handles.srk_name, &SoftwareCredentialMaker, &mut rng)
                .unwrap();
        assert_eq!(sealed.enc_cred.len(), SEALED_CREDENTIAL_BYTES);
        assert_eq!(sealed.open(&mut tpm, &handles).unwrap(), (cred.A, cred.C));

        let mut other = SoftwareTpm::new(&mut rng);
        let other_handles = other.create_key();
        assert_eq!(
            sealed.open(&mut other, &other_handles),
            Err(Error::CredentialDecryptionError)
        );
    }

    #[test]
    fn tampered_cipher_does_not_open() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut tpm = SoftwareTpm::new(&mut rng);
        let handles = tpm.create_key();
        let ek_cert = tpm.read_endorsement_cert().unwrap();
        let cred = credential(&mut rng);

        let sealed =
            CredentialCipher::seal(&cred, &ek_cert, &handles.srk_name, &SoftwareCredentialMaker, &mut rng)
                .unwrap();

        let mut bad = sealed.clone();
        bad.enc_cred[0] ^= 1;
        assert_eq!(bad.open(&mut tpm, &handles), Err(Error::CredentialDecryptionError));

        let mut bad = sealed.clone();
        bad.wrapped_secret[0] ^= 1;
        assert_eq!(bad.open(&mut tpm, &handles), Err(Error::CredentialDecryptionError));

        let mut bad = sealed;
        bad.nonce[0] ^= 1;
        assert_eq!(bad.open(&mut tpm, &handles), Err(Error::CredentialDecryptionError));
    }

    #[test]
    fn cipher_decodes_its_encoding() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut tpm = SoftwareTpm::new(&mut rng);
        let handles = tpm.create_key();
        let ek_cert = tpm.read_endorsement_cert().unwrap();
        let sealed = CredentialCipher::seal(
            &credential(&mut rng),
            &ek_cert,
            &handles.srk_name,
            &SoftwareCredentialMaker,
            &mut rng,
        )
        .unwrap();

        let bytes = sealed.to_bytes();
        assert_eq!(CredentialCipher::from_bytes(&bytes).unwrap(), sealed);
        assert!(CredentialCipher::from_bytes(&bytes[..bytes.len() - 1]).is_err());
    }
}
