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

use thiserror::Error;

#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("Error during key generation: {0}")]
    KeyGenError(String),
    #[error("Issuer public key proof is not valid")]
    InvalidIssuerKey,

    /// The Schnorr challenge recomputed by the verifier does not match
    #[error("Invalid Schnorr proof")]
    InvalidProof,
    /// One of the two pairing equations of the credential does not hold
    #[error("Invalid credential")]
    InvalidCredential,
    #[error("The secret key of the signer has been revoked")]
    Revoked,

    /// Try-and-increment exhausted all the allowed iterations
    #[error("Hash to curve point failed")]
    HashFailure,

    #[error("TPM communication error: {0}")]
    TpmCommError(String),
    #[error("Credential decryption failed")]
    CredentialDecryptionError,

    #[error("Error during decoding: {0}")]
    EncodingError(String),
}
