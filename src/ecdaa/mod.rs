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

//! Elliptic-curve [Direct Anonymous Attestation](https://fidoalliance.org/specs/fido-v2.0-id-20180227/fido-ecdaa-algorithm-v2.0-id-20180227.html)
//! over BLS12-381.
//!
//! An issuer certifies that a member holds a secret key without learning it. The member
//! then signs messages anonymously: signatures made under different basenames (or with
//! no basename) cannot be linked, while signatures under the same basename carry the
//! same pseudonym `K`. Members whose secret key is disclosed can be revoked.
//!
//! Main components:
//! - [`hash`]: Fiat-Shamir challenges and the deterministic hash to G1.
//! - [`keys`]: issuer key pair with its proof of knowledge, member secret keys.
//! - [`schnorr`]: the dual-base Schnorr proof used by the join and by signatures.
//! - [`credential`]: credential issuance, verification and randomization.
//! - [`join`]: the join protocol, for software and TPM members.
//! - [`signature`]: signers and signature verification.
//! - [`revocation`]: revocation lists.

pub mod credential;
pub mod hash;
pub mod join;
pub mod keys;
pub mod params;
pub mod revocation;
pub mod schnorr;
pub mod signature;
