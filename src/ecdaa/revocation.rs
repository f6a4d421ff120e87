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
use serde::{Deserialize, Serialize};

use super::credential::Credential;
use crate::errors::Error;
use crate::utils::util::{i2osp, ByteReader, ScalarExt, SCALAR_BYTES};

/// Secret keys of members whose keys have been disclosed.
#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct RevocationList(Vec<Scalar>);

impl RevocationList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, sk: Scalar) {
        if !self.0.contains(&sk) {
            self.0.push(sk);
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Scalar> {
        self.0.iter()
    }

    /// `true` if `D == B^r` for some revoked `r`
    pub fn is_revoked(&self, B: &G1Projective, D: &G1Projective) -> bool {
        self.0.iter().any(|r| B * r == *D)
    }

    pub(crate) fn check(&self, credential: &Credential) -> Result<(), Error> {
        if self.is_revoked(&credential.B, &credential.D) {
            log::warn!("signature made with a revoked key");
            return Err(Error::Revoked);
        }
        Ok(())
    }

    /// Number of entries on 4 bytes, then the scalars
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = i2osp(self.0.len(), 4);
        for sk in &self.0 {
            bytes.extend_from_slice(&sk.to_bytes_be());
        }
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let mut reader = ByteReader::new(bytes);
        let count = reader.take_u32()?;
        if count.checked_mul(SCALAR_BYTES) != Some(reader.remaining()) {
            return Err(Error::EncodingError("revocation list length mismatch".to_owned()));
        }
        let keys = (0..count).map(|_| reader.scalar()).collect::<Result<Vec<_>, _>>()?;
        reader.finish()?;
        Ok(Self(keys))
    }
}

impl FromIterator<Scalar> for RevocationList {
    fn from_iter<T: IntoIterator<Item = Scalar>>(iter: T) -> Self {
        let mut list = Self::new();
        for sk in iter {
            list.push(sk);
        }
        list
    }
}
