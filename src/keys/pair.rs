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

use super::traits::{PrivateKey, PublicKey};
use serde::Deserialize;
use serde::Serialize;

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct KeyPair<PK: PublicKey, SK: PrivateKey> {
    pub(crate) public: PK,
    pub(crate) private: SK,
}

impl<PK, SK> KeyPair<PK, SK>
where
    PK: PublicKey,
    SK: PrivateKey,
{
    pub fn public_key(&self) -> &PK {
        &self.public
    }

    pub fn private_key(&self) -> &SK {
        &self.private
    }

    /// Returns the couple `(sk, pk)`.
    pub fn into_parts(self) -> (SK, PK) {
        (self.private, self.public)
    }
}
