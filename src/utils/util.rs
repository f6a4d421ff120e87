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

use bls12_381_plus::{G1Affine, G1Projective, G2Affine, G2Projective, Scalar};
use elliptic_curve::group::Curve;
use ff::Field;
use rand::{CryptoRng, RngCore};

use crate::errors::Error;

/// Length of a big-endian encoded scalar
pub const SCALAR_BYTES: usize = 32;
/// Length of a compressed G1 point
pub const G1_BYTES: usize = 48;
/// Length of a compressed G2 point
pub const G2_BYTES: usize = 96;
/// Length of a base field element (a single affine coordinate of a G1 point)
pub const FP_BYTES: usize = 48;
/// Maximum length of a zig-zag LEB128 varint of a 32 bit value; varints are always
/// written into a buffer of this size
pub const VARINT_LEN: usize = 5;

pub trait ScalarExt: Sized {
    fn to_bytes_be(&self) -> [u8; SCALAR_BYTES];
    fn from_bytes_be(bytes: &[u8; SCALAR_BYTES]) -> Result<Self, Error>;
}

impl ScalarExt for Scalar {
    fn to_bytes_be(&self) -> [u8; SCALAR_BYTES] {
        self.to_be_bytes()
    }

    fn from_bytes_be(bytes: &[u8; SCALAR_BYTES]) -> Result<Self, Error> {
        Option::<Scalar>::from(Scalar::from_be_bytes(bytes))
            .ok_or_else(|| Error::EncodingError("scalar is not canonical".to_owned()))
    }
}

/// I2OSP as defined in RFC 8017: `value` written big-endian on `len` bytes.
pub fn i2osp(value: usize, len: usize) -> Vec<u8> {
    let bytes = (value as u64).to_be_bytes();
    if len >= bytes.len() {
        let mut out = vec![0u8; len - bytes.len()];
        out.extend_from_slice(&bytes);
        out
    } else {
        bytes[bytes.len() - len..].to_vec()
    }
}

/// Signed varint (zig-zag + LEB128) of `value`, zero-padded to [`VARINT_LEN`] bytes.
///
/// This is the `BigNumberToB` counter encoding shared with the TPM: the whole
/// fixed-size buffer is hashed, trailing zeros included.
pub fn varint(value: u32) -> [u8; VARINT_LEN] {
    let mut out = [0u8; VARINT_LEN];
    let mut zigzag = (value as u64) << 1;
    let mut i = 0;
    while zigzag >= 0x80 {
        out[i] = (zigzag as u8) | 0x80;
        zigzag >>= 7;
        i += 1;
    }
    out[i] = zigzag as u8;
    out
}

pub fn g1_to_bytes(point: &G1Projective) -> [u8; G1_BYTES] {
    point.to_affine().to_compressed()
}

pub fn g2_to_bytes(point: &G2Projective) -> [u8; G2_BYTES] {
    point.to_affine().to_compressed()
}

pub fn parse_g1_projective(slice: &[u8]) -> Result<G1Projective, Error> {
    let bytes: &[u8; G1_BYTES] = slice
        .try_into()
        .map_err(|_| Error::EncodingError("invalid G1 point length".to_owned()))?;
    Option::<G1Affine>::from(G1Affine::from_compressed(bytes))
        .map(G1Projective::from)
        .ok_or_else(|| Error::EncodingError("invalid G1 point".to_owned()))
}

pub fn parse_g2_projective(slice: &[u8]) -> Result<G2Projective, Error> {
    let bytes: &[u8; G2_BYTES] = slice
        .try_into()
        .map_err(|_| Error::EncodingError("invalid G2 point length".to_owned()))?;
    Option::<G2Affine>::from(G2Affine::from_compressed(bytes))
        .map(G2Projective::from)
        .ok_or_else(|| Error::EncodingError("invalid G2 point".to_owned()))
}

pub fn parse_scalar(slice: &[u8]) -> Result<Scalar, Error> {
    let bytes: &[u8; SCALAR_BYTES] = slice
        .try_into()
        .map_err(|_| Error::EncodingError("invalid scalar length".to_owned()))?;
    Scalar::from_bytes_be(bytes)
}

/// Uniformly random non-zero scalar.
pub fn random_scalar<R: RngCore + CryptoRng>(rng: &mut R) -> Scalar {
    loop {
        let s = Scalar::random(&mut *rng);
        if !bool::from(s.is_zero()) {
            return s;
        }
    }
}

pub fn random_bytes<R: RngCore + CryptoRng>(rng: &mut R, len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    rng.fill_bytes(&mut buf);
    buf
}

/// Cursor over a wire buffer. Every read is bounds checked, and [`ByteReader::finish`]
/// rejects trailing garbage.
pub(crate) struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    pub(crate) fn take(&mut self, len: usize) -> Result<&'a [u8], Error> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.bytes.len())
            .ok_or_else(|| Error::EncodingError("buffer truncated".to_owned()))?;
        let out = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    pub(crate) fn take_u32(&mut self) -> Result<usize, Error> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]) as usize)
    }

    /// Length-prefixed byte string, the prefix being a 4 byte big-endian integer
    pub(crate) fn take_var(&mut self) -> Result<&'a [u8], Error> {
        let len = self.take_u32()?;
        self.take(len)
    }

    pub(crate) fn take_u8(&mut self) -> Result<u8, Error> {
        Ok(self.take(1)?[0])
    }

    pub(crate) fn g1(&mut self) -> Result<G1Projective, Error> {
        parse_g1_projective(self.take(G1_BYTES)?)
    }

    pub(crate) fn g2(&mut self) -> Result<G2Projective, Error> {
        parse_g2_projective(self.take(G2_BYTES)?)
    }

    pub(crate) fn scalar(&mut self) -> Result<Scalar, Error> {
        parse_scalar(self.take(SCALAR_BYTES)?)
    }

    pub(crate) fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    pub(crate) fn finish(self) -> Result<(), Error> {
        if self.remaining() != 0 {
            return Err(Error::EncodingError(format!(
                "{} unexpected trailing bytes",
                self.remaining()
            )));
        }
        Ok(())
    }
}

/// Appends `data` prefixed by its length as a 4 byte big-endian integer
pub(crate) fn put_var(out: &mut Vec<u8>, data: &[u8]) {
    out.extend_from_slice(&i2osp(data.len(), 4));
    out.extend_from_slice(data);
}

/// Serde helper writing a base field element as a hex string.
pub(crate) mod serde_fp {
    use super::FP_BYTES;
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8; FP_BYTES], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[u8; FP_BYTES], D::Error> {
        let encoded = String::deserialize(deserializer)?;
        let bytes = hex::decode(encoded).map_err(D::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| D::Error::custom("invalid field element length"))
    }
}
