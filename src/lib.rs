#![allow(non_snake_case)]
#![allow(non_upper_case_globals)]

//! ECDAA: pairing-based Direct Anonymous Attestation, with members backed either by
//! software keys or by a TPM 2.0 (feature `tpm`, enabled by default).

pub mod ecdaa;
pub mod errors;
pub mod keys;
#[cfg(feature = "tpm")]
pub mod tpm;
pub mod utils;
