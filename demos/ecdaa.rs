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

#[cfg(feature = "tpm")]
mod ecdaa_example {
    use ecdaa::{
        ecdaa::{
            join::{JoinRequest, JoinRequestTpm, JoinSeed},
            keys::IssuerKeyPair,
            params::CurveParameters,
            revocation::RevocationList,
            signature::{MemberSigner, Signer, SoftwareSigner, TpmSigner},
        },
        errors::Error,
        tpm::software::{SoftwareCredentialMaker, SoftwareTpm},
    };

    pub(crate) fn ecdaa_main(use_tpm: bool) -> Result<(), Error> {
        const MESSAGE: &[u8] = b"hoge";
        const BASENAME: &[u8] = b"fuga";

        let params = CurveParameters::default();
        let mut rng = rand::thread_rng();

        log::info!("Issuer Keypair Generation");
        let issuer_keypair = IssuerKeyPair::generate(&params, &mut rng);
        let issuer_pk = issuer_keypair.public_key();
        log::info!("PK: {}", issuer_pk.encode());
        issuer_pk.verify(&params)?;
        log::info!("Issuer public key proof is VALID");

        log::info!("Join Seed Generation...");
        let (seed, issuer_session) = JoinSeed::generate(&params, &mut rng)?;
        log::info!("Basename: {}", hex::encode(seed.basename()));

        let mut member: MemberSigner<SoftwareTpm> = if use_tpm {
            let mut device = SoftwareTpm::new(&mut rng);
            let handles = device.create_key();

            log::info!("Join Request Generation (TPM)...");
            let (request, member_session) =
                JoinRequestTpm::generate(&params, &seed, &mut device, &handles)?;

            log::info!("Encrypted Credential Issuance...");
            let (cipher, _) = issuer_session.issue_encrypted(
                &params,
                issuer_keypair.private_key(),
                &request,
                &SoftwareCredentialMaker,
                &mut rng,
            )?;
            log::info!("Credential cipher: {}", hex::encode(cipher.to_bytes()));

            log::info!("Credential Activation...");
            let credential =
                member_session.activate_credential(&params, &cipher, issuer_pk, &mut device)?;
            MemberSigner::Tpm(TpmSigner::new(params, credential, handles, device))
        } else {
            log::info!("Join Request Generation...");
            let (request, sk) = JoinRequest::generate(&params, &seed, &mut rng)?;

            log::info!("Credential Issuance...");
            let credential = issuer_session.issue(&params, issuer_keypair.private_key(), &request)?;
            credential.verify(&params, issuer_pk)?;
            MemberSigner::Software(SoftwareSigner::new(params, credential, sk))
        };
        log::info!("Credential is VALID");

        log::info!("Signature Computation...");
        let signature = member.sign(MESSAGE, Some(BASENAME), &mut rng)?;
        log::info!("Signature: {}", hex::encode(signature.to_bytes()));

        let revocation_list = RevocationList::new();
        signature.verify(&params, MESSAGE, Some(BASENAME), issuer_pk, &revocation_list)?;
        log::info!("Signature is VALID");

        let wrong = signature.verify(&params, b"hoge2", Some(BASENAME), issuer_pk, &revocation_list);
        assert_eq!(wrong, Err(Error::InvalidProof), "Signature on a different message accepted!");
        log::info!("Signature on a different message is INVALID");

        Ok(())
    }
}

#[cfg(feature = "tpm")]
fn main() {
    use crate::ecdaa_example::ecdaa_main;
    use std::env;

    dotenvy::dotenv().ok();
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    if args.len() != 2 {
        println!(
            "Usage: {} <member>
                Members:
                    - software
                    - tpm",
            args[0]
        );
        return;
    }

    let result = match args[1].as_str() {
        "software" => ecdaa_main(false),
        "tpm" => ecdaa_main(true),
        other => {
            println!("Unknown member type: {}", other);
            return;
        }
    };

    if let Err(e) = result {
        log::error!("{}", e);
    }
}

#[cfg(not(feature = "tpm"))]
fn main() {}
