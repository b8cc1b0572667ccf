//!   Content types exchanged by MPC algorithms in the crate
//!
//! Each type is bound to the round which consumes it, see [`Content`](../../round/trait.Content.html).
use crate::algorithms::sha::HASH_BYTES;
use crate::protocol::PartyId;
use crate::Error;
use curv::elliptic::curves::traits::ECScalar;
use curv::{BigInt, FE};

fn check_length(from: &PartyId, what: &str, value: &[u8]) -> Result<(), Error> {
    if value.len() == HASH_BYTES {
        Ok(())
    } else {
        Err(Error::validation(
            from,
            format!("{} has {} bytes, expected {}", what, value.len(), HASH_BYTES),
        ))
    }
}

/// checks `0 <= x < q`
fn check_scalar(from: &PartyId, what: &str, x: &BigInt) -> Result<(), Error> {
    if *x >= BigInt::zero() && *x < FE::q() {
        Ok(())
    } else {
        Err(Error::validation(from, format!("{} is out of range", what)))
    }
}

/// key generation and key refresh related content types
pub mod keygen {
    use super::check_length;
    use crate::algorithms::nizk_rsa::PaillierKeyProof;
    use crate::algorithms::pedersen::PedersenPublicSetup;
    use crate::algorithms::schnorr::SchnorrResponse;
    use crate::ecdsa::polynomial::Exponent;
    use crate::protocol::{PartyId, RoundNumber};
    use crate::round::{Content, EchoHash, Helper};
    use crate::Error;
    use curv::{BigInt, GE};
    use paillier::EncryptionKey;
    use serde::{Deserialize, Serialize};

    /// Hash commitment to the [`Decommitment`] of the sender
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Commitment {
        pub hash: Vec<u8>,
    }

    impl Content for Commitment {
        const ROUND: RoundNumber = 2;

        fn validate(&self, from: &PartyId) -> Result<(), Error> {
            check_length(from, "commitment", &self.hash)
        }
    }

    /// Hash over commitments of all parties as seen by the sender
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Echo {
        pub hash: EchoHash,
    }

    impl Content for Echo {
        const ROUND: RoundNumber = 3;

        fn validate(&self, from: &PartyId) -> Result<(), Error> {
            check_length(from, "echo hash", &self.hash.0)
        }
    }

    /// Public data of the sender, opening its commitment
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Decommitment {
        /// contribution to the common random string
        pub rid: Vec<u8>,
        /// commitment to the sharing polynomial of the sender
        pub exponent: Exponent,
        /// first message of the Schnorr proof of the constant term
        pub schnorr_commitment: GE,
        /// Paillier modulus
        pub paillier: BigInt,
        pub paillier_proof: PaillierKeyProof,
        pub pedersen: PedersenPublicSetup,
        /// nonce of the commitment
        pub u: Vec<u8>,
    }

    impl Content for Decommitment {
        const ROUND: RoundNumber = 4;
        const BROADCAST: bool = true;

        fn validate(&self, from: &PartyId) -> Result<(), Error> {
            check_length(from, "rid", &self.rid)?;
            check_length(from, "nonce", &self.u)?;
            if self.exponent.degree() == 0 {
                return Err(Error::validation(from, "empty sharing polynomial"));
            }
            Ok(())
        }
    }

    impl Decommitment {
        /// $` H(ssid, from, rid, F, A, N, s, t, u) `$
        pub fn commit(&self, helper: &Helper, from: &PartyId) -> Vec<u8> {
            let mut transcript = helper.transcript_for(from).fork("keygen commitment");
            transcript.write_bytes(&self.rid);
            match &self.exponent.constant {
                Some(point) => transcript.write_bytes(&[1u8]).write_point(point),
                None => transcript.write_bytes(&[0u8]),
            };
            self.exponent.coefficients.iter().for_each(|point| {
                transcript.write_point(point);
            });
            let params = &self.pedersen.params;
            transcript
                .write_point(&self.schnorr_commitment)
                .write_bigints(&[&self.paillier, &params.n, &params.s, &params.t])
                .write_bytes(&self.u);
            transcript.finalize().to_vec()
        }

        pub fn paillier_key(&self) -> EncryptionKey {
            EncryptionKey {
                nn: &self.paillier * &self.paillier,
                n: self.paillier.clone(),
            }
        }
    }

    /// Share of the sharing polynomial of the sender, encrypted under the Paillier key of the recipient
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Share {
        pub share: BigInt,
        /// proof of knowledge of the constant term, key generation only
        pub schnorr: Option<SchnorrResponse>,
    }

    impl Content for Share {
        const ROUND: RoundNumber = 5;

        fn validate(&self, from: &PartyId) -> Result<(), Error> {
            if self.share <= BigInt::zero() {
                return Err(Error::validation(from, "share ciphertext is not positive"));
            }
            Ok(())
        }
    }
}

/// signing related content types
pub mod signing {
    use super::{check_length, check_scalar};
    use crate::ecdsa::mta::MtaMessage;
    use crate::protocol::{PartyId, RoundNumber};
    use crate::round::{Content, EchoHash};
    use crate::Error;
    use curv::{BigInt, GE};
    use serde::{Deserialize, Serialize};

    /// $` K_i = Enc_i(k_i), G_i = Enc_i(\gamma_i) `$
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Ciphertexts {
        pub k: BigInt,
        pub g: BigInt,
    }

    impl Content for Ciphertexts {
        const ROUND: RoundNumber = 2;
        const BROADCAST: bool = true;
    }

    /// Both conversions of the sender with the recipient along with $` \Gamma_i = \gamma_i \cdot G `$
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Conversions {
        pub big_gamma: GE,
        /// hash over ciphertexts of all parties as seen by the sender
        pub echo: EchoHash,
        /// $` \gamma_i \cdot k_j `$
        pub delta: MtaMessage,
        /// $` \lambda_i x_i \cdot k_j `$
        pub chi: MtaMessage,
    }

    impl Content for Conversions {
        const ROUND: RoundNumber = 3;

        fn validate(&self, from: &PartyId) -> Result<(), Error> {
            check_length(from, "echo hash", &self.echo.0)
        }
    }

    /// $` \delta_i `$ and $` \Delta_i = k_i \cdot \Gamma `$
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Delta {
        pub delta: BigInt,
        pub big_delta: GE,
    }

    impl Content for Delta {
        const ROUND: RoundNumber = 4;
        const BROADCAST: bool = true;

        fn validate(&self, from: &PartyId) -> Result<(), Error> {
            check_scalar(from, "delta", &self.delta)
        }
    }

    /// share $` \sigma_i `$ of the signature
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Sigma {
        pub sigma: BigInt,
    }

    impl Content for Sigma {
        const ROUND: RoundNumber = 5;
        const BROADCAST: bool = true;

        fn validate(&self, from: &PartyId) -> Result<(), Error> {
            check_scalar(from, "sigma", &self.sigma)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::keygen::Commitment;
    use crate::protocol::PartyId;
    use crate::round::Content;
    use crate::Error;

    #[test]
    fn commitment_of_wrong_length_is_invalid() {
        let from = PartyId::from("alice");
        assert!(Commitment { hash: vec![0u8; 32] }.validate(&from).is_ok());
        for len in &[0usize, 31, 33] {
            match (Commitment { hash: vec![0u8; *len] }).validate(&from) {
                Err(Error::Validation { from: party, .. }) => assert_eq!(party, from),
                other => panic!("unexpected result {:?}", other),
            }
        }
    }
}
