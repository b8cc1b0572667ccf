//! Schnorr proof of knowledge of a discrete logarithm, with the commitment published ahead of the statement
//!
//! The prover commits to $` A = a \cdot G `$ early in the protocol, and answers with $` z = a + e x `$
//! once the statement $` X = x \cdot G `$ is known. The challenge $` e `$ comes from the session transcript.
use crate::algorithms::add_points;
use crate::algorithms::sha::Transcript;
use curv::elliptic::curves::traits::{ECPoint, ECScalar};
use curv::{FE, GE};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

const DOMAIN: &str = "schnorr proof";

#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct SchnorrRandomness {
    a: FE,
}

impl SchnorrRandomness {
    pub fn new() -> Self {
        Self {
            a: ECScalar::new_random(),
        }
    }

    pub fn commitment(&self) -> GE {
        GE::generator() * self.a
    }

    pub fn prove(&self, transcript: &Transcript, public: &GE, secret: &FE) -> SchnorrResponse {
        let e = challenge(transcript, public, &self.commitment());
        SchnorrResponse {
            z: self.a + e * secret,
        }
    }
}

impl Default for SchnorrRandomness {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchnorrResponse {
    z: FE,
}

impl SchnorrResponse {
    pub fn verify(&self, transcript: &Transcript, public: &GE, commitment: &GE) -> bool {
        let e = challenge(transcript, public, commitment);
        add_points(commitment, &(*public * e)).map_or(false, |rhs| GE::generator() * self.z == rhs)
    }
}

fn challenge(transcript: &Transcript, public: &GE, commitment: &GE) -> FE {
    let mut t = transcript.fork(DOMAIN);
    t.write_point(public).write_point(commitment);
    ECScalar::from(&t.challenge(&FE::q()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::SessionId;

    #[test]
    fn knowledge_of_dlog() {
        let transcript = Transcript::with_session("test", &SessionId([9u8; 32]));
        (0..5).for_each(|_| {
            let x: FE = ECScalar::new_random();
            let public = GE::generator() * x;
            let randomness = SchnorrRandomness::new();
            let commitment = randomness.commitment();
            let response = randomness.prove(&transcript, &public, &x);

            assert!(response.verify(&transcript, &public, &commitment));
            assert!(!response.verify(&transcript, &GE::random_point(), &commitment));
            assert!(!response.verify(
                &Transcript::with_session("test", &SessionId([8u8; 32])),
                &public,
                &commitment
            ));
        });
    }
}
