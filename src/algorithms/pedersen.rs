//! Ring-Pedersen parameters
//!
//! The parameters consist of the private values $` p, q, \lambda `$ and the public values $` \hat{N}, s, t `$
//! where $` \hat{N} = p q `$, $` t `$ is a random quadratic residue modulo $` \hat{N} `$ and $` s = t^{\lambda} `$.
//!
//! The modulus is shared with the Paillier key of the party. The Paillier key proof establishes that $` \hat{N} `$ is square-free
//! and the pair of dlog proofs establishes that $` s \in \langle t \rangle `$ and $` t \in \langle s \rangle `$.
use crate::algorithms::dlog_proof::DlogProof;
use crate::algorithms::sha::Transcript;
use crate::algorithms::{pow_signed, SampleFromMultiplicativeGroup};
use curv::arithmetic::traits::{Samplable, ZeroizeBN};
use curv::BigInt;
use paillier::DecryptionKey;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use thiserror::Error;
use trace::trace;
use zeroize::Zeroize;

#[derive(Debug, Error)]
#[error("Ring-Pedersen parameters verification error: {0}")]
pub struct PedersenVerificationError(String);

/// Public Ring-Pedersen parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PedersenParameters {
    pub n: BigInt,
    pub s: BigInt,
    pub t: BigInt,
}

impl PedersenParameters {
    /// $` s^{x} t^{y} \mod \hat{N} `$ for signed exponents
    pub fn commit(&self, x: &BigInt, y: &BigInt) -> Option<BigInt> {
        let s_x = pow_signed(&self.s, x, &self.n)?;
        let t_y = pow_signed(&self.t, y, &self.n)?;
        Some(s_x * t_y % &self.n)
    }

    /// $` a \cdot b^{e} \mod \hat{N} `$
    pub fn combine(&self, a: &BigInt, b: &BigInt, e: &BigInt) -> Option<BigInt> {
        pow_signed(b, e, &self.n).map(|b_e| a * b_e % &self.n)
    }

    /// structural checks of the public values
    pub fn is_valid(&self) -> bool {
        let one = BigInt::one();
        let in_group = |x: &BigInt| *x > one && *x < self.n && x.gcd(&self.n) == one;
        in_group(&self.s) && in_group(&self.t) && self.s != self.t
    }
}

/// Ring-Pedersen parameters including the trapdoor
#[derive(Clone)]
pub struct PedersenSetup {
    p: BigInt,
    q: BigInt,
    lambda: BigInt,
    pub params: PedersenParameters,
}

impl fmt::Debug for PedersenSetup {
    /// hides the trapdoor
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PedersenSetup")
            .field("lambda", &"[***]".to_owned())
            .field("params", &self.params)
            .finish()
    }
}

impl Zeroize for PedersenSetup {
    fn zeroize(&mut self) {
        self.p.zeroize_bn();
        self.q.zeroize_bn();
        self.lambda.zeroize_bn();
    }
}

impl Drop for PedersenSetup {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl PedersenSetup {
    /// creates the parameters over the modulus of given Paillier key
    pub fn from_paillier(dk: &DecryptionKey) -> Self {
        let One = &BigInt::one();
        let n = dk.p.borrow() * dk.q.borrow();
        let mut phi = (dk.p.borrow() - One) * (dk.q.borrow() - One);

        let r = BigInt::from_modulo(&n);
        let t = r.borrow() * r.borrow() % &n;
        let lambda = loop {
            let lambda = BigInt::sample_below(&phi);
            if lambda > *One && lambda.invert(&phi).is_some() {
                break lambda;
            }
        };
        phi.zeroize_bn();
        let s = t.powm_sec(&lambda, &n);

        Self {
            p: dk.p.clone(),
            q: dk.q.clone(),
            lambda,
            params: PedersenParameters { n, s, t },
        }
    }

    pub(crate) fn phi(&self) -> BigInt {
        let One = &BigInt::one();
        (self.p.borrow() - One) * (self.q.borrow() - One)
    }

    pub(crate) fn lambda(&self) -> &BigInt {
        &self.lambda
    }
}

/// Public Ring-Pedersen parameters along with the proofs of their correctness
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PedersenPublicSetup {
    pub params: PedersenParameters,
    pub dlog_proof: DlogProof,
    pub inv_dlog_proof: DlogProof,
}

#[trace(pretty, prefix = "PedersenPublicSetup::")]
impl PedersenPublicSetup {
    pub const DLOG_PROOF_SECURITY_PARAMETER: u32 = 128;

    ///  Creates new public setup from private one
    ///
    ///  Generates proofs of knowledge of $` \lambda , \lambda^{-1} `$
    pub fn from_private(setup: &PedersenSetup, transcript: &Transcript) -> Self {
        let mut phi = setup.phi();
        let max_secret_length = phi.bit_length() as u32;
        // invertibility was checked when the setup was created
        let mut inv_lambda = setup.lambda.invert(&phi).unwrap_or_else(BigInt::one);
        phi.zeroize_bn();

        let params = &setup.params;
        let result = Self {
            params: params.clone(),
            dlog_proof: DlogProof::create(
                transcript,
                &params.n,
                &params.t,
                &params.s,
                &setup.lambda,
                max_secret_length,
                Self::DLOG_PROOF_SECURITY_PARAMETER,
            ),
            inv_dlog_proof: DlogProof::create(
                transcript,
                &params.n,
                &params.s,
                &params.t,
                &inv_lambda,
                max_secret_length,
                Self::DLOG_PROOF_SECURITY_PARAMETER,
            ),
        };
        inv_lambda.zeroize_bn();
        result
    }

    pub fn verify(&self, transcript: &Transcript) -> Result<(), PedersenVerificationError> {
        let params = &self.params;
        if !params.is_valid() {
            return Err(PedersenVerificationError(
                "s and t must be distinct non-trivial units".to_string(),
            ));
        }
        if !self
            .dlog_proof
            .verify(transcript, &params.n, &params.t, &params.s)
        {
            return Err(PedersenVerificationError("Dlog proof failed".to_string()));
        }
        if !self
            .inv_dlog_proof
            .verify(transcript, &params.n, &params.s, &params.t)
        {
            return Err(PedersenVerificationError(
                "inverse Dlog proof failed".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecdsa::PaillierKeys;
    use crate::protocol::SessionId;

    #[test]
    fn public_setup_verifies() {
        let keys = PaillierKeys::random();
        let setup = PedersenSetup::from_paillier(&keys.dk);
        assert_eq!(setup.params.n, keys.ek.n);
        assert!(setup.params.is_valid());

        let transcript = Transcript::with_session("test", &SessionId([5u8; 32]));
        let public = PedersenPublicSetup::from_private(&setup, &transcript);
        assert!(public.verify(&transcript).is_ok());

        let mut tampered = public.clone();
        tampered.params.s = tampered.params.s.powm_sec(&BigInt::from(3), &tampered.params.n);
        assert!(tampered.verify(&transcript).is_err());
    }

    #[test]
    fn commitment_with_negative_exponents() {
        let keys = PaillierKeys::random();
        let params = PedersenSetup::from_paillier(&keys.dk).params.clone();
        let x = BigInt::from(17);
        let minus_x = BigInt::zero() - &x;
        let y = BigInt::from(99);
        let minus_y = BigInt::zero() - &y;

        let c = params.commit(&x, &y).unwrap();
        let c_inv = params.commit(&minus_x, &minus_y).unwrap();
        assert_eq!(c * c_inv % &params.n, BigInt::one());
    }
}
