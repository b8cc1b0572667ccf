//! Multiplicative-to-additive share conversion
//!
//! The sender holds $` a `$ with public $` A = a \cdot G `$, the receiver holds $` b `$ encrypted under its own Paillier key as $` K = Enc_{j}(b) `$.
//! The sender picks $` \beta' \in [0, 2^{L'}) `$ and sends
//! ```math
//!   D = K^{a} \cdot Enc_{j}(-\beta') , \quad Y = Enc_{i}(-\beta')
//! ```
//! along with Πaff-g proof. The receiver decrypts $` \alpha = Dec_{j}(D) \mod q `$, the sender keeps $` \beta = \beta' \mod q `$,
//! so that $` \alpha + \beta = a b \mod q `$.
use crate::algorithms::affg::{AffGProof, AffGStatement, AffGWitness};
use crate::algorithms::pedersen::PedersenParameters;
use crate::algorithms::sha::Transcript;
use crate::algorithms::{
    encrypt_signed, is_valid_ciphertext, pow_signed, SampleFromMultiplicativeGroup, L_PRIME,
};
use crate::ecdsa::PaillierKeys;
use crate::protocol::PartyId;
use crate::Error;
use curv::arithmetic::traits::{Samplable, ZeroizeBN};
use curv::elliptic::curves::traits::ECScalar;
use curv::{BigInt, FE, GE};
use paillier::EncryptionKey;
use serde::{Deserialize, Serialize};

const PROOF_NAME: &str = "affine operation";

/// Public keys of both sides of the conversion
#[derive(Clone, Copy)]
pub struct MtaKeys<'a> {
    pub sender: &'a EncryptionKey,
    pub receiver: &'a EncryptionKey,
    /// Ring-Pedersen parameters of the receiver
    pub aux: &'a PedersenParameters,
}

/// Content sent by the sender to the receiver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MtaMessage {
    pub d: BigInt,
    pub y: BigInt,
    pub proof: AffGProof,
}

/// Sender side of the conversion
pub struct Mta {
    beta_neg: BigInt,
    beta: BigInt,
    message: MtaMessage,
}

impl Drop for Mta {
    fn drop(&mut self) {
        self.beta_neg.zeroize_bn();
        self.beta.zeroize_bn();
    }
}

impl Mta {
    /// Computes the message for the receiver owning the ciphertext `k`
    ///
    /// `a` is the secret of the sender reduced modulo $`q`$, `big_a` is $` a \cdot G `$.
    pub fn new(
        transcript: &Transcript,
        a: &BigInt,
        big_a: &GE,
        k: &BigInt,
        keys: MtaKeys,
    ) -> Result<Self, Error> {
        let receiver = keys.receiver;
        let beta_neg = BigInt::sample_below(&(BigInt::one() << L_PRIME));
        let mut y = BigInt::zero() - &beta_neg;
        let mut rho = BigInt::from_paillier_key(receiver);
        let mut rho_y = BigInt::from_paillier_key(keys.sender);

        let k_a = pow_signed(k, a, &receiver.nn)
            .ok_or_else(|| Error::Protocol("ciphertext is not invertible".to_string()))?;
        let d = k_a * encrypt_signed(receiver, &y, &rho) % &receiver.nn;
        let y_enc = encrypt_signed(keys.sender, &y, &rho_y);

        let statement = AffGStatement {
            c: k,
            d: &d,
            y: &y_enc,
            x: big_a,
            verifier_ek: receiver,
            prover_ek: keys.sender,
            aux: keys.aux,
        };
        let witness = AffGWitness {
            x: a,
            y: &y,
            rho: &rho,
            rho_y: &rho_y,
        };
        let proof = AffGProof::prove(transcript, &statement, &witness);

        y.zeroize_bn();
        rho.zeroize_bn();
        rho_y.zeroize_bn();

        let proof = proof.ok_or_else(|| {
            Error::Protocol("cannot create proof of the affine operation".to_string())
        })?;

        Ok(Self {
            beta: beta_neg.mod_floor(&FE::q()),
            beta_neg,
            message: MtaMessage {
                d,
                y: y_enc,
                proof,
            },
        })
    }

    pub fn message(&self) -> &MtaMessage {
        &self.message
    }

    /// additive share of the sender, reduced modulo $`q`$
    pub fn beta(&self) -> &BigInt {
        &self.beta
    }
}

impl MtaMessage {
    /// Verifies the proof of the sender `from` against its public $`A`$ and the ciphertext `k` of the receiver
    pub fn verify(
        &self,
        transcript: &Transcript,
        from: &PartyId,
        big_a: &GE,
        k: &BigInt,
        keys: MtaKeys,
    ) -> Result<(), Error> {
        let statement = AffGStatement {
            c: k,
            d: &self.d,
            y: &self.y,
            x: big_a,
            verifier_ek: keys.receiver,
            prover_ek: keys.sender,
            aux: keys.aux,
        };
        if self.proof.verify(transcript, &statement) {
            Ok(())
        } else {
            log::warn!("MtA proof from {} failed", from);
            Err(Error::proof(from, PROOF_NAME))
        }
    }

    /// additive share of the receiver, reduced modulo $`q`$
    pub fn alpha(&self, from: &PartyId, keys: &PaillierKeys) -> Result<BigInt, Error> {
        if !is_valid_ciphertext(&keys.ek, &self.d) {
            return Err(Error::validation(from, "MtA ciphertext is not a unit"));
        }
        Ok(keys.decrypt_signed(&self.d).mod_floor(&FE::q()))
    }
}
