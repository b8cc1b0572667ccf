//! SHA512-256 based hashing
//!
//! * [`HSha512Trunc256`] implements curv's `Hash` trait for the proofs operating on `BigInt` only
//! * [`Transcript`] is the domain separated Fiat-Shamir transcript used by every proof bound to a session
use crate::protocol::{PartyId, SessionId};
use curv::arithmetic::traits::Converter;
use curv::cryptographic_primitives::hashing::traits::Hash;
use curv::elliptic::curves::traits::{ECPoint, ECScalar};
use curv::{BigInt, FE, GE};
use sha2::{Digest, Sha512Trunc256};
use std::fmt;

/// length of every hash value exchanged by parties: commitments, echo hashes
pub const HASH_BYTES: usize = 32;

pub struct HSha512Trunc256;

impl HSha512Trunc256 {
    pub const DIGEST_BIT_LENGTH: usize = 256;

    pub fn can_handle_curve_modulo(q: &BigInt) -> bool {
        Self::DIGEST_BIT_LENGTH == q.bit_length()
    }
}

impl Hash for HSha512Trunc256 {
    fn create_hash(big_ints: &[&BigInt]) -> BigInt {
        let mut hasher = Sha512Trunc256::new();

        for value in big_ints {
            input_bigint(&mut hasher, value);
        }

        let result_hex = hasher.result();
        BigInt::from(&result_hex[..])
    }

    fn create_hash_from_slice(bytes: &[u8]) -> BigInt {
        let mut hasher = Sha512Trunc256::new();
        input_with_length(&mut hasher, bytes);
        let result_hex = hasher.result();
        BigInt::from(&result_hex[..])
    }

    fn create_hash_from_ge(ge_vec: &[&GE]) -> FE {
        let mut hasher = Sha512Trunc256::new();
        for value in ge_vec {
            hasher.input(&value.pk_to_key_slice());
        }

        let result_hex = hasher.result();
        let result = BigInt::from(&result_hex[..]);
        ECScalar::from(&result)
    }
}

/// every value is prefixed with its length so that concatenations of different values never collide
fn input_with_length(hasher: &mut Sha512Trunc256, bytes: &[u8]) {
    hasher.input((bytes.len() as u64).to_le_bytes());
    hasher.input(bytes);
}

fn input_bigint(hasher: &mut Sha512Trunc256, value: &BigInt) {
    let sign = if *value < BigInt::zero() { 1u8 } else { 0u8 };
    hasher.input([sign]);
    input_with_length(hasher, &BigInt::to_vec(value));
}

/// Fiat-Shamir transcript
///
/// Starts with a domain label, so that transcripts of different proofs never coincide.
/// A transcript bound to a session additionally absorbs the session id, which prevents
/// replaying a proof into another run of the protocol.
#[derive(Clone)]
pub struct Transcript {
    hasher: Sha512Trunc256,
}

impl fmt::Debug for Transcript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Transcript")
    }
}

impl Transcript {
    const MAX_ITERATIONS_IN_REJECTION_SAMPLING: u32 = 256;

    pub fn new(domain: &str) -> Self {
        let mut hasher = Sha512Trunc256::new();
        input_with_length(&mut hasher, domain.as_bytes());
        Self { hasher }
    }

    pub fn with_session(domain: &str, ssid: &SessionId) -> Self {
        let mut transcript = Self::new(domain);
        transcript.write_bytes(ssid.as_ref());
        transcript
    }

    /// returns a copy of the transcript with an additional domain label
    pub fn fork(&self, label: &str) -> Self {
        let mut forked = self.clone();
        forked.write_bytes(label.as_bytes());
        forked
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        input_with_length(&mut self.hasher, bytes);
        self
    }

    pub fn write_party(&mut self, party: &PartyId) -> &mut Self {
        self.write_bytes(party.as_bytes())
    }

    pub fn write_bigint(&mut self, value: &BigInt) -> &mut Self {
        input_bigint(&mut self.hasher, value);
        self
    }

    pub fn write_bigints(&mut self, values: &[&BigInt]) -> &mut Self {
        values.iter().for_each(|v| input_bigint(&mut self.hasher, v));
        self
    }

    pub fn write_point(&mut self, point: &GE) -> &mut Self {
        self.write_bytes(&point.pk_to_key_slice())
    }

    pub fn finalize(self) -> [u8; HASH_BYTES] {
        let mut result = [0u8; HASH_BYTES];
        result.copy_from_slice(&self.hasher.result()[..]);
        result
    }

    /// Derives a challenge in `[0,q)`
    ///
    /// Rejection sampling with a counter, so that the prover and the verifier arrive at the same value.
    pub fn challenge(self, q: &BigInt) -> BigInt {
        let mut last = BigInt::zero();
        for counter in 0..Self::MAX_ITERATIONS_IN_REJECTION_SAMPLING {
            let mut hasher = self.hasher.clone();
            hasher.input(counter.to_le_bytes());
            last = BigInt::from(&hasher.result()[..]);
            if last < *q {
                return last;
            }
        }
        // If the condition in can_handle_curve_modulo() is true,
        // the probability of hitting next statement is no more than approx. 1/2^(MAX_ITERATIONS)
        last.mod_floor(q)
    }
}
