//! Zero knowledge proofs, Ring-Pedersen parameters and SHA512-256 wrapper
//!
#![allow(non_snake_case)]
pub mod affg;
pub mod dlog_proof;
pub mod nizk_rsa;
pub mod pedersen;
pub mod schnorr;
pub mod sha;

use curv::arithmetic::traits::Samplable;
use curv::elliptic::curves::traits::ECPoint;
use curv::{BigInt, GE};
use paillier::{EncryptWithChosenRandomness, EncryptionKey, Paillier, Randomness, RawPlaintext};
use std::borrow::Borrow;

/// Bit length of a secret scalar of the curve
pub const L: usize = 256;
/// Bit length of blinding values in MtA
pub const L_PRIME: usize = 5 * L;
/// Statistical slack of range proofs
pub const EPSILON: usize = 2 * L;

pub trait SampleFromMultiplicativeGroup {
    fn from_modulo(N: &BigInt) -> BigInt;
    fn from_paillier_key(ek: &EncryptionKey) -> BigInt;
}

impl SampleFromMultiplicativeGroup for BigInt {
    fn from_modulo(N: &BigInt) -> BigInt {
        let One = BigInt::one();
        loop {
            let r = Self::sample_below(N);
            if r.gcd(N) == One {
                return r;
            }
        }
    }

    fn from_paillier_key(ek: &EncryptionKey) -> BigInt {
        Self::from_modulo(ek.n.borrow())
    }
}

/// samples uniformly from $` [-2^{bits}, 2^{bits}) `$
pub fn sample_signed(bits: usize) -> BigInt {
    let bound = BigInt::one() << bits;
    BigInt::sample_below(&(BigInt::one() << (bits + 1))) - bound
}

/// samples uniformly from $` [-2^{bits} \cdot N, 2^{bits} \cdot N) `$
pub fn sample_signed_scaled(bits: usize, N: &BigInt) -> BigInt {
    let bound = (BigInt::one() << bits) * N;
    let width = (BigInt::one() << (bits + 1)) * N;
    BigInt::sample_below(&width) - bound
}

/// checks $` |x| \le 2^{bits} `$
pub fn is_in_signed_range(x: &BigInt, bits: usize) -> bool {
    x.abs() <= BigInt::one() << bits
}

/// modular exponentiation accepting negative exponents
///
/// Returns `None` if the exponent is negative and the base is not invertible.
pub fn pow_signed(base: &BigInt, exp: &BigInt, modulus: &BigInt) -> Option<BigInt> {
    let zero = BigInt::zero();
    if *exp == zero {
        Some(BigInt::one())
    } else if *exp > zero {
        Some(base.powm_sec(exp, modulus))
    } else {
        base.invert(modulus)
            .map(|inv| inv.powm_sec(&(zero - exp), modulus))
    }
}

/// Paillier encryption of a signed plaintext with given randomness
///
/// Negative plaintexts are encoded as $` N - |m| `$
pub fn encrypt_signed(ek: &EncryptionKey, m: &BigInt, r: &BigInt) -> BigInt {
    let plaintext = m.mod_floor(&ek.n);
    Paillier::encrypt_with_chosen_randomness(
        ek,
        RawPlaintext::from(plaintext),
        &Randomness::from(r),
    )
    .0
    .into_owned()
}

/// $` (1+N)^{m} \cdot r^{N} \mod N^2 `$ for signed `m` and `r` not necessarily reduced
pub fn paillier_commit(ek: &EncryptionKey, m: &BigInt, r: &BigInt) -> BigInt {
    let one_plus_n_power = (BigInt::one() + m.mod_floor(&ek.n) * &ek.n) % &ek.nn;
    one_plus_n_power * r.powm_sec(&ek.n, &ek.nn) % &ek.nn
}

/// checks that `c` is a valid ciphertext under `ek`, i.e. an element of $` \mathbb{Z}^{*}_{N^2} `$
pub fn is_valid_ciphertext(ek: &EncryptionKey, c: &BigInt) -> bool {
    *c > BigInt::zero() && *c < ek.nn && c.gcd(&ek.nn) == BigInt::one()
}

fn from_secp256k1_pk(pk: curv::PK) -> Result<GE, curv::ErrorKey> {
    let bytes = pk.serialize_uncompressed();
    GE::from_bytes(&bytes[1..])
}

/// $` a + b `$, or `None` if the sum is the point at infinity
///
/// Unlike `GE + GE`, never panics on points chosen by a peer.
pub fn add_points(a: &GE, b: &GE) -> Option<GE> {
    let sum = a.get_element().combine(&b.get_element()).ok()?;
    from_secp256k1_pk(sum).ok()
}
