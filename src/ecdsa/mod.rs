//!  Multiparty threshold signature scheme
//!
//!  MPC TS scheme, as defined in ["UC Non-Interactive, Proactive, Threshold ECDSA with Identifiable Aborts"](https://eprint.iacr.org/2021/060.pdf)
//!
//!  The module implements following algorithms:
//! * Key generation
//! * Key refresh
//! * Signing
//!
//! Each algorithm is a chain of rounds, see [`round`](../round/index.html). Entry points of the algorithms return
//! a [`StartFunc`](../round/type.StartFunc.html), which creates the session once the caller provides the session id.
//!
use crate::algorithms::add_points;
use crate::Error;
use curv::arithmetic::traits::ZeroizeBN;
use curv::elliptic::curves::traits::{ECPoint, ECScalar};
use curv::{BigInt, FE, GE};
use paillier::{
    is_prime, Decrypt, DecryptionKey, EncryptionKey, KeyGeneration, Paillier, RawCiphertext,
    RawPlaintext,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::borrow::Borrow;
use std::fmt;
use std::fmt::{Debug, Display, Formatter};
use trace::trace;
use zeroize::Zeroize;

pub mod config;
pub mod keygen;
pub mod messages;
pub mod mta;
pub mod polynomial;
pub mod sign;

pub use config::{Config, PublicShare};

/// Parameters associated with shared key in threshold schema
///
/// # Key Attributes
///
/// * `share count` - number of parties which hold shards of the key
/// * `threshold` - number of parties required to produce a signature minus 1 so that $` \min N_{required} = threshold + 1 `$
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq)]
pub struct Parameters {
    threshold: usize,   //t
    share_count: usize, //n
}

impl Parameters {
    /// Constructs new Parameters conditioned they satisfy `2 <= min_signers <= share_count`.
    ///
    /// Parameters are used for Shamir secret sharing, so that the threshold sharing parameter
    /// is equal to the degree of the polynomial used in sharing.
    ///
    /// That is, `threshold` = `min_signers` - 1
    pub fn new(min_signers: usize, share_count: usize) -> Result<Self, Error> {
        if share_count < 2 {
            return Err(Error::Protocol(format!(
                "Number of shares must be at least 2, got {}",
                share_count
            )));
        }
        if min_signers < 2 {
            return Err(Error::Protocol(format!(
                "Number of signers must be at least 2, got: {}",
                min_signers
            )));
        }
        if min_signers > share_count {
            return Err(Error::Protocol(format!(
                "Number of signers {} cannot be greater than number of shares {}",
                min_signers, share_count
            )));
        }
        // 1 <= min_signers - 1 = threshold < share_count
        Ok(Parameters {
            threshold: min_signers - 1,
            share_count,
        })
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn share_count(&self) -> usize {
        self.share_count
    }

    pub fn signers(&self) -> usize {
        self.threshold + 1
    }
}

impl fmt::Display for Parameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{threshold: {}, share_count: {}}}",
            self.threshold, self.share_count
        )
    }
}

pub type MessageHashType = FE;

/// hashes the message with SHA-256 and maps the digest to the scalar field
pub fn message_hash(message: &[u8]) -> MessageHashType {
    let mut hasher = Sha256::new();
    hasher.input(message);
    let digest = BigInt::from(&hasher.result()[..]);
    ECScalar::from(&digest.mod_floor(&FE::q()))
}

/// Public/private key pair for additive homomorphic encryption schema
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct PaillierKeys {
    pub dk: DecryptionKey,
    pub ek: EncryptionKey,
}

impl Zeroize for PaillierKeys {
    fn zeroize(&mut self) {
        self.dk.p.zeroize_bn();
        self.dk.q.zeroize_bn();
        self.ek.n.zeroize_bn();
        self.ek.nn.zeroize_bn();
    }
}

impl Drop for PaillierKeys {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl PaillierKeys {
    /// produces new Paillier key pair
    pub fn random() -> Self {
        let (ek, dk) =
            Paillier::keypair_with_modulus_size(2 * PRIME_BIT_LENGTH_IN_PAILLIER_SCHEMA).keys();
        Self { ek, dk }
    }

    /// decrypts given value `c`
    pub fn decrypt(&self, c: BigInt) -> RawPlaintext {
        Paillier::decrypt(&self.dk, &RawCiphertext::from(c))
    }

    /// Decrypts `c` into $` (-N/2, N/2] `$
    ///
    /// Plaintexts above $` N/2 `$ are treated as encodings of negative numbers.
    pub fn decrypt_signed(&self, c: &BigInt) -> BigInt {
        let m: BigInt = self.decrypt(c.clone()).0.into_owned();
        let half: BigInt = self.ek.n.borrow() / BigInt::from(2);
        if m > half {
            m - &self.ek.n
        } else {
            m
        }
    }

    /// checks whether Paillier's setup is valid and consistent
    #[trace(pretty, prefix = "PaillierKeys::")]
    pub fn is_valid(ek: &EncryptionKey, dk: &DecryptionKey) -> bool {
        is_prime(&dk.p)
            && is_prime(&dk.q)
            && ek.n == dk.p.borrow() * dk.q.borrow()
            && ek.nn == ek.n.pow(2)
    }
}

impl Display for PaillierKeys {
    /// hides private key of the schema
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaillierKeys")
            .field("dk", &"[***]".to_owned())
            .field("ek", &self.ek)
            .finish()
    }
}

impl Debug for PaillierKeys {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_string())
    }
}

///current recommended bit size for the primes in Paillier schema
pub(crate) const PRIME_BIT_LENGTH_IN_PAILLIER_SCHEMA: usize = 1024;

/// The result of ECDSA signing algorithm
///
/// The signature the schema with
///
/// * cyclic group $` \mathcal{G} `$ of prime order $`q`$ and generator $` g `$
/// * message $` m `$ , private key $` x `$
/// * mapping $` F : \mathcal{G} \to \mathbb{Z}_q `$, hash function $` H(t) `$
/// * random  $` k \in \mathbb{Z}_{q} `$
///
/// The signature contains
/// ```math
///    r = F(g^k) , \space s = k^{-1}(H(m) + x r) \mod q
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Signature {
    pub r: FE,
    pub s: FE,
}

impl Signature {
    /// verifies the signature using public key and the hash of the message
    pub fn verify(&self, pubkey: &GE, message: &MessageHashType) -> bool {
        let zero = BigInt::zero();
        if self.s.to_big_int() == zero || self.r.to_big_int() == zero {
            return false;
        }
        let g: GE = ECPoint::generator();

        let s_invert = self.s.invert();
        let u1 = (*message) * s_invert;
        let u2 = self.r * s_invert;

        // a zero scalar or the point at infinity cannot come out of a valid signature
        if u1.to_big_int() == zero {
            return false;
        }
        match (g * u1 + pubkey * &u2).x_coor() {
            Some(x) => self.r.to_big_int() == x.mod_floor(&FE::q()),
            None => false,
        }
    }

    /// verifies the signature of the message hashed with SHA-256
    pub fn verify_message(&self, pubkey: &GE, message: &[u8]) -> bool {
        self.verify(pubkey, &message_hash(message))
    }
}

/// maps x-coordinate of the point to a scalar, `None` for the zero result
pub(crate) fn x_coordinate_scalar(point: &GE) -> Option<FE> {
    point
        .x_coor()
        .and_then(|x| crate::algorithms::affg::to_scalar(&x))
}

/// Lagrange coefficient of the party with evaluation point `own_x` in the set of points of signing parties
///
/// ```math
///  \lambda_{i} = \prod_{j \ne i} \frac{x_j}{x_j - x_i}
/// ```
pub(crate) fn lagrange_coefficient(points: &[usize], own_x: usize) -> FE {
    #[allow(clippy::cast_possible_truncation)]
    let to_fe = |x: usize| -> FE { ECScalar::from(&BigInt::from(x as u64)) };
    let own = to_fe(own_x);
    let others = points
        .iter()
        .filter(|x| **x != own_x)
        .map(|x| to_fe(*x))
        .collect::<Vec<FE>>();

    let fold_with_one = |op: &dyn Fn(FE, &FE) -> FE| {
        others
            .iter()
            .fold(ECScalar::from(&BigInt::one()), |acc: FE, x| op(acc, x))
    };

    let num_fun = |acc: FE, x: &FE| acc * x;
    let denom_fun = |acc: FE, x: &FE| acc * x.sub(&own.get_element());

    fold_with_one(&denom_fun).invert() * fold_with_one(&num_fun)
}

/// sum of the points, `None` if there are none or if a partial sum is the point at infinity
pub(crate) fn sum_points<'a, I>(points: I) -> Option<GE>
where
    I: IntoIterator<Item = &'a GE>,
{
    let mut points = points.into_iter();
    let first = *points.next()?;
    points.try_fold(first, |acc, point| add_points(&acc, point))
}

/// returns true if all elements of the collections are equal or the collection is empty
pub fn all_equal<It>(mut it: It) -> bool
where
    It: Iterator + Sized,
    It::Item: PartialEq,
{
    match it.next() {
        None => true,
        Some(a) => it.all(|x| a == x),
    }
}
