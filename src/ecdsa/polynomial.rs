//! Sharing polynomials and their exponents for Feldman's verifiable secret sharing
//!
//! The polynomial of key refresh has zero constant term. Its exponent then has no constant point,
//! since the identity of the group cannot be represented as a point.
use crate::algorithms::add_points;
use curv::elliptic::curves::traits::{ECPoint, ECScalar};
use curv::{BigInt, FE, GE};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

/// Secret polynomial $` f(x) = a_0 + a_1 x + \ldots + a_t x^t `$
pub struct Polynomial {
    constant: Option<FE>,
    coefficients: Vec<FE>,
}

impl Polynomial {
    /// samples the polynomial of degree `degree`, with zero constant term if `constant` is `None`
    pub fn sample(degree: usize, constant: Option<FE>) -> Self {
        Self {
            constant,
            coefficients: (0..degree).map(|_| ECScalar::new_random()).collect(),
        }
    }

    pub fn constant(&self) -> Option<&FE> {
        self.constant.as_ref()
    }

    /// $` f(x) \mod q `$
    pub fn evaluate(&self, x: usize) -> BigInt {
        let q = FE::q();
        let x = BigInt::from(x as u64);
        let acc = self
            .coefficients
            .iter()
            .rev()
            .fold(BigInt::zero(), |acc, a| (acc + a.to_big_int()) * &x % &q);
        match &self.constant {
            Some(a0) => (acc + a0.to_big_int()) % &q,
            None => acc,
        }
    }

    /// $` g^{a_0}, g^{a_1}, \ldots g^{a_t} `$
    pub fn exponent(&self) -> Exponent {
        let g = GE::generator();
        Exponent {
            constant: self.constant.map(|a0| g * a0),
            coefficients: self.coefficients.iter().map(|a| g * *a).collect(),
        }
    }
}

impl Drop for Polynomial {
    fn drop(&mut self) {
        if let Some(a0) = self.constant.as_mut() {
            a0.zeroize();
        }
        self.coefficients.iter_mut().for_each(Zeroize::zeroize);
    }
}

/// Public commitment to a sharing polynomial
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exponent {
    pub constant: Option<GE>,
    /// commitments to $` a_1, \ldots, a_t `$
    pub coefficients: Vec<GE>,
}

impl Exponent {
    pub fn degree(&self) -> usize {
        self.coefficients.len()
    }

    /// $` F(x) = \sum_k x^k \cdot A_k `$ computed with Horner's rule
    ///
    /// `None` if the exponent has zero degree or a partial sum is the point at infinity,
    /// which only a maliciously chosen exponent can reach.
    pub fn evaluate(&self, x: usize) -> Option<GE> {
        let x: FE = ECScalar::from(&BigInt::from(x as u64));
        let mut coefficients = self.coefficients.iter().rev();
        let highest = *coefficients.next()? * x;
        let acc = coefficients.try_fold(highest, |acc, a| Some(add_points(&acc, a)? * x))?;
        match &self.constant {
            Some(a0) => add_points(&acc, a0),
            None => Some(acc),
        }
    }
}
