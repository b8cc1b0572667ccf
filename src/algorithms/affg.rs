//! Zero knowledge proof of a Paillier affine operation with group commitment (Πaff-g)
//!
//! The prover knows $` x, y, \rho, \rho_y `$ such that
//! ```math
//!   D = C^{x} (1+N_0)^{y} \rho^{N_0} \mod N_0^2 , \quad Y = (1+N_1)^{y} \rho_y^{N_1} \mod N_1^2 , \quad X = x \cdot G
//! ```
//! with $` |x| \le 2^{L} `$ and $` |y| \le 2^{L'} `$, where $`N_0`$ is the Paillier modulus of the verifier,
//! $`N_1`$ is the Paillier modulus of the prover and the range commitments are made under the Ring-Pedersen parameters of the verifier.
//!
//! See "UC Non-Interactive, Proactive, Threshold ECDSA with Identifiable Aborts", Canetti et al., fig. 15.
use crate::algorithms::pedersen::PedersenParameters;
use crate::algorithms::sha::Transcript;
use crate::algorithms::{
    add_points, is_in_signed_range, is_valid_ciphertext, paillier_commit, pow_signed, sample_signed,
    sample_signed_scaled, SampleFromMultiplicativeGroup, EPSILON, L, L_PRIME,
};
use curv::arithmetic::traits::ZeroizeBN;
use curv::elliptic::curves::traits::{ECPoint, ECScalar};
use curv::{BigInt, FE, GE};
use paillier::EncryptionKey;
use serde::{Deserialize, Serialize};

const DOMAIN: &str = "affine operation with group commitment";

/// Public values of the proof
pub struct AffGStatement<'a> {
    /// ciphertext the affine operation is applied to, under `verifier_ek`
    pub c: &'a BigInt,
    /// result of the operation, under `verifier_ek`
    pub d: &'a BigInt,
    /// encryption of the additive term under `prover_ek`
    pub y: &'a BigInt,
    /// commitment to the multiplicative coefficient
    pub x: &'a GE,
    pub verifier_ek: &'a EncryptionKey,
    pub prover_ek: &'a EncryptionKey,
    pub aux: &'a PedersenParameters,
}

/// Secret values of the prover
pub struct AffGWitness<'a> {
    pub x: &'a BigInt,
    pub y: &'a BigInt,
    pub rho: &'a BigInt,
    pub rho_y: &'a BigInt,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffGCommitment {
    pub a: BigInt,
    pub b_x: GE,
    pub b_y: BigInt,
    pub e: BigInt,
    pub s: BigInt,
    pub f: BigInt,
    pub t: BigInt,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffGProof {
    pub commitment: AffGCommitment,
    pub z1: BigInt,
    pub z2: BigInt,
    pub z3: BigInt,
    pub z4: BigInt,
    pub w: BigInt,
    pub w_y: BigInt,
}

/// reduces `x` modulo the order of the curve, `None` if the result is zero
pub(crate) fn to_scalar(x: &BigInt) -> Option<FE> {
    let reduced = x.mod_floor(&FE::q());
    if reduced == BigInt::zero() {
        None
    } else {
        Some(ECScalar::from(&reduced))
    }
}

impl AffGProof {
    /// Creates the proof
    ///
    /// Returns `None` if the statement contains a ciphertext which is not invertible.
    #[allow(clippy::many_single_char_names)]
    pub fn prove(
        transcript: &Transcript,
        statement: &AffGStatement,
        witness: &AffGWitness,
    ) -> Option<Self> {
        let n0 = statement.verifier_ek;
        let n1 = statement.prover_ek;
        let aux = statement.aux;

        let (mut alpha, alpha_fe) = loop {
            let alpha = sample_signed(L + EPSILON);
            if let Some(alpha_fe) = to_scalar(&alpha) {
                break (alpha, alpha_fe);
            }
        };
        let mut beta = sample_signed(L_PRIME + EPSILON);
        let mut r = BigInt::from_paillier_key(n0);
        let mut r_y = BigInt::from_paillier_key(n1);
        let mut gamma = sample_signed_scaled(L + EPSILON, &aux.n);
        let mut m = sample_signed_scaled(L, &aux.n);
        let mut delta = sample_signed_scaled(L + EPSILON, &aux.n);
        let mut mu = sample_signed_scaled(L, &aux.n);

        let a = pow_signed(statement.c, &alpha, &n0.nn)? * paillier_commit(n0, &beta, &r) % &n0.nn;
        let commitment = AffGCommitment {
            a,
            b_x: GE::generator() * alpha_fe,
            b_y: paillier_commit(n1, &beta, &r_y),
            e: aux.commit(&alpha, &gamma)?,
            s: aux.commit(witness.x, &m)?,
            f: aux.commit(&beta, &delta)?,
            t: aux.commit(witness.y, &mu)?,
        };

        let e = challenge(transcript, statement, &commitment);

        let proof = Self {
            z1: &alpha + &e * witness.x,
            z2: &beta + &e * witness.y,
            z3: &gamma + &e * &m,
            z4: &delta + &e * &mu,
            w: r.clone() * pow_signed(witness.rho, &e, &n0.n)? % &n0.n,
            w_y: r_y.clone() * pow_signed(witness.rho_y, &e, &n1.n)? % &n1.n,
            commitment,
        };

        alpha.zeroize_bn();
        beta.zeroize_bn();
        r.zeroize_bn();
        r_y.zeroize_bn();
        gamma.zeroize_bn();
        m.zeroize_bn();
        delta.zeroize_bn();
        mu.zeroize_bn();

        Some(proof)
    }

    pub fn verify(&self, transcript: &Transcript, statement: &AffGStatement) -> bool {
        let n0 = statement.verifier_ek;
        let n1 = statement.prover_ek;
        let aux = statement.aux;
        let commitment = &self.commitment;

        if !is_in_signed_range(&self.z1, L + EPSILON) {
            log::trace!("AffG: z1 is out of range");
            return false;
        }
        if !is_in_signed_range(&self.z2, L_PRIME + EPSILON) {
            log::trace!("AffG: z2 is out of range");
            return false;
        }
        if !is_valid_ciphertext(n0, &commitment.a)
            || !is_valid_ciphertext(n1, &commitment.b_y)
            || !is_valid_ciphertext(n0, statement.c)
            || !is_valid_ciphertext(n0, statement.d)
            || !is_valid_ciphertext(n1, statement.y)
        {
            log::trace!("AffG: ciphertext is not a unit");
            return false;
        }
        let one = BigInt::one();
        let is_unit = |x: &BigInt, n: &BigInt| *x > BigInt::zero() && *x < *n && x.gcd(n) == one;
        if ![&commitment.e, &commitment.s, &commitment.f, &commitment.t]
            .iter()
            .all(|x| is_unit(x, &aux.n))
            || !is_unit(&self.w, &n0.n)
            || !is_unit(&self.w_y, &n1.n)
        {
            log::trace!("AffG: commitment is not a unit");
            return false;
        }

        let e = challenge(transcript, statement, commitment);

        // C^z1 (1+N0)^z2 w^N0 == A D^e mod N0^2
        let lhs = match pow_signed(statement.c, &self.z1, &n0.nn) {
            Some(c_z1) => c_z1 * paillier_commit(n0, &self.z2, &self.w) % &n0.nn,
            None => return false,
        };
        let rhs = match pow_signed(statement.d, &e, &n0.nn) {
            Some(d_e) => commitment.a.clone() * d_e % &n0.nn,
            None => return false,
        };
        if lhs != rhs {
            log::trace!("AffG: affine operation doesn't hold");
            return false;
        }

        // z1 G == Bx + e X
        let lhs = match to_scalar(&self.z1) {
            Some(z1) => GE::generator() * z1,
            None => return false,
        };
        let rhs = match to_scalar(&e) {
            Some(e) => match add_points(&commitment.b_x, &(*statement.x * e)) {
                Some(rhs) => rhs,
                None => return false,
            },
            None => commitment.b_x,
        };
        if lhs != rhs {
            log::trace!("AffG: group commitment doesn't hold");
            return false;
        }

        // (1+N1)^z2 w_y^N1 == By Y^e mod N1^2
        let lhs = paillier_commit(n1, &self.z2, &self.w_y);
        let rhs = match pow_signed(statement.y, &e, &n1.nn) {
            Some(y_e) => commitment.b_y.clone() * y_e % &n1.nn,
            None => return false,
        };
        if lhs != rhs {
            log::trace!("AffG: encryption of y doesn't hold");
            return false;
        }

        // s^z1 t^z3 == E S^e mod N^
        match (
            aux.commit(&self.z1, &self.z3),
            aux.combine(&commitment.e, &commitment.s, &e),
        ) {
            (Some(lhs), Some(rhs)) if lhs == rhs => {}
            _ => {
                log::trace!("AffG: range commitment to x doesn't hold");
                return false;
            }
        }

        // s^z2 t^z4 == F T^e mod N^
        match (
            aux.commit(&self.z2, &self.z4),
            aux.combine(&commitment.f, &commitment.t, &e),
        ) {
            (Some(lhs), Some(rhs)) if lhs == rhs => true,
            _ => {
                log::trace!("AffG: range commitment to y doesn't hold");
                false
            }
        }
    }
}

/// hashes the statement and the commitment in the fixed order
fn challenge(transcript: &Transcript, statement: &AffGStatement, commitment: &AffGCommitment) -> BigInt {
    let mut t = transcript.fork(DOMAIN);
    t.write_bigints(&[
        &statement.verifier_ek.n,
        &statement.prover_ek.n,
        &statement.aux.n,
        &statement.aux.s,
        &statement.aux.t,
        statement.c,
        statement.d,
        statement.y,
    ])
    .write_point(statement.x)
    .write_bigint(&commitment.a)
    .write_point(&commitment.b_x)
    .write_bigints(&[
        &commitment.b_y,
        &commitment.e,
        &commitment.s,
        &commitment.f,
        &commitment.t,
    ]);
    t.challenge(&FE::q())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::encrypt_signed;
    use crate::algorithms::pedersen::PedersenSetup;
    use crate::ecdsa::PaillierKeys;
    use crate::protocol::SessionId;
    use curv::arithmetic::traits::Samplable;

    struct Fixture {
        verifier: PaillierKeys,
        prover: PaillierKeys,
        aux: PedersenParameters,
        c: BigInt,
        d: BigInt,
        y_enc: BigInt,
        big_x: GE,
        x: BigInt,
        y: BigInt,
        rho: BigInt,
        rho_y: BigInt,
    }

    impl Fixture {
        fn new() -> Self {
            let verifier = PaillierKeys::random();
            let prover = PaillierKeys::random();
            let aux = PedersenSetup::from_paillier(&verifier.dk).params.clone();

            let b = BigInt::sample_below(&FE::q());
            let c = encrypt_signed(&verifier.ek, &b, &BigInt::from_paillier_key(&verifier.ek));

            let x_fe: FE = ECScalar::new_random();
            let x = x_fe.to_big_int();
            let y = BigInt::zero() - BigInt::sample(L_PRIME);
            let rho = BigInt::from_paillier_key(&verifier.ek);
            let rho_y = BigInt::from_paillier_key(&prover.ek);

            let d = c.powm_sec(&x, &verifier.ek.nn) * encrypt_signed(&verifier.ek, &y, &rho)
                % &verifier.ek.nn;
            let y_enc = encrypt_signed(&prover.ek, &y, &rho_y);

            Self {
                big_x: GE::generator() * x_fe,
                verifier,
                prover,
                aux,
                c,
                d,
                y_enc,
                x,
                y,
                rho,
                rho_y,
            }
        }

        fn statement(&self) -> AffGStatement {
            AffGStatement {
                c: &self.c,
                d: &self.d,
                y: &self.y_enc,
                x: &self.big_x,
                verifier_ek: &self.verifier.ek,
                prover_ek: &self.prover.ek,
                aux: &self.aux,
            }
        }

        fn witness(&self) -> AffGWitness {
            AffGWitness {
                x: &self.x,
                y: &self.y,
                rho: &self.rho,
                rho_y: &self.rho_y,
            }
        }
    }

    fn transcript(ssid: u8) -> Transcript {
        Transcript::with_session("test", &SessionId([ssid; 32]))
    }

    #[test]
    fn valid_proof() {
        let _ = env_logger::builder().is_test(true).try_init();
        let fixture = Fixture::new();
        (0..3).for_each(|_| {
            let proof = AffGProof::prove(&transcript(1), &fixture.statement(), &fixture.witness())
                .expect("valid statement");
            assert!(proof.verify(&transcript(1), &fixture.statement()));
        });
    }

    #[test]
    fn proof_fails_for_another_statement() {
        let _ = env_logger::builder().is_test(true).try_init();
        let fixture = Fixture::new();
        let proof = AffGProof::prove(&transcript(1), &fixture.statement(), &fixture.witness())
            .expect("valid statement");

        // another commitment point A'
        let other_point = GE::random_point();
        let statement = AffGStatement {
            x: &other_point,
            ..fixture.statement()
        };
        assert!(!proof.verify(&transcript(1), &statement));

        // another ciphertext D'
        let other_d = encrypt_signed(
            &fixture.verifier.ek,
            &BigInt::from(1),
            &BigInt::from_paillier_key(&fixture.verifier.ek),
        );
        let statement = AffGStatement {
            d: &other_d,
            ..fixture.statement()
        };
        assert!(!proof.verify(&transcript(1), &statement));

        // another ciphertext K'
        let other_c = encrypt_signed(
            &fixture.verifier.ek,
            &BigInt::from(7),
            &BigInt::from_paillier_key(&fixture.verifier.ek),
        );
        let statement = AffGStatement {
            c: &other_c,
            ..fixture.statement()
        };
        assert!(!proof.verify(&transcript(1), &statement));

        // replay into another session
        assert!(!proof.verify(&transcript(2), &fixture.statement()));
    }

    #[test]
    fn tampered_response_fails() {
        let fixture = Fixture::new();
        let mut proof = AffGProof::prove(&transcript(1), &fixture.statement(), &fixture.witness())
            .expect("valid statement");
        proof.z1 = proof.z1 + BigInt::one();
        assert!(!proof.verify(&transcript(1), &fixture.statement()));

        let mut proof = AffGProof::prove(&transcript(1), &fixture.statement(), &fixture.witness())
            .expect("valid statement");
        proof.z2 = BigInt::one() << (L_PRIME + EPSILON + 1);
        assert!(!proof.verify(&transcript(1), &fixture.statement()));
    }
}
