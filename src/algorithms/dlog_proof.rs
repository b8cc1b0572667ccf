use crate::algorithms::sha::{HSha512Trunc256, Transcript};
use curv::arithmetic::traits::Samplable;
use curv::arithmetic::traits::ZeroizeBN;
use curv::BigInt;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;

pub const DIGEST_BIT_LENGTH: u32 = HSha512Trunc256::DIGEST_BIT_LENGTH as u32;
const DOMAIN: &str = "composite dlog proof";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlogProof {
    y: BigInt,
    c: BigInt,
}

/// Signature scheme for DL proof in a composite group with unknown modulo
///
/// "Composite discrete logarithm and secure authentication" , D. Pointcheval , pp 3.2
///
/// The challenge is derived from the session transcript of the prover.
#[allow(clippy::many_single_char_names)]
impl DlogProof {
    pub fn create(
        transcript: &Transcript,
        N: &BigInt,
        g: &BigInt,
        V: &BigInt,
        s: &BigInt,
        max_secret_length: u32,
        security_param: u32,
    ) -> Self {
        let log_r = max_secret_length + DIGEST_BIT_LENGTH + security_param;
        let R = BigInt::from(2).pow(log_r);
        let mut r = BigInt::sample_below(&R);
        let x = g.powm_sec(&r, N);
        let c = Self::challenge(transcript, N, g, V, &x);

        let y = r.borrow() - c.borrow() * s;
        r.zeroize_bn();
        Self { y, c }
    }

    pub fn verify(&self, transcript: &Transcript, N: &BigInt, g: &BigInt, V: &BigInt) -> bool {
        let x = match (
            super::pow_signed(g, &self.y, N),
            super::pow_signed(V, &self.c, N),
        ) {
            (Some(g_y), Some(v_c)) => g_y * v_c % N,
            _ => return false,
        };
        let c = Self::challenge(transcript, N, g, V, &x);

        c == self.c
    }

    fn challenge(transcript: &Transcript, N: &BigInt, g: &BigInt, V: &BigInt, x: &BigInt) -> BigInt {
        let mut t = transcript.fork(DOMAIN);
        t.write_bigints(&[N, g, V, x]);
        BigInt::from(&t.finalize()[..])
    }
}

#[cfg(test)]
mod tests {
    use crate::algorithms::dlog_proof::{DlogProof, DIGEST_BIT_LENGTH};
    use crate::algorithms::pedersen::{PedersenPublicSetup, PedersenSetup};
    use crate::algorithms::sha::Transcript;
    use crate::ecdsa::PaillierKeys;
    use crate::protocol::SessionId;

    #[test]
    fn check_bitness_and_validate() {
        let keys = PaillierKeys::random();
        let setup = PedersenSetup::from_paillier(&keys.dk);
        let transcript = Transcript::with_session("test", &SessionId([3u8; 32]));

        let security_param = PedersenPublicSetup::DLOG_PROOF_SECURITY_PARAMETER;
        let max_secret_length = setup.phi().bit_length() as u32;

        let proof = DlogProof::create(
            &transcript,
            &setup.params.n,
            &setup.params.t,
            &setup.params.s,
            setup.lambda(),
            max_secret_length,
            security_param,
        );

        assert!(
            proof.y.bit_length()
                <= (max_secret_length + security_param + DIGEST_BIT_LENGTH + 1) as usize
        );
        assert!(proof.c.bit_length() <= DIGEST_BIT_LENGTH as usize);
        assert!(proof.verify(
            &transcript,
            &setup.params.n,
            &setup.params.t,
            &setup.params.s
        ));
        // wrong statement
        assert!(!proof.verify(
            &transcript,
            &setup.params.n,
            &setup.params.s,
            &setup.params.t
        ));
        // another session
        let other = Transcript::with_session("test", &SessionId([4u8; 32]));
        assert!(!proof.verify(
            &other,
            &setup.params.n,
            &setup.params.t,
            &setup.params.s
        ));
    }
}
