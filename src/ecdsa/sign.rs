//! Multi-party signing
//!
//! The signing parties hold additive shares $` \lambda_i x_i `$ of the private key. Every party samples $` k_i, \gamma_i `$, so that
//! with $` k = \sum k_i, \gamma = \sum \gamma_i `$ the nonce point is $` R = \Gamma^{\delta^{-1}} `$ where $` \Gamma = \gamma \cdot G `$
//! and $` \delta = k \gamma `$.
//!
//! * round 1: $` K_i = Enc_i(k_i) `$ and $` G_i = Enc_i(\gamma_i) `$ are broadcast
//! * round 2: ciphertexts are checked, two MtA conversions are run with every other party: $` \gamma_i k_j `$ and $` \lambda_i x_i k_j `$.
//!   The hash of all ciphertexts is sent along for the echo check
//! * round 3: Πaff-g proofs of the conversions are verified, the party broadcasts $` \delta_i `$ and $` \Delta_i = k_i \cdot \Gamma `$
//! * round 4: $` \delta \cdot G = \sum \Delta_j `$ is checked, $` r `$ is derived from $` R `$ and the share $` \sigma_i = k_i m + r \chi_i `$ is broadcast
//! * round 5: $` s = \sum \sigma_j `$, the signature is verified against the public key
use crate::algorithms::affg::to_scalar;
use crate::algorithms::sha::Transcript;
use crate::algorithms::{encrypt_signed, is_valid_ciphertext, SampleFromMultiplicativeGroup};
use crate::ecdsa::config::Config;
use crate::ecdsa::messages::signing::{Ciphertexts, Conversions, Delta, Sigma};
use crate::ecdsa::mta::{Mta, MtaKeys};
use crate::ecdsa::{message_hash, sum_points, x_coordinate_scalar, MessageHashType, Signature};
use crate::pool::Pool;
use crate::protocol::{PartyId, ProtocolId};
use crate::round::{EchoHash, Helper, NoContent, Outbox, Output, Round, StartFunc};
use crate::Error;
use curv::arithmetic::traits::Converter;
use curv::elliptic::curves::traits::{ECPoint, ECScalar};
use curv::{BigInt, FE, GE};
use std::collections::BTreeMap;
use std::sync::Arc;
use zeroize::Zeroize;

session! {
    /// Stages of signing
    pub enum SignSession -> Signature {
        Round1(Round1),
        Round2(Round2),
        Round3(Round3),
        Round4(Round4),
        Round5(Round5),
    }
}

/// Starts signing of `message` by the parties `signers`
///
/// The message is hashed with SHA-256. At least `threshold + 1` parties of the key have to sign.
pub fn sign(
    config: Config,
    signers: &[PartyId],
    message: &[u8],
    pool: Arc<Pool>,
) -> StartFunc<SignSession> {
    let signers = signers.to_vec();
    let message = message_hash(message);
    Box::new(move |session_id: &[u8]| -> Result<SignSession, Error> {
        for signer in &signers {
            config.public_share(signer)?;
        }
        if signers.len() <= config.threshold {
            return Err(Error::Protocol(format!(
                "{} signers cannot sign with threshold {}",
                signers.len(),
                config.threshold
            )));
        }
        let mut aux = config.public_key.pk_to_key_slice();
        aux.extend(message.to_big_int().to_vec());
        aux.extend_from_slice(&config.rid);
        let helper = Helper::new(
            ProtocolId::Sign,
            &config.id,
            &signers,
            config.threshold,
            session_id,
            &aux,
            pool,
        )?;
        log::info!("{}: signing starts", config.id);
        Ok(Round1::new(helper, config, message)?.into())
    })
}

#[derive(Zeroize)]
#[zeroize(drop)]
struct Nonces {
    k: FE,
    gamma: FE,
}

/// transcript of the conversion from `prover` to `verifier`
fn mta_transcript(
    helper: &Helper,
    prover: &PartyId,
    verifier: &PartyId,
    label: &str,
) -> Transcript {
    let mut transcript = helper.transcript_for(prover).fork(label);
    transcript.write_party(verifier);
    transcript
}

/// sum of the values modulo $`q`$
fn sum_mod_q<'a, I>(init: BigInt, values: I) -> BigInt
where
    I: IntoIterator<Item = &'a BigInt>,
{
    let q = FE::q();
    values
        .into_iter()
        .fold(init.mod_floor(&q), |acc, value| (acc + value) % &q)
}

/// Samples the nonces and encrypts them
pub struct Round1 {
    helper: Helper,
    config: Config,
    message: MessageHashType,
    nonces: Nonces,
    ciphertexts: Ciphertexts,
}

impl Round1 {
    fn new(helper: Helper, config: Config, message: MessageHashType) -> Result<Self, Error> {
        let nonces = Nonces {
            k: ECScalar::new_random(),
            gamma: ECScalar::new_random(),
        };
        let ek = &config.paillier.ek;
        let ciphertexts = Ciphertexts {
            k: encrypt_signed(ek, &nonces.k.to_big_int(), &BigInt::from_paillier_key(ek)),
            g: encrypt_signed(ek, &nonces.gamma.to_big_int(), &BigInt::from_paillier_key(ek)),
        };
        Ok(Self {
            helper,
            config,
            message,
            nonces,
            ciphertexts,
        })
    }
}

impl Round for Round1 {
    type Message = NoContent;
    type Broadcast = NoContent;
    type Next = Round2;
    const NUMBER: u16 = 1;

    fn helper(&self) -> &Helper {
        &self.helper
    }

    fn generate_messages(&mut self, out: &mut Outbox) -> Result<(), Error> {
        out.send(None, &self.ciphertexts)
    }

    fn next(self) -> Result<Round2, Error> {
        let mut ciphertexts = BTreeMap::new();
        ciphertexts.insert(self.helper.self_id().clone(), self.ciphertexts);
        Ok(Round2 {
            helper: self.helper,
            config: self.config,
            message: self.message,
            nonces: self.nonces,
            ciphertexts,
            delta_betas: BTreeMap::new(),
            chi_betas: BTreeMap::new(),
        })
    }
}

/// Runs both conversions with every other signer
pub struct Round2 {
    helper: Helper,
    config: Config,
    message: MessageHashType,
    nonces: Nonces,
    ciphertexts: BTreeMap<PartyId, Ciphertexts>,
    delta_betas: BTreeMap<PartyId, BigInt>,
    chi_betas: BTreeMap<PartyId, BigInt>,
}

impl Round2 {
    fn echo(&self) -> EchoHash {
        let digests = self
            .ciphertexts
            .iter()
            .map(|(party, c)| {
                let mut transcript = Transcript::new("sign ciphertexts");
                transcript.write_bigints(&[&c.k, &c.g]);
                (party, transcript.finalize())
            })
            .collect::<Vec<_>>();
        self.helper
            .echo_hash(digests.iter().map(|(party, digest)| (*party, &digest[..])))
    }
}

impl Round for Round2 {
    type Message = NoContent;
    type Broadcast = Ciphertexts;
    type Next = Round3;
    const NUMBER: u16 = 2;

    fn helper(&self) -> &Helper {
        &self.helper
    }

    fn store_broadcast_message(
        &mut self,
        from: &PartyId,
        content: Ciphertexts,
    ) -> Result<(), Error> {
        let ek = &self.config.public_share(from)?.paillier;
        if !is_valid_ciphertext(ek, &content.k) || !is_valid_ciphertext(ek, &content.g) {
            return Err(Error::validation(from, "nonce ciphertexts are not valid"));
        }
        self.ciphertexts.insert(from.clone(), content);
        Ok(())
    }

    fn generate_messages(&mut self, out: &mut Outbox) -> Result<(), Error> {
        let helper = &self.helper;
        let config = &self.config;
        let self_id = helper.self_id();

        let gamma = self.nonces.gamma;
        let big_gamma = GE::generator() * gamma;
        let chi_secret = config.additive_share(helper.party_ids())?;
        let big_chi = GE::generator() * chi_secret;
        let own_ek = &config.paillier.ek;

        let peers = helper
            .other_party_ids()
            .map(|party| -> Result<_, Error> {
                let share = config.public_share(party)?;
                let k = self
                    .ciphertexts
                    .get(party)
                    .map(|c| c.k.clone())
                    .ok_or_else(|| Error::Protocol(format!("no ciphertexts from {}", party)))?;
                Ok((party.clone(), share, k))
            })
            .collect::<Result<Vec<_>, Error>>()?;

        let conversions = helper
            .pool()
            .parallelize(peers, |(party, share, k)| -> Result<_, Error> {
                let keys = MtaKeys {
                    sender: own_ek,
                    receiver: &share.paillier,
                    aux: &share.pedersen,
                };
                let delta = Mta::new(
                    &mta_transcript(helper, self_id, &party, "delta"),
                    &gamma.to_big_int(),
                    &big_gamma,
                    &k,
                    keys,
                )?;
                let chi = Mta::new(
                    &mta_transcript(helper, self_id, &party, "chi"),
                    &chi_secret.to_big_int(),
                    &big_chi,
                    &k,
                    keys,
                )?;
                Ok((party, delta, chi))
            })
            .into_iter()
            .collect::<Result<Vec<_>, Error>>()?;

        let echo = self.echo();
        for (party, delta, chi) in conversions {
            out.send(
                Some(&party),
                &Conversions {
                    big_gamma,
                    echo: echo.clone(),
                    delta: delta.message().clone(),
                    chi: chi.message().clone(),
                },
            )?;
            self.delta_betas.insert(party.clone(), delta.beta().clone());
            self.chi_betas.insert(party, chi.beta().clone());
        }
        Ok(())
    }

    fn next(self) -> Result<Round3, Error> {
        let echo = self.echo();
        let chi_secret = self.config.additive_share(self.helper.party_ids())?;
        let self_id = self.helper.self_id().clone();
        let own_k = self
            .ciphertexts
            .get(&self_id)
            .map(|c| c.k.clone())
            .ok_or_else(|| Error::Protocol("own ciphertexts are missing".to_string()))?;
        let mut big_gammas = BTreeMap::new();
        big_gammas.insert(self_id, GE::generator() * self.nonces.gamma);
        Ok(Round3 {
            helper: self.helper,
            config: self.config,
            message: self.message,
            nonces: self.nonces,
            chi_secret,
            own_k,
            echo,
            delta_betas: self.delta_betas,
            chi_betas: self.chi_betas,
            delta_alphas: BTreeMap::new(),
            chi_alphas: BTreeMap::new(),
            big_gammas,
        })
    }
}

/// Verifies conversions of other signers and shares $` \delta_i `$
pub struct Round3 {
    helper: Helper,
    config: Config,
    message: MessageHashType,
    nonces: Nonces,
    chi_secret: FE,
    /// $` K_i `$
    own_k: BigInt,
    echo: EchoHash,
    delta_betas: BTreeMap<PartyId, BigInt>,
    chi_betas: BTreeMap<PartyId, BigInt>,
    delta_alphas: BTreeMap<PartyId, BigInt>,
    chi_alphas: BTreeMap<PartyId, BigInt>,
    big_gammas: BTreeMap<PartyId, GE>,
}

impl Round3 {
    /// $` \Gamma, \delta_i, \chi_i `$
    fn shares(&self) -> Result<(GE, BigInt, BigInt), Error> {
        let big_gamma = sum_points(self.big_gammas.values())
            .ok_or_else(|| {
                Error::Protocol("sum of gamma points is the point at infinity".to_string())
            })?;
        let k = self.nonces.k;
        let delta = sum_mod_q(
            (k * self.nonces.gamma).to_big_int(),
            self.delta_alphas.values().chain(self.delta_betas.values()),
        );
        let chi = sum_mod_q(
            (k * self.chi_secret).to_big_int(),
            self.chi_alphas.values().chain(self.chi_betas.values()),
        );
        Ok((big_gamma, delta, chi))
    }
}

impl Round for Round3 {
    type Message = Conversions;
    type Broadcast = NoContent;
    type Next = Round4;
    const NUMBER: u16 = 3;

    fn helper(&self) -> &Helper {
        &self.helper
    }

    fn process_message(&mut self, from: &PartyId, content: Conversions) -> Result<(), Error> {
        self.echo.check(from, &content.echo)?;

        let helper = &self.helper;
        let config = &self.config;
        let self_id = helper.self_id();
        let sender = config.public_share(from)?;
        let keys = MtaKeys {
            sender: &sender.paillier,
            receiver: &config.paillier.ek,
            aux: &config.public_share(self_id)?.pedersen,
        };
        let big_chi = sender.ecdsa * config.lagrange(helper.party_ids(), from)?;

        let own_k = &self.own_k;
        helper
            .pool()
            .parallelize(
                vec![
                    ("delta", &content.delta, content.big_gamma),
                    ("chi", &content.chi, big_chi),
                ],
                |(label, mta, big_a)| {
                    mta.verify(
                        &mta_transcript(helper, from, self_id, label),
                        from,
                        &big_a,
                        own_k,
                        keys,
                    )
                },
            )
            .into_iter()
            .collect::<Result<Vec<()>, Error>>()?;

        let delta_alpha = content.delta.alpha(from, &config.paillier)?;
        let chi_alpha = content.chi.alpha(from, &config.paillier)?;
        self.delta_alphas.insert(from.clone(), delta_alpha);
        self.chi_alphas.insert(from.clone(), chi_alpha);
        self.big_gammas.insert(from.clone(), content.big_gamma);
        Ok(())
    }

    fn generate_messages(&mut self, out: &mut Outbox) -> Result<(), Error> {
        let (big_gamma, delta, _) = self.shares()?;
        out.send(
            None,
            &Delta {
                delta,
                big_delta: big_gamma * self.nonces.k,
            },
        )
    }

    fn next(self) -> Result<Round4, Error> {
        let (big_gamma, delta, chi) = self.shares()?;
        let mut deltas = BTreeMap::new();
        deltas.insert(
            self.helper.self_id().clone(),
            Delta {
                delta,
                big_delta: big_gamma * self.nonces.k,
            },
        );
        Ok(Round4 {
            helper: self.helper,
            config: self.config,
            message: self.message,
            nonces: self.nonces,
            big_gamma,
            chi,
            deltas,
        })
    }
}

/// Checks $` \delta `$ against its exponent and shares $` \sigma_i `$
pub struct Round4 {
    helper: Helper,
    config: Config,
    message: MessageHashType,
    nonces: Nonces,
    big_gamma: GE,
    /// $` \chi_i `$
    chi: BigInt,
    deltas: BTreeMap<PartyId, Delta>,
}

impl Round4 {
    /// $` r, \sigma_i `$
    fn signature_share(&self) -> Result<(FE, BigInt), Error> {
        let delta = sum_mod_q(BigInt::zero(), self.deltas.values().map(|d| &d.delta));
        let delta = to_scalar(&delta).ok_or_else(|| Error::Protocol("delta is zero".to_string()))?;
        let big_delta = sum_points(self.deltas.values().map(|d| &d.big_delta))
            .ok_or_else(|| {
                Error::Protocol("sum of delta points is the point at infinity".to_string())
            })?;
        if GE::generator() * delta != big_delta {
            log::error!(
                "{}: delta does not match the sum of delta points",
                self.helper.self_id()
            );
            return Err(Error::Protocol(
                "shares of delta are inconsistent".to_string(),
            ));
        }

        let big_r = self.big_gamma * delta.invert();
        let r = x_coordinate_scalar(&big_r)
            .ok_or_else(|| Error::Protocol("r is zero".to_string()))?;
        let sigma = sum_mod_q(
            (self.nonces.k * self.message).to_big_int(),
            &[r.to_big_int() * &self.chi],
        );
        Ok((r, sigma))
    }
}

impl Round for Round4 {
    type Message = NoContent;
    type Broadcast = Delta;
    type Next = Round5;
    const NUMBER: u16 = 4;

    fn helper(&self) -> &Helper {
        &self.helper
    }

    fn store_broadcast_message(&mut self, from: &PartyId, content: Delta) -> Result<(), Error> {
        self.deltas.insert(from.clone(), content);
        Ok(())
    }

    fn generate_messages(&mut self, out: &mut Outbox) -> Result<(), Error> {
        let (_, sigma) = self.signature_share()?;
        out.send(None, &Sigma { sigma })
    }

    fn next(self) -> Result<Round5, Error> {
        let (r, sigma) = self.signature_share()?;
        let mut sigmas = BTreeMap::new();
        sigmas.insert(self.helper.self_id().clone(), sigma);
        Ok(Round5 {
            helper: self.helper,
            config: self.config,
            message: self.message,
            r,
            sigmas,
        })
    }
}

/// Combines shares of the signature
pub struct Round5 {
    helper: Helper,
    config: Config,
    message: MessageHashType,
    r: FE,
    sigmas: BTreeMap<PartyId, BigInt>,
}

impl Round for Round5 {
    type Message = NoContent;
    type Broadcast = Sigma;
    type Next = Output<Signature>;
    const NUMBER: u16 = 5;

    fn helper(&self) -> &Helper {
        &self.helper
    }

    fn store_broadcast_message(&mut self, from: &PartyId, content: Sigma) -> Result<(), Error> {
        self.sigmas.insert(from.clone(), content.sigma);
        Ok(())
    }

    fn generate_messages(&mut self, _out: &mut Outbox) -> Result<(), Error> {
        Ok(())
    }

    fn next(self) -> Result<Output<Signature>, Error> {
        let s = sum_mod_q(BigInt::zero(), self.sigmas.values());
        let s = to_scalar(&s).ok_or(Error::SignatureInvalid)?;
        let signature = Signature { r: self.r, s };
        if !signature.verify(&self.config.public_key, &self.message) {
            log::error!(
                "{}: signature {:?} does not verify",
                self.helper.self_id(),
                signature
            );
            return Err(Error::SignatureInvalid);
        }
        log::info!("{}: signing finished", self.helper.self_id());
        Ok(Output::new(Self::NUMBER + 1, signature))
    }
}
