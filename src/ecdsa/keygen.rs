//! Multi-party key generation and key refresh
//!
//! Both protocols share one chain of rounds:
//!
//! * round 1: every party samples its sharing polynomial, Paillier keys and Ring-Pedersen parameters and sends the hash commitment
//!   to all of this public data
//! * round 2: commitments of all parties are hashed in the order of parties, the hash is echoed to every party
//! * round 3: echoes are compared, then the decommitment is broadcast
//! * round 4: decommitments are verified against commitments, the Paillier key proof and the Ring-Pedersen proofs are checked,
//!   shares of the polynomial are sent encrypted under the Paillier key of the recipient, along with Schnorr proof of the constant term
//! * round 5: every share is checked against the exponent of the polynomial of its sender (Feldman's VSS), the config is assembled
//!
//! Key generation produces a fresh key. The polynomial of key refresh has zero constant term, so that the public key stays the same
//! while every secret share, the Paillier keys and the Ring-Pedersen parameters are renewed.
use crate::algorithms::affg::to_scalar;
use crate::algorithms::nizk_rsa::PaillierKeyProof;
use crate::algorithms::pedersen::{PedersenPublicSetup, PedersenSetup};
use crate::algorithms::schnorr::SchnorrRandomness;
use crate::algorithms::sha::{Transcript, HASH_BYTES};
use crate::algorithms::{encrypt_signed, is_valid_ciphertext, SampleFromMultiplicativeGroup};
use crate::ecdsa::config::{Config, PublicShare};
use crate::ecdsa::messages::keygen::{Commitment, Decommitment, Echo, Share};
use crate::ecdsa::polynomial::Polynomial;
use crate::ecdsa::{sum_points, PaillierKeys, Parameters};
use crate::pool::Pool;
use crate::protocol::{PartyId, ProtocolId};
use crate::round::{EchoHash, Helper, NoContent, Outbox, Output, Round, StartFunc};
use crate::Error;
use curv::elliptic::curves::traits::{ECPoint, ECScalar};
use curv::{BigInt, FE, GE};
use paillier::EncryptionKey;
use rand::Rng;
use std::collections::BTreeMap;
use std::sync::Arc;

session! {
    /// Stages of key generation and key refresh
    pub enum KeygenSession -> Config {
        Round1(Round1),
        Round2(Round2),
        Round3(Round3),
        Round4(Round4),
        Round5(Round5),
    }
}

/// Starts key generation among `party_ids` with the signing threshold `threshold`
///
/// Any `threshold + 1` of the parties can sign with the resulting key.
pub fn keygen(
    self_id: &PartyId,
    party_ids: &[PartyId],
    threshold: usize,
    pool: Arc<Pool>,
) -> StartFunc<KeygenSession> {
    let self_id = self_id.clone();
    let party_ids = party_ids.to_vec();
    Box::new(move |session_id: &[u8]| -> Result<KeygenSession, Error> {
        Parameters::new(threshold + 1, party_ids.len())?;
        let helper = Helper::new(
            ProtocolId::Keygen,
            &self_id,
            &party_ids,
            threshold,
            session_id,
            &[],
            pool,
        )?;
        log::info!("{}: key generation starts", self_id);
        Ok(Round1::new(helper, None)?.into())
    })
}

/// Starts refresh of the key shared by all parties of `config`
pub fn refresh(config: Config, pool: Arc<Pool>) -> StartFunc<KeygenSession> {
    Box::new(move |session_id: &[u8]| -> Result<KeygenSession, Error> {
        config.validate()?;
        let mut aux = config.public_key.pk_to_key_slice();
        aux.extend_from_slice(&config.rid);
        let helper = Helper::new(
            ProtocolId::Refresh,
            &config.id,
            &config.party_ids(),
            config.threshold,
            session_id,
            &aux,
            pool,
        )?;
        log::info!("{}: key refresh starts", config.id);
        Ok(Round1::new(helper, Some(config))?.into())
    })
}

struct Secrets {
    polynomial: Polynomial,
    paillier: PaillierKeys,
    schnorr: SchnorrRandomness,
}

fn random_bytes() -> Vec<u8> {
    let mut bytes = vec![0u8; HASH_BYTES];
    rand::thread_rng().fill(&mut bytes[..]);
    bytes
}

/// evaluation point of the party: its 1-based position among sorted parties
fn point_of(helper: &Helper, party: &PartyId) -> Result<usize, Error> {
    helper
        .party_ids()
        .binary_search(party)
        .map(|index| index + 1)
        .map_err(|_| Error::Protocol(format!("unknown party {}", party)))
}

fn schnorr_transcript(helper: &Helper, prover: &PartyId, rid: &[u8]) -> Transcript {
    let mut transcript = helper.transcript_for(prover).fork("keygen schnorr");
    transcript.write_bytes(rid);
    transcript
}

/// Samples the secrets of the party and commits to its public data
pub struct Round1 {
    helper: Helper,
    previous: Option<Config>,
    secrets: Secrets,
    decommitment: Decommitment,
    commitment: Vec<u8>,
}

impl Round1 {
    fn new(helper: Helper, previous: Option<Config>) -> Result<Self, Error> {
        let self_id = helper.self_id().clone();
        let constant = if previous.is_some() {
            None
        } else {
            Some(ECScalar::new_random())
        };
        let polynomial = Polynomial::sample(helper.threshold(), constant);
        let paillier = PaillierKeys::random();
        let pedersen = PedersenSetup::from_paillier(&paillier.dk);
        let transcript = helper.transcript_for(&self_id);
        let schnorr = SchnorrRandomness::new();

        let decommitment = Decommitment {
            rid: random_bytes(),
            exponent: polynomial.exponent(),
            schnorr_commitment: schnorr.commitment(),
            paillier: paillier.ek.n.clone(),
            paillier_proof: PaillierKeyProof::prove(&paillier.dk, &transcript.fork("paillier key")),
            pedersen: PedersenPublicSetup::from_private(&pedersen, &transcript.fork("ring-pedersen")),
            u: random_bytes(),
        };
        let commitment = decommitment.commit(&helper, &self_id);
        log::debug!("{}: commitment {}", self_id, hex::encode(&commitment));

        Ok(Self {
            helper,
            previous,
            secrets: Secrets {
                polynomial,
                paillier,
                schnorr,
            },
            decommitment,
            commitment,
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
        out.send(
            None,
            &Commitment {
                hash: self.commitment.clone(),
            },
        )
    }

    fn next(self) -> Result<Round2, Error> {
        let mut commitments = BTreeMap::new();
        commitments.insert(self.helper.self_id().clone(), self.commitment);
        Ok(Round2 {
            helper: self.helper,
            previous: self.previous,
            secrets: self.secrets,
            decommitment: self.decommitment,
            commitments,
        })
    }
}

/// Collects commitments and echoes their hash
pub struct Round2 {
    helper: Helper,
    previous: Option<Config>,
    secrets: Secrets,
    decommitment: Decommitment,
    commitments: BTreeMap<PartyId, Vec<u8>>,
}

impl Round2 {
    fn echo(&self) -> EchoHash {
        self.helper.echo_hash(
            self.commitments
                .iter()
                .map(|(party, hash)| (party, hash.as_slice())),
        )
    }
}

impl Round for Round2 {
    type Message = Commitment;
    type Broadcast = NoContent;
    type Next = Round3;
    const NUMBER: u16 = 2;

    fn helper(&self) -> &Helper {
        &self.helper
    }

    fn process_message(&mut self, from: &PartyId, content: Commitment) -> Result<(), Error> {
        self.commitments.insert(from.clone(), content.hash);
        Ok(())
    }

    fn generate_messages(&mut self, out: &mut Outbox) -> Result<(), Error> {
        out.send(None, &Echo { hash: self.echo() })
    }

    fn next(self) -> Result<Round3, Error> {
        let echo = self.echo();
        Ok(Round3 {
            helper: self.helper,
            previous: self.previous,
            secrets: self.secrets,
            decommitment: self.decommitment,
            commitments: self.commitments,
            echo,
        })
    }
}

/// Compares echoes of all parties with its own
pub struct Round3 {
    helper: Helper,
    previous: Option<Config>,
    secrets: Secrets,
    decommitment: Decommitment,
    commitments: BTreeMap<PartyId, Vec<u8>>,
    echo: EchoHash,
}

impl Round for Round3 {
    type Message = Echo;
    type Broadcast = NoContent;
    type Next = Round4;
    const NUMBER: u16 = 3;

    fn helper(&self) -> &Helper {
        &self.helper
    }

    fn process_message(&mut self, from: &PartyId, content: Echo) -> Result<(), Error> {
        self.echo.check(from, &content.hash)
    }

    fn generate_messages(&mut self, out: &mut Outbox) -> Result<(), Error> {
        out.send(None, &self.decommitment)
    }

    fn next(self) -> Result<Round4, Error> {
        let mut decommitments = BTreeMap::new();
        decommitments.insert(self.helper.self_id().clone(), self.decommitment);
        Ok(Round4 {
            helper: self.helper,
            previous: self.previous,
            secrets: self.secrets,
            commitments: self.commitments,
            decommitments,
        })
    }
}

/// Verifies decommitments and distributes shares
pub struct Round4 {
    helper: Helper,
    previous: Option<Config>,
    secrets: Secrets,
    commitments: BTreeMap<PartyId, Vec<u8>>,
    decommitments: BTreeMap<PartyId, Decommitment>,
}

impl Round4 {
    /// XOR of contributions of all parties
    fn rid(&self) -> Vec<u8> {
        self.decommitments
            .values()
            .fold(vec![0u8; HASH_BYTES], |mut acc, decommitment| {
                acc.iter_mut()
                    .zip(decommitment.rid.iter())
                    .for_each(|(a, b)| *a ^= *b);
                acc
            })
    }

    fn verify_decommitment(&self, from: &PartyId, content: &Decommitment) -> Result<(), Error> {
        let helper = &self.helper;
        let commitment = self
            .commitments
            .get(from)
            .ok_or_else(|| Error::Protocol(format!("no commitment from {}", from)))?;
        if content.commit(helper, from) != *commitment {
            return Err(Error::validation(from, "decommitment does not match commitment"));
        }
        if content.exponent.degree() != helper.threshold() {
            return Err(Error::validation(
                from,
                format!(
                    "sharing polynomial has degree {}, expected {}",
                    content.exponent.degree(),
                    helper.threshold()
                ),
            ));
        }
        let expects_constant = self.previous.is_none();
        if content.exponent.constant.is_some() != expects_constant {
            return Err(Error::validation(
                from,
                "constant term of the sharing polynomial does not fit the protocol",
            ));
        }
        for point in 1..=helper.party_ids().len() {
            if content.exponent.evaluate(point).is_none() {
                log::warn!(
                    "{}: exponent of {} vanishes at point {}",
                    helper.self_id(),
                    from,
                    point
                );
                return Err(Error::validation(
                    from,
                    format!("sharing polynomial vanishes at point {}", point),
                ));
            }
        }

        let transcript = helper.transcript_for(from);
        content
            .paillier_proof
            .verify(&content.paillier_key(), &transcript.fork("paillier key"))
            .map_err(|e| Error::from((from.clone(), e)))?;
        content
            .pedersen
            .verify(&transcript.fork("ring-pedersen"))
            .map_err(|e| {
                log::warn!("{}: {}", from, e);
                Error::proof(from, "ring-pedersen parameters")
            })?;
        if content.pedersen.params.n != content.paillier {
            return Err(Error::validation(
                from,
                "Ring-Pedersen modulus differs from Paillier modulus",
            ));
        }
        Ok(())
    }
}

impl Round for Round4 {
    type Message = NoContent;
    type Broadcast = Decommitment;
    type Next = Round5;
    const NUMBER: u16 = 4;

    fn helper(&self) -> &Helper {
        &self.helper
    }

    fn store_broadcast_message(
        &mut self,
        from: &PartyId,
        content: Decommitment,
    ) -> Result<(), Error> {
        self.verify_decommitment(from, &content)?;
        self.decommitments.insert(from.clone(), content);
        Ok(())
    }

    fn generate_messages(&mut self, out: &mut Outbox) -> Result<(), Error> {
        let helper = &self.helper;
        let self_id = helper.self_id();

        let schnorr = match (
            self.secrets.polynomial.constant(),
            self.decommitments
                .get(self_id)
                .and_then(|own| own.exponent.constant.as_ref()),
        ) {
            (Some(secret), Some(public)) => Some(self.secrets.schnorr.prove(
                &schnorr_transcript(helper, self_id, &self.rid()),
                public,
                secret,
            )),
            _ => None,
        };

        let recipients = helper
            .other_party_ids()
            .map(|party| -> Result<_, Error> {
                let decommitment = self
                    .decommitments
                    .get(party)
                    .ok_or_else(|| Error::Protocol(format!("no decommitment from {}", party)))?;
                let share = self.secrets.polynomial.evaluate(point_of(helper, party)?);
                Ok((party.clone(), decommitment.paillier_key(), share))
            })
            .collect::<Result<Vec<(PartyId, EncryptionKey, BigInt)>, Error>>()?;

        let encrypted = helper.pool().parallelize(recipients, |(party, ek, share)| {
            let r = BigInt::from_paillier_key(&ek);
            (party, encrypt_signed(&ek, &share, &r))
        });

        for (party, share) in encrypted {
            out.send(
                Some(&party),
                &Share {
                    share,
                    schnorr: schnorr.clone(),
                },
            )?;
        }
        Ok(())
    }

    fn next(self) -> Result<Round5, Error> {
        let rid = self.rid();
        Ok(Round5 {
            helper: self.helper,
            previous: self.previous,
            secrets: self.secrets,
            decommitments: self.decommitments,
            rid,
            shares: BTreeMap::new(),
        })
    }
}

/// Verifies received shares and assembles the config
pub struct Round5 {
    helper: Helper,
    previous: Option<Config>,
    secrets: Secrets,
    decommitments: BTreeMap<PartyId, Decommitment>,
    rid: Vec<u8>,
    shares: BTreeMap<PartyId, BigInt>,
}

impl Round5 {
    fn verify_schnorr(
        &self,
        from: &PartyId,
        decommitment: &Decommitment,
        content: &Share,
    ) -> Result<(), Error> {
        match (&content.schnorr, &decommitment.exponent.constant) {
            (Some(response), Some(public)) => {
                let transcript = schnorr_transcript(&self.helper, from, &self.rid);
                if response.verify(&transcript, public, &decommitment.schnorr_commitment) {
                    Ok(())
                } else {
                    Err(Error::proof(from, "schnorr"))
                }
            }
            (None, None) => Ok(()),
            (None, Some(_)) => Err(Error::validation(from, "missing Schnorr proof")),
            (Some(_), None) => Err(Error::validation(from, "unexpected Schnorr proof")),
        }
    }

    fn public_shares(&self) -> Result<BTreeMap<PartyId, PublicShare>, Error> {
        self.helper
            .party_ids()
            .iter()
            .enumerate()
            .map(|(index, party)| -> Result<_, Error> {
                let point = index + 1;
                let mut terms = self
                    .decommitments
                    .iter()
                    .map(|(owner, decommitment)| {
                        decommitment.exponent.evaluate(point).ok_or_else(|| {
                            Error::validation(owner, "sharing polynomial vanishes at a party point")
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                if let Some(previous) = &self.previous {
                    terms.push(previous.public_share(party)?.ecdsa);
                }
                let decommitment = self
                    .decommitments
                    .get(party)
                    .ok_or_else(|| Error::Protocol(format!("no decommitment from {}", party)))?;
                let share = PublicShare {
                    point,
                    ecdsa: sum_points(&terms).ok_or_else(|| {
                        Error::Protocol(format!("public share of {} is the point at infinity", party))
                    })?,
                    paillier: decommitment.paillier_key(),
                    pedersen: decommitment.pedersen.params.clone(),
                };
                Ok((party.clone(), share))
            })
            .collect()
    }
}

impl Round for Round5 {
    type Message = Share;
    type Broadcast = NoContent;
    type Next = Output<Config>;
    const NUMBER: u16 = 5;

    fn helper(&self) -> &Helper {
        &self.helper
    }

    fn process_message(&mut self, from: &PartyId, content: Share) -> Result<(), Error> {
        let decommitment = self
            .decommitments
            .get(from)
            .ok_or_else(|| Error::Protocol(format!("no decommitment from {}", from)))?;
        self.verify_schnorr(from, decommitment, &content)?;

        let keys = &self.secrets.paillier;
        if !is_valid_ciphertext(&keys.ek, &content.share) {
            return Err(Error::validation(from, "share is not a valid ciphertext"));
        }
        let share: BigInt = keys.decrypt(content.share).0.into_owned();
        if share >= FE::q() {
            return Err(Error::validation(from, "share is out of range"));
        }
        let share_fe =
            to_scalar(&share).ok_or_else(|| Error::validation(from, "share is zero"))?;
        let expected = decommitment
            .exponent
            .evaluate(point_of(&self.helper, self.helper.self_id())?)
            .ok_or_else(|| Error::validation(from, "sharing polynomial vanishes at own point"))?;
        if GE::generator() * share_fe != expected {
            log::warn!("share from {} does not match its polynomial", from);
            return Err(Error::validation(from, "share does not match the sharing polynomial"));
        }
        self.shares.insert(from.clone(), share);
        Ok(())
    }

    fn generate_messages(&mut self, _out: &mut Outbox) -> Result<(), Error> {
        Ok(())
    }

    fn next(self) -> Result<Output<Config>, Error> {
        let helper = &self.helper;
        let self_id = helper.self_id();
        let q = FE::q();

        let own = self.secrets.polynomial.evaluate(point_of(helper, self_id)?);
        let mut x = self.shares.values().fold(own, |acc, share| (acc + share) % &q);
        let public_key = match &self.previous {
            Some(previous) => {
                x = (x + previous.ecdsa.to_big_int()) % &q;
                previous.public_key
            }
            None => sum_points(
                self.decommitments
                    .values()
                    .filter_map(|decommitment| decommitment.exponent.constant.as_ref()),
            )
            .ok_or_else(|| Error::Protocol("public key is the point at infinity".to_string()))?,
        };
        let ecdsa = to_scalar(&x).ok_or_else(|| Error::Protocol("secret share is zero".to_string()))?;

        let config = Config {
            id: self_id.clone(),
            threshold: helper.threshold(),
            ecdsa,
            paillier: self.secrets.paillier.clone(),
            public_key,
            public: self.public_shares()?,
            rid: self.rid.clone(),
        };
        config.validate()?;
        log::info!(
            "{}: {} finished, public key {:?}",
            self_id,
            helper.protocol(),
            config.public_key
        );
        Ok(Output::new(Self::NUMBER + 1, config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecdsa::all_equal;
    use crate::protocol::Message;
    use crate::round::{Session, Transition};
    use crate::state_machine::network::{run, Tamper};

    fn parties(names: &[&str]) -> Vec<PartyId> {
        names.iter().map(|&name| PartyId::from(name)).collect()
    }

    fn run_keygen(ids: &[PartyId], threshold: usize, tamper: Option<Tamper>) -> Vec<Result<Config, Error>> {
        let pool = Arc::new(Pool::serial());
        let parties = ids
            .iter()
            .map(|id| (id.clone(), keygen(id, ids, threshold, pool.clone())))
            .collect();
        run(parties, b"keygen test", tamper)
    }

    #[test]
    fn keygen_and_refresh() -> anyhow::Result<()> {
        let _ = env_logger::builder().is_test(true).try_init();
        let ids = parties(&["client-1", "server-1"]);
        let configs = run_keygen(&ids, 1, None)
            .into_iter()
            .collect::<Result<Vec<_>, _>>()?;

        assert!(all_equal(configs.iter().map(|c| c.public_key)));
        assert!(all_equal(configs.iter().map(|c| &c.public)));
        for config in &configs {
            config.validate()?;
            let restored = Config::from_bytes(&config.to_bytes()?)?;
            assert_eq!(restored.public_key, config.public_key);
            assert_eq!(restored.ecdsa, config.ecdsa);
        }

        let pool = Arc::new(Pool::serial());
        let refreshed = run(
            configs
                .iter()
                .map(|c| (c.id.clone(), refresh(c.clone(), pool.clone())))
                .collect(),
            b"refresh test",
            None,
        )
        .into_iter()
        .collect::<Result<Vec<_>, _>>()?;

        for (old, new) in configs.iter().zip(refreshed.iter()) {
            new.validate()?;
            assert_eq!(new.public_key, old.public_key);
            assert_ne!(new.ecdsa, old.ecdsa);
            assert_ne!(new.paillier.ek, old.paillier.ek);
        }
        Ok(())
    }

    #[test]
    fn rounds_are_numbered_consecutively() -> anyhow::Result<()> {
        let ids = parties(&["a", "b"]);
        let pool = Arc::new(Pool::serial());
        let mut a = keygen(&ids[0], &ids, 1, pool.clone())(&b"rounds"[..])?;
        let mut b = keygen(&ids[1], &ids, 1, pool)(&b"rounds"[..])?;

        let mut numbers = vec![a.number()];
        loop {
            let (mut out_a, mut out_b) = (Vec::new(), Vec::new());
            match (a.finalize(&mut out_a)?, b.finalize(&mut out_b)?) {
                (Transition::Next(next_a), Transition::Next(next_b)) => {
                    a = next_a;
                    b = next_b;
                    assert_eq!(a.number(), b.number());
                    numbers.push(a.number());
                    for m in &out_b {
                        a.accept(m)?;
                    }
                    for m in &out_a {
                        b.accept(m)?;
                    }
                    assert!(a.is_complete() && b.is_complete());
                }
                (Transition::Output(output_a), Transition::Output(output_b)) => {
                    assert_eq!(output_a.number(), output_b.number());
                    numbers.push(output_a.number());
                    assert_eq!(
                        output_a.finalize().public_key,
                        output_b.finalize().public_key
                    );
                    break;
                }
                _ => panic!("parties went out of step"),
            }
        }
        assert_eq!(numbers, vec![1, 2, 3, 4, 5, 6]);
        Ok(())
    }

    #[test]
    fn commitment_of_wrong_length_is_rejected() -> anyhow::Result<()> {
        let ids = parties(&["a", "b"]);
        let pool = Arc::new(Pool::serial());
        let session = keygen(&ids[0], &ids, 1, pool.clone())(&b"wrong length"[..])?;
        let mut out = Vec::new();
        let mut session = match session.finalize(&mut out)? {
            Transition::Next(next) => next,
            Transition::Output(_) => panic!("key generation ended early"),
        };
        assert_eq!(session.number(), 2);

        let peer = Helper::new(ProtocolId::Keygen, &ids[1], &ids, 1, b"wrong length", &[], pool)?;
        let envelope = |hash: Vec<u8>| -> anyhow::Result<Message> {
            let mut outbox = Outbox::new(&peer, 2);
            outbox.send(None, &Commitment { hash })?;
            Ok(outbox.into_messages().remove(0))
        };

        match session.accept(&envelope(vec![1u8; HASH_BYTES - 1])?) {
            Err(Error::Validation { from, .. }) => assert_eq!(from, ids[1]),
            other => panic!("unexpected result {:?}", other),
        }
        assert!(!session.is_complete());

        session.accept(&envelope(vec![1u8; HASH_BYTES])?)?;
        assert!(session.is_complete());
        Ok(())
    }

    #[test]
    fn exponent_vanishing_at_a_party_point_is_rejected() -> anyhow::Result<()> {
        let _ = env_logger::builder().is_test(true).try_init();
        let ids = parties(&["a", "b"]);
        let pool = Arc::new(Pool::serial());
        let mut honest = keygen(&ids[0], &ids, 1, pool.clone())(&b"vanishing"[..])?;

        let helper = Helper::new(ProtocolId::Keygen, &ids[1], &ids, 1, b"vanishing", &[], pool)?;
        let mut round = Round1::new(helper, None)?;
        let a0 = round
            .decommitment
            .exponent
            .constant
            .expect("keygen polynomial has a constant term");
        let minus_one = to_scalar(&(FE::q() - BigInt::one())).expect("nonzero scalar");
        // F(x) = A_0 - x A_0 vanishes at the point of "a"
        round.decommitment.exponent.coefficients = vec![a0 * minus_one];
        round.commitment = round.decommitment.commit(&round.helper, &ids[1]);
        let mut malicious: KeygenSession = round.into();

        loop {
            let (mut out_honest, mut out_malicious) = (Vec::new(), Vec::new());
            honest = match honest.finalize(&mut out_honest)? {
                Transition::Next(next) => next,
                Transition::Output(_) => panic!("key generation ended early"),
            };
            malicious = match malicious.finalize(&mut out_malicious)? {
                Transition::Next(next) => next,
                Transition::Output(_) => panic!("key generation ended early"),
            };
            if honest.number() == 4 {
                assert_eq!(out_malicious.len(), 1);
                match honest.accept(&out_malicious[0]) {
                    Err(Error::Validation { from, .. }) => assert_eq!(from, ids[1]),
                    other => panic!("unexpected result {:?}", other),
                }
                assert!(!honest.is_complete());
                return Ok(());
            }
            for m in &out_malicious {
                honest.accept(m)?;
            }
            for m in &out_honest {
                malicious.accept(m)?;
            }
        }
    }

    #[test]
    fn equivocation_is_detected() {
        let _ = env_logger::builder().is_test(true).try_init();
        let ids = parties(&["a", "b", "c"]);
        let (sender, victim) = (ids[0].clone(), ids[2].clone());
        let tamper: Tamper = Box::new(move |recipient: &PartyId, message: &mut Message| {
            if message.from == sender && *recipient == victim && message.round_number == 2 {
                message.data = serde_json::to_vec(&Commitment {
                    hash: vec![7u8; HASH_BYTES],
                })
                .expect("encodable commitment");
            }
        });

        let results = run_keygen(&ids, 1, Some(tamper));
        assert_eq!(results.len(), 3);
        for result in results {
            assert!(
                matches!(result, Err(Error::Equivocation { .. })),
                "unexpected result {:?}",
                result
            );
        }
    }
}
