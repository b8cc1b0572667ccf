use crate::algorithms::sha::Transcript;
use crate::pool::Pool;
use crate::protocol::{Message, PartyId, ProtocolId, RoundNumber, SessionId};
use crate::round::Content;
use crate::Error;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

const SSID_DOMAIN: &str = "cmp session id";
const SESSION_DOMAIN: &str = "cmp session";
const ECHO_DOMAIN: &str = "cmp echo";

/// Session-wide immutable parameters shared by every round of a protocol run
#[derive(Clone)]
pub struct Helper {
    protocol: ProtocolId,
    self_id: PartyId,
    party_ids: Vec<PartyId>,
    threshold: usize,
    ssid: SessionId,
    pool: Arc<Pool>,
}

impl Helper {
    /// Validates the parameters of the session and computes its id
    ///
    /// `aux` binds the session id to the protocol-specific public data, such as the public key being used.
    pub fn new(
        protocol: ProtocolId,
        self_id: &PartyId,
        party_ids: &[PartyId],
        threshold: usize,
        session_id: &[u8],
        aux: &[u8],
        pool: Arc<Pool>,
    ) -> Result<Self, Error> {
        let sorted = party_ids.iter().cloned().collect::<BTreeSet<_>>();
        if sorted.len() != party_ids.len() {
            return Err(Error::Protocol(format!(
                "party ids contain duplicates: {:?}",
                party_ids
            )));
        }
        if !sorted.contains(self_id) {
            return Err(Error::Protocol(format!(
                "party {} is not in the list of parties",
                self_id
            )));
        }
        if sorted.len() < 2 {
            return Err(Error::Protocol(
                "at least two parties are required".to_string(),
            ));
        }
        if threshold >= sorted.len() {
            return Err(Error::Protocol(format!(
                "threshold {} must be less than the number of parties {}",
                threshold,
                sorted.len()
            )));
        }
        let party_ids = sorted.into_iter().collect::<Vec<_>>();

        let mut transcript = Transcript::new(SSID_DOMAIN);
        transcript.write_bytes(protocol.as_ref().as_bytes());
        party_ids.iter().for_each(|id| {
            transcript.write_party(id);
        });
        transcript
            .write_bytes(&(threshold as u64).to_le_bytes())
            .write_bytes(session_id)
            .write_bytes(aux);
        let ssid = SessionId(transcript.finalize());

        log::debug!(
            "{} session {} of {} with parties {:?}, threshold {}",
            protocol,
            ssid,
            self_id,
            party_ids,
            threshold
        );

        Ok(Self {
            protocol,
            self_id: self_id.clone(),
            party_ids,
            threshold,
            ssid,
            pool,
        })
    }

    pub fn protocol(&self) -> ProtocolId {
        self.protocol
    }

    pub fn self_id(&self) -> &PartyId {
        &self.self_id
    }

    /// all parties, sorted
    pub fn party_ids(&self) -> &[PartyId] {
        &self.party_ids
    }

    pub fn other_party_ids(&self) -> impl Iterator<Item = &PartyId> {
        let self_id = &self.self_id;
        self.party_ids.iter().filter(move |id| *id != self_id)
    }

    pub fn is_participant(&self, party: &PartyId) -> bool {
        self.party_ids.binary_search(party).is_ok()
    }

    pub fn n(&self) -> usize {
        self.party_ids.len()
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn ssid(&self) -> &SessionId {
        &self.ssid
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    /// transcript bound to this session
    pub fn transcript(&self) -> Transcript {
        Transcript::with_session(SESSION_DOMAIN, &self.ssid)
    }

    /// transcript bound to this session and to the party creating a proof
    pub fn transcript_for(&self, prover: &PartyId) -> Transcript {
        let mut transcript = self.transcript();
        transcript.write_party(prover);
        transcript
    }

    /// Computes $` H(ssid, commit_1, \ldots, commit_n) `$ over the values indexed by party, in the order of parties
    pub fn echo_hash<'a, I>(&self, values: I) -> EchoHash
    where
        I: IntoIterator<Item = (&'a PartyId, &'a [u8])>,
    {
        let mut transcript = Transcript::with_session(ECHO_DOMAIN, &self.ssid);
        let mut values = values.into_iter().collect::<Vec<_>>();
        values.sort_by(|a, b| a.0.cmp(b.0));
        values.into_iter().for_each(|(party, value)| {
            transcript.write_party(party).write_bytes(value);
        });
        EchoHash(transcript.finalize().to_vec())
    }
}

/// Hash of the view a party has on the values sent to it by all parties
///
/// Kept as a vector, so that content with wrong length can be decoded and rejected by validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EchoHash(pub Vec<u8>);

impl EchoHash {
    /// compares the echo of `from` with our own one
    pub fn check(&self, from: &PartyId, theirs: &EchoHash) -> Result<(), Error> {
        if self == theirs {
            Ok(())
        } else {
            log::error!(
                "echo hash mismatch with {}: ours {}, theirs {}",
                from,
                hex::encode(&self.0),
                hex::encode(&theirs.0)
            );
            Err(Error::Equivocation { from: from.clone() })
        }
    }
}

/// Accumulator for outgoing messages of a round
pub struct Outbox {
    ssid: SessionId,
    from: PartyId,
    protocol: ProtocolId,
    round: RoundNumber,
    messages: Vec<Message>,
}

impl Outbox {
    pub(crate) fn new(helper: &Helper, round: RoundNumber) -> Self {
        Self {
            ssid: helper.ssid,
            from: helper.self_id.clone(),
            protocol: helper.protocol,
            round,
            messages: Vec::new(),
        }
    }

    /// Puts the content addressed to `to` into the outbox, `None` addresses all parties.
    /// Broadcast content is always addressed to all parties.
    pub fn send<C: Content>(&mut self, to: Option<&PartyId>, content: &C) -> Result<(), Error> {
        if !C::PRESENT || C::ROUND != self.round {
            return Err(Error::Protocol(format!(
                "content of round {} cannot be sent to round {}",
                C::ROUND,
                self.round
            )));
        }
        if C::BROADCAST && to.is_some() {
            return Err(Error::Protocol(format!(
                "broadcast content of round {} cannot be addressed to a single party",
                C::ROUND
            )));
        }
        let data = serde_json::to_vec(content)
            .map_err(|e| Error::Protocol(format!("cannot encode content: {}", e)))?;
        self.messages.push(Message {
            ssid: self.ssid,
            from: self.from.clone(),
            to: to.cloned(),
            protocol: self.protocol,
            round_number: C::ROUND,
            broadcast: C::BROADCAST,
            data,
        });
        Ok(())
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }
}
