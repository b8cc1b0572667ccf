use crate::protocol::{Message, PartyId, RoundNumber};
use crate::round::{Content, Outbox, Round};
use crate::Error;
use std::collections::BTreeSet;

/// Round wrapped with the verification of incoming messages
///
/// Keeps track of the parties which already delivered their content to the round.
pub struct Stage<R: Round> {
    round: R,
    received: BTreeSet<PartyId>,
    broadcasts: BTreeSet<PartyId>,
}

impl<R: Round> Stage<R> {
    pub fn new(round: R) -> Self {
        Self {
            round,
            received: BTreeSet::new(),
            broadcasts: BTreeSet::new(),
        }
    }

    pub fn round(&self) -> &R {
        &self.round
    }

    pub fn number(&self) -> RoundNumber {
        R::NUMBER
    }

    /// Verifies the envelope, decodes its content and hands the content over to the round
    pub fn accept(&mut self, message: &Message) -> Result<(), Error> {
        self.check_envelope(message)?;
        let from = &message.from;

        if message.broadcast {
            if self.round.broadcast_content().is_none() {
                return Err(Error::Protocol(format!(
                    "round {} expects no broadcast content, got one from {}",
                    R::NUMBER,
                    from
                )));
            }
            if self.broadcasts.contains(from) {
                return Err(Error::Protocol(format!(
                    "duplicate broadcast from {} in round {}",
                    from,
                    R::NUMBER
                )));
            }
            let content = decode::<R::Broadcast>(message)?;
            content.validate(from)?;
            self.round.store_broadcast_message(from, content)?;
            self.broadcasts.insert(from.clone());
        } else {
            if self.round.message_content().is_none() {
                return Err(Error::Protocol(format!(
                    "round {} expects no direct content, got one from {}",
                    R::NUMBER,
                    from
                )));
            }
            if self.received.contains(from) {
                return Err(Error::Protocol(format!(
                    "duplicate message from {} in round {}",
                    from,
                    R::NUMBER
                )));
            }
            let content = decode::<R::Message>(message)?;
            content.validate(from)?;
            self.round.process_message(from, content)?;
            self.received.insert(from.clone());
        }
        log::trace!(
            "{}: round {} accepted message from {}",
            self.round.helper().self_id(),
            R::NUMBER,
            from
        );
        Ok(())
    }

    fn check_envelope(&self, message: &Message) -> Result<(), Error> {
        let helper = self.round.helper();
        let from = &message.from;
        if message.ssid != *helper.ssid() {
            return Err(Error::Protocol(format!(
                "message from {} belongs to session {}",
                from, message.ssid
            )));
        }
        if message.protocol != helper.protocol() {
            return Err(Error::Protocol(format!(
                "message from {} belongs to protocol {}",
                from, message.protocol
            )));
        }
        if from == helper.self_id() {
            return Err(Error::Protocol("message from self".to_string()));
        }
        if !helper.is_participant(from) {
            return Err(Error::Protocol(format!("unknown sender {}", from)));
        }
        if let Some(to) = &message.to {
            if to != helper.self_id() {
                return Err(Error::Protocol(format!(
                    "message from {} is addressed to {}",
                    from, to
                )));
            }
        }
        if message.round_number != R::NUMBER {
            return Err(Error::Protocol(format!(
                "message from {} for round {} received in round {}",
                from,
                message.round_number,
                R::NUMBER
            )));
        }
        Ok(())
    }

    /// true if every other party delivered the content the round expects
    ///
    /// Broadcast content substitutes direct content of the same party.
    pub fn is_complete(&self) -> bool {
        let expects_broadcast = self.round.broadcast_content().is_some();
        let expects_message = self.round.message_content().is_some();
        self.round.helper().other_party_ids().all(|party| {
            if expects_broadcast {
                self.broadcasts.contains(party)
            } else if expects_message {
                self.received.contains(party)
            } else {
                true
            }
        })
    }

    /// Generates outgoing messages of the round and moves to the next round
    pub fn finalize(mut self, out: &mut Vec<Message>) -> Result<R::Next, Error> {
        if !self.is_complete() {
            return Err(Error::Protocol(format!(
                "round {} cannot be finalized before all messages arrive",
                R::NUMBER
            )));
        }
        let mut outbox = Outbox::new(self.round.helper(), R::NUMBER + 1);
        self.round.generate_messages(&mut outbox)?;
        out.extend(outbox.into_messages());
        log::debug!(
            "{}: round {} finished",
            self.round.helper().self_id(),
            R::NUMBER
        );
        self.round.next()
    }
}

fn decode<C: Content>(message: &Message) -> Result<C, Error> {
    serde_json::from_slice::<C>(&message.data).map_err(|e| Error::Decode {
        from: message.from.clone(),
        round: message.round_number,
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::Pool;
    use crate::protocol::{ProtocolId, SessionId, SSID_BYTES};
    use crate::round::{Helper, NoContent, Output};
    use serde::{Deserialize, Serialize};
    use std::sync::Arc;

    #[derive(Serialize, Deserialize)]
    struct Value(u32);

    impl Content for Value {
        const ROUND: u16 = 2;

        fn validate(&self, from: &PartyId) -> Result<(), Error> {
            if self.0 == 0 {
                Err(Error::validation(from, "zero value"))
            } else {
                Ok(())
            }
        }
    }

    struct Collect {
        helper: Helper,
        values: Vec<u32>,
    }

    impl Round for Collect {
        type Message = Value;
        type Broadcast = NoContent;
        type Next = Output<Vec<u32>>;
        const NUMBER: u16 = 2;

        fn helper(&self) -> &Helper {
            &self.helper
        }

        fn process_message(&mut self, _from: &PartyId, content: Value) -> Result<(), Error> {
            self.values.push(content.0);
            Ok(())
        }

        fn generate_messages(&mut self, _out: &mut Outbox) -> Result<(), Error> {
            Ok(())
        }

        fn next(self) -> Result<Self::Next, Error> {
            Ok(Output::new(3, self.values))
        }
    }

    fn helper(self_id: &str) -> Helper {
        let parties = ["a", "b", "c"]
            .iter()
            .map(|&s| PartyId::from(s))
            .collect::<Vec<_>>();
        Helper::new(
            ProtocolId::Keygen,
            &PartyId::from(self_id),
            &parties,
            1,
            b"stage",
            &[],
            Arc::new(Pool::serial()),
        )
        .expect("valid parameters")
    }

    fn envelope(from: &str, value: u32) -> Message {
        let mut outbox = Outbox::new(&helper(from), 2);
        outbox.send(None, &Value(value)).expect("encodable value");
        outbox.into_messages().remove(0)
    }

    fn stage() -> Stage<Collect> {
        Stage::new(Collect {
            helper: helper("a"),
            values: Vec::new(),
        })
    }

    fn assert_rejected(stage: &mut Stage<Collect>, message: &Message, expected: fn(&Error) -> bool) {
        match stage.accept(message) {
            Err(e) => assert!(expected(&e), "unexpected error {:?}", e),
            Ok(()) => panic!("message from {} is accepted", message.from),
        }
        assert!(stage.round().values.is_empty());
        assert!(!stage.is_complete());
    }

    fn is_protocol(e: &Error) -> bool {
        matches!(e, Error::Protocol(_))
    }

    #[test]
    fn foreign_envelopes_are_rejected() {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut stage = stage();

        let mut m = envelope("b", 1);
        m.ssid = SessionId([0u8; SSID_BYTES]);
        assert_rejected(&mut stage, &m, is_protocol);

        let mut m = envelope("b", 1);
        m.protocol = ProtocolId::Sign;
        assert_rejected(&mut stage, &m, is_protocol);

        let mut m = envelope("b", 1);
        m.from = PartyId::from("a");
        assert_rejected(&mut stage, &m, is_protocol);

        let mut m = envelope("b", 1);
        m.from = PartyId::from("z");
        assert_rejected(&mut stage, &m, is_protocol);

        let mut m = envelope("b", 1);
        m.to = Some(PartyId::from("c"));
        assert_rejected(&mut stage, &m, is_protocol);

        let mut m = envelope("b", 1);
        m.round_number = 3;
        assert_rejected(&mut stage, &m, is_protocol);

        assert!(matches!(
            stage.finalize(&mut Vec::new()),
            Err(Error::Protocol(_))
        ));
    }

    #[test]
    fn content_has_to_match_the_round() {
        let mut stage = stage();

        let mut m = envelope("b", 1);
        m.broadcast = true;
        assert_rejected(&mut stage, &m, is_protocol);

        let mut m = envelope("b", 1);
        m.data = b"{not json".to_vec();
        assert_rejected(&mut stage, &m, |e| {
            matches!(e, Error::Decode { round: 2, .. })
        });

        assert_rejected(&mut stage, &envelope("b", 0), |e| {
            matches!(e, Error::Validation { .. })
        });
    }

    #[test]
    fn every_party_delivers_once() -> anyhow::Result<()> {
        let mut stage = stage();
        stage.accept(&envelope("b", 5))?;
        assert!(!stage.is_complete());

        match stage.accept(&envelope("b", 6)) {
            Err(Error::Protocol(_)) => {}
            other => panic!("unexpected result {:?}", other),
        }
        assert_eq!(stage.round().values, vec![5]);
        assert!(!stage.is_complete());

        stage.accept(&envelope("c", 7))?;
        assert!(stage.is_complete());
        let mut out = Vec::new();
        let output = stage.finalize(&mut out)?;
        assert_eq!(output.number(), 3);
        assert_eq!(output.finalize(), vec![5, 7]);
        assert!(out.is_empty());
        Ok(())
    }
}
