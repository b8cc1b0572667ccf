//! Protocol driver
//!
//! This version of the driver utilizes async/await model of RUST. The input and output queue types are from [`futures::channel::mpsc`]

use futures::channel::mpsc::{UnboundedReceiver, UnboundedSender};
use futures::{SinkExt, StreamExt};

use crate::protocol::Message;
use crate::round::{Session, Transition};
use crate::state_machine::{dispose, DiscardedDeck, Disposition};
use crate::Error;

/// Protocol driver
///
///  The driver is instantiated with the type of the session `S` it executes.
///  The session is created by the caller, typically with the [`StartFunc`](../../round/type.StartFunc.html) of the protocol.
///
/// The input of the driver is a stream of [`Message`], addressed either to the party or to all parties.
/// The output is the stream of messages generated by the party, which the network layer has to deliver to their recipients.
pub struct StateMachine<S>
where
    S: Session,
{
    session: Option<S>,
    inqueue: UnboundedReceiver<Message>,
    outqueue: UnboundedSender<Message>,
    discarded: DiscardedDeck<Message>,
}

impl<S> StateMachine<S>
where
    S: Session,
{
    /// Create and initialize new machine
    pub fn new(
        session: S,
        inqueue: UnboundedReceiver<Message>,
        outqueue: UnboundedSender<Message>,
    ) -> Self {
        StateMachine {
            session: Some(session),
            inqueue,
            outqueue,
            discarded: DiscardedDeck::new(),
        }
    }

    /// Execute main loop of the machine.
    pub async fn execute(&mut self) -> Option<Result<S::Output, Error>> {
        log::trace!("starting State Machine");

        loop {
            let mut session = self.session.take()?;
            while session.is_complete() {
                match self.advance(session).await {
                    Ok(Transition::Next(next)) => {
                        self.discarded.flip();
                        session = next;
                    }
                    Ok(Transition::Output(output)) => return Some(Ok(output.finalize())),
                    Err(e) => return Some(Err(e)),
                }
            }

            let message = match self.discarded.pop() {
                // first a message is taken from the deck of discarded
                Some(m) => m,
                // in case the deck is empty, read from the channel
                None => match self.inqueue.next().await {
                    Some(m) => m,
                    None => {
                        log::error!("State machine: stream terminated");
                        return None;
                    }
                },
            };

            log::trace!("message received");
            match dispose(&session, &message) {
                Disposition::Accept => {
                    if let Err(e) = session.accept(&message) {
                        log::error!(
                            "{}: message from {} rejected: {}",
                            session.helper().self_id(),
                            message.from,
                            e
                        );
                        return Some(Err(e));
                    }
                }
                Disposition::Defer => self.discarded.save(message),
                Disposition::Drop => {}
            }
            self.session = Some(session);
        }
    }

    /// Finalizes the round and sends out all messages generated by it.
    async fn advance(&mut self, session: S) -> Result<Transition<S>, Error> {
        let mut output = Vec::new();
        let transition = session.finalize(&mut output)?;
        for m in output {
            if let Err(err) = self.outqueue.send(m).await {
                log::error!("State machine cannot send out message: {:?}", err);
            }
        }
        Ok(transition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::Pool;
    use crate::protocol::{PartyId, ProtocolId};
    use crate::round::{Content, Helper, NoContent, Outbox, Output, Round};
    use serde::{Deserialize, Serialize};
    use std::sync::Arc;

    #[derive(Serialize, Deserialize)]
    struct First(u32);

    impl Content for First {
        const ROUND: u16 = 2;
    }

    #[derive(Serialize, Deserialize)]
    struct Second(u32);

    impl Content for Second {
        const ROUND: u16 = 3;
        const BROADCAST: bool = true;
    }

    struct P1(Helper);

    struct P2 {
        helper: Helper,
        first: Vec<u32>,
    }

    struct P3 {
        helper: Helper,
        first: Vec<u32>,
        second: Vec<u32>,
    }

    impl Round for P1 {
        type Message = NoContent;
        type Broadcast = NoContent;
        type Next = P2;
        const NUMBER: u16 = 1;

        fn helper(&self) -> &Helper {
            &self.0
        }

        fn generate_messages(&mut self, out: &mut Outbox) -> Result<(), Error> {
            out.send(None, &First(1))
        }

        fn next(self) -> Result<P2, Error> {
            Ok(P2 {
                helper: self.0,
                first: Vec::new(),
            })
        }
    }

    impl Round for P2 {
        type Message = First;
        type Broadcast = NoContent;
        type Next = P3;
        const NUMBER: u16 = 2;

        fn helper(&self) -> &Helper {
            &self.helper
        }

        fn process_message(&mut self, _from: &PartyId, content: First) -> Result<(), Error> {
            self.first.push(content.0);
            Ok(())
        }

        fn generate_messages(&mut self, out: &mut Outbox) -> Result<(), Error> {
            out.send(None, &Second(2))
        }

        fn next(self) -> Result<P3, Error> {
            Ok(P3 {
                helper: self.helper,
                first: self.first,
                second: Vec::new(),
            })
        }
    }

    impl Round for P3 {
        type Message = NoContent;
        type Broadcast = Second;
        type Next = Output<(Vec<u32>, Vec<u32>)>;
        const NUMBER: u16 = 3;

        fn helper(&self) -> &Helper {
            &self.helper
        }

        fn store_broadcast_message(&mut self, _from: &PartyId, content: Second) -> Result<(), Error> {
            self.second.push(content.0);
            Ok(())
        }

        fn generate_messages(&mut self, _out: &mut Outbox) -> Result<(), Error> {
            Ok(())
        }

        fn next(self) -> Result<Self::Next, Error> {
            Ok(Output::new(4, (self.first, self.second)))
        }
    }

    session! {
        enum ThreeRounds -> (Vec<u32>, Vec<u32>) {
            P1(P1),
            P2(P2),
            P3(P3),
        }
    }

    fn helper(self_id: &str) -> Helper {
        let parties = vec![PartyId::from("a"), PartyId::from("b")];
        Helper::new(
            ProtocolId::Sign,
            &PartyId::from(self_id),
            &parties,
            1,
            b"three rounds",
            &[],
            Arc::new(Pool::serial()),
        )
        .expect("valid parameters")
    }

    fn peer_messages() -> Vec<Message> {
        let peer = helper("b");
        let mut first = Outbox::new(&peer, 2);
        first.send(None, &First(10)).unwrap();
        let mut second = Outbox::new(&peer, 3);
        second.send(None, &Second(20)).unwrap();
        first
            .into_messages()
            .into_iter()
            .chain(second.into_messages())
            .collect()
    }

    #[tokio::test]
    async fn messages_in_order() {
        let _ = env_logger::builder().is_test(true).try_init();
        let (mut ingress, rx) = futures::channel::mpsc::unbounded();
        let (tx, egress) = futures::channel::mpsc::unbounded();

        for m in peer_messages() {
            ingress.send(m).await.unwrap();
        }
        let mut machine = StateMachine::new(ThreeRounds::from(P1(helper("a"))), rx, tx);
        let result = machine.execute().await;
        assert!(matches!(result, Some(Ok((ref first, ref second))) if first == &[10] && second == &[20]));

        drop(machine);
        let sent = egress.collect::<Vec<_>>().await;
        assert_eq!(
            sent.iter().map(|m| m.round_number).collect::<Vec<_>>(),
            vec![2, 3]
        );
    }

    #[tokio::test]
    async fn early_message_is_deferred() {
        let _ = env_logger::builder().is_test(true).try_init();
        let (mut ingress, rx) = futures::channel::mpsc::unbounded();
        let (tx, _egress) = futures::channel::mpsc::unbounded();

        for m in peer_messages().into_iter().rev() {
            ingress.send(m).await.unwrap();
        }
        let mut machine = StateMachine::new(ThreeRounds::from(P1(helper("a"))), rx, tx);
        let result = machine.execute().await;
        assert!(matches!(result, Some(Ok((ref first, ref second))) if first == &[10] && second == &[20]));
    }

    #[tokio::test]
    async fn closed_stream() {
        let (ingress, rx) = futures::channel::mpsc::unbounded();
        let (tx, _egress) = futures::channel::mpsc::unbounded();
        drop(ingress);
        let mut machine = StateMachine::new(ThreeRounds::from(P1(helper("a"))), rx, tx);
        assert!(machine.execute().await.is_none());
    }

    #[tokio::test]
    async fn message_of_another_session_is_fatal() {
        let (mut ingress, rx) = futures::channel::mpsc::unbounded();
        let (tx, _egress) = futures::channel::mpsc::unbounded();
        let mut m = peer_messages().remove(0);
        m.ssid.0[0] ^= 1;
        ingress.send(m).await.unwrap();
        let mut machine = StateMachine::new(ThreeRounds::from(P1(helper("a"))), rx, tx);
        assert!(matches!(machine.execute().await, Some(Err(Error::Protocol(_)))));
    }
}
