//!  Protocol driver
//!
//!  Unlike its async version, this driver uses receiver and sender queue types from crate `crossbeam_channel`
//!  See details in similar [`Async state machine`]
//!
//!
//! [`Async state machine`]: ../async_channels/index.html
//!
use crate::protocol::Message;
use crate::round::{Session, Transition};
use crate::state_machine::{dispose, DiscardedDeck, Disposition};
use crate::Error;
use crossbeam_channel::{Receiver, Sender};

/// Protocol driver
///
/// See [`async_channels::StateMachine`](../async_channels/struct.StateMachine.html)
pub struct StateMachine<'a, S>
where
    S: Session,
{
    session: Option<S>,
    inqueue: &'a Receiver<Message>,
    outqueue: &'a Sender<Message>,
    discarded: DiscardedDeck<Message>,
}

impl<'a, S: Session> StateMachine<'a, S> {
    pub fn new(session: S, inqueue: &'a Receiver<Message>, outqueue: &'a Sender<Message>) -> Self {
        StateMachine {
            session: Some(session),
            inqueue,
            outqueue,
            discarded: DiscardedDeck::new(),
        }
    }

    pub fn execute(&mut self) -> Option<Result<S::Output, Error>> {
        log::trace!("starting State Machine");

        loop {
            let session = self.session.take()?;
            let session = if session.is_complete() {
                match self.advance(session) {
                    Ok(Transition::Next(next)) => {
                        self.discarded.flip();
                        next
                    }
                    Ok(Transition::Output(output)) => return Some(Ok(output.finalize())),
                    Err(e) => return Some(Err(e)),
                }
            } else {
                session
            };

            if session.is_complete() {
                self.session = Some(session);
                continue;
            }

            let message = match self.discarded.pop() {
                // first a message is taken from the deck of discarded
                Some(m) => m,
                // in case the deck is empty, read from the channel
                None => match self.inqueue.recv() {
                    Ok(m) => m,
                    Err(e) => {
                        log::error!("SM: receive error {:?}", e);
                        //early exit required to avoid infinite loop after first RecvError
                        return None;
                    }
                },
            };
            let mut session = session;
            if let Err(e) = self.process_message(&mut session, message) {
                return Some(Err(e));
            }
            self.session = Some(session);
        }
    }

    fn process_message(&mut self, session: &mut S, message: Message) -> Result<(), Error> {
        match dispose(session, &message) {
            Disposition::Accept => session.accept(&message).map_err(|e| {
                log::error!(
                    "{}: message from {} rejected: {}",
                    session.helper().self_id(),
                    message.from,
                    e
                );
                e
            }),
            Disposition::Defer => {
                self.discarded.save(message);
                Ok(())
            }
            Disposition::Drop => Ok(()),
        }
    }

    fn advance(&mut self, session: S) -> Result<Transition<S>, Error> {
        let mut output = Vec::new();
        let transition = session.finalize(&mut output)?;
        for m in output {
            if let Err(err) = self.outqueue.send(m) {
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
    use std::thread;

    #[derive(Serialize, Deserialize)]
    struct Ping(u32);

    impl Content for Ping {
        const ROUND: u16 = 2;
        const BROADCAST: bool = true;
    }

    struct Start(Helper);

    struct Collect {
        helper: Helper,
        sum: u32,
    }

    impl Round for Start {
        type Message = NoContent;
        type Broadcast = NoContent;
        type Next = Collect;
        const NUMBER: u16 = 1;

        fn helper(&self) -> &Helper {
            &self.0
        }

        fn generate_messages(&mut self, out: &mut Outbox) -> Result<(), Error> {
            out.send(None, &Ping(self.0.self_id().as_str().len() as u32))
        }

        fn next(self) -> Result<Collect, Error> {
            Ok(Collect {
                helper: self.0,
                sum: 0,
            })
        }
    }

    impl Round for Collect {
        type Message = NoContent;
        type Broadcast = Ping;
        type Next = Output<u32>;
        const NUMBER: u16 = 2;

        fn helper(&self) -> &Helper {
            &self.helper
        }

        fn store_broadcast_message(&mut self, _from: &PartyId, content: Ping) -> Result<(), Error> {
            self.sum += content.0;
            Ok(())
        }

        fn generate_messages(&mut self, _out: &mut Outbox) -> Result<(), Error> {
            Ok(())
        }

        fn next(self) -> Result<Output<u32>, Error> {
            Ok(Output::new(3, self.sum))
        }
    }

    session! {
        enum PingSession -> u32 {
            Start(Start),
            Collect(Collect),
        }
    }

    fn start(self_id: &str) -> PingSession {
        let parties = vec![PartyId::from("a"), PartyId::from("bb")];
        let helper = Helper::new(
            ProtocolId::Keygen,
            &PartyId::from(self_id),
            &parties,
            1,
            b"ping",
            &[],
            Arc::new(Pool::serial()),
        )
        .expect("valid parameters");
        Start(helper).into()
    }

    #[test]
    fn two_parties_exchange_broadcasts() {
        let _ = env_logger::builder().is_test(true).try_init();
        let (a_in, a_rx) = crossbeam_channel::unbounded();
        let (b_in, b_rx) = crossbeam_channel::unbounded();
        let (a_tx, a_out) = crossbeam_channel::unbounded();
        let (b_tx, b_out) = crossbeam_channel::unbounded();

        let a = thread::spawn(move || StateMachine::new(start("a"), &a_rx, &a_tx).execute());
        let b = thread::spawn(move || StateMachine::new(start("bb"), &b_rx, &b_tx).execute());

        // cross the wires
        let m: Message = a_out.recv().expect("message from a");
        b_in.send(m).expect("b is listening");
        let m: Message = b_out.recv().expect("message from b");
        a_in.send(m).expect("a is listening");

        assert_eq!(a.join().unwrap().unwrap().unwrap(), 2);
        assert_eq!(b.join().unwrap().unwrap().unwrap(), 1);
    }

    #[test]
    fn stale_message_is_dropped() {
        let (ingress, rx) = crossbeam_channel::unbounded();
        let (tx, egress) = crossbeam_channel::unbounded();

        let ping = {
            let (peer_tx, peer_out) = crossbeam_channel::unbounded();
            let (peer_in, peer_rx) = crossbeam_channel::unbounded::<Message>();
            drop(peer_in);
            let mut peer = StateMachine::new(start("bb"), &peer_rx, &peer_tx);
            assert!(peer.execute().is_none());
            peer_out.recv().expect("ping")
        };
        // the copy of the ping labelled with the first round arrives when the first round is over
        let mut stale = ping.clone();
        stale.round_number = 1;
        ingress.send(stale).unwrap();
        ingress.send(ping).unwrap();
        drop(ingress);

        let result = StateMachine::new(start("a"), &rx, &tx).execute();
        assert_eq!(result.unwrap().unwrap(), 2);
        assert_eq!(egress.len(), 1);
    }

    #[test]
    fn message_beyond_last_round_is_dropped() {
        let session = start("a");
        assert_eq!(session.last_round(), 2);

        let (peer_tx, peer_out) = crossbeam_channel::unbounded();
        let (peer_in, peer_rx) = crossbeam_channel::unbounded::<Message>();
        drop(peer_in);
        assert!(StateMachine::new(start("bb"), &peer_rx, &peer_tx)
            .execute()
            .is_none());
        let ping = peer_out.recv().expect("ping");

        assert!(matches!(dispose(&session, &ping), Disposition::Defer));
        let mut far = ping;
        far.round_number = 3;
        assert!(matches!(dispose(&session, &far), Disposition::Drop));
        far.round_number = u16::MAX;
        assert!(matches!(dispose(&session, &far), Disposition::Drop));
    }
}
