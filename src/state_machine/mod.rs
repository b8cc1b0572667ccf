//!  Protocol drivers
//!
//!  The driver executes a protocol [`Session`] as a sequence of rounds. The session verifies and stores incoming messages,
//!  the driver only moves messages between the session and a networking layer, which is not included in this library.
//!  Instead, the driver gets two channels at the start to receive and to send messages respectively.
//!
//! At the high level the driver performs following steps for each round:
//!  * it finalizes the round as soon as the round has all its input, and sends messages of the round to the network
//!  * it feeds incoming messages for the current round into the session
//!  * messages of later rounds are collected into a discarded deck, messages of earlier rounds are dropped
//!    along with messages of rounds which the protocol does not have
//!  * if the session moved to the next round, the messages from the discarded deck are processed first
//!  * once the session produces the output, the driver terminates
//!
//! The first round of every protocol expects no input, so that it is finalized right after the start.
//!
//! Any error returned by the session is fatal, the driver stops and returns it.
//! If the input channel is closed before the session completes, the driver returns `None`.
//!
//! # Async model and futures
//!
//! The module contains two implementations of the driver, one which deals with async queues and another, which uses more traditional synchronous queues from `crossbeam_channel` crate. All remaining properties of these drivers are identical.
//!
//! [`Session`]: ../round/trait.Session.html
pub mod async_channels;
pub mod sync_channels;

#[cfg(test)]
pub(crate) mod network;

use crate::protocol::Message;
use crate::round::Session;
use std::cmp::Ordering;
use std::collections::VecDeque;

/// container for deferred messages
///
/// When several distributed nodes execute same network protocol, it is hard to achieve the scenario
/// where all nodes pace with same speed through the protocol. It is very common case when some nodes are faster then others so that their messages arrive to destinations early.
/// To address that the driver collects all messages of later rounds into the `discarded` container.
/// The contents of the container becomes available for the *next* round as priority input.
///
/// To prevent a round from checking already discarded messages more than once, the container has two decks, one for having input for the round and another for collecting discarded messages.
pub(crate) struct DiscardedDeck<T> {
    current: VecDeque<T>,
    next_state: VecDeque<T>,
}

impl<T> DiscardedDeck<T> {
    pub fn new() -> Self {
        Self {
            current: VecDeque::new(),
            next_state: VecDeque::new(),
        }
    }
    pub fn save(&mut self, m: T) {
        self.next_state.push_back(m);
    }
    pub fn pop(&mut self) -> Option<T> {
        self.current.pop_front()
    }
    pub fn flip(&mut self) {
        while let Some(m) = self.next_state.pop_front() {
            self.current.push_back(m)
        }
    }
}

/// What the driver does with an incoming message
pub(crate) enum Disposition {
    Accept,
    Defer,
    Drop,
}

pub(crate) fn dispose<S: Session>(session: &S, message: &Message) -> Disposition {
    let helper = session.helper();
    if !message.is_for(helper.self_id()) {
        log::warn!(
            "{}: message from {} addressed to {:?} is dropped",
            helper.self_id(),
            message.from,
            message.to
        );
        return Disposition::Drop;
    }
    match message.round_number.cmp(&session.number()) {
        Ordering::Equal => Disposition::Accept,
        Ordering::Greater if message.round_number > session.last_round() => {
            log::warn!(
                "{}: message from {} for round {} is dropped, the protocol ends with round {}",
                helper.self_id(),
                message.from,
                message.round_number,
                session.last_round()
            );
            Disposition::Drop
        }
        Ordering::Greater => Disposition::Defer,
        Ordering::Less => {
            log::warn!(
                "{}: stale message from {} for round {} is dropped in round {}",
                helper.self_id(),
                message.from,
                message.round_number,
                session.number()
            );
            Disposition::Drop
        }
    }
}
