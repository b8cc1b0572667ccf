//! Rounds of a protocol
//!
//! A protocol is a linear chain of rounds `round 1 -> round 2 -> ... -> round k -> Output`.
//! Each round is an owned value implementing [`Round`]. It declares at compile time the content it accepts from peers,
//! either as direct messages ([`Round::Message`]) or as broadcast messages ([`Round::Broadcast`]), with [`NoContent`] standing for none.
//!
//! The round is wrapped into a [`Stage`], which verifies every incoming [`Message`] before it reaches the round:
//!  * the envelope has to belong to the session and to the current round, and must come from a known party other than self
//!  * the payload is decoded directly into the content type the round declares for the `broadcast` flag of the envelope
//!  * the decoded content passes its own structural validation
//!
//! Once every peer delivered the expected content, the stage is finalized: the round generates its outgoing messages into an [`Outbox`]
//! and is consumed by [`Round::next`], which produces the next round or the [`Output`] of the protocol.
//!
//! Rounds of one protocol are gathered into a single enum with the macro `session!`, which implements [`Session`] for it.
//! The drivers in [`state_machine`](../state_machine/index.html) operate on that trait only.
//!
//! A round which declares both direct and broadcast content is not supported. If it did, a peer would be considered
//! complete as soon as its broadcast content is stored, and direct content would never be re-delivered.
mod helper;
mod stage;

pub use helper::{EchoHash, Helper, Outbox};
pub use stage::Stage;

use crate::protocol::{Message, PartyId, RoundNumber};
use crate::Error;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Typed payload of a message
///
/// The type is bound to the round which consumes it, so that `ROUND` equals the number of that round.
pub trait Content: Serialize + DeserializeOwned + Send {
    const ROUND: RoundNumber;
    const BROADCAST: bool = false;
    /// false for [`NoContent`] only
    const PRESENT: bool = true;

    /// structural checks which do not need the state of the round
    fn validate(&self, _from: &PartyId) -> Result<(), Error> {
        Ok(())
    }
}

/// Content of the round which exchanges no messages of given kind
#[derive(Debug, Serialize, Deserialize)]
pub enum NoContent {}

impl Content for NoContent {
    const ROUND: RoundNumber = 0;
    const PRESENT: bool = false;
}

/// Description of the content a round expects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentType {
    pub round: RoundNumber,
    pub broadcast: bool,
    pub name: &'static str,
}

impl ContentType {
    pub fn of<C: Content>() -> Option<Self> {
        if C::PRESENT {
            Some(Self {
                round: C::ROUND,
                broadcast: C::BROADCAST,
                name: std::any::type_name::<C>(),
            })
        } else {
            None
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.broadcast { "broadcast" } else { "direct" };
        write!(f, "{} {} of round {}", kind, self.name, self.round)
    }
}

///   Round interface
pub trait Round: Sized + Send {
    type Message: Content;
    type Broadcast: Content;
    /// next round or [`Output`]
    type Next;

    const NUMBER: RoundNumber;

    fn helper(&self) -> &Helper;

    fn message_content(&self) -> Option<ContentType> {
        ContentType::of::<Self::Message>()
    }

    fn broadcast_content(&self) -> Option<ContentType> {
        ContentType::of::<Self::Broadcast>()
    }

    /// validates and stores the direct content from `from`
    ///
    /// Nothing is stored if an error is returned.
    fn process_message(&mut self, from: &PartyId, _content: Self::Message) -> Result<(), Error> {
        Err(Error::Protocol(format!(
            "round {} does not accept direct messages, got one from {}",
            Self::NUMBER,
            from
        )))
    }

    /// validates and stores the broadcast content from `from`
    fn store_broadcast_message(
        &mut self,
        from: &PartyId,
        _content: Self::Broadcast,
    ) -> Result<(), Error> {
        Err(Error::Protocol(format!(
            "round {} does not accept broadcast messages, got one from {}",
            Self::NUMBER,
            from
        )))
    }

    /// computes the content for the next round and puts it into `out`
    fn generate_messages(&mut self, out: &mut Outbox) -> Result<(), Error>;

    fn next(self) -> Result<Self::Next, Error>;
}

/// Terminal round, holds the result of the protocol
pub struct Output<T> {
    number: RoundNumber,
    result: T,
}

impl<T> Output<T> {
    pub fn new(number: RoundNumber, result: T) -> Self {
        Self { number, result }
    }

    pub fn number(&self) -> RoundNumber {
        self.number
    }

    /// Takes the result out of the terminal round
    ///
    /// Never fails: every check of the result, such as the validation of the config or the verification
    /// of the signature, is done by [`Round::next`] of the last round, which fails instead of producing the output.
    pub fn finalize(self) -> T {
        self.result
    }
}

/// Result of finalizing a round of a session
pub enum Transition<S: Session> {
    Next(S),
    Output(Output<S::Output>),
}

/// Uniform interface over the rounds of a protocol
pub trait Session: Sized + Send {
    type Output;

    fn number(&self) -> RoundNumber;

    /// number of the last round which accepts messages
    fn last_round(&self) -> RoundNumber;

    fn helper(&self) -> &Helper;

    /// verifies the message and hands it over to the current round
    fn accept(&mut self, message: &Message) -> Result<(), Error>;

    /// true when every expected message of the current round is stored
    fn is_complete(&self) -> bool;

    /// generates outgoing messages of the current round into `out` and advances the session
    fn finalize(self, out: &mut Vec<Message>) -> Result<Transition<Self>, Error>;
}

/// Creates a protocol session when given the session id
pub type StartFunc<S> = Box<dyn FnOnce(&[u8]) -> Result<S, Error> + Send>;

/// Declares the enum over the stages of the protocol rounds and implements [`Session`] for it
macro_rules! session {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident -> $output:ty {
            $($variant:ident($round:ty)),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis enum $name {
            $($variant($crate::round::Stage<$round>)),+
        }

        $(
            impl From<$round> for $name {
                fn from(round: $round) -> Self {
                    $name::$variant($crate::round::Stage::new(round))
                }
            }

            impl From<$round> for $crate::round::Transition<$name> {
                fn from(round: $round) -> Self {
                    $crate::round::Transition::Next(round.into())
                }
            }
        )+

        impl From<$crate::round::Output<$output>> for $crate::round::Transition<$name> {
            fn from(output: $crate::round::Output<$output>) -> Self {
                $crate::round::Transition::Output(output)
            }
        }

        impl $crate::round::Session for $name {
            type Output = $output;

            fn number(&self) -> $crate::protocol::RoundNumber {
                match self {
                    $($name::$variant(stage) => stage.number()),+
                }
            }

            fn last_round(&self) -> $crate::protocol::RoundNumber {
                [$(<$round as $crate::round::Round>::NUMBER),+]
                    .iter()
                    .copied()
                    .max()
                    .unwrap_or(0)
            }

            fn helper(&self) -> &$crate::round::Helper {
                match self {
                    $($name::$variant(stage) => $crate::round::Round::helper(stage.round())),+
                }
            }

            fn accept(&mut self, message: &$crate::protocol::Message) -> Result<(), $crate::Error> {
                match self {
                    $($name::$variant(stage) => stage.accept(message)),+
                }
            }

            fn is_complete(&self) -> bool {
                match self {
                    $($name::$variant(stage) => stage.is_complete()),+
                }
            }

            fn finalize(
                self,
                out: &mut Vec<$crate::protocol::Message>,
            ) -> Result<$crate::round::Transition<Self>, $crate::Error> {
                match self {
                    $($name::$variant(stage) => stage.finalize(out).map(Into::into)),+
                }
            }
        }
    };
}
