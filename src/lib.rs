//! The crate contains the core of a multiparty threshold ECDSA scheme
//! based on the work of Canetti, Gennaro, Goldfeder, Makriyannis and Peled
//! ["UC Non-Interactive, Proactive, Threshold ECDSA with Identifiable Aborts"](https://eprint.iacr.org/2021/060.pdf).
//!
//! The scheme comprises
//!  * key generation performed in the distributed setup with `N` players
//!  * key refresh renewing the shares of the same key among the same players
//!  * message signing carried out by subgroup of `(t+1, N)` players
//!
//! The scheme is based on ECDSA standard with the elliptic curve secp256k1.
//!
//! Cryptographic protocols are implemented by [`ecdsa`](./ecdsa/index.html) module.
//! Zero knowledge proofs and other algorithms can be found in [`algorithms`](./algorithms/index.html) module.
//! Protocols are chains of rounds, see [`round`](./round/index.html), which are executed by the drivers
//! in [`state_machine`](./state_machine/index.html) module.
#![allow(
    clippy::must_use_candidate,
    clippy::items_after_statements,
    clippy::module_name_repetitions,
    clippy::unseparated_literal_suffix,
    //
    clippy::missing_errors_doc, // remove at some point
    clippy::used_underscore_binding // if turned on, seems to generate a lot of false positive
)]
#[macro_use]
extern crate strum_macros;

pub mod algorithms;
pub mod error;
pub mod pool;
pub mod protocol;
#[macro_use]
pub mod round;
pub mod ecdsa;
pub mod state_machine;

pub use ecdsa::{Config, Parameters, Signature};
pub use error::Error;
