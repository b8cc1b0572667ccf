//! Errors of the protocol core
//!
//! Every error is fatal for the protocol run which produced it. The caller is expected to drop
//! the session and start a fresh one.
use crate::algorithms::nizk_rsa::NIZKError;
use crate::protocol::PartyId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// payload of the message cannot be decoded into the content expected by the round
    #[error("cannot decode content of round {round} from {from}: {reason}")]
    Decode {
        from: PartyId,
        round: u16,
        reason: String,
    },
    /// well formed content which is semantically invalid
    #[error("invalid content from {from}: {reason}")]
    Validation { from: PartyId, reason: String },
    #[error("{proof} proof from {from} failed to verify")]
    ProofVerification { from: PartyId, proof: &'static str },
    /// two parties hold different views on what was sent to them
    #[error("party {from} reports echo hash which differs from ours")]
    Equivocation { from: PartyId },
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("resulting signature does not verify against the public key")]
    SignatureInvalid,
}

impl Error {
    pub(crate) fn validation(from: &PartyId, reason: impl Into<String>) -> Self {
        Error::Validation {
            from: from.clone(),
            reason: reason.into(),
        }
    }

    pub(crate) fn proof(from: &PartyId, proof: &'static str) -> Self {
        Error::ProofVerification {
            from: from.clone(),
            proof,
        }
    }
}

impl From<(PartyId, NIZKError)> for Error {
    fn from((from, e): (PartyId, NIZKError)) -> Self {
        match e {
            NIZKError::WrongSizeOfN(_) | NIZKError::WrongSizeOFProof => Error::Validation {
                from,
                reason: e.to_string(),
            },
            NIZKError::IncorrectRho | NIZKError::FailedProof => Error::ProofVerification {
                from,
                proof: "paillier modulus",
            },
        }
    }
}
