//! Defines some common data types
//!
//! [`Message`] is the envelope which travels between parties. Its payload `data` is opaque for a transport layer,
//! its schema is determined solely by the triple `(protocol, round_number, broadcast)`.

use core::fmt::{Error, Formatter};
use hex::FromHexError;
use serde::de::Visitor;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Debug, Display};

/// Identifier of a party in multi-party computation
///
/// Abstract identifier whose binding to a network address has to be defined outside of the crate.
/// Parties are always iterated in the order of their identifiers.
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartyId(String);

impl PartyId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl From<&str> for PartyId {
    fn from(s: &str) -> Self {
        PartyId(s.to_owned())
    }
}

impl From<String> for PartyId {
    fn from(s: String) -> Self {
        PartyId(s)
    }
}

impl Display for PartyId {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        f.write_str(&self.0)
    }
}

impl Debug for PartyId {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        write!(f, "{:?}", self.0)
    }
}

pub const SSID_BYTES: usize = 32;

/// Identifier of a protocol run
///
/// The digest binds the run to its protocol, its participants, its threshold and the session id supplied by the caller.
#[derive(Clone, Copy, Hash, Eq, PartialEq)]
pub struct SessionId(pub [u8; SSID_BYTES]);

impl SessionId {
    fn write_as_hex_str(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        self.0.iter().try_for_each(|x| write!(f, "{:02x}", x))
    }
}

impl AsRef<[u8]> for SessionId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Display for SessionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        self.write_as_hex_str(f)
    }
}

impl Debug for SessionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        self.write_as_hex_str(f)
    }
}

impl Serialize for SessionId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{}", self))
    }
}

impl<'a> Deserialize<'a> for SessionId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'a>,
    {
        struct SsidVisitor;

        impl<'a> Visitor<'a> for SsidVisitor {
            type Value = SessionId;

            fn expecting(&self, formatter: &mut Formatter) -> Result<(), Error> {
                formatter.write_str("a 32 byte array in hex notation")
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                let bytes = hex::decode(v).map_err(|e| match e {
                    FromHexError::InvalidHexCharacter { c, index } => E::invalid_value(
                        de::Unexpected::Char(c),
                        &format!("Unexpected character {:?} as position {}", c, index).as_str(),
                    ),
                    FromHexError::InvalidStringLength => {
                        E::invalid_length(v.len(), &"Unexpected length of hex string")
                    }
                    FromHexError::OddLength => {
                        E::invalid_length(v.len(), &"Odd length of hex string")
                    }
                })?;
                if bytes.len() != SSID_BYTES {
                    return Err(E::invalid_length(bytes.len(), &"32 bytes"));
                }
                let mut result = [0u8; SSID_BYTES];
                result.clone_from_slice(&bytes);
                Ok(SessionId(result))
            }
        }

        deserializer.deserialize_str(SsidVisitor)
    }
}

/// Protocols implemented by the crate
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr, Serialize, Deserialize,
)]
pub enum ProtocolId {
    #[strum(serialize = "cmp/keygen")]
    #[serde(rename = "cmp/keygen")]
    Keygen,
    #[strum(serialize = "cmp/refresh")]
    #[serde(rename = "cmp/refresh")]
    Refresh,
    #[strum(serialize = "cmp/sign")]
    #[serde(rename = "cmp/sign")]
    Sign,
}

pub type RoundNumber = u16;

/// Transport-agnostic envelope of a round's content
///
/// `to == None` addresses every party of the session except the sender.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub ssid: SessionId,
    pub from: PartyId,
    pub to: Option<PartyId>,
    pub protocol: ProtocolId,
    pub round_number: RoundNumber,
    pub broadcast: bool,
    pub data: Vec<u8>,
}

impl Message {
    /// returns true if the message has to be delivered to `party`
    pub fn is_for(&self, party: &PartyId) -> bool {
        *party != self.from && self.to.as_ref().map_or(true, |to| to == party)
    }
}

#[cfg(test)]
mod tests {
    use super::{Message, PartyId, ProtocolId, SessionId};
    use std::str::FromStr;

    #[test]
    fn serde() -> anyhow::Result<()> {
        let mut bytes = [0u8; 32];
        bytes[31] = 0xff;
        bytes[0] = 0x01;
        let ssid = SessionId(bytes);

        let y = serde_json::to_string(&ssid)?;
        assert_eq!(
            y,
            "\"01000000000000000000000000000000000000000000000000000000000000ff\""
        );
        let result: SessionId = serde_json::from_str(&y)?;
        assert_eq!(result, ssid);

        assert!(serde_json::from_str::<SessionId>("\"00ff\"").is_err());

        let message = Message {
            ssid,
            from: PartyId::from("client-1"),
            to: None,
            protocol: ProtocolId::Sign,
            round_number: 3,
            broadcast: true,
            data: vec![1, 2, 3],
        };
        let json = serde_json::to_string(&message)?;
        assert!(json.contains("\"cmp/sign\""));
        assert!(json.contains("\"client-1\""));
        let decoded: Message = serde_json::from_str(&json)?;
        assert_eq!(decoded, message);
        Ok(())
    }

    #[test]
    fn protocol_names() -> anyhow::Result<()> {
        assert_eq!(ProtocolId::Keygen.to_string(), "cmp/keygen");
        assert_eq!(ProtocolId::from_str("cmp/refresh")?, ProtocolId::Refresh);
        assert!(ProtocolId::from_str("gg18/sign").is_err());
        Ok(())
    }

    #[test]
    fn addressing() {
        let message = Message {
            ssid: SessionId([0u8; 32]),
            from: PartyId::from("a"),
            to: Some(PartyId::from("b")),
            protocol: ProtocolId::Keygen,
            round_number: 2,
            broadcast: false,
            data: vec![],
        };
        assert!(message.is_for(&PartyId::from("b")));
        assert!(!message.is_for(&PartyId::from("c")));
        assert!(!message.is_for(&PartyId::from("a")));

        let to_all = Message { to: None, ..message };
        assert!(to_all.is_for(&PartyId::from("c")));
        assert!(!to_all.is_for(&PartyId::from("a")));
    }
}
