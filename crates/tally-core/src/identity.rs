// crates/tally-core/src/identity.rs

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TallyError;

/// Handle of a position: its index inside the owner's account.
pub type PositionId = u64;

/// Identity of a ledger participant (32-byte public key).
///
/// The all-zero key is the unset identity. Writes reject it and batch
/// checkpoints skip it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ParticipantId(pub [u8; 32]);

impl ParticipantId {
    /// The unset identity.
    pub const UNSET: ParticipantId = ParticipantId([0u8; 32]);

    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Returns `true` for the all-zero identity.
    pub fn is_unset(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form is enough for logs.
        write!(f, "{}", &self.to_hex()[..16])
    }
}

impl FromStr for ParticipantId {
    type Err = TallyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = hex::decode(s.trim_start_matches("0x"))
            .map_err(|e| TallyError::Serialization(format!("invalid participant hex: {}", e)))?;
        let bytes: [u8; 32] = raw.try_into().map_err(|v: Vec<u8>| {
            TallyError::Serialization(format!(
                "participant id must be 32 bytes, got {}",
                v.len()
            ))
        })?;
        Ok(Self(bytes))
    }
}

// Serialized as a hex string so identities can key JSON maps.
impl Serialize for ParticipantId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ParticipantId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
