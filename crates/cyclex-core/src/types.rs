use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::error::CyclexError;

/// Fixed-point amount in shares. Cycles are whole units; coin amounts are
/// scaled by `DASCOIN_DEFAULT_ASSET_PRECISION`.
pub type Share = i64;

/// Unix timestamp (seconds, UTC).
pub type Timestamp = i64;

// ── AccountId ────────────────────────────────────────────────────────────────

/// 32-byte account identifier derived as BLAKE3(account name).
///
/// Stored as raw bytes in bincode; written as base-58 in JSON.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AccountId(pub [u8; 32]);

impl AccountId {
    pub fn from_bytes(b: [u8; 32]) -> Self {
        Self(b)
    }

    /// Deterministic id for a named account.
    pub fn from_name(name: &str) -> Self {
        Self(*blake3::hash(name.as_bytes()).as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Base-58 encoded string representation.
    pub fn to_b58(&self) -> String {
        bs58::encode(&self.0).into_string()
    }

    /// Parse a base-58 id. The decoded value must be exactly 32 bytes.
    pub fn from_b58(s: &str) -> Result<Self, CyclexError> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|e| CyclexError::InvalidParameter(format!("bad account id {s}: {e}")))?;
        let arr: [u8; 32] = bytes.try_into().map_err(|b: Vec<u8>| {
            CyclexError::InvalidParameter(format!(
                "account id {s} decodes to {} bytes, expected 32",
                b.len()
            ))
        })?;
        Ok(Self(arr))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl Serialize for AccountId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_b58())
        } else {
            self.0.serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for AccountId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            AccountId::from_b58(&s).map_err(serde::de::Error::custom)
        } else {
            <[u8; 32]>::deserialize(deserializer).map(AccountId)
        }
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_b58())
    }
}

impl fmt::Debug for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountId({})", &self.to_b58()[..8])
    }
}

// ── Sequential ids ───────────────────────────────────────────────────────────

/// Catalog id of a license type.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Debug)]
pub struct LicenseTypeId(pub u64);

impl LicenseTypeId {
    pub fn key(&self) -> [u8; 8] {
        self.0.to_be_bytes()
    }
}

impl fmt::Display for LicenseTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LT:{}", self.0)
    }
}

/// Identifier of a reward queue entry. Ids grow monotonically, so the
/// big-endian key order of the queue tree is the insertion (FIFO) order.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Debug)]
pub struct QueueEntryId(pub u64);

impl QueueEntryId {
    pub fn key(&self) -> [u8; 8] {
        self.0.to_be_bytes()
    }

    pub fn from_key(k: &[u8]) -> Self {
        let mut arr = [0u8; 8];
        arr.copy_from_slice(&k[k.len() - 8..]);
        Self(u64::from_be_bytes(arr))
    }
}

impl fmt::Display for QueueEntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Q:{}", self.0)
    }
}

/// Identifier of a pending license request.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Debug)]
pub struct LicenseRequestId(pub u64);

impl LicenseRequestId {
    pub fn key(&self) -> [u8; 8] {
        self.0.to_be_bytes()
    }
}

impl fmt::Display for LicenseRequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LR:{}", self.0)
    }
}

/// Sequence number shared by the append-only history logs
/// (frequency, reward and charter issuance records).
pub type HistoryId = u64;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_id_roundtrips_through_b58() {
        let id = AccountId::from_name("vault-1");
        assert_eq!(AccountId::from_b58(&id.to_b58()).unwrap(), id);
        assert_ne!(id, AccountId::from_name("vault-2"));
    }

    #[test]
    fn short_or_long_b58_ids_are_rejected() {
        assert!(matches!(AccountId::from_b58("2"), Err(CyclexError::InvalidParameter(_))));
        let long = bs58::encode([7u8; 33]).into_string();
        assert!(AccountId::from_b58(&long).is_err());
        assert!(AccountId::from_b58("0OIl").is_err());
        let bad_json = serde_json::from_str::<AccountId>("\"2\"");
        assert!(bad_json.is_err());
    }

    #[test]
    fn account_id_json_is_base58() {
        let id = AccountId::from_name("issuer");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.to_b58()));
        let back: AccountId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
        let bin = bincode::serialize(&id).unwrap();
        assert_eq!(bin.len(), 32);
    }

    #[test]
    fn queue_keys_sort_in_insertion_order() {
        let a = QueueEntryId(9).key();
        let b = QueueEntryId(10).key();
        let c = QueueEntryId(256).key();
        assert!(a < b && b < c);
        assert_eq!(QueueEntryId::from_key(&c), QueueEntryId(256));
    }
}
