use serde::{Deserialize, Serialize};

use crate::object::ObjectId;

/// The full hash set of a file.
///
/// `sha1_git` is the primary key used for storage and deduplication. The
/// other digests are carried for integrity cross-checking and are never used
/// as keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MultiHash {
    /// Plain SHA-1 of the file bytes.
    #[serde(with = "hex_array")]
    pub sha1: [u8; 20],
    /// Git blob SHA-1 (`"blob <len>\0" || bytes`).
    pub sha1_git: ObjectId,
    /// SHA-256 of the file bytes.
    #[serde(with = "hex_array")]
    pub sha256: [u8; 32],
    /// BLAKE3 of the file bytes.
    #[serde(with = "hex_array")]
    pub blake3: [u8; 32],
}

impl MultiHash {
    /// The primary key of this hash set.
    pub fn id(&self) -> ObjectId {
        self.sha1_git
    }

    /// Hex form of the plain SHA-1.
    pub fn sha1_hex(&self) -> String {
        hex::encode(self.sha1)
    }

    /// Hex form of the SHA-256.
    pub fn sha256_hex(&self) -> String {
        hex::encode(self.sha256)
    }

    /// Hex form of the BLAKE3 digest.
    pub fn blake3_hex(&self) -> String {
        hex::encode(self.blake3)
    }
}

/// Serde adapter encoding fixed-size byte arrays as lowercase hex.
pub mod hex_array {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer, const N: usize>(
        bytes: &[u8; N],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>, const N: usize>(
        deserializer: D,
    ) -> Result<[u8; N], D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        bytes.try_into().map_err(|v: Vec<u8>| {
            serde::de::Error::custom(format!("expected {N} bytes, got {}", v.len()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MultiHash {
        MultiHash {
            sha1: [1; 20],
            sha1_git: ObjectId::from_hash([2; 20]),
            sha256: [3; 32],
            blake3: [4; 32],
        }
    }

    #[test]
    fn id_is_sha1_git() {
        assert_eq!(sample().id(), ObjectId::from_hash([2; 20]));
    }

    #[test]
    fn json_uses_hex_strings() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["sha1"], "01".repeat(20));
        assert_eq!(json["sha256"], "03".repeat(32));
        let back: MultiHash = serde_json::from_value(json).unwrap();
        assert_eq!(back, sample());
    }

    #[test]
    fn rejects_short_digest() {
        let mut json = serde_json::to_value(sample()).unwrap();
        json["sha256"] = serde_json::Value::String("abcd".into());
        assert!(serde_json::from_value::<MultiHash>(json).is_err());
    }
}
