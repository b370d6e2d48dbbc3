//! Binary/text codecs.
//!
//! Three encodings are in play:
//!
//! | Encoding | Used for |
//! |----------|----------|
//! | base64 (standard, padded) | Envelope and backup binary fields |
//! | base64url (no padding) | Portable key members |
//! | hex (lowercase) | Integrity hashes and fingerprints |

use base64::{
    engine::general_purpose::{STANDARD as BASE64, URL_SAFE_NO_PAD as BASE64_URL},
    Engine as _,
};

use crate::error::{Error, Result};

/// Encode bytes as standard padded base64
pub fn to_base64(bytes: &[u8]) -> String {
    BASE64.encode(bytes)
}

/// Decode standard padded base64
pub fn from_base64(text: &str) -> Result<Vec<u8>> {
    BASE64
        .decode(text)
        .map_err(|e| Error::Deserialization(format!("Invalid base64: {}", e)))
}

/// Encode bytes as unpadded base64url
pub fn to_base64url(bytes: &[u8]) -> String {
    BASE64_URL.encode(bytes)
}

/// Decode unpadded base64url
pub fn from_base64url(text: &str) -> Result<Vec<u8>> {
    BASE64_URL
        .decode(text)
        .map_err(|e| Error::KeyFormat(format!("Invalid base64url: {}", e)))
}

/// Encode bytes as lowercase hex
pub fn to_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

/// Decode hex (either case)
pub fn from_hex(text: &str) -> Result<Vec<u8>> {
    hex::decode(text).map_err(|e| Error::Deserialization(format!("Invalid hex: {}", e)))
}

/// Serde helper for `Vec<u8>` fields carried as standard base64
pub(crate) mod base64_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::to_base64(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        super::from_base64(&s).map_err(serde::de::Error::custom)
    }
}

/// Serde helper for fixed-size arrays carried as standard base64
pub(crate) mod base64_array {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S, const N: usize>(bytes: &[u8; N], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::to_base64(bytes))
    }

    pub fn deserialize<'de, D, const N: usize>(deserializer: D) -> Result<[u8; N], D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let bytes = super::from_base64(&s).map_err(serde::de::Error::custom)?;
        let len = bytes.len();
        bytes.try_into().map_err(|_| {
            serde::de::Error::custom(format!("expected {} bytes, got {}", N, len))
        })
    }
}
