//! # Portable Key Encoding
//!
//! JWK-shaped JSON representation of public and private keys, used for
//! export/import and for publishing keys in the identity directory.
//!
//! ```text
//! Agreement (P-256)                      Encapsulation (RSA-OAEP-256)
//! {                                      {
//!   "kty": "EC",                           "kty": "RSA",
//!   "crv": "P-256",                        "alg": "RSA-OAEP-256",
//!   "x": "<b64url 32 bytes>",              "n": "<b64url modulus>",
//!   "y": "<b64url 32 bytes>",              "e": "AQAB",
//!   "d": "<b64url scalar>"   (private)     "d", "p", "q",
//!   "key_ops": [...]                       "dp", "dq", "qi"     (private)
//! }                                        "key_ops": [...]
//!                                        }
//! ```
//!
//! ## Canonical Form
//!
//! Serialization always emits members in the struct's declared order and
//! omits absent members. Fingerprints hash this form, so two parties holding
//! the same key produce byte-identical output. Keys from other producers are
//! normalized by importing and re-exporting before hashing.

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::encoding::from_base64url;
use crate::error::{Error, Result};

/// `kty` of elliptic-curve keys
pub const KTY_EC: &str = "EC";

/// `kty` of RSA keys
pub const KTY_RSA: &str = "RSA";

/// Curve name of agreement keys
pub const CRV_P256: &str = "P-256";

/// Algorithm name of encapsulation keys
pub const ALG_RSA_OAEP_256: &str = "RSA-OAEP-256";

/// Portable (JWK-shaped) key
///
/// Private members are zeroized when the value is dropped and never shown by
/// `Debug`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct PortableKey {
    /// Key type: `"EC"` or `"RSA"`
    pub kty: String,

    /// Algorithm (RSA only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,

    /// Curve name (EC only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crv: Option<String>,

    /// EC public x coordinate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,

    /// EC public y coordinate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,

    /// RSA modulus
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,

    /// RSA public exponent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,

    /// Private scalar (EC) or private exponent (RSA)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub d: Option<String>,

    /// RSA first prime
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p: Option<String>,

    /// RSA second prime
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,

    /// RSA first CRT exponent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dp: Option<String>,

    /// RSA second CRT exponent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dq: Option<String>,

    /// RSA CRT coefficient
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qi: Option<String>,

    /// Permitted operations
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub key_ops: Vec<String>,
}

impl PortableKey {
    pub(crate) fn empty(kty: &str) -> Self {
        Self {
            kty: kty.to_string(),
            alg: None,
            crv: None,
            x: None,
            y: None,
            n: None,
            e: None,
            d: None,
            p: None,
            q: None,
            dp: None,
            dq: None,
            qi: None,
            key_ops: Vec::new(),
        }
    }

    /// Whether this key carries private material
    pub fn is_private(&self) -> bool {
        self.d.is_some()
    }

    /// Copy with all private members removed
    pub fn public_only(&self) -> Self {
        let mut public = Self::empty(&self.kty);
        public.alg = self.alg.clone();
        public.crv = self.crv.clone();
        public.x = self.x.clone();
        public.y = self.y.clone();
        public.n = self.n.clone();
        public.e = self.e.clone();
        public
    }

    /// Canonical JSON serialization
    pub fn canonical_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Parse from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::KeyFormat(format!("Invalid key JSON: {}", e)))
    }

    /// Fail unless `kty` (and `crv`/`alg` where present) match
    pub(crate) fn expect_type(&self, kty: &str, crv: Option<&str>, alg: Option<&str>) -> Result<()> {
        if self.kty != kty {
            return Err(Error::KeyFormat(format!(
                "Expected key type {}, got {}",
                kty, self.kty
            )));
        }
        if let Some(crv) = crv {
            if self.crv.as_deref() != Some(crv) {
                return Err(Error::KeyFormat(format!(
                    "Expected curve {}, got {:?}",
                    crv, self.crv
                )));
            }
        }
        // alg is optional in JWK; only reject a conflicting one
        if let (Some(expected), Some(actual)) = (alg, self.alg.as_deref()) {
            if expected != actual {
                return Err(Error::KeyFormat(format!(
                    "Expected algorithm {}, got {}",
                    expected, actual
                )));
            }
        }
        Ok(())
    }

    /// Decode a required base64url member
    pub(crate) fn member(&self, name: &'static str) -> Result<Vec<u8>> {
        let value = match name {
            "x" => self.x.as_deref(),
            "y" => self.y.as_deref(),
            "n" => self.n.as_deref(),
            "e" => self.e.as_deref(),
            "d" => self.d.as_deref(),
            "p" => self.p.as_deref(),
            "q" => self.q.as_deref(),
            _ => None,
        };
        let text =
            value.ok_or_else(|| Error::KeyFormat(format!("Missing key member '{}'", name)))?;
        from_base64url(text)
    }
}

impl std::fmt::Debug for PortableKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortableKey")
            .field("kty", &self.kty)
            .field("alg", &self.alg)
            .field("crv", &self.crv)
            .field("private", &self.is_private())
            .finish_non_exhaustive()
    }
}
