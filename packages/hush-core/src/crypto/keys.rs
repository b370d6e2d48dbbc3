//! # Key Management
//!
//! Generation, export and import of the two identity keypairs.
//!
//! ## Key Types
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          KEY TYPES                                      │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  AgreementKeyPair (ECDH P-256)                                  │   │
//! │  │  ─────────────────────────────                                   │   │
//! │  │                                                                  │   │
//! │  │  Purpose:                                                       │   │
//! │  │  • Deriving a per-message key-encryption key with a peer        │   │
//! │  │  • Preferred wrap path                                          │   │
//! │  │                                                                  │   │
//! │  │  Format:                                                        │   │
//! │  │  • Private scalar: 32 bytes (zeroized on drop)                  │   │
//! │  │  • Public point: uncompressed (x, y), 32 bytes each             │   │
//! │  │                                                                  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  EncapsulationKeyPair (RSA-4096, OAEP/SHA-256)                  │   │
//! │  │  ─────────────────────────────────────────────                   │   │
//! │  │                                                                  │   │
//! │  │  Purpose:                                                       │   │
//! │  │  • Direct wrapping of message keys                              │   │
//! │  │  • Fallback when the agreement path is unavailable              │   │
//! │  │                                                                  │   │
//! │  │  Format:                                                        │   │
//! │  │  • Modulus: 4096 bits, public exponent 65537                    │   │
//! │  │  • Generation takes hundreds of milliseconds                    │   │
//! │  │                                                                  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  IdentityKeys (Combined)                                        │   │
//! │  │  ───────────────────────                                         │   │
//! │  │                                                                  │   │
//! │  │  Both keypairs of one identity. Generated once, then persisted  │   │
//! │  │  only as a sealed backup.                                       │   │
//! │  │                                                                  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Fingerprint
//!
//! `SHA-256(canonical(agreement_pub) || canonical(encapsulation_pub))`,
//! lowercase hex. The order is part of the format: swapping the two inputs
//! produces a different fingerprint.

use std::time::Instant;

use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::{EncodedPoint, FieldBytes, PublicKey as P256PublicKey, SecretKey as P256SecretKey};
use rand::rngs::OsRng;
use rsa::traits::{PrivateKeyParts, PublicKeyParts};
use rsa::{BigUint, RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use super::encoding::{to_base64url, to_hex};
use super::encryption::fill_random;
use super::hash::sha256_concat;
use super::portable::{PortableKey, ALG_RSA_OAEP_256, CRV_P256, KTY_EC, KTY_RSA};
use crate::error::{Error, Result};
use crate::relay::PublicIdentityRecord;
use crate::time::now_timestamp_millis;

/// Size of a P-256 coordinate or scalar in bytes
pub const P256_FIELD_SIZE: usize = 32;

/// Modulus size of generated encapsulation keys
pub const ENCAPSULATION_KEY_BITS: usize = 4096;

/// Smallest modulus accepted on import
pub const MIN_ENCAPSULATION_KEY_BITS: usize = 2048;

/// RSA public exponent
pub const PUBLIC_EXPONENT: u64 = 65_537;

// ============================================================================
// AGREEMENT (P-256)
// ============================================================================

/// Public half of an agreement keypair
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AgreementPublicKey(P256PublicKey);

impl AgreementPublicKey {
    /// Export to the portable encoding
    pub fn to_portable(&self) -> PortableKey {
        let point = self.0.to_encoded_point(false);
        let mut key = PortableKey::empty(KTY_EC);
        key.crv = Some(CRV_P256.to_string());
        key.x = point.x().map(|x| to_base64url(x));
        key.y = point.y().map(|y| to_base64url(y));
        key
    }

    /// Import from the portable encoding
    ///
    /// Private members, if present, are ignored.
    pub fn from_portable(key: &PortableKey) -> Result<Self> {
        key.expect_type(KTY_EC, Some(CRV_P256), None)?;

        let x = key.member("x")?;
        let y = key.member("y")?;
        if x.len() != P256_FIELD_SIZE || y.len() != P256_FIELD_SIZE {
            return Err(Error::KeyFormat(format!(
                "P-256 coordinates must be {} bytes",
                P256_FIELD_SIZE
            )));
        }

        let point = EncodedPoint::from_affine_coordinates(
            FieldBytes::from_slice(&x),
            FieldBytes::from_slice(&y),
            false,
        );
        let public = P256PublicKey::from_sec1_bytes(point.as_bytes())
            .map_err(|_| Error::KeyFormat("Point is not on P-256".into()))?;

        Ok(Self(public))
    }

    pub(crate) fn as_inner(&self) -> &P256PublicKey {
        &self.0
    }
}

/// ECDH keypair on P-256
pub struct AgreementKeyPair {
    /// Private scalar (elliptic-curve zeroizes it on drop)
    secret: P256SecretKey,
    /// Public point (derived from secret)
    public: AgreementPublicKey,
}

impl AgreementKeyPair {
    /// Generate a new random agreement keypair
    ///
    /// Draws the scalar through [`fill_random`] so a failing random source
    /// is reported as `Entropy` rather than a panic.
    pub fn generate() -> Result<Self> {
        let mut bytes = Zeroizing::new([0u8; P256_FIELD_SIZE]);
        loop {
            fill_random(&mut *bytes)?;
            // Retries only for a zero scalar or one >= the group order
            if let Ok(secret) = P256SecretKey::from_slice(&*bytes) {
                return Ok(Self::from_secret(secret));
            }
        }
    }

    fn from_secret(secret: P256SecretKey) -> Self {
        let public = AgreementPublicKey(secret.public_key());
        Self { secret, public }
    }

    /// Get the public key
    pub fn public_key(&self) -> &AgreementPublicKey {
        &self.public
    }

    /// Export the public half
    pub fn export_public(&self) -> PortableKey {
        self.public.to_portable()
    }

    /// Export including the private scalar
    ///
    /// ## Security Warning
    ///
    /// Only pass the result to the backup sealer or local secure storage.
    pub fn export_private(&self) -> PortableKey {
        let d: Zeroizing<[u8; P256_FIELD_SIZE]> = Zeroizing::new(self.secret.to_bytes().into());
        let mut key = self.public.to_portable();
        key.d = Some(to_base64url(&*d));
        key.key_ops = vec!["deriveKey".to_string(), "deriveBits".to_string()];
        key
    }

    /// Import a private key
    ///
    /// The embedded public coordinates must match the private scalar.
    pub fn from_portable(key: &PortableKey) -> Result<Self> {
        key.expect_type(KTY_EC, Some(CRV_P256), None)?;

        let d = Zeroizing::new(key.member("d")?);
        if d.len() != P256_FIELD_SIZE {
            return Err(Error::KeyFormat(format!(
                "P-256 private scalar must be {} bytes",
                P256_FIELD_SIZE
            )));
        }
        let secret = P256SecretKey::from_slice(&d)
            .map_err(|_| Error::KeyFormat("Invalid P-256 private scalar".into()))?;
        let pair = Self::from_secret(secret);

        let claimed = AgreementPublicKey::from_portable(key)?;
        if claimed != pair.public {
            return Err(Error::KeyFormat(
                "Private scalar does not match public coordinates".into(),
            ));
        }

        Ok(pair)
    }

    /// Raw ECDH with a peer's public key
    pub(crate) fn diffie_hellman(&self, peer: &AgreementPublicKey) -> p256::ecdh::SharedSecret {
        p256::ecdh::diffie_hellman(self.secret.to_nonzero_scalar(), peer.as_inner().as_affine())
    }
}

impl std::fmt::Debug for AgreementKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgreementKeyPair")
            .field("public", &self.public)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// ENCAPSULATION (RSA-OAEP)
// ============================================================================

/// Public half of an encapsulation keypair
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncapsulationPublicKey(RsaPublicKey);

impl EncapsulationPublicKey {
    /// Export to the portable encoding
    pub fn to_portable(&self) -> PortableKey {
        let mut key = PortableKey::empty(KTY_RSA);
        key.alg = Some(ALG_RSA_OAEP_256.to_string());
        key.n = Some(to_base64url(&self.0.n().to_bytes_be()));
        key.e = Some(to_base64url(&self.0.e().to_bytes_be()));
        key
    }

    /// Import from the portable encoding
    pub fn from_portable(key: &PortableKey) -> Result<Self> {
        key.expect_type(KTY_RSA, None, Some(ALG_RSA_OAEP_256))?;

        let n = BigUint::from_bytes_be(&key.member("n")?);
        let e = BigUint::from_bytes_be(&key.member("e")?);
        let public = RsaPublicKey::new(n, e)
            .map_err(|e| Error::KeyFormat(format!("Invalid RSA public key: {}", e)))?;
        check_modulus(public.size())?;

        Ok(Self(public))
    }

    /// Modulus size in bits
    pub fn bits(&self) -> usize {
        self.0.size() * 8
    }

    pub(crate) fn as_inner(&self) -> &RsaPublicKey {
        &self.0
    }
}

fn check_modulus(size_bytes: usize) -> Result<()> {
    if size_bytes * 8 < MIN_ENCAPSULATION_KEY_BITS {
        return Err(Error::KeyFormat(format!(
            "RSA modulus of {} bits is below the {}-bit minimum",
            size_bytes * 8,
            MIN_ENCAPSULATION_KEY_BITS
        )));
    }
    Ok(())
}

/// RSA keypair for OAEP key encapsulation
pub struct EncapsulationKeyPair {
    /// Private key (rsa zeroizes it on drop)
    secret: RsaPrivateKey,
    /// Public key (derived from secret)
    public: EncapsulationPublicKey,
}

impl EncapsulationKeyPair {
    /// Generate a new 4096-bit keypair with exponent 65537
    ///
    /// Expensive. Run it off any latency-sensitive thread (see
    /// [`IdentityKeys::generate_off_thread`]).
    pub fn generate() -> Result<Self> {
        // Fail fast with Entropy instead of panicking inside the generator
        let mut probe = [0u8; 16];
        fill_random(&mut probe)?;

        let started = Instant::now();
        let exponent = BigUint::from(PUBLIC_EXPONENT);
        let secret = RsaPrivateKey::new_with_exp(&mut OsRng, ENCAPSULATION_KEY_BITS, &exponent)
            .map_err(|e| Error::KeyGeneration(format!("RSA generation failed: {}", e)))?;

        tracing::debug!(
            "Generated RSA-{} encapsulation keypair in {} ms",
            ENCAPSULATION_KEY_BITS,
            started.elapsed().as_millis()
        );

        Ok(Self::from_secret(secret))
    }

    fn from_secret(secret: RsaPrivateKey) -> Self {
        let public = EncapsulationPublicKey(secret.to_public_key());
        Self { secret, public }
    }

    /// Get the public key
    pub fn public_key(&self) -> &EncapsulationPublicKey {
        &self.public
    }

    /// Export the public half
    pub fn export_public(&self) -> PortableKey {
        self.public.to_portable()
    }

    /// Export including all private components
    ///
    /// ## Security Warning
    ///
    /// Only pass the result to the backup sealer or local secure storage.
    pub fn export_private(&self) -> PortableKey {
        let b64 = |value: &BigUint| to_base64url(&Zeroizing::new(value.to_bytes_be()));

        let mut key = self.public.to_portable();
        key.d = Some(b64(self.secret.d()));
        key.p = self.secret.primes().first().map(b64);
        key.q = self.secret.primes().get(1).map(b64);
        key.dp = self.secret.dp().map(b64);
        key.dq = self.secret.dq().map(b64);
        key.qi = self.secret.crt_coefficient().as_ref().map(b64);
        key.key_ops = vec!["decrypt".to_string(), "unwrapKey".to_string()];
        key
    }

    /// Import a private key
    ///
    /// The components are validated; a key whose primes do not multiply to
    /// the modulus is rejected.
    pub fn from_portable(key: &PortableKey) -> Result<Self> {
        key.expect_type(KTY_RSA, None, Some(ALG_RSA_OAEP_256))?;

        let n = BigUint::from_bytes_be(&key.member("n")?);
        let e = BigUint::from_bytes_be(&key.member("e")?);
        let d = BigUint::from_bytes_be(&Zeroizing::new(key.member("d")?));
        let p = BigUint::from_bytes_be(&Zeroizing::new(key.member("p")?));
        let q = BigUint::from_bytes_be(&Zeroizing::new(key.member("q")?));

        let secret = RsaPrivateKey::from_components(n, e, d, vec![p, q])
            .map_err(|e| Error::KeyFormat(format!("Invalid RSA private key: {}", e)))?;
        secret
            .validate()
            .map_err(|e| Error::KeyFormat(format!("RSA private key failed validation: {}", e)))?;
        check_modulus(secret.size())?;

        Ok(Self::from_secret(secret))
    }

    pub(crate) fn as_inner(&self) -> &RsaPrivateKey {
        &self.secret
    }
}

impl std::fmt::Debug for EncapsulationKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncapsulationKeyPair")
            .field("bits", &self.public.bits())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// IDENTITY KEYS
// ============================================================================

/// Both keypairs of one identity
#[derive(Debug)]
pub struct IdentityKeys {
    /// P-256 agreement keypair
    pub agreement: AgreementKeyPair,
    /// RSA-OAEP encapsulation keypair
    pub encapsulation: EncapsulationKeyPair,
}

impl IdentityKeys {
    /// Generate both keypairs
    pub fn generate() -> Result<Self> {
        Ok(Self {
            agreement: AgreementKeyPair::generate()?,
            encapsulation: EncapsulationKeyPair::generate()?,
        })
    }

    /// Generate both keypairs on the blocking thread pool
    ///
    /// Dropping the returned future discards the keys; nothing is persisted
    /// until the caller stores them.
    pub async fn generate_off_thread() -> Result<Self> {
        tokio::task::spawn_blocking(Self::generate)
            .await
            .map_err(|e| Error::KeyGeneration(format!("Generation task failed: {}", e)))?
    }

    /// The public halves
    pub fn public_keys(&self) -> PublicKeys {
        PublicKeys {
            agreement: self.agreement.public_key().clone(),
            encapsulation: self.encapsulation.public_key().clone(),
        }
    }

    /// Fingerprint over both public keys
    pub fn fingerprint(&self) -> Result<String> {
        fingerprint(self.agreement.public_key(), self.encapsulation.public_key())
    }

    /// Build the record published to the identity directory
    pub fn public_record(
        &self,
        user_id: impl Into<String>,
        display_name: Option<String>,
    ) -> Result<PublicIdentityRecord> {
        let now = now_timestamp_millis();
        Ok(PublicIdentityRecord {
            user_id: user_id.into(),
            display_name,
            agreement_public_key: self.agreement.export_public(),
            encapsulation_public_key: self.encapsulation.export_public(),
            fingerprint: self.fingerprint()?,
            created_at: now,
            updated_at: now,
        })
    }

    /// Export both private keys for sealing
    pub fn to_bundle(&self) -> PrivateKeyBundle {
        PrivateKeyBundle {
            agreement: self.agreement.export_private(),
            encapsulation: self.encapsulation.export_private(),
        }
    }

    /// Rebuild from an unsealed bundle
    pub fn from_bundle(bundle: &PrivateKeyBundle) -> Result<Self> {
        Ok(Self {
            agreement: AgreementKeyPair::from_portable(&bundle.agreement)?,
            encapsulation: EncapsulationKeyPair::from_portable(&bundle.encapsulation)?,
        })
    }
}

/// Public keys that can be safely shared with others
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKeys {
    /// Agreement public key
    pub agreement: AgreementPublicKey,
    /// Encapsulation public key
    pub encapsulation: EncapsulationPublicKey,
}

impl PublicKeys {
    /// Fingerprint over both keys
    pub fn fingerprint(&self) -> Result<String> {
        fingerprint(&self.agreement, &self.encapsulation)
    }
}

/// Serialized private keys of one identity
///
/// This is the plaintext the backup sealer protects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivateKeyBundle {
    /// Private agreement key
    pub agreement: PortableKey,
    /// Private encapsulation key
    pub encapsulation: PortableKey,
}

/// Fingerprint of an identity's public keys
///
/// Hex SHA-256 of the canonical agreement key followed by the canonical
/// encapsulation key.
pub fn fingerprint(
    agreement: &AgreementPublicKey,
    encapsulation: &EncapsulationPublicKey,
) -> Result<String> {
    let agreement = agreement.to_portable().canonical_json()?;
    let encapsulation = encapsulation.to_portable().canonical_json()?;
    Ok(to_hex(&sha256_concat(&[
        agreement.as_bytes(),
        encapsulation.as_bytes(),
    ])))
}

/// Fingerprint of portable public keys from any producer
///
/// Keys are imported first, so member order, extra members and private
/// members in the input do not affect the result.
pub fn fingerprint_portable(agreement: &PortableKey, encapsulation: &PortableKey) -> Result<String> {
    fingerprint(
        &AgreementPublicKey::from_portable(agreement)?,
        &EncapsulationPublicKey::from_portable(encapsulation)?,
    )
}

// ============================================================================
// TESTS
// ============================================================================
