//! Key material: derivation from a master secret, validation of supplied
//! keys, and per-document key generation.
//!
//! A master secret is expanded with HKDF-SHA-512 into 96 bytes:
//! [encryption key:32][signing key:64]
//!
//! Per-document keys are HMAC-SHA-512(signing key, caller secret). They are
//! reproducible from the caller secret alone, so they never need storing.

use std::fmt;

use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use sha2::Sha512;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::base64::{base64_decode, base64_encode};
use crate::error::CryptoError;
use crate::types::{DOCUMENT_KEY_LENGTH, ENCRYPTION_KEY_LENGTH, SIGNING_KEY_LENGTH};

type HmacSha512 = Hmac<Sha512>;

const DERIVATION_SALT: &[u8] = b"docseal:keys:v1";
const DERIVATION_INFO: &[u8] = b"enc+sig";

/// Process-wide encryption and signing keys.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct KeyMaterial {
    encryption_key: [u8; ENCRYPTION_KEY_LENGTH],
    signing_key: [u8; SIGNING_KEY_LENGTH],
}

impl KeyMaterial {
    /// Derive both keys from a single high-entropy secret.
    pub fn from_secret(secret: &[u8]) -> Result<Self, CryptoError> {
        derive_keys(secret)
    }

    /// Accept a directly supplied key pair, validating lengths.
    pub fn from_bytes(encryption_key: &[u8], signing_key: &[u8]) -> Result<Self, CryptoError> {
        let encryption_key: [u8; ENCRYPTION_KEY_LENGTH] =
            encryption_key
                .try_into()
                .map_err(|_| CryptoError::InvalidKeyLength {
                    expected: ENCRYPTION_KEY_LENGTH,
                    got: encryption_key.len(),
                })?;
        let signing_key: [u8; SIGNING_KEY_LENGTH] =
            signing_key
                .try_into()
                .map_err(|_| CryptoError::InvalidKeyLength {
                    expected: SIGNING_KEY_LENGTH,
                    got: signing_key.len(),
                })?;
        Ok(Self {
            encryption_key,
            signing_key,
        })
    }

    /// Accept a base64-encoded key pair. See [`validate_keys`].
    pub fn from_base64(encryption_key: &str, signing_key: &str) -> Result<Self, CryptoError> {
        validate_keys(encryption_key, signing_key)
    }

    pub fn encryption_key(&self) -> &[u8; ENCRYPTION_KEY_LENGTH] {
        &self.encryption_key
    }

    pub fn signing_key(&self) -> &[u8; SIGNING_KEY_LENGTH] {
        &self.signing_key
    }

    /// Generate the per-document key for `secret` under this signing key.
    pub fn keygen(&self, secret: &[u8]) -> Result<String, CryptoError> {
        keygen(secret, &self.signing_key)
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial").finish_non_exhaustive()
    }
}

/// Expand `secret` into an encryption key (32 bytes) and a signing key
/// (64 bytes). Deterministic; distinct secrets give independent pairs.
pub fn derive_keys(secret: &[u8]) -> Result<KeyMaterial, CryptoError> {
    if secret.is_empty() {
        return Err(CryptoError::InvalidKeyLength {
            expected: 1,
            got: 0,
        });
    }
    let hk = Hkdf::<Sha512>::new(Some(DERIVATION_SALT), secret);
    let mut okm = Zeroizing::new([0u8; ENCRYPTION_KEY_LENGTH + SIGNING_KEY_LENGTH]);
    hk.expand(DERIVATION_INFO, &mut okm[..])
        .map_err(|e| CryptoError::KeyDerivation(format!("HKDF expand failed: {}", e)))?;
    KeyMaterial::from_bytes(
        &okm[..ENCRYPTION_KEY_LENGTH],
        &okm[ENCRYPTION_KEY_LENGTH..],
    )
}

/// Decode and length-check a base64 key pair.
///
/// `InvalidKeyEncoding` if either string is not base64, `InvalidKeyLength`
/// if the decoded lengths are not 32 and 64 bytes.
pub fn validate_keys(encryption_key: &str, signing_key: &str) -> Result<KeyMaterial, CryptoError> {
    let enc = Zeroizing::new(base64_decode(encryption_key)?);
    let sig = Zeroizing::new(base64_decode(signing_key)?);
    KeyMaterial::from_bytes(&enc, &sig)
}

/// Decode a single base64 encryption key (used for retired fallback keys).
pub fn decode_encryption_key(
    encoded: &str,
) -> Result<Zeroizing<[u8; ENCRYPTION_KEY_LENGTH]>, CryptoError> {
    let raw = Zeroizing::new(base64_decode(encoded)?);
    let key: [u8; ENCRYPTION_KEY_LENGTH] =
        raw.as_slice()
            .try_into()
            .map_err(|_| CryptoError::InvalidKeyLength {
                expected: ENCRYPTION_KEY_LENGTH,
                got: raw.len(),
            })?;
    Ok(Zeroizing::new(key))
}

/// Per-document key: base64(HMAC-SHA-512(signing_key, secret)).
pub fn keygen(secret: &[u8], signing_key: &[u8]) -> Result<String, CryptoError> {
    let mut mac = HmacSha512::new_from_slice(signing_key).map_err(|_| {
        CryptoError::InvalidKeyLength {
            expected: SIGNING_KEY_LENGTH,
            got: signing_key.len(),
        }
    })?;
    mac.update(secret);
    let digest = Zeroizing::new(mac.finalize().into_bytes().to_vec());
    debug_assert_eq!(digest.len(), DOCUMENT_KEY_LENGTH);
    Ok(base64_encode(&digest))
}

/// Decode a registered per-document key. Only the encoding is checked.
pub fn decode_document_key(encoded: &str) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    Ok(Zeroizing::new(base64_decode(encoded)?))
}

/// AES key for a document: the first 32 bytes of its per-document key.
pub fn document_encryption_key(
    document_key: &[u8],
) -> Result<Zeroizing<[u8; ENCRYPTION_KEY_LENGTH]>, CryptoError> {
    if document_key.len() < ENCRYPTION_KEY_LENGTH {
        return Err(CryptoError::InvalidKeyLength {
            expected: DOCUMENT_KEY_LENGTH,
            got: document_key.len(),
        });
    }
    let mut key = Zeroizing::new([0u8; ENCRYPTION_KEY_LENGTH]);
    key.copy_from_slice(&document_key[..ENCRYPTION_KEY_LENGTH]);
    Ok(key)
}
