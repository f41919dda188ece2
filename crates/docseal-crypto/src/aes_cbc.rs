//! AES-256-CBC field envelopes.
//!
//! Wire format `a`:
//! [1 byte: version='a'][16 bytes: IV][N bytes: AES-256-CBC/PKCS#7 ciphertext]
//!
//! The plaintext is the canonical JSON of the encrypted-field mapping.
//! Every failure past the version check is reported as the same
//! `DecryptionError`.

use aes::Aes256;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use serde_json::{Map, Value};
use zeroize::Zeroizing;

use crate::canonical::{stable_decode, stable_encode};
use crate::error::CryptoError;
use crate::types::{
    AES_BLOCK_LENGTH, AES_CBC_IV_LENGTH, ENCRYPTION_KEY_LENGTH, ENVELOPE_VERSION,
    SUPPORTED_ENVELOPE_VERSIONS,
};

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// Generate a random 16-byte IV from the OS CSPRNG.
pub fn generate_iv() -> Result<[u8; AES_CBC_IV_LENGTH], CryptoError> {
    let mut iv = [0u8; AES_CBC_IV_LENGTH];
    getrandom::getrandom(&mut iv).map_err(|e| CryptoError::RngFailed(e.to_string()))?;
    Ok(iv)
}

fn check_key(key: &[u8]) -> Result<(), CryptoError> {
    if key.len() != ENCRYPTION_KEY_LENGTH {
        return Err(CryptoError::InvalidKeyLength {
            expected: ENCRYPTION_KEY_LENGTH,
            got: key.len(),
        });
    }
    Ok(())
}

/// Encrypt raw bytes into a versioned envelope with a fresh IV.
pub fn encrypt_envelope(data: &[u8], key: &[u8]) -> Result<Vec<u8>, CryptoError> {
    check_key(key)?;
    let iv = generate_iv()?;
    let ciphertext = Aes256CbcEnc::new_from_slices(key, &iv)
        .map_err(|_| CryptoError::InvalidKeyLength {
            expected: ENCRYPTION_KEY_LENGTH,
            got: key.len(),
        })?
        .encrypt_padded_vec_mut::<Pkcs7>(data);

    let mut result = Vec::with_capacity(1 + iv.len() + ciphertext.len());
    result.push(ENVELOPE_VERSION);
    result.extend_from_slice(&iv);
    result.extend_from_slice(&ciphertext);
    Ok(result)
}

/// Read the version byte of an envelope, rejecting unknown versions.
pub fn envelope_version(envelope: &[u8]) -> Result<u8, CryptoError> {
    let version = *envelope.first().ok_or(CryptoError::DecryptionError)?;
    if !SUPPORTED_ENVELOPE_VERSIONS.contains(&version) {
        return Err(CryptoError::UnsupportedVersion(version));
    }
    Ok(version)
}

/// Decrypt a versioned envelope back into raw bytes.
pub fn decrypt_envelope(envelope: &[u8], key: &[u8]) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    envelope_version(envelope)?;
    if key.len() != ENCRYPTION_KEY_LENGTH {
        return Err(CryptoError::DecryptionError);
    }
    let body = &envelope[1..];
    if body.len() < AES_CBC_IV_LENGTH + AES_BLOCK_LENGTH
        || (body.len() - AES_CBC_IV_LENGTH) % AES_BLOCK_LENGTH != 0
    {
        return Err(CryptoError::DecryptionError);
    }

    let (iv, ciphertext) = body.split_at(AES_CBC_IV_LENGTH);
    Aes256CbcDec::new_from_slices(key, iv)
        .map_err(|_| CryptoError::DecryptionError)?
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map(Zeroizing::new)
        .map_err(|_| CryptoError::DecryptionError)
}

/// Encrypt a field mapping: canonical JSON, then [`encrypt_envelope`].
/// Two calls on the same input never produce the same envelope.
pub fn encrypt_fields(fields: &Map<String, Value>, key: &[u8]) -> Result<Vec<u8>, CryptoError> {
    check_key(key)?;
    let plaintext = Zeroizing::new(stable_encode(fields)?);
    encrypt_envelope(&plaintext, key)
}

/// Decrypt an envelope produced by [`encrypt_fields`].
pub fn decrypt_fields(envelope: &[u8], key: &[u8]) -> Result<Map<String, Value>, CryptoError> {
    let plaintext = decrypt_envelope(envelope, key)?;
    stable_decode(&plaintext).map_err(|_| CryptoError::DecryptionError)
}

/// Decrypt with the first key that works, for envelopes written before a
/// key rotation. All keys failing is still one generic `DecryptionError`.
pub fn decrypt_fields_with_fallback<K: AsRef<[u8]>>(
    envelope: &[u8],
    keys: &[K],
) -> Result<Map<String, Value>, CryptoError> {
    envelope_version(envelope)?;
    keys.iter()
        .find_map(|key| decrypt_fields(envelope, key.as_ref()).ok())
        .ok_or(CryptoError::DecryptionError)
}
