//! Cryptographic primitives for sealed documents: canonical JSON, key
//! derivation, AES-256-CBC field envelopes and HMAC-SHA-512 authentication
//! codes. Nothing here knows what a document is.

pub mod aes_cbc;
pub mod auth_code;
pub mod base64;
pub mod canonical;
pub mod error;
pub mod keys;
pub mod types;

pub use aes_cbc::{
    decrypt_envelope, decrypt_fields, decrypt_fields_with_fallback, encrypt_envelope,
    encrypt_fields, envelope_version, generate_iv,
};
pub use auth_code::{build_signing_payload, normalize_fields, sign_fields, verify_fields, AuthCode};
pub use base64::{base64_decode, base64_encode};
pub use canonical::{
    as_binary, as_date, binary_value, canonical_json, check_field_value, date_value, stable_decode,
    stable_encode,
};
pub use error::CryptoError;
pub use keys::{
    decode_document_key, decode_encryption_key, derive_keys, document_encryption_key, keygen,
    validate_keys, KeyMaterial,
};
pub use types::{
    AUTH_CODE_VERSION, DIGEST_LENGTH, DOCUMENT_KEY_LENGTH, ENCRYPTION_KEY_LENGTH,
    ENVELOPE_VERSION, SIGNING_KEY_LENGTH,
};
