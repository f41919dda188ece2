//! Field-level document encryption and tamper-evident authentication.
//!
//! Documents are JSON objects. Selected fields are sealed into an
//! AES-256-CBC envelope (`_ct`) under a per-document key, and an
//! HMAC-SHA-512 authentication code (`_ac`) binds the ciphertext, the
//! document id, extra cleartext fields and the collection identity.

pub mod async_sealer;
pub mod document;
pub mod error;
pub mod fields;
pub mod migrate;
pub mod options;
pub mod sealer;
pub mod signer;

pub use async_sealer::AsyncSealer;
pub use document::{
    generate_id, Document, DocumentKey, AUTH_CODE_FIELD, CIPHERTEXT_FIELD, ID_FIELD,
    RESERVED_FIELDS,
};
pub use docseal_crypto::{as_date, date_value, keygen, CryptoError, KeyMaterial};
pub use error::{ConfigError, Result, SealError};
pub use fields::FieldSelection;
pub use migrate::{MigrationFailure, MigrationReport};
pub use options::{FieldTreatment, SealOptions};
pub use sealer::Sealer;
pub use signer::{compute_signature, verify_signature};
