//! Document-level signing and verification.
//!
//! Picks the current values of the signed fields off a document and runs
//! them through the HMAC-SHA-512 authentication code primitives.

use docseal_crypto::{sign_fields, verify_fields, AuthCode, CryptoError};
use serde_json::{Map, Value};
use tracing::debug;

use crate::document::Document;
use crate::error::{Result, SealError};

/// Current values of `fields` on `doc`. Absent fields are left out, so
/// deleting a field is distinguishable from setting it to null.
fn pick(doc: &Document, fields: &[String]) -> Map<String, Value> {
    fields
        .iter()
        .filter_map(|f| doc.get(f).map(|v| (f.clone(), v.clone())))
        .collect()
}

/// Compute an encoded authentication code for `doc` over `fields`, bound
/// to `collection_id`.
pub fn compute_signature(
    doc: &Document,
    fields: &[String],
    collection_id: &str,
    signing_key: &[u8],
) -> Result<Vec<u8>> {
    let values = pick(doc, fields);
    sign_fields(signing_key, collection_id, fields, &values).map_err(|e| match e {
        CryptoError::NonSerializable(reason) => SealError::NonSerializableField {
            field: "<authenticated fields>".to_string(),
            reason,
        },
        other => SealError::Crypto(other),
    })
}

/// Verify `code` against `doc`, using the field list recorded in the code.
///
/// Fails closed: malformed codes, unknown versions and digest mismatches
/// all come back as `AuthenticationFailed`.
pub fn verify_signature(
    doc: &Document,
    code: &[u8],
    collection_id: &str,
    signing_key: &[u8],
) -> Result<()> {
    let code = AuthCode::decode(code).map_err(|e| {
        debug!(error = %e, "rejecting undecodable authentication code");
        SealError::AuthenticationFailed
    })?;
    let values = pick(doc, &code.fields);
    verify_fields(signing_key, collection_id, &code, &values)
        .map_err(|_| SealError::AuthenticationFailed)
}
