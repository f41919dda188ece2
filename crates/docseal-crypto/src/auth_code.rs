//! HMAC-SHA-512 authentication codes.
//!
//! Wire format `a`:
//! [1 byte: version='a'][64 bytes: HMAC-SHA-512][JSON array of field names]
//!
//! The field list travels with the code, so a document is always verified
//! against the set of fields it was signed over.
//!
//! Signed payload, each part prefixed with its u32 BE length:
//! [version][collection id][canonical JSON field list][canonical JSON values]

use hmac::{Hmac, Mac};
use serde_json::{Map, Value};
use sha2::Sha512;

use crate::canonical::canonical_json;
use crate::error::CryptoError;
use crate::types::{
    AUTH_CODE_VERSION, DIGEST_LENGTH, SIGNING_KEY_LENGTH, SUPPORTED_AUTH_CODE_VERSIONS,
};

type HmacSha512 = Hmac<Sha512>;

/// A decoded authentication code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthCode {
    pub version: u8,
    pub digest: [u8; DIGEST_LENGTH],
    /// Sorted, deduplicated names of the fields covered by `digest`.
    pub fields: Vec<String>,
}

impl AuthCode {
    /// Serialize to wire bytes.
    pub fn encode(&self) -> Result<Vec<u8>, CryptoError> {
        let names = Value::Array(self.fields.iter().cloned().map(Value::String).collect());
        let names = canonical_json(&names)?;
        let mut out = Vec::with_capacity(1 + DIGEST_LENGTH + names.len());
        out.push(self.version);
        out.extend_from_slice(&self.digest);
        out.extend_from_slice(names.as_bytes());
        Ok(out)
    }

    /// Parse wire bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, CryptoError> {
        let version = *bytes
            .first()
            .ok_or_else(|| CryptoError::MalformedAuthCode("empty".to_string()))?;
        if !SUPPORTED_AUTH_CODE_VERSIONS.contains(&version) {
            return Err(CryptoError::UnsupportedVersion(version));
        }
        if bytes.len() < 1 + DIGEST_LENGTH {
            return Err(CryptoError::MalformedAuthCode(format!(
                "expected at least {} bytes, got {}",
                1 + DIGEST_LENGTH,
                bytes.len()
            )));
        }
        let mut digest = [0u8; DIGEST_LENGTH];
        digest.copy_from_slice(&bytes[1..1 + DIGEST_LENGTH]);
        let fields: Vec<String> = serde_json::from_slice(&bytes[1 + DIGEST_LENGTH..])
            .map_err(|e| CryptoError::MalformedAuthCode(format!("field list: {}", e)))?;
        Ok(Self {
            version,
            digest,
            fields,
        })
    }
}

/// Sort and deduplicate a field list into signing order.
pub fn normalize_fields<I, S>(fields: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut names: Vec<String> = fields.into_iter().map(Into::into).collect();
    names.sort();
    names.dedup();
    names
}

fn push_part(payload: &mut Vec<u8>, part: &[u8]) -> Result<(), CryptoError> {
    let len = u32::try_from(part.len()).map_err(|_| {
        CryptoError::NonSerializable(format!("signing payload part of {} bytes", part.len()))
    })?;
    payload.extend_from_slice(&len.to_be_bytes());
    payload.extend_from_slice(part);
    Ok(())
}

/// Build the byte string that gets MACed.
///
/// `fields` must already be normalized; `values` holds the current value of
/// each listed field that is present on the document.
pub fn build_signing_payload(
    version: u8,
    collection_id: &str,
    fields: &[String],
    values: &Map<String, Value>,
) -> Result<Vec<u8>, CryptoError> {
    let names = Value::Array(fields.iter().cloned().map(Value::String).collect());
    let names = canonical_json(&names)?;
    let values = canonical_json(&Value::Object(values.clone()))?;

    let mut payload =
        Vec::with_capacity(16 + collection_id.len() + names.len() + values.len());
    push_part(&mut payload, &[version])?;
    push_part(&mut payload, collection_id.as_bytes())?;
    push_part(&mut payload, names.as_bytes())?;
    push_part(&mut payload, values.as_bytes())?;
    Ok(payload)
}

fn new_mac(signing_key: &[u8]) -> Result<HmacSha512, CryptoError> {
    HmacSha512::new_from_slice(signing_key).map_err(|_| CryptoError::InvalidKeyLength {
        expected: SIGNING_KEY_LENGTH,
        got: signing_key.len(),
    })
}

/// Sign `values` over `fields` and return the encoded authentication code.
pub fn sign_fields(
    signing_key: &[u8],
    collection_id: &str,
    fields: &[String],
    values: &Map<String, Value>,
) -> Result<Vec<u8>, CryptoError> {
    let fields = normalize_fields(fields.iter().cloned());
    let payload = build_signing_payload(AUTH_CODE_VERSION, collection_id, &fields, values)?;
    let mut mac = new_mac(signing_key)?;
    mac.update(&payload);
    let mut digest = [0u8; DIGEST_LENGTH];
    digest.copy_from_slice(&mac.finalize().into_bytes());
    AuthCode {
        version: AUTH_CODE_VERSION,
        digest,
        fields,
    }
    .encode()
}

/// Verify `code` against `values`, in constant time.
///
/// The caller supplies values for the fields named in `code.fields`.
pub fn verify_fields(
    signing_key: &[u8],
    collection_id: &str,
    code: &AuthCode,
    values: &Map<String, Value>,
) -> Result<(), CryptoError> {
    let payload = build_signing_payload(code.version, collection_id, &code.fields, values)?;
    let mut mac = new_mac(signing_key)?;
    mac.update(&payload);
    mac.verify_slice(&code.digest)
        .map_err(|_| CryptoError::AuthenticationFailed)
}
