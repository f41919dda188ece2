//! In-memory document handed to the engine by its caller.
//!
//! A document is a JSON object (its fields, `_id` included) tagged with the
//! name of the collection it lives in. It may also carry an ephemeral
//! per-document key, which is never serialized.

use std::fmt;

use docseal_crypto::{as_binary, binary_value, decode_document_key, CryptoError};
use serde::Serialize;
use serde_json::{Map, Value};
use zeroize::Zeroizing;

use crate::error::{Result, SealError};

/// Identity field.
pub const ID_FIELD: &str = "_id";
/// Ciphertext envelope field.
pub const CIPHERTEXT_FIELD: &str = "_ct";
/// Authentication code field.
pub const AUTH_CODE_FIELD: &str = "_ac";

/// Fields the engine owns; they are never encrypted.
pub const RESERVED_FIELDS: &[&str] = &[ID_FIELD, CIPHERTEXT_FIELD, AUTH_CODE_FIELD];

/// Generate a random document id (UUID v4).
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Ephemeral per-document key bytes. Zeroized on drop.
#[derive(Clone)]
pub struct DocumentKey(Zeroizing<Vec<u8>>);

impl DocumentKey {
    /// Decode a base64 key as produced by `keygen`.
    pub fn from_base64(encoded: &str) -> std::result::Result<Self, CryptoError> {
        decode_document_key(encoded).map(Self)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DocumentKey(<redacted>)")
    }
}

#[derive(Debug, Clone)]
pub struct Document {
    collection: String,
    fields: Map<String, Value>,
    key: Option<DocumentKey>,
}

impl Document {
    /// Wrap `fields`, filling a generated `_id` when none is present.
    pub fn new(collection: impl Into<String>, mut fields: Map<String, Value>) -> Self {
        if !fields.contains_key(ID_FIELD) {
            fields.insert(ID_FIELD.to_string(), Value::String(generate_id()));
        }
        Self {
            collection: collection.into(),
            fields,
            key: None,
        }
    }

    /// Build from a JSON value, which must be an object.
    pub fn from_value(collection: impl Into<String>, value: Value) -> Result<Self> {
        match value {
            Value::Object(fields) => Ok(Self::new(collection, fields)),
            Value::Null => Err(SealError::NotAnObject("null")),
            Value::Bool(_) => Err(SealError::NotAnObject("boolean")),
            Value::Number(_) => Err(SealError::NotAnObject("number")),
            Value::String(_) => Err(SealError::NotAnObject("string")),
            Value::Array(_) => Err(SealError::NotAnObject("array")),
        }
    }

    /// Build from any serializable record.
    pub fn from_serializable<T: Serialize>(collection: impl Into<String>, record: &T) -> Result<Self> {
        let value = serde_json::to_value(record).map_err(|e| SealError::NonSerializableField {
            field: "<document>".to_string(),
            reason: e.to_string(),
        })?;
        Self::from_value(collection, value)
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Move the document to another collection (e.g. a rename).
    pub fn set_collection(&mut self, collection: impl Into<String>) {
        self.collection = collection.into();
    }

    pub fn id(&self) -> Option<&Value> {
        self.fields.get(ID_FIELD)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn set(&mut self, field: impl Into<String>, value: Value) -> Option<Value> {
        self.fields.insert(field.into(), value)
    }

    /// Remove `field`, keeping the order of the remaining fields.
    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.fields.shift_remove(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn fields_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.fields
    }

    pub fn into_fields(self) -> Map<String, Value> {
        self.fields
    }

    /// The persisted shape: fields only, no key.
    pub fn to_value(&self) -> Value {
        Value::Object(self.fields.clone())
    }

    pub fn is_encrypted(&self) -> bool {
        self.fields.contains_key(CIPHERTEXT_FIELD)
    }

    pub fn is_signed(&self) -> bool {
        self.fields.contains_key(AUTH_CODE_FIELD)
    }

    /// Raw ciphertext envelope, if present and well-formed.
    pub fn ciphertext(&self) -> Option<Vec<u8>> {
        self.fields.get(CIPHERTEXT_FIELD).and_then(as_binary)
    }

    /// Raw authentication code, if present and well-formed.
    pub fn auth_code(&self) -> Option<Vec<u8>> {
        self.fields.get(AUTH_CODE_FIELD).and_then(as_binary)
    }

    pub(crate) fn set_ciphertext(&mut self, envelope: &[u8]) {
        self.fields
            .insert(CIPHERTEXT_FIELD.to_string(), binary_value(envelope));
    }

    pub(crate) fn set_auth_code(&mut self, code: &[u8]) {
        self.fields
            .insert(AUTH_CODE_FIELD.to_string(), binary_value(code));
    }

    /// Install a base64 per-document key. The key is not checked against
    /// the ciphertext; a wrong key surfaces later as a decryption failure.
    pub fn register_key(&mut self, encoded: &str) -> Result<()> {
        self.key = Some(DocumentKey::from_base64(encoded)?);
        Ok(())
    }

    pub fn set_key(&mut self, key: DocumentKey) {
        self.key = Some(key);
    }

    pub fn key(&self) -> Option<&DocumentKey> {
        self.key.as_ref()
    }

    pub fn has_key(&self) -> bool {
        self.key.is_some()
    }

    pub fn clear_key(&mut self) {
        self.key = None;
    }

    pub(crate) fn without_key(&self) -> Self {
        Self {
            collection: self.collection.clone(),
            fields: self.fields.clone(),
            key: None,
        }
    }

    pub(crate) fn replace_fields(&mut self, fields: Map<String, Value>) {
        self.fields = fields;
    }
}

/// Equality covers collection and fields; the ephemeral key is ignored.
impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.collection == other.collection && self.fields == other.fields
    }
}
