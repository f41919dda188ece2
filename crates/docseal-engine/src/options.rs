//! Engine configuration.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// How a single field is treated, as declared by a schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldTreatment {
    /// Removed from cleartext and stored inside the ciphertext envelope.
    Encrypted,
    /// Kept in cleartext but covered by the authentication code.
    Authenticated,
    /// Neither encrypted nor authenticated.
    Plain,
}

/// Options accepted by [`crate::Sealer::configure`].
///
/// Key material comes from `secret` or from the base64 pair
/// `encryption_key` + `signing_key`, never both.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SealOptions {
    pub secret: Option<String>,
    pub encryption_key: Option<String>,
    pub signing_key: Option<String>,
    /// Fields to encrypt. `None` encrypts every field that is not reserved,
    /// excluded or authenticated.
    pub encrypted_fields: Option<Vec<String>>,
    pub exclude_from_encryption: Vec<String>,
    pub additional_authenticated_fields: Vec<String>,
    /// Declarative per-field treatment, merged with the lists above.
    pub schema: BTreeMap<String, FieldTreatment>,
    /// Overrides the document's collection name in signatures.
    pub collection_id: Option<String>,
    /// When false, a document without an authentication code passes
    /// `authenticate`. Intended only for incremental migrations.
    pub require_authentication_code: bool,
    /// Keep the in-memory document in cleartext after `save_transform`.
    pub decrypt_after_encrypt: bool,
    /// When false, documents without a registered key use the
    /// collection-wide encryption key.
    pub require_document_key: bool,
    /// Keep the ephemeral per-document key after a successful decrypt.
    pub retain_document_key: bool,
    /// Retired base64 collection-wide encryption keys, tried in order after
    /// the current key.
    pub fallback_encryption_keys: Vec<String>,
}

impl Default for SealOptions {
    fn default() -> Self {
        Self {
            secret: None,
            encryption_key: None,
            signing_key: None,
            encrypted_fields: None,
            exclude_from_encryption: Vec::new(),
            additional_authenticated_fields: Vec::new(),
            schema: BTreeMap::new(),
            collection_id: None,
            require_authentication_code: true,
            decrypt_after_encrypt: true,
            require_document_key: true,
            retain_document_key: false,
            fallback_encryption_keys: Vec::new(),
        }
    }
}

impl SealOptions {
    /// Options keyed by a single master secret, everything else default.
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            secret: Some(secret.into()),
            ..Default::default()
        }
    }

    /// Options keyed by an explicit base64 key pair.
    pub fn with_keys(encryption_key: impl Into<String>, signing_key: impl Into<String>) -> Self {
        Self {
            encryption_key: Some(encryption_key.into()),
            signing_key: Some(signing_key.into()),
            ..Default::default()
        }
    }

    pub fn encrypted_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.encrypted_fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn authenticated_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.additional_authenticated_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn collection_id(mut self, id: impl Into<String>) -> Self {
        self.collection_id = Some(id.into());
        self
    }
}

// Key material stays out of logs.
impl fmt::Debug for SealOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SealOptions")
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("encryption_key", &self.encryption_key.as_ref().map(|_| "<redacted>"))
            .field("signing_key", &self.signing_key.as_ref().map(|_| "<redacted>"))
            .field("encrypted_fields", &self.encrypted_fields)
            .field("exclude_from_encryption", &self.exclude_from_encryption)
            .field(
                "additional_authenticated_fields",
                &self.additional_authenticated_fields,
            )
            .field("schema", &self.schema)
            .field("collection_id", &self.collection_id)
            .field(
                "require_authentication_code",
                &self.require_authentication_code,
            )
            .field("decrypt_after_encrypt", &self.decrypt_after_encrypt)
            .field("require_document_key", &self.require_document_key)
            .field("retain_document_key", &self.retain_document_key)
            .field(
                "fallback_encryption_keys",
                &self.fallback_encryption_keys.len(),
            )
            .finish()
    }
}
