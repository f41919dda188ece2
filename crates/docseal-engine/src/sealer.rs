//! The document transform engine.
//!
//! A [`Sealer`] holds resolved configuration and key material and applies
//! the four transforms to documents:
//!
//! - `encrypt`: move the selected fields into the `_ct` envelope
//! - `decrypt`: restore them from `_ct`
//! - `sign`: write the `_ac` authentication code
//! - `authenticate`: check `_ac` against the current document
//!
//! Saving is `encrypt` then `sign`, so the code covers the final
//! ciphertext. Loading is `authenticate` then `decrypt`, so ciphertext is
//! never trusted before it is verified.

use std::fmt;

use docseal_crypto::{
    as_binary, check_field_value, decode_encryption_key, decrypt_fields,
    decrypt_fields_with_fallback, document_encryption_key, encrypt_fields, envelope_version,
    CryptoError, KeyMaterial, ENCRYPTION_KEY_LENGTH,
};
use serde_json::Map;
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::document::{Document, AUTH_CODE_FIELD, CIPHERTEXT_FIELD};
use crate::error::{ConfigError, Result, SealError};
use crate::fields::FieldSelection;
use crate::options::SealOptions;
use crate::signer::{compute_signature, verify_signature};

pub struct Sealer {
    keys: KeyMaterial,
    fallback_keys: Vec<Zeroizing<[u8; ENCRYPTION_KEY_LENGTH]>>,
    selection: FieldSelection,
    options: SealOptions,
}

// Key material stays out of logs.
impl fmt::Debug for Sealer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sealer")
            .field("selection", &self.selection)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Sealer {
    /// Validate `options`, derive or decode the keys and resolve the field
    /// selection. Any key or field problem is reported here, not later.
    pub fn configure(options: SealOptions) -> Result<Self> {
        let keys = match (
            &options.secret,
            &options.encryption_key,
            &options.signing_key,
        ) {
            (Some(secret), None, None) => KeyMaterial::from_secret(secret.as_bytes())?,
            (None, Some(enc), Some(sig)) => KeyMaterial::from_base64(enc, sig)?,
            _ => return Err(ConfigError::KeySource.into()),
        };
        let fallback_keys = options
            .fallback_encryption_keys
            .iter()
            .map(|k| decode_encryption_key(k))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let selection = FieldSelection::resolve(&options)?;

        debug!(
            collection_id = ?options.collection_id,
            encrypt_all = selection.encrypts_everything(),
            authenticated = ?selection.authenticated_fields(),
            fallback_keys = fallback_keys.len(),
            "configured sealer"
        );

        Ok(Self {
            keys,
            fallback_keys,
            selection,
            options,
        })
    }

    /// Build a sealer with new options but the same key material and
    /// collection identity. Takes effect for subsequent operations only;
    /// existing envelopes are not rewritten.
    pub fn reconfigure(&self, mut options: SealOptions) -> Result<Self> {
        options.collection_id = self.options.collection_id.clone();
        let fallback_keys = options
            .fallback_encryption_keys
            .iter()
            .map(|k| decode_encryption_key(k))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let selection = FieldSelection::resolve(&options)?;
        Ok(Self {
            keys: self.keys.clone(),
            fallback_keys,
            selection,
            options,
        })
    }

    pub fn options(&self) -> &SealOptions {
        &self.options
    }

    pub fn selection(&self) -> &FieldSelection {
        &self.selection
    }

    /// Per-document key for a caller secret such as a password.
    /// Same secret, same key; nothing needs to be stored.
    pub fn keygen(&self, secret: &str) -> Result<String> {
        Ok(self.keys.keygen(secret.as_bytes())?)
    }

    /// Install a base64 per-document key on `doc`.
    pub fn register_key(&self, doc: &mut Document, encoded: &str) -> Result<()> {
        doc.register_key(encoded)
    }

    fn collection_id<'a>(&'a self, doc: &'a Document) -> &'a str {
        self.options
            .collection_id
            .as_deref()
            .unwrap_or_else(|| doc.collection())
    }

    fn encryption_key_for(&self, doc: &Document) -> Result<Zeroizing<[u8; ENCRYPTION_KEY_LENGTH]>> {
        match doc.key() {
            Some(key) => Ok(document_encryption_key(key.as_bytes())?),
            None if self.options.require_document_key => Err(SealError::NoKeyAvailable),
            None => Ok(Zeroizing::new(*self.keys.encryption_key())),
        }
    }

    /// Move the selected fields into a fresh `_ct` envelope and drop any
    /// stale `_ac`.
    ///
    /// A document that already carries `_ct` is rejected with
    /// `AlreadyEncrypted`: encrypting it again would seal an empty field set
    /// over the real ciphertext. Nothing is modified on error.
    pub fn encrypt(&self, doc: &mut Document) -> Result<()> {
        if doc.is_encrypted() {
            return Err(SealError::AlreadyEncrypted);
        }
        let key = self.encryption_key_for(doc)?;
        let names = self.selection.fields_to_encrypt(doc);

        let mut protected = Map::new();
        for name in &names {
            if let Some(value) = doc.get(name) {
                check_field_value(value).map_err(|e| SealError::NonSerializableField {
                    field: name.clone(),
                    reason: e.to_string(),
                })?;
                protected.insert(name.clone(), value.clone());
            }
        }

        let envelope = encrypt_fields(&protected, &key[..])?;
        for name in &names {
            doc.remove(name);
        }
        doc.remove(AUTH_CODE_FIELD);
        doc.set_ciphertext(&envelope);

        debug!(
            collection = doc.collection(),
            id = ?doc.id(),
            fields = protected.len(),
            "encrypted document"
        );
        Ok(())
    }

    /// Restore encrypted fields from `_ct` and remove `_ct` and `_ac`.
    ///
    /// No-op when the document has no ciphertext. Fails with
    /// `NoKeyAvailable` when no key can be resolved, and with a generic
    /// decryption error for a wrong key or corrupt envelope. The
    /// per-document key is dropped on success unless `retain_document_key`.
    pub fn decrypt(&self, doc: &mut Document) -> Result<()> {
        let Some(raw) = doc.get(CIPHERTEXT_FIELD) else {
            return Ok(());
        };
        let envelope = as_binary(raw).ok_or(CryptoError::DecryptionError)?;
        envelope_version(&envelope)?;

        let restored = match doc.key() {
            Some(key) => {
                let key = document_encryption_key(key.as_bytes())
                    .map_err(|_| CryptoError::DecryptionError)?;
                decrypt_fields(&envelope, &key[..])?
            }
            None if self.options.require_document_key => return Err(SealError::NoKeyAvailable),
            None => {
                let mut keys: Vec<&[u8]> = vec![&self.keys.encryption_key()[..]];
                keys.extend(self.fallback_keys.iter().map(|k| &k[..]));
                decrypt_fields_with_fallback(&envelope, &keys)?
            }
        };

        let count = restored.len();
        for (name, value) in restored {
            doc.set(name, value);
        }
        doc.remove(CIPHERTEXT_FIELD);
        doc.remove(AUTH_CODE_FIELD);
        if !self.options.retain_document_key {
            doc.clear_key();
        }

        debug!(
            collection = doc.collection(),
            id = ?doc.id(),
            fields = count,
            "decrypted document"
        );
        Ok(())
    }

    /// Synchronous decrypt; errors are returned directly.
    pub fn decrypt_sync(&self, doc: &mut Document) -> Result<()> {
        self.decrypt(doc)
    }

    /// Compute and store `_ac` over the current ciphertext and
    /// authenticated fields. Deterministic, so signing twice is harmless.
    pub fn sign(&self, doc: &mut Document) -> Result<()> {
        let fields = self.selection.authenticated_fields();
        let code = compute_signature(
            doc,
            &fields,
            self.collection_id(doc),
            self.keys.signing_key(),
        )?;
        doc.set_auth_code(&code);
        debug!(collection = doc.collection(), id = ?doc.id(), "signed document");
        Ok(())
    }

    /// True when `doc` carries an authentication code that verifies.
    pub fn verify_signature(&self, doc: &Document) -> bool {
        match doc.get(AUTH_CODE_FIELD).and_then(as_binary) {
            Some(code) => verify_signature(
                doc,
                &code,
                self.collection_id(doc),
                self.keys.signing_key(),
            )
            .is_ok(),
            None => false,
        }
    }

    /// Check `_ac` against the document without modifying it.
    ///
    /// A missing code fails unless `require_authentication_code` is off.
    pub fn authenticate(&self, doc: &Document) -> Result<()> {
        let Some(raw) = doc.get(AUTH_CODE_FIELD) else {
            if self.options.require_authentication_code {
                warn!(
                    collection = doc.collection(),
                    id = ?doc.id(),
                    "authentication code missing"
                );
                return Err(SealError::AuthenticationFailed);
            }
            debug!(
                collection = doc.collection(),
                id = ?doc.id(),
                "no authentication code, accepted by configuration"
            );
            return Ok(());
        };

        let result = match as_binary(raw) {
            Some(code) => verify_signature(
                doc,
                &code,
                self.collection_id(doc),
                self.keys.signing_key(),
            ),
            None => Err(SealError::AuthenticationFailed),
        };
        if result.is_err() {
            warn!(
                collection = doc.collection(),
                id = ?doc.id(),
                "authentication failed"
            );
        }
        result
    }

    /// Synchronous authenticate; errors are returned directly.
    pub fn authenticate_sync(&self, doc: &Document) -> Result<()> {
        self.authenticate(doc)
    }

    /// Encrypt then sign. Returns the sealed form to persist, which never
    /// carries the per-document key. With `decrypt_after_encrypt` the
    /// in-memory `doc` keeps its cleartext, otherwise it is left sealed too.
    pub fn save_transform(&self, doc: &mut Document) -> Result<Document> {
        let mut sealed = doc.clone();
        self.encrypt(&mut sealed)?;
        self.sign(&mut sealed)?;
        let sealed = sealed.without_key();
        if !self.options.decrypt_after_encrypt {
            doc.replace_fields(sealed.fields().clone());
        }
        Ok(sealed)
    }

    /// Authenticate then decrypt. The document is untouched on failure.
    pub fn load_transform(&self, doc: &mut Document) -> Result<()> {
        self.authenticate(doc)?;
        self.decrypt(doc)
    }
}
