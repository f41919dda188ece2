//! Field selection: which fields get encrypted and which get authenticated.
//!
//! Resolved once from [`SealOptions`] into explicit sets. The two sets are
//! disjoint and never contain reserved fields. `_id` and `_ct` are always
//! authenticated in addition to the configured set.

use std::collections::BTreeSet;

use docseal_crypto::normalize_fields;

use crate::document::{Document, CIPHERTEXT_FIELD, ID_FIELD, RESERVED_FIELDS};
use crate::error::ConfigError;
use crate::options::{FieldTreatment, SealOptions};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSelection {
    /// `None` means "every eligible field".
    encrypted: Option<BTreeSet<String>>,
    excluded: BTreeSet<String>,
    authenticated: BTreeSet<String>,
}

impl FieldSelection {
    pub fn resolve(options: &SealOptions) -> Result<Self, ConfigError> {
        let mut encrypted: Option<BTreeSet<String>> = options
            .encrypted_fields
            .as_ref()
            .map(|fields| fields.iter().cloned().collect());
        let mut excluded: BTreeSet<String> =
            options.exclude_from_encryption.iter().cloned().collect();
        let mut authenticated: BTreeSet<String> = options
            .additional_authenticated_fields
            .iter()
            .cloned()
            .collect();
        let mut plain: BTreeSet<String> = BTreeSet::new();

        for (field, treatment) in &options.schema {
            match treatment {
                FieldTreatment::Encrypted => {
                    encrypted
                        .get_or_insert_with(BTreeSet::new)
                        .insert(field.clone());
                }
                FieldTreatment::Authenticated => {
                    authenticated.insert(field.clone());
                }
                FieldTreatment::Plain => {
                    plain.insert(field.clone());
                }
            }
        }

        // A field marked plain may not be encrypted or authenticated, and an
        // excluded field may not be listed as encrypted.
        let conflict = plain
            .iter()
            .find(|f| {
                authenticated.contains(*f) || encrypted.as_ref().is_some_and(|e| e.contains(*f))
            })
            .or_else(|| {
                encrypted
                    .iter()
                    .flatten()
                    .find(|f| excluded.contains(*f))
            });
        if let Some(field) = conflict {
            return Err(ConfigError::ConflictingTreatment(field.clone()));
        }
        excluded.extend(plain);

        let configured = encrypted.iter().flatten().chain(authenticated.iter());
        if let Some(reserved) = configured
            .into_iter()
            .find(|f| RESERVED_FIELDS.contains(&f.as_str()))
        {
            return Err(ConfigError::ReservedField(reserved.clone()));
        }
        if let Some(set) = &encrypted {
            if let Some(overlap) = set.intersection(&authenticated).next() {
                return Err(ConfigError::OverlappingFields(overlap.clone()));
            }
        }

        Ok(Self {
            encrypted,
            excluded,
            authenticated,
        })
    }

    /// True when no explicit encrypted set was configured.
    pub fn encrypts_everything(&self) -> bool {
        self.encrypted.is_none()
    }

    /// Names of the fields on `doc` that `encrypt` should move into the
    /// envelope, in sorted order.
    pub fn fields_to_encrypt(&self, doc: &Document) -> Vec<String> {
        match &self.encrypted {
            Some(set) => set
                .iter()
                .filter(|f| doc.contains(f))
                .cloned()
                .collect(),
            None => {
                let mut names: Vec<String> = doc
                    .fields()
                    .keys()
                    .filter(|f| {
                        !RESERVED_FIELDS.contains(&f.as_str())
                            && !self.excluded.contains(*f)
                            && !self.authenticated.contains(*f)
                    })
                    .cloned()
                    .collect();
                names.sort();
                names
            }
        }
    }

    /// Every field covered by a new authentication code, normalized.
    pub fn authenticated_fields(&self) -> Vec<String> {
        normalize_fields(
            [ID_FIELD, CIPHERTEXT_FIELD]
                .into_iter()
                .map(str::to_string)
                .chain(self.authenticated.iter().cloned()),
        )
    }
}
