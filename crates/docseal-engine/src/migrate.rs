//! Batch migration of existing documents into sealed form.

use serde_json::Value;
use tracing::{info, warn};

use crate::document::Document;
use crate::error::SealError;
use crate::sealer::Sealer;

/// A document that could not be migrated, handed back untouched.
#[derive(Debug)]
pub struct MigrationFailure {
    pub id: Option<Value>,
    pub document: Document,
    pub error: SealError,
}

#[derive(Debug, Default)]
pub struct MigrationReport {
    /// Sealed documents ready to persist (no per-document keys attached).
    pub migrated: Vec<Document>,
    /// Documents that were already encrypted and signed.
    pub skipped: usize,
    pub failures: Vec<MigrationFailure>,
}

impl MigrationReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

impl Sealer {
    /// Encrypt and sign every document, using keys already registered on
    /// each document. See [`Sealer::migrate_all_with_keys`].
    pub fn migrate_all<I>(&self, documents: I) -> MigrationReport
    where
        I: IntoIterator<Item = Document>,
    {
        self.migrate_all_with_keys(documents, |_| None)
    }

    /// Encrypt and sign every document. `key_for` may supply a base64
    /// per-document key for a document that has none registered.
    ///
    /// Documents already carrying `_ct` and `_ac` are skipped. Documents
    /// carrying `_ct` only are signed. A failing document is recorded and
    /// the batch carries on.
    pub fn migrate_all_with_keys<I, F>(&self, documents: I, mut key_for: F) -> MigrationReport
    where
        I: IntoIterator<Item = Document>,
        F: FnMut(&Document) -> Option<String>,
    {
        let mut report = MigrationReport::default();

        for document in documents {
            if document.is_encrypted() && document.is_signed() {
                report.skipped += 1;
                continue;
            }
            match self.migrate_one(&document, &mut key_for) {
                Ok(sealed) => report.migrated.push(sealed),
                Err(error) => {
                    warn!(
                        collection = document.collection(),
                        id = ?document.id(),
                        error = %error,
                        "document migration failed"
                    );
                    report.failures.push(MigrationFailure {
                        id: document.id().cloned(),
                        document,
                        error,
                    });
                }
            }
        }

        info!(
            migrated = report.migrated.len(),
            skipped = report.skipped,
            failed = report.failures.len(),
            "migration finished"
        );
        report
    }

    fn migrate_one<F>(&self, document: &Document, key_for: &mut F) -> Result<Document, SealError>
    where
        F: FnMut(&Document) -> Option<String>,
    {
        let mut working = document.clone();
        if !working.has_key() {
            if let Some(key) = key_for(&working) {
                working.register_key(&key)?;
            }
        }
        if !working.is_encrypted() {
            self.encrypt(&mut working)?;
        }
        self.sign(&mut working)?;
        working.clear_key();
        Ok(working)
    }
}
