//! Async surface over [`Sealer`].
//!
//! The transforms never wait on I/O; this wrapper only exists for callers
//! living on a tokio runtime. Work runs on the blocking pool and errors come
//! back through the returned `Result`.

use std::sync::Arc;

use crate::document::Document;
use crate::error::{Result, SealError};
use crate::sealer::Sealer;

#[derive(Clone)]
pub struct AsyncSealer {
    inner: Arc<Sealer>,
}

impl AsyncSealer {
    pub fn new(sealer: Sealer) -> Self {
        Self {
            inner: Arc::new(sealer),
        }
    }

    pub fn sealer(&self) -> &Sealer {
        &self.inner
    }

    async fn run<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Sealer) -> Result<T> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || op(&*inner))
            .await
            .map_err(|e| SealError::TaskFailed(e.to_string()))?
    }

    pub async fn encrypt(&self, mut doc: Document) -> Result<Document> {
        self.run(move |s| s.encrypt(&mut doc).map(|()| doc)).await
    }

    pub async fn decrypt(&self, mut doc: Document) -> Result<Document> {
        self.run(move |s| s.decrypt(&mut doc).map(|()| doc)).await
    }

    pub async fn sign(&self, mut doc: Document) -> Result<Document> {
        self.run(move |s| s.sign(&mut doc).map(|()| doc)).await
    }

    /// Hands the document back unchanged on success.
    pub async fn authenticate(&self, doc: Document) -> Result<Document> {
        self.run(move |s| s.authenticate(&doc).map(|()| doc)).await
    }

    /// Returns `(in_memory, sealed)`; see [`Sealer::save_transform`].
    pub async fn save_transform(&self, mut doc: Document) -> Result<(Document, Document)> {
        self.run(move |s| s.save_transform(&mut doc).map(|sealed| (doc, sealed)))
            .await
    }

    pub async fn load_transform(&self, mut doc: Document) -> Result<Document> {
        self.run(move |s| s.load_transform(&mut doc).map(|()| doc)).await
    }
}
