//! Typed wrapper over [`StoreBackend`].

use super::{StoreBackend, StoreError};
use futures::{stream::BoxStream, StreamExt};
use hcp_core::{Document, ResourceId};
use std::{marker::PhantomData, sync::Arc};

/// A typed handle on the documents of one kind.
///
/// Serialization happens here; the backend only ever sees raw JSON. Handles
/// are cheap to clone and share one backend.
pub struct Docs<D> {
    backend: Arc<dyn StoreBackend>,
    _kind: PhantomData<fn() -> D>,
}

impl<D> Clone for Docs<D> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            _kind: PhantomData,
        }
    }
}

impl<D: Document> Docs<D> {
    #[must_use]
    pub fn new(backend: Arc<dyn StoreBackend>) -> Self {
        Self {
            backend,
            _kind: PhantomData,
        }
    }

    pub async fn create(&self, doc: &D) -> Result<(), StoreError> {
        let body = encode(doc)?;
        self.backend.create(doc.id(), body).await
    }

    pub async fn get(&self, id: &ResourceId) -> Result<D, StoreError> {
        let value = self.backend.get(id).await?;
        decode(id, value)
    }

    /// `Ok(None)` when the document does not exist; other failures propagate.
    pub async fn try_get(&self, id: &ResourceId) -> Result<Option<D>, StoreError> {
        match self.get(id).await {
            Ok(doc) => Ok(Some(doc)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Idempotent first-observation create: on 409 the existing document is
    /// fetched and returned instead.
    pub async fn create_or_get(&self, doc: &D) -> Result<D, StoreError> {
        match self.create(doc).await {
            Ok(()) => Ok(doc.clone()),
            Err(err) if err.is_conflict() => self.get(doc.id()).await,
            Err(err) => Err(err),
        }
    }

    pub async fn replace(&self, doc: &D) -> Result<(), StoreError> {
        let body = encode(doc)?;
        self.backend.replace(doc.id(), body).await
    }

    /// Read-modify-replace without optimistic concurrency; retry on races is
    /// the enclosing reconcile loop's job. Returns the written document.
    pub async fn patch(
        &self,
        id: &ResourceId,
        mutate: impl FnOnce(&mut D) + Send,
    ) -> Result<D, StoreError> {
        let mut doc = self.get(id).await?;
        mutate(&mut doc);
        self.replace(&doc).await?;
        Ok(doc)
    }

    pub async fn delete(&self, id: &ResourceId) -> Result<(), StoreError> {
        self.backend.delete(id).await
    }

    /// Documents of this kind anywhere under `scope` (store-wide when
    /// `None`).
    pub fn list(&self, scope: Option<&ResourceId>) -> BoxStream<'static, Result<D, StoreError>> {
        self.backend
            .list(scope, D::KIND)
            .map(|result| result.and_then(decode_listed))
            .boxed()
    }
}

fn encode<D: Document>(doc: &D) -> Result<serde_json::Value, StoreError> {
    serde_json::to_value(doc).map_err(|source| StoreError::Encode {
        id: doc.id().to_string(),
        source,
    })
}

fn decode<D: Document>(id: &ResourceId, value: serde_json::Value) -> Result<D, StoreError> {
    serde_json::from_value(value).map_err(|source| StoreError::Decode {
        id: id.to_string(),
        source,
    })
}

fn decode_listed<D: Document>(value: serde_json::Value) -> Result<D, StoreError> {
    let id = value
        .get("id")
        .and_then(serde_json::Value::as_str)
        .unwrap_or("<missing id>")
        .to_owned();
    serde_json::from_value(value).map_err(|source| StoreError::Decode { id, source })
}
