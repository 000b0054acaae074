//! The document-store client: an untyped backend trait plus a typed
//! document API layered on top, the same split as an HTTP client and the
//! typed resource API wrapping it.

mod memory;
mod typed;

pub use memory::MemoryStore;
pub use typed::Docs;

use crate::BoxError;
use async_trait::async_trait;
use futures::stream::BoxStream;
use hcp_core::ResourceId;
use http::StatusCode;
use thiserror::Error;

/// Store failures. Category checks go through [`StoreError::is_response`]
/// (or the not-found/conflict shorthands); reconcilers never match on
/// message text.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store returned {status} for {id}")]
    Response { status: StatusCode, id: String },
    #[error("decoding document {id}")]
    Decode {
        id: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("encoding document {id}")]
    Encode {
        id: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("store transport failure")]
    Transport(#[source] BoxError),
}

impl StoreError {
    #[must_use]
    pub fn not_found(id: &ResourceId) -> Self {
        Self::Response {
            status: StatusCode::NOT_FOUND,
            id: id.to_string(),
        }
    }

    #[must_use]
    pub fn conflict(id: &ResourceId) -> Self {
        Self::Response {
            status: StatusCode::CONFLICT,
            id: id.to_string(),
        }
    }

    /// The response status, if the store answered at all.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Response { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether this is a store response with the given status.
    #[must_use]
    pub fn is_response(&self, status: StatusCode) -> bool {
        self.status() == Some(status)
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.is_response(StatusCode::NOT_FOUND)
    }

    #[must_use]
    pub fn is_conflict(&self) -> bool {
        self.is_response(StatusCode::CONFLICT)
    }
}

/// Untyped document-store operations over raw JSON bodies.
///
/// Every stored body carries its own fully qualified id under the `id` key;
/// listing operations rely on that to hand ids back to callers without a
/// second lookup. List streams yield items in store-key order and surface a
/// terminal error in-stream.
#[async_trait]
pub trait StoreBackend: Send + Sync + 'static {
    /// Stores a new document; 409 if one already exists under the id.
    async fn create(&self, id: &ResourceId, body: serde_json::Value) -> Result<(), StoreError>;

    /// 404 if absent.
    async fn get(&self, id: &ResourceId) -> Result<serde_json::Value, StoreError>;

    /// Replaces an existing document; 404 if absent.
    async fn replace(&self, id: &ResourceId, body: serde_json::Value) -> Result<(), StoreError>;

    /// 404 if absent.
    async fn delete(&self, id: &ResourceId) -> Result<(), StoreError>;

    /// Documents filed under the type keyword `kind` anywhere below `scope`
    /// (store-wide when `scope` is `None`). Resource-group segments sit
    /// between a subscription and its clusters, so kind listings match at
    /// any depth.
    fn list(
        &self,
        scope: Option<&ResourceId>,
        kind: &str,
    ) -> BoxStream<'static, Result<serde_json::Value, StoreError>>;

    /// Every document strictly below `root`, any kind, any depth.
    fn list_recursive(
        &self,
        root: &ResourceId,
    ) -> BoxStream<'static, Result<serde_json::Value, StoreError>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_category_checks() {
        let id: ResourceId = "/subscriptions/s/things/t".parse().unwrap();
        assert!(StoreError::not_found(&id).is_not_found());
        assert!(!StoreError::not_found(&id).is_conflict());
        assert!(StoreError::conflict(&id).is_conflict());
        assert!(StoreError::conflict(&id).is_response(StatusCode::CONFLICT));
        let transport = StoreError::Transport("boom".into());
        assert_eq!(transport.status(), None);
        assert!(!transport.is_not_found());
    }
}
