//! Delivery of asynchronous operation-completion notifications.

use async_trait::async_trait;
use hcp_core::documents::OperationDocument;
use hcp_core::{CloudError, ProvisioningState, ResourceId};
use http::StatusCode;
use serde::Serialize;
use thiserror::Error;

/// The JSON body POSTed to an operation's notification URI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload {
    pub id: ResourceId,
    pub status: ProvisioningState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<CloudError>,
}

impl NotificationPayload {
    #[must_use]
    pub fn for_operation(op: &OperationDocument) -> Self {
        Self {
            id: op.id.clone(),
            status: op.state,
            error: op.error.clone(),
        }
    }
}

#[derive(Debug, Error)]
pub enum NotifyError {
    /// The endpoint answered with status >= 400; the payload will be
    /// retried on the next reconcile until accepted.
    #[error("notification endpoint rejected payload with {0}")]
    Rejected(StatusCode),
    #[error("notification transport failure")]
    Transport(#[from] reqwest::Error),
}

#[async_trait]
pub trait NotificationClient: Send + Sync + 'static {
    async fn notify(&self, uri: &str, payload: &NotificationPayload) -> Result<(), NotifyError>;
}

/// POSTs payloads over HTTP.
#[derive(Clone, Default)]
pub struct HttpNotifier {
    http: reqwest::Client,
}

impl HttpNotifier {
    #[must_use]
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl NotificationClient for HttpNotifier {
    async fn notify(&self, uri: &str, payload: &NotificationPayload) -> Result<(), NotifyError> {
        let response = self.http.post(uri).json(payload).send().await?;
        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            return Err(NotifyError::Rejected(status));
        }
        Ok(())
    }
}
