//! Gmail API client: label listing, message-list pagination and batched
//! metadata fetches

use async_trait::async_trait;
use google_gmail1::{hyper_rustls, hyper_util};
use tracing::debug;

use crate::auth::{GmailAuthenticator, GmailHub, READONLY_SCOPE, READONLY_SCOPES};
use crate::batch::{BatchTransport, SubResponse, MAX_BATCH_SIZE};
use crate::error::{GmailError, Result};
use crate::models::{LabelInfo, MessagePage, PageRequest};

/// The authenticated user
pub const USER_ID: &str = "me";

type HttpsConnector = hyper_rustls::HttpsConnector<hyper_util::client::legacy::connect::HttpConnector>;

/// Trait defining the Gmail operations a stats run needs, for easier testing
#[async_trait]
pub trait GmailClient: Send + Sync {
    /// List all labels in the account
    async fn list_labels(&self) -> Result<Vec<LabelInfo>>;

    /// Fetch one page of message ids
    async fn list_messages_page(&self, request: &PageRequest) -> Result<MessagePage>;

    /// Fetch From-header metadata for every id, one sub-response per id in
    /// input order. Per-message failures are carried inside the sub-responses.
    async fn batch_get_metadata(&self, message_ids: &[String]) -> Result<Vec<SubResponse>>;
}

/// Gmail client backed by the generated API hub and the raw batch endpoint
pub struct ProductionGmailClient {
    hub: GmailHub,
    auth: GmailAuthenticator,
    batch: BatchTransport<HttpsConnector>,
}

impl ProductionGmailClient {
    pub fn new(hub: GmailHub, auth: GmailAuthenticator, batch: BatchTransport<HttpsConnector>) -> Self {
        Self { hub, auth, batch }
    }

    /// Email address of the authenticated account
    pub async fn email_address(&self) -> Result<String> {
        let (_, profile) = self
            .hub
            .users()
            .get_profile(USER_ID)
            .add_scope(READONLY_SCOPE)
            .doit()
            .await?;
        Ok(profile.email_address.unwrap_or_default())
    }

    async fn access_token(&self) -> Result<String> {
        let token = self
            .auth
            .token(READONLY_SCOPES)
            .await
            .map_err(|e| GmailError::AuthError(format!("Failed to obtain token: {}", e)))?;
        token
            .token()
            .map(str::to_string)
            .ok_or_else(|| GmailError::AuthError("Token response has no access token".to_string()))
    }
}

#[async_trait]
impl GmailClient for ProductionGmailClient {
    async fn list_labels(&self) -> Result<Vec<LabelInfo>> {
        debug!("Calling Gmail API to list labels...");
        let (_, response) = self
            .hub
            .users()
            .labels_list(USER_ID)
            .add_scope(READONLY_SCOPE)
            .doit()
            .await?;

        let labels: Vec<LabelInfo> = response
            .labels
            .unwrap_or_default()
            .into_iter()
            .filter_map(|label| match (label.id, label.name) {
                (Some(id), Some(name)) => Some(LabelInfo {
                    id,
                    name,
                    label_type: label.type_.unwrap_or_default(),
                }),
                _ => None,
            })
            .collect();

        debug!("Successfully parsed {} labels", labels.len());
        Ok(labels)
    }

    async fn list_messages_page(&self, request: &PageRequest) -> Result<MessagePage> {
        let mut call = self
            .hub
            .users()
            .messages_list(USER_ID)
            .include_spam_trash(request.include_spam_trash);

        if let Some(page_size) = request.page_size {
            call = call.max_results(page_size);
        }
        for label_id in &request.label_ids {
            call = call.add_label_ids(label_id);
        }
        if let Some(token) = request.page_token.as_deref() {
            call = call.page_token(token);
        }

        let (_, response) = call.add_scope(READONLY_SCOPE).doit().await?;

        let message_ids = response
            .messages
            .unwrap_or_default()
            .into_iter()
            .filter_map(|msg_ref| msg_ref.id)
            .collect();

        Ok(MessagePage {
            message_ids,
            next_page_token: response.next_page_token.filter(|t| !t.is_empty()),
        })
    }

    async fn batch_get_metadata(&self, message_ids: &[String]) -> Result<Vec<SubResponse>> {
        if message_ids.is_empty() {
            return Ok(Vec::new());
        }

        let token = self.access_token().await?;
        let mut responses = Vec::with_capacity(message_ids.len());
        for chunk in message_ids.chunks(MAX_BATCH_SIZE) {
            responses.extend(self.batch.get_metadata(&token, chunk).await?);
        }
        Ok(responses)
    }
}
