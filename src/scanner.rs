//! Message-list pagination and classification of metadata responses

use async_stream::stream;
use futures::stream::Stream;
use google_gmail1::api::Message;
use std::pin::Pin;
use tracing::{debug, info};

use crate::batch::SubResponse;
use crate::client::GmailClient;
use crate::config::ScanConfig;
use crate::error::Result;
use crate::models::{MessageOutcome, MessagePage, PageRequest, ParsedMessage};

/// Walks the message-list endpoint with the continuation token.
///
/// Stops after an empty page or after a page without a continuation token.
/// Errors are returned as-is; there is no retry.
pub struct MessagePager<'a> {
    client: &'a dyn GmailClient,
    request: PageRequest,
    pages_fetched: usize,
    finished: bool,
}

impl<'a> MessagePager<'a> {
    pub fn new(client: &'a dyn GmailClient, scan: &ScanConfig) -> Self {
        Self {
            client,
            request: PageRequest {
                page_token: None,
                page_size: scan.page_size,
                label_ids: scan.label_ids.clone(),
                include_spam_trash: scan.include_spam_trash,
            },
            pages_fetched: 0,
            finished: false,
        }
    }

    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    /// Fetch the next non-empty page, or `None` once the listing is exhausted
    pub async fn next_page(&mut self) -> Result<Option<MessagePage>> {
        if self.finished {
            return Ok(None);
        }

        let page = self.client.list_messages_page(&self.request).await?;

        if page.message_ids.is_empty() {
            debug!("Empty page received, listing complete");
            self.finished = true;
            return Ok(None);
        }

        match &page.next_page_token {
            Some(token) => self.request.page_token = Some(token.clone()),
            None => self.finished = true,
        }
        self.pages_fetched += 1;

        debug!(
            "Page {} with {} message ids (more: {})",
            self.pages_fetched,
            page.message_ids.len(),
            !self.finished
        );
        Ok(Some(page))
    }

    /// Stream of pages; ends after the last page or the first error
    pub fn into_stream(mut self) -> Pin<Box<dyn Stream<Item = Result<MessagePage>> + Send + 'a>> {
        Box::pin(stream! {
            loop {
                match self.next_page().await {
                    Ok(Some(page)) => yield Ok(page),
                    Ok(None) => break,
                    Err(e) => {
                        yield Err(e);
                        break;
                    }
                }
            }
            info!("Listing finished after {} pages", self.pages_fetched);
        })
    }
}

fn malformed(message_id: String, reason: &str, message: &Message) -> MessageOutcome {
    let dump = serde_json::to_string_pretty(message).unwrap_or_else(|_| format!("{:?}", message));
    MessageOutcome::Malformed {
        message_id,
        reason: reason.to_string(),
        dump,
    }
}

/// Extract the sender from a metadata response requested with only the From header
pub fn classify_message(message_id: String, message: &Message) -> MessageOutcome {
    let Some(payload) = message.payload.as_ref() else {
        return malformed(message_id, "No payload", message);
    };
    let Some(headers) = payload.headers.as_ref() else {
        return malformed(message_id, "No headers", message);
    };
    if headers.len() > 1 {
        return malformed(message_id, "header length > 1", message);
    }
    let Some(header) = headers.first() else {
        return malformed(message_id, "Empty headers", message);
    };
    let Some(sender) = header.value.clone() else {
        return malformed(message_id, "Header has no value", message);
    };
    let size_estimate = match message.size_estimate.map(u64::try_from) {
        Some(Ok(size)) => size,
        Some(Err(_)) => return malformed(message_id, "Negative size estimate", message),
        None => return malformed(message_id, "No size estimate", message),
    };

    MessageOutcome::Success(ParsedMessage {
        message_id,
        sender,
        size_estimate,
        label_ids: message.label_ids.clone().unwrap_or_default(),
    })
}

/// Turn one batch sub-response into an outcome
pub fn classify_sub_response(response: SubResponse) -> MessageOutcome {
    match response.result {
        Ok(message) => classify_message(response.message_id, &message),
        Err(error) => MessageOutcome::Failed {
            message_id: response.message_id,
            error,
        },
    }
}
