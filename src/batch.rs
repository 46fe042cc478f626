//! Gmail batch endpoint: one `multipart/mixed` HTTP round trip carrying one
//! metadata sub-request per message.

use bytes::Bytes;
use google_gmail1::api::Message;
use http_body_util::{BodyExt, Full};
use hyper::header::{AUTHORIZATION, CONTENT_TYPE};
use hyper_util::client::legacy::connect::Connect;
use hyper_util::client::legacy::Client;
use tracing::debug;

use crate::error::{GmailError, Result};

/// Default batch endpoint for the Gmail API
pub const BATCH_ENDPOINT: &str = "https://www.googleapis.com/batch/gmail/v1";

/// The batch endpoint rejects envelopes with more sub-requests than this
pub const MAX_BATCH_SIZE: usize = 100;

/// Hyper client type used for raw batch requests
pub type BatchHttpClient<C> = Client<C, Full<Bytes>>;

/// Response for one message id of a batch
#[derive(Debug)]
pub struct SubResponse {
    pub message_id: String,
    pub result: Result<Message>,
}

/// Relative URL of a metadata-only message fetch restricted to the From header
pub fn metadata_request_path(user_id: &str, message_id: &str) -> String {
    format!(
        "/gmail/v1/users/{}/messages/{}?format=metadata&metadataHeaders=From",
        user_id, message_id
    )
}

/// Build the multipart body; part `i` carries `Content-ID: <item-i>`
pub fn encode_batch_body(boundary: &str, user_id: &str, message_ids: &[String]) -> String {
    let mut body = String::new();
    for (i, id) in message_ids.iter().enumerate() {
        body.push_str(&format!("--{}\r\n", boundary));
        body.push_str("Content-Type: application/http\r\n");
        body.push_str(&format!("Content-ID: <item-{}>\r\n", i));
        body.push_str("\r\n");
        body.push_str(&format!("GET {}\r\n", metadata_request_path(user_id, id)));
        body.push_str("\r\n");
    }
    body.push_str(&format!("--{}--\r\n", boundary));
    body
}

/// Extract the boundary parameter of a `multipart/mixed` content type
pub fn boundary_from_content_type(content_type: &str) -> Option<String> {
    content_type
        .split(';')
        .filter_map(|part| {
            part.trim()
                .strip_prefix("boundary=")
                .map(|value| value.trim_matches('"').to_string())
        })
        .find(|b| !b.is_empty())
}

fn split_head(text: &str) -> (&str, &str) {
    match text.find("\n\n") {
        Some(pos) => (&text[..pos], &text[pos + 2..]),
        None => (text, ""),
    }
}

fn header_value<'a>(head: &'a str, name: &str) -> Option<&'a str> {
    head.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        if key.trim().eq_ignore_ascii_case(name) {
            Some(value.trim())
        } else {
            None
        }
    })
}

/// `<response-item-3>` -> 3
fn item_index(content_id: &str) -> Option<usize> {
    let id = content_id.trim().trim_start_matches('<').trim_end_matches('>');
    let id = id.strip_prefix("response-").unwrap_or(id);
    id.strip_prefix("item-")?.parse().ok()
}

fn error_message(status: u16, body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .map(|message| format!("HTTP {}: {}", status, message))
        .unwrap_or_else(|| format!("HTTP {}", status))
}

/// Parse the embedded `HTTP/1.1 <status>` response of one part
fn decode_http_response(text: &str) -> Result<Message> {
    let (head, body) = split_head(text.trim_start());
    let status = head
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|code| code.parse::<u16>().ok())
        .ok_or_else(|| GmailError::BatchError("Sub-response has no status line".to_string()))?;

    let body = body.trim();
    if !(200..300).contains(&status) {
        return Err(GmailError::from_status(status, error_message(status, body)));
    }

    Ok(serde_json::from_str::<Message>(body)?)
}

/// Split a batch response into one result per requested id, in request order.
///
/// Parts are matched by `Content-ID`; parts without a usable id fill the
/// remaining slots by position. Ids with no matching part become errors.
pub fn decode_batch_body(body: &str, boundary: &str, message_ids: &[String]) -> Vec<SubResponse> {
    let delimiter = format!("--{}", boundary);
    let mut slots: Vec<Option<Result<Message>>> = message_ids.iter().map(|_| None).collect();
    let mut unindexed = Vec::new();

    for raw_part in body.split(delimiter.as_str()).skip(1) {
        if raw_part.starts_with("--") {
            break;
        }
        let part = raw_part.replace("\r\n", "\n");
        let (outer_head, http_response) = split_head(part.trim_start_matches('\n'));
        let result = decode_http_response(http_response);

        match header_value(outer_head, "content-id").and_then(item_index) {
            Some(i) if i < slots.len() && slots[i].is_none() => slots[i] = Some(result),
            _ => unindexed.push(result),
        }
    }

    let mut unindexed = unindexed.into_iter();
    message_ids
        .iter()
        .zip(slots)
        .map(|(id, slot)| {
            let result = slot.or_else(|| unindexed.next()).unwrap_or_else(|| {
                Err(GmailError::BatchError(format!(
                    "No sub-response for message {}",
                    id
                )))
            });
            SubResponse {
                message_id: id.clone(),
                result,
            }
        })
        .collect()
}

/// Sends metadata batches over a hyper client
#[derive(Clone)]
pub struct BatchTransport<C> {
    http: BatchHttpClient<C>,
    endpoint: String,
    user_id: String,
}

impl<C> BatchTransport<C>
where
    C: Connect + Clone + Send + Sync + 'static,
{
    pub fn new(http: BatchHttpClient<C>) -> Self {
        Self::with_endpoint(http, BATCH_ENDPOINT)
    }

    pub fn with_endpoint(http: BatchHttpClient<C>, endpoint: &str) -> Self {
        Self {
            http,
            endpoint: endpoint.to_string(),
            user_id: "me".to_string(),
        }
    }

    /// Fetch From-header metadata for up to [`MAX_BATCH_SIZE`] messages in one request.
    ///
    /// Errors of individual sub-requests are returned inside the `SubResponse`s;
    /// an `Err` means the envelope itself failed.
    pub async fn get_metadata(&self, access_token: &str, message_ids: &[String]) -> Result<Vec<SubResponse>> {
        if message_ids.is_empty() {
            return Ok(Vec::new());
        }
        if message_ids.len() > MAX_BATCH_SIZE {
            return Err(GmailError::BatchError(format!(
                "{} sub-requests exceed the batch limit of {}",
                message_ids.len(),
                MAX_BATCH_SIZE
            )));
        }

        let boundary = format!("batch_{}", uuid::Uuid::new_v4().simple());
        let body = encode_batch_body(&boundary, &self.user_id, message_ids);

        let request = hyper::Request::builder()
            .method(hyper::Method::POST)
            .uri(self.endpoint.as_str())
            .header(AUTHORIZATION, format!("Bearer {}", access_token))
            .header(CONTENT_TYPE, format!("multipart/mixed; boundary={}", boundary))
            .body(Full::new(Bytes::from(body)))
            .map_err(|e| GmailError::BatchError(format!("Failed to build batch request: {}", e)))?;

        debug!("Sending batch of {} metadata requests", message_ids.len());
        let response = self
            .http
            .request(request)
            .await
            .map_err(|e| GmailError::NetworkError(format!("Batch request failed: {}", e)))?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let bytes = response
            .into_body()
            .collect()
            .await
            .map_err(|e| GmailError::NetworkError(format!("Failed to read batch response: {}", e)))?
            .to_bytes();
        let text = String::from_utf8_lossy(&bytes);

        if !status.is_success() {
            return Err(GmailError::from_status(
                status.as_u16(),
                error_message(status.as_u16(), &text),
            ));
        }

        let response_boundary = boundary_from_content_type(&content_type).ok_or_else(|| {
            GmailError::BatchError(format!(
                "Batch response has no multipart boundary (content-type: {:?})",
                content_type
            ))
        })?;

        Ok(decode_batch_body(&text, &response_boundary, message_ids))
    }
}
