use thiserror::Error;

/// Type alias for Result with GmailError
pub type Result<T> = std::result::Result<T, GmailError>;

/// Error types for the Gmail stats collector and report browser
#[derive(Error, Debug)]
pub enum GmailError {
    /// Gmail API returned an error
    #[error("Gmail API error: {0}")]
    ApiError(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthError(String),

    /// Network-related error (connection issues, timeouts, etc.)
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Server returned 5xx error
    #[error("Server error (HTTP {status}): {message}")]
    ServerError { status: u16, message: String },

    /// Resource not found (404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request (400)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Forbidden (403)
    #[error("Access forbidden: {0}")]
    Forbidden(String),

    /// Too many requests (429). Reported, never retried.
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Invalid message format or parsing error
    #[error("Invalid message format: {0}")]
    InvalidMessageFormat(String),

    /// The batch envelope itself could not be sent or decoded
    #[error("Batch request error: {0}")]
    BatchError(String),

    /// IO error (file operations, etc.)
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Report file selection or contents are unusable
    #[error("Report error: {0}")]
    ReportError(String),
}

impl GmailError {
    /// Classify a non-success HTTP status; shared by regular API calls and
    /// batch sub-responses
    pub fn from_status(status_code: u16, message: String) -> Self {
        match status_code {
            429 => GmailError::RateLimited(message),
            404 => GmailError::NotFound(message),
            400 => GmailError::BadRequest(message),
            401 => GmailError::AuthError(message),
            403 => GmailError::Forbidden(message),
            500..=599 => GmailError::ServerError {
                status: status_code,
                message,
            },
            _ => GmailError::ApiError(message),
        }
    }
}

impl From<google_gmail1::Error> for GmailError {
    fn from(error: google_gmail1::Error) -> Self {
        match error {
            // HTTP response with status code (non-success responses)
            google_gmail1::Error::Failure(ref response) => {
                let status = response.status();
                let message = format!(
                    "HTTP {}: {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("Unknown")
                );
                GmailError::from_status(status.as_u16(), message)
            }
            google_gmail1::Error::BadRequest(ref err) => GmailError::BadRequest(format!("{}", err)),
            google_gmail1::Error::HttpError(ref err) => {
                GmailError::NetworkError(format!("Connection error: {}", err))
            }
            google_gmail1::Error::Io(err) => GmailError::NetworkError(err.to_string()),
            google_gmail1::Error::MissingToken(ref err) => {
                GmailError::AuthError(format!("Missing token: {}", err))
            }
            _ => GmailError::ApiError(error.to_string()),
        }
    }
}
