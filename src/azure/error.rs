use thiserror::Error;

/// Errors that can occur while resolving, inspecting or signing a blob
#[derive(Error, Debug)]
pub enum BlobError {
    /// Reference cannot be split into a container and a blob name
    #[error("The provided reference '{reference}' does not contain a valid container/blob path")]
    InvalidReference { reference: String },

    /// Blob name has `.` or `..` path segments
    #[error("Blob name '{key}' contains '.' or '..' path segments")]
    InvalidBlobName { key: String },

    /// Blob (or its container) does not exist
    #[error("Blob not found: {container}/{key}")]
    NotFound { container: String, key: String },

    /// Service rejected the credential for this container
    #[error("Access denied for container '{container}': {message}")]
    AccessDenied { container: String, message: String },

    /// Account URL is not usable as a blob service endpoint
    #[error("Invalid account URL '{url}': {reason}")]
    InvalidAccountUrl { url: String, reason: String },

    /// Account key is not valid base64
    #[error("Invalid account key: {0}")]
    InvalidAccountKey(#[from] base64::DecodeError),

    /// Any other non-success response from the service
    #[error("Azure Blob service returned HTTP {status} ({code})")]
    Service { status: u16, code: String },

    /// Transport failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// HMAC setup failed
    #[error("Signing error: {0}")]
    Signing(String),
}

impl BlobError {
    /// Map a non-success status from the blob endpoint to an error
    pub fn from_status(status: reqwest::StatusCode, code: &str, container: &str, key: &str) -> Self {
        let code = if code.is_empty() { None } else { Some(code.to_string()) };

        if status == reqwest::StatusCode::NOT_FOUND {
            Self::NotFound {
                container: container.to_string(),
                key: key.to_string(),
            }
        } else if status == reqwest::StatusCode::FORBIDDEN {
            Self::AccessDenied {
                container: container.to_string(),
                message: code.unwrap_or_else(|| status.to_string()),
            }
        } else {
            Self::Service {
                status: status.as_u16(),
                code: code.unwrap_or_else(|| "unknown".to_string()),
            }
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Get a user-friendly error message with suggestions
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidReference { reference } => {
                format!(
                    "Invalid blob reference: {}\n\nPossible solutions:\n  \
                     1. Use the form <container>/<blob name>\n  \
                     2. Or pass the full blob URL, e.g. https://<account>.blob.core.windows.net/<container>/<blob>",
                    reference
                )
            }
            Self::InvalidBlobName { key } => {
                format!(
                    "Invalid blob name: {}\n\nPossible solutions:\n  \
                     1. Remove '.' and '..' segments from the blob name\n  \
                     2. Rename the blob so every segment is a real name",
                    key
                )
            }
            Self::NotFound { container, key } => {
                format!(
                    "Blob not found: {}/{}\n\nPossible solutions:\n  \
                     1. Check the container name '{}'\n  \
                     2. Check the blob name, including any prefix\n  \
                     3. Percent-encoded characters are decoded before lookup",
                    container, key, container
                )
            }
            Self::AccessDenied { container, message } => {
                format!(
                    "Access denied for container '{}': {}\n\nPossible solutions:\n  \
                     1. Verify AZURE_STORAGE_ACCOUNT_KEY belongs to the account in AZURE_STORAGE_ACCOUNT_URL\n  \
                     2. Check whether the key was rotated\n  \
                     3. Check that the machine clock is correct",
                    container, message
                )
            }
            Self::InvalidAccountUrl { url, reason } => {
                format!(
                    "Invalid account URL '{}': {}\n\nPossible solutions:\n  \
                     1. Use https://<account>.blob.core.windows.net\n  \
                     2. For the emulator use http://127.0.0.1:10000/<account>",
                    url, reason
                )
            }
            Self::InvalidAccountKey(e) => {
                format!(
                    "Invalid account key: {}\n\nPossible solutions:\n  \
                     1. Copy the key from the storage account's Access keys page\n  \
                     2. Make sure the value is not quoted or truncated in .env",
                    e
                )
            }
            _ => self.to_string(),
        }
    }
}

/// Result type for blob operations
pub type Result<T> = std::result::Result<T, BlobError>;
