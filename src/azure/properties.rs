use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderName, CONTENT_LENGTH, CONTENT_TYPE, ETAG, LAST_MODIFIED};
use serde::Serialize;
use std::collections::HashMap;

const METADATA_HEADER_PREFIX: &str = "x-ms-meta-";

/// User metadata attached to a blob
pub type Metadata = HashMap<String, String>;

/// Result of a Get Blob Properties call
#[derive(Debug, Clone, Default, Serialize)]
pub struct BlobProperties {
    pub metadata: Metadata,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub etag: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
}

impl BlobProperties {
    /// Build properties from the response headers of a HEAD on the blob
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let metadata = headers
            .iter()
            .filter_map(|(name, value)| {
                let key = name.as_str().strip_prefix(METADATA_HEADER_PREFIX)?;
                Some((
                    key.to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                ))
            })
            .collect();

        let text = |name: HeaderName| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };

        Self {
            metadata,
            content_type: text(CONTENT_TYPE),
            content_length: text(CONTENT_LENGTH).and_then(|v| v.parse().ok()),
            etag: text(ETAG),
            last_modified: text(LAST_MODIFIED)
                .and_then(|v| DateTime::parse_from_rfc2822(&v).ok())
                .map(|d| d.with_timezone(&Utc)),
        }
    }
}
