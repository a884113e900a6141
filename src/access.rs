use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::azure::{BlobError, BlobProperties, BlobServiceClient, Metadata, Result, SasWindow};
use crate::locator::BlobRef;
use crate::metadata;

/// Signed URL plus the blob's raw metadata and system properties
#[derive(Debug, Clone, Serialize)]
pub struct SignedBlob {
    pub url: String,
    pub metadata: Metadata,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub etag: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Signed URL plus display title and relabelled metadata
#[derive(Debug, Clone, Serialize)]
pub struct DisplayBlob {
    pub url: String,
    pub title: String,
    pub metadata: BTreeMap<String, String>,
}

/// What the entry points need from the storage service
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn get_properties(&self, blob: &BlobRef) -> Result<BlobProperties>;

    /// Blob URL carrying a read-only SAS valid for `window`
    fn signed_url(&self, blob: &BlobRef, window: &SasWindow) -> Result<String>;
}

#[async_trait]
impl BlobStore for BlobServiceClient {
    async fn get_properties(&self, blob: &BlobRef) -> Result<BlobProperties> {
        self.blob_client(&blob.container, &blob.key)
            .get_properties()
            .await
    }

    fn signed_url(&self, blob: &BlobRef, window: &SasWindow) -> Result<String> {
        self.blob_client(&blob.container, &blob.key)
            .generate_sas_url(window)
    }
}

/// Fetch metadata and sign a read URL
///
/// Every error propagates, `BlobError::NotFound` included. Compare
/// [`sign_blob_with_display`], which reports a missing blob as `Ok(None)`.
pub async fn sign_blob<S: BlobStore + ?Sized>(store: &S, blob: &BlobRef) -> Result<SignedBlob> {
    let properties = store.get_properties(blob).await?;
    let url = store.signed_url(blob, &SasWindow::now())?;

    debug!(blob = %blob, "Signed blob URL issued");

    Ok(SignedBlob {
        url,
        metadata: properties.metadata,
        content_type: properties.content_type,
        content_length: properties.content_length,
        etag: properties.etag,
        last_modified: properties.last_modified,
    })
}

/// Like [`sign_blob`], plus display metadata; a missing blob yields `Ok(None)`
pub async fn sign_blob_with_display<S: BlobStore + ?Sized>(
    store: &S,
    blob: &BlobRef,
    name: &str,
) -> Result<Option<DisplayBlob>> {
    let properties = match store.get_properties(blob).await {
        Ok(properties) => properties,
        Err(BlobError::NotFound { container, key }) => {
            warn!(key = %key, container = %container, "Blob not found");
            return Ok(None);
        }
        Err(e) => return Err(e),
    };
    let url = store.signed_url(blob, &SasWindow::now())?;
    let rendered = metadata::normalize(&properties.metadata, name);

    debug!(blob = %blob, title = %rendered.title, "Signed blob URL issued");

    Ok(Some(DisplayBlob {
        url,
        title: rendered.title,
        metadata: rendered.fields,
    }))
}

/// Resolve a path or blob URL, then fetch metadata and sign a read URL
///
/// # Errors
///
/// `BlobError::InvalidReference` for a reference without container/blob
/// split, and any storage error unchanged (including `NotFound`).
pub async fn resolve_and_sign(
    reference: &str,
    account_url: &str,
    account_key: &str,
) -> Result<SignedBlob> {
    let blob = BlobRef::from_path(reference)?;
    let service = BlobServiceClient::new(account_url, account_key)?;
    sign_blob(&service, &blob).await
}

/// Sign `<prefix>/<name>` in `container` and render its metadata for display
///
/// Returns `Ok(None)` when the blob does not exist; other errors propagate.
pub async fn resolve_and_sign_with_display(
    prefix: &str,
    name: &str,
    container: &str,
    account_url: &str,
    account_key: &str,
) -> Result<Option<DisplayBlob>> {
    let blob = BlobRef::from_parts(prefix, name, container);
    let service = BlobServiceClient::new(account_url, account_key)?;
    sign_blob_with_display(&service, &blob, name).await
}
