use chrono::Utc;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::time::Duration;
use tracing::debug;
use url::{Host, Url};

use super::auth::StorageCredential;
use super::error::{BlobError, Result};
use super::properties::BlobProperties;
use super::sas::{generate_blob_sas, SasWindow};

/// REST API version sent on every request
pub const API_VERSION: &str = "2021-08-06";

/// Blob names keep unreserved characters and '/' unencoded in URLs
const BLOB_PATH_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'/');

/// Connection to one storage account's blob endpoint
pub struct BlobServiceClient {
    http: reqwest::Client,
    /// Endpoint without trailing slash, e.g. `https://acct.blob.core.windows.net`
    base_url: String,
    /// Path part of the endpoint (non-empty only for path-style endpoints)
    base_path: String,
    credential: StorageCredential,
}

impl BlobServiceClient {
    /// Connect to `account_url` with a base64 account key
    pub fn new(account_url: &str, account_key: &str) -> Result<Self> {
        Self::with_timeout(account_url, account_key, None)
    }

    pub fn with_timeout(
        account_url: &str,
        account_key: &str,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let endpoint = AccountEndpoint::parse(account_url)?;
        let credential = StorageCredential::new(endpoint.account_name.clone(), account_key)?;

        let mut builder = reqwest::Client::builder().use_rustls_tls();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;

        debug!(
            account = %endpoint.account_name,
            endpoint = %endpoint.base_url,
            "Blob service client created"
        );

        Ok(Self {
            http,
            base_url: endpoint.base_url,
            base_path: endpoint.base_path,
            credential,
        })
    }

    pub fn account_name(&self) -> &str {
        self.credential.account_name()
    }

    pub fn url(&self) -> &str {
        &self.base_url
    }

    /// Handle on a single blob; no request is made
    pub fn blob_client(&self, container: &str, blob: &str) -> BlobClient {
        let encoded = utf8_percent_encode(blob, BLOB_PATH_ENCODE_SET).to_string();
        let url_path = format!("{}/{}/{}", self.base_path, container, encoded);
        let origin_len = self.base_url.len() - self.base_path.len();
        let url = format!("{}{}", &self.base_url[..origin_len], url_path);

        BlobClient {
            http: self.http.clone(),
            credential: self.credential.clone(),
            container: container.to_string(),
            blob: blob.to_string(),
            url,
            url_path,
        }
    }
}

/// Handle on one blob in a container
pub struct BlobClient {
    http: reqwest::Client,
    credential: StorageCredential,
    container: String,
    blob: String,
    url: String,
    url_path: String,
}

impl BlobClient {
    /// Blob URL without any query string
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn account_name(&self) -> &str {
        self.credential.account_name()
    }

    pub fn container_name(&self) -> &str {
        &self.container
    }

    pub fn blob_name(&self) -> &str {
        &self.blob
    }

    pub fn credential(&self) -> &StorageCredential {
        &self.credential
    }

    /// HTTP clients collapse `.` and `..` segments, so the path that is
    /// sent would differ from the one that was signed
    fn check_name(&self) -> Result<()> {
        if self.blob.split('/').any(|segment| segment == "." || segment == "..") {
            return Err(BlobError::InvalidBlobName {
                key: self.blob.clone(),
            });
        }
        Ok(())
    }

    /// Fetch system properties and user metadata (Get Blob Properties)
    pub async fn get_properties(&self) -> Result<BlobProperties> {
        self.check_name()?;
        let date = Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        let authorization = self.credential.shared_key_authorization(
            "HEAD",
            &[("x-ms-date", date.as_str()), ("x-ms-version", API_VERSION)],
            &self.url_path,
        )?;

        debug!(container = %self.container, blob = %self.blob, "Fetching blob properties");

        let response = self
            .http
            .head(&self.url)
            .header("x-ms-date", &date)
            .header("x-ms-version", API_VERSION)
            .header("Authorization", authorization)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let code = response
                .headers()
                .get("x-ms-error-code")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default();
            return Err(BlobError::from_status(status, code, &self.container, &self.blob));
        }

        Ok(BlobProperties::from_headers(response.headers()))
    }

    /// Blob URL with a fresh read-only SAS for `window` appended
    pub fn generate_sas_url(&self, window: &SasWindow) -> Result<String> {
        self.check_name()?;
        let token = generate_blob_sas(&self.credential, &self.container, &self.blob, window)?;
        Ok(format!("{}?{}", self.url, token))
    }
}

/// Parsed account URL
#[derive(Debug, PartialEq)]
struct AccountEndpoint {
    account_name: String,
    base_url: String,
    base_path: String,
}

impl AccountEndpoint {
    /// Accepts host-style (`https://<account>.blob.core.windows.net`) and
    /// path-style (`http://127.0.0.1:10000/<account>`) endpoints
    fn parse(account_url: &str) -> Result<Self> {
        let invalid = |reason: &str| BlobError::InvalidAccountUrl {
            url: account_url.to_string(),
            reason: reason.to_string(),
        };

        let url = Url::parse(account_url.trim()).map_err(|e| invalid(&e.to_string()))?;
        if !matches!(url.scheme(), "https" | "http") {
            return Err(invalid("scheme must be https or http"));
        }
        let host = url.host().ok_or_else(|| invalid("missing host"))?;

        let path = url.path().trim_matches('/');
        let path_style = match &host {
            Host::Ipv4(_) | Host::Ipv6(_) => true,
            Host::Domain(d) => d.eq_ignore_ascii_case("localhost"),
        };

        let account_name = if path_style {
            path.split('/').next().unwrap_or_default()
        } else {
            url.host_str().and_then(|h| h.split('.').next()).unwrap_or_default()
        };
        if account_name.is_empty() {
            return Err(invalid("cannot determine the storage account name"));
        }

        let base_path = if path_style {
            format!("/{}", account_name)
        } else {
            String::new()
        };
        let authority = match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };
        let base_url = format!("{}://{}{}", url.scheme(), authority, base_path);

        Ok(Self {
            account_name: account_name.to_string(),
            base_url,
            base_path,
        })
    }
}
