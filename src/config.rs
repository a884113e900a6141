use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::collections::HashMap;
use std::env;
use std::path::Path;
use std::time::Duration;

/// Azurite's published development account
const DEV_ACCOUNT_URL: &str = "http://127.0.0.1:10000/devstoreaccount1";
const DEV_ACCOUNT_KEY: &str =
    "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";

/// Storage account settings
#[derive(Clone)]
pub struct Config {
    pub account_url: String,
    pub account_key: String,
    pub timeout: Option<Duration>,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("account_url", &self.account_url)
            .field("account_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Config {
    /// Load configuration from environment variables and .env file
    ///
    /// # Errors
    ///
    /// Returns an error if required environment variables are missing or invalid
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok(); // Load .env file if it exists
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from a specific dotenv file
    ///
    /// The file is loaded into the process environment. Variables that are
    /// already set in the environment take precedence over the file.
    pub fn from_env_file(path: &Path) -> Result<Self> {
        dotenv::from_path(path)
            .with_context(|| format!("Failed to load env file: {}", path.display()))?;
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let (account_url, account_key) =
            if let Some(conn_str) = lookup("AZURE_STORAGE_CONNECTION_STRING") {
                Self::parse_connection_string(&conn_str)?
            } else {
                let account_url = lookup("AZURE_STORAGE_ACCOUNT_URL").context(
                    "AZURE_STORAGE_ACCOUNT_URL not found in environment. Please set it in .env file",
                )?;
                let account_key = lookup("AZURE_STORAGE_ACCOUNT_KEY").context(
                    "AZURE_STORAGE_ACCOUNT_KEY not found in environment. Please set it in .env file",
                )?;
                (account_url, account_key)
            };
        Self::validate_account_url(&account_url)?;
        Self::validate_account_key(&account_key)?;

        let timeout = match lookup("AZURE_STORAGE_TIMEOUT_SECS") {
            Some(value) => {
                let secs = value.trim().parse::<u64>().with_context(|| {
                    format!("parsing AZURE_STORAGE_TIMEOUT_SECS value `{}`", value)
                })?;
                Some(Duration::from_secs(secs))
            }
            None => None,
        };

        Ok(Self {
            account_url,
            account_key,
            timeout,
        })
    }

    /// Extract the blob endpoint and account key from a connection string
    ///
    /// Supports `BlobEndpoint=...`, the `AccountName`/`EndpointSuffix`
    /// form, and `UseDevelopmentStorage=true`.
    fn parse_connection_string(conn_str: &str) -> Result<(String, String)> {
        let parts: HashMap<&str, &str> = conn_str
            .split(';')
            .filter_map(|part| part.trim().split_once('='))
            .collect();

        if parts
            .get("UseDevelopmentStorage")
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
        {
            return Ok((DEV_ACCOUNT_URL.to_string(), DEV_ACCOUNT_KEY.to_string()));
        }

        let account_key = parts
            .get("AccountKey")
            .context("AZURE_STORAGE_CONNECTION_STRING has no AccountKey")?
            .to_string();

        let account_url = match parts.get("BlobEndpoint") {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => {
                let account_name = parts
                    .get("AccountName")
                    .context("AZURE_STORAGE_CONNECTION_STRING has neither BlobEndpoint nor AccountName")?;
                let protocol = parts.get("DefaultEndpointsProtocol").unwrap_or(&"https");
                let suffix = parts.get("EndpointSuffix").unwrap_or(&"core.windows.net");
                format!("{}://{}.blob.{}", protocol, account_name, suffix)
            }
        };

        Ok((account_url, account_key))
    }

    /// Validate the blob service endpoint
    fn validate_account_url(account_url: &str) -> Result<()> {
        if account_url.is_empty() {
            anyhow::bail!("AZURE_STORAGE_ACCOUNT_URL cannot be empty");
        }

        let url = url::Url::parse(account_url).with_context(|| {
            format!(
                "AZURE_STORAGE_ACCOUNT_URL '{}' is not a valid URL (e.g., https://myaccount.blob.core.windows.net)",
                account_url
            )
        })?;

        if !matches!(url.scheme(), "https" | "http") {
            anyhow::bail!(
                "AZURE_STORAGE_ACCOUNT_URL '{}' must use https (or http for the local emulator)",
                account_url
            );
        }

        if url.host_str().is_none_or(str::is_empty) {
            anyhow::bail!("AZURE_STORAGE_ACCOUNT_URL '{}' has no host", account_url);
        }

        Ok(())
    }

    /// Validate the account key is non-empty base64
    fn validate_account_key(account_key: &str) -> Result<()> {
        if account_key.trim().is_empty() {
            anyhow::bail!("AZURE_STORAGE_ACCOUNT_KEY cannot be empty");
        }

        STANDARD
            .decode(account_key.trim())
            .context("AZURE_STORAGE_ACCOUNT_KEY is not valid base64")?;

        Ok(())
    }
}
