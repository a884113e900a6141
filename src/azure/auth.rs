use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::error::{BlobError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Storage account name and decoded account key
#[derive(Clone)]
pub struct StorageCredential {
    account_name: String,
    account_key: Vec<u8>,
}

impl std::fmt::Debug for StorageCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageCredential")
            .field("account_name", &self.account_name)
            .field("account_key", &"<redacted>")
            .finish()
    }
}

impl StorageCredential {
    /// Build a credential from the base64 account key shown in the portal
    pub fn new(account_name: impl Into<String>, account_key: &str) -> Result<Self> {
        let account_key = STANDARD.decode(account_key.trim())?;
        Ok(Self {
            account_name: account_name.into(),
            account_key,
        })
    }

    pub fn account_name(&self) -> &str {
        &self.account_name
    }

    pub fn account_key(&self) -> &[u8] {
        &self.account_key
    }

    /// HMAC-SHA256 over `string_to_sign`, base64 encoded
    pub fn sign(&self, string_to_sign: &str) -> Result<String> {
        let mut mac = HmacSha256::new_from_slice(&self.account_key)
            .map_err(|e| BlobError::Signing(e.to_string()))?;
        mac.update(string_to_sign.as_bytes());
        Ok(STANDARD.encode(mac.finalize().into_bytes()))
    }

    /// Authorization header value for a body-less request (HEAD/GET/DELETE)
    ///
    /// `ms_headers` are the `x-ms-*` headers sent with the request and
    /// `url_path` is the percent-encoded path of the request URL.
    pub fn shared_key_authorization(
        &self,
        method: &str,
        ms_headers: &[(&str, &str)],
        url_path: &str,
    ) -> Result<String> {
        let string_to_sign = shared_key_string_to_sign(method, ms_headers, &self.account_name, url_path);
        let signature = self.sign(&string_to_sign)?;
        Ok(format!("SharedKey {}:{}", self.account_name, signature))
    }
}

/// Shared Key string-to-sign for a request without body or conditional headers
///
/// Layout: verb, eleven standard header slots (all empty here), the sorted
/// `x-ms-*` headers, then `/<account><url path>`.
fn shared_key_string_to_sign(
    method: &str,
    ms_headers: &[(&str, &str)],
    account_name: &str,
    url_path: &str,
) -> String {
    let mut headers: Vec<(String, &str)> = ms_headers
        .iter()
        .map(|(k, v)| (k.to_lowercase(), v.trim()))
        .filter(|(k, _)| k.starts_with("x-ms-"))
        .collect();
    headers.sort_by(|a, b| a.0.cmp(&b.0));

    let mut out = String::with_capacity(256);
    out.push_str(method);
    out.push('\n');
    out.push_str(&"\n".repeat(11));
    for (k, v) in &headers {
        out.push_str(k);
        out.push(':');
        out.push_str(v);
        out.push('\n');
    }
    out.push('/');
    out.push_str(account_name);
    out.push_str(url_path);
    out
}
