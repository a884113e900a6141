use chrono::{DateTime, Duration, SubsecRound, Utc};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use tracing::debug;

use super::auth::StorageCredential;
use super::error::Result;

/// Service version the SAS string-to-sign layout follows
pub const SAS_VERSION: &str = "2021-08-06";

/// Lifetime of every issued token
pub const SAS_VALIDITY_HOURS: i64 = 1;

const SIGNED_RESOURCE_BLOB: &str = "b";
const SIGNED_PERMISSION_READ: &str = "r";
const SIGNED_PROTOCOL_HTTPS: &str = "https";
const SAS_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Unreserved characters stay as-is in query values
const QUERY_VALUE_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Validity window of a token, in whole UTC seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SasWindow {
    pub start: DateTime<Utc>,
    pub expiry: DateTime<Utc>,
}

impl SasWindow {
    /// Window opening now and closing one hour later
    pub fn now() -> Self {
        Self::starting_at(Utc::now())
    }

    pub fn starting_at(start: DateTime<Utc>) -> Self {
        // SAS timestamps have second precision
        let start = start.trunc_subsecs(0);
        Self {
            start,
            expiry: start + Duration::hours(SAS_VALIDITY_HOURS),
        }
    }
}

/// Generate a read-only, https-only service SAS for a single blob
///
/// # Arguments
///
/// * `credential` - Account name and key used to sign
/// * `container` - Container name
/// * `blob` - Blob name, not percent-encoded
/// * `window` - Start and expiry of the token
///
/// # Returns
///
/// The query string (without leading `?`) to append to the blob URL
pub fn generate_blob_sas(
    credential: &StorageCredential,
    container: &str,
    blob: &str,
    window: &SasWindow,
) -> Result<String> {
    let signed_start = window.start.format(SAS_TIME_FORMAT).to_string();
    let signed_expiry = window.expiry.format(SAS_TIME_FORMAT).to_string();

    let canonicalized_resource = format!(
        "/blob/{}/{}/{}",
        credential.account_name(),
        container,
        blob
    );
    let string_to_sign = sas_string_to_sign(&canonicalized_resource, &signed_start, &signed_expiry);
    let signature = credential.sign(&string_to_sign)?;

    debug!(
        container = %container,
        blob = %blob,
        start = %signed_start,
        expiry = %signed_expiry,
        "Generated blob SAS"
    );

    Ok(format!(
        "sv={}&st={}&se={}&sr={}&sp={}&spr={}&sig={}",
        encode(SAS_VERSION),
        encode(&signed_start),
        encode(&signed_expiry),
        SIGNED_RESOURCE_BLOB,
        SIGNED_PERMISSION_READ,
        SIGNED_PROTOCOL_HTTPS,
        encode(&signature),
    ))
}

/// String-to-sign for a blob service SAS, version 2020-12-06 and later
///
/// Field order: permissions, start, expiry, canonicalized resource, identifier,
/// IP, protocol, version, resource, snapshot time, encryption scope, then the
/// five response header overrides. Unused fields stay empty.
fn sas_string_to_sign(canonicalized_resource: &str, signed_start: &str, signed_expiry: &str) -> String {
    [
        SIGNED_PERMISSION_READ,
        signed_start,
        signed_expiry,
        canonicalized_resource,
        "", // signedIdentifier
        "", // signedIP
        SIGNED_PROTOCOL_HTTPS,
        SAS_VERSION,
        SIGNED_RESOURCE_BLOB,
        "", // signedSnapshotTime
        "", // signedEncryptionScope
        "", // rscc
        "", // rscd
        "", // rsce
        "", // rscl
        "", // rsct
    ]
    .join("\n")
}

fn encode(value: &str) -> String {
    utf8_percent_encode(value, QUERY_VALUE_ENCODE_SET).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const TEST_KEY: &str =
        "dGVzdGtleXRlc3RrZXl0ZXN0a2V5dGVzdGtleXRlc3RrZXl0ZXN0a2V5dGVzdGtleXRlc3RrZXk=";

    fn fixed_window() -> SasWindow {
        SasWindow::starting_at(Utc.with_ymd_and_hms(2024, 3, 7, 12, 30, 0).unwrap())
    }

    fn query_param<'a>(token: &'a str, name: &str) -> Option<&'a str> {
        token
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v)
    }

    #[test]
    fn test_window_is_exactly_one_hour() {
        let window = SasWindow::now();
        assert_eq!(window.expiry - window.start, Duration::hours(1));
        assert_eq!(window.start.timestamp_subsec_nanos(), 0);
    }

    #[test]
    fn test_window_truncates_subseconds() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::milliseconds(750);
        let window = SasWindow::starting_at(start);
        assert_eq!(window.start, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(window.expiry, Utc.with_ymd_and_hms(2024, 1, 1, 1, 0, 0).unwrap());
    }

    #[test]
    fn test_string_to_sign_layout() {
        let s = sas_string_to_sign("/blob/acct/docs/a b.pdf", "2024-03-07T12:30:00Z", "2024-03-07T13:30:00Z");
        let fields: Vec<&str> = s.split('\n').collect();
        assert_eq!(fields.len(), 16);
        assert_eq!(fields[0], "r");
        assert_eq!(fields[1], "2024-03-07T12:30:00Z");
        assert_eq!(fields[2], "2024-03-07T13:30:00Z");
        assert_eq!(fields[3], "/blob/acct/docs/a b.pdf");
        assert_eq!(fields[6], "https");
        assert_eq!(fields[7], SAS_VERSION);
        assert_eq!(fields[8], "b");
        assert!(fields[9..].iter().all(|f| f.is_empty()));
    }

    #[test]
    fn test_token_contains_required_params() {
        let cred = StorageCredential::new("acct", TEST_KEY).unwrap();
        let token = generate_blob_sas(&cred, "docs", "dir/a b.pdf", &fixed_window()).unwrap();

        assert_eq!(query_param(&token, "sv"), Some(SAS_VERSION));
        assert_eq!(query_param(&token, "st"), Some("2024-03-07T12%3A30%3A00Z"));
        assert_eq!(query_param(&token, "se"), Some("2024-03-07T13%3A30%3A00Z"));
        assert_eq!(query_param(&token, "sr"), Some("b"));
        assert_eq!(query_param(&token, "sp"), Some("r"));
        assert_eq!(query_param(&token, "spr"), Some("https"));
        let sig = query_param(&token, "sig").unwrap();
        assert!(!sig.contains('+') && !sig.contains('/') && !sig.contains('='));
    }

    #[test]
    fn test_token_is_scoped_to_blob() {
        let cred = StorageCredential::new("acct", TEST_KEY).unwrap();
        let window = fixed_window();
        let a = generate_blob_sas(&cred, "docs", "a.pdf", &window).unwrap();
        let b = generate_blob_sas(&cred, "docs", "b.pdf", &window).unwrap();
        let c = generate_blob_sas(&cred, "other", "a.pdf", &window).unwrap();
        assert_ne!(query_param(&a, "sig"), query_param(&b, "sig"));
        assert_ne!(query_param(&a, "sig"), query_param(&c, "sig"));
    }

    #[test]
    fn test_token_is_deterministic_for_window() {
        let cred = StorageCredential::new("acct", TEST_KEY).unwrap();
        let window = fixed_window();
        let a = generate_blob_sas(&cred, "docs", "a.pdf", &window).unwrap();
        let b = generate_blob_sas(&cred, "docs", "a.pdf", &window).unwrap();
        assert_eq!(a, b);
    }
}
