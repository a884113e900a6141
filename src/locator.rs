use percent_encoding::percent_decode_str;
use serde::Serialize;
use url::Url;

use crate::azure::{BlobError, Result};

/// A blob addressed by container and full blob name
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlobRef {
    pub container: String,
    pub key: String,
}

impl BlobRef {
    /// Resolve a path-like reference
    ///
    /// Accepts a full blob URL (`https://acct.blob.core.windows.net/docs/a%20b.pdf`)
    /// or a bare path (`docs/a%20b.pdf`). The first path segment is the
    /// container; the rest, percent-decoded, is the blob name.
    ///
    /// # Errors
    ///
    /// Returns `BlobError::InvalidReference` when the path has no
    /// container/blob split.
    pub fn from_path(reference: &str) -> Result<Self> {
        let path = match Url::parse(reference) {
            Ok(url) => url.path().to_string(),
            // Relative reference: drop query and fragment like a URL parser would
            Err(_) => reference
                .split(['?', '#'])
                .next()
                .unwrap_or_default()
                .to_string(),
        };

        let mut parts = path.trim_start_matches('/').splitn(2, '/');
        let (container, key) = match (parts.next(), parts.next()) {
            (Some(container), Some(key)) if !container.is_empty() && !key.is_empty() => {
                (container, key)
            }
            _ => {
                return Err(BlobError::InvalidReference {
                    reference: reference.to_string(),
                });
            }
        };

        Ok(Self {
            container: container.to_string(),
            key: percent_decode_str(key).decode_utf8_lossy().into_owned(),
        })
    }

    /// Build a reference from an optional prefix, a blob name and a container
    pub fn from_parts(prefix: &str, name: &str, container: &str) -> Self {
        let key = if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", prefix, name)
        };

        Self {
            container: container.to_string(),
            key,
        }
    }
}

impl std::fmt::Display for BlobRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.container, self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_path_bare() {
        let blob = BlobRef::from_path("docs/2024/report.pdf").unwrap();
        assert_eq!(blob.container, "docs");
        assert_eq!(blob.key, "2024/report.pdf");
    }

    #[test]
    fn test_from_path_decodes_key_only() {
        let blob = BlobRef::from_path("my%20docs/a%20b%2Fc.pdf").unwrap();
        assert_eq!(blob.container, "my%20docs");
        assert_eq!(blob.key, "a b/c.pdf");
    }

    #[test]
    fn test_from_path_full_url() {
        let blob = BlobRef::from_path(
            "https://acct.blob.core.windows.net/docs/Relat%C3%B3rio%20Anual.pdf?sv=x&sig=y",
        )
        .unwrap();
        assert_eq!(blob.container, "docs");
        assert_eq!(blob.key, "Relatório Anual.pdf");
    }

    #[test]
    fn test_from_path_leading_slashes() {
        let blob = BlobRef::from_path("//docs/a.pdf").unwrap();
        assert_eq!(blob.container, "docs");
        assert_eq!(blob.key, "a.pdf");
    }

    #[test]
    fn test_from_path_drops_query_on_relative() {
        let blob = BlobRef::from_path("docs/a.pdf?x=1#frag").unwrap();
        assert_eq!(blob.key, "a.pdf");
    }

    #[test]
    fn test_from_path_without_blob_segment() {
        for reference in ["docs", "/docs", "", "docs/", "https://acct.blob.core.windows.net/docs"] {
            let err = BlobRef::from_path(reference).unwrap_err();
            assert!(
                matches!(err, BlobError::InvalidReference { .. }),
                "expected InvalidReference for {reference:?}"
            );
        }
    }

    #[test]
    fn test_from_parts_with_prefix() {
        let blob = BlobRef::from_parts("p", "n", "c");
        assert_eq!(blob.key, "p/n");
        assert_eq!(blob.container, "c");
    }

    #[test]
    fn test_from_parts_without_prefix() {
        let blob = BlobRef::from_parts("", "n", "c");
        assert_eq!(blob.key, "n");
        assert_eq!(blob.to_string(), "c/n");
    }
}
