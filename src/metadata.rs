use chrono::NaiveDate;
use percent_encoding::percent_decode_str;
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::warn;

use crate::azure::Metadata;

/// Percent-encoded document title
pub const TITLE_KEY: &str = "Titulo";
pub const CODE_KEY: &str = "Codigo";
/// Publication date as `YYYY-MM-DD`
pub const PUBLICATION_DATE_KEY: &str = "DataPublicacao";

/// Metadata name -> display label
pub const DISPLAY_KEYS: &[(&str, &str)] = &[
    ("Codigo", "Código"),
    ("AreaGestora", "Área Gestora"),
    ("DataPublicacao", "Data Publicação"),
    ("Situacao", "Situação"),
];

/// Metadata ready to be shown to a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayMetadata {
    pub title: String,
    pub fields: BTreeMap<String, String>,
}

#[derive(Debug, Error)]
#[error("invalid publication date '{value}': expected YYYY-MM-DD")]
pub(crate) struct DateFormatError {
    value: String,
    #[source]
    source: chrono::ParseError,
}

/// Derive the display title and relabelled fields from raw metadata
///
/// The title comes from `Titulo` (or `fallback_name`), percent-decoded and
/// prefixed with `"<Codigo> - "` when a code is present. `Titulo` itself is
/// left out of the fields. Never fails: a malformed date is logged and kept.
///
/// Metadata names are compared ASCII case-insensitively, as the blob service
/// does; unmapped names pass through as received.
pub fn normalize(metadata: &Metadata, fallback_name: &str) -> DisplayMetadata {
    let raw_title = lookup(metadata, TITLE_KEY).unwrap_or(fallback_name);
    let mut title = percent_decode_str(raw_title).decode_utf8_lossy().into_owned();

    if let Some(code) = lookup(metadata, CODE_KEY).filter(|c| !c.is_empty()) {
        title = format!("{} - {}", code, title);
    }

    let fields = metadata
        .iter()
        .filter(|(key, _)| !key.eq_ignore_ascii_case(TITLE_KEY))
        .map(|(key, value)| {
            let value = if key.eq_ignore_ascii_case(PUBLICATION_DATE_KEY) && !value.is_empty() {
                reformat_date(value).unwrap_or_else(|e| {
                    warn!(error = %e, "Keeping publication date unchanged");
                    value.clone()
                })
            } else {
                value.clone()
            };
            (display_key(key), value)
        })
        .collect();

    DisplayMetadata { title, fields }
}

/// Display label for a metadata name; unknown names pass through
pub fn display_key(key: &str) -> String {
    DISPLAY_KEYS
        .iter()
        .find(|(raw, _)| raw.eq_ignore_ascii_case(key))
        .map(|(_, label)| label.to_string())
        .unwrap_or_else(|| key.to_string())
}

/// `YYYY-MM-DD` -> `DD/MM/YYYY`
fn reformat_date(value: &str) -> Result<String, DateFormatError> {
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|source| DateFormatError {
        value: value.to_string(),
        source,
    })?;
    Ok(date.format("%d/%m/%Y").to_string())
}

fn lookup<'a>(metadata: &'a Metadata, key: &str) -> Option<&'a str> {
    metadata
        .get(key)
        .or_else(|| {
            metadata
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
                .map(|(_, v)| v)
        })
        .map(String::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(pairs: &[(&str, &str)]) -> Metadata {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_title_is_decoded() {
        let display = normalize(&meta(&[("Titulo", "A%20B")]), "x");
        assert_eq!(display.title, "A B");
        assert!(display.fields.is_empty());
    }

    #[test]
    fn test_title_falls_back_to_name() {
        let display = normalize(&meta(&[]), "x");
        assert_eq!(display.title, "x");

        let display = normalize(&meta(&[]), "relat%C3%B3rio.pdf");
        assert_eq!(display.title, "relatório.pdf");
    }

    #[test]
    fn test_title_with_code() {
        let display = normalize(&meta(&[("Titulo", "T"), ("Codigo", "42")]), "x");
        assert_eq!(display.title, "42 - T");
        assert_eq!(display.fields.get("Código"), Some(&"42".to_string()));

        let display = normalize(&meta(&[("Titulo", "T")]), "x");
        assert_eq!(display.title, "T");

        let display = normalize(&meta(&[("Titulo", "T"), ("Codigo", "")]), "x");
        assert_eq!(display.title, "T");
    }

    #[test]
    fn test_title_key_removed() {
        let display = normalize(&meta(&[("Titulo", "T"), ("Foo", "Bar")]), "x");
        assert!(!display.fields.contains_key("Titulo"));
        assert_eq!(display.fields.len(), 1);
    }

    #[test]
    fn test_date_reformat() {
        let display = normalize(&meta(&[("DataPublicacao", "2024-03-07")]), "x");
        assert_eq!(
            display.fields.get("Data Publicação"),
            Some(&"07/03/2024".to_string())
        );
    }

    #[test]
    fn test_invalid_date_is_kept() {
        for bad in ["invalid", "2024-13-01", "07/03/2024", "2024-03"] {
            let display = normalize(&meta(&[("DataPublicacao", bad)]), "x");
            assert_eq!(display.fields.get("Data Publicação"), Some(&bad.to_string()));
        }
    }

    #[test]
    fn test_empty_date_is_kept() {
        let display = normalize(&meta(&[("DataPublicacao", "")]), "x");
        assert_eq!(display.fields.get("Data Publicação"), Some(&String::new()));
    }

    #[test]
    fn test_key_renaming() {
        let display = normalize(
            &meta(&[
                ("Situacao", "Ativo"),
                ("AreaGestora", "TI"),
                ("Foo", "Bar"),
            ]),
            "x",
        );
        assert_eq!(display.fields.get("Situação"), Some(&"Ativo".to_string()));
        assert_eq!(display.fields.get("Área Gestora"), Some(&"TI".to_string()));
        assert_eq!(display.fields.get("Foo"), Some(&"Bar".to_string()));
        assert_eq!(display.fields.len(), 3);
    }

    #[test]
    fn test_lowercase_names_from_transport() {
        let display = normalize(
            &meta(&[
                ("titulo", "Plano%20Anual"),
                ("codigo", "7"),
                ("datapublicacao", "2023-12-01"),
                ("situacao", "Vigente"),
            ]),
            "x",
        );
        assert_eq!(display.title, "7 - Plano Anual");
        assert_eq!(display.fields.get("Código"), Some(&"7".to_string()));
        assert_eq!(
            display.fields.get("Data Publicação"),
            Some(&"01/12/2023".to_string())
        );
        assert_eq!(display.fields.get("Situação"), Some(&"Vigente".to_string()));
        assert!(!display.fields.contains_key("titulo"));
    }

    #[test]
    fn test_input_is_not_mutated() {
        let input = meta(&[("Titulo", "T"), ("Situacao", "Ativo")]);
        let before = input.clone();
        let _ = normalize(&input, "x");
        assert_eq!(input, before);
    }

    #[test]
    fn test_reformat_date_error() {
        let err = reformat_date("2024/03/07").unwrap_err();
        assert!(err.to_string().contains("expected YYYY-MM-DD"));
    }
}
