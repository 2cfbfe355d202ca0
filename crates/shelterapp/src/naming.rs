//! # Naming Scheme
//!
//! Canonical identifiers for resident folders and stored files. Every path a
//! document can live under is built here, so the migration engine, the cleanup
//! engine and sync all agree on where things are.
//!
//! A resident folder is `{badge}_{name}` where the name has been stripped of
//! diacritics and punctuation and its whitespace collapsed to underscores:
//!
//! ```text
//! badge "24191", name "Jöhn O'Doe"  →  24191_John_ODoe
//! ```
//!
//! Documents are organized per lifecycle phase as
//! `{TYPE}/{badge}_{name}/{sanitized_file_name}`.

use chrono::NaiveDate;
use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

use crate::model::{DocumentType, ResidentInfo};

/// Result of [`parse_resident_folder_name`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFolder {
    pub badge: String,
    pub name: String,
}

fn strip_diacritics(input: &str) -> String {
    input.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

fn sanitize_name(name: &str) -> String {
    let stripped = strip_diacritics(name);
    let kept: String = stripped
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace())
        .collect();
    kept.split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .trim_matches('_')
        .to_string()
}

/// Folder name for a resident: `{badge}_{sanitized name}`.
///
/// Total and deterministic. An empty name yields `"{badge}_"`.
pub fn resident_folder_name(resident: &ResidentInfo) -> String {
    format!("{}_{}", resident.badge, sanitize_name(&resident.name))
}

/// Storage-safe file name. Keeps alphanumerics plus `.`, `_` and `-`; any
/// other character becomes `_`.
pub fn sanitize_file_name(name: &str) -> String {
    strip_diacritics(name)
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Prefix of a resident's folder inside a container: `{TYPE}/{folder}`.
pub fn folder_prefix(resident: &ResidentInfo, document_type: DocumentType) -> String {
    format!("{}/{}", document_type, resident_folder_name(resident))
}

/// The single canonical path of a stored document.
pub fn organized_path(
    resident: &ResidentInfo,
    file_name: &str,
    document_type: DocumentType,
) -> String {
    format!(
        "{}/{}",
        folder_prefix(resident, document_type),
        sanitize_file_name(file_name)
    )
}

/// Split a folder name back into badge and name. The badge is everything
/// before the first underscore.
pub fn parse_resident_folder_name(folder: &str) -> Option<ParsedFolder> {
    let (badge, name) = folder.split_once('_')?;
    Some(ParsedFolder {
        badge: badge.to_string(),
        name: name.to_string(),
    })
}

/// `^[0-9A-Za-z]+_[A-Za-z0-9_]+$`
pub fn is_valid_resident_folder_name(folder: &str) -> bool {
    let Some((badge, rest)) = folder.split_once('_') else {
        return false;
    };
    !badge.is_empty()
        && badge.chars().all(|c| c.is_ascii_alphanumeric())
        && !rest.is_empty()
        && rest.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Annotate a carried-over description with the folder it moved into.
pub fn document_description(
    original: Option<&str>,
    resident: &ResidentInfo,
    transferred_on: NaiveDate,
) -> String {
    let folder = resident_folder_name(resident);
    let date = transferred_on.format("%Y-%m-%d");
    match original.map(str::trim).filter(|s| !s.is_empty()) {
        Some(orig) => format!("{} (Resident: {}, Transferred: {})", orig, folder, date),
        None => format!("Document for resident {} (Transferred: {})", folder, date),
    }
}

/// Lower-case extension without the dot, or empty.
pub fn file_extension(name: &str) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => ext.to_ascii_lowercase(),
        _ => String::new(),
    }
}

/// `scan.pdf` numbered `2` is `scan_2.pdf`; `README` becomes `README_2`.
pub fn numbered_file_name(name: &str, n: usize) -> String {
    let ext_len = file_extension(name).len();
    if ext_len == 0 {
        return format!("{}_{}", name, n);
    }
    let (stem, ext) = name.split_at(name.len() - ext_len - 1);
    format!("{}_{}{}", stem, n, ext)
}

/// Recover the in-container path from a public locator.
///
/// `https://host/public/{container}/IN/x/a.pdf` gives `IN/x/a.pdf`. Locators
/// that do not mention the container fall back to their last segment.
pub fn storage_path_from_locator(locator: &str, container: &str) -> String {
    let marker = format!("/{}/", container);
    if let Some(idx) = locator.find(&marker) {
        return locator[idx + marker.len()..].to_string();
    }
    match locator.rsplit_once('/') {
        Some((_, last)) if !last.is_empty() => last.to_string(),
        _ => locator.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn john() -> ResidentInfo {
        ResidentInfo::new("24191", "Jöhn O'Doe")
    }

    #[test]
    fn test_folder_name_strips_diacritics_and_punctuation() {
        assert_eq!(resident_folder_name(&john()), "24191_John_ODoe");
    }

    #[test]
    fn test_folder_name_collapses_whitespace() {
        let r = ResidentInfo::new("7", "  Ana   María \t López ");
        assert_eq!(resident_folder_name(&r), "7_Ana_Maria_Lopez");
    }

    #[test]
    fn test_folder_name_empty_name() {
        let r = ResidentInfo::new("55", "");
        assert_eq!(resident_folder_name(&r), "55_");
        let r = ResidentInfo::new("55", "'' --");
        assert_eq!(resident_folder_name(&r), "55_");
    }

    #[test]
    fn test_folder_name_round_trips_badge() {
        let folder = resident_folder_name(&john());
        let parsed = parse_resident_folder_name(&folder).unwrap();
        assert_eq!(parsed.badge, "24191");
        assert_eq!(parsed.name, "John_ODoe");
        assert!(is_valid_resident_folder_name(&folder));
    }

    #[test]
    fn test_parse_without_underscore() {
        assert_eq!(parse_resident_folder_name("24191"), None);
    }

    #[test]
    fn test_is_valid_folder_name() {
        assert!(is_valid_resident_folder_name("1_A"));
        assert!(is_valid_resident_folder_name("A1_b_c_3"));
        assert!(!is_valid_resident_folder_name("_A"));
        assert!(!is_valid_resident_folder_name("1_"));
        assert!(!is_valid_resident_folder_name("1-2_A"));
        assert!(!is_valid_resident_folder_name("1_A B"));
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("passport scan.pdf"), "passport_scan.pdf");
        assert_eq!(sanitize_file_name("a-b_c.PDF"), "a-b_c.PDF");
        assert_eq!(sanitize_file_name("résumé (1).docx"), "resume__1_.docx");
    }

    #[test]
    fn test_organized_path() {
        assert_eq!(
            organized_path(&john(), "id card.pdf", DocumentType::Out),
            "OUT/24191_John_ODoe/id_card.pdf"
        );
        assert_eq!(
            folder_prefix(&john(), DocumentType::In),
            "IN/24191_John_ODoe"
        );
    }

    #[test]
    fn test_document_description() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(
            document_description(Some("Passport"), &john(), date),
            "Passport (Resident: 24191_John_ODoe, Transferred: 2024-03-09)"
        );
        assert_eq!(
            document_description(Some("  "), &john(), date),
            "Document for resident 24191_John_ODoe (Transferred: 2024-03-09)"
        );
    }

    #[test]
    fn test_file_extension() {
        assert_eq!(file_extension("scan.PDF"), "pdf");
        assert_eq!(file_extension("archive.tar.gz"), "gz");
        assert_eq!(file_extension("README"), "");
        assert_eq!(file_extension(".hidden"), "");
    }

    #[test]
    fn test_numbered_file_name() {
        assert_eq!(numbered_file_name("id_card.pdf", 2), "id_card_2.pdf");
        assert_eq!(numbered_file_name("scan.PDF", 3), "scan_3.PDF");
        assert_eq!(numbered_file_name("archive.tar.gz", 2), "archive.tar_2.gz");
        assert_eq!(numbered_file_name("README", 2), "README_2");
        assert_eq!(numbered_file_name(".hidden", 2), ".hidden_2");
    }

    #[test]
    fn test_storage_path_from_locator() {
        let loc = "https://files.example.org/storage/v1/object/public/administrative-documents/IN/24191_John/a.pdf";
        assert_eq!(
            storage_path_from_locator(loc, "administrative-documents"),
            "IN/24191_John/a.pdf"
        );
        assert_eq!(
            storage_path_from_locator("https://elsewhere/x/y/b.pdf", "administrative-documents"),
            "b.pdf"
        );
        assert_eq!(storage_path_from_locator("c.pdf", "bucket"), "c.pdf");
    }

    #[test]
    fn test_out_container_marker_does_not_match_in_container() {
        let loc = "file:///data/administrative-documents-out/OUT/1_A/a.pdf";
        assert_eq!(
            storage_path_from_locator(loc, "administrative-documents-out"),
            "OUT/1_A/a.pdf"
        );
        // "/administrative-documents/" is not a substring of the OUT locator.
        assert_eq!(
            storage_path_from_locator(loc, "administrative-documents"),
            "a.pdf"
        );
    }
}
