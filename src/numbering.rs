// 🔢 Document Numbering - Per-entity sequences
//
// Numbers look like "INV-00042". Each business entity keeps its own
// sequences, so the caller passes only that entity's existing numbers.

use crate::line_items::DocumentKind;
use thiserror::Error;

const SEQUENCE_WIDTH: usize = 5;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NumberingError {
    #[error("{prefix} sequence is exhausted: {highest} is the largest number available")]
    SequenceExhausted { prefix: &'static str, highest: u64 },
}

impl DocumentKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            DocumentKind::Estimate => "EST",
            DocumentKind::Invoice => "INV",
            DocumentKind::PurchaseOrder => "PO",
        }
    }
}

/// Numeric suffix of `number` if it carries `kind`'s prefix
pub fn parse_sequence(kind: DocumentKind, number: &str) -> Option<u64> {
    let rest = number.trim().strip_prefix(kind.prefix())?;
    let digits = rest.strip_prefix('-').unwrap_or(rest);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

pub fn format_number(kind: DocumentKind, sequence: u64) -> String {
    format!("{}-{:0width$}", kind.prefix(), sequence, width = SEQUENCE_WIDTH)
}

/// Next number after the highest existing one (gaps are not refilled)
pub fn next_document_number<S: AsRef<str>>(
    kind: DocumentKind,
    existing: &[S],
) -> Result<String, NumberingError> {
    let highest = existing
        .iter()
        .filter_map(|n| parse_sequence(kind, n.as_ref()))
        .max()
        .unwrap_or(0);
    let next = highest
        .checked_add(1)
        .ok_or(NumberingError::SequenceExhausted {
            prefix: kind.prefix(),
            highest,
        })?;
    Ok(format_number(kind, next))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_number() {
        let none: [&str; 0] = [];
        assert_eq!(next_document_number(DocumentKind::Invoice, &none).unwrap(), "INV-00001");
    }

    #[test]
    fn test_next_after_highest_with_gaps() {
        let existing = ["INV-00001", "INV-00007", "INV-00003"];
        assert_eq!(next_document_number(DocumentKind::Invoice, &existing).unwrap(), "INV-00008");
    }

    #[test]
    fn test_other_prefixes_and_junk_ignored() {
        let existing = ["EST-00040", "PO-00002", "INV-draft", "INV-", "legacy 12"];
        assert_eq!(next_document_number(DocumentKind::Invoice, &existing).unwrap(), "INV-00001");
        assert_eq!(next_document_number(DocumentKind::Estimate, &existing).unwrap(), "EST-00041");
        assert_eq!(next_document_number(DocumentKind::PurchaseOrder, &existing).unwrap(), "PO-00003");
    }

    #[test]
    fn test_parse_sequence_accepts_unpadded_and_wide() {
        assert_eq!(parse_sequence(DocumentKind::Invoice, "INV12"), Some(12));
        assert_eq!(parse_sequence(DocumentKind::Invoice, "INV-123456"), Some(123456));
        assert_eq!(
            next_document_number(DocumentKind::Invoice, &["INV-123456".to_string()]).unwrap(),
            "INV-123457"
        );
    }

    #[test]
    fn test_exhausted_sequence_is_an_error() {
        let existing = ["INV-00003", "INV-18446744073709551615"];

        let err = next_document_number(DocumentKind::Invoice, &existing).unwrap_err();
        assert_eq!(
            err,
            NumberingError::SequenceExhausted {
                prefix: "INV",
                highest: u64::MAX,
            }
        );
        assert!(err.to_string().contains("INV sequence is exhausted"));

        // Too large for u64 at all: not a sequence number
        assert_eq!(parse_sequence(DocumentKind::Invoice, "INV-99999999999999999999"), None);
        assert_eq!(
            next_document_number(DocumentKind::Estimate, &existing).unwrap(),
            "EST-00001"
        );
    }
}
