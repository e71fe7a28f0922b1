//! Validation of custom message headers.
//!
//! Values are kept as plain text. lettre applies RFC 2047 encoding when the
//! message is formatted.

use crate::error::HeaderEncodingError;
use crate::models::{Batch, MessageHeader};
use lettre::message::header::{HeaderName, HeaderValue};
use regex::Regex;
use std::collections::BTreeMap;

/// Headers the outbound message writes itself. Attributes never override them.
const RESERVED_HEADERS: &[&str] = &[
    "Bcc",
    "Cc",
    "Content-Transfer-Encoding",
    "Content-Type",
    "Date",
    "From",
    "Message-ID",
    "MIME-Version",
    "Reply-To",
    "Sender",
    "Subject",
    "To",
    "X-Mailer",
];

#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderEncoder;

impl HeaderEncoder {
    /// Check `name` and `value` and build a header from them.
    pub fn header(name: &str, value: &str) -> Result<MessageHeader, HeaderEncodingError> {
        header_name(name)?;
        if value.chars().any(|c| c.is_control() && c != '\t') {
            return Err(HeaderEncodingError::ControlCharacter {
                name: name.to_string(),
            });
        }
        Ok(MessageHeader::new(name, value))
    }

    /// Like [`header`](Self::header), also rejecting reserved names.
    pub fn attribute_header(name: &str, value: &str) -> Result<MessageHeader, HeaderEncodingError> {
        if Self::is_reserved(name) {
            return Err(HeaderEncodingError::Reserved(name.to_string()));
        }
        Self::header(name, value)
    }

    /// Whether the message sets `name` itself. Case-insensitive.
    pub fn is_reserved(name: &str) -> bool {
        RESERVED_HEADERS
            .iter()
            .any(|reserved| reserved.eq_ignore_ascii_case(name.trim()))
    }

    /// Convert to a lettre header value, encoding non-ASCII text.
    pub fn to_lettre(header: &MessageHeader) -> Result<HeaderValue, HeaderEncodingError> {
        Ok(HeaderValue::new(header_name(&header.name)?, header.value.clone()))
    }

    /// Attributes selected by `pattern` across the batch, by name.
    ///
    /// When several records carry the same attribute the last one in batch
    /// order wins. The result is sorted by attribute name.
    pub fn matching_attributes<'a>(batch: &'a Batch, pattern: &Regex) -> BTreeMap<&'a str, &'a str> {
        let mut selected = BTreeMap::new();
        for record in batch.records() {
            for (name, value) in record.attributes() {
                if pattern.is_match(name) {
                    selected.insert(name.as_str(), value.as_str());
                }
            }
        }
        selected
    }
}

/// Field names are printable ASCII without `:` (RFC 5322).
fn header_name(name: &str) -> Result<HeaderName, HeaderEncodingError> {
    if name.is_empty() || !name.bytes().all(|b| (33..=126).contains(&b) && b != b':') {
        return Err(HeaderEncodingError::InvalidName(name.to_string()));
    }
    HeaderName::new_from_ascii(name.to_string())
        .map_err(|_| HeaderEncodingError::InvalidName(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Record;

    #[test]
    fn test_values_are_kept_verbatim() {
        let header = HeaderEncoder::header("X-Mailer", "TestingNiFi").unwrap();
        assert_eq!(header, MessageHeader::new("X-Mailer", "TestingNiFi"));

        let header = HeaderEncoder::header("X-Mailer", "Größe\t(batch)").unwrap();
        assert_eq!(header.value, "Größe\t(batch)");
    }

    #[test]
    fn test_control_characters_are_rejected() {
        let err = HeaderEncoder::header("X-Mailer", "NiFi\r\nBcc: victim@example.com").unwrap_err();
        assert_eq!(
            err,
            HeaderEncodingError::ControlCharacter {
                name: "X-Mailer".to_string()
            }
        );
    }

    #[test]
    fn test_invalid_names_are_rejected() {
        for name in ["", "X Mailer", "X:Mailer", "Zähler"] {
            assert!(matches!(
                HeaderEncoder::header(name, "value"),
                Err(HeaderEncodingError::InvalidName(_))
            ));
        }
    }

    #[test]
    fn test_attribute_headers_cannot_shadow_message_headers() {
        for name in ["Subject", "subject", "From", "BCC", "content-type", "X-Mailer"] {
            assert_eq!(
                HeaderEncoder::attribute_header(name, "x"),
                Err(HeaderEncodingError::Reserved(name.to_string()))
            );
        }
        assert!(HeaderEncoder::attribute_header("X-Trace", "x").is_ok());
    }

    #[test]
    fn test_to_lettre_checks_name() {
        assert!(HeaderEncoder::to_lettre(&MessageHeader::new("X-Trace", "abc")).is_ok());
        assert!(matches!(
            HeaderEncoder::to_lettre(&MessageHeader::new("X Trace", "abc")),
            Err(HeaderEncodingError::InvalidName(_))
        ));
    }

    #[test]
    fn test_matching_attributes_last_record_wins() {
        let batch = Batch::new(vec![
            Record::new(1)
                .with_attribute("x-trace", "first")
                .with_attribute("filename", "a.csv"),
            Record::new(2)
                .with_attribute("x-trace", "second")
                .with_attribute("x-origin", "edge"),
        ])
        .unwrap();
        let pattern = Regex::new("^x-").unwrap();

        let selected = HeaderEncoder::matching_attributes(&batch, &pattern);
        let pairs: Vec<(&str, &str)> = selected.into_iter().collect();
        assert_eq!(pairs, vec![("x-origin", "edge"), ("x-trace", "second")]);
    }
}
