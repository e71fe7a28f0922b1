//! Data models for the mail dispatch domain.

use chrono::{DateTime, Utc};
use lettre::message::Mailbox;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

// ============================================================================
// Pipeline Records
// ============================================================================

/// A unit of input data handed over by the upstream pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Record identifier, used in log lines.
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    /// Attribute name to value.
    #[serde(default)]
    pub attributes: HashMap<String, String>,
    /// Content size in bytes.
    #[serde(default)]
    pub size: u64,
    /// When the record entered the pipeline.
    #[serde(default = "Utc::now")]
    pub entry_date: DateTime<Utc>,
}

impl Record {
    /// Create a record with no attributes that arrived now.
    pub fn new(size: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            attributes: HashMap::new(),
            size,
            entry_date: Utc::now(),
        }
    }

    /// Builder method to add an attribute.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Builder method to set the arrival time.
    pub fn with_entry_date(mut self, entry_date: DateTime<Utc>) -> Self {
        self.entry_date = entry_date;
        self
    }

    pub fn attributes(&self) -> &HashMap<String, String> {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn entry_date(&self) -> DateTime<Utc> {
        self.entry_date
    }
}

/// Records fetched together for one dispatch attempt.
///
/// A batch is never empty and is always routed as a whole.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    id: Uuid,
    records: Vec<Record>,
}

impl Batch {
    /// Wrap fetched records, returning `None` when nothing was fetched.
    pub fn new(records: Vec<Record>) -> Option<Self> {
        if records.is_empty() {
            return None;
        }
        Some(Self {
            id: Uuid::new_v4(),
            records,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// A batch built by [`Batch::new`] is never empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }
}

/// The two channels a batch can be routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Display, AsRefStr, EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Relationship {
    /// Batches whose email was accepted by the transport.
    Success,
    /// Batches whose email could not be built or sent.
    Failure,
}

// ============================================================================
// Outbound Message
// ============================================================================

/// A header already encoded for the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHeader {
    pub name: String,
    pub value: String,
}

impl MessageHeader {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// The email built for one batch, handed to the transport and then dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub from: Vec<Mailbox>,
    pub to: Vec<Mailbox>,
    pub cc: Vec<Mailbox>,
    pub bcc: Vec<Mailbox>,
    pub headers: Vec<MessageHeader>,
    pub subject: String,
    pub body: String,
    pub content_type: String,
    pub sent_at: DateTime<Utc>,
}

impl OutboundMessage {
    /// Look up a header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    /// Total number of envelope recipients.
    pub fn recipient_count(&self) -> usize {
        self.to.len() + self.cc.len() + self.bcc.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_records_make_no_batch() {
        assert!(Batch::new(Vec::new()).is_none());
    }

    #[test]
    fn test_batch_preserves_order() {
        let first = Record::new(1).with_attribute("n", "1");
        let second = Record::new(2).with_attribute("n", "2");
        let batch = Batch::new(vec![first.clone(), second.clone()]).unwrap();

        assert_eq!(batch.len(), 2);
        assert!(!batch.is_empty());
        assert_eq!(batch.records(), &[first, second]);
    }

    #[test]
    fn test_relationship_names() {
        assert_eq!(Relationship::Success.to_string(), "success");
        assert_eq!(Relationship::Failure.as_ref(), "failure");
        assert_eq!("failure".parse::<Relationship>().unwrap(), Relationship::Failure);
    }

    #[test]
    fn test_record_deserializes_with_defaults() {
        let record: Record =
            serde_json::from_str(r#"{"attributes":{"filename":"a.csv"},"size":42}"#).unwrap();
        assert_eq!(record.attribute("filename"), Some("a.csv"));
        assert_eq!(record.size(), 42);
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let message = OutboundMessage {
            from: vec!["sender@example.com".parse().unwrap()],
            to: Vec::new(),
            cc: Vec::new(),
            bcc: Vec::new(),
            headers: vec![MessageHeader::new("X-Mailer", "NiFi")],
            subject: "s".to_string(),
            body: "b".to_string(),
            content_type: "text/plain".to_string(),
            sent_at: Utc::now(),
        };
        assert_eq!(message.header("x-mailer"), Some("NiFi"));
        assert_eq!(message.header("X-Other"), None);
        assert_eq!(message.recipient_count(), 0);
    }
}
