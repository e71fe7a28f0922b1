//! Error types for the mail dispatch domain.

use thiserror::Error;

/// Result type for dispatch operations.
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Result type for upstream queue operations.
pub type QueueResult<T> = Result<T, QueueError>;

/// A single failed check found while validating settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// The setting (or group of settings) the issue is about.
    pub subject: String,
    /// Human readable explanation.
    pub explanation: String,
}

impl ValidationIssue {
    pub fn new(subject: impl Into<String>, explanation: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            explanation: explanation.into(),
        }
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "'{}' is invalid: {}", self.subject, self.explanation)
    }
}

/// Errors raised while validating or resolving delivery settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Settings were rejected before scheduling.
    #[error("Invalid settings: {}", join_issues(.0))]
    Invalid(Vec<ValidationIssue>),

    /// A previously valid source no longer resolves.
    #[error("Unable to resolve settings: {0}")]
    Unresolvable(String),
}

fn join_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors raised while resolving an address field.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AddressError {
    /// A required address field resolved to nothing.
    #[error("required field empty: {field}")]
    RequiredFieldEmpty { field: String },

    /// The field holds something that is not an RFC 822 address list.
    #[error("unparseable address: {field}={value}")]
    Unparseable { field: String, value: String },
}

/// Errors raised while encoding header text. Never fatal to a dispatch.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HeaderEncodingError {
    /// The header name is not a valid field name.
    #[error("invalid header name: {0:?}")]
    InvalidName(String),

    /// The header value contains a control character.
    #[error("header {name} contains a control character")]
    ControlCharacter { name: String },

    /// The header is one the message sets itself.
    #[error("header {0} is set by the message itself")]
    Reserved(String),
}

/// Errors raised by a mail transport.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeliveryError {
    /// The outbound message could not be assembled.
    #[error("Failed to build email message: {0}")]
    Message(String),

    /// The transport failed to deliver the message.
    #[error("SMTP send failed: {0}")]
    Transport(String),
}

/// Errors raised by the upstream queue.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueueError {
    /// The queue refused to hand out records.
    #[error("Queue fetch failed: {0}")]
    Fetch(String),

    /// The queue refused to accept routed records.
    #[error("Queue route failed: {0}")]
    Route(String),
}

/// Errors that can occur in the mail dispatch domain.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Address(#[from] AddressError),

    #[error(transparent)]
    HeaderEncoding(#[from] HeaderEncodingError),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    /// The body template could not be registered or rendered.
    #[error("Failed to render email body: {0}")]
    Template(String),
}

impl From<lettre::error::Error> for DeliveryError {
    fn from(err: lettre::error::Error) -> Self {
        DeliveryError::Message(err.to_string())
    }
}

impl From<lettre::transport::smtp::Error> for DeliveryError {
    fn from(err: lettre::transport::smtp::Error) -> Self {
        DeliveryError::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_error_messages() {
        let err = AddressError::RequiredFieldEmpty {
            field: "From".to_string(),
        };
        assert_eq!(err.to_string(), "required field empty: From");

        let err = AddressError::Unparseable {
            field: "To".to_string(),
            value: "nope <".to_string(),
        };
        assert_eq!(err.to_string(), "unparseable address: To=nope <");
    }

    #[test]
    fn test_invalid_settings_lists_every_issue() {
        let err = SettingsError::Invalid(vec![
            ValidationIssue::new("SMTP Port", "not a valid port"),
            ValidationIssue::new("To, CC, BCC", "Must specify at least one To/CC/BCC address"),
        ]);
        let message = err.to_string();
        assert!(message.contains("SMTP Port"));
        assert!(message.contains("at least one To/CC/BCC"));
    }

    #[test]
    fn test_dispatch_error_is_transparent() {
        let err: DispatchError = DeliveryError::Transport("connection refused".to_string()).into();
        assert_eq!(err.to_string(), "SMTP send failed: connection refused");
    }
}
