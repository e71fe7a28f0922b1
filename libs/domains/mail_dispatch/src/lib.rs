//! Mail Dispatch Domain
//!
//! Collects pipeline records into bounded batches, sends one email per
//! batch over SMTP, and routes every record of the batch by the outcome.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   RecordQueue   │  ← Pending records, claimed in bounded batches
//! └────────┬────────┘
//!          │
//! ┌────────▼────────┐
//! │ DispatchProc.   │  ← Resolves settings, addresses, headers, body
//! └────────┬────────┘
//!          │
//! ┌────────▼────────┐
//! │  MailTransport  │  ← SMTP via lettre, or a mock
//! └────────┬────────┘
//!          │
//! ┌────────▼────────┐
//! │ success/failure │  ← Whole batch routed to exactly one
//! └─────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use domain_mail_dispatch::{
//!     DispatchProcessor, InMemoryQueue, PropertyMap, SmtpTransport,
//! };
//! use core_config::FromEnv;
//! use std::sync::Arc;
//!
//! let queue = Arc::new(InMemoryQueue::new());
//! let processor = DispatchProcessor::new(
//!     queue.clone(),
//!     Arc::new(SmtpTransport::new()),
//!     Arc::new(PropertyMap::from_env()?),
//! )?;
//!
//! let outcome = processor.trigger().await?;
//! ```

pub mod address;
pub mod body;
pub mod config;
pub mod error;
pub mod headers;
pub mod models;
pub mod processor;
pub mod queue;
pub mod session;
pub mod transport;

// Re-export commonly used types
pub use address::AddressResolver;
pub use body::BodySynthesizer;
pub use config::{ConfigSource, DeliveryConfig, PropertyMap, Setting};
pub use error::{
    AddressError, DeliveryError, DispatchError, DispatchResult, HeaderEncodingError, QueueError,
    QueueResult, SettingsError, ValidationIssue,
};
pub use headers::HeaderEncoder;
pub use models::{Batch, MessageHeader, OutboundMessage, Record, Relationship};
pub use processor::{DispatchProcessor, TriggerOutcome};
pub use queue::{BatchFetcher, InMemoryQueue, RecordQueue};
pub use session::{Authenticator, MailSession, SessionBuilder, SessionProperty};
pub use transport::{MailTransport, MockTransport, SmtpTransport};
