//! Dispatch processor.
//!
//! One [`DispatchProcessor::trigger`] call is one pass through
//! `Idle -> Fetching -> Resolving -> Sending -> {Success, Failure}`:
//!
//! 1. claim a bounded batch (nothing claimed means nothing to do)
//! 2. resolve the delivery settings and build the session
//! 3. resolve From/To/CC/BCC, any address error fails the batch unsent
//! 4. attach headers, dropping any that cannot be encoded
//! 5. use the configured message or synthesize one from the batch
//! 6. send once
//! 7. route the whole batch to `success` or `failure`
//!
//! Failures come back as [`TriggerOutcome::Failed`], whose
//! [`should_yield`](TriggerOutcome::should_yield) tells the scheduler to back
//! off before triggering again. Nothing is retried here.

use crate::address::AddressResolver;
use crate::body::BodySynthesizer;
use crate::config::{self, ConfigSource, DeliveryConfig};
use crate::error::{DispatchError, DispatchResult, SettingsError};
use crate::headers::HeaderEncoder;
use crate::models::{Batch, OutboundMessage, Relationship};
use crate::queue::{BatchFetcher, RecordQueue};
use crate::session::{MailSession, SessionBuilder};
use crate::transport::MailTransport;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

const XMAILER_HEADER: &str = "X-Mailer";

/// What a single trigger did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// The queue had nothing to send.
    Idle,
    /// The batch was sent and routed to `success`.
    Delivered { batch_id: Uuid, count: usize },
    /// The batch was routed to `failure`.
    Failed {
        batch_id: Uuid,
        count: usize,
        reason: String,
    },
}

impl TriggerOutcome {
    /// Whether the scheduler should back off before the next trigger.
    pub fn should_yield(&self) -> bool {
        matches!(self, TriggerOutcome::Failed { .. })
    }

    /// Where the batch went, if there was one.
    pub fn relationship(&self) -> Option<Relationship> {
        match self {
            TriggerOutcome::Idle => None,
            TriggerOutcome::Delivered { .. } => Some(Relationship::Success),
            TriggerOutcome::Failed { .. } => Some(Relationship::Failure),
        }
    }
}

/// Sends one email per fetched batch and routes the batch by the result.
///
/// The processor holds no per-trigger state, so a shared instance can be
/// triggered from several tasks at once; each call works on its own batch.
pub struct DispatchProcessor<Q: ?Sized, T: ?Sized> {
    queue: Arc<Q>,
    transport: Arc<T>,
    settings: Arc<dyn ConfigSource>,
    body: BodySynthesizer,
}

impl<Q, T> DispatchProcessor<Q, T>
where
    Q: RecordQueue + ?Sized,
    T: MailTransport + ?Sized,
{
    /// Create a processor, rejecting settings that fail validation.
    ///
    /// This is the scheduling boundary: invalid settings never reach
    /// [`trigger`](Self::trigger).
    pub fn new(
        queue: Arc<Q>,
        transport: Arc<T>,
        settings: Arc<dyn ConfigSource>,
    ) -> DispatchResult<Self> {
        let config = DeliveryConfig::resolve(settings.as_ref())?;
        let body = BodySynthesizer::new()?;
        info!(
            host = %config.host,
            port = config.port,
            auth = config.auth,
            tls = config.tls,
            group_size = config.group_size,
            transport = transport.name(),
            "Dispatch processor scheduled"
        );
        Ok(Self {
            queue,
            transport,
            settings,
            body,
        })
    }

    pub fn queue(&self) -> &Q {
        &self.queue
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Run one dispatch pass.
    ///
    /// Errors are returned only for queue failures and for a batch size that
    /// no longer resolves before anything was claimed. Every other failure
    /// routes the batch to `failure` and is reported as
    /// [`TriggerOutcome::Failed`].
    pub async fn trigger(&self) -> DispatchResult<TriggerOutcome> {
        let fetcher = BatchFetcher::new(config::group_size(self.settings.as_ref())?);
        let Some(batch) = fetcher.fetch(self.queue.as_ref()).await? else {
            return Ok(TriggerOutcome::Idle);
        };

        let batch_id = batch.id();
        let count = batch.len();
        debug!(
            batch_id = %batch_id,
            count,
            records = ?batch.records().iter().map(|r| r.id).collect::<Vec<_>>(),
            "Fetched batch"
        );

        match self.dispatch(&batch).await {
            Ok(()) => {
                self.queue
                    .route(batch.into_records(), Relationship::Success)
                    .await?;
                info!(
                    batch_id = %batch_id,
                    count,
                    transport = self.transport.name(),
                    "Sent email for batch"
                );
                Ok(TriggerOutcome::Delivered { batch_id, count })
            }
            Err(e) => {
                error!(
                    batch_id = %batch_id,
                    count,
                    error = %e,
                    "Failed to send email for batch; routing to failure"
                );
                self.queue
                    .route(batch.into_records(), Relationship::Failure)
                    .await?;
                Ok(TriggerOutcome::Failed {
                    batch_id,
                    count,
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Check the transport against the current settings.
    pub async fn health_check(&self) -> DispatchResult<bool> {
        let config = DeliveryConfig::resolve(self.settings.as_ref())?;
        let session = SessionBuilder::build(&config);
        Ok(self.transport.health_check(&session).await?)
    }

    async fn dispatch(&self, batch: &Batch) -> Result<(), DispatchError> {
        let config = DeliveryConfig::resolve(self.settings.as_ref())
            .map_err(|e| SettingsError::Unresolvable(e.to_string()))?;
        let session: MailSession = SessionBuilder::build(&config);
        let message = build_message(&config, batch, &self.body)?;

        self.transport.send(&session, &message).await?;
        Ok(())
    }
}

/// Assemble the email for `batch`.
///
/// Fails on address errors and when the body cannot be rendered. Attribute
/// headers that would shadow a header of the message itself are dropped.
pub fn build_message(
    config: &DeliveryConfig,
    batch: &Batch,
    body: &BodySynthesizer,
) -> Result<OutboundMessage, DispatchError> {
    let from = AddressResolver::resolve("From", config.from.as_deref(), true)?;
    let to = AddressResolver::resolve("To", config.to.as_deref(), false)?;
    let cc = AddressResolver::resolve("CC", config.cc.as_deref(), false)?;
    let bcc = AddressResolver::resolve("BCC", config.bcc.as_deref(), false)?;

    let mut headers = Vec::new();
    match HeaderEncoder::header(XMAILER_HEADER, &config.xmailer) {
        Ok(header) => headers.push(header),
        Err(e) => warn!(
            batch_id = %batch.id(),
            header = XMAILER_HEADER,
            value = %config.xmailer.escape_debug(),
            error = %e,
            "Unable to add header due to encoding error"
        ),
    }

    if let Some(pattern) = &config.attribute_name_pattern {
        for (name, value) in HeaderEncoder::matching_attributes(batch, pattern) {
            match HeaderEncoder::attribute_header(name, value) {
                Ok(header) => headers.push(header),
                Err(e) => warn!(
                    batch_id = %batch.id(),
                    header = %name.escape_debug(),
                    value = %value.escape_debug(),
                    error = %e,
                    "Unable to add header due to encoding error"
                ),
            }
        }
    }

    let body = match &config.message {
        Some(text) => text.clone(),
        None => body.synthesize(batch)?,
    };

    Ok(OutboundMessage {
        from,
        to,
        cc,
        bcc,
        headers,
        subject: config.subject.clone(),
        body,
        content_type: config.content_type.clone(),
        sent_at: Utc::now(),
    })
}
