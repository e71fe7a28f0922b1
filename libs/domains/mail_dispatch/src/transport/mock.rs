//! Mock transport for testing

use super::MailTransport;
use crate::error::DeliveryError;
use crate::models::OutboundMessage;
use crate::session::MailSession;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Mock transport that captures every message it is asked to send.
///
/// A failing mock still records the attempt before returning its error.
#[derive(Clone, Default)]
pub struct MockTransport {
    messages: Arc<Mutex<Vec<OutboundMessage>>>,
    sessions: Arc<Mutex<Vec<MailSession>>>,
    failure: Option<DeliveryError>,
}

impl MockTransport {
    /// Create a mock that accepts everything
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock that fails every send with `error`
    pub fn failing(error: DeliveryError) -> Self {
        Self {
            failure: Some(error),
            ..Self::default()
        }
    }

    /// Get all attempted messages
    pub async fn messages(&self) -> Vec<OutboundMessage> {
        self.messages.lock().await.clone()
    }

    /// Get the sessions the attempts were made with
    pub async fn sessions(&self) -> Vec<MailSession> {
        self.sessions.lock().await.clone()
    }

    /// Get the count of attempted messages
    pub async fn attempt_count(&self) -> usize {
        self.messages.lock().await.len()
    }
}

#[async_trait]
impl MailTransport for MockTransport {
    async fn send(
        &self,
        session: &MailSession,
        message: &OutboundMessage,
    ) -> Result<(), DeliveryError> {
        self.messages.lock().await.push(message.clone());
        self.sessions.lock().await.push(session.clone());

        match &self.failure {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }

    async fn health_check(&self, _session: &MailSession) -> Result<bool, DeliveryError> {
        Ok(self.failure.is_none())
    }
}
