//! Mail session construction.
//!
//! A [`MailSession`] is the transport-facing view of a [`DeliveryConfig`]:
//! a set of connection properties plus, when authentication is enabled, an
//! [`Authenticator`] consulted at send time.

use crate::config::DeliveryConfig;
use lettre::transport::smtp::authentication::Credentials;
use std::collections::BTreeMap;
use strum::{AsRefStr, Display, EnumIter};
use tracing::debug;

/// Connection properties understood by transports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(Display, AsRefStr, EnumIter)]
pub enum SessionProperty {
    #[strum(serialize = "smtp.host")]
    Host,
    #[strum(serialize = "smtp.port")]
    Port,
    #[strum(serialize = "smtp.socket_factory.port")]
    SocketFactoryPort,
    #[strum(serialize = "smtp.socket_factory.class")]
    SocketFactoryClass,
    #[strum(serialize = "smtp.auth")]
    Auth,
    #[strum(serialize = "smtp.starttls.enable")]
    StartTls,
}

/// Supplies credentials when the transport asks for them.
#[derive(Clone)]
pub struct Authenticator {
    username: Option<String>,
    password: Option<String>,
}

impl Authenticator {
    pub fn new(username: Option<String>, password: Option<String>) -> Self {
        Self { username, password }
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// Credentials for the SMTP `AUTH` exchange.
    ///
    /// Returns `None` when no username is configured. A missing password is
    /// sent as an empty one.
    pub fn credentials(&self) -> Option<Credentials> {
        let username = self.username.clone()?;
        Some(Credentials::new(
            username,
            self.password.clone().unwrap_or_default(),
        ))
    }
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "********"))
            .finish()
    }
}

/// Properties and optional authenticator for one send.
#[derive(Debug, Clone, Default)]
pub struct MailSession {
    properties: BTreeMap<SessionProperty, String>,
    authenticator: Option<Authenticator>,
}

impl MailSession {
    pub fn property(&self, property: SessionProperty) -> Option<&str> {
        self.properties.get(&property).map(String::as_str)
    }

    pub fn properties(&self) -> &BTreeMap<SessionProperty, String> {
        &self.properties
    }

    pub fn authenticator(&self) -> Option<&Authenticator> {
        self.authenticator.as_ref()
    }

    /// Value of a boolean property; absent means `false`.
    pub fn flag(&self, property: SessionProperty) -> bool {
        self.property(property)
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SessionBuilder;

impl SessionBuilder {
    /// Translate resolved settings into a session.
    pub fn build(config: &DeliveryConfig) -> MailSession {
        let port = config.port.to_string();
        let candidates = [
            (SessionProperty::Host, non_empty(&config.host)),
            (SessionProperty::Port, Some(port.clone())),
            (SessionProperty::SocketFactoryPort, Some(port)),
            (
                SessionProperty::SocketFactoryClass,
                non_empty(&config.socket_factory),
            ),
            (SessionProperty::Auth, Some(config.auth.to_string())),
            (SessionProperty::StartTls, Some(config.tls.to_string())),
        ];

        let mut properties = BTreeMap::new();
        for (property, value) in candidates {
            debug!(property = %property, value = ?value, "Evaluated mail property");
            if let Some(value) = value {
                properties.insert(property, value);
            }
        }

        let authenticator = config
            .auth
            .then(|| Authenticator::new(config.username.clone(), config.password.clone()));

        MailSession {
            properties,
            authenticator,
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}
