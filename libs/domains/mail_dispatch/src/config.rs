//! Delivery settings.
//!
//! Settings are a fixed schema: every knob the dispatcher understands is a
//! [`Setting`] variant carrying its display name, environment variable and
//! default. A [`ConfigSource`] maps settings to raw strings; [`validate`]
//! checks a source before scheduling and [`DeliveryConfig::resolve`] turns it
//! into the immutable snapshot used for one trigger.

use crate::error::{SettingsError, ValidationIssue};
use core_config::{FromEnv, env_optional};
use regex::Regex;
use std::collections::HashMap;
use strum::{Display, EnumIter, IntoEnumIterator};

/// Default maximum number of records per email.
pub const DEFAULT_GROUP_SIZE: usize = 1000;

/// Every setting the dispatcher reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum Setting {
    #[strum(serialize = "SMTP Hostname")]
    SmtpHostname,
    #[strum(serialize = "SMTP Port")]
    SmtpPort,
    #[strum(serialize = "SMTP Username")]
    SmtpUsername,
    #[strum(serialize = "SMTP Password")]
    SmtpPassword,
    #[strum(serialize = "SMTP Auth")]
    SmtpAuth,
    #[strum(serialize = "SMTP TLS")]
    SmtpTls,
    #[strum(serialize = "SMTP Socket Factory")]
    SmtpSocketFactory,
    #[strum(serialize = "SMTP X-Mailer Header")]
    HeaderXMailer,
    #[strum(serialize = "Attributes to Send as Headers (Regex)")]
    AttributeNameRegex,
    #[strum(serialize = "Content Type")]
    ContentType,
    #[strum(serialize = "From")]
    From,
    #[strum(serialize = "To")]
    To,
    #[strum(serialize = "CC")]
    Cc,
    #[strum(serialize = "BCC")]
    Bcc,
    #[strum(serialize = "Subject")]
    Subject,
    #[strum(serialize = "Message")]
    Message,
    #[strum(serialize = "Group Size")]
    GroupSize,
}

impl Setting {
    /// Environment variable the setting is loaded from.
    pub fn env_key(&self) -> &'static str {
        match self {
            Setting::SmtpHostname => "SMTP_HOST",
            Setting::SmtpPort => "SMTP_PORT",
            Setting::SmtpUsername => "SMTP_USERNAME",
            Setting::SmtpPassword => "SMTP_PASSWORD",
            Setting::SmtpAuth => "SMTP_AUTH",
            Setting::SmtpTls => "SMTP_TLS",
            Setting::SmtpSocketFactory => "SMTP_SOCKET_FACTORY",
            Setting::HeaderXMailer => "SMTP_XMAILER",
            Setting::AttributeNameRegex => "ATTRIBUTE_NAME_REGEX",
            Setting::ContentType => "CONTENT_TYPE",
            Setting::From => "MAIL_FROM",
            Setting::To => "MAIL_TO",
            Setting::Cc => "MAIL_CC",
            Setting::Bcc => "MAIL_BCC",
            Setting::Subject => "MAIL_SUBJECT",
            Setting::Message => "MAIL_MESSAGE",
            Setting::GroupSize => "GROUP_SIZE",
        }
    }

    /// Value used when the source has nothing for this setting.
    pub fn default_value(&self) -> Option<&'static str> {
        match self {
            Setting::SmtpPort => Some("25"),
            Setting::SmtpAuth => Some("true"),
            Setting::SmtpTls => Some("false"),
            Setting::SmtpSocketFactory => Some("ssl"),
            Setting::HeaderXMailer => Some("NiFi"),
            Setting::ContentType => Some("text/html"),
            Setting::Subject => Some("Message from NiFi"),
            Setting::GroupSize => Some("1000"),
            _ => None,
        }
    }

    pub fn is_required(&self) -> bool {
        matches!(
            self,
            Setting::SmtpHostname
                | Setting::SmtpPort
                | Setting::SmtpAuth
                | Setting::SmtpTls
                | Setting::SmtpSocketFactory
                | Setting::HeaderXMailer
                | Setting::ContentType
                | Setting::From
                | Setting::Subject
        )
    }

    /// Sensitive values are never logged.
    pub fn is_sensitive(&self) -> bool {
        matches!(self, Setting::SmtpPassword)
    }

    /// Look a setting up by its display name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::iter().find(|s| s.to_string() == name)
    }
}

/// Source of raw setting values.
pub trait ConfigSource: Send + Sync {
    /// The raw value explicitly set for `setting`, if any.
    fn raw(&self, setting: Setting) -> Option<String>;

    /// The raw value, falling back to the setting's default.
    fn value(&self, setting: Setting) -> Option<String> {
        self.raw(setting)
            .or_else(|| setting.default_value().map(str::to_string))
    }
}

/// In-memory settings, filled in code or from the environment.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct PropertyMap {
    values: HashMap<Setting, String>,
}

impl PropertyMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set a value.
    pub fn with(mut self, setting: Setting, value: impl Into<String>) -> Self {
        self.set(setting, value);
        self
    }

    pub fn set(&mut self, setting: Setting, value: impl Into<String>) {
        self.values.insert(setting, value.into());
    }

    pub fn remove(&mut self, setting: Setting) -> Option<String> {
        self.values.remove(&setting)
    }

    /// Build from `(display name, value)` pairs.
    pub fn from_pairs<'a, I>(pairs: I) -> Result<Self, SettingsError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut map = Self::new();
        let mut unknown = Vec::new();
        for (name, value) in pairs {
            match Setting::from_name(name) {
                Some(setting) => map.set(setting, value),
                None => unknown.push(ValidationIssue::new(name, "not a supported setting")),
            }
        }
        if unknown.is_empty() {
            Ok(map)
        } else {
            Err(SettingsError::Invalid(unknown))
        }
    }
}

impl std::fmt::Debug for PropertyMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for setting in Setting::iter() {
            if let Some(value) = self.values.get(&setting) {
                if setting.is_sensitive() {
                    map.entry(&setting.to_string(), &"********");
                } else {
                    map.entry(&setting.to_string(), value);
                }
            }
        }
        map.finish()
    }
}

impl ConfigSource for PropertyMap {
    fn raw(&self, setting: Setting) -> Option<String> {
        self.values.get(&setting).cloned()
    }
}

impl FromEnv for PropertyMap {
    /// Reads each setting from its environment variable (see [`Setting::env_key`]).
    /// Unset variables fall back to setting defaults when resolved. A value
    /// that is not valid unicode fails the whole load.
    fn from_env() -> Result<Self, core_config::ConfigError> {
        let mut map = Self::new();
        for setting in Setting::iter() {
            if let Some(value) = env_optional(setting.env_key())? {
                map.set(setting, value);
            }
        }
        Ok(map)
    }
}

/// Resolved settings for one send. Never mutated after construction.
#[derive(Clone)]
pub struct DeliveryConfig {
    pub host: String,
    pub port: u16,
    pub auth: bool,
    pub username: Option<String>,
    pub password: Option<String>,
    pub tls: bool,
    pub socket_factory: String,
    pub xmailer: String,
    pub content_type: String,
    pub from: Option<String>,
    pub to: Option<String>,
    pub cc: Option<String>,
    pub bcc: Option<String>,
    pub subject: String,
    pub message: Option<String>,
    pub attribute_name_pattern: Option<Regex>,
    pub group_size: usize,
}

impl std::fmt::Debug for DeliveryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("auth", &self.auth)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "********"))
            .field("tls", &self.tls)
            .field("socket_factory", &self.socket_factory)
            .field("xmailer", &self.xmailer)
            .field("content_type", &self.content_type)
            .field("from", &self.from)
            .field("to", &self.to)
            .field("cc", &self.cc)
            .field("bcc", &self.bcc)
            .field("subject", &self.subject)
            .field("message", &self.message)
            .field(
                "attribute_name_pattern",
                &self.attribute_name_pattern.as_ref().map(Regex::as_str),
            )
            .field("group_size", &self.group_size)
            .finish()
    }
}

impl DeliveryConfig {
    /// Resolve a validated snapshot from `source`.
    pub fn resolve(source: &dyn ConfigSource) -> Result<Self, SettingsError> {
        let mut issues = Vec::new();
        let config = Self::collect(source, &mut issues);
        match config {
            Some(config) if issues.is_empty() => Ok(config),
            _ => Err(SettingsError::Invalid(issues)),
        }
    }

    fn collect(source: &dyn ConfigSource, issues: &mut Vec<ValidationIssue>) -> Option<Self> {
        for setting in Setting::iter() {
            check_present(source, setting, issues);
        }

        let to = source.value(Setting::To);
        let cc = source.value(Setting::Cc);
        let bcc = source.value(Setting::Bcc);
        if [&to, &cc, &bcc].iter().all(|v| v.is_none()) {
            issues.push(ValidationIssue::new(
                "To, CC, BCC",
                "Must specify at least one To/CC/BCC address",
            ));
        }

        let port = parse_port(source, issues);
        let auth = parse_bool(source, Setting::SmtpAuth, issues);
        let tls = parse_bool(source, Setting::SmtpTls, issues);
        let group_size = parse_group_size(source, issues);
        let attribute_name_pattern = parse_pattern(source, issues);

        Some(Self {
            host: source.value(Setting::SmtpHostname).unwrap_or_default(),
            port: port?,
            auth: auth?,
            username: source.value(Setting::SmtpUsername),
            password: source.value(Setting::SmtpPassword),
            tls: tls?,
            socket_factory: source.value(Setting::SmtpSocketFactory).unwrap_or_default(),
            xmailer: source.value(Setting::HeaderXMailer).unwrap_or_default(),
            content_type: source.value(Setting::ContentType).unwrap_or_default(),
            from: source.value(Setting::From),
            to,
            cc,
            bcc,
            subject: source.value(Setting::Subject).unwrap_or_default(),
            message: source.value(Setting::Message),
            attribute_name_pattern: attribute_name_pattern?,
            group_size: group_size?,
        })
    }
}

/// Check a source without keeping the result.
pub fn validate(source: &dyn ConfigSource) -> Result<(), SettingsError> {
    DeliveryConfig::resolve(source).map(|_| ())
}

/// Maximum records per email, read on its own so a trigger can size its fetch
/// before resolving everything else.
pub fn group_size(source: &dyn ConfigSource) -> Result<usize, SettingsError> {
    let mut issues = Vec::new();
    parse_group_size(source, &mut issues).ok_or(SettingsError::Invalid(issues))
}

fn check_present(source: &dyn ConfigSource, setting: Setting, issues: &mut Vec<ValidationIssue>) {
    match source.value(setting) {
        Some(value) if value.is_empty() => {
            issues.push(ValidationIssue::new(setting.to_string(), "must not be empty"));
        }
        None if setting.is_required() => {
            issues.push(ValidationIssue::new(setting.to_string(), "is required"));
        }
        _ => {}
    }
}

fn parse_port(source: &dyn ConfigSource, issues: &mut Vec<ValidationIssue>) -> Option<u16> {
    let raw = source.value(Setting::SmtpPort)?;
    match raw.trim().parse::<u16>() {
        Ok(port) if port > 0 => Some(port),
        _ => {
            issues.push(ValidationIssue::new(
                Setting::SmtpPort.to_string(),
                format!("'{raw}' is not a valid port (1-65535)"),
            ));
            None
        }
    }
}

fn parse_bool(
    source: &dyn ConfigSource,
    setting: Setting,
    issues: &mut Vec<ValidationIssue>,
) -> Option<bool> {
    let raw = source.value(setting)?;
    if raw.trim().eq_ignore_ascii_case("true") {
        Some(true)
    } else if raw.trim().eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        issues.push(ValidationIssue::new(
            setting.to_string(),
            format!("'{raw}' is not a boolean (true/false)"),
        ));
        None
    }
}

fn parse_group_size(source: &dyn ConfigSource, issues: &mut Vec<ValidationIssue>) -> Option<usize> {
    let Some(raw) = source.value(Setting::GroupSize) else {
        return Some(DEFAULT_GROUP_SIZE);
    };
    match raw.trim().parse::<usize>() {
        Ok(size) if size > 0 => Some(size),
        _ => {
            issues.push(ValidationIssue::new(
                Setting::GroupSize.to_string(),
                format!("'{raw}' is not a positive integer"),
            ));
            None
        }
    }
}

fn parse_pattern(
    source: &dyn ConfigSource,
    issues: &mut Vec<ValidationIssue>,
) -> Option<Option<Regex>> {
    let Some(raw) = source.value(Setting::AttributeNameRegex) else {
        return Some(None);
    };
    match Regex::new(&raw) {
        Ok(regex) => Some(Some(regex)),
        Err(e) => {
            issues.push(ValidationIssue::new(
                Setting::AttributeNameRegex.to_string(),
                format!("not a valid regular expression: {e}"),
            ));
            None
        }
    }
}
