//! Sender and recipient address resolution.
//!
//! A field value is an RFC 822 address list:
//!
//! ```text
//! address-list = mailbox *("," mailbox)
//! mailbox      = addr-spec / [display-name] "<" addr-spec ">"
//! display-name = phrase / quoted-string
//! ```
//!
//! Parenthesised comments may appear anywhere outside quoted strings.
//! Commas inside quotes, comments or angle brackets do not separate
//! mailboxes. The `addr-spec` itself is validated by [`lettre::Address`].

use crate::error::AddressError;
use lettre::{Address, message::Mailbox};

/// Characters that may not appear in an unquoted display name.
const PHRASE_SPECIALS: &[char] = &['@', ',', ';', ':', '\\', '"', '[', ']', '<', '>', '(', ')'];

/// Resolves configured address fields into mailboxes.
#[derive(Debug, Clone, Copy, Default)]
pub struct AddressResolver;

impl AddressResolver {
    /// Resolve the value of `field`.
    ///
    /// An absent or blank value is an error only when `required`; otherwise
    /// it resolves to an empty list. A value that fails to parse fails the
    /// whole field.
    pub fn resolve(
        field: &str,
        value: Option<&str>,
        required: bool,
    ) -> Result<Vec<Mailbox>, AddressError> {
        let value = match value {
            Some(v) if !v.trim().is_empty() => v,
            _ if required => {
                return Err(AddressError::RequiredFieldEmpty {
                    field: field.to_string(),
                });
            }
            _ => return Ok(Vec::new()),
        };

        parse_address_list(value).ok_or_else(|| AddressError::Unparseable {
            field: field.to_string(),
            value: value.to_string(),
        })
    }
}

/// Parse a comma separated list. `None` on any syntax error.
fn parse_address_list(value: &str) -> Option<Vec<Mailbox>> {
    let mailboxes = split_list(value)?
        .into_iter()
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(parse_mailbox)
        .collect::<Option<Vec<_>>>()?;

    if mailboxes.is_empty() {
        None
    } else {
        Some(mailboxes)
    }
}

/// Split on top-level commas, rejecting unbalanced quotes, comments and angles.
fn split_list(value: &str) -> Option<Vec<&str>> {
    let mut entries = Vec::new();
    let mut start = 0;
    let mut in_quote = false;
    let mut escaped = false;
    let mut comment_depth = 0usize;
    let mut in_angle = false;

    for (i, ch) in value.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_quote || comment_depth > 0 => escaped = true,
            '"' if comment_depth == 0 => in_quote = !in_quote,
            _ if in_quote => {}
            '(' => comment_depth += 1,
            ')' => comment_depth = comment_depth.checked_sub(1)?,
            _ if comment_depth > 0 => {}
            '<' if in_angle => return None,
            '<' => in_angle = true,
            '>' if !in_angle => return None,
            '>' => in_angle = false,
            ',' if !in_angle => {
                entries.push(&value[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }

    if in_quote || escaped || comment_depth > 0 || in_angle {
        return None;
    }
    entries.push(&value[start..]);
    Some(entries)
}

/// Remove parenthesised comments that sit outside quoted strings.
fn strip_comments(entry: &str) -> String {
    let mut out = String::with_capacity(entry.len());
    let mut in_quote = false;
    let mut escaped = false;
    let mut depth = 0usize;

    for ch in entry.chars() {
        if escaped {
            escaped = false;
            if depth == 0 {
                out.push(ch);
            }
            continue;
        }
        match ch {
            '\\' if in_quote || depth > 0 => {
                escaped = true;
                if depth == 0 {
                    out.push(ch);
                }
            }
            '"' if depth == 0 => {
                in_quote = !in_quote;
                out.push(ch);
            }
            '(' if !in_quote => depth += 1,
            ')' if !in_quote => {
                depth = depth.saturating_sub(1);
                out.push(' ');
            }
            _ if depth > 0 => {}
            _ => out.push(ch),
        }
    }
    out
}

fn parse_mailbox(entry: &str) -> Option<Mailbox> {
    let entry = strip_comments(entry);
    let entry = entry.trim();

    match entry.find('<') {
        Some(open) => {
            let rest = &entry[open + 1..];
            let close = rest.find('>')?;
            if !rest[close + 1..].trim().is_empty() {
                return None;
            }
            let name = parse_display_name(entry[..open].trim())?;
            let address = parse_addr_spec(&rest[..close])?;
            Some(Mailbox::new(name, address))
        }
        None => Some(Mailbox::new(None, parse_addr_spec(entry)?)),
    }
}

/// `Some(None)` for an empty name, `None` when the name is malformed.
fn parse_display_name(raw: &str) -> Option<Option<String>> {
    if raw.is_empty() {
        return Some(None);
    }

    if let Some(inner) = raw.strip_prefix('"').and_then(|r| r.strip_suffix('"')) {
        let mut name = String::with_capacity(inner.len());
        let mut chars = inner.chars();
        while let Some(ch) = chars.next() {
            match ch {
                '\\' => name.push(chars.next()?),
                '"' => return None,
                _ => name.push(ch),
            }
        }
        return Some(Some(name));
    }

    if raw.contains(PHRASE_SPECIALS) {
        return None;
    }
    Some(Some(raw.split_whitespace().collect::<Vec<_>>().join(" ")))
}

fn parse_addr_spec(raw: &str) -> Option<Address> {
    let raw = raw.trim();
    if raw.is_empty() || raw.contains(char::is_whitespace) {
        return None;
    }
    raw.parse::<Address>().ok()
}
