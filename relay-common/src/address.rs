//! Email address parsing
//!
//! Recipients, sender overrides and configured defaults are all plain
//! addr-specs (`local-part@domain`), optionally wrapped in angle brackets.
//! The local part is a dot-atom or a quoted string; the domain is a dotted
//! hostname or a bracketed address literal.
//!
//! Length limits: 254 octets overall, 64 for the local part, 255 for the
//! domain.

use std::{
    fmt,
    net::{Ipv4Addr, Ipv6Addr},
    str::FromStr,
};

use thiserror::Error;

const MAX_ADDRESS_LEN: usize = 254;
const MAX_LOCAL_PART_LEN: usize = 64;
const MAX_DOMAIN_LEN: usize = 255;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("Empty address")]
    Empty,
    #[error("Address exceeds {MAX_ADDRESS_LEN} octets")]
    TooLong,
    #[error("Local-part exceeds {MAX_LOCAL_PART_LEN} octets")]
    LocalPartTooLong,
    #[error("Domain exceeds {MAX_DOMAIN_LEN} octets")]
    DomainTooLong,
    #[error("Missing closing angle bracket '>'")]
    MissingCloseBracket,
    #[error("Missing '@' separator")]
    MissingAtSign,
    #[error("Invalid local-part: {0}")]
    InvalidLocalPart(String),
    #[error("Invalid domain: {0}")]
    InvalidDomain(String),
    #[error("Invalid address literal: {0}")]
    InvalidAddressLiteral(String),
    #[error("Unclosed quoted string in local-part")]
    UnclosedQuotedString,
}

/// A parsed `local-part@domain`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mailbox {
    pub local_part: String,
    pub domain: String,
}

impl fmt::Display for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.local_part, self.domain)
    }
}

impl FromStr for Mailbox {
    type Err = AddressError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let input = input.trim();
        let bare = match input.strip_prefix('<') {
            Some(rest) => rest
                .strip_suffix('>')
                .ok_or(AddressError::MissingCloseBracket)?,
            None => input,
        };

        if bare.is_empty() {
            return Err(AddressError::Empty);
        }
        if bare.len() > MAX_ADDRESS_LEN {
            return Err(AddressError::TooLong);
        }

        let (local_part, domain) = split_at_sign(bare)?;

        if local_part.len() > MAX_LOCAL_PART_LEN {
            return Err(AddressError::LocalPartTooLong);
        }
        if domain.len() > MAX_DOMAIN_LEN {
            return Err(AddressError::DomainTooLong);
        }

        if local_part.starts_with('"') {
            check_quoted(local_part)?;
        } else {
            check_dot_atom(local_part, is_atext).map_err(AddressError::InvalidLocalPart)?;
        }

        if domain.starts_with('[') {
            check_literal(domain)?;
        } else {
            check_dot_atom(domain, |c| c.is_ascii_alphanumeric() || c == '-')
                .map_err(AddressError::InvalidDomain)?;
            if let Some(label) = domain
                .split('.')
                .find(|label| label.starts_with('-') || label.ends_with('-'))
            {
                return Err(AddressError::InvalidDomain(format!(
                    "label '{label}' cannot start or end with '-'"
                )));
            }
        }

        Ok(Self {
            local_part: local_part.to_string(),
            domain: domain.to_string(),
        })
    }
}

/// Parse an addr-spec, with or without enclosing angle brackets.
pub fn parse_address(input: &str) -> Result<Mailbox, AddressError> {
    input.parse()
}

#[must_use]
pub fn is_valid_address(input: &str) -> bool {
    input.parse::<Mailbox>().is_ok()
}

/// Split on the last '@' outside quotes. Domains never contain an unquoted
/// '@', and quoted local parts may.
fn split_at_sign(input: &str) -> Result<(&str, &str), AddressError> {
    let mut quoted = false;
    let mut escaped = false;
    let mut at = None;

    for (i, c) in input.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if quoted => escaped = true,
            '"' => quoted = !quoted,
            '@' if !quoted => at = Some(i),
            _ => {}
        }
    }

    at.map(|i| (&input[..i], &input[i + 1..]))
        .ok_or(AddressError::MissingAtSign)
}

/// Non-empty parts separated by single dots, each made of `allowed` chars.
fn check_dot_atom(input: &str, allowed: impl Fn(char) -> bool) -> Result<(), String> {
    if input.is_empty() {
        return Err("empty".to_string());
    }

    for part in input.split('.') {
        if part.is_empty() {
            return Err(format!("'{input}' has an empty dot-separated part"));
        }
        if let Some(c) = part.chars().find(|c| !allowed(*c)) {
            return Err(format!("invalid character '{c}'"));
        }
    }

    Ok(())
}

fn check_quoted(input: &str) -> Result<(), AddressError> {
    let inner = input
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .ok_or(AddressError::UnclosedQuotedString)?;

    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        let valid = match c {
            '\\' => chars.next().is_some_and(|n| n == ' ' || n.is_ascii_graphic()),
            '"' => false,
            c => c == ' ' || c.is_ascii_graphic(),
        };

        if !valid {
            return Err(AddressError::InvalidLocalPart(format!(
                "invalid quoted string {input}"
            )));
        }
    }

    Ok(())
}

/// `[IPv4]`, `[IPv6:...]` or a general `[tag:value]` literal
fn check_literal(input: &str) -> Result<(), AddressError> {
    let invalid = || AddressError::InvalidAddressLiteral(input.to_string());
    let inner = input
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .ok_or_else(invalid)?;

    let valid = inner.parse::<Ipv4Addr>().is_ok()
        || inner
            .strip_prefix("IPv6:")
            .map_or_else(
                || {
                    inner
                        .split_once(':')
                        .is_some_and(|(tag, value)| !tag.is_empty() && !value.is_empty())
                },
                |v6| v6.parse::<Ipv6Addr>().is_ok(),
            );

    if valid { Ok(()) } else { Err(invalid()) }
}

const fn is_atext(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || matches!(
            c,
            '!' | '#' | '$' | '%' | '&' | '\'' | '*' | '+' | '-' | '/' | '=' | '?' | '^' | '_'
                | '`' | '{' | '|' | '}' | '~'
        )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_address() {
        let mailbox = parse_address("user@example.com").unwrap();
        assert_eq!(mailbox.local_part, "user");
        assert_eq!(mailbox.domain, "example.com");
    }

    #[test]
    fn test_parse_bracketed_address() {
        let mailbox: Mailbox = " <first.last@example.com> ".parse().unwrap();
        assert_eq!(mailbox.to_string(), "first.last@example.com");
    }

    #[test]
    fn test_quoted_local_part_may_contain_at_sign() {
        let mailbox = parse_address(r#""office @ hq"@example.com"#).unwrap();
        assert_eq!(mailbox.local_part, r#""office @ hq""#);
        assert_eq!(mailbox.domain, "example.com");
    }

    #[test]
    fn test_address_literals() {
        assert!(is_valid_address("user@[192.168.1.1]"));
        assert!(is_valid_address("user@[IPv6:2001:db8::1]"));
        assert!(!is_valid_address("user@[IPv6:not-an-ip]"));
        assert!(!is_valid_address("user@[300.1.1.1]"));
    }

    #[test]
    fn test_plus_tag_is_valid() {
        assert!(is_valid_address("user+tag@example.com"));
    }

    #[test]
    fn test_invalid_addresses() {
        assert_eq!(parse_address("").unwrap_err(), AddressError::Empty);
        assert_eq!(parse_address("   ").unwrap_err(), AddressError::Empty);
        assert_eq!(
            parse_address("userexample.com").unwrap_err(),
            AddressError::MissingAtSign
        );
        assert_eq!(
            parse_address("<user@example.com").unwrap_err(),
            AddressError::MissingCloseBracket
        );
        assert_eq!(
            parse_address(r#""open@example.com"#).unwrap_err(),
            AddressError::MissingAtSign
        );

        for address in [
            "user..name@example.com",
            ".@aaa.aa",
            "user@.example.com",
            "user@example-.com",
            "user@",
            "@example.com",
            "not an address",
        ] {
            assert!(!is_valid_address(address), "{address} should be rejected");
        }
    }

    #[test]
    fn test_length_limits() {
        let long_local = format!("{}@example.com", "a".repeat(70));
        assert_eq!(
            parse_address(&long_local).unwrap_err(),
            AddressError::LocalPartTooLong
        );

        let too_long = format!("a@{}.com", "b".repeat(260));
        assert_eq!(parse_address(&too_long).unwrap_err(), AddressError::TooLong);
    }
}
