//! Host list tokenizing and validation

use super::{Error, Result};
use regex::Regex;
use std::sync::LazyLock;

static HOST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\[[0-9A-Fa-f:.]+\]|[A-Za-z0-9_.-]+)(?::(.*))?$").expect("valid regex")
});

/// One `host` or `host:port` entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostToken {
    pub host: String,
    pub port: Option<u16>,
}

/// Split a host list on any mix of commas and whitespace.
///
/// Entries may be individually quoted (`'a:3308', 'b'`) or the whole list
/// may be quoted (`"a, b"`); quotes never become part of an entry.
pub fn split_host_list(list: &str) -> Result<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for c in list.chars() {
        match c {
            '\'' | '"' => match quote {
                None => quote = Some(c),
                Some(open) if open == c => quote = None,
                Some(_) => return Err(Error::InvalidHost(list.to_string())),
            },
            ',' => flush(&mut current, &mut tokens),
            c if c.is_whitespace() => flush(&mut current, &mut tokens),
            c => current.push(c),
        }
    }
    if quote.is_some() {
        return Err(Error::UnterminatedQuote(list.to_string()));
    }
    flush(&mut current, &mut tokens);
    Ok(tokens)
}

fn flush(current: &mut String, tokens: &mut Vec<String>) {
    if !current.is_empty() {
        tokens.push(std::mem::take(current));
    }
}

/// Validate one entry and split off its port
pub fn parse_host_token(token: &str) -> Result<HostToken> {
    let caps = HOST_RE
        .captures(token)
        .ok_or_else(|| Error::InvalidHost(token.to_string()))?;
    let host = caps
        .get(1)
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| Error::InvalidHost(token.to_string()))?;
    let port = match caps.get(2) {
        None => None,
        Some(m) => Some(parse_port(&host, m.as_str())?),
    };
    Ok(HostToken { host, port })
}

/// Ports must be 1-65535
pub fn parse_port(host: &str, value: &str) -> Result<u16> {
    match value.trim().parse::<u16>() {
        Ok(port) if port > 0 => Ok(port),
        _ => Err(Error::InvalidPort {
            host: host.to_string(),
            port: value.to_string(),
        }),
    }
}
