//! Session/connection parameters and the `connect-options` syntax

use super::{Error, Result};
use indexmap::IndexMap;
use std::fmt;

/// Parameters every connection starts with, in this order
pub const DEFAULT_PARAMS: &[(&str, &str)] = &[
    ("interpolateParams", "true"),
    ("foreign_key_checks", "1"),
    ("timeout", "5s"),
    ("writeTimeout", "5s"),
    ("readTimeout", "20s"),
    ("tls", "preferred"),
    ("default_storage_engine", "InnoDB"),
];

/// Keys `connect-options` may not override (compared case-insensitively)
pub const BLOCKED_PARAMS: &[&str] = &["foreign_key_checks", "allowAllFiles", "multiStatements"];

/// Ordered `key=value` connection parameters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectParams(IndexMap<String, String>);

impl ConnectParams {
    /// Built-in defaults overlaid with a `connect-options` value.
    ///
    /// Overriding a default keeps its position; new keys are appended.
    pub fn with_options(options: &str) -> Result<Self> {
        let mut params: IndexMap<String, String> = DEFAULT_PARAMS
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        for (key, value) in Self::parse(options)?.0 {
            if BLOCKED_PARAMS.iter().any(|b| b.eq_ignore_ascii_case(&key)) {
                return Err(Error::BlockedOption(key));
            }
            params.insert(key, value);
        }
        Ok(Self(params))
    }

    /// Parse comma-separated `key=value` pairs without defaults or blocklist.
    ///
    /// Values may be single-quoted; inside quotes a backslash escapes the
    /// next character and commas do not split.
    pub fn parse(options: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidConnectOptions {
            options: options.to_string(),
            reason: reason.to_string(),
        };
        let mut params = IndexMap::new();
        if options.trim().is_empty() {
            return Ok(Self(params));
        }

        let mut chars = options.chars().peekable();
        loop {
            let mut key = String::new();
            loop {
                match chars.next() {
                    Some('=') => break,
                    Some(',') | None => return Err(invalid("missing '=' in option")),
                    Some(c) => key.push(c),
                }
            }
            let key = key.trim().to_string();
            if key.is_empty() {
                return Err(invalid("empty option name"));
            }

            while chars.next_if(|c| c.is_whitespace()).is_some() {}
            let mut value = String::new();
            if chars.next_if_eq(&'\'').is_some() {
                let mut closed = false;
                while let Some(c) = chars.next() {
                    match c {
                        '\\' => match chars.next() {
                            Some(escaped) => value.push(escaped),
                            None => break,
                        },
                        '\'' => {
                            closed = true;
                            break;
                        }
                        c => value.push(c),
                    }
                }
                if !closed {
                    return Err(invalid("unterminated quote"));
                }
                while chars.next_if(|c| c.is_whitespace()).is_some() {}
                match chars.next() {
                    Some(',') | None => {}
                    Some(_) => return Err(invalid("unexpected text after quoted value")),
                }
            } else {
                for c in chars.by_ref() {
                    if c == ',' {
                        break;
                    }
                    value.push(c);
                }
                value = value.trim().to_string();
            }

            params.insert(key, value);
            if chars.peek().is_none() {
                break;
            }
        }
        Ok(Self(params))
    }

    /// Render as a string that [`ConnectParams::parse`] maps back to `self`
    pub fn encode(&self) -> String {
        self.0
            .iter()
            .map(|(k, v)| format!("{k}={}", quote_value(v)))
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn quote_value(value: &str) -> String {
    let plain = !value.is_empty()
        && value
            .chars()
            .all(|c| !matches!(c, ',' | '\'' | '\\') && !c.is_whitespace());
    if plain {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
    }
}

impl fmt::Display for ConnectParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(params: &ConnectParams) -> Vec<&str> {
        params.iter().map(|(k, _)| k).collect()
    }

    #[test]
    fn test_defaults_in_order() {
        let params = ConnectParams::with_options("").unwrap();
        let expected: Vec<&str> = DEFAULT_PARAMS.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys(&params), expected);
        assert_eq!(params.get("foreign_key_checks"), Some("1"));
    }

    #[test]
    fn test_override_keeps_position() {
        let params =
            ConnectParams::with_options("readTimeout=5s, sql_mode='A,B',wait_timeout=60").unwrap();
        assert_eq!(params.get("readTimeout"), Some("5s"));
        assert_eq!(params.get("sql_mode"), Some("A,B"));
        let k = keys(&params);
        assert_eq!(k[4], "readTimeout");
        assert_eq!(&k[k.len() - 2..], &["sql_mode", "wait_timeout"]);
    }

    #[test]
    fn test_escaped_quote() {
        let params = ConnectParams::parse(r"init='it\'s',x=1").unwrap();
        assert_eq!(params.get("init"), Some("it's"));
        assert_eq!(params.get("x"), Some("1"));
    }

    #[test]
    fn test_blocked_keys() {
        for options in [
            "foreign_key_checks=0",
            "FOREIGN_key_CHECKS=1",
            "allowAllFiles=true",
            "a=1,multistatements=true",
        ] {
            assert!(
                matches!(ConnectParams::with_options(options), Err(Error::BlockedOption(_))),
                "{options} should be rejected"
            );
        }
    }

    #[test]
    fn test_malformed() {
        for options in [",", "bad_parse", "=1", "a='unterminated", "a='x'y"] {
            assert!(
                matches!(ConnectParams::parse(options), Err(Error::InvalidConnectOptions { .. })),
                "{options} should be rejected"
            );
        }
    }

    #[test]
    fn test_encode_round_trip() {
        let params = ConnectParams::with_options(
            r"sql_mode='STRICT_ALL_TABLES,NO_ZERO_DATE',init='a\'b \\ c',empty=''",
        )
        .unwrap();
        assert_eq!(params.get("init"), Some(r"a'b \ c"));
        assert_eq!(params.get("empty"), Some(""));

        let encoded = params.encode();
        let reparsed = ConnectParams::parse(&encoded).unwrap();
        assert_eq!(reparsed, params);
        assert_eq!(reparsed.encode(), encoded);
    }
}
