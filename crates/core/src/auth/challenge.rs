//! `WWW-Authenticate` challenge parsing.

use crate::error::{Result, RtspError};

/// One parsed `WWW-Authenticate` header value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    pub scheme: String,
    pub params: Vec<(String, String)>,
}

impl Challenge {
    /// Parse `Scheme key=value, key="quoted, value", ...`.
    ///
    /// Quoted values may contain commas and backslash escapes.
    pub fn parse(header: &str) -> Result<Self> {
        let header = header.trim();
        let (scheme, rest) = match header.split_once(|c: char| c.is_ascii_whitespace()) {
            Some((scheme, rest)) => (scheme, rest),
            None => (header, ""),
        };
        if scheme.is_empty() || scheme.contains('=') {
            return Err(RtspError::InvalidChallenge(header.to_string()));
        }

        let mut params = Vec::new();
        let mut chars = rest.chars().peekable();
        loop {
            while chars.next_if(|c| c.is_ascii_whitespace() || *c == ',').is_some() {}
            if chars.peek().is_none() {
                break;
            }

            let mut key = String::new();
            while let Some(c) = chars.next_if(|c| *c != '=' && *c != ',') {
                key.push(c);
            }
            let key = key.trim().to_string();

            let mut value = String::new();
            if chars.next_if_eq(&'=').is_some() {
                while chars.next_if(|c| c.is_ascii_whitespace()).is_some() {}
                if chars.next_if_eq(&'"').is_some() {
                    let mut closed = false;
                    while let Some(c) = chars.next() {
                        match c {
                            '\\' => {
                                if let Some(escaped) = chars.next() {
                                    value.push(escaped);
                                }
                            }
                            '"' => {
                                closed = true;
                                break;
                            }
                            c => value.push(c),
                        }
                    }
                    if !closed {
                        return Err(RtspError::InvalidChallenge(header.to_string()));
                    }
                } else {
                    while let Some(c) = chars.next_if(|c| *c != ',') {
                        value.push(c);
                    }
                    value = value.trim().to_string();
                }
            }

            if !key.is_empty() {
                params.push((key, value));
            }
        }

        Ok(Self {
            scheme: scheme.to_string(),
            params,
        })
    }

    /// Case-insensitive parameter lookup.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_digest(&self) -> bool {
        self.scheme.eq_ignore_ascii_case("Digest")
    }

    pub fn is_basic(&self) -> bool {
        self.scheme.eq_ignore_ascii_case("Basic")
    }

    /// `stale` present with any value other than `false`.
    pub fn is_stale(&self) -> bool {
        self.param("stale")
            .is_some_and(|v| !v.trim().eq_ignore_ascii_case("false"))
    }
}
