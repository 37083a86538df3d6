//! RTSP client authentication (RFC 2617).
//!
//! A server answers an unauthenticated request with `401` and a
//! `WWW-Authenticate` challenge. [`AuthContext`] remembers that challenge
//! and renders the `Authorization` header for every later request.

pub mod challenge;
pub mod digest;

use base64::Engine as _;
use base64::prelude::BASE64_STANDARD;

pub use challenge::Challenge;
pub use digest::{Algorithm, DigestInput, compute};

use crate::error::{Result, RtspError};

/// Username and password taken from the URL or the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Scheme {
    Basic,
    Digest {
        realm: String,
        nonce: String,
        opaque: Option<String>,
        algorithm: Algorithm,
        /// Whether the challenge named the algorithm and we must echo it.
        echo_algorithm: bool,
        qop: Option<String>,
    },
}

/// State kept from the last accepted challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    scheme: Scheme,
    nonce_count: u32,
}

impl AuthContext {
    /// Build from a challenge. Staleness is judged by the caller.
    pub fn from_challenge(challenge: &Challenge) -> Result<Self> {
        if challenge.is_basic() {
            return Ok(Self {
                scheme: Scheme::Basic,
                nonce_count: 0,
            });
        }
        if !challenge.is_digest() {
            return Err(RtspError::InvalidChallenge(challenge.scheme.clone()));
        }

        let realm = challenge
            .param("realm")
            .ok_or_else(|| RtspError::InvalidChallenge("digest challenge without realm".into()))?;
        let nonce = challenge
            .param("nonce")
            .ok_or_else(|| RtspError::InvalidChallenge("digest challenge without nonce".into()))?;
        let (algorithm, echo_algorithm) = match challenge.param("algorithm") {
            Some(token) => (Algorithm::parse(token)?, true),
            None => (Algorithm::default(), false),
        };

        Ok(Self {
            scheme: Scheme::Digest {
                realm: realm.to_string(),
                nonce: nonce.to_string(),
                opaque: challenge.param("opaque").map(str::to_string),
                algorithm,
                echo_algorithm,
                qop: select_qop(challenge.param("qop"))?,
            },
            nonce_count: 0,
        })
    }

    /// Render the `Authorization` header value for one request.
    ///
    /// Each call with a qop bumps the nonce count.
    pub fn authorization(
        &mut self,
        credentials: &Credentials,
        method: &str,
        uri: &str,
        body: Option<&[u8]>,
    ) -> Result<String> {
        let Scheme::Digest {
            realm,
            nonce,
            opaque,
            algorithm,
            echo_algorithm,
            qop,
        } = &self.scheme
        else {
            let token = format!("{}:{}", credentials.username, credentials.password);
            return Ok(format!("Basic {}", BASE64_STANDARD.encode(token)));
        };

        let (nc, cnonce) = match qop {
            Some(_) => {
                self.nonce_count = self.nonce_count.wrapping_add(1);
                (
                    Some(format!("{:08x}", self.nonce_count)),
                    Some(format!("{:016x}", rand::random::<u64>())),
                )
            }
            None if algorithm.is_session() => {
                (None, Some(format!("{:016x}", rand::random::<u64>())))
            }
            None => (None, None),
        };

        let response = compute(&DigestInput {
            username: &credentials.username,
            realm,
            password: &credentials.password,
            method,
            uri,
            nonce,
            qop: qop.as_deref(),
            nc: nc.as_deref(),
            cnonce: cnonce.as_deref(),
            entity_body: body,
            algorithm: *algorithm,
        })?;

        let mut header = format!(
            r#"Digest username="{}", realm="{}", nonce="{}", uri="{}", response="{}""#,
            credentials.username, realm, nonce, uri, response
        );
        if *echo_algorithm {
            header.push_str(&format!(", algorithm={}", algorithm.as_str()));
        }
        if let Some(qop) = qop {
            header.push_str(&format!(", qop={}", qop));
            if let Some(nc) = &nc {
                header.push_str(&format!(", nc={}", nc));
            }
        }
        if let Some(cnonce) = &cnonce {
            header.push_str(&format!(r#", cnonce="{}""#, cnonce));
        }
        if let Some(opaque) = opaque {
            header.push_str(&format!(r#", opaque="{}""#, opaque));
        }

        Ok(header)
    }

    pub fn is_digest(&self) -> bool {
        matches!(self.scheme, Scheme::Digest { .. })
    }

    pub fn realm(&self) -> Option<&str> {
        match &self.scheme {
            Scheme::Digest { realm, .. } => Some(realm),
            Scheme::Basic => None,
        }
    }
}

/// Prefer `auth` over `auth-int`. A qop list with neither is unusable.
fn select_qop(offered: Option<&str>) -> Result<Option<String>> {
    let Some(offered) = offered else {
        return Ok(None);
    };
    let options: Vec<String> = offered
        .split(',')
        .map(|s| s.trim().to_ascii_lowercase())
        .filter(|s| !s.is_empty())
        .collect();
    if options.is_empty() {
        return Ok(None);
    }
    for wanted in ["auth", "auth-int"] {
        if options.iter().any(|o| o == wanted) {
            return Ok(Some(wanted.to_string()));
        }
    }
    Err(RtspError::UnsupportedQop(offered.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds() -> Credentials {
        Credentials::new("admin", "tsit2019")
    }

    // An Authorization value has the same shape as a challenge.
    fn param(header: &str, name: &str) -> Option<String> {
        Challenge::parse(header).ok()?.param(name).map(str::to_string)
    }

    #[test]
    fn legacy_digest_header() {
        let ch = Challenge::parse(
            r#"Digest realm="IP Camera(D4918)", nonce="325dbaf043b7cba36b17da397381f421", stale="FALSE""#,
        )
        .unwrap();
        let mut ctx = AuthContext::from_challenge(&ch).unwrap();
        let header = ctx
            .authorization(
                &creds(),
                "DESCRIBE",
                "rtsp://192.168.201.14:554/h264/ch1/sub/av_stream",
                None,
            )
            .unwrap();
        assert_eq!(
            header,
            concat!(
                r#"Digest username="admin", realm="IP Camera(D4918)", "#,
                r#"nonce="325dbaf043b7cba36b17da397381f421", "#,
                r#"uri="rtsp://192.168.201.14:554/h264/ch1/sub/av_stream", "#,
                r#"response="7b616f558394d1f3f65fc852c353dcc1""#
            )
        );
    }

    #[test]
    fn qop_auth_counts_nonces() {
        let ch = Challenge::parse(r#"Digest realm="r", nonce="n", qop="auth-int,auth""#).unwrap();
        let mut ctx = AuthContext::from_challenge(&ch).unwrap();

        let first = ctx.authorization(&creds(), "OPTIONS", "rtsp://h/s", None).unwrap();
        let second = ctx.authorization(&creds(), "OPTIONS", "rtsp://h/s", None).unwrap();

        assert_eq!(param(&first, "qop").as_deref(), Some("auth"));
        assert_eq!(param(&first, "nc").as_deref(), Some("00000001"));
        assert_eq!(param(&second, "nc").as_deref(), Some("00000002"));
        assert!(param(&first, "cnonce").is_some());
    }

    #[test]
    fn qop_response_verifies() {
        let ch = Challenge::parse(r#"Digest realm="r", nonce="n", qop="auth", opaque="xyz""#)
            .unwrap();
        let mut ctx = AuthContext::from_challenge(&ch).unwrap();
        let header = ctx.authorization(&creds(), "PLAY", "rtsp://h/s", None).unwrap();

        let cnonce = param(&header, "cnonce").unwrap();
        let expected = compute(&DigestInput {
            username: "admin",
            realm: "r",
            password: "tsit2019",
            method: "PLAY",
            uri: "rtsp://h/s",
            nonce: "n",
            qop: Some("auth"),
            nc: Some("00000001"),
            cnonce: Some(&cnonce),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(param(&header, "response"), Some(expected));
        assert_eq!(param(&header, "opaque").as_deref(), Some("xyz"));
    }

    #[test]
    fn unsupported_qop_list() {
        let ch = Challenge::parse(r#"Digest realm="r", nonce="n", qop="auth-conf""#).unwrap();
        assert!(matches!(
            AuthContext::from_challenge(&ch),
            Err(RtspError::UnsupportedQop(_))
        ));
    }

    #[test]
    fn digest_without_nonce_rejected() {
        let ch = Challenge::parse(r#"Digest realm="r""#).unwrap();
        assert!(matches!(
            AuthContext::from_challenge(&ch),
            Err(RtspError::InvalidChallenge(_))
        ));
    }

    #[test]
    fn basic_header() {
        let ch = Challenge::parse(r#"Basic realm="cam""#).unwrap();
        let mut ctx = AuthContext::from_challenge(&ch).unwrap();
        assert!(!ctx.is_digest());
        let header = ctx
            .authorization(&Credentials::new("Aladdin", "open sesame"), "DESCRIBE", "rtsp://h/", None)
            .unwrap();
        assert_eq!(header, "Basic QWxhZGRpbjpvcGVuIHNlc2FtZQ==");
    }

    #[test]
    fn algorithm_echoed_when_named() {
        let ch = Challenge::parse(r#"Digest realm="r", nonce="n", algorithm=SHA-256"#).unwrap();
        let mut ctx = AuthContext::from_challenge(&ch).unwrap();
        let header = ctx.authorization(&creds(), "DESCRIBE", "rtsp://h/", None).unwrap();
        assert_eq!(param(&header, "algorithm").as_deref(), Some("SHA-256"));
        assert_eq!(param(&header, "response").map(|r| r.len()), Some(64));
    }

    #[test]
    fn sess_algorithm_without_qop_sends_cnonce() {
        let ch = Challenge::parse(r#"Digest realm="r", nonce="n", algorithm=MD5-sess"#).unwrap();
        let mut ctx = AuthContext::from_challenge(&ch).unwrap();
        let header = ctx.authorization(&creds(), "DESCRIBE", "rtsp://h/", None).unwrap();
        assert_eq!(param(&header, "cnonce").map(|c| c.len()), Some(16));
        assert!(param(&header, "nc").is_none());
        assert!(param(&header, "qop").is_none());

        let ch = Challenge::parse(r#"Digest realm="r", nonce="n", algorithm=MD5"#).unwrap();
        let mut ctx = AuthContext::from_challenge(&ch).unwrap();
        let header = ctx.authorization(&creds(), "DESCRIBE", "rtsp://h/", None).unwrap();
        assert!(param(&header, "cnonce").is_none());
    }
}
