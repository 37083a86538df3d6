//! Digest response computation (RFC 2617 §3.2.2, RFC 7616).

use sha2::Digest as _;

use crate::error::{Result, RtspError};

fn hash_md5(i: &[u8]) -> String {
    format!("{:x}", md5::compute(i))
}

fn hash_sha256(i: &[u8]) -> String {
    format!("{:x}", sha2::Sha256::digest(i))
}

fn hash_sha512_trunc256(i: &[u8]) -> String {
    format!("{:x}", sha2::Sha512_256::digest(i))
}

type HashFn = fn(&[u8]) -> String;

/// Hash algorithm named by the challenge's `algorithm` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Algorithm {
    #[default]
    Md5,
    Md5Sess,
    Sha256,
    Sha256Sess,
    Sha512_256,
    Sha512_256Sess,
}

impl Algorithm {
    pub fn parse(token: &str) -> Result<Self> {
        let token = token.trim().trim_matches('"');
        let algorithm = match token.to_ascii_uppercase().as_str() {
            "MD5" => Algorithm::Md5,
            "MD5-SESS" => Algorithm::Md5Sess,
            "SHA-256" => Algorithm::Sha256,
            "SHA-256-SESS" => Algorithm::Sha256Sess,
            "SHA-512-256" => Algorithm::Sha512_256,
            "SHA-512-256-SESS" => Algorithm::Sha512_256Sess,
            _ => return Err(RtspError::UnsupportedAlgorithm(token.to_string())),
        };
        Ok(algorithm)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::Md5 => "MD5",
            Algorithm::Md5Sess => "MD5-sess",
            Algorithm::Sha256 => "SHA-256",
            Algorithm::Sha256Sess => "SHA-256-sess",
            Algorithm::Sha512_256 => "SHA-512-256",
            Algorithm::Sha512_256Sess => "SHA-512-256-sess",
        }
    }

    /// `-sess` variants, whose HA1 folds in the nonce and cnonce.
    pub(crate) fn is_session(&self) -> bool {
        matches!(
            self,
            Algorithm::Md5Sess | Algorithm::Sha256Sess | Algorithm::Sha512_256Sess
        )
    }

    fn hash_fn(&self) -> HashFn {
        match self {
            Algorithm::Md5 | Algorithm::Md5Sess => hash_md5,
            Algorithm::Sha256 | Algorithm::Sha256Sess => hash_sha256,
            Algorithm::Sha512_256 | Algorithm::Sha512_256Sess => hash_sha512_trunc256,
        }
    }

    /// Lowercase hex digest of `data`.
    pub fn hash(&self, data: &[u8]) -> String {
        (self.hash_fn())(data)
    }
}

/// Everything that goes into one digest response.
#[derive(Debug, Clone, Default)]
pub struct DigestInput<'a> {
    pub username: &'a str,
    pub realm: &'a str,
    pub password: &'a str,
    /// Request method, uppercase (`DESCRIBE`, `SETUP`, ...).
    pub method: &'a str,
    pub uri: &'a str,
    pub nonce: &'a str,
    /// `None`/empty for the legacy RFC 2069 mode, `auth` or `auth-int`.
    pub qop: Option<&'a str>,
    /// Nonce count, 8 hex digits.
    pub nc: Option<&'a str>,
    pub cnonce: Option<&'a str>,
    /// Request body, hashed into HA2 under `auth-int`.
    pub entity_body: Option<&'a [u8]>,
    pub algorithm: Algorithm,
}

/// Compute the `response=` value for a digest challenge.
///
/// ```text
/// HA1 = H(username:realm:password)
/// HA2 = H(method:uri)                       qop empty or auth
///     = H(method:uri:H(entity-body))        qop auth-int
/// response = H(HA1:nonce:nc:cnonce:qop:HA2) with qop
///          = H(HA1:nonce:HA2)               without qop
/// ```
pub fn compute(input: &DigestInput<'_>) -> Result<String> {
    let hash = input.algorithm.hash_fn();
    let qop = input.qop.map(str::trim).unwrap_or("").to_ascii_lowercase();

    let mut ha1 = hash(format!("{}:{}:{}", input.username, input.realm, input.password).as_bytes());
    if input.algorithm.is_session() {
        let cnonce = input
            .cnonce
            .ok_or(RtspError::MissingAuthParameter("cnonce"))?;
        ha1 = hash(format!("{}:{}:{}", ha1, input.nonce, cnonce).as_bytes());
    }

    let ha2 = match qop.as_str() {
        "" | "auth" => hash(format!("{}:{}", input.method, input.uri).as_bytes()),
        "auth-int" => {
            let body_hash = hash(input.entity_body.unwrap_or_default());
            hash(format!("{}:{}:{}", input.method, input.uri, body_hash).as_bytes())
        }
        _ => return Err(RtspError::UnsupportedQop(qop)),
    };

    let response = if qop.is_empty() {
        hash(format!("{}:{}:{}", ha1, input.nonce, ha2).as_bytes())
    } else {
        let nc = input.nc.ok_or(RtspError::MissingAuthParameter("nc"))?;
        let cnonce = input
            .cnonce
            .ok_or(RtspError::MissingAuthParameter("cnonce"))?;
        hash(format!("{}:{}:{}:{}:{}:{}", ha1, input.nonce, nc, cnonce, qop, ha2).as_bytes())
    };

    Ok(response)
}
