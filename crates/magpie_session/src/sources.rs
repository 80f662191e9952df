//! Out-of-band credential sources.

use async_trait::async_trait;
use magpie_error::{MagpieResult, SessionError, SessionErrorKind};
use magpie_interface::{Credential, CredentialSource};
use std::collections::BTreeMap;

/// Parse a `Cookie`-header-shaped string (`name=value; name2=value2`) into
/// a cookie map. Malformed fragments are skipped.
pub fn parse_cookie_header(raw: &str) -> BTreeMap<String, String> {
    raw.split(';')
        .filter_map(|pair| {
            let (name, value) = pair.split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some((name.to_string(), value.trim().to_string()))
        })
        .collect()
}

/// A source that always yields the same prebuilt credential.
///
/// Used when the operator supplies a stored cookie set directly, and by
/// tests.
#[derive(Debug, Clone)]
pub struct StaticCredentialSource {
    credential: Credential,
}

impl StaticCredentialSource {
    /// Wrap a prebuilt credential.
    pub fn new(credential: Credential) -> Self {
        Self { credential }
    }
}

#[async_trait]
impl CredentialSource for StaticCredentialSource {
    async fn acquire(&self) -> MagpieResult<Credential> {
        Ok(self.credential.clone())
    }
}

/// A source that reads a cookie string from an environment variable.
#[derive(Debug, Clone)]
pub struct EnvCredentialSource {
    variable: String,
}

impl EnvCredentialSource {
    /// Read cookies from `variable` at acquisition time.
    pub fn new(variable: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
        }
    }
}

#[async_trait]
impl CredentialSource for EnvCredentialSource {
    async fn acquire(&self) -> MagpieResult<Credential> {
        let raw = std::env::var(&self.variable).map_err(|_| {
            SessionError::new(SessionErrorKind::LoginFailed(format!(
                "environment variable {} is not set",
                self.variable
            )))
        })?;
        let cookies = parse_cookie_header(&raw);
        if cookies.is_empty() {
            return Err(SessionError::new(SessionErrorKind::LoginFailed(format!(
                "environment variable {} holds no cookies",
                self.variable
            )))
            .into());
        }
        Ok(Credential::from_cookies(cookies))
    }
}
