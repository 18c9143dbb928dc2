//! Bearer-token authentication for registry access
//!
//! A registry answering 401 describes where to obtain a token in its
//! `WWW-Authenticate` header. The transport parses that challenge and asks a
//! [`CredentialResolver`] for a credential before replaying the request once.

use crate::error::{RegistryError, Result};
use crate::logging::Logger;
use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use std::sync::LazyLock;
use url::Url;

static AUTHENTICATE_HEADER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"Bearer realm="(?P<realm>[^"]+)",service="(?P<service>[^"]+)",scope="(?P<scope>[^"]+)""#)
        .expect("valid WWW-Authenticate pattern")
});

/// Parsed `WWW-Authenticate: Bearer realm="...",service="...",scope="..."`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthChallenge {
    pub realm: String,
    pub service: String,
    pub scope: String,
}

impl AuthChallenge {
    /// Parse a challenge header. All three parameters are required; anything
    /// else is not a usable challenge.
    pub fn parse(header: &str) -> Option<Self> {
        let captures = AUTHENTICATE_HEADER_REGEX.captures(header)?;
        Some(Self {
            realm: captures.name("realm")?.as_str().to_string(),
            service: captures.name("service")?.as_str().to_string(),
            scope: captures.name("scope")?.as_str().to_string(),
        })
    }
}

/// Token service response
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BearerCredential {
    pub token: Option<String>,
    pub access_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

impl BearerCredential {
    pub fn from_token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            ..Default::default()
        }
    }

    /// `Authorization` header value; `token` wins over `access_token`.
    pub fn authorization(&self) -> Option<String> {
        self.token
            .as_deref()
            .filter(|token| !token.is_empty())
            .or_else(|| self.access_token.as_deref().filter(|token| !token.is_empty()))
            .map(|token| format!("Bearer {}", token))
    }
}

/// Supplies a credential when a registry request is rejected with 401
#[async_trait]
pub trait CredentialResolver: Send + Sync {
    /// `challenge` is `None` when the 401 carried no usable bearer challenge.
    /// Returning `Ok(None)` means "no credential".
    async fn resolve(&self, challenge: Option<&AuthChallenge>) -> Result<Option<BearerCredential>>;
}

/// Always answers with a pre-issued token
#[derive(Debug, Clone)]
pub struct StaticTokenResolver {
    token: String,
}

impl StaticTokenResolver {
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into() }
    }
}

#[async_trait]
impl CredentialResolver for StaticTokenResolver {
    async fn resolve(&self, _challenge: Option<&AuthChallenge>) -> Result<Option<BearerCredential>> {
        Ok(Some(BearerCredential::from_token(self.token.clone())))
    }
}

/// Exchanges a challenge for a token at the challenge realm, optionally
/// presenting basic credentials.
#[derive(Debug, Clone)]
pub struct TokenServiceResolver {
    client: Client,
    username: Option<String>,
    password: Option<String>,
    output: Logger,
}

impl TokenServiceResolver {
    pub fn new(client: Client, output: Logger) -> Self {
        Self {
            client,
            username: None,
            password: None,
            output,
        }
    }

    pub fn with_basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    fn token_url(challenge: &AuthChallenge) -> Result<Url> {
        let mut url = Url::parse(&challenge.realm)
            .map_err(|e| RegistryError::Auth(format!("Invalid token realm '{}': {}", challenge.realm, e)))?;
        url.query_pairs_mut()
            .append_pair("service", &challenge.service)
            .append_pair("scope", &challenge.scope);
        Ok(url)
    }
}

#[async_trait]
impl CredentialResolver for TokenServiceResolver {
    async fn resolve(&self, challenge: Option<&AuthChallenge>) -> Result<Option<BearerCredential>> {
        let Some(challenge) = challenge else {
            self.output.detail("No bearer challenge, nothing to exchange");
            return Ok(None);
        };

        let url = Self::token_url(challenge)?;
        self.output.detail(&format!("Requesting token from: {}", url));

        let mut request = self.client.get(url);
        if let Some(username) = &self.username {
            request = request.basic_auth(username, self.password.as_deref());
        }

        let response = request
            .send()
            .await
            .map_err(|e| RegistryError::Auth(format!("Failed to get auth token: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RegistryError::Auth(format!(
                "Token request failed with status: {}",
                status
            )));
        }

        let credential: BearerCredential = response
            .json()
            .await
            .map_err(|e| RegistryError::Auth(format!("Failed to parse token response: {}", e)))?;

        if let Some(expires_in) = credential.expires_in {
            self.output.detail(&format!("Token expires in {} seconds", expires_in));
        }
        Ok(Some(credential))
    }
}
