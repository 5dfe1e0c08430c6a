//! OIDC relying-party client.
//!
//! Implements only what the bridge needs from the authorization code flow:
//! provider discovery at startup, the authorization redirect, the code
//! exchange, and email resolution through the userinfo endpoint. The
//! provider owns the whole challenge UX; this service never sees
//! credentials.

use reqwest::Client;
use serde::Deserialize;
use url::Url;
use zeroize::Zeroizing;

use crate::config;

const DISCOVERY_PATH: &str = ".well-known/openid-configuration";
const DEFAULT_SCOPES: &str = "openid email";

/// Error related to the identity provider.
#[derive(Debug, thiserror::Error)]
pub enum OidcError {
    #[error("provider request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("provider URL is invalid: {0}")]
    Url(#[from] url::ParseError),
    #[error("discovery document has no userinfo endpoint")]
    MissingUserinfo,
    #[error("identity provider returned no email claim")]
    MissingEmail,
}

/// Discovery document, reduced to the endpoints this flow uses.
#[derive(Debug, Deserialize)]
struct ProviderMetadata {
    issuer: String,
    authorization_endpoint: String,
    token_endpoint: String,
    userinfo_endpoint: Option<String>,
}

/// Token endpoint response for the authorization code grant.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
}

#[derive(Debug, Deserialize)]
struct UserinfoClaims {
    email: Option<String>,
}

/// Configured relying party, shared read-only across requests.
#[derive(Clone)]
pub struct OidcClient {
    http: Client,
    authorization_endpoint: Url,
    token_endpoint: String,
    userinfo_endpoint: String,
    client_id: String,
    client_secret: Zeroizing<String>,
    redirect_uri: String,
    scopes: String,
}

impl OidcClient {
    /// Fetch the provider's discovery document and build the client.
    pub async fn discover(
        config: &config::Oidc,
        redirect_uri: String,
    ) -> Result<Self, OidcError> {
        let http = Client::new();
        let discovery_url = Url::parse(&config.authority)?.join(DISCOVERY_PATH)?;

        let metadata: ProviderMetadata = http
            .get(discovery_url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        tracing::info!(issuer = metadata.issuer, "oidc provider discovered");

        Self::from_metadata(metadata, http, config, redirect_uri)
    }

    fn from_metadata(
        metadata: ProviderMetadata,
        http: Client,
        config: &config::Oidc,
        redirect_uri: String,
    ) -> Result<Self, OidcError> {
        Ok(Self {
            http,
            authorization_endpoint: Url::parse(&metadata.authorization_endpoint)?,
            token_endpoint: metadata.token_endpoint,
            userinfo_endpoint: metadata
                .userinfo_endpoint
                .ok_or(OidcError::MissingUserinfo)?,
            client_id: config.client_id.clone(),
            client_secret: Zeroizing::new(config.client_secret.clone()),
            redirect_uri,
            scopes: config
                .scopes
                .clone()
                .unwrap_or_else(|| DEFAULT_SCOPES.to_owned()),
        })
    }

    /// Build the authorization redirect carrying the CSRF `state`.
    pub fn authorization_url(&self, state: &str) -> String {
        let mut url = self.authorization_endpoint.clone();
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("scope", &self.scopes)
            .append_pair("state", state);

        url.into()
    }

    /// Exchange the authorization code against the token endpoint.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenResponse, OidcError> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", &self.redirect_uri),
            ("client_id", &self.client_id),
            ("client_secret", self.client_secret.as_str()),
        ];

        Ok(self
            .http
            .post(&self.token_endpoint)
            .form(&params)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?)
    }

    /// Resolve the authenticated email through the userinfo endpoint.
    pub async fn resolve_email(&self, access_token: &str) -> Result<String, OidcError> {
        let claims: UserinfoClaims = self
            .http
            .get(&self.userinfo_endpoint)
            .bearer_auth(access_token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        claims.email.ok_or(OidcError::MissingEmail)
    }
}
