use std::fmt;

use serde::Deserialize;
use tokio::sync::OnceCell;
use url::Url;

use crate::csrf;
use crate::error::{Error, TokenExchangeError};

/// Scopes requested on every authorization redirect.
///
/// `offline_access` makes the provider issue a refresh token, which is what a
/// personal access token is made of.
pub const SCOPES: &str = "openid offline_access";

const DISCOVERY_PATH: &str = ".well-known/openid-configuration";

/// An `OAuth2` client known to the identity provider.
///
/// Either the long-lived web UI client from the environment, or a client
/// minted on demand by a [`ClientProvisioner`](crate::provisioner::ClientProvisioner).
#[derive(Clone, PartialEq, Eq)]
pub struct OidcClientRegistration {
    client_id: String,
    client_secret: String,
}

impl OidcClientRegistration {
    #[must_use]
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    #[must_use]
    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }
}

impl fmt::Debug for OidcClientRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OidcClientRegistration")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Subset of the OpenID Provider discovery document used by the console.
#[derive(Debug, Clone, Deserialize)]
#[non_exhaustive]
pub struct IssuerMetadata {
    pub issuer: String,
    pub authorization_endpoint: Url,
    pub token_endpoint: Url,
    #[serde(default)]
    pub userinfo_endpoint: Option<Url>,
    #[serde(default)]
    pub jwks_uri: Option<Url>,
}

/// Authorization URL plus the state that has to be stored until the callback.
#[non_exhaustive]
pub struct AuthorizationRequest {
    pub url: String,
    pub state: String,
}

/// Token endpoint response.
#[derive(Clone, Deserialize)]
#[non_exhaustive]
pub struct TokenSet {
    pub access_token: String,
    pub token_type: String,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

impl fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSet")
            .field("token_type", &self.token_type)
            .field("has_id_token", &self.id_token.is_some())
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("expires_in", &self.expires_in)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
struct ProviderError {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Fetches the discovery document of `issuer`.
///
/// # Errors
///
/// Returns [`Error::Discovery`] on network failure, a non-2xx status, or a
/// document that does not parse.
pub async fn discover(http: &reqwest::Client, issuer: &Url) -> Result<IssuerMetadata, Error> {
    let url = discovery_url(issuer)?;

    let response = http
        .get(url)
        .send()
        .await
        .map_err(|e| Error::Discovery(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(Error::Discovery(format!("discovery endpoint returned {status}")));
    }

    response
        .json::<IssuerMetadata>()
        .await
        .map_err(|e| Error::Discovery(format!("malformed discovery document: {e}")))
}

fn discovery_url(issuer: &Url) -> Result<Url, Error> {
    let base = issuer.as_str().trim_end_matches('/');
    format!("{base}/{DISCOVERY_PATH}")
        .parse()
        .map_err(|e| Error::Discovery(format!("invalid issuer URL: {e}")))
}

/// OpenID Connect client for one identity provider.
///
/// Holds the discovery document once it has been fetched; build one per
/// process and share it behind an `Arc`.
pub struct OidcClient {
    issuer: Url,
    http: reqwest::Client,
    metadata: OnceCell<IssuerMetadata>,
}

impl OidcClient {
    #[must_use]
    pub fn new(issuer: Url) -> Self {
        Self {
            issuer,
            http: reqwest::Client::new(),
            metadata: OnceCell::new(),
        }
    }

    /// Use a custom HTTP client (for timeouts, connection pool reuse or testing).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    #[must_use]
    pub fn issuer(&self) -> &Url {
        &self.issuer
    }

    /// Discovery document, fetched on first use and kept afterwards.
    ///
    /// A failed fetch is not cached; the next call tries again.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Discovery`] if the document cannot be fetched.
    pub async fn metadata(&self) -> Result<&IssuerMetadata, Error> {
        self.metadata
            .get_or_try_init(|| discover(&self.http, &self.issuer))
            .await
    }

    /// Builds the authorization redirect for `registration`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Discovery`] if the provider metadata is unavailable.
    pub async fn authorization_url(
        &self,
        registration: &OidcClientRegistration,
        callback: &Url,
    ) -> Result<AuthorizationRequest, Error> {
        let metadata = self.metadata().await?;
        let state = csrf::generate_state();

        let mut url = metadata.authorization_endpoint.clone();
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &registration.client_id)
            .append_pair("redirect_uri", callback.as_str())
            .append_pair("scope", SCOPES)
            .append_pair("state", &state);

        Ok(AuthorizationRequest {
            url: url.into(),
            state,
        })
    }

    /// Exchanges an authorization code for tokens.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Discovery`] if the provider metadata is unavailable and
    /// [`Error::TokenExchange`] if the token endpoint fails or refuses the code.
    pub async fn exchange_code(
        &self,
        registration: &OidcClientRegistration,
        code: &str,
        redirect_uri: &Url,
    ) -> Result<TokenSet, Error> {
        let metadata = self.metadata().await?;
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri.as_str()),
        ];

        let response = self
            .http
            .post(metadata.token_endpoint.clone())
            .basic_auth(&registration.client_id, Some(&registration.client_secret))
            .form(&params)
            .send()
            .await
            .map_err(TokenExchangeError::Transport)?;

        let response = Self::ensure_success(response).await?;
        let tokens = response
            .json::<TokenSet>()
            .await
            .map_err(TokenExchangeError::Transport)?;
        Ok(tokens)
    }

    /// Returns the response on success, otherwise classifies the provider error.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, TokenExchangeError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();

        match serde_json::from_str::<ProviderError>(&body) {
            Ok(err) if err.error == "invalid_grant" => Err(TokenExchangeError::InvalidGrant(
                err.error_description.unwrap_or(err.error),
            )),
            Ok(err) => Err(TokenExchangeError::Rejected {
                status,
                error: err.error,
            }),
            Err(_) => Err(TokenExchangeError::Rejected {
                status,
                error: "unrecognized error response".into(),
            }),
        }
    }
}
