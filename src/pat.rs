//! Personal access token lifecycle.
//!
//! A personal access token is the refresh token of an `OAuth2` client minted
//! for that token alone. Issuing one is a two-step protocol: provision the
//! client, then run an authorization-code exchange with it.

use std::fmt;
use std::sync::Arc;

use url::Url;

use crate::api::{ApiConfiguration, ApiError, DomainApi};
use crate::csrf;
use crate::error::{Error, TokenExchangeError};
use crate::oidc::{AuthorizationRequest, OidcClient, OidcClientRegistration};
use crate::provisioner::{ClientProvisioner, ClientRequest, Provisioning};
use crate::types::{LoginId, PersonalAccessToken, TokenId};

/// A provisioned client waiting for the user to come back from the provider.
#[non_exhaustive]
pub struct PendingToken {
    pub authorization: AuthorizationRequest,
    pub registration: OidcClientRegistration,
}

/// Secret material of a freshly issued token. Shown to the user once.
#[derive(Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct IssuedToken {
    pub client_id: String,
    pub refresh_token: String,
}

impl fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedToken")
            .field("client_id", &self.client_id)
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

pub struct PersonalAccessTokens<P> {
    oidc: Arc<OidcClient>,
    provisioner: Arc<P>,
    api: DomainApi,
}

// Manual Clone: avoid derive adding a `P: Clone` bound.
impl<P> Clone for PersonalAccessTokens<P> {
    fn clone(&self) -> Self {
        Self {
            oidc: self.oidc.clone(),
            provisioner: self.provisioner.clone(),
            api: self.api.clone(),
        }
    }
}

impl<P: ClientProvisioner> PersonalAccessTokens<P> {
    #[must_use]
    pub fn new(oidc: Arc<OidcClient>, provisioner: Arc<P>, api: DomainApi) -> Self {
        Self {
            oidc,
            provisioner,
            api,
        }
    }

    /// Mints a client with a caller-chosen secret.
    pub async fn provision(&self, name: &str, secret: String, redirect_uri: &Url) -> Provisioning {
        self.provisioner
            .create_client(ClientRequest {
                name: name.to_string(),
                secret,
                redirect_uris: vec![redirect_uri.to_string()],
            })
            .await
    }

    /// Provisions a client for `description` and builds its authorization redirect.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Provisioning`] if no client could be minted, or
    /// [`Error::Discovery`] if the provider metadata is unavailable.
    pub async fn initiate(&self, description: &str, callback: &Url) -> Result<PendingToken, Error> {
        let registration = self
            .provision(description, csrf::generate_client_secret(), callback)
            .await
            .into_result()?;

        let authorization = self.oidc.authorization_url(&registration, callback).await?;

        tracing::info!(client_id = %registration.client_id(), "Personal access token flow started");

        Ok(PendingToken {
            authorization,
            registration,
        })
    }

    /// Validates the callback and exchanges the code for the token's refresh token.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Csrf`] on a state mismatch (before any network call),
    /// [`Error::TokenExchange`] if the exchange fails or yields no refresh token.
    pub async fn complete(
        &self,
        registration: &OidcClientRegistration,
        code: &str,
        stored_state: Option<&str>,
        returned_state: Option<&str>,
        redirect_uri: &Url,
    ) -> Result<IssuedToken, Error> {
        csrf::validate_state(stored_state, returned_state)?;

        let tokens = self
            .oidc
            .exchange_code(registration, code, redirect_uri)
            .await?;

        let refresh_token = tokens
            .refresh_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| TokenExchangeError::Rejected {
                status: 200,
                error: "no refresh token issued".into(),
            })?;

        tracing::info!(client_id = %registration.client_id(), "Personal access token issued");

        Ok(IssuedToken {
            client_id: registration.client_id().to_string(),
            refresh_token,
        })
    }

    /// # Errors
    ///
    /// Returns the classified [`ApiError`].
    pub async fn list(
        &self,
        config: &ApiConfiguration,
        login_id: &LoginId,
    ) -> Result<Vec<PersonalAccessToken>, ApiError> {
        self.api.list_tokens(config, login_id).await
    }

    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`] if the token does not exist (anymore).
    pub async fn delete(&self, config: &ApiConfiguration, token_id: &TokenId) -> Result<(), ApiError> {
        self.api.delete_token(config, token_id).await
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::test_support::{self, FakeProvisioner};

    fn callback() -> Url {
        "https://console.example.com/auth/token/callback".parse().unwrap()
    }

    fn manager(server: &MockServer, provisioner: FakeProvisioner) -> PersonalAccessTokens<FakeProvisioner> {
        PersonalAccessTokens::new(
            Arc::new(test_support::oidc_client(server)),
            Arc::new(provisioner),
            DomainApi::new(),
        )
    }

    #[tokio::test]
    async fn test_initiate_uses_minted_client() {
        let server = test_support::mock_provider().await;
        let tokens = manager(&server, FakeProvisioner::succeeding("pat-client-1"));

        let pending = tokens.initiate("ci-bot", &callback()).await.unwrap();

        assert_eq!(pending.registration.client_id(), "pat-client-1");
        assert!(pending.authorization.url.contains("client_id=pat-client-1"));
        assert!(!pending.authorization.state.is_empty());

        let requests = tokens.provisioner.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].name, "ci-bot");
        assert_eq!(requests[0].secret.len(), 43);
        assert_eq!(requests[0].redirect_uris, vec![callback().to_string()]);
    }

    #[tokio::test]
    async fn test_initiate_stops_on_provisioning_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;
        let tokens = manager(&server, FakeProvisioner::failing());

        let result = tokens.initiate("ci-bot", &callback()).await;
        assert!(matches!(result, Err(Error::Provisioning(_))));
    }

    #[tokio::test]
    async fn test_complete_rejects_state_mismatch_before_exchange() {
        let server = test_support::mock_provider().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        let tokens = manager(&server, FakeProvisioner::succeeding("pat"));
        let reg = OidcClientRegistration::new("pat", "secret");

        let result = tokens
            .complete(&reg, "code", Some("stored"), Some("forged"), &callback())
            .await;
        assert!(matches!(result, Err(Error::Csrf)));

        let result = tokens
            .complete(&reg, "code", None, Some("forged"), &callback())
            .await;
        assert!(matches!(result, Err(Error::Csrf)));
    }

    #[tokio::test]
    async fn test_complete_returns_refresh_token() {
        let server = test_support::mock_provider().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "at",
                "token_type": "bearer",
                "refresh_token": "durable-secret"
            })))
            .mount(&server)
            .await;
        let tokens = manager(&server, FakeProvisioner::succeeding("pat"));
        let reg = OidcClientRegistration::new("pat", "secret");

        let issued = tokens
            .complete(&reg, "code", Some("s"), Some("s"), &callback())
            .await
            .unwrap();

        assert_eq!(issued.client_id, "pat");
        assert_eq!(issued.refresh_token, "durable-secret");
        assert!(!format!("{issued:?}").contains("durable-secret"));
    }

    #[tokio::test]
    async fn test_complete_without_refresh_token_fails() {
        let server = test_support::mock_provider().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "at",
                "token_type": "bearer"
            })))
            .mount(&server)
            .await;
        let tokens = manager(&server, FakeProvisioner::succeeding("pat"));
        let reg = OidcClientRegistration::new("pat", "secret");

        let result = tokens
            .complete(&reg, "code", Some("s"), Some("s"), &callback())
            .await;
        assert!(matches!(
            result,
            Err(Error::TokenExchange(TokenExchangeError::Rejected { .. }))
        ));
    }
}
