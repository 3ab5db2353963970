//! Thin authenticated client for the console's domain REST API.
//!
//! Only the parts the auth layer needs are modelled: token and user
//! management. Every call goes through [`ApiError`] classification.

mod config;
mod error;

pub use config::ApiConfiguration;
pub use error::ApiError;

use serde::de::DeserializeOwned;

use crate::types::{LoginId, PersonalAccessToken, TokenId, User};

/// Header carrying the fixed client API version on every call.
pub const API_VERSION_HEADER: &str = "X-Client-Api-Version";

#[derive(Clone, Default)]
pub struct DomainApi {
    http: reqwest::Client,
}

impl DomainApi {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a custom HTTP client (for timeouts, connection pool reuse or testing).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    /// Lists the personal access tokens owned by `login_id`.
    ///
    /// # Errors
    ///
    /// Returns the classified [`ApiError`].
    pub async fn list_tokens(
        &self,
        config: &ApiConfiguration,
        login_id: &LoginId,
    ) -> Result<Vec<PersonalAccessToken>, ApiError> {
        let mut url = config.endpoint(["tokens"]);
        url.query_pairs_mut().append_pair("loginId", &login_id.0);

        let response = self.send(config, self.http.get(url), "listTokens").await?;
        Self::decode(response).await
    }

    /// Deletes a personal access token.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`] if the token is already gone.
    pub async fn delete_token(
        &self,
        config: &ApiConfiguration,
        token_id: &TokenId,
    ) -> Result<(), ApiError> {
        let url = config.endpoint(["tokens", token_id.0.as_str()]);
        self.send(config, self.http.delete(url), "deleteToken").await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns the classified [`ApiError`].
    pub async fn get_user_by_login_id(
        &self,
        config: &ApiConfiguration,
        login_id: &LoginId,
    ) -> Result<User, ApiError> {
        let url = config.endpoint(["users", login_id.0.as_str()]);
        let response = self.send(config, self.http.get(url), "getUserByLoginId").await?;
        Self::decode(response).await
    }

    /// # Errors
    ///
    /// Returns the classified [`ApiError`].
    pub async fn update_user(&self, config: &ApiConfiguration, user: &User) -> Result<User, ApiError> {
        let url = config.endpoint(["users", user.login_id.0.as_str()]);
        let response = self
            .send(config, self.http.put(url).json(user), "updateUser")
            .await?;
        Self::decode(response).await
    }

    /// # Errors
    ///
    /// Returns the classified [`ApiError`].
    pub async fn delete_user(
        &self,
        config: &ApiConfiguration,
        login_id: &LoginId,
    ) -> Result<(), ApiError> {
        let url = config.endpoint(["users", login_id.0.as_str()]);
        self.send(config, self.http.delete(url), "deleteUser").await?;
        Ok(())
    }

    /// Attaches credentials, sends, and classifies any non-success status.
    async fn send(
        &self,
        config: &ApiConfiguration,
        request: reqwest::RequestBuilder,
        operation: &'static str,
    ) -> Result<reqwest::Response, ApiError> {
        let mut request = request.header(API_VERSION_HEADER, &config.client_api_version);
        if let Some(token) = &config.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let error = ApiError::from_status(status);
        tracing::warn!(operation, status = status.as_u16(), error = %error, "Domain API call failed");
        Err(error)
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
        response.json::<T>().await.map_err(Into::into)
    }
}
