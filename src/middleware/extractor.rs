use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::extract::PrivateCookieJar;
use axum_extra::extract::cookie::Key;
use url::Url;

use super::cookies;
use super::state::AppState;
use crate::api::ApiConfiguration;

/// Builds the domain API configuration for the current request.
///
/// Reads `id_token` from the cookies. Without one the configuration carries
/// no bearer token; it never fails and never invents a credential.
#[must_use]
pub fn create_authenticated_api_configuration(
    jar: &PrivateCookieJar,
    api_base_path: &Url,
    client_api_version: &str,
) -> ApiConfiguration {
    ApiConfiguration::for_session(&cookies::session(jar), api_base_path, client_api_version)
}

/// Domain API configuration for the current request, as an Axum extractor.
///
/// # Example
///
/// ```rust,ignore
/// async fn tokens(AuthenticatedApi(config): AuthenticatedApi, ...) -> ... {
///     api.list_tokens(&config, &login_id).await
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthenticatedApi(pub ApiConfiguration);

impl<P: Send + Sync> FromRequestParts<AppState<P>> for AuthenticatedApi {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<P>,
    ) -> Result<Self, Self::Rejection> {
        let jar: PrivateCookieJar<Key> = PrivateCookieJar::from_request_parts(parts, state).await?;

        Ok(Self(create_authenticated_api_configuration(
            &jar,
            &state.settings.api_base_path,
            &state.settings.client_api_version,
        )))
    }
}

#[cfg(test)]
mod tests {
    use time::Duration;

    use super::*;
    use crate::middleware::cookies::CookieOptions;

    fn base() -> Url {
        "https://api.example.com/v1".parse().unwrap()
    }

    #[test]
    fn test_without_id_token_no_bearer() {
        let jar = PrivateCookieJar::new(Key::generate());
        let config = create_authenticated_api_configuration(&jar, &base(), "2");

        assert!(config.bearer_token.is_none());
        assert_eq!(config.base_path, base());
    }

    #[test]
    fn test_with_id_token() {
        let jar = PrivateCookieJar::new(Key::generate());
        let jar = cookies::set(
            jar,
            cookies::ID_TOKEN,
            "idt",
            &CookieOptions::new("/", Duration::days(1), true),
        );
        let config = create_authenticated_api_configuration(&jar, &base(), "2");

        assert_eq!(config.bearer_token.as_deref(), Some("idt"));
        assert_eq!(config.client_api_version, "2");
    }
}
