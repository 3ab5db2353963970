use std::time::Duration as StdDuration;

use axum_extra::extract::cookie::Key;
use time::Duration;
use url::Url;

use super::cookies::{CookieOptions, TRANSIENT_PATH};
use super::error::{AuthError, ERROR_PAGE};
use crate::api::DomainApi;
use crate::oidc::{OidcClient, OidcClientRegistration};

const LOGIN_CALLBACK: &str = "auth/callback";
const TOKEN_CALLBACK: &str = "auth/token/callback";

/// Shared auth settings used by both config and runtime state.
#[derive(Clone)]
pub(crate) struct AuthSettings {
    pub(crate) cookie_key: Key,
    pub(crate) secure_cookies: bool,
    pub(crate) session_ttl_days: i64,
    pub(crate) transient_ttl_minutes: i64,
    pub(crate) login_callback: Url,
    pub(crate) token_callback: Url,
    pub(crate) api_base_path: Url,
    pub(crate) client_api_version: String,
    pub(crate) login_redirect: String,
    pub(crate) settings_redirect: String,
    pub(crate) error_redirect: String,
}

impl AuthSettings {
    fn new(public_url: &Url, api_base_path: Url) -> Self {
        Self {
            cookie_key: Key::generate(),
            secure_cookies: true,
            session_ttl_days: 1,
            transient_ttl_minutes: 5,
            login_callback: below(public_url, LOGIN_CALLBACK),
            token_callback: below(public_url, TOKEN_CALLBACK),
            api_base_path,
            client_api_version: "1".into(),
            login_redirect: "/".into(),
            settings_redirect: "/settings".into(),
            error_redirect: ERROR_PAGE.into(),
        }
    }

    /// Options for the `id_token` session cookie.
    pub(crate) fn session_cookie(&self) -> CookieOptions {
        CookieOptions::new("/", Duration::days(self.session_ttl_days), self.secure_cookies)
    }

    /// Options for single-use flow cookies (`state`, `client_id`, ...).
    pub(crate) fn transient_cookie(&self) -> CookieOptions {
        CookieOptions::new(
            TRANSIENT_PATH,
            Duration::minutes(self.transient_ttl_minutes),
            self.secure_cookies,
        )
    }

    /// Options for the post-login redirect hint.
    pub(crate) fn hint_cookie(&self) -> CookieOptions {
        CookieOptions::new(
            "/",
            Duration::minutes(self.transient_ttl_minutes),
            self.secure_cookies,
        )
    }
}

/// `base` with `path` appended, keeping any path prefix `base` already has.
fn below(base: &Url, path: &str) -> Url {
    let mut url = base.clone();
    if let Ok(mut segments) = url.path_segments_mut() {
        segments.pop_if_empty().extend(path.split('/'));
    }
    url
}

/// Console authentication configuration.
///
/// Required collaborators are constructor parameters.
///
/// Use [`from_env()`](ConsoleAuthConfig::from_env) for deployment,
/// or [`new()`](ConsoleAuthConfig::new) with `with_*` methods for full control.
pub struct ConsoleAuthConfig {
    pub(super) oidc: OidcClient,
    pub(super) web_client: OidcClientRegistration,
    pub(super) api: DomainApi,
    pub(super) settings: AuthSettings,
}

impl ConsoleAuthConfig {
    /// `public_url` is where browsers reach the console; callbacks are derived from it.
    #[must_use]
    pub fn new(
        oidc: OidcClient,
        web_client: OidcClientRegistration,
        public_url: &Url,
        api_base_path: Url,
    ) -> Self {
        Self {
            oidc,
            web_client,
            api: DomainApi::new(),
            settings: AuthSettings::new(public_url, api_base_path),
        }
    }

    /// Create config from environment variables.
    ///
    /// # Required env vars
    /// - `OIDC_ISSUER_URL`: identity provider issuer
    /// - `OIDC_CLIENT_ID`, `OIDC_CLIENT_SECRET`: the web UI client
    /// - `PUBLIC_URL`: external URL of the console
    /// - `API_BASE_PATH`: base URL of the domain REST API
    ///
    /// # Optional env vars
    /// - `API_CLIENT_VERSION`: value of the API version header (default `1`)
    /// - `HTTP_TIMEOUT_SECS`: deadline for provider and domain API calls (default 10)
    /// - `DEV_AUTH`: Set to `"1"` or `"true"` to disable secure cookies
    /// - `COOKIE_KEY`: Cookie encryption key bytes
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Config`] if required env vars are missing or URLs are invalid.
    pub fn from_env() -> Result<Self, AuthError> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, AuthError> {
        let required = |name: &str| {
            var(name).ok_or_else(|| AuthError::Config(format!("{name} is required")))
        };
        let required_url = |name: &str| -> Result<Url, AuthError> {
            required(name)?
                .parse()
                .map_err(|e| AuthError::Config(format!("{name}: {e}")))
        };

        let issuer = required_url("OIDC_ISSUER_URL")?;
        let public_url = required_url("PUBLIC_URL")?;
        let api_base_path = required_url("API_BASE_PATH")?;
        let client_id = required("OIDC_CLIENT_ID")?;
        let client_secret = required("OIDC_CLIENT_SECRET")?;

        let timeout = match var("HTTP_TIMEOUT_SECS") {
            Some(secs) => secs
                .parse::<u64>()
                .map_err(|e| AuthError::Config(format!("HTTP_TIMEOUT_SECS: {e}")))?,
            None => 10,
        };
        let http = reqwest::Client::builder()
            .timeout(StdDuration::from_secs(timeout))
            .build()
            .map_err(|e| AuthError::Config(format!("HTTP client: {e}")))?;

        let dev_auth = matches!(var("DEV_AUTH").as_deref(), Some("1" | "true"));

        let cookie_key = match var("COOKIE_KEY") {
            Some(k) => Key::try_from(k.as_bytes()).map_err(|_| {
                AuthError::Config(
                    "COOKIE_KEY is set but invalid (must be at least 64 bytes). \
                     Remove the env var to use an ephemeral key, or provide a valid key."
                        .into(),
                )
            })?,
            None => {
                tracing::warn!("COOKIE_KEY not set; sessions will not survive a restart");
                Key::generate()
            }
        };

        let mut config = Self::new(
            OidcClient::new(issuer).with_http_client(http.clone()),
            OidcClientRegistration::new(client_id, client_secret),
            &public_url,
            api_base_path,
        )
        .with_domain_api(DomainApi::new().with_http_client(http))
        .with_cookie_key(cookie_key)
        .with_secure_cookies(!dev_auth);

        if let Some(version) = var("API_CLIENT_VERSION") {
            config = config.with_client_api_version(version);
        }

        Ok(config)
    }

    #[must_use]
    pub fn with_domain_api(mut self, api: DomainApi) -> Self {
        self.api = api;
        self
    }

    #[must_use]
    pub fn with_cookie_key(mut self, key: Key) -> Self {
        self.settings.cookie_key = key;
        self
    }

    #[must_use]
    pub fn with_secure_cookies(mut self, secure: bool) -> Self {
        self.settings.secure_cookies = secure;
        self
    }

    #[must_use]
    pub fn with_session_ttl_days(mut self, days: i64) -> Self {
        self.settings.session_ttl_days = days;
        self
    }

    #[must_use]
    pub fn with_transient_ttl_minutes(mut self, minutes: i64) -> Self {
        self.settings.transient_ttl_minutes = minutes;
        self
    }

    #[must_use]
    pub fn with_client_api_version(mut self, version: impl Into<String>) -> Self {
        self.settings.client_api_version = version.into();
        self
    }

    #[must_use]
    pub fn with_login_redirect(mut self, path: impl Into<String>) -> Self {
        self.settings.login_redirect = path.into();
        self
    }

    #[must_use]
    pub fn with_settings_redirect(mut self, path: impl Into<String>) -> Self {
        self.settings.settings_redirect = path.into();
        self
    }

    /// Page aborted flows redirect to, with `?error=<code>` appended.
    #[must_use]
    pub fn with_error_redirect(mut self, path: impl Into<String>) -> Self {
        self.settings.error_redirect = path.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callbacks_keep_path_prefix() {
        let root: Url = "https://console.example.com".parse().unwrap();
        let nested: Url = "https://example.com/console/".parse().unwrap();

        let settings = AuthSettings::new(&root, root.clone());
        assert_eq!(
            settings.login_callback.as_str(),
            "https://console.example.com/auth/callback"
        );
        assert_eq!(
            settings.token_callback.as_str(),
            "https://console.example.com/auth/token/callback"
        );

        let settings = AuthSettings::new(&nested, root);
        assert_eq!(
            settings.login_callback.as_str(),
            "https://example.com/console/auth/callback"
        );
    }

    const KEY: &str = "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";

    fn env(extra: &[(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        let mut pairs = vec![
            ("OIDC_ISSUER_URL", "https://idp.example.com/dex"),
            ("OIDC_CLIENT_ID", "console-web"),
            ("OIDC_CLIENT_SECRET", "web-secret"),
            ("PUBLIC_URL", "https://console.example.com"),
            ("API_BASE_PATH", "https://api.example.com/v1"),
        ];
        pairs.extend_from_slice(extra);
        move |name| {
            pairs
                .iter()
                .rev()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| (*v).to_string())
        }
    }

    fn config_error(result: Result<ConsoleAuthConfig, AuthError>) -> String {
        match result {
            Ok(_) => panic!("configuration must be rejected"),
            Err(e) => e.to_string(),
        }
    }

    #[test]
    fn test_from_vars_defaults() {
        let config = ConsoleAuthConfig::from_vars(env(&[])).unwrap();

        assert_eq!(config.oidc.issuer().as_str(), "https://idp.example.com/dex");
        assert_eq!(config.web_client.client_id(), "console-web");
        assert_eq!(config.web_client.client_secret(), "web-secret");
        assert_eq!(
            config.settings.login_callback.as_str(),
            "https://console.example.com/auth/callback"
        );
        assert_eq!(config.settings.api_base_path.as_str(), "https://api.example.com/v1");
        assert_eq!(config.settings.client_api_version, "1");
        assert!(config.settings.secure_cookies);
    }

    #[test]
    fn test_from_vars_optional_settings() {
        let config = ConsoleAuthConfig::from_vars(env(&[
            ("DEV_AUTH", "true"),
            ("API_CLIENT_VERSION", "7"),
            ("COOKIE_KEY", KEY),
            ("HTTP_TIMEOUT_SECS", "3"),
        ]))
        .unwrap();

        assert!(!config.settings.secure_cookies);
        assert_eq!(config.settings.client_api_version, "7");
        assert_eq!(config.settings.cookie_key.master(), KEY.as_bytes());
    }

    fn without(name: &'static str) -> impl Fn(&str) -> Option<String> {
        let all = env(&[]);
        move |n| if n == name { None } else { all(n) }
    }

    #[test]
    fn test_from_vars_rejects_bad_values() {
        assert!(config_error(ConsoleAuthConfig::from_vars(without("OIDC_CLIENT_SECRET")))
            .contains("OIDC_CLIENT_SECRET is required"));
        assert!(config_error(ConsoleAuthConfig::from_vars(without("PUBLIC_URL")))
            .contains("PUBLIC_URL"));

        assert!(config_error(ConsoleAuthConfig::from_vars(env(&[("API_BASE_PATH", "not a url")])))
            .contains("API_BASE_PATH"));
        assert!(config_error(ConsoleAuthConfig::from_vars(env(&[("COOKIE_KEY", "short")])))
            .contains("COOKIE_KEY"));
        assert!(config_error(ConsoleAuthConfig::from_vars(env(&[("HTTP_TIMEOUT_SECS", "x")])))
            .contains("HTTP_TIMEOUT_SECS"));
    }

    #[test]
    fn test_cookie_options_follow_settings() {
        let url: Url = "https://console.example.com".parse().unwrap();
        let mut settings = AuthSettings::new(&url, url.clone());

        let session = settings.session_cookie();
        assert!(session.http_only);
        assert!(session.secure);
        assert_eq!(session.path, "/");
        assert_eq!(session.max_age, Some(Duration::days(1)));

        assert_eq!(settings.error_redirect, "/error");

        settings.secure_cookies = false;
        let transient = settings.transient_cookie();
        assert!(transient.http_only);
        assert!(!transient.secure);
        assert_eq!(transient.path, TRANSIENT_PATH);
        assert_eq!(transient.max_age, Some(Duration::minutes(5)));
    }
}
