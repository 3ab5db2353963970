//! Typed access to the console's cookies.
//!
//! All values go through a [`PrivateCookieJar`], so they are encrypted and
//! authenticated with the configured key. Each call changes one cookie; the
//! handler returns the jar with its response, so nothing can be written after
//! the response has started.

use axum_extra::extract::PrivateCookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use time::Duration;

use crate::types::Session;

/// Session credential.
pub const ID_TOKEN: &str = "id_token";
/// Anti-CSRF state of the pending authorization.
pub const STATE: &str = "state";
/// Client of a pending or just issued personal access token.
pub const CLIENT_ID: &str = "client_id";
/// Secret of the client minted for a pending personal access token.
pub const CLIENT_SECRET: &str = "client_secret";
/// Personal access token secret, waiting for its one-time reveal.
pub const REFRESH_TOKEN: &str = "refresh_token";
/// Send the user to the settings page after login.
pub const SHOULD_REDIRECT_TO_SETTINGS: &str = "should_redirect_to_settings";

/// Path of the flow cookies; both callbacks and the reveal live below it.
pub const TRANSIENT_PATH: &str = "/auth";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieOptions {
    pub http_only: bool,
    pub secure: bool,
    pub same_site: SameSite,
    pub max_age: Option<Duration>,
    pub path: String,
}

impl CookieOptions {
    /// `HttpOnly`, `SameSite=Lax` cookie on `path` expiring after `max_age`.
    ///
    /// `Lax` keeps the cookies on the top-level redirect back from the provider.
    #[must_use]
    pub fn new(path: impl Into<String>, max_age: Duration, secure: bool) -> Self {
        Self {
            http_only: true,
            secure,
            same_site: SameSite::Lax,
            max_age: Some(max_age),
            path: path.into(),
        }
    }
}

/// Reads a cookie value. Cookies that fail to decrypt count as absent.
#[must_use]
pub fn get(jar: &PrivateCookieJar, name: &str) -> Option<String> {
    jar.get(name).map(|c| c.value().to_string())
}

/// Writes one cookie.
#[must_use]
pub fn set(
    jar: PrivateCookieJar,
    name: &str,
    value: &str,
    options: &CookieOptions,
) -> PrivateCookieJar {
    let mut cookie = Cookie::build((name.to_string(), value.to_string()))
        .http_only(options.http_only)
        .secure(options.secure)
        .same_site(options.same_site)
        .path(options.path.clone());
    if let Some(max_age) = options.max_age {
        cookie = cookie.max_age(max_age);
    }
    jar.add(cookie.build())
}

/// Removes one cookie. `path` must match the path it was set with.
#[must_use]
pub fn delete(jar: PrivateCookieJar, name: &str, path: &str) -> PrivateCookieJar {
    jar.remove(Cookie::build((name.to_string(), "")).path(path.to_string()))
}

/// Session as seen through the cookies of the current request.
#[must_use]
pub fn session(jar: &PrivateCookieJar) -> Session {
    Session {
        id_token: get(jar, ID_TOKEN).filter(|t| !t.is_empty()),
        refresh_token: get(jar, REFRESH_TOKEN).filter(|t| !t.is_empty()),
    }
}
