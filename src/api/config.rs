use std::fmt;

use url::Url;

use crate::types::Session;

/// Per-request settings for a domain API call.
///
/// Built fresh from the current [`Session`] for every call; never stored.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiConfiguration {
    pub base_path: Url,
    pub bearer_token: Option<String>,
    pub client_api_version: String,
}

impl ApiConfiguration {
    /// Configuration carrying the session's id token, if there is one.
    ///
    /// Without an id token the configuration simply has no bearer token.
    #[must_use]
    pub fn for_session(
        session: &Session,
        base_path: &Url,
        client_api_version: impl Into<String>,
    ) -> Self {
        Self {
            base_path: base_path.clone(),
            bearer_token: session.id_token.clone().filter(|t| !t.is_empty()),
            client_api_version: client_api_version.into(),
        }
    }

    /// Resolves `segments` below the base path, percent-encoding each one.
    pub(crate) fn endpoint<I>(&self, segments: I) -> Url
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut url = self.base_path.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

impl fmt::Debug for ApiConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfiguration")
            .field("base_path", &self.base_path.as_str())
            .field("has_bearer_token", &self.bearer_token.is_some())
            .field("client_api_version", &self.client_api_version)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        "https://api.example.com/v1/".parse().unwrap()
    }

    #[test]
    fn test_absent_id_token_gives_no_bearer() {
        let config = ApiConfiguration::for_session(&Session::default(), &base(), "2");
        assert!(config.bearer_token.is_none());
        assert_eq!(config.client_api_version, "2");
    }

    #[test]
    fn test_id_token_becomes_bearer() {
        let session = Session {
            id_token: Some("idt".into()),
            refresh_token: Some("ignored".into()),
        };
        let config = ApiConfiguration::for_session(&session, &base(), "2");
        assert_eq!(config.bearer_token.as_deref(), Some("idt"));
    }

    #[test]
    fn test_endpoint_joins_and_encodes() {
        let config = ApiConfiguration::for_session(&Session::default(), &base(), "2");
        assert_eq!(
            config.endpoint(["users", "a/b"]).as_str(),
            "https://api.example.com/v1/users/a%2Fb"
        );

        let no_slash: Url = "https://api.example.com/v1".parse().unwrap();
        let config = ApiConfiguration::for_session(&Session::default(), &no_slash, "2");
        assert_eq!(
            config.endpoint(["tokens"]).as_str(),
            "https://api.example.com/v1/tokens"
        );
    }

    #[test]
    fn test_debug_hides_token() {
        let session = Session {
            id_token: Some("secret-id-token".into()),
            refresh_token: None,
        };
        let config = ApiConfiguration::for_session(&session, &base(), "2");
        assert!(!format!("{config:?}").contains("secret-id-token"));
    }
}
