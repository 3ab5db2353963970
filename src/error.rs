/// Protocol-level failures of the login and token provisioning flows.
///
/// Any of these aborts the current flow. Nothing is retried automatically.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("OIDC discovery failed: {0}")]
    Discovery(String),
    #[error("authorization state mismatch")]
    Csrf,
    #[error("token exchange failed: {0}")]
    TokenExchange(#[from] TokenExchangeError),
    #[error("client provisioning failed: {0}")]
    Provisioning(String),
}

impl Error {
    /// Short machine-readable code used on the error page redirect.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Discovery(_) => "discovery_failed",
            Self::Csrf => "state_mismatch",
            Self::TokenExchange(TokenExchangeError::InvalidGrant(_)) => "invalid_grant",
            Self::TokenExchange(_) => "token_exchange_failed",
            Self::Provisioning(_) => "provisioning_failed",
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum TokenExchangeError {
    /// Code expired or already used. The user has to restart the flow.
    #[error("invalid_grant: {0}")]
    InvalidGrant(String),
    #[error("provider rejected the request ({status}): {error}")]
    Rejected { status: u16, error: String },
    /// Network failure, timeout or an undecodable response.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Missing or malformed process configuration. Fatal at start-up.
#[derive(Debug, thiserror::Error)]
#[error("configuration error: {0}")]
pub struct ConfigError(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_distinguish_invalid_grant() {
        let invalid = Error::TokenExchange(TokenExchangeError::InvalidGrant("used".into()));
        let rejected = Error::TokenExchange(TokenExchangeError::Rejected {
            status: 401,
            error: "invalid_client".into(),
        });

        assert_eq!(invalid.code(), "invalid_grant");
        assert_eq!(rejected.code(), "token_exchange_failed");
        assert_eq!(Error::Csrf.code(), "state_mismatch");
        assert_eq!(Error::Discovery("x".into()).code(), "discovery_failed");
        assert_eq!(Error::Provisioning("x".into()).code(), "provisioning_failed");
    }
}
