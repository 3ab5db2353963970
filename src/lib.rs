#![doc = include_str!("../README.md")]

pub mod api;
pub mod csrf;
pub mod error;
pub mod middleware;
pub mod oidc;
pub mod pat;
pub mod provisioner;
pub mod types;

#[cfg(test)]
mod test_support;

// Re-exports for convenient access
pub use api::{ApiConfiguration, ApiError, DomainApi};
pub use csrf::{generate_client_secret, generate_state, validate_state};
pub use error::{ConfigError, Error, TokenExchangeError};
pub use oidc::{
    AuthorizationRequest, IssuerMetadata, OidcClient, OidcClientRegistration, TokenSet,
};
pub use pat::{IssuedToken, PendingToken, PersonalAccessTokens};
pub use provisioner::{ClientProvisioner, DexProvisioner, DexSettings, Provisioning};
pub use types::{LoginId, PersonalAccessToken, Session, TokenId, User};
