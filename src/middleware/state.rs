use std::sync::Arc;

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;

use super::config::{AuthSettings, ConsoleAuthConfig};
use crate::oidc::{OidcClient, OidcClientRegistration};
use crate::pat::PersonalAccessTokens;
use crate::provisioner::ClientProvisioner;

/// Shared state for auth route handlers.
///
/// Built once at start; the OIDC client (with its discovery cache) and the
/// provisioner (with its gRPC channel) are shared by every request.
pub struct AppState<P> {
    pub(super) oidc: Arc<OidcClient>,
    pub(super) web_client: Arc<OidcClientRegistration>,
    pub(super) tokens: PersonalAccessTokens<P>,
    pub(super) settings: AuthSettings,
}

impl<P: ClientProvisioner> AppState<P> {
    pub(super) fn new(config: ConsoleAuthConfig, provisioner: P) -> Self {
        let oidc = Arc::new(config.oidc);
        Self {
            tokens: PersonalAccessTokens::new(oidc.clone(), Arc::new(provisioner), config.api),
            oidc,
            web_client: Arc::new(config.web_client),
            settings: config.settings,
        }
    }
}

// Manual Clone: avoid derive adding a `P: Clone` bound.
impl<P> Clone for AppState<P> {
    fn clone(&self) -> Self {
        Self {
            oidc: self.oidc.clone(),
            web_client: self.web_client.clone(),
            tokens: self.tokens.clone(),
            settings: self.settings.clone(),
        }
    }
}

// PrivateCookieJar requires Key to be extractable from state
impl<P> FromRef<AppState<P>> for Key {
    fn from_ref(state: &AppState<P>) -> Self {
        state.settings.cookie_key.clone()
    }
}
