use axum::extract::{Path, Query, Request, State};
use axum::http::header::CACHE_CONTROL;
use axum::http::{Method, StatusCode};
use axum::middleware::{Next, from_fn_with_state};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{delete, get};
use axum::{Json, Router};
use axum_extra::extract::PrivateCookieJar;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use super::config::ConsoleAuthConfig;
use super::cookies::{self, TRANSIENT_PATH};
use super::error::AuthError;
use super::extractor::AuthenticatedApi;
use super::state::AppState;
use crate::api::ApiError;
use crate::csrf;
use crate::oidc::OidcClientRegistration;
use crate::pat::IssuedToken;
use crate::provisioner::{ClientProvisioner, Provisioning};
use crate::types::{LoginId, PersonalAccessToken, TokenId};

const LOGIN_PATH: &str = "/auth";
const LOGIN_CALLBACK_PATH: &str = "/auth/callback";
const LOGOUT_PATH: &str = "/logout";
const TOKEN_PATH: &str = "/auth/token";
const TOKEN_CALLBACK_PATH: &str = "/auth/token/callback";
const TOKEN_REVEAL_PATH: &str = "/auth/token/reveal";
const API_TOKENS_PATH: &str = "/api/tokens";
const API_TOKEN_PATH: &str = "/api/tokens/{token_id}";

/// Create the console router.
///
/// `pages` are the console's own routes; every one of them, together with the
/// personal access token routes, sits behind [`require_login`]. Login,
/// its callback and logout stay public.
pub fn console_router<P>(config: ConsoleAuthConfig, provisioner: P, pages: Router) -> Router
where
    P: ClientProvisioner,
{
    let state = AppState::new(config, provisioner);

    let tokens: Router = Router::new()
        .route(
            TOKEN_PATH,
            get(initiate_token::<P>).post(provision_token::<P>),
        )
        .route(TOKEN_CALLBACK_PATH, get(complete_token::<P>))
        .route(TOKEN_REVEAL_PATH, get(reveal_token))
        .route(API_TOKENS_PATH, get(list_tokens::<P>))
        .route(API_TOKEN_PATH, delete(delete_token::<P>))
        .with_state(state.clone());

    let protected = pages
        .merge(tokens)
        .route_layer(from_fn_with_state(state.clone(), require_login::<P>));

    Router::new()
        .route(LOGIN_PATH, get(login::<P>))
        .route(LOGIN_CALLBACK_PATH, get(login_callback::<P>))
        .route(LOGOUT_PATH, delete(logout))
        .with_state(state)
        .merge(protected)
}

/// Login guard for console pages.
///
/// Requests carrying an `id_token` pass through. Browser navigations without
/// one are sent to the login entry point; anything else gets a 401.
pub async fn require_login<P: ClientProvisioner>(
    State(state): State<AppState<P>>,
    jar: PrivateCookieJar,
    request: Request,
    next: Next,
) -> Response {
    if cookies::session(&jar).is_authenticated() {
        return next.run(request).await;
    }

    if !matches!(*request.method(), Method::GET | Method::HEAD) {
        return AuthError::Unauthenticated.into_response();
    }

    let path = request.uri().path();
    let jar = if is_below(path, &state.settings.settings_redirect) {
        cookies::set(
            jar,
            cookies::SHOULD_REDIRECT_TO_SETTINGS,
            "true",
            &state.settings.hint_cookie(),
        )
    } else {
        jar
    };

    tracing::debug!(path = %path, "Unauthenticated request, redirecting to login");
    (jar, Redirect::to(LOGIN_PATH)).into_response()
}

/// `path` is `prefix` itself or one of its sub-paths.
fn is_below(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Renders a failed flow, sending aborted ones to the configured error page.
fn flow_failure<P>(state: &AppState<P>, jar: PrivateCookieJar, err: AuthError) -> Response {
    (jar, err.into_response_with(&state.settings.error_redirect)).into_response()
}

// ── Login ──────────────────────────────────────────────────────────

async fn login<P: ClientProvisioner>(
    State(state): State<AppState<P>>,
    jar: PrivateCookieJar,
) -> Response {
    let auth_req = match state
        .oidc
        .authorization_url(&state.web_client, &state.settings.login_callback)
        .await
    {
        Ok(auth_req) => auth_req,
        Err(e) => return flow_failure(&state, jar, e.into()),
    };

    let jar = cookies::set(
        jar,
        cookies::STATE,
        &auth_req.state,
        &state.settings.transient_cookie(),
    );

    (jar, Redirect::to(&auth_req.url)).into_response()
}

// ── Callbacks ──────────────────────────────────────────────────────

#[derive(Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

impl CallbackParams {
    /// Provider error and missing code, checked before anything else.
    fn code(&self) -> Result<&str, AuthError> {
        if let Some(error) = &self.error {
            let desc = self.error_description.as_deref().unwrap_or("Unknown error");
            tracing::warn!(error = %error, description = %desc, "Authorization error from provider");
            return Err(AuthError::Callback(error.clone()));
        }
        self.code
            .as_deref()
            .filter(|c| !c.is_empty())
            .ok_or_else(|| AuthError::Callback("missing_code".into()))
    }
}

async fn login_callback<P: ClientProvisioner>(
    State(state): State<AppState<P>>,
    jar: PrivateCookieJar,
    Query(params): Query<CallbackParams>,
) -> Response {
    let stored_state = cookies::get(&jar, cookies::STATE);
    let jar = cookies::delete(jar, cookies::STATE, TRANSIENT_PATH);

    let id_token = match finish_login(&state, stored_state.as_deref(), &params).await {
        Ok(id_token) => id_token,
        Err(e) => return flow_failure(&state, jar, e),
    };

    let jar = cookies::set(
        jar,
        cookies::ID_TOKEN,
        &id_token,
        &state.settings.session_cookie(),
    );

    tracing::info!("Console login successful");

    if cookies::get(&jar, cookies::SHOULD_REDIRECT_TO_SETTINGS).is_some() {
        let jar = cookies::delete(jar, cookies::SHOULD_REDIRECT_TO_SETTINGS, "/");
        return (jar, Redirect::to(&state.settings.settings_redirect)).into_response();
    }

    (jar, Redirect::to(&state.settings.login_redirect)).into_response()
}

async fn finish_login<P: ClientProvisioner>(
    state: &AppState<P>,
    stored_state: Option<&str>,
    params: &CallbackParams,
) -> Result<String, AuthError> {
    let code = params.code()?;
    csrf::validate_state(stored_state, params.state.as_deref())?;

    let tokens = state
        .oidc
        .exchange_code(&state.web_client, code, &state.settings.login_callback)
        .await?;

    tokens
        .id_token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AuthError::Callback("missing_id_token".into()))
}

// ── Logout ─────────────────────────────────────────────────────────

async fn logout(jar: PrivateCookieJar) -> (PrivateCookieJar, StatusCode) {
    let jar = cookies::delete(jar, cookies::ID_TOKEN, "/");
    let jar = cookies::delete(jar, cookies::SHOULD_REDIRECT_TO_SETTINGS, "/");
    let jar = cookies::delete(jar, cookies::REFRESH_TOKEN, TRANSIENT_PATH);
    (jar, StatusCode::NO_CONTENT)
}

// ── Personal access tokens ─────────────────────────────────────────

#[derive(Deserialize)]
struct ProvisionRequest {
    name: String,
    /// Base64 of the secret the new client should use.
    secret: String,
}

#[derive(Serialize)]
struct ProvisionedClient {
    secret: String,
    client_id: String,
}

async fn provision_token<P: ClientProvisioner>(
    State(state): State<AppState<P>>,
    Json(body): Json<ProvisionRequest>,
) -> Result<Json<ProvisionedClient>, AuthError> {
    let name = body.name.trim();
    if name.is_empty() {
        return Err(AuthError::BadRequest("name is required".into()));
    }
    let secret = decode_secret(&body.secret)?;
    if secret.is_empty() {
        return Err(AuthError::BadRequest("secret is required".into()));
    }

    match state
        .tokens
        .provision(name, secret, &state.settings.token_callback)
        .await
    {
        Provisioning::Provisioned(registration) => {
            tracing::info!(client_id = %registration.client_id(), "Client provisioned");
            Ok(Json(ProvisionedClient {
                secret: registration.client_secret().to_string(),
                client_id: registration.client_id().to_string(),
            }))
        }
        Provisioning::ProvisioningFailed(reason) => Err(AuthError::Provisioning(reason)),
    }
}

/// The browser sends the secret as standard base64.
fn decode_secret(encoded: &str) -> Result<String, AuthError> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|_| AuthError::BadRequest("secret must be base64".into()))?;
    String::from_utf8(bytes).map_err(|_| AuthError::BadRequest("secret must be UTF-8".into()))
}

#[derive(Deserialize)]
struct InitiateParams {
    description: String,
}

async fn initiate_token<P: ClientProvisioner>(
    State(state): State<AppState<P>>,
    jar: PrivateCookieJar,
    Query(params): Query<InitiateParams>,
) -> Response {
    let description = params.description.trim();
    if description.is_empty() {
        return AuthError::BadRequest("description is required".into()).into_response();
    }

    let pending = match state
        .tokens
        .initiate(description, &state.settings.token_callback)
        .await
    {
        Ok(pending) => pending,
        Err(e) => return flow_failure(&state, jar, e.into()),
    };

    let options = state.settings.transient_cookie();
    let jar = cookies::set(jar, cookies::STATE, &pending.authorization.state, &options);
    let jar = cookies::set(jar, cookies::CLIENT_ID, pending.registration.client_id(), &options);
    let jar = cookies::set(
        jar,
        cookies::CLIENT_SECRET,
        pending.registration.client_secret(),
        &options,
    );

    (jar, Redirect::to(&pending.authorization.url)).into_response()
}

async fn complete_token<P: ClientProvisioner>(
    State(state): State<AppState<P>>,
    jar: PrivateCookieJar,
    Query(params): Query<CallbackParams>,
) -> Response {
    let stored_state = cookies::get(&jar, cookies::STATE);
    let client_id = cookies::get(&jar, cookies::CLIENT_ID);
    let client_secret = cookies::get(&jar, cookies::CLIENT_SECRET);

    let jar = cookies::delete(jar, cookies::STATE, TRANSIENT_PATH);
    let jar = cookies::delete(jar, cookies::CLIENT_SECRET, TRANSIENT_PATH);

    let issued = match finish_token(&state, stored_state, client_id, client_secret, &params).await {
        Ok(issued) => issued,
        Err(e) => {
            let jar = cookies::delete(jar, cookies::CLIENT_ID, TRANSIENT_PATH);
            return flow_failure(&state, jar, e);
        }
    };

    // Held until the settings page asks for the one-time reveal.
    let options = state.settings.transient_cookie();
    let jar = cookies::set(jar, cookies::CLIENT_ID, &issued.client_id, &options);
    let jar = cookies::set(jar, cookies::REFRESH_TOKEN, &issued.refresh_token, &options);

    (jar, Redirect::to(&state.settings.settings_redirect)).into_response()
}

async fn finish_token<P: ClientProvisioner>(
    state: &AppState<P>,
    stored_state: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
    params: &CallbackParams,
) -> Result<IssuedToken, AuthError> {
    let code = params.code()?;
    let (Some(client_id), Some(client_secret)) = (client_id, client_secret) else {
        return Err(AuthError::Callback("missing_client".into()));
    };
    let registration = OidcClientRegistration::new(client_id, client_secret);

    Ok(state
        .tokens
        .complete(
            &registration,
            code,
            stored_state.as_deref(),
            params.state.as_deref(),
            &state.settings.token_callback,
        )
        .await?)
}

#[derive(Serialize)]
struct RevealedToken {
    client_id: String,
    refresh_token: String,
}

async fn reveal_token(jar: PrivateCookieJar) -> Response {
    let client_id = cookies::get(&jar, cookies::CLIENT_ID);
    let refresh_token = cookies::get(&jar, cookies::REFRESH_TOKEN);

    let jar = cookies::delete(jar, cookies::CLIENT_ID, TRANSIENT_PATH);
    let jar = cookies::delete(jar, cookies::REFRESH_TOKEN, TRANSIENT_PATH);

    match (client_id, refresh_token) {
        (Some(client_id), Some(refresh_token)) => (
            jar,
            [(CACHE_CONTROL, "no-store")],
            Json(RevealedToken {
                client_id,
                refresh_token,
            }),
        )
            .into_response(),
        _ => (jar, ApiError::NotFound).into_response(),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListParams {
    login_id: LoginId,
}

async fn list_tokens<P: ClientProvisioner>(
    State(state): State<AppState<P>>,
    AuthenticatedApi(config): AuthenticatedApi,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<PersonalAccessToken>>, ApiError> {
    Ok(Json(state.tokens.list(&config, &params.login_id).await?))
}

async fn delete_token<P: ClientProvisioner>(
    State(state): State<AppState<P>>,
    AuthenticatedApi(config): AuthenticatedApi,
    Path(token_id): Path<TokenId>,
) -> Result<StatusCode, ApiError> {
    state.tokens.delete(&config, &token_id).await?;
    tracing::info!(token_id = %token_id, "Personal access token deleted");
    Ok(StatusCode::NO_CONTENT)
}
