//! Axum integration: login, logout and personal access token routes.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use console_auth::middleware::{ConsoleAuthConfig, console_router};
//! use console_auth::provisioner::{DexProvisioner, DexSettings};
//!
//! // 1. Configure from environment
//! let config = ConsoleAuthConfig::from_env()?;
//! let provisioner = DexProvisioner::connect(&DexSettings::from_env()?).await?;
//!
//! // 2. Hand over the console pages; they end up behind the login guard
//! let pages = axum::Router::new().route("/", get(home));
//! let app = console_router(config, provisioner, pages);
//! ```

pub mod cookies;
mod config;
mod error;
mod extractor;
mod routes;
mod state;

pub use config::ConsoleAuthConfig;
pub use error::{AuthError, ERROR_PAGE};
pub use extractor::{AuthenticatedApi, create_authenticated_api_configuration};
pub use routes::{console_router, require_login};
pub use state::AppState;

/// Re-export cookie key type for builder API.
pub use axum_extra::extract::cookie::Key as CookieKey;
