use std::env;

use axum::Router;
use axum::extract::Query;
use axum::response::Html;
use axum::routing::get;
use console_auth::middleware::{ConsoleAuthConfig, ERROR_PAGE, console_router};
use console_auth::provisioner::{DexProvisioner, DexSettings};
use serde::Deserialize;
use tokio::net::TcpListener;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

fn env_bool(name: &str, default: bool) -> bool {
    match env::var(name) {
        Ok(v) => matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"),
        Err(_) => default,
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if env_bool("LOG_JSON", false) {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = sigterm.recv() => {}
                    _ = tokio::signal::ctrl_c() => {}
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler unavailable, waiting for ctrl-c");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[derive(Deserialize)]
struct ErrorParams {
    error: Option<String>,
}

async fn error_page(Query(params): Query<ErrorParams>) -> Html<String> {
    let code = params.error.unwrap_or_else(|| "unknown".into());
    let code: String = code
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();
    Html(format!(
        "<h1>Sign-in failed</h1><p>Error: <code>{code}</code></p><p><a href=\"/auth\">Try again</a></p>"
    ))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

    let config = ConsoleAuthConfig::from_env()?;
    let provisioner = DexProvisioner::connect(&DexSettings::from_env()?).await?;

    let pages = Router::new()
        .route("/", get(|| async { Html("<h1>Console</h1>") }))
        .route("/settings", get(|| async { Html("<h1>Settings</h1>") }));

    let app = console_router(config, provisioner, pages).route(ERROR_PAGE, get(error_page));

    let listener = TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "console-auth listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_shutdown_signal())
        .await?;

    tracing::info!("console-auth stopped");
    Ok(())
}
