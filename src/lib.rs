//! Handoff is an authentication bridge: it authenticates a user against an
//! OIDC identity provider and redirects the browser to a pre-existing web
//! application with a short-lived signed token that application understands.

#[forbid(unsafe_code)]
#[deny(missing_docs, unused_mut)]
mod database;
pub mod error;
pub mod handoff;
mod metrics;
pub mod oidc;
mod router;
pub mod term;
pub mod token;
mod user;

pub mod config;

use std::sync::Arc;
use std::time::Duration;

use axum::http::header;
use axum::routing::get;
use axum::{Router, middleware as AxumMiddleware};
pub use error::ServerError;
pub use crate::metrics::setup_metrics_recorder;
use tower::ServiceBuilder;
use tower_http::LatencyUnit;
use tower_http::sensitive_headers::SetSensitiveHeadersLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{
    DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer,
};

/// Path the provider redirects back to, appended to the public URL.
pub const CALLBACK_PATH: &str = "/oidc/callback";

/// State sharing between routes.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<config::Configuration>,
    pub db: database::Database,
    pub oidc: oidc::OidcClient,
    pub signer: Arc<token::TokenSigner>,
}

/// Create router.
pub fn app(state: AppState) -> Router {
    let middleware = ServiceBuilder::new()
        // Add high level tracing/logging to all requests.
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(tracing::Level::INFO))
                .on_request(DefaultOnRequest::new())
                .on_response(DefaultOnResponse::new().latency_unit(LatencyUnit::Micros)),
        )
        // Set a timeout.
        .layer(TimeoutLayer::new(Duration::from_secs(10)))
        // Remove senstive headers from trace.
        .layer(SetSensitiveHeadersLayer::new([header::AUTHORIZATION, header::COOKIE]));

    Router::new()
        // `GET /status.json` goes to `status`.
        .route("/status.json", get(router::status::status))
        // `GET /login/new` starts the provider round trip.
        .route("/login/new", get(router::login::handler))
        // `GET /oidc/callback` finishes it and hands the session off.
        .route(CALLBACK_PATH, get(router::callback::handler))
        .with_state(state)
        .route_layer(AxumMiddleware::from_fn(crate::metrics::track_metrics))
        .layer(middleware)
}

/// Initialize the application state.
pub async fn initialize_state() -> Result<AppState, Box<dyn std::error::Error>> {
    // read configuration file. let it in memory.
    let config = config::Configuration::default().read()?;

    let db = match config.postgres {
        Some(ref config) => {
            database::Database::new(
                &config.address,
                &config
                    .username
                    .clone()
                    .unwrap_or(database::DEFAULT_CREDENTIALS.into()),
                &config
                    .password
                    .clone()
                    .unwrap_or(database::DEFAULT_CREDENTIALS.into()),
                &config
                    .database
                    .clone()
                    .unwrap_or(database::DEFAULT_DATABASE_NAME.into()),
                config.pool_size.unwrap_or(database::DEFAULT_POOL_SIZE),
            )
            .await?
        },
        None => {
            tracing::error!("missing `postgres` entry on `config.yaml` file");
            std::process::exit(0);
        },
    };

    // the signing secret is shared with the receiving application.
    let Some(handoff) = &config.handoff else {
        tracing::error!("missing `handoff` entry on `config.yaml` file");
        std::process::exit(0);
    };
    let signer = Arc::new(token::TokenSigner::new(handoff.secret.as_bytes())?);

    // discover the identity provider once, at startup.
    let Some(oidc_config) = &config.oidc else {
        tracing::error!("missing `oidc` entry on `config.yaml` file");
        std::process::exit(0);
    };
    let redirect_uri = format!(
        "{}{}",
        config.url.trim_end_matches('/'),
        CALLBACK_PATH,
    );
    let oidc = oidc::OidcClient::discover(oidc_config, redirect_uri).await?;

    Ok(AppState {
        config,
        db,
        oidc,
        signer,
    })
}
