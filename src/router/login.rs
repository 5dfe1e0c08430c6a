//! Login entry point: start the provider round trip.

use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Redirect};
use rand::distributions::{Alphanumeric, DistString};
use rand::rngs::OsRng;

use crate::AppState;
use crate::router::{STATE_LENGTH, state_cookie};

/// Redirect the browser to the provider's authorization endpoint,
/// remembering the CSRF state in a short-lived cookie.
pub async fn handler(State(state): State<AppState>) -> impl IntoResponse {
    let csrf = Alphanumeric.sample_string(&mut OsRng, STATE_LENGTH);
    let location = state.oidc.authorization_url(&csrf);

    tracing::debug!("redirecting to identity provider");

    (
        [(header::SET_COOKIE, state_cookie(&csrf))],
        Redirect::to(&location),
    )
}
