//! Provider callback: finish authentication and hand the session off.

use axum::extract::{Query, State};
use axum::http::{HeaderMap, header};
use axum::response::{IntoResponse, Redirect};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use validator::{ValidateEmail, ValidationError, ValidationErrors};

use crate::error::Result;
use crate::router::{clear_state_cookie, read_state_cookie};
use crate::user::User;
use crate::{AppState, ServerError, handoff};

fn invalid_email() -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    errors.add(
        "email",
        ValidationError::new("invalid_email")
            .with_message("Email claim is malformed.".into()),
    );
    errors
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    code: String,
    state: String,
}

/// Complete the authorization code flow, resolve the email to a user row,
/// and redirect with a fresh handoff token.
pub async fn handler(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
    headers: HeaderMap,
) -> Result<impl IntoResponse> {
    // The callback must carry the state issued on `/login/new`.
    match read_state_cookie(&headers) {
        Some(expected) if expected == query.state => (),
        _ => return Err(ServerError::StateMismatch),
    }

    let tokens = state.oidc.exchange_code(&query.code).await?;
    let email = state.oidc.resolve_email(&tokens.access_token).await?;

    if !email.validate_email() {
        return Err(invalid_email().into());
    }

    let handoff = match User::find_by_email(&state.db.postgres, &email).await? {
        Some(user) => {
            tracing::debug!(user_id = user.id, "user exists, issuing login handoff");
            handoff::Handoff::Login {
                user_id: user.id,
                last_login_at: user
                    .last_login_at
                    .map(|at| at.and_utc())
                    .unwrap_or(DateTime::UNIX_EPOCH),
            }
        },
        None => {
            tracing::debug!("unknown email, issuing signup handoff");
            handoff::Handoff::Signup { email }
        },
    };

    let location = handoff::issue(&state.signer, &handoff, Utc::now())?;

    Ok((
        [(header::SET_COOKIE, clear_state_cookie())],
        Redirect::to(&location),
    ))
}
