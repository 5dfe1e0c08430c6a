//! Handoff orchestration.
//!
//! Boundary of the token core: given the outcome of the user lookup, pick
//! the record variant, run encoder and signer, and produce the redirect the
//! browser is sent to. The receiving application owns both redirect targets
//! and parses the `t` parameter itself.

use chrono::{DateTime, Utc};

use crate::term::{self, EncodingError};
use crate::token::{Operation, TokenSigner};

/// Redirect target for an existing user.
const LOGIN_PATH: &str = "/session/new";
/// Redirect target for an email without a user row.
const SIGNUP_PATH: &str = "/users/new";
/// Query parameter carrying the token.
const TOKEN_PARAM: &str = "t";

/// Record variant selected from the user lookup result.
#[derive(Debug, Clone, PartialEq)]
pub enum Handoff {
    /// Session handoff for a known user.
    Login {
        user_id: i32,
        last_login_at: DateTime<Utc>,
    },
    /// Registration handoff for a new email.
    Signup { email: String },
}

impl Handoff {
    fn operation(&self) -> Operation {
        match self {
            Handoff::Login { .. } => Operation::Login,
            Handoff::Signup { .. } => Operation::Signup,
        }
    }

    fn redirect_path(&self) -> &'static str {
        match self {
            Handoff::Login { .. } => LOGIN_PATH,
            Handoff::Signup { .. } => SIGNUP_PATH,
        }
    }
}

/// Build the signed token for `handoff` and return the redirect location
/// carrying it.
///
/// `issued_at` becomes the payload creation timestamp; callers pass
/// [`Utc::now`] outside of tests. Either a complete token is embedded or an
/// error is returned, never a partial one.
pub fn issue(
    signer: &TokenSigner,
    handoff: &Handoff,
    issued_at: DateTime<Utc>,
) -> Result<String, EncodingError> {
    let payload = match handoff {
        Handoff::Login {
            user_id,
            last_login_at,
        } => term::encode_login(*user_id, *last_login_at, issued_at).to_vec(),
        Handoff::Signup { email } => term::encode_signup(email, issued_at)?,
    };

    let token = signer.sign(&payload, handoff.operation());

    Ok(format!("{}?{TOKEN_PARAM}={}", handoff.redirect_path(), token))
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use chrono::TimeZone;

    fn signer() -> TokenSigner {
        TokenSigner::new(b"an-integration-test-secret".to_vec()).unwrap()
    }

    #[test]
    fn known_user_is_sent_to_session_creation() {
        let now = Utc.with_ymd_and_hms(2023, 6, 1, 12, 0, 0).unwrap();
        let handoff = Handoff::Login {
            user_id: 2,
            last_login_at: Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap(),
        };

        let location = issue(&signer(), &handoff, now).unwrap();
        let token = location.strip_prefix("/session/new?t=").unwrap();

        // The embedded payload is exactly the encoder output.
        let payload_segment = token.split('.').nth(1).unwrap();
        let payload = URL_SAFE_NO_PAD.decode(payload_segment).unwrap();
        assert_eq!(
            payload,
            term::encode_login(2, Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap(), now),
        );
    }

    #[test]
    fn unknown_email_is_sent_to_registration() {
        let now = Utc::now();
        let handoff = Handoff::Signup {
            email: "a@b.com".into(),
        };

        let location = issue(&signer(), &handoff, now).unwrap();
        assert!(location.starts_with("/users/new?t="));

        let token = location.strip_prefix("/users/new?t=").unwrap();
        assert_eq!(token.split('.').count(), 3);
    }

    #[test]
    fn issuing_twice_with_a_frozen_clock_is_identical() {
        let now = Utc.with_ymd_and_hms(2023, 6, 1, 12, 0, 0).unwrap();
        let signer = signer();
        let handoff = Handoff::Signup {
            email: "repeat@example.org".into(),
        };

        assert_eq!(
            issue(&signer, &handoff, now).unwrap(),
            issue(&signer, &handoff, now).unwrap(),
        );
    }
}
