pub mod callback;
pub mod login;
pub mod status;

use axum::http::{HeaderMap, header};

/// Cookie correlating the authorization redirect with its callback.
pub(crate) const STATE_COOKIE: &str = "handoff_state";
/// Random state value length.
pub(crate) const STATE_LENGTH: usize = 32;
/// Lifetime of the state cookie, seconds.
const STATE_MAX_AGE: i64 = 600;

/// `Set-Cookie` value holding the login state.
pub(crate) fn state_cookie(value: &str) -> String {
    format!(
        "{STATE_COOKIE}={value}; Path=/; Max-Age={STATE_MAX_AGE}; HttpOnly; SameSite=Lax; Secure"
    )
}

/// `Set-Cookie` value discarding the login state after the callback.
pub(crate) fn clear_state_cookie() -> String {
    format!("{STATE_COOKIE}=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax; Secure")
}

/// Extract the state value from the request `Cookie` header, if any.
pub(crate) fn read_state_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::COOKIE)?
        .to_str()
        .ok()?
        .split(';')
        .map(str::trim)
        .find_map(|pair| pair.strip_prefix(STATE_COOKIE)?.strip_prefix('='))
        .map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn state_cookie_round_trips() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("other=1; handoff_state=xyz42; theme=dark"),
        );

        assert_eq!(read_state_cookie(&headers), Some("xyz42".to_owned()));
    }

    #[test]
    fn missing_cookie_yields_none() {
        assert_eq!(read_state_cookie(&HeaderMap::new()), None);

        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("other=1"));
        assert_eq!(read_state_cookie(&headers), None);
    }
}
