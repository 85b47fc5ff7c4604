//! Session cookies issued by the login endpoint.
//!
//! The service authenticates API calls with two cookies set by its access
//! gateway. They live only in memory for as long as the client does.

use std::fmt;

use crate::http::HttpResponse;

pub const SESSION_COOKIE: &str = "MRHSession";
pub const LAST_SESSION_COOKIE: &str = "LastMRH_Session";

/// The two cookie values that make a client authenticated.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionState {
    pub mrh_session: String,
    pub last_mrh_session: String,
}

impl SessionState {
    pub fn new(mrh_session: impl Into<String>, last_mrh_session: impl Into<String>) -> Self {
        Self {
            mrh_session: mrh_session.into(),
            last_mrh_session: last_mrh_session.into(),
        }
    }

    /// Value for the `Cookie` request header.
    pub fn cookie_header(&self) -> String {
        format!(
            "{SESSION_COOKIE}={}; {LAST_SESSION_COOKIE}={}; isLogged=true",
            self.mrh_session, self.last_mrh_session
        )
    }

    /// Pull both session cookies out of a login response.
    ///
    /// Returns the name of the first missing cookie on failure.
    pub fn from_response(response: &HttpResponse) -> Result<Self, &'static str> {
        let mut mrh = None;
        let mut last = None;
        for raw in response.header_values("set-cookie") {
            let Some((name, value)) = parse_set_cookie(raw) else {
                continue;
            };
            // Later headers win, matching how a browser cookie jar behaves.
            match name {
                SESSION_COOKIE => mrh = Some(value.to_string()),
                LAST_SESSION_COOKIE => last = Some(value.to_string()),
                _ => {}
            }
        }
        let mrh = mrh.filter(|v| !v.is_empty()).ok_or(SESSION_COOKIE)?;
        let last = last.filter(|v| !v.is_empty()).ok_or(LAST_SESSION_COOKIE)?;
        Ok(Self::new(mrh, last))
    }
}

impl fmt::Debug for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionState")
            .field("mrh_session", &"<redacted>")
            .field("last_mrh_session", &"<redacted>")
            .finish()
    }
}

/// Name and value of a `Set-Cookie` header, ignoring its attributes.
fn parse_set_cookie(raw: &str) -> Option<(&str, &str)> {
    let pair = raw.split(';').next()?;
    let (name, value) = pair.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((name, value.trim().trim_matches('"')))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn login_response(cookies: &[&str]) -> HttpResponse {
        HttpResponse {
            status: 200,
            headers: cookies
                .iter()
                .map(|c| ("set-cookie".to_string(), c.to_string()))
                .collect(),
            body: Vec::new(),
        }
    }

    #[test]
    fn extracts_both_cookies_ignoring_attributes() {
        let resp = login_response(&[
            "LastMRH_Session=abc123;path=/;secure",
            "MRHSession=deadbeef; path=/; HttpOnly; secure",
            "F5_ST=1z1z1z; path=/",
        ]);
        let session = SessionState::from_response(&resp).unwrap();
        assert_eq!(session.mrh_session, "deadbeef");
        assert_eq!(session.last_mrh_session, "abc123");
    }

    #[test]
    fn missing_cookie_is_named() {
        let resp = login_response(&["MRHSession=deadbeef; path=/"]);
        assert_eq!(SessionState::from_response(&resp), Err(LAST_SESSION_COOKIE));

        let resp = login_response(&["MRHSession=; path=/", "LastMRH_Session=x"]);
        assert_eq!(SessionState::from_response(&resp), Err(SESSION_COOKIE));
    }

    #[test]
    fn cookie_header_carries_logged_flag() {
        let session = SessionState::new("m", "l");
        assert_eq!(
            session.cookie_header(),
            "MRHSession=m; LastMRH_Session=l; isLogged=true"
        );
    }

    #[test]
    fn debug_output_redacts_values() {
        let session = SessionState::new("secret-a", "secret-b");
        let out = format!("{session:?}");
        assert!(!out.contains("secret-a"));
        assert!(!out.contains("secret-b"));
    }

    #[test]
    fn malformed_set_cookie_lines_are_skipped() {
        assert_eq!(parse_set_cookie("novalue"), None);
        assert_eq!(parse_set_cookie("=x"), None);
        assert_eq!(parse_set_cookie("a=\"q\"; path=/"), Some(("a", "q")));
    }
}
