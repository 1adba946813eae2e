//! Authenticated-session state
//!
//! One session per device connection, established lazily before the first
//! authenticated call and reused until logout. The session captures the
//! credentials it was established with; a credential update on the client
//! only affects the next login, never a live session.

use chrono::{DateTime, Utc};

use osprey_common::Credentials;

/// Vendor-specific proof of authentication
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionToken {
    /// Anti-forgery token returned in a response header, echoed on every
    /// subsequent request (Dell iDRAC)
    Xsrf(String),
    /// Session cookie value (vendors that only hand back `Set-Cookie`)
    Cookie(String),
    /// Authenticated SSH channel; the handle itself is the proof
    Ssh,
}

/// A live authenticated session for one device
#[derive(Debug, Clone)]
pub struct Session {
    pub token: SessionToken,
    /// Credentials this session was established with (immutable snapshot)
    pub credentials: Credentials,
    pub established_at: DateTime<Utc>,
}

impl Session {
    pub fn new(token: SessionToken, credentials: Credentials) -> Self {
        Self {
            token,
            credentials,
            established_at: Utc::now(),
        }
    }

    /// Headers every authenticated request must carry for this session
    pub fn auth_headers(&self) -> Vec<(&'static str, &str)> {
        match &self.token {
            SessionToken::Xsrf(token) => vec![("XSRF-TOKEN", token.as_str())],
            SessionToken::Cookie(_) | SessionToken::Ssh => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xsrf_session_headers() {
        let session = Session::new(
            SessionToken::Xsrf("abc123".to_string()),
            Credentials::new("root", "calvin"),
        );
        assert_eq!(session.auth_headers(), vec![("XSRF-TOKEN", "abc123")]);
    }

    #[test]
    fn test_cookie_session_has_no_extra_headers() {
        // The cookie store replays Set-Cookie values; nothing to add per call.
        let session = Session::new(
            SessionToken::Cookie("sid=42".to_string()),
            Credentials::new("root", "calvin"),
        );
        assert!(session.auth_headers().is_empty());
    }

    #[test]
    fn test_session_snapshots_credentials() {
        let creds = Credentials::new("root", "calvin");
        let session = Session::new(SessionToken::Ssh, creds.clone());
        assert_eq!(session.credentials, creds);
    }
}
