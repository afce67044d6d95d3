//! Session cookie contract.
//!
//! The core decides *what* happens to the cookie (`CookieAction`); the HTTP
//! boundary renders it with [`SessionCookie`].

use cookie::{Cookie, SameSite, time::OffsetDateTime};

use crate::Session;

/// Cookie side effect of an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CookieAction {
    /// Issue a cookie carrying this session's token.
    Set(Session),
    /// Remove the cookie.
    Clear,
    /// Leave it alone.
    Keep,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookiePolicy {
    pub name: String,
    pub path: String,
    /// Off only in development environments.
    pub secure: bool,
}

impl Default for CookiePolicy {
    fn default() -> Self {
        Self {
            name: "quayside_session".to_string(),
            path: "/".to_string(),
            secure: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SessionCookie {
    policy: CookiePolicy,
}

impl SessionCookie {
    pub fn new(policy: CookiePolicy) -> Self {
        Self { policy }
    }

    pub fn name(&self) -> &str {
        &self.policy.name
    }

    fn base(&self, value: String) -> Cookie<'static> {
        Cookie::build((self.policy.name.clone(), value))
            .path(self.policy.path.clone())
            .http_only(true)
            .secure(self.policy.secure)
            .same_site(SameSite::Strict)
            .build()
    }

    /// `Set-Cookie` value for a freshly issued session.
    pub fn issue(&self, session: &Session) -> String {
        let mut cookie = self.base(session.token.clone());
        if let Ok(at) = OffsetDateTime::from_unix_timestamp(session.expires_at.timestamp()) {
            cookie.set_expires(at);
        }
        cookie.to_string()
    }

    /// `Set-Cookie` value that removes the session cookie.
    pub fn clear(&self) -> String {
        let mut cookie = self.base(String::new());
        cookie.make_removal();
        cookie.to_string()
    }

    /// Rendered `Set-Cookie` value for an action, if any.
    pub fn render(&self, action: &CookieAction) -> Option<String> {
        match action {
            CookieAction::Set(session) => Some(self.issue(session)),
            CookieAction::Clear => Some(self.clear()),
            CookieAction::Keep => None,
        }
    }

    /// Session token from a `Cookie` request header.
    pub fn token_from_header(&self, header: &str) -> Option<String> {
        Cookie::split_parse(header)
            .filter_map(Result::ok)
            .find(|c| c.name() == self.policy.name)
            .map(|c| c.value().trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use quayside_core::AccountId;

    use super::*;

    fn session() -> Session {
        Session {
            token: "abc123".to_string(),
            account_id: AccountId::new(),
            expires_at: Utc.with_ymd_and_hms(2030, 1, 2, 3, 4, 5).unwrap(),
        }
    }

    #[test]
    fn issued_cookie_carries_the_hardening_attributes() {
        let rendered = SessionCookie::default().issue(&session());
        assert!(rendered.starts_with("quayside_session=abc123"));
        assert!(rendered.contains("HttpOnly"));
        assert!(rendered.contains("SameSite=Strict"));
        assert!(rendered.contains("Secure"));
        assert!(rendered.contains("Path=/"));
        assert!(rendered.contains("Expires=Wed, 02 Jan 2030 03:04:05 GMT"));
    }

    #[test]
    fn development_cookies_are_not_secure() {
        let cookie = SessionCookie::new(CookiePolicy {
            secure: false,
            ..CookiePolicy::default()
        });
        assert!(!cookie.issue(&session()).contains("Secure"));
    }

    #[test]
    fn clearing_empties_and_expires_the_cookie() {
        let rendered = SessionCookie::default().clear();
        assert!(rendered.starts_with("quayside_session=;"));
        assert!(rendered.contains("Max-Age=0"));
    }

    #[test]
    fn token_is_read_among_other_cookies() {
        let cookie = SessionCookie::default();
        assert_eq!(
            cookie.token_from_header("theme=dark; quayside_session=tok; lang=fr"),
            Some("tok".to_string())
        );
        assert_eq!(cookie.token_from_header("theme=dark"), None);
        assert_eq!(cookie.token_from_header("quayside_session="), None);
    }

    #[test]
    fn keep_renders_nothing() {
        assert_eq!(SessionCookie::default().render(&CookieAction::Keep), None);
    }
}
