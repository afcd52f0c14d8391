//! Cookie-backed session store.

use std::time::Duration;

use axum::http::HeaderMap;
use cookie::time::Duration as CookieDuration;
use cookie::{Cookie, SameSite};

use crate::config::{SecretString, SessionConfig};
use crate::crypto::CryptoError;
use crate::http::cookies::request_cookie;
use crate::session::codec::{decrypt_session, encrypt_session};
use crate::session::data::SessionData;

/// Stores sessions in an encrypted cookie.
///
/// Loading never fails: a missing, forged, stale or foreign-secret cookie
/// all produce a fresh empty session.
pub struct CookieSessionStore {
    config: SessionConfig,
    secret: SecretString,
    dev_mode: bool,
}

impl CookieSessionStore {
    pub fn new(config: SessionConfig, secret: SecretString, dev_mode: bool) -> Self {
        Self {
            config,
            secret,
            dev_mode,
        }
    }

    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.config.max_age_secs)
    }

    pub fn cookie_name(&self) -> &str {
        &self.config.cookie_name
    }

    pub(crate) fn secret(&self) -> &SecretString {
        &self.secret
    }

    /// Load the session carried by the request, or a fresh one.
    pub fn load(&self, headers: &HeaderMap) -> SessionData {
        let Some(token) = request_cookie(headers, &self.config.cookie_name) else {
            return SessionData::new(self.max_age());
        };

        match decrypt_session(&token, &self.secret) {
            Ok(data) if !data.is_expired() => data,
            _ => {
                tracing::debug!("Session cookie rejected, starting fresh session");
                SessionData::new(self.max_age())
            }
        }
    }

    /// Encrypt the session into a cookie.
    pub fn save(&self, data: &SessionData) -> Result<Cookie<'static>, CryptoError> {
        let value = encrypt_session(data, &self.secret)?;
        let max_age = i64::try_from(self.config.max_age_secs).unwrap_or(i64::MAX);
        Ok(self.cookie(value, CookieDuration::seconds(max_age)))
    }

    /// A cookie instructing the client to drop the session.
    pub fn clear(&self) -> Cookie<'static> {
        self.cookie(String::new(), CookieDuration::seconds(-1))
    }

    /// Secure flag: explicit config wins, otherwise on outside development mode.
    pub fn is_secure(&self) -> bool {
        self.config.secure.unwrap_or(!self.dev_mode)
    }

    fn cookie(&self, value: String, max_age: CookieDuration) -> Cookie<'static> {
        Cookie::build((self.config.cookie_name.clone(), value))
            .path("/")
            .max_age(max_age)
            .secure(self.is_secure())
            .http_only(self.config.http_only)
            .same_site(parse_same_site(&self.config.same_site))
            .build()
    }
}

/// "Strict" and "None" map to their policies; anything else is Lax.
pub fn parse_same_site(value: &str) -> SameSite {
    match value {
        "Strict" => SameSite::Strict,
        "None" => SameSite::None,
        _ => SameSite::Lax,
    }
}
