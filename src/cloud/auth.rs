//! Sign-in state for cloud features.
//!
//! Tokens come from an external identity provider; this module only stores
//! them, reads their claims and notices when they expire. Signature checks
//! happen server side.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use url::Url;

use crate::persistence::persist::{AUTH_KEY, LocalStore};
use crate::persistence::settings::AuthSettings;

/// Tokens are treated as expired this many seconds early to absorb clock skew.
pub const EXPIRY_SKEW_SECS: i64 = 60;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tokens {
    pub access_token: String,
    #[serde(default)]
    pub id_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

fn now_unix() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

/// The JSON payload of a JWT, without verifying anything.
pub fn decode_token(token: &str) -> Option<Value> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// The `sub` claim, i.e. the user id the token was issued for.
pub fn token_subject(token: &str) -> Option<String> {
    decode_token(token)?.get("sub")?.as_str().map(str::to_string)
}

pub fn is_token_expired_at(token: &str, now: i64) -> bool {
    let exp = decode_token(token).and_then(|claims| claims.get("exp").and_then(Value::as_f64));
    // compared as f64: `exp` is untrusted and may be far outside the i64 range
    match exp {
        Some(exp) => now as f64 >= exp - EXPIRY_SKEW_SECS as f64,
        None => true,
    }
}

/// Missing, malformed or soon-to-expire tokens all count as expired.
pub fn is_token_expired(token: &str) -> bool {
    is_token_expired_at(token, now_unix())
}

fn hosted_ui_url(settings: &AuthSettings, path: &str) -> anyhow::Result<Url> {
    Ok(Url::parse(&format!("https://{}/{}", settings.cognito_domain, path))?)
}

/// Hosted UI login page for the authorization code flow.
pub fn login_url(settings: &AuthSettings) -> anyhow::Result<Url> {
    let mut url = hosted_ui_url(settings, "login")?;
    url.query_pairs_mut()
        .append_pair("client_id", &settings.client_id)
        .append_pair("response_type", "code")
        .append_pair("scope", &settings.scope)
        .append_pair("redirect_uri", &settings.redirect_uri);
    Ok(url)
}

pub fn logout_url(settings: &AuthSettings) -> anyhow::Result<Url> {
    let mut url = hosted_ui_url(settings, "logout")?;
    url.query_pairs_mut()
        .append_pair("client_id", &settings.client_id)
        .append_pair("logout_uri", &settings.redirect_uri);
    Ok(url)
}

#[derive(Debug, Default)]
pub struct AuthSession {
    tokens: Option<Tokens>,
    user: Option<Value>,
    storage: Option<LocalStore>,
}

impl AuthSession {
    /// A signed-out session that persists nothing.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Restore tokens saved by a previous run. Expired or unreadable tokens are discarded.
    pub fn restore(storage: LocalStore) -> Self {
        let stored: Option<Tokens> = match storage.get_json(AUTH_KEY) {
            Ok(t) => t,
            Err(e) => {
                log::warn!("discarding unreadable auth state: {}", e);
                None
            }
        };
        let mut session = Self { tokens: None, user: None, storage: Some(storage) };
        match stored {
            Some(tokens) if !is_token_expired(&tokens.access_token) => {
                session.user = decode_token(&tokens.id_token);
                session.tokens = Some(tokens);
            }
            Some(_) => session.forget_persisted(),
            None => {}
        }
        session
    }

    pub fn set_tokens(&mut self, tokens: Tokens) {
        if let Some(storage) = &self.storage
            && let Err(e) = storage.set_json(AUTH_KEY, &tokens)
        {
            log::warn!("could not persist auth tokens: {}", e);
        }
        self.user = decode_token(&tokens.id_token);
        self.tokens = Some(tokens);
    }

    pub fn is_authenticated(&self) -> bool {
        self.tokens.is_some()
    }

    /// Claims of the id token (email, name, sub...).
    pub fn user_claims(&self) -> Option<&Value> {
        self.user.as_ref()
    }

    /// A usable access token, or `None` after logging out if it has expired.
    pub fn access_token(&mut self) -> Option<String> {
        self.access_token_at(now_unix())
    }

    pub fn access_token_at(&mut self, now: i64) -> Option<String> {
        let token = self.tokens.as_ref()?.access_token.clone();
        if is_token_expired_at(&token, now) {
            log::info!("access token expired, signing out");
            self.logout();
            return None;
        }
        Some(token)
    }

    pub fn logout(&mut self) {
        self.tokens = None;
        self.user = None;
        self.forget_persisted();
    }

    fn forget_persisted(&self) {
        if let Some(storage) = &self.storage
            && let Err(e) = storage.remove(AUTH_KEY)
        {
            log::warn!("could not clear persisted auth tokens: {}", e);
        }
    }
}
