use {
    axum::http::{HeaderMap, HeaderName},
    axum_extra::extract::cookie::{Cookie, CookieJar, SameSite},
    tracing::debug,
};

use crate::error::GatewayError;

/// Cookie carrying the gateway-issued user id.
pub const USER_COOKIE: &str = "snowgate_uid";

const MAX_USER_ID_LEN: usize = 128;

// ── Types ────────────────────────────────────────────────────────────────────

/// Where the per-request user identity comes from.
#[derive(Debug, Clone)]
pub enum IdentitySource {
    /// Opaque id issued by the gateway in an `HttpOnly` cookie.
    Cookie { secure: bool },
    /// Header set by a trusted authenticating proxy.
    Header(HeaderName),
}

// ── Helpers ──────────────────────────────────────────────────────────────────

/// User ids key the credential store, so keep them short and printable.
pub fn is_valid_user_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_USER_ID_LEN
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '@'))
}

fn issue_cookie(jar: CookieJar, secure: bool) -> (CookieJar, String) {
    let id = uuid::Uuid::new_v4().to_string();
    let cookie = Cookie::build((USER_COOKIE, id.clone()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .permanent()
        .build();
    debug!(user = %id, "issued user identity cookie");
    (jar.add(cookie), id)
}

// ── Identity resolution ──────────────────────────────────────────────────────

impl IdentitySource {
    /// Resolve from config: a configured header wins over cookies.
    pub fn from_config(user_header: Option<&str>, secure: bool) -> anyhow::Result<Self> {
        match user_header.map(str::trim).filter(|h| !h.is_empty()) {
            Some(name) => Ok(Self::Header(HeaderName::try_from(name).map_err(|e| {
                anyhow::anyhow!("invalid gateway.user_header `{name}`: {e}")
            })?)),
            None => Ok(Self::Cookie { secure }),
        }
    }

    /// Identify the caller. The returned jar must be sent back with the
    /// response so a freshly issued cookie reaches the browser.
    pub fn identify(
        &self,
        headers: &HeaderMap,
        jar: CookieJar,
    ) -> Result<(CookieJar, String), GatewayError> {
        match self {
            Self::Header(name) => {
                let id = headers
                    .get(name)
                    .and_then(|v| v.to_str().ok())
                    .map(str::trim)
                    .filter(|id| is_valid_user_id(id))
                    .ok_or(GatewayError::MissingIdentity)?;
                Ok((jar, id.to_string()))
            },
            Self::Cookie { secure } => {
                let existing = jar
                    .get(USER_COOKIE)
                    .map(|c| c.value().to_string())
                    .filter(|id| is_valid_user_id(id));
                match existing {
                    Some(id) => Ok((jar, id)),
                    None => Ok(issue_cookie(jar, *secure)),
                }
            },
        }
    }
}
