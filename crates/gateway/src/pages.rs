//! The four HTML views the gateway can answer with.
//!
//! Tokens are never a template input: the authenticated page only knows
//! where to send the user, the API call happens server-side.

use askama::Template;

/// Outcome of routing one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Page {
    /// Logout control and the API test button.
    Authenticated,
    LoggedOut,
    /// Link to the provider's consent page.
    Login { authorization_url: String },
    /// Terminal page shown in the window the provider redirected to.
    CallbackResult { authorized: bool },
}

#[derive(Template)]
#[template(path = "authenticated.html")]
struct AuthenticatedTemplate<'a> {
    entry_url: &'a str,
    api_url: &'a str,
}

#[derive(Template)]
#[template(path = "logged_out.html")]
struct LoggedOutTemplate<'a> {
    entry_url: &'a str,
}

#[derive(Template)]
#[template(path = "login.html")]
struct LoginTemplate<'a> {
    authorization_url: &'a str,
}

#[derive(Template)]
#[template(path = "callback.html")]
struct CallbackTemplate {
    authorized: bool,
}

impl Page {
    /// Render to HTML. `entry_url` is the gateway's externally visible root.
    pub fn render(&self, entry_url: &str) -> Result<String, askama::Error> {
        match self {
            Self::Authenticated => {
                let api_url = format!("{}api/test", ensure_trailing_slash(entry_url));
                AuthenticatedTemplate {
                    entry_url,
                    api_url: &api_url,
                }
                .render()
            },
            Self::LoggedOut => LoggedOutTemplate { entry_url }.render(),
            Self::Login { authorization_url } => LoginTemplate { authorization_url }.render(),
            Self::CallbackResult { authorized } => CallbackTemplate {
                authorized: *authorized,
            }
            .render(),
        }
    }
}

fn ensure_trailing_slash(url: &str) -> String {
    if url.ends_with('/') {
        url.to_string()
    } else {
        format!("{url}/")
    }
}
