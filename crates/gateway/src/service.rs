//! Request routing, OAuth callback handling and the demo API call, as
//! operations on one service sharing the OAuth client and instance config.

use std::sync::Arc;

use {
    snowgate_oauth::{CallbackParams, OAuthClient},
    tracing::{info, warn},
};

use crate::{api::ServiceNowApi, error::GatewayError, pages::Page};

/// Value of the `action` query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Default,
    Logout,
}

impl Action {
    /// Only the exact value `logout` is recognized.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("logout") => Self::Logout,
            _ => Self::Default,
        }
    }
}

pub struct GatewayService {
    oauth: Arc<dyn OAuthClient>,
    api: ServiceNowApi,
}

impl GatewayService {
    pub fn new(oauth: Arc<dyn OAuthClient>, api: ServiceNowApi) -> Self {
        Self { oauth, api }
    }

    pub fn oauth(&self) -> &Arc<dyn OAuthClient> {
        &self.oauth
    }

    /// Entry point: pick the view for `user` given the requested action.
    pub async fn route(&self, user: &str, action: Action) -> Result<Page, GatewayError> {
        if action != Action::Logout && self.oauth.has_access(user).await {
            return Ok(Page::Authenticated);
        }

        if action == Action::Logout {
            self.oauth.reset(user).await?;
            info!(user, "token is reset");
            return Ok(Page::LoggedOut);
        }

        let authorization_url = self.oauth.authorization_url(user).await?;
        Ok(Page::Login { authorization_url })
    }

    /// Redeem the provider's redirect for `user`.
    pub async fn authorize(
        &self,
        user: &str,
        params: &CallbackParams,
    ) -> Result<(), GatewayError> {
        self.oauth.handle_callback(user, params).await?;
        info!(user, "authorization granted");
        Ok(())
    }

    /// Provider redirect target. Failures end here as the failure page.
    pub async fn callback(&self, user: &str, params: &CallbackParams) -> Page {
        match self.authorize(user, params).await {
            Ok(()) => Page::CallbackResult { authorized: true },
            Err(e) => {
                warn!(user, error = %e, "authorization callback rejected");
                Page::CallbackResult { authorized: false }
            },
        }
    }

    /// The demo REST call. Errors are returned to the caller untouched.
    pub async fn api_test(&self, user: &str) -> Result<String, GatewayError> {
        let token = self
            .oauth
            .access_token(user)
            .await
            .map_err(|_| GatewayError::NotAuthorized)?;
        self.api.user_groups(&token).await
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::{
            Mutex,
            atomic::{AtomicUsize, Ordering},
        },
    };

    use {
        super::*,
        async_trait::async_trait,
        secrecy::Secret,
        snowgate_oauth::CallbackError,
    };

    const GOOD_CODE: &str = "good-code";

    /// In-memory stand-in: one pending state per user, fixed good code.
    #[derive(Default)]
    struct FakeOAuth {
        tokens: Mutex<HashMap<String, String>>,
        pending: Mutex<HashMap<String, String>>,
        resets: AtomicUsize,
    }

    impl FakeOAuth {
        fn with_token(user: &str, token: &str) -> Self {
            let fake = Self::default();
            fake.tokens
                .lock()
                .unwrap()
                .insert(user.into(), token.into());
            fake
        }

        fn token(&self, user: &str) -> Option<String> {
            self.tokens.lock().unwrap().get(user).cloned()
        }
    }

    #[async_trait]
    impl OAuthClient for FakeOAuth {
        async fn authorization_url(&self, user: &str) -> anyhow::Result<String> {
            let mut pending = self.pending.lock().unwrap();
            let n = pending.len();
            let state = pending
                .entry(user.to_string())
                .or_insert_with(|| format!("state-{n}"));
            Ok(format!(
                "https://dev.service-now.com/oauth_auth.do?response_type=code&state={state}"
            ))
        }

        async fn has_access(&self, user: &str) -> bool {
            self.token(user).is_some()
        }

        async fn access_token(&self, user: &str) -> anyhow::Result<Secret<String>> {
            self.token(user)
                .map(Secret::new)
                .ok_or_else(|| anyhow::anyhow!("access not granted or expired"))
        }

        async fn reset(&self, user: &str) -> anyhow::Result<()> {
            self.resets.fetch_add(1, Ordering::SeqCst);
            self.tokens.lock().unwrap().remove(user);
            self.pending.lock().unwrap().remove(user);
            Ok(())
        }

        async fn handle_callback(
            &self,
            user: &str,
            params: &CallbackParams,
        ) -> Result<(), CallbackError> {
            let expected = self.pending.lock().unwrap().remove(user);
            if expected.is_none() || expected != params.state {
                return Err(CallbackError::StateMismatch);
            }
            if params.code.as_deref() != Some(GOOD_CODE) {
                return Err(CallbackError::Exchange("invalid_grant".into()));
            }
            self.tokens
                .lock()
                .unwrap()
                .insert(user.into(), "fresh-token".into());
            Ok(())
        }
    }

    fn service(fake: Arc<FakeOAuth>) -> GatewayService {
        GatewayService::new(fake, ServiceNowApi::new("http://127.0.0.1:9"))
    }

    fn state_of(page: &Page) -> String {
        match page {
            Page::Login { authorization_url } => authorization_url
                .split("state=")
                .nth(1)
                .unwrap()
                .to_string(),
            other => panic!("expected login page, got {other:?}"),
        }
    }

    #[test]
    fn action_parsing() {
        assert_eq!(Action::parse(Some("logout")), Action::Logout);
        assert_eq!(Action::parse(Some("LOGOUT")), Action::Default);
        assert_eq!(Action::parse(Some("")), Action::Default);
        assert_eq!(Action::parse(None), Action::Default);
    }

    #[tokio::test]
    async fn valid_token_renders_authenticated_view() {
        let fake = Arc::new(FakeOAuth::with_token("alice", "t"));
        let svc = service(Arc::clone(&fake));

        for action in [None, Some("other"), Some("")] {
            let page = svc.route("alice", Action::parse(action)).await.unwrap();
            assert_eq!(page, Page::Authenticated);
        }
        assert_eq!(fake.resets.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn logout_removes_token_regardless_of_validity() {
        let fake = Arc::new(FakeOAuth::with_token("alice", "t"));
        let svc = service(Arc::clone(&fake));

        let page = svc.route("alice", Action::Logout).await.unwrap();
        assert_eq!(page, Page::LoggedOut);
        assert!(fake.token("alice").is_none());
        assert!(!fake.has_access("alice").await);

        // Without a token, logout still resets and confirms.
        let page = svc.route("bob", Action::Logout).await.unwrap();
        assert_eq!(page, Page::LoggedOut);
        assert_eq!(fake.resets.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn no_token_renders_stable_login_link() {
        let fake = Arc::new(FakeOAuth::default());
        let svc = service(Arc::clone(&fake));

        let first = svc.route("alice", Action::Default).await.unwrap();
        let second = svc.route("alice", Action::Default).await.unwrap();
        assert_eq!(first, second);

        let expected = fake.authorization_url("alice").await.unwrap();
        assert_eq!(first, Page::Login {
            authorization_url: expected
        });
        assert_eq!(fake.resets.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn callback_success_persists_token() {
        let fake = Arc::new(FakeOAuth::default());
        let svc = service(Arc::clone(&fake));
        let state = state_of(&svc.route("alice", Action::Default).await.unwrap());

        let page = svc
            .callback("alice", &CallbackParams {
                code: Some(GOOD_CODE.into()),
                state: Some(state),
                ..Default::default()
            })
            .await;
        assert_eq!(page, Page::CallbackResult { authorized: true });
        assert_eq!(fake.token("alice").as_deref(), Some("fresh-token"));
        assert_eq!(
            svc.route("alice", Action::Default).await.unwrap(),
            Page::Authenticated
        );
    }

    #[tokio::test]
    async fn callback_with_bad_code_persists_nothing() {
        let fake = Arc::new(FakeOAuth::default());
        let svc = service(Arc::clone(&fake));
        let state = state_of(&svc.route("alice", Action::Default).await.unwrap());

        let page = svc
            .callback("alice", &CallbackParams {
                code: Some("expired-code".into()),
                state: Some(state),
                ..Default::default()
            })
            .await;
        assert_eq!(page, Page::CallbackResult { authorized: false });
        assert!(fake.token("alice").is_none());
    }

    #[tokio::test]
    async fn callback_without_pending_request_is_denied() {
        let fake = Arc::new(FakeOAuth::default());
        let svc = service(Arc::clone(&fake));

        let page = svc
            .callback("alice", &CallbackParams {
                code: Some(GOOD_CODE.into()),
                state: Some("state-0".into()),
                ..Default::default()
            })
            .await;
        assert_eq!(page, Page::CallbackResult { authorized: false });
        assert!(fake.token("alice").is_none());
    }

    #[tokio::test]
    async fn authorize_reports_denial_kind() {
        let fake = Arc::new(FakeOAuth::default());
        let svc = service(Arc::clone(&fake));

        let err = svc
            .authorize("alice", &CallbackParams {
                code: Some(GOOD_CODE.into()),
                state: Some("never-issued".into()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GatewayError::AuthorizationDenied(CallbackError::StateMismatch)
        ));

        let state = state_of(&svc.route("alice", Action::Default).await.unwrap());
        let err = svc
            .authorize("alice", &CallbackParams {
                code: Some("expired-code".into()),
                state: Some(state),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GatewayError::AuthorizationDenied(CallbackError::Exchange(_))
        ));
    }

    #[tokio::test]
    async fn api_test_requires_access() {
        let svc = service(Arc::new(FakeOAuth::default()));
        assert!(matches!(
            svc.api_test("alice").await,
            Err(GatewayError::NotAuthorized)
        ));
    }

    #[tokio::test]
    async fn api_test_uses_stored_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", crate::api::USER_GROUP_TABLE)
            .match_query(mockito::Matcher::Any)
            .match_header("authorization", "Bearer alice-token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"result":[{"name":"A","active":"true"}]}"#)
            .expect(1)
            .create_async()
            .await;

        let fake = Arc::new(FakeOAuth::with_token("alice", "alice-token"));
        let svc = GatewayService::new(fake, ServiceNowApi::new(server.url()));

        let out = svc.api_test("alice").await.unwrap();
        mock.assert_async().await;
        let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed, serde_json::json!([{"name": "A", "active": "true"}]));
    }

    #[tokio::test]
    async fn api_errors_propagate_unmodified() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", crate::api::USER_GROUP_TABLE)
            .match_query(mockito::Matcher::Any)
            .with_status(401)
            .with_body("unauthorized")
            .create_async()
            .await;

        let fake = Arc::new(FakeOAuth::with_token("alice", "revoked"));
        let svc = GatewayService::new(fake, ServiceNowApi::new(server.url()));
        match svc.api_test("alice").await {
            Err(GatewayError::RemoteCall { status, .. }) => assert_eq!(status, Some(401)),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
