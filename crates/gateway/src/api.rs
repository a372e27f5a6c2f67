/// The one illustrative ServiceNow REST call: list user groups.
use {
    reqwest::header::{ACCEPT, CONTENT_TYPE},
    secrecy::{ExposeSecret, Secret},
    serde::Deserialize,
    tracing::{debug, warn},
};

use crate::error::GatewayError;

pub const USER_GROUP_TABLE: &str = "/api/now/table/sys_user_group";
pub const USER_GROUP_FIELDS: &[&str] = &["name", "active", "sys_created_by", "sys_created_on"];
pub const USER_GROUP_LIMIT: u32 = 10;

/// Longest error body echoed back to the caller.
const MAX_ERROR_BODY: usize = 512;

pub struct ServiceNowApi {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct TableResponse {
    result: serde_json::Value,
}

impl ServiceNowApi {
    pub fn new(instance_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: instance_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch up to ten user groups and return the `result` array
    /// pretty-printed. The caller must already hold a valid token.
    pub async fn user_groups(&self, token: &Secret<String>) -> Result<String, GatewayError> {
        let fields = USER_GROUP_FIELDS.join(",");
        let limit = USER_GROUP_LIMIT.to_string();

        let resp = self
            .client
            .get(format!("{}{USER_GROUP_TABLE}", self.base_url))
            .query(&[
                ("sysparm_fields", fields.as_str()),
                ("sysparm_limit", limit.as_str()),
            ])
            .bearer_auth(token.expose_secret())
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await
            .map_err(|e| GatewayError::RemoteCall {
                status: None,
                message: e.to_string(),
            })?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| GatewayError::RemoteCall {
            status: Some(status.as_u16()),
            message: e.to_string(),
        })?;

        if !status.is_success() {
            warn!(status = status.as_u16(), "ServiceNow table API call failed");
            return Err(GatewayError::RemoteCall {
                status: Some(status.as_u16()),
                message: body.chars().take(MAX_ERROR_BODY).collect(),
            });
        }

        debug!(bytes = body.len(), "ServiceNow table API call succeeded");
        pretty_result(&body)
    }
}

/// Extract `result` from a Table API body and pretty-print it with two-space indentation.
pub fn pretty_result(body: &str) -> Result<String, GatewayError> {
    let parsed: TableResponse =
        serde_json::from_str(body).map_err(|e| GatewayError::Parse(e.to_string()))?;
    serde_json::to_string_pretty(&parsed.result).map_err(|e| GatewayError::Parse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use {super::*, mockito::Matcher, serde_json::json};

    fn table_query() -> Matcher {
        Matcher::AllOf(vec![
            Matcher::UrlEncoded(
                "sysparm_fields".into(),
                "name,active,sys_created_by,sys_created_on".into(),
            ),
            Matcher::UrlEncoded("sysparm_limit".into(), "10".into()),
        ])
    }

    #[tokio::test]
    async fn returns_pretty_printed_result() {
        let mut server = mockito::Server::new_async().await;
        let body = json!({
            "result": [
                {"name": "A", "active": "true", "sys_created_by": "admin", "sys_created_on": "2024-01-01 00:00:00"},
                {"name": "B", "active": "false", "sys_created_by": "admin", "sys_created_on": "2024-01-02 00:00:00"}
            ]
        });
        let mock = server
            .mock("GET", USER_GROUP_TABLE)
            .match_query(table_query())
            .match_header("authorization", "Bearer tok-1")
            .match_header("accept", "application/json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .expect(1)
            .create_async()
            .await;

        let api = ServiceNowApi::new(server.url());
        let out = api
            .user_groups(&Secret::new("tok-1".into()))
            .await
            .unwrap();
        mock.assert_async().await;

        let reparsed: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(reparsed, body["result"]);
        // Two-space indentation.
        assert!(out.starts_with("[\n  {\n    \""));
    }

    #[tokio::test]
    async fn unauthorized_response_is_remote_call_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", USER_GROUP_TABLE)
            .match_query(Matcher::Any)
            .with_status(401)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error":{"message":"User Not Authenticated"},"status":"failure"}"#)
            .create_async()
            .await;

        let api = ServiceNowApi::new(format!("{}/", server.url()));
        let err = api
            .user_groups(&Secret::new("expired".into()))
            .await
            .unwrap_err();
        match err {
            GatewayError::RemoteCall { status, message } => {
                assert_eq!(status, Some(401));
                assert!(message.contains("User Not Authenticated"));
            },
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_body_is_parse_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", USER_GROUP_TABLE)
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("<html>maintenance</html>")
            .create_async()
            .await;

        let api = ServiceNowApi::new(server.url());
        let err = api
            .user_groups(&Secret::new("tok".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Parse(_)));
    }

    #[test]
    fn missing_result_field_is_parse_error() {
        assert!(matches!(
            pretty_result(r#"{"status":"ok"}"#),
            Err(GatewayError::Parse(_))
        ));
    }

    #[test]
    fn empty_result_is_fine() {
        assert_eq!(pretty_result(r#"{"result":[]}"#).unwrap(), "[]");
    }
}
