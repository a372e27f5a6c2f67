use {
    axum::{
        http::StatusCode,
        response::{IntoResponse, Response},
    },
    snowgate_oauth::CallbackError,
};

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The callback could not be turned into a stored token. Caught by the
    /// callback handler and rendered as the failure page, never sent as-is.
    #[error("authorization denied: {0}")]
    AuthorizationDenied(#[from] CallbackError),

    #[error("access not granted or expired")]
    NotAuthorized,

    #[error("missing user identity")]
    MissingIdentity,

    /// Non-success status (or transport failure when `status` is `None`)
    /// from the ServiceNow REST API.
    #[error("{}", remote_call_message(*status, message))]
    RemoteCall {
        status: Option<u16>,
        message: String,
    },

    #[error("invalid JSON from ServiceNow: {0}")]
    Parse(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

fn remote_call_message(status: Option<u16>, message: &str) -> String {
    match status {
        Some(code) => format!("ServiceNow request failed with status {code}: {message}"),
        None => format!("ServiceNow request failed: {message}"),
    }
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::AuthorizationDenied(_) => StatusCode::FORBIDDEN,
            Self::NotAuthorized | Self::MissingIdentity => StatusCode::UNAUTHORIZED,
            Self::RemoteCall { .. } | Self::Parse(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::warn!(error = %self, "request failed");
        }
        (status, self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_call_message_includes_status() {
        let err = GatewayError::RemoteCall {
            status: Some(401),
            message: "User Not Authenticated".into(),
        };
        assert_eq!(
            err.to_string(),
            "ServiceNow request failed with status 401: User Not Authenticated"
        );
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);

        let err = GatewayError::RemoteCall {
            status: None,
            message: "connection refused".into(),
        };
        assert_eq!(err.to_string(), "ServiceNow request failed: connection refused");
    }

    #[test]
    fn callback_errors_become_authorization_denied() {
        let err = GatewayError::from(CallbackError::StateMismatch);
        assert!(matches!(
            err,
            GatewayError::AuthorizationDenied(CallbackError::StateMismatch)
        ));
        assert!(err.to_string().starts_with("authorization denied: "));
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn status_codes() {
        assert_eq!(
            GatewayError::NotAuthorized.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            GatewayError::Parse("eof".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            GatewayError::Internal(anyhow::anyhow!("boom")).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
