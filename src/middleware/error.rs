use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Authentication errors for the middleware layer.
///
/// Flow failures (state mismatch, failed exchange, failed refresh) never
/// surface here; they degrade to redirects or anonymous requests.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No authenticated user on this request.
    #[error("Not authenticated")]
    Unauthenticated,

    /// The identity provider could not be reached or refused the request.
    #[error("Identity provider error: {0}")]
    Provider(String),

    /// Session store operation failed.
    #[error("Session store error: {0}")]
    Session(String),

    /// Missing or invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match self {
            Self::Unauthenticated => (StatusCode::UNAUTHORIZED, self.to_string()).into_response(),
            Self::Provider(_) => {
                tracing::error!(error = %self, "Identity provider request failed");
                (StatusCode::BAD_GATEWAY, "Identity provider unavailable").into_response()
            }
            Self::Session(_) | Self::Config(_) => {
                tracing::error!(error = %self, "Auth internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal error").into_response()
            }
        }
    }
}

impl From<crate::error::Error> for AuthError {
    fn from(e: crate::error::Error) -> Self {
        Self::Provider(e.to_string())
    }
}

impl From<tower_sessions::session::Error> for AuthError {
    fn from(e: tower_sessions::session::Error) -> Self {
        Self::Session(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        let status = |e: AuthError| e.into_response().status();

        assert_eq!(status(AuthError::Unauthenticated), StatusCode::UNAUTHORIZED);
        assert_eq!(status(AuthError::Provider("x".into())), StatusCode::BAD_GATEWAY);
        assert_eq!(status(AuthError::Session("x".into())), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(status(AuthError::Config("x".into())), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn any_provider_operation_maps_to_provider_error() {
        let err: AuthError = crate::error::Error::OAuth {
            operation: "token refresh",
            status: Some(400),
            detail: "invalid_grant".into(),
        }
        .into();

        assert!(matches!(&err, AuthError::Provider(msg) if msg.contains("token refresh")));
        assert_eq!(err.into_response().status(), StatusCode::BAD_GATEWAY);
    }
}
