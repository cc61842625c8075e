use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Outcome of a signup or signin attempt. The first three variants are
/// client-caused and keep their specific status and message; everything else
/// collapses to a generic 500 so internals never reach the caller.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("L'utilisateur existe déjà")]
    Conflict,
    #[error("Utilisateur non trouvé")]
    NotFound,
    #[error("Identifiants invalides")]
    InvalidCredentials,
    #[error("password hashing failed")]
    Crypto(anyhow::Error),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

const INTERNAL_MESSAGE: &str = "Quelque chose s'est mal passé";

#[derive(Debug, Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AuthError::Conflict | AuthError::InvalidCredentials => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            AuthError::NotFound => (StatusCode::NOT_FOUND, self.to_string()),
            AuthError::Crypto(e) => {
                error!(error = %e, "password hashing failure");
                (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MESSAGE.to_string())
            }
            AuthError::Internal(e) => {
                error!(error = %e, "unhandled internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MESSAGE.to_string())
            }
        };
        (status, Json(ErrorBody { message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_message(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        let body: serde_json::Value = serde_json::from_slice(&bytes).expect("json body");
        body["message"].as_str().expect("message field").to_string()
    }

    #[tokio::test]
    async fn client_errors_keep_status_and_message() {
        let response = AuthError::Conflict.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_message(response).await, "L'utilisateur existe déjà");

        let response = AuthError::NotFound.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_message(response).await, "Utilisateur non trouvé");

        let response = AuthError::InvalidCredentials.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_message(response).await, "Identifiants invalides");
    }

    #[tokio::test]
    async fn internal_errors_hide_their_cause() {
        let response = AuthError::Internal(anyhow::anyhow!("connection refused")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_message(response).await, INTERNAL_MESSAGE);

        let response = AuthError::Crypto(anyhow::anyhow!("bad phc string")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_message(response).await, INTERNAL_MESSAGE);
    }
}
