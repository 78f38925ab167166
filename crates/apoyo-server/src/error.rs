use apoyo_shared::ValidationError;
use apoyo_store::StoreError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Invalid message: {0}")]
    Validation(#[from] ValidationError),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),
}

impl From<StoreError> for ServerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => ServerError::NotFound("Record not found".into()),
            other => ServerError::Storage(other.to_string()),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message, details) = match &self {
            ServerError::Validation(e) => {
                let label = match e {
                    ValidationError::GroupNameTooShort { .. } | ValidationError::MissingTopic => {
                        "Invalid group"
                    }
                    _ => "Invalid message",
                };
                (StatusCode::BAD_REQUEST, label.to_string(), Some(e.to_string()))
            }
            ServerError::Storage(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Storage error".to_string(),
                Some(e.clone()),
            ),
            ServerError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string(), None),
            ServerError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string(), None),
        };

        let body = match details {
            Some(details) => serde_json::json!({ "error": message, "details": details }),
            None => serde_json::json!({ "error": message }),
        };

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (
                ServerError::from(ValidationError::EmptyContent),
                StatusCode::BAD_REQUEST,
            ),
            (
                ServerError::Storage("disk full".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                ServerError::from(StoreError::NotFound),
                StatusCode::NOT_FOUND,
            ),
            (
                ServerError::BadRequest("bad id".into()),
                StatusCode::BAD_REQUEST,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }

    #[test]
    fn test_store_errors_become_storage() {
        let err = ServerError::from(StoreError::Io(std::io::Error::other("disk full")));
        assert!(matches!(err, ServerError::Storage(_)));
    }
}
