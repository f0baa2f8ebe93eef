use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use collation_core::{CollationError, EngineError, ErrorEnvelope};

pub struct AppError {
    pub status: StatusCode,
    pub body: ErrorEnvelope,
}

impl AppError {
    pub fn bad_request(code: &str, message: impl Into<String>, hint: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: ErrorEnvelope::new(code, message, hint),
        }
    }

    pub fn internal(msg: impl std::fmt::Display) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: ErrorEnvelope::internal(&msg.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, axum::Json(self.body)).into_response()
    }
}

fn status_for(err: &CollationError) -> StatusCode {
    match err {
        CollationError::Engine(
            EngineError::Unavailable(_) | EngineError::Io(_) | EngineError::Cancelled,
        ) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        CollationError::Engine(EngineError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
        CollationError::Engine(_) | CollationError::MalformedEngineOutput(_) => {
            StatusCode::BAD_GATEWAY
        }
        CollationError::Io(_)
        | CollationError::ConfigParse(_)
        | CollationError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_REQUEST,
    }
}

impl From<CollationError> for AppError {
    fn from(err: CollationError) -> Self {
        Self {
            status: status_for(&err),
            body: ErrorEnvelope::from(&err),
        }
    }
}
