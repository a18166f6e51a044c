use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use log::error;
use serde::Serialize;
use std::fmt;

/// Application error carried by every failing handler: HTTP status,
/// human-readable message, and a label naming the operation that failed.
/// The `ResponseError` impl is the single place failure responses are
/// written.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
    pub error_type: &'static str,
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    success: bool,
    message: &'a str,
    #[serde(rename = "errorType")]
    error_type: &'a str,
}

impl AppError {
    pub fn bad_request(error_type: &'static str, message: impl Into<String>) -> Self {
        AppError {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
            error_type,
        }
    }

    pub fn not_found(error_type: &'static str, message: impl Into<String>) -> Self {
        AppError {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
            error_type,
        }
    }

    pub fn internal(error_type: &'static str, message: impl Into<String>) -> Self {
        AppError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
            error_type,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error_type, self.message)
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        self.status
    }

    fn error_response(&self) -> HttpResponse {
        if self.status.is_server_error() {
            error!("{}", self);
        }
        HttpResponse::build(self.status).json(ErrorBody {
            success: false,
            message: &self.message,
            error_type: self.error_type,
        })
    }
}

impl From<mongodb::error::Error> for AppError {
    fn from(err: mongodb::error::Error) -> Self {
        AppError::internal("Database Error", err.to_string())
    }
}

impl From<mongodb::bson::ser::Error> for AppError {
    fn from(err: mongodb::bson::ser::Error) -> Self {
        AppError::internal("Database Error", err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_label_and_message() {
        let err = AppError::bad_request("Create Task Error", "name cannot be empty");
        assert_eq!(err.to_string(), "Create Task Error: name cannot be empty");
    }

    #[test]
    fn status_codes_match_constructors() {
        assert_eq!(
            AppError::bad_request("E", "m").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::not_found("E", "m").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::internal("E", "m").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[actix_web::test]
    async fn error_response_carries_failure_envelope() {
        let err = AppError::not_found("Get Task By Id Error", "Task Not Found");
        let resp = err.error_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let bytes = actix_web::body::to_bytes(resp.into_body()).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Task Not Found");
        assert_eq!(body["errorType"], "Get Task By Id Error");
    }
}
