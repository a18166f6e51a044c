use mongodb::bson::oid::ObjectId;

use crate::error::AppError;

/// Ids from paths, bodies and query strings must be well-formed before
/// any lookup runs; a malformed id is a request error, not a miss.
pub fn parse_object_id(
    raw: &str,
    field: &str,
    error_type: &'static str,
) -> Result<ObjectId, AppError> {
    ObjectId::parse_str(raw).map_err(|_| {
        AppError::bad_request(
            error_type,
            format!("{} must be in MongoDB ObjectId format", field),
        )
    })
}

pub fn require_string(
    value: Option<String>,
    field: &str,
    error_type: &'static str,
) -> Result<String, AppError> {
    match value {
        Some(s) if !s.is_empty() => Ok(s),
        _ => Err(AppError::bad_request(
            error_type,
            format!("{} cannot be empty", field),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_object_id_parses() {
        let id = ObjectId::new().to_hex();
        assert_eq!(
            parse_object_id(&id, "taskId", "Get Task By Id Error").unwrap(),
            ObjectId::parse_str(&id).unwrap()
        );
    }

    #[test]
    fn malformed_object_id_is_a_request_error() {
        let err = parse_object_id("not-an-id", "taskId", "Get Task By Id Error").unwrap_err();
        assert_eq!(err.status, actix_web::http::StatusCode::BAD_REQUEST);
        assert!(err.message.contains("taskId"));
    }

    #[test]
    fn missing_or_empty_string_is_rejected() {
        assert!(require_string(None, "name", "Create User Error").is_err());
        assert!(require_string(Some(String::new()), "name", "Create User Error").is_err());

        let err = require_string(None, "description", "Create Task Error").unwrap_err();
        assert_eq!(err.message, "description cannot be empty");
    }

    #[test]
    fn present_string_passes_through() {
        assert_eq!(
            require_string(Some("Weekly report".into()), "name", "Create Task Error").unwrap(),
            "Weekly report"
        );
    }
}
