use actix_web::HttpResponse;
use serde::Serialize;

/// Success envelope shared by every route.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    pub message: &'static str,
}

pub fn send_response<T: Serialize>(data: T, message: &'static str) -> HttpResponse {
    HttpResponse::Ok().json(ApiResponse {
        success: true,
        data,
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_shape() {
        let body = serde_json::to_value(ApiResponse {
            success: true,
            data: json!({ "name": "Onboarding" }),
            message: "Create New Task Successfully",
        })
        .unwrap();
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["name"], "Onboarding");
        assert_eq!(body["message"], "Create New Task Successfully");
    }
}
