use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::ApiError;

/// Wrapper for API responses that automatically adds the success envelope.
///
/// Object payloads are merged into the envelope (`{"success": true, ...payload}`);
/// anything else is placed under `data`.
#[derive(Debug)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub status_code: Option<StatusCode>,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a successful API response with default 200 status
    pub fn success(data: T) -> Self {
        Self {
            data,
            status_code: None,
        }
    }

    /// Create an API response with custom status code
    pub fn with_status(data: T, status_code: StatusCode) -> Self {
        Self {
            data,
            status_code: Some(status_code),
        }
    }

    /// Create a 201 Created response
    pub fn created(data: T) -> Self {
        Self::with_status(data, StatusCode::CREATED)
    }
}

/// Build the success envelope around an already-serialised payload
pub fn envelope(payload: Value) -> Value {
    let mut body = Map::new();
    body.insert("success".to_string(), Value::Bool(true));

    match payload {
        Value::Object(fields) => {
            for (key, value) in fields {
                if key != "success" {
                    body.insert(key, value);
                }
            }
        }
        Value::Null => {}
        other => {
            body.insert("data".to_string(), other);
        }
    }

    Value::Object(body)
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = self.status_code.unwrap_or(StatusCode::OK);

        match serde_json::to_value(&self.data) {
            Ok(value) => (status, Json(envelope(value))).into_response(),
            Err(e) => {
                tracing::error!("Failed to serialize response data: {}", e);
                ApiError::internal_server_error().into_response()
            }
        }
    }
}

// Convenience type alias
pub type ApiResult<T> = Result<ApiResponse<T>, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn object_payloads_are_flattened() {
        let body = envelope(json!({"message": "ok", "user": {"id": 1}}));
        assert_eq!(body, json!({"success": true, "message": "ok", "user": {"id": 1}}));
    }

    #[test]
    fn other_payloads_go_under_data() {
        assert_eq!(envelope(json!([1, 2])), json!({"success": true, "data": [1, 2]}));
        assert_eq!(envelope(Value::Null), json!({"success": true}));
    }

    #[test]
    fn payload_cannot_override_success() {
        let body = envelope(json!({"success": false, "id": 3}));
        assert_eq!(body["success"], true);
        assert_eq!(body["id"], 3);
    }
}
