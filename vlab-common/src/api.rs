//! Shared API envelope types
//!
//! Every HTTP endpoint returns the same JSON envelope:
//! `{ "isSuccess": bool, "message": string, "data": T | null }`.
//! Bot integrations key off `isSuccess` rather than the HTTP status alone,
//! so failures carry the envelope too.

use serde::{Deserialize, Serialize};

/// Uniform success/failure envelope for all endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub is_success: bool,
    pub message: String,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// Successful response with a payload
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            is_success: true,
            message: message.into(),
            data: Some(data),
        }
    }

    /// Successful response with an explicitly null payload
    /// (e.g. "no active session found")
    pub fn ok_empty(message: impl Into<String>) -> Self {
        Self {
            is_success: true,
            message: message.into(),
            data: None,
        }
    }

    /// Failed response; data is always null
    pub fn err(message: impl Into<String>) -> Self {
        Self {
            is_success: false,
            message: message.into(),
            data: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_wire_names() {
        let resp = ApiResponse::ok("Session created successfully", 7);
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["isSuccess"], true);
        assert_eq!(json["message"], "Session created successfully");
        assert_eq!(json["data"], 7);
    }

    #[test]
    fn test_err_envelope_has_null_data() {
        let resp: ApiResponse<()> = ApiResponse::err("Session not found");
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["isSuccess"], false);
        assert!(json["data"].is_null());
    }
}
