//! Response envelope for the dashboard.
//!
//! Every endpoint answers `{success, message, data, metaData?}` with the
//! status derived from the [`ApiResult`] variant.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bpjs_client::ApiResult;
use serde::Serialize;
use serde_json::{Map, Value, json};

#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    pub success: bool,
    pub message: String,
    pub data: Value,
    #[serde(rename = "metaData", skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
    /// Endpoint-specific siblings of `data` (e.g. `summary`)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
    #[serde(skip)]
    pub status: u16,
}

impl Envelope {
    pub fn from_result(result: ApiResult) -> Self {
        let status = result.http_status();
        let result_code = result.code().to_string();
        match result {
            ApiResult::Success { meta, payload } => Self {
                success: true,
                message: meta.message.clone(),
                data: payload,
                meta: Some(json!({"code": meta.code, "message": meta.message})),
                extra: Map::new(),
                status,
            },
            ApiResult::Empty { reason, .. } => Self {
                success: true,
                message: reason.clone(),
                data: Value::Null,
                meta: Some(json!({"code": result_code, "message": reason})),
                extra: Map::new(),
                status,
            },
            ApiResult::UpstreamError {
                code,
                message,
                raw_body,
            } => {
                let mut extra = Map::new();
                if let Some(raw) = raw_body {
                    extra.insert("raw".into(), Value::String(raw));
                }
                Self {
                    success: false,
                    message: message.clone(),
                    data: Value::Null,
                    meta: Some(json!({"code": code, "message": message})),
                    extra,
                    status,
                }
            }
            ApiResult::TransportError { message } => Self {
                success: false,
                message,
                data: Value::Null,
                meta: None,
                extra: Map::new(),
                status,
            },
        }
    }

    /// Request rejected before any upstream call.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: Value::Null,
            meta: None,
            extra: Map::new(),
            status: 400,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    pub fn with_extra(mut self, key: &str, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

impl IntoResponse for Envelope {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}
