//! Classification of raw gateway responses.
//!
//! The gateway answers in several shapes: encrypted envelopes, plain JSON,
//! JSON errors with a `metaData` block, and HTML error pages from the API
//! gateway in front of it. [`Normalizer`] maps every shape onto one
//! [`ApiResult`] variant using a fixed priority order:
//!
//! 1. transport failure
//! 2. non-2xx status (HTML page, salvaged `metaData`, or synthetic message)
//! 3. HTML page on a 2xx status
//! 4. empty or unparseable 2xx body
//! 5. non-200 `metaData.code` (204 is "no data")
//! 6. string `response` field: decode the envelope
//! 7. structured `response` / `data` field
//! 8. whole body when it is an object
//!
//! An `Empty` is marked acknowledged only when the body carried
//! `metaData.code` 200.

use serde_json::Value;
use tracing::{error, info, warn};

use crate::credentials::CredentialSet;
use crate::envelope::decode_envelope;
use crate::error::TransportError;
use crate::result::{ApiResult, MetaData};
use crate::transport::Exchange;

const BODY_PREVIEW_CHARS: usize = 500;
const HTML_SNIFF_BYTES: usize = 1024;

/// Gateway error-page markers, matched case-insensitively.
const HTML_MARKERS: &[&str] = &[
    "<html",
    "<!doctype html",
    "request error",
    "<title>service</title>",
];

/// Raw HTTP response as read from the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: None,
            body: body.into(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Returns `true` when the response is an HTML error page rather than JSON.
pub fn looks_like_html(response: &RawResponse) -> bool {
    if let Some(ct) = &response.content_type
        && ct.to_ascii_lowercase().contains("text/html")
    {
        return true;
    }

    let sample = prefix_bytes(&response.body, HTML_SNIFF_BYTES).to_ascii_lowercase();
    HTML_MARKERS.iter().any(|marker| sample.contains(marker))
}

/// Truncates to at most `max` characters.
pub fn preview(body: &str, max: usize) -> &str {
    match body.char_indices().nth(max) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

fn prefix_bytes(body: &str, max: usize) -> &str {
    if body.len() <= max {
        return body;
    }
    let mut end = max;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}

/// `null`, `""`, `{}` and `[]` all mean "no data".
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

fn parse_meta(body: &Value) -> Option<MetaData> {
    body.get("metaData")
        .and_then(|meta| serde_json::from_value(meta.clone()).ok())
}

/// Response classifier bound to one credential set's envelope secrets.
pub struct Normalizer {
    consumer_id: String,
    secret: String,
}

impl Normalizer {
    pub fn new(credentials: &CredentialSet) -> Self {
        Self {
            consumer_id: credentials.consumer_id.clone(),
            secret: credentials.secret_key.clone(),
        }
    }

    /// Classifies the outcome of a transport call.
    pub fn normalize(
        &self,
        operation: &str,
        outcome: Result<Exchange, TransportError>,
    ) -> ApiResult {
        match outcome {
            Ok(exchange) => self.normalize_exchange(operation, &exchange),
            Err(err) => {
                warn!(operation, error = %err, "Upstream transport failure");
                ApiResult::TransportError {
                    message: err.to_string(),
                }
            }
        }
    }

    pub fn normalize_exchange(&self, operation: &str, exchange: &Exchange) -> ApiResult {
        self.normalize_response(operation, &exchange.response, &exchange.signed.timestamp)
    }

    /// Classifies a response; `timestamp` is the one the request was signed with.
    pub fn normalize_response(
        &self,
        operation: &str,
        response: &RawResponse,
        timestamp: &str,
    ) -> ApiResult {
        info!(
            operation,
            status = response.status,
            content_type = ?response.content_type,
            body_preview = preview(&response.body, BODY_PREVIEW_CHARS),
            "Upstream response"
        );

        if !response.is_success() {
            return self.classify_failure(operation, response, timestamp);
        }

        let body: Value = match serde_json::from_str(&response.body) {
            Ok(body) if !is_empty_value(&body) => body,
            Err(_) if looks_like_html(response) => return html_error(operation, response),
            _ => return ApiResult::empty("Upstream returned no data"),
        };

        let parsed = parse_meta(&body);
        let acknowledged = parsed.is_some();
        let meta = match parsed {
            Some(meta) if meta.is_no_content() => {
                return ApiResult::empty(non_empty_or(&meta.message, "No Content"));
            }
            Some(meta) if !meta.is_ok() => {
                info!(
                    operation,
                    code = %meta.code,
                    message = %meta.message,
                    "Upstream reported a business error"
                );
                return ApiResult::UpstreamError {
                    code: meta.code,
                    message: meta.message,
                    raw_body: Some(preview(&response.body, BODY_PREVIEW_CHARS).to_string()),
                };
            }
            Some(meta) => meta,
            None => MetaData::ok(),
        };
        let no_data = |reason: &str| {
            if acknowledged {
                ApiResult::acknowledged(reason)
            } else {
                ApiResult::empty(reason)
            }
        };

        if let Some(Value::String(ciphertext)) = body.get("response")
            && !ciphertext.is_empty()
        {
            return match decode_envelope(ciphertext, &self.consumer_id, &self.secret, timestamp) {
                Ok(decoded) if is_empty_value(&decoded) => no_data("Upstream returned no data"),
                Ok(decoded) => ApiResult::Success {
                    meta,
                    payload: decoded,
                },
                Err(err) => {
                    error!(
                        operation,
                        stage = %err.stage,
                        error = %err,
                        body_preview = preview(&response.body, BODY_PREVIEW_CHARS),
                        "Failed to decode response envelope"
                    );
                    ApiResult::UpstreamError {
                        code: "500".to_string(),
                        message: format!("Failed to decode upstream response: {err}"),
                        raw_body: Some(preview(&response.body, BODY_PREVIEW_CHARS).to_string()),
                    }
                }
            };
        }

        for field in ["response", "data"] {
            if let Some(value) = body.get(field) {
                if is_empty_value(value) {
                    return no_data(&non_empty_or(&meta.message, "Upstream returned no data"));
                }
                return ApiResult::Success {
                    meta,
                    payload: value.clone(),
                };
            }
        }

        if body.is_object() {
            ApiResult::Success {
                meta,
                payload: body,
            }
        } else {
            ApiResult::empty("Upstream returned no data")
        }
    }

    fn classify_failure(&self, operation: &str, response: &RawResponse, timestamp: &str) -> ApiResult {
        let status = response.status;
        let body_preview = preview(&response.body, BODY_PREVIEW_CHARS).to_string();

        if looks_like_html(response) {
            return html_error(operation, response);
        }

        if let Ok(body) = serde_json::from_str::<Value>(&response.body)
            && let Some(meta) = parse_meta(&body)
        {
            // An encrypted body on an error usually explains the rejection.
            let detail = match body.get("response") {
                Some(Value::String(ciphertext)) if !ciphertext.is_empty() => {
                    decode_envelope(ciphertext, &self.consumer_id, &self.secret, timestamp)
                        .ok()
                        .map(|decoded| decoded.to_string())
                }
                _ => None,
            };
            warn!(operation, status, code = %meta.code, message = %meta.message, "Upstream error response");
            let code = if meta.code.is_empty() {
                status.to_string()
            } else {
                meta.code
            };
            return ApiResult::UpstreamError {
                code,
                message: meta.message,
                raw_body: Some(detail.unwrap_or(body_preview)),
            };
        }

        warn!(operation, status, "Upstream error response without metaData");
        ApiResult::UpstreamError {
            code: status.to_string(),
            message: format!("HTTP request failed: {status} - Response: {body_preview}"),
            raw_body: Some(body_preview),
        }
    }
}

/// Gateway error page; on a 2xx it usually means the path is not mapped.
fn html_error(operation: &str, response: &RawResponse) -> ApiResult {
    let status = response.status;
    warn!(operation, status, "Upstream returned an HTML error page");
    ApiResult::UpstreamError {
        code: status.to_string(),
        message: format!("HTTP request failed: {status} - Server returned HTML error page"),
        raw_body: Some(preview(&response.body, BODY_PREVIEW_CHARS).to_string()),
    }
}

fn non_empty_or(message: &str, fallback: &str) -> String {
    if message.is_empty() {
        fallback.to_string()
    } else {
        message.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::encode_envelope;
    use crate::result::EmptyPolicy;
    use serde_json::json;

    const TS: &str = "1700000000";

    fn normalizer() -> Normalizer {
        Normalizer::new(&CredentialSet::new("https://gw.example", "1234", "secret123", "uk"))
    }

    fn ok(body: Value) -> RawResponse {
        RawResponse::new(200, body.to_string()).with_content_type("application/json")
    }

    #[test]
    fn test_encrypted_payload_is_success() {
        let payload = json!({"noApotik": "0112A01708250000001"});
        let body = json!({
            "metaData": {"code": "200", "message": "OK"},
            "response": encode_envelope(&payload, "1234", "secret123", TS),
        });
        let result = normalizer().normalize_response("test", &ok(body), TS);
        assert_eq!(
            result,
            ApiResult::Success {
                meta: MetaData::ok(),
                payload
            }
        );
    }

    #[test]
    fn test_encrypted_empty_object_is_empty() {
        let body = json!({"response": encode_envelope(&json!({}), "1234", "secret123", TS)});
        let result = normalizer().normalize_response("test", &ok(body), TS);
        assert!(result.is_empty());
    }

    #[test]
    fn test_encrypted_empty_array_is_empty() {
        let body = json!({
            "metaData": {"code": 200, "message": "OK"},
            "response": encode_envelope(&json!([]), "1234", "secret123", TS),
        });
        let result = normalizer().normalize_response("test", &ok(body), TS);
        assert!(result.is_empty());
    }

    #[test]
    fn test_undecodable_envelope_is_upstream_error() {
        let body = json!({"metaData": {"code": "200"}, "response": "bm90IGEgY2lwaGVydGV4dA=="});
        let result = normalizer().normalize_response("test", &ok(body), TS);
        match result {
            ApiResult::UpstreamError { code, message, .. } => {
                assert_eq!(code, "500");
                assert!(message.contains("decode"));
            }
            other => panic!("expected upstream error, got {other:?}"),
        }
    }

    #[test]
    fn test_html_404_is_upstream_error() {
        let response = RawResponse::new(404, "<html><body>No Mapping Rule matched</body></html>");
        let result = normalizer().normalize_response("test", &response, TS);
        match result {
            ApiResult::UpstreamError { code, message, .. } => {
                assert_eq!(code, "404");
                assert!(message.contains("HTML error page"));
            }
            other => panic!("expected upstream error, got {other:?}"),
        }
    }

    #[test]
    fn test_html_on_success_status_is_upstream_error() {
        let n = normalizer();
        let page = RawResponse::new(
            200,
            "<html><body>Request Error: No Mapping Rule matched</body></html>",
        )
        .with_content_type("text/html");
        let result = n.normalize_response("hapus_obat", &page, TS);
        assert_eq!(result.code(), "200");
        assert!(result.message().contains("HTML error page"));
        assert!(!result.is_acceptable(EmptyPolicy::Accept));

        let unlabeled = RawResponse::new(200, "<!DOCTYPE html><title>Service</title>");
        assert!(matches!(
            n.normalize_response("hapus_obat", &unlabeled, TS),
            ApiResult::UpstreamError { .. }
        ));
    }

    #[test]
    fn test_json_success_mentioning_request_error_is_not_html() {
        let body = json!({"metaData": {"code": "200", "message": "Request error resolved"}, "response": {"ok": 1}});
        let result = normalizer().normalize_response("t", &RawResponse::new(200, body.to_string()), TS);
        assert_eq!(result.payload(), Some(&json!({"ok": 1})));
    }

    #[test]
    fn test_html_content_type_wins_over_body() {
        let response = RawResponse::new(502, r#"{"metaData":{"code":"201"}}"#)
            .with_content_type("text/html; charset=UTF-8");
        assert!(looks_like_html(&response));
    }

    #[test]
    fn test_gateway_marker_detected() {
        let response = RawResponse::new(400, "Request Error: invalid mapping");
        assert!(looks_like_html(&response));
        let json_error = RawResponse::new(400, r#"{"metaData":{"code":"400"}}"#);
        assert!(!looks_like_html(&json_error));
    }

    #[test]
    fn test_json_error_salvages_meta() {
        let response = RawResponse::new(
            400,
            json!({"metaData": {"code": "201", "message": "Nomor resep sudah ada"}}).to_string(),
        );
        let result = normalizer().normalize_response("test", &response, TS);
        match result {
            ApiResult::UpstreamError { code, message, .. } => {
                assert_eq!(code, "201");
                assert_eq!(message, "Nomor resep sudah ada");
            }
            other => panic!("expected upstream error, got {other:?}"),
        }
    }

    #[test]
    fn test_plain_text_error_gets_synthetic_message() {
        let response = RawResponse::new(500, "upstream exploded");
        let result = normalizer().normalize_response("test", &response, TS);
        assert_eq!(
            result.message(),
            "HTTP request failed: 500 - Response: upstream exploded"
        );
        assert_eq!(result.code(), "500");
    }

    #[test]
    fn test_empty_and_unparseable_success_bodies_are_empty() {
        let n = normalizer();
        assert!(n.normalize_response("t", &RawResponse::new(200, ""), TS).is_empty());
        assert!(n.normalize_response("t", &RawResponse::new(200, "not json"), TS).is_empty());
        assert!(n.normalize_response("t", &RawResponse::new(200, "{}"), TS).is_empty());
        for body in ["", "not json", "{}"] {
            let result = n.normalize_response("t", &RawResponse::new(200, body), TS);
            assert!(!result.is_acknowledged(), "{body:?} must not count as confirmed");
        }
    }

    #[test]
    fn test_business_error_code() {
        let body = json!({"metaData": {"code": "201", "message": "Data tidak ditemukan"}, "response": null});
        let result = normalizer().normalize_response("test", &ok(body), TS);
        assert_eq!(result.code(), "201");
        assert!(matches!(result, ApiResult::UpstreamError { .. }));
    }

    #[test]
    fn test_no_content_code_is_empty() {
        let body = json!({"metaData": {"code": "204", "message": "Data tidak ada"}});
        let result = normalizer().normalize_response("test", &ok(body), TS);
        assert_eq!(result, ApiResult::empty("Data tidak ada"));
    }

    #[test]
    fn test_plain_structured_response_passes_through() {
        let body = json!({"metaData": {"code": "200", "message": "OK"}, "response": {"list": [1, 2]}});
        let result = normalizer().normalize_response("test", &ok(body), TS);
        assert_eq!(result.payload(), Some(&json!({"list": [1, 2]})));
    }

    #[test]
    fn test_data_field_passes_through() {
        let body = json!({"data": [{"kode": "INT"}]});
        let result = normalizer().normalize_response("test", &ok(body), TS);
        assert_eq!(result.payload(), Some(&json!([{"kode": "INT"}])));
    }

    #[test]
    fn test_null_response_with_ok_meta_is_empty() {
        let body = json!({"metaData": {"code": "200", "message": "Sukses"}, "response": null});
        let result = normalizer().normalize_response("test", &ok(body), TS);
        assert_eq!(result, ApiResult::acknowledged("Sukses"));
        assert!(result.is_acknowledged());
    }

    #[test]
    fn test_bare_object_is_payload() {
        let body = json!({"noSuratKontrol": "0301R0011125K000001"});
        let result = normalizer().normalize_response("test", &ok(body.clone()), TS);
        assert_eq!(result.payload(), Some(&body));
    }

    #[test]
    fn test_bare_array_is_empty() {
        let result = normalizer().normalize_response("test", &ok(json!([1, 2, 3])), TS);
        assert!(result.is_empty());
    }

    #[test]
    fn test_transport_failure() {
        let result = normalizer().normalize("test", Err(TransportError::Timeout("30s".into())));
        assert!(matches!(result, ApiResult::TransportError { .. }));
    }

    #[test]
    fn test_preview_respects_char_boundaries() {
        let body = "é".repeat(600);
        assert_eq!(preview(&body, 500).chars().count(), 500);
        assert_eq!(preview("short", 500), "short");
        assert_eq!(prefix_bytes(&body, 3), "é");
    }
}
