pub mod apol;
pub mod rencana_kontrol;

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::Query;
use serde_json::{Value, json};

use crate::response::Envelope;

pub async fn healthz() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

/// Unwraps a JSON body, turning a rejection into a 400 envelope.
pub(crate) fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, Envelope> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| Envelope::invalid(rejection.body_text()))
}

pub(crate) fn query<T>(params: Result<Query<T>, QueryRejection>) -> Result<T, Envelope> {
    params
        .map(|Query(value)| value)
        .map_err(|rejection| Envelope::invalid(rejection.body_text()))
}

/// Runs a request's own validation.
pub(crate) fn validated<T>(value: T, check: impl FnOnce(&T) -> Result<(), String>) -> Result<T, Envelope> {
    check(&value).map_err(Envelope::invalid)?;
    Ok(value)
}
