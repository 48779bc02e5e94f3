//! `/apol/*` endpoints.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use bpjs_services::prescription::{
    DeleteDrug, DeletePrescription, PrescriptionListQuery, PrescriptionSubmission,
    SubmissionReport,
};
use serde_json::{Value, json};

use super::{body, validated};
use crate::response::Envelope;
use crate::state::AppState;

pub async fn daftar_resep(
    State(state): State<AppState>,
    payload: Result<Json<PrescriptionListQuery>, JsonRejection>,
) -> Envelope {
    let query = match body(payload).and_then(|q| validated(q, PrescriptionListQuery::validate)) {
        Ok(query) => query,
        Err(rejected) => return rejected,
    };
    Envelope::from_result(state.prescriptions.list_prescriptions(&query).await)
}

pub async fn summary_resep(
    State(state): State<AppState>,
    payload: Result<Json<PrescriptionListQuery>, JsonRejection>,
) -> Envelope {
    let query = match body(payload).and_then(|q| validated(q, PrescriptionListQuery::validate)) {
        Ok(query) => query,
        Err(rejected) => return rejected,
    };
    let report = state.prescriptions.prescription_summary(&query).await;
    let envelope = Envelope::from_result(report.result);
    if !envelope.success {
        return envelope;
    }
    envelope.with_extra(
        "summary",
        serde_json::to_value(&report.summary).unwrap_or_default(),
    )
}

pub async fn hapus_resep(
    State(state): State<AppState>,
    payload: Result<Json<DeletePrescription>, JsonRejection>,
) -> Envelope {
    let request = match body(payload).and_then(|r| validated(r, DeletePrescription::validate)) {
        Ok(request) => request,
        Err(rejected) => return rejected,
    };
    Envelope::from_result(state.prescriptions.delete_prescription(&request).await)
}

pub async fn hapus_obat(
    State(state): State<AppState>,
    payload: Result<Json<DeleteDrug>, JsonRejection>,
) -> Envelope {
    let request = match body(payload).and_then(|r| validated(r, DeleteDrug::validate)) {
        Ok(request) => request,
        Err(rejected) => return rejected,
    };
    Envelope::from_result(state.prescriptions.delete_drug(&request).await)
}

pub async fn daftar_pelayanan_obat(
    State(state): State<AppState>,
    Path(nosep): Path<String>,
) -> Envelope {
    if nosep.trim().is_empty() {
        return Envelope::invalid("nosep is required");
    }
    Envelope::from_result(state.prescriptions.drug_service_list(&nosep).await)
}

pub async fn simpan_resep(
    State(state): State<AppState>,
    payload: Result<Json<PrescriptionSubmission>, JsonRejection>,
) -> Envelope {
    let submission =
        match body(payload).and_then(|s| validated(s, PrescriptionSubmission::validate)) {
            Ok(submission) => submission,
            Err(rejected) => return rejected,
        };
    let report = state.prescriptions.submit_prescription(&submission).await;
    submission_envelope(report)
}

fn submission_envelope(report: SubmissionReport) -> Envelope {
    let items: Vec<Value> = report
        .items
        .iter()
        .map(|item| {
            json!({
                "ID": item.pharmacy_ref,
                "kodeobat": item.drug_code,
                "racikan": item.compounded,
                "success": item.result.is_success(),
                "code": item.result.code(),
                "message": item.result.message(),
            })
        })
        .collect();
    let data = json!({
        "noApotik": report.external_reference,
        "header": report.result.payload().cloned().unwrap_or(Value::Null),
        "items": items,
    });
    Envelope::from_result(report.result).with_data(data)
}
