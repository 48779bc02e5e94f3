//! `/rencana-kontrol/*` endpoints.

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use bpjs_services::control_visit::{ControlPlan, DoctorQuery, PlanSearch};

use super::{body, query, validated};
use crate::response::Envelope;
use crate::state::AppState;

pub async fn cari_data(
    State(state): State<AppState>,
    payload: Result<Json<PlanSearch>, JsonRejection>,
) -> Envelope {
    let search = match body(payload).and_then(|s| validated(s, PlanSearch::validate)) {
        Ok(search) => search,
        Err(rejected) => return rejected,
    };
    Envelope::from_result(state.control_visits.search_plan(&search).await)
}

pub async fn insert(
    State(state): State<AppState>,
    payload: Result<Json<ControlPlan>, JsonRejection>,
) -> Envelope {
    let plan = match body(payload).and_then(|p| validated(p, ControlPlan::validate)) {
        Ok(plan) => plan,
        Err(rejected) => return rejected,
    };
    Envelope::from_result(state.control_visits.insert_plan(&plan).await)
}

pub async fn update(
    State(state): State<AppState>,
    payload: Result<Json<ControlPlan>, JsonRejection>,
) -> Envelope {
    let plan = match body(payload).and_then(|p| validated(p, ControlPlan::validate)) {
        Ok(plan) => plan,
        Err(rejected) => return rejected,
    };
    Envelope::from_result(state.control_visits.update_plan(&plan).await)
}

pub async fn poli(State(state): State<AppState>) -> Envelope {
    Envelope::from_result(state.control_visits.poli_list().await)
}

pub async fn dokter(
    State(state): State<AppState>,
    params: Result<Query<DoctorQuery>, QueryRejection>,
) -> Envelope {
    let doctor_query = match query(params).and_then(|q| validated(q, DoctorQuery::validate)) {
        Ok(doctor_query) => doctor_query,
        Err(rejected) => return rejected,
    };
    Envelope::from_result(state.control_visits.doctor_list(&doctor_query).await)
}
