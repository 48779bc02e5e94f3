//! APOL prescription workflows.
//!
//! Submissions go header first, then one call per drug line. Both levels are
//! written to the audit log whatever the gateway answers; a failed audit
//! write is logged and never fails the call.

pub mod drug_list;
pub mod model;
pub mod summary;

use std::sync::Arc;

use bpjs_audit::{AuditLog, AuditStatus, HeaderFields, LineItemFields, VoidSelector};
use bpjs_client::{ApiClient, ApiResult, Body, EmptyPolicy, Method, OutboundRequest};
use time::UtcOffset;
use tracing::{debug, error, info, instrument, warn};

use crate::dates::now_upstream;
use crate::encode_failure;
use crate::fields::scalar_string;

pub use drug_list::normalize_drug_list;
pub use model::{
    DeleteDrug, DeletePrescription, PrescriptionItem, PrescriptionListQuery,
    PrescriptionSubmission,
};
pub use summary::{Period, PrescriptionSummary};

use model::{HeaderBody, ItemBody};

pub const LIST_PATH: &str = "/daftarresep";
pub const DELETE_PRESCRIPTION_PATH: &str = "/hapusresep";
pub const DELETE_DRUG_PATHS: [&str; 2] = ["/pelayanan/obat/hapus", "/obat/hapus"];
pub const DRUG_LIST_PATH: &str = "/pelayanan/obat/daftar";
pub const SUBMIT_PATH: &str = "/sjpresep/v3/insert";
pub const COMPOUNDED_ITEM_PATH: &str = "/obatracikan/v3/insert";
pub const PLAIN_ITEM_PATH: &str = "/obatnonracikan/v3/insert";

/// Response message stored on voided audit rows.
pub const VOID_REASON: &str = "batal";

#[derive(Debug, Clone)]
pub struct PrescriptionSettings {
    /// Default `kdppk` for list queries
    pub pharmacy_provider_code: String,
    /// Offset used for dates the caller leaves out
    pub utc_offset: UtcOffset,
}

impl Default for PrescriptionSettings {
    fn default() -> Self {
        Self {
            pharmacy_provider_code: String::new(),
            utc_offset: UtcOffset::from_hms(7, 0, 0).unwrap_or(UtcOffset::UTC),
        }
    }
}

/// Result of one drug line submission.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemOutcome {
    pub pharmacy_ref: String,
    pub drug_code: String,
    pub compounded: bool,
    pub result: ApiResult,
}

/// Result of a whole submission.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionReport {
    /// Header call result
    pub result: ApiResult,
    /// `noApotik` assigned by the gateway
    pub external_reference: Option<String>,
    /// Empty unless the header was accepted
    pub items: Vec<ItemOutcome>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryReport {
    pub result: ApiResult,
    pub summary: PrescriptionSummary,
}

pub struct PrescriptionService {
    client: Arc<ApiClient>,
    audit: Arc<dyn AuditLog>,
    settings: PrescriptionSettings,
}

impl PrescriptionService {
    pub fn new(client: Arc<ApiClient>, audit: Arc<dyn AuditLog>, settings: PrescriptionSettings) -> Self {
        Self {
            client,
            audit,
            settings,
        }
    }

    pub fn settings(&self) -> &PrescriptionSettings {
        &self.settings
    }

    /// Prescription list for a date range.
    #[instrument(skip_all, fields(date_kind = %query.date_kind))]
    pub async fn list_prescriptions(&self, query: &PrescriptionListQuery) -> ApiResult {
        const OPERATION: &str = "list_prescriptions";

        let body = query.body(&self.settings.pharmacy_provider_code);
        let form = match OutboundRequest::post_form_json(LIST_PATH, &body) {
            Ok(request) => request,
            Err(err) => return encode_failure(OPERATION, err),
        };
        let json = match serde_json::to_string(&body) {
            Ok(text) => OutboundRequest::new(Method::POST, LIST_PATH).with_body(Body::Json(text)),
            Err(err) => return encode_failure(OPERATION, err.into()),
        };

        self.client
            .orchestrate(OPERATION)
            .accept_empty(true)
            .strategy(self.client.request_strategy("raw_json_as_urlencoded", form))
            .strategy(self.client.request_strategy("raw_json_as_json", json))
            .run()
            .await
            .into_result()
    }

    /// List plus aggregate figures.
    pub async fn prescription_summary(&self, query: &PrescriptionListQuery) -> SummaryReport {
        let result = self.list_prescriptions(query).await;
        let period = Period {
            tanggal_mulai: query.start.clone(),
            tanggal_akhir: query.end.clone(),
        };
        let summary = summary::summarize(result.payload(), period);
        SummaryReport { result, summary }
    }

    /// Deletes a whole prescription and voids its audit header.
    ///
    /// The header is voided only when the gateway confirmed the delete.
    #[instrument(skip_all, fields(nosjp = %request.nosjp.trim()))]
    pub async fn delete_prescription(&self, request: &DeletePrescription) -> ApiResult {
        const OPERATION: &str = "delete_prescription";

        let request = request.trimmed();
        let outbound = match OutboundRequest::delete_form_json(DELETE_PRESCRIPTION_PATH, &request) {
            Ok(outbound) => outbound,
            Err(err) => return encode_failure(OPERATION, err),
        };

        let result = self
            .client
            .orchestrate(OPERATION)
            .empty_policy(EmptyPolicy::AcknowledgedOnly)
            .strategy(self.client.request_strategy("delete_raw_json_as_urlencoded", outbound))
            .run()
            .await
            .into_result();

        if result.is_acknowledged() {
            self.void(VoidSelector::Prescription {
                external_reference: request.nosjp,
            })
            .await;
        }
        result
    }

    /// Deletes one drug line, trying both gateway paths.
    #[instrument(skip_all, fields(nosepapotek = %request.nosepapotek.trim(), kodeobat = %request.kodeobat.trim()))]
    pub async fn delete_drug(&self, request: &DeleteDrug) -> ApiResult {
        const OPERATION: &str = "delete_drug";

        let body = request.body();
        let mut orchestrator = self
            .client
            .orchestrate(OPERATION)
            .empty_policy(EmptyPolicy::AcknowledgedOnly);
        for (name, path) in [("pelayanan_obat_hapus", DELETE_DRUG_PATHS[0]), ("obat_hapus", DELETE_DRUG_PATHS[1])] {
            match OutboundRequest::delete_form_json(path, &body) {
                Ok(outbound) => orchestrator = orchestrator.strategy(self.client.request_strategy(name, outbound)),
                Err(err) => return encode_failure(OPERATION, err),
            }
        }

        let result = orchestrator.run().await.into_result();
        if result.is_acknowledged() {
            self.void(VoidSelector::LineItem {
                external_reference: request.nosepapotek.trim().to_string(),
                drug_code: request.kodeobat.trim().to_string(),
            })
            .await;
        }
        result
    }

    /// Drugs already served under a pharmacy SEP.
    #[instrument(skip(self))]
    pub async fn drug_service_list(&self, no_sep: &str) -> ApiResult {
        let path = format!("{DRUG_LIST_PATH}/{}", urlencoding::encode(no_sep.trim()));
        self.client
            .execute("drug_service_list", OutboundRequest::get(path))
            .await
            .map_payload(normalize_drug_list)
    }

    /// Sends the header, then every line item when the header was accepted.
    #[instrument(skip_all, fields(visit_id = %submission.visit_id(), items = submission.items.len()))]
    pub async fn submit_prescription(&self, submission: &PrescriptionSubmission) -> SubmissionReport {
        const OPERATION: &str = "submit_prescription";

        let visit_id = submission.visit_id().to_string();
        let header = submission.header_body(&now_upstream(self.settings.utc_offset));

        let result = match OutboundRequest::post_form_json(SUBMIT_PATH, &header) {
            Ok(outbound) => self.client.execute(OPERATION, outbound).await,
            Err(err) => encode_failure(OPERATION, err),
        };

        let delivered = result.is_success() && result.code() == "200";
        let external_reference = result
            .payload()
            .and_then(|payload| payload.get("noApotik"))
            .and_then(scalar_string)
            .filter(|reference| !reference.trim().is_empty());

        self.record_header(&visit_id, &header, &result, delivered, external_reference.clone())
            .await;

        let mut items = Vec::new();
        if !delivered {
            warn!(visit_id, code = result.code(), message = result.message(), "Prescription header rejected, items not sent");
            return SubmissionReport {
                result,
                external_reference,
                items,
            };
        }

        let reference = external_reference.clone().unwrap_or_default();
        if reference.is_empty() {
            warn!(visit_id, "Gateway accepted header without noApotik");
        }

        for item in &submission.items {
            items.push(
                self.submit_item(&visit_id, item, &reference, &header.prescription_number)
                    .await,
            );
        }

        let failed = items.iter().filter(|i| !i.result.is_success()).count();
        info!(visit_id, external_reference = %reference, sent = items.len(), failed, "Prescription submitted");

        SubmissionReport {
            result,
            external_reference,
            items,
        }
    }

    async fn submit_item(
        &self,
        visit_id: &str,
        item: &PrescriptionItem,
        external_reference: &str,
        prescription_number: &str,
    ) -> ItemOutcome {
        let (operation, path) = if item.compounded {
            ("submit_compounded_item", COMPOUNDED_ITEM_PATH)
        } else {
            ("submit_plain_item", PLAIN_ITEM_PATH)
        };

        let body = item.body(external_reference, prescription_number);
        let result = match OutboundRequest::post_form_json(path, &body) {
            Ok(outbound) => self.client.execute(operation, outbound).await,
            Err(err) => encode_failure(operation, err),
        };

        self.record_item(visit_id, item.pharmacy_ref(), &body, &result).await;

        ItemOutcome {
            pharmacy_ref: item.pharmacy_ref().to_string(),
            drug_code: body.drug_code,
            compounded: item.compounded,
            result,
        }
    }

    async fn record_header(
        &self,
        visit_id: &str,
        header: &HeaderBody,
        result: &ApiResult,
        delivered: bool,
        external_reference: Option<String>,
    ) {
        let fields = HeaderFields {
            external_reference,
            prescription_number: header.prescription_number.clone(),
            origin_reference: header.origin_reference.clone(),
            poli_code: header.poli_code.clone(),
            drug_type: header.drug_type.clone(),
            doctor_code: header.doctor_code.clone(),
            iteration: header.iteration.trim().parse().unwrap_or(0),
            user_id: header.user_id.clone(),
            prescribed_at: Some(header.prescribed_at.clone()),
            served_at: Some(header.served_at.clone()),
            status: if delivered {
                AuditStatus::Delivered
            } else {
                AuditStatus::Failed
            },
            response_message: Some(result.message().to_string()),
        };

        match self.audit.upsert_header(visit_id, &fields).await {
            Ok(upserted) => debug!(visit_id, created = upserted.was_created, status = %fields.status, "Recorded prescription header"),
            Err(err) => error!(visit_id, error = %err, "Failed to record prescription header"),
        }
    }

    async fn record_item(&self, visit_id: &str, pharmacy_ref: &str, body: &ItemBody, result: &ApiResult) {
        let (signa1, signa2) = body.signa_strings();
        let fields = LineItemFields {
            external_reference: Some(body.external_reference.clone()).filter(|r| !r.is_empty()),
            prescription_number: body.prescription_number.clone(),
            drug_code: body.drug_code.clone(),
            drug_name: body.drug_name.clone(),
            compounded: body.compound_type.is_some(),
            compound_type: body.compound_type.clone(),
            requested_quantity: body.requested_quantity_f64(),
            quantity: body.quantity_f64(),
            signa1,
            signa2,
            days_supply: body.days_supply,
            note: Some(body.note.clone()),
            status: if result.is_success() {
                AuditStatus::Delivered
            } else {
                AuditStatus::Failed
            },
            response_message: Some(result.message().to_string()),
        };

        if let Err(err) = self.audit.upsert_line_item(visit_id, pharmacy_ref, &fields).await {
            error!(visit_id, pharmacy_ref, error = %err, "Failed to record prescription item");
        }
    }

    async fn void(&self, selector: VoidSelector) {
        match self.audit.mark_voided(&selector, VOID_REASON).await {
            Ok(rows) => debug!(%selector, rows, "Voided audit rows"),
            Err(err) => error!(%selector, error = %err, "Failed to void audit rows"),
        }
    }
}
