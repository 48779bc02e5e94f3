//! In-memory audit log backed by `DashMap`.
//!
//! The entry API holds the shard lock across find-or-create, which gives the
//! same atomicity as the PostgreSQL `ON CONFLICT` upserts.

use std::collections::HashSet;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::error::{AuditResult, require_key};
use crate::repository::AuditLog;
use crate::types::{
    AuditStatus, HeaderFields, LineItemAudit, LineItemFields, PrescriptionAudit, Upserted,
    VoidSelector,
};

#[derive(Debug, Default)]
pub struct InMemoryAuditLog {
    headers: DashMap<String, PrescriptionAudit>,
    items: DashMap<(String, String), LineItemAudit>,
    next_id: AtomicI64,
}

impl InMemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }
}

fn apply_header(record: &mut PrescriptionAudit, fields: &HeaderFields, now: OffsetDateTime) {
    if let Some(reference) = &fields.external_reference {
        record.external_reference = Some(reference.clone());
    }
    record.prescription_number = fields.prescription_number.clone();
    record.origin_reference = fields.origin_reference.clone();
    record.poli_code = fields.poli_code.clone();
    record.drug_type = fields.drug_type.clone();
    record.doctor_code = fields.doctor_code.clone();
    record.iteration = fields.iteration;
    record.user_id = fields.user_id.clone();
    record.prescribed_at = fields.prescribed_at.clone();
    record.served_at = fields.served_at.clone();
    record.status = fields.status;
    record.response_message = fields.response_message.clone();
    record.updated_at = now;
}

fn apply_item(record: &mut LineItemAudit, fields: &LineItemFields, now: OffsetDateTime) {
    if let Some(reference) = &fields.external_reference {
        record.external_reference = Some(reference.clone());
    }
    record.prescription_number = fields.prescription_number.clone();
    record.drug_code = fields.drug_code.clone();
    record.drug_name = fields.drug_name.clone();
    record.compounded = fields.compounded;
    record.compound_type = fields.compound_type.clone();
    record.requested_quantity = fields.requested_quantity;
    record.quantity = fields.quantity;
    record.signa1 = fields.signa1.clone();
    record.signa2 = fields.signa2.clone();
    record.days_supply = fields.days_supply;
    record.note = fields.note.clone();
    record.status = fields.status;
    record.response_message = fields.response_message.clone();
    record.updated_at = now;
}

#[async_trait]
impl AuditLog for InMemoryAuditLog {
    async fn upsert_header(
        &self,
        visit_id: &str,
        fields: &HeaderFields,
    ) -> AuditResult<Upserted<PrescriptionAudit>> {
        require_key("visit_id", visit_id)?;
        let now = OffsetDateTime::now_utc();

        let upserted = match self.headers.entry(visit_id.to_string()) {
            Entry::Occupied(mut entry) => {
                apply_header(entry.get_mut(), fields, now);
                Upserted {
                    record: entry.get().clone(),
                    was_created: false,
                }
            }
            Entry::Vacant(entry) => {
                let mut record = PrescriptionAudit {
                    id: self.next_id(),
                    visit_id: visit_id.to_string(),
                    external_reference: None,
                    prescription_number: String::new(),
                    origin_reference: String::new(),
                    poli_code: String::new(),
                    drug_type: String::new(),
                    doctor_code: String::new(),
                    iteration: 0,
                    user_id: String::new(),
                    prescribed_at: None,
                    served_at: None,
                    status: AuditStatus::Pending,
                    response_message: None,
                    created_at: now,
                    updated_at: now,
                };
                apply_header(&mut record, fields, now);
                entry.insert(record.clone());
                Upserted {
                    record,
                    was_created: true,
                }
            }
        };

        debug!(visit_id, was_created = upserted.was_created, "Upserted prescription audit header");
        Ok(upserted)
    }

    async fn upsert_line_item(
        &self,
        visit_id: &str,
        pharmacy_ref: &str,
        fields: &LineItemFields,
    ) -> AuditResult<Upserted<LineItemAudit>> {
        require_key("visit_id", visit_id)?;
        require_key("pharmacy_ref", pharmacy_ref)?;
        let now = OffsetDateTime::now_utc();

        let key = (visit_id.to_string(), pharmacy_ref.to_string());
        let upserted = match self.items.entry(key) {
            Entry::Occupied(mut entry) => {
                apply_item(entry.get_mut(), fields, now);
                Upserted {
                    record: entry.get().clone(),
                    was_created: false,
                }
            }
            Entry::Vacant(entry) => {
                let mut record = LineItemAudit {
                    id: self.next_id(),
                    visit_id: visit_id.to_string(),
                    pharmacy_ref: pharmacy_ref.to_string(),
                    external_reference: None,
                    prescription_number: String::new(),
                    drug_code: String::new(),
                    drug_name: String::new(),
                    compounded: false,
                    compound_type: None,
                    requested_quantity: None,
                    quantity: 0.0,
                    signa1: String::new(),
                    signa2: String::new(),
                    days_supply: 0,
                    note: None,
                    status: AuditStatus::Pending,
                    response_message: None,
                    created_at: now,
                    updated_at: now,
                };
                apply_item(&mut record, fields, now);
                entry.insert(record.clone());
                Upserted {
                    record,
                    was_created: true,
                }
            }
        };

        debug!(
            visit_id,
            pharmacy_ref,
            was_created = upserted.was_created,
            "Upserted prescription audit item"
        );
        Ok(upserted)
    }

    async fn mark_voided(&self, selector: &VoidSelector, reason: &str) -> AuditResult<u64> {
        let now = OffsetDateTime::now_utc();
        let mut changed = 0u64;

        match selector {
            VoidSelector::Prescription { external_reference } => {
                for mut header in self.headers.iter_mut() {
                    if header.external_reference.as_deref() == Some(external_reference.as_str()) {
                        header.status = AuditStatus::Voided;
                        header.response_message = Some(reason.to_string());
                        header.updated_at = now;
                        changed += 1;
                    }
                }
            }
            VoidSelector::LineItem {
                external_reference,
                drug_code,
            } => {
                let visits: HashSet<String> = self
                    .headers
                    .iter()
                    .filter(|h| h.external_reference.as_deref() == Some(external_reference.as_str()))
                    .map(|h| h.visit_id.clone())
                    .collect();

                for mut item in self.items.iter_mut() {
                    if visits.contains(&item.visit_id) && item.drug_code == *drug_code {
                        item.status = AuditStatus::Voided;
                        item.response_message = Some(reason.to_string());
                        item.updated_at = now;
                        changed += 1;
                    }
                }
            }
        }

        if changed == 0 {
            warn!(selector = %selector, "No audit rows matched void request");
        } else {
            debug!(selector = %selector, rows = changed, "Marked audit rows voided");
        }
        Ok(changed)
    }

    async fn find_header(&self, visit_id: &str) -> AuditResult<Option<PrescriptionAudit>> {
        Ok(self.headers.get(visit_id).map(|h| h.clone()))
    }

    async fn find_header_by_reference(
        &self,
        external_reference: &str,
    ) -> AuditResult<Option<PrescriptionAudit>> {
        Ok(self
            .headers
            .iter()
            .find(|h| h.external_reference.as_deref() == Some(external_reference))
            .map(|h| h.clone()))
    }

    async fn line_items(&self, visit_id: &str) -> AuditResult<Vec<LineItemAudit>> {
        let mut items: Vec<LineItemAudit> = self
            .items
            .iter()
            .filter(|item| item.visit_id == visit_id)
            .map(|item| item.clone())
            .collect();
        items.sort_by_key(|item| item.id);
        Ok(items)
    }
}
