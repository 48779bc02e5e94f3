use async_trait::async_trait;

use crate::error::AuditResult;
use crate::types::{
    HeaderFields, LineItemAudit, LineItemFields, PrescriptionAudit, Upserted, VoidSelector,
};

/// Storage backend for the submission audit log.
///
/// Every write is an upsert on a natural key, so repeating a submission
/// updates the existing rows instead of adding new ones. Rows are never
/// deleted; voiding is a status change.
#[async_trait]
pub trait AuditLog: Send + Sync {
    /// Atomically creates or overwrites the header for `visit_id`.
    async fn upsert_header(
        &self,
        visit_id: &str,
        fields: &HeaderFields,
    ) -> AuditResult<Upserted<PrescriptionAudit>>;

    /// Atomically creates or overwrites the item keyed by
    /// `(visit_id, pharmacy_ref)`.
    async fn upsert_line_item(
        &self,
        visit_id: &str,
        pharmacy_ref: &str,
        fields: &LineItemFields,
    ) -> AuditResult<Upserted<LineItemAudit>>;

    /// Marks matching rows voided with `reason` as response message.
    ///
    /// Returns the number of rows changed. Zero matches is not an error.
    async fn mark_voided(&self, selector: &VoidSelector, reason: &str) -> AuditResult<u64>;

    async fn find_header(&self, visit_id: &str) -> AuditResult<Option<PrescriptionAudit>>;

    async fn find_header_by_reference(
        &self,
        external_reference: &str,
    ) -> AuditResult<Option<PrescriptionAudit>>;

    /// Items of one visit in insertion order.
    async fn line_items(&self, visit_id: &str) -> AuditResult<Vec<LineItemAudit>>;
}
