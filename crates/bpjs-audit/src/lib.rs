//! Audit log of submissions sent to the BPJS pharmacy gateway.
//!
//! Two logical tables are kept:
//!
//! - prescription headers, one row per visit id
//! - prescription line items, one row per (visit id, pharmacy reference)
//!
//! Every write is an atomic upsert on that natural key, so a repeated or
//! concurrent submission for the same visit never creates duplicate rows.
//! Deletion upstream is recorded as [`AuditStatus::Voided`], rows are never
//! removed.
//!
//! # Example
//!
//! ```ignore
//! use bpjs_audit::{AuditLog, InMemoryAuditLog, VoidSelector};
//!
//! let log = InMemoryAuditLog::new();
//! let selector = VoidSelector::Prescription { external_reference: "0112A0170825000001".into() };
//! let voided = log.mark_voided(&selector, "batal").await?;
//! ```

pub mod error;
pub mod memory;
pub mod postgres;
pub mod repository;
pub mod types;

pub use error::{AuditError, AuditResult};
pub use memory::InMemoryAuditLog;
pub use postgres::{PostgresAuditLog, create_pool, mask_password};
pub use repository::AuditLog;
pub use types::{
    AuditStatus, HeaderFields, LineItemAudit, LineItemFields, PrescriptionAudit, Upserted,
    VoidSelector,
};

/// PostgreSQL connection pool type alias.
pub type PgPool = sqlx_postgres::PgPool;
