//! PostgreSQL audit log.
//!
//! Upserts are single `INSERT ... ON CONFLICT ... DO UPDATE` statements;
//! `xmax = 0` in the returned row tells a fresh insert from an update.

use std::time::Duration;

use async_trait::async_trait;
use sqlx_core::pool::PoolOptions;
use sqlx_core::query::query;
use sqlx_core::row::Row;
use sqlx_postgres::{PgPool, PgRow, Postgres};
use tracing::{debug, info, instrument, warn};

use crate::error::{AuditResult, require_key};
use crate::repository::AuditLog;
use crate::types::{
    HeaderFields, LineItemAudit, LineItemFields, PrescriptionAudit, Upserted, VoidSelector,
};

/// Type alias for PostgreSQL pool options.
pub type PgPoolOptions = PoolOptions<Postgres>;

const CREATE_HEADER_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS prescription_audit (
    id                  BIGSERIAL PRIMARY KEY,
    visit_id            TEXT NOT NULL UNIQUE,
    external_reference  TEXT,
    prescription_number TEXT NOT NULL DEFAULT '',
    origin_reference    TEXT NOT NULL DEFAULT '',
    poli_code           TEXT NOT NULL DEFAULT '',
    drug_type           TEXT NOT NULL DEFAULT '',
    doctor_code         TEXT NOT NULL DEFAULT '',
    iteration           INTEGER NOT NULL DEFAULT 0,
    user_id             TEXT NOT NULL DEFAULT '',
    prescribed_at       TEXT,
    served_at           TEXT,
    status              TEXT NOT NULL,
    response_message    TEXT,
    created_at          TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at          TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

const CREATE_HEADER_REFERENCE_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS prescription_audit_external_reference_idx
    ON prescription_audit (external_reference)
"#;

const CREATE_ITEM_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS prescription_audit_item (
    id                  BIGSERIAL PRIMARY KEY,
    visit_id            TEXT NOT NULL,
    pharmacy_ref        TEXT NOT NULL,
    external_reference  TEXT,
    prescription_number TEXT NOT NULL DEFAULT '',
    drug_code           TEXT NOT NULL,
    drug_name           TEXT NOT NULL DEFAULT '',
    compounded          BOOLEAN NOT NULL DEFAULT FALSE,
    compound_type       TEXT,
    requested_quantity  DOUBLE PRECISION,
    quantity            DOUBLE PRECISION NOT NULL DEFAULT 0,
    signa1              TEXT NOT NULL DEFAULT '',
    signa2              TEXT NOT NULL DEFAULT '',
    days_supply         INTEGER NOT NULL DEFAULT 0,
    note                TEXT,
    status              TEXT NOT NULL,
    response_message    TEXT,
    created_at          TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at          TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    UNIQUE (visit_id, pharmacy_ref)
)
"#;

const HEADER_COLUMNS: &str = "id, visit_id, external_reference, prescription_number, \
    origin_reference, poli_code, drug_type, doctor_code, iteration, user_id, prescribed_at, \
    served_at, status, response_message, created_at, updated_at";

const ITEM_COLUMNS: &str = "id, visit_id, pharmacy_ref, external_reference, prescription_number, \
    drug_code, drug_name, compounded, compound_type, requested_quantity, quantity, signa1, \
    signa2, days_supply, note, status, response_message, created_at, updated_at";

/// Creates a connection pool for the audit tables.
#[instrument(skip(url), fields(url = %mask_password(url)))]
pub async fn create_pool(url: &str, pool_size: u32, connect_timeout_ms: u64) -> AuditResult<PgPool> {
    info!(pool_size, connect_timeout_ms, "Creating PostgreSQL connection pool");

    let pool = PgPoolOptions::new()
        .max_connections(pool_size)
        .min_connections(1)
        .acquire_timeout(Duration::from_millis(connect_timeout_ms))
        .connect(url)
        .await?;

    debug!("PostgreSQL connection pool created successfully");
    Ok(pool)
}

/// Masks the password in a database URL for logging.
pub fn mask_password(url: &str) -> String {
    if let Some(at_pos) = url.find('@')
        && let Some(colon_pos) = url[..at_pos].rfind(':')
    {
        let scheme_end = url.find("://").map(|p| p + 3).unwrap_or(0);
        if colon_pos > scheme_end {
            return format!("{}:****{}", &url[..colon_pos], &url[at_pos..]);
        }
    }
    url.to_string()
}

pub struct PostgresAuditLog {
    pool: PgPool,
}

impl PostgresAuditLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the audit tables when they do not exist yet.
    #[instrument(skip(self))]
    pub async fn create_tables_if_not_exist(&self) -> AuditResult<()> {
        for statement in [CREATE_HEADER_TABLE, CREATE_HEADER_REFERENCE_INDEX, CREATE_ITEM_TABLE] {
            query(statement).execute(&self.pool).await?;
        }
        debug!("Audit tables ready");
        Ok(())
    }

    fn row_to_header(row: &PgRow) -> AuditResult<PrescriptionAudit> {
        let status: String = row.try_get("status")?;
        Ok(PrescriptionAudit {
            id: row.try_get("id")?,
            visit_id: row.try_get("visit_id")?,
            external_reference: row.try_get("external_reference")?,
            prescription_number: row.try_get("prescription_number")?,
            origin_reference: row.try_get("origin_reference")?,
            poli_code: row.try_get("poli_code")?,
            drug_type: row.try_get("drug_type")?,
            doctor_code: row.try_get("doctor_code")?,
            iteration: row.try_get("iteration")?,
            user_id: row.try_get("user_id")?,
            prescribed_at: row.try_get("prescribed_at")?,
            served_at: row.try_get("served_at")?,
            status: status.parse()?,
            response_message: row.try_get("response_message")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_item(row: &PgRow) -> AuditResult<LineItemAudit> {
        let status: String = row.try_get("status")?;
        Ok(LineItemAudit {
            id: row.try_get("id")?,
            visit_id: row.try_get("visit_id")?,
            pharmacy_ref: row.try_get("pharmacy_ref")?,
            external_reference: row.try_get("external_reference")?,
            prescription_number: row.try_get("prescription_number")?,
            drug_code: row.try_get("drug_code")?,
            drug_name: row.try_get("drug_name")?,
            compounded: row.try_get("compounded")?,
            compound_type: row.try_get("compound_type")?,
            requested_quantity: row.try_get("requested_quantity")?,
            quantity: row.try_get("quantity")?,
            signa1: row.try_get("signa1")?,
            signa2: row.try_get("signa2")?,
            days_supply: row.try_get("days_supply")?,
            note: row.try_get("note")?,
            status: status.parse()?,
            response_message: row.try_get("response_message")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl AuditLog for PostgresAuditLog {
    #[instrument(skip(self, values), fields(status = %values.status))]
    async fn upsert_header(
        &self,
        visit_id: &str,
        values: &HeaderFields,
    ) -> AuditResult<Upserted<PrescriptionAudit>> {
        require_key("visit_id", visit_id)?;

        let sql = format!(
            r#"
            INSERT INTO prescription_audit (
                visit_id, external_reference, prescription_number, origin_reference, poli_code,
                drug_type, doctor_code, iteration, user_id, prescribed_at, served_at, status,
                response_message
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (visit_id) DO UPDATE SET
                external_reference = COALESCE(EXCLUDED.external_reference, prescription_audit.external_reference),
                prescription_number = EXCLUDED.prescription_number,
                origin_reference = EXCLUDED.origin_reference,
                poli_code = EXCLUDED.poli_code,
                drug_type = EXCLUDED.drug_type,
                doctor_code = EXCLUDED.doctor_code,
                iteration = EXCLUDED.iteration,
                user_id = EXCLUDED.user_id,
                prescribed_at = EXCLUDED.prescribed_at,
                served_at = EXCLUDED.served_at,
                status = EXCLUDED.status,
                response_message = EXCLUDED.response_message,
                updated_at = NOW()
            RETURNING {HEADER_COLUMNS}, (xmax = 0) AS inserted
            "#
        );

        let row = query(&sql)
            .bind(visit_id)
            .bind(values.external_reference.as_deref())
            .bind(&values.prescription_number)
            .bind(&values.origin_reference)
            .bind(&values.poli_code)
            .bind(&values.drug_type)
            .bind(&values.doctor_code)
            .bind(values.iteration)
            .bind(&values.user_id)
            .bind(values.prescribed_at.as_deref())
            .bind(values.served_at.as_deref())
            .bind(values.status.as_str())
            .bind(values.response_message.as_deref())
            .fetch_one(&self.pool)
            .await?;

        let was_created: bool = row.try_get("inserted")?;
        debug!(visit_id, was_created, "Upserted prescription audit header");

        Ok(Upserted {
            record: Self::row_to_header(&row)?,
            was_created,
        })
    }

    #[instrument(skip(self, values), fields(status = %values.status))]
    async fn upsert_line_item(
        &self,
        visit_id: &str,
        pharmacy_ref: &str,
        values: &LineItemFields,
    ) -> AuditResult<Upserted<LineItemAudit>> {
        require_key("visit_id", visit_id)?;
        require_key("pharmacy_ref", pharmacy_ref)?;

        let sql = format!(
            r#"
            INSERT INTO prescription_audit_item (
                visit_id, pharmacy_ref, external_reference, prescription_number, drug_code,
                drug_name, compounded, compound_type, requested_quantity, quantity, signa1,
                signa2, days_supply, note, status, response_message
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            ON CONFLICT (visit_id, pharmacy_ref) DO UPDATE SET
                external_reference = COALESCE(EXCLUDED.external_reference, prescription_audit_item.external_reference),
                prescription_number = EXCLUDED.prescription_number,
                drug_code = EXCLUDED.drug_code,
                drug_name = EXCLUDED.drug_name,
                compounded = EXCLUDED.compounded,
                compound_type = EXCLUDED.compound_type,
                requested_quantity = EXCLUDED.requested_quantity,
                quantity = EXCLUDED.quantity,
                signa1 = EXCLUDED.signa1,
                signa2 = EXCLUDED.signa2,
                days_supply = EXCLUDED.days_supply,
                note = EXCLUDED.note,
                status = EXCLUDED.status,
                response_message = EXCLUDED.response_message,
                updated_at = NOW()
            RETURNING {ITEM_COLUMNS}, (xmax = 0) AS inserted
            "#
        );

        let row = query(&sql)
            .bind(visit_id)
            .bind(pharmacy_ref)
            .bind(values.external_reference.as_deref())
            .bind(&values.prescription_number)
            .bind(&values.drug_code)
            .bind(&values.drug_name)
            .bind(values.compounded)
            .bind(values.compound_type.as_deref())
            .bind(values.requested_quantity)
            .bind(values.quantity)
            .bind(&values.signa1)
            .bind(&values.signa2)
            .bind(values.days_supply)
            .bind(values.note.as_deref())
            .bind(values.status.as_str())
            .bind(values.response_message.as_deref())
            .fetch_one(&self.pool)
            .await?;

        let was_created: bool = row.try_get("inserted")?;
        debug!(visit_id, pharmacy_ref, was_created, "Upserted prescription audit item");

        Ok(Upserted {
            record: Self::row_to_item(&row)?,
            was_created,
        })
    }

    #[instrument(skip(self, reason), fields(selector = %selector))]
    async fn mark_voided(&self, selector: &VoidSelector, reason: &str) -> AuditResult<u64> {
        let result = match selector {
            VoidSelector::Prescription { external_reference } => {
                query(
                    r#"
                    UPDATE prescription_audit
                    SET status = 'voided', response_message = $2, updated_at = NOW()
                    WHERE external_reference = $1
                    "#,
                )
                .bind(external_reference)
                .bind(reason)
                .execute(&self.pool)
                .await?
            }
            VoidSelector::LineItem {
                external_reference,
                drug_code,
            } => {
                query(
                    r#"
                    UPDATE prescription_audit_item AS item
                    SET status = 'voided', response_message = $3, updated_at = NOW()
                    FROM prescription_audit AS header
                    WHERE header.external_reference = $1
                      AND item.visit_id = header.visit_id
                      AND item.drug_code = $2
                    "#,
                )
                .bind(external_reference)
                .bind(drug_code)
                .bind(reason)
                .execute(&self.pool)
                .await?
            }
        };

        let changed = result.rows_affected();
        if changed == 0 {
            warn!(selector = %selector, "No audit rows matched void request");
        } else {
            debug!(rows = changed, "Marked audit rows voided");
        }
        Ok(changed)
    }

    async fn find_header(&self, visit_id: &str) -> AuditResult<Option<PrescriptionAudit>> {
        let sql = format!("SELECT {HEADER_COLUMNS} FROM prescription_audit WHERE visit_id = $1");
        let row = query(&sql)
            .bind(visit_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_header).transpose()
    }

    async fn find_header_by_reference(
        &self,
        external_reference: &str,
    ) -> AuditResult<Option<PrescriptionAudit>> {
        let sql = format!(
            "SELECT {HEADER_COLUMNS} FROM prescription_audit WHERE external_reference = $1 \
             ORDER BY updated_at DESC LIMIT 1"
        );
        let row = query(&sql)
            .bind(external_reference)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_header).transpose()
    }

    async fn line_items(&self, visit_id: &str) -> AuditResult<Vec<LineItemAudit>> {
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM prescription_audit_item WHERE visit_id = $1 ORDER BY id"
        );
        let rows = query(&sql).bind(visit_id).fetch_all(&self.pool).await?;
        rows.iter().map(Self::row_to_item).collect()
    }
}
