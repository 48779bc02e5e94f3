use std::sync::Arc;

use anyhow::Context;
use bpjs_audit::{AuditLog, InMemoryAuditLog, PostgresAuditLog, create_pool};
use bpjs_client::ApiClient;
use bpjs_services::{ControlVisitService, PrescriptionService, PrescriptionSettings};

use crate::config::AppConfig;

/// Shared handler state. Built once at startup, read-only afterwards.
#[derive(Clone)]
pub struct AppState {
    pub prescriptions: Arc<PrescriptionService>,
    pub control_visits: Arc<ControlVisitService>,
}

impl AppState {
    pub fn new(cfg: &AppConfig, audit: Arc<dyn AuditLog>) -> anyhow::Result<Self> {
        let apol = ApiClient::new(cfg.apol.credentials()).context("building APOL client")?;
        let vclaim = ApiClient::new(cfg.rencana_kontrol.credentials())
            .context("building Rencana Kontrol client")?;

        let settings = PrescriptionSettings {
            pharmacy_provider_code: cfg.apol.pharmacy_provider_code.clone(),
            utc_offset: cfg.apol.utc_offset(),
        };

        Ok(Self {
            prescriptions: Arc::new(PrescriptionService::new(Arc::new(apol), audit, settings)),
            control_visits: Arc::new(
                ControlVisitService::new(Arc::new(vclaim))
                    .with_cache_ttl(cfg.rencana_kontrol.poli_cache_ttl()),
            ),
        })
    }

    /// State with the audit backend chosen by `storage.database_url`.
    pub async fn from_config(cfg: &AppConfig) -> anyhow::Result<Self> {
        let audit: Arc<dyn AuditLog> = match cfg.storage.database_url.as_deref() {
            Some(url) if !url.trim().is_empty() => {
                let pool = create_pool(url, cfg.storage.pool_size, cfg.storage.connect_timeout_ms)
                    .await
                    .context("connecting to audit database")?;
                let log = PostgresAuditLog::new(pool);
                log.create_tables_if_not_exist()
                    .await
                    .context("creating audit tables")?;
                tracing::info!("Audit log stored in PostgreSQL");
                Arc::new(log)
            }
            _ => {
                tracing::warn!("storage.database_url not set, audit log kept in memory");
                Arc::new(InMemoryAuditLog::new())
            }
        };
        Self::new(cfg, audit)
    }
}
