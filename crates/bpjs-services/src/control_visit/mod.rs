//! VClaim Rencana Kontrol workflows.

pub mod model;

use std::sync::Arc;
use std::time::{Duration, Instant};

use bpjs_client::{ApiClient, ApiResult, OutboundRequest};
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::encode_failure;

pub use model::{ControlPlan, DoctorQuery, PlanSearch};

pub const SEARCH_PATH: &str = "/RencanaKontrol/ListRencanaKontrol";
pub const INSERT_PATH: &str = "/RencanaKontrol/insert";
pub const UPDATE_PATH: &str = "/RencanaKontrol/UpdateRencanaKontrol";
pub const POLI_PATH: &str = "/referensi/poli";
pub const DOCTOR_PATH: &str = "/referensi/dokter";

/// Outpatient service type for the doctor reference.
const OUTPATIENT: &str = "2";

const POLI_CACHE_TTL: Duration = Duration::from_secs(3600);

struct CachedList {
    fetched_at: Instant,
    result: ApiResult,
}

pub struct ControlVisitService {
    client: Arc<ApiClient>,
    poli_cache: RwLock<Option<CachedList>>,
    cache_ttl: Duration,
}

impl ControlVisitService {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self {
            client,
            poli_cache: RwLock::new(None),
            cache_ttl: POLI_CACHE_TTL,
        }
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    #[instrument(skip_all, fields(no_kartu = %search.no_kartu))]
    pub async fn search_plan(&self, search: &PlanSearch) -> ApiResult {
        let request = OutboundRequest::get(SEARCH_PATH)
            .with_query("noka", search.no_kartu.trim())
            .with_query("tglSEP", search.tanggal_sep.trim());
        self.client
            .execute("search_plan", request)
            .await
            .map_payload(model::plan_summary)
    }

    #[instrument(skip_all, fields(no_sep = %plan.no_sep))]
    pub async fn insert_plan(&self, plan: &ControlPlan) -> ApiResult {
        self.send_plan("insert_plan", INSERT_PATH, plan).await
    }

    #[instrument(skip_all, fields(no_sep = %plan.no_sep))]
    pub async fn update_plan(&self, plan: &ControlPlan) -> ApiResult {
        self.send_plan("update_plan", UPDATE_PATH, plan).await
    }

    async fn send_plan(&self, operation: &str, path: &str, plan: &ControlPlan) -> ApiResult {
        match OutboundRequest::post_form_json(path, &plan.body()) {
            Ok(request) => self
                .client
                .execute(operation, request)
                .await
                .map_payload(model::control_letter),
            Err(err) => encode_failure(operation, err),
        }
    }

    /// Poli reference, served from memory while fresh.
    ///
    /// Only successful lists are cached.
    pub async fn poli_list(&self) -> ApiResult {
        if let Some(cached) = self.poli_cache.read().await.as_ref()
            && cached.fetched_at.elapsed() < self.cache_ttl
        {
            debug!("Poli list served from cache");
            return cached.result.clone();
        }

        let mut cache = self.poli_cache.write().await;
        if let Some(cached) = cache.as_ref()
            && cached.fetched_at.elapsed() < self.cache_ttl
        {
            return cached.result.clone();
        }

        let result = self
            .client
            .execute("poli_list", OutboundRequest::get(POLI_PATH))
            .await
            .map_payload(model::reference_list);

        if result.is_success() {
            *cache = Some(CachedList {
                fetched_at: Instant::now(),
                result: result.clone(),
            });
        }
        result
    }

    #[instrument(skip_all, fields(kode_poli = %query.kode_poli))]
    pub async fn doctor_list(&self, query: &DoctorQuery) -> ApiResult {
        let request = OutboundRequest::get(DOCTOR_PATH)
            .with_query("jnsPelayanan", OUTPATIENT)
            .with_query("tglPelayanan", query.tanggal.trim())
            .with_query("spesialis", query.kode_poli.trim());
        self.client
            .execute("doctor_list", request)
            .await
            .map_payload(model::reference_list)
    }
}
