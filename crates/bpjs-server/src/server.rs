use std::net::SocketAddr;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{config::AppConfig, handlers, state::AppState};

pub struct BpjsServer {
    addr: SocketAddr,
    app: Router,
}

pub fn build_app(state: AppState, body_limit: usize) -> Router {
    Router::new()
        .route("/healthz", get(handlers::healthz))
        // Pharmacy (APOL)
        .route("/apol/daftar-resep", post(handlers::apol::daftar_resep))
        .route("/apol/summary-resep", post(handlers::apol::summary_resep))
        .route(
            "/apol/hapus-resep",
            post(handlers::apol::hapus_resep).delete(handlers::apol::hapus_resep),
        )
        .route("/apol/hapus-obat", post(handlers::apol::hapus_obat))
        .route(
            "/apol/pelayanan/obat/daftar/{nosep}",
            get(handlers::apol::daftar_pelayanan_obat),
        )
        .route("/apol/simpan-resep", post(handlers::apol::simpan_resep))
        // Control visits (Rencana Kontrol)
        .route(
            "/rencana-kontrol/cari-data",
            post(handlers::rencana_kontrol::cari_data),
        )
        .route("/rencana-kontrol/insert", post(handlers::rencana_kontrol::insert))
        .route("/rencana-kontrol/update", post(handlers::rencana_kontrol::update))
        .route("/rencana-kontrol/poli", get(handlers::rencana_kontrol::poli))
        .route("/rencana-kontrol/dokter", get(handlers::rencana_kontrol::dokter))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http.request",
                        http.method = %req.method(),
                        http.target = %req.uri(),
                        http.status_code = tracing::field::Empty,
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>, latency: std::time::Duration, span: &tracing::Span| {
                        span.record("http.status_code", tracing::field::display(res.status().as_u16()));
                        tracing::info!(
                            http.status = %res.status().as_u16(),
                            elapsed_ms = %latency.as_millis(),
                            "request handled"
                        );
                    },
                ),
        )
        .layer(axum::extract::DefaultBodyLimit::max(body_limit))
}

pub struct ServerBuilder {
    config: AppConfig,
    state: Option<AppState>,
}

impl ServerBuilder {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            state: None,
        }
    }

    /// Uses prepared state instead of building it from the configuration.
    pub fn with_state(mut self, state: AppState) -> Self {
        self.state = Some(state);
        self
    }

    pub async fn build(self) -> anyhow::Result<BpjsServer> {
        let state = match self.state {
            Some(state) => state,
            None => AppState::from_config(&self.config).await?,
        };
        Ok(BpjsServer {
            addr: self.config.addr(),
            app: build_app(state, self.config.server.body_limit_bytes),
        })
    }
}

impl BpjsServer {
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
