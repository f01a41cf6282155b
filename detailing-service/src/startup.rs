use crate::config::{DetailingConfig, StoreBackend};
use crate::handlers;
use crate::services::{
    InventoryService, InvoiceGenerator, JobService, LoggingNotifier, MemoryStore, MongoDb,
    PaymentService, StageNotifier, Store,
};
use axum::{
    body::Body,
    middleware,
    routing::{delete, get, patch, post, put},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::metrics::metrics_middleware;
use service_core::middleware::tracing::{http_request_span, request_id_middleware};
use service_core::retry::RetryConfig;
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub config: DetailingConfig,
    pub store: Arc<dyn Store>,
    pub inventory: InventoryService,
    pub invoicing: InvoiceGenerator,
    pub jobs: JobService,
    pub payments: PaymentService,
}

impl AppState {
    pub fn new(
        config: DetailingConfig,
        store: Arc<dyn Store>,
        notifier: Arc<dyn StageNotifier>,
    ) -> Self {
        let retry = RetryConfig::contention(config.concurrency.max_retries);
        let inventory = InventoryService::new(store.clone(), retry.clone());
        let invoicing = InvoiceGenerator::new(store.clone(), config.invoicing.clone());
        let jobs = JobService::new(
            store.clone(),
            inventory.clone(),
            invoicing.clone(),
            notifier,
            retry,
        );
        let payments = PaymentService::new(store.clone(), jobs.clone());

        Self {
            config,
            store,
            inventory,
            invoicing,
            jobs,
            payments,
        }
    }
}

pub struct Application {
    port: u16,
    server: Box<dyn std::future::Future<Output = std::io::Result<()>> + Send + Unpin>,
    state: AppState,
}

impl Application {
    pub async fn build(config: DetailingConfig) -> Result<Self, AppError> {
        let store: Arc<dyn Store> = match config.store {
            StoreBackend::Mongo => {
                let db = MongoDb::connect(&config.mongodb.uri, &config.mongodb.database)
                    .await
                    .map_err(|e| {
                        tracing::error!("Failed to connect to MongoDB: {}", e);
                        e
                    })?;
                db.initialize_indexes().await.map_err(|e| {
                    tracing::error!("Failed to initialize database indexes: {}", e);
                    e
                })?;
                Arc::new(db)
            }
            StoreBackend::Memory => {
                tracing::warn!("Using in-memory store; data is lost on restart");
                Arc::new(MemoryStore::new())
            }
        };

        Self::build_with(config, store, Arc::new(LoggingNotifier)).await
    }

    /// Build on an existing store and notifier.
    pub async fn build_with(
        config: DetailingConfig,
        store: Arc<dyn Store>,
        notifier: Arc<dyn StageNotifier>,
    ) -> Result<Self, AppError> {
        let state = AppState::new(config.clone(), store, notifier);
        state.invoicing.seed_counters().await.map_err(|e| {
            tracing::error!("Failed to seed invoice counters: {}", e);
            AppError::from(e)
        })?;

        let app = router(state.clone());

        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Listening on {}", port);

        let server = axum::serve(listener, app);

        Ok(Self {
            port,
            server: Box::new(server.into_future()),
            state,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        self.server.await
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_endpoint))
        .route("/customers", post(handlers::create_customer))
        .route("/customers/:id", get(handlers::get_customer))
        .route(
            "/inventory",
            get(handlers::list_items).post(handlers::create_item),
        )
        .route("/inventory/ensure", put(handlers::ensure_item))
        .route("/inventory/:id", get(handlers::get_item))
        .route("/inventory/:id/rolls", post(handlers::add_roll))
        .route("/inventory/:id/rolls/:roll_id", delete(handlers::delete_roll))
        .route(
            "/inventory/:id/rolls/:roll_id/deduct",
            post(handlers::deduct_roll),
        )
        .route("/inventory/:id/consume", post(handlers::consume_item))
        .route("/inventory/:id/adjust", post(handlers::adjust_item))
        .route("/jobs", post(handlers::create_job))
        .route("/jobs/:id", get(handlers::get_job))
        .route("/jobs/:id/stage", patch(handlers::update_stage))
        .route("/jobs/:id/payments", post(handlers::record_payment))
        .route("/jobs/:id/invoices", post(handlers::regenerate_invoices))
        .route(
            "/invoices",
            get(handlers::list_invoices).post(handlers::create_manual_invoice),
        )
        .route("/invoices/:id", get(handlers::get_invoice))
        .route("/invoices/:id/mark-paid", post(handlers::mark_invoice_paid))
        .route_layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(http_request_span::<Body>))
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}
