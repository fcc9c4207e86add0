//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the axum Router and bind each route to its deadline composition
//! - Wire up middleware (request ID, tracing, per-request root deadline)
//! - Serve until the shutdown signal, then close the store

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{any, get},
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::ServerConfig;
use crate::deadline::RacingTimeout;
use crate::http::handlers;
use crate::http::middleware::{derive_deadline, request_deadline, timeout_handler};
use crate::lifecycle::Shutdown;
use crate::remote::Store;
use crate::work::WorkLedger;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub ledger: Arc<WorkLedger>,
}

pub struct HttpServer {
    router: Router,
    config: ServerConfig,
    state: AppState,
}

impl HttpServer {
    /// Create a new HTTP server. The store is built by the caller from
    /// `config.database`, so tests can hand in a double.
    pub fn new(config: ServerConfig, store: Arc<dyn Store>) -> Self {
        let state = AppState {
            store,
            ledger: Arc::new(WorkLedger::new()),
        };
        let router = Self::build_router(&config, state.clone());
        Self {
            router,
            config,
            state,
        }
    }

    /// Build the axum router with all middleware layers.
    fn build_router(config: &ServerConfig, state: AppState) -> Router {
        let racing = RacingTimeout::new(
            config.timeouts.handler(),
            config.timeouts.fallback_body.clone(),
            state.ledger.clone(),
        );

        Router::new()
            .route("/hello", any(handlers::hello))
            .route("/slow-hello", any(handlers::slow_hello))
            .route(
                "/timeout-hello-custom",
                any(handlers::slow_hello)
                    .layer(from_fn_with_state(config.timeouts.deadline(), derive_deadline)),
            )
            .route(
                "/timeout-hello-stdlib",
                any(handlers::slow_hello)
                    .layer(from_fn_with_state(racing.clone(), timeout_handler)),
            )
            .route(
                "/timeout-hello-db",
                any(handlers::slow_hello_db).layer(from_fn_with_state(racing, timeout_handler)),
            )
            .route("/healthz", get(handlers::healthz))
            .route("/debug/work", get(handlers::work_stats))
            .with_state(state)
            .layer(from_fn(request_deadline))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The fully layered router, for driving requests without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn ledger(&self) -> Arc<WorkLedger> {
        self.state.ledger.clone()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Serve on `listener` until `shutdown` fires, then close the store.
    ///
    /// Units orphaned by timeouts are not awaited; they are only reported.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                shutdown.wait().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        let work = self.state.ledger.snapshot();
        if work.orphaned > 0 {
            tracing::warn!(orphaned = work.orphaned, "Exiting with background units still running");
        }
        self.state.store.close().await;
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
