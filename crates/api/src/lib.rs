//! HTTP API layer with Axum routes.
//!
//! This crate provides:
//! - REST routes for accounts and transactions
//! - JSON error responses
//! - The shared application state

pub mod error;
pub mod routes;

use axum::Router;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tally_db::{AccountRepository, TransactionRepository};
use tally_shared::LedgerConfig;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use error::ApiError;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub db: Arc<DatabaseConnection>,
    /// Posting engine settings.
    pub ledger: Arc<LedgerConfig>,
}

impl AppState {
    /// Creates the state from a pool and the ledger settings.
    #[must_use]
    pub fn new(db: DatabaseConnection, ledger: LedgerConfig) -> Self {
        Self {
            db: Arc::new(db),
            ledger: Arc::new(ledger),
        }
    }

    /// Account repository over the shared pool.
    #[must_use]
    pub fn accounts(&self) -> AccountRepository {
        AccountRepository::new((*self.db).clone())
    }

    /// Posting engine configured with the funds policy and deadline.
    #[must_use]
    pub fn transactions(&self) -> TransactionRepository {
        TransactionRepository::new((*self.db).clone(), self.ledger.funds_policy)
            .with_deadline(self.ledger.posting_timeout())
    }
}

/// Creates the main application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", routes::api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
