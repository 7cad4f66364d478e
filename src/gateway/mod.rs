//! HTTP Gateway
//!
//! Thin JSON surface under `/profile/v1`. Handlers decode the body, call the
//! services, and map backend errors through [`RpcCode`](crate::rpc::RpcCode).

pub mod handlers;
pub mod state;
pub mod types;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tokio::sync::watch;

pub use state::AppState;
pub use types::{ApiError, ApiResponse};

pub const API_PREFIX: &str = "/profile/v1";

/// Build the gateway router
pub fn router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/pix", post(handlers::create_pix))
        .route("/key", post(handlers::create_key))
        .route(
            "/key/{id}",
            get(handlers::get_key)
                .put(handlers::update_key)
                .delete(handlers::delete_key),
        )
        .route("/account", post(handlers::open_account))
        .route(
            "/account/{id}",
            get(handlers::get_account).patch(handlers::update_account),
        )
        .route("/account/{id}/keys", get(handlers::list_account_keys))
        .route("/transaction/{id}", get(handlers::get_transaction))
        .route("/transactions", post(handlers::list_transactions))
        .route("/health", get(handlers::health_check));

    Router::new().nest(API_PREFIX, api).with_state(state)
}

/// Serve until `shutdown` flips to true
pub async fn run_server(
    addr: SocketAddr,
    state: Arc<AppState>,
    mut shutdown: watch::Receiver<bool>,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, prefix = API_PREFIX, "Gateway listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            while !*shutdown.borrow() {
                if shutdown.changed().await.is_err() {
                    break;
                }
            }
        })
        .await?;

    tracing::info!("Gateway stopped");
    Ok(())
}
