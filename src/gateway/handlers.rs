//! Gateway handlers

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::state::AppState;
use super::types::{ApiError, ApiResponse};
use crate::event::{EventEnvelope, TransferEvent, publish_event};
use crate::ledger::{
    Account, AccountId, CreateKeyRequest, Key, KeyId, NewAccount, UpdateKeyRequest,
};
use crate::money::Amount;
use crate::pix::{KeyResolver, PixError};
use crate::rpc::RpcCode;
use crate::transaction::{Transaction, TransactionId};

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

fn ok<T>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse::success(data)))
}

fn parse_transaction_id(raw: &str) -> Result<TransactionId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::invalid(format!("invalid transaction id: {}", raw)))
}

// ============================================================================
// Pix
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct PixRequest {
    pub account_id: AccountId,
    pub key: String,
    pub amount: Decimal,
    #[serde(default)]
    pub webhook_url: Option<String>,
    /// Client idempotency token; generated when absent
    #[serde(default)]
    pub event_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PixAccepted {
    pub event_id: String,
}

/// Publish a transfer intent. The saga runs asynchronously on the consumer side.
pub async fn create_pix(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PixRequest>,
) -> Result<(StatusCode, Json<ApiResponse<PixAccepted>>), ApiError> {
    Amount::try_from(req.amount).map_err(PixError::InvalidAmount)?;
    KeyResolver::classify(&req.key)?;

    let event_id = req
        .event_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let envelope = EventEnvelope::TransferRequested(TransferEvent {
        event_id: Some(event_id.clone()),
        account_id: req.account_id,
        key: req.key,
        amount: req.amount,
        webhook_url: req.webhook_url,
    });
    publish_event(state.publisher.as_ref(), &envelope, state.publish_retry).await?;

    tracing::info!(%event_id, account_id = %req.account_id, "Transfer event published");
    Ok((StatusCode::ACCEPTED, Json(ApiResponse::success(PixAccepted { event_id }))))
}

// ============================================================================
// Keys
// ============================================================================

pub async fn create_key(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateKeyRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Key>>), ApiError> {
    let key = state.keys.create(req).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(key))))
}

pub async fn get_key(State(state): State<Arc<AppState>>, Path(id): Path<KeyId>) -> ApiResult<Key> {
    ok(state.keys.find(id).await?)
}

pub async fn update_key(
    State(state): State<Arc<AppState>>,
    Path(id): Path<KeyId>,
    Json(req): Json<UpdateKeyRequest>,
) -> ApiResult<Key> {
    ok(state.keys.update(id, req).await?)
}

pub async fn delete_key(
    State(state): State<Arc<AppState>>,
    Path(id): Path<KeyId>,
) -> Result<StatusCode, ApiError> {
    state.keys.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Accounts
// ============================================================================

fn default_agency() -> String {
    "0001".to_string()
}

fn default_bank() -> String {
    "001".to_string()
}

#[derive(Debug, Deserialize)]
pub struct OpenAccountRequest {
    pub holder_name: String,
    pub holder_tax_id: String,
    #[serde(default = "default_agency")]
    pub agency: String,
    #[serde(default = "default_bank")]
    pub bank: String,
    /// Opening balance, zero when absent
    #[serde(default)]
    pub balance: Decimal,
}

pub async fn open_account(
    State(state): State<Arc<AppState>>,
    Json(req): Json<OpenAccountRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Account>>), ApiError> {
    if req.holder_name.trim().is_empty() || req.holder_tax_id.trim().is_empty() {
        return Err(ApiError::invalid("holder_name and holder_tax_id are required"));
    }
    // Same sign, scale and range rules as a transfer amount, except zero is allowed
    if !req.balance.is_zero() {
        Amount::try_from(req.balance).map_err(PixError::InvalidAmount)?;
    }

    let account = state
        .ledger
        .open_account(NewAccount {
            user_id: Uuid::new_v4(),
            holder_name: req.holder_name,
            holder_tax_id: req.holder_tax_id,
            balance: req.balance,
            agency: req.agency,
            bank: req.bank,
        })
        .await?;
    tracing::info!(account_id = %account.id, "Account opened");
    Ok((StatusCode::CREATED, Json(ApiResponse::success(account))))
}

pub async fn get_account(
    State(state): State<Arc<AppState>>,
    Path(id): Path<AccountId>,
) -> ApiResult<Account> {
    ok(state.ledger.find_account(id).await?)
}

#[derive(Debug, Deserialize)]
pub struct UpdateAccountRequest {
    pub blocked: bool,
}

pub async fn update_account(
    State(state): State<Arc<AppState>>,
    Path(id): Path<AccountId>,
    Json(req): Json<UpdateAccountRequest>,
) -> ApiResult<Account> {
    let account = state.ledger.set_blocked(id, req.blocked).await?;
    tracing::info!(account_id = %id, blocked = req.blocked, "Account updated");
    ok(account)
}

pub async fn list_account_keys(
    State(state): State<Arc<AppState>>,
    Path(id): Path<AccountId>,
) -> ApiResult<Vec<Key>> {
    state.ledger.find_account(id).await?;
    ok(state.keys.list_by_account(id).await?)
}

// ============================================================================
// Transactions
// ============================================================================

pub async fn get_transaction(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Transaction> {
    let id = parse_transaction_id(&id)?;
    ok(state.transactions.find(id).await?)
}

#[derive(Debug, Deserialize)]
pub struct ListTransactionsRequest {
    #[serde(default)]
    pub ids: Vec<String>,
}

pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ListTransactionsRequest>,
) -> ApiResult<Vec<Transaction>> {
    let ids = req
        .ids
        .iter()
        .map(|id| parse_transaction_id(id))
        .collect::<Result<Vec<_>, _>>()?;
    ok(state.transactions.list(&ids).await?)
}

// ============================================================================
// Health
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub timestamp_ms: i64,
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> ApiResult<HealthResponse> {
    if let Some(db) = &state.db
        && let Err(e) = db.health_check().await
    {
        tracing::error!(error = %e, "[HEALTH] PostgreSQL ping failed");
        return Err(ApiError::new(RpcCode::Unavailable, RpcCode::Unavailable.generic_message()));
    }
    ok(HealthResponse {
        timestamp_ms: chrono::Utc::now().timestamp_millis(),
    })
}
