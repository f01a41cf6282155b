//! Inventory and roll ledger endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use validator::Validate;

use crate::dtos::{
    AddRollRequest, AdjustRequest, AdjustResponse, ConsumeRequest, ConsumeResponse,
    CreateInventoryItemRequest, DeductRequest, EnsureResponse, InventoryListParams, RollResponse,
};
use crate::models::InventoryItem;
use crate::startup::AppState;

pub async fn create_item(
    State(state): State<AppState>,
    Json(req): Json<CreateInventoryItemRequest>,
) -> Result<(StatusCode, Json<InventoryItem>), AppError> {
    req.validate()?;
    let item = state.inventory.create(req.into()).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// Create-or-get keyed by category.
pub async fn ensure_item(
    State(state): State<AppState>,
    Json(req): Json<CreateInventoryItemRequest>,
) -> Result<(StatusCode, Json<EnsureResponse>), AppError> {
    req.validate()?;
    let (item, created) = state.inventory.ensure(req.into()).await?;
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(EnsureResponse { item, created })))
}

pub async fn list_items(
    State(state): State<AppState>,
    Query(params): Query<InventoryListParams>,
) -> Result<Json<Vec<InventoryItem>>, AppError> {
    let items = state.inventory.list(params.low_stock).await?;
    Ok(Json(items))
}

pub async fn get_item(
    State(state): State<AppState>,
    Path(item_id): Path<String>,
) -> Result<Json<InventoryItem>, AppError> {
    Ok(Json(state.inventory.get(&item_id).await?))
}

pub async fn add_roll(
    State(state): State<AppState>,
    Path(item_id): Path<String>,
    Json(req): Json<AddRollRequest>,
) -> Result<(StatusCode, Json<RollResponse>), AppError> {
    req.validate()?;
    let (item, roll) = state.inventory.add_roll(&item_id, req.into()).await?;
    tracing::info!(item_id = %item.id, roll_id = %roll.id, quantity = %item.quantity, "Roll added");
    Ok((StatusCode::CREATED, Json(RollResponse { item, roll })))
}

pub async fn delete_roll(
    State(state): State<AppState>,
    Path((item_id, roll_id)): Path<(String, String)>,
) -> Result<Json<RollResponse>, AppError> {
    let (item, roll) = state.inventory.delete_roll(&item_id, &roll_id).await?;
    tracing::info!(item_id = %item.id, roll_id = %roll.id, "Roll deleted");
    Ok(Json(RollResponse { item, roll }))
}

pub async fn deduct_roll(
    State(state): State<AppState>,
    Path((item_id, roll_id)): Path<(String, String)>,
    Json(req): Json<DeductRequest>,
) -> Result<Json<ConsumeResponse>, AppError> {
    let (item, consumption) = state
        .inventory
        .deduct_roll(&item_id, &roll_id, req.amount)
        .await?;
    Ok(Json(ConsumeResponse {
        item,
        consumed: vec![consumption],
    }))
}

pub async fn consume_item(
    State(state): State<AppState>,
    Path(item_id): Path<String>,
    Json(req): Json<ConsumeRequest>,
) -> Result<Json<ConsumeResponse>, AppError> {
    let (item, consumed) = state.inventory.consume(&item_id, req.quantity).await?;
    Ok(Json(ConsumeResponse { item, consumed }))
}

pub async fn adjust_item(
    State(state): State<AppState>,
    Path(item_id): Path<String>,
    Json(req): Json<AdjustRequest>,
) -> Result<Json<AdjustResponse>, AppError> {
    req.validate()?;
    let (item, quantity) = state
        .inventory
        .adjust(&item_id, req.delta, &req.reason)
        .await?;
    Ok(Json(AdjustResponse { item, quantity }))
}
