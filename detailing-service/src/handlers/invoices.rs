use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use validator::Validate;

use crate::dtos::{InvoiceListParams, ManualInvoiceRequest, MarkPaidRequest};
use crate::models::Invoice;
use crate::services::ServiceError;
use crate::startup::AppState;

pub async fn list_invoices(
    State(state): State<AppState>,
    Query(params): Query<InvoiceListParams>,
) -> Result<Json<Vec<Invoice>>, AppError> {
    let invoices = state
        .store
        .list_invoices(&params.into())
        .await
        .map_err(ServiceError::from)?;
    Ok(Json(invoices))
}

pub async fn get_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<String>,
) -> Result<Json<Invoice>, AppError> {
    let invoice = state
        .store
        .find_invoice(&invoice_id)
        .await
        .map_err(ServiceError::from)?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice {} not found", invoice_id)))?;
    Ok(Json(invoice))
}

pub async fn create_manual_invoice(
    State(state): State<AppState>,
    Json(req): Json<ManualInvoiceRequest>,
) -> Result<(StatusCode, Json<Invoice>), AppError> {
    req.validate()?;
    let invoice = state.invoicing.create_manual(req.into()).await?;
    Ok((StatusCode::CREATED, Json(invoice)))
}

pub async fn mark_invoice_paid(
    State(state): State<AppState>,
    Path(invoice_id): Path<String>,
    Json(req): Json<MarkPaidRequest>,
) -> Result<Json<Invoice>, AppError> {
    req.validate()?;
    let invoice = state
        .payments
        .mark_invoice_paid(&invoice_id, req.mode, req.details, req.paid_date)
        .await?;
    Ok(Json(invoice))
}
