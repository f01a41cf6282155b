use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use validator::Validate;

use crate::dtos::{
    CreateJobRequest, PaymentResponse, RecordPaymentRequest, StageRequest, StageResponse,
};
use crate::models::{Invoice, Job};
use crate::startup::AppState;

/// Open a job; part lines take their material out of stock.
pub async fn create_job(
    State(state): State<AppState>,
    Json(req): Json<CreateJobRequest>,
) -> Result<(StatusCode, Json<Job>), AppError> {
    req.validate()?;
    let job = state.jobs.create(req.into()).await?;
    Ok((StatusCode::CREATED, Json(job)))
}

pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<Job>, AppError> {
    Ok(Json(state.jobs.get(&job_id).await?))
}

pub async fn update_stage(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
    Json(req): Json<StageRequest>,
) -> Result<Json<StageResponse>, AppError> {
    let outcome = state.jobs.transition(&job_id, req.stage).await?;
    Ok(Json(StageResponse {
        job: outcome.job,
        previous_stage: outcome.previous,
        invoices: outcome.invoices,
    }))
}

pub async fn record_payment(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
    Json(req): Json<RecordPaymentRequest>,
) -> Result<(StatusCode, Json<PaymentResponse>), AppError> {
    req.validate()?;
    let outcome = state.payments.record_payment(&job_id, req.into()).await?;
    Ok((
        StatusCode::CREATED,
        Json(PaymentResponse {
            job: outcome.job,
            invoice: outcome.invoice,
        }),
    ))
}

/// Fill in any invoices a completed job is missing.
pub async fn regenerate_invoices(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<Vec<Invoice>>, AppError> {
    Ok(Json(state.jobs.regenerate_invoices(&job_id).await?))
}
