use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use validator::Validate;

use crate::dtos::CreateCustomerRequest;
use crate::models::Customer;
use crate::services::ServiceError;
use crate::startup::AppState;

pub async fn create_customer(
    State(state): State<AppState>,
    Json(req): Json<CreateCustomerRequest>,
) -> Result<(StatusCode, Json<Customer>), AppError> {
    req.validate()?;

    let customer = Customer::from(req);
    state
        .store
        .insert_customer(&customer)
        .await
        .map_err(ServiceError::from)?;

    tracing::info!(
        customer_id = %customer.id,
        vehicles = customer.vehicles.len(),
        "Customer created"
    );

    Ok((StatusCode::CREATED, Json(customer)))
}

pub async fn get_customer(
    State(state): State<AppState>,
    Path(customer_id): Path<String>,
) -> Result<Json<Customer>, AppError> {
    let customer = state
        .store
        .find_customer(&customer_id)
        .await
        .map_err(ServiceError::from)?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Customer {} not found", customer_id)))?;

    Ok(Json(customer))
}
