use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use validator::Validate;

use crate::models::{Invoice, Job, JobStage, NewJob, ServiceItem};
use crate::services::PaymentRequest;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateJobRequest {
    #[validate(length(min = 1, message = "Customer id is required"))]
    pub customer_id: String,

    #[serde(default)]
    pub vehicle_index: u32,

    #[serde(default)]
    pub service_items: Vec<ServiceItem>,

    #[serde(default)]
    pub requires_gst: bool,

    /// Invoice-level discount keyed by business.
    #[serde(default)]
    pub invoice_discounts: BTreeMap<String, Decimal>,

    pub notes: Option<String>,
}

impl From<CreateJobRequest> for NewJob {
    fn from(req: CreateJobRequest) -> Self {
        NewJob {
            customer_id: req.customer_id,
            vehicle_index: req.vehicle_index,
            service_items: req.service_items,
            requires_gst: req.requires_gst,
            invoice_discounts: req.invoice_discounts,
            notes: req.notes,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StageRequest {
    pub stage: JobStage,
}

#[derive(Debug, Serialize)]
pub struct StageResponse {
    pub job: Job,
    pub previous_stage: JobStage,
    pub invoices: Vec<Invoice>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RecordPaymentRequest {
    pub amount: Decimal,

    #[validate(length(min = 1, message = "Payment mode is required"))]
    pub mode: String,

    /// Business whose invoice the payment settles.
    pub business: Option<String>,
}

impl From<RecordPaymentRequest> for PaymentRequest {
    fn from(req: RecordPaymentRequest) -> Self {
        PaymentRequest {
            amount: req.amount,
            mode: req.mode,
            business: req.business,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    pub job: Job,
    pub invoice: Option<Invoice>,
}
