use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::{CustomerSnapshot, InvoiceLine, VehicleSnapshot, DEFAULT_BUSINESS};
use crate::services::{InvoiceFilter, ManualInvoice};

#[derive(Debug, Deserialize, Validate)]
pub struct ManualInvoiceRequest {
    #[validate(length(min = 1, message = "Customer name is required"))]
    pub customer_name: String,

    #[serde(default)]
    pub customer_phone: String,

    #[validate(email(message = "Invalid email format"))]
    pub customer_email: Option<String>,

    pub customer_address: Option<String>,

    pub vehicle: Option<VehicleSnapshot>,

    pub business: Option<String>,

    #[validate(length(min = 1, message = "At least one line is required"), nested)]
    pub lines: Vec<ManualLineRequest>,

    #[serde(default)]
    pub discount: Decimal,

    #[serde(default)]
    pub apply_gst: bool,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct ManualLineRequest {
    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,

    pub unit_price: Decimal,

    #[serde(default = "default_quantity")]
    pub quantity: Decimal,

    #[serde(default)]
    pub discount: Decimal,
}

fn default_quantity() -> Decimal {
    Decimal::ONE
}

impl From<ManualInvoiceRequest> for ManualInvoice {
    fn from(req: ManualInvoiceRequest) -> Self {
        let business = req
            .business
            .map(|b| b.trim().to_string())
            .filter(|b| !b.is_empty())
            .unwrap_or_else(|| DEFAULT_BUSINESS.to_string());

        ManualInvoice {
            customer: CustomerSnapshot {
                name: req.customer_name,
                phone: req.customer_phone,
                email: req.customer_email,
                address: req.customer_address,
            },
            vehicle: req.vehicle,
            business,
            lines: req
                .lines
                .into_iter()
                .map(|line| {
                    InvoiceLine::new(line.description, line.unit_price, line.quantity, line.discount)
                })
                .collect(),
            discount: req.discount,
            apply_gst: req.apply_gst,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct MarkPaidRequest {
    #[validate(length(min = 1, message = "Payment mode is required"))]
    pub mode: String,

    pub details: Option<String>,

    pub paid_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct InvoiceListParams {
    pub business: Option<String>,
    pub job_id: Option<String>,
}

impl From<InvoiceListParams> for InvoiceFilter {
    fn from(params: InvoiceListParams) -> Self {
        InvoiceFilter {
            business: params.business,
            job_id: params.job_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(lines: serde_json::Value) -> ManualInvoiceRequest {
        serde_json::from_value(json!({ "customer_name": "Walk-in", "lines": lines })).unwrap()
    }

    #[test]
    fn lines_are_required_and_validated() {
        assert!(request(json!([])).validate().is_err());
        assert!(request(json!([{ "description": "", "unit_price": "500" }]))
            .validate()
            .is_err());
        assert!(request(json!([{ "description": "Wash", "unit_price": "500" }]))
            .validate()
            .is_ok());
    }
}
