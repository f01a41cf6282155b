use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::models::{Customer, Vehicle};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCustomerRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,

    #[validate(length(min = 1, message = "Phone is required"))]
    pub phone: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    pub address: Option<String>,

    #[serde(default)]
    #[validate(nested)]
    pub vehicles: Vec<VehicleRequest>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct VehicleRequest {
    #[validate(length(min = 1, message = "Vehicle make is required"))]
    pub make: String,

    #[serde(default)]
    pub model: String,

    #[validate(length(min = 1, message = "Plate is required"))]
    pub plate: String,

    pub color: Option<String>,

    #[validate(range(min = 1900, max = 2100))]
    pub year: Option<u16>,
}

impl From<CreateCustomerRequest> for Customer {
    fn from(req: CreateCustomerRequest) -> Self {
        Customer {
            id: Uuid::new_v4().to_string(),
            name: req.name.trim().to_string(),
            phone: req.phone.trim().to_string(),
            email: req.email,
            address: req.address,
            vehicles: req
                .vehicles
                .into_iter()
                .map(|v| Vehicle {
                    make: v.make,
                    model: v.model,
                    plate: v.plate.trim().to_uppercase(),
                    color: v.color,
                    year: v.year,
                })
                .collect(),
            created_at: Utc::now(),
        }
    }
}
