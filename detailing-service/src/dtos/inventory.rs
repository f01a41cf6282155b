use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::{InventoryItem, MeasureUnit, NewInventoryItem, Roll, RollConsumption, RollSpec};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateInventoryItemRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,

    #[validate(length(min = 1, message = "Category is required"))]
    pub category: String,

    pub unit: MeasureUnit,

    #[serde(default)]
    pub min_stock: Decimal,

    #[serde(default)]
    pub is_ppf: bool,

    pub price: Option<Decimal>,

    /// Opening stock; only meaningful for counted items.
    #[serde(default)]
    pub quantity: Decimal,
}

impl From<CreateInventoryItemRequest> for NewInventoryItem {
    fn from(req: CreateInventoryItemRequest) -> Self {
        NewInventoryItem {
            name: req.name.trim().to_string(),
            category: req.category.trim().to_string(),
            unit: req.unit,
            min_stock: req.min_stock,
            is_ppf: req.is_ppf,
            price: req.price,
            opening_quantity: req.quantity,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddRollRequest {
    #[validate(length(min = 1, message = "Roll name is required"))]
    pub name: String,
    pub unit: MeasureUnit,
    pub meters: Option<Decimal>,
    pub sqft: Option<Decimal>,
}

impl From<AddRollRequest> for RollSpec {
    fn from(req: AddRollRequest) -> Self {
        RollSpec {
            name: req.name,
            unit: req.unit,
            meters: req.meters,
            sqft: req.sqft,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DeductRequest {
    pub amount: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct ConsumeRequest {
    pub quantity: Decimal,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AdjustRequest {
    pub delta: Decimal,

    #[validate(length(min = 1, message = "Reason is required"))]
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct InventoryListParams {
    #[serde(default)]
    pub low_stock: bool,
}

#[derive(Debug, Serialize)]
pub struct EnsureResponse {
    pub item: InventoryItem,
    pub created: bool,
}

#[derive(Debug, Serialize)]
pub struct RollResponse {
    pub item: InventoryItem,
    pub roll: Roll,
}

#[derive(Debug, Serialize)]
pub struct ConsumeResponse {
    pub item: InventoryItem,
    pub consumed: Vec<RollConsumption>,
}

#[derive(Debug, Serialize)]
pub struct AdjustResponse {
    pub item: InventoryItem,
    pub quantity: Decimal,
}
