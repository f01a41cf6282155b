//! Job (service order) model.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::roll::round2;

/// Business entity that bills an item when none is assigned.
pub const DEFAULT_BUSINESS: &str = "Auto Gamma";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStage {
    #[serde(rename = "New Lead")]
    NewLead,
    #[serde(rename = "Inspection Done")]
    InspectionDone,
    #[serde(rename = "Work In Progress")]
    WorkInProgress,
    Completed,
    Cancelled,
}

impl JobStage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStage::Completed | JobStage::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStage::NewLead => "New Lead",
            JobStage::InspectionDone => "Inspection Done",
            JobStage::WorkInProgress => "Work In Progress",
            JobStage::Completed => "Completed",
            JobStage::Cancelled => "Cancelled",
        }
    }
}

impl std::fmt::Display for JobStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stock drawn from inventory by a part line item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Material {
    /// Film cut from rolls, consumed oldest roll first.
    Ppf {
        inventory_id: String,
        size_used_sqft: Decimal,
    },
    /// Counted accessory taken from stock.
    Accessory {
        inventory_id: String,
        quantity: Decimal,
    },
}

impl Material {
    pub fn inventory_id(&self) -> &str {
        match self {
            Material::Ppf { inventory_id, .. } | Material::Accessory { inventory_id, .. } => {
                inventory_id
            }
        }
    }

    pub fn quantity(&self) -> Decimal {
        match self {
            Material::Ppf { size_used_sqft, .. } => *size_used_sqft,
            Material::Accessory { quantity, .. } => *quantity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServiceItemKind {
    Part {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        material: Option<Material>,
    },
    Labor,
}

/// Priced line on a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceItem {
    pub name: String,
    pub price: Decimal,
    #[serde(default)]
    pub discount: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_business: Option<String>,
    #[serde(flatten)]
    pub kind: ServiceItemKind,
}

impl ServiceItem {
    /// Business that bills this line; blank tags fall back to the default.
    pub fn business(&self) -> &str {
        self.assigned_business
            .as_deref()
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .unwrap_or(DEFAULT_BUSINESS)
    }

    pub fn material(&self) -> Option<&Material> {
        match &self.kind {
            ServiceItemKind::Part { material } => material.as_ref(),
            ServiceItemKind::Labor => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub amount: Decimal,
    pub date: DateTime<Utc>,
    pub mode: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageChange {
    pub from: JobStage,
    pub to: JobStage,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Error, PartialEq)]
pub enum JobError {
    #[error("Job is {0} and can no longer change stage")]
    TerminalStage(JobStage),

    #[error("Job already has invoices; only a move to Completed is allowed")]
    Invoiced,

    #[error("Job is already in stage {0}")]
    SameStage(JobStage),

    #[error("Job has no service items to invoice")]
    NoServiceItems,

    #[error("Invalid service item '{0}': price and discount must not be negative")]
    InvalidServiceItem(String),

    #[error("Payment amount must be positive")]
    InvalidPayment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    #[serde(rename = "_id")]
    pub id: String,
    pub customer_id: String,
    /// Position of the vehicle in the customer's vehicle list.
    pub vehicle_index: u32,
    pub stage: JobStage,
    pub service_items: Vec<ServiceItem>,
    #[serde(default)]
    pub payments: Vec<Payment>,
    #[serde(default)]
    pub paid_amount: Decimal,
    #[serde(default)]
    pub requires_gst: bool,
    /// Invoice-level discount per business.
    #[serde(default)]
    pub invoice_discounts: BTreeMap<String, Decimal>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub stage_history: Vec<StageChange>,
    #[serde(default)]
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for opening a job.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub customer_id: String,
    pub vehicle_index: u32,
    pub service_items: Vec<ServiceItem>,
    pub requires_gst: bool,
    pub invoice_discounts: BTreeMap<String, Decimal>,
    pub notes: Option<String>,
}

impl Job {
    pub fn new(input: NewJob, now: DateTime<Utc>) -> Result<Self, JobError> {
        for item in &input.service_items {
            if item.price < Decimal::ZERO || item.discount < Decimal::ZERO {
                return Err(JobError::InvalidServiceItem(item.name.clone()));
            }
        }
        if input.invoice_discounts.values().any(|d| *d < Decimal::ZERO) {
            return Err(JobError::InvalidServiceItem("invoice discount".to_string()));
        }

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            customer_id: input.customer_id,
            vehicle_index: input.vehicle_index,
            stage: JobStage::NewLead,
            service_items: input.service_items,
            payments: Vec::new(),
            paid_amount: Decimal::ZERO,
            requires_gst: input.requires_gst,
            invoice_discounts: input.invoice_discounts,
            notes: input.notes,
            stage_history: Vec::new(),
            version: 0,
            created_at: now,
            updated_at: now,
        })
    }

    /// Move to `target`, returning the previous stage.
    pub fn transition_to(
        &mut self,
        target: JobStage,
        has_invoices: bool,
        now: DateTime<Utc>,
    ) -> Result<JobStage, JobError> {
        if self.stage.is_terminal() {
            return Err(JobError::TerminalStage(self.stage));
        }
        if has_invoices && target != JobStage::Completed {
            return Err(JobError::Invoiced);
        }
        if self.stage == target {
            return Err(JobError::SameStage(target));
        }
        if target == JobStage::Completed && self.service_items.is_empty() {
            return Err(JobError::NoServiceItems);
        }

        let previous = self.stage;
        self.stage = target;
        self.stage_history.push(StageChange {
            from: previous,
            to: target,
            at: now,
        });
        self.updated_at = now;
        Ok(previous)
    }

    pub fn record_payment(
        &mut self,
        amount: Decimal,
        mode: &str,
        business: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), JobError> {
        let amount = round2(amount);
        if amount <= Decimal::ZERO {
            return Err(JobError::InvalidPayment);
        }

        self.payments.push(Payment {
            amount,
            date: now,
            mode: mode.to_string(),
            business,
        });
        self.paid_amount = round2(self.paid_amount + amount);
        self.updated_at = now;
        Ok(())
    }

    /// Total of payments tagged to one business.
    pub fn paid_for_business(&self, business: &str) -> Decimal {
        round2(
            self.payments
                .iter()
                .filter(|p| p.business.as_deref() == Some(business))
                .map(|p| p.amount)
                .sum(),
        )
    }

    pub fn invoice_discount(&self, business: &str) -> Decimal {
        self.invoice_discounts
            .get(business)
            .copied()
            .unwrap_or_default()
    }

    /// Material requested per inventory item, summed across all lines.
    pub fn material_requests(&self) -> BTreeMap<String, (Material, Decimal)> {
        let mut requests: BTreeMap<String, (Material, Decimal)> = BTreeMap::new();
        for material in self.service_items.iter().filter_map(ServiceItem::material) {
            requests
                .entry(material.inventory_id().to_string())
                .and_modify(|(_, total)| *total = round2(*total + material.quantity()))
                .or_insert_with(|| (material.clone(), round2(material.quantity())));
        }
        requests
    }
}
