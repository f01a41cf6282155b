//! Material roll model.
//!
//! A roll is a physical length of film cut from bulk stock. Both meters and
//! square feet are tracked in parallel; whichever unit is being consumed is the
//! "working" unit and the other is re-derived from the original ratio.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::inventory::{LedgerError, MeasureUnit};

/// Remainders at or below this are treated as exhausted.
pub const EPSILON: Decimal = dec!(0.01);

/// Round a quantity or amount to two decimal places.
pub fn round2(value: Decimal) -> Decimal {
    value.round_dp(2)
}

/// Roll lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RollStatus {
    Available,
    Finished,
}

/// A roll of material owned by exactly one inventory item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Roll {
    pub id: String,
    pub name: String,
    /// Unit the roll was declared in when stocked.
    pub unit: MeasureUnit,
    #[serde(default)]
    pub original_meters: Option<Decimal>,
    #[serde(default)]
    pub remaining_meters: Option<Decimal>,
    #[serde(default)]
    pub original_sqft: Option<Decimal>,
    #[serde(default)]
    pub remaining_sqft: Option<Decimal>,
    pub status: RollStatus,
    /// Rolls stocked before timestamps were recorded have none and sort first.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

/// Input for stocking a new roll.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollSpec {
    pub name: String,
    pub unit: MeasureUnit,
    #[serde(default)]
    pub meters: Option<Decimal>,
    #[serde(default)]
    pub sqft: Option<Decimal>,
}

/// One slice of a consumption: how much was taken from which roll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollConsumption {
    pub roll_id: String,
    pub roll_name: String,
    pub quantity_used: Decimal,
    pub unit: MeasureUnit,
}

impl Roll {
    pub fn new(spec: RollSpec, now: DateTime<Utc>) -> Result<Self, LedgerError> {
        let declared = match spec.unit {
            MeasureUnit::Meters => spec.meters,
            MeasureUnit::Sqft => spec.sqft,
            MeasureUnit::Pieces => {
                return Err(LedgerError::InvalidQuantity(
                    "rolls must be declared in meters or sqft".to_string(),
                ))
            }
        };

        match declared {
            Some(amount) if amount > Decimal::ZERO => {}
            _ => {
                return Err(LedgerError::InvalidQuantity(format!(
                    "roll must declare a positive {} quantity",
                    spec.unit
                )))
            }
        }

        for amount in [spec.meters, spec.sqft].into_iter().flatten() {
            if amount < Decimal::ZERO {
                return Err(LedgerError::InvalidQuantity(
                    "roll quantities cannot be negative".to_string(),
                ));
            }
        }

        let meters = spec.meters.map(round2);
        let sqft = spec.sqft.map(round2);

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            name: spec.name,
            unit: spec.unit,
            original_meters: meters,
            remaining_meters: meters,
            original_sqft: sqft,
            remaining_sqft: sqft,
            status: RollStatus::Available,
            created_at: Some(now),
            finished_at: None,
        })
    }

    pub fn is_finished(&self) -> bool {
        self.status == RollStatus::Finished
    }

    /// Remaining quantity in the given unit; zero when the unit is not tracked.
    pub fn remaining_in(&self, unit: MeasureUnit) -> Decimal {
        match unit {
            MeasureUnit::Meters => self.remaining_meters.unwrap_or_default(),
            MeasureUnit::Sqft => self.remaining_sqft.unwrap_or_default(),
            MeasureUnit::Pieces => Decimal::ZERO,
        }
    }

    /// Take `amount` in `unit` and re-derive the paired unit from the original
    /// ratio. The caller guarantees `amount` does not exceed the remainder.
    pub(crate) fn take(&mut self, unit: MeasureUnit, amount: Decimal) {
        let left = round2(self.remaining_in(unit) - amount).max(Decimal::ZERO);

        match unit {
            MeasureUnit::Sqft => {
                self.remaining_sqft = Some(left);
                if let Some(ratio) = ratio(self.original_meters, self.original_sqft) {
                    self.remaining_meters = Some(round2(left * ratio));
                }
            }
            MeasureUnit::Meters => {
                self.remaining_meters = Some(left);
                if let Some(ratio) = ratio(self.original_sqft, self.original_meters) {
                    self.remaining_sqft = Some(round2(left * ratio));
                }
            }
            MeasureUnit::Pieces => {}
        }
    }

    /// True once every tracked remainder is within epsilon of zero.
    pub(crate) fn is_exhausted(&self) -> bool {
        [self.remaining_meters, self.remaining_sqft]
            .into_iter()
            .flatten()
            .all(|left| left <= EPSILON)
    }

    pub(crate) fn finish(&mut self, now: DateTime<Utc>) {
        self.status = RollStatus::Finished;
        self.finished_at = Some(now);
    }
}

/// `numerator / denominator` over the original quantities, when both exist.
fn ratio(numerator: Option<Decimal>, denominator: Option<Decimal>) -> Option<Decimal> {
    match (numerator, denominator) {
        (Some(n), Some(d)) if d > Decimal::ZERO => Some(n / d),
        _ => None,
    }
}
