//! Inventory item model and the roll ledger operations.
//!
//! Every mutation works on a staged copy of the item and only replaces `self`
//! once the whole operation has succeeded, so a rejected request never leaves
//! a partially consumed item behind.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::roll::{round2, Roll, RollConsumption, RollSpec, EPSILON};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeasureUnit {
    Sqft,
    Meters,
    Pieces,
}

impl std::fmt::Display for MeasureUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MeasureUnit::Sqft => write!(f, "sqft"),
            MeasureUnit::Meters => write!(f, "meters"),
            MeasureUnit::Pieces => write!(f, "pieces"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HistoryKind {
    #[serde(rename = "Stock In")]
    StockIn,
    #[serde(rename = "Stock Out")]
    StockOut,
}

/// Append-only stock movement record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub date: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: HistoryKind,
    pub description: String,
    /// Signed change of the aggregate quantity.
    pub amount: Decimal,
    /// Aggregate quantity after the movement.
    pub remaining_stock: Decimal,
}

#[derive(Debug, Error, PartialEq)]
pub enum LedgerError {
    #[error("Insufficient stock: requested {requested}, available {available}")]
    InsufficientStock {
        requested: Decimal,
        available: Decimal,
    },

    #[error("Roll not found: {0}")]
    RollNotFound(String),

    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}

/// A stocked product: PPF film tracked by rolls, or a discrete accessory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryItem {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub category: String,
    pub quantity: Decimal,
    pub unit: MeasureUnit,
    #[serde(default)]
    pub min_stock: Decimal,
    #[serde(default)]
    pub is_ppf: bool,
    #[serde(default)]
    pub rolls: Vec<Roll>,
    #[serde(default)]
    pub finished_rolls: Vec<Roll>,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    /// Category this item was materialised for by an ensure call. Unique
    /// across items that carry one; plainly created items leave it empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ensure_key: Option<String>,
    /// Bumped on every write; used for compare-and-swap replacement.
    #[serde(default)]
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating an inventory item.
#[derive(Debug, Clone)]
pub struct NewInventoryItem {
    pub name: String,
    pub category: String,
    pub unit: MeasureUnit,
    pub min_stock: Decimal,
    pub is_ppf: bool,
    pub price: Option<Decimal>,
    /// Opening stock for discrete items; roll-tracked items start empty.
    pub opening_quantity: Decimal,
}

impl InventoryItem {
    pub fn new(input: NewInventoryItem, now: DateTime<Utc>) -> Result<Self, LedgerError> {
        if input.opening_quantity < Decimal::ZERO || input.min_stock < Decimal::ZERO {
            return Err(LedgerError::InvalidQuantity(
                "opening quantity and minimum stock cannot be negative".to_string(),
            ));
        }

        let mut item = Self {
            id: Uuid::new_v4().to_string(),
            name: input.name,
            category: input.category,
            quantity: Decimal::ZERO,
            unit: input.unit,
            min_stock: round2(input.min_stock),
            is_ppf: input.is_ppf,
            rolls: Vec::new(),
            finished_rolls: Vec::new(),
            price: input.price.map(round2),
            history: Vec::new(),
            ensure_key: None,
            version: 0,
            created_at: now,
            updated_at: now,
        };

        if input.opening_quantity > Decimal::ZERO {
            if item.tracks_rolls() {
                return Err(LedgerError::Unsupported(
                    "roll-tracked items are stocked by adding rolls".to_string(),
                ));
            }
            item.quantity = round2(input.opening_quantity);
            item.push_history(HistoryKind::StockIn, "Opening stock", item.quantity, now);
        }

        Ok(item)
    }

    /// Length-measured stock is held in rolls; pieces are counted directly.
    pub fn tracks_rolls(&self) -> bool {
        self.unit != MeasureUnit::Pieces
    }

    pub fn is_low_stock(&self) -> bool {
        self.quantity < self.min_stock
    }

    /// Sum of what the active rolls can still give in the item's unit.
    pub fn available(&self) -> Decimal {
        self.available_in(self.unit)
    }

    /// Sum of what the active rolls can still give in `unit`. Rolls that never
    /// recorded that unit contribute nothing.
    pub fn available_in(&self, unit: MeasureUnit) -> Decimal {
        round2(
            self.rolls
                .iter()
                .filter(|roll| !roll.is_finished())
                .map(|roll| roll.remaining_in(unit).max(Decimal::ZERO))
                .sum(),
        )
    }

    /// Stock that can satisfy a request, whether roll-tracked or counted.
    pub fn stock_on_hand(&self) -> Decimal {
        if self.tracks_rolls() {
            self.available()
        } else {
            self.quantity
        }
    }

    fn recompute_quantity(&mut self) {
        self.quantity = self.available();
    }

    fn push_history(
        &mut self,
        kind: HistoryKind,
        description: impl Into<String>,
        amount: Decimal,
        now: DateTime<Utc>,
    ) {
        self.history.push(HistoryEntry {
            date: now,
            kind,
            description: description.into(),
            amount: round2(amount),
            remaining_stock: self.quantity,
        });
    }

    /// Move finished rolls out of the active list, logging each one.
    fn retire_finished(&mut self, now: DateTime<Utc>) {
        let (finished, active): (Vec<Roll>, Vec<Roll>) =
            std::mem::take(&mut self.rolls).into_iter().partition(Roll::is_finished);
        self.rolls = active;

        for roll in finished {
            let description = format!("Roll '{}' finished", roll.name);
            self.push_history(HistoryKind::StockOut, description, Decimal::ZERO, now);
            self.finished_rolls.push(roll);
        }
    }

    fn ensure_roll_tracked(&self) -> Result<(), LedgerError> {
        if self.tracks_rolls() {
            Ok(())
        } else {
            Err(LedgerError::Unsupported(format!(
                "'{}' is counted in pieces and has no rolls",
                self.name
            )))
        }
    }

    /// Satisfy `needed` from the active rolls, oldest first.
    ///
    /// Either the whole request is met or the item is left untouched.
    pub fn consume_fifo(
        &mut self,
        needed: Decimal,
        now: DateTime<Utc>,
    ) -> Result<Vec<RollConsumption>, LedgerError> {
        self.consume_fifo_in(self.unit, needed, now)
    }

    /// FIFO consumption measured in `unit`, which may differ from the item's
    /// unit. Each roll re-derives its paired remainder, so the aggregate stays
    /// in the item's unit.
    pub fn consume_fifo_in(
        &mut self,
        unit: MeasureUnit,
        needed: Decimal,
        now: DateTime<Utc>,
    ) -> Result<Vec<RollConsumption>, LedgerError> {
        if needed <= Decimal::ZERO {
            return Err(LedgerError::InvalidQuantity(
                "consumption must be positive".to_string(),
            ));
        }
        self.ensure_roll_tracked()?;
        if unit == MeasureUnit::Pieces {
            return Err(LedgerError::Unsupported(
                "rolls are consumed in meters or sqft".to_string(),
            ));
        }

        let mut staged = self.clone();

        let mut order: Vec<usize> = (0..staged.rolls.len()).collect();
        order.sort_by_key(|&idx| staged.rolls[idx].created_at);

        let mut still_needed = round2(needed);
        let mut consumed = Vec::new();

        for idx in order {
            if still_needed <= EPSILON {
                break;
            }

            let roll = &mut staged.rolls[idx];
            if roll.is_finished() {
                continue;
            }
            let remaining = roll.remaining_in(unit);
            if remaining <= Decimal::ZERO {
                continue;
            }

            let used = round2(remaining.min(still_needed));
            roll.take(unit, used);
            still_needed = round2(still_needed - used);

            consumed.push(RollConsumption {
                roll_id: roll.id.clone(),
                roll_name: roll.name.clone(),
                quantity_used: used,
                unit,
            });

            if roll.remaining_in(unit) <= EPSILON {
                roll.finish(now);
            }
        }

        if still_needed > EPSILON {
            return Err(LedgerError::InsufficientStock {
                requested: round2(needed),
                available: self.available_in(unit),
            });
        }

        let before = staged.quantity;
        staged.recompute_quantity();
        let description = format!(
            "Consumed {} {} across {} roll(s)",
            round2(needed),
            unit,
            consumed.len()
        );
        let delta = staged.quantity - before;
        staged.push_history(HistoryKind::StockOut, description, delta, now);
        staged.retire_finished(now);
        staged.updated_at = now;

        *self = staged;
        Ok(consumed)
    }

    /// Stock a new roll; its quantity in the item's unit is added to the aggregate.
    pub fn add_roll(&mut self, spec: RollSpec, now: DateTime<Utc>) -> Result<Roll, LedgerError> {
        self.ensure_roll_tracked()?;

        let roll = Roll::new(spec, now)?;
        let added = roll.remaining_in(self.unit);
        if added <= Decimal::ZERO {
            return Err(LedgerError::InvalidQuantity(format!(
                "roll must carry a {} quantity to stock '{}'",
                self.unit, self.name
            )));
        }

        self.rolls.push(roll.clone());
        self.recompute_quantity();
        let description = format!("Added roll '{}' ({} {})", roll.name, added, self.unit);
        self.push_history(HistoryKind::StockIn, description, added, now);
        self.updated_at = now;

        Ok(roll)
    }

    /// Deduct from one named roll without fanning out to others.
    ///
    /// Square feet are preferred while the roll still has any; otherwise meters.
    pub fn deduct_direct(
        &mut self,
        roll_id: &str,
        amount: Decimal,
        now: DateTime<Utc>,
    ) -> Result<RollConsumption, LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidQuantity(
                "deduction must be positive".to_string(),
            ));
        }
        self.ensure_roll_tracked()?;

        let mut staged = self.clone();
        let roll = staged
            .rolls
            .iter_mut()
            .find(|roll| roll.id == roll_id)
            .ok_or_else(|| LedgerError::RollNotFound(roll_id.to_string()))?;

        let unit = if roll.remaining_sqft.unwrap_or_default() > Decimal::ZERO {
            MeasureUnit::Sqft
        } else {
            MeasureUnit::Meters
        };
        let remaining = roll.remaining_in(unit);
        let amount = round2(amount);
        if amount > remaining + EPSILON {
            return Err(LedgerError::InsufficientStock {
                requested: amount,
                available: remaining,
            });
        }

        let used = amount.min(remaining);
        roll.take(unit, used);
        if roll.is_exhausted() {
            roll.finish(now);
        }
        let consumption = RollConsumption {
            roll_id: roll.id.clone(),
            roll_name: roll.name.clone(),
            quantity_used: used,
            unit,
        };

        let before = staged.quantity;
        staged.recompute_quantity();
        let description = format!(
            "Deducted {} {} from roll '{}'",
            used, unit, consumption.roll_name
        );
        let delta = staged.quantity - before;
        staged.push_history(HistoryKind::StockOut, description, delta, now);
        staged.retire_finished(now);
        staged.updated_at = now;

        *self = staged;
        Ok(consumption)
    }

    /// Remove an active roll without consuming it.
    pub fn delete_roll(&mut self, roll_id: &str, now: DateTime<Utc>) -> Result<Roll, LedgerError> {
        let position = self
            .rolls
            .iter()
            .position(|roll| roll.id == roll_id)
            .ok_or_else(|| LedgerError::RollNotFound(roll_id.to_string()))?;

        let roll = self.rolls.remove(position);
        let before = self.quantity;
        self.recompute_quantity();
        let delta = self.quantity - before;
        self.push_history(
            HistoryKind::StockOut,
            format!("Removed roll '{}'", roll.name),
            delta,
            now,
        );
        self.updated_at = now;

        Ok(roll)
    }

    /// Signed change of the aggregate for counted (non-roll) items.
    pub fn adjust_quantity(
        &mut self,
        delta: Decimal,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<Decimal, LedgerError> {
        if self.tracks_rolls() {
            return Err(LedgerError::Unsupported(format!(
                "'{}' is roll-tracked; its quantity follows its rolls",
                self.name
            )));
        }
        let delta = round2(delta);
        if delta == Decimal::ZERO {
            return Err(LedgerError::InvalidQuantity(
                "adjustment cannot be zero".to_string(),
            ));
        }

        let updated = round2(self.quantity + delta);
        if updated < Decimal::ZERO {
            return Err(LedgerError::InsufficientStock {
                requested: -delta,
                available: self.quantity,
            });
        }

        self.quantity = updated;
        let kind = if delta > Decimal::ZERO {
            HistoryKind::StockIn
        } else {
            HistoryKind::StockOut
        };
        self.push_history(kind, reason, delta, now);
        self.updated_at = now;

        Ok(updated)
    }
}
