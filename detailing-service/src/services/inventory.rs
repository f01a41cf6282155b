//! Inventory operations over the store.
//!
//! Every mutation is a read-modify-write guarded by the item's version. A
//! lost race re-reads the item and re-applies the operation, so two requests
//! can never both consume the same stock.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use service_core::retry::{retry_when, RetryConfig};
use std::sync::Arc;

use super::error::ServiceError;
use super::metrics::{MATERIAL_CONSUMED_TOTAL, ROLLS_FINISHED_TOTAL, VERSION_CONFLICTS_TOTAL};
use super::store::{Store, StoreError};
use crate::models::{
    InventoryItem, LedgerError, MeasureUnit, NewInventoryItem, Roll, RollConsumption, RollSpec,
};

#[derive(Clone)]
pub struct InventoryService {
    store: Arc<dyn Store>,
    retry: RetryConfig,
}

impl InventoryService {
    pub fn new(store: Arc<dyn Store>, retry: RetryConfig) -> Self {
        Self { store, retry }
    }

    pub async fn create(&self, input: NewInventoryItem) -> Result<InventoryItem, ServiceError> {
        let item = InventoryItem::new(input, Utc::now())?;
        self.insert(item).await
    }

    /// Return the item materialised for `input.category`, creating it when
    /// absent. Items created through `create` never match, so categories
    /// can still hold any number of plainly created items.
    ///
    /// The boolean is true when this call created the item.
    pub async fn ensure(
        &self,
        input: NewInventoryItem,
    ) -> Result<(InventoryItem, bool), ServiceError> {
        let key = input.category.clone();
        if let Some(existing) = self.store.find_item_by_ensure_key(&key).await? {
            return Ok((existing, false));
        }

        let mut item = InventoryItem::new(input, Utc::now())?;
        item.ensure_key = Some(key.clone());
        match self.insert(item).await {
            Ok(item) => Ok((item, true)),
            // Another request created it between our lookup and insert.
            Err(ServiceError::Store(StoreError::Duplicate(_))) => {
                let item = self
                    .store
                    .find_item_by_ensure_key(&key)
                    .await?
                    .ok_or_else(|| {
                        ServiceError::NotFound(format!("Inventory category {} not found", key))
                    })?;
                Ok((item, false))
            }
            Err(e) => Err(e),
        }
    }

    async fn insert(&self, item: InventoryItem) -> Result<InventoryItem, ServiceError> {
        self.store.insert_item(&item).await?;
        tracing::info!(item_id = %item.id, category = %item.category, "Inventory item created");
        Ok(item)
    }

    pub async fn get(&self, id: &str) -> Result<InventoryItem, ServiceError> {
        self.store
            .find_item(id)
            .await?
            .ok_or_else(|| not_found(id))
    }

    pub async fn list(&self, low_stock_only: bool) -> Result<Vec<InventoryItem>, ServiceError> {
        let items = self.store.list_items().await?;
        Ok(items
            .into_iter()
            .filter(|item| !low_stock_only || item.is_low_stock())
            .collect())
    }

    pub async fn add_roll(
        &self,
        id: &str,
        spec: RollSpec,
    ) -> Result<(InventoryItem, Roll), ServiceError> {
        let spec = &spec;
        self.mutate(id, "add_roll", move |item, now| item.add_roll(spec.clone(), now))
            .await
    }

    pub async fn delete_roll(
        &self,
        id: &str,
        roll_id: &str,
    ) -> Result<(InventoryItem, Roll), ServiceError> {
        self.mutate(id, "delete_roll", move |item, now| item.delete_roll(roll_id, now))
            .await
    }

    pub async fn deduct_roll(
        &self,
        id: &str,
        roll_id: &str,
        amount: Decimal,
    ) -> Result<(InventoryItem, RollConsumption), ServiceError> {
        let (item, consumption) = self
            .mutate(id, "deduct_roll", move |item, now| {
                item.deduct_direct(roll_id, amount, now)
            })
            .await?;
        record_consumption(std::slice::from_ref(&consumption));
        Ok((item, consumption))
    }

    pub async fn consume(
        &self,
        id: &str,
        quantity: Decimal,
    ) -> Result<(InventoryItem, Vec<RollConsumption>), ServiceError> {
        self.consume_in(id, None, quantity).await
    }

    /// FIFO consumption measured in `unit`, or in the item's own unit when
    /// none is given.
    pub async fn consume_in(
        &self,
        id: &str,
        unit: Option<MeasureUnit>,
        quantity: Decimal,
    ) -> Result<(InventoryItem, Vec<RollConsumption>), ServiceError> {
        let (item, consumed) = self
            .mutate(id, "consume_fifo", move |item, now| {
                let unit = unit.unwrap_or(item.unit);
                item.consume_fifo_in(unit, quantity, now)
            })
            .await?;
        record_consumption(&consumed);
        tracing::info!(
            item_id = %item.id,
            requested = %quantity,
            rolls_used = consumed.len(),
            remaining = %item.quantity,
            "Consumed material from rolls"
        );
        Ok((item, consumed))
    }

    pub async fn adjust(
        &self,
        id: &str,
        delta: Decimal,
        reason: &str,
    ) -> Result<(InventoryItem, Decimal), ServiceError> {
        self.mutate(id, "adjust_quantity", move |item, now| {
            item.adjust_quantity(delta, reason, now)
        })
        .await
    }

    /// Apply `op` to the latest copy of the item and write it back only if
    /// nobody else wrote in between, retrying on a lost race.
    async fn mutate<T, F>(
        &self,
        id: &str,
        operation: &str,
        op: F,
    ) -> Result<(InventoryItem, T), ServiceError>
    where
        F: Fn(&mut InventoryItem, DateTime<Utc>) -> Result<T, LedgerError> + Send + Sync,
        T: Send,
    {
        let store = &self.store;
        let op = &op;

        retry_when(
            &self.retry,
            operation,
            ServiceError::is_version_conflict,
            move || async move {
                let mut item = store.find_item(id).await?.ok_or_else(|| not_found(id))?;
                let expected_version = item.version;
                let finished_before = item.finished_rolls.len();

                let output = op(&mut item, Utc::now())?;
                item.version = expected_version + 1;

                if !store.replace_item(&item, expected_version).await? {
                    VERSION_CONFLICTS_TOTAL
                        .with_label_values(&["inventory"])
                        .inc();
                    return Err(ServiceError::VersionConflict(format!("inventory item {}", id)));
                }

                let finished = item.finished_rolls.len().saturating_sub(finished_before);
                if finished > 0 {
                    ROLLS_FINISHED_TOTAL
                        .with_label_values(&[item.category.as_str()])
                        .inc_by(finished as u64);
                }

                Ok::<_, ServiceError>((item, output))
            },
        )
        .await
    }
}

fn not_found(id: &str) -> ServiceError {
    ServiceError::NotFound(format!("Inventory item {} not found", id))
}

fn record_consumption(consumed: &[RollConsumption]) {
    for slice in consumed {
        MATERIAL_CONSUMED_TOTAL
            .with_label_values(&[slice.unit.to_string().as_str()])
            .inc_by(slice.quantity_used.to_f64().unwrap_or_default());
    }
}
