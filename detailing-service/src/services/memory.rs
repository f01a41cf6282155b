//! In-process store backed by concurrent maps. Used for local runs and tests.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::store::{InvoiceFilter, Store, StoreError};
use crate::models::{Customer, InventoryItem, Invoice, Job};

#[derive(Default)]
pub struct MemoryStore {
    customers: DashMap<String, Customer>,
    items: DashMap<String, InventoryItem>,
    ensure_keys: DashMap<String, String>,
    jobs: DashMap<String, Job>,
    invoices: DashMap<String, Invoice>,
    job_invoices: DashMap<(String, String), String>,
    counters: DashMap<String, u32>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn insert_customer(&self, customer: &Customer) -> Result<(), StoreError> {
        self.customers.insert(customer.id.clone(), customer.clone());
        Ok(())
    }

    async fn find_customer(&self, id: &str) -> Result<Option<Customer>, StoreError> {
        Ok(self.customers.get(id).map(|c| c.value().clone()))
    }

    async fn insert_item(&self, item: &InventoryItem) -> Result<(), StoreError> {
        if let Some(key) = &item.ensure_key {
            match self.ensure_keys.entry(key.clone()) {
                Entry::Occupied(_) => {
                    return Err(StoreError::Duplicate(format!(
                        "inventory ensure key '{}'",
                        key
                    )))
                }
                Entry::Vacant(slot) => {
                    slot.insert(item.id.clone());
                }
            }
        }
        self.items.insert(item.id.clone(), item.clone());
        Ok(())
    }

    async fn find_item(&self, id: &str) -> Result<Option<InventoryItem>, StoreError> {
        Ok(self.items.get(id).map(|item| item.value().clone()))
    }

    async fn find_item_by_ensure_key(
        &self,
        key: &str,
    ) -> Result<Option<InventoryItem>, StoreError> {
        let id = match self.ensure_keys.get(key) {
            Some(id) => id.value().clone(),
            None => return Ok(None),
        };
        self.find_item(&id).await
    }

    async fn list_items(&self) -> Result<Vec<InventoryItem>, StoreError> {
        let mut items: Vec<InventoryItem> =
            self.items.iter().map(|item| item.value().clone()).collect();
        items.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(items)
    }

    async fn replace_item(
        &self,
        item: &InventoryItem,
        expected_version: i64,
    ) -> Result<bool, StoreError> {
        match self.items.get_mut(&item.id) {
            Some(mut current) if current.version == expected_version => {
                *current = item.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn insert_job(&self, job: &Job) -> Result<(), StoreError> {
        self.jobs.insert(job.id.clone(), job.clone());
        Ok(())
    }

    async fn find_job(&self, id: &str) -> Result<Option<Job>, StoreError> {
        Ok(self.jobs.get(id).map(|job| job.value().clone()))
    }

    async fn replace_job(&self, job: &Job, expected_version: i64) -> Result<bool, StoreError> {
        match self.jobs.get_mut(&job.id) {
            Some(mut current) if current.version == expected_version => {
                *current = job.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn insert_invoice(&self, invoice: &Invoice) -> Result<(), StoreError> {
        if let Some(job_id) = &invoice.job_id {
            match self
                .job_invoices
                .entry((job_id.clone(), invoice.business.clone()))
            {
                Entry::Occupied(_) => {
                    return Err(StoreError::Duplicate(format!(
                        "invoice for job {} and business '{}'",
                        job_id, invoice.business
                    )))
                }
                Entry::Vacant(slot) => {
                    slot.insert(invoice.id.clone());
                }
            }
        }
        self.invoices.insert(invoice.id.clone(), invoice.clone());
        Ok(())
    }

    async fn find_invoice(&self, id: &str) -> Result<Option<Invoice>, StoreError> {
        Ok(self.invoices.get(id).map(|invoice| invoice.value().clone()))
    }

    async fn replace_invoice(&self, invoice: &Invoice) -> Result<(), StoreError> {
        self.invoices.insert(invoice.id.clone(), invoice.clone());
        Ok(())
    }

    async fn list_invoices(&self, filter: &InvoiceFilter) -> Result<Vec<Invoice>, StoreError> {
        let mut invoices: Vec<Invoice> = self
            .invoices
            .iter()
            .filter(|invoice| filter.matches(invoice.value()))
            .map(|invoice| invoice.value().clone())
            .collect();
        invoices.sort_by_key(|invoice| (invoice.created_at, invoice.sequence));
        Ok(invoices)
    }

    async fn next_invoice_sequence(&self, business: &str) -> Result<u32, StoreError> {
        let mut seq = self.counters.entry(business.to_string()).or_insert(0);
        *seq += 1;
        Ok(*seq)
    }

    async fn seed_invoice_sequence(&self, business: &str, floor: u32) -> Result<(), StoreError> {
        let mut seq = self.counters.entry(business.to_string()).or_insert(0);
        if *seq < floor {
            *seq = floor;
        }
        Ok(())
    }
}
