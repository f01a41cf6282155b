//! Persistence seam shared by the MongoDB and in-memory backends.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Customer, InventoryItem, Invoice, Job};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("Duplicate key: {0}")]
    Duplicate(String),
}

/// Optional filters for invoice listing.
#[derive(Debug, Clone, Default)]
pub struct InvoiceFilter {
    pub business: Option<String>,
    pub job_id: Option<String>,
}

impl InvoiceFilter {
    pub fn for_job(job_id: &str) -> Self {
        Self {
            business: None,
            job_id: Some(job_id.to_string()),
        }
    }

    pub fn matches(&self, invoice: &Invoice) -> bool {
        let business_matches = match self.business.as_deref() {
            Some(business) => invoice.business == business,
            None => true,
        };
        let job_matches = match self.job_id.as_deref() {
            Some(job_id) => invoice.job_id.as_deref() == Some(job_id),
            None => true,
        };
        business_matches && job_matches
    }
}

/// Document store used by the services.
///
/// `replace_*` methods that take an `expected_version` only write when the
/// stored document still carries that version and report whether they did.
#[async_trait]
pub trait Store: Send + Sync {
    async fn ping(&self) -> Result<(), StoreError>;

    async fn insert_customer(&self, customer: &Customer) -> Result<(), StoreError>;
    async fn find_customer(&self, id: &str) -> Result<Option<Customer>, StoreError>;

    /// Fails with `Duplicate` when another item already holds the same
    /// `ensure_key`. Categories themselves are not unique.
    async fn insert_item(&self, item: &InventoryItem) -> Result<(), StoreError>;
    async fn find_item(&self, id: &str) -> Result<Option<InventoryItem>, StoreError>;
    async fn find_item_by_ensure_key(
        &self,
        key: &str,
    ) -> Result<Option<InventoryItem>, StoreError>;
    async fn list_items(&self) -> Result<Vec<InventoryItem>, StoreError>;
    async fn replace_item(
        &self,
        item: &InventoryItem,
        expected_version: i64,
    ) -> Result<bool, StoreError>;

    async fn insert_job(&self, job: &Job) -> Result<(), StoreError>;
    async fn find_job(&self, id: &str) -> Result<Option<Job>, StoreError>;
    async fn replace_job(&self, job: &Job, expected_version: i64) -> Result<bool, StoreError>;

    /// Fails with `Duplicate` when the job already has an invoice for that business.
    async fn insert_invoice(&self, invoice: &Invoice) -> Result<(), StoreError>;
    async fn find_invoice(&self, id: &str) -> Result<Option<Invoice>, StoreError>;
    async fn replace_invoice(&self, invoice: &Invoice) -> Result<(), StoreError>;
    /// Oldest first.
    async fn list_invoices(&self, filter: &InvoiceFilter) -> Result<Vec<Invoice>, StoreError>;

    /// Atomically increment and return the business's invoice sequence.
    async fn next_invoice_sequence(&self, business: &str) -> Result<u32, StoreError>;
    /// Raise the business's sequence to at least `floor`.
    async fn seed_invoice_sequence(&self, business: &str, floor: u32) -> Result<(), StoreError>;
}
