use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    bson::doc,
    error::{ErrorKind, WriteFailure},
    options::{FindOneAndUpdateOptions, IndexOptions, ReturnDocument, UpdateOptions},
    Client as MongoClient, Collection, Database, IndexModel,
};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;

use super::store::{InvoiceFilter, Store, StoreError};
use crate::models::{Customer, InventoryItem, Invoice, Job};

const DUPLICATE_KEY: i32 = 11000;

/// Last issued invoice sequence of one business.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct InvoiceCounter {
    #[serde(rename = "_id")]
    business: String,
    seq: u32,
}

#[derive(Clone)]
pub struct MongoDb {
    client: MongoClient,
    db: Database,
}

impl MongoDb {
    pub async fn connect(uri: &str, database: &str) -> Result<Self, AppError> {
        tracing::info!("Connecting to MongoDB");
        let client = MongoClient::with_uri_str(uri).await.map_err(|e| {
            tracing::error!("Failed to connect to MongoDB: {}", e);
            AppError::from(e)
        })?;
        let db = client.database(database);
        tracing::info!(database = %database, "Successfully connected to MongoDB database");
        Ok(Self { client, db })
    }

    pub async fn initialize_indexes(&self) -> Result<(), AppError> {
        tracing::info!("Creating MongoDB indexes for detailing-service");

        // Categories repeat freely; only items materialised by ensure are unique.
        let ensure_key_index = IndexModel::builder()
            .keys(doc! { "ensure_key": 1 })
            .options(
                IndexOptions::builder()
                    .name("inventory_ensure_key_unique".to_string())
                    .unique(true)
                    .partial_filter_expression(doc! { "ensure_key": { "$type": "string" } })
                    .build(),
            )
            .build();

        self.inventory()
            .create_index(ensure_key_index, None)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create ensure key index on inventory: {}", e);
                AppError::from(e)
            })?;
        tracing::info!("Created index on inventory.ensure_key");

        // At most one generated invoice per (job, business); manual invoices carry no job.
        let job_business_index = IndexModel::builder()
            .keys(doc! { "job_id": 1, "business": 1 })
            .options(
                IndexOptions::builder()
                    .name("invoice_job_business_unique".to_string())
                    .unique(true)
                    .partial_filter_expression(doc! { "job_id": { "$type": "string" } })
                    .build(),
            )
            .build();

        self.invoices()
            .create_index(job_business_index, None)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create job/business index on invoices: {}", e);
                AppError::from(e)
            })?;
        tracing::info!("Created index on invoices.(job_id, business)");

        let business_index = IndexModel::builder()
            .keys(doc! { "business": 1 })
            .options(
                IndexOptions::builder()
                    .name("invoice_business_lookup".to_string())
                    .build(),
            )
            .build();

        self.invoices()
            .create_index(business_index, None)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create business index on invoices: {}", e);
                AppError::from(e)
            })?;
        tracing::info!("Created index on invoices.business");

        Ok(())
    }

    pub fn customers(&self) -> Collection<Customer> {
        self.db.collection("customers")
    }

    pub fn inventory(&self) -> Collection<InventoryItem> {
        self.db.collection("inventory")
    }

    pub fn jobs(&self) -> Collection<Job> {
        self.db.collection("jobs")
    }

    pub fn invoices(&self) -> Collection<Invoice> {
        self.db.collection("invoices")
    }

    fn counters(&self) -> Collection<InvoiceCounter> {
        self.db.collection("invoice_counters")
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write_error)) if write_error.code == DUPLICATE_KEY
    )
}

fn insert_error(err: mongodb::error::Error, what: String) -> StoreError {
    if is_duplicate_key(&err) {
        StoreError::Duplicate(what)
    } else {
        StoreError::Database(err)
    }
}

#[async_trait]
impl Store for MongoDb {
    async fn ping(&self) -> Result<(), StoreError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await?;
        Ok(())
    }

    async fn insert_customer(&self, customer: &Customer) -> Result<(), StoreError> {
        self.customers().insert_one(customer, None).await?;
        Ok(())
    }

    async fn find_customer(&self, id: &str) -> Result<Option<Customer>, StoreError> {
        Ok(self.customers().find_one(doc! { "_id": id }, None).await?)
    }

    async fn insert_item(&self, item: &InventoryItem) -> Result<(), StoreError> {
        self.inventory()
            .insert_one(item, None)
            .await
            .map_err(|e| {
                let key = item.ensure_key.as_deref().unwrap_or(&item.id);
                insert_error(e, format!("inventory ensure key '{}'", key))
            })?;
        Ok(())
    }

    async fn find_item(&self, id: &str) -> Result<Option<InventoryItem>, StoreError> {
        Ok(self.inventory().find_one(doc! { "_id": id }, None).await?)
    }

    async fn find_item_by_ensure_key(
        &self,
        key: &str,
    ) -> Result<Option<InventoryItem>, StoreError> {
        Ok(self
            .inventory()
            .find_one(doc! { "ensure_key": key }, None)
            .await?)
    }

    async fn list_items(&self) -> Result<Vec<InventoryItem>, StoreError> {
        let cursor = self.inventory().find(doc! {}, None).await?;
        let mut items: Vec<InventoryItem> = cursor.try_collect().await?;
        items.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(items)
    }

    async fn replace_item(
        &self,
        item: &InventoryItem,
        expected_version: i64,
    ) -> Result<bool, StoreError> {
        let result = self
            .inventory()
            .replace_one(
                doc! { "_id": &item.id, "version": expected_version },
                item,
                None,
            )
            .await?;
        Ok(result.matched_count == 1)
    }

    async fn insert_job(&self, job: &Job) -> Result<(), StoreError> {
        self.jobs().insert_one(job, None).await?;
        Ok(())
    }

    async fn find_job(&self, id: &str) -> Result<Option<Job>, StoreError> {
        Ok(self.jobs().find_one(doc! { "_id": id }, None).await?)
    }

    async fn replace_job(&self, job: &Job, expected_version: i64) -> Result<bool, StoreError> {
        let result = self
            .jobs()
            .replace_one(
                doc! { "_id": &job.id, "version": expected_version },
                job,
                None,
            )
            .await?;
        Ok(result.matched_count == 1)
    }

    async fn insert_invoice(&self, invoice: &Invoice) -> Result<(), StoreError> {
        self.invoices()
            .insert_one(invoice, None)
            .await
            .map_err(|e| {
                insert_error(
                    e,
                    format!(
                        "invoice for job {:?} and business '{}'",
                        invoice.job_id, invoice.business
                    ),
                )
            })?;
        Ok(())
    }

    async fn find_invoice(&self, id: &str) -> Result<Option<Invoice>, StoreError> {
        Ok(self.invoices().find_one(doc! { "_id": id }, None).await?)
    }

    async fn replace_invoice(&self, invoice: &Invoice) -> Result<(), StoreError> {
        self.invoices()
            .replace_one(doc! { "_id": &invoice.id }, invoice, None)
            .await?;
        Ok(())
    }

    async fn list_invoices(&self, filter: &InvoiceFilter) -> Result<Vec<Invoice>, StoreError> {
        let mut query = doc! {};
        if let Some(business) = &filter.business {
            query.insert("business", business);
        }
        if let Some(job_id) = &filter.job_id {
            query.insert("job_id", job_id);
        }

        let cursor = self.invoices().find(query, None).await?;
        let mut invoices: Vec<Invoice> = cursor.try_collect().await?;
        // Timestamps are stored as strings; order on the parsed values.
        invoices.sort_by_key(|invoice| invoice.created_at);
        Ok(invoices)
    }

    async fn next_invoice_sequence(&self, business: &str) -> Result<u32, StoreError> {
        let options = FindOneAndUpdateOptions::builder()
            .upsert(true)
            .return_document(ReturnDocument::After)
            .build();

        let counter = self
            .counters()
            .find_one_and_update(doc! { "_id": business }, doc! { "$inc": { "seq": 1 } }, options)
            .await?;

        // Upsert with ReturnDocument::After always yields the document.
        Ok(counter.map(|c| c.seq).unwrap_or(1))
    }

    async fn seed_invoice_sequence(&self, business: &str, floor: u32) -> Result<(), StoreError> {
        let options = UpdateOptions::builder().upsert(true).build();
        self.counters()
            .update_one(
                doc! { "_id": business },
                doc! { "$max": { "seq": floor as i64 } },
                options,
            )
            .await?;
        Ok(())
    }
}
