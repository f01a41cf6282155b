use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use service_core::retry::{retry_when, RetryConfig};
use std::sync::Arc;

use super::error::ServiceError;
use super::inventory::InventoryService;
use super::invoicing::InvoiceGenerator;
use super::metrics::VERSION_CONFLICTS_TOTAL;
use super::notifier::{dispatch, StageNotification, StageNotifier};
use super::store::{InvoiceFilter, Store};
use crate::models::{
    Invoice, Job, JobError, JobStage, LedgerError, Material, MeasureUnit, NewJob,
};

/// Result of a stage change; `invoices` holds what a move to Completed issued.
#[derive(Debug)]
pub struct StageOutcome {
    pub job: Job,
    pub previous: JobStage,
    pub invoices: Vec<Invoice>,
}

#[derive(Clone)]
pub struct JobService {
    store: Arc<dyn Store>,
    inventory: InventoryService,
    invoicing: InvoiceGenerator,
    notifier: Arc<dyn StageNotifier>,
    retry: RetryConfig,
}

impl JobService {
    pub fn new(
        store: Arc<dyn Store>,
        inventory: InventoryService,
        invoicing: InvoiceGenerator,
        notifier: Arc<dyn StageNotifier>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            store,
            inventory,
            invoicing,
            notifier,
            retry,
        }
    }

    /// Open a job and take the material its part lines use out of stock.
    ///
    /// All requested material is checked against current stock before any
    /// of it is consumed.
    pub async fn create(&self, input: NewJob) -> Result<Job, ServiceError> {
        let customer = self
            .store
            .find_customer(&input.customer_id)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Customer {} not found", input.customer_id))
            })?;
        if customer.vehicle(input.vehicle_index).is_none() {
            return Err(ServiceError::Validation(format!(
                "Customer {} has no vehicle at index {}",
                customer.id, input.vehicle_index
            )));
        }

        let job = Job::new(input, Utc::now())?;
        let requests = job.material_requests();

        for (inventory_id, (material, quantity)) in &requests {
            if *quantity <= Decimal::ZERO {
                return Err(LedgerError::InvalidQuantity(format!(
                    "material for {} must be positive",
                    inventory_id
                ))
                .into());
            }

            let item = self.inventory.get(inventory_id).await?;
            let (compatible, kind) = match material {
                Material::Ppf { .. } => (item.tracks_rolls(), "PPF"),
                Material::Accessory { .. } => (!item.tracks_rolls(), "accessory"),
            };
            if !compatible {
                return Err(ServiceError::Validation(format!(
                    "Inventory item '{}' cannot supply {} material",
                    item.name, kind
                )));
            }

            // Film is requested in square feet whatever unit the item is stocked in.
            let available = match material {
                Material::Ppf { .. } => item.available_in(MeasureUnit::Sqft),
                Material::Accessory { .. } => item.stock_on_hand(),
            };
            if available < *quantity {
                return Err(LedgerError::InsufficientStock {
                    requested: *quantity,
                    available,
                }
                .into());
            }
        }

        let mut taken: Vec<String> = Vec::new();
        for (inventory_id, (material, quantity)) in &requests {
            let consumed = match material {
                Material::Ppf { .. } => self
                    .inventory
                    .consume_in(inventory_id, Some(MeasureUnit::Sqft), *quantity)
                    .await
                    .map(|(_, rolls)| {
                        rolls
                            .iter()
                            .map(|r| {
                                format!(
                                    "{} roll {}: {} {}",
                                    inventory_id, r.roll_id, r.quantity_used, r.unit
                                )
                            })
                            .collect::<Vec<_>>()
                    }),
                Material::Accessory { .. } => self
                    .inventory
                    .adjust(inventory_id, -*quantity, &format!("Used on job {}", job.id))
                    .await
                    .map(|_| vec![format!("{}: {} pieces", inventory_id, quantity)]),
            };
            match consumed {
                Ok(slices) => taken.extend(slices),
                Err(e) => {
                    tracing::error!(
                        job_id = %job.id,
                        inventory_id = %inventory_id,
                        error = %e,
                        consumed = ?taken,
                        "Material consumption failed after validation; earlier stock needs manual reconciliation"
                    );
                    return Err(e);
                }
            }
        }

        if let Err(e) = self.store.insert_job(&job).await {
            tracing::error!(
                job_id = %job.id,
                error = %e,
                consumed = ?taken,
                "Job insert failed after consuming material; stock needs manual reconciliation"
            );
            return Err(e.into());
        }
        tracing::info!(
            job_id = %job.id,
            customer_id = %job.customer_id,
            items = job.service_items.len(),
            consumed = ?taken,
            "Job created"
        );

        Ok(job)
    }

    pub(crate) fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    pub async fn get(&self, id: &str) -> Result<Job, ServiceError> {
        self.store.find_job(id).await?.ok_or_else(|| not_found(id))
    }

    /// Move a job to `target`; reaching Completed issues its invoices.
    pub async fn transition(
        &self,
        id: &str,
        target: JobStage,
    ) -> Result<StageOutcome, ServiceError> {
        let store = &self.store;
        let (job, previous) = retry_when(
            &self.retry,
            "transition_stage",
            ServiceError::is_version_conflict,
            move || async move {
                let mut job = store.find_job(id).await?.ok_or_else(|| not_found(id))?;
                let has_invoices = !store
                    .list_invoices(&InvoiceFilter::for_job(id))
                    .await?
                    .is_empty();

                let expected_version = job.version;
                let previous = job.transition_to(target, has_invoices, Utc::now())?;
                job.version = expected_version + 1;
                save_job(&**store, &job, expected_version).await?;

                Ok::<_, ServiceError>((job, previous))
            },
        )
        .await?;

        tracing::info!(job_id = %job.id, from = %previous, to = %target, "Job stage changed");

        // The stage change is committed either way, so the customer hears
        // about it even when invoicing fails.
        let invoices = if target == JobStage::Completed {
            let generated = self.invoicing.generate_for_job(&job).await;
            self.notify(&job, generated.is_ok()).await;
            generated?
        } else {
            self.notify(&job, false).await;
            Vec::new()
        };

        Ok(StageOutcome {
            job,
            previous,
            invoices,
        })
    }

    /// Apply `op` to the latest copy of the job, writing it back with a
    /// version check and retrying when another writer got there first.
    pub(crate) async fn mutate<T, F>(
        &self,
        id: &str,
        operation: &str,
        op: F,
    ) -> Result<(Job, T), ServiceError>
    where
        F: Fn(&mut Job, DateTime<Utc>) -> Result<T, JobError> + Send + Sync,
        T: Send,
    {
        let store = &self.store;
        let op = &op;

        retry_when(
            &self.retry,
            operation,
            ServiceError::is_version_conflict,
            move || async move {
                let mut job = store.find_job(id).await?.ok_or_else(|| not_found(id))?;
                let expected_version = job.version;

                let output = op(&mut job, Utc::now())?;
                job.version = expected_version + 1;
                save_job(&**store, &job, expected_version).await?;

                Ok::<_, ServiceError>((job, output))
            },
        )
        .await
    }

    /// Issue any invoices a completed job is still missing.
    pub async fn regenerate_invoices(&self, id: &str) -> Result<Vec<Invoice>, ServiceError> {
        let job = self.get(id).await?;
        if job.stage != JobStage::Completed {
            return Err(ServiceError::Validation(format!(
                "Job {} is {} and has no invoices to generate",
                job.id, job.stage
            )));
        }
        self.invoicing.generate_for_job(&job).await
    }

    async fn notify(&self, job: &Job, invoice_ready: bool) {
        let customer = match self.store.find_customer(&job.customer_id).await {
            Ok(Some(customer)) => customer,
            Ok(None) => {
                tracing::warn!(job_id = %job.id, "Customer missing, stage notification skipped");
                return;
            }
            Err(e) => {
                tracing::warn!(job_id = %job.id, error = %e, "Stage notification skipped");
                return;
            }
        };

        let (vehicle_name, plate) = customer
            .vehicle(job.vehicle_index)
            .map(|v| (v.display_name(), v.plate.clone()))
            .unwrap_or_default();

        dispatch(
            self.notifier.clone(),
            StageNotification {
                phone: customer.phone.clone(),
                customer_name: customer.name.clone(),
                stage: job.stage,
                vehicle_name,
                plate,
                invoice_ready,
            },
        );
    }
}

async fn save_job(store: &dyn Store, job: &Job, expected_version: i64) -> Result<(), ServiceError> {
    if store.replace_job(job, expected_version).await? {
        Ok(())
    } else {
        VERSION_CONFLICTS_TOTAL.with_label_values(&["job"]).inc();
        Err(ServiceError::VersionConflict(format!("job {}", job.id)))
    }
}

fn not_found(id: &str) -> ServiceError {
    ServiceError::NotFound(format!("Job {} not found", id))
}
