//! Invoice generation: one invoice per business for a completed job, plus
//! manually authored invoices.

use chrono::{Datelike, Utc};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use super::error::ServiceError;
use super::metrics::INVOICES_GENERATED_TOTAL;
use super::store::{InvoiceFilter, Store, StoreError};
use crate::config::InvoicingConfig;
use crate::models::{
    business_prefix, format_invoice_number, parse_sequence, CustomerSnapshot, Invoice,
    InvoiceDraft, InvoiceLine, InvoiceTotals, Job, JobError, ServiceItem, VehicleSnapshot,
};

/// Service items grouped by the business that bills them, in first-seen order.
pub fn partition_by_business(items: &[ServiceItem]) -> Vec<(String, Vec<&ServiceItem>)> {
    let mut partitions: Vec<(String, Vec<&ServiceItem>)> = Vec::new();
    for item in items {
        let business = item.business();
        match partitions.iter_mut().find(|(tag, _)| tag == business) {
            Some((_, group)) => group.push(item),
            None => partitions.push((business.to_string(), vec![item])),
        }
    }
    partitions
}

/// Build the unnumbered invoice for one business's share of a job.
pub fn draft_for_partition(
    job: &Job,
    business: &str,
    items: &[&ServiceItem],
    customer: CustomerSnapshot,
    vehicle: Option<VehicleSnapshot>,
    gst_rate: Decimal,
) -> InvoiceDraft {
    let lines: Vec<InvoiceLine> = items
        .iter()
        .map(|item| InvoiceLine::new(item.name.clone(), item.price, Decimal::ONE, item.discount))
        .collect();
    let tax_rate = job.requires_gst.then_some(gst_rate);
    let totals = InvoiceTotals::compute(&lines, job.invoice_discount(business), tax_rate);

    InvoiceDraft {
        job_id: Some(job.id.clone()),
        customer,
        vehicle,
        business: business.to_string(),
        lines,
        totals,
    }
}

/// Ad-hoc invoice not tied to a job.
#[derive(Debug, Clone)]
pub struct ManualInvoice {
    pub customer: CustomerSnapshot,
    pub vehicle: Option<VehicleSnapshot>,
    pub business: String,
    pub lines: Vec<InvoiceLine>,
    pub discount: Decimal,
    pub apply_gst: bool,
}

#[derive(Clone)]
pub struct InvoiceGenerator {
    store: Arc<dyn Store>,
    config: InvoicingConfig,
}

impl InvoiceGenerator {
    pub fn new(store: Arc<dyn Store>, config: InvoicingConfig) -> Self {
        Self { store, config }
    }

    /// Issue the missing invoices of a completed job, one per business.
    ///
    /// Businesses that already have an invoice for the job are skipped, so
    /// calling this again after a partial failure only fills the gaps.
    pub async fn generate_for_job(&self, job: &Job) -> Result<Vec<Invoice>, ServiceError> {
        if job.service_items.is_empty() {
            return Err(JobError::NoServiceItems.into());
        }

        let customer = self
            .store
            .find_customer(&job.customer_id)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Customer {} not found", job.customer_id))
            })?;
        let vehicle = customer.vehicle(job.vehicle_index).map(|v| v.snapshot());

        let invoiced: HashSet<String> = self
            .store
            .list_invoices(&InvoiceFilter::for_job(&job.id))
            .await?
            .into_iter()
            .map(|invoice| invoice.business)
            .collect();

        let mut created: Vec<Invoice> = Vec::new();
        for (business, items) in partition_by_business(&job.service_items) {
            if invoiced.contains(&business) {
                tracing::debug!(job_id = %job.id, business = %business, "Invoice already exists");
                continue;
            }

            let draft = draft_for_partition(
                job,
                &business,
                &items,
                customer.snapshot(),
                vehicle.clone(),
                self.config.gst_rate,
            );

            match self.issue(draft, "job").await {
                Ok(invoice) => created.push(invoice),
                Err(ServiceError::Store(StoreError::Duplicate(_))) => {
                    tracing::warn!(
                        job_id = %job.id,
                        business = %business,
                        "Invoice created concurrently, skipping"
                    );
                }
                Err(e) => {
                    tracing::error!(
                        job_id = %job.id,
                        business = %business,
                        error = %e,
                        created = created.len(),
                        "Invoice generation failed partway"
                    );
                    return Err(ServiceError::InvoiceGeneration {
                        created: created.into_iter().map(|i| i.invoice_number).collect(),
                        business,
                        reason: e.to_string(),
                    });
                }
            }
        }

        if created.is_empty() && invoiced.is_empty() {
            return Err(ServiceError::Validation(format!(
                "Job {} produced no invoices",
                job.id
            )));
        }

        Ok(created)
    }

    pub async fn create_manual(&self, input: ManualInvoice) -> Result<Invoice, ServiceError> {
        if input.lines.is_empty() {
            return Err(ServiceError::Validation(
                "Invoice needs at least one line".to_string(),
            ));
        }
        if let Some(line) = input.lines.iter().find(|line| {
            line.unit_price < Decimal::ZERO
                || line.quantity <= Decimal::ZERO
                || line.discount < Decimal::ZERO
        }) {
            return Err(ServiceError::Validation(format!(
                "Line '{}' needs a positive quantity and non-negative price and discount",
                line.description
            )));
        }
        if input.discount < Decimal::ZERO {
            return Err(ServiceError::Validation(
                "Invoice discount cannot be negative".to_string(),
            ));
        }

        let tax_rate = input.apply_gst.then_some(self.config.gst_rate);
        let totals = InvoiceTotals::compute(&input.lines, input.discount, tax_rate);
        let draft = InvoiceDraft {
            job_id: None,
            customer: input.customer,
            vehicle: input.vehicle,
            business: input.business,
            lines: input.lines,
            totals,
        };

        self.issue(draft, "manual").await
    }

    async fn issue(&self, draft: InvoiceDraft, source: &str) -> Result<Invoice, ServiceError> {
        let now = Utc::now();
        let sequence = self.store.next_invoice_sequence(&draft.business).await?;
        let prefix = business_prefix(&draft.business, &self.config.prefixes);
        let number = format_invoice_number(&prefix, now.year(), sequence);

        let invoice = Invoice::issue(draft, number, sequence, now);
        self.store.insert_invoice(&invoice).await?;

        INVOICES_GENERATED_TOTAL
            .with_label_values(&[invoice.business.as_str(), source])
            .inc();
        tracing::info!(
            invoice_id = %invoice.id,
            invoice_number = %invoice.invoice_number,
            business = %invoice.business,
            total = %invoice.total_amount,
            "Invoice issued"
        );

        Ok(invoice)
    }

    /// Raise each business's counter to its highest existing invoice number.
    pub async fn seed_counters(&self) -> Result<(), ServiceError> {
        let invoices = self.store.list_invoices(&InvoiceFilter::default()).await?;

        let mut highest: BTreeMap<String, u32> = BTreeMap::new();
        for invoice in &invoices {
            let seq = parse_sequence(&invoice.invoice_number).unwrap_or(invoice.sequence);
            let entry = highest.entry(invoice.business.clone()).or_insert(0);
            *entry = (*entry).max(seq);
        }

        for (business, seq) in &highest {
            self.store.seed_invoice_sequence(business, *seq).await?;
        }

        tracing::info!(businesses = highest.len(), "Invoice counters seeded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        Customer, Material, NewJob, ServiceItemKind, Vehicle, DEFAULT_BUSINESS,
    };
    use crate::services::memory::MemoryStore;
    use rust_decimal_macros::dec;

    fn item(name: &str, price: Decimal, discount: Decimal, business: Option<&str>) -> ServiceItem {
        ServiceItem {
            name: name.to_string(),
            price,
            discount,
            assigned_business: business.map(str::to_string),
            kind: ServiceItemKind::Labor,
        }
    }

    fn customer() -> Customer {
        Customer {
            id: "cust-1".to_string(),
            name: "Ravi Kumar".to_string(),
            phone: "9876500000".to_string(),
            email: Some("ravi@example.com".to_string()),
            address: None,
            vehicles: vec![Vehicle {
                make: "Hyundai".to_string(),
                model: "Creta".to_string(),
                plate: "MH12AB1234".to_string(),
                color: None,
                year: None,
            }],
            created_at: Utc::now(),
        }
    }

    fn job(items: Vec<ServiceItem>, requires_gst: bool) -> Job {
        Job::new(
            NewJob {
                customer_id: "cust-1".to_string(),
                vehicle_index: 0,
                service_items: items,
                requires_gst,
                invoice_discounts: BTreeMap::new(),
                notes: None,
            },
            Utc::now(),
        )
        .unwrap()
    }

    async fn generator() -> (InvoiceGenerator, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        store.insert_customer(&customer()).await.unwrap();
        (
            InvoiceGenerator::new(store.clone(), InvoicingConfig::default()),
            store,
        )
    }

    #[test]
    fn partitions_keep_first_seen_order() {
        let items = vec![
            item("Wash", dec!(500), Decimal::ZERO, Some("Gamma Coats")),
            item("PPF", dec!(9000), Decimal::ZERO, None),
            item("Coating", dec!(4000), Decimal::ZERO, Some("Gamma Coats")),
        ];

        let partitions = partition_by_business(&items);

        assert_eq!(partitions.len(), 2);
        assert_eq!(partitions[0].0, "Gamma Coats");
        assert_eq!(partitions[0].1.len(), 2);
        assert_eq!(partitions[1].0, DEFAULT_BUSINESS);
    }

    #[test]
    fn draft_applies_business_discount_and_gst() {
        let mut job = job(
            vec![
                item("PPF", dec!(10000), dec!(1000), None),
                item("Wash", dec!(600), Decimal::ZERO, Some("Gamma Coats")),
            ],
            true,
        );
        job.invoice_discounts.insert(DEFAULT_BUSINESS.to_string(), dec!(1000));
        let partitions = partition_by_business(&job.service_items);

        let draft = draft_for_partition(
            &job,
            &partitions[0].0,
            &partitions[0].1,
            customer().snapshot(),
            None,
            dec!(18),
        );

        assert_eq!(draft.lines.len(), 1);
        assert_eq!(draft.totals.subtotal, dec!(10000));
        assert_eq!(draft.totals.taxable_amount, dec!(8000));
        assert_eq!(draft.totals.tax_amount, dec!(1440));
        assert_eq!(draft.totals.total_amount, dec!(9440));
    }

    #[tokio::test]
    async fn three_plus_two_items_yield_two_invoices() {
        let (generator, _) = generator().await;
        let job = job(
            vec![
                item("Front PPF", dec!(12000), Decimal::ZERO, Some("A")),
                item("Rear PPF", dec!(8000), Decimal::ZERO, Some("A")),
                item("Fitting", dec!(2000), Decimal::ZERO, Some("A")),
                item("Ceramic", dec!(15000), dec!(500), Some("B")),
                item("Interior", dec!(3000), Decimal::ZERO, Some("B")),
            ],
            false,
        );

        let invoices = generator.generate_for_job(&job).await.unwrap();

        assert_eq!(invoices.len(), 2);
        let a = invoices.iter().find(|i| i.business == "A").unwrap();
        let b = invoices.iter().find(|i| i.business == "B").unwrap();
        assert_eq!(a.lines.len(), 3);
        assert_eq!(a.total_amount, dec!(22000));
        assert_eq!(b.lines.len(), 2);
        assert_eq!(b.total_amount, dec!(17500));
        assert_eq!(a.customer.name, "Ravi Kumar");
        assert_eq!(a.vehicle.as_ref().unwrap().name, "Hyundai Creta");
    }

    #[tokio::test]
    async fn numbering_is_sequential_per_business() {
        let (generator, _) = generator().await;
        let year = Utc::now().year();

        for expected in 1..=3u32 {
            let job = job(vec![item("Wash", dec!(500), Decimal::ZERO, None)], false);
            let invoices = generator.generate_for_job(&job).await.unwrap();
            assert_eq!(
                invoices[0].invoice_number,
                format!("AG-{}-{:04}", year, expected)
            );
        }

        let other = job(vec![item("Wash", dec!(500), Decimal::ZERO, Some("Gamma Coats"))], false);
        let invoices = generator.generate_for_job(&other).await.unwrap();
        assert_eq!(invoices[0].invoice_number, format!("GC-{}-0001", year));
    }

    #[tokio::test]
    async fn regeneration_skips_existing_businesses() {
        let (generator, _) = generator().await;
        let job = job(
            vec![
                item("Wash", dec!(500), Decimal::ZERO, None),
                item("Coating", dec!(4000), Decimal::ZERO, Some("Gamma Coats")),
            ],
            false,
        );

        assert_eq!(generator.generate_for_job(&job).await.unwrap().len(), 2);
        assert!(generator.generate_for_job(&job).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn job_without_items_is_an_error() {
        let (generator, _) = generator().await;
        let err = generator.generate_for_job(&job(Vec::new(), false)).await.unwrap_err();
        assert!(matches!(err, ServiceError::Job(JobError::NoServiceItems)));
    }

    #[tokio::test]
    async fn counters_resume_after_existing_numbers() {
        let (generator, store) = generator().await;
        let year = Utc::now().year();

        let mut legacy = generator
            .create_manual(ManualInvoice {
                customer: customer().snapshot(),
                vehicle: None,
                business: DEFAULT_BUSINESS.to_string(),
                lines: vec![InvoiceLine::new("Wash".into(), dec!(500), Decimal::ONE, Decimal::ZERO)],
                discount: Decimal::ZERO,
                apply_gst: false,
            })
            .await
            .unwrap();
        legacy.invoice_number = format!("AG-{}-0041", year);
        store.replace_invoice(&legacy).await.unwrap();

        generator.seed_counters().await.unwrap();

        let job = job(vec![item("Wash", dec!(500), Decimal::ZERO, None)], false);
        let invoices = generator.generate_for_job(&job).await.unwrap();
        assert_eq!(invoices[0].invoice_number, format!("AG-{}-0042", year));
    }

    #[tokio::test]
    async fn material_lines_are_billed_like_any_other() {
        let (generator, _) = generator().await;
        let film = ServiceItem {
            name: "Hood PPF".to_string(),
            price: dec!(8000),
            discount: Decimal::ZERO,
            assigned_business: None,
            kind: ServiceItemKind::Part {
                material: Some(Material::Ppf {
                    inventory_id: "film".to_string(),
                    size_used_sqft: dec!(20),
                }),
            },
        };

        let invoices = generator.generate_for_job(&job(vec![film], true)).await.unwrap();

        assert_eq!(invoices[0].tax_amount, dec!(1440));
        assert_eq!(invoices[0].total_amount, dec!(9440));
    }
}
