//! Payment sync between a job's payment ledger and its invoices.
//!
//! The job and invoice writes are separate documents; a failure between the
//! two leaves the invoice stale until the next payment is recorded. The
//! invoice is always recomputed from the latest ledger and rewritten until
//! the ledger holds still across the write, so concurrent payments cannot
//! leave it with an older total.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use service_core::retry::retry_when;
use std::sync::Arc;

use super::error::ServiceError;
use super::jobs::JobService;
use super::metrics::PAYMENTS_RECORDED_TOTAL;
use super::store::{InvoiceFilter, Store};
use crate::models::{round2, Invoice, Job};

#[derive(Debug, Clone)]
pub struct PaymentRequest {
    pub amount: Decimal,
    pub mode: String,
    /// Business whose invoice this payment settles; required once a job has
    /// more than one invoice.
    pub business: Option<String>,
}

#[derive(Debug)]
pub struct PaymentOutcome {
    pub job: Job,
    pub invoice: Option<Invoice>,
}

#[derive(Clone)]
pub struct PaymentService {
    store: Arc<dyn Store>,
    jobs: JobService,
}

impl PaymentService {
    pub fn new(store: Arc<dyn Store>, jobs: JobService) -> Self {
        Self { store, jobs }
    }

    /// Append a payment to the job and mirror the paid state onto the
    /// invoice it belongs to, if one has been issued.
    pub async fn record_payment(
        &self,
        job_id: &str,
        request: PaymentRequest,
    ) -> Result<PaymentOutcome, ServiceError> {
        if round2(request.amount) <= Decimal::ZERO {
            return Err(ServiceError::Validation(
                "Payment amount must be positive".to_string(),
            ));
        }
        let business = request
            .business
            .as_deref()
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .map(str::to_string);

        // Existence check before touching the ledger.
        self.jobs.get(job_id).await?;
        let invoices = self
            .store
            .list_invoices(&InvoiceFilter::for_job(job_id))
            .await?;
        let single_invoice = invoices.len() == 1;
        let target = resolve_invoice(invoices, business.as_deref(), job_id)?;

        let (job, _) = self
            .jobs
            .mutate(job_id, "record_payment", |job, now| {
                job.record_payment(request.amount, &request.mode, business.clone(), now)
            })
            .await?;
        PAYMENTS_RECORDED_TOTAL
            .with_label_values(&[request.mode.as_str()])
            .inc();

        let invoice = match target {
            Some(target) => {
                let per_business = business.as_deref().filter(|_| !single_invoice);
                let invoice = self
                    .sync_invoice(job_id, &target.id, per_business, &request.mode)
                    .await?;
                tracing::info!(
                    job_id = %job.id,
                    invoice_number = %invoice.invoice_number,
                    paid = %invoice.paid_amount,
                    status = ?invoice.payment_status,
                    "Invoice payment state updated"
                );
                Some(invoice)
            }
            None => {
                tracing::info!(
                    job_id = %job.id,
                    paid = %job.paid_amount,
                    "Payment recorded before invoicing"
                );
                None
            }
        };

        Ok(PaymentOutcome { job, invoice })
    }

    /// Mirror the job's paid total (or one business's share of it) onto the
    /// invoice. Retried while another payment moves the ledger underneath.
    async fn sync_invoice(
        &self,
        job_id: &str,
        invoice_id: &str,
        business: Option<&str>,
        mode: &str,
    ) -> Result<Invoice, ServiceError> {
        let store = &self.store;
        let jobs = &self.jobs;
        let paid_of = move |job: &Job| match business {
            Some(business) => job.paid_for_business(business),
            None => job.paid_amount,
        };
        let paid_of = &paid_of;

        retry_when(
            jobs.retry_config(),
            "sync_invoice_payment",
            ServiceError::is_version_conflict,
            move || async move {
                let paid = paid_of(&jobs.get(job_id).await?);
                let mut invoice = store.find_invoice(invoice_id).await?.ok_or_else(|| {
                    ServiceError::NotFound(format!("Invoice {} not found", invoice_id))
                })?;
                invoice.apply_paid_amount(paid, Some(mode), Utc::now());
                store.replace_invoice(&invoice).await?;

                if paid_of(&jobs.get(job_id).await?) != paid {
                    return Err(ServiceError::VersionConflict(format!(
                        "payments on job {}",
                        job_id
                    )));
                }
                Ok::<_, ServiceError>(invoice)
            },
        )
        .await
    }

    /// Settle an invoice in full and carry the outstanding amount onto its job.
    pub async fn mark_invoice_paid(
        &self,
        invoice_id: &str,
        mode: String,
        details: Option<String>,
        paid_date: Option<DateTime<Utc>>,
    ) -> Result<Invoice, ServiceError> {
        let mut invoice = self
            .store
            .find_invoice(invoice_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Invoice {} not found", invoice_id)))?;

        let now = Utc::now();
        let outstanding = invoice.settle(mode.clone(), details, paid_date.unwrap_or(now), now);
        self.store.replace_invoice(&invoice).await?;
        PAYMENTS_RECORDED_TOTAL
            .with_label_values(&[mode.as_str()])
            .inc();

        if let Some(job_id) = invoice.job_id.as_deref() {
            if outstanding > Decimal::ZERO {
                let business = invoice.business.clone();
                self.jobs
                    .mutate(job_id, "mirror_invoice_payment", |job, now| {
                        job.record_payment(outstanding, &mode, Some(business.clone()), now)
                    })
                    .await?;
            }
        }

        tracing::info!(
            invoice_number = %invoice.invoice_number,
            settled = %outstanding,
            "Invoice marked paid"
        );
        Ok(invoice)
    }
}

/// Pick the invoice a payment applies to.
fn resolve_invoice(
    invoices: Vec<Invoice>,
    business: Option<&str>,
    job_id: &str,
) -> Result<Option<Invoice>, ServiceError> {
    if invoices.is_empty() {
        return Ok(None);
    }

    match business {
        Some(business) => invoices
            .into_iter()
            .find(|invoice| invoice.business == business)
            .map(Some)
            .ok_or_else(|| {
                ServiceError::Validation(format!(
                    "Job {} has no invoice for business '{}'",
                    job_id, business
                ))
            }),
        None if invoices.len() == 1 => Ok(invoices.into_iter().next()),
        None => Err(ServiceError::Validation(format!(
            "Job {} has {} invoices; specify the business this payment is for",
            job_id,
            invoices.len()
        ))),
    }
}
