//! Invoice model, totals and invoice numbering.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::roll::round2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    Pending,
    #[serde(rename = "Partially Paid")]
    PartiallyPaid,
    Paid,
}

impl PaymentStatus {
    pub fn from_amounts(paid: Decimal, total: Decimal) -> Self {
        if paid > Decimal::ZERO && paid >= total {
            PaymentStatus::Paid
        } else if paid > Decimal::ZERO {
            PaymentStatus::PartiallyPaid
        } else {
            PaymentStatus::Pending
        }
    }
}

/// Customer details copied onto the invoice when it is issued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerSnapshot {
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleSnapshot {
    pub name: String,
    pub plate: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceLine {
    pub description: String,
    pub unit_price: Decimal,
    pub quantity: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
}

impl InvoiceLine {
    pub fn new(description: String, unit_price: Decimal, quantity: Decimal, discount: Decimal) -> Self {
        let gross = round2(unit_price * quantity);
        Self {
            description,
            unit_price: round2(unit_price),
            quantity: round2(quantity),
            discount: round2(discount),
            total: round2(gross - discount).max(Decimal::ZERO),
        }
    }

    fn gross(&self) -> Decimal {
        round2(self.unit_price * self.quantity)
    }
}

/// Money figures of one invoice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InvoiceTotals {
    pub subtotal: Decimal,
    pub item_discount: Decimal,
    pub discount: Decimal,
    pub taxable_amount: Decimal,
    pub tax_rate: Decimal,
    pub tax_amount: Decimal,
    pub total_amount: Decimal,
}

impl InvoiceTotals {
    /// `tax_rate` is a percentage; `None` means the invoice carries no tax.
    pub fn compute(lines: &[InvoiceLine], invoice_discount: Decimal, tax_rate: Option<Decimal>) -> Self {
        let subtotal = round2(lines.iter().map(InvoiceLine::gross).sum());
        let item_discount = round2(lines.iter().map(|line| line.discount).sum());
        let discount = round2(invoice_discount.max(Decimal::ZERO));
        let taxable_amount = round2(subtotal - item_discount - discount).max(Decimal::ZERO);

        let tax_rate = tax_rate.unwrap_or_default();
        let tax_amount = round2(taxable_amount * tax_rate / dec!(100));

        Self {
            subtotal,
            item_discount,
            discount,
            taxable_amount,
            tax_rate,
            tax_amount,
            total_amount: round2(taxable_amount + tax_amount),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    #[serde(rename = "_id")]
    pub id: String,
    /// Absent for manually authored invoices.
    #[serde(default)]
    pub job_id: Option<String>,
    pub customer: CustomerSnapshot,
    #[serde(default)]
    pub vehicle: Option<VehicleSnapshot>,
    pub business: String,
    pub invoice_number: String,
    pub sequence: u32,
    pub lines: Vec<InvoiceLine>,
    pub subtotal: Decimal,
    pub item_discount: Decimal,
    pub discount: Decimal,
    pub tax_rate: Decimal,
    pub tax_amount: Decimal,
    pub total_amount: Decimal,
    pub paid_amount: Decimal,
    pub payment_status: PaymentStatus,
    #[serde(default)]
    pub payment_mode: Option<String>,
    #[serde(default)]
    pub payment_details: Option<String>,
    #[serde(default)]
    pub paid_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Everything needed to issue an invoice except its number.
#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceDraft {
    pub job_id: Option<String>,
    pub customer: CustomerSnapshot,
    pub vehicle: Option<VehicleSnapshot>,
    pub business: String,
    pub lines: Vec<InvoiceLine>,
    pub totals: InvoiceTotals,
}

impl Invoice {
    pub fn issue(
        draft: InvoiceDraft,
        invoice_number: String,
        sequence: u32,
        now: DateTime<Utc>,
    ) -> Self {
        let totals = draft.totals;
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            job_id: draft.job_id,
            customer: draft.customer,
            vehicle: draft.vehicle,
            business: draft.business,
            invoice_number,
            sequence,
            lines: draft.lines,
            subtotal: totals.subtotal,
            item_discount: totals.item_discount,
            discount: totals.discount,
            tax_rate: totals.tax_rate,
            tax_amount: totals.tax_amount,
            total_amount: totals.total_amount,
            paid_amount: Decimal::ZERO,
            payment_status: PaymentStatus::Pending,
            payment_mode: None,
            payment_details: None,
            paid_date: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Mirror a cumulative paid amount onto the invoice.
    pub fn apply_paid_amount(&mut self, paid: Decimal, mode: Option<&str>, now: DateTime<Utc>) {
        self.paid_amount = round2(paid);
        self.payment_status = PaymentStatus::from_amounts(self.paid_amount, self.total_amount);
        if let Some(mode) = mode {
            self.payment_mode = Some(mode.to_string());
        }
        if self.payment_status == PaymentStatus::Paid {
            self.paid_date.get_or_insert(now);
        }
        self.updated_at = now;
    }

    /// Settle in full, returning what was still outstanding.
    pub fn settle(
        &mut self,
        mode: String,
        details: Option<String>,
        paid_date: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Decimal {
        let outstanding = round2(self.total_amount - self.paid_amount).max(Decimal::ZERO);
        self.paid_amount = self.total_amount;
        self.payment_status = PaymentStatus::Paid;
        self.payment_mode = Some(mode);
        self.payment_details = details;
        self.paid_date = Some(paid_date);
        self.updated_at = now;
        outstanding
    }
}

/// `{prefix}-{year}-{sequence:04}`.
pub fn format_invoice_number(prefix: &str, year: i32, sequence: u32) -> String {
    format!("{}-{}-{:04}", prefix, year, sequence)
}

/// Trailing numeric suffix of an invoice number.
pub fn parse_sequence(invoice_number: &str) -> Option<u32> {
    invoice_number.rsplit('-').next()?.trim().parse().ok()
}

/// Short code used in a business's invoice numbers.
///
/// Configured codes win; otherwise the upper-cased initials of the tag.
pub fn business_prefix(business: &str, configured: &BTreeMap<String, String>) -> String {
    if let Some(code) = configured.get(business) {
        return code.clone();
    }

    let initials: String = business
        .split_whitespace()
        .filter_map(|word| word.chars().find(|c| c.is_ascii_alphanumeric()))
        .map(|c| c.to_ascii_uppercase())
        .collect();

    if initials.is_empty() {
        "INV".to_string()
    } else {
        initials
    }
}
