pub mod customers;
pub mod health;
pub mod inventory;
pub mod invoices;
pub mod jobs;

pub use customers::{create_customer, get_customer};
pub use health::{health_check, metrics_endpoint, readiness_check};
pub use inventory::{
    add_roll, adjust_item, consume_item, create_item, deduct_roll, delete_roll, ensure_item,
    get_item, list_items,
};
pub use invoices::{create_manual_invoice, get_invoice, list_invoices, mark_invoice_paid};
pub use jobs::{create_job, get_job, record_payment, regenerate_invoices, update_stage};
