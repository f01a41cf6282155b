pub mod customer;
pub mod inventory;
pub mod invoice;
pub mod job;
pub mod roll;

pub use customer::{Customer, Vehicle};
pub use inventory::{
    HistoryEntry, HistoryKind, InventoryItem, LedgerError, MeasureUnit, NewInventoryItem,
};
pub use invoice::{
    business_prefix, format_invoice_number, parse_sequence, CustomerSnapshot, Invoice,
    InvoiceDraft, InvoiceLine, InvoiceTotals, PaymentStatus, VehicleSnapshot,
};
pub use job::{
    Job, JobError, JobStage, Material, NewJob, Payment, ServiceItem, ServiceItemKind,
    StageChange, DEFAULT_BUSINESS,
};
pub use roll::{round2, Roll, RollConsumption, RollSpec, RollStatus, EPSILON};
