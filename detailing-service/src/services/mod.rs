pub mod database;
pub mod error;
pub mod inventory;
pub mod invoicing;
pub mod jobs;
pub mod memory;
pub mod metrics;
pub mod notifier;
pub mod payments;
pub mod store;

pub use database::MongoDb;
pub use error::ServiceError;
pub use inventory::InventoryService;
pub use invoicing::{InvoiceGenerator, ManualInvoice};
pub use jobs::{JobService, StageOutcome};
pub use memory::MemoryStore;
pub use metrics::{get_metrics, init_metrics};
pub use notifier::{LoggingNotifier, RecordingNotifier, StageNotification, StageNotifier};
pub use payments::{PaymentOutcome, PaymentRequest, PaymentService};
pub use store::{InvoiceFilter, Store, StoreError};
