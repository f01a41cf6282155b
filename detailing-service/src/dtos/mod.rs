pub mod customers;
pub mod inventory;
pub mod invoices;
pub mod jobs;

pub use customers::{CreateCustomerRequest, VehicleRequest};
pub use inventory::{
    AddRollRequest, AdjustRequest, AdjustResponse, ConsumeRequest, ConsumeResponse,
    CreateInventoryItemRequest, DeductRequest, EnsureResponse, InventoryListParams, RollResponse,
};
pub use invoices::{
    InvoiceListParams, ManualInvoiceRequest, ManualLineRequest, MarkPaidRequest,
};
pub use jobs::{
    CreateJobRequest, PaymentResponse, RecordPaymentRequest, StageRequest, StageResponse,
};
