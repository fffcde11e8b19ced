pub mod import_batch_repo;
pub mod purchase_order_repo;
pub mod vendor_repo;

pub use import_batch_repo::ImportBatchRepo;
pub use purchase_order_repo::PurchaseOrderRepo;
pub use vendor_repo::VendorRepo;
