// Entity Models - the persisted rows other than ledger entries
//
// Each module owns:
// - the row struct (serde-friendly)
// - its write operations with validation in front of the table constraints
// - lookups by id and by display name

pub mod customer;
pub mod product;
pub mod bill;

pub use customer::{Customer, CustomerDetails};
pub use product::{Product, DEFAULT_PRODUCTS};
pub use bill::{Bill, BillView};
