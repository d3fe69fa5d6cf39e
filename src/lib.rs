// Dairy Ledger - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod error;      // Error taxonomy: validation / reference / conflict
pub mod schema;     // Table definitions, field validation, billing months
pub mod db;         // Store: connection setup and scoped transactions
pub mod entities;   // Customers, products, bill snapshots
pub mod ledger;     // Daily delivery entries
pub mod billing;    // Monthly billing aggregation
pub mod report;     // Flat tables for export
pub mod export;     // CSV and paginated document writers
pub mod dashboard;  // Headline numbers
pub mod config;
pub mod telemetry;

// Re-export commonly used types
pub use error::{LedgerError, Result};
pub use schema::{format_date, parse_date, BillingMonth, DATE_FORMAT};
pub use db::{count_rows, setup_database, Store};
pub use entities::{
    Bill, BillView, Customer, CustomerDetails, Product, DEFAULT_PRODUCTS,
};
pub use entities::customer::{
    delete_customer, find_customer_by_name, get_customer, list_customers,
    register_customer, update_customer,
};
pub use entities::product::{
    add_product, delete_product, find_product_by_name, get_product, list_products,
    seed_default_products, update_product_rate,
};
pub use entities::bill::{find_bill, get_bill, list_bills, outstanding_total, record_payment};
pub use ledger::{list_entries, record_entry, EntryFilter, EntryView, LedgerEntry, NewEntry};
pub use billing::{
    calculate_billing, calculate_billing_for, calculate_customer_billing, grand_total,
    save_bill_snapshots, CustomerBill,
};
pub use report::{
    bill_status_table, billing_table, ledger_table, format_currency, Table,
};
pub use export::{export_table, ExportFormat, PageLayout};
pub use dashboard::Dashboard;
pub use config::AppConfig;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
