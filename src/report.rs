// Report Projection - flat tables for external rendering
//
// Pure reshaping: column selection, names instead of ids, and display
// formatting (2-decimal currency, ISO dates). No business logic lives here.

use crate::billing::CustomerBill;
use crate::entities::bill::BillView;
use crate::ledger::EntryView;
use crate::schema::{format_date, BillingMonth};
use serde::Serialize;

pub const BILLING_COLUMNS: [&str; 2] = ["Customer", "Total"];
pub const LEDGER_COLUMNS: [&str; 4] = ["Date", "Customer", "Product", "Quantity"];
pub const BILL_STATUS_COLUMNS: [&str; 4] = ["Customer", "Total", "Paid", "Due"];

pub const LEDGER_REPORT_TITLE: &str = "Daily Entries Report";

/// Rows of display strings under named columns
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    pub title: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(title: impl Into<String>, columns: &[&str]) -> Self {
        Table {
            title: title.into(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<String>) {
        debug_assert_eq!(row.len(), self.columns.len());
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Value of `column` in row `index`
    pub fn cell(&self, index: usize, column: &str) -> Option<&str> {
        let col = self.columns.iter().position(|c| c == column)?;
        self.rows.get(index).and_then(|row| row.get(col)).map(String::as_str)
    }
}

/// Currency for display; the only place totals are rounded
pub fn format_currency(amount: f64) -> String {
    format!("{:.2}", amount)
}

/// Quantities print without trailing zeros (2 -> "2", 0.5 -> "0.5")
pub fn format_quantity(quantity: f64) -> String {
    format!("{}", quantity)
}

pub fn billing_title(month: &BillingMonth) -> String {
    format!("Billing Summary for {}", month)
}

/// `Customer, Total` rows for a computed month
pub fn billing_table(month: &BillingMonth, bills: &[CustomerBill]) -> Table {
    let mut table = Table::new(billing_title(month), &BILLING_COLUMNS);
    for bill in bills {
        table.push_row(vec![bill.customer_name.clone(), format_currency(bill.total)]);
    }
    table
}

/// `Date, Customer, Product, Quantity` rows
pub fn ledger_table(entries: &[EntryView]) -> Table {
    let mut table = Table::new(LEDGER_REPORT_TITLE, &LEDGER_COLUMNS);
    for entry in entries {
        table.push_row(vec![
            format_date(entry.entry_date),
            entry.customer_name.clone(),
            entry.product_name.clone(),
            format_quantity(entry.quantity),
        ]);
    }
    table
}

/// `Customer, Total, Paid, Due` rows for saved bill snapshots
pub fn bill_status_table(month: Option<&BillingMonth>, bills: &[BillView]) -> Table {
    let title = match month {
        Some(month) => format!("Bill Status for {}", month),
        None => "Bill Status".to_string(),
    };

    let mut table = Table::new(title, &BILL_STATUS_COLUMNS);
    for view in bills {
        table.push_row(vec![
            view.customer_name.clone(),
            format_currency(view.bill.total),
            format_currency(view.bill.paid),
            format_currency(view.bill.due()),
        ]);
    }
    table
}

// File stems are derived only from the query parameter so re-exports overwrite
pub fn billing_file_stem(month: &BillingMonth) -> String {
    format!("billing_summary_{}", month)
}

pub fn ledger_file_stem() -> String {
    "daily_entries".to_string()
}

pub fn bill_status_file_stem(month: Option<&BillingMonth>) -> String {
    match month {
        Some(month) => format!("bill_status_{}", month),
        None => "bill_status_all".to_string(),
    }
}
