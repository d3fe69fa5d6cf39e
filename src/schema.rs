// Shape Layer - table definitions and write-time validation
//
// Every constraint exists twice: once as a validator that produces a precise
// error before the write, and once in the DDL so no caller can bypass it.

use crate::error::{LedgerError, Result};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Storage format for calendar dates (sorts lexicographically)
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Contact numbers are stored as exactly this many characters
pub const CONTACT_LENGTH: usize = 10;

// ============================================================================
// DDL
// ============================================================================

pub const CREATE_CUSTOMERS: &str = "CREATE TABLE IF NOT EXISTS customers (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL CHECK (length(trim(name)) > 0),
    address TEXT,
    contact TEXT NOT NULL UNIQUE CHECK (length(contact) = 10)
)";

pub const CREATE_PRODUCTS: &str = "CREATE TABLE IF NOT EXISTS products (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE CHECK (length(trim(name)) > 0),
    rate REAL NOT NULL CHECK (rate > 0)
)";

pub const CREATE_DAILY_ENTRIES: &str = "CREATE TABLE IF NOT EXISTS daily_entries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    customer_id INTEGER NOT NULL REFERENCES customers(id) ON DELETE RESTRICT,
    product_id INTEGER NOT NULL REFERENCES products(id) ON DELETE RESTRICT,
    entry_date TEXT NOT NULL
        CHECK (entry_date GLOB '[0-9][0-9][0-9][0-9]-[0-9][0-9]-[0-9][0-9]'),
    quantity REAL NOT NULL CHECK (quantity > 0)
)";

pub const CREATE_BILLS: &str = "CREATE TABLE IF NOT EXISTS bills (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    customer_id INTEGER NOT NULL REFERENCES customers(id) ON DELETE RESTRICT,
    month TEXT NOT NULL CHECK (length(month) = 7),
    total REAL NOT NULL CHECK (total >= 0),
    paid REAL NOT NULL DEFAULT 0 CHECK (paid >= 0 AND paid <= total),
    UNIQUE (customer_id, month)
)";

pub const CREATE_INDEXES: [&str; 3] = [
    "CREATE INDEX IF NOT EXISTS idx_entries_date ON daily_entries(entry_date)",
    "CREATE INDEX IF NOT EXISTS idx_entries_customer ON daily_entries(customer_id)",
    "CREATE INDEX IF NOT EXISTS idx_bills_month ON bills(month)",
];

/// The four tables, in dependency order
pub const TABLES: [&str; 4] = ["customers", "products", "daily_entries", "bills"];

// ============================================================================
// VALIDATORS
// ============================================================================

pub fn validate_name(field: &str, name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(LedgerError::validation(field, "required field is empty"));
    }
    Ok(())
}

pub fn validate_contact(contact: &str) -> Result<()> {
    let len = contact.chars().count();
    if len != CONTACT_LENGTH {
        return Err(LedgerError::validation(
            "contact",
            format!("must be exactly {} characters, got {}", CONTACT_LENGTH, len),
        ));
    }
    Ok(())
}

pub fn validate_rate(rate: f64) -> Result<()> {
    if !rate.is_finite() || rate <= 0.0 {
        return Err(LedgerError::validation(
            "rate",
            format!("must be greater than 0, got {}", rate),
        ));
    }
    Ok(())
}

pub fn validate_quantity(quantity: f64) -> Result<()> {
    if !quantity.is_finite() || quantity <= 0.0 {
        return Err(LedgerError::validation(
            "quantity",
            format!("must be greater than 0, got {}", quantity),
        ));
    }
    Ok(())
}

/// `paid` must be a non-negative amount; the upper bound is checked against
/// the bill total by the caller since that needs the stored row.
pub fn validate_paid(paid: f64) -> Result<()> {
    if !paid.is_finite() || paid < 0.0 {
        return Err(LedgerError::validation(
            "paid",
            format!("must be 0 or more, got {}", paid),
        ));
    }
    Ok(())
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn parse_date(text: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(text.trim(), DATE_FORMAT).map_err(|_| {
        LedgerError::validation("date", format!("expected YYYY-MM-DD, got '{}'", text))
    })
}

/// Row-level date decoding for `query_map` closures
pub(crate) fn date_from_row(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<NaiveDate> {
    let text: String = row.get(idx)?;
    NaiveDate::parse_from_str(&text, DATE_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

// ============================================================================
// BILLING MONTH
// ============================================================================

/// A calendar month in `YYYY-MM` form
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BillingMonth {
    year: i32,
    month: u32,
}

impl BillingMonth {
    pub const FIRST: BillingMonth = BillingMonth { year: 1, month: 1 };
    pub const LAST: BillingMonth = BillingMonth { year: 9999, month: 12 };

    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=9999).contains(&year) {
            return Err(LedgerError::validation(
                "month",
                format!("year out of range: {}", year),
            ));
        }
        if !(1..=12).contains(&month) {
            return Err(LedgerError::validation(
                "month",
                format!("month out of range: {}", month),
            ));
        }
        Ok(BillingMonth { year, month })
    }

    pub fn parse(text: &str) -> Result<Self> {
        let bad = || LedgerError::validation("month", format!("expected YYYY-MM, got '{}'", text));

        let bytes = text.as_bytes();
        if bytes.len() != 7 || bytes[4] != b'-' {
            return Err(bad());
        }
        let digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
        let (year, month) = (&text[..4], &text[5..]);
        if !digits(year) || !digits(month) {
            return Err(bad());
        }

        let year: i32 = year.parse().map_err(|_| bad())?;
        let month: u32 = month.parse().map_err(|_| bad())?;
        Self::new(year, month)
    }

    pub fn of(date: NaiveDate) -> Self {
        BillingMonth {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    /// Exclusive upper bound for date-range queries
    pub fn next_month_first_day(&self) -> NaiveDate {
        let (year, month) = self.next_parts();
        NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(NaiveDate::MAX)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }

    /// Following month; stays put at 9999-12
    pub fn next(&self) -> Self {
        if *self == Self::LAST {
            return *self;
        }
        let (year, month) = self.next_parts();
        BillingMonth { year, month }
    }

    /// Preceding month; stays put at 0001-01
    pub fn previous(&self) -> Self {
        if *self == Self::FIRST {
            *self
        } else if self.month == 1 {
            BillingMonth { year: self.year - 1, month: 12 }
        } else {
            BillingMonth { year: self.year, month: self.month - 1 }
        }
    }

    fn next_parts(&self) -> (i32, u32) {
        if self.month == 12 {
            (self.year + 1, 1)
        } else {
            (self.year, self.month + 1)
        }
    }
}

impl fmt::Display for BillingMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for BillingMonth {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for BillingMonth {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for BillingMonth {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        BillingMonth::parse(&text).map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// TESTS
// ============================================================================
