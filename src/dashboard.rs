// Dashboard - headline numbers shown on startup

use crate::db::count_rows;
use crate::entities::bill::outstanding_total;
use crate::error::Result;
use crate::ledger::count_entries_on;
use chrono::NaiveDate;
use rusqlite::Connection;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub today: NaiveDate,
    pub total_customers: i64,
    pub entries_today: i64,
    /// Unpaid amount across saved bill snapshots
    pub outstanding: f64,
}

impl Dashboard {
    pub fn collect(conn: &Connection, today: NaiveDate) -> Result<Self> {
        Ok(Dashboard {
            today,
            total_customers: count_rows(conn, "customers")?,
            entries_today: count_entries_on(conn, today)?,
            outstanding: outstanding_total(conn)?,
        })
    }
}
