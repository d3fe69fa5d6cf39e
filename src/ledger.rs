// Entry Ledger - append-only record of deliveries
//
// One entry = one product delivered to one customer on one date.
// Entries are never updated or deleted: corrections are new entries.

use crate::entities::customer::customer_exists;
use crate::entities::product::product_exists;
use crate::error::{LedgerError, Result};
use crate::schema::{date_from_row, format_date, validate_quantity};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// A stored delivery, as persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub customer_id: i64,
    pub product_id: i64,
    pub entry_date: NaiveDate,
    pub quantity: f64,
}

/// Input for [`record_entry`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEntry {
    pub customer_id: i64,
    pub product_id: i64,
    pub entry_date: NaiveDate,
    pub quantity: f64,
}

/// A delivery joined with customer and product names for display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryView {
    pub id: i64,
    pub entry_date: NaiveDate,
    pub customer_id: i64,
    pub customer_name: String,
    pub product_id: i64,
    pub product_name: String,
    pub rate: f64,
    pub quantity: f64,
}

impl EntryView {
    /// Unrounded value of this delivery at the current product rate
    pub fn amount(&self) -> f64 {
        self.quantity * self.rate
    }
}

/// Optional narrowing for [`list_entries`]; both date bounds are inclusive
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntryFilter {
    #[serde(default)]
    pub from: Option<NaiveDate>,
    #[serde(default)]
    pub to: Option<NaiveDate>,
    #[serde(default)]
    pub customer_id: Option<i64>,
}

impl EntryFilter {
    pub fn all() -> Self {
        EntryFilter::default()
    }

    pub fn between(from: NaiveDate, to: NaiveDate) -> Self {
        EntryFilter {
            from: Some(from),
            to: Some(to),
            customer_id: None,
        }
    }

    pub fn for_customer(mut self, customer_id: i64) -> Self {
        self.customer_id = Some(customer_id);
        self
    }

    fn validate(&self) -> Result<()> {
        if let (Some(from), Some(to)) = (self.from, self.to) {
            if from > to {
                return Err(LedgerError::validation(
                    "date range",
                    format!("start {} is after end {}", from, to),
                ));
            }
        }
        Ok(())
    }
}

/// Record one delivery and return its id.
///
/// Rejects non-positive quantities (`Validation`) and unknown customers or
/// products (`Reference`) before anything is written.
pub fn record_entry(conn: &Connection, entry: &NewEntry) -> Result<i64> {
    if let Err(err) = validate_quantity(entry.quantity) {
        warn!(quantity = entry.quantity, "rejected ledger entry");
        return Err(err);
    }
    if !customer_exists(conn, entry.customer_id)? {
        return Err(LedgerError::reference("customer", entry.customer_id));
    }
    if !product_exists(conn, entry.product_id)? {
        return Err(LedgerError::reference("product", entry.product_id));
    }

    conn.execute(
        "INSERT INTO daily_entries (customer_id, product_id, entry_date, quantity)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            entry.customer_id,
            entry.product_id,
            format_date(entry.entry_date),
            entry.quantity,
        ],
    )
    .map_err(|e| LedgerError::from_constraint(e, "entry"))?;

    let id = conn.last_insert_rowid();
    info!(
        entry_id = id,
        customer_id = entry.customer_id,
        product_id = entry.product_id,
        date = %entry.entry_date,
        quantity = entry.quantity,
        "ledger entry recorded"
    );
    Ok(id)
}

pub fn get_entry(conn: &Connection, id: i64) -> Result<Option<LedgerEntry>> {
    let entry = conn
        .query_row(
            "SELECT id, customer_id, product_id, entry_date, quantity
             FROM daily_entries WHERE id = ?1",
            [id],
            |row| {
                Ok(LedgerEntry {
                    id: row.get(0)?,
                    customer_id: row.get(1)?,
                    product_id: row.get(2)?,
                    entry_date: date_from_row(row, 3)?,
                    quantity: row.get(4)?,
                })
            },
        )
        .optional()?;
    Ok(entry)
}

/// Entries matching `filter`, joined with names, ordered by date then id.
///
/// Each call runs a fresh query, so calling again after new writes returns
/// the updated ledger.
pub fn list_entries(conn: &Connection, filter: &EntryFilter) -> Result<Vec<EntryView>> {
    filter.validate()?;

    let mut stmt = conn.prepare(
        "SELECT e.id, e.entry_date, e.customer_id, c.name, e.product_id, p.name, p.rate, e.quantity
         FROM daily_entries e
         JOIN customers c ON c.id = e.customer_id
         JOIN products p ON p.id = e.product_id
         WHERE (?1 IS NULL OR e.entry_date >= ?1)
           AND (?2 IS NULL OR e.entry_date <= ?2)
           AND (?3 IS NULL OR e.customer_id = ?3)
         ORDER BY e.entry_date, e.id",
    )?;

    let entries = stmt
        .query_map(
            params![
                filter.from.map(format_date),
                filter.to.map(format_date),
                filter.customer_id,
            ],
            |row| {
                Ok(EntryView {
                    id: row.get(0)?,
                    entry_date: date_from_row(row, 1)?,
                    customer_id: row.get(2)?,
                    customer_name: row.get(3)?,
                    product_id: row.get(4)?,
                    product_name: row.get(5)?,
                    rate: row.get(6)?,
                    quantity: row.get(7)?,
                })
            },
        )?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    debug!(count = entries.len(), "listed ledger entries");
    Ok(entries)
}

/// Number of deliveries recorded for `date`
pub fn count_entries_on(conn: &Connection, date: NaiveDate) -> Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM daily_entries WHERE entry_date = ?1",
        [format_date(date)],
        |row| row.get(0),
    )?;
    Ok(count)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::count_rows;
    use crate::db::test_support::temp_store;
    use crate::entities::customer::{register_customer, CustomerDetails};
    use crate::entities::product::find_product_by_name;

    fn date(text: &str) -> NaiveDate {
        NaiveDate::parse_from_str(text, "%Y-%m-%d").unwrap()
    }

    /// (customer id, milk id, paneer id)
    fn setup(conn: &Connection) -> Result<(i64, i64, i64)> {
        let customer = register_customer(conn, &CustomerDetails::new("Ravi", None, "9123456789"))?;
        let milk = find_product_by_name(conn, "Milk Type 1")?.unwrap().id;
        let paneer = find_product_by_name(conn, "Paneer")?.unwrap().id;
        Ok((customer, milk, paneer))
    }

    #[test]
    fn test_record_and_list_round_trip() {
        let (_dir, store) = temp_store();

        let (customer, milk, _) = store.transact(setup).unwrap();
        let entry = NewEntry {
            customer_id: customer,
            product_id: milk,
            entry_date: date("2024-06-03"),
            quantity: 2.5,
        };
        let id = store.transact(|conn| record_entry(conn, &entry)).unwrap();

        let entries = store.read(|conn| list_entries(conn, &EntryFilter::all())).unwrap();
        assert_eq!(entries.len(), 1);
        let view = &entries[0];
        assert_eq!(view.id, id);
        assert_eq!(view.customer_name, "Ravi");
        assert_eq!(view.product_name, "Milk Type 1");
        assert_eq!(view.entry_date, date("2024-06-03"));
        assert_eq!(view.quantity, 2.5);
        assert_eq!(view.amount(), 125.0);

        let stored = store.read(|conn| get_entry(conn, id)).unwrap().unwrap();
        assert_eq!(stored.customer_id, customer);
        assert_eq!(stored.product_id, milk);
    }

    #[test]
    fn test_non_positive_quantity_rejected() {
        let (_dir, store) = temp_store();
        let (customer, milk, _) = store.transact(setup).unwrap();

        for quantity in [0.0, -1.0] {
            let entry = NewEntry {
                customer_id: customer,
                product_id: milk,
                entry_date: date("2024-06-03"),
                quantity,
            };
            let err = store.transact(|conn| record_entry(conn, &entry)).unwrap_err();
            assert!(err.is_validation());
        }

        assert_eq!(store.read(|conn| count_rows(conn, "daily_entries")).unwrap(), 0);
    }

    #[test]
    fn test_unknown_references_rejected() {
        let (_dir, store) = temp_store();
        let (customer, milk, _) = store.transact(setup).unwrap();

        let bad_customer = NewEntry {
            customer_id: customer + 100,
            product_id: milk,
            entry_date: date("2024-06-03"),
            quantity: 1.0,
        };
        let err = store.transact(|conn| record_entry(conn, &bad_customer)).unwrap_err();
        assert!(err.is_reference());

        let bad_product = NewEntry {
            product_id: 9999,
            customer_id: customer,
            ..bad_customer
        };
        let err = store.transact(|conn| record_entry(conn, &bad_product)).unwrap_err();
        assert!(err.is_reference());

        assert_eq!(store.read(|conn| count_rows(conn, "daily_entries")).unwrap(), 0);
    }

    #[test]
    fn test_list_is_ordered_by_date_and_filterable() {
        let (_dir, store) = temp_store();

        store
            .transact(|conn| {
                let (ravi, milk, paneer) = setup(conn)?;
                let meena =
                    register_customer(conn, &CustomerDetails::new("Meena", None, "9123456780"))?;
                for (customer, product, day, quantity) in [
                    (ravi, milk, "2024-06-20", 1.0),
                    (meena, paneer, "2024-06-02", 0.5),
                    (ravi, paneer, "2024-05-31", 1.0),
                    (meena, milk, "2024-07-01", 2.0),
                ] {
                    record_entry(
                        conn,
                        &NewEntry {
                            customer_id: customer,
                            product_id: product,
                            entry_date: date(day),
                            quantity,
                        },
                    )?;
                }
                Ok(())
            })
            .unwrap();

        let all = store.read(|conn| list_entries(conn, &EntryFilter::all())).unwrap();
        let dates: Vec<String> = all.iter().map(|e| e.entry_date.to_string()).collect();
        assert_eq!(dates, vec!["2024-05-31", "2024-06-02", "2024-06-20", "2024-07-01"]);

        let june = EntryFilter::between(date("2024-06-01"), date("2024-06-30"));
        let in_june = store.read(|conn| list_entries(conn, &june)).unwrap();
        assert_eq!(in_june.len(), 2);

        let ravi_id = all[0].customer_id;
        let ravi_june = store
            .read(|conn| list_entries(conn, &june.clone().for_customer(ravi_id)))
            .unwrap();
        assert_eq!(ravi_june.len(), 1);
        assert_eq!(ravi_june[0].entry_date, date("2024-06-20"));

        // Restartable: the same query again yields the same sequence
        let again = store.read(|conn| list_entries(conn, &EntryFilter::all())).unwrap();
        assert_eq!(again, all);
    }

    #[test]
    fn test_inverted_range_rejected() {
        let (_dir, store) = temp_store();
        let filter = EntryFilter::between(date("2024-06-30"), date("2024-06-01"));
        let err = store.read(|conn| list_entries(conn, &filter)).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_empty_ledger_lists_nothing() {
        let (_dir, store) = temp_store();
        let entries = store.read(|conn| list_entries(conn, &EntryFilter::all())).unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn test_count_entries_on_date() {
        let (_dir, store) = temp_store();

        store
            .transact(|conn| {
                let (customer, milk, paneer) = setup(conn)?;
                for product in [milk, paneer] {
                    record_entry(
                        conn,
                        &NewEntry {
                            customer_id: customer,
                            product_id: product,
                            entry_date: date("2024-06-10"),
                            quantity: 1.0,
                        },
                    )?;
                }
                Ok(())
            })
            .unwrap();

        assert_eq!(store.read(|conn| count_entries_on(conn, date("2024-06-10"))).unwrap(), 2);
        assert_eq!(store.read(|conn| count_entries_on(conn, date("2024-06-11"))).unwrap(), 0);
    }
}
