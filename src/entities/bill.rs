// Bill Entity - persisted monthly snapshot with a single paid amount
//
// Snapshots are written by the billing engine (see `billing::save_bill_snapshots`)
// and only `paid` is mutated afterwards. `paid <= total` holds for every row.

use crate::error::{LedgerError, Result};
use crate::schema::{validate_paid, BillingMonth};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bill {
    pub id: i64,
    pub customer_id: i64,
    pub month: String,
    pub total: f64,
    pub paid: f64,
}

impl Bill {
    /// Amount still owed
    pub fn due(&self) -> f64 {
        self.total - self.paid
    }

    pub fn is_settled(&self) -> bool {
        self.paid >= self.total
    }
}

/// Bill joined with the customer's display name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillView {
    pub bill: Bill,
    pub customer_name: String,
}

const BILL_COLUMNS: &str = "b.id, b.customer_id, b.month, b.total, b.paid";

fn bill_from_row(row: &Row<'_>) -> rusqlite::Result<Bill> {
    Ok(Bill {
        id: row.get(0)?,
        customer_id: row.get(1)?,
        month: row.get(2)?,
        total: row.get(3)?,
        paid: row.get(4)?,
    })
}

/// Insert or overwrite the snapshot for (customer, month), keeping `paid`.
///
/// Fails with `Conflict` when the new total would fall below what has
/// already been paid.
pub(crate) fn upsert_bill(
    conn: &Connection,
    customer_id: i64,
    month: &BillingMonth,
    total: f64,
) -> Result<Bill> {
    let month_text = month.to_string();

    if let Some(existing) = find_bill(conn, customer_id, month)? {
        if existing.paid > total {
            warn!(
                bill_id = existing.id,
                paid = existing.paid,
                total,
                "recomputed total is below the recorded payment"
            );
            return Err(LedgerError::Conflict(format!(
                "bill {} for customer {} in {} already has {} paid, above the recomputed total {}",
                existing.id, customer_id, month_text, existing.paid, total
            )));
        }
    }

    conn.execute(
        "INSERT INTO bills (customer_id, month, total) VALUES (?1, ?2, ?3)
         ON CONFLICT (customer_id, month) DO UPDATE SET total = excluded.total",
        params![customer_id, month_text, total],
    )
    .map_err(|e| LedgerError::from_constraint(e, "bill"))?;

    find_bill(conn, customer_id, month)?
        .ok_or_else(|| LedgerError::reference("bill", format!("{}/{}", customer_id, month_text)))
}

/// Set the amount paid on a bill.
///
/// Rejects amounts above the bill total with `Conflict`; the stored value is
/// left as it was.
pub fn record_payment(conn: &Connection, bill_id: i64, paid: f64) -> Result<Bill> {
    validate_paid(paid)?;

    let mut bill = get_bill(conn, bill_id)?.ok_or_else(|| LedgerError::reference("bill", bill_id))?;
    if paid > bill.total {
        warn!(bill_id, paid, total = bill.total, "payment exceeds bill total");
        return Err(LedgerError::Conflict(format!(
            "paid {} exceeds total {} on bill {}",
            paid, bill.total, bill_id
        )));
    }

    conn.execute("UPDATE bills SET paid = ?1 WHERE id = ?2", params![paid, bill_id])
        .map_err(|e| LedgerError::from_constraint(e, "bill"))?;

    bill.paid = paid;
    info!(bill_id, paid, due = bill.due(), "payment recorded");
    Ok(bill)
}

pub fn get_bill(conn: &Connection, id: i64) -> Result<Option<Bill>> {
    let bill = conn
        .query_row(
            &format!("SELECT {} FROM bills b WHERE b.id = ?1", BILL_COLUMNS),
            [id],
            bill_from_row,
        )
        .optional()?;
    Ok(bill)
}

pub fn find_bill(conn: &Connection, customer_id: i64, month: &BillingMonth) -> Result<Option<Bill>> {
    let bill = conn
        .query_row(
            &format!(
                "SELECT {} FROM bills b WHERE b.customer_id = ?1 AND b.month = ?2",
                BILL_COLUMNS
            ),
            params![customer_id, month.to_string()],
            bill_from_row,
        )
        .optional()?;
    Ok(bill)
}

/// Bills with customer names, for one month or all months.
/// Ordered by month, then customer name.
pub fn list_bills(conn: &Connection, month: Option<&BillingMonth>) -> Result<Vec<BillView>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {}, c.name
         FROM bills b
         JOIN customers c ON c.id = b.customer_id
         WHERE (?1 IS NULL OR b.month = ?1)
         ORDER BY b.month, c.name, b.customer_id",
        BILL_COLUMNS
    ))?;

    let month_text = month.map(|m| m.to_string());
    let bills = stmt
        .query_map([month_text], |row| {
            Ok(BillView {
                bill: bill_from_row(row)?,
                customer_name: row.get(5)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(bills)
}

/// Sum of unpaid amounts across all snapshots
pub fn outstanding_total(conn: &Connection) -> Result<f64> {
    let outstanding: Option<f64> = conn.query_row(
        "SELECT SUM(total - paid) FROM bills WHERE paid < total",
        [],
        |row| row.get(0),
    )?;
    Ok(outstanding.unwrap_or(0.0))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::temp_store;
    use crate::entities::customer::{register_customer, CustomerDetails};

    fn june() -> BillingMonth {
        BillingMonth::parse("2024-06").unwrap()
    }

    fn customer(conn: &Connection, name: &str, contact: &str) -> Result<i64> {
        register_customer(conn, &CustomerDetails::new(name, None, contact))
    }

    #[test]
    fn test_upsert_overwrites_total_and_keeps_paid() {
        let (_dir, store) = temp_store();

        let bill = store
            .transact(|conn| {
                let id = customer(conn, "Asha", "9000000010")?;
                upsert_bill(conn, id, &june(), 100.0)
            })
            .unwrap();
        assert_eq!(bill.paid, 0.0);

        store.transact(|conn| record_payment(conn, bill.id, 40.0)).unwrap();
        let again = store
            .transact(|conn| upsert_bill(conn, bill.customer_id, &june(), 150.0))
            .unwrap();

        assert_eq!(again.id, bill.id, "same customer/month keeps one snapshot");
        assert_eq!(again.total, 150.0);
        assert_eq!(again.paid, 40.0);
    }

    #[test]
    fn test_upsert_below_paid_is_conflict() {
        let (_dir, store) = temp_store();

        let bill = store
            .transact(|conn| {
                let id = customer(conn, "Asha", "9000000010")?;
                let bill = upsert_bill(conn, id, &june(), 100.0)?;
                record_payment(conn, bill.id, 90.0)
            })
            .unwrap();

        let err = store
            .transact(|conn| upsert_bill(conn, bill.customer_id, &june(), 50.0))
            .unwrap_err();
        assert!(err.is_conflict());

        let stored = store.read(|conn| get_bill(conn, bill.id)).unwrap().unwrap();
        assert_eq!(stored.total, 100.0);
    }

    #[test]
    fn test_overpayment_rejected_and_value_unchanged() {
        let (_dir, store) = temp_store();

        let bill = store
            .transact(|conn| {
                let id = customer(conn, "Asha", "9000000010")?;
                let bill = upsert_bill(conn, id, &june(), 250.0)?;
                record_payment(conn, bill.id, 100.0)
            })
            .unwrap();

        let err = store.transact(|conn| record_payment(conn, bill.id, 250.01)).unwrap_err();
        assert!(err.is_conflict());

        let stored = store.read(|conn| get_bill(conn, bill.id)).unwrap().unwrap();
        assert_eq!(stored.paid, 100.0);
    }

    #[test]
    fn test_payment_edge_values() {
        let (_dir, store) = temp_store();

        let bill = store
            .transact(|conn| {
                let id = customer(conn, "Asha", "9000000010")?;
                upsert_bill(conn, id, &june(), 250.0)
            })
            .unwrap();

        let settled = store.transact(|conn| record_payment(conn, bill.id, 250.0)).unwrap();
        assert!(settled.is_settled());
        assert_eq!(settled.due(), 0.0);

        let err = store.transact(|conn| record_payment(conn, bill.id, -1.0)).unwrap_err();
        assert!(err.is_validation());
        let err = store.transact(|conn| record_payment(conn, 9999, 1.0)).unwrap_err();
        assert!(err.is_reference());
    }

    #[test]
    fn test_list_bills_and_outstanding() {
        let (_dir, store) = temp_store();

        store
            .transact(|conn| {
                let zara = customer(conn, "Zara", "9000000011")?;
                let amit = customer(conn, "Amit", "9000000012")?;
                let b1 = upsert_bill(conn, zara, &june(), 300.0)?;
                upsert_bill(conn, amit, &june(), 120.5)?;
                upsert_bill(conn, amit, &june().next(), 80.0)?;
                record_payment(conn, b1.id, 300.0)?;
                Ok(())
            })
            .unwrap();

        let june_bills = store.read(|conn| list_bills(conn, Some(&june()))).unwrap();
        let names: Vec<&str> = june_bills.iter().map(|b| b.customer_name.as_str()).collect();
        assert_eq!(names, vec!["Amit", "Zara"]);

        let all = store.read(|conn| list_bills(conn, None)).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[2].bill.month, "2024-07");

        let outstanding = store.read(outstanding_total).unwrap();
        assert!((outstanding - 200.5).abs() < 1e-9);
    }

    #[test]
    fn test_outstanding_is_zero_without_bills() {
        let (_dir, store) = temp_store();
        assert_eq!(store.read(outstanding_total).unwrap(), 0.0);
    }
}
