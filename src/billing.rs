// Billing Engine - monthly totals per customer
//
// total = sum(quantity * rate) over a customer's entries in the month.
// Aggregation keeps full f64 precision; rounding to 2 decimals happens only in
// the report projection.

use crate::entities::bill::{upsert_bill, Bill};
use crate::entities::customer::customer_exists;
use crate::error::{LedgerError, Result};
use crate::schema::{format_date, BillingMonth};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// One customer's computed bill for a month
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerBill {
    pub customer_id: i64,
    pub customer_name: String,
    pub entry_count: i64,
    pub total: f64,
}

const AGGREGATE_SQL: &str = "SELECT c.id, c.name, COUNT(e.id), SUM(e.quantity * p.rate)
     FROM daily_entries e
     JOIN customers c ON c.id = e.customer_id
     JOIN products p ON p.id = e.product_id
     WHERE e.entry_date >= ?1 AND e.entry_date < ?2
       AND (?3 IS NULL OR e.customer_id = ?3)
     GROUP BY c.id, c.name
     ORDER BY c.name, c.id";

fn customer_bill_from_row(row: &Row<'_>) -> rusqlite::Result<CustomerBill> {
    Ok(CustomerBill {
        customer_id: row.get(0)?,
        customer_name: row.get(1)?,
        entry_count: row.get(2)?,
        total: row.get(3)?,
    })
}

/// Compute every customer's bill for `month` (`YYYY-MM`).
///
/// Customers without entries in the month are omitted; a month with no
/// entries yields an empty list. Results are ordered by customer name, then
/// id, and are identical across calls while the ledger is unchanged.
pub fn calculate_billing(conn: &Connection, month: &str) -> Result<Vec<CustomerBill>> {
    let month = BillingMonth::parse(month)?;
    calculate_billing_for(conn, &month)
}

pub fn calculate_billing_for(conn: &Connection, month: &BillingMonth) -> Result<Vec<CustomerBill>> {
    let mut stmt = conn.prepare(AGGREGATE_SQL)?;

    let bills = stmt
        .query_map(
            params![
                format_date(month.first_day()),
                format_date(month.next_month_first_day()),
                Option::<i64>::None,
            ],
            customer_bill_from_row,
        )?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    debug!(%month, customers = bills.len(), "billing calculated");
    Ok(bills)
}

/// Compute one customer's bill for `month`.
///
/// `None` when the customer exists but has no entries that month.
pub fn calculate_customer_billing(
    conn: &Connection,
    month: &str,
    customer_id: i64,
) -> Result<Option<CustomerBill>> {
    let month = BillingMonth::parse(month)?;
    if !customer_exists(conn, customer_id)? {
        return Err(LedgerError::reference("customer", customer_id));
    }

    let bill = conn
        .query_row(
            AGGREGATE_SQL,
            params![
                format_date(month.first_day()),
                format_date(month.next_month_first_day()),
                customer_id,
            ],
            customer_bill_from_row,
        )
        .optional()?;
    Ok(bill)
}

/// Persist the computed bills of `month` as snapshots.
///
/// Existing snapshots for the same customer and month get the recomputed
/// total and keep their `paid`. If any recomputed total is below its recorded
/// payment the whole call fails with `Conflict` and nothing is written
/// (the surrounding transaction rolls back).
pub fn save_bill_snapshots(conn: &Connection, month: &str) -> Result<Vec<Bill>> {
    let month = BillingMonth::parse(month)?;
    let computed = calculate_billing_for(conn, &month)?;

    let mut saved = Vec::with_capacity(computed.len());
    for bill in &computed {
        saved.push(upsert_bill(conn, bill.customer_id, &month, bill.total)?);
    }

    info!(%month, bills = saved.len(), "bill snapshots saved");
    Ok(saved)
}

/// Sum of all customer totals, unrounded
pub fn grand_total(bills: &[CustomerBill]) -> f64 {
    bills.iter().map(|b| b.total).sum()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::temp_store;
    use crate::entities::bill::{list_bills, record_payment};
    use crate::entities::customer::{register_customer, CustomerDetails};
    use crate::entities::product::{add_product, find_product_by_name, update_product_rate};
    use crate::ledger::{record_entry, NewEntry};
    use chrono::NaiveDate;

    fn deliver(conn: &Connection, customer: i64, product: i64, day: &str, quantity: f64) -> Result<i64> {
        record_entry(
            conn,
            &NewEntry {
                customer_id: customer,
                product_id: product,
                entry_date: NaiveDate::parse_from_str(day, "%Y-%m-%d").unwrap(),
                quantity,
            },
        )
    }

    #[test]
    fn test_two_entries_at_fifty() {
        let (_dir, store) = temp_store();

        store
            .transact(|conn| {
                let c = register_customer(conn, &CustomerDetails::new("C", None, "9000000001"))?;
                let p = add_product(conn, "P", 50.0)?;
                deliver(conn, c, p, "2024-06-01", 3.0)?;
                deliver(conn, c, p, "2024-06-15", 2.0)?;
                Ok(())
            })
            .unwrap();

        let bills = store.read(|conn| calculate_billing(conn, "2024-06")).unwrap();
        assert_eq!(bills.len(), 1);
        assert_eq!(bills[0].customer_name, "C");
        assert_eq!(bills[0].entry_count, 2);
        assert_eq!(bills[0].total, 250.0);
    }

    #[test]
    fn test_month_boundaries_and_grouping() {
        let (_dir, store) = temp_store();

        store
            .transact(|conn| {
                let milk = find_product_by_name(conn, "Milk Type 1")?.unwrap().id; // 50
                let ghee = find_product_by_name(conn, "Ghee")?.unwrap().id; // 500
                let vijay = register_customer(conn, &CustomerDetails::new("Vijay", None, "9000000001"))?;
                let anita = register_customer(conn, &CustomerDetails::new("Anita", None, "9000000002"))?;
                let omitted = register_customer(conn, &CustomerDetails::new("Omkar", None, "9000000003"))?;

                deliver(conn, vijay, milk, "2024-06-01", 1.0)?;
                deliver(conn, vijay, ghee, "2024-06-30", 0.5)?;
                deliver(conn, vijay, milk, "2024-07-01", 10.0)?;
                deliver(conn, anita, milk, "2024-06-10", 2.0)?;
                deliver(conn, omitted, ghee, "2024-05-31", 1.0)?;
                Ok(())
            })
            .unwrap();

        let bills = store.read(|conn| calculate_billing(conn, "2024-06")).unwrap();
        let summary: Vec<(&str, f64)> = bills
            .iter()
            .map(|b| (b.customer_name.as_str(), b.total))
            .collect();
        assert_eq!(summary, vec![("Anita", 100.0), ("Vijay", 300.0)]);
        assert_eq!(grand_total(&bills), 400.0);
    }

    #[test]
    fn test_same_name_customers_stay_separate() {
        let (_dir, store) = temp_store();

        store
            .transact(|conn| {
                let milk = find_product_by_name(conn, "Milk Type 1")?.unwrap().id;
                let first = register_customer(conn, &CustomerDetails::new("Raj", None, "9000000001"))?;
                let second = register_customer(conn, &CustomerDetails::new("Raj", None, "9000000002"))?;
                deliver(conn, first, milk, "2024-06-01", 1.0)?;
                deliver(conn, second, milk, "2024-06-01", 2.0)?;
                Ok(())
            })
            .unwrap();

        let bills = store.read(|conn| calculate_billing(conn, "2024-06")).unwrap();
        assert_eq!(bills.len(), 2);
        assert!(bills[0].customer_id < bills[1].customer_id);
        assert_eq!(bills[0].total, 50.0);
        assert_eq!(bills[1].total, 100.0);
    }

    #[test]
    fn test_precision_kept_until_display() {
        let (_dir, store) = temp_store();

        store
            .transact(|conn| {
                let c = register_customer(conn, &CustomerDetails::new("C", None, "9000000001"))?;
                let p = add_product(conn, "Loose Milk", 33.333)?;
                for day in 1..=3 {
                    deliver(conn, c, p, &format!("2024-06-0{}", day), 0.333)?;
                }
                Ok(())
            })
            .unwrap();

        let bills = store.read(|conn| calculate_billing(conn, "2024-06")).unwrap();
        let expected = 3.0 * (0.333 * 33.333);
        assert!((bills[0].total - expected).abs() < 1e-9);
        // Rounding each line first would give 3 * 11.10 = 33.30
        assert!((bills[0].total - 33.30).abs() > 1e-6);
    }

    #[test]
    fn test_empty_month_is_empty_not_error() {
        let (_dir, store) = temp_store();
        let bills = store.read(|conn| calculate_billing(conn, "2030-01")).unwrap();
        assert!(bills.is_empty());
    }

    #[test]
    fn test_malformed_month_is_validation_error() {
        let (_dir, store) = temp_store();
        for month in ["2024-6", "June", "2024-13", ""] {
            let err = store.read(|conn| calculate_billing(conn, month)).unwrap_err();
            assert!(err.is_validation(), "{} should be rejected", month);
        }
    }

    #[test]
    fn test_calculation_is_repeatable() {
        let (_dir, store) = temp_store();

        store
            .transact(|conn| {
                let milk = find_product_by_name(conn, "Milk Type 2")?.unwrap().id;
                for (i, name) in ["B", "A", "C"].iter().enumerate() {
                    let id = register_customer(
                        conn,
                        &CustomerDetails::new(name, None, &format!("900000000{}", i)),
                    )?;
                    deliver(conn, id, milk, "2024-06-05", 1.5 + i as f64)?;
                }
                Ok(())
            })
            .unwrap();

        let first = store.read(|conn| calculate_billing(conn, "2024-06")).unwrap();
        let second = store.read(|conn| calculate_billing(conn, "2024-06")).unwrap();
        assert_eq!(first, second);
        let names: Vec<&str> = first.iter().map(|b| b.customer_name.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_single_customer_billing() {
        let (_dir, store) = temp_store();

        let (with_entries, without) = store
            .transact(|conn| {
                let paneer = find_product_by_name(conn, "Paneer")?.unwrap().id;
                let a = register_customer(conn, &CustomerDetails::new("A", None, "9000000001"))?;
                let b = register_customer(conn, &CustomerDetails::new("B", None, "9000000002"))?;
                deliver(conn, a, paneer, "2024-06-05", 2.0)?;
                Ok((a, b))
            })
            .unwrap();

        let bill = store
            .read(|conn| calculate_customer_billing(conn, "2024-06", with_entries))
            .unwrap()
            .unwrap();
        assert_eq!(bill.total, 600.0);

        let none = store
            .read(|conn| calculate_customer_billing(conn, "2024-06", without))
            .unwrap();
        assert!(none.is_none());

        let err = store
            .read(|conn| calculate_customer_billing(conn, "2024-06", 999))
            .unwrap_err();
        assert!(err.is_reference());
    }

    #[test]
    fn test_snapshots_follow_recalculation() {
        let (_dir, store) = temp_store();

        let (customer, milk) = store
            .transact(|conn| {
                let milk = find_product_by_name(conn, "Milk Type 1")?.unwrap().id;
                let c = register_customer(conn, &CustomerDetails::new("C", None, "9000000001"))?;
                deliver(conn, c, milk, "2024-06-01", 2.0)?;
                Ok((c, milk))
            })
            .unwrap();

        let saved = store.transact(|conn| save_bill_snapshots(conn, "2024-06")).unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].total, 100.0);
        store.transact(|conn| record_payment(conn, saved[0].id, 60.0)).unwrap();

        store.transact(|conn| deliver(conn, customer, milk, "2024-06-02", 1.0)).unwrap();
        let resaved = store.transact(|conn| save_bill_snapshots(conn, "2024-06")).unwrap();
        assert_eq!(resaved[0].id, saved[0].id);
        assert_eq!(resaved[0].total, 150.0);
        assert_eq!(resaved[0].paid, 60.0);

        let june = BillingMonth::parse("2024-06").unwrap();
        assert_eq!(store.read(|conn| list_bills(conn, Some(&june))).unwrap().len(), 1);
    }

    #[test]
    fn test_snapshot_conflict_after_rate_cut_writes_nothing() {
        let (_dir, store) = temp_store();

        let (bill_id, milk) = store
            .transact(|conn| {
                let milk = find_product_by_name(conn, "Milk Type 1")?.unwrap().id;
                let c = register_customer(conn, &CustomerDetails::new("C", None, "9000000001"))?;
                deliver(conn, c, milk, "2024-06-01", 2.0)?;
                let bill = save_bill_snapshots(conn, "2024-06")?.remove(0);
                record_payment(conn, bill.id, 100.0)?;
                Ok((bill.id, milk))
            })
            .unwrap();

        store.transact(|conn| update_product_rate(conn, milk, 40.0)).unwrap();
        let err = store.transact(|conn| save_bill_snapshots(conn, "2024-06")).unwrap_err();
        assert!(err.is_conflict());

        let june = BillingMonth::parse("2024-06").unwrap();
        let bills = store.read(|conn| list_bills(conn, Some(&june))).unwrap();
        assert_eq!(bills[0].bill.id, bill_id);
        assert_eq!(bills[0].bill.total, 100.0);
    }
}
