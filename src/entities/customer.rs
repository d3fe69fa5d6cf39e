// Customer Entity - registration, updates and guarded deletion
//
// A customer is referenced by ledger entries and bill snapshots; deleting one
// that is still referenced is refused rather than cascaded.

use crate::error::{LedgerError, Result};
use crate::schema::{validate_contact, validate_name};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: i64,
    pub name: String,
    pub address: Option<String>,
    pub contact: String,
}

/// Fields accepted by registration and update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerDetails {
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    pub contact: String,
}

impl CustomerDetails {
    pub fn new(name: &str, address: Option<&str>, contact: &str) -> Self {
        CustomerDetails {
            name: name.to_string(),
            address: address.map(str::to_string),
            contact: contact.to_string(),
        }
    }

    /// Trim text fields and turn a blank address into `None`
    fn normalized(&self) -> CustomerDetails {
        CustomerDetails {
            name: self.name.trim().to_string(),
            address: self
                .address
                .as_deref()
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .map(str::to_string),
            contact: self.contact.trim().to_string(),
        }
    }

    fn validate(&self) -> Result<()> {
        validate_name("name", &self.name)?;
        validate_contact(&self.contact)
    }
}

fn customer_from_row(row: &Row<'_>) -> rusqlite::Result<Customer> {
    Ok(Customer {
        id: row.get(0)?,
        name: row.get(1)?,
        address: row.get(2)?,
        contact: row.get(3)?,
    })
}

pub fn register_customer(conn: &Connection, details: &CustomerDetails) -> Result<i64> {
    let details = details.normalized();
    details.validate()?;

    conn.execute(
        "INSERT INTO customers (name, address, contact) VALUES (?1, ?2, ?3)",
        params![details.name, details.address, details.contact],
    )
    .map_err(|e| LedgerError::from_constraint(e, "customer"))?;

    let id = conn.last_insert_rowid();
    info!(customer_id = id, name = %details.name, "customer registered");
    Ok(id)
}

pub fn update_customer(conn: &Connection, id: i64, details: &CustomerDetails) -> Result<()> {
    let details = details.normalized();
    details.validate()?;

    let changed = conn
        .execute(
            "UPDATE customers SET name = ?1, address = ?2, contact = ?3 WHERE id = ?4",
            params![details.name, details.address, details.contact, id],
        )
        .map_err(|e| LedgerError::from_constraint(e, "customer"))?;

    if changed == 0 {
        return Err(LedgerError::reference("customer", id));
    }
    info!(customer_id = id, "customer updated");
    Ok(())
}

/// Delete a customer that has no ledger entries and no bill snapshots
pub fn delete_customer(conn: &Connection, id: i64) -> Result<()> {
    if get_customer(conn, id)?.is_none() {
        return Err(LedgerError::reference("customer", id));
    }

    let references: i64 = conn.query_row(
        "SELECT (SELECT COUNT(*) FROM daily_entries WHERE customer_id = ?1)
              + (SELECT COUNT(*) FROM bills WHERE customer_id = ?1)",
        [id],
        |row| row.get(0),
    )?;
    if references > 0 {
        warn!(customer_id = id, references, "refusing to delete referenced customer");
        return Err(LedgerError::Reference {
            entity: "customer",
            id: format!("{} (referenced by {} ledger/bill rows)", id, references),
        });
    }

    conn.execute("DELETE FROM customers WHERE id = ?1", [id])
        .map_err(|e| LedgerError::from_constraint(e, "customer"))?;
    info!(customer_id = id, "customer deleted");
    Ok(())
}

pub fn get_customer(conn: &Connection, id: i64) -> Result<Option<Customer>> {
    let customer = conn
        .query_row(
            "SELECT id, name, address, contact FROM customers WHERE id = ?1",
            [id],
            customer_from_row,
        )
        .optional()?;
    Ok(customer)
}

/// First customer (lowest id) with exactly this name
pub fn find_customer_by_name(conn: &Connection, name: &str) -> Result<Option<Customer>> {
    let customer = conn
        .query_row(
            "SELECT id, name, address, contact FROM customers
             WHERE name = ?1 ORDER BY id LIMIT 1",
            [name.trim()],
            customer_from_row,
        )
        .optional()?;
    Ok(customer)
}

pub fn list_customers(conn: &Connection) -> Result<Vec<Customer>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, address, contact FROM customers ORDER BY name, id",
    )?;

    let customers = stmt
        .query_map([], customer_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(customers)
}

pub fn customer_exists(conn: &Connection, id: i64) -> Result<bool> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM customers WHERE id = ?1)",
        [id],
        |row| row.get(0),
    )?;
    Ok(exists)
}

// ============================================================================
// TESTS
// ============================================================================
