// Product Entity - catalog of deliverable items and their rates
//
// The catalog is seeded once, on the first startup that finds it empty.
// Deleting products later never brings the seed back.

use crate::error::{LedgerError, Result};
use crate::schema::{validate_name, validate_rate};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Seed catalog: (name, rate per unit)
pub const DEFAULT_PRODUCTS: [(&str, f64); 7] = [
    ("Milk Type 1", 50.0),
    ("Milk Type 2", 55.0),
    ("Milk Type 3", 60.0),
    ("Paneer", 300.0),
    ("Chach", 40.0),
    ("Ghee", 500.0),
    ("Dahi", 60.0),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub rate: f64,
}

fn product_from_row(row: &Row<'_>) -> rusqlite::Result<Product> {
    Ok(Product {
        id: row.get(0)?,
        name: row.get(1)?,
        rate: row.get(2)?,
    })
}

/// Insert the seed catalog if, and only if, no product exists yet.
/// Returns how many products were inserted.
pub fn seed_default_products(conn: &Connection) -> Result<usize> {
    if count_products(conn)? > 0 {
        return Ok(0);
    }

    let mut stmt = conn.prepare("INSERT INTO products (name, rate) VALUES (?1, ?2)")?;
    for (name, rate) in DEFAULT_PRODUCTS {
        stmt.execute(params![name, rate])?;
    }

    info!(count = DEFAULT_PRODUCTS.len(), "seeded default product catalog");
    Ok(DEFAULT_PRODUCTS.len())
}

pub fn add_product(conn: &Connection, name: &str, rate: f64) -> Result<i64> {
    let name = name.trim();
    validate_name("name", name)?;
    validate_rate(rate)?;

    conn.execute(
        "INSERT INTO products (name, rate) VALUES (?1, ?2)",
        params![name, rate],
    )
    .map_err(|e| LedgerError::from_constraint(e, "product"))?;

    let id = conn.last_insert_rowid();
    info!(product_id = id, name, rate, "product added");
    Ok(id)
}

/// Change a product's rate. Affects every bill computed afterwards,
/// including months already delivered.
pub fn update_product_rate(conn: &Connection, id: i64, rate: f64) -> Result<()> {
    validate_rate(rate)?;

    let changed = conn
        .execute("UPDATE products SET rate = ?1 WHERE id = ?2", params![rate, id])
        .map_err(|e| LedgerError::from_constraint(e, "product"))?;
    if changed == 0 {
        return Err(LedgerError::reference("product", id));
    }

    info!(product_id = id, rate, "product rate updated");
    Ok(())
}

/// Delete a product no ledger entry refers to
pub fn delete_product(conn: &Connection, id: i64) -> Result<()> {
    if !product_exists(conn, id)? {
        return Err(LedgerError::reference("product", id));
    }

    let references: i64 = conn.query_row(
        "SELECT COUNT(*) FROM daily_entries WHERE product_id = ?1",
        [id],
        |row| row.get(0),
    )?;
    if references > 0 {
        warn!(product_id = id, references, "refusing to delete referenced product");
        return Err(LedgerError::Reference {
            entity: "product",
            id: format!("{} (referenced by {} ledger rows)", id, references),
        });
    }

    conn.execute("DELETE FROM products WHERE id = ?1", [id])
        .map_err(|e| LedgerError::from_constraint(e, "product"))?;

    info!(product_id = id, "product deleted");
    Ok(())
}

pub fn get_product(conn: &Connection, id: i64) -> Result<Option<Product>> {
    let product = conn
        .query_row(
            "SELECT id, name, rate FROM products WHERE id = ?1",
            [id],
            product_from_row,
        )
        .optional()?;
    Ok(product)
}

pub fn find_product_by_name(conn: &Connection, name: &str) -> Result<Option<Product>> {
    let product = conn
        .query_row(
            "SELECT id, name, rate FROM products WHERE name = ?1",
            [name.trim()],
            product_from_row,
        )
        .optional()?;
    Ok(product)
}

pub fn list_products(conn: &Connection) -> Result<Vec<Product>> {
    let mut stmt = conn.prepare("SELECT id, name, rate FROM products ORDER BY id")?;

    let products = stmt
        .query_map([], product_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(products)
}

pub fn product_exists(conn: &Connection, id: i64) -> Result<bool> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM products WHERE id = ?1)",
        [id],
        |row| row.get(0),
    )?;
    Ok(exists)
}

pub fn count_products(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM products", [], |row| row.get(0))?;
    Ok(count)
}

// ============================================================================
// TESTS
// ============================================================================
