// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};
use std::env;

// Use library instead of local modules
use dairy_ledger::report::{bill_status_file_stem, billing_file_stem, ledger_file_stem};
use dairy_ledger::{
    add_product, bill_status_table, billing_table, calculate_billing, delete_customer,
    export_table, find_customer_by_name, find_product_by_name, format_currency, format_date,
    get_customer, get_product, grand_total, ledger_table, list_bills, list_customers,
    list_entries, list_products, parse_date, record_entry, record_payment, register_customer,
    save_bill_snapshots, telemetry, update_customer, update_product_rate, AppConfig,
    BillingMonth, Customer, CustomerDetails, Dashboard, EntryFilter, ExportFormat, LedgerError,
    NewEntry, Product, Store,
};

const USAGE: &str = "\
Usage: dairy-ledger <command> [args]

  init                                         create tables and seed products
  customer add <name> <contact> [--address A]
  customer list
  customer update <customer> [--name N] [--contact C] [--address A]
  customer delete <customer>
  product list
  product add <name> <rate>
  product rate <product> <rate>
  entry add <customer> <product> <quantity> [--date YYYY-MM-DD]
  entry list [--from D] [--to D] [--customer C]
  bill show <YYYY-MM>
  bill save <YYYY-MM>
  bill list [YYYY-MM]
  bill pay <bill-id> <amount>
  export billing <YYYY-MM> [--format csv|doc|both]
  export entries [--from D] [--to D] [--customer C] [--format csv|doc|both]
  export bills [YYYY-MM] [--format csv|doc|both]
  dashboard
  ui                                           terminal viewer (default)

<customer> and <product> accept an id or an exact name.";

fn main() -> Result<()> {
    let config = AppConfig::from_env().context("Failed to read DAIRY_* configuration")?;
    telemetry::init(&config.log_level);

    let args: Vec<String> = env::args().skip(1).collect();
    let command = args.first().map(String::as_str);

    if matches!(command, Some("help") | Some("--help") | Some("-h")) {
        println!("{}", USAGE);
        return Ok(());
    }

    let store = Store::new(&config.db_path);
    let seeded = store
        .initialize()
        .with_context(|| format!("Failed to open database at {}", config.db_path.display()))?;

    let rest = args.get(1..).unwrap_or(&[]);
    match command {
        None | Some("ui") => run_ui_mode(&store),
        Some("init") => run_init(&store, seeded),
        Some("customer") => run_customer(&store, rest),
        Some("product") => run_product(&store, rest),
        Some("entry") => run_entry(&store, rest),
        Some("bill") => run_bill(&store, rest),
        Some("export") => run_export(&store, &config, rest),
        Some("dashboard") => run_dashboard(&store),
        Some(other) => {
            eprintln!("{}", USAGE);
            bail!("unknown command '{}'", other)
        }
    }
}

// ============================================================================
// Argument helpers
// ============================================================================

/// Value following `--name`, if present
fn flag<'a>(args: &'a [String], name: &str) -> Option<&'a str> {
    args.iter()
        .position(|arg| arg == name)
        .and_then(|idx| args.get(idx + 1))
        .map(String::as_str)
}

/// Arguments that are neither flags nor flag values
fn positionals(args: &[String]) -> Vec<&str> {
    let mut out = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg.starts_with("--") {
            iter.next();
        } else {
            out.push(arg.as_str());
        }
    }
    out
}

fn required<'a>(values: &[&'a str], idx: usize, what: &str) -> Result<&'a str> {
    match values.get(idx) {
        Some(value) => Ok(*value),
        None => {
            eprintln!("{}", USAGE);
            bail!("missing <{}>", what)
        }
    }
}

fn parse_number(field: &str, text: &str) -> dairy_ledger::Result<f64> {
    text.trim()
        .parse::<f64>()
        .map_err(|_| LedgerError::validation(field, format!("'{}' is not a number", text)))
}

fn resolve_customer(conn: &rusqlite::Connection, key: &str) -> dairy_ledger::Result<Customer> {
    let found = match key.parse::<i64>() {
        Ok(id) => get_customer(conn, id)?,
        Err(_) => find_customer_by_name(conn, key)?,
    };
    found.ok_or_else(|| LedgerError::reference("customer", key))
}

fn resolve_product(conn: &rusqlite::Connection, key: &str) -> dairy_ledger::Result<Product> {
    let found = match key.parse::<i64>() {
        Ok(id) => get_product(conn, id)?,
        Err(_) => find_product_by_name(conn, key)?,
    };
    found.ok_or_else(|| LedgerError::reference("product", key))
}

/// `--from`, `--to` and `--customer` narrowing for entry listings
fn entry_filter(store: &Store, args: &[String]) -> Result<EntryFilter> {
    let mut filter = EntryFilter::all();
    if let Some(from) = flag(args, "--from") {
        filter.from = Some(parse_date(from)?);
    }
    if let Some(to) = flag(args, "--to") {
        filter.to = Some(parse_date(to)?);
    }
    if let Some(key) = flag(args, "--customer") {
        let customer = store.read(|conn| resolve_customer(conn, key))?;
        filter = filter.for_customer(customer.id);
    }
    Ok(filter)
}

fn export_formats(args: &[String]) -> Result<Vec<ExportFormat>> {
    let name = flag(args, "--format").unwrap_or("both");
    ExportFormat::parse(name)
        .with_context(|| format!("unknown export format '{}' (use csv, doc or both)", name))
}

// ============================================================================
// Commands
// ============================================================================

fn run_init(store: &Store, seeded: usize) -> Result<()> {
    println!("🥛 Dairy Ledger - Store Setup");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("✓ Database ready: {}", store.path().display());

    if seeded > 0 {
        println!("✓ Seeded {} default products", seeded);
    } else {
        println!("✓ Product catalog already present, nothing seeded");
    }

    let products = store.read(list_products)?;
    for product in products {
        println!("   {:>3}  {:<14} {:>8}", product.id, product.name, format_currency(product.rate));
    }
    Ok(())
}

fn run_customer(store: &Store, args: &[String]) -> Result<()> {
    let values = positionals(args);

    match values.first().copied() {
        Some("add") => {
            let name = required(&values, 1, "name")?;
            let contact = required(&values, 2, "contact")?;
            let details = CustomerDetails::new(name, flag(args, "--address"), contact);

            let id = store.transact(|conn| register_customer(conn, &details))?;
            println!("✓ Customer #{} registered: {}", id, name.trim());
        }
        Some("list") => {
            let customers = store.read(list_customers)?;
            println!("{:>4}  {:<24} {:<12} Address", "ID", "Name", "Contact");
            for c in &customers {
                println!(
                    "{:>4}  {:<24} {:<12} {}",
                    c.id,
                    c.name,
                    c.contact,
                    c.address.as_deref().unwrap_or("-")
                );
            }
            println!("\n{} customers", customers.len());
        }
        Some("update") => {
            let key = required(&values, 1, "customer")?;
            let id = store.transact(|conn| {
                let current = resolve_customer(conn, key)?;
                let details = CustomerDetails {
                    name: flag(args, "--name").unwrap_or(&current.name).to_string(),
                    address: flag(args, "--address")
                        .map(str::to_string)
                        .or(current.address),
                    contact: flag(args, "--contact").unwrap_or(&current.contact).to_string(),
                };
                update_customer(conn, current.id, &details)?;
                Ok(current.id)
            })?;
            println!("✓ Customer #{} updated", id);
        }
        Some("delete") => {
            let key = required(&values, 1, "customer")?;
            let customer = store.transact(|conn| {
                let customer = resolve_customer(conn, key)?;
                delete_customer(conn, customer.id)?;
                Ok(customer)
            })?;
            println!("✓ Customer #{} deleted: {}", customer.id, customer.name);
        }
        _ => {
            eprintln!("{}", USAGE);
            bail!("expected customer add|list|update|delete")
        }
    }
    Ok(())
}

fn run_product(store: &Store, args: &[String]) -> Result<()> {
    let values = positionals(args);

    match values.first().copied() {
        Some("list") => {
            let products = store.read(list_products)?;
            println!("{:>4}  {:<20} {:>10}", "ID", "Product", "Rate");
            for p in &products {
                println!("{:>4}  {:<20} {:>10}", p.id, p.name, format_currency(p.rate));
            }
        }
        Some("add") => {
            let name = required(&values, 1, "name")?;
            let rate = parse_number("rate", required(&values, 2, "rate")?)?;
            let id = store.transact(|conn| add_product(conn, name, rate))?;
            println!("✓ Product #{} added: {} at {}", id, name.trim(), format_currency(rate));
        }
        Some("rate") => {
            let key = required(&values, 1, "product")?;
            let rate = parse_number("rate", required(&values, 2, "rate")?)?;
            let product = store.transact(|conn| {
                let product = resolve_product(conn, key)?;
                update_product_rate(conn, product.id, rate)?;
                Ok(product)
            })?;
            println!(
                "✓ {} rate changed: {} -> {}",
                product.name,
                format_currency(product.rate),
                format_currency(rate)
            );
        }
        _ => {
            eprintln!("{}", USAGE);
            bail!("expected product list|add|rate")
        }
    }
    Ok(())
}

fn run_entry(store: &Store, args: &[String]) -> Result<()> {
    let values = positionals(args);

    match values.first().copied() {
        Some("add") => {
            let customer_key = required(&values, 1, "customer")?;
            let product_key = required(&values, 2, "product")?;
            let quantity = parse_number("quantity", required(&values, 3, "quantity")?)?;
            let entry_date = match flag(args, "--date") {
                Some(text) => parse_date(text)?,
                None => Local::now().date_naive(),
            };

            let (id, customer, product) = store.transact(|conn| {
                let customer = resolve_customer(conn, customer_key)?;
                let product = resolve_product(conn, product_key)?;
                let id = record_entry(
                    conn,
                    &NewEntry {
                        customer_id: customer.id,
                        product_id: product.id,
                        entry_date,
                        quantity,
                    },
                )?;
                Ok((id, customer, product))
            })?;
            println!(
                "✓ Entry #{} recorded: {} x {} for {} on {}",
                id,
                quantity,
                product.name,
                customer.name,
                format_date(entry_date)
            );
        }
        Some("list") => {
            let filter = entry_filter(store, args)?;
            let entries = store.read(|conn| list_entries(conn, &filter))?;

            println!("{:<12} {:<24} {:<14} {:>8} {:>10}", "Date", "Customer", "Product", "Qty", "Amount");
            for e in &entries {
                println!(
                    "{:<12} {:<24} {:<14} {:>8} {:>10}",
                    format_date(e.entry_date),
                    e.customer_name,
                    e.product_name,
                    e.quantity,
                    format_currency(e.amount())
                );
            }
            println!("\n{} entries", entries.len());
        }
        _ => {
            eprintln!("{}", USAGE);
            bail!("expected entry add|list")
        }
    }
    Ok(())
}

fn run_bill(store: &Store, args: &[String]) -> Result<()> {
    let values = positionals(args);

    match values.first().copied() {
        Some("show") => {
            let month = required(&values, 1, "YYYY-MM")?;
            let bills = store.read(|conn| calculate_billing(conn, month))?;

            println!("📋 Billing Summary for {}", month);
            println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
            if bills.is_empty() {
                println!("No entries recorded in {}", month);
                return Ok(());
            }
            for bill in &bills {
                println!(
                    "{:<28} {:>4} entries {:>12}",
                    bill.customer_name,
                    bill.entry_count,
                    format_currency(bill.total)
                );
            }
            println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
            println!("{:<42} {:>12}", "Total", format_currency(grand_total(&bills)));
        }
        Some("save") => {
            let month = required(&values, 1, "YYYY-MM")?;
            let saved = store.transact(|conn| save_bill_snapshots(conn, month))?;
            println!("✓ Saved {} bills for {}", saved.len(), month);
        }
        Some("list") => {
            let month = values.get(1).map(|m| BillingMonth::parse(m)).transpose()?;
            let bills = store.read(|conn| list_bills(conn, month.as_ref()))?;

            println!("{:>4}  {:<8} {:<24} {:>10} {:>10} {:>10}", "ID", "Month", "Customer", "Total", "Paid", "Due");
            for view in &bills {
                let bill = &view.bill;
                println!(
                    "{:>4}  {:<8} {:<24} {:>10} {:>10} {:>10}",
                    bill.id,
                    bill.month,
                    view.customer_name,
                    format_currency(bill.total),
                    format_currency(bill.paid),
                    format_currency(bill.due())
                );
            }
        }
        Some("pay") => {
            let bill_id: i64 = required(&values, 1, "bill-id")?
                .parse()
                .context("bill id must be an integer")?;
            let paid = parse_number("paid", required(&values, 2, "amount")?)?;

            let bill = store.transact(|conn| record_payment(conn, bill_id, paid))?;
            println!(
                "✓ Bill #{} paid {} of {} (due {})",
                bill.id,
                format_currency(bill.paid),
                format_currency(bill.total),
                format_currency(bill.due())
            );
        }
        _ => {
            eprintln!("{}", USAGE);
            bail!("expected bill show|save|list|pay")
        }
    }
    Ok(())
}

fn run_export(store: &Store, config: &AppConfig, args: &[String]) -> Result<()> {
    let values = positionals(args);
    let formats = export_formats(args)?;

    let (table, stem) = match values.first().copied() {
        Some("billing") => {
            let month = BillingMonth::parse(required(&values, 1, "YYYY-MM")?)?;
            let bills = store.read(|conn| calculate_billing(conn, &month.to_string()))?;
            (billing_table(&month, &bills), billing_file_stem(&month))
        }
        Some("entries") => {
            let filter = entry_filter(store, args)?;
            let entries = store.read(|conn| list_entries(conn, &filter))?;
            (ledger_table(&entries), ledger_file_stem())
        }
        Some("bills") => {
            let month = values.get(1).map(|m| BillingMonth::parse(m)).transpose()?;
            let bills = store.read(|conn| list_bills(conn, month.as_ref()))?;
            (
                bill_status_table(month.as_ref(), &bills),
                bill_status_file_stem(month.as_ref()),
            )
        }
        _ => {
            eprintln!("{}", USAGE);
            bail!("expected export billing|entries|bills")
        }
    };

    let written = export_table(&table, &config.export_dir, &stem, &formats)
        .with_context(|| format!("Failed to export into {}", config.export_dir.display()))?;

    println!("✓ Exported {} rows", table.len());
    for path in written {
        println!("   {}", path.display());
    }
    Ok(())
}

fn run_dashboard(store: &Store) -> Result<()> {
    let today: NaiveDate = Local::now().date_naive();
    let dashboard = store.read(|conn| Dashboard::collect(conn, today))?;

    println!("🥛 Dairy Ledger - {}", format_date(dashboard.today));
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Customers:          {}", dashboard.total_customers);
    println!("Entries today:      {}", dashboard.entries_today);
    println!("Outstanding amount: {}", format_currency(dashboard.outstanding));
    Ok(())
}

#[cfg(feature = "tui")]
fn run_ui_mode(store: &Store) -> Result<()> {
    let today = Local::now().date_naive();
    let mut app = ui::App::new(store.clone(), today).context("Failed to load ledger data")?;

    println!("Starting UI... (Press 'q' to quit)\n");
    ui::run_ui(&mut app)?;

    println!("\n✅ UI closed successfully");
    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_store: &Store) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or run a command, e.g.: dairy-ledger dashboard");
    std::process::exit(1);
}
