//! CSV ingestion: column-name normalisation, type coercion and total derivation

use crate::data::{SalesRecord, SalesTable};
use crate::error::DashboardError;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

/// Canonical column names, in export order
pub const CANONICAL_COLUMNS: [&str; 8] = [
    "Date",
    "Region",
    "Product",
    "Category",
    "Quantity",
    "Price",
    "Customer_ID",
    "Total_Sales",
];

/// Map a normalised header key to its canonical column
fn canonical_column(key: &str) -> Option<&'static str> {
    let column = match key {
        "date" | "order_date" | "orderdate" => "Date",
        "product" | "products" | "item" => "Product",
        "category" => "Category",
        "quantity" | "qty" | "count" => "Quantity",
        "price" | "unit_price" | "amount" => "Price",
        "customer_id" | "customer" | "cust_id" => "Customer_ID",
        "region" | "area" => "Region",
        "total_sales" | "total" | "revenue" => "Total_Sales",
        _ => return None,
    };
    Some(column)
}

/// Normalise a raw CSV header to its canonical name.
///
/// Unknown headers are returned trimmed but otherwise unchanged.
pub fn normalise_header(raw: &str) -> String {
    let cleaned = raw.trim().replace('\u{feff}', "");
    let key = cleaned.trim().replace(' ', "_").to_lowercase();
    canonical_column(&key)
        .map(str::to_string)
        .unwrap_or_else(|| cleaned.trim().to_string())
}

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%Y/%m/%d"];
const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// Parse a date or timestamp, discarding the time of day
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
                .map(|dt| dt.date())
        })
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
}

fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Read sales rows from any CSV source
///
/// Rows lacking a date, product or total are dropped. `Total_Sales` falls back
/// to `Quantity * Price` when the column or the cell is missing.
pub fn read_sales_csv<R: Read>(reader: R) -> Result<SalesTable, DashboardError> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut columns: HashMap<String, usize> = HashMap::new();
    for (idx, header) in rdr.headers()?.iter().enumerate() {
        columns.entry(normalise_header(header)).or_insert(idx);
    }

    for required in ["Date", "Product"] {
        if !columns.contains_key(required) {
            return Err(DashboardError::MissingColumn(required));
        }
    }
    let has_customer_column = columns.contains_key("Customer_ID");

    let mut records = Vec::new();
    let mut dropped = 0usize;

    for row in rdr.records() {
        let row = row?;
        let cell = |column: &str| {
            columns
                .get(column)
                .and_then(|&idx| row.get(idx))
                .map(str::trim)
                .filter(|value| !value.is_empty())
        };

        let date = cell("Date").and_then(parse_date);
        let product = cell("Product").map(str::to_string);
        let quantity = cell("Quantity").and_then(parse_number);
        let price = cell("Price").and_then(parse_number);
        let total_sales = cell("Total_Sales").and_then(parse_number).or(match (quantity, price) {
            (Some(q), Some(p)) => Some(q * p),
            _ => None,
        });

        let (Some(date), Some(product), Some(total_sales)) = (date, product, total_sales) else {
            dropped += 1;
            continue;
        };

        records.push(SalesRecord {
            date,
            product,
            category: cell("Category").map(str::to_string),
            quantity: quantity.map(|q| q.round() as i64).unwrap_or(0),
            price: price.unwrap_or(0.0),
            customer_id: cell("Customer_ID").map(str::to_string),
            region: cell("Region").map(str::to_string),
            total_sales,
        });
    }

    if dropped > 0 {
        warn!(dropped, "dropped rows missing date, product or total");
    }

    records.sort_by_key(|record| record.date);

    Ok(SalesTable::new(records, has_customer_column))
}

/// Load a sales CSV from disk
pub fn load_sales_csv(path: &Path) -> Result<SalesTable, DashboardError> {
    if !path.exists() {
        return Err(DashboardError::NotFound(path.to_path_buf()));
    }
    let table = read_sales_csv(File::open(path)?)?;
    info!(rows = table.len(), path = %path.display(), "loaded sales CSV");
    Ok(table)
}
