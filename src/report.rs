//! Presentation-side aggregates: breakdowns, insights, formatting and export

use crate::data::{SalesRecord, SalesTable};
use crate::error::DashboardError;
use crate::ingest::CANONICAL_COLUMNS;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::io::Write;

/// Per-product revenue breakdown
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductStats {
    pub product: String,
    pub total_revenue: f64,
    pub avg_price: f64,
    pub total_quantity: i64,
}

/// Keep rows whose product is in `products`; an empty selection keeps everything
pub fn filter_by_products(table: &SalesTable, products: &[String]) -> SalesTable {
    if products.is_empty() {
        return table.clone();
    }
    let wanted: HashSet<&str> = products.iter().map(String::as_str).collect();
    table.with_records(
        table
            .records
            .iter()
            .filter(|r| wanted.contains(r.product.as_str()))
            .cloned()
            .collect(),
    )
}

/// Keep rows whose region is in `regions`; an empty selection keeps everything.
///
/// Rows without a region never match a non-empty selection.
pub fn filter_by_regions(table: &SalesTable, regions: &[String]) -> SalesTable {
    if regions.is_empty() {
        return table.clone();
    }
    let wanted: HashSet<&str> = regions.iter().map(String::as_str).collect();
    table.with_records(
        table
            .records
            .iter()
            .filter(|r| r.region.as_deref().is_some_and(|region| wanted.contains(region)))
            .cloned()
            .collect(),
    )
}

/// Earliest and latest date in the table
pub fn date_bounds(records: &[SalesRecord]) -> Option<(NaiveDate, NaiveDate)> {
    let min = records.iter().map(|r| r.date).min()?;
    let max = records.iter().map(|r| r.date).max()?;
    Some((min, max))
}

/// Daily revenue from the first to the last date, with empty days as zero
pub fn daily_sales(records: &[SalesRecord]) -> Vec<(NaiveDate, f64)> {
    let Some((start, end)) = date_bounds(records) else {
        return Vec::new();
    };

    let mut by_day: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for record in records {
        *by_day.entry(record.date).or_insert(0.0) += record.total_sales;
    }

    start
        .iter_days()
        .take_while(|day| *day <= end)
        .map(|day| (day, by_day.get(&day).copied().unwrap_or(0.0)))
        .collect()
}

/// Revenue, mean price and quantity per product, best seller first
pub fn product_performance(records: &[SalesRecord]) -> Vec<ProductStats> {
    #[derive(Default)]
    struct Acc {
        revenue: f64,
        price_sum: f64,
        rows: usize,
        quantity: i64,
    }

    let mut groups: BTreeMap<&str, Acc> = BTreeMap::new();
    for record in records {
        let acc = groups.entry(record.product.as_str()).or_default();
        acc.revenue += record.total_sales;
        acc.price_sum += record.price;
        acc.rows += 1;
        acc.quantity += record.quantity;
    }

    let mut stats: Vec<ProductStats> = groups
        .into_iter()
        .map(|(product, acc)| ProductStats {
            product: product.to_string(),
            total_revenue: acc.revenue,
            avg_price: acc.price_sum / acc.rows as f64,
            total_quantity: acc.quantity,
        })
        .collect();

    // BTreeMap order breaks revenue ties by name
    stats.sort_by(|a, b| b.total_revenue.total_cmp(&a.total_revenue));
    stats
}

pub fn top_product(records: &[SalesRecord]) -> Option<String> {
    product_performance(records).into_iter().next().map(|s| s.product)
}

/// Region with the greatest revenue, ignoring rows without a region
pub fn top_region(records: &[SalesRecord]) -> Option<String> {
    let mut groups: BTreeMap<&str, f64> = BTreeMap::new();
    for record in records {
        if let Some(region) = record.region.as_deref() {
            *groups.entry(region).or_insert(0.0) += record.total_sales;
        }
    }
    groups
        .into_iter()
        .fold(None, |best: Option<(&str, f64)>, (region, revenue)| match best {
            Some((_, best_revenue)) if best_revenue >= revenue => best,
            _ => Some((region, revenue)),
        })
        .map(|(region, _)| region.to_string())
}

/// Numeric columns compared in the correlation matrix
pub const CORRELATION_COLUMNS: [&str; 3] = ["Quantity", "Price", "Total_Sales"];

/// Rows shown in the report's data sample
pub const DATA_SAMPLE_ROWS: usize = 200;

/// One value per row, grouped by product in name order.
///
/// Non-finite values are skipped; products left with no values are omitted.
pub fn values_by_product<F>(records: &[SalesRecord], value: F) -> Vec<(String, Vec<f64>)>
where
    F: Fn(&SalesRecord) -> f64,
{
    let mut groups: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for record in records {
        let v = value(record);
        if v.is_finite() {
            groups.entry(record.product.as_str()).or_default().push(v);
        }
    }
    groups
        .into_iter()
        .map(|(product, values)| (product.to_string(), values))
        .collect()
}

/// Pearson correlation of two equally long series.
///
/// `None` with fewer than two points or when either series is constant.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    let n = xs.len().min(ys.len());
    if n < 2 {
        return None;
    }
    let mean_x = xs[..n].iter().sum::<f64>() / n as f64;
    let mean_y = ys[..n].iter().sum::<f64>() / n as f64;

    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (x, y) in xs[..n].iter().zip(&ys[..n]) {
        let (dx, dy) = (x - mean_x, y - mean_y);
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }
    Some((cov / (var_x * var_y).sqrt()).clamp(-1.0, 1.0))
}

/// Pairwise correlations of [`CORRELATION_COLUMNS`], row-major
pub fn correlation_matrix(records: &[SalesRecord]) -> [[Option<f64>; 3]; 3] {
    let columns: [Vec<f64>; 3] = [
        records.iter().map(|r| r.quantity as f64).collect(),
        records.iter().map(|r| r.price).collect(),
        records.iter().map(|r| r.total_sales).collect(),
    ];

    let mut matrix = [[None; 3]; 3];
    for (i, row) in matrix.iter_mut().enumerate() {
        for (j, cell) in row.iter_mut().enumerate() {
            *cell = pearson(&columns[i], &columns[j]);
        }
    }
    matrix
}

/// The first `rows` records of the period, in stored order
pub fn data_sample(records: &[SalesRecord], rows: usize) -> &[SalesRecord] {
    &records[..rows.min(records.len())]
}

/// Format as a whole currency amount with thousands separators, e.g. `₹1,234,567`
pub fn format_currency(amount: f64, symbol: &str) -> String {
    if !amount.is_finite() {
        return format!("{}{}", symbol, amount);
    }
    let rounded = amount.round();
    let digits = format!("{}", rounded.abs() as u64);
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let sign = if rounded < 0.0 { "-" } else { "" };
    format!("{}{}{}", sign, symbol, grouped)
}

/// Render a percentage delta; undefined deltas render as `N/A`, never `0%`
pub fn format_change(change: Option<f64>) -> String {
    match change {
        Some(pct) => format!("{:.2}%", pct),
        None => "N/A".to_string(),
    }
}

#[derive(Serialize)]
struct ExportRow<'a> {
    #[serde(rename = "Date")]
    date: NaiveDate,
    #[serde(rename = "Region")]
    region: Option<&'a str>,
    #[serde(rename = "Product")]
    product: &'a str,
    #[serde(rename = "Category")]
    category: Option<&'a str>,
    #[serde(rename = "Quantity")]
    quantity: i64,
    #[serde(rename = "Price")]
    price: f64,
    #[serde(rename = "Customer_ID")]
    customer_id: Option<&'a str>,
    #[serde(rename = "Total_Sales")]
    total_sales: f64,
}

/// Write records as CSV with the canonical header (header only when empty)
pub fn export_csv<W: Write>(records: &[SalesRecord], writer: W) -> Result<(), DashboardError> {
    let mut wtr = csv::Writer::from_writer(writer);
    if records.is_empty() {
        wtr.write_record(CANONICAL_COLUMNS)?;
    }
    for r in records {
        wtr.serialize(ExportRow {
            date: r.date,
            region: r.region.as_deref(),
            product: &r.product,
            category: r.category.as_deref(),
            quantity: r.quantity,
            price: r.price,
            customer_id: r.customer_id.as_deref(),
            total_sales: r.total_sales,
        })?;
    }
    wtr.flush()?;
    Ok(())
}
