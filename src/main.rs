//! Sales Dashboard CLI: seeds the record store and prints KPI / segmentation reports
//!
//! This is the main entrypoint that wires configuration, storage, analytics
//! and chart output together.

use anyhow::{Context, Result};
use clap::Parser;
use sales_dashboard::cli::{parse_rfm_values, Command, ReportArgs};
use sales_dashboard::report::{
    data_sample, date_bounds, export_csv, filter_by_products, filter_by_regions, format_change,
    format_currency, product_performance, top_product, top_region,
};
use sales_dashboard::{
    filter_by_date, period_compare, rfm_segmentation, seed_from_csv, viz, AppConfig, Args,
    SalesStore,
};
use std::fs::File;
use tracing::info;

const CURRENCY: &str = "₹";

fn main() -> Result<()> {
    let args = Args::parse();

    let config = AppConfig::load()?.with_overrides(args.db.clone(), args.verbose);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("sales_dashboard={}", config.log_level).into()),
        )
        .init();

    info!(db = %config.db_path.display(), "opening sales store");
    let mut store = SalesStore::open(&config.db_path)
        .with_context(|| format!("failed to open {}", config.db_path.display()))?;

    match args.command {
        Command::Seed { csv } => {
            let rows = seed_from_csv(&csv, &mut store)?;
            println!("Seeded {} rows into {}", rows, config.db_path.display());
        }
        Command::Report(report) => run_report(&store, &report, config.clusters)?,
        Command::Segment { predict, clusters } => {
            run_prediction(&store, &predict, clusters.unwrap_or(config.clusters))?
        }
    }

    Ok(())
}

/// Print KPI cards, insights and customer segments for the requested window
fn run_report(store: &SalesStore, args: &ReportArgs, default_clusters: usize) -> Result<()> {
    let table = store.load_all()?;
    let Some((min_date, max_date)) = date_bounds(&table.records) else {
        println!("No data found in the store. Run `sales-dashboard seed --csv <file>` first.");
        return Ok(());
    };

    let start = args.start.unwrap_or(min_date);
    let end = args.end.unwrap_or(max_date);

    let filtered = filter_by_regions(&filter_by_products(&table, &args.products), &args.regions);
    let period = filter_by_date(&filtered, start, end);

    // === KPIs ===
    let comparison = period_compare(&filtered, start, end);
    let cur = &comparison.current;
    let changes = &comparison.changes_pct;

    println!("=== KPIs: {} to {} ===", start, end);
    println!(
        "  (compared with {} to {})",
        comparison.previous_window.start, comparison.previous_window.end
    );
    println!(
        "Total Revenue:       {:>14}  ({})",
        format_currency(cur.total_revenue, CURRENCY),
        format_change(changes.revenue)
    );
    println!(
        "Total Orders:        {:>14}  ({})",
        cur.total_orders,
        format_change(changes.orders)
    );
    println!(
        "Avg Revenue / Order: {:>14}  ({})",
        format_currency(cur.avg_order, CURRENCY),
        format_change(changes.avg_order)
    );
    println!("Unique Customers:    {:>14}", cur.unique_customers.to_string());

    // === Insights ===
    println!("\n=== Business Insights ===");
    let products = product_performance(&period.records);
    match top_product(&period.records) {
        Some(product) => println!("Top Product: {}", product),
        None => println!("Top Product: N/A"),
    }
    if let Some(region) = top_region(&period.records) {
        println!("Top Region:  {}", region);
    }
    for stat in &products {
        println!(
            "  {:<20} revenue {:>12}  avg price {:>10.2}  qty {}",
            stat.product,
            format_currency(stat.total_revenue, CURRENCY),
            stat.avg_price,
            stat.total_quantity
        );
    }

    // === Segmentation ===
    println!("\n=== Customer Segmentation (RFM) ===");
    let clusters = args.clusters.unwrap_or(default_clusters);
    let segmentation = rfm_segmentation(&period.records, clusters)?;

    if let Some(model) = segmentation.model.as_ref() {
        let mut top = segmentation.customers.clone();
        top.sort_by(|a, b| b.monetary.total_cmp(&a.monetary));

        println!("  Customer   | Recency | Frequency | Monetary      | Cluster");
        println!("  -----------|---------|-----------|---------------|--------");
        for c in top.iter().take(20) {
            println!(
                "  {:<10} | {:7} | {:9} | {:>13} | {:7}",
                c.customer_id,
                c.recency,
                c.frequency,
                format_currency(c.monetary, CURRENCY),
                c.cluster
            );
        }

        let total = segmentation.customers.len();
        println!();
        for (i, &size) in model.cluster_sizes().iter().enumerate() {
            let percentage = (size as f64 / total as f64) * 100.0;
            println!("Cluster {}: {} customers ({:.1}%)", i, size, percentage);
        }
    } else {
        println!("Not enough customer data for segmentation (requires Customer_ID).");
    }

    // === Data sample ===
    let sample = data_sample(&period.records, args.sample_rows);
    if !sample.is_empty() {
        println!(
            "\n=== Data Table (sample: {} of {} rows) ===",
            sample.len(),
            period.len()
        );
        println!(
            "  {:<10} | {:<10} | {:<16} | {:>8} | {:>10} | {:<10} | {:>12}",
            "Date", "Region", "Product", "Quantity", "Price", "Customer", "Total_Sales"
        );
        for r in sample {
            println!(
                "  {:<10} | {:<10} | {:<16} | {:>8} | {:>10.2} | {:<10} | {:>12.2}",
                r.date,
                r.region.as_deref().unwrap_or("-"),
                r.product,
                r.quantity,
                r.price,
                r.customer_id.as_deref().unwrap_or("-"),
                r.total_sales
            );
        }
    }

    // === Outputs ===
    if let Some(dir) = args.charts_dir.as_deref() {
        let written = viz::generate_chart_report(dir, &period.records, &segmentation)?;
        for path in written {
            println!("Chart saved to: {}", path.display());
        }
    }

    if let Some(path) = args.export.as_deref() {
        let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
        export_csv(&period.records, file)?;
        println!("Filtered rows saved to: {}", path.display());
    }

    Ok(())
}

/// Fit segments on the whole store and predict the cluster of one RFM vector
fn run_prediction(store: &SalesStore, predict: &str, clusters: usize) -> Result<()> {
    let rfm_values = parse_rfm_values(predict)?;
    println!(
        "Input RFM values: R={}, F={}, M={}",
        rfm_values[0], rfm_values[1], rfm_values[2]
    );

    let table = store.load_all()?;
    let segmentation = rfm_segmentation(&table.records, clusters)?;
    let Some(model) = segmentation.model.as_ref() else {
        anyhow::bail!("No customer data in the store to fit segments on");
    };

    let cluster = model.predict(&rfm_values)?;
    let cluster_sizes = model.cluster_sizes();
    let total = segmentation.customers.len();

    println!("\nPredicted Cluster: {}", cluster);
    println!(
        "  Size: {} customers ({:.1}% of total)",
        cluster_sizes[cluster],
        cluster_sizes[cluster] as f64 / total as f64 * 100.0
    );
    println!(
        "  Centroid: R={:.2}, F={:.2}, M={:.2}",
        model.centroids[[cluster, 0]],
        model.centroids[[cluster, 1]],
        model.centroids[[cluster, 2]]
    );

    Ok(())
}
