//! Integration tests for the sales dashboard

use chrono::NaiveDate;
use sales_dashboard::report::{filter_by_products, filter_by_regions, top_region};
use sales_dashboard::{
    filter_by_date, kpis_for_period, period_compare, rfm_segmentation, seed_from_csv, SalesStore,
    UniqueCustomers,
};
use std::io::Write;
use tempfile::{tempdir, NamedTempFile};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Create a test CSV file with sample data, using synonym headers
fn create_test_csv() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "Order Date,Item,Qty,Unit Price,Customer,Area,Revenue").unwrap();

    // January: two customers plus a walk-in sale
    writeln!(file, "2024-01-01,Phone,1,100,C001,East,100").unwrap();
    writeln!(file, "2024-01-02,Phone,2,150,C002,West,300").unwrap();
    writeln!(file, "2024-01-02 17:45:00,Cable,5,4,,West,").unwrap();

    // February: repeat buyers and one big order
    writeln!(file, "2024-02-01,Laptop,1,1200,C001,East,1200").unwrap();
    writeln!(file, "2024-02-03,Phone,1,150,C002,West,150").unwrap();
    writeln!(file, "2024-02-03,Phone,1,150,C003,North,150").unwrap();
    writeln!(file, "2024-02-04,Cable,2,4,C004,North,8").unwrap();

    // Unusable row: no date
    writeln!(file, ",Phone,1,100,C009,East,100").unwrap();

    file
}

fn seeded_store() -> (tempfile::TempDir, SalesStore) {
    let dir = tempdir().unwrap();
    let csv = create_test_csv();
    let mut store = SalesStore::open(dir.path().join("data").join("sales.db")).unwrap();
    let rows = seed_from_csv(csv.path(), &mut store).unwrap();
    assert_eq!(rows, 7);
    (dir, store)
}

#[test]
fn test_seed_then_kpis() {
    let (_dir, store) = seeded_store();
    let table = store.load_all().unwrap();

    assert!(table.has_customer_column);
    assert_eq!(table.len(), 7);

    let january = filter_by_date(&table, date(2024, 1, 1), date(2024, 1, 31));
    let kpis = kpis_for_period(&january);
    // derived total for the walk-in row: 5 * 4
    assert_eq!(kpis.total_revenue, 420.0);
    assert_eq!(kpis.total_orders, 3);
    assert_eq!(kpis.avg_order, 140.0);
    assert_eq!(kpis.unique_customers, UniqueCustomers::Count(2));
}

#[test]
fn test_period_comparison_against_previous_window() {
    let (_dir, store) = seeded_store();
    let table = store.load_all().unwrap();

    // 2024-02-01..=2024-02-04 vs 2024-01-28..=2024-01-31 (empty)
    let comparison = period_compare(&table, date(2024, 2, 1), date(2024, 2, 4));
    assert_eq!(comparison.previous_window.start, date(2024, 1, 28));
    assert_eq!(comparison.previous_window.end, date(2024, 1, 31));
    assert_eq!(comparison.current.total_revenue, 1508.0);
    assert_eq!(comparison.previous.total_orders, 0);
    assert_eq!(comparison.changes_pct.revenue, None);

    // 2024-01-02 vs 2024-01-01
    let comparison = period_compare(&table, date(2024, 1, 2), date(2024, 1, 2));
    assert_eq!(comparison.current.total_revenue, 320.0);
    assert_eq!(comparison.previous.total_revenue, 100.0);
    assert_eq!(comparison.changes_pct.revenue, Some(220.0));
    assert_eq!(comparison.changes_pct.orders, Some(100.0));
}

#[test]
fn test_segmentation_over_store() {
    let (_dir, store) = seeded_store();
    let table = store.load_all().unwrap();

    let segmentation = rfm_segmentation(&table.records, 3).unwrap();
    let ids: Vec<&str> = segmentation
        .customers
        .iter()
        .map(|c| c.customer_id.as_str())
        .collect();
    assert_eq!(ids, vec!["C001", "C002", "C003", "C004"]);

    let c001 = &segmentation.customers[0];
    assert_eq!(c001.recency, 3);
    assert_eq!(c001.frequency, 2);
    assert_eq!(c001.monetary, 1300.0);

    let model = segmentation.model.as_ref().unwrap();
    assert_eq!(model.cluster_sizes().iter().sum::<usize>(), 4);

    let again = rfm_segmentation(&table.records, 3).unwrap();
    assert_eq!(again.customers, segmentation.customers);
}

#[test]
fn test_filters_compose_with_windowing() {
    let (_dir, store) = seeded_store();
    let table = store.load_all().unwrap();

    let phones_west = filter_by_regions(
        &filter_by_products(&table, &["Phone".to_string()]),
        &["West".to_string()],
    );
    assert_eq!(phones_west.len(), 2);

    let february = filter_by_date(&table, date(2024, 2, 1), date(2024, 2, 29));
    assert_eq!(top_region(&february.records).as_deref(), Some("East"));

    // walk-in only window: no customers, so no segments
    let walk_in = filter_by_products(&table, &["Cable".to_string()]);
    let walk_in_jan = filter_by_date(&walk_in, date(2024, 1, 1), date(2024, 1, 31));
    assert_eq!(walk_in_jan.len(), 1);
    assert!(rfm_segmentation(&walk_in_jan.records, 3).unwrap().is_empty());
}

#[test]
fn test_dataset_without_customer_column() {
    let dir = tempdir().unwrap();
    let mut csv = NamedTempFile::new().unwrap();
    writeln!(csv, "date,product,quantity,price").unwrap();
    writeln!(csv, "2024-03-01,Phone,1,100").unwrap();
    writeln!(csv, "2024-03-02,Phone,1,100").unwrap();

    let mut store = SalesStore::open(dir.path().join("sales.db")).unwrap();
    seed_from_csv(csv.path(), &mut store).unwrap();
    let table = store.load_all().unwrap();

    assert!(!table.has_customer_column);
    let kpis = kpis_for_period(&table);
    assert_eq!(kpis.unique_customers, UniqueCustomers::NotApplicable);
    assert_eq!(kpis.total_revenue, 200.0);
    assert!(rfm_segmentation(&table.records, 3).unwrap().is_empty());
}

#[test]
fn test_comparison_from_earliest_representable_date() {
    let (_dir, store) = seeded_store();
    let table = store.load_all().unwrap();

    let comparison = period_compare(&table, NaiveDate::MIN, date(2024, 12, 31));
    assert_eq!(comparison.current.total_orders, 7);
    assert_eq!(comparison.previous.total_orders, 0);
    assert_eq!(comparison.changes_pct.revenue, None);
    assert_eq!(comparison.changes_pct.orders, None);
    assert_eq!(comparison.changes_pct.avg_order, None);
}
