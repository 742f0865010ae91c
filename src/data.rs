//! Sales records and per-customer RFM feature computation

use chrono::NaiveDate;
use ndarray::Array2;
use serde::Serialize;
use std::collections::BTreeMap;

/// One transaction line, immutable after ingestion
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SalesRecord {
    pub date: NaiveDate,
    pub product: String,
    pub category: Option<String>,
    pub quantity: i64,
    pub price: f64,
    /// Absent for anonymous / walk-in sales
    pub customer_id: Option<String>,
    pub region: Option<String>,
    pub total_sales: f64,
}

impl SalesRecord {
    /// Create a record whose `total_sales` is `quantity * price`
    pub fn new(date: NaiveDate, product: impl Into<String>, quantity: i64, price: f64) -> Self {
        Self {
            date,
            product: product.into(),
            category: None,
            quantity,
            price,
            customer_id: None,
            region: None,
            total_sales: quantity as f64 * price,
        }
    }

    pub fn with_customer(mut self, customer_id: impl Into<String>) -> Self {
        self.customer_id = Some(customer_id.into());
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Override the derived total with an independently supplied one
    pub fn with_total_sales(mut self, total_sales: f64) -> Self {
        self.total_sales = total_sales;
        self
    }
}

/// An in-memory snapshot of sales records.
///
/// `has_customer_column` tells whether the source data carried a customer
/// identifier at all. A dataset without one reports unique customers as
/// "not applicable" rather than zero.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SalesTable {
    pub records: Vec<SalesRecord>,
    pub has_customer_column: bool,
}

impl SalesTable {
    pub fn new(records: Vec<SalesRecord>, has_customer_column: bool) -> Self {
        Self {
            records,
            has_customer_column,
        }
    }

    /// New table over `records` sharing this table's schema
    pub fn with_records(&self, records: Vec<SalesRecord>) -> Self {
        Self {
            records,
            has_customer_column: self.has_customer_column,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// RFM row for one customer, with the segment label assigned by clustering
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerRfm {
    pub customer_id: String,
    /// Days between the customer's latest purchase and the reference date
    pub recency: i64,
    pub frequency: usize,
    pub monetary: f64,
    pub cluster: usize,
}

/// Raw RFM feature matrix, one row per customer
#[derive(Debug, Clone)]
pub struct RfmData {
    /// Unscaled features (n_customers, 3): recency, frequency, monetary
    pub features: Array2<f64>,
    /// Customer IDs corresponding to each row, in ascending order
    pub customer_ids: Vec<String>,
    /// Latest transaction date among the customer records
    pub reference_date: NaiveDate,
}

impl RfmData {
    pub fn n_customers(&self) -> usize {
        self.customer_ids.len()
    }
}

#[derive(Debug)]
struct RfmAccumulator {
    last_purchase: NaiveDate,
    frequency: usize,
    monetary: f64,
}

/// Compute RFM features from transaction records
///
/// Records without a customer id are dropped before anything else, so they
/// neither produce a row nor move the reference date. Returns `None` when no
/// identified customer remains.
pub fn compute_rfm(records: &[SalesRecord]) -> Option<RfmData> {
    let mut groups: BTreeMap<&str, RfmAccumulator> = BTreeMap::new();

    for record in records {
        let Some(customer_id) = record.customer_id.as_deref() else {
            continue;
        };
        groups
            .entry(customer_id)
            .and_modify(|acc| {
                acc.last_purchase = acc.last_purchase.max(record.date);
                acc.frequency += 1;
                acc.monetary += record.total_sales;
            })
            .or_insert(RfmAccumulator {
                last_purchase: record.date,
                frequency: 1,
                monetary: record.total_sales,
            });
    }

    let reference_date = groups.values().map(|acc| acc.last_purchase).max()?;

    let mut customer_ids = Vec::with_capacity(groups.len());
    let mut raw_data = Vec::with_capacity(groups.len() * 3);
    for (customer_id, acc) in &groups {
        let recency = (reference_date - acc.last_purchase).num_days();
        customer_ids.push(customer_id.to_string());
        raw_data.extend_from_slice(&[recency as f64, acc.frequency as f64, acc.monetary]);
    }

    let features = Array2::from_shape_vec((customer_ids.len(), 3), raw_data).ok()?;

    Some(RfmData {
        features,
        customer_ids,
        reference_date,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn create_test_records() -> Vec<SalesRecord> {
        vec![
            SalesRecord::new(date(2024, 1, 1), "Phone", 1, 100.0).with_customer("C001"),
            SalesRecord::new(date(2024, 1, 5), "Laptop", 1, 900.0).with_customer("C001"),
            SalesRecord::new(date(2024, 1, 3), "Phone", 2, 150.0).with_customer("C002"),
            SalesRecord::new(date(2024, 1, 10), "Cable", 4, 5.0).with_customer("C003"),
        ]
    }

    #[test]
    fn test_compute_rfm() {
        let rfm = compute_rfm(&create_test_records()).unwrap();

        assert_eq!(rfm.customer_ids, vec!["C001", "C002", "C003"]);
        assert_eq!(rfm.features.shape(), &[3, 3]);
        assert_eq!(rfm.reference_date, date(2024, 1, 10));

        // C001: last purchase 01-05, two orders, 1000 spent
        assert_eq!(rfm.features.row(0).to_vec(), vec![5.0, 2.0, 1000.0]);
        assert_eq!(rfm.features.row(1).to_vec(), vec![7.0, 1.0, 300.0]);
        assert_eq!(rfm.features.row(2).to_vec(), vec![0.0, 1.0, 20.0]);
    }

    #[test]
    fn test_anonymous_rows_do_not_affect_customers() {
        let mut records = create_test_records();
        let baseline = compute_rfm(&records).unwrap();

        records.push(SalesRecord::new(date(2024, 2, 1), "Phone", 10, 100.0));
        let with_anonymous = compute_rfm(&records).unwrap();

        assert_eq!(with_anonymous.customer_ids, baseline.customer_ids);
        assert_eq!(with_anonymous.features, baseline.features);
        assert_eq!(with_anonymous.reference_date, baseline.reference_date);
    }

    #[test]
    fn test_no_customers() {
        let records = vec![SalesRecord::new(date(2024, 1, 1), "Phone", 1, 100.0)];
        assert!(compute_rfm(&records).is_none());
        assert!(compute_rfm(&[]).is_none());
    }

    #[test]
    fn test_record_builders() {
        let record = SalesRecord::new(date(2024, 1, 1), "Phone", 2, 150.0)
            .with_region("West")
            .with_category("Electronics");
        assert_eq!(record.total_sales, 300.0);
        assert_eq!(record.region.as_deref(), Some("West"));

        let record = record.with_total_sales(280.0);
        assert_eq!(record.total_sales, 280.0);
    }
}
