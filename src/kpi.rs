//! Period KPIs, date-window filtering and period-over-period comparison

use crate::data::SalesTable;
use chrono::{Duration, NaiveDate};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use tracing::debug;

/// Distinct customer count, or "not applicable" when the dataset has no
/// customer identifier column at all
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UniqueCustomers {
    Count(usize),
    NotApplicable,
}

impl fmt::Display for UniqueCustomers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UniqueCustomers::Count(n) => write!(f, "{}", n),
            UniqueCustomers::NotApplicable => write!(f, "N/A"),
        }
    }
}

/// Aggregate metrics over a set of records
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiSet {
    pub total_revenue: f64,
    pub total_orders: usize,
    /// Zero when there are no orders
    pub avg_order: f64,
    pub unique_customers: UniqueCustomers,
}

/// Percentage deltas of current over previous; `None` when the previous
/// value is exactly zero
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeSet {
    pub revenue: Option<f64>,
    pub orders: Option<f64>,
    pub avg_order: Option<f64>,
}

/// Inclusive calendar-date window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Inclusive length in days; zero or negative for an inverted window
    pub fn length_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodComparison {
    pub current_window: DateWindow,
    pub previous_window: DateWindow,
    pub current: KpiSet,
    pub previous: KpiSet,
    pub changes_pct: ChangeSet,
}

/// Keep the records whose date falls within `[start_date, end_date]`.
///
/// Both bounds are inclusive. An inverted window yields an empty table.
pub fn filter_by_date(table: &SalesTable, start_date: NaiveDate, end_date: NaiveDate) -> SalesTable {
    let window = DateWindow::new(start_date, end_date);
    let records = table
        .records
        .iter()
        .filter(|record| window.contains(record.date))
        .cloned()
        .collect();
    table.with_records(records)
}

/// Compute KPIs over a (possibly empty) table
pub fn kpis_for_period(table: &SalesTable) -> KpiSet {
    let total_revenue: f64 = table.records.iter().map(|r| r.total_sales).sum();
    let total_orders = table.records.len();
    let avg_order = if total_orders > 0 {
        total_revenue / total_orders as f64
    } else {
        0.0
    };

    let unique_customers = if table.has_customer_column {
        let distinct: HashSet<&str> = table
            .records
            .iter()
            .filter_map(|r| r.customer_id.as_deref())
            .collect();
        UniqueCustomers::Count(distinct.len())
    } else {
        UniqueCustomers::NotApplicable
    };

    KpiSet {
        total_revenue,
        total_orders,
        avg_order,
        unique_customers,
    }
}

/// The window of identical length ending the day before `start_date`.
///
/// When that window falls outside the representable calendar, an inverted
/// (empty) window is returned so every delta comes out undefined.
pub fn previous_window(start_date: NaiveDate, end_date: NaiveDate) -> DateWindow {
    let length = DateWindow::new(start_date, end_date).length_days();
    let window = start_date
        .checked_sub_signed(Duration::days(1))
        .and_then(|prev_end| {
            prev_end
                .checked_sub_signed(Duration::days(length - 1))
                .map(|prev_start| DateWindow::new(prev_start, prev_end))
        });

    window.unwrap_or_else(|| {
        debug!(%start_date, %end_date, "previous window out of calendar range");
        DateWindow::new(NaiveDate::MAX, NaiveDate::MIN)
    })
}

/// `(current - previous) / previous * 100`, undefined on a zero baseline
pub fn pct_change(current: f64, previous: f64) -> Option<f64> {
    if previous == 0.0 {
        None
    } else {
        Some((current - previous) / previous * 100.0)
    }
}

/// Compare `[start_date, end_date]` against the immediately preceding window
/// of equal length
pub fn period_compare(table: &SalesTable, start_date: NaiveDate, end_date: NaiveDate) -> PeriodComparison {
    let current_window = DateWindow::new(start_date, end_date);
    let previous_window = previous_window(start_date, end_date);

    let current = kpis_for_period(&filter_by_date(table, current_window.start, current_window.end));
    let previous = kpis_for_period(&filter_by_date(
        table,
        previous_window.start,
        previous_window.end,
    ));

    debug!(
        current = ?current_window,
        previous = ?previous_window,
        current_orders = current.total_orders,
        previous_orders = previous.total_orders,
        "computed period comparison"
    );

    let changes_pct = ChangeSet {
        revenue: pct_change(current.total_revenue, previous.total_revenue),
        orders: pct_change(current.total_orders as f64, previous.total_orders as f64),
        avg_order: pct_change(current.avg_order, previous.avg_order),
    };

    PeriodComparison {
        current_window,
        previous_window,
        current,
        previous,
        changes_pct,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SalesRecord;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn example_table() -> SalesTable {
        SalesTable::new(
            vec![
                SalesRecord::new(date(2024, 1, 1), "Phone", 1, 100.0)
                    .with_customer("C001")
                    .with_region("East"),
                SalesRecord::new(date(2024, 1, 2), "Phone", 2, 150.0)
                    .with_customer("C002")
                    .with_region("West"),
            ],
            true,
        )
    }

    #[test]
    fn test_kpis_over_example() {
        let kpis = kpis_for_period(&example_table());
        assert_eq!(kpis.total_revenue, 400.0);
        assert_eq!(kpis.total_orders, 2);
        assert_eq!(kpis.avg_order, 200.0);
        assert_eq!(kpis.unique_customers, UniqueCustomers::Count(2));
    }

    #[test]
    fn test_filter_is_inclusive() {
        let table = example_table();

        let single = filter_by_date(&table, date(2024, 1, 2), date(2024, 1, 2));
        assert_eq!(single.len(), 1);
        assert_eq!(kpis_for_period(&single).total_revenue, 300.0);

        let both = filter_by_date(&table, date(2024, 1, 1), date(2024, 1, 2));
        assert_eq!(both.len(), 2);
    }

    #[test]
    fn test_inverted_window_is_empty() {
        let filtered = filter_by_date(&example_table(), date(2024, 1, 2), date(2024, 1, 1));
        assert!(filtered.is_empty());

        let kpis = kpis_for_period(&filtered);
        assert_eq!(kpis.total_revenue, 0.0);
        assert_eq!(kpis.total_orders, 0);
        assert_eq!(kpis.avg_order, 0.0);
        assert_eq!(kpis.unique_customers, UniqueCustomers::Count(0));
    }

    #[test]
    fn test_missing_customer_column_is_not_applicable() {
        let mut table = example_table();
        table.has_customer_column = false;

        let kpis = kpis_for_period(&table);
        assert_eq!(kpis.unique_customers, UniqueCustomers::NotApplicable);
        assert_eq!(kpis.unique_customers.to_string(), "N/A");

        // Filtering keeps the schema
        let filtered = filter_by_date(&table, date(2024, 1, 1), date(2024, 1, 1));
        assert_eq!(kpis_for_period(&filtered).unique_customers, UniqueCustomers::NotApplicable);
    }

    #[test]
    fn test_anonymous_rows_not_counted_as_customers() {
        let mut table = example_table();
        table
            .records
            .push(SalesRecord::new(date(2024, 1, 2), "Cable", 1, 10.0));
        table
            .records
            .push(SalesRecord::new(date(2024, 1, 2), "Cable", 1, 10.0).with_customer("C001"));

        let kpis = kpis_for_period(&table);
        assert_eq!(kpis.total_orders, 4);
        assert_eq!(kpis.unique_customers, UniqueCustomers::Count(2));
    }

    #[test]
    fn test_previous_window_same_length() {
        for (start, end) in [
            (date(2024, 1, 2), date(2024, 1, 2)),
            (date(2024, 3, 1), date(2024, 3, 31)),
            (date(2024, 2, 20), date(2024, 3, 5)),
        ] {
            let current = DateWindow::new(start, end);
            let previous = previous_window(start, end);
            assert_eq!(previous.length_days(), current.length_days());
            assert_eq!(previous.end + Duration::days(1), start);
        }

        let previous = previous_window(date(2024, 3, 1), date(2024, 3, 31));
        assert_eq!(previous, DateWindow::new(date(2024, 1, 30), date(2024, 2, 29)));
    }

    #[test]
    fn test_period_compare_example() {
        let comparison = period_compare(&example_table(), date(2024, 1, 2), date(2024, 1, 2));

        assert_eq!(
            comparison.previous_window,
            DateWindow::new(date(2024, 1, 1), date(2024, 1, 1))
        );
        assert_eq!(comparison.current.total_revenue, 300.0);
        assert_eq!(comparison.previous.total_revenue, 100.0);
        assert_eq!(comparison.changes_pct.revenue, Some(200.0));
        assert_eq!(comparison.changes_pct.orders, Some(0.0));
        assert_eq!(comparison.changes_pct.avg_order, Some(200.0));
    }

    #[test]
    fn test_zero_baseline_is_null() {
        // Nothing before 2024-01-01
        let comparison = period_compare(&example_table(), date(2024, 1, 1), date(2024, 1, 2));
        assert_eq!(comparison.previous.total_orders, 0);
        assert_eq!(comparison.changes_pct.revenue, None);
        assert_eq!(comparison.changes_pct.orders, None);
        assert_eq!(comparison.changes_pct.avg_order, None);

        // Zero against zero is still undefined, not 0%
        let comparison = period_compare(&example_table(), date(2023, 6, 1), date(2023, 6, 2));
        assert_eq!(comparison.current.total_revenue, 0.0);
        assert_eq!(comparison.changes_pct.revenue, None);
    }

    #[test]
    fn test_previous_window_at_calendar_edge() {
        // Nothing exists before the first representable day
        let comparison = period_compare(&example_table(), NaiveDate::MIN, date(2024, 1, 2));
        assert!(comparison.previous_window.start > comparison.previous_window.end);
        assert_eq!(comparison.current.total_revenue, 400.0);
        assert_eq!(comparison.previous.total_orders, 0);
        assert_eq!(comparison.changes_pct.revenue, None);
        assert_eq!(comparison.changes_pct.orders, None);
        assert_eq!(comparison.changes_pct.avg_order, None);

        let comparison = period_compare(&example_table(), NaiveDate::MIN, NaiveDate::MIN);
        assert_eq!(comparison.current.total_orders, 0);
        assert_eq!(comparison.changes_pct.revenue, None);
    }

    #[test]
    fn test_very_wide_window_has_no_previous_period() {
        let start = NaiveDate::from_ymd_opt(-200_000, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(200_000, 1, 1).unwrap();

        let previous = previous_window(start, end);
        assert!(previous.length_days() <= 0);

        let comparison = period_compare(&example_table(), start, end);
        assert_eq!(comparison.current.total_orders, 2);
        assert_eq!(comparison.previous.total_orders, 0);
        assert_eq!(comparison.changes_pct.revenue, None);
        assert_eq!(comparison.changes_pct.orders, None);
        assert_eq!(comparison.changes_pct.avg_order, None);
    }

    #[test]
    fn test_pct_change() {
        assert_eq!(pct_change(150.0, 100.0), Some(50.0));
        assert_eq!(pct_change(50.0, 100.0), Some(-50.0));
        assert_eq!(pct_change(10.0, 0.0), None);
        assert_eq!(pct_change(0.0, 0.0), None);
    }
}
