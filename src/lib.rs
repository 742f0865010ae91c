//! Sales Dashboard: analytics over tabular sales records
//!
//! This library ingests sales CSVs into a SQLite store and computes period KPIs,
//! period-over-period comparisons and RFM (Recency, Frequency, Monetary) customer
//! segments using K-Means clustering.

pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod ingest;
pub mod kpi;
pub mod model;
pub mod report;
pub mod store;
pub mod viz;

// Re-export public items for easier access
pub use cli::Args;
pub use config::AppConfig;
pub use data::{compute_rfm, CustomerRfm, RfmData, SalesRecord, SalesTable};
pub use error::DashboardError;
pub use ingest::{load_sales_csv, read_sales_csv};
pub use kpi::{
    filter_by_date, kpis_for_period, period_compare, previous_window, ChangeSet, DateWindow,
    KpiSet, PeriodComparison, UniqueCustomers,
};
pub use model::{fit_kmeans, rfm_segmentation, Segmentation, SegmentationModel};
pub use store::{seed_from_csv, SalesStore};

/// Common result type used throughout the application
pub type Result<T> = anyhow::Result<T>;
