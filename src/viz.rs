//! Chart rendering with Plotters

use crate::data::SalesRecord;
use crate::model::Segmentation;
use crate::report::{
    correlation_matrix, daily_sales, product_performance, values_by_product, ProductStats,
    CORRELATION_COLUMNS,
};
use chrono::NaiveDate;
use plotters::prelude::*;
use plotters::style::register_font;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::info;

/// Color palette for different clusters
static CLUSTER_COLORS: [RGBColor; 5] = [RED, BLUE, GREEN, CYAN, MAGENTA];

/// Text face for captions, axis descriptions and labels
static CHART_FONT: &[u8] = include_bytes!("../assets/DejaVuSans.ttf");
static CHART_FONT_LOADED: OnceLock<bool> = OnceLock::new();

/// Register the embedded font as "sans-serif" for the bitmap backend
fn register_chart_font() -> crate::Result<()> {
    let loaded = *CHART_FONT_LOADED
        .get_or_init(|| register_font("sans-serif", FontStyle::Normal, CHART_FONT).is_ok());
    if !loaded {
        anyhow::bail!("Embedded chart font could not be parsed");
    }
    Ok(())
}

fn cluster_color(cluster: usize) -> &'static RGBColor {
    CLUSTER_COLORS.get(cluster).unwrap_or(&BLACK)
}

fn padded_range(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (min, max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    let pad = ((max - min) * 0.05).max(1.0);
    (min - pad, max + pad)
}

/// Line chart of daily revenue
pub fn create_sales_over_time_chart(series: &[(NaiveDate, f64)], output_path: &Path) -> crate::Result<()> {
    if series.is_empty() {
        anyhow::bail!("No sales to plot");
    }
    register_chart_font()?;

    let max_revenue = series.iter().map(|(_, v)| *v).fold(0.0, f64::max).max(1.0);

    let root = BitMapBackend::new(output_path, (900, 500)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Sales Over Time", ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(50)
        .y_label_area_size(70)
        .build_cartesian_2d(0f64..series.len().max(2) as f64 - 1.0, 0f64..max_revenue * 1.1)?;

    chart
        .configure_mesh()
        .x_desc(format!("Days since {}", series[0].0))
        .y_desc("Total Sales")
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    let points: Vec<(f64, f64)> = series
        .iter()
        .enumerate()
        .map(|(i, (_, revenue))| (i as f64, *revenue))
        .collect();

    chart.draw_series(LineSeries::new(points.clone(), &BLUE))?;
    chart.draw_series(points.into_iter().map(|p| Circle::new(p, 3, BLUE.filled())))?;

    root.present()?;
    info!(path = %output_path.display(), "sales-over-time chart saved");

    Ok(())
}

/// Bar chart of revenue per product, in the given order
pub fn create_product_revenue_chart(stats: &[ProductStats], output_path: &Path) -> crate::Result<()> {
    if stats.is_empty() {
        anyhow::bail!("No products to plot");
    }
    register_chart_font()?;

    let max_revenue = stats.iter().map(|s| s.total_revenue).fold(0.0, f64::max).max(1.0);

    let root = BitMapBackend::new(output_path, (800, 500)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Revenue by Product", ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(70)
        .build_cartesian_2d(-0.5f64..(stats.len() as f64 - 0.5), 0f64..(max_revenue * 1.1))?;

    chart
        .configure_mesh()
        .x_desc("Product (by revenue rank)")
        .y_desc("Total Revenue")
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    for (rank, stat) in stats.iter().enumerate() {
        let x = rank as f64;
        chart.draw_series(std::iter::once(Rectangle::new(
            [(x - 0.4, 0.0), (x + 0.4, stat.total_revenue)],
            BLUE.mix(0.7).filled(),
        )))?;
    }

    root.present()?;
    info!(path = %output_path.display(), "product revenue chart saved");

    Ok(())
}

/// Scatter of raw frequency vs monetary, colored by segment, with centroids
pub fn create_cluster_visualization(
    segmentation: &Segmentation,
    output_path: &Path,
    plot_title: Option<&str>,
) -> crate::Result<()> {
    let Some(model) = segmentation.model.as_ref() else {
        anyhow::bail!("No segmentation to plot");
    };
    let title = plot_title.unwrap_or("Customer Segments: Frequency vs Monetary");
    register_chart_font()?;

    let (freq_min, freq_max) = padded_range(
        segmentation
            .customers
            .iter()
            .map(|c| c.frequency as f64)
            .chain(model.centroids.column(1).iter().copied()),
    );
    let (mon_min, mon_max) = padded_range(
        segmentation
            .customers
            .iter()
            .map(|c| c.monetary)
            .chain(model.centroids.column(2).iter().copied()),
    );

    let root = BitMapBackend::new(output_path, (800, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(50)
        .y_label_area_size(70)
        .build_cartesian_2d(freq_min..freq_max, mon_min..mon_max)?;

    chart
        .configure_mesh()
        .x_desc("Frequency")
        .y_desc("Monetary")
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    chart.draw_series(segmentation.customers.iter().map(|c| {
        Circle::new(
            (c.frequency as f64, c.monetary),
            4,
            cluster_color(c.cluster).filled(),
        )
    }))?;

    // Centroids as squares sized relative to the axes
    let half_w = (freq_max - freq_min) * 0.01;
    let half_h = (mon_max - mon_min) * 0.01;
    for (cluster_id, centroid) in model.centroids.outer_iter().enumerate() {
        let (freq, mon) = (centroid[1], centroid[2]);
        let color = cluster_color(cluster_id);
        chart
            .draw_series(std::iter::once(Rectangle::new(
                [(freq - half_w, mon - half_h), (freq + half_w, mon + half_h)],
                color.filled(),
            )))?
            .label(format!("Cluster {} Centroid", cluster_id))
            .legend(move |(x, y)| Rectangle::new([(x, y), (x + 10, y + 10)], color.filled()));
    }

    chart.configure_series_labels().draw()?;

    root.present()?;
    info!(path = %output_path.display(), "cluster visualization saved");

    Ok(())
}

/// Bar chart of customers per segment
pub fn create_cluster_size_chart(segmentation: &Segmentation, output_path: &Path) -> crate::Result<()> {
    let Some(model) = segmentation.model.as_ref() else {
        anyhow::bail!("No segmentation to plot");
    };
    register_chart_font()?;
    let cluster_sizes = model.cluster_sizes();
    let max_size = cluster_sizes.iter().copied().max().unwrap_or(1).max(1) as f64;

    let root = BitMapBackend::new(output_path, (600, 400)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Cluster Sizes", ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(-0.5f64..(model.n_clusters as f64 - 0.5), 0f64..(max_size * 1.1))?;

    chart
        .configure_mesh()
        .x_desc("Cluster ID")
        .y_desc("Number of Customers")
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    for (cluster_id, &size) in cluster_sizes.iter().enumerate() {
        let x = cluster_id as f64;
        chart.draw_series(std::iter::once(Rectangle::new(
            [(x - 0.4, 0.0), (x + 0.4, size as f64)],
            cluster_color(cluster_id).filled(),
        )))?;
    }

    root.present()?;
    info!(path = %output_path.display(), "cluster size chart saved");

    Ok(())
}

/// Box-and-whisker plot of unit price per product
pub fn create_price_boxplot(records: &[SalesRecord], output_path: &Path) -> crate::Result<()> {
    let groups = values_by_product(records, |r| r.price);
    if groups.is_empty() {
        anyhow::bail!("No prices to plot");
    }
    register_chart_font()?;

    let products: Vec<String> = groups.iter().map(|(product, _)| product.clone()).collect();
    let quartiles: Vec<Quartiles> = groups
        .iter()
        .map(|(_, values)| Quartiles::new(values.as_slice()))
        .collect();
    let (y_min, y_max) = padded_range(
        quartiles
            .iter()
            .flat_map(|q| q.values())
            .map(f64::from)
            .chain(groups.iter().flat_map(|(_, values)| values.iter().copied())),
    );

    let root = BitMapBackend::new(output_path, (800, 500)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Price Distribution by Product", ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(70)
        .build_cartesian_2d(products[..].into_segmented(), y_min as f32..y_max as f32)?;

    chart
        .configure_mesh()
        .x_desc("Product")
        .y_desc("Price")
        .axis_desc_style(("sans-serif", 15))
        .light_line_style(WHITE)
        .draw()?;

    chart.draw_series(products.iter().zip(&quartiles).map(|(product, q)| {
        Boxplot::new_vertical(SegmentValue::CenterOf(product), q)
            .width(30)
            .whisker_width(0.5)
            .style(BLUE)
    }))?;

    root.present()?;
    info!(path = %output_path.display(), "price boxplot saved");

    Ok(())
}

/// Kernel density outline of `values` on `steps` points, widest point scaled to 1.
///
/// Uses a Gaussian kernel with Scott's bandwidth and extends two bandwidths past
/// the data. A single distinct value collapses to one point.
fn violin_profile(values: &[f64], steps: usize) -> Vec<(f64, f64)> {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = if values.len() > 1 {
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)
    } else {
        0.0
    };
    let bandwidth = variance.sqrt() * n.powf(-0.2);
    if bandwidth == 0.0 || !bandwidth.is_finite() {
        return vec![(mean, 1.0)];
    }

    let lo = values.iter().copied().fold(f64::INFINITY, f64::min) - 2.0 * bandwidth;
    let hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max) + 2.0 * bandwidth;
    let step = (hi - lo) / (steps.max(2) - 1) as f64;

    let mut profile: Vec<(f64, f64)> = (0..steps.max(2))
        .map(|i| {
            let y = lo + step * i as f64;
            let density = values
                .iter()
                .map(|v| (-0.5 * ((y - v) / bandwidth).powi(2)).exp())
                .sum::<f64>();
            (y, density)
        })
        .collect();

    let peak = profile.iter().map(|(_, d)| *d).fold(0.0, f64::max);
    for point in &mut profile {
        point.1 /= peak;
    }
    profile
}

/// Violin plot of order quantity per product, with quartile lines inside
pub fn create_quantity_violin(records: &[SalesRecord], output_path: &Path) -> crate::Result<()> {
    let groups = values_by_product(records, |r| r.quantity as f64);
    if groups.is_empty() {
        anyhow::bail!("No quantities to plot");
    }
    register_chart_font()?;

    let profiles: Vec<Vec<(f64, f64)>> = groups
        .iter()
        .map(|(_, values)| violin_profile(values, 64))
        .collect();
    let (y_min, y_max) = padded_range(profiles.iter().flatten().map(|(y, _)| *y));
    let products: Vec<&str> = groups.iter().map(|(product, _)| product.as_str()).collect();

    let root = BitMapBackend::new(output_path, (800, 500)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Quantity Distribution by Product", ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(-0.5f64..(groups.len() as f64 - 0.5), y_min..y_max)?;

    chart
        .configure_mesh()
        .x_labels(groups.len())
        .x_label_formatter(&|x: &f64| {
            let slot = x.round();
            if (x - slot).abs() < 1e-6 && slot >= 0.0 {
                products.get(slot as usize).map(|p| p.to_string()).unwrap_or_default()
            } else {
                String::new()
            }
        })
        .x_desc("Product")
        .y_desc("Quantity")
        .axis_desc_style(("sans-serif", 15))
        .disable_x_mesh()
        .draw()?;

    const HALF_WIDTH: f64 = 0.4;
    for (slot, ((_, values), profile)) in groups.iter().zip(&profiles).enumerate() {
        let x = slot as f64;
        let color = Palette99::pick(slot);

        if let [(y, _)] = profile.as_slice() {
            chart.draw_series(std::iter::once(PathElement::new(
                vec![(x - HALF_WIDTH, *y), (x + HALF_WIDTH, *y)],
                color.stroke_width(2),
            )))?;
            continue;
        }

        let outline: Vec<(f64, f64)> = profile
            .iter()
            .map(|(y, d)| (x + HALF_WIDTH * d, *y))
            .chain(profile.iter().rev().map(|(y, d)| (x - HALF_WIDTH * d, *y)))
            .collect();
        chart.draw_series(std::iter::once(Polygon::new(outline, color.mix(0.6).filled())))?;

        let quartiles = Quartiles::new(values.as_slice());
        let [_, lower, median, upper, _] = quartiles.values();
        for (q, dashed) in [(lower, true), (median, false), (upper, true)] {
            let q = f64::from(q);
            let width = profile
                .iter()
                .min_by(|a, b| (a.0 - q).abs().total_cmp(&(b.0 - q).abs()))
                .map(|(_, d)| HALF_WIDTH * d)
                .unwrap_or(HALF_WIDTH);
            let style = if dashed { BLACK.mix(0.5).stroke_width(1) } else { BLACK.stroke_width(2) };
            chart.draw_series(std::iter::once(PathElement::new(
                vec![(x - width, q), (x + width, q)],
                style,
            )))?;
        }
    }

    root.present()?;
    info!(path = %output_path.display(), "quantity violin plot saved");

    Ok(())
}

/// Diverging blue-white-red shade for a correlation; grey when undefined
fn correlation_color(value: Option<f64>) -> RGBColor {
    let Some(v) = value else {
        return RGBColor(220, 220, 220);
    };
    let v = v.clamp(-1.0, 1.0);
    let (target, t): ((u8, u8, u8), f64) = if v < 0.0 {
        ((33, 102, 172), -v)
    } else {
        ((178, 24, 43), v)
    };
    let blend = |c: u8| (255.0 + (c as f64 - 255.0) * t).round() as u8;
    RGBColor(blend(target.0), blend(target.1), blend(target.2))
}

/// Annotated heatmap of pairwise correlations between quantity, price and total
pub fn create_correlation_heatmap(records: &[SalesRecord], output_path: &Path) -> crate::Result<()> {
    if records.is_empty() {
        anyhow::bail!("No rows to correlate");
    }
    register_chart_font()?;

    let matrix = correlation_matrix(records);
    let size = CORRELATION_COLUMNS.len() as i32;

    let root = BitMapBackend::new(output_path, (700, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Feature Correlation Heatmap", ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(100)
        .build_cartesian_2d(0i32..size, 0i32..size)?;

    let (width, height) = chart.plotting_area().dim_in_pixel();
    let cell_w = width as i32 / size;
    let cell_h = height as i32 / size;
    let label_at = |slot: i32| {
        usize::try_from(slot)
            .ok()
            .and_then(|i| CORRELATION_COLUMNS.get(i))
            .map(|c| c.to_string())
            .unwrap_or_default()
    };
    // Row 0 is drawn on top
    let column_label = |x: &i32| label_at(*x);
    let row_label = |y: &i32| label_at(size - 1 - *y);

    chart
        .configure_mesh()
        .x_labels(CORRELATION_COLUMNS.len())
        .y_labels(CORRELATION_COLUMNS.len())
        .x_label_offset(cell_w / 2)
        .y_label_offset(cell_h / 2)
        .x_label_formatter(&column_label)
        .y_label_formatter(&row_label)
        .disable_x_mesh()
        .disable_y_mesh()
        .label_style(("sans-serif", 15))
        .draw()?;

    let cells: Vec<(i32, i32, Option<f64>)> = matrix
        .iter()
        .enumerate()
        .flat_map(|(row, values)| {
            values
                .iter()
                .enumerate()
                .map(move |(col, v)| (col as i32, size - 1 - row as i32, *v))
        })
        .collect();

    chart.draw_series(cells.iter().map(|&(x, y, v)| {
        Rectangle::new([(x, y), (x + 1, y + 1)], correlation_color(v).filled())
    }))?;

    chart.draw_series(cells.iter().map(|&(x, y, v)| {
        let label = v.map(|c| format!("{:.2}", c)).unwrap_or_else(|| "n/a".to_string());
        EmptyElement::at((x, y + 1))
            + Text::new(label, (cell_w / 2 - 18, cell_h / 2 - 8), ("sans-serif", 18))
    }))?;

    root.present()?;
    info!(path = %output_path.display(), "correlation heatmap saved");

    Ok(())
}

/// Render every chart that has data into `output_dir`, returning the written paths
pub fn generate_chart_report(
    output_dir: &Path,
    records: &[SalesRecord],
    segmentation: &Segmentation,
) -> crate::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(output_dir)?;
    let mut written = Vec::new();

    if !records.is_empty() {
        let path = output_dir.join("sales_over_time.png");
        create_sales_over_time_chart(&daily_sales(records), &path)?;
        written.push(path);

        let path = output_dir.join("product_revenue.png");
        create_product_revenue_chart(&product_performance(records), &path)?;
        written.push(path);

        let path = output_dir.join("price_by_product.png");
        create_price_boxplot(records, &path)?;
        written.push(path);

        let path = output_dir.join("quantity_by_product.png");
        create_quantity_violin(records, &path)?;
        written.push(path);

        let path = output_dir.join("correlation_heatmap.png");
        create_correlation_heatmap(records, &path)?;
        written.push(path);
    }

    if segmentation.model.is_some() {
        let path = output_dir.join("rfm_clusters.png");
        create_cluster_visualization(segmentation, &path, None)?;
        written.push(path);

        let path = output_dir.join("rfm_cluster_sizes.png");
        create_cluster_size_chart(segmentation, &path)?;
        written.push(path);
    }

    Ok(written)
}
