//! K-Means customer segmentation on unscaled RFM features

use crate::data::{compute_rfm, CustomerRfm, RfmData, SalesRecord};
use linfa::prelude::*;
use linfa_clustering::KMeans;
use linfa_nn::distance::L2Dist;
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashSet;
use tracing::debug;

/// Segments requested when the caller does not say otherwise
pub const DEFAULT_CLUSTERS: usize = 3;

/// Seed for K-Means initialisation; fixed so identical input gives identical labels
pub const SEGMENTATION_SEED: u64 = 42;

const MAX_ITERATIONS: u64 = 300;
const TOLERANCE: f64 = 1e-4;

/// Fitted segmentation model, reusable for predicting new customers
#[derive(Debug)]
pub struct SegmentationModel {
    model: KMeans<f64, L2Dist>,
    /// Number of clusters actually fitted
    pub n_clusters: usize,
    /// Cluster assignments for training data
    pub labels: Array1<usize>,
    /// Cluster centroids in raw RFM space
    pub centroids: Array2<f64>,
    /// Within-cluster sum of squares (inertia)
    pub inertia: f64,
}

impl SegmentationModel {
    /// Predict the cluster of a raw `[recency, frequency, monetary]` vector
    pub fn predict(&self, rfm: &[f64; 3]) -> crate::Result<usize> {
        let observation = Array2::from_shape_vec((1, 3), rfm.to_vec())?;
        let labels: Array1<usize> = self.model.predict(&observation);
        labels
            .first()
            .copied()
            .ok_or_else(|| anyhow::anyhow!("K-Means returned no label for the observation"))
    }

    /// Get cluster sizes
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.n_clusters];
        for &label in self.labels.iter() {
            if label < self.n_clusters {
                sizes[label] += 1;
            }
        }
        sizes
    }

    /// Mean silhouette coefficient over the first `sample_size` points
    pub fn silhouette_sample(&self, features: &Array2<f64>, sample_size: usize) -> f64 {
        let n_samples = features.nrows().min(sample_size).min(self.labels.len());
        if n_samples < 2 {
            return 0.0;
        }

        let mut silhouette_sum = 0.0;

        for i in 0..n_samples {
            let point = features.row(i);
            let cluster_label = self.labels[i];

            let mut same_cluster_distances = Vec::new();
            let mut other_cluster_distances: Vec<Vec<f64>> = vec![Vec::new(); self.n_clusters];

            for j in 0..n_samples {
                if i == j {
                    continue;
                }

                let distance = euclidean_distance(&point, &features.row(j));
                let other_label = self.labels[j];

                if other_label == cluster_label {
                    same_cluster_distances.push(distance);
                } else if other_label < self.n_clusters {
                    other_cluster_distances[other_label].push(distance);
                }
            }

            let a_i = mean(&same_cluster_distances).unwrap_or(0.0);

            // nearest other cluster by mean distance
            let b_i = other_cluster_distances
                .iter()
                .filter_map(|distances| mean(distances))
                .fold(f64::INFINITY, f64::min);

            let silhouette_i = if b_i.is_infinite() || (a_i == 0.0 && b_i == 0.0) {
                0.0
            } else {
                (b_i - a_i) / a_i.max(b_i)
            };

            silhouette_sum += silhouette_i;
        }

        silhouette_sum / n_samples as f64
    }
}

/// Customer RFM rows plus the model that labelled them.
///
/// Both are empty when the input has no identified customers.
#[derive(Debug)]
pub struct Segmentation {
    pub customers: Vec<CustomerRfm>,
    pub rfm: Option<RfmData>,
    pub model: Option<SegmentationModel>,
}

impl Segmentation {
    fn empty() -> Self {
        Self {
            customers: Vec::new(),
            rfm: None,
            model: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.customers.is_empty()
    }
}

/// Fit K-Means on raw RFM features
///
/// `n_clusters` is raised to at least one and capped at the number of distinct
/// feature vectors. The RNG is re-seeded with [`SEGMENTATION_SEED`] on every call.
pub fn fit_kmeans(rfm_data: &RfmData, n_clusters: usize) -> crate::Result<SegmentationModel> {
    let n_samples = rfm_data.features.nrows();
    if n_samples == 0 {
        anyhow::bail!("Cannot fit K-Means on an empty feature matrix");
    }

    let n_clusters = n_clusters.max(1).min(distinct_rows(&rfm_data.features));

    let dataset = DatasetBase::from(rfm_data.features.clone());
    let rng = StdRng::seed_from_u64(SEGMENTATION_SEED);

    let model = KMeans::params_with(n_clusters, rng, L2Dist)
        .max_n_iterations(MAX_ITERATIONS)
        .tolerance(TOLERANCE)
        .fit(&dataset)?;

    let labels: Array1<usize> = model.predict(&rfm_data.features);
    let centroids = model.centroids().clone();
    let inertia = compute_inertia(&rfm_data.features, &labels, &centroids);

    debug!(n_samples, n_clusters, inertia, "fitted K-Means");

    Ok(SegmentationModel {
        model,
        n_clusters,
        labels,
        centroids,
        inertia,
    })
}

/// Compute per-customer RFM over `records` and assign each customer a segment
pub fn rfm_segmentation(records: &[SalesRecord], n_clusters: usize) -> crate::Result<Segmentation> {
    let Some(rfm_data) = compute_rfm(records) else {
        debug!("no identified customers, skipping segmentation");
        return Ok(Segmentation::empty());
    };

    let model = fit_kmeans(&rfm_data, n_clusters)?;

    let customers = rfm_data
        .customer_ids
        .iter()
        .zip(rfm_data.features.outer_iter())
        .zip(model.labels.iter())
        .map(|((customer_id, row), &cluster)| CustomerRfm {
            customer_id: customer_id.clone(),
            recency: row[0] as i64,
            frequency: row[1] as usize,
            monetary: row[2],
            cluster,
        })
        .collect();

    Ok(Segmentation {
        customers,
        rfm: Some(rfm_data),
        model: Some(model),
    })
}

fn distinct_rows(features: &Array2<f64>) -> usize {
    features
        .outer_iter()
        .map(|row| row.iter().map(|v| v.to_bits()).collect::<Vec<u64>>())
        .collect::<HashSet<_>>()
        .len()
}

/// Compute within-cluster sum of squares (inertia)
fn compute_inertia(features: &Array2<f64>, labels: &Array1<usize>, centroids: &Array2<f64>) -> f64 {
    let mut inertia = 0.0;

    for (i, &cluster) in labels.iter().enumerate() {
        if cluster < centroids.nrows() {
            let distance = euclidean_distance(&features.row(i), &centroids.row(cluster));
            inertia += distance * distance;
        }
    }

    inertia
}

fn euclidean_distance(point1: &ndarray::ArrayView1<f64>, point2: &ndarray::ArrayView1<f64>) -> f64 {
    point1
        .iter()
        .zip(point2.iter())
        .map(|(a, b)| (a - b).powi(2))
        .sum::<f64>()
        .sqrt()
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}
