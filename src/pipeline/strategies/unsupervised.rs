//! Target-free discretization: equal-frequency, equal-width or 1-D k-means

use serde::Serialize;

use super::{interval_labels, tabulate, BinMapping, Partition, SplitFinder, SplitParams};
use crate::error::{BinningError, Result};
use crate::pipeline::features::FeatureValues;

/// Default number of unsupervised bins
pub const DEFAULT_UNSUPERVISED_BINS: usize = 10;

const KMEANS_MAX_ITER: usize = 100;

/// Discretization method
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum UnsupervisedMethod {
    /// Equal-frequency edges
    #[default]
    Quantile,
    /// Equal-width edges between min and max
    Uniform,
    /// Edges halfway between sorted 1-D k-means centers
    Kmeans,
}

impl std::fmt::Display for UnsupervisedMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnsupervisedMethod::Quantile => write!(f, "quantile"),
            UnsupervisedMethod::Uniform => write!(f, "uniform"),
            UnsupervisedMethod::Kmeans => write!(f, "kmeans"),
        }
    }
}

impl std::str::FromStr for UnsupervisedMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "quantile" => Ok(UnsupervisedMethod::Quantile),
            "uniform" => Ok(UnsupervisedMethod::Uniform),
            "kmeans" | "k-means" => Ok(UnsupervisedMethod::Kmeans),
            _ => Err(format!(
                "Unknown unsupervised method: '{}'. Use 'quantile', 'uniform', or 'kmeans'.",
                s
            )),
        }
    }
}

/// Fixed-count discretizer; ignores the target and the search parameters
#[derive(Debug, Clone)]
pub struct UnsupervisedSplitter {
    method: UnsupervisedMethod,
    n_bins: usize,
}

impl UnsupervisedSplitter {
    pub fn new(method: UnsupervisedMethod, n_bins: usize) -> Self {
        Self {
            method,
            n_bins: n_bins.max(1),
        }
    }
}

impl SplitFinder for UnsupervisedSplitter {
    fn fit(
        &self,
        variable: &str,
        values: &FeatureValues,
        target: &[u8],
        _params: &SplitParams,
    ) -> Result<Partition> {
        let FeatureValues::Numeric(raw) = values else {
            return Err(BinningError::config(format!(
                "Unsupervised split finder needs numeric values for '{}'",
                variable
            )));
        };

        let mut sorted: Vec<f64> = raw.iter().flatten().copied().collect();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let candidates = match self.method {
            UnsupervisedMethod::Quantile => quantile_edges(&sorted, self.n_bins),
            UnsupervisedMethod::Uniform => uniform_edges(&sorted, self.n_bins),
            UnsupervisedMethod::Kmeans => kmeans_edges(&sorted, self.n_bins),
        };
        let edges = strictly_inside(candidates, &sorted);

        let labels = interval_labels(&edges);
        let mapping = BinMapping::Numeric { edges };
        let codes = mapping.assign(values);
        let table = tabulate(variable, &labels, &codes, target, None);

        Ok(Partition { table, mapping })
    }
}

/// Keep increasing edges strictly between the minimum and maximum
fn strictly_inside(candidates: Vec<f64>, sorted: &[f64]) -> Vec<f64> {
    let (Some(min), Some(max)) = (sorted.first(), sorted.last()) else {
        return Vec::new();
    };
    let mut edges: Vec<f64> = Vec::with_capacity(candidates.len());
    for edge in candidates {
        if edge > *min && edge <= *max && edges.last().map_or(true, |last| edge > *last) {
            edges.push(edge);
        }
    }
    edges
}

/// Linear-interpolated percentile of sorted data, `q` in `[0, 1]`
fn percentile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * frac
}

fn quantile_edges(sorted: &[f64], n_bins: usize) -> Vec<f64> {
    if sorted.is_empty() {
        return Vec::new();
    }
    (1..n_bins)
        .map(|i| percentile(sorted, i as f64 / n_bins as f64))
        .collect()
}

fn uniform_edges(sorted: &[f64], n_bins: usize) -> Vec<f64> {
    let (Some(min), Some(max)) = (sorted.first(), sorted.last()) else {
        return Vec::new();
    };
    let width = (max - min) / n_bins as f64;
    (1..n_bins).map(|i| min + width * i as f64).collect()
}

/// Lloyd's algorithm seeded with equal-width bin centers
fn kmeans_edges(sorted: &[f64], n_bins: usize) -> Vec<f64> {
    let (Some(min), Some(max)) = (sorted.first(), sorted.last()) else {
        return Vec::new();
    };
    let width = (max - min) / n_bins as f64;
    let mut centers: Vec<f64> = (0..n_bins).map(|i| min + width * (i as f64 + 0.5)).collect();

    for _ in 0..KMEANS_MAX_ITER {
        let mut sums = vec![0.0; centers.len()];
        let mut counts = vec![0usize; centers.len()];
        for value in sorted {
            let nearest = centers
                .iter()
                .enumerate()
                .min_by(|a, b| (a.1 - value).abs().total_cmp(&(b.1 - value).abs()))
                .map(|(i, _)| i)
                .unwrap_or(0);
            sums[nearest] += value;
            counts[nearest] += 1;
        }

        let updated: Vec<f64> = centers
            .iter()
            .enumerate()
            .map(|(i, c)| if counts[i] > 0 { sums[i] / counts[i] as f64 } else { *c })
            .collect();
        let converged = updated
            .iter()
            .zip(&centers)
            .all(|(a, b)| (a - b).abs() < 1e-12);
        centers = updated;
        if converged {
            break;
        }
    }

    centers.sort_by(|a, b| a.total_cmp(b));
    centers.windows(2).map(|w| (w[0] + w[1]) / 2.0).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> SplitParams {
        SplitParams {
            max_bins: 6,
            min_bin_size: 0.05,
            trend: None,
        }
    }

    #[test]
    fn test_method_from_str() {
        assert_eq!("kmeans".parse::<UnsupervisedMethod>().unwrap(), UnsupervisedMethod::Kmeans);
        assert_eq!("Uniform".parse::<UnsupervisedMethod>().unwrap(), UnsupervisedMethod::Uniform);
        assert!("random".parse::<UnsupervisedMethod>().is_err());
    }

    #[test]
    fn test_uniform_edges() {
        let sorted = vec![0.0, 2.0, 5.0, 10.0];
        assert_eq!(uniform_edges(&sorted, 4), vec![2.5, 5.0, 7.5]);
    }

    #[test]
    fn test_quantile_edges() {
        let sorted: Vec<f64> = (0..=100).map(|i| i as f64).collect();
        assert_eq!(quantile_edges(&sorted, 4), vec![25.0, 50.0, 75.0]);
    }

    #[test]
    fn test_kmeans_separates_clusters() {
        let mut sorted: Vec<f64> = (0..50).map(|i| i as f64 * 0.01).collect();
        sorted.extend((0..50).map(|i| 10.0 + i as f64 * 0.01));
        let edges = kmeans_edges(&sorted, 2);
        assert_eq!(edges.len(), 1);
        assert!(edges[0] > 0.5 && edges[0] < 10.0);
    }

    #[test]
    fn test_constant_feature_gives_single_bin() {
        let values = FeatureValues::Numeric(vec![Some(3.0); 20]);
        let target = vec![0u8; 20];
        let splitter = UnsupervisedSplitter::new(UnsupervisedMethod::Quantile, 5);
        let partition = splitter.fit("x", &values, &target, &params()).unwrap();
        assert_eq!(partition.table.n_bins(), 1);
    }

    #[test]
    fn test_quantile_partition_counts() {
        let values = FeatureValues::Numeric((0..100).map(|i| Some(i as f64)).collect());
        let target: Vec<u8> = (0..100).map(|i| u8::from(i % 3 == 0)).collect();
        let splitter = UnsupervisedSplitter::new(UnsupervisedMethod::Quantile, 4);
        let partition = splitter.fit("x", &values, &target, &params()).unwrap();
        assert_eq!(partition.table.n_bins(), 4);
        assert_eq!(partition.table.total_count(), 100);
        for bin in partition.table.aggregate() {
            assert_eq!(bin.count, 25);
        }
    }
}
