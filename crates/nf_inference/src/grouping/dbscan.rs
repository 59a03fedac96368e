//! Density-based clustering over unit-length sparse vectors with cosine
//! distance.
//!
//! A point's neighborhood includes the point itself, so `min_samples = 2`
//! makes any pair within `eps` of each other a cluster. Cluster ids are
//! assigned in index order of the core point that seeds them; a border point
//! reachable from two clusters belongs to the one seeded first.

use super::tfidf::{dot, SparseVector};

#[derive(Debug, Clone, Copy)]
pub struct Dbscan {
    pub eps: f64,
    pub min_samples: usize,
}

impl Dbscan {
    pub fn new(eps: f64, min_samples: usize) -> Self {
        Self { eps, min_samples }
    }

    /// Returns a cluster id per point, `None` for noise.
    pub fn fit(&self, points: &[SparseVector]) -> Vec<Option<usize>> {
        let neighborhoods: Vec<Vec<usize>> = (0..points.len())
            .map(|i| self.region_query(points, i))
            .collect();
        let is_core: Vec<bool> = neighborhoods
            .iter()
            .map(|neighbors| neighbors.len() >= self.min_samples)
            .collect();

        let mut labels: Vec<Option<usize>> = vec![None; points.len()];
        let mut next_label = 0;
        for seed in 0..points.len() {
            if labels[seed].is_some() || !is_core[seed] {
                continue;
            }
            let mut stack = vec![seed];
            while let Some(point) = stack.pop() {
                if labels[point].is_some() {
                    continue;
                }
                labels[point] = Some(next_label);
                if is_core[point] {
                    stack.extend(
                        neighborhoods[point]
                            .iter()
                            .copied()
                            .filter(|&neighbor| labels[neighbor].is_none()),
                    );
                }
            }
            next_label += 1;
        }
        labels
    }

    fn region_query(&self, points: &[SparseVector], i: usize) -> Vec<usize> {
        (0..points.len())
            .filter(|&j| j == i || cosine_distance(&points[i], &points[j]) <= self.eps)
            .collect()
    }
}

/// `1 - cos(a, b)` for unit vectors, clamped to `[0, 2]`. Zero vectors are
/// at distance 1 from everything.
pub fn cosine_distance(a: &SparseVector, b: &SparseVector) -> f64 {
    (1.0 - dot(a, b)).clamp(0.0, 2.0)
}
