/**
 * BookReco
 * Copyright (C) 2018 Sebastian Schelter
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program. If not, see <http://www.gnu.org/licenses/>.
 */

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::types::ItemFeatureMatrix;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Euclidean,
    Manhattan,
    /// `1 - cos(a, b)`, defined as `1.0` if either vector is all zeros.
    Cosine,
}

impl Default for Metric {
    fn default() -> Self {
        Metric::Euclidean
    }
}

impl Metric {

    #[inline]
    pub fn distance(self, a: &[f32], b: &[f32]) -> f64 {
        match self {
            Metric::Euclidean => {
                a.iter()
                    .zip(b.iter())
                    .map(|(x, y)| {
                        let diff = *x as f64 - *y as f64;
                        diff * diff
                    })
                    .sum::<f64>()
                    .sqrt()
            },
            Metric::Manhattan => {
                a.iter()
                    .zip(b.iter())
                    .map(|(x, y)| (*x as f64 - *y as f64).abs())
                    .sum()
            },
            Metric::Cosine => {
                let mut dot = 0.0;
                let mut norm_a = 0.0;
                let mut norm_b = 0.0;
                for (x, y) in a.iter().zip(b.iter()) {
                    let (x, y) = (*x as f64, *y as f64);
                    dot += x * y;
                    norm_a += x * x;
                    norm_b += y * y;
                }

                if norm_a == 0.0 || norm_b == 0.0 {
                    1.0
                } else {
                    1.0 - dot / (norm_a.sqrt() * norm_b.sqrt())
                }
            },
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Metric::Euclidean => "euclidean",
            Metric::Manhattan => "manhattan",
            Metric::Cosine => "cosine",
        };
        f.write_str(name)
    }
}

impl FromStr for Metric {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "euclidean" => Ok(Metric::Euclidean),
            "manhattan" => Ok(Metric::Manhattan),
            "cosine" => Ok(Metric::Cosine),
            other => Err(Error::InvalidInput(format!("unknown distance metric '{}'", other))),
        }
    }
}

/// A row of the feature matrix together with its distance to the query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub row: usize,
    pub distance: f64,
}

/// Ascending distance, ties broken by the lower row index. There is no total order on floating
/// point numbers, so NaN distances are placed after everything else.
fn cmp_by_distance(a: &Neighbor, b: &Neighbor) -> Ordering {
    let by_distance = match (a.distance.is_nan(), b.distance.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.distance.partial_cmp(&b.distance).unwrap_or(Ordering::Equal),
    };

    by_distance.then_with(|| a.row.cmp(&b.row))
}

impl Eq for Neighbor {}

impl Ord for Neighbor {
    fn cmp(&self, other: &Self) -> Ordering {
        cmp_by_distance(self, other)
    }
}

impl PartialOrd for Neighbor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(cmp_by_distance(self, other))
    }
}

/// Keeps the `k` closest candidates in a max-heap whose top is the worst candidate retained so
/// far, and returns them closest first.
fn top_k<I>(candidates: I, k: usize) -> Vec<Neighbor>
    where I: Iterator<Item=Neighbor> {

    if k == 0 {
        return Vec::new();
    }

    let mut heap: BinaryHeap<Neighbor> = BinaryHeap::with_capacity(k);

    for candidate in candidates {
        if heap.len() < k {
            heap.push(candidate);
        } else if let Some(mut top) = heap.peek_mut() {
            if candidate < *top {
                *top = candidate;
            }
        }
    }

    heap.into_sorted_vec()
}

/// Persisted description of a fitted index. The brute-force index carries no learned state
/// beyond its metric, so the manifest mainly ties the index to the exact matrix it was fitted on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexManifest {
    pub metric: Metric,
    pub num_rows: usize,
    pub num_columns: usize,
    pub fingerprint: u64,
}

/// Exact nearest-neighbor search over every row of an `ItemFeatureMatrix`. Immutable once fitted;
/// a changed matrix needs a freshly fitted index.
#[derive(Debug, Clone)]
pub struct NeighborIndex {
    matrix: Arc<ItemFeatureMatrix>,
    metric: Metric,
    fingerprint: u64,
}

impl NeighborIndex {

    pub fn fit(matrix: Arc<ItemFeatureMatrix>, metric: Metric) -> Self {
        let fingerprint = matrix.fingerprint();
        NeighborIndex { matrix, metric, fingerprint }
    }

    /// Restores an index from its manifest, refusing a manifest fitted on a different matrix.
    pub fn from_manifest(matrix: Arc<ItemFeatureMatrix>, manifest: &IndexManifest) -> Result<Self> {

        if manifest.num_rows != matrix.num_rows() || manifest.num_columns != matrix.num_columns() {
            return Err(Error::InvalidArtifact(format!(
                "neighbor index was fitted on a {}x{} matrix, but the feature matrix is {}x{}",
                manifest.num_rows, manifest.num_columns, matrix.num_rows(), matrix.num_columns())));
        }

        let index = NeighborIndex::fit(matrix, manifest.metric);

        if index.fingerprint != manifest.fingerprint {
            return Err(Error::InvalidArtifact(
                "neighbor index was fitted on a different feature matrix, rebuild both".to_owned()));
        }

        Ok(index)
    }

    pub fn manifest(&self) -> IndexManifest {
        IndexManifest {
            metric: self.metric,
            num_rows: self.matrix.num_rows(),
            num_columns: self.matrix.num_columns(),
            fingerprint: self.fingerprint,
        }
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn matrix(&self) -> &ItemFeatureMatrix {
        &self.matrix
    }

    /// The `k` rows closest to an arbitrary query vector, closest first. Returns fewer than `k`
    /// neighbors if the matrix has fewer rows.
    pub fn kneighbors(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {

        if query.len() != self.matrix.num_columns() {
            return Err(Error::InvalidInput(format!(
                "query vector has {} dimensions, index expects {}",
                query.len(), self.matrix.num_columns())));
        }

        let metric = self.metric;
        let matrix = &self.matrix;
        let candidates = (0..matrix.num_rows())
            .map(|row| Neighbor { row, distance: metric.distance(query, matrix.row(row)) });

        Ok(top_k(candidates, k))
    }

    /// The `k` nearest neighbors of the row at `row_index`. The row itself is always returned
    /// first at distance zero, even if other rows carry an identical vector. A `k` of zero is
    /// treated as one.
    ///
    /// # Panics
    ///
    /// If `row_index` is out of bounds for the fitted matrix.
    pub fn query(&self, row_index: usize, k: usize) -> Vec<Neighbor> {

        let metric = self.metric;
        let matrix = &self.matrix;
        let query = matrix.row(row_index);

        let others = (0..matrix.num_rows())
            .filter(|row| *row != row_index)
            .map(|row| Neighbor { row, distance: metric.distance(query, matrix.row(row)) });

        let closest_others = top_k(others, k.max(1) - 1);

        let mut neighbors = Vec::with_capacity(closest_others.len() + 1);
        neighbors.push(Neighbor { row: row_index, distance: 0.0 });
        neighbors.extend(closest_others);

        neighbors
    }
}
