//! Neighbour-based learners: k-nearest neighbours and nearest centroid
//!
//! Neighbour search is a brute-force scan that keeps the k closest training
//! rows in a bounded max-heap. Query rows are processed in parallel.

use super::{argmax, check_fit_input, check_predict_input, class_labels, class_index, Estimator};
use crate::error::{Result, SelectionError};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Heap entry ordered by distance, then by training row so ties are stable
#[derive(PartialEq)]
struct Neighbor {
    distance: f64,
    row: usize,
}

impl Eq for Neighbor {}

impl PartialOrd for Neighbor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Neighbor {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .partial_cmp(&other.distance)
            .unwrap_or(Ordering::Equal)
            .then(self.row.cmp(&other.row))
    }
}

fn squared_distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(u, v)| (u - v) * (u - v)).sum()
}

/// Training-row indices of the `k` nearest neighbours of `point`
fn k_nearest(point: ArrayView1<f64>, x_train: &Array2<f64>, k: usize) -> Vec<usize> {
    let mut heap = BinaryHeap::with_capacity(k + 1);
    for (row, train) in x_train.axis_iter(Axis(0)).enumerate() {
        let candidate = Neighbor {
            distance: squared_distance(point, train),
            row,
        };
        if heap.len() < k {
            heap.push(candidate);
        } else if let Some(top) = heap.peek() {
            if candidate < *top {
                heap.pop();
                heap.push(candidate);
            }
        }
    }
    heap.into_iter().map(|n| n.row).collect()
}

/// Stored training set shared by the neighbour learners
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Memory {
    x: Array2<f64>,
    y: Array1<f64>,
}

impl Memory {
    fn neighbours(&self, x: &Array2<f64>, k: usize) -> Result<Vec<Vec<usize>>> {
        check_predict_input(x, self.x.ncols())?;
        let k = k.min(self.x.nrows()).max(1);
        Ok(x
            .axis_iter(Axis(0))
            .into_par_iter()
            .map(|row| k_nearest(row, &self.x, k))
            .collect())
    }
}

/// k-nearest-neighbour classifier with uniform weights
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KNeighborsClassifier {
    pub n_neighbors: usize,
    memory: Option<Memory>,
    classes: Vec<f64>,
}

impl Default for KNeighborsClassifier {
    fn default() -> Self {
        Self::new(5)
    }
}

impl KNeighborsClassifier {
    pub fn new(n_neighbors: usize) -> Self {
        Self {
            n_neighbors: n_neighbors.max(1),
            memory: None,
            classes: Vec::new(),
        }
    }
}

impl Estimator for KNeighborsClassifier {
    fn name(&self) -> &'static str {
        "KNeighborsClassifier"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        self.classes = class_labels(y);
        self.memory = Some(Memory { x: x.clone(), y: y.clone() });
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let memory = self.memory.as_ref().ok_or(SelectionError::ModelNotFitted)?;
        let neighbours = memory.neighbours(x, self.n_neighbors)?;
        Ok(neighbours
            .iter()
            .map(|rows| {
                // Majority vote; ties go to the smallest label
                let mut counts = Array1::<f64>::zeros(self.classes.len());
                for &r in rows {
                    counts[class_index(&self.classes, memory.y[r])] += 1.0;
                }
                self.classes[argmax(counts.view())]
            })
            .collect())
    }
}

/// k-nearest-neighbour regressor averaging neighbour targets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KNeighborsRegressor {
    pub n_neighbors: usize,
    memory: Option<Memory>,
}

impl Default for KNeighborsRegressor {
    fn default() -> Self {
        Self::new(5)
    }
}

impl KNeighborsRegressor {
    pub fn new(n_neighbors: usize) -> Self {
        Self {
            n_neighbors: n_neighbors.max(1),
            memory: None,
        }
    }
}

impl Estimator for KNeighborsRegressor {
    fn name(&self) -> &'static str {
        "KNeighborsRegressor"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        self.memory = Some(Memory { x: x.clone(), y: y.clone() });
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let memory = self.memory.as_ref().ok_or(SelectionError::ModelNotFitted)?;
        let neighbours = memory.neighbours(x, self.n_neighbors)?;
        Ok(neighbours
            .iter()
            .map(|rows| rows.iter().map(|&r| memory.y[r]).sum::<f64>() / rows.len() as f64)
            .collect())
    }
}

/// Assigns each row to the class with the closest mean
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NearestCentroid {
    centroids: Option<Array2<f64>>,
    classes: Vec<f64>,
}

impl NearestCentroid {
    pub fn centroids(&self) -> Option<&Array2<f64>> {
        self.centroids.as_ref()
    }
}

impl Estimator for NearestCentroid {
    fn name(&self) -> &'static str {
        "NearestCentroid"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        self.classes = class_labels(y);
        let mut centroids = Array2::<f64>::zeros((self.classes.len(), x.ncols()));
        let mut counts = vec![0usize; self.classes.len()];
        for (row, &label) in x.axis_iter(Axis(0)).zip(y.iter()) {
            let k = class_index(&self.classes, label);
            centroids.row_mut(k).scaled_add(1.0, &row);
            counts[k] += 1;
        }
        for (k, mut centroid) in centroids.axis_iter_mut(Axis(0)).enumerate() {
            centroid /= counts[k].max(1) as f64;
        }
        self.centroids = Some(centroids);
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let centroids = self.centroids.as_ref().ok_or(SelectionError::ModelNotFitted)?;
        check_predict_input(x, centroids.ncols())?;
        Ok(x
            .axis_iter(Axis(0))
            .map(|row| {
                let distances: Array1<f64> = centroids
                    .axis_iter(Axis(0))
                    .map(|c| -squared_distance(row, c))
                    .collect();
                self.classes[argmax(distances.view())]
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn two_clusters() -> (Array2<f64>, Array1<f64>) {
        let x = array![
            [0.0, 0.0],
            [0.1, 0.2],
            [0.2, 0.1],
            [5.0, 5.0],
            [5.1, 4.9],
            [4.8, 5.2],
        ];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        (x, y)
    }

    #[test]
    fn test_one_nn_memorises() {
        let (x, y) = two_clusters();
        let mut model = KNeighborsClassifier::new(1);
        model.fit(&x, &y).unwrap();
        assert_eq!(model.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_k_larger_than_training_set() {
        let (x, y) = two_clusters();
        let mut model = KNeighborsClassifier::new(50);
        model.fit(&x, &y).unwrap();
        // Every row sees all six neighbours: a 3-3 tie resolves to class 0
        assert_eq!(model.predict(&array![[5.0, 5.0]]).unwrap(), array![0.0]);
    }

    #[test]
    fn test_knn_regressor_averages() {
        let x = array![[0.0], [1.0], [2.0], [10.0]];
        let y = array![1.0, 2.0, 3.0, 100.0];
        let mut model = KNeighborsRegressor::new(3);
        model.fit(&x, &y).unwrap();
        let pred = model.predict(&array![[1.0]]).unwrap();
        assert!((pred[0] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_nearest_centroid() {
        let (x, y) = two_clusters();
        let mut model = NearestCentroid::default();
        model.fit(&x, &y).unwrap();
        assert_eq!(model.predict(&array![[0.5, 0.5], [4.0, 4.0]]).unwrap(), array![0.0, 1.0]);
        let centroids = model.centroids().unwrap();
        assert!((centroids[[0, 0]] - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_predict_before_fit() {
        let model = KNeighborsRegressor::default();
        assert!(model.predict(&array![[1.0]]).is_err());
    }
}
