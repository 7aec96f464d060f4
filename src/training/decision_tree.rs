//! CART decision trees with exhaustive or randomized split search

use super::{check_fit_input, check_predict_input, class_labels, encode_classes, Estimator};
use crate::error::{Result, SelectionError};
use ndarray::{Array1, Array2, ArrayView1};
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    Leaf {
        value: f64,
        n_samples: usize,
    },
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
    },
}

/// Impurity criterion
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Criterion {
    /// Gini impurity (classification)
    Gini,
    /// Mean squared error (regression)
    MSE,
}

/// How split thresholds are searched
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Splitter {
    /// Every midpoint between consecutive distinct values
    Best,
    /// One uniformly drawn threshold per candidate feature
    Random,
}

/// Number of features considered at each split
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum MaxFeatures {
    All,
    Sqrt,
    Fixed(usize),
}

impl MaxFeatures {
    fn resolve(&self, n_features: usize) -> usize {
        let n = match self {
            MaxFeatures::All => n_features,
            MaxFeatures::Sqrt => (n_features as f64).sqrt().floor() as usize,
            MaxFeatures::Fixed(k) => *k,
        };
        n.clamp(1, n_features.max(1))
    }
}

/// Targets as seen by the split search
enum Target<'a> {
    Classes { codes: &'a [usize], n_classes: usize },
    Values(&'a Array1<f64>),
}

/// Running sufficient statistics of one side of a split
#[derive(Clone)]
struct NodeStats {
    n: usize,
    sum: f64,
    sq_sum: f64,
    counts: Vec<usize>,
}

impl NodeStats {
    fn empty(target: &Target<'_>) -> Self {
        let n_classes = match target {
            Target::Classes { n_classes, .. } => *n_classes,
            Target::Values(_) => 0,
        };
        Self {
            n: 0,
            sum: 0.0,
            sq_sum: 0.0,
            counts: vec![0; n_classes],
        }
    }

    fn of(target: &Target<'_>, indices: &[usize]) -> Self {
        let mut stats = Self::empty(target);
        for &i in indices {
            stats.add(target, i);
        }
        stats
    }

    fn add(&mut self, target: &Target<'_>, i: usize) {
        self.n += 1;
        match target {
            Target::Classes { codes, .. } => self.counts[codes[i]] += 1,
            Target::Values(y) => {
                self.sum += y[i];
                self.sq_sum += y[i] * y[i];
            }
        }
    }

    fn remove(&mut self, target: &Target<'_>, i: usize) {
        self.n -= 1;
        match target {
            Target::Classes { codes, .. } => self.counts[codes[i]] -= 1,
            Target::Values(y) => {
                self.sum -= y[i];
                self.sq_sum -= y[i] * y[i];
            }
        }
    }

    fn impurity(&self, criterion: Criterion) -> f64 {
        if self.n == 0 {
            return 0.0;
        }
        let n = self.n as f64;
        match criterion {
            Criterion::Gini => 1.0 - self.counts.iter().map(|&c| (c as f64 / n).powi(2)).sum::<f64>(),
            Criterion::MSE => (self.sq_sum / n - (self.sum / n).powi(2)).max(0.0),
        }
    }
}

/// Best split found for one feature: (feature, threshold, weighted child impurity)
type SplitCandidate = (usize, f64, f64);

/// Decision tree model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    root: Option<TreeNode>,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    pub splitter: Splitter,
    pub random_state: Option<u64>,
    criterion: Criterion,
    is_classification: bool,
    n_features: usize,
    classes: Vec<f64>,
}

impl DecisionTree {
    /// Gini tree predicting labels
    pub fn classifier() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::All,
            splitter: Splitter::Best,
            random_state: None,
            criterion: Criterion::Gini,
            is_classification: true,
            n_features: 0,
            classes: Vec::new(),
        }
    }

    /// Squared-error tree predicting leaf means
    pub fn regressor() -> Self {
        Self {
            criterion: Criterion::MSE,
            is_classification: false,
            ..Self::classifier()
        }
    }

    /// Single extremely randomized tree; considers `sqrt` features for
    /// classification and all features for regression
    pub fn extra_tree(is_classification: bool) -> Self {
        let base = if is_classification {
            Self::classifier().with_max_features(MaxFeatures::Sqrt)
        } else {
            Self::regressor()
        };
        base.with_splitter(Splitter::Random)
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples.max(1);
        self
    }

    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    pub fn with_splitter(mut self, splitter: Splitter) -> Self {
        self.splitter = splitter;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Fit the tree to training data
    pub fn fit_tree(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        self.n_features = x.ncols();

        let codes;
        let target = if self.is_classification {
            self.classes = class_labels(y);
            codes = encode_classes(&self.classes, y);
            Target::Classes {
                codes: &codes,
                n_classes: self.classes.len(),
            }
        } else {
            Target::Values(y)
        };

        let mut rng = match self.random_state {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        let indices: Vec<usize> = (0..x.nrows()).collect();
        self.root = Some(self.build_tree(x, &target, &indices, 0, &mut rng));
        Ok(())
    }

    fn build_tree(
        &self,
        x: &Array2<f64>,
        target: &Target<'_>,
        indices: &[usize],
        depth: usize,
        rng: &mut ChaCha8Rng,
    ) -> TreeNode {
        let n_samples = indices.len();
        let stats = NodeStats::of(target, indices);
        let parent_impurity = stats.impurity(self.criterion);

        let should_stop = n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || self.max_depth.map_or(false, |d| depth >= d)
            || parent_impurity <= 1e-12;

        if !should_stop {
            if let Some((feature_idx, threshold, child_impurity)) = self.find_split(x, target, indices, rng) {
                if child_impurity < parent_impurity - 1e-12 {
                    let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
                        .iter()
                        .partition(|&&i| x[[i, feature_idx]] <= threshold);

                    if !left_indices.is_empty() && !right_indices.is_empty() {
                        let left = Box::new(self.build_tree(x, target, &left_indices, depth + 1, rng));
                        let right = Box::new(self.build_tree(x, target, &right_indices, depth + 1, rng));
                        return TreeNode::Split {
                            feature_idx,
                            threshold,
                            left,
                            right,
                            n_samples,
                        };
                    }
                }
            }
        }

        TreeNode::Leaf {
            value: self.leaf_value(&stats),
            n_samples,
        }
    }

    fn candidate_features(&self, rng: &mut ChaCha8Rng) -> Vec<usize> {
        let k = self.max_features.resolve(self.n_features);
        if k >= self.n_features {
            (0..self.n_features).collect()
        } else {
            sample(rng, self.n_features, k).into_vec()
        }
    }

    fn find_split(
        &self,
        x: &Array2<f64>,
        target: &Target<'_>,
        indices: &[usize],
        rng: &mut ChaCha8Rng,
    ) -> Option<SplitCandidate> {
        let features = self.candidate_features(rng);
        let results: Vec<Option<SplitCandidate>> = match self.splitter {
            Splitter::Best => features
                .par_iter()
                .map(|&f| self.best_threshold(x.column(f), f, target, indices))
                .collect(),
            Splitter::Random => features
                .iter()
                .map(|&f| {
                    let column = x.column(f);
                    let (lo, hi) = indices.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &i| {
                        (lo.min(column[i]), hi.max(column[i]))
                    });
                    if hi <= lo {
                        return None;
                    }
                    let threshold = rng.gen_range(lo..hi);
                    self.evaluate_threshold(column, f, threshold, target, indices)
                })
                .collect(),
        };

        results
            .into_iter()
            .flatten()
            .min_by(|a, b| a.2.partial_cmp(&b.2).unwrap_or(std::cmp::Ordering::Equal))
    }

    fn best_threshold(
        &self,
        column: ArrayView1<f64>,
        feature_idx: usize,
        target: &Target<'_>,
        indices: &[usize],
    ) -> Option<SplitCandidate> {
        let mut order = indices.to_vec();
        order.sort_by(|&a, &b| column[a].partial_cmp(&column[b]).unwrap_or(std::cmp::Ordering::Equal));

        let n = order.len();
        let mut left = NodeStats::empty(target);
        let mut right = NodeStats::of(target, &order);
        let mut best: Option<SplitCandidate> = None;

        for pos in 0..n.saturating_sub(1) {
            let i = order[pos];
            left.add(target, i);
            right.remove(target, i);

            let (value, next) = (column[i], column[order[pos + 1]]);
            if value >= next {
                continue;
            }
            if left.n < self.min_samples_leaf || right.n < self.min_samples_leaf {
                continue;
            }

            let weighted = (left.n as f64 * left.impurity(self.criterion)
                + right.n as f64 * right.impurity(self.criterion))
                / n as f64;
            if best.map_or(true, |(_, _, b)| weighted < b) {
                let mid = value + (next - value) / 2.0;
                let threshold = if mid < next { mid } else { value };
                best = Some((feature_idx, threshold, weighted));
            }
        }
        best
    }

    fn evaluate_threshold(
        &self,
        column: ArrayView1<f64>,
        feature_idx: usize,
        threshold: f64,
        target: &Target<'_>,
        indices: &[usize],
    ) -> Option<SplitCandidate> {
        let mut left = NodeStats::empty(target);
        let mut right = NodeStats::empty(target);
        for &i in indices {
            if column[i] <= threshold {
                left.add(target, i);
            } else {
                right.add(target, i);
            }
        }
        if left.n < self.min_samples_leaf || right.n < self.min_samples_leaf {
            return None;
        }
        let weighted = (left.n as f64 * left.impurity(self.criterion)
            + right.n as f64 * right.impurity(self.criterion))
            / indices.len() as f64;
        Some((feature_idx, threshold, weighted))
    }

    fn leaf_value(&self, stats: &NodeStats) -> f64 {
        if stats.n == 0 {
            return 0.0;
        }
        if self.is_classification {
            // Most frequent class, lowest label on ties
            let mut best = 0;
            for (k, &c) in stats.counts.iter().enumerate() {
                if c > stats.counts[best] {
                    best = k;
                }
            }
            self.classes[best]
        } else {
            stats.sum / stats.n as f64
        }
    }

    /// Make predictions
    pub fn predict_tree(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.root.as_ref().ok_or(SelectionError::ModelNotFitted)?;
        check_predict_input(x, self.n_features)?;
        Ok(x.rows().into_iter().map(|row| predict_row(root, row)).collect())
    }

    /// Depth of the fitted tree, counting the root as level 1
    pub fn get_depth(&self) -> usize {
        fn depth(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 1,
                TreeNode::Split { left, right, .. } => 1 + depth(left).max(depth(right)),
            }
        }
        self.root.as_ref().map_or(0, depth)
    }

    pub fn get_n_leaves(&self) -> usize {
        fn leaves(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 1,
                TreeNode::Split { left, right, .. } => leaves(left) + leaves(right),
            }
        }
        self.root.as_ref().map_or(0, leaves)
    }
}

fn predict_row(mut node: &TreeNode, row: ArrayView1<f64>) -> f64 {
    loop {
        match node {
            TreeNode::Leaf { value, .. } => return *value,
            TreeNode::Split {
                feature_idx,
                threshold,
                left,
                right,
                ..
            } => {
                node = if row[*feature_idx] <= *threshold { left } else { right };
            }
        }
    }
}

impl Estimator for DecisionTree {
    fn name(&self) -> &'static str {
        match (self.is_classification, self.splitter) {
            (true, Splitter::Best) => "DecisionTreeClassifier",
            (true, Splitter::Random) => "ExtraTreeClassifier",
            (false, Splitter::Best) => "DecisionTreeRegressor",
            (false, Splitter::Random) => "ExtraTreeRegressor",
        }
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.fit_tree(x, y)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.predict_tree(x)
    }
}
