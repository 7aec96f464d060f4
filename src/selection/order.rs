//! Best-first evaluation order from meta-model predictions

use super::catalog::{CandidateSpec, Catalog};
use super::meta_model::MetaModelStore;
use crate::config::SelectorConfig;
use crate::error::{Result, SelectionError};
use crate::meta_features::MetaFeatures;
use std::cmp::Ordering;
use tracing::{debug, info};

/// Orders catalog candidates by predicted relative landmark.
///
/// Without a time budget there is nothing to prioritise and the catalog
/// order is returned as is; meta-models are then never loaded.
#[derive(Debug, Clone)]
pub struct OrderPredictor {
    store: Option<MetaModelStore>,
}

impl OrderPredictor {
    /// Catalog order, no meta-models
    pub fn unordered() -> Self {
        Self { store: None }
    }

    /// Rank with the given meta-models
    pub fn with_store(store: MetaModelStore) -> Self {
        Self { store: Some(store) }
    }

    /// Loads meta-models only when `config` sets a time budget
    pub fn from_config(config: &SelectorConfig, catalog: &Catalog) -> Result<Self> {
        if config.time_limit()?.is_none() {
            return Ok(Self::unordered());
        }
        let base = config.meta_model_dir.as_deref().ok_or_else(|| {
            SelectionError::ConfigError("a time limit requires meta_model_dir to order candidates".to_string())
        })?;
        let store = MetaModelStore::load(base, config.problem_class, catalog)?;
        Ok(Self::with_store(store))
    }

    pub fn is_ordering(&self) -> bool {
        self.store.is_some()
    }

    /// Candidates in evaluation order. Ties and NaN predictions keep catalog
    /// order, NaN after every finite prediction.
    pub fn predict_order(&self, catalog: &Catalog, meta: &MetaFeatures) -> Result<Vec<CandidateSpec>> {
        let store = match &self.store {
            Some(store) => store,
            None => return Ok(catalog.entries().to_vec()),
        };

        let mut scored = catalog
            .iter()
            .map(|spec| {
                let predicted = store.predict(spec.id(), meta)?;
                debug!(candidate = spec.id(), predicted, "Predicted relative landmark");
                Ok((predicted, spec.clone()))
            })
            .collect::<Result<Vec<(f64, CandidateSpec)>>>()?;

        // Stable sort, descending
        scored.sort_by(|(a, _), (b, _)| descending(*a, *b));
        let order: Vec<CandidateSpec> = scored.into_iter().map(|(_, spec)| spec).collect();
        info!(
            first = order.first().map(CandidateSpec::id).unwrap_or("-"),
            n_candidates = order.len(),
            "Evaluation order predicted"
        );
        Ok(order)
    }
}

/// Descending order with NaN last
pub(crate) fn descending(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}
