use log::{debug, info};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use crate::config::LayoutConfig;
use crate::height_estimator::HeightEstimator;
use crate::layout_types::{OrderingError, PrecomputedOrders, ResolvedItem};
use crate::ordering_engine::OrderingEngine;

/// Content-derived version marker for an item set. Input order does not
/// perturb it; adding, removing, or re-measuring an item does, which is
/// exactly when a cached precompute goes stale.
pub fn compute_fingerprint(items: &[ResolvedItem]) -> String {
    let mut lines: Vec<String> = items
        .iter()
        .map(|item| format!("{}:{:.6}", item.id, item.aspect_ratio))
        .collect();
    lines.sort();

    let mut hasher = Sha256::new();
    for line in &lines {
        hasher.update(line.as_bytes());
        hasher.update(b"\n");
    }
    format!("{:x}", hasher.finalize())
}

/// Runs the ordering engine once per column profile over the same resolved
/// item set. The aggregate stats are order-independent, so both results
/// share them; only the sequences differ.
pub fn precompute(
    items: &[ResolvedItem],
    config: &LayoutConfig,
    estimator: &dyn HeightEstimator,
) -> Result<PrecomputedOrders, OrderingError> {
    let engine = OrderingEngine::new(config, estimator);
    let narrow = engine.order(items, config.narrow_columns)?;
    let wide = engine.order(items, config.wide_columns)?;

    Ok(PrecomputedOrders {
        fingerprint: compute_fingerprint(items),
        narrow,
        wide,
    })
}

type OrderCell = Arc<OnceLock<Result<PrecomputedOrders, OrderingError>>>;

/// Fingerprint-keyed cache of precomputed orders. Each fingerprint gets a
/// single-flight cell: concurrent requests for the same item set block on
/// one computation instead of racing duplicates.
#[derive(Clone, Default)]
pub struct OrderCache {
    entries: Arc<Mutex<HashMap<String, OrderCell>>>,
}

impl OrderCache {
    pub fn new() -> Self {
        OrderCache::default()
    }

    pub fn get_or_compute<F>(
        &self,
        fingerprint: &str,
        compute: F,
    ) -> Result<PrecomputedOrders, OrderingError>
    where
        F: FnOnce() -> Result<PrecomputedOrders, OrderingError>,
    {
        let cell = {
            let mut entries = self
                .entries
                .lock()
                .expect("order cache lock should not be poisoned");
            entries.entry(fingerprint.to_string()).or_default().clone()
        };

        let mut computed_here = false;
        let outcome = cell.get_or_init(|| {
            computed_here = true;
            debug!("Computing orders for fingerprint {}", fingerprint);
            compute()
        });

        match outcome {
            Ok(orders) => {
                if computed_here {
                    info!(
                        "Cached orders for fingerprint {} ({} items)",
                        fingerprint, orders.narrow.total_items
                    );
                }
                Ok(orders.clone())
            }
            Err(e) => {
                // A failed computation is not worth pinning; the next
                // caller retries with presumably corrected input.
                self.invalidate(fingerprint);
                Err(e.clone())
            }
        }
    }

    pub fn get(&self, fingerprint: &str) -> Option<PrecomputedOrders> {
        let entries = self
            .entries
            .lock()
            .expect("order cache lock should not be poisoned");
        entries
            .get(fingerprint)
            .and_then(|cell| cell.get())
            .and_then(|outcome| outcome.as_ref().ok())
            .cloned()
    }

    pub fn invalidate(&self, fingerprint: &str) -> bool {
        let mut entries = self
            .entries
            .lock()
            .expect("order cache lock should not be poisoned");
        entries.remove(fingerprint).is_some()
    }

    pub fn clear(&self) {
        let mut entries = self
            .entries
            .lock()
            .expect("order cache lock should not be poisoned");
        entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .map(|entries| entries.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
