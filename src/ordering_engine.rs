use log::warn;
use std::collections::HashSet;

use crate::config::LayoutConfig;
use crate::height_estimator::HeightEstimator;
use crate::layout_types::{OrderedResult, OrderingError, ResolvedItem};

/// Produces a display order that spreads wide items evenly across the grid
/// so the columns end up visually balanced.
///
/// The algorithm is constrained greedy best-fit bin packing: every
/// unplaced item is scored against every valid starting column, and the
/// globally cheapest placement wins. Two constraints shape the result:
/// streak limiting keeps wide items from clustering, and the weighted
/// score keeps spanning items from being perpetually deferred just for
/// being taller in aggregate.
pub struct OrderingEngine<'a> {
    config: &'a LayoutConfig,
    estimator: &'a dyn HeightEstimator,
}

struct Placement {
    pool_index: usize,
    start: usize,
    span: usize,
    base_y: f64,
}

impl<'a> OrderingEngine<'a> {
    pub fn new(config: &'a LayoutConfig, estimator: &'a dyn HeightEstimator) -> Self {
        OrderingEngine { config, estimator }
    }

    pub fn order(
        &self,
        items: &[ResolvedItem],
        column_count: usize,
    ) -> Result<OrderedResult, OrderingError> {
        self.validate(items, column_count)?;

        let (avg_aspect_ratio, wide_item_count) =
            aggregate_stats(items, self.config.wide_threshold);

        let mut heights = vec![0.0_f64; column_count];
        let mut pool: Vec<usize> = (0..items.len()).collect();
        let mut ordered_ids = Vec::with_capacity(items.len());
        let mut wide_streak = 0u32;
        let mut narrow_streak = 0u32;

        while !pool.is_empty() {
            let restrict_to_narrow = wide_streak >= self.config.max_wide_streak
                && narrow_streak < self.config.min_narrow_after_wide
                && pool.iter().any(|&i| !self.is_wide(&items[i]));

            let Some(placement) =
                self.best_placement(items, &pool, &heights, column_count, restrict_to_narrow)
            else {
                // The candidate filter always leaves a valid start when
                // column_count >= 1, so reaching this branch means an
                // invariant broke upstream.
                warn!(
                    "No placeable candidate among {} pooled items; appending remainder in input order",
                    pool.len()
                );
                for &index in &pool {
                    ordered_ids.push(items[index].id.clone());
                }
                break;
            };

            let item = &items[pool[placement.pool_index]];
            let render_height = self.estimator.estimate(item, placement.span);
            let new_height = placement.base_y + render_height + self.config.gap;
            for column in placement.start..placement.start + placement.span {
                heights[column] = new_height;
            }

            if self.is_wide(item) {
                wide_streak += 1;
                narrow_streak = 0;
            } else {
                narrow_streak += 1;
                if narrow_streak >= self.config.min_narrow_after_wide {
                    wide_streak = 0;
                }
            }

            ordered_ids.push(item.id.clone());
            pool.remove(placement.pool_index);
        }

        Ok(OrderedResult {
            column_count,
            ordered_ids,
            total_items: items.len(),
            avg_aspect_ratio,
            wide_item_count,
        })
    }

    fn validate(&self, items: &[ResolvedItem], column_count: usize) -> Result<(), OrderingError> {
        if column_count == 0 {
            return Err(OrderingError::InvalidColumnCount);
        }

        let mut seen = HashSet::with_capacity(items.len());
        for item in items {
            if !seen.insert(item.id.as_str()) {
                return Err(OrderingError::DuplicateId(item.id.clone()));
            }
            if !(item.aspect_ratio.is_finite() && item.aspect_ratio > 0.0) {
                return Err(OrderingError::InvalidAspectRatio(item.id.clone()));
            }
        }

        Ok(())
    }

    fn is_wide(&self, item: &ResolvedItem) -> bool {
        item.aspect_ratio >= self.config.wide_threshold
    }

    fn span_for(&self, item: &ResolvedItem, column_count: usize) -> usize {
        if self.is_wide(item) {
            2.min(column_count)
        } else {
            1
        }
    }

    /// Scans every candidate against every valid start and returns the
    /// globally cheapest placement. Ties prefer the smaller span; beyond
    /// that the earliest candidate and leftmost start win, which keeps the
    /// scan deterministic for identical input.
    fn best_placement(
        &self,
        items: &[ResolvedItem],
        pool: &[usize],
        heights: &[f64],
        column_count: usize,
        restrict_to_narrow: bool,
    ) -> Option<Placement> {
        let mut best: Option<(f64, Placement)> = None;

        for (pool_index, &item_index) in pool.iter().enumerate() {
            let item = &items[item_index];
            if restrict_to_narrow && self.is_wide(item) {
                continue;
            }

            let span = self.span_for(item, column_count);
            for start in 0..=column_count - span {
                let base_y = heights[start..start + span]
                    .iter()
                    .cloned()
                    .fold(f64::MIN, f64::max);
                let score = if self.config.weighted_scoring {
                    base_y / (span as f64).powf(self.config.span_bias_exponent)
                } else {
                    base_y
                };

                if !score.is_finite() {
                    continue;
                }

                let replace = match &best {
                    None => true,
                    Some((best_score, best_placement)) => {
                        score < *best_score
                            || (score == *best_score && span < best_placement.span)
                    }
                };

                if replace {
                    best = Some((
                        score,
                        Placement {
                            pool_index,
                            start,
                            span,
                            base_y,
                        },
                    ));
                }
            }
        }

        best.map(|(_, placement)| placement)
    }
}

/// Order-independent aggregates shared by both precompute profiles.
pub fn aggregate_stats(items: &[ResolvedItem], wide_threshold: f64) -> (f64, usize) {
    if items.is_empty() {
        return (0.0, 0);
    }

    let sum: f64 = items.iter().map(|item| item.aspect_ratio).sum();
    let wide = items
        .iter()
        .filter(|item| item.aspect_ratio >= wide_threshold)
        .count();

    (sum / items.len() as f64, wide)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::height_estimator::CaptionAwareEstimator;

    fn item(id: &str, aspect_ratio: f64) -> ResolvedItem {
        ResolvedItem {
            id: id.to_string(),
            aspect_ratio,
            title: None,
        }
    }

    fn order(items: &[ResolvedItem], columns: usize) -> Result<OrderedResult, OrderingError> {
        let config = LayoutConfig::default();
        let estimator = CaptionAwareEstimator::new(&config);
        OrderingEngine::new(&config, &estimator).order(items, columns)
    }

    #[test]
    fn test_empty_input_yields_empty_result() {
        let result = order(&[], 3).unwrap();
        assert!(result.ordered_ids.is_empty());
        assert_eq!(result.total_items, 0);
        assert_eq!(result.avg_aspect_ratio, 0.0);
    }

    #[test]
    fn test_zero_columns_rejected() {
        let items = vec![item("a", 1.0)];
        assert!(matches!(
            order(&items, 0),
            Err(OrderingError::InvalidColumnCount)
        ));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let items = vec![item("a", 1.0), item("a", 1.5)];
        assert!(matches!(
            order(&items, 2),
            Err(OrderingError::DuplicateId(id)) if id == "a"
        ));
    }

    #[test]
    fn test_non_positive_aspect_ratio_rejected() {
        let items = vec![item("a", 0.0)];
        assert!(matches!(
            order(&items, 2),
            Err(OrderingError::InvalidAspectRatio(_))
        ));
    }

    #[test]
    fn test_output_is_permutation() {
        let items: Vec<ResolvedItem> = (0..20)
            .map(|i| item(&format!("item-{}", i), 0.5 + (i as f64) * 0.11))
            .collect();
        let result = order(&items, 4).unwrap();

        assert_eq!(result.ordered_ids.len(), items.len());
        let mut sorted = result.ordered_ids.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), items.len());
    }

    #[test]
    fn test_single_column_accepts_wide_items() {
        let items = vec![item("w1", 2.0), item("n1", 1.0), item("w2", 2.2)];
        let result = order(&items, 1).unwrap();
        assert_eq!(result.ordered_ids.len(), 3);
        assert_eq!(result.wide_item_count, 2);
    }

    #[test]
    fn test_all_wide_pool_is_not_deadlocked() {
        // With nothing narrow to interleave, the streak filter must not
        // starve the loop.
        let items: Vec<ResolvedItem> = (0..6)
            .map(|i| item(&format!("w-{}", i), 2.0))
            .collect();
        let result = order(&items, 4).unwrap();
        assert_eq!(result.ordered_ids.len(), 6);
    }

    #[test]
    fn test_determinism() {
        let items: Vec<ResolvedItem> = (0..30)
            .map(|i| item(&format!("item-{}", i), 0.4 + ((i * 7) % 13) as f64 * 0.17))
            .collect();
        let first = order(&items, 4).unwrap();
        let second = order(&items, 4).unwrap();
        assert_eq!(first.ordered_ids, second.ordered_ids);
    }

    #[test]
    fn test_aggregate_stats() {
        let items = vec![item("a", 1.0), item("b", 2.0), item("c", 3.0)];
        let (avg, wide) = aggregate_stats(&items, 16.0 / 9.0);
        assert!((avg - 2.0).abs() < 1e-9);
        assert_eq!(wide, 2);
    }
}
