use log::warn;
use std::collections::HashMap;

use crate::config::LayoutConfig;
use crate::layout_types::{GridItem, LayoutItem, LayoutSnapshot};

/// Converts a precomputed order into absolute pixel positions for the live
/// column count, tolerating items whose dimensions have not arrived yet.
///
/// Ordering decisions are frozen in `ordered_ids`; this pass never
/// re-orders and never applies streak limiting. It does recompute
/// wide/span from the freshest known aspect ratio, since dimensions may
/// have been estimates at order time; positioning always reflects current
/// geometry. Pure function of its inputs: calling it again with the same
/// snapshot of dimensions reproduces the same coordinates.
pub fn position(
    ordered_ids: &[String],
    items: &[GridItem],
    column_count: usize,
    container_width: f64,
    config: &LayoutConfig,
) -> LayoutSnapshot {
    let column_count = if column_count == 0 {
        warn!("Positioner called with zero columns; using one");
        1
    } else {
        column_count
    };

    let by_id: HashMap<&str, &GridItem> = items.iter().map(|item| (item.id.as_str(), item)).collect();

    let gap = config.gap;
    let column_width =
        ((container_width - gap * (column_count as f64 - 1.0)) / column_count as f64).max(0.0);

    let mut heights = vec![0.0_f64; column_count];
    let mut layout_items = Vec::with_capacity(ordered_ids.len());
    let mut container_height = 0.0_f64;
    let mut loaded_items = 0usize;

    for id in ordered_ids {
        let Some(item) = by_id.get(id.as_str()) else {
            warn!("Ordered id {} is missing from the live item set; skipping", id);
            continue;
        };

        let dimension = item.dimension();
        let is_loaded = dimension.is_some();
        let aspect_ratio = dimension
            .map(|d| d.aspect_ratio())
            .unwrap_or(config.fallback_aspect_ratio);
        if is_loaded {
            loaded_items += 1;
        }

        let is_wide = aspect_ratio >= config.wide_threshold;
        let span = if is_wide { 2.min(column_count) } else { 1 };

        let (start, base_y) = best_start(&heights, span);
        let width = column_width * span as f64 + gap * (span as f64 - 1.0);
        let height = width / aspect_ratio;

        let new_height = base_y + height + gap;
        for column in start..start + span {
            heights[column] = new_height;
        }
        container_height = container_height.max(base_y + height);

        layout_items.push(LayoutItem {
            id: id.clone(),
            x: start as f64 * (column_width + gap),
            y: base_y,
            width,
            height,
            span,
            aspect_ratio,
            is_wide,
            is_loaded,
        });
    }

    let total_items = layout_items.len();
    let loading_progress = if total_items == 0 {
        1.0
    } else {
        loaded_items as f64 / total_items as f64
    };
    let ready_count = config.progressive_ready_min_count.min(total_items);
    let is_progressive_ready =
        loading_progress >= config.progressive_ready_fraction && loaded_items >= ready_count;

    LayoutSnapshot {
        items: layout_items,
        container_height,
        total_items,
        loaded_items,
        loading_progress,
        is_progressive_ready,
        is_layout_ready: loaded_items == total_items,
    }
}

/// Lowest-skyline start for the given span; leftmost wins ties.
fn best_start(heights: &[f64], span: usize) -> (usize, f64) {
    let mut best_start = 0usize;
    let mut best_y = f64::INFINITY;

    for start in 0..=heights.len() - span {
        let y = heights[start..start + span]
            .iter()
            .cloned()
            .fold(f64::MIN, f64::max);
        if y < best_y {
            best_y = y;
            best_start = start;
        }
    }

    (best_start, best_y)
}
