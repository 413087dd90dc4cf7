use crate::config::LayoutConfig;
use crate::layout_types::ResolvedItem;

/// Render-height model used by the ordering engine when it advances the
/// virtual skyline. The estimate only has to be consistent across columns
/// for the bin-packing comparisons to stay meaningful; it is not the pixel
/// height the positioner later computes.
///
/// The caption portion depends on string length and the deployed card
/// typography, so the model is a seam: swap the implementation rather than
/// re-tuning the engine when the visual design changes.
pub trait HeightEstimator: Send + Sync {
    fn estimate(&self, item: &ResolvedItem, span: usize) -> f64;
}

/// Default model: span-scaled image height from the aspect ratio, plus a
/// caption-line estimate from the title length, plus fixed card chrome.
pub struct CaptionAwareEstimator {
    nominal_column_width: f64,
    caption_line_height: f64,
    caption_chars_per_line: usize,
    card_chrome_height: f64,
}

impl CaptionAwareEstimator {
    pub fn new(config: &LayoutConfig) -> Self {
        CaptionAwareEstimator {
            nominal_column_width: config.nominal_column_width,
            caption_line_height: config.caption_line_height,
            caption_chars_per_line: config.caption_chars_per_line,
            card_chrome_height: config.card_chrome_height,
        }
    }

    fn caption_height(&self, item: &ResolvedItem, span: usize) -> f64 {
        let Some(title) = item.title.as_deref() else {
            return 0.0;
        };
        let title = title.trim();
        if title.is_empty() {
            return 0.0;
        }

        // A spanning card gets proportionally more caption width.
        let chars_per_line = self.caption_chars_per_line * span.max(1);
        let lines = title.chars().count().div_ceil(chars_per_line);
        lines as f64 * self.caption_line_height
    }
}

impl HeightEstimator for CaptionAwareEstimator {
    fn estimate(&self, item: &ResolvedItem, span: usize) -> f64 {
        let width = self.nominal_column_width * span.max(1) as f64;
        let image_height = width / item.aspect_ratio.max(f64::EPSILON);
        image_height + self.caption_height(item, span) + self.card_chrome_height
    }
}
