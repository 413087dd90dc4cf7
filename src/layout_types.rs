use serde::{Deserialize, Serialize};

/// Resolved pixel dimensions of an image. Immutable once resolved for a
/// given reference; width and height are always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimension {
    pub width: u32,
    pub height: u32,
}

impl Dimension {
    pub fn new(width: u32, height: u32) -> Option<Self> {
        if width == 0 || height == 0 {
            return None;
        }
        Some(Dimension { width, height })
    }

    pub fn aspect_ratio(&self) -> f64 {
        self.width as f64 / self.height as f64
    }

    /// Swaps width and height. Used when EXIF orientation indicates a
    /// 90°/270° rotation of the stored pixel grid.
    pub fn transposed(self) -> Self {
        Dimension {
            width: self.height,
            height: self.width,
        }
    }
}

/// One gallery item as supplied by the caller. Dimensions are optional:
/// when absent the resolver discovers them from the image reference, and
/// the positioner substitutes a fallback ratio until it does.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridItem {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl GridItem {
    pub fn dimension(&self) -> Option<Dimension> {
        match (self.width, self.height) {
            (Some(w), Some(h)) => Dimension::new(w, h),
            _ => None,
        }
    }
}

/// An item with its aspect ratio settled, ready for the ordering engine.
#[derive(Debug, Clone)]
pub struct ResolvedItem {
    pub id: String,
    pub aspect_ratio: f64,
    pub title: Option<String>,
}

/// Output of one ordering run: a permutation of the input ids plus
/// order-independent aggregate stats.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderedResult {
    pub column_count: usize,
    pub ordered_ids: Vec<String>,
    pub total_items: usize,
    pub avg_aspect_ratio: f64,
    pub wide_item_count: usize,
}

/// Both precomputed orders plus the fingerprint of the item set they were
/// derived from. Consumers pick `narrow` or `wide` by their live column
/// count and use the fingerprint to detect staleness.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrecomputedOrders {
    pub fingerprint: String,
    pub narrow: OrderedResult,
    pub wide: OrderedResult,
}

/// Absolute placement of a single item produced by the skyline positioner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutItem {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub span: usize,
    pub aspect_ratio: f64,
    pub is_wide: bool,
    pub is_loaded: bool,
}

/// A full layout pass. Pure function of the inputs it was computed from;
/// re-invoking with more dimensions resolved yields a fresh snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutSnapshot {
    pub items: Vec<LayoutItem>,
    pub container_height: f64,
    pub total_items: usize,
    pub loaded_items: usize,
    pub loading_progress: f64,
    pub is_progressive_ready: bool,
    pub is_layout_ready: bool,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum OrderingError {
    #[error("column count must be at least 1")]
    InvalidColumnCount,
    #[error("duplicate item id: {0}")]
    DuplicateId(String),
    #[error("item {0} has a non-positive aspect ratio")]
    InvalidAspectRatio(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("item has no image reference and no supplied dimensions")]
    MissingReference,
    #[error("origin request failed: {0}")]
    Origin(String),
    #[error("origin returned status {0}")]
    Status(u16),
    #[error("could not decode dimensions from {0} prefix bytes")]
    Undecodable(usize),
    #[error("probe task failed: {0}")]
    Task(String),
}

pub type ResolveResult<T> = Result<T, ResolveError>;
