use std::env;

/// Placement heuristics for the ordering engine and positioner.
///
/// These were tuned against the reference gallery design; deployments with
/// different card chrome or typography should expect to adjust them via the
/// TURBO_GRID_* environment variables rather than editing code.
#[derive(Debug, Clone)]
pub struct LayoutConfig {
    /// Aspect ratio at or above which an item is classified as wide.
    pub wide_threshold: f64,
    /// Maximum consecutive wide placements before narrow items are forced in.
    pub max_wide_streak: u32,
    /// Narrow placements required after a wide streak before the next wide item.
    pub min_narrow_after_wide: u32,
    /// Exponent applied to span in the weighted score (`y / span^alpha`).
    pub span_bias_exponent: f64,
    /// When false, the score is the raw skyline height.
    pub weighted_scoring: bool,
    /// Column count of the narrow precompute profile.
    pub narrow_columns: usize,
    /// Column count of the wide precompute profile.
    pub wide_columns: usize,
    /// Gap between grid cells, in the caller's pixel unit.
    pub gap: f64,
    /// Nominal column width used by the ordering-time height model.
    pub nominal_column_width: f64,
    /// Caption line height used by the ordering-time height model.
    pub caption_line_height: f64,
    /// Characters per caption line on a single-column card.
    pub caption_chars_per_line: usize,
    /// Fixed card chrome (padding, metadata row) added to every estimate.
    pub card_chrome_height: f64,
    /// Aspect ratio substituted while an item's dimensions are unknown.
    pub fallback_aspect_ratio: f64,
    /// Fraction of items that must be loaded before the grid is revealed.
    pub progressive_ready_fraction: f64,
    /// Minimum loaded items before the grid is revealed (clamped to total).
    pub progressive_ready_min_count: usize,
}

#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Connect/read timeout for HEAD and ranged GET probes, in seconds.
    pub timeout_secs: u64,
    /// Upper bound on the ranged GET prefix, in bytes.
    pub max_prefix_bytes: usize,
    /// Concurrent in-flight probes per batch.
    pub concurrency: usize,
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum dimension cache entries before LRU eviction.
    pub dimension_capacity: usize,
    /// Dimension entry lifetime in seconds.
    pub dimension_ttl_secs: i64,
    /// Interval between background expiry sweeps, in seconds.
    pub sweep_interval_secs: u32,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub host: String,
    pub layout: LayoutConfig,
    pub probe: ProbeConfig,
    pub cache: CacheConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Config {
            port: env::var("TURBO_GRID_PORT")
                .unwrap_or_else(|_| "18590".to_string())
                .parse()?,
            host: env::var("TURBO_GRID_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            layout: LayoutConfig {
                wide_threshold: env::var("TURBO_GRID_WIDE_THRESHOLD")
                    .unwrap_or_else(|_| (16.0 / 9.0).to_string())
                    .parse()?,
                max_wide_streak: env::var("TURBO_GRID_MAX_WIDE_STREAK")
                    .unwrap_or_else(|_| "1".to_string())
                    .parse()?,
                min_narrow_after_wide: env::var("TURBO_GRID_MIN_NARROW_AFTER_WIDE")
                    .unwrap_or_else(|_| "2".to_string())
                    .parse()?,
                span_bias_exponent: env::var("TURBO_GRID_SPAN_BIAS_EXPONENT")
                    .unwrap_or_else(|_| "0.9".to_string())
                    .parse()?,
                weighted_scoring: env::var("TURBO_GRID_WEIGHTED_SCORING")
                    .unwrap_or_else(|_| "true".to_string())
                    .parse()?,
                narrow_columns: env::var("TURBO_GRID_NARROW_COLUMNS")
                    .unwrap_or_else(|_| "2".to_string())
                    .parse()?,
                wide_columns: env::var("TURBO_GRID_WIDE_COLUMNS")
                    .unwrap_or_else(|_| "4".to_string())
                    .parse()?,
                gap: env::var("TURBO_GRID_GAP")
                    .unwrap_or_else(|_| "16".to_string())
                    .parse()?,
                nominal_column_width: env::var("TURBO_GRID_NOMINAL_COLUMN_WIDTH")
                    .unwrap_or_else(|_| "320".to_string())
                    .parse()?,
                caption_line_height: env::var("TURBO_GRID_CAPTION_LINE_HEIGHT")
                    .unwrap_or_else(|_| "22".to_string())
                    .parse()?,
                caption_chars_per_line: env::var("TURBO_GRID_CAPTION_CHARS_PER_LINE")
                    .unwrap_or_else(|_| "38".to_string())
                    .parse()?,
                card_chrome_height: env::var("TURBO_GRID_CARD_CHROME_HEIGHT")
                    .unwrap_or_else(|_| "48".to_string())
                    .parse()?,
                fallback_aspect_ratio: env::var("TURBO_GRID_FALLBACK_ASPECT_RATIO")
                    .unwrap_or_else(|_| (4.0 / 3.0).to_string())
                    .parse()?,
                progressive_ready_fraction: env::var("TURBO_GRID_PROGRESSIVE_READY_FRACTION")
                    .unwrap_or_else(|_| "0.6".to_string())
                    .parse()?,
                progressive_ready_min_count: env::var("TURBO_GRID_PROGRESSIVE_READY_MIN_COUNT")
                    .unwrap_or_else(|_| "4".to_string())
                    .parse()?,
            },
            probe: ProbeConfig {
                timeout_secs: env::var("TURBO_GRID_PROBE_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()?,
                max_prefix_bytes: env::var("TURBO_GRID_PROBE_MAX_PREFIX_BYTES")
                    .unwrap_or_else(|_| "65536".to_string())
                    .parse()?,
                concurrency: env::var("TURBO_GRID_PROBE_CONCURRENCY")
                    .unwrap_or_else(|_| "4".to_string())
                    .parse()?,
            },
            cache: CacheConfig {
                dimension_capacity: env::var("TURBO_GRID_DIMENSION_CACHE_CAPACITY")
                    .unwrap_or_else(|_| "10000".to_string())
                    .parse()?,
                dimension_ttl_secs: env::var("TURBO_GRID_DIMENSION_CACHE_TTL_SECS")
                    .unwrap_or_else(|_| "86400".to_string())
                    .parse()?,
                sweep_interval_secs: env::var("TURBO_GRID_CACHE_SWEEP_INTERVAL_SECS")
                    .unwrap_or_else(|_| "600".to_string())
                    .parse()?,
            },
        })
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        LayoutConfig {
            wide_threshold: 16.0 / 9.0,
            max_wide_streak: 1,
            min_narrow_after_wide: 2,
            span_bias_exponent: 0.9,
            weighted_scoring: true,
            narrow_columns: 2,
            wide_columns: 4,
            gap: 16.0,
            nominal_column_width: 320.0,
            caption_line_height: 22.0,
            caption_chars_per_line: 38,
            card_chrome_height: 48.0,
            fallback_aspect_ratio: 4.0 / 3.0,
            progressive_ready_fraction: 0.6,
            progressive_ready_min_count: 4,
        }
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        ProbeConfig {
            timeout_secs: 5,
            max_prefix_bytes: 64 * 1024,
            concurrency: 4,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            dimension_capacity: 10_000,
            dimension_ttl_secs: 86_400,
            sweep_interval_secs: 600,
        }
    }
}
