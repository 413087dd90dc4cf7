pub mod config;
pub mod dimension_cache;
pub mod dimension_resolver;
pub mod height_estimator;
pub mod image_origin;
pub mod image_probe;
pub mod layout_types;
pub mod maintenance;
pub mod order_precompute;
pub mod ordering_engine;
pub mod skyline_positioner;
pub mod warp_handlers;
pub mod warp_helpers;
