use serde::Deserialize;
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use warp::{reject, Rejection, Reply};

use crate::config::Config;
use crate::dimension_resolver::DimensionResolver;
use crate::height_estimator::CaptionAwareEstimator;
use crate::layout_types::GridItem;
use crate::order_precompute::{compute_fingerprint, precompute, OrderCache};
use crate::skyline_positioner;
use crate::warp_helpers::{NotFoundError, ValidationError};

#[derive(Debug, Deserialize)]
pub struct OrdersRequest {
    pub items: Vec<GridItem>,
}

#[derive(Debug, Deserialize)]
pub struct PositionsRequest {
    pub ordered_ids: Vec<String>,
    pub items: Vec<GridItem>,
    pub column_count: usize,
    pub container_width: f64,
}

#[derive(Debug, Deserialize)]
pub struct InvalidateDimensionQuery {
    pub reference: String,
}

pub async fn health_check() -> Result<impl Reply, Infallible> {
    Ok(warp::reply::json(&json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}

pub async fn ready_check(
    resolver: Arc<DimensionResolver>,
) -> Result<impl Reply, Infallible> {
    let (entries, capacity) = resolver.cache().stats();
    Ok(warp::reply::json(&json!({
        "status": "ready",
        "dimension_cache_entries": entries,
        "dimension_cache_capacity": capacity,
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}

/// Resolves dimensions for the posted item set, then returns the dual
/// precomputed orders. A repeated item set is served from the order cache
/// without re-running the engine.
pub async fn compute_orders(
    request: OrdersRequest,
    resolver: Arc<DimensionResolver>,
    order_cache: OrderCache,
    config: Arc<Config>,
) -> Result<impl Reply, Rejection> {
    let resolved = resolver.resolve_batch(&request.items).await;
    let fingerprint = compute_fingerprint(&resolved);

    let estimator = CaptionAwareEstimator::new(&config.layout);
    let orders = order_cache
        .get_or_compute(&fingerprint, || {
            precompute(&resolved, &config.layout, &estimator)
        })
        .map_err(|e| {
            log::warn!("Order computation rejected: {}", e);
            reject::custom(ValidationError {
                message: e.to_string(),
            })
        })?;

    Ok(warp::reply::json(&orders))
}

/// Positions an already-ordered item set for the live column count.
/// Items without dimensions are placed with the fallback ratio and
/// reported as not loaded; callers re-post as dimensions arrive.
pub async fn compute_positions(
    request: PositionsRequest,
    config: Arc<Config>,
) -> Result<impl Reply, Rejection> {
    if request.column_count == 0 {
        return Err(reject::custom(ValidationError {
            message: "column_count must be at least 1".to_string(),
        }));
    }
    if !(request.container_width.is_finite() && request.container_width > 0.0) {
        return Err(reject::custom(ValidationError {
            message: "container_width must be a positive number".to_string(),
        }));
    }

    let snapshot = skyline_positioner::position(
        &request.ordered_ids,
        &request.items,
        request.column_count,
        request.container_width,
        &config.layout,
    );

    Ok(warp::reply::json(&snapshot))
}

pub async fn get_stats(
    resolver: Arc<DimensionResolver>,
    order_cache: OrderCache,
) -> Result<impl Reply, Infallible> {
    let (entries, capacity) = resolver.cache().stats();
    Ok(warp::reply::json(&json!({
        "dimension_cache": {
            "entries": entries,
            "capacity": capacity,
        },
        "order_cache": {
            "entries": order_cache.len(),
        },
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}

/// Drops one cached dimension, e.g. after the image behind the reference
/// was replaced. The next order request re-probes it.
pub async fn invalidate_dimension(
    query: InvalidateDimensionQuery,
    resolver: Arc<DimensionResolver>,
) -> Result<impl Reply, Rejection> {
    if resolver.cache().invalidate(&query.reference) {
        Ok(warp::reply::json(&json!({
            "invalidated": query.reference
        })))
    } else {
        Err(reject::custom(NotFoundError))
    }
}

pub async fn invalidate_orders(
    fingerprint: String,
    order_cache: OrderCache,
) -> Result<impl Reply, Rejection> {
    if order_cache.invalidate(&fingerprint) {
        Ok(warp::reply::json(&json!({
            "invalidated": fingerprint
        })))
    } else {
        Err(reject::custom(NotFoundError))
    }
}

pub async fn clear_caches(
    resolver: Arc<DimensionResolver>,
    order_cache: OrderCache,
) -> Result<impl Reply, Infallible> {
    resolver.cache().clear();
    order_cache.clear();
    log::info!("Cleared dimension and order caches");

    Ok(warp::reply::json(&json!({
        "status": "cleared",
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}
