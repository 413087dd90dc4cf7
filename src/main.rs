use log::{error, info};
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use warp::Filter;

use turbo_grid::config::Config;
use turbo_grid::dimension_cache::DimensionCache;
use turbo_grid::dimension_resolver::DimensionResolver;
use turbo_grid::image_origin::HttpImageOrigin;
use turbo_grid::maintenance::MaintenanceScheduler;
use turbo_grid::order_precompute::OrderCache;
use turbo_grid::warp_handlers;
use turbo_grid::warp_helpers::{
    cors, handle_rejection, with_config, with_order_cache, with_resolver,
};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = Arc::new(Config::from_env()?);
    let port = config.port;

    info!("Starting TurboGrid server on Port {}", port);
    info!(
        "Layout profiles: {} / {} columns, wide threshold {:.3}",
        config.layout.narrow_columns, config.layout.wide_columns, config.layout.wide_threshold
    );
    info!(
        "Dimension cache: {} entries, {}s TTL",
        config.cache.dimension_capacity, config.cache.dimension_ttl_secs
    );

    // Check if port is available BEFORE initializing services
    if !is_port_available(port) {
        error!(
            "Port {} is already in use. Please stop any existing TurboGrid instances or use a different port.",
            port
        );
        error!("You can check what's using the port with: lsof -i :{}", port);
        return Err(format!("Port {} is already in use", port).into());
    }

    let (resolver, order_cache) = initialize_services(&config);
    start_background_tasks(&config, &resolver, &order_cache);

    let health_routes = build_health_routes(resolver.clone());
    let layout_routes = build_layout_routes(resolver.clone(), order_cache.clone(), config.clone());
    let cache_routes = build_cache_routes(resolver, order_cache);

    let routes = health_routes
        .or(layout_routes)
        .or(cache_routes)
        .with(cors())
        .with(warp::log("turbo_grid"))
        .recover(handle_rejection);

    let addr: SocketAddr = format!("{}:{}", config.host, port).parse()?;
    info!(
        "Server started successfully, listening on http://{}",
        addr
    );

    warp::serve(routes).run(addr).await;

    Ok(())
}

fn is_port_available(port: u16) -> bool {
    TcpListener::bind(("0.0.0.0", port)).is_ok()
}

fn initialize_services(config: &Arc<Config>) -> (Arc<DimensionResolver>, OrderCache) {
    let dimension_cache = DimensionCache::new(&config.cache);
    let origin = Arc::new(HttpImageOrigin::new(&config.probe));
    let resolver = Arc::new(DimensionResolver::new(
        dimension_cache,
        origin,
        config.probe.clone(),
    ));
    info!("Dimension resolver initialized");

    let order_cache = OrderCache::new();
    info!("Order cache initialized");

    (resolver, order_cache)
}

fn start_background_tasks(
    config: &Arc<Config>,
    resolver: &Arc<DimensionResolver>,
    order_cache: &OrderCache,
) {
    let maintenance = MaintenanceScheduler::new(
        resolver.cache().clone(),
        order_cache.clone(),
        config.cache.sweep_interval_secs,
    );
    let _maintenance_handle = maintenance.start();
}

fn build_health_routes(
    resolver: Arc<DimensionResolver>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let health = warp::path("health")
        .and(warp::get())
        .and_then(warp_handlers::health_check);

    let ready = warp::path("ready")
        .and(warp::get())
        .and(with_resolver(resolver))
        .and_then(warp_handlers::ready_check);

    health.or(ready)
}

fn build_layout_routes(
    resolver: Arc<DimensionResolver>,
    order_cache: OrderCache,
    config: Arc<Config>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let api_orders = warp::path("api")
        .and(warp::path("layout"))
        .and(warp::path("orders"))
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::json::<warp_handlers::OrdersRequest>())
        .and(with_resolver(resolver))
        .and(with_order_cache(order_cache))
        .and(with_config(config.clone()))
        .and_then(warp_handlers::compute_orders);

    let api_positions = warp::path("api")
        .and(warp::path("layout"))
        .and(warp::path("positions"))
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::json::<warp_handlers::PositionsRequest>())
        .and(with_config(config))
        .and_then(warp_handlers::compute_positions);

    api_orders.or(api_positions)
}

fn build_cache_routes(
    resolver: Arc<DimensionResolver>,
    order_cache: OrderCache,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let api_stats = warp::path("api")
        .and(warp::path("stats"))
        .and(warp::path::end())
        .and(warp::get())
        .and(with_resolver(resolver.clone()))
        .and(with_order_cache(order_cache.clone()))
        .and_then(warp_handlers::get_stats);

    let api_invalidate_dimension = warp::path("api")
        .and(warp::path("cache"))
        .and(warp::path("dimensions"))
        .and(warp::path::end())
        .and(warp::delete())
        .and(warp::query::<warp_handlers::InvalidateDimensionQuery>())
        .and(with_resolver(resolver.clone()))
        .and_then(warp_handlers::invalidate_dimension);

    let api_invalidate_orders = warp::path("api")
        .and(warp::path("cache"))
        .and(warp::path("orders"))
        .and(warp::path::param::<String>())
        .and(warp::path::end())
        .and(warp::delete())
        .and(with_order_cache(order_cache.clone()))
        .and_then(warp_handlers::invalidate_orders);

    let api_clear = warp::path("api")
        .and(warp::path("cache"))
        .and(warp::path("clear"))
        .and(warp::path::end())
        .and(warp::post())
        .and(with_resolver(resolver))
        .and(with_order_cache(order_cache))
        .and_then(warp_handlers::clear_caches);

    api_stats
        .or(api_invalidate_dimension)
        .or(api_invalidate_orders)
        .or(api_clear)
}
