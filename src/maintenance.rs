use clokwerk::{Scheduler, TimeUnits};
use log::{debug, info};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::dimension_cache::DimensionCache;
use crate::order_precompute::OrderCache;

/// Background housekeeping: sweeps expired dimension entries on an
/// interval so long-idle references don't pin cache capacity between
/// requests, and logs cache pressure for operators.
pub struct MaintenanceScheduler {
    dimension_cache: DimensionCache,
    order_cache: OrderCache,
    sweep_interval_secs: u32,
}

impl MaintenanceScheduler {
    pub fn new(
        dimension_cache: DimensionCache,
        order_cache: OrderCache,
        sweep_interval_secs: u32,
    ) -> Self {
        MaintenanceScheduler {
            dimension_cache,
            order_cache,
            sweep_interval_secs,
        }
    }

    pub fn start(&self) -> JoinHandle<()> {
        let mut scheduler = Scheduler::new();

        let dimension_cache = self.dimension_cache.clone();
        let order_cache = self.order_cache.clone();
        let interval = self.sweep_interval_secs.max(1);

        scheduler.every(interval.seconds()).run(move || {
            let dropped = dimension_cache.sweep_expired();
            if dropped > 0 {
                info!("Swept {} expired dimension cache entries", dropped);
            }

            let (entries, capacity) = dimension_cache.stats();
            debug!(
                "Cache pressure: {}/{} dimensions, {} precomputed orders",
                entries,
                capacity,
                order_cache.len()
            );
        });

        let handle = thread::spawn(move || loop {
            scheduler.run_pending();
            thread::sleep(Duration::from_secs(1));
        });

        info!(
            "Maintenance scheduler started - cache sweep every {}s",
            interval
        );
        handle
    }
}
