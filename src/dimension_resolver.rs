use log::{debug, warn};
use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::config::ProbeConfig;
use crate::dimension_cache::DimensionCache;
use crate::image_origin::ImageOrigin;
use crate::image_probe;
use crate::layout_types::{Dimension, GridItem, ResolveError, ResolveResult, ResolvedItem};

/// Dimension substituted when every resolution tier fails. A 4:3 frame is
/// the most common shape in the corpus, so mis-estimated placeholders move
/// the least when the real dimensions arrive.
pub const FALLBACK_DIMENSION: Dimension = Dimension {
    width: 800,
    height: 600,
};

/// Resolves image dimensions through a tier chain: caller-supplied values,
/// cache, HEAD probe, ranged-GET header decode with EXIF orientation
/// correction, and finally a fixed fallback. One unresolvable image never
/// fails a batch.
pub struct DimensionResolver {
    cache: DimensionCache,
    origin: Arc<dyn ImageOrigin>,
    probe: ProbeConfig,
}

impl DimensionResolver {
    pub fn new(cache: DimensionCache, origin: Arc<dyn ImageOrigin>, probe: ProbeConfig) -> Self {
        DimensionResolver {
            cache,
            origin,
            probe,
        }
    }

    pub fn cache(&self) -> &DimensionCache {
        &self.cache
    }

    /// Probe window for a batch. The configured window is an origin
    /// courtesy limit, not a throughput knob, so it is additionally capped
    /// by the core count of small machines.
    fn batch_concurrency(&self) -> usize {
        self.probe.concurrency.clamp(1, num_cpus::get().max(2))
    }

    /// Resolves a single reference through the I/O tiers. Successful
    /// resolutions are written to the cache before returning.
    pub async fn resolve_reference(&self, reference: &str) -> ResolveResult<Dimension> {
        if let Some(dimension) = self.cache.get(reference) {
            return Ok(dimension);
        }

        if let Some(dimension) = self.probe_head(reference).await {
            self.cache.put(reference, dimension);
            return Ok(dimension);
        }

        let prefix = self
            .origin
            .fetch_prefix(reference, self.probe.max_prefix_bytes)
            .await?;
        let dimension = image_probe::dimensions_from_prefix(&prefix)?;

        self.cache.put(reference, dimension);
        Ok(dimension)
    }

    /// HEAD tier. Origins without the dimension headers (or without HEAD
    /// support at all) simply push resolution to the ranged-GET tier.
    async fn probe_head(&self, reference: &str) -> Option<Dimension> {
        match self.origin.head(reference).await {
            Ok(head) => image_probe::dimensions_from_headers(
                head.width_header.as_deref(),
                head.height_header.as_deref(),
            ),
            Err(e) => {
                debug!("HEAD probe failed for {}: {}", reference, e);
                None
            }
        }
    }

    /// Resolves one item, never failing: supplied dimensions skip I/O
    /// entirely, and exhausted tiers fall back to `FALLBACK_DIMENSION`.
    pub async fn resolve_item(&self, item: &GridItem) -> ResolvedItem {
        let dimension = match item.dimension() {
            Some(dimension) => dimension,
            None => match &item.image_url {
                Some(url) => self.resolve_reference(url).await.unwrap_or_else(|e| {
                    warn!(
                        "Falling back to {}x{} for item {}: {}",
                        FALLBACK_DIMENSION.width, FALLBACK_DIMENSION.height, item.id, e
                    );
                    FALLBACK_DIMENSION
                }),
                None => {
                    warn!(
                        "Item {} has no dimensions and no image reference: {}",
                        item.id,
                        ResolveError::MissingReference
                    );
                    FALLBACK_DIMENSION
                }
            },
        };

        ResolvedItem {
            id: item.id.clone(),
            aspect_ratio: dimension.aspect_ratio(),
            title: item.title.clone(),
        }
    }

    /// Resolves a batch with a bounded concurrency window. Output order
    /// matches input order regardless of probe completion order, so the
    /// ordering engine sees a deterministic sequence.
    pub async fn resolve_batch(self: &Arc<Self>, items: &[GridItem]) -> Vec<ResolvedItem> {
        let semaphore = Arc::new(Semaphore::new(self.batch_concurrency()));
        let mut tasks = tokio::task::JoinSet::new();

        for (index, item) in items.iter().cloned().enumerate() {
            let resolver = Arc::clone(self);
            let semaphore = semaphore.clone();

            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire()
                    .await
                    .expect("Semaphore should not be closed");

                (index, resolver.resolve_item(&item).await)
            });
        }

        let mut resolved: Vec<Option<ResolvedItem>> = vec![None; items.len()];
        while let Some(result) = tasks.join_next().await {
            match result {
                Ok((index, item)) => resolved[index] = Some(item),
                Err(e) => warn!("Dimension probe task panicked: {}", e),
            }
        }

        // A panicked probe leaves a hole; refill it from the raw item so
        // the permutation invariant downstream still holds.
        resolved
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.unwrap_or_else(|| ResolvedItem {
                    id: items[index].id.clone(),
                    aspect_ratio: FALLBACK_DIMENSION.aspect_ratio(),
                    title: items[index].title.clone(),
                })
            })
            .collect()
    }
}
