use async_trait::async_trait;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use turbo_grid::config::{CacheConfig, ProbeConfig};
use turbo_grid::dimension_cache::DimensionCache;
use turbo_grid::dimension_resolver::{DimensionResolver, FALLBACK_DIMENSION};
use turbo_grid::image_origin::{ImageOrigin, OriginHead};
use turbo_grid::layout_types::{GridItem, ResolveError, ResolveResult};

/// In-memory stand-in for an image origin: optional dimension headers on
/// HEAD, optional payload prefix on ranged GET, call counting for tier
/// assertions.
struct MockOrigin {
    head: Option<OriginHead>,
    prefix: Option<Vec<u8>>,
    head_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
}

impl MockOrigin {
    fn new(head: Option<OriginHead>, prefix: Option<Vec<u8>>) -> Self {
        MockOrigin {
            head,
            prefix,
            head_calls: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
        }
    }

    fn unreachable_origin() -> Self {
        Self::new(None, None)
    }
}

#[async_trait]
impl ImageOrigin for MockOrigin {
    async fn head(&self, _url: &str) -> ResolveResult<OriginHead> {
        self.head_calls.fetch_add(1, Ordering::SeqCst);
        self.head
            .clone()
            .ok_or_else(|| ResolveError::Origin("connection timed out".to_string()))
    }

    async fn fetch_prefix(&self, _url: &str, max_bytes: usize) -> ResolveResult<Vec<u8>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        match &self.prefix {
            Some(bytes) => Ok(bytes[..bytes.len().min(max_bytes)].to_vec()),
            None => Err(ResolveError::Origin("connection timed out".to_string())),
        }
    }
}

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([64, 64, 64]));
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    bytes
}

fn resolver_with(origin: Arc<MockOrigin>) -> Arc<DimensionResolver> {
    Arc::new(DimensionResolver::new(
        DimensionCache::new(&CacheConfig::default()),
        origin,
        ProbeConfig::default(),
    ))
}

fn url_item(id: &str) -> GridItem {
    GridItem {
        id: id.to_string(),
        image_url: Some(format!("https://img.example/{}.jpg", id)),
        width: None,
        height: None,
        title: None,
    }
}

#[tokio::test]
async fn supplied_dimensions_skip_all_io() {
    let origin = Arc::new(MockOrigin::unreachable_origin());
    let resolver = resolver_with(origin.clone());

    let item = GridItem {
        id: "supplied".to_string(),
        image_url: Some("https://img.example/supplied.jpg".to_string()),
        width: Some(1500),
        height: Some(1000),
        title: None,
    };

    let resolved = resolver.resolve_item(&item).await;
    assert!((resolved.aspect_ratio - 1.5).abs() < 1e-9);
    assert_eq!(origin.head_calls.load(Ordering::SeqCst), 0);
    assert_eq!(origin.fetch_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn header_probe_short_circuits_the_ranged_get() {
    let origin = Arc::new(MockOrigin::new(
        Some(OriginHead {
            width_header: Some("1920".to_string()),
            height_header: Some("1080".to_string()),
        }),
        None,
    ));
    let resolver = resolver_with(origin.clone());

    let dim = resolver
        .resolve_reference("https://img.example/a.jpg")
        .await
        .unwrap();
    assert_eq!((dim.width, dim.height), (1920, 1080));
    assert_eq!(origin.head_calls.load(Ordering::SeqCst), 1);
    assert_eq!(origin.fetch_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn ranged_get_decodes_dimensions_from_the_prefix() {
    let origin = Arc::new(MockOrigin::new(None, Some(png_bytes(640, 360))));
    let resolver = resolver_with(origin.clone());

    let dim = resolver
        .resolve_reference("https://img.example/b.png")
        .await
        .unwrap();
    assert_eq!((dim.width, dim.height), (640, 360));
    assert_eq!(origin.head_calls.load(Ordering::SeqCst), 1);
    assert_eq!(origin.fetch_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn repeated_resolution_is_served_from_cache() {
    let origin = Arc::new(MockOrigin::new(None, Some(png_bytes(640, 360))));
    let resolver = resolver_with(origin.clone());

    for _ in 0..3 {
        resolver
            .resolve_reference("https://img.example/b.png")
            .await
            .unwrap();
    }

    assert_eq!(origin.fetch_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn cache_invalidation_forces_a_fresh_probe() {
    let origin = Arc::new(MockOrigin::new(None, Some(png_bytes(640, 360))));
    let resolver = resolver_with(origin.clone());
    let reference = "https://img.example/replaced.png";

    resolver.resolve_reference(reference).await.unwrap();
    assert!(resolver.cache().invalidate(reference));
    resolver.resolve_reference(reference).await.unwrap();

    assert_eq!(origin.fetch_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn exhausted_tiers_fall_back_to_the_default_dimension() {
    let origin = Arc::new(MockOrigin::unreachable_origin());
    let resolver = resolver_with(origin.clone());

    let resolved = resolver.resolve_item(&url_item("dead")).await;
    assert!(
        (resolved.aspect_ratio - FALLBACK_DIMENSION.aspect_ratio()).abs() < 1e-9,
        "unresolvable items get the documented {}x{} default",
        FALLBACK_DIMENSION.width,
        FALLBACK_DIMENSION.height
    );
}

#[tokio::test]
async fn undecodable_prefix_falls_back_instead_of_failing() {
    let origin = Arc::new(MockOrigin::new(None, Some(vec![0u8; 512])));
    let resolver = resolver_with(origin.clone());

    let resolved = resolver.resolve_item(&url_item("garbage")).await;
    assert!((resolved.aspect_ratio - FALLBACK_DIMENSION.aspect_ratio()).abs() < 1e-9);
}

#[tokio::test]
async fn batch_resolution_preserves_input_order_and_isolates_failures() {
    let origin = Arc::new(MockOrigin::new(None, Some(png_bytes(800, 400))));
    let resolver = resolver_with(origin.clone());

    let mut items: Vec<GridItem> = (0..12).map(|i| url_item(&format!("img-{}", i))).collect();
    // One item arrives with dimensions, one has no reference at all.
    items[3].width = Some(500);
    items[3].height = Some(1000);
    items[7].image_url = None;

    let resolved = resolver.resolve_batch(&items).await;

    assert_eq!(resolved.len(), items.len());
    for (input, output) in items.iter().zip(resolved.iter()) {
        assert_eq!(input.id, output.id, "batch output order matches input");
    }
    assert!((resolved[3].aspect_ratio - 0.5).abs() < 1e-9);
    assert!((resolved[7].aspect_ratio - FALLBACK_DIMENSION.aspect_ratio()).abs() < 1e-9);
    assert!((resolved[0].aspect_ratio - 2.0).abs() < 1e-9);
}
