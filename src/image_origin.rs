use async_trait::async_trait;
use std::time::Duration;

use crate::config::ProbeConfig;
use crate::image_probe::{HEIGHT_HEADER, WIDTH_HEADER};
use crate::layout_types::{ResolveError, ResolveResult};

/// What a HEAD probe learned about an image resource.
#[derive(Debug, Clone, Default)]
pub struct OriginHead {
    pub width_header: Option<String>,
    pub height_header: Option<String>,
}

/// Network seam of the dimension resolver. The production implementation
/// speaks HTTP via ureq; tests substitute an in-memory origin.
#[async_trait]
pub trait ImageOrigin: Send + Sync {
    async fn head(&self, url: &str) -> ResolveResult<OriginHead>;

    /// Fetches at most `max_bytes` leading bytes of the resource via a
    /// ranged GET. Origins that ignore Range return the full body; the
    /// read is capped either way.
    async fn fetch_prefix(&self, url: &str, max_bytes: usize) -> ResolveResult<Vec<u8>>;
}

/// ureq-backed origin with bounded timeouts. The blocking client runs on
/// the tokio blocking pool so probe batches never stall the runtime.
#[derive(Clone)]
pub struct HttpImageOrigin {
    agent: ureq::Agent,
}

impl HttpImageOrigin {
    pub fn new(config: &ProbeConfig) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_secs)))
            .build()
            .into();

        HttpImageOrigin { agent }
    }

    fn map_error(err: ureq::Error) -> ResolveError {
        match err {
            ureq::Error::StatusCode(code) => ResolveError::Status(code),
            other => ResolveError::Origin(other.to_string()),
        }
    }
}

#[async_trait]
impl ImageOrigin for HttpImageOrigin {
    async fn head(&self, url: &str) -> ResolveResult<OriginHead> {
        let agent = self.agent.clone();
        let url = url.to_string();

        tokio::task::spawn_blocking(move || {
            let response = agent.head(&url).call().map_err(Self::map_error)?;

            let header = |name: &str| {
                response
                    .headers()
                    .get(name)
                    .and_then(|value| value.to_str().ok())
                    .map(String::from)
            };

            Ok(OriginHead {
                width_header: header(WIDTH_HEADER),
                height_header: header(HEIGHT_HEADER),
            })
        })
        .await
        .map_err(|e| ResolveError::Task(e.to_string()))?
    }

    async fn fetch_prefix(&self, url: &str, max_bytes: usize) -> ResolveResult<Vec<u8>> {
        let agent = self.agent.clone();
        let url = url.to_string();

        tokio::task::spawn_blocking(move || {
            let mut response = agent
                .get(&url)
                .header("Range", format!("bytes=0-{}", max_bytes.saturating_sub(1)))
                .call()
                .map_err(Self::map_error)?;

            response
                .body_mut()
                .with_config()
                .limit(max_bytes as u64)
                .read_to_vec()
                .map_err(|e| ResolveError::Origin(e.to_string()))
        })
        .await
        .map_err(|e| ResolveError::Task(e.to_string()))?
    }
}
