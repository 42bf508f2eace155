//! Application state for the FinSight server

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tokio::time::Instant;

use crate::config::RagConfig;
use crate::error::Result;
use crate::pipeline::RagPipeline;
use crate::retrieval::AllowList;

/// Builds the pipeline from configuration on first use
pub type PipelineFactory = Box<dyn Fn(&RagConfig) -> Result<RagPipeline> + Send + Sync>;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Configuration
    config: RagConfig,
    /// Tickers accepted by the chat and filings routes
    allow_list: AllowList,
    /// Pipeline, built once by the first chat request that needs it
    pipeline: OnceCell<Arc<RagPipeline>>,
    /// How to build the pipeline
    factory: PipelineFactory,
}

impl AppState {
    /// Create state that builds providers from `config` on first use
    pub fn new(config: RagConfig) -> Self {
        Self::with_factory(config, Box::new(RagPipeline::from_config))
    }

    /// Create state with a custom pipeline builder
    pub fn with_factory(config: RagConfig, factory: PipelineFactory) -> Self {
        let allow_list = AllowList::new(&config.retrieval.supported_tickers);
        Self {
            inner: Arc::new(AppStateInner {
                config,
                allow_list,
                pipeline: OnceCell::new(),
                factory,
            }),
        }
    }

    /// Create state around an already-built pipeline
    pub fn with_pipeline(config: RagConfig, pipeline: RagPipeline) -> Self {
        let allow_list = pipeline.allow_list().clone();
        Self {
            inner: Arc::new(AppStateInner {
                config,
                allow_list,
                pipeline: OnceCell::new_with(Some(Arc::new(pipeline))),
                factory: Box::new(RagPipeline::from_config),
            }),
        }
    }

    /// Get configuration
    pub fn config(&self) -> &RagConfig {
        &self.inner.config
    }

    /// Get the ticker allow-list
    pub fn allow_list(&self) -> &AllowList {
        &self.inner.allow_list
    }

    /// Get the pipeline, building it on first call
    ///
    /// Concurrent first calls build it once. A failed build is not cached, so
    /// a later request retries it.
    pub async fn pipeline(&self) -> Result<Arc<RagPipeline>> {
        let pipeline = self
            .inner
            .pipeline
            .get_or_try_init(|| async {
                tracing::info!("Initializing RAG pipeline (backend: {:?})", self.inner.config.backend);
                (self.inner.factory)(&self.inner.config).map(Arc::new)
            })
            .await?;
        Ok(Arc::clone(pipeline))
    }

    /// Whether the pipeline has been built
    pub fn is_ready(&self) -> bool {
        self.inner.pipeline.initialized()
    }

    /// Deadline for a request starting now, if one is configured
    pub fn request_deadline(&self) -> Option<Instant> {
        self.inner
            .config
            .server
            .request_timeout_secs
            .map(|secs| Instant::now() + Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::test_support::{FakeEmbedder, FakeGenerator, FakeStore};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fake_pipeline(config: &RagConfig) -> RagPipeline {
        RagPipeline::new(
            Arc::new(FakeEmbedder::new(4)),
            Arc::new(FakeStore::new()),
            Arc::new(FakeGenerator::fragments(&["ok"])),
            AllowList::new(&config.retrieval.supported_tickers),
            config.retrieval.top_k,
        )
    }

    #[tokio::test]
    async fn test_pipeline_built_once_under_concurrency() {
        let builds = Arc::new(AtomicUsize::new(0));
        let counter = builds.clone();
        let state = AppState::with_factory(
            RagConfig::default(),
            Box::new(move |config| {
                counter.fetch_add(1, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(20));
                Ok(fake_pipeline(config))
            }),
        );
        assert!(!state.is_ready());

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let state = state.clone();
                tokio::spawn(async move { state.pipeline().await.map(|_| ()) })
            })
            .collect();
        for result in futures::future::join_all(tasks).await {
            result.unwrap().unwrap();
        }

        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert!(state.is_ready());
    }

    #[tokio::test]
    async fn test_missing_credentials_not_cached() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        let state = AppState::with_factory(
            RagConfig::default(),
            Box::new(move |config| {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(Error::ConfigurationMissing(
                        "OpenAI API key not configured".into(),
                    ))
                } else {
                    Ok(fake_pipeline(config))
                }
            }),
        );

        assert!(matches!(
            state.pipeline().await,
            Err(Error::ConfigurationMissing(_))
        ));
        assert!(state.pipeline().await.is_ok());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_request_deadline() {
        let mut config = RagConfig::default();
        assert!(AppState::new(config.clone()).request_deadline().is_none());

        config.server.request_timeout_secs = Some(30);
        assert!(AppState::new(config).request_deadline().is_some());
    }
}
