//! Pinecone passage store
//!
//! Each ticker is a namespace in a single serverless index. Queries go to the
//! index's data-plane host; when none is configured it is looked up once from
//! the control plane and reused by every later query.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;

use crate::config::PineconeConfig;
use crate::error::{Error, Result, Upstream};
use crate::types::passage::sort_by_relevance;
use crate::types::{Passage, Scope};

use super::passage_store::PassageStore;
use super::{ensure_success, http_client, transport_error};

/// Pinecone index client
pub struct PineconeStore {
    client: Client,
    config: PineconeConfig,
    host: OnceCell<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    namespace: &'a str,
    top_k: usize,
    include_metadata: bool,
    include_values: bool,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
    #[serde(default)]
    namespace: Option<String>,
}

#[derive(Deserialize)]
struct QueryMatch {
    id: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Deserialize)]
struct DescribeIndexResponse {
    host: String,
}

impl PineconeStore {
    /// Create a new store; fails if no API key is configured
    pub fn new(config: &PineconeConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(Error::ConfigurationMissing(
                "Pinecone API key not configured".to_string(),
            ));
        }

        let host = OnceCell::new();
        if !config.host.trim().is_empty() {
            // set on an empty cell cannot fail
            let _ = host.set(with_scheme(config.host.trim()));
        }

        Ok(Self {
            client: http_client(config.timeout_secs)?,
            config: config.clone(),
            host,
        })
    }

    /// Data-plane base URL, resolved on first use
    async fn host(&self) -> Result<&str> {
        let host = self
            .host
            .get_or_try_init(|| self.describe_index())
            .await?;
        Ok(host.as_str())
    }

    async fn describe_index(&self) -> Result<String> {
        let url = format!(
            "{}/indexes/{}",
            self.config.control_plane_url.trim_end_matches('/'),
            self.config.index_name
        );
        tracing::info!(index = %self.config.index_name, "resolving Pinecone index host");

        let response = self
            .client
            .get(&url)
            .header("Api-Key", &self.config.api_key)
            .header("X-Pinecone-API-Version", &self.config.api_version)
            .send()
            .await
            .map_err(|e| transport_error(Upstream::Retrieval, e))?;
        let response = ensure_success(Upstream::Retrieval, response).await?;

        let index: DescribeIndexResponse = response.json().await.map_err(|e| {
            Error::upstream(
                Upstream::Retrieval,
                format!("Failed to parse index description: {}", e),
            )
        })?;
        Ok(with_scheme(&index.host))
    }
}

/// Hosts from the control plane come without a scheme
fn with_scheme(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.contains("://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}

#[async_trait]
impl PassageStore for PineconeStore {
    async fn search(
        &self,
        query: &[f32],
        namespace: &Scope,
        top_k: usize,
    ) -> Result<Vec<Passage>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }
        let url = format!("{}/query", self.host().await?);

        let response = self
            .client
            .post(&url)
            .header("Api-Key", &self.config.api_key)
            .header("X-Pinecone-API-Version", &self.config.api_version)
            .json(&QueryRequest {
                vector: query,
                namespace: namespace.as_str(),
                top_k,
                include_metadata: true,
                include_values: false,
            })
            .send()
            .await
            .map_err(|e| transport_error(Upstream::Retrieval, e))?;
        let response = ensure_success(Upstream::Retrieval, response).await?;

        let body: QueryResponse = response.json().await.map_err(|e| {
            Error::upstream(
                Upstream::Retrieval,
                format!("Failed to parse query response: {}", e),
            )
        })?;

        if let Some(returned) = body.namespace.as_deref() {
            if !returned.is_empty() && returned != namespace.as_str() {
                return Err(Error::upstream(
                    Upstream::Retrieval,
                    format!(
                        "Query for namespace {} answered from namespace {}",
                        namespace, returned
                    ),
                ));
            }
        }

        let empty = serde_json::Map::new();
        let mut passages: Vec<Passage> = body
            .matches
            .into_iter()
            .map(|m| Passage::from_metadata(m.id, m.score, m.metadata.as_ref().unwrap_or(&empty)))
            .collect();
        sort_by_relevance(&mut passages);
        passages.truncate(top_k);

        tracing::debug!(namespace = %namespace, passages = passages.len(), "Pinecone query complete");
        Ok(passages)
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.host().await.is_ok())
    }

    fn name(&self) -> &str {
        "pinecone"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::spawn_upstream;
    use axum::{
        extract::Path,
        http::HeaderMap,
        routing::{get, post},
        Json, Router,
    };
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn scope(ticker: &str) -> Scope {
        Scope::new(ticker.to_string())
    }

    fn query_app() -> Router {
        Router::new().route(
            "/query",
            post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                assert_eq!(headers["api-key"], "pc-test");
                assert_eq!(body["includeMetadata"], true);
                assert_eq!(body["includeValues"], false);
                let namespace = body["namespace"].as_str().unwrap_or_default().to_string();
                Json(json!({
                    "namespace": namespace,
                    "matches": [
                        { "id": "low", "score": 0.31, "metadata": { "text_content": "Liquidity", "section_header": "Financial Data", "year": 2023 } },
                        { "id": "high", "score": 0.92, "metadata": { "text_content": "Revenue grew", "section_header": "Financial Data", "source_url": "https://sec.gov/aapl", "year": "2023" } },
                        { "id": "bare", "score": 0.55 }
                    ]
                }))
            }),
        )
    }

    fn config(host: String) -> PineconeConfig {
        PineconeConfig {
            api_key: "pc-test".into(),
            host,
            ..PineconeConfig::default()
        }
    }

    #[tokio::test]
    async fn test_search_sorts_truncates_and_defaults_metadata() {
        let base = spawn_upstream(query_app()).await;
        let store = PineconeStore::new(&config(base)).unwrap();

        let passages = store.search(&[0.1, 0.2], &scope("AAPL"), 2).await.unwrap();
        let ids: Vec<&str> = passages.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["high", "bare"]);
        assert_eq!(passages[0].source_uri, "https://sec.gov/aapl");
        assert_eq!(passages[1].section_label, "Unknown Section");
        assert_eq!(passages[1].text, "");
    }

    #[tokio::test]
    async fn test_rejects_foreign_namespace() {
        let app = Router::new().route(
            "/query",
            post(|| async { Json(json!({ "namespace": "MSFT", "matches": [] })) }),
        );
        let base = spawn_upstream(app).await;
        let store = PineconeStore::new(&config(base)).unwrap();

        let err = store.search(&[0.1], &scope("AAPL"), 5).await.unwrap_err();
        assert!(matches!(
            err,
            Error::UpstreamUnavailable {
                service: Upstream::Retrieval,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_host_resolved_once_under_concurrency() {
        let data_plane = spawn_upstream(query_app()).await;
        let lookups = Arc::new(AtomicUsize::new(0));

        let counter = lookups.clone();
        let control = Router::new().route(
            "/indexes/:name",
            get(move |Path(name): Path<String>| {
                let counter = counter.clone();
                let data_plane = data_plane.clone();
                async move {
                    assert_eq!(name, "finsight-index");
                    counter.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                    Json(json!({ "name": name, "host": data_plane }))
                }
            }),
        );
        let control_plane = spawn_upstream(control).await;

        let store = Arc::new(
            PineconeStore::new(&PineconeConfig {
                control_plane_url: control_plane,
                ..config(String::new())
            })
            .unwrap(),
        );

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.search(&[0.1], &scope("AAPL"), 3).await })
            })
            .collect();
        for task in futures::future::join_all(tasks).await {
            assert_eq!(task.unwrap().unwrap().len(), 3);
        }
        assert_eq!(lookups.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_missing_key() {
        assert!(matches!(
            PineconeStore::new(&PineconeConfig::default()),
            Err(Error::ConfigurationMissing(_))
        ));
        assert_eq!(with_scheme("idx-abc.svc.pinecone.io"), "https://idx-abc.svc.pinecone.io");
        assert_eq!(with_scheme("http://127.0.0.1:80/"), "http://127.0.0.1:80");
    }
}
