//! Counting fakes for the provider traits and a throwaway upstream server

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result, Upstream};
use crate::providers::llm::{ChatMessage, FragmentStream, Generator};
use crate::providers::{Embedder, PassageStore};
use crate::types::passage::sort_by_relevance;
use crate::types::{Passage, Scope};

pub(crate) fn passage(id: &str, score: f32, section: &str, text: &str) -> Passage {
    Passage {
        id: id.to_string(),
        relevance_score: score,
        text: text.to_string(),
        section_label: section.to_string(),
        source_uri: "https://www.sec.gov/".to_string(),
        period: "2023".to_string(),
    }
}

/// Serve a router on an ephemeral local port and return its base URL
pub(crate) async fn spawn_upstream(app: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

pub(crate) struct FakeEmbedder {
    dimensions: usize,
    fail_first: usize,
    calls: AtomicUsize,
}

impl FakeEmbedder {
    pub(crate) fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            fail_first: 0,
            calls: AtomicUsize::new(0),
        }
    }

    /// Fail the first `n` calls with a retryable error
    pub(crate) fn failing_first(mut self, n: usize) -> Self {
        self.fail_first = n;
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Embedder for FakeEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if text.trim().is_empty() {
            return Err(Error::invalid_input("Cannot embed empty text"));
        }
        if call < self.fail_first {
            return Err(Error::upstream(Upstream::Embedding, "connection refused"));
        }
        Ok(vec![0.5; self.dimensions])
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "fake"
    }
}

/// Returns canned passages per namespace
#[derive(Default)]
pub(crate) struct FakeStore {
    passages: HashMap<String, Vec<Passage>>,
    unavailable: bool,
    calls: AtomicUsize,
}

impl FakeStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_passages(mut self, namespace: &str, passages: Vec<Passage>) -> Self {
        self.passages.insert(namespace.to_string(), passages);
        self
    }

    pub(crate) fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PassageStore for FakeStore {
    async fn search(&self, _query: &[f32], namespace: &Scope, top_k: usize) -> Result<Vec<Passage>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable {
            return Err(Error::upstream(Upstream::Retrieval, "index unreachable"));
        }
        let mut passages = self
            .passages
            .get(namespace.as_str())
            .cloned()
            .unwrap_or_default();
        sort_by_relevance(&mut passages);
        passages.truncate(top_k);
        Ok(passages)
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(!self.unavailable)
    }

    fn name(&self) -> &str {
        "fake"
    }
}

pub(crate) enum Script {
    /// Emit these fragments then end
    Fragments(Vec<String>),
    /// Emit these fragments then fail
    FailAfter(Vec<String>),
    /// Reject the request before streaming
    Reject,
    /// Emit a fragment every 10ms forever; `complete` never returns
    Endless,
}

pub(crate) struct FakeGenerator {
    script: Script,
    calls: AtomicUsize,
    pulled: Arc<AtomicUsize>,
    last_messages: Mutex<Vec<ChatMessage>>,
}

impl FakeGenerator {
    pub(crate) fn new(script: Script) -> Self {
        Self {
            script,
            calls: AtomicUsize::new(0),
            pulled: Arc::new(AtomicUsize::new(0)),
            last_messages: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn fragments(fragments: &[&str]) -> Self {
        Self::new(Script::Fragments(
            fragments.iter().map(|f| f.to_string()).collect(),
        ))
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Fragments handed out so far across all streams
    pub(crate) fn pulled(&self) -> usize {
        self.pulled.load(Ordering::SeqCst)
    }

    pub(crate) fn last_messages(&self) -> Vec<ChatMessage> {
        self.last_messages.lock().clone()
    }

    fn record(&self, messages: &[ChatMessage]) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_messages.lock() = messages.to_vec();
    }
}

#[async_trait]
impl Generator for FakeGenerator {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        self.record(messages);
        match &self.script {
            Script::Fragments(fragments) => Ok(fragments.concat()),
            Script::FailAfter(_) => Err(Error::upstream(Upstream::Generation, "stream reset")),
            Script::Reject => Err(Error::rate_limited(Upstream::Generation, "quota exceeded")),
            Script::Endless => {
                std::future::pending::<()>().await;
                Ok(String::new())
            }
        }
    }

    async fn complete_stream(&self, messages: &[ChatMessage]) -> Result<FragmentStream> {
        self.record(messages);
        let pulled = self.pulled.clone();
        let stream = match &self.script {
            Script::Fragments(fragments) => stream::iter(fragments.clone())
                .map(move |f| {
                    pulled.fetch_add(1, Ordering::SeqCst);
                    Ok(f)
                })
                .boxed(),
            Script::FailAfter(fragments) => stream::iter(fragments.clone())
                .map(move |f| {
                    pulled.fetch_add(1, Ordering::SeqCst);
                    Ok(f)
                })
                .chain(stream::once(async {
                    Err(Error::upstream(Upstream::Generation, "stream reset"))
                }))
                .boxed(),
            Script::Reject => {
                return Err(Error::rate_limited(Upstream::Generation, "quota exceeded"))
            }
            Script::Endless => stream::unfold(0usize, move |i| {
                let pulled = pulled.clone();
                async move {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    pulled.fetch_add(1, Ordering::SeqCst);
                    Some((Ok(format!("t{} ", i)), i + 1))
                }
            })
            .boxed(),
        };
        Ok(stream)
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "fake"
    }

    fn model(&self) -> &str {
        "fake-model"
    }
}
