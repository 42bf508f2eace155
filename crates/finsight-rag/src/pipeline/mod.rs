//! Query-time retrieval-augmented generation
//!
//! A query is validated against the ticker allow-list, embedded, matched
//! against the ticker's namespace, turned into a grounded prompt, and answered
//! by the chat model. Validation always happens before any upstream call.

pub mod stage;

use futures_util::StreamExt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_stream::wrappers::ReceiverStream;

use crate::config::{BackendProvider, RagConfig};
use crate::error::{Error, Result};
use crate::generation::PromptBuilder;
use crate::providers::{
    ChatMessage, Embedder, Generator, InMemoryPassageStore, OllamaClient, OllamaEmbedder,
    OllamaGenerator, OpenAiClient, OpenAiEmbedder, OpenAiGenerator, PassageStore, PineconeStore,
    RetryingEmbedder, RetryingPassageStore,
};
use crate::retrieval::AllowList;
use crate::types::{Answer, Passage, Query, Scope, StreamEvent};

pub use stage::Stage;
use stage::Progress;

/// Ordered events of one streamed answer
pub type EventStream = ReceiverStream<StreamEvent>;

/// Events buffered between the generation task and a slow reader
const STREAM_BUFFER: usize = 64;

/// Orchestrates embedding, retrieval, prompt assembly, and generation
///
/// Holds only shared, read-only provider handles, so one instance serves any
/// number of concurrent queries.
pub struct RagPipeline {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn PassageStore>,
    generator: Arc<dyn Generator>,
    allow_list: AllowList,
    top_k: usize,
}

/// Everything generation needs, produced before any event is sent
struct Prepared {
    scope: Scope,
    passages: Vec<Passage>,
    messages: Vec<ChatMessage>,
}

impl RagPipeline {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn PassageStore>,
        generator: Arc<dyn Generator>,
        allow_list: AllowList,
        top_k: usize,
    ) -> Self {
        Self {
            embedder,
            store,
            generator,
            allow_list,
            top_k: top_k.max(1),
        }
    }

    /// Build providers for the configured backend
    pub fn from_config(config: &RagConfig) -> Result<Self> {
        config.validate_credentials()?;

        let (embedder, store, generator): (
            Arc<dyn Embedder>,
            Arc<dyn PassageStore>,
            Arc<dyn Generator>,
        ) = match config.backend {
            BackendProvider::Hosted => {
                tracing::info!(
                    embedding_model = %config.openai.embedding_model,
                    model = %config.openai.chat_model,
                    index = %config.pinecone.index_name,
                    "using hosted backend (OpenAI + Pinecone)"
                );
                let openai = Arc::new(OpenAiClient::new(&config.openai)?);
                (
                    Arc::new(OpenAiEmbedder::from_client(Arc::clone(&openai))),
                    Arc::new(PineconeStore::new(&config.pinecone)?),
                    Arc::new(OpenAiGenerator::from_client(openai)),
                )
            }
            BackendProvider::Local => {
                tracing::info!(
                    embedding_model = %config.ollama.embed_model,
                    model = %config.ollama.chat_model,
                    "using local backend (Ollama + in-memory index)"
                );
                let ollama = Arc::new(OllamaClient::new(&config.ollama)?);
                (
                    Arc::new(OllamaEmbedder::from_client(Arc::clone(&ollama))),
                    Arc::new(InMemoryPassageStore::from_jsonl(
                        &config.ollama.snapshot_path,
                    )?),
                    Arc::new(OllamaGenerator::from_client(ollama)),
                )
            }
        };

        let max_retries = config.retrieval.max_retries;
        let (embedder, store): (Arc<dyn Embedder>, Arc<dyn PassageStore>) = if max_retries > 0 {
            (
                Arc::new(RetryingEmbedder::new(embedder, max_retries)),
                Arc::new(RetryingPassageStore::new(store, max_retries)),
            )
        } else {
            (embedder, store)
        };

        Ok(Self::new(
            embedder,
            store,
            generator,
            AllowList::new(&config.retrieval.supported_tickers),
            config.retrieval.top_k,
        ))
    }

    pub fn allow_list(&self) -> &AllowList {
        &self.allow_list
    }

    pub fn generator(&self) -> &Arc<dyn Generator> {
        &self.generator
    }

    /// Validate, embed, and search without generating
    pub async fn retrieve(&self, text: &str, ticker: &str) -> Result<Vec<Passage>> {
        let mut progress = Progress::new(ticker);
        let result = match self.validate(text, ticker) {
            Ok(scope) => self.search(text, &scope, None, &mut progress).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(passages) => {
                progress.complete(passages.len());
                Ok(passages)
            }
            Err(e) => {
                progress.fail(&e);
                Err(e)
            }
        }
    }

    /// Answer a query in one piece
    pub async fn answer(&self, query: Query) -> Result<Answer> {
        let mut progress = Progress::new(&query.ticker);
        let result = match self.prepare(&query, &mut progress).await {
            Ok(prepared) => within(query.deadline, self.generator.complete(&prepared.messages))
                .await
                .map(|response| Answer {
                    response,
                    contexts: prepared.passages,
                    ticker: prepared.scope.to_string(),
                }),
            Err(e) => Err(e),
        };

        match result {
            Ok(answer) => {
                progress.complete(answer.contexts.len());
                Ok(answer)
            }
            Err(e) => {
                progress.fail(&e);
                Err(e)
            }
        }
    }

    /// Answer a query as a stream of events
    ///
    /// Validation, embedding, and retrieval failures are returned as `Err`.
    /// Once this returns `Ok`, the stream yields `Contexts` first and always
    /// ends with exactly one `Done` or `Error`. Dropping the stream stops
    /// generation.
    pub async fn answer_stream(&self, query: Query) -> Result<EventStream> {
        let mut progress = Progress::new(&query.ticker);
        let prepared = match self.prepare(&query, &mut progress).await {
            Ok(prepared) => prepared,
            Err(e) => {
                progress.fail(&e);
                return Err(e);
            }
        };

        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let generator = Arc::clone(&self.generator);
        tokio::spawn(stream_answer(
            generator,
            prepared,
            query.deadline,
            tx,
            progress,
        ));

        Ok(ReceiverStream::new(rx))
    }

    fn validate(&self, text: &str, ticker: &str) -> Result<Scope> {
        if text.trim().is_empty() {
            return Err(Error::invalid_input("Message must not be empty"));
        }
        self.allow_list.resolve(ticker)
    }

    async fn search(
        &self,
        text: &str,
        scope: &Scope,
        deadline: Option<Instant>,
        progress: &mut Progress,
    ) -> Result<Vec<Passage>> {
        progress.advance(Stage::Embedding);
        let vector = within(deadline, self.embedder.embed(text)).await?;

        progress.advance(Stage::Retrieving);
        let passages = within(deadline, self.store.search(&vector, scope, self.top_k)).await?;
        tracing::debug!(ticker = %scope, passages = passages.len(), "retrieved passages");
        Ok(passages)
    }

    async fn prepare(&self, query: &Query, progress: &mut Progress) -> Result<Prepared> {
        let scope = self.validate(&query.text, &query.ticker)?;
        let passages = self
            .search(&query.text, &scope, query.deadline, progress)
            .await?;

        progress.advance(Stage::Assembling);
        let messages =
            PromptBuilder::build_messages(&passages, &scope, &query.history, &query.text);

        progress.advance(Stage::Generating);
        Ok(Prepared {
            scope,
            passages,
            messages,
        })
    }
}

/// Await a step, failing once the deadline has passed
async fn within<T, F>(deadline: Option<Instant>, step: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match deadline {
        Some(deadline) => {
            if Instant::now() >= deadline {
                return Err(Error::DeadlineExceeded);
            }
            tokio::time::timeout_at(deadline, step)
                .await
                .map_err(|_| Error::DeadlineExceeded)?
        }
        None => step.await,
    }
}

/// Generation task behind an [`EventStream`]
async fn stream_answer(
    generator: Arc<dyn Generator>,
    prepared: Prepared,
    deadline: Option<Instant>,
    tx: mpsc::Sender<StreamEvent>,
    mut progress: Progress,
) {
    let passages = prepared.passages.len();
    if tx.send(StreamEvent::Contexts(prepared.passages)).await.is_err() {
        progress.cancel();
        return;
    }

    let outcome = tokio::select! {
        _ = tx.closed() => None,
        result = within(deadline, forward_tokens(generator.as_ref(), &prepared.messages, &tx)) => {
            match result {
                Ok(true) => Some(Ok(())),
                Ok(false) => None,
                Err(e) => Some(Err(e)),
            }
        }
    };

    let terminal = match outcome {
        None => {
            progress.cancel();
            return;
        }
        Some(Ok(())) => {
            progress.complete(passages);
            StreamEvent::Done
        }
        Some(Err(e)) => {
            progress.fail(&e);
            StreamEvent::Error(e.to_string())
        }
    };
    // receiver may be gone already; nothing left to clean up
    let _ = tx.send(terminal).await;
}

/// Relay fragments as token events; `false` if the receiver went away
async fn forward_tokens(
    generator: &dyn Generator,
    messages: &[ChatMessage],
    tx: &mpsc::Sender<StreamEvent>,
) -> Result<bool> {
    let mut fragments = generator.complete_stream(messages).await?;
    while let Some(fragment) = fragments.next().await {
        let fragment = fragment?;
        if tx.send(StreamEvent::Token(fragment)).await.is_err() {
            return Ok(false);
        }
    }
    Ok(true)
}
