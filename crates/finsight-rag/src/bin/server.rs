//! FinSight server binary
//!
//! Run with: cargo run -p finsight-rag --bin finsight-server

use finsight_rag::{
    config::{BackendProvider, RagConfig},
    server::RagServer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is optional; real environment variables take precedence
    let dotenv = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "finsight_rag=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    println!(
        r#"
╔═══════════════════════════════════════════════════════════╗
║                      FinSight RAG API                     ║
║          SEC 10-K Analysis with Cited Answers             ║
╚═══════════════════════════════════════════════════════════╝
"#
    );

    if let Ok(path) = dotenv {
        tracing::info!("Loaded environment from {}", path.display());
    }

    // Load configuration
    let config = RagConfig::load()?;

    tracing::info!("Configuration loaded (backend: {:?})", config.backend);
    tracing::info!("  - Supported tickers: {:?}", config.retrieval.supported_tickers);
    tracing::info!("  - Top K: {}", config.retrieval.top_k);
    tracing::info!("  - Chat model: {}", config.chat_model());

    match config.backend {
        BackendProvider::Hosted => {
            tracing::info!("  - Pinecone index: {}", config.pinecone.index_name);
            if config.openai.api_key.is_empty() {
                tracing::warn!("OPENAI_API_KEY not set! Chat requests will fail until it is.");
            }
            if config.pinecone.api_key.is_empty() {
                tracing::warn!("PINECONE_API_KEY not set! Chat requests will fail until it is.");
            }
        }
        BackendProvider::Local => {
            tracing::info!("  - Ollama: {}", config.ollama.base_url);
            tracing::info!("  - Snapshot: {}", config.ollama.snapshot_path.display());
        }
    }

    // Providers are built on the first chat request
    let server = RagServer::new(config);

    println!("\nServer starting...");
    println!("  API: http://{}", server.address());
    println!("  Health: http://{}/api/health", server.address());
    println!("  API Info: http://{}/api/info", server.address());
    println!("\nEndpoints:");
    println!("  POST /api/chat          - Streamed answer");
    println!("  POST /api/chat/sync     - Single-response answer");
    println!("  GET  /api/filings       - List filings");
    println!("\nPress Ctrl+C to stop\n");

    server.start().await?;

    Ok(())
}
