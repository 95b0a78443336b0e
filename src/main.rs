use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use paperscout::clients::{
    CohereClient, OpenAiClient, OpenSearchClient, PineconeClient, TavilyClient,
};
use paperscout::config::Config;
use paperscout::routes::create_router;
use paperscout::search::ingest::Ingestor;
use paperscout::search::SearchPipeline;
use paperscout::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "paperscout=debug,tower_http=debug,axum=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!("Configuration loaded: {:?}", config.server);

    // Connect to database
    let pool = paperscout::db::create_pool(&config.database).await?;

    // Run migrations
    info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to run migrations: {}", e))?;
    info!("Database migrations completed");

    // Wire up external gateways
    let opensearch = Arc::new(OpenSearchClient::new(&config.opensearch));
    if let Err(e) = opensearch.ensure_indices().await {
        // The vector and web paths still work; lexical search degrades.
        tracing::warn!(error = %e, "Could not verify OpenSearch indices");
    }
    let openai = Arc::new(OpenAiClient::new(&config.openai));
    let pinecone = Arc::new(PineconeClient::new(&config.pinecone, openai.clone()));
    let tavily = Arc::new(TavilyClient::new(&config.tavily));
    let cohere = Arc::new(CohereClient::new(&config.cohere));

    let pipeline = Arc::new(SearchPipeline::new(
        opensearch.clone(),
        pinecone.clone(),
        tavily,
        cohere,
        openai.clone(),
        openai.clone(),
    ));
    let ingestor = Arc::new(Ingestor::new(
        pool.clone(),
        opensearch,
        pinecone,
        openai,
    ));

    // Create shared state
    let state = AppState {
        pool,
        config: config.clone(),
        pipeline,
        ingestor,
    };

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    info!("Server listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    Ok(())
}
