use anyhow::Result;
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub opensearch: OpenSearchConfig,
    pub pinecone: PineconeConfig,
    pub tavily: TavilyConfig,
    pub cohere: CohereConfig,
    pub openai: OpenAiConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub cors_allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenSearchConfig {
    pub url: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PineconeConfig {
    pub api_key: String,
    /// Data-plane host of the serverless index, e.g. https://chunks-xxxx.svc.aws-us-west-2.pinecone.io
    pub index_host: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TavilyConfig {
    /// Empty key disables the web-search channel (it degrades to no results).
    pub api_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CohereConfig {
    pub api_key: String,
    pub rerank_model: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub api_base: String,
    pub summary_model: String,
    pub highlight_model: String,
    pub embedding_model: String,
    /// Base URL for the embeddings endpoint; defaults to `api_base` but can
    /// point at a separate OpenAI-compatible server hosting the e5 model.
    pub embedding_api_base: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let openai_api_base =
            env::var("OPENAI_API_BASE").unwrap_or_else(|_| "https://api.openai.com/v1".to_string());

        Ok(Self {
            server: ServerConfig {
                port: env::var("PORT")
                    .unwrap_or_else(|_| "8002".to_string())
                    .parse()?,
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                cors_allowed_origins: env::var("ALLOWED_ORIGINS")
                    .unwrap_or_else(|_| "http://localhost:3000,http://localhost:5173".to_string())
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .collect(),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL")
                    .expect("DATABASE_URL must be set"),
                max_connections: env::var("DB_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()?,
                min_connections: env::var("DB_MIN_CONNECTIONS")
                    .unwrap_or_else(|_| "1".to_string())
                    .parse()?,
            },
            opensearch: OpenSearchConfig {
                url: env::var("OPENSEARCH_URL")
                    .unwrap_or_else(|_| "http://localhost:9200".to_string()),
                username: env::var("OPENSEARCH_USERNAME").unwrap_or_else(|_| "admin".to_string()),
                password: env::var("OPENSEARCH_PASSWORD").unwrap_or_else(|_| "admin".to_string()),
            },
            pinecone: PineconeConfig {
                api_key: env::var("PINECONE_API_KEY").unwrap_or_default(),
                index_host: env::var("PINECONE_INDEX_HOST").unwrap_or_default(),
            },
            tavily: TavilyConfig {
                api_key: env::var("TAVILY_API_KEY").unwrap_or_default(),
            },
            cohere: CohereConfig {
                api_key: env::var("COHERE_API_KEY").unwrap_or_default(),
                rerank_model: env::var("COHERE_RERANK_MODEL")
                    .unwrap_or_else(|_| "rerank-english-v3.0".to_string()),
            },
            openai: OpenAiConfig {
                api_key: env::var("OPENAI_API_KEY").unwrap_or_default(),
                embedding_api_base: env::var("EMBEDDING_API_BASE")
                    .unwrap_or_else(|_| openai_api_base.clone()),
                api_base: openai_api_base,
                summary_model: env::var("SUMMARY_MODEL")
                    .unwrap_or_else(|_| "gpt-4o-mini".to_string()),
                highlight_model: env::var("HIGHLIGHT_MODEL")
                    .unwrap_or_else(|_| "gpt-4o-mini".to_string()),
                embedding_model: env::var("EMBEDDING_MODEL")
                    .unwrap_or_else(|_| "intfloat/e5-base-v2".to_string()),
            },
        })
    }
}
