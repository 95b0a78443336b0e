//! OpenSearch client for BM25 full-text search and bulk indexing.
//!
//! Two indices are kept, one per corpus:
//! - `papers_bm25`: title^2, abstract, concepts^1.2, authors
//! - `startups_bm25`: title^2, name^2, description, one_liner, industry^1.2

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::clients::{BulkOutcome, LexicalDocument, LexicalIndexer, LexicalSearch};
use crate::config::OpenSearchConfig;
use crate::types::{AppError, AppResult, RetrievalCandidate, SearchFilters, Source};
use crate::utils::truncate_chars;

pub const PAPERS_INDEX: &str = "papers_bm25";
pub const STARTUPS_INDEX: &str = "startups_bm25";

const SNIPPET_CHARS: usize = 300;

pub struct OpenSearchClient {
    http: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct SearchBody {
    hits: HitsWrapper,
}

#[derive(Debug, Deserialize)]
struct HitsWrapper {
    hits: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
struct Hit {
    #[serde(rename = "_score")]
    score: f32,
    #[serde(rename = "_source")]
    source: Value,
}

#[derive(Debug, Deserialize)]
struct BulkResponse {
    errors: bool,
    items: Vec<Value>,
}

impl OpenSearchClient {
    pub fn new(config: &OpenSearchConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
        }
    }

    fn index_for(source: Source) -> &'static str {
        match source {
            Source::Papers => PAPERS_INDEX,
            Source::Startups => STARTUPS_INDEX,
        }
    }

    fn match_fields(source: Source) -> Vec<&'static str> {
        match source {
            Source::Papers => vec!["title^2", "abstract", "concepts^1.2", "authors"],
            Source::Startups => vec![
                "title^2",
                "name^2",
                "description",
                "one_liner",
                "industry^1.2",
            ],
        }
    }

    async fn search_index(
        &self,
        source: Source,
        query: &str,
        year_gte: Option<i32>,
        top_k: usize,
    ) -> AppResult<Vec<RetrievalCandidate>> {
        let mut must = vec![json!({
            "multi_match": {
                "query": query,
                "fields": Self::match_fields(source),
                "type": "best_fields",
            }
        })];
        if let Some(year) = year_gte {
            must.push(json!({ "range": { "year": { "gte": year } } }));
        }

        let body = json!({
            "query": { "bool": { "must": must } },
            "size": top_k,
        });

        let url = format!("{}/{}/_search", self.base_url, Self::index_for(source));
        let response = self
            .http
            .post(&url)
            .basic_auth(&self.username, Some(&self.password))
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("OpenSearch request failed: {}", e)))?
            .error_for_status()
            .map_err(|e| AppError::Upstream(format!("OpenSearch error status: {}", e)))?;

        let parsed: SearchBody = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("OpenSearch parse error: {}", e)))?;

        debug!(source = %source, hits = parsed.hits.hits.len(), "OpenSearch query returned");

        Ok(parsed
            .hits
            .hits
            .into_iter()
            .map(|hit| Self::candidate_from_hit(source, hit))
            .collect())
    }

    fn candidate_from_hit(source: Source, hit: Hit) -> RetrievalCandidate {
        let src = &hit.source;
        let str_field = |key: &str| {
            src.get(key)
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string()
        };

        let doc_id = str_field("doc_id");
        let title = match source {
            Source::Papers => str_field("title"),
            Source::Startups => {
                let t = str_field("title");
                if t.is_empty() { str_field("name") } else { t }
            }
        };
        let snippet_source = match source {
            Source::Papers => str_field("abstract"),
            Source::Startups => {
                let d = str_field("description");
                if d.is_empty() { str_field("one_liner") } else { d }
            }
        };

        let metadata = match source {
            Source::Papers => json!({
                "year": src.get("year"),
                "venue": src.get("venue"),
                "concepts": src.get("concepts"),
                "authors": src.get("authors"),
                "doi": src.get("doi"),
            }),
            Source::Startups => json!({
                "year": src.get("year"),
                "industry": src.get("industry"),
                "stage": src.get("stage"),
                "website": src.get("website"),
            }),
        };

        RetrievalCandidate {
            doc_id,
            source,
            score: hit.score,
            title,
            snippet: truncate_chars(&snippet_source, SNIPPET_CHARS),
            metadata,
        }
    }

    /// Create the two corpus indices if they do not exist yet.
    pub async fn ensure_indices(&self) -> AppResult<()> {
        for source in [Source::Papers, Source::Startups] {
            let index = Self::index_for(source);
            let url = format!("{}/{}", self.base_url, index);

            let head = self
                .http
                .head(&url)
                .basic_auth(&self.username, Some(&self.password))
                .send()
                .await
                .map_err(|e| AppError::Upstream(format!("OpenSearch probe failed: {}", e)))?;
            if head.status() != reqwest::StatusCode::NOT_FOUND {
                continue;
            }

            self.http
                .put(&url)
                .basic_auth(&self.username, Some(&self.password))
                .json(&json!({ "mappings": Self::index_mappings(source) }))
                .send()
                .await
                .map_err(|e| AppError::Upstream(format!("Index creation failed: {}", e)))?
                .error_for_status()
                .map_err(|e| AppError::Upstream(format!("Index creation status: {}", e)))?;

            info!(index, "Created lexical index");
        }
        Ok(())
    }

    fn index_mappings(source: Source) -> Value {
        let common = json!({
            "doc_id": { "type": "keyword" },
            "external_id": { "type": "keyword" },
            "title": { "type": "text" },
            "year": { "type": "integer" },
        });
        let mut properties = common;
        match source {
            Source::Papers => {
                properties["abstract"] = json!({ "type": "text" });
                properties["concepts"] = json!({ "type": "text" });
                properties["authors"] = json!({ "type": "text" });
                properties["venue"] = json!({ "type": "keyword" });
                properties["doi"] = json!({ "type": "keyword" });
            }
            Source::Startups => {
                properties["name"] = json!({ "type": "text" });
                properties["description"] = json!({ "type": "text" });
                properties["one_liner"] = json!({ "type": "text" });
                properties["industry"] = json!({ "type": "text" });
                properties["stage"] = json!({ "type": "keyword" });
                properties["website"] = json!({ "type": "keyword" });
            }
        }
        json!({ "properties": properties })
    }

    fn bulk_doc(source: Source, doc: &LexicalDocument) -> Value {
        let mut body = json!({
            "doc_id": doc.doc_id,
            "external_id": doc.external_id,
            "title": doc.title,
            "year": doc.year,
        });
        body[match source {
            Source::Papers => "abstract",
            Source::Startups => "description",
        }] = Value::String(doc.text.clone());

        // Flatten source-specific metadata into the indexed document.
        if let Value::Object(extra) = &doc.metadata {
            for (key, value) in extra {
                body[key.as_str()] = value.clone();
            }
        }
        body
    }
}

#[async_trait]
impl LexicalSearch for OpenSearchClient {
    /// Query both corpus indices concurrently and return the combined list.
    ///
    /// A `source` filter narrows which indices are queried; `year_gte` becomes
    /// a range clause. Scores across the two indices share the BM25 basis.
    async fn search(
        &self,
        query: &str,
        filters: &SearchFilters,
        top_k: usize,
    ) -> AppResult<Vec<RetrievalCandidate>> {
        let want = |source: Source| {
            filters
                .source
                .as_ref()
                .map_or(true, |sources| sources.contains(&source))
        };

        let papers = async {
            if want(Source::Papers) {
                self.search_index(Source::Papers, query, filters.year_gte, top_k)
                    .await
            } else {
                Ok(Vec::new())
            }
        };
        let startups = async {
            if want(Source::Startups) {
                self.search_index(Source::Startups, query, filters.year_gte, top_k)
                    .await
            } else {
                Ok(Vec::new())
            }
        };

        let (papers, startups) = futures::join!(papers, startups);
        let mut results = papers?;
        results.extend(startups?);

        info!(count = results.len(), "BM25 search completed");
        Ok(results)
    }
}

#[async_trait]
impl LexicalIndexer for OpenSearchClient {
    async fn bulk_index(
        &self,
        source: Source,
        documents: &[LexicalDocument],
    ) -> AppResult<BulkOutcome> {
        if documents.is_empty() {
            return Ok(BulkOutcome::default());
        }

        let index = Self::index_for(source);
        let mut ndjson = String::new();
        for doc in documents {
            ndjson.push_str(
                &json!({ "index": { "_index": index, "_id": doc.doc_id } }).to_string(),
            );
            ndjson.push('\n');
            ndjson.push_str(&Self::bulk_doc(source, doc).to_string());
            ndjson.push('\n');
        }

        let url = format!("{}/_bulk", self.base_url);
        let response = self
            .http
            .post(&url)
            .basic_auth(&self.username, Some(&self.password))
            .header("Content-Type", "application/x-ndjson")
            .body(ndjson)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("OpenSearch bulk failed: {}", e)))?
            .error_for_status()
            .map_err(|e| AppError::Upstream(format!("OpenSearch bulk status: {}", e)))?;

        let parsed: BulkResponse = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("OpenSearch bulk parse error: {}", e)))?;

        let errors = if parsed.errors {
            parsed
                .items
                .iter()
                .filter(|item| {
                    item.get("index")
                        .and_then(|i| i.get("error"))
                        .is_some()
                })
                .count()
        } else {
            0
        };

        let outcome = BulkOutcome {
            indexed: documents.len() - errors,
            errors,
        };
        info!(indexed = outcome.indexed, errors = outcome.errors, index, "Bulk index completed");
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(source_body: Value, score: f32) -> Hit {
        Hit { score, source: source_body }
    }

    fn client(url: String) -> OpenSearchClient {
        OpenSearchClient::new(&OpenSearchConfig {
            url,
            username: "admin".to_string(),
            password: "admin".to_string(),
        })
    }

    #[tokio::test]
    async fn test_search_parses_hits_from_server() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/papers_bm25/_search")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "hits": { "hits": [
                        { "_score": 11.2, "_source": {
                            "doc_id": "d1",
                            "title": "Solid-state batteries",
                            "abstract": "A study of electrolytes.",
                            "year": 2023,
                        }},
                    ]}
                })
                .to_string(),
            )
            .create_async()
            .await;

        let filters = SearchFilters {
            source: Some(vec![Source::Papers]),
            year_gte: None,
        };
        let results = client(server.url()).search("batteries", &filters, 10).await.unwrap();

        mock.assert_async().await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].doc_id, "d1");
        assert!((results[0].score - 11.2).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn test_search_error_status_is_upstream_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/papers_bm25/_search")
            .with_status(500)
            .create_async()
            .await;

        let filters = SearchFilters {
            source: Some(vec![Source::Papers]),
            year_gte: None,
        };
        let err = client(server.url()).search("batteries", &filters, 10).await.unwrap_err();
        assert!(matches!(err, AppError::Upstream(_)));
    }

    #[test]
    fn test_paper_candidate_from_hit() {
        let candidate = OpenSearchClient::candidate_from_hit(
            Source::Papers,
            hit(
                json!({
                    "doc_id": "d1",
                    "title": "Solid-state batteries",
                    "abstract": "A study of electrolytes.",
                    "year": 2023,
                    "venue": "Nature Energy",
                }),
                12.5,
            ),
        );

        assert_eq!(candidate.doc_id, "d1");
        assert_eq!(candidate.source, Source::Papers);
        assert_eq!(candidate.snippet, "A study of electrolytes.");
        assert_eq!(candidate.year(), Some(2023));
    }

    #[test]
    fn test_startup_candidate_falls_back_to_name_and_one_liner() {
        let candidate = OpenSearchClient::candidate_from_hit(
            Source::Startups,
            hit(
                json!({
                    "doc_id": "s1",
                    "name": "VoltCo",
                    "one_liner": "Batteries for drones.",
                    "year": 2022,
                }),
                3.0,
            ),
        );

        assert_eq!(candidate.title, "VoltCo");
        assert_eq!(candidate.snippet, "Batteries for drones.");
    }

    #[test]
    fn test_bulk_doc_uses_source_text_field() {
        let doc = LexicalDocument {
            doc_id: "d1".into(),
            external_id: "W1".into(),
            title: "T".into(),
            text: "body text".into(),
            year: Some(2020),
            metadata: json!({ "venue": "ICML" }),
        };

        let papers = OpenSearchClient::bulk_doc(Source::Papers, &doc);
        assert_eq!(papers["abstract"], "body text");
        assert_eq!(papers["venue"], "ICML");

        let startups = OpenSearchClient::bulk_doc(Source::Startups, &doc);
        assert_eq!(startups["description"], "body text");
    }
}
