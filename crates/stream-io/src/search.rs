//! Elasticsearch client over the REST API.

use crate::sink::{DocumentSink, DocumentSource, IndexOutcome, SearchHit, SinkError};
use crate::tls::{build_client_config, TlsConfig};
use base64::Engine;
use reqwest::{header, RequestBuilder, Response};
use serde::Deserialize;
use std::time::Duration;
use stream_core::SensorReading;
use tracing::debug;

#[derive(Clone, Default)]
pub enum SearchAuth {
    #[default]
    None,
    Basic {
        username: String,
        password: String,
    },
    /// Encoded `id:key` pair, sent as `Authorization: ApiKey <value>`.
    ApiKey(String),
}

impl SearchAuth {
    /// Accepts either a raw `id:key` pair or an already-encoded key.
    pub fn api_key(raw: &str) -> Self {
        if raw.contains(':') {
            let engine = base64::engine::general_purpose::STANDARD;
            Self::ApiKey(engine.encode(raw))
        } else {
            Self::ApiKey(raw.to_string())
        }
    }
}

impl std::fmt::Debug for SearchAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Basic { username, .. } => write!(f, "Basic({username}, ***)"),
            Self::ApiKey(_) => f.write_str("ApiKey(***)"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct SearchConfig {
    pub url: String,
    pub auth: SearchAuth,
    pub timeout: Duration,
    pub tls: TlsConfig,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:9200".to_string(),
            auth: SearchAuth::None,
            timeout: Duration::from_secs(10),
            tls: TlsConfig::default(),
        }
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    hits: Hits,
}

#[derive(Deserialize)]
struct Hits {
    #[serde(default)]
    hits: Vec<SearchHit>,
}

#[derive(Clone)]
pub struct SearchClient {
    http: reqwest::Client,
    base_url: String,
    auth: SearchAuth,
}

impl SearchClient {
    pub fn new(config: &SearchConfig) -> Result<Self, SinkError> {
        let mut builder = reqwest::Client::builder().timeout(config.timeout);
        if config.tls.enabled {
            let tls = build_client_config(&config.tls)?;
            builder = builder.use_preconfigured_tls((*tls).clone());
        }

        Ok(Self {
            http: builder.build()?,
            base_url: config.url.trim_end_matches('/').to_string(),
            auth: config.auth.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn post(&self, path: &str) -> RequestBuilder {
        let request = self.http.post(format!("{}/{}", self.base_url, path));
        match &self.auth {
            SearchAuth::None => request,
            SearchAuth::Basic { username, password } => {
                request.basic_auth(username, Some(password))
            }
            SearchAuth::ApiKey(key) => {
                request.header(header::AUTHORIZATION, format!("ApiKey {key}"))
            }
        }
    }

    async fn check(response: Response) -> Result<Response, SinkError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(SinkError::Server {
            status: status.as_u16(),
            body,
        })
    }
}

impl DocumentSink for SearchClient {
    async fn index_document(
        &self,
        index: &str,
        document: &SensorReading,
    ) -> Result<IndexOutcome, SinkError> {
        let response = self
            .post(&format!("{index}/_doc"))
            .json(document)
            .send()
            .await?;
        let outcome: IndexOutcome = Self::check(response).await?.json().await?;
        debug!(
            index = %outcome.index,
            id = %outcome.id,
            result = %outcome.result,
            "Document indexed"
        );
        Ok(outcome)
    }
}

impl DocumentSource for SearchClient {
    async fn search(
        &self,
        index: &str,
        query: serde_json::Value,
    ) -> Result<Vec<SearchHit>, SinkError> {
        let body = serde_json::json!({ "query": query });
        let response = self
            .post(&format!("{index}/_search"))
            .json(&body)
            .send()
            .await?;
        let parsed: SearchResponse = Self::check(response).await?.json().await?;
        debug!(index, hits = parsed.hits.hits.len(), "Search complete");
        Ok(parsed.hits.hits)
    }
}
