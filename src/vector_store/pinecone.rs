//! Pinecone REST client.
//!
//! Index management goes through the environment's controller
//! (`https://controller.{environment}.pinecone.io`); upserts and queries go to
//! the per-index host that the controller reports once the index is ready.

use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::OnceCell;
use tracing::{debug, error, info, warn};

use super::mmr::mmr_select;
use super::{
    IndexSpec, Metric, QueryMode, VectorIndex, VectorQuery, VectorQueryResult, VectorStoreError,
    require_embedding,
};
use crate::BoxFuture;
use crate::models::{Metadata, Node};

/// Vectors per upsert request.
const UPSERT_BATCH_SIZE: usize = 100;

const TEXT_KEY: &str = "text";
const DOC_ID_KEY: &str = "doc_id";
const REF_DOC_ID_KEY: &str = "ref_doc_id";
const RESERVED_KEYS: [&str; 3] = [TEXT_KEY, DOC_ID_KEY, REF_DOC_ID_KEY];
/// Prefix for note fields whose name clashes with a reserved key.
const ESCAPE_PREFIX: &str = "_frontmatter_";

pub struct PineconeVectorStore {
    client: reqwest::Client,
    api_key: String,
    controller_url: String,
    index_name: String,
    metric: Metric,
    namespace: String,
    host: OnceCell<String>,
    ready_timeout: Duration,
    poll_interval: Duration,
}

impl fmt::Debug for PineconeVectorStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PineconeVectorStore")
            .field("api_key", &"<redacted>")
            .field("controller_url", &self.controller_url)
            .field("index_name", &self.index_name)
            .field("metric", &self.metric)
            .field("namespace", &self.namespace)
            .field("host", &self.host.get())
            .finish_non_exhaustive()
    }
}

impl PineconeVectorStore {
    /// Binds to `index_name` in the given Pinecone environment.
    ///
    /// `metric` must match the index's metric; it decides how raw query
    /// scores are turned into similarities.
    #[must_use]
    pub fn new(
        client: reqwest::Client,
        api_key: String,
        environment: &str,
        index_name: impl Into<String>,
        metric: Metric,
    ) -> Self {
        Self {
            client,
            api_key,
            controller_url: format!("https://controller.{environment}.pinecone.io"),
            index_name: index_name.into(),
            metric,
            namespace: String::new(),
            host: OnceCell::new(),
            ready_timeout: Duration::from_secs(300),
            poll_interval: Duration::from_secs(5),
        }
    }

    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    #[must_use]
    pub fn with_controller_url(mut self, url: impl Into<String>) -> Self {
        self.controller_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// How long `create_index` waits for the new index to report ready.
    #[must_use]
    pub fn with_ready_timeout(mut self, timeout: Duration, poll_interval: Duration) -> Self {
        self.ready_timeout = timeout;
        self.poll_interval = poll_interval;
        self
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<(reqwest::StatusCode, String), VectorStoreError> {
        let response = request.header("Api-Key", &self.api_key).send().await?;
        let status = response.status();
        let text = response.text().await?;
        Ok((status, text))
    }

    async fn describe(&self) -> Result<IndexDescription, VectorStoreError> {
        let url = format!("{}/databases/{}", self.controller_url, self.index_name);
        let (status, text) = self.send(self.client.get(url)).await?;
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(VectorStoreError::NotFound(self.index_name.clone()));
        }
        if !status.is_success() {
            error!("Pinecone describe_index error {status}: {text}");
            return Err(VectorStoreError::Api {
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(serde_json::from_str(&text)?)
    }

    async fn wait_until_ready(&self) -> Result<(), VectorStoreError> {
        let started = Instant::now();
        loop {
            let description = self.describe().await?;
            if description.status.ready {
                return Ok(());
            }
            if started.elapsed() >= self.ready_timeout {
                return Err(VectorStoreError::NotReady(self.index_name.clone()));
            }
            debug!(
                index = %self.index_name,
                state = ?description.status.state,
                "Waiting for index"
            );
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Data-plane base URL, resolved once per process.
    async fn host(&self) -> Result<&str, VectorStoreError> {
        let host = self
            .host
            .get_or_try_init(|| async {
                let description = self.describe().await?;
                let host = description
                    .status
                    .host
                    .filter(|h| !h.is_empty())
                    .ok_or_else(|| VectorStoreError::NotReady(self.index_name.clone()))?;
                Ok::<_, VectorStoreError>(if host.starts_with("http") {
                    host.trim_end_matches('/').to_string()
                } else {
                    format!("https://{host}")
                })
            })
            .await?;
        Ok(host.as_str())
    }

    async fn post_data<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<String, VectorStoreError> {
        let url = format!("{}{path}", self.host().await?);
        let (status, text) = self.send(self.client.post(url).json(body)).await?;
        if !status.is_success() {
            error!("Pinecone {path} error {status}: {text}");
            return Err(VectorStoreError::Api {
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(text)
    }
}

fn to_pinecone_metadata(node: &Node) -> Map<String, Value> {
    let mut metadata: Map<String, Value> = node
        .metadata
        .iter()
        .map(|(k, v)| {
            let key = if RESERVED_KEYS.contains(&k.as_str()) {
                warn!(
                    node = %node.id,
                    "Metadata key `{k}` is reserved, storing as `{ESCAPE_PREFIX}{k}`"
                );
                format!("{ESCAPE_PREFIX}{k}")
            } else {
                k.clone()
            };
            (key, Value::String(v.clone()))
        })
        .collect();
    metadata.insert(TEXT_KEY.into(), Value::String(node.text.clone()));
    metadata.insert(DOC_ID_KEY.into(), Value::String(node.ref_doc_id.clone()));
    metadata.insert(REF_DOC_ID_KEY.into(), Value::String(node.ref_doc_id.clone()));
    metadata
}

fn node_from_match(m: QueryMatch) -> Node {
    let mut fields = m.metadata.unwrap_or_default();
    let mut take = |key: &str| match fields.remove(key) {
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
        None => None,
    };
    let text = take(TEXT_KEY).unwrap_or_default();
    let doc_id = take(DOC_ID_KEY);
    let ref_doc_id = take(REF_DOC_ID_KEY).or(doc_id).unwrap_or_default();

    let metadata: Metadata = fields
        .into_iter()
        .map(|(k, v)| {
            let key = match k.strip_prefix(ESCAPE_PREFIX) {
                Some(original) if RESERVED_KEYS.contains(&original) => original.to_string(),
                _ => k,
            };
            match v {
                Value::String(s) => (key, s),
                other => (key, other.to_string()),
            }
        })
        .collect();

    Node {
        id: m.id,
        ref_doc_id,
        text,
        metadata,
        embedding: None,
    }
}

impl VectorIndex for PineconeVectorStore {
    fn create_index<'a>(
        &'a self,
        spec: &'a IndexSpec,
    ) -> BoxFuture<'a, Result<(), VectorStoreError>> {
        Box::pin(async move {
            let body = CreateIndexRequest {
                name: &spec.name,
                dimension: spec.dimension,
                metric: spec.metric.as_str(),
                pod_type: &spec.pod_type,
            };
            let url = format!("{}/databases", self.controller_url);
            let (status, text) = self.send(self.client.post(url).json(&body)).await?;

            if status == reqwest::StatusCode::CONFLICT {
                return Err(VectorStoreError::AlreadyExists(spec.name.clone()));
            }
            if !status.is_success() {
                error!("Pinecone create_index error {status}: {text}");
                return Err(VectorStoreError::Api {
                    status: status.as_u16(),
                    body: text,
                });
            }

            info!(index = %spec.name, "Index requested, waiting until ready");
            self.wait_until_ready().await
        })
    }

    fn upsert<'a>(&'a self, nodes: &'a [Node]) -> BoxFuture<'a, Result<usize, VectorStoreError>> {
        Box::pin(async move {
            let mut sent = 0;
            for batch in nodes.chunks(UPSERT_BATCH_SIZE) {
                let vectors = batch
                    .iter()
                    .map(|node| {
                        Ok(UpsertVector {
                            id: &node.id,
                            values: require_embedding(node)?,
                            metadata: to_pinecone_metadata(node),
                        })
                    })
                    .collect::<Result<Vec<_>, VectorStoreError>>()?;

                let body = UpsertRequest {
                    vectors,
                    namespace: &self.namespace,
                };
                let text = self.post_data("/vectors/upsert", &body).await?;
                let resp: UpsertResponse = serde_json::from_str(&text)?;
                debug!(upserted = resp.upserted_count, "Upsert batch accepted");
                sent += batch.len();
            }
            Ok(sent)
        })
    }

    fn query<'a>(
        &'a self,
        query: &'a VectorQuery,
    ) -> BoxFuture<'a, Result<VectorQueryResult, VectorStoreError>> {
        Box::pin(async move {
            let mmr_lambda = match query.mode {
                QueryMode::Default => None,
                QueryMode::Mmr { lambda } => Some(lambda),
            };
            let top_k = query.mode.fetch_k(query.top_k);
            let body = QueryRequest {
                vector: &query.embedding,
                top_k,
                include_metadata: true,
                include_values: mmr_lambda.is_some(),
                namespace: &self.namespace,
            };
            let text = self.post_data("/query", &body).await?;
            let resp: QueryResponse = serde_json::from_str(&text)?;

            if let Some(lambda) = mmr_lambda {
                let mut matches = resp.matches;
                matches.retain(|m| m.values.as_ref().is_some_and(|v| !v.is_empty()));
                let vectors: Vec<&[f32]> = matches
                    .iter()
                    .filter_map(|m| m.values.as_deref())
                    .collect();
                let picked = mmr_select(&query.embedding, &vectors, query.top_k, lambda);
                let mut slots: Vec<Option<QueryMatch>> = matches.into_iter().map(Some).collect();
                let nodes = picked
                    .into_iter()
                    .filter_map(|i| slots[i].take())
                    .map(node_from_match)
                    .collect();
                return Ok(VectorQueryResult {
                    nodes,
                    similarities: None,
                });
            }

            let similarities = resp
                .matches
                .iter()
                .map(|m| self.metric.similarity(m.score))
                .collect();
            Ok(VectorQueryResult {
                nodes: resp.matches.into_iter().map(node_from_match).collect(),
                similarities: Some(similarities),
            })
        })
    }
}

#[derive(Serialize)]
struct CreateIndexRequest<'a> {
    name: &'a str,
    dimension: usize,
    metric: &'a str,
    pod_type: &'a str,
}

#[derive(Deserialize)]
struct IndexDescription {
    status: IndexStatus,
}

#[derive(Deserialize)]
struct IndexStatus {
    #[serde(default)]
    ready: bool,
    #[serde(default)]
    host: Option<String>,
    #[serde(default)]
    state: Option<String>,
}

#[derive(Serialize)]
struct UpsertVector<'a> {
    id: &'a str,
    values: &'a [f32],
    metadata: Map<String, Value>,
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
    vectors: Vec<UpsertVector<'a>>,
    #[serde(skip_serializing_if = "str::is_empty")]
    namespace: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
    #[serde(default)]
    upserted_count: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
    include_values: bool,
    #[serde(skip_serializing_if = "str::is_empty")]
    namespace: &'a str,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Deserialize)]
struct QueryMatch {
    id: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    values: Option<Vec<f32>>,
    #[serde(default)]
    metadata: Option<Map<String, Value>>,
}
