//! Pinecone control-plane client.
//!
//! Only index bootstrap lives here: make sure a serverless index exists and resolve its
//! data-plane host. Capabilities keep the resulting `IndexHandle`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use lexbot_core::{config::PineconeIndexConfig, errors::Error, Result};

const CONTROL_PLANE_URL: &str = "https://api.pinecone.io";
const API_VERSION: &str = "2024-07";
const ERROR_BODY_PREVIEW: usize = 200;

/// Embedding size of `text-embedding-ada-002` / `text-embedding-3-small`.
pub const DEFAULT_DIMENSION: u32 = 1536;
pub const DEFAULT_METRIC: &str = "cosine";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexSpec {
    pub name: String,
    pub dimension: u32,
    pub metric: String,
    pub cloud: String,
    pub region: String,
}

impl IndexSpec {
    pub fn from_config(cfg: &PineconeIndexConfig) -> Self {
        Self {
            name: cfg.index.clone(),
            dimension: DEFAULT_DIMENSION,
            metric: DEFAULT_METRIC.to_string(),
            cloud: cfg.cloud.clone(),
            region: cfg.region.clone(),
        }
    }
}

/// A ready-to-use index: its name and the data-plane host queries go to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexHandle {
    pub name: String,
    pub host: String,
}

#[derive(Debug, Deserialize)]
struct IndexList {
    #[serde(default)]
    indexes: Vec<IndexDescription>,
}

#[derive(Debug, Deserialize)]
struct IndexDescription {
    name: String,
    #[serde(default)]
    host: Option<String>,
}

#[derive(Debug, Serialize)]
struct CreateIndexRequest<'a> {
    name: &'a str,
    dimension: u32,
    metric: &'a str,
    spec: CreateIndexSpec<'a>,
}

#[derive(Debug, Serialize)]
struct CreateIndexSpec<'a> {
    serverless: ServerlessSpec<'a>,
}

#[derive(Debug, Serialize)]
struct ServerlessSpec<'a> {
    cloud: &'a str,
    region: &'a str,
}

#[derive(Clone, Debug)]
pub struct PineconeClient {
    api_key: String,
    base_url: String,
    http: reqwest::Client,
}

impl PineconeClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, CONTROL_PLANE_URL)
    }

    pub fn with_base_url(api_key: impl Into<String>, base_url: &str) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, format!("{}/{path}", self.base_url))
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
    }

    async fn send_json(&self, req: reqwest::RequestBuilder, what: &str) -> Result<Value> {
        let resp = req
            .send()
            .await
            .map_err(|e| Error::External(format!("pinecone {what} request error: {e}")))?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(Error::External(format!(
                "pinecone {what} failed: {status} {}",
                body.chars().take(ERROR_BODY_PREVIEW).collect::<String>()
            )));
        }
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&body)?)
    }

    pub async fn list_indexes(&self) -> Result<Vec<String>> {
        let v = self
            .send_json(self.request(reqwest::Method::GET, "indexes"), "list indexes")
            .await?;
        index_names(v)
    }

    pub async fn create_index(&self, spec: &IndexSpec) -> Result<()> {
        let body = create_index_body(spec);
        self.send_json(
            self.request(reqwest::Method::POST, "indexes").json(&body),
            "create index",
        )
        .await?;
        Ok(())
    }

    pub async fn describe_index(&self, name: &str) -> Result<IndexHandle> {
        let v = self
            .send_json(
                self.request(reqwest::Method::GET, &format!("indexes/{name}")),
                "describe index",
            )
            .await?;
        index_handle(v)
    }

    /// Create the index when it is missing, then resolve its host.
    pub async fn ensure_index(&self, spec: &IndexSpec) -> Result<IndexHandle> {
        let names = self.list_indexes().await?;
        if names.iter().any(|n| n == &spec.name) {
            tracing::info!(index = %spec.name, "pinecone index exists");
        } else {
            tracing::info!(
                index = %spec.name,
                dimension = spec.dimension,
                metric = %spec.metric,
                cloud = %spec.cloud,
                region = %spec.region,
                "creating pinecone index"
            );
            self.create_index(spec).await?;
        }
        let handle = self.describe_index(&spec.name).await?;
        tracing::info!(index = %handle.name, host = %handle.host, "pinecone index ready");
        Ok(handle)
    }
}

/// Bootstrap the index described by one config block.
pub async fn ensure_index_from_config(cfg: &PineconeIndexConfig) -> Result<IndexHandle> {
    PineconeClient::new(cfg.api_key.clone())
        .ensure_index(&IndexSpec::from_config(cfg))
        .await
}

fn create_index_body(spec: &IndexSpec) -> CreateIndexRequest<'_> {
    CreateIndexRequest {
        name: &spec.name,
        dimension: spec.dimension,
        metric: &spec.metric,
        spec: CreateIndexSpec {
            serverless: ServerlessSpec {
                cloud: &spec.cloud,
                region: &spec.region,
            },
        },
    }
}

fn index_names(v: Value) -> Result<Vec<String>> {
    let list: IndexList = serde_json::from_value(v)?;
    Ok(list.indexes.into_iter().map(|i| i.name).collect())
}

fn index_handle(v: Value) -> Result<IndexHandle> {
    let desc: IndexDescription = serde_json::from_value(v)?;
    let host = desc
        .host
        .filter(|h| !h.trim().is_empty())
        .ok_or_else(|| Error::External(format!("pinecone index '{}' has no host", desc.name)))?;
    Ok(IndexHandle {
        name: desc.name,
        host,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::{TcpListener, TcpStream},
        task::JoinHandle,
    };

    /// Serve one canned `(status, body)` per connection, in order, and hand back the raw
    /// requests once every response has gone out.
    async fn serve(responses: Vec<(u16, &'static str)>) -> (String, JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let mut seen = Vec::new();
            for (status, body) in responses {
                let (mut sock, _) = listener.accept().await.unwrap();
                seen.push(read_request(&mut sock).await);
                let resp = format!(
                    "HTTP/1.1 {status} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                sock.write_all(resp.as_bytes()).await.unwrap();
                let _ = sock.shutdown().await;
            }
            seen
        });
        (format!("http://{addr}"), handle)
    }

    async fn read_request(sock: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = sock.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
                continue;
            };
            let head = String::from_utf8_lossy(&buf[..end]).to_lowercase();
            let len = head
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + len {
                break;
            }
        }
        String::from_utf8_lossy(&buf).to_string()
    }

    fn spec() -> IndexSpec {
        IndexSpec::from_config(&PineconeIndexConfig {
            api_key: "pc-key".to_string(),
            index: "case-law".to_string(),
            cloud: "aws".to_string(),
            region: "us-east-1".to_string(),
        })
    }

    #[test]
    fn spec_uses_embedding_defaults() {
        let s = spec();
        assert_eq!(s.name, "case-law");
        assert_eq!(s.dimension, 1536);
        assert_eq!(s.metric, "cosine");
    }

    #[test]
    fn create_body_is_serverless() {
        let s = spec();
        let v = serde_json::to_value(create_index_body(&s)).unwrap();
        assert_eq!(
            v,
            json!({
                "name": "case-law",
                "dimension": 1536,
                "metric": "cosine",
                "spec": {"serverless": {"cloud": "aws", "region": "us-east-1"}}
            })
        );
    }

    #[test]
    fn parses_index_list() {
        let v = json!({
            "indexes": [
                {"name": "case-law", "dimension": 1536, "host": "case-law-abc.svc.pinecone.io"},
                {"name": "memos", "dimension": 1536}
            ]
        });
        assert_eq!(index_names(v).unwrap(), vec!["case-law", "memos"]);
        assert!(index_names(json!({})).unwrap().is_empty());
    }

    #[test]
    fn describe_requires_host() {
        let ok = json!({"name": "memos", "host": "memos-xyz.svc.pinecone.io", "status": {"ready": true}});
        assert_eq!(
            index_handle(ok).unwrap(),
            IndexHandle {
                name: "memos".to_string(),
                host: "memos-xyz.svc.pinecone.io".to_string(),
            }
        );
        assert!(index_handle(json!({"name": "memos"})).is_err());
        assert!(index_handle(json!({"name": "memos", "host": ""})).is_err());
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let c = PineconeClient::with_base_url("k", "http://localhost:5080/");
        assert_eq!(c.base_url, "http://localhost:5080");
    }

    #[tokio::test]
    async fn ensure_index_creates_missing_index_then_describes_it() {
        let (url, server) = serve(vec![
            (200, r#"{"indexes":[{"name":"memos","host":"memos-xyz.svc.pinecone.io"}]}"#),
            (201, r#"{"name":"case-law","dimension":1536}"#),
            (200, r#"{"name":"case-law","host":"case-law-abc.svc.pinecone.io"}"#),
        ])
        .await;

        let handle = PineconeClient::with_base_url("pc-key", &url)
            .ensure_index(&spec())
            .await
            .unwrap();
        assert_eq!(handle.host, "case-law-abc.svc.pinecone.io");

        let seen = server.await.unwrap();
        assert_eq!(seen.len(), 3);
        assert!(seen[0].starts_with("GET /indexes HTTP/1.1"), "{}", seen[0]);
        assert!(seen[1].starts_with("POST /indexes HTTP/1.1"), "{}", seen[1]);
        assert!(seen[1].contains(r#""serverless":{"cloud":"aws","region":"us-east-1"}"#));
        assert!(seen[2].starts_with("GET /indexes/case-law HTTP/1.1"), "{}", seen[2]);
        for req in &seen {
            let lower = req.to_lowercase();
            assert!(lower.contains("api-key: pc-key"));
            assert!(lower.contains("x-pinecone-api-version: 2024-07"));
        }
    }

    #[tokio::test]
    async fn ensure_index_skips_create_for_existing_index() {
        let (url, server) = serve(vec![
            (200, r#"{"indexes":[{"name":"case-law"}]}"#),
            (200, r#"{"name":"case-law","host":"case-law-abc.svc.pinecone.io"}"#),
        ])
        .await;

        let handle = PineconeClient::with_base_url("pc-key", &url)
            .ensure_index(&spec())
            .await
            .unwrap();
        assert_eq!(handle.name, "case-law");

        let seen = server.await.unwrap();
        assert!(seen[0].starts_with("GET /indexes "));
        assert!(seen[1].starts_with("GET /indexes/case-law "));
    }

    #[tokio::test]
    async fn server_error_fails_bootstrap() {
        let (url, server) = serve(vec![(500, r#"{"error":"boom"}"#)]).await;

        let err = PineconeClient::with_base_url("pc-key", &url)
            .ensure_index(&spec())
            .await
            .unwrap_err();
        assert!(
            matches!(err, Error::External(ref m) if m.starts_with("pinecone list indexes failed: 500")),
            "{err}"
        );
        assert_eq!(server.await.unwrap().len(), 1);
    }
}
