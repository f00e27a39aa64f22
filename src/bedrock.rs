//! Amazon Bedrock Knowledge Bases client.
//!
//! Calls the Bedrock REST API directly with SigV4-signed JSON requests
//! (see [`crate::sigv4`]). Three operations are used:
//!
//! | Operation | Host | Method | Path |
//! |-----------|------|--------|------|
//! | RetrieveAndGenerate | `bedrock-agent-runtime` | `POST` | `/retrieveAndGenerate` |
//! | Retrieve | `bedrock-agent-runtime` | `POST` | `/knowledgebases/{kbId}/retrieve` |
//! | StartIngestionJob | `bedrock-agent` | `PUT` | `/knowledgebases/{kbId}/datasources/{dsId}/ingestionjobs/` |
//!
//! Both hosts sign with service name `bedrock`. Custom endpoints
//! (`aws.endpoint_url`, `aws.agent_endpoint_url`) replace the regional
//! defaults, which is how LocalStack-style fakes are wired in.
//!
//! Non-2xx responses become [`HrKbError::Remote`] carrying the AWS error
//! message when the body has one.

use async_trait::async_trait;
use aws_credential_types::provider::SharedCredentialsProvider;
use chrono::Utc;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::config::Config;
use crate::error::{HrKbError, HrKbResult};
use crate::sigv4::{self, uri_encode, AwsCredentials, SigningParams};
use crate::traits::KnowledgeService;

const SIGNING_SERVICE: &str = "bedrock";

// ═══════════════════════════════════════════════════════════════════════
// Wire types
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextInput {
    pub text: String,
}

/// Body of `POST /retrieveAndGenerate`.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RetrieveAndGenerateRequest {
    pub input: TextInput,
    pub retrieve_and_generate_configuration: RetrieveAndGenerateConfiguration,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RetrieveAndGenerateConfiguration {
    #[serde(rename = "type")]
    pub kind: String,
    pub knowledge_base_configuration: KnowledgeBaseConfiguration,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeBaseConfiguration {
    pub knowledge_base_id: String,
    pub model_arn: String,
}

impl RetrieveAndGenerateRequest {
    /// A `KNOWLEDGE_BASE` retrieve-and-generate request for one question.
    pub fn knowledge_base(
        question: impl Into<String>,
        knowledge_base_id: impl Into<String>,
        model_arn: impl Into<String>,
    ) -> Self {
        Self {
            input: TextInput {
                text: question.into(),
            },
            retrieve_and_generate_configuration: RetrieveAndGenerateConfiguration {
                kind: "KNOWLEDGE_BASE".to_string(),
                knowledge_base_configuration: KnowledgeBaseConfiguration {
                    knowledge_base_id: knowledge_base_id.into(),
                    model_arn: model_arn.into(),
                },
            },
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RetrieveAndGenerateResponse {
    #[serde(default)]
    pub output: Option<GenerationOutput>,
    #[serde(default)]
    pub citations: Option<Vec<Value>>,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GenerationOutput {
    #[serde(default)]
    pub text: Option<String>,
}

/// Body of `POST /knowledgebases/{kbId}/retrieve`. The id goes in the path.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RetrieveRequest {
    #[serde(skip)]
    pub knowledge_base_id: String,
    pub retrieval_query: TextInput,
    pub retrieval_configuration: RetrievalConfiguration,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalConfiguration {
    pub vector_search_configuration: VectorSearchConfiguration,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VectorSearchConfiguration {
    pub number_of_results: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub override_similarity_threshold: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RetrieveResponse {
    #[serde(default)]
    pub retrieval_results: Vec<RetrievedChunk>,
    #[serde(default)]
    pub next_token: Option<String>,
    /// The undecoded response body, kept for callers that surface it.
    #[serde(skip)]
    pub raw: Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RetrievedChunk {
    #[serde(default)]
    pub content: Option<RetrievedContent>,
    #[serde(default)]
    pub location: Option<Value>,
    #[serde(default)]
    pub metadata: Option<Value>,
    #[serde(default)]
    pub score: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RetrievedContent {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

/// Body of the StartIngestionJob `PUT`. Both ids go in the path.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StartIngestionJobRequest {
    #[serde(skip)]
    pub knowledge_base_id: String,
    #[serde(skip)]
    pub data_source_id: String,
    /// Idempotency token; a fresh one per trigger.
    pub client_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl StartIngestionJobRequest {
    pub fn new(knowledge_base_id: impl Into<String>, data_source_id: impl Into<String>) -> Self {
        Self {
            knowledge_base_id: knowledge_base_id.into(),
            data_source_id: data_source_id.into(),
            client_token: uuid::Uuid::new_v4().to_string(),
            description: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StartIngestionJobResponse {
    #[serde(default)]
    pub ingestion_job: Option<IngestionJob>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IngestionJob {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingestion_job_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub knowledge_base_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_source_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
}

// ═══════════════════════════════════════════════════════════════════════
// Client
// ═══════════════════════════════════════════════════════════════════════

/// Where requests for one Bedrock API go.
#[derive(Debug, Clone)]
struct Endpoint {
    /// Scheme + authority, no trailing slash.
    base_url: String,
    /// Authority used in the signed `host` header.
    host: String,
    /// Path the override URL carries, prepended to every request path.
    path_prefix: String,
}

impl Endpoint {
    fn resolve(override_url: Option<&str>, default_host: String) -> anyhow::Result<Self> {
        let Some(raw) = override_url else {
            return Ok(Self {
                base_url: format!("https://{}", default_host),
                host: default_host,
                path_prefix: String::new(),
            });
        };

        let url = reqwest::Url::parse(raw)
            .map_err(|e| anyhow::anyhow!("invalid endpoint URL '{}': {}", raw, e))?;
        let host_name = url
            .host_str()
            .ok_or_else(|| anyhow::anyhow!("endpoint URL '{}' has no host", raw))?;
        // Url::port() is None for the scheme's default port, matching what
        // reqwest sends in the Host header.
        let host = match url.port() {
            Some(port) => format!("{}:{}", host_name, port),
            None => host_name.to_string(),
        };

        Ok(Self {
            base_url: format!("{}://{}", url.scheme(), host),
            host,
            path_prefix: url.path().trim_end_matches('/').to_string(),
        })
    }
}

/// [`KnowledgeService`] backed by the Bedrock REST API.
///
/// Holds a pooled `reqwest::Client` and a credentials provider; clones
/// share both. Credentials are resolved on each call, so a missing key only
/// fails the invocation that needed it.
#[derive(Debug, Clone)]
pub struct BedrockClient {
    http: reqwest::Client,
    region: String,
    runtime: Endpoint,
    agent: Endpoint,
    credentials: SharedCredentialsProvider,
}

impl BedrockClient {
    /// Client using the AWS default credential chain.
    pub async fn new(config: &Config) -> anyhow::Result<Self> {
        let credentials =
            sigv4::default_credentials(&config.aws.region, config.aws.profile.as_deref()).await;
        Self::with_credentials(config, credentials)
    }

    /// Client using an explicit credentials provider.
    pub fn with_credentials(
        config: &Config,
        credentials: SharedCredentialsProvider,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.aws.timeout_secs))
            .build()?;

        let region = config.aws.region.clone();
        let runtime = Endpoint::resolve(
            config.aws.endpoint_url.as_deref(),
            format!("bedrock-agent-runtime.{}.amazonaws.com", region),
        )?;
        let agent = Endpoint::resolve(
            config.aws.agent_endpoint_url.as_deref(),
            format!("bedrock-agent.{}.amazonaws.com", region),
        )?;

        Ok(Self {
            http,
            region,
            runtime,
            agent,
            credentials,
        })
    }

    /// Sign and send one JSON request, returning the decoded response body.
    async fn send_json<T: Serialize>(
        &self,
        operation: &str,
        endpoint: &Endpoint,
        method: Method,
        path: &str,
        body: &T,
    ) -> HrKbResult<Value> {
        let creds = AwsCredentials::resolve(&self.credentials).await?;
        let full_path = format!("{}{}", endpoint.path_prefix, path);
        let payload = serde_json::to_vec(body)
            .map_err(|e| HrKbError::Remote(format!("{}: failed to encode request: {}", operation, e)))?;

        let signed = sigv4::sign(
            &creds,
            &SigningParams {
                method: method.as_str(),
                host: &endpoint.host,
                path: &full_path,
                payload: &payload,
                region: &self.region,
                service: SIGNING_SERVICE,
                now: Utc::now(),
            },
        );

        let url = format!("{}{}", endpoint.base_url, full_path);
        debug!(operation, %url, "calling knowledge service");

        let mut req = self
            .http
            .request(method, &url)
            .header("content-type", "application/json")
            .body(payload);
        for (name, value) in signed {
            req = req.header(name, value);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| HrKbError::Remote(format!("{} request failed: {}", operation, e)))?;

        let status = resp.status();
        let error_type = resp
            .headers()
            .get("x-amzn-errortype")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let text = resp.text().await.map_err(|e| {
            HrKbError::Remote(format!("{}: failed to read response: {}", operation, e))
        })?;

        if !status.is_success() {
            return Err(HrKbError::Remote(remote_error_message(
                status.as_u16(),
                error_type.as_deref(),
                &text,
            )));
        }

        if text.trim().is_empty() {
            return Ok(Value::Object(serde_json::Map::new()));
        }
        serde_json::from_str(&text)
            .map_err(|e| HrKbError::Remote(format!("{} returned invalid JSON: {}", operation, e)))
    }
}

fn decode<T: serde::de::DeserializeOwned>(operation: &str, value: Value) -> HrKbResult<T> {
    serde_json::from_value(value).map_err(|e| {
        HrKbError::Remote(format!("{} returned an unexpected response: {}", operation, e))
    })
}

#[async_trait]
impl KnowledgeService for BedrockClient {
    async fn retrieve_and_generate(
        &self,
        request: RetrieveAndGenerateRequest,
    ) -> HrKbResult<RetrieveAndGenerateResponse> {
        let value = self
            .send_json(
                "RetrieveAndGenerate",
                &self.runtime,
                Method::POST,
                "/retrieveAndGenerate",
                &request,
            )
            .await?;
        decode("RetrieveAndGenerate", value)
    }

    async fn retrieve(&self, request: RetrieveRequest) -> HrKbResult<RetrieveResponse> {
        let path = format!(
            "/knowledgebases/{}/retrieve",
            uri_encode(&request.knowledge_base_id)
        );
        let raw = self
            .send_json("Retrieve", &self.runtime, Method::POST, &path, &request)
            .await?;
        let mut response: RetrieveResponse = decode("Retrieve", raw.clone())?;
        response.raw = raw;
        Ok(response)
    }

    async fn start_ingestion_job(
        &self,
        request: StartIngestionJobRequest,
    ) -> HrKbResult<StartIngestionJobResponse> {
        let path = format!(
            "/knowledgebases/{}/datasources/{}/ingestionjobs/",
            uri_encode(&request.knowledge_base_id),
            uri_encode(&request.data_source_id)
        );
        let value = self
            .send_json("StartIngestionJob", &self.agent, Method::PUT, &path, &request)
            .await?;
        decode("StartIngestionJob", value)
    }
}

/// Best-effort message for a failed AWS call.
///
/// Prefers the body's `message`/`Message` field, then the error type from
/// `x-amzn-ErrorType`, then the bare status code.
pub fn remote_error_message(status: u16, error_type: Option<&str>, body: &str) -> String {
    let from_body = serde_json::from_str::<Value>(body).ok().and_then(|v| {
        ["message", "Message"]
            .iter()
            .find_map(|k| v.get(*k).and_then(Value::as_str).map(str::to_string))
    });
    if let Some(message) = from_body.filter(|m| !m.trim().is_empty()) {
        return message;
    }

    if let Some(kind) = error_type {
        let name = kind.split(':').next().unwrap_or(kind).trim();
        if !name.is_empty() {
            return format!("{} (HTTP {})", name, status);
        }
    }

    format!("HTTP {}", status)
}
