//! Configuration loading.
//!
//! Settings come from an optional TOML file and are then overridden by
//! environment variables. The variable names match the ones the deployed
//! chat server, MCP tool and ingestion lambda already use:
//!
//! | Env var | TOML key | Default |
//! |---------|----------|---------|
//! | `AWS_REGION` | `aws.region` | `us-east-1` |
//! | `HR_KB_ENDPOINT_URL` | `aws.endpoint_url` | regional Bedrock runtime endpoint |
//! | `HR_KB_AGENT_ENDPOINT_URL` | `aws.agent_endpoint_url` | regional Bedrock agent endpoint |
//! | `HR_KB_ID` | `knowledge_base.id` | none |
//! | `HR_KB_DATASOURCE_ID` | `knowledge_base.data_source_id` | none |
//! | `HR_CHAT_MODEL_ARN` | `chat.model_arn` | Claude 3 Sonnet foundation model |
//! | `HR_KB_DEFAULT_TOP_K` | `retrieval.default_top_k` | `8` |
//! | `HR_KB_DEFAULT_SCORE_THRESHOLD` | `retrieval.default_score_threshold` | `0.0` |
//! | `PORT` | `server.port` | `3000` |
//!
//! Empty environment values are treated as unset.
//!
//! # Example
//!
//! ```toml
//! [aws]
//! region = "us-east-1"
//!
//! [knowledge_base]
//! id = "ABCDEFGHIJ"
//! data_source_id = "KLMNOPQRST"
//!
//! [retrieval]
//! default_top_k = 5
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::error::{HrKbError, HrKbResult};

/// Largest `topK` the retrieval tool accepts.
pub const MAX_TOP_K: u32 = 50;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub aws: AwsConfig,
    #[serde(default)]
    pub knowledge_base: KnowledgeBaseConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AwsConfig {
    #[serde(default = "default_region")]
    pub region: String,
    /// Override for the `bedrock-agent-runtime` endpoint (LocalStack, VPC endpoints).
    #[serde(default)]
    pub endpoint_url: Option<String>,
    /// Override for the `bedrock-agent` endpoint used to start ingestion jobs.
    #[serde(default)]
    pub agent_endpoint_url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Named profile in the shared AWS config files. Unset means `AWS_PROFILE`
    /// or `default`.
    #[serde(default)]
    pub profile: Option<String>,
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            endpoint_url: None,
            agent_endpoint_url: None,
            timeout_secs: default_timeout_secs(),
            profile: None,
        }
    }
}

fn default_region() -> String {
    "us-east-1".to_string()
}
fn default_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct KnowledgeBaseConfig {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub data_source_id: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    #[serde(default = "default_model_arn")]
    pub model_arn: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            model_arn: default_model_arn(),
        }
    }
}

fn default_model_arn() -> String {
    "arn:aws:bedrock:us-east-1::foundation-model/anthropic.claude-3-sonnet-20240229-v1:0"
        .to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub default_top_k: u32,
    /// May be NaN when the configured value does not parse as a number; the
    /// retrieval tool then sends no threshold at all.
    #[serde(default = "default_score_threshold")]
    pub default_score_threshold: f64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_top_k: default_top_k(),
            default_score_threshold: default_score_threshold(),
        }
    }
}

fn default_top_k() -> u32 {
    8
}
fn default_score_threshold() -> f64 {
    0.0
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_public_dir")]
    pub public_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            public_dir: default_public_dir(),
        }
    }
}

fn default_port() -> u16 {
    3000
}
fn default_public_dir() -> PathBuf {
    PathBuf::from("public")
}

impl Config {
    /// The knowledge-base id, or a configuration error naming `HR_KB_ID`.
    pub fn require_knowledge_base_id(&self) -> HrKbResult<&str> {
        self.knowledge_base
            .id
            .as_deref()
            .ok_or_else(|| HrKbError::Config("HR_KB_ID env var is required".to_string()))
    }

    /// The data-source id, or a configuration error naming `HR_KB_DATASOURCE_ID`.
    pub fn require_data_source_id(&self) -> HrKbResult<&str> {
        self.knowledge_base.data_source_id.as_deref().ok_or_else(|| {
            HrKbError::Config("HR_KB_DATASOURCE_ID env var is required".to_string())
        })
    }

    /// Apply environment overrides using `lookup` to read variables.
    ///
    /// Taking the lookup as a closure keeps tests independent of the real
    /// process environment.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        self.apply_env_with(lookup, Strictness::Strict)
    }

    fn apply_env_with<F>(&mut self, lookup: F, strictness: Strictness) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(region) = var("AWS_REGION") {
            self.aws.region = region;
        }
        if let Some(url) = var("HR_KB_ENDPOINT_URL") {
            self.aws.endpoint_url = Some(url);
        }
        if let Some(url) = var("HR_KB_AGENT_ENDPOINT_URL") {
            self.aws.agent_endpoint_url = Some(url);
        }
        if let Some(id) = var("HR_KB_ID") {
            self.knowledge_base.id = Some(id);
        }
        if let Some(id) = var("HR_KB_DATASOURCE_ID") {
            self.knowledge_base.data_source_id = Some(id);
        }
        if let Some(arn) = var("HR_CHAT_MODEL_ARN") {
            self.chat.model_arn = arn;
        }
        if let Some(top_k) = var("HR_KB_DEFAULT_TOP_K") {
            let parsed = top_k
                .trim()
                .parse::<u32>()
                .with_context(|| format!("HR_KB_DEFAULT_TOP_K must be an integer, got '{}'", top_k));
            if let Some(value) = strictness.keep(parsed)? {
                self.retrieval.default_top_k = value;
            }
        }
        if let Some(threshold) = var("HR_KB_DEFAULT_SCORE_THRESHOLD") {
            self.retrieval.default_score_threshold = parse_threshold(&threshold);
        }
        if let Some(port) = var("PORT") {
            let parsed = port
                .trim()
                .parse::<u16>()
                .with_context(|| format!("PORT must be a valid port number, got '{}'", port));
            if let Some(value) = strictness.keep(parsed)? {
                self.server.port = value;
            }
        }

        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if !(1..=MAX_TOP_K).contains(&self.retrieval.default_top_k) {
            anyhow::bail!("retrieval.default_top_k must be in [1, {}]", MAX_TOP_K);
        }
        self.validate_aws()
    }

    fn validate_aws(&self) -> Result<()> {
        if self.aws.region.trim().is_empty() {
            anyhow::bail!("aws.region must not be empty");
        }
        Ok(())
    }

    /// Replace retrieval settings the ingestion trigger has no use for but
    /// that would fail [`Config::validate`].
    fn relax_for_ingestion(&mut self) {
        if !(1..=MAX_TOP_K).contains(&self.retrieval.default_top_k) {
            warn!(
                value = self.retrieval.default_top_k,
                "ignoring out-of-range retrieval.default_top_k"
            );
            self.retrieval.default_top_k = default_top_k();
        }
    }
}

/// How settings that fail to parse are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strictness {
    Strict,
    /// Log and skip the setting.
    Lenient,
}

impl Strictness {
    fn keep<T>(self, parsed: Result<T>) -> Result<Option<T>> {
        match (parsed, self) {
            (Ok(value), _) => Ok(Some(value)),
            (Err(e), Strictness::Strict) => Err(e),
            (Err(e), Strictness::Lenient) => {
                warn!(error = %e, "ignoring invalid setting");
                Ok(None)
            }
        }
    }
}

/// Parse a score threshold leniently: blank means `0.0`, anything that is
/// not a number becomes NaN rather than an error.
fn parse_threshold(raw: &str) -> f64 {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    trimmed.parse().unwrap_or(f64::NAN)
}

/// Load configuration from `path` (if it exists) and the process environment.
///
/// A missing file is not an error: every setting has a default or can be
/// supplied through the environment.
pub fn load_config(path: &Path) -> Result<Config> {
    let mut config = read_config_file(path)?;
    config.apply_env(|key| std::env::var(key).ok())?;
    config.validate()?;
    Ok(config)
}

/// Load configuration for the ingestion trigger.
///
/// Only the `[aws]` and `[knowledge_base]` settings matter there, so a bad
/// `HR_KB_DEFAULT_TOP_K` or `PORT` is logged and replaced by its default
/// instead of failing the load. An unreadable or malformed file is still
/// an error.
pub fn load_ingestion_config(path: &Path) -> Result<Config> {
    let mut config = read_config_file(path)?;
    config.apply_env_with(|key| std::env::var(key).ok(), Strictness::Lenient)?;
    config.relax_for_ingestion();
    config.validate_aws()?;
    Ok(config)
}

fn read_config_file(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    toml::from_str(&content).with_context(|| "Failed to parse config file")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.aws.region, "us-east-1");
        assert_eq!(cfg.retrieval.default_top_k, 8);
        assert_eq!(cfg.retrieval.default_score_threshold, 0.0);
        assert_eq!(cfg.server.port, 3000);
        assert!(cfg.chat.model_arn.contains("claude-3-sonnet"));
        assert!(cfg.knowledge_base.id.is_none());
    }

    #[test]
    fn test_env_overrides() {
        let vars = env(&[
            ("AWS_REGION", "eu-west-1"),
            ("HR_KB_ID", "KB123"),
            ("HR_KB_DATASOURCE_ID", "DS456"),
            ("HR_KB_DEFAULT_TOP_K", "12"),
            ("HR_KB_DEFAULT_SCORE_THRESHOLD", "0.35"),
            ("PORT", "8080"),
        ]);
        let mut cfg = Config::default();
        cfg.apply_env(|k| vars.get(k).cloned()).unwrap();

        assert_eq!(cfg.aws.region, "eu-west-1");
        assert_eq!(cfg.require_knowledge_base_id().unwrap(), "KB123");
        assert_eq!(cfg.require_data_source_id().unwrap(), "DS456");
        assert_eq!(cfg.retrieval.default_top_k, 12);
        assert!((cfg.retrieval.default_score_threshold - 0.35).abs() < 1e-9);
        assert_eq!(cfg.server.port, 8080);
    }

    #[test]
    fn test_empty_env_is_unset() {
        let vars = env(&[("AWS_REGION", ""), ("HR_KB_ID", "")]);
        let mut cfg = Config::default();
        cfg.apply_env(|k| vars.get(k).cloned()).unwrap();
        assert_eq!(cfg.aws.region, "us-east-1");
        assert!(cfg.require_knowledge_base_id().is_err());
    }

    #[test]
    fn test_unparseable_threshold_becomes_nan() {
        let vars = env(&[("HR_KB_DEFAULT_SCORE_THRESHOLD", "high")]);
        let mut cfg = Config::default();
        cfg.apply_env(|k| vars.get(k).cloned()).unwrap();
        assert!(cfg.retrieval.default_score_threshold.is_nan());
    }

    #[test]
    fn test_invalid_top_k_is_error() {
        let vars = env(&[("HR_KB_DEFAULT_TOP_K", "lots")]);
        let mut cfg = Config::default();
        assert!(cfg.apply_env(|k| vars.get(k).cloned()).is_err());
    }

    #[test]
    fn test_lenient_env_skips_bad_retrieval_and_port() {
        let vars = env(&[
            ("HR_KB_ID", "KB123"),
            ("HR_KB_DATASOURCE_ID", "DS456"),
            ("HR_KB_DEFAULT_TOP_K", "lots"),
            ("PORT", "abc"),
        ]);
        let mut cfg = Config::default();
        cfg.apply_env_with(|k| vars.get(k).cloned(), Strictness::Lenient)
            .unwrap();

        assert_eq!(cfg.retrieval.default_top_k, 8);
        assert_eq!(cfg.server.port, 3000);
        assert_eq!(cfg.require_knowledge_base_id().unwrap(), "KB123");
        assert_eq!(cfg.require_data_source_id().unwrap(), "DS456");
    }

    #[test]
    fn test_relax_for_ingestion_resets_out_of_range_top_k() {
        let mut cfg = Config::default();
        cfg.retrieval.default_top_k = 0;
        assert!(cfg.validate().is_err());

        cfg.relax_for_ingestion();
        assert_eq!(cfg.retrieval.default_top_k, 8);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_ingestion_config_still_rejects_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hrkb.toml");
        std::fs::write(&path, "[knowledge_base\nid = 1").unwrap();
        assert!(load_ingestion_config(&path).is_err());
    }

    #[test]
    fn test_top_k_out_of_range_fails_validation() {
        let mut cfg = Config::default();
        cfg.retrieval.default_top_k = 51;
        assert!(cfg.validate().is_err());
        cfg.retrieval.default_top_k = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_toml_sections_are_optional() {
        let cfg: Config = toml::from_str(
            r#"
[knowledge_base]
id = "KB999"

[retrieval]
default_top_k = 3
"#,
        )
        .unwrap();
        assert_eq!(cfg.knowledge_base.id.as_deref(), Some("KB999"));
        assert_eq!(cfg.retrieval.default_top_k, 3);
        assert_eq!(cfg.retrieval.default_score_threshold, 0.0);
        assert_eq!(cfg.server.port, 3000);
    }

    #[test]
    fn test_missing_ids_are_config_errors() {
        let cfg = Config::default();
        assert!(matches!(
            cfg.require_knowledge_base_id(),
            Err(HrKbError::Config(_))
        ));
        assert!(matches!(
            cfg.require_data_source_id(),
            Err(HrKbError::Config(_))
        ));
    }
}
