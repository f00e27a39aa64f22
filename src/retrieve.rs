//! Retrieval tool adapter (`retrieve_hr_policy`).
//!
//! Resolves `topK` and the score threshold against configured defaults,
//! calls the knowledge service's `retrieve`, and ranks the returned chunks
//! 1..N in response order. The outcome carries both a structured report
//! and a one-line summary; zero hits is a normal, successful outcome.
//!
//! # Threshold resolution
//!
//! ```text
//! effective = scoreThreshold            if given
//!           = default_score_threshold   if it is a number
//!           = (omitted from request)    if the default is NaN
//! ```

use serde::Deserialize;
use serde_json::{json, Value};

use crate::bedrock::{
    RetrievalConfiguration, RetrieveRequest, RetrievedChunk, TextInput, VectorSearchConfiguration,
};
use crate::config::{Config, MAX_TOP_K};
use crate::error::{HrKbError, HrKbResult};
use crate::models::{RankedResult, RetrievalReport};
use crate::schema::validate_params;
use crate::traits::KnowledgeService;

pub const TOOL_NAME: &str = "retrieve_hr_policy";

pub const TOOL_DESCRIPTION: &str = "Searches the ESI HR knowledge base (handbook, PTO, benefits, etc.) and returns ranked chunks + scores.";

/// JSON Schema for the tool's input.
pub fn input_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "query": {
                "type": "string",
                "minLength": 1,
                "description": "The HR question or search query."
            },
            "topK": {
                "type": "integer",
                "minimum": 1,
                "maximum": MAX_TOP_K,
                "description": "Maximum number of results to return (default from env)."
            },
            "scoreThreshold": {
                "type": "number",
                "minimum": 0,
                "maximum": 1,
                "description": "Minimum similarity score (0-1) for a result to be included."
            }
        },
        "required": ["query"]
    })
}

/// Validated tool input.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalQuery {
    pub query: String,
    #[serde(default)]
    pub top_k: Option<u32>,
    #[serde(default)]
    pub score_threshold: Option<f64>,
}

impl RetrievalQuery {
    /// Validate raw tool arguments against [`input_schema`].
    pub fn from_params(params: &Value) -> HrKbResult<Self> {
        let validated = validate_params(&input_schema(), params)?;
        serde_json::from_value(validated).map_err(|e| HrKbError::InvalidInput(e.to_string()))
    }

    pub fn effective_top_k(&self, config: &Config) -> u32 {
        self.top_k.unwrap_or(config.retrieval.default_top_k)
    }

    pub fn effective_score_threshold(&self, config: &Config) -> Option<f64> {
        self.score_threshold.or_else(|| {
            let default = config.retrieval.default_score_threshold;
            (!default.is_nan()).then_some(default)
        })
    }

    /// Build the outbound `retrieve` request.
    pub fn to_request(&self, config: &Config, knowledge_base_id: &str) -> RetrieveRequest {
        RetrieveRequest {
            knowledge_base_id: knowledge_base_id.to_string(),
            retrieval_query: TextInput {
                text: self.query.clone(),
            },
            retrieval_configuration: RetrievalConfiguration {
                vector_search_configuration: VectorSearchConfiguration {
                    number_of_results: self.effective_top_k(config),
                    override_similarity_threshold: self.effective_score_threshold(config),
                },
            },
        }
    }
}

/// Result of one tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalOutcome {
    pub report: RetrievalReport,
    pub summary: String,
    /// Raw service response, surfaced to MCP clients under `_meta`.
    pub raw: Value,
}

/// Rank chunks 1..N in the order the service returned them.
pub fn rank_results(chunks: Vec<RetrievedChunk>) -> Vec<RankedResult> {
    chunks
        .into_iter()
        .enumerate()
        .map(|(idx, chunk)| RankedResult {
            rank: idx + 1,
            score: chunk.score,
            text: chunk.content.and_then(|c| c.text),
            location: chunk.location,
            metadata: chunk.metadata,
        })
        .collect()
}

/// Human-readable one-liner for a result count.
pub fn summarize(query: &str, hit_count: usize) -> String {
    if hit_count == 0 {
        format!("No HR knowledge-base results found for: \"{}\".", query)
    } else {
        format!(
            "Retrieved {} HR knowledge-base chunks for: \"{}\".",
            hit_count, query
        )
    }
}

/// Run the retrieval tool.
///
/// # Errors
///
/// Returns [`HrKbError::Config`] when no knowledge-base id is configured and
/// propagates any error from the service. An empty result set is not an
/// error.
pub async fn retrieve_policy(
    service: &dyn KnowledgeService,
    config: &Config,
    query: &RetrievalQuery,
) -> HrKbResult<RetrievalOutcome> {
    let knowledge_base_id = config.require_knowledge_base_id()?;
    let response = service
        .retrieve(query.to_request(config, knowledge_base_id))
        .await?;

    let results = rank_results(response.retrieval_results);
    let summary = summarize(&query.query, results.len());

    Ok(RetrievalOutcome {
        report: RetrievalReport {
            query: query.query.clone(),
            hit_count: results.len(),
            results,
        },
        summary,
        raw: response.raw,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bedrock::RetrievedContent;

    fn query(top_k: Option<u32>, threshold: Option<f64>) -> RetrievalQuery {
        RetrievalQuery {
            query: "parental leave".to_string(),
            top_k,
            score_threshold: threshold,
        }
    }

    #[test]
    fn test_defaults_apply() {
        let cfg = Config::default();
        let q = query(None, None);
        assert_eq!(q.effective_top_k(&cfg), 8);
        assert_eq!(q.effective_score_threshold(&cfg), Some(0.0));
    }

    #[test]
    fn test_explicit_values_win() {
        let cfg = Config::default();
        let q = query(Some(3), Some(0.7));
        assert_eq!(q.effective_top_k(&cfg), 3);
        assert_eq!(q.effective_score_threshold(&cfg), Some(0.7));
    }

    #[test]
    fn test_nan_default_threshold_is_omitted() {
        let mut cfg = Config::default();
        cfg.retrieval.default_score_threshold = f64::NAN;
        let req = query(None, None).to_request(&cfg, "KB1");
        assert_eq!(
            req.retrieval_configuration
                .vector_search_configuration
                .override_similarity_threshold,
            None
        );
        let body = serde_json::to_value(&req).unwrap();
        assert!(body["retrievalConfiguration"]["vectorSearchConfiguration"]
            .get("overrideSimilarityThreshold")
            .is_none());
    }

    #[test]
    fn test_nan_default_still_honors_explicit_threshold() {
        let mut cfg = Config::default();
        cfg.retrieval.default_score_threshold = f64::NAN;
        assert_eq!(query(None, Some(0.2)).effective_score_threshold(&cfg), Some(0.2));
    }

    #[test]
    fn test_from_params() {
        let q = RetrievalQuery::from_params(&json!({ "query": "benefits", "topK": 4 })).unwrap();
        assert_eq!(q.query, "benefits");
        assert_eq!(q.top_k, Some(4));
        assert_eq!(q.score_threshold, None);

        assert!(RetrievalQuery::from_params(&json!({ "query": "" })).is_err());
        assert!(RetrievalQuery::from_params(&json!({ "query": "x", "topK": 99 })).is_err());
        assert!(RetrievalQuery::from_params(&json!({})).is_err());
    }

    #[test]
    fn test_rank_preserves_order() {
        let chunks = vec![
            RetrievedChunk {
                content: Some(RetrievedContent {
                    text: Some("first".to_string()),
                    kind: None,
                }),
                score: Some(0.3),
                ..Default::default()
            },
            RetrievedChunk {
                content: Some(RetrievedContent {
                    text: Some("second".to_string()),
                    kind: None,
                }),
                score: Some(0.9),
                ..Default::default()
            },
        ];
        let ranked = rank_results(chunks);
        assert_eq!(ranked[0].rank, 1);
        assert_eq!(ranked[0].text.as_deref(), Some("first"));
        assert_eq!(ranked[1].rank, 2);
        assert_eq!(ranked[1].score, Some(0.9));
    }

    #[test]
    fn test_summaries() {
        assert_eq!(
            summarize("dress code", 0),
            "No HR knowledge-base results found for: \"dress code\"."
        );
        assert_eq!(
            summarize("dress code", 2),
            "Retrieved 2 HR knowledge-base chunks for: \"dress code\"."
        );
    }
}
