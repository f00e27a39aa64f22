//! Ingestion trigger adapter.
//!
//! Invoked by a scheduler with an opaque event. Starts an ingestion job for
//! the configured data source and reports the outcome as
//! `{ statusCode, body }`, where `body` is a JSON string. This adapter
//! never returns an error: missing configuration and remote failures are
//! both folded into a 500 response.

use serde::Serialize;
use serde_json::Value;
use tracing::{error, info};

use crate::bedrock::StartIngestionJobRequest;
use crate::config::Config;
use crate::models::{IngestionJobStatus, TriggerResponse};
use crate::traits::KnowledgeService;

pub const MSG_MISSING_CONFIG: &str = "Missing knowledge base configuration";
pub const MSG_STARTED: &str = "Ingestion job started";
pub const MSG_FAILED: &str = "Failed to start ingestion job";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TriggerBody<'a> {
    message: &'a str,
    #[serde(flatten)]
    job: Option<IngestionJobStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn respond(status_code: u16, body: TriggerBody<'_>) -> TriggerResponse {
    TriggerResponse {
        status_code,
        body: serde_json::to_string(&body).unwrap_or_default(),
    }
}

/// Report configuration that could not be loaded at all.
pub fn configuration_failure(err: &dyn std::fmt::Display) -> TriggerResponse {
    error!(error = %err, "failed to load configuration");
    respond(
        500,
        TriggerBody {
            message: MSG_MISSING_CONFIG,
            job: None,
            error: Some(err.to_string()),
        },
    )
}

/// Report a failure that happened before the ingestion job could be requested.
pub fn start_failure(err: &dyn std::fmt::Display) -> TriggerResponse {
    error!(error = %err, "error starting ingestion job");
    respond(
        500,
        TriggerBody {
            message: MSG_FAILED,
            job: None,
            error: Some(err.to_string()),
        },
    )
}

/// Start an ingestion job and report its initial status.
pub async fn trigger_ingestion(
    service: &dyn KnowledgeService,
    config: &Config,
    event: &Value,
) -> TriggerResponse {
    let (knowledge_base_id, data_source_id) = match (
        config.require_knowledge_base_id(),
        config.require_data_source_id(),
    ) {
        (Ok(kb), Ok(ds)) => (kb, ds),
        _ => {
            error!("Missing env vars HR_KB_ID or HR_KB_DATASOURCE_ID");
            return respond(
                500,
                TriggerBody {
                    message: MSG_MISSING_CONFIG,
                    job: None,
                    error: None,
                },
            );
        }
    };

    info!(
        knowledge_base_id,
        data_source_id,
        event = %event,
        "starting ingestion job"
    );

    match service
        .start_ingestion_job(StartIngestionJobRequest::new(
            knowledge_base_id,
            data_source_id,
        ))
        .await
    {
        Ok(response) => {
            let job = response.ingestion_job.unwrap_or_default();
            info!(
                job_id = job.ingestion_job_id.as_deref().unwrap_or("-"),
                status = job.status.as_deref().unwrap_or("-"),
                started_at = job.started_at.as_deref().unwrap_or("-"),
                "ingestion job started"
            );
            respond(
                200,
                TriggerBody {
                    message: MSG_STARTED,
                    job: Some(IngestionJobStatus {
                        ingestion_job_id: job.ingestion_job_id,
                        status: job.status,
                    }),
                    error: None,
                },
            )
        }
        Err(e) => start_failure(&e),
    }
}
