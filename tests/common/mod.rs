//! Shared test double for the knowledge service.

#![allow(dead_code)]

use async_trait::async_trait;
use hr_kb_harness::bedrock::{
    RetrieveAndGenerateRequest, RetrieveAndGenerateResponse, RetrieveRequest, RetrieveResponse,
    StartIngestionJobRequest, StartIngestionJobResponse,
};
use hr_kb_harness::config::Config;
use hr_kb_harness::error::{HrKbError, HrKbResult};
use hr_kb_harness::traits::KnowledgeService;
use std::sync::Mutex;

/// Canned responses plus a record of every request received.
#[derive(Default)]
pub struct MockService {
    pub generate: Option<RetrieveAndGenerateResponse>,
    pub retrieve: Option<RetrieveResponse>,
    pub ingest: Option<StartIngestionJobResponse>,
    /// When set, every call fails with this remote error message.
    pub fail_with: Option<String>,

    pub generate_calls: Mutex<Vec<RetrieveAndGenerateRequest>>,
    pub retrieve_calls: Mutex<Vec<RetrieveRequest>>,
    pub ingest_calls: Mutex<Vec<StartIngestionJobRequest>>,
}

impl MockService {
    pub fn failing(message: &str) -> Self {
        Self {
            fail_with: Some(message.to_string()),
            ..Default::default()
        }
    }

    pub fn total_calls(&self) -> usize {
        self.generate_calls.lock().unwrap().len()
            + self.retrieve_calls.lock().unwrap().len()
            + self.ingest_calls.lock().unwrap().len()
    }

    fn check_failure(&self) -> HrKbResult<()> {
        match &self.fail_with {
            Some(msg) => Err(HrKbError::Remote(msg.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl KnowledgeService for MockService {
    async fn retrieve_and_generate(
        &self,
        request: RetrieveAndGenerateRequest,
    ) -> HrKbResult<RetrieveAndGenerateResponse> {
        self.generate_calls.lock().unwrap().push(request);
        self.check_failure()?;
        Ok(self.generate.clone().unwrap_or_default())
    }

    async fn retrieve(&self, request: RetrieveRequest) -> HrKbResult<RetrieveResponse> {
        self.retrieve_calls.lock().unwrap().push(request);
        self.check_failure()?;
        Ok(self.retrieve.clone().unwrap_or_default())
    }

    async fn start_ingestion_job(
        &self,
        request: StartIngestionJobRequest,
    ) -> HrKbResult<StartIngestionJobResponse> {
        self.ingest_calls.lock().unwrap().push(request);
        self.check_failure()?;
        Ok(self.ingest.clone().unwrap_or_default())
    }
}

/// A config with both identifiers set.
pub fn test_config() -> Config {
    let mut cfg = Config::default();
    cfg.knowledge_base.id = Some("KB12345678".to_string());
    cfg.knowledge_base.data_source_id = Some("DS12345678".to_string());
    cfg
}
