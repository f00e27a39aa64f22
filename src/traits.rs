//! The seam between the adapters and the managed knowledge service.
//!
//! Every adapter talks to the remote service through [`KnowledgeService`],
//! so production code uses [`BedrockClient`](crate::bedrock::BedrockClient)
//! while tests plug in an in-memory double.
//!
//! # Example
//!
//! ```rust
//! use async_trait::async_trait;
//! use hr_kb_harness::bedrock::*;
//! use hr_kb_harness::error::HrKbResult;
//! use hr_kb_harness::traits::KnowledgeService;
//!
//! struct Canned;
//!
//! #[async_trait]
//! impl KnowledgeService for Canned {
//!     async fn retrieve_and_generate(
//!         &self,
//!         _request: RetrieveAndGenerateRequest,
//!     ) -> HrKbResult<RetrieveAndGenerateResponse> {
//!         Ok(RetrieveAndGenerateResponse::default())
//!     }
//!
//!     async fn retrieve(&self, _request: RetrieveRequest) -> HrKbResult<RetrieveResponse> {
//!         Ok(RetrieveResponse::default())
//!     }
//!
//!     async fn start_ingestion_job(
//!         &self,
//!         _request: StartIngestionJobRequest,
//!     ) -> HrKbResult<StartIngestionJobResponse> {
//!         Ok(StartIngestionJobResponse::default())
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::bedrock::{
    RetrieveAndGenerateRequest, RetrieveAndGenerateResponse, RetrieveRequest, RetrieveResponse,
    StartIngestionJobRequest, StartIngestionJobResponse,
};
use crate::error::HrKbResult;

/// The three remote operations the adapters need.
///
/// Implementations report failures as [`HrKbError::Remote`](crate::error::HrKbError::Remote)
/// (or `Config` when credentials are missing). They never retry.
#[async_trait]
pub trait KnowledgeService: Send + Sync {
    /// Retrieve relevant chunks and generate a grounded answer.
    async fn retrieve_and_generate(
        &self,
        request: RetrieveAndGenerateRequest,
    ) -> HrKbResult<RetrieveAndGenerateResponse>;

    /// Retrieve ranked chunks without generation.
    async fn retrieve(&self, request: RetrieveRequest) -> HrKbResult<RetrieveResponse>;

    /// Start re-indexing a data source into the knowledge base.
    async fn start_ingestion_job(
        &self,
        request: StartIngestionJobRequest,
    ) -> HrKbResult<StartIngestionJobResponse>;
}
