//! # HR KB Harness
//!
//! Thin integration points around an HR knowledge base hosted on Amazon
//! Bedrock Knowledge Bases.
//!
//! Three adapters each turn one external trigger into one call to the
//! managed service:
//!
//! ```text
//!  POST /api/chat ──▶ chat::answer_chat ─────────▶ RetrieveAndGenerate ─┐
//!                                                                        │
//!  MCP stdio ───────▶ retrieve::retrieve_policy ─▶ Retrieve ─────────────┼─▶ Bedrock
//!  (retrieve_hr_policy)                                                  │
//!  scheduler ───────▶ ingest::trigger_ingestion ─▶ StartIngestionJob ───┘
//! ```
//!
//! Retrieval ranking, generation, and ingestion all happen remotely. The
//! adapters only validate, forward, and reshape.
//!
//! ## Quick Start
//!
//! ```bash
//! export HR_KB_ID=ABCDEFGHIJ
//! hrkb serve chat               # HTTP chat on :3000
//! hrkb serve mcp                # MCP tool server on stdio
//! hrkb search "parental leave"  # one-off retrieval
//! HR_KB_DATASOURCE_ID=KLMNOPQRST hrkb sync
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML + environment configuration |
//! | [`error`] | Error taxonomy |
//! | [`models`] | Adapter request/response types |
//! | [`traits`] | `KnowledgeService` seam |
//! | [`bedrock`] | Bedrock REST client and wire types |
//! | [`sigv4`] | AWS Signature V4 signing |
//! | [`schema`] | Tool parameter validation |
//! | [`chat`] | Chat adapter |
//! | [`retrieve`] | Retrieval tool adapter |
//! | [`ingest`] | Ingestion trigger adapter |
//! | [`server`] | HTTP chat server |
//! | [`mcp`] | MCP stdio server |

pub mod bedrock;
pub mod chat;
pub mod config;
pub mod error;
pub mod ingest;
pub mod mcp;
pub mod models;
pub mod retrieve;
pub mod schema;
pub mod server;
pub mod sigv4;
pub mod traits;
