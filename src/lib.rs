//! # Logsleuth
//!
//! An agentic log-investigation orchestrator: given a query (optionally
//! scoped to a correlation id), it plans an investigation, gathers
//! evidence from logs and a knowledge index, reasons over the evidence
//! through a text-generation backend, verifies the result's sufficiency,
//! and retries with corrective feedback when verification fails.
//!
//! ## Features
//!
//! - **State graph engine**: conditional routing over named nodes with a
//!   hard iteration cap as the sole termination guarantee
//! - **Plan -> Execute -> Verify -> Reflect loop**: four node behaviors
//!   threaded through a clone-on-write agent state
//! - **Adaptive retrieval**: a complexity heuristic picks single-hop
//!   hybrid retrieval or iterative multi-hop retrieval with query
//!   expansion
//! - **Reranking**: learned-model seam with a lexical fallback
//! - **Layered response recovery**: malformed backend output degrades
//!   through five recovery layers instead of erroring
//!
//! ## Architecture
//!
//! ```text
//! Caller → Orchestrator → pre-retrieval (RagCoordinator)
//!                       → StateGraph loop over node behaviors
//!                       → rendered InvestigationReport
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use logsleuth::config::Config;
//! use logsleuth::orchestrator::Orchestrator;
//! use logsleuth::reasoning::{OllamaClient, ReasoningGateway};
//! use logsleuth::retrieval::{RagCoordinator, Reranker};
//! use logsleuth::sources::{HashingEmbedder, InMemoryVectorStore, StaticLogSource};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let backend = OllamaClient::new(&config.backend, config.request.clone())?;
//!     let gateway = Arc::new(ReasoningGateway::new(
//!         Arc::new(backend),
//!         config.agent.max_evidence_docs,
//!     ));
//!     let coordinator = Arc::new(RagCoordinator::new(
//!         Arc::new(StaticLogSource::new()),
//!         Arc::new(InMemoryVectorStore::new()),
//!         Arc::new(HashingEmbedder::default()),
//!         Reranker::lexical(),
//!         config.retrieval.clone(),
//!     ));
//!     let orchestrator = Orchestrator::new(coordinator, gateway, config.agent.clone());
//!     let report = orchestrator.investigate("why did checkout fail?", None).await;
//!     println!("{}", report.answer);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

/// Node behaviors of the plan-execute-verify-reflect loop.
pub mod agents;
/// Configuration management loaded from environment variables.
pub mod config;
/// Error types and result aliases for the application.
pub mod error;
/// Agent state, the graph engine, and telemetry observers.
pub mod graph;
/// Orchestration of one investigation end to end.
pub mod orchestrator;
/// Prompt templates sent to the generation backend.
pub mod prompts;
/// Prompt assembly, backend client, and response recovery.
pub mod reasoning;
/// Retrieval strategies, multi-hop loop, and reranking.
pub mod retrieval;
/// External capability contracts and in-memory implementations.
pub mod sources;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use orchestrator::{InvestigationReport, Orchestrator};
