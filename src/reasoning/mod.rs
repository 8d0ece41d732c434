//! Reasoning over evidence: prompt assembly, the generation backend
//! client, and layered recovery of structured results.

mod backend;
mod gateway;
mod parser;
mod types;

pub use backend::{
    GenerateOptions, GenerateRequest, GenerateResponse, GenerationBackend, OllamaClient,
};
pub use gateway::ReasoningGateway;
pub use parser::{mentions_synthesis, recover_reasoning};
pub use types::{ReasoningOutcome, ReflexionOutcome};
