// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! # Sagemap Pipeline
//!
//! Turns free-form journal text into beliefs and relation edges using a
//! chat-completion model.
//!
//! ## Stages
//!
//! 1. **Extraction**: the model proposes up to ten candidate beliefs
//! 2. **Relation checks**: each candidate is judged against topically related
//!    existing beliefs for contradiction and for evolution
//! 3. **Merge**: candidates get durable ids and verdicts become edges
//!
//! Model output is never trusted. Responses are decoded leniently, checked for
//! shape, and relation checks fail closed.
//!
//! ## Example
//!
//! ```rust,ignore
//! use sagemap_pipeline::{process_submission, JournalSubmission, SagemapConfig};
//! use sagemap_store::BeliefGraphStore;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = SagemapConfig::load(None)?;
//!     let store = BeliefGraphStore::in_memory();
//!
//!     let submission = JournalSubmission {
//!         content: "I think money buys happiness.".to_string(),
//!         existing_beliefs: store.list_beliefs().await,
//!         api_key: None,
//!     };
//!
//!     match process_submission(&config, &submission, &store).await {
//!         Ok(outcome) => {
//!             let beliefs = outcome.new_beliefs();
//!             store.commit(outcome.journal_entry, beliefs, outcome.edges).await?;
//!         }
//!         Err(failure) => eprintln!("{}", failure.message),
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod decoder;
pub mod error;
pub mod extractor;
pub mod llm_client;
pub mod merge;
pub mod pipeline;
pub mod prompts;
pub mod reflection;
pub mod relations;

#[cfg(test)]
mod test_support;

pub use config::{resolve_api_key, GenerationParams, ModelConfig, PipelineSettings, Provider, SagemapConfig};
pub use decoder::decode;
pub use error::PipelineError;
pub use extractor::BeliefExtractor;
pub use llm_client::{ChatMessage, ChatRequest, ErrorClass, LLMClient, LLMError, LLMResponse, OpenAIClient, TokenUsage};
pub use merge::{merge, CheckedCandidate, GraphDelta, ProcessedBelief};
pub use pipeline::{process_submission, JournalFailure, JournalOutcome, JournalPipeline, JournalSubmission};
pub use reflection::{generate_reflection_questions, ReflectionGenerator, ReflectionRequest};
pub use relations::{relevant_beliefs, ContradictionChecker, ContradictionResult, EvolutionChecker, EvolutionResult};
