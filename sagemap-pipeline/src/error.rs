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

//! Pipeline error types

use crate::llm_client::{ErrorClass, LLMError};
use sagemap_core::CoreError;
use thiserror::Error;

/// Errors that stop a pipeline request
#[derive(Debug, Error)]
pub enum PipelineError {
    /// No usable API key; raised before any model call
    #[error("API key not found")]
    MissingApiKey,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Rejected caller input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Model call failed
    #[error("Model call failed: {0}")]
    Model(#[from] LLMError),

    /// Belief store error
    #[error("Belief store error: {0}")]
    Store(#[from] CoreError),
}

impl PipelineError {
    /// True when the caller should fix the API key rather than retry
    pub fn is_api_key_problem(&self) -> bool {
        match self {
            PipelineError::MissingApiKey => true,
            PipelineError::Model(e) => e.class() == ErrorClass::Auth,
            _ => false,
        }
    }

    /// Human-readable message for the person who submitted the request
    pub fn user_message(&self) -> String {
        match self {
            PipelineError::MissingApiKey => {
                "API key problem: no API key was provided. Add your OpenAI API key and try again."
                    .to_string()
            }
            e if e.is_api_key_problem() => {
                "API key problem: the API key was rejected. Check your API key and try again."
                    .to_string()
            }
            PipelineError::InvalidInput(reason) => format!("Invalid input: {}", reason),
            PipelineError::Model(LLMError::RateLimitExceeded) => {
                "Processing failed: the model is rate limited. Please try again shortly."
                    .to_string()
            }
            other => format!("Processing failed: {}. Please try again.", other),
        }
    }

    /// Message reported by an API key test
    pub fn key_test_message(&self) -> &'static str {
        match self {
            PipelineError::MissingApiKey => "API key is required",
            PipelineError::Model(e) => match e.class() {
                ErrorClass::Auth => "Invalid API key",
                ErrorClass::RateLimit => "Rate limit exceeded",
                _ => "API key test failed",
            },
            _ => "API key test failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_key_problems() {
        assert!(PipelineError::MissingApiKey.is_api_key_problem());
        assert!(PipelineError::Model(LLMError::Unauthorized("x".into())).is_api_key_problem());
        assert!(!PipelineError::Model(LLMError::Timeout).is_api_key_problem());
        assert!(!PipelineError::InvalidInput("empty".into()).is_api_key_problem());
    }

    #[test]
    fn test_user_message_distinguishes_key_from_processing() {
        let key = PipelineError::Model(LLMError::Unauthorized("x".into())).user_message();
        assert!(key.starts_with("API key problem"));

        let missing = PipelineError::MissingApiKey.user_message();
        assert!(missing.starts_with("API key problem"));

        let failed = PipelineError::Model(LLMError::Timeout).user_message();
        assert!(failed.starts_with("Processing failed"));

        let limited = PipelineError::Model(LLMError::RateLimitExceeded).user_message();
        assert!(limited.starts_with("Processing failed"));
    }

    #[test]
    fn test_key_test_messages() {
        assert_eq!(
            PipelineError::Model(LLMError::Unauthorized("x".into())).key_test_message(),
            "Invalid API key"
        );
        assert_eq!(
            PipelineError::Model(LLMError::RateLimitExceeded).key_test_message(),
            "Rate limit exceeded"
        );
        assert_eq!(
            PipelineError::Model(LLMError::Timeout).key_test_message(),
            "API key test failed"
        );
        assert_eq!(
            PipelineError::MissingApiKey.key_test_message(),
            "API key is required"
        );
    }
}
