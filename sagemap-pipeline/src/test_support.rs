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

//! Shared mocks for unit tests

use crate::llm_client::{ChatRequest, LLMClient, LLMError, LLMResponse, TokenUsage};
use async_trait::async_trait;
use chrono::Utc;
use sagemap_core::{Belief, BeliefType};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

type Responder = Box<dyn Fn(&str) -> Result<String, LLMError> + Send + Sync>;

/// Mock client answering each prompt through a closure and counting calls
pub struct MockLLMClient {
    responder: Responder,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl MockLLMClient {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&str) -> Result<String, LLMError> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn replying(content: &str) -> Self {
        let content = content.to_string();
        Self::new(move |_| Ok(content.clone()))
    }

    pub fn failing(make_error: fn() -> LLMError) -> Self {
        Self::new(move |_| Err(make_error()))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LLMClient for MockLLMClient {
    async fn complete(&self, request: ChatRequest) -> Result<LLMResponse, LLMError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let prompt = request.last_user_content().to_string();
        self.prompts.lock().unwrap().push(prompt.clone());

        let content = (self.responder)(&prompt)?;
        Ok(LLMResponse {
            content,
            usage: TokenUsage::default(),
            model: "mock-model".to_string(),
        })
    }

    fn model_name(&self) -> &str {
        "mock-model"
    }
}

pub fn belief(id: &str, text: &str, topics: &[&str]) -> Belief {
    Belief {
        id: id.to_string(),
        text: text.to_string(),
        confidence: 6,
        topics: topics.iter().map(|t| t.to_string()).collect(),
        belief_type: BeliefType::Core,
        source: "j0".to_string(),
        evolved_from: None,
        created_at: Utc::now(),
        deprecated: false,
    }
}
