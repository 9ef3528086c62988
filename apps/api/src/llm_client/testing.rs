//! Scripted `GenerationService` for controller tests. Never touches the network.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm_client::{CompletionOptions, GenerationService, LlmError};
use crate::models::transcript::Turn;

/// One recorded call to the fake service.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub turns: Vec<Turn>,
    pub instruction: String,
    pub structured: bool,
}

/// Replays queued responses in order; records every call it receives.
/// Once the queue is empty it answers with a generic question.
#[derive(Default)]
pub struct ScriptedGeneration {
    responses: Mutex<VecDeque<Result<String, LlmError>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedGeneration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_responses<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fake = Self::new();
        for response in responses {
            fake.push_ok(response);
        }
        fake
    }

    pub fn push_ok(&self, response: impl Into<String>) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Ok(response.into()));
    }

    pub fn push_err(&self, error: LlmError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl GenerationService for ScriptedGeneration {
    async fn complete(
        &self,
        turns: &[Turn],
        instruction: &str,
        options: CompletionOptions,
    ) -> Result<String, LlmError> {
        let call_number = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(RecordedCall {
                turns: turns.to_vec(),
                instruction: instruction.to_string(),
                structured: options.expect_structured_output,
            });
            calls.len()
        };

        self.responses.lock().unwrap().pop_front().unwrap_or_else(|| {
            Ok(format!(
                "What would you improve about project number {call_number}?"
            ))
        })
    }
}
