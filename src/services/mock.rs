//! Scripted [`RemoteModel`] used across the test suite.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::model::{GenerateRequest, ModelError, RemoteModel};

/// What the mock observed about one `generate` call.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub prompt: String,
    pub had_image: bool,
    pub had_schema: bool,
}

/// Replays a scripted sequence of replies and records every request.
/// Once the script runs dry, further calls fail as transport errors.
pub struct MockModel {
    script: Mutex<VecDeque<Result<String, ModelError>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockModel {
    pub fn scripted(replies: Vec<Result<String, ModelError>>) -> Self {
        Self {
            script: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl RemoteModel for MockModel {
    async fn generate(&self, request: GenerateRequest<'_>) -> Result<String, ModelError> {
        self.requests.lock().unwrap().push(RecordedRequest {
            prompt: request.prompt.to_string(),
            had_image: request.image_jpeg.is_some(),
            had_schema: request.schema.is_some(),
        });
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ModelError::Transport("mock script exhausted".into())))
    }
}
