//! In-memory [`Backend`] for workflow tests.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::api::Backend;
use crate::documents::FileUpload;
use crate::error::ApiError;

#[derive(Default)]
struct FakeState {
    files: Vec<String>,
    rename_prefix: Option<String>,
    fail_upload: bool,
    fail_delete: bool,
    fail_list: bool,
    fail_chat: bool,
    tokens: Vec<String>,
    delete_calls: usize,
    chat_calls: Vec<String>,
}

/// Holds the "server side" document collection and lets tests break any call.
#[derive(Default)]
pub struct FakeBackend {
    state: Mutex<FakeState>,
}

fn unavailable() -> ApiError {
    ApiError::Network("connection refused".to_string())
}

impl FakeBackend {
    pub fn with_files(files: &[&str]) -> Self {
        let backend = Self::default();
        backend.set_files(files);
        backend
    }

    fn state(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn set_files(&self, files: &[&str]) {
        self.state().files = files.iter().map(|f| f.to_string()).collect();
    }

    pub fn files(&self) -> Vec<String> {
        self.state().files.clone()
    }

    /// Store uploads under `prefix` + original name.
    pub fn rename_uploads(&self, prefix: &str) {
        self.state().rename_prefix = Some(prefix.to_string());
    }

    pub fn fail_upload(&self, fail: bool) {
        self.state().fail_upload = fail;
    }

    pub fn fail_delete(&self, fail: bool) {
        self.state().fail_delete = fail;
    }

    pub fn fail_list(&self, fail: bool) {
        self.state().fail_list = fail;
    }

    pub fn fail_chat(&self, fail: bool) {
        self.state().fail_chat = fail;
    }

    pub fn tokens_seen(&self) -> Vec<String> {
        self.state().tokens.clone()
    }

    pub fn delete_calls(&self) -> usize {
        self.state().delete_calls
    }

    pub fn chat_calls(&self) -> Vec<String> {
        self.state().chat_calls.clone()
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn upload(&self, token: &str, file: &FileUpload) -> Result<String, ApiError> {
        let mut state = self.state();
        state.tokens.push(token.to_string());
        if state.fail_upload {
            return Err(unavailable());
        }
        let stored = match &state.rename_prefix {
            Some(prefix) => format!("{}{}", prefix, file.name),
            None => file.name.clone(),
        };
        if !state.files.contains(&stored) {
            state.files.push(stored.clone());
        }
        Ok(format!("File {} processed successfully", stored))
    }

    async fn delete(&self, token: &str, filename: &str) -> Result<String, ApiError> {
        let mut state = self.state();
        state.tokens.push(token.to_string());
        state.delete_calls += 1;
        if state.fail_delete {
            return Err(unavailable());
        }
        let before = state.files.len();
        state.files.retain(|f| f != filename);
        if state.files.len() == before {
            return Err(ApiError::Status { status: 404, detail: "File not found".to_string() });
        }
        Ok(format!("File {} deleted successfully", filename))
    }

    async fn list(&self, token: &str) -> Result<Vec<String>, ApiError> {
        let mut state = self.state();
        state.tokens.push(token.to_string());
        if state.fail_list {
            return Err(unavailable());
        }
        Ok(state.files.clone())
    }

    async fn chat(&self, token: &str, message: &str) -> Result<String, ApiError> {
        let mut state = self.state();
        state.tokens.push(token.to_string());
        state.chat_calls.push(message.to_string());
        if state.fail_chat {
            return Err(ApiError::Status { status: 500, detail: "model offline".to_string() });
        }
        Ok(format!("echo: {}", message))
    }

    async fn download(&self, filename: &str) -> Result<Vec<u8>, ApiError> {
        let state = self.state();
        if state.files.iter().any(|f| f == filename) {
            Ok(filename.as_bytes().to_vec())
        } else {
            Err(ApiError::Status { status: 404, detail: "Not Found".to_string() })
        }
    }
}
