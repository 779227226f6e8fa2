//! Chat workflow with optimistic echo.
//!
//! The user's message is appended and the draft cleared as soon as a send
//! starts. Whatever the server does afterwards, exactly one bot entry follows:
//! the reply on success, [`ERROR_REPLY`] on any failure.

use log::{debug, info, warn};

use crate::api::Backend;
use crate::error::ApiError;
use crate::session::Session;
use crate::state::ChatMessage;

pub const ERROR_REPLY: &str = "Error: could not get a response.";

#[derive(Debug, Clone)]
pub struct ChatTicket {
    generation: u64,
    token: Option<String>,
    text: String,
}

#[derive(Debug, Clone)]
pub struct ChatOutcome {
    generation: u64,
    result: Result<String, ApiError>,
}

impl ChatTicket {
    /// Outcome for a request that never produced an answer.
    pub fn fail(self, error: ApiError) -> ChatOutcome {
        ChatOutcome { generation: self.generation, result: Err(error) }
    }

    pub async fn run(self, backend: &dyn Backend) -> ChatOutcome {
        let result = match &self.token {
            Some(token) => backend.chat(token, &self.text).await,
            None => Err(ApiError::Status { status: 401, detail: "not signed in".to_string() }),
        };
        ChatOutcome { generation: self.generation, result }
    }
}

#[derive(Debug, Default)]
pub struct ChatWorkflow {
    transcript: Vec<ChatMessage>,
    pub draft: String,
    awaiting_reply: bool,
    generation: u64,
}

impl ChatWorkflow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }

    pub fn is_awaiting_reply(&self) -> bool {
        self.awaiting_reply
    }

    /// Echo the draft into the transcript and hand back the request to make.
    ///
    /// Returns `None` without touching anything when the draft is blank or the
    /// previous message has not been answered yet, so user and bot entries
    /// always alternate.
    pub fn begin_send(&mut self, session: Option<&Session>) -> Option<ChatTicket> {
        if self.draft.trim().is_empty() || self.awaiting_reply {
            return None;
        }

        let text = std::mem::take(&mut self.draft);
        self.transcript.push(ChatMessage::user(text.clone()));
        self.awaiting_reply = true;
        debug!("sending chat message ({} chars)", text.chars().count());

        Some(ChatTicket {
            generation: self.generation,
            token: session.map(|s| s.token().to_string()),
            text,
        })
    }

    /// Append the bot entry answering the pending message. Returns false for a
    /// reply that arrived after [`ChatWorkflow::reset`].
    pub fn apply_reply(&mut self, outcome: ChatOutcome) -> bool {
        if outcome.generation != self.generation {
            debug!("dropping stale chat reply");
            return false;
        }

        let reply = match outcome.result {
            Ok(text) => {
                info!("bot replied ({} chars)", text.chars().count());
                ChatMessage::bot(text)
            }
            Err(e) => {
                warn!("chat request failed: {}", e);
                ChatMessage::bot(ERROR_REPLY)
            }
        };
        self.transcript.push(reply);
        self.awaiting_reply = false;
        true
    }

    /// Send the current draft and wait for the answer. Does nothing when
    /// [`ChatWorkflow::begin_send`] would refuse.
    pub async fn send(&mut self, backend: &dyn Backend, session: Option<&Session>) -> bool {
        let Some(ticket) = self.begin_send(session) else {
            return false;
        };
        let outcome = ticket.run(backend).await;
        self.apply_reply(outcome)
    }

    /// Clear the conversation for a new session.
    pub fn reset(&mut self) {
        self.generation += 1;
        self.transcript.clear();
        self.draft.clear();
        self.awaiting_reply = false;
    }
}
