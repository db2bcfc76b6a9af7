use crate::relay::PromptRequest;
use thiserror::Error;
use uuid::Uuid;

pub const FALLBACK_REPLY: &str = "I'm sorry, it appears there has been an error!";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    role: Role,
    content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

/// Append-only message log. Nothing is ever removed or edited in place.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Message contents in order, roles dropped. This is what the endpoint
    /// receives as `chat_history`.
    pub fn contents(&self) -> Vec<String> {
        self.messages.iter().map(|m| m.content.clone()).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(Uuid);

impl RequestId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundPrompt {
    pub id: RequestId,
    pub request: PromptRequest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SubmitRejected {
    #[error("Still waiting for the previous reply")]
    AwaitingReply,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Appended,
    Stale,
}

#[derive(Debug, Default)]
pub struct ChatState {
    draft: String,
    conversation: Conversation,
    pending: Option<RequestId>,
}

impl ChatState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    pub fn push_draft(&mut self, c: char) {
        self.draft.push(c);
    }

    pub fn pop_draft(&mut self) {
        self.draft.pop();
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn is_awaiting_reply(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending(&self) -> Option<RequestId> {
        self.pending
    }

    pub fn submit(&mut self) -> Result<OutboundPrompt, SubmitRejected> {
        if self.pending.is_some() {
            return Err(SubmitRejected::AwaitingReply);
        }

        let chat_history = self.conversation.contents();
        let prompt = std::mem::take(&mut self.draft);
        self.conversation.push(Message::user(prompt.clone()));

        let id = RequestId::new();
        self.pending = Some(id);

        Ok(OutboundPrompt {
            id,
            request: PromptRequest {
                prompt,
                chat_history,
            },
        })
    }

    pub fn receive_reply(&mut self, id: RequestId, reply: impl Into<String>) -> Applied {
        self.resolve(id, Message::assistant(reply))
    }

    pub fn receive_error(&mut self, id: RequestId) -> Applied {
        self.resolve(id, Message::assistant(FALLBACK_REPLY))
    }

    fn resolve(&mut self, id: RequestId, message: Message) -> Applied {
        if self.pending != Some(id) {
            return Applied::Stale;
        }
        self.conversation.push(message);
        self.pending = None;
        Applied::Appended
    }
}
