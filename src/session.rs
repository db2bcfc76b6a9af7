use crate::{
    conversation::{Applied, ChatState, OutboundPrompt, RequestId},
    notify::{Level, Notifications},
    relay::{Relay, RelayError},
    render::{self, Persona, View, Viewport},
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

#[derive(Debug)]
pub struct Completion {
    pub id: RequestId,
    pub result: Result<String, RelayError>,
}

pub async fn relay_prompt(relay: &dyn Relay, outbound: OutboundPrompt) -> Completion {
    let result = relay.send(&outbound.request).await;
    Completion {
        id: outbound.id,
        result,
    }
}

pub struct Session {
    state: ChatState,
    relay: Arc<dyn Relay>,
    persona: Persona,
    notifications: Notifications,
    viewport: Viewport,
}

impl Session {
    pub fn new(relay: Arc<dyn Relay>, persona: Persona, notification_ttl: Duration) -> Self {
        Self {
            state: ChatState::new(),
            relay,
            persona,
            notifications: Notifications::new(notification_ttl),
            viewport: Viewport::new(),
        }
    }

    pub fn state(&self) -> &ChatState {
        &self.state
    }

    pub fn viewport_mut(&mut self) -> &mut Viewport {
        &mut self.viewport
    }

    pub fn notifications_mut(&mut self) -> &mut Notifications {
        &mut self.notifications
    }

    pub fn type_char(&mut self, c: char) {
        self.state.push_draft(c);
    }

    pub fn backspace(&mut self) {
        self.state.pop_draft();
    }

    pub fn clear_draft(&mut self) {
        self.state.set_draft(String::new());
    }

    /// Replaces the draft with `draft` and submits it.
    pub fn submit(&mut self, draft: impl Into<String>, now: Instant) -> Option<OutboundPrompt> {
        self.state.set_draft(draft);
        self.submit_draft(now)
    }

    /// Commits the current draft as the next user message. Returns `None`
    /// when a reply is still outstanding; the draft stays in place so it can
    /// be sent once the reply arrives.
    pub fn submit_draft(&mut self, now: Instant) -> Option<OutboundPrompt> {
        match self.state.submit() {
            Ok(outbound) => {
                info!(
                    "Submitting request {} with {} history entries",
                    outbound.id,
                    outbound.request.chat_history.len()
                );
                Some(outbound)
            }
            Err(rejected) => {
                warn!("Submission rejected: {}", rejected);
                self.notifications.push(Level::Info, rejected.to_string(), now);
                None
            }
        }
    }

    /// Runs the relay call on a background task and reports back through `tx`.
    pub fn dispatch(&self, outbound: OutboundPrompt, tx: mpsc::Sender<Completion>) {
        let relay = Arc::clone(&self.relay);
        tokio::spawn(async move {
            let completion = relay_prompt(relay.as_ref(), outbound).await;
            if tx.send(completion).await.is_err() {
                warn!("Session closed before the reply arrived");
            }
        });
    }

    pub fn complete(&mut self, completion: Completion, now: Instant) -> Applied {
        let Completion { id, result } = completion;
        let applied = match result {
            Ok(reply) => self.state.receive_reply(id, reply),
            Err(e) => {
                if self.state.pending() != Some(id) {
                    Applied::Stale
                } else {
                    error!("Request {} failed: {}", id, e);
                    self.notifications.error(&e.to_string(), now);
                    self.state.receive_error(id)
                }
            }
        };

        if applied == Applied::Stale {
            warn!("Ignoring stale completion for request {}", id);
        }
        applied
    }

    /// Submits and waits for the reply in place, without a background task.
    pub async fn submit_and_wait(&mut self, draft: impl Into<String>) -> Option<Applied> {
        let outbound = self.submit(draft, Instant::now())?;
        let completion = relay_prompt(self.relay.as_ref(), outbound).await;
        Some(self.complete(completion, Instant::now()))
    }

    /// Renders the current state and moves the viewport to the bottom if the
    /// conversation grew since the last render.
    pub fn view(&mut self) -> View {
        self.viewport.follow(self.state.conversation().len());
        render::render(&self.state, &self.persona)
    }
}
