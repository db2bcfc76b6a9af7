//! Pure rendering of the chat state into display lines.
//!
//! Nothing here touches the terminal. The output of [`render`] depends only
//! on its inputs, so drawing the same state twice produces the same lines.
//! The [`Viewport`] decides which slice of the body is on screen and follows
//! the bottom whenever the conversation grows.

use crate::config::Config;
use crate::conversation::{ChatState, Message, Role};

pub const THINKING: &str = "I'm thinking...";
pub const EMPTY_TITLE: &str = "You haven't asked anything yet!";
pub const EMPTY_HINT: &str = "Enter your message in the input field below";
pub const INPUT_PLACEHOLDER: &str = "Enter your message...";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Persona {
    pub name: String,
    pub tagline: String,
    pub assistant_avatar: String,
    pub user_avatar: String,
}

impl From<&Config> for Persona {
    fn from(config: &Config) -> Self {
        Self {
            name: config.persona_name.clone(),
            tagline: config.tagline.clone(),
            assistant_avatar: config.assistant_avatar.clone(),
            user_avatar: config.user_avatar.clone(),
        }
    }
}

impl Persona {
    fn avatar(&self, role: Role) -> &str {
        match role {
            Role::User => &self.user_avatar,
            Role::Assistant => &self.assistant_avatar,
        }
    }

    fn avatar_width(&self) -> usize {
        self.user_avatar
            .chars()
            .count()
            .max(self.assistant_avatar.chars().count())
            + 2
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    Title,
    Subtitle,
    Placeholder,
    User,
    Assistant,
    Thinking,
    Blank,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub style: Style,
    pub text: String,
}

impl Line {
    fn new(style: Style, text: impl Into<String>) -> Self {
        Self {
            style,
            text: text.into(),
        }
    }

    fn blank() -> Self {
        Self::new(Style::Blank, "")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct View {
    pub header: Vec<Line>,
    pub body: Vec<Line>,
}

pub fn render(state: &ChatState, persona: &Persona) -> View {
    let header = vec![
        Line::new(Style::Title, persona.name.clone()),
        Line::new(Style::Subtitle, persona.tagline.clone()),
    ];

    let mut body = Vec::new();
    let conversation = state.conversation();

    if conversation.is_empty() {
        body.push(Line::new(Style::Placeholder, EMPTY_TITLE));
        body.push(Line::new(Style::Placeholder, EMPTY_HINT));
    } else {
        for message in conversation.messages() {
            push_entry(
                &mut body,
                persona,
                message.role(),
                message.content(),
                entry_style(message),
            );
        }
    }

    if state.is_awaiting_reply() {
        push_entry(&mut body, persona, Role::Assistant, THINKING, Style::Thinking);
    }

    View { header, body }
}

fn entry_style(message: &Message) -> Style {
    match message.role() {
        Role::User => Style::User,
        Role::Assistant => Style::Assistant,
    }
}

fn push_entry(body: &mut Vec<Line>, persona: &Persona, role: Role, content: &str, style: Style) {
    if !body.is_empty() {
        body.push(Line::blank());
    }

    let width = persona.avatar_width();
    let avatar = format!("[{}]", persona.avatar(role));
    // `split('\n')` keeps blank lines and yields one line for empty content.
    for (i, line) in content.split('\n').enumerate() {
        let prefix = if i == 0 { avatar.as_str() } else { "" };
        body.push(Line::new(style, format!("{:<width$} {}", prefix, line)));
    }
}

/// Bottom-aligned window over the rendered body.
///
/// `offset` counts lines scrolled up from the bottom; 0 keeps the latest
/// message fully visible.
#[derive(Debug, Default)]
pub struct Viewport {
    offset: usize,
    seen_len: usize,
}

impl Viewport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snaps to the bottom when the conversation length changed since the
    /// last call. Returns whether a scroll happened.
    pub fn follow(&mut self, conversation_len: usize) -> bool {
        if conversation_len == self.seen_len {
            return false;
        }
        self.seen_len = conversation_len;
        self.offset = 0;
        true
    }

    pub fn scroll_up(&mut self, lines: usize) {
        self.offset = self.offset.saturating_add(lines);
    }

    pub fn scroll_down(&mut self, lines: usize) {
        self.offset = self.offset.saturating_sub(lines);
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn window<'a>(&mut self, body: &'a [Line], height: usize) -> &'a [Line] {
        let max = body.len().saturating_sub(height);
        self.offset = self.offset.min(max);
        let end = body.len() - self.offset;
        let start = end.saturating_sub(height);
        &body[start..end]
    }
}
