//! Chat delivery for the headless host.
//!
//! There are no real clients, so delivered lines are logged and kept for
//! inspection.

use tracing::info;
use untie_core::{ActorId, ChatSink};

/// Records every chat line sent to an actor.
#[derive(Debug, Default)]
pub struct ChatLog {
    lines: Vec<(ActorId, String)>,
}

impl ChatLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All delivered lines, oldest first.
    #[must_use]
    pub fn lines(&self) -> &[(ActorId, String)] {
        &self.lines
    }

    /// Lines delivered to `actor`, with markup removed.
    #[must_use]
    pub fn plain_for(&self, actor: ActorId) -> Vec<String> {
        self.lines
            .iter()
            .filter(|(to, _)| *to == actor)
            .map(|(_, text)| strip_markup(text))
            .collect()
    }
}

impl ChatSink for ChatLog {
    fn send_chat(&mut self, actor: ActorId, text: &str) {
        info!(%actor, text = %strip_markup(text), "chat");
        self.lines.push((actor, text.to_string()));
    }
}

/// Remove `<tag>` / `</tag>` rich-text markup.
#[must_use]
pub fn strip_markup(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_tag = false;
    for c in text.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}
