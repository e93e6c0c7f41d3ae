//! Localized notification templates.
//!
//! Templates use positional placeholders (`{0}`, `{1}`, ...) with `{{` and
//! `}}` as literal braces. Lookups fall back to English when the actor's
//! language has no entry for a key. Every notification is the message body
//! wrapped in the [`MessageKey::Chat`] template.

use std::collections::HashMap;
use std::fmt::{Display, Write};

use tracing::error;

use crate::error::{MessageError, UntieError};

/// Language used when an actor has none or the catalog lacks a key.
pub const DEFAULT_LANGUAGE: &str = "en";

const ACCENT_COLOR: &str = "#de8732";
const TITLE: &str = "Instant Untie";

/// Message identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKey {
    /// Chat prefix wrapper. `{0}` is the body.
    Chat,
    /// Untie started. `{0}` is the delay in seconds.
    Untie,
    /// Untie canceled by releasing the key.
    Canceled,
}

impl MessageKey {
    /// All keys.
    pub const ALL: [MessageKey; 3] = [Self::Chat, Self::Untie, Self::Canceled];

    /// The key's name in language files.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Chat => "Chat",
            Self::Untie => "Untie",
            Self::Canceled => "UntieCanceled",
        }
    }

    /// Look a key up by its language-file name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key| key.as_str() == name)
    }
}

/// Templates per language.
#[derive(Debug, Clone)]
pub struct MessageCatalog {
    languages: HashMap<String, HashMap<MessageKey, String>>,
}

impl MessageCatalog {
    /// A catalog holding the default English templates.
    #[must_use]
    pub fn new() -> Self {
        let mut catalog = Self {
            languages: HashMap::new(),
        };
        catalog.register(
            DEFAULT_LANGUAGE,
            MessageKey::Chat,
            format!("<color=#bebebe>[<color={ACCENT_COLOR}>{TITLE}</color>] {{0}}</color>"),
        );
        catalog.register(
            DEFAULT_LANGUAGE,
            MessageKey::Untie,
            "The box will untie in {0} seconds. Please hold the use key down until this is completed.",
        );
        catalog.register(
            DEFAULT_LANGUAGE,
            MessageKey::Canceled,
            "You have canceled untying the box. Please hold the use key down to untie.",
        );
        catalog
    }

    /// Set the template for `key` in `language`, replacing any previous one.
    pub fn register(&mut self, language: &str, key: MessageKey, template: impl Into<String>) {
        self.languages
            .entry(language.to_string())
            .or_default()
            .insert(key, template.into());
    }

    /// Register templates for `language` from a `{ "Key": "template" }`
    /// JSON object. Unknown keys are skipped. Returns how many were taken.
    ///
    /// # Errors
    ///
    /// Returns an error if `text` is not a JSON object of strings.
    pub fn register_json(&mut self, language: &str, text: &str) -> Result<usize, serde_json::Error> {
        let entries: HashMap<String, String> = serde_json::from_str(text)?;
        let mut taken = 0;
        for (name, template) in entries {
            if let Some(key) = MessageKey::from_name(&name) {
                self.register(language, key, template);
                taken += 1;
            }
        }
        Ok(taken)
    }

    /// The template for `key`, preferring `language`, else English.
    #[must_use]
    pub fn template(&self, key: MessageKey, language: Option<&str>) -> Option<&str> {
        language
            .and_then(|lang| self.languages.get(lang))
            .and_then(|templates| templates.get(&key))
            .or_else(|| {
                self.languages
                    .get(DEFAULT_LANGUAGE)
                    .and_then(|templates| templates.get(&key))
            })
            .map(String::as_str)
    }

    /// Render `key` with `args`.
    ///
    /// # Errors
    ///
    /// Returns [`UntieError::Message`] when the key is missing or the
    /// template is malformed. The failure is logged before returning.
    pub fn render(
        &self,
        key: MessageKey,
        language: Option<&str>,
        args: &[&dyn Display],
    ) -> Result<String, UntieError> {
        let result = match self.template(key, language) {
            Some(template) => format_template(template, args),
            None => Err(MessageError::UnknownKey(key.as_str().to_string())),
        };
        result.map_err(|source| {
            error!(key = key.as_str(), language, %source, "message template failed to render");
            UntieError::Message {
                key: key.as_str(),
                source,
            }
        })
    }

    /// Render `key` and wrap it in the chat prefix.
    ///
    /// # Errors
    ///
    /// Same as [`MessageCatalog::render`], for either template.
    pub fn chat(
        &self,
        key: MessageKey,
        language: Option<&str>,
        args: &[&dyn Display],
    ) -> Result<String, UntieError> {
        let body = self.render(key, language, args)?;
        self.render(MessageKey::Chat, language, &[&body])
    }
}

impl Default for MessageCatalog {
    fn default() -> Self {
        Self::new()
    }
}

/// Substitute positional placeholders.
///
/// # Errors
///
/// Returns [`MessageError`] for unbalanced braces, non-numeric placeholders
/// and indices past the end of `args`.
pub fn format_template(template: &str, args: &[&dyn Display]) -> Result<String, MessageError> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.char_indices().peekable();

    while let Some((pos, c)) = chars.next() {
        match c {
            '{' if chars.peek().is_some_and(|&(_, next)| next == '{') => {
                chars.next();
                out.push('{');
            }
            '{' => {
                let mut body = String::new();
                let mut closed = false;
                for (_, inner) in chars.by_ref() {
                    if inner == '}' {
                        closed = true;
                        break;
                    }
                    body.push(inner);
                }
                if !closed {
                    return Err(MessageError::Unclosed(pos));
                }
                let index: usize = body
                    .trim()
                    .parse()
                    .map_err(|_| MessageError::BadPlaceholder(body.clone()))?;
                let arg = args.get(index).ok_or(MessageError::MissingArgument {
                    index,
                    needed: index + 1,
                    given: args.len(),
                })?;
                // Writing to a String cannot fail.
                let _ = write!(out, "{arg}");
            }
            '}' if chars.peek().is_some_and(|&(_, next)| next == '}') => {
                chars.next();
                out.push('}');
            }
            '}' => return Err(MessageError::Unmatched(pos)),
            other => out.push(other),
        }
    }

    Ok(out)
}
