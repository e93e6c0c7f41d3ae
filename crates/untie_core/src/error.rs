//! Error types for the untie core.

use std::path::PathBuf;

use crate::ids::ActorId;

/// Errors raised while loading or validating [`UntieConfig`](crate::config::UntieConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read or written.
    #[error("config file {path}: {source}")]
    Io {
        /// Path of the offending file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid JSON for the config schema.
    #[error("failed to parse config: {0}")]
    Json(#[from] serde_json::Error),

    /// A value parsed but is out of range.
    #[error("invalid config value for {field}: {reason}")]
    Invalid {
        /// JSON key of the field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

/// Errors raised while rendering a message template.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MessageError {
    /// No template is registered for the key in any language.
    #[error("no template registered for message key {0:?}")]
    UnknownKey(String),

    /// A `{` was opened but never closed.
    #[error("unclosed placeholder at byte {0}")]
    Unclosed(usize),

    /// A `}` appeared without a matching `{`.
    #[error("unmatched closing brace at byte {0}")]
    Unmatched(usize),

    /// The placeholder body is not an argument index.
    #[error("invalid placeholder {0:?}")]
    BadPlaceholder(String),

    /// The placeholder refers to an argument that was not supplied.
    #[error("placeholder {{{index}}} needs {needed} argument(s), got {given}")]
    MissingArgument {
        /// Index referenced by the template.
        index: usize,
        /// Minimum number of arguments the template needs.
        needed: usize,
        /// Number of arguments supplied.
        given: usize,
    },
}

/// Top-level error type for the untie state machine.
#[derive(Debug, thiserror::Error)]
pub enum UntieError {
    /// Configuration could not be loaded or is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A notification template failed to render.
    #[error("failed to render message {key}: {source}")]
    Message {
        /// Message key that was being rendered.
        key: &'static str,
        /// Formatting failure.
        #[source]
        source: MessageError,
    },

    /// The actor's world state disappeared while its monitor was live.
    #[error("{0} is no longer present in the world")]
    ActorGone(ActorId),
}
