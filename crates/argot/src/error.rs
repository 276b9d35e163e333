use argot_argparse::ParseError;
use argot_argparse::error::suggestion_block;
use argot_config::ConfigError;
use thiserror::Error;

/// Everything that can stop a command from running.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("unknown command \"{command}\" for \"{path}\"{}", suggestion_block(.suggestions))]
    UnknownCommand {
        command: String,
        path: String,
        suggestions: Vec<String>,
    },

    #[error("required flag not set: {flag}")]
    RequiredFlag { flag: String },

    #[error("flags are mutually exclusive: {}", .flags.join(", "))]
    MutuallyExclusive { flags: Vec<String> },

    #[error("at least one of the flags in the group is required: {}", .flags.join(", "))]
    OneRequired { flags: Vec<String> },

    #[error("flags must be set together: {}", .flags.join(", "))]
    RequiredTogether { flags: Vec<String> },

    /// Positional-argument validation failed.
    #[error("{0}")]
    Args(String),

    /// A bound custom value rejected one of the flag's values.
    #[error("invalid argument \"{value}\" for \"{flag}\": {message}")]
    Binding {
        flag: String,
        value: String,
        message: String,
    },

    /// A hook or action returned an error.
    #[error("{0}")]
    Hook(anyhow::Error),

    #[error("{0}")]
    Message(String),
}

impl Error {
    /// A free-form error, for flag error transforms and validators.
    pub fn msg(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }
}
