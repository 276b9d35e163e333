use thiserror::Error;

use crate::value::ValueKind;

/// A raw string that does not coerce to the requested kind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind} value {value:?}")]
pub struct CoerceError {
    pub kind: ValueKind,
    pub value: String,
}

/// The first failure hit while tokenizing an argument vector.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unknown flag: {flag}{}", suggestion_block(.suggestions))]
    UnknownFlag {
        flag: String,
        suggestions: Vec<String>,
    },

    #[error("flag needs an argument: {flag}")]
    MissingValue { flag: String },

    #[error("invalid argument \"{value}\" for \"{flag}\"")]
    InvalidValue {
        flag: String,
        value: String,
        kind: ValueKind,
    },
}

/// Render the "Did you mean this?" block appended to unknown-name errors.
pub fn suggestion_block(suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        return String::new();
    }
    let mut out = String::from("\n\nDid you mean this?\n");
    for s in suggestions {
        out.push_str("  ");
        out.push_str(s);
        out.push('\n');
    }
    out
}
