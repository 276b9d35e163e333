//! Flag declarations, value coercion and token parsing.
//!
//! This crate knows nothing about command trees. It is used by `argot` for:
//! - parsing the residual argument vector of a resolved command
//! - classifying flag tokens while walking the command tree
//! - coercing config and environment values before they are merged

pub mod error;
pub mod flag;
pub mod matches;
pub mod parser;
pub mod suggest;
pub mod value;

pub use error::{CoerceError, ParseError};
pub use flag::{DefaultValue, Flag, FlagSet};
pub use matches::{FromFlagValue, KeyNormalizer, Matches};
pub use parser::{ParserOptions, is_flag_token, is_short_group, parse};
pub use value::{IpNetwork, Millis, ValueKind, coerce};
