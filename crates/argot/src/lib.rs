//! Hierarchical command trees.
//!
//! A [`Command`] is built with chained setters and handed to
//! [`CommandTree::new`], which freezes the hierarchy. Running the tree:
//! 1. resolves the target command from the leading tokens
//! 2. parses the remaining tokens against local and inherited flags
//! 3. merges config-file and environment values underneath the command line
//! 4. validates arguments, required flags and flag groups
//! 5. runs hooks and the action
//!
//! Help, version and shell-completion queries are answered along the way.

pub mod command;
pub mod completion;
pub mod context;
pub mod error;
mod execute;
pub mod external;
mod help;
pub mod resolve;
pub mod tree;
pub mod validators;
pub mod value;

pub use command::Command;
pub use completion::{CompletionItem, Directive};
pub use context::Context;
pub use error::Error;
pub use external::Env;
pub use resolve::{Resolution, WalkMode};
pub use tree::{CommandId, CommandTree};
pub use value::{SharedValue, Value, shared};

pub use argot_argparse::{DefaultValue, Flag, FlagSet, IpNetwork, Matches, Millis};
