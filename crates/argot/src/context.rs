use std::io::Write;

use argot_argparse::{FromFlagValue, Matches};

use crate::command::Command;
use crate::tree::{CommandId, CommandTree};

/// What a hook or action sees of the running invocation.
pub struct Context<'a> {
    pub(crate) tree: &'a CommandTree,
    pub(crate) id: CommandId,
    pub(crate) matches: &'a Matches,
    pub(crate) out: &'a mut dyn Write,
    pub(crate) err: &'a mut dyn Write,
}

impl<'a> Context<'a> {
    pub fn tree(&self) -> &'a CommandTree {
        self.tree
    }

    pub fn command_id(&self) -> CommandId {
        self.id
    }

    pub fn command(&self) -> &'a Command {
        self.tree.command(self.id)
    }

    /// Space-separated names from the root to the running command.
    pub fn command_path(&self) -> String {
        self.tree.command_path(self.id)
    }

    pub fn matches(&self) -> &'a Matches {
        self.matches
    }

    /// Positional arguments.
    pub fn args(&self) -> &'a [String] {
        self.matches.positionals()
    }

    /// The winning value of a flag.
    pub fn get<T: FromFlagValue>(&self, flag: &str) -> Option<T> {
        self.matches.get(flag)
    }

    pub fn out(&mut self) -> &mut dyn Write {
        &mut *self.out
    }

    pub fn err(&mut self) -> &mut dyn Write {
        &mut *self.err
    }
}
