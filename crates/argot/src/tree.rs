//! The command arena.
//!
//! Commands live in a vector; a command's parent is an index recorded once,
//! when the command is attached, and never changed afterwards. Every setting
//! a command can inherit is resolved with [`CommandTree::inherited`].

use argot_argparse::flag::bare_name;
use argot_argparse::{FlagSet, ParserOptions};
use indexmap::IndexMap;

use crate::command::{Command, CompletionFn, FlagErrorFn};
use crate::completion::Directive;
use crate::value::SharedValue;

pub const DEFAULT_HELP_COMMAND: &str = "help";
pub const VERSION_COMMAND: &str = "version";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommandId(usize);

#[derive(Debug)]
struct Node {
    command: Command,
    parent: Option<CommandId>,
    children: Vec<CommandId>,
}

#[derive(Debug)]
pub struct CommandTree {
    nodes: Vec<Node>,
}

impl CommandTree {
    /// Take ownership of `root` and all of its subcommands.
    pub fn new(root: Command) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.insert(None, root);
        tree
    }

    fn insert(&mut self, parent: Option<CommandId>, mut command: Command) -> CommandId {
        let subcommands = std::mem::take(&mut command.subcommands);
        let id = CommandId(self.nodes.len());
        self.nodes.push(Node {
            command,
            parent,
            children: Vec::new(),
        });
        if let Some(parent) = parent {
            self.nodes[parent.0].children.push(id);
        }
        for sub in subcommands {
            self.insert(Some(id), sub);
        }
        id
    }

    /// Attach `command` (and its subcommands) under `parent`.
    pub fn add_child(&mut self, parent: CommandId, command: Command) -> CommandId {
        self.insert(Some(parent), command)
    }

    pub fn root(&self) -> CommandId {
        CommandId(0)
    }

    pub fn is_root(&self, id: CommandId) -> bool {
        id == self.root()
    }

    pub fn command(&self, id: CommandId) -> &Command {
        &self.nodes[id.0].command
    }

    pub fn parent(&self, id: CommandId) -> Option<CommandId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: CommandId) -> &[CommandId] {
        &self.nodes[id.0].children
    }

    /// `id` and its ancestors, nearest first.
    pub fn ancestors(&self, id: CommandId) -> impl Iterator<Item = CommandId> + '_ {
        std::iter::successors(Some(id), move |&c| self.parent(c))
    }

    /// The root first, `id` last.
    pub fn lineage(&self, id: CommandId) -> Vec<CommandId> {
        let mut chain: Vec<CommandId> = self.ancestors(id).collect();
        chain.reverse();
        chain
    }

    /// The nearest override of a setting, starting at `id` itself.
    pub fn inherited<T>(&self, id: CommandId, pick: impl Fn(&Command) -> Option<T>) -> Option<T> {
        self.ancestors(id).find_map(|c| pick(self.command(c)))
    }

    pub fn command_path(&self, id: CommandId) -> String {
        self.lineage(id)
            .into_iter()
            .map(|c| self.command(c).name.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// The child of `id` called `token`, by name or alias.
    pub fn find_child(&self, id: CommandId, token: &str) -> Option<CommandId> {
        self.children(id)
            .iter()
            .copied()
            .find(|&c| self.command(c).answers_to(token))
    }

    /// Follow a path of names from the root.
    pub fn find(&self, path: &[&str]) -> Option<CommandId> {
        path.iter()
            .try_fold(self.root(), |at, name| self.find_child(at, name))
    }

    pub fn visible_children(&self, id: CommandId) -> Vec<CommandId> {
        self.children(id)
            .iter()
            .copied()
            .filter(|&c| !self.command(c).hidden)
            .collect()
    }

    /// Local flags, own persistent flags, then inherited persistent flags.
    /// A nearer declaration shadows a farther one with the same name.
    pub fn effective_flags(&self, id: CommandId) -> FlagSet {
        let cmd = self.command(id);
        let mut flags = cmd.flags.clone();
        flags.extend_missing(&cmd.persistent_flags);
        flags.extend_missing(&self.inherited_flags(id));
        flags
    }

    /// Persistent flags declared by ancestors.
    pub fn inherited_flags(&self, id: CommandId) -> FlagSet {
        let mut flags = FlagSet::new();
        for ancestor in self.ancestors(id).skip(1) {
            flags.extend_missing(&self.command(ancestor).persistent_flags);
        }
        flags
    }

    pub(crate) fn parser_options(&self, id: CommandId) -> ParserOptions {
        let defaults = ParserOptions::default();
        ParserOptions {
            allow_unknown_flags: self
                .inherited(id, |c| c.settings.allow_unknown_flags)
                .unwrap_or(defaults.allow_unknown_flags),
            short_flag_grouping: self
                .inherited(id, |c| c.settings.short_flag_grouping)
                .unwrap_or(defaults.short_flag_grouping),
            bool_negation: self
                .inherited(id, |c| c.settings.bool_negation)
                .unwrap_or(defaults.bool_negation),
            suggestions: self.suggestions(id),
            suggestions_minimum_distance: self.suggestions_minimum_distance(id),
            disable_flag_parsing: self.command(id).disable_flag_parsing,
            normalize_key: self.inherited(id, |c| c.settings.normalize_key.clone()),
        }
    }

    /// Apply the inherited key normalizer to a flag token.
    pub(crate) fn normalize_key(&self, id: CommandId, key: &str) -> String {
        match self.inherited(id, |c| c.settings.normalize_key.clone()) {
            Some(normalize) => normalize(key),
            None => key.to_string(),
        }
    }

    pub fn version(&self, id: CommandId) -> Option<String> {
        self.inherited(id, |c| c.settings.version.clone())
            .filter(|v| !v.trim().is_empty())
    }

    /// Name of the root help command, or `None` when it is disabled.
    pub fn help_command_name(&self, id: CommandId) -> Option<String> {
        if !self.inherited(id, |c| c.settings.help_command).unwrap_or(true) {
            return None;
        }
        let name = self
            .inherited(id, |c| c.settings.help_command_name.clone())
            .unwrap_or_else(|| DEFAULT_HELP_COMMAND.to_string());
        (!name.is_empty()).then_some(name)
    }

    pub fn suggestions(&self, id: CommandId) -> bool {
        self.inherited(id, |c| c.settings.suggestions).unwrap_or(true)
    }

    pub fn suggestions_minimum_distance(&self, id: CommandId) -> usize {
        self.inherited(id, |c| c.settings.suggestions_minimum_distance)
            .unwrap_or(2)
    }

    pub fn traverse_children(&self, id: CommandId) -> bool {
        self.inherited(id, |c| c.settings.traverse_children)
            .unwrap_or(false)
    }

    pub fn silence_errors(&self, id: CommandId) -> bool {
        self.inherited(id, |c| c.settings.silence_errors).unwrap_or(false)
    }

    pub fn silence_usage(&self, id: CommandId) -> bool {
        self.inherited(id, |c| c.settings.silence_usage).unwrap_or(false)
    }

    pub fn completion_directive(&self, id: CommandId) -> Directive {
        self.inherited(id, |c| c.settings.completion_directive)
            .unwrap_or(Directive::NO_FILE_COMP)
    }

    pub(crate) fn flag_error_func(&self, id: CommandId) -> Option<FlagErrorFn> {
        self.inherited(id, |c| c.settings.flag_error_func.clone())
    }

    pub(crate) fn flag_completion(&self, id: CommandId, flag: &str) -> Option<CompletionFn> {
        self.inherited(id, |c| c.flag_completions.get(flag).cloned())
    }

    pub(crate) fn value_binding(&self, id: CommandId, flag: &str) -> Option<SharedValue> {
        self.inherited(id, |c| c.value_bindings.get(bare_name(flag)).cloned())
    }

    /// Environment bindings along the ancestor chain; nearer commands win.
    pub fn env_bindings(&self, id: CommandId) -> IndexMap<String, String> {
        let mut out = IndexMap::new();
        for c in self.lineage(id) {
            for (flag, var) in &self.command(c).env_bindings {
                out.insert(flag.clone(), var.clone());
            }
        }
        out
    }
}
