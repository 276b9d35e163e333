//! Command declarations.
//!
//! A [`Command`] is built by value and handed to a
//! [`CommandTree`](crate::CommandTree), which owns it for the rest of the
//! process. Settings left unset here fall back to the nearest ancestor that
//! sets them.

use std::fmt;
use std::path::PathBuf;
use std::rc::Rc;

use argot_argparse::flag::{annotations, bare_name};
use argot_argparse::{Flag, FlagSet, KeyNormalizer, Matches};
use indexmap::IndexMap;

use crate::completion::Directive;
use crate::context::Context;
use crate::error::Error;
use crate::value::SharedValue;

/// Annotation recording the type name of a flag bound to a custom value.
pub const VALUE_TYPE_ANNOTATION: &str = "value_type";

pub type Action = Rc<dyn Fn(&mut Context<'_>) -> i32>;
pub type TryAction = Rc<dyn Fn(&mut Context<'_>) -> anyhow::Result<()>>;
pub type Hook = Rc<dyn Fn(&mut Context<'_>)>;
pub type TryHook = Rc<dyn Fn(&mut Context<'_>) -> anyhow::Result<()>>;
pub type ArgsValidator = Rc<dyn Fn(&[String]) -> Result<(), String>>;
/// Produces completion candidates from the flags parsed so far and the
/// word being completed. A candidate `:<n>` replaces the directive.
pub type CompletionFn = Rc<dyn Fn(&Matches, &str) -> Vec<String>>;
pub type FlagErrorFn = Rc<dyn Fn(Error) -> Error>;

#[derive(Clone, Default)]
pub(crate) struct HookSlot {
    pub(crate) plain: Option<Hook>,
    pub(crate) fallible: Option<TryHook>,
}

#[derive(Clone, Default)]
pub(crate) struct Hooks {
    pub(crate) pre: HookSlot,
    pub(crate) post: HookSlot,
    pub(crate) persistent_pre: HookSlot,
    pub(crate) persistent_post: HookSlot,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct FlagGroups {
    pub(crate) mutually_exclusive: Vec<Vec<String>>,
    pub(crate) one_required: Vec<Vec<String>>,
    pub(crate) required_together: Vec<Vec<String>>,
}

/// Overrides resolved through the ancestor chain.
#[derive(Clone, Default)]
pub(crate) struct Settings {
    pub(crate) version: Option<String>,
    pub(crate) allow_unknown_flags: Option<bool>,
    pub(crate) short_flag_grouping: Option<bool>,
    pub(crate) bool_negation: Option<bool>,
    pub(crate) suggestions: Option<bool>,
    pub(crate) suggestions_minimum_distance: Option<usize>,
    pub(crate) normalize_key: Option<KeyNormalizer>,
    pub(crate) traverse_children: Option<bool>,
    pub(crate) silence_errors: Option<bool>,
    pub(crate) silence_usage: Option<bool>,
    pub(crate) help_command: Option<bool>,
    pub(crate) help_command_name: Option<String>,
    pub(crate) completion_directive: Option<Directive>,
    pub(crate) flag_error_func: Option<FlagErrorFn>,
    pub(crate) config_file: Option<PathBuf>,
    pub(crate) config_file_flag: Option<String>,
}

#[derive(Clone)]
pub struct Command {
    pub(crate) name: String,
    pub(crate) short: String,
    pub(crate) long: String,
    pub(crate) aliases: Vec<String>,
    pub(crate) example: String,
    pub(crate) hidden: bool,
    pub(crate) deprecated: Option<String>,
    pub(crate) flags: FlagSet,
    pub(crate) persistent_flags: FlagSet,
    pub(crate) subcommands: Vec<Command>,
    pub(crate) action: Option<Action>,
    pub(crate) try_action: Option<TryAction>,
    pub(crate) hooks: Hooks,
    pub(crate) args: Option<ArgsValidator>,
    pub(crate) groups: FlagGroups,
    pub(crate) env_bindings: IndexMap<String, String>,
    pub(crate) value_bindings: IndexMap<String, SharedValue>,
    pub(crate) flag_completions: IndexMap<String, CompletionFn>,
    pub(crate) valid_args: Vec<String>,
    pub(crate) valid_args_fn: Option<CompletionFn>,
    pub(crate) disable_flag_parsing: bool,
    pub(crate) settings: Settings,
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .field("hidden", &self.hidden)
            .field("flags", &self.flags.known_keys())
            .field("persistent_flags", &self.persistent_flags.known_keys())
            .field("subcommands", &self.subcommands.len())
            .field("runnable", &self.is_runnable())
            .finish_non_exhaustive()
    }
}

impl Command {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            short: String::new(),
            long: String::new(),
            aliases: Vec::new(),
            example: String::new(),
            hidden: false,
            deprecated: None,
            flags: FlagSet::new(),
            persistent_flags: FlagSet::new(),
            subcommands: Vec::new(),
            action: None,
            try_action: None,
            hooks: Hooks::default(),
            args: None,
            groups: FlagGroups::default(),
            env_bindings: IndexMap::new(),
            value_bindings: IndexMap::new(),
            flag_completions: IndexMap::new(),
            valid_args: Vec::new(),
            valid_args_fn: None,
            disable_flag_parsing: false,
            settings: Settings::default(),
        }
    }

    /// One-line description shown in command lists.
    pub fn short(mut self, text: impl Into<String>) -> Self {
        self.short = text.into();
        self
    }

    /// Description shown in this command's help when no short one is set.
    pub fn long(mut self, text: impl Into<String>) -> Self {
        self.long = text.into();
        self
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    /// Example lines, printed indented under `Examples:`.
    pub fn example(mut self, text: impl Into<String>) -> Self {
        self.example = text.into();
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Warn with `message` whenever this command runs.
    pub fn deprecated(mut self, message: impl Into<String>) -> Self {
        self.deprecated = Some(message.into());
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.settings.version = Some(version.into());
        self
    }

    pub fn subcommand(mut self, command: Command) -> Self {
        self.subcommands.push(command);
        self
    }

    /// A flag visible on this command only.
    pub fn flag(mut self, flag: Flag) -> Self {
        self.flags.add(flag);
        self
    }

    /// A flag visible on this command and every descendant.
    pub fn persistent_flag(mut self, flag: Flag) -> Self {
        self.persistent_flags.add(flag);
        self
    }

    /// A string flag whose value is also written into `value`.
    pub fn value_flag(
        mut self,
        name: impl AsRef<str>,
        value: SharedValue,
        description: impl Into<String>,
    ) -> Self {
        let (current, type_name) = {
            let v = value.borrow();
            (v.to_string(), v.type_name())
        };
        let flag = Flag::string(name.as_ref(), current, description)
            .annotate(VALUE_TYPE_ANNOTATION, type_name);
        let key = flag.name().to_string();
        self.flags.add(flag);
        self.value_bindings.insert(key, value);
        self
    }

    /// Write every explicit value of `flag` into `value`.
    pub fn bind_flag_value(mut self, flag: impl AsRef<str>, value: SharedValue) -> Self {
        let type_name = value.borrow().type_name();
        let key = bare_name(flag.as_ref()).to_string();
        self.update_flag(&key, |f| f.set_annotation(VALUE_TYPE_ANNOTATION, type_name));
        self.value_bindings.insert(key, value);
        self
    }

    /// Read `flag` from the environment variable `var` when it is not given
    /// on the command line.
    pub fn bind_env(mut self, flag: impl AsRef<str>, var: impl Into<String>) -> Self {
        self.env_bindings
            .insert(bare_name(flag.as_ref()).to_string(), var.into());
        self
    }

    fn update_flag(&mut self, name: &str, apply: impl FnOnce(&mut Flag)) {
        let flag = match self.flags.get_mut(name) {
            Some(flag) => Some(flag),
            None => self.persistent_flags.get_mut(name),
        };
        match flag {
            Some(flag) => apply(flag),
            None => tracing::debug!(command = %self.name, flag = name, "no such flag to update"),
        }
    }

    pub fn mark_flag_required(mut self, name: impl AsRef<str>) -> Self {
        self.update_flag(name.as_ref(), |f| f.set_required(true));
        self
    }

    pub fn mark_flag_hidden(mut self, name: impl AsRef<str>) -> Self {
        self.update_flag(name.as_ref(), |f| f.set_hidden(true));
        self
    }

    pub fn mark_flag_deprecated(mut self, name: impl AsRef<str>, message: impl Into<String>) -> Self {
        let message = message.into();
        self.update_flag(name.as_ref(), |f| f.set_deprecated(message));
        self
    }

    /// Complete the flag's value with files, restricted to `extensions`
    /// when any are given.
    pub fn mark_flag_filename(mut self, name: impl AsRef<str>, extensions: &[&str]) -> Self {
        let list = extensions.join(",");
        self.update_flag(name.as_ref(), |f| f.set_annotation(annotations::FILENAME_EXT, list));
        self
    }

    /// Complete the flag's value with directories.
    pub fn mark_flag_dirname(mut self, name: impl AsRef<str>) -> Self {
        self.update_flag(name.as_ref(), |f| f.set_annotation(annotations::DIRNAME, "true"));
        self
    }

    pub fn mark_flags_mutually_exclusive(mut self, names: &[&str]) -> Self {
        self.groups.mutually_exclusive.push(group(names));
        self
    }

    pub fn mark_flags_one_required(mut self, names: &[&str]) -> Self {
        self.groups.one_required.push(group(names));
        self
    }

    pub fn mark_flags_required_together(mut self, names: &[&str]) -> Self {
        self.groups.required_together.push(group(names));
        self
    }

    /// The action; its return value is the exit code.
    pub fn action(mut self, action: impl Fn(&mut Context<'_>) -> i32 + 'static) -> Self {
        self.action = Some(Rc::new(action));
        self
    }

    /// A fallible action. Takes the place of [`Command::action`] when both are set.
    pub fn try_action(
        mut self,
        action: impl Fn(&mut Context<'_>) -> anyhow::Result<()> + 'static,
    ) -> Self {
        self.try_action = Some(Rc::new(action));
        self
    }

    pub fn pre_run(mut self, hook: impl Fn(&mut Context<'_>) + 'static) -> Self {
        self.hooks.pre.plain = Some(Rc::new(hook));
        self
    }

    pub fn try_pre_run(
        mut self,
        hook: impl Fn(&mut Context<'_>) -> anyhow::Result<()> + 'static,
    ) -> Self {
        self.hooks.pre.fallible = Some(Rc::new(hook));
        self
    }

    pub fn post_run(mut self, hook: impl Fn(&mut Context<'_>) + 'static) -> Self {
        self.hooks.post.plain = Some(Rc::new(hook));
        self
    }

    pub fn try_post_run(
        mut self,
        hook: impl Fn(&mut Context<'_>) -> anyhow::Result<()> + 'static,
    ) -> Self {
        self.hooks.post.fallible = Some(Rc::new(hook));
        self
    }

    /// Runs before the action of this command and of every descendant.
    pub fn persistent_pre_run(mut self, hook: impl Fn(&mut Context<'_>) + 'static) -> Self {
        self.hooks.persistent_pre.plain = Some(Rc::new(hook));
        self
    }

    pub fn try_persistent_pre_run(
        mut self,
        hook: impl Fn(&mut Context<'_>) -> anyhow::Result<()> + 'static,
    ) -> Self {
        self.hooks.persistent_pre.fallible = Some(Rc::new(hook));
        self
    }

    pub fn persistent_post_run(mut self, hook: impl Fn(&mut Context<'_>) + 'static) -> Self {
        self.hooks.persistent_post.plain = Some(Rc::new(hook));
        self
    }

    pub fn try_persistent_post_run(
        mut self,
        hook: impl Fn(&mut Context<'_>) -> anyhow::Result<()> + 'static,
    ) -> Self {
        self.hooks.persistent_post.fallible = Some(Rc::new(hook));
        self
    }

    /// Validate positional arguments; see [`crate::validators`].
    pub fn args(mut self, validator: impl Fn(&[String]) -> Result<(), String> + 'static) -> Self {
        self.args = Some(Rc::new(validator));
        self
    }

    /// Static candidates for positional arguments.
    pub fn valid_args<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.valid_args = values.into_iter().map(Into::into).collect();
        self
    }

    /// Dynamic candidates for positional arguments; replaces `valid_args`.
    pub fn valid_args_function(
        mut self,
        complete: impl Fn(&Matches, &str) -> Vec<String> + 'static,
    ) -> Self {
        self.valid_args_fn = Some(Rc::new(complete));
        self
    }

    /// Candidates for the value of `flag`. Descendants inherit it.
    pub fn flag_completion(
        mut self,
        flag: impl AsRef<str>,
        complete: impl Fn(&Matches, &str) -> Vec<String> + 'static,
    ) -> Self {
        self.flag_completions
            .insert(bare_name(flag.as_ref()).to_string(), Rc::new(complete));
        self
    }

    pub fn completion_directive(mut self, directive: Directive) -> Self {
        self.settings.completion_directive = Some(directive);
        self
    }

    /// Treat every argument after the command path as positional.
    pub fn disable_flag_parsing(mut self) -> Self {
        self.disable_flag_parsing = true;
        self
    }

    pub fn allow_unknown_flags(mut self, allow: bool) -> Self {
        self.settings.allow_unknown_flags = Some(allow);
        self
    }

    pub fn short_flag_grouping(mut self, enabled: bool) -> Self {
        self.settings.short_flag_grouping = Some(enabled);
        self
    }

    pub fn bool_negation(mut self, enabled: bool) -> Self {
        self.settings.bool_negation = Some(enabled);
        self
    }

    pub fn suggestions(mut self, enabled: bool) -> Self {
        self.settings.suggestions = Some(enabled);
        self
    }

    pub fn suggestions_minimum_distance(mut self, distance: usize) -> Self {
        self.settings.suggestions_minimum_distance = Some(distance);
        self
    }

    /// Rewrite every flag key (`--some_name`) before lookup.
    pub fn normalize_flag_keys(mut self, normalize: impl Fn(&str) -> String + 'static) -> Self {
        self.settings.normalize_key = Some(Rc::new(normalize));
        self
    }

    /// Look up flag kinds in the whole subtree while resolving commands.
    pub fn traverse_children(mut self, enabled: bool) -> Self {
        self.settings.traverse_children = Some(enabled);
        self
    }

    pub fn silence_errors(mut self, silence: bool) -> Self {
        self.settings.silence_errors = Some(silence);
        self
    }

    pub fn silence_usage(mut self, silence: bool) -> Self {
        self.settings.silence_usage = Some(silence);
        self
    }

    /// Enable or disable the root `help` command.
    pub fn help_command(mut self, enabled: bool) -> Self {
        self.settings.help_command = Some(enabled);
        self
    }

    pub fn help_command_name(mut self, name: impl Into<String>) -> Self {
        self.settings.help_command_name = Some(name.into());
        self
    }

    /// Rewrite flag errors (parse, binding, required flag, flag group)
    /// before they are reported.
    pub fn flag_error_func(mut self, transform: impl Fn(Error) -> Error + 'static) -> Self {
        self.settings.flag_error_func = Some(Rc::new(transform));
        self
    }

    /// Always read this config file.
    pub fn config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.settings.config_file = Some(path.into());
        self
    }

    /// Read the config file named by this flag; it wins over `config_file`.
    pub fn config_file_flag(mut self, flag: impl AsRef<str>) -> Self {
        self.settings.config_file_flag = Some(bare_name(flag.as_ref()).to_string());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn short_description(&self) -> &str {
        &self.short
    }

    pub fn long_description(&self) -> &str {
        &self.long
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn deprecation(&self) -> Option<&str> {
        self.deprecated.as_deref()
    }

    pub fn local_flags(&self) -> &FlagSet {
        &self.flags
    }

    pub fn persistent_flags(&self) -> &FlagSet {
        &self.persistent_flags
    }

    /// Whether this command has an action to run.
    pub fn is_runnable(&self) -> bool {
        self.action.is_some() || self.try_action.is_some()
    }

    /// Name or alias match.
    pub fn answers_to(&self, token: &str) -> bool {
        self.name == token || self.aliases.iter().any(|a| a == token)
    }
}

fn group(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| bare_name(n).to_string()).collect()
}
