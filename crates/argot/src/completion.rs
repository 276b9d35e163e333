//! The shell completion protocol.
//!
//! Shell scripts call the hidden `__complete` command with the words typed so
//! far plus the word being completed. It prints one candidate per line
//! followed by a `:<directive>` line.

use std::fmt;
use std::ops::BitOr;

use argot_argparse::flag::annotations;
use argot_argparse::{Flag, Matches};

use crate::command::{Command, CompletionFn};
use crate::resolve::{Resolution, WalkMode};
use crate::tree::{CommandId, CommandTree, VERSION_COMMAND};

pub const COMPLETE_COMMAND: &str = "__complete";
pub const COMPLETE_NO_DESC_COMMAND: &str = "__completeNoDesc";

/// Hints for the shell, sent as the last line of a completion response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Directive(u32);

impl Directive {
    pub const DEFAULT: Self = Self(0);
    pub const ERROR: Self = Self(1);
    pub const NO_SPACE: Self = Self(2);
    pub const NO_FILE_COMP: Self = Self(4);
    pub const FILTER_FILE_EXT: Self = Self(8);
    pub const FILTER_DIRS: Self = Self(16);
    pub const KEEP_ORDER: Self = Self(32);

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Parse a `:<digits>` sentinel.
    pub fn parse_sentinel(s: &str) -> Option<Self> {
        let digits = s.strip_prefix(':')?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok().map(Self)
    }
}

impl BitOr for Directive {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ":{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionItem {
    pub value: String,
    pub description: String,
}

impl CompletionItem {
    fn new(value: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            description: description.into(),
        }
    }

    fn sentinel(directive: Directive) -> Self {
        Self::new(directive.to_string(), "")
    }
}

impl fmt::Display for CompletionItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.description.is_empty() {
            f.write_str(&self.value)
        } else {
            write!(f, "{}\t{}", self.value, self.description)
        }
    }
}

/// Candidates gathered for one request, with the directive they carry.
struct Response {
    directive: Directive,
    items: Vec<CompletionItem>,
}

impl Response {
    /// Keep `candidate` unless it is a directive override.
    fn offer(&mut self, candidate: String) -> Option<String> {
        match Directive::parse_sentinel(&candidate) {
            Some(directive) => {
                self.directive = directive;
                None
            }
            None => Some(candidate),
        }
    }

    fn finish(mut self) -> Vec<CompletionItem> {
        self.items.push(CompletionItem::sentinel(self.directive));
        self.items
    }
}

impl CommandTree {
    /// Complete `to_complete` after `words`. The last item is always the
    /// directive sentinel.
    pub fn complete<S: AsRef<str>>(
        &self,
        words: &[S],
        to_complete: &str,
        with_descriptions: bool,
    ) -> Vec<CompletionItem> {
        let (id, residual) = match self.resolve(words, WalkMode::Complete) {
            Resolution::Command { id, args } => (id, args),
            _ => (self.root(), Vec::new()),
        };
        let mut response = Response {
            directive: self.completion_directive(id),
            items: Vec::new(),
        };
        let flags = self.effective_flags(id);

        let previous = words.last().map(AsRef::<str>::as_ref);
        let value_after_flag = previous.is_some_and(|p| p.starts_with('-'))
            && !to_complete.starts_with('-');

        let mut argv = residual;
        if to_complete.contains('=') || value_after_flag {
            argv.push(to_complete.to_string());
        }
        let matches = argot_argparse::parse(&argv, &flags, &self.parser_options(id));
        tracing::debug!(
            command = %self.command_path(id),
            to_complete,
            "completing"
        );

        // --flag=<prefix>
        if let Some((key, prefix)) = to_complete.split_once('=') {
            if let Some(flag) = flags.lookup(&self.normalize_key(id, key)) {
                let candidates = self.flag_value_candidates(id, flag, &matches, prefix, &mut response);
                let raw = response.directive.contains(Directive::FILTER_FILE_EXT);
                for candidate in candidates {
                    if raw {
                        response.items.push(CompletionItem::new(candidate, ""));
                    } else if candidate.starts_with(prefix) {
                        response.items.push(CompletionItem::new(format!("{key}={candidate}"), ""));
                    }
                }
            }
            return response.finish();
        }

        // --flag <prefix>
        if value_after_flag {
            let key = previous.unwrap_or_default();
            if let Some(flag) = flags.lookup(&self.normalize_key(id, key)) {
                if !flag.kind().is_bool_like() {
                    let candidates =
                        self.flag_value_candidates(id, flag, &matches, to_complete, &mut response);
                    let raw = response.directive.contains(Directive::FILTER_FILE_EXT);
                    for candidate in candidates {
                        if raw || candidate.starts_with(to_complete) {
                            response.items.push(CompletionItem::new(candidate, ""));
                        }
                    }
                    return response.finish();
                }
            }
        }

        if to_complete.starts_with('-') {
            let describe = |text: &str| if with_descriptions { text.to_string() } else { String::new() };
            let mut offer = |name: String, description: &str| {
                if name.starts_with(to_complete) {
                    response.items.push(CompletionItem::new(name, describe(description)));
                }
            };
            for flag in flags.iter().filter(|f| !f.is_hidden()) {
                offer(flag.long(), flag.description());
                if let Some(short) = flag.short_name() {
                    offer(format!("-{short}"), flag.description());
                }
            }
            if !flags.contains("help") {
                offer("--help".to_string(), "Help for this command");
                offer("-h".to_string(), "Help for this command");
            }
            if self.version(id).is_some() && !flags.contains("version") {
                offer("--version".to_string(), "Version for this command");
            }
            return response.finish();
        }

        self.offer_commands(id, to_complete, with_descriptions, &mut response);

        let cmd = self.command(id);
        let candidates = match &cmd.valid_args_fn {
            Some(complete) => complete(&matches, to_complete),
            None => cmd.valid_args.clone(),
        };
        for candidate in candidates {
            if let Some(candidate) = response.offer(candidate) {
                if candidate.starts_with(to_complete) {
                    response.items.push(CompletionItem::new(candidate, ""));
                }
            }
        }
        response.finish()
    }

    fn offer_commands(
        &self,
        id: CommandId,
        to_complete: &str,
        with_descriptions: bool,
        response: &mut Response,
    ) {
        let describe = |text: &str| if with_descriptions { text.to_string() } else { String::new() };
        let mut seen = Vec::new();
        for child in self.visible_children(id) {
            let cmd = self.command(child);
            for name in std::iter::once(&cmd.name).chain(&cmd.aliases) {
                if !name.starts_with(to_complete) || seen.contains(name) {
                    continue;
                }
                seen.push(name.clone());
                response.items.push(CompletionItem::new(name.clone(), describe(&cmd.short)));
            }
        }
        if self.is_root(id) {
            if let Some(help) = self.help_command_name(id) {
                if help.starts_with(to_complete) && !seen.contains(&help) {
                    response.items.push(CompletionItem::new(help, describe("Help about any command")));
                }
            }
            if self.version(id).is_some()
                && VERSION_COMMAND.starts_with(to_complete)
                && !seen.iter().any(|s| s == VERSION_COMMAND)
            {
                response.items.push(CompletionItem::new(
                    VERSION_COMMAND,
                    describe("Print the version number"),
                ));
            }
        }
    }

    /// Candidates for a flag's value, from its completion function or, when
    /// it has none, from its filename/dirname annotations.
    fn flag_value_candidates(
        &self,
        id: CommandId,
        flag: &Flag,
        matches: &Matches,
        prefix: &str,
        response: &mut Response,
    ) -> Vec<String> {
        if let Some(complete) = self.flag_completion(id, flag.name()) {
            return run_completion(&complete, matches, prefix, response);
        }
        if let Some(list) = flag.annotation(annotations::FILENAME_EXT) {
            let extensions: Vec<String> = list
                .split(',')
                .map(str::trim)
                .filter(|e| !e.is_empty())
                .map(str::to_string)
                .collect();
            response.directive = if extensions.is_empty() {
                Directive::DEFAULT
            } else {
                Directive::FILTER_FILE_EXT
            };
            return extensions;
        }
        if flag.annotation(annotations::DIRNAME).is_some() {
            response.directive = Directive::FILTER_DIRS;
        }
        Vec::new()
    }

    /// Add the hidden `__complete` and `__completeNoDesc` commands to the root.
    pub fn enable_completion(&mut self) {
        let root = self.root();
        for (name, with_descriptions) in [(COMPLETE_COMMAND, true), (COMPLETE_NO_DESC_COMMAND, false)] {
            if self.find_child(root, name).is_some() {
                continue;
            }
            let command = Command::new(name)
                .short("Request shell completion choices")
                .hidden()
                .disable_flag_parsing()
                .try_action(move |ctx| {
                    let args = ctx.args();
                    let (to_complete, words) = match args.split_last() {
                        Some((last, words)) => (last.as_str(), words),
                        None => ("", args),
                    };
                    let items = ctx.tree().complete(words, to_complete, with_descriptions);
                    for item in items {
                        writeln!(ctx.out(), "{item}")?;
                    }
                    Ok(())
                });
            self.add_child(root, command);
        }
    }
}

fn run_completion(
    complete: &CompletionFn,
    matches: &Matches,
    prefix: &str,
    response: &mut Response,
) -> Vec<String> {
    complete(matches, prefix)
        .into_iter()
        .filter_map(|candidate| response.offer(candidate))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(items: &[CompletionItem]) -> Vec<&str> {
        items.iter().map(|i| i.value.as_str()).collect()
    }

    fn tree() -> CommandTree {
        CommandTree::new(
            Command::new("app")
                .version("2.0.0")
                .persistent_flag(Flag::string("output", "text", "Output format").short('o'))
                .persistent_flag(Flag::bool("debug", "Debug logging").hidden())
                .flag_completion("output", |_, _| vec!["text".into(), "json".into(), "table".into()])
                .subcommand(
                    Command::new("deploy")
                        .short("Deploy a service")
                        .alias("dep")
                        .flag(Flag::string("manifest", "", "Manifest file"))
                        .flag(Flag::string("workdir", "", "Working directory"))
                        .flag(Flag::string("env", "", "Target environment"))
                        .mark_flag_filename("manifest", &["yaml", "yml"])
                        .mark_flag_dirname("workdir")
                        .flag_completion("env", |_, _| vec!["prod".into(), "staging".into(), ":6".into()])
                        .valid_args_function(|matches, _| {
                            let mut out = vec!["api".to_string(), "web".to_string()];
                            out.retain(|s| !matches.positionals().contains(s));
                            out
                        })
                        .action(|_| 0),
                )
                .subcommand(Command::new("destroy").short("Tear down").action(|_| 0))
                .subcommand(Command::new("internal").hidden().action(|_| 0)),
        )
    }

    #[test]
    fn subcommands_and_pseudo_commands() {
        let items = tree().complete::<&str>(&[], "", true);
        assert_eq!(
            values(&items),
            vec!["deploy", "dep", "destroy", "help", "version", ":4"]
        );
        assert_eq!(items[0].to_string(), "deploy\tDeploy a service");

        let items = tree().complete::<&str>(&[], "de", false);
        assert_eq!(values(&items), vec!["deploy", "dep", "destroy", ":4"]);
        assert_eq!(items[0].to_string(), "deploy");
    }

    #[test]
    fn flag_names_skip_hidden_flags() {
        let items = tree().complete(&["deploy"], "--", false);
        assert_eq!(
            values(&items),
            vec!["--manifest", "--workdir", "--env", "--output", "--help", "--version", ":4"]
        );
        let items = tree().complete(&["deploy"], "-", false);
        assert!(values(&items).contains(&"-o"));
        assert!(values(&items).contains(&"-h"));
        assert!(!values(&items).contains(&"--debug"));
    }

    #[test]
    fn inherited_flag_completion_with_separate_value() {
        let items = tree().complete(&["deploy", "--output"], "t", false);
        assert_eq!(values(&items), vec!["text", "table", ":4"]);
        let items = tree().complete(&["deploy", "-o"], "", false);
        assert_eq!(values(&items), vec!["text", "json", "table", ":4"]);
    }

    #[test]
    fn equals_form_reprefixes_candidates() {
        let items = tree().complete(&["deploy"], "--output=j", false);
        assert_eq!(values(&items), vec!["--output=json", ":4"]);
    }

    #[test]
    fn callbacks_can_override_the_directive() {
        let items = tree().complete(&["deploy", "--env"], "", false);
        assert_eq!(values(&items), vec!["prod", "staging", ":6"]);
    }

    #[test]
    fn filename_and_dirname_annotations() {
        let items = tree().complete(&["deploy", "--manifest"], "", false);
        assert_eq!(values(&items), vec!["yaml", "yml", ":8"]);
        let items = tree().complete(&["deploy"], "--manifest=", false);
        assert_eq!(values(&items), vec!["yaml", "yml", ":8"]);
        let items = tree().complete(&["deploy", "--workdir"], "", false);
        assert_eq!(values(&items), vec![":16"]);
    }

    #[test]
    fn positional_candidates_see_parsed_arguments() {
        let items = tree().complete(&["dep", "api"], "", false);
        assert_eq!(values(&items), vec!["web", ":4"]);
        let items = tree().complete(&["deploy", "--output", "json"], "a", false);
        assert_eq!(values(&items), vec!["api", ":4"]);
    }

    #[test]
    fn sentinel_parsing() {
        assert_eq!(Directive::parse_sentinel(":36"), Some(Directive::from_bits(36)));
        assert_eq!(Directive::parse_sentinel(":"), None);
        assert_eq!(Directive::parse_sentinel(":1a"), None);
        assert_eq!(Directive::parse_sentinel("4"), None);
        let d = Directive::NO_SPACE | Directive::KEEP_ORDER;
        assert!(d.contains(Directive::KEEP_ORDER));
        assert!(!d.contains(Directive::NO_FILE_COMP));
        assert_eq!(d.to_string(), ":34");
    }

    #[test]
    fn complete_command_prints_protocol_lines() {
        let mut tree = tree();
        tree.enable_completion();
        let mut out = Vec::new();
        let mut err = Vec::new();
        let code = tree.execute_with(
            &["__complete", "deploy", "--output", "j"],
            &crate::Env::Process,
            &mut out,
            &mut err,
        );
        assert_eq!(code, 0, "{}", String::from_utf8_lossy(&err));
        assert_eq!(String::from_utf8_lossy(&out), "json\n:4\n");

        let mut out = Vec::new();
        tree.execute_with(&["__complete", "de"], &crate::Env::Process, &mut out, &mut err);
        assert_eq!(
            String::from_utf8_lossy(&out),
            "deploy\tDeploy a service\ndep\tDeploy a service\ndestroy\tTear down\n:4\n"
        );

        let mut out = Vec::new();
        tree.execute_with(&["__completeNoDesc", "de"], &crate::Env::Process, &mut out, &mut err);
        assert_eq!(String::from_utf8_lossy(&out), "deploy\ndep\ndestroy\n:4\n");
    }
}
