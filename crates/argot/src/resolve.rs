//! Finding the command an argument vector addresses.
//!
//! Execution and completion share one walk over the tokens. It descends into
//! subcommands while it can, skips flags together with the values they take,
//! and stops at the first token that names no subcommand.

use argot_argparse::flag::{HELP_FLAG, VERSION_FLAG};
use argot_argparse::{is_flag_token, is_short_group};

use crate::tree::{CommandId, CommandTree, VERSION_COMMAND};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkMode {
    /// Root-level `help` and `version` tokens short-circuit the walk.
    Execute,
    Complete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Run `id` with `args`: the input minus the subcommand names walked.
    Command { id: CommandId, args: Vec<String> },
    /// `help [path...]` at the root.
    Help { path: Vec<String> },
    /// `version` at the root.
    Version,
}

impl CommandTree {
    pub fn resolve<S: AsRef<str>>(&self, args: &[S], mode: WalkMode) -> Resolution {
        let root = self.root();
        let help_name = self.help_command_name(root);
        let mut current = root;
        let mut walked = Vec::new();

        let mut i = 0;
        while i < args.len() {
            let token = args[i].as_ref();
            if token == "--" {
                break;
            }
            if is_flag_token(token) {
                i = self.skip_flag_value(current, args, i) + 1;
                continue;
            }

            if mode == WalkMode::Execute && current == root {
                if help_name.as_deref() == Some(token) {
                    let path = args[i + 1..]
                        .iter()
                        .map(AsRef::<str>::as_ref)
                        .take_while(|t| *t != "--" && !is_flag_token(t))
                        .map(str::to_string)
                        .collect();
                    return Resolution::Help { path };
                }
                if token == VERSION_COMMAND
                    && self.version(root).is_some()
                    && self.find_child(root, token).is_none()
                {
                    return Resolution::Version;
                }
            }

            match self.find_child(current, token) {
                Some(child) => {
                    walked.push(i);
                    current = child;
                    i += 1;
                }
                None => break,
            }
        }

        let args = args
            .iter()
            .enumerate()
            .filter(|(idx, _)| !walked.contains(idx))
            .map(|(_, a)| a.as_ref().to_string())
            .collect();
        tracing::debug!(
            command = %self.command_path(current),
            ?mode,
            "resolved command"
        );
        Resolution::Command { id: current, args }
    }

    /// Index of the last token the flag at `i` occupies.
    fn skip_flag_value<S: AsRef<str>>(&self, at: CommandId, args: &[S], i: usize) -> usize {
        let token = args[i].as_ref();
        if token.contains('=') {
            return i;
        }
        let options = self.parser_options(at);
        if options.bool_negation && token.starts_with("--no-") {
            return i;
        }
        let has_next = i + 1 < args.len();

        if options.short_flag_grouping && is_short_group(token) {
            for (pos, c) in token.char_indices().skip(1) {
                match self.flag_takes_no_value(at, &format!("-{c}")) {
                    Some(true) => continue,
                    Some(false) => {
                        // `-ovalue` carries its value; `-o value` takes the next token.
                        let last = pos + c.len_utf8() == token.len();
                        return if last && has_next { i + 1 } else { i };
                    }
                    None => return i,
                }
            }
            return i;
        }

        match self.flag_takes_no_value(at, token) {
            Some(true) => i,
            Some(false) if has_next => i + 1,
            Some(false) => i,
            None if has_next && !is_flag_token(args[i + 1].as_ref()) => i + 1,
            None => i,
        }
    }

    /// `Some(true)` for boolean and count flags, `Some(false)` for flags that
    /// take a value, `None` for unknown keys.
    fn flag_takes_no_value(&self, at: CommandId, key: &str) -> Option<bool> {
        let normalized = self.normalize_key(at, key);
        let declared = if self.traverse_children(at) {
            self.subtree_flag_shape(at, &normalized)
        } else {
            self.effective_flags(at)
                .lookup(&normalized)
                .map(|f| f.kind().is_bool_like())
        };
        declared.or_else(|| is_builtin(key).then_some(true))
    }

    fn subtree_flag_shape(&self, at: CommandId, key: &str) -> Option<bool> {
        let mut found = false;
        let mut stack = vec![at];
        while let Some(id) = stack.pop() {
            if let Some(flag) = self.effective_flags(id).lookup(key) {
                if !flag.kind().is_bool_like() {
                    return Some(false);
                }
                found = true;
            }
            stack.extend(self.children(id).iter().rev());
        }
        found.then_some(true)
    }
}

fn is_builtin(key: &str) -> bool {
    key == "-h" || key.strip_prefix("--").is_some_and(|k| k == HELP_FLAG || k == VERSION_FLAG)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;
    use argot_argparse::Flag;

    fn tree(traverse: bool) -> CommandTree {
        CommandTree::new(
            Command::new("app")
                .version("0.3.0")
                .traverse_children(traverse)
                .persistent_flag(Flag::string("output", "text", "format").short('o'))
                .persistent_flag(Flag::bool("quiet", "less output").short('q'))
                .subcommand(
                    Command::new("a").subcommand(
                        Command::new("b")
                            .flag(Flag::bool("flag", "only under b"))
                            .action(|_| 0),
                    ),
                )
                .subcommand(Command::new("run").alias("r").action(|_| 0)),
        )
    }

    fn command(r: Resolution) -> (CommandId, Vec<String>) {
        match r {
            Resolution::Command { id, args } => (id, args),
            other => panic!("expected a command, got {other:?}"),
        }
    }

    #[test]
    fn unknown_flag_stops_descent_without_traversal() {
        let tree = tree(false);
        let (id, args) = command(tree.resolve(&["a", "--flag", "b"], WalkMode::Execute));
        assert_eq!(tree.command_path(id), "app a");
        assert_eq!(args, vec!["--flag", "b"]);
    }

    #[test]
    fn traversal_finds_flags_declared_below() {
        let tree = tree(true);
        let (id, args) = command(tree.resolve(&["a", "--flag", "b"], WalkMode::Execute));
        assert_eq!(tree.command_path(id), "app a b");
        assert_eq!(args, vec!["--flag"]);
    }

    #[test]
    fn value_flags_skip_their_value() {
        let tree = tree(false);
        let (id, args) = command(tree.resolve(&["-o", "run", "run", "x"], WalkMode::Execute));
        assert_eq!(tree.command_path(id), "app run");
        assert_eq!(args, vec!["-o", "run", "x"]);

        let (id, _) = command(tree.resolve(&["-qo", "a", "run"], WalkMode::Execute));
        assert_eq!(tree.command_path(id), "app run");

        let (id, _) = command(tree.resolve(&["-oa", "a"], WalkMode::Execute));
        assert_eq!(tree.command_path(id), "app a");

        let (id, _) = command(tree.resolve(&["--output=a", "r"], WalkMode::Execute));
        assert_eq!(tree.command_path(id), "app run");
    }

    #[test]
    fn bool_flags_do_not_consume() {
        let tree = tree(false);
        let (id, args) = command(tree.resolve(&["--quiet", "r", "--no-quiet"], WalkMode::Execute));
        assert_eq!(tree.command_path(id), "app run");
        assert_eq!(args, vec!["--quiet", "--no-quiet"]);
    }

    #[test]
    fn double_dash_ends_the_walk() {
        let tree = tree(false);
        let (id, args) = command(tree.resolve(&["--", "run"], WalkMode::Execute));
        assert_eq!(id, tree.root());
        assert_eq!(args, vec!["--", "run"]);
    }

    #[test]
    fn help_and_version_short_circuit_at_the_root() {
        let tree = tree(false);
        assert_eq!(
            tree.resolve(&["help", "a", "b", "--x"], WalkMode::Execute),
            Resolution::Help {
                path: vec!["a".into(), "b".into()]
            }
        );
        assert_eq!(tree.resolve(&["version"], WalkMode::Execute), Resolution::Version);

        // Below the root they are ordinary tokens.
        let (id, args) = command(tree.resolve(&["a", "help"], WalkMode::Execute));
        assert_eq!(tree.command_path(id), "app a");
        assert_eq!(args, vec!["help"]);

        // Completion never short-circuits.
        let (id, args) = command(tree.resolve(&["help"], WalkMode::Complete));
        assert_eq!(id, tree.root());
        assert_eq!(args, vec!["help"]);
    }
}
