//! Plain-text help, usage and version output.

use argot_argparse::flag::{HELP_FLAG, VERSION_FLAG};
use argot_argparse::{DefaultValue, Flag, FlagSet, ValueKind};

use crate::command::VALUE_TYPE_ANNOTATION;
use crate::tree::{CommandId, CommandTree, VERSION_COMMAND};

impl CommandTree {
    /// `Usage: <path> [command] [flags]`, newline-terminated.
    pub fn usage_line(&self, id: CommandId) -> String {
        let mut out = format!("Usage: {}", self.command_path(id));
        if !self.visible_children(id).is_empty() || self.has_root_pseudo_commands(id) {
            out.push_str(" [command]");
        }
        out.push_str(" [flags]\n");
        out
    }

    /// `<root> <version>`, or `None` when no version is set.
    pub fn version_text(&self, id: CommandId) -> Option<String> {
        let version = self.version(id)?;
        Some(format!("{} {}", self.command(self.root()).name, version.trim()))
    }

    pub fn help_text(&self, id: CommandId) -> String {
        let cmd = self.command(id);
        let mut out = self.usage_line(id);

        let description = if cmd.short.trim().is_empty() { &cmd.long } else { &cmd.short };
        if !description.trim().is_empty() {
            out.push('\n');
            out.push_str(description.trim_end());
            out.push('\n');
        }

        if !cmd.example.trim().is_empty() {
            out.push_str("\nExamples:\n");
            for line in cmd.example.trim_end().lines() {
                out.push_str(&format!("  {line}\n"));
            }
        }

        let mut commands: Vec<(String, String)> = Vec::new();
        if self.is_root(id) {
            if let Some(help) = self.help_command_name(id) {
                commands.push((help, "Help about any command".to_string()));
            }
            if self.version(id).is_some() {
                commands.push((VERSION_COMMAND.to_string(), "Print the version number".to_string()));
            }
        }
        for child in self.visible_children(id) {
            let child = self.command(child);
            commands.push((child.name.clone(), child.short.trim().to_string()));
        }
        push_rows(&mut out, "Commands", commands);

        let mut local = cmd.flags.clone();
        local.extend_missing(&cmd.persistent_flags);
        if !local.contains(HELP_FLAG) {
            let short = if local.iter().any(|f| f.short_name() == Some('h')) {
                None
            } else {
                Some('h')
            };
            let mut help = Flag::bool(HELP_FLAG, "Help for this command");
            if let Some(c) = short {
                help = help.short(c);
            }
            local.add(help);
        }
        let mut global = self.inherited_flags(id);
        if self.version(id).is_some() && !local.contains(VERSION_FLAG) && !global.contains(VERSION_FLAG) {
            global.add(Flag::bool(VERSION_FLAG, "Version for this command"));
        }
        push_rows(&mut out, "Flags", flag_rows(&local));
        push_rows(&mut out, "Global Flags", flag_rows(&global));
        out
    }

    fn has_root_pseudo_commands(&self, id: CommandId) -> bool {
        self.is_root(id) && (self.help_command_name(id).is_some() || self.version(id).is_some())
    }
}

fn push_rows(out: &mut String, title: &str, rows: Vec<(String, String)>) {
    if rows.is_empty() {
        return;
    }
    out.push_str(&format!("\n{title}:\n"));
    let width = rows.iter().map(|(l, _)| l.len()).max().unwrap_or(0);
    for (left, help) in rows {
        if help.is_empty() {
            out.push_str(&format!("  {left}\n"));
        } else {
            out.push_str(&format!("  {left:width$}  {help}\n"));
        }
    }
}

/// Visible flags sorted by long name.
fn flag_rows(flags: &FlagSet) -> Vec<(String, String)> {
    let mut visible: Vec<&Flag> = flags.iter().filter(|f| !f.is_hidden()).collect();
    visible.sort_by(|a, b| a.name().cmp(b.name()));
    visible
        .into_iter()
        .map(|f| (flag_left(f), flag_help(f)))
        .collect()
}

fn flag_left(flag: &Flag) -> String {
    let mut out = match flag.short_name() {
        Some(c) => format!("-{c}, {}", flag.long()),
        None => format!("    {}", flag.long()),
    };
    let type_name = match flag.annotation(VALUE_TYPE_ANNOTATION) {
        Some(name) => Some(name.to_string()),
        None if flag.kind() == ValueKind::Bool => None,
        None => Some(flag.kind().name().to_string()),
    };
    if let Some(type_name) = type_name {
        out.push(' ');
        out.push_str(&type_name);
    }
    out
}

fn flag_help(flag: &Flag) -> String {
    let mut notes = Vec::new();
    if let Some(message) = flag.deprecation() {
        notes.push(format!("(deprecated: {message})"));
    }
    if flag.is_required() {
        notes.push("(required)".to_string());
    }
    if let Some(default) = default_note(flag) {
        notes.push(format!("(default: {default})"));
    }
    let description = flag.description().trim();
    if description.is_empty() {
        return notes.join(" ");
    }
    if notes.is_empty() {
        return description.to_string();
    }
    format!("{description} {}", notes.join(" "))
}

/// How a default is shown, or `None` for defaults not worth showing.
fn default_note(flag: &Flag) -> Option<String> {
    match flag.default_value() {
        DefaultValue::Bool(v) => v.then(|| "true".to_string()),
        DefaultValue::String(s) if s.is_empty() => None,
        DefaultValue::String(s) => Some(format!("{s:?}")),
        DefaultValue::Duration(d) if d.as_millis() == 0 => None,
        DefaultValue::Int32(0) if flag.kind() == ValueKind::Count => None,
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;
    use argot_argparse::Millis;

    fn tree() -> CommandTree {
        CommandTree::new(
            Command::new("app")
                .short("Manage services")
                .version("1.4.2")
                .persistent_flag(Flag::bool("verbose", "Verbose output").short('v'))
                .subcommand(
                    Command::new("serve")
                        .short("Run the server")
                        .example("app serve --port 80\napp serve --timeout 5s")
                        .flag(Flag::new("port", 8080i32, "Listen port").short('p'))
                        .flag(Flag::string("name", "", "Instance name").required())
                        .flag(Flag::string("mode", "fast", "Mode").deprecated("use --profile"))
                        .flag(Flag::new("timeout", Millis(0), "Timeout"))
                        .flag(Flag::count("level", "Log level"))
                        .flag(Flag::bool("secret", "Hidden").hidden())
                        .action(|_| 0),
                )
                .subcommand(Command::new("debug").hidden().action(|_| 0)),
        )
    }

    #[test]
    fn root_help_lists_pseudo_commands() {
        let tree = tree();
        let text = tree.help_text(tree.root());
        let expected = concat!(
            "Usage: app [command] [flags]\n",
            "\n",
            "Manage services\n",
            "\n",
            "Commands:\n",
            "  help     Help about any command\n",
            "  version  Print the version number\n",
            "  serve    Run the server\n",
            "\n",
            "Flags:\n",
            "  -h, --help     Help for this command\n",
            "  -v, --verbose  Verbose output\n",
            "\n",
            "Global Flags:\n",
            "      --version  Version for this command\n",
        );
        assert_eq!(text, expected);
    }

    #[test]
    fn leaf_help_shows_flag_details() {
        let tree = tree();
        let serve = tree.find(&["serve"]).unwrap();
        let text = tree.help_text(serve);
        assert!(text.starts_with("Usage: app serve [flags]\n\nRun the server\n"));
        assert!(text.contains("\nExamples:\n  app serve --port 80\n  app serve --timeout 5s\n"));
        assert!(text.contains("--name string"));
        assert!(text.contains("Instance name (required)"));
        assert!(text.contains("Mode (deprecated: use --profile) (default: \"fast\")"));
        assert!(text.contains("Listen port (default: 8080)"));
        let row = |flag: &str| {
            text.lines()
                .find(|l| l.trim_start().starts_with('-') && l.contains(flag))
                .map(|l| l.split_whitespace().collect::<Vec<_>>().join(" "))
                .unwrap_or_default()
        };
        assert_eq!(row("--level"), "--level count Log level");
        assert_eq!(row("--timeout"), "--timeout duration Timeout");
        assert_eq!(row("--port"), "-p, --port int Listen port (default: 8080)");
        assert!(!text.contains("secret"));
        assert!(text.contains("\nGlobal Flags:\n"));
        assert!(text.contains("-v, --verbose"));
    }

    #[test]
    fn version_text_uses_the_root_name() {
        let tree = tree();
        let serve = tree.find(&["serve"]).unwrap();
        assert_eq!(tree.version_text(serve).as_deref(), Some("app 1.4.2"));
        let bare = CommandTree::new(Command::new("x"));
        assert_eq!(bare.version_text(bare.root()), None);
    }
}
