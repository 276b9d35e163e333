//! Config-file and environment values.
//!
//! Precedence, highest first: command line, environment, config file,
//! declared default. The first three are stored in [`Matches`]; this module
//! only decides what goes into the external slots.

use std::collections::HashMap;
use std::path::PathBuf;

use argot_argparse::{FlagSet, Matches};
use indexmap::IndexMap;

use crate::error::Error;
use crate::tree::{CommandId, CommandTree};

/// Where environment variables are read from.
#[derive(Debug, Clone, Default)]
pub enum Env {
    /// The process environment.
    #[default]
    Process,
    /// A fixed set of variables.
    Fixed(Vec<(String, String)>),
}

impl Env {
    pub fn fixed<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::Fixed(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn var(&self, key: &str) -> Option<String> {
        match self {
            Self::Process => std::env::var(key).ok(),
            Self::Fixed(pairs) => pairs
                .iter()
                .rev()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone()),
        }
    }
}

/// Config path for `id`: the config flag's value if it has one, else the
/// fixed path.
fn config_path(tree: &CommandTree, id: CommandId, matches: &Matches) -> Option<PathBuf> {
    let from_flag = tree
        .inherited(id, |c| c.settings.config_file_flag.clone())
        .and_then(|flag| matches.raw(&flag))
        .filter(|path| !path.is_empty())
        .map(PathBuf::from);
    from_flag.or_else(|| tree.inherited(id, |c| c.settings.config_file.clone()))
}

/// Config keys accepted for each flag: `--name`, `name`, `name` with dashes
/// as underscores, `name` with dashes as dots, and the variable name.
fn config_keys(flags: &FlagSet) -> HashMap<String, String> {
    let mut keys = HashMap::new();
    for flag in flags {
        let name = flag.name();
        keys.insert(flag.long(), name.to_string());
        keys.insert(name.to_string(), name.to_string());
        keys.insert(name.replace('-', "_"), name.to_string());
        keys.insert(name.replace('-', "."), name.to_string());
        if let Some(var) = flag.variable_name().filter(|v| !v.is_empty()) {
            keys.insert(var.to_string(), name.to_string());
        }
    }
    keys
}

/// Merge config and environment values for `id` into `matches`.
pub(crate) fn apply(
    tree: &CommandTree,
    id: CommandId,
    matches: &mut Matches,
    env: &Env,
) -> Result<(), Error> {
    let mut scalars: IndexMap<String, String> = IndexMap::new();
    let mut multi: IndexMap<String, Vec<String>> = IndexMap::new();

    if let Some(path) = config_path(tree, id, matches) {
        let flat = argot_config::read(&path)?;
        let keys = config_keys(&tree.effective_flags(id));
        for (key, value) in flat.scalars {
            if let Some(name) = keys.get(&key) {
                scalars.insert(name.clone(), value);
            }
        }
        for (key, values) in flat.multi {
            if values.is_empty() {
                continue;
            }
            if let Some(name) = keys.get(&key) {
                scalars.shift_remove(name);
                multi.insert(name.clone(), values);
            }
        }
        tracing::debug!(
            path = %path.display(),
            scalars = scalars.len(),
            multi = multi.len(),
            "mapped config values onto flags"
        );
    }

    for (flag, var) in tree.env_bindings(id) {
        if var.is_empty() {
            continue;
        }
        let Some(value) = env.var(&var).filter(|v| !v.is_empty()) else {
            continue;
        };
        tracing::trace!(flag = %flag, var = %var, "flag value from environment");
        multi.shift_remove(&flag);
        scalars.insert(flag, value);
    }

    if !multi.is_empty() {
        matches.set_external_multi_values(multi)?;
    }
    if !scalars.is_empty() {
        matches.set_external_values(scalars)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    use crate::command::Command;
    use argot_argparse::{Flag, ParseError};

    fn temp_dir(test: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("argot-external-{test}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn parsed(tree: &CommandTree, args: &[&str]) -> Matches {
        let id = tree.root();
        argot_argparse::parse(args, &tree.effective_flags(id), &tree.parser_options(id))
    }

    #[test]
    fn config_keys_cover_every_spelling() {
        let flags: FlagSet = [
            Flag::string("log-level", "info", "level"),
            Flag::string("token", "", "api token").var_name("API_TOKEN"),
        ]
        .into_iter()
        .collect();
        let keys = config_keys(&flags);
        for key in ["--log-level", "log-level", "log_level", "log.level"] {
            assert_eq!(keys.get(key).map(String::as_str), Some("log-level"), "{key}");
        }
        assert_eq!(keys.get("API_TOKEN").map(String::as_str), Some("token"));
    }

    #[test]
    fn env_beats_config_and_multi_replaces_scalar() {
        let dir = temp_dir("merge");
        let path = write(
            &dir,
            "merge.json",
            r#"{ "log": { "level": "debug" }, "tags": ["a", "b"], "port": 81 }"#,
        );
        let tree = CommandTree::new(
            Command::new("app")
                .flag(Flag::string("log-level", "info", "level"))
                .flag(Flag::string("tags", "", "tags"))
                .flag(Flag::new("port", 80i32, "port"))
                .bind_env("port", "APP_PORT")
                .config_file(&path),
        );
        let env = Env::fixed([("APP_PORT", "8443")]);

        let mut matches = parsed(&tree, &[]);
        apply(&tree, tree.root(), &mut matches, &env).unwrap();
        assert_eq!(matches.get::<String>("log-level").as_deref(), Some("debug"));
        assert_eq!(matches.values("tags"), vec!["a", "b"]);
        assert_eq!(matches.get::<i32>("port"), Some(8443));

        let mut matches = parsed(&tree, &["--port", "9"]);
        apply(&tree, tree.root(), &mut matches, &env).unwrap();
        assert_eq!(matches.get::<i32>("port"), Some(9));

        std::fs::remove_dir_all(&dir).unwrap();
        assert!(!dir.exists());
    }

    #[test]
    fn empty_env_values_are_ignored() {
        let tree = CommandTree::new(
            Command::new("app")
                .flag(Flag::string("name", "anon", "name"))
                .bind_env("name", "APP_NAME"),
        );
        let mut matches = parsed(&tree, &[]);
        apply(&tree, tree.root(), &mut matches, &Env::fixed([("APP_NAME", "")])).unwrap();
        assert!(!matches.has_value("name"));
        assert_eq!(matches.get::<String>("name").as_deref(), Some("anon"));
    }

    #[test]
    fn config_flag_wins_over_fixed_path() {
        let dir = temp_dir("config-flag");
        let fixed = write(&dir, "fixed.env", "name=fixed\n");
        let chosen = write(&dir, "chosen.toml", "name = \"chosen\"\n");
        let tree = CommandTree::new(
            Command::new("app")
                .flag(Flag::string("name", "", "name"))
                .flag(Flag::string("config", "", "config file"))
                .config_file(&fixed)
                .config_file_flag("config"),
        );

        let mut matches = parsed(&tree, &[]);
        apply(&tree, tree.root(), &mut matches, &Env::fixed::<_, String, String>([])).unwrap();
        assert_eq!(matches.get::<String>("name").as_deref(), Some("fixed"));

        let config = chosen.display().to_string();
        let mut matches = parsed(&tree, &["--config", &config]);
        apply(&tree, tree.root(), &mut matches, &Env::fixed::<_, String, String>([])).unwrap();
        assert_eq!(matches.get::<String>("name").as_deref(), Some("chosen"));

        std::fs::remove_dir_all(&dir).unwrap();
        assert!(!dir.exists());
    }

    #[test]
    fn bad_values_and_missing_files_are_errors() {
        let tree = CommandTree::new(
            Command::new("app")
                .flag(Flag::new("port", 80i32, "port"))
                .bind_env("port", "APP_PORT"),
        );
        let mut matches = parsed(&tree, &[]);
        let err = apply(&tree, tree.root(), &mut matches, &Env::fixed([("APP_PORT", "http")]))
            .unwrap_err();
        assert!(matches!(err, Error::Parse(ParseError::InvalidValue { .. })));

        let tree = CommandTree::new(Command::new("app").config_file("/nonexistent/argot.yaml"));
        let mut matches = parsed(&tree, &[]);
        let err = apply(&tree, tree.root(), &mut matches, &Env::Process).unwrap_err();
        assert_eq!(
            err.to_string(),
            "failed to open config file: /nonexistent/argot.yaml"
        );
    }
}
