use std::cell::RefCell;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use argot::{Command, CommandTree, Env, Flag, Resolution, Value, WalkMode, shared};

fn make_temp_dir(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before UNIX_EPOCH")
        .as_nanos();
    let pid = std::process::id();
    let dir = std::env::temp_dir().join(format!("argot-{prefix}-{pid}-{nanos}"));
    fs::create_dir_all(&dir).expect("failed to create temp dir");
    dir
}

struct Output {
    code: i32,
    stdout: String,
    stderr: String,
}

fn run(tree: &CommandTree, args: &[&str], env: &Env) -> Output {
    let mut out = Vec::new();
    let mut err = Vec::new();
    let code = tree.execute_with(args, env, &mut out, &mut err);
    Output {
        code,
        stdout: String::from_utf8_lossy(&out).into_owned(),
        stderr: String::from_utf8_lossy(&err).into_owned(),
    }
}

fn no_env() -> Env {
    Env::fixed::<_, String, String>([])
}

/// A `serve` command that prints the winning port and host.
fn server_tree(config: Option<PathBuf>) -> CommandTree {
    let mut root = Command::new("app").persistent_flag(Flag::string("host", "localhost", "Bind host"));
    if let Some(path) = config {
        root = root.config_file(path);
    }
    CommandTree::new(
        root.subcommand(
            Command::new("serve")
                .flag(Flag::new("port", 80i32, "Listen port").short('p'))
                .bind_env("port", "APP_PORT")
                .bind_env("host", "APP_HOST")
                .try_action(|ctx| {
                    let port: i32 = ctx.get("port").unwrap_or_default();
                    let host: String = ctx.get("host").unwrap_or_default();
                    writeln!(ctx.out(), "{host}:{port}")?;
                    Ok(())
                }),
        ),
    )
}

#[test]
fn command_line_beats_env_beats_config_beats_default() {
    let dir = make_temp_dir("precedence");
    let config = dir.join("app.toml");
    fs::write(&config, "port = 7000\nhost = \"config.local\"\n").unwrap();

    let bare = server_tree(None);
    assert_eq!(run(&bare, &["serve"], &no_env()).stdout, "localhost:80\n");

    let tree = server_tree(Some(config));
    assert_eq!(run(&tree, &["serve"], &no_env()).stdout, "config.local:7000\n");

    let env = Env::fixed([("APP_PORT", "7500")]);
    assert_eq!(run(&tree, &["serve"], &env).stdout, "config.local:7500\n");

    let out = run(&tree, &["serve", "-p", "9000", "--host", "cli.local"], &env);
    assert_eq!(out.code, 0, "{}", out.stderr);
    assert_eq!(out.stdout, "cli.local:9000\n");

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn bad_environment_value_fails_with_usage() {
    let tree = server_tree(None);
    let out = run(&tree, &["serve"], &Env::fixed([("APP_PORT", "eighty")]));
    assert_eq!(out.code, 1);
    assert!(out.stderr.starts_with("Error: invalid argument \"eighty\""), "{}", out.stderr);
    assert!(out.stderr.ends_with("Usage: app serve [flags]\n"));
}

#[test]
fn execution_and_completion_resolve_the_same_command() {
    let tree = CommandTree::new(
        Command::new("app")
            .persistent_flag(Flag::string("output", "", "Output").short('o'))
            .subcommand(
                Command::new("remote")
                    .subcommand(Command::new("add").action(|_| 0))
                    .subcommand(Command::new("remove").action(|_| 0)),
            ),
    );
    let inputs: [&[&str]; 3] = [
        &["remote", "add", "origin"],
        &["-o", "json", "remote", "add"],
        &["remote", "--output=json", "remove", "x"],
    ];
    for args in inputs {
        let executed = tree.resolve(args, WalkMode::Execute);
        let completed = tree.resolve(args, WalkMode::Complete);
        assert_eq!(executed, completed, "{args:?}");
        let Resolution::Command { id, .. } = executed else {
            panic!("expected a command for {args:?}");
        };
        assert!(tree.command_path(id).starts_with("app remote "), "{args:?}");
    }
}

#[test]
fn flag_groups_are_enforced_along_the_lineage() {
    let tree = CommandTree::new(
        Command::new("app")
            .persistent_flag(Flag::bool("json", "JSON output"))
            .persistent_flag(Flag::bool("yaml", "YAML output"))
            .mark_flags_mutually_exclusive(&["json", "yaml"])
            .subcommand(
                Command::new("login")
                    .flag(Flag::string("user", "", "User"))
                    .flag(Flag::string("password", "", "Password"))
                    .flag(Flag::string("token", "", "Token"))
                    .mark_flags_required_together(&["user", "password"])
                    .mark_flags_one_required(&["user", "token"])
                    .action(|_| 0),
            ),
    );

    let out = run(&tree, &["login", "--token", "t", "--json", "--yaml"], &no_env());
    assert!(out.stderr.starts_with("Error: flags are mutually exclusive: json, yaml\n"));

    let out = run(&tree, &["login"], &no_env());
    assert!(out.stderr.starts_with(
        "Error: at least one of the flags in the group is required: user, token\n"
    ));

    let out = run(&tree, &["login", "--user", "ada"], &no_env());
    assert!(out.stderr.starts_with("Error: flags must be set together: user, password\n"));

    assert_eq!(run(&tree, &["login", "--user", "ada", "--password", "pw"], &no_env()).code, 0);
    assert_eq!(run(&tree, &["login", "--token", "t", "--json"], &no_env()).code, 0);
}

struct Level(u8);

impl Value for Level {
    fn type_name(&self) -> String {
        "level".into()
    }

    fn to_string(&self) -> String {
        ["low", "mid", "high"][usize::from(self.0.min(2))].into()
    }

    fn set(&mut self, raw: &str) -> Result<(), String> {
        self.0 = match raw {
            "low" => 0,
            "mid" => 1,
            "high" => 2,
            other => return Err(format!("unknown level {other:?}")),
        };
        Ok(())
    }
}

#[test]
fn bound_values_receive_explicit_occurrences() {
    let level = shared(Level(0));
    let seen = Rc::new(RefCell::new(String::new()));
    let tree = CommandTree::new(
        Command::new("app").subcommand(
            Command::new("tune")
                .value_flag("level", level.clone(), "Tuning level")
                .action({
                    let level = level.clone();
                    let seen = seen.clone();
                    move |_| {
                        *seen.borrow_mut() = Value::to_string(&*level.borrow());
                        0
                    }
                }),
        ),
    );

    let help = run(&tree, &["tune", "--help"], &no_env()).stdout;
    assert!(help.contains("--level level"), "{help}");
    assert!(help.contains("(default: \"low\")"), "{help}");

    assert_eq!(run(&tree, &["tune", "--level", "high"], &no_env()).code, 0);
    assert_eq!(*seen.borrow(), "high");

    let out = run(&tree, &["tune", "--level", "max"], &no_env());
    assert_eq!(out.code, 1);
    assert!(out.stderr.starts_with(
        "Error: invalid argument \"max\" for \"--level\": unknown level \"max\"\n"
    ));
}

#[test]
fn actions_see_positionals_and_inherited_flags() {
    let seen = Rc::new(RefCell::new(Vec::<String>::new()));
    let tree = CommandTree::new(
        Command::new("app")
            .persistent_flag(Flag::count("verbose", "Verbosity").short('v'))
            .subcommand(
                Command::new("copy")
                    .args(argot::validators::range_args(1, 2))
                    .action({
                        let seen = seen.clone();
                        move |ctx| {
                            let mut seen = seen.borrow_mut();
                            seen.extend(ctx.args().iter().cloned());
                            seen.push(ctx.matches().count("verbose").to_string());
                            seen.push(ctx.command_path());
                            0
                        }
                    }),
            ),
    );
    let out = run(&tree, &["-vv", "copy", "a", "-v", "b"], &no_env());
    assert_eq!(out.code, 0, "{}", out.stderr);
    assert_eq!(*seen.borrow(), vec!["a", "b", "3", "app copy"]);

    let out = run(&tree, &["copy", "a", "b", "c"], &no_env());
    assert!(out.stderr.starts_with("Error: accepts between 1 and 2 arg(s), received 3\n"));
}

#[test]
fn completion_commands_answer_over_execute() {
    let mut tree = server_tree(None);
    tree.enable_completion();
    let out = run(&tree, &["__completeNoDesc", "serve", "--p"], &no_env());
    assert_eq!(out.code, 0);
    assert_eq!(out.stdout, "--port\n:4\n");

    // Hidden commands stay out of help.
    let help = run(&tree, &["--help"], &no_env()).stdout;
    assert!(!help.contains("__complete"));
}
