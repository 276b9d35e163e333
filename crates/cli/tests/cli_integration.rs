use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

fn make_temp_dir(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before UNIX_EPOCH")
        .as_nanos();
    let pid = std::process::id();
    let dir = std::env::temp_dir().join(format!("argot-integ-{prefix}-{pid}-{nanos}"));
    fs::create_dir_all(&dir).expect("failed to create temp dir");
    dir
}

fn argot_demo() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_argot-demo"));
    cmd.env_remove("DEMO_NAME").env_remove("RUST_LOG");
    cmd
}

fn run(args: &[&str]) -> Output {
    argot_demo()
        .args(args)
        .output()
        .expect("failed to run argot-demo")
}

fn stdout(out: &Output) -> String {
    String::from_utf8_lossy(&out.stdout).into_owned()
}

fn stderr(out: &Output) -> String {
    String::from_utf8_lossy(&out.stderr).into_owned()
}

#[test]
fn help_works() {
    let out = run(&["--help"]);
    assert!(
        out.status.success(),
        "argot-demo --help failed:\nstatus: {}\nstderr:\n{}",
        out.status,
        stderr(&out),
    );
    let text = stdout(&out);
    assert!(text.starts_with("Usage: argot-demo [command] [flags]\n"), "{text}");
    for expected in ["greet", "echo", "help", "version", "--config"] {
        assert!(text.contains(expected), "missing {expected:?} in:\n{text}");
    }
    assert!(!text.contains("__complete"));
}

#[test]
fn greet_prints_the_name() {
    let out = run(&["greet", "--name=Ada"]);
    assert!(out.status.success(), "stderr:\n{}", stderr(&out));
    assert_eq!(stdout(&out), "Hello, Ada\n");

    let out = run(&["greet", "-n", "Ada", "--shout", "--times", "2"]);
    assert_eq!(stdout(&out), "HELLO, ADA\nHELLO, ADA\n");
}

#[test]
fn greet_without_name_fails_with_usage() {
    let out = run(&["greet"]);
    assert_eq!(out.status.code(), Some(1));
    let err = stderr(&out);
    assert!(err.contains("required flag not set: --name"), "{err}");
    assert!(err.contains("Usage: argot-demo greet [flags]"), "{err}");
    assert!(stdout(&out).is_empty());
}

#[test]
fn name_can_come_from_env_or_config() {
    let out = argot_demo()
        .args(["greet"])
        .env("DEMO_NAME", "Grace")
        .output()
        .expect("failed to run argot-demo");
    assert!(out.status.success(), "stderr:\n{}", stderr(&out));
    assert_eq!(stdout(&out), "Hello, Grace\n");

    let dir = make_temp_dir("config");
    let config = dir.join("demo.yaml");
    fs::write(&config, "name: Linus\ntimes: 2\n").expect("failed to write config");
    let config = config.display().to_string();

    let out = run(&["greet", "--config", &config]);
    assert!(out.status.success(), "stderr:\n{}", stderr(&out));
    assert_eq!(stdout(&out), "Hello, Linus\nHello, Linus\n");

    let out = run(&["greet", "--config", &config, "--name", "Ada", "--times=1"]);
    assert_eq!(stdout(&out), "Hello, Ada\n");

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn action_errors_are_reported() {
    let out = run(&["greet", "--name", "Ada", "--times", "0"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr(&out).starts_with("Error: --times must be positive, got 0\n"));
}

#[test]
fn unknown_command_suggests_alternatives() {
    let out = run(&["gret"]);
    assert_eq!(out.status.code(), Some(1));
    let err = stderr(&out);
    assert!(err.contains("unknown command \"gret\" for \"argot-demo\""), "{err}");
    assert!(err.contains("Did you mean this?\n  greet\n"), "{err}");
    assert!(err.contains("Run 'argot-demo --help' for usage."), "{err}");
}

#[test]
fn echo_joins_arguments() {
    let out = run(&["say", "-s", ",", "a", "b", "c"]);
    assert!(out.status.success(), "stderr:\n{}", stderr(&out));
    assert_eq!(stdout(&out), "a,b,c\n");

    let out = run(&["echo"]);
    assert!(stderr(&out).starts_with("Error: requires at least 1 arg(s), only received 0\n"));
}

#[test]
fn echo_reports_argument_count_when_verbose() {
    let out = run(&["-v", "echo", "a", "b"]);
    assert!(out.status.success(), "stderr:\n{}", stderr(&out));
    assert_eq!(stdout(&out), "a b\n");
    assert_eq!(stderr(&out), "echoing 2 argument(s)\n");

    let out = run(&["echo", "a", "b"]);
    assert!(stderr(&out).is_empty(), "{}", stderr(&out));
}

#[test]
fn version_is_printed() {
    let expected = format!("argot-demo {}\n", env!("CARGO_PKG_VERSION"));
    assert_eq!(stdout(&run(&["version"])), expected);
    assert_eq!(stdout(&run(&["--version"])), expected);
}

#[test]
fn completion_protocol() {
    let out = run(&["__complete", "gr"]);
    assert!(out.status.success(), "stderr:\n{}", stderr(&out));
    assert_eq!(stdout(&out), "greet\tSay hello\n:4\n");

    let out = run(&["__completeNoDesc", "greet", "--config", ""]);
    assert_eq!(stdout(&out), "json\nyaml\nyml\ntoml\nenv\n:8\n");
}
