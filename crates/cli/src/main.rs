use anyhow::{Result, ensure};
use argot::{Command, CommandTree, Context, Flag, validators};
use tracing_subscriber::{EnvFilter, fmt};

fn main() {
    init_tracing();
    let mut tree = CommandTree::new(app());
    tree.enable_completion();
    std::process::exit(tree.run(std::env::args().skip(1)));
}

fn app() -> Command {
    Command::new("argot-demo")
        .short("Small command tree built with argot")
        .version(env!("CARGO_PKG_VERSION"))
        .persistent_flag(Flag::string("config", "", "Config file (json, yaml, toml or KEY=VALUE)"))
        .persistent_flag(Flag::count("verbose", "Increase verbosity").short('v'))
        .mark_flag_filename("config", &["json", "yaml", "yml", "toml", "env"])
        .config_file_flag("config")
        .subcommand(greet())
        .subcommand(echo())
}

fn greet() -> Command {
    Command::new("greet")
        .short("Say hello")
        .example("argot-demo greet --name Ada\nDEMO_NAME=Ada argot-demo greet --shout")
        .flag(Flag::string("name", "", "Who to greet").short('n').required())
        .flag(Flag::bool("shout", "Print in upper case"))
        .flag(Flag::new("times", 1i32, "How many greetings to print"))
        .bind_env("name", "DEMO_NAME")
        .args(validators::no_args())
        .try_action(greet_action)
}

fn greet_action(ctx: &mut Context<'_>) -> Result<()> {
    let name: String = ctx.get("name").unwrap_or_default();
    let times: i32 = ctx.get("times").unwrap_or(1);
    ensure!(times > 0, "--times must be positive, got {times}");

    let mut line = format!("Hello, {name}");
    if ctx.get::<bool>("shout").unwrap_or(false) {
        line = line.to_uppercase();
    }
    tracing::debug!(%name, times, "greeting");
    for _ in 0..times {
        writeln!(ctx.out(), "{line}")?;
    }
    Ok(())
}

fn echo() -> Command {
    Command::new("echo")
        .short("Print arguments")
        .alias("say")
        .flag(Flag::string("separator", " ", "Text placed between arguments").short('s'))
        .args(validators::minimum_n_args(1))
        .try_action(|ctx| {
            let separator: String = ctx.get("separator").unwrap_or_default();
            let line = ctx.args().join(&separator);
            if ctx.matches().count("verbose") > 0 {
                let count = ctx.args().len();
                writeln!(ctx.err(), "echoing {count} argument(s)")?;
            }
            writeln!(ctx.out(), "{line}")?;
            Ok(())
        })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
