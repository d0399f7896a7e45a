mod cmd {
    pub mod build;
    pub mod serve;
}
mod config;

use anyhow::Result;
use clap::{Arg, ArgAction, Command};
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    Command::new("folio")
        .about("Serve a folder of markdown files as a documentation site")
        .version(env!("CARGO_PKG_VERSION"))
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Log at info level regardless of RUST_LOG")
                .global(true)
                .action(ArgAction::SetTrue),
        )
        .subcommand(cmd::serve::make_subcommand())
        .subcommand(cmd::build::make_subcommand())
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();

    // --verbose enables INFO level, otherwise use RUST_LOG or default to WARN
    let filter = if matches.get_flag("verbose") {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match matches.subcommand() {
        Some(("serve", args)) => cmd::serve::execute(args).await,
        Some(("build", args)) => {
            let args = args.clone();
            tokio::task::spawn_blocking(move || cmd::build::execute(&args)).await?
        }
        Some((name, _)) => anyhow::bail!("unknown command `{name}`"),
        None => anyhow::bail!("no command given"),
    }
}
