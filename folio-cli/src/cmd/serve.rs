use anyhow::Result;
use clap::{Arg, ArgAction, ArgMatches, Command};
use folio_server::Server;
use tracing::debug;

use crate::config::FolioConfig;

pub fn add_path_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("content")
                .short('c')
                .long("content")
                .value_name("DIR")
                .help("Directory of markdown files [default: ./catalog]"),
        )
        .arg(
            Arg::new("public")
                .short('p')
                .long("public")
                .value_name("DIR")
                .help("Static assets served as-is [default: ./public]"),
        )
        .arg(
            Arg::new("templates")
                .short('t')
                .long("templates")
                .value_name("DIR")
                .help("Page templates [default: ./public/templates]"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("FILE")
                .help("Configuration file [default: ./folio.toml]"),
        )
}

pub fn make_subcommand() -> Command {
    add_path_args(Command::new("serve"))
        .about("Serve the catalog as a documentation site")
        .arg(
            Arg::new("port")
                .long("port")
                .value_name("PORT")
                .help("Port to serve on [default: $PORT or 3000]"),
        )
        .arg(
            Arg::new("host")
                .long("host")
                .value_name("HOST")
                .help("Host to bind to [default: 127.0.0.1]"),
        )
        .arg(
            Arg::new("open")
                .long("open")
                .help("Open browser automatically")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("watch")
                .short('w')
                .long("watch")
                .help("Reload open pages when the catalog or templates change")
                .action(ArgAction::SetTrue),
        )
}

pub async fn execute(args: &ArgMatches) -> Result<()> {
    // Load cascading configuration
    let config = FolioConfig::load(args)?;
    debug!("{config:#?}");

    Server::new(config.server_config()).run().await
}
