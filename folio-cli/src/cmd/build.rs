use anyhow::Result;
use clap::{Arg, ArgMatches, Command};
use folio_core::{Site, export_site};
use std::path::Path;
use tracing::{info, warn};

use crate::cmd::serve::add_path_args;
use crate::config::FolioConfig;

pub fn make_subcommand() -> Command {
    add_path_args(Command::new("build"))
        .about("Render every page of the catalog into a static site")
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("DIR")
                .help("Output directory for generated site [default: ./out]"),
        )
}

pub fn execute(args: &ArgMatches) -> Result<()> {
    // Load cascading configuration
    let config = FolioConfig::load(args)?;
    let paths = &config.paths;

    let content_dir = Path::new(&paths.content);
    if !content_dir.is_dir() {
        anyhow::bail!("Content directory does not exist: {}", content_dir.display());
    }

    let site = Site::new(content_dir, &paths.templates, config.site.clone());
    let report = export_site(&site, &paths.public, &paths.output)?;

    for (route, outcome) in &report.failures {
        warn!("{route} was written as an error page ({})", outcome.status_code());
    }
    info!("Site built successfully in {}", paths.output);

    if !report.failures.is_empty() {
        anyhow::bail!("{} pages failed to render", report.failures.len());
    }

    Ok(())
}
