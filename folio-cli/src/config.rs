use anyhow::Result;
use clap::ArgMatches;
use config::{Config as ConfigBuilder, Environment, File, Map};
use folio_core::SiteConfig;
use folio_core::markdown::is_known_theme;
use folio_server::ServerConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const DEFAULT_CONFIG_FILE: &str = "./folio.toml";

/// Complete configuration that merges CLI args, env vars, config files, and defaults
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct FolioConfig {
    pub paths: PathsConfig,
    pub server: ServeConfig,
    pub site: SiteConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Catalog of markdown files
    pub content: String,
    /// Static assets
    pub public: String,
    /// Page templates
    pub templates: String,
    /// Output directory for `folio build`
    pub output: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            content: "./catalog".to_string(),
            public: "./public".to_string(),
            templates: "./public/templates".to_string(),
            output: "./out".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServeConfig {
    pub host: String,
    pub port: u16,
    /// Open browser automatically
    pub open: bool,
    /// Live reload on catalog or template changes
    pub watch: bool,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            open: false,
            watch: false,
        }
    }
}

impl FolioConfig {
    /// Load configuration with cascading precedence:
    /// 1. CLI arguments (highest priority)
    /// 2. `PORT`
    /// 3. Environment variables (FOLIO_*)
    /// 4. Configuration file
    /// 5. Defaults (lowest priority)
    pub fn load(args: &ArgMatches) -> Result<Self> {
        let env: Map<String, String> = std::env::vars().collect();
        Self::load_with_env(args, env)
    }

    fn load_with_env(args: &ArgMatches, env: Map<String, String>) -> Result<Self> {
        let config_file = args
            .try_get_one::<String>("config")
            .unwrap_or(None)
            .cloned()
            .unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_string());

        let mut builder = ConfigBuilder::builder();

        // 1. Start with defaults
        let defaults = Self::default();
        builder = builder.add_source(ConfigBuilder::try_from(&defaults)?);

        // 2. Add configuration file if it exists
        if Path::new(&config_file).exists() {
            debug!("reading configuration from {config_file}");
            builder = builder.add_source(File::with_name(&config_file));
        }

        // 3. Environment variables with FOLIO_ prefix, `__` for nested keys
        let port = env.get("PORT").cloned();
        builder = builder.add_source(
            Environment::with_prefix("FOLIO")
                .prefix_separator("_")
                .separator("__")
                .source(Some(env)),
        );

        // 4. The bare PORT variable most hosts set
        if let Some(port) = port {
            match port.parse::<u16>() {
                Ok(port) => {
                    let mut from_env = HashMap::new();
                    from_env.insert("server.port".to_string(), port.to_string());
                    builder = builder.add_source(ConfigBuilder::try_from(&from_env)?);
                }
                Err(_) => warn!("ignoring PORT={port}: not a valid port"),
            }
        }

        // 5. Override with CLI arguments (highest priority)
        let mut cli_overrides = HashMap::new();

        for (arg, key) in [
            ("content", "paths.content"),
            ("public", "paths.public"),
            ("templates", "paths.templates"),
            ("output", "paths.output"),
            ("host", "server.host"),
            ("port", "server.port"),
        ] {
            // Only args defined for the running subcommand are present
            if let Some(value) = args.try_get_one::<String>(arg).unwrap_or(None) {
                cli_overrides.insert(key.to_string(), value.clone());
            }
        }
        for (flag, key) in [("open", "server.open"), ("watch", "server.watch")] {
            if args.try_get_one::<bool>(flag).unwrap_or(None) == Some(&true) {
                cli_overrides.insert(key.to_string(), "true".to_string());
            }
        }

        if !cli_overrides.is_empty() {
            builder = builder.add_source(ConfigBuilder::try_from(&cli_overrides)?);
        }

        // Build and deserialize
        let config = builder.build()?;
        let folio_config: FolioConfig = config.try_deserialize()?;

        if !is_known_theme(&folio_config.site.syntax_theme) {
            warn!(
                "unknown syntax theme `{}`; code blocks will not be highlighted",
                folio_config.site.syntax_theme
            );
        }

        Ok(folio_config)
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            host: self.server.host.clone(),
            port: self.server.port,
            content_dir: PathBuf::from(&self.paths.content),
            public_dir: PathBuf::from(&self.paths.public),
            templates_dir: PathBuf::from(&self.paths.templates),
            site: self.site.clone(),
            open: self.server.open,
            live_reload: self.server.watch,
        }
    }
}
