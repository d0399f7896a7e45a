//! HTTP surface for a folio site.
//!
//! Every request first tries the public asset directory; anything that is
//! not an asset is handed to [`Site::render`], which resolves it against the
//! catalog and always produces a full HTML page.

mod live_reload;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use axum::{
    Router,
    extract::State,
    http::{StatusCode, Uri},
    response::{Html, IntoResponse, Response},
    routing::{MethodRouter, get},
};
use folio_core::{Site, SiteConfig};
use tokio::sync::broadcast;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

pub use live_reload::{LIVE_RELOAD_PATH, inject_livereload_script};

/// Configuration for the documentation server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to serve on
    pub port: u16,
    /// Catalog of markdown files
    pub content_dir: PathBuf,
    /// Static assets served as-is
    pub public_dir: PathBuf,
    /// Page templates
    pub templates_dir: PathBuf,
    pub site: SiteConfig,
    /// Auto-open browser
    pub open: bool,
    /// Reload open pages when the catalog or templates change
    pub live_reload: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            content_dir: PathBuf::from("./catalog"),
            public_dir: PathBuf::from("./public"),
            templates_dir: PathBuf::from("./public/templates"),
            site: SiteConfig::default(),
            open: false,
            live_reload: false,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    site: Arc<Site>,
    public_dir: PathBuf,
    reload_tx: Option<broadcast::Sender<String>>,
}

impl AppState {
    pub fn new<P: AsRef<Path>>(site: Site, public_dir: P) -> Self {
        Self {
            site: Arc::new(site),
            public_dir: public_dir.as_ref().to_path_buf(),
            reload_tx: None,
        }
    }

    pub fn with_live_reload(mut self, reload_tx: broadcast::Sender<String>) -> Self {
        self.reload_tx = Some(reload_tx);
        self
    }
}

/// Build the router: live reload socket (when enabled), then public assets,
/// then the catch-all page handler.
pub fn app(state: AppState) -> Router {
    let pages: MethodRouter = get(page_handler).with_state(state.clone());
    let assets = ServeDir::new(&state.public_dir)
        .append_index_html_on_directories(false)
        .fallback(pages);

    let mut router = Router::new();
    if state.reload_tx.is_some() {
        router = router.route(LIVE_RELOAD_PATH, get(live_reload::websocket_handler));
    }

    router
        .fallback_service(assets)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn page_handler(State(state): State<AppState>, uri: Uri) -> Response {
    let site = Arc::clone(&state.site);
    let path = uri.path().to_string();

    // Rendering walks the catalog and reads templates from disk
    let page = match tokio::task::spawn_blocking(move || site.render(&path)).await {
        Ok(page) => page,
        Err(e) => {
            error!("render task failed for {}: {e}", uri.path());
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html("<h1>500 Server Error</h1>".to_string()),
            )
                .into_response();
        }
    };

    let status =
        StatusCode::from_u16(page.outcome.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = if state.reload_tx.is_some() {
        inject_livereload_script(&page.body)
    } else {
        page.body
    };

    (status, Html(body)).into_response()
}

/// The documentation server
pub struct Server {
    config: ServerConfig,
}

impl Server {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    pub async fn run(self) -> Result<()> {
        let config = self.config;

        if !config.content_dir.is_dir() {
            return Err(anyhow::anyhow!(
                "Content directory does not exist: {}",
                config.content_dir.display()
            ));
        }
        if !config.templates_dir.is_dir() {
            warn!(
                "templates directory {} is missing; every page will be an error page",
                config.templates_dir.display()
            );
        }

        let site = Site::new(&config.content_dir, &config.templates_dir, config.site.clone());
        let mut state = AppState::new(site, &config.public_dir);

        if config.live_reload {
            let (reload_tx, _) = broadcast::channel::<String>(100);
            state = state.with_live_reload(reload_tx.clone());

            let watch_paths = vec![config.content_dir.clone(), config.templates_dir.clone()];
            tokio::spawn(async move {
                if let Err(e) = live_reload::start_file_watcher(watch_paths, reload_tx).await {
                    warn!("file watcher stopped: {e}");
                }
            });
        }

        let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port)).await?;
        let addr = listener.local_addr()?;
        let url = format!("http://{addr}");

        info!("Server is running on {url}");
        info!("Serving files from {}", config.content_dir.display());
        if config.live_reload {
            info!("Live reload enabled at ws://{addr}{LIVE_RELOAD_PATH}");
        }

        if config.open {
            if let Err(e) = open::that(&url) {
                warn!("Failed to open browser: {e}");
            }
        }

        axum::serve(listener, app(state)).await?;

        Ok(())
    }
}
