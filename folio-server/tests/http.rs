use std::fs;
use std::path::{Path, PathBuf};

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use folio_core::{Site, SiteConfig};
use folio_server::{AppState, LIVE_RELOAD_PATH, app};
use pretty_assertions::assert_eq;
use tempfile::TempDir;
use tokio::sync::broadcast;
use tower::ServiceExt; // for `oneshot`

struct Fixture {
    _dir: TempDir,
    content: PathBuf,
    public: PathBuf,
}

/// A small catalog next to a public directory holding the bundled templates.
fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let content = dir.path().join("catalog");
    let public = dir.path().join("public");

    fs::create_dir_all(content.join("guide")).unwrap();
    fs::write(content.join("intro.md"), "# Intro\n\nWelcome.").unwrap();
    fs::write(content.join("guide/setup.md"), "# Setup\n\n```rust\nfn main() {}\n```").unwrap();
    fs::write(content.join("guide/notes.txt"), "plain text").unwrap();

    fs::create_dir_all(public.join("css")).unwrap();
    fs::write(public.join("css/style.css"), "body { margin: 0; }").unwrap();

    let bundled = Path::new(env!("CARGO_MANIFEST_DIR")).join("../public/templates");
    fs::create_dir_all(public.join("templates")).unwrap();
    for name in ["base.html", "directory.html", "markdown.html"] {
        fs::copy(bundled.join(name), public.join("templates").join(name)).unwrap();
    }

    Fixture {
        _dir: dir,
        content,
        public,
    }
}

fn router(fx: &Fixture) -> Router {
    let site = Site::new(&fx.content, fx.public.join("templates"), SiteConfig::default());
    app(AppState::new(site, &fx.public))
}

async fn get(app: Router, uri: &str) -> (StatusCode, Option<String>, String) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .map(|value| value.to_str().unwrap().to_string());
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();

    (status, content_type, String::from_utf8(body.to_vec()).unwrap())
}

#[tokio::test]
async fn test_root_lists_catalog() {
    let fx = fixture();
    let (status, content_type, body) = get(router(&fx), "/").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("text/html; charset=utf-8"));
    assert!(body.contains("<title>Directory: / | Folio</title>"));
    assert!(body.contains(r#"<a class="dir" href="/guide">📁 guide</a>"#));
    assert!(body.contains(r#"<a class="doc" href="/intro">📄 intro</a>"#));
    assert!(body.contains(r#"<ul class="sidebar-menu">"#));
}

#[tokio::test]
async fn test_document_with_and_without_extension() {
    let fx = fixture();

    for uri in ["/guide/setup", "/guide/setup.md"] {
        let (status, _, body) = get(router(&fx), uri).await;
        assert_eq!(status, StatusCode::OK, "{uri}");
        assert!(body.contains("<title>setup | Folio</title>"));
        assert!(body.contains("<h1>Setup</h1>"));
    }

    let (_, _, body) = get(router(&fx), "/guide/setup").await;
    assert!(body.contains(r#"<li class="file active"><a href="/guide/setup">"#));
}

#[tokio::test]
async fn test_missing_page_is_not_found() {
    let fx = fixture();
    let (status, _, body) = get(router(&fx), "/guide/missing").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("404 Not Found"));
    assert!(body.contains("Requested path: <code>/guide/missing</code>"));
    // navigation still works on error pages
    assert!(body.contains(r#"<a href="/intro">"#));
}

#[tokio::test]
async fn test_non_markdown_file_is_bad_request() {
    let fx = fixture();
    let (status, _, body) = get(router(&fx), "/guide/notes.txt").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("400 Invalid File Type"));
    assert!(!body.contains("plain text"));
}

#[tokio::test]
async fn test_traversal_is_bad_request() {
    let fx = fixture();
    let (status, _, _) = get(router(&fx), "/guide/%2E%2E/%2E%2E/secret").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_public_assets_take_precedence() {
    let fx = fixture();
    let (status, content_type, body) = get(router(&fx), "/css/style.css").await;

    assert_eq!(status, StatusCode::OK);
    assert!(content_type.unwrap().starts_with("text/css"));
    assert_eq!(body, "body { margin: 0; }");
}

#[tokio::test]
async fn test_public_directory_falls_through_to_catalog() {
    let fx = fixture();
    // `css` exists in public but not in the catalog
    let (status, _, body) = get(router(&fx), "/css").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("404 Not Found"));
}

#[tokio::test]
async fn test_broken_template_is_server_error() {
    let fx = fixture();
    fs::write(fx.public.join("templates/markdown.html"), "{{#if (type ===)}}").unwrap();

    let (status, _, body) = get(router(&fx), "/intro").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.contains("500 Server Error"));
    assert!(body.contains("markdown.html"));
}

#[tokio::test]
async fn test_live_reload_script_is_injected() {
    let fx = fixture();
    let site = Site::new(&fx.content, fx.public.join("templates"), SiteConfig::default());
    let (reload_tx, _) = broadcast::channel(4);
    let app = app(AppState::new(site, &fx.public).with_live_reload(reload_tx));

    let (status, _, body) = get(app, "/intro").await;

    assert_eq!(status, StatusCode::OK);
    let script_at = body.find(LIVE_RELOAD_PATH).unwrap();
    assert!(script_at < body.rfind("</body>").unwrap());
}

#[tokio::test]
async fn test_no_live_reload_route_by_default() {
    let fx = fixture();
    let (status, _, body) = get(router(&fx), LIVE_RELOAD_PATH).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(!body.contains("<script>\n(function()"));
}
