//! Page composition: one request path in, one complete HTML page out.

use std::error::Error;
use std::path::{Path, PathBuf};

use percent_encoding::percent_decode_str;
use tracing::{debug, error};

use crate::config::SiteConfig;
use crate::markdown::render_markdown_with_theme;
use crate::resolver::{self, ResolveError, Resolution};
use crate::sidebar::render_sidebar;
use crate::template::{Bindings, TemplateError, TemplateRenderer};
use crate::tree::{self, ListingEntry, TreeError, TreeNode};

pub const BASE_TEMPLATE: &str = "base.html";
pub const DIRECTORY_TEMPLATE: &str = "directory.html";
pub const MARKDOWN_TEMPLATE: &str = "markdown.html";

#[derive(Debug, thiserror::Error)]
pub enum SiteError {
    #[error("failed to build the navigation tree")]
    Tree(#[from] TreeError),
    #[error("failed to render template")]
    Template(#[from] TemplateError),
    #[error("failed to resolve request")]
    Resolve(#[from] ResolveError),
    #[error("failed to read document {path}")]
    ReadDocument {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Terminal state of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Directory,
    Document,
    NotFound,
    InvalidType,
    BadRequest,
    InternalError,
}

impl Outcome {
    pub fn status_code(self) -> u16 {
        match self {
            Outcome::Directory | Outcome::Document => 200,
            Outcome::InvalidType | Outcome::BadRequest => 400,
            Outcome::NotFound => 404,
            Outcome::InternalError => 500,
        }
    }

    pub fn is_success(self) -> bool {
        matches!(self, Outcome::Directory | Outcome::Document)
    }
}

#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub outcome: Outcome,
    pub title: String,
    pub body: String,
}

/// Everything known about the request being rendered.
#[derive(Debug)]
pub struct RequestContext {
    /// Decoded request path with a leading slash.
    pub request_path: String,
    pub resolved: PathBuf,
    pub tree: Vec<TreeNode>,
}

impl RequestContext {
    fn sidebar(&self) -> String {
        render_sidebar(&self.tree, &self.request_path)
    }
}

/// A catalog plus the templates used to present it.
#[derive(Debug, Clone)]
pub struct Site {
    content_dir: PathBuf,
    templates: TemplateRenderer,
    config: SiteConfig,
}

impl Site {
    pub fn new<C: AsRef<Path>, T: AsRef<Path>>(content_dir: C, templates_dir: T, config: SiteConfig) -> Self {
        Self {
            content_dir: content_dir.as_ref().to_path_buf(),
            templates: TemplateRenderer::new(templates_dir),
            config,
        }
    }

    pub fn content_dir(&self) -> &Path {
        &self.content_dir
    }

    pub fn templates(&self) -> &TemplateRenderer {
        &self.templates
    }

    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    /// Render the page for a raw (still percent-encoded) request path.
    ///
    /// Never fails: every error turns into an error page.
    pub fn render(&self, raw_path: &str) -> RenderedPage {
        let decoded = match percent_decode_str(raw_path).decode_utf8() {
            Ok(decoded) => decoded,
            Err(e) => {
                debug!("undecodable request path {raw_path}: {e}");
                return self.error_page(
                    Outcome::BadRequest,
                    "400 Bad Request",
                    &message_card("400 Bad Request", &format!("The path <code>{}</code> is not valid UTF-8.", escape(raw_path))),
                    "/",
                );
            }
        };
        let request_path = format!("/{}", decoded.trim_start_matches('/'));
        debug!("requested: {request_path}");

        match self.try_render(&request_path) {
            Ok(page) => page,
            Err(SiteError::Resolve(ResolveError::InvalidPath(path))) => self.error_page(
                Outcome::BadRequest,
                "400 Bad Request",
                &message_card(
                    "400 Bad Request",
                    &format!("The path <code>{}</code> points outside the catalog.", escape(&path)),
                ),
                "/",
            ),
            Err(e) => {
                error!("request error for {request_path}: {}", error_chain(&e));
                self.internal_error(&request_path, &e)
            }
        }
    }

    fn try_render(&self, request_path: &str) -> Result<RenderedPage, SiteError> {
        let resolution = resolver::resolve(&self.content_dir, request_path)?;
        debug!("full path: {}", resolution.full_path().display());

        let ctx = RequestContext {
            request_path: request_path.to_string(),
            resolved: resolution.full_path().to_path_buf(),
            tree: tree::walk(&self.content_dir)?,
        };

        match resolution {
            Resolution::NotFound { requested, resolved } => {
                debug!("path not found: {}", resolved.display());
                self.not_found_page(&ctx, &requested, &resolved)
            }
            Resolution::Directory { relative, .. } => self.directory_page(&ctx, &relative),
            Resolution::Document { full, .. } => self.document_page(&ctx, &full),
            Resolution::InvalidType { full, .. } => self.invalid_type_page(&ctx, &full),
        }
    }

    fn not_found_page(&self, ctx: &RequestContext, requested: &str, resolved: &Path) -> Result<RenderedPage, SiteError> {
        let title = "404 Not Found";
        let content = format!(
            concat!(
                "<div class=\"error-page\">\n",
                "  <h1>{title}</h1>\n",
                "  <p>Requested path: <code>{requested}</code></p>\n",
                "  <p>Resolved path: <code>{resolved}</code></p>\n",
                "  <p>Check that the file exists and that the path is spelled correctly.</p>\n",
                "</div>\n"
            ),
            title = title,
            requested = escape(requested),
            resolved = escape(&resolved.display().to_string()),
        );

        self.page(Outcome::NotFound, title, &ctx.sidebar(), &content)
    }

    fn directory_page(&self, ctx: &RequestContext, relative: &Path) -> Result<RenderedPage, SiteError> {
        // the template inserts values verbatim, so names are escaped here
        let entries: Vec<ListingEntry> = tree::list_directory(&self.content_dir, relative)?
            .into_iter()
            .map(|entry| ListingEntry {
                name: escape(&entry.name),
                url: html_escape::encode_double_quoted_attribute(&entry.url).into_owned(),
                kind: entry.kind,
            })
            .collect();

        let mut bindings = Bindings::new();
        bindings
            .add("path", escape(&ctx.request_path))
            .add_serialized("items", &entries)?;
        let content = self.templates.render(DIRECTORY_TEMPLATE, &bindings)?;

        let title = format!("Directory: {}", ctx.request_path);
        self.page(Outcome::Directory, &title, &ctx.sidebar(), &content)
    }

    fn document_page(&self, ctx: &RequestContext, full: &Path) -> Result<RenderedPage, SiteError> {
        let source = std::fs::read_to_string(full).map_err(|source| SiteError::ReadDocument {
            path: full.to_path_buf(),
            source,
        })?;
        let html = render_markdown_with_theme(&source, &self.config.syntax_theme);

        let mut bindings = Bindings::new();
        bindings.add("content", html);
        let content = self.templates.render(MARKDOWN_TEMPLATE, &bindings)?;

        let title = full
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_default();
        self.page(Outcome::Document, &title, &ctx.sidebar(), &content)
    }

    fn invalid_type_page(&self, ctx: &RequestContext, full: &Path) -> Result<RenderedPage, SiteError> {
        let title = "400 Invalid File Type";
        let content = message_card(
            title,
            &format!(
                "<code>{}</code> is not a markdown file.",
                escape(&full.display().to_string())
            ),
        );
        self.page(Outcome::InvalidType, title, &ctx.sidebar(), &content)
    }

    fn page(&self, outcome: Outcome, title: &str, sidebar: &str, content: &str) -> Result<RenderedPage, SiteError> {
        let mut bindings = Bindings::new();
        bindings
            .add("title", escape(title))
            .add("site_title", escape(&self.config.title))
            .add("sidebar", sidebar)
            .add("content", content);

        Ok(RenderedPage {
            outcome,
            title: title.to_string(),
            body: self.templates.render(BASE_TEMPLATE, &bindings)?,
        })
    }

    fn internal_error(&self, request_path: &str, err: &SiteError) -> RenderedPage {
        let content = format!(
            concat!(
                "<div class=\"error-page\">\n",
                "  <h1>500 Server Error</h1>\n",
                "  <pre>{}</pre>\n",
                "</div>\n"
            ),
            escape(&error_chain(err)),
        );
        self.error_page(Outcome::InternalError, "Server Error", &content, request_path)
    }

    /// Render an error page without letting a second failure escape. The
    /// sidebar is dropped if the tree cannot be walked, and a bare page is
    /// returned if the base template itself is broken.
    fn error_page(&self, outcome: Outcome, title: &str, content: &str, current_path: &str) -> RenderedPage {
        let sidebar = match tree::walk(&self.content_dir) {
            Ok(tree) => render_sidebar(&tree, current_path),
            Err(e) => {
                debug!("no sidebar for error page: {e}");
                String::new()
            }
        };

        match self.page(outcome, title, &sidebar, content) {
            Ok(page) => page,
            Err(e) => {
                error!("failed to render error page: {}", error_chain(&e));
                RenderedPage {
                    outcome,
                    title: title.to_string(),
                    body: format!(
                        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>{0}</title></head><body>{1}</body></html>\n",
                        escape(title),
                        content
                    ),
                }
            }
        }
    }
}

fn message_card(heading: &str, message: &str) -> String {
    format!("<div class=\"error-page\">\n  <h1>{}</h1>\n  <p>{message}</p>\n</div>\n", escape(heading))
}

fn escape(text: &str) -> String {
    html_escape::encode_text(text).into_owned()
}

/// `outer: inner: innermost`
pub fn error_chain(err: &dyn Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const BASE: &str = "<title>{{title}} | {{site_title}}</title><nav>{{sidebar}}</nav><main>{{content}}</main>";
    const DIRECTORY: &str = "<h2>{{path}}</h2>{{#each items}}{{#if (type === 'directory')}}[D {{name}} {{url}}]{{/if}}{{#if (type === 'file')}}[F {{name}} {{url}}]{{/if}}{{/each}}";
    const MARKDOWN: &str = "<article>{{content}}</article>";

    struct Fixture {
        _dir: TempDir,
        site: Site,
        templates: PathBuf,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let content = dir.path().join("catalog");
        let templates = dir.path().join("templates");
        fs::create_dir_all(content.join("guide/deeper")).unwrap();
        fs::create_dir_all(&templates).unwrap();
        fs::write(content.join("intro.md"), "# Intro\n\nHello <world>").unwrap();
        fs::write(content.join("guide/setup.md"), "# Setup").unwrap();
        fs::write(content.join("guide/deeper/notes.md"), "notes").unwrap();
        fs::write(content.join("guide/diagram.svg"), "<svg/>").unwrap();
        fs::write(templates.join(BASE_TEMPLATE), BASE).unwrap();
        fs::write(templates.join(DIRECTORY_TEMPLATE), DIRECTORY).unwrap();
        fs::write(templates.join(MARKDOWN_TEMPLATE), MARKDOWN).unwrap();

        let site = Site::new(&content, &templates, SiteConfig::default());
        Fixture {
            _dir: dir,
            site,
            templates,
        }
    }

    #[test]
    fn test_document_page() {
        let fx = fixture();
        let page = fx.site.render("/intro");

        assert_eq!(page.outcome, Outcome::Document);
        assert_eq!(page.title, "intro");
        assert!(page.body.starts_with("<title>intro | Folio</title>"));
        assert!(page.body.contains("<article><h1>Intro</h1>"));
        assert!(page.body.contains("<li class=\"file active\"><a href=\"/intro\">"));
    }

    #[test]
    fn test_nested_document_opens_sidebar_branch() {
        let fx = fixture();
        let page = fx.site.render("/guide/deeper/notes");

        assert_eq!(page.outcome, Outcome::Document);
        assert_eq!(page.body.matches("<details open>").count(), 2);
        assert!(page.body.contains("<li class=\"file active\"><a href=\"/guide/deeper/notes\">"));
    }

    #[test]
    fn test_directory_page_lists_children() {
        let fx = fixture();
        let page = fx.site.render("/guide");

        assert_eq!(page.outcome, Outcome::Directory);
        assert_eq!(page.title, "Directory: /guide");
        assert!(page.body.contains("<h2>/guide</h2>"));
        assert!(page.body.contains("[D deeper /guide/deeper]"));
        assert!(page.body.contains("[F setup /guide/setup]"));
        assert!(!page.body.contains("diagram"));
        assert!(!page.body.contains("notes]"));
    }

    #[test]
    fn test_root_directory_title() {
        let fx = fixture();
        let page = fx.site.render("/");
        assert_eq!(page.outcome, Outcome::Directory);
        assert_eq!(page.title, "Directory: /");
    }

    #[test]
    fn test_not_found_page_escapes_paths() {
        let fx = fixture();
        let page = fx.site.render("/%3Cscript%3E");

        assert_eq!(page.outcome, Outcome::NotFound);
        assert_eq!(page.outcome.status_code(), 404);
        assert!(page.body.contains("Requested path: <code>/&lt;script&gt;</code>"));
        assert!(page.body.contains("&lt;script&gt;.md"));
        assert!(!page.body.contains("<script>"));
        assert!(page.body.contains("sidebar-menu"));
    }

    #[test]
    fn test_invalid_type() {
        let fx = fixture();
        let page = fx.site.render("/guide/diagram.svg");
        assert_eq!(page.outcome, Outcome::InvalidType);
        assert_eq!(page.outcome.status_code(), 400);
    }

    #[test]
    fn test_bad_request_paths() {
        let fx = fixture();
        assert_eq!(fx.site.render("/%FF").outcome, Outcome::BadRequest);
        assert_eq!(fx.site.render("/guide/../../secret").outcome, Outcome::BadRequest);
    }

    #[test]
    fn test_broken_template_is_internal_error() {
        let fx = fixture();
        fs::write(fx.templates.join(MARKDOWN_TEMPLATE), "{{#each items}}").unwrap();

        let page = fx.site.render("/intro");
        assert_eq!(page.outcome, Outcome::InternalError);
        assert_eq!(page.title, "Server Error");
        assert!(page.body.contains("in template markdown.html"));
        assert!(page.body.contains("<nav><ul class=\"sidebar-menu\">"));
    }

    #[test]
    fn test_missing_base_template_still_renders() {
        let fx = fixture();
        fs::remove_file(fx.templates.join(BASE_TEMPLATE)).unwrap();

        let page = fx.site.render("/intro");
        assert_eq!(page.outcome, Outcome::InternalError);
        assert!(page.body.starts_with("<!DOCTYPE html>"));
        assert!(page.body.contains("failed to read template"));
    }

    #[test]
    fn test_directory_listing_escapes_names() {
        let fx = fixture();
        let content = fx.site.content_dir().to_path_buf();
        fs::write(content.join("guide/<b>.md"), "bold").unwrap();
        fs::create_dir(content.join("guide/<i>")).unwrap();

        let page = fx.site.render("/guide");

        assert_eq!(page.outcome, Outcome::Directory);
        assert!(page.body.contains("[F &lt;b&gt; /guide/%3Cb%3E]"));
        assert!(page.body.contains("[D &lt;i&gt; /guide/%3Ci%3E]"));
        assert!(!page.body.contains("<b>"));
        assert!(!page.body.contains("<i>"));
    }

    #[test]
    fn test_every_tree_url_resolves_back() {
        let fx = fixture();
        let content = fx.site.content_dir().to_path_buf();
        for name in ["x.md.md", "100%.md", "a b.md", "\u{e9}.md", "c#.md", "v1.2.md", "LOUD.MD"] {
            fs::write(content.join("guide").join(name), "text").unwrap();
        }
        fs::create_dir(content.join("guide/50% off")).unwrap();
        fs::write(content.join("guide/50% off/deal.md"), "deal").unwrap();

        let tree = tree::walk(fx.site.content_dir()).unwrap();

        fn check(site: &Site, nodes: &[TreeNode]) {
            for node in nodes {
                let page = site.render(node.url());
                let expected = match node {
                    TreeNode::Directory { .. } => Outcome::Directory,
                    TreeNode::File { .. } => Outcome::Document,
                };
                assert_eq!(page.outcome, expected, "{}", node.url());
                check(site, node.children());
            }
        }
        check(&fx.site, &tree);
    }

    #[test]
    fn test_error_chain() {
        let err = SiteError::ReadDocument {
            path: PathBuf::from("a.md"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(error_chain(&err), "failed to read document a.md: denied");
    }
}
