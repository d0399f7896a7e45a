pub mod config;
pub mod export;
pub mod markdown;
pub mod resolver;
pub mod sidebar;
pub mod site;
pub mod template;
pub mod tree;

// Re-export main types
pub use config::SiteConfig;
pub use export::{ExportReport, export_site};
pub use markdown::render_markdown;
pub use site::{Outcome, RenderedPage, Site, SiteError};
pub use template::{Bindings, Template, TemplateError, TemplateRenderer};
pub use tree::{TreeNode, walk};
