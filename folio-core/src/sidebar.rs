//! Collapsible sidebar navigation built from the catalog tree.
//!
//! The branch holding the current page is rendered open; everything else
//! starts collapsed.

use std::fmt::Write;

use percent_encoding::percent_decode_str;

use crate::tree::{NodeKind, TreeNode};

/// A tree node annotated for the current request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidebarItem {
    pub name: String,
    pub url: String,
    pub kind: NodeKind,
    /// The node's URL matches the current path.
    pub active: bool,
    /// Directory rendered expanded: it is active or holds the active node.
    pub open: bool,
    pub children: Vec<SidebarItem>,
}

/// Normalize a route for comparison: decoded, one leading slash, no trailing
/// slash.
pub fn normalize_route(route: &str) -> String {
    let decoded = percent_decode_str(route).decode_utf8_lossy();
    let trimmed = decoded.trim_matches('/');
    format!("/{trimmed}")
}

pub fn build_sidebar(tree: &[TreeNode], current_path: &str) -> Vec<SidebarItem> {
    let current = normalize_route(current_path);
    tree.iter().map(|node| build_item(node, &current)).collect()
}

fn build_item(node: &TreeNode, current: &str) -> SidebarItem {
    let active = normalize_route(node.url()) == current;
    let children: Vec<SidebarItem> = node
        .children()
        .iter()
        .map(|child| build_item(child, current))
        .collect();
    let holds_active = children.iter().any(|c| c.active || c.open);
    let kind = node.kind();

    SidebarItem {
        name: node.name().to_string(),
        url: node.url().to_string(),
        kind,
        active,
        open: kind == NodeKind::Directory && (active || holds_active),
        children,
    }
}

/// Render the sidebar markup for `tree` with `current_path` highlighted.
pub fn render_sidebar(tree: &[TreeNode], current_path: &str) -> String {
    let items = build_sidebar(tree, current_path);
    let mut html = String::new();
    render_items(&items, &mut html);
    html
}

fn render_items(items: &[SidebarItem], html: &mut String) {
    html.push_str("<ul class=\"sidebar-menu\">");

    for item in items {
        let class = if item.active { " active" } else { "" };
        let name = html_escape::encode_text(&item.name);

        match item.kind {
            NodeKind::Directory => {
                let open = if item.open { " open" } else { "" };
                let _ = write!(
                    html,
                    "<li class=\"directory{class}\"><details{open}><summary>📁 {name}</summary>"
                );
                render_items(&item.children, html);
                html.push_str("</details></li>");
            }
            NodeKind::File => {
                let href = html_escape::encode_double_quoted_attribute(&item.url);
                let _ = write!(
                    html,
                    "<li class=\"file{class}\"><a href=\"{href}\">📄 {name}</a></li>"
                );
            }
        }
    }

    html.push_str("</ul>");
}
