use std::sync::LazyLock;

use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd, html};
use syntect::highlighting::ThemeSet;
use syntect::html::highlighted_html_for_string;
use syntect::parsing::SyntaxSet;

pub const DEFAULT_SYNTAX_THEME: &str = "base16-ocean.dark";

// Initialize syntax highlighting resources once
static SYNTAX_SET: LazyLock<SyntaxSet> = LazyLock::new(SyntaxSet::load_defaults_newlines);
static THEME_SET: LazyLock<ThemeSet> = LazyLock::new(ThemeSet::load_defaults);

fn options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_GFM
}

/// Render GitHub-flavored markdown to HTML with the default highlighting theme.
pub fn render_markdown(source: &str) -> String {
    render_markdown_with_theme(source, DEFAULT_SYNTAX_THEME)
}

/// Render markdown to HTML. Single newlines become `<br />`, and fenced code
/// blocks are highlighted with `theme`.
pub fn render_markdown_with_theme(source: &str, theme: &str) -> String {
    let events: Vec<Event> = Parser::new_ext(source, options()).collect();
    let mut processed_events = Vec::with_capacity(events.len());
    let mut i = 0;

    while i < events.len() {
        match &events[i] {
            Event::Start(Tag::CodeBlock(kind)) => {
                let lang = match kind {
                    CodeBlockKind::Fenced(info) => info
                        .split(|c: char| c == ',' || c.is_whitespace())
                        .next()
                        .unwrap_or_default()
                        .to_string(),
                    CodeBlockKind::Indented => String::new(),
                };

                // Collect all text events until the end of the code block
                let mut code_content = String::new();
                i += 1;
                while i < events.len() {
                    match &events[i] {
                        Event::End(TagEnd::CodeBlock) => break,
                        Event::Text(text) => code_content.push_str(text),
                        _ => {}
                    }
                    i += 1;
                }

                processed_events.push(Event::Html(highlight(&code_content, &lang, theme).into()));
            }
            Event::SoftBreak => processed_events.push(Event::HardBreak),
            event => processed_events.push(event.clone()),
        }
        i += 1;
    }

    let mut out = String::new();
    html::push_html(&mut out, processed_events.into_iter());
    out
}

fn highlight(code: &str, lang: &str, theme: &str) -> String {
    let plain = || {
        let class = if lang.is_empty() {
            String::new()
        } else {
            format!(" class=\"language-{}\"", html_escape::encode_double_quoted_attribute(lang))
        };
        format!("<pre><code{class}>{}</code></pre>\n", html_escape::encode_text(code))
    };

    if lang.is_empty() {
        return plain();
    }

    let syntax = SYNTAX_SET.find_syntax_by_token(lang).or_else(|| {
        // Fallback mappings for languages missing from the default set
        match lang {
            "toml" => SYNTAX_SET.find_syntax_by_name("YAML"),
            "ts" | "typescript" => SYNTAX_SET.find_syntax_by_name("JavaScript"),
            _ => None,
        }
    });

    match (syntax, THEME_SET.themes.get(theme)) {
        (Some(syntax), Some(theme)) => {
            highlighted_html_for_string(code, &SYNTAX_SET, syntax, theme).unwrap_or_else(|e| {
                tracing::debug!("highlighting {lang} failed: {e}");
                plain()
            })
        }
        _ => plain(),
    }
}

/// Whether `theme` is one of the bundled syntect themes.
pub fn is_known_theme(theme: &str) -> bool {
    THEME_SET.themes.contains_key(theme)
}
