//! A small template engine for the page shells.
//!
//! Templates are parsed once into a node list and rendered against a set of
//! [`Bindings`]. Supported syntax:
//!
//! - `{{name}}` / `{{a.b}}` substitute a bound value. Unbound placeholders are
//!   left in the output untouched.
//! - `{{#each items}} ... {{/each}}` repeats its body per list element; the
//!   element's fields are visible inside the body and shadow outer bindings.
//!   This is the reverse of a substitute-first pipeline, where a top-level
//!   `name` would already have replaced `{{name}}` inside every loop body
//!   before the loop ran.
//! - `{{#if (expr)}} ... {{/if}}` keeps its body when `expr` is truthy. See
//!   [`expr`] for the expression language.
//!
//! Values are inserted as-is; escaping is the caller's job.

pub mod expr;
mod parser;

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{Map, Value};

use expr::truthy;
pub use parser::Node;

#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("failed to read template {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("syntax error at byte {offset}: {message}")]
    Syntax { offset: usize, message: String },
    #[error("in template {name}")]
    InTemplate {
        name: String,
        #[source]
        source: Box<TemplateError>,
    },
    #[error("failed to serialize binding `{key}`")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

impl TemplateError {
    pub(crate) fn syntax(offset: usize, message: impl Into<String>) -> Self {
        TemplateError::Syntax {
            offset,
            message: message.into(),
        }
    }
}

/// Named values handed to a template.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bindings {
    values: Map<String, Value>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a scalar (or any value that converts into JSON directly).
    pub fn add(&mut self, key: &str, value: impl Into<Value>) -> &mut Self {
        self.values.insert(key.to_string(), value.into());
        self
    }

    /// Bind anything serializable, typically a list of items for `{{#each}}`.
    pub fn add_serialized<T: Serialize + ?Sized>(
        &mut self,
        key: &str,
        value: &T,
    ) -> Result<&mut Self, TemplateError> {
        let value = serde_json::to_value(value).map_err(|source| TemplateError::Serialize {
            key: key.to_string(),
            source,
        })?;
        self.values.insert(key.to_string(), value);
        Ok(self)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }
}

#[derive(Clone, Copy)]
enum Scope<'a> {
    Root(&'a Map<String, Value>),
    Item(&'a Value),
}

impl<'a> Scope<'a> {
    fn lookup(self, path: &[String]) -> Option<&'a Value> {
        let (first, rest) = path.split_first()?;
        let mut current = match self {
            Scope::Root(map) => map.get(first)?,
            Scope::Item(item) if first == "this" => item,
            Scope::Item(item) => item.get(first)?,
        };
        for segment in rest {
            current = current.get(segment)?;
        }
        Some(current)
    }
}

fn lookup<'a>(scopes: &[Scope<'a>], path: &[String]) -> Option<&'a Value> {
    scopes.iter().rev().find_map(|scope| scope.lookup(path))
}

/// A parsed template.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    nodes: Vec<Node>,
}

impl Template {
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        Ok(Self {
            nodes: parser::parse(source)?,
        })
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn render(&self, bindings: &Bindings) -> String {
        let mut out = String::new();
        let mut scopes = vec![Scope::Root(&bindings.values)];
        render_nodes(&self.nodes, &mut scopes, &mut out);
        out
    }
}

fn render_nodes<'a>(nodes: &[Node], scopes: &mut Vec<Scope<'a>>, out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Placeholder { path, raw } => match lookup(scopes, path) {
                Some(value) => push_value(out, value),
                None => out.push_str(raw),
            },
            Node::Each { path, body } => {
                let Some(Value::Array(items)) = lookup(scopes, path) else {
                    continue;
                };
                for item in items {
                    scopes.push(Scope::Item(item));
                    render_nodes(body, scopes, out);
                    scopes.pop();
                }
            }
            Node::If { condition, body } => {
                let value = {
                    let visible: &[Scope<'a>] = scopes;
                    condition.eval(&|path: &[String]| lookup(visible, path))
                };
                if truthy(&value) {
                    render_nodes(body, scopes, out);
                }
            }
        }
    }
}

fn push_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => {}
        Value::String(s) => out.push_str(s),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        other => out.push_str(&other.to_string()),
    }
}

/// Loads templates from a directory. Files are read and parsed on every call.
#[derive(Debug, Clone)]
pub struct TemplateRenderer {
    dir: PathBuf,
}

impl TemplateRenderer {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn load(&self, name: &str) -> Result<Template, TemplateError> {
        let path = self.dir.join(name);
        let source = std::fs::read_to_string(&path)
            .map_err(|source| TemplateError::Read { path, source })?;

        Template::parse(&source).map_err(|e| TemplateError::InTemplate {
            name: name.to_string(),
            source: Box::new(e),
        })
    }

    /// Render the template `name` with `bindings`
    pub fn render(&self, name: &str, bindings: &Bindings) -> Result<String, TemplateError> {
        Ok(self.load(name)?.render(bindings))
    }
}
