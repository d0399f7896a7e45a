use super::TemplateError;
use super::expr::Expr;

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Text(String),
    /// `{{name}}`; `raw` is the original tag, emitted when nothing is bound.
    Placeholder { path: Vec<String>, raw: String },
    Each { path: Vec<String>, body: Vec<Node> },
    If { condition: Expr, body: Vec<Node> },
}

enum Block {
    Each(Vec<String>),
    If(Expr),
}

struct Frame {
    block: Block,
    offset: usize,
    nodes: Vec<Node>,
}

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

pub fn parse(source: &str) -> Result<Vec<Node>, TemplateError> {
    let mut root: Vec<Node> = Vec::new();
    let mut stack: Vec<Frame> = Vec::new();
    let mut pos = 0;

    while pos < source.len() {
        let Some(start) = source[pos..].find(OPEN).map(|i| pos + i) else {
            push_text(current(&mut root, &mut stack), &source[pos..]);
            break;
        };
        let Some(end) = source[start + OPEN.len()..]
            .find(CLOSE)
            .map(|i| start + OPEN.len() + i)
        else {
            push_text(current(&mut root, &mut stack), &source[pos..]);
            break;
        };

        push_text(current(&mut root, &mut stack), &source[pos..start]);

        let raw = &source[start..end + CLOSE.len()];
        let inner = source[start + OPEN.len()..end].trim();
        pos = end + CLOSE.len();

        if let Some(rest) = block_argument(inner, "#each") {
            let path = parse_path(rest)
                .ok_or_else(|| TemplateError::syntax(start, format!("invalid loop target in `{raw}`")))?;
            stack.push(Frame {
                block: Block::Each(path),
                offset: start,
                nodes: Vec::new(),
            });
        } else if let Some(rest) = block_argument(inner, "#if") {
            if rest.is_empty() {
                return Err(TemplateError::syntax(start, "`{{#if}}` needs a condition"));
            }
            stack.push(Frame {
                block: Block::If(Expr::parse(rest, start)?),
                offset: start,
                nodes: Vec::new(),
            });
        } else if inner == "/each" || inner == "/if" {
            let frame = stack
                .pop()
                .ok_or_else(|| TemplateError::syntax(start, format!("`{raw}` without an opening block")))?;
            let node = match (frame.block, inner) {
                (Block::Each(path), "/each") => Node::Each {
                    path,
                    body: frame.nodes,
                },
                (Block::If(condition), "/if") => Node::If {
                    condition,
                    body: frame.nodes,
                },
                _ => {
                    return Err(TemplateError::syntax(
                        start,
                        format!("`{raw}` closes a block opened at byte {}", frame.offset),
                    ));
                }
            };
            current(&mut root, &mut stack).push(node);
        } else if let Some(path) = parse_path(inner) {
            current(&mut root, &mut stack).push(Node::Placeholder {
                path,
                raw: raw.to_string(),
            });
        } else {
            push_text(current(&mut root, &mut stack), raw);
        }
    }

    if let Some(frame) = stack.pop() {
        return Err(TemplateError::syntax(frame.offset, "block is never closed"));
    }

    Ok(root)
}

fn current<'a>(root: &'a mut Vec<Node>, stack: &'a mut [Frame]) -> &'a mut Vec<Node> {
    match stack.last_mut() {
        Some(frame) => &mut frame.nodes,
        None => root,
    }
}

fn push_text(nodes: &mut Vec<Node>, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(Node::Text(last)) = nodes.last_mut() {
        last.push_str(text);
    } else {
        nodes.push(Node::Text(text.to_string()));
    }
}

/// The argument of `{{#keyword arg}}`. The keyword must stand alone, so
/// `#eachfoo` is not a loop.
fn block_argument<'a>(inner: &'a str, keyword: &str) -> Option<&'a str> {
    let rest = inner.strip_prefix(keyword)?;
    match rest.chars().next() {
        None => Some(rest),
        Some(c) if c.is_whitespace() || c == '(' => Some(rest.trim()),
        Some(_) => None,
    }
}

/// `name` or `a.b.c`; anything else is not a placeholder.
fn parse_path(source: &str) -> Option<Vec<String>> {
    if source.is_empty() {
        return None;
    }
    let segments: Vec<String> = source.split('.').map(str::to_string).collect();
    let valid = segments.iter().all(|s| {
        let mut chars = s.chars();
        matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_')
            && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '-')
    });
    valid.then_some(segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn placeholder(name: &str) -> Node {
        Node::Placeholder {
            path: vec![name.to_string()],
            raw: format!("{{{{{name}}}}}"),
        }
    }

    #[test]
    fn test_plain_text_is_one_node() {
        assert_eq!(parse("<p>hi</p>").unwrap(), vec![Node::Text("<p>hi</p>".into())]);
        assert_eq!(parse("").unwrap(), vec![]);
    }

    #[test]
    fn test_placeholders_and_text() {
        let nodes = parse("<h1>{{title}}</h1>{{ sidebar }}").unwrap();
        assert_eq!(
            nodes,
            vec![
                Node::Text("<h1>".into()),
                placeholder("title"),
                Node::Text("</h1>".into()),
                Node::Placeholder {
                    path: vec!["sidebar".into()],
                    raw: "{{ sidebar }}".into(),
                },
            ]
        );
    }

    #[test]
    fn test_nested_blocks() {
        let nodes = parse("{{#each items}}{{#if (type === 'file')}}{{name}}{{/if}}{{/each}}").unwrap();
        let Node::Each { path, body } = &nodes[0] else {
            panic!("expected a loop, got {nodes:?}");
        };
        assert_eq!(path, &vec!["items".to_string()]);
        assert!(matches!(&body[0], Node::If { body, .. } if body == &vec![placeholder("name")]));
    }

    #[test]
    fn test_non_placeholder_braces_stay_literal() {
        let nodes = parse("a {{ }} b {{1 + 2}} c {{ unclosed").unwrap();
        assert_eq!(nodes, vec![Node::Text("a {{ }} b {{1 + 2}} c {{ unclosed".into())]);
    }

    #[test]
    fn test_block_errors() {
        assert!(parse("{{#each items}}x").is_err());
        assert!(parse("x{{/each}}").is_err());
        assert!(parse("{{#each items}}{{/if}}").is_err());
        assert!(parse("{{#if}}x{{/if}}").is_err());
        assert!(parse("{{#each}}x{{/each}}").is_err());
    }

    #[test]
    fn test_keyword_must_stand_alone() {
        assert_eq!(
            parse("{{#eachitems}}x{{#ifa}}").unwrap(),
            vec![Node::Text("{{#eachitems}}x{{#ifa}}".into())]
        );
        assert!(matches!(&parse("{{#if(a)}}y{{/if}}").unwrap()[0], Node::If { .. }));
        assert!(matches!(&parse("{{#each\titems}}{{/each}}").unwrap()[0], Node::Each { .. }));
    }

    #[test]
    fn test_error_reports_offset() {
        let err = parse("0123{{#each items}}").unwrap_err();
        assert!(matches!(err, TemplateError::Syntax { offset: 4, .. }));
    }
}
