//! Conditional expressions for `{{#if (...)}}` blocks.
//!
//! Only field paths, literals, equality and boolean operators are
//! understood; there is no way to call anything.

use serde_json::Value;

use super::TemplateError;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Path(Vec<String>),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Eq(Box<Expr>, Box<Expr>),
    Ne(Box<Expr>, Box<Expr>),
}

impl Expr {
    pub fn parse(source: &str, offset: usize) -> Result<Expr, TemplateError> {
        let tokens = tokenize(source, offset)?;
        let mut parser = ExprParser {
            tokens,
            pos: 0,
            offset,
        };
        let expr = parser.parse_or()?;
        if let Some(token) = parser.peek() {
            return Err(TemplateError::syntax(
                offset,
                format!("unexpected {token:?} in expression `{source}`"),
            ));
        }
        Ok(expr)
    }

    /// Evaluate against `lookup`, which resolves a dotted path to a value.
    pub fn eval<'a, F>(&self, lookup: &F) -> Value
    where
        F: Fn(&[String]) -> Option<&'a Value>,
    {
        match self {
            Expr::Literal(value) => value.clone(),
            Expr::Path(path) => lookup(path.as_slice()).cloned().unwrap_or(Value::Null),
            Expr::Not(inner) => Value::Bool(!truthy(&inner.eval(lookup))),
            Expr::And(left, right) => {
                let left = left.eval(lookup);
                if truthy(&left) { right.eval(lookup) } else { left }
            }
            Expr::Or(left, right) => {
                let left = left.eval(lookup);
                if truthy(&left) { left } else { right.eval(lookup) }
            }
            Expr::Eq(left, right) => Value::Bool(loose_eq(&left.eval(lookup), &right.eval(lookup))),
            Expr::Ne(left, right) => Value::Bool(!loose_eq(&left.eval(lookup), &right.eval(lookup))),
        }
    }
}

pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn loose_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => left == right,
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Num(f64),
    Dot,
    LParen,
    RParen,
    Not,
    And,
    Or,
    Eq,
    Ne,
}

fn tokenize(source: &str, offset: usize) -> Result<Vec<Token>, TemplateError> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '.' => {
                tokens.push(Token::Dot);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '&' if chars.get(i + 1) == Some(&'&') => {
                tokens.push(Token::And);
                i += 2;
            }
            '|' if chars.get(i + 1) == Some(&'|') => {
                tokens.push(Token::Or);
                i += 2;
            }
            '=' if chars.get(i + 1) == Some(&'=') => {
                // `==` and `===` mean the same thing here
                i += if chars.get(i + 2) == Some(&'=') { 3 } else { 2 };
                tokens.push(Token::Eq);
            }
            '!' if chars.get(i + 1) == Some(&'=') => {
                i += if chars.get(i + 2) == Some(&'=') { 3 } else { 2 };
                tokens.push(Token::Ne);
            }
            '!' => {
                tokens.push(Token::Not);
                i += 1;
            }
            '\'' | '"' => {
                let quote = c;
                let mut text = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        None => {
                            return Err(TemplateError::syntax(
                                offset,
                                format!("unterminated string in expression `{source}`"),
                            ));
                        }
                        Some('\\') => {
                            if let Some(escaped) = chars.get(i + 1) {
                                text.push(*escaped);
                            }
                            i += 2;
                        }
                        Some(ch) if *ch == quote => {
                            i += 1;
                            break;
                        }
                        Some(ch) => {
                            text.push(*ch);
                            i += 1;
                        }
                    }
                }
                tokens.push(Token::Str(text));
            }
            c if c.is_ascii_digit() || (c == '-' && chars.get(i + 1).is_some_and(|n| n.is_ascii_digit())) => {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let number = text.parse::<f64>().map_err(|_| {
                    TemplateError::syntax(offset, format!("invalid number `{text}` in expression"))
                })?;
                tokens.push(Token::Num(number));
            }
            c if c.is_alphabetic() || c == '_' || c == '$' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '$')
                {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            other => {
                return Err(TemplateError::syntax(
                    offset,
                    format!("unexpected character `{other}` in expression `{source}`"),
                ));
            }
        }
    }

    Ok(tokens)
}

struct ExprParser {
    tokens: Vec<Token>,
    pos: usize,
    offset: usize,
}

impl ExprParser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn parse_or(&mut self) -> Result<Expr, TemplateError> {
        let mut left = self.parse_and()?;
        while self.eat(&Token::Or) {
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, TemplateError> {
        let mut left = self.parse_compare()?;
        while self.eat(&Token::And) {
            let right = self.parse_compare()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_compare(&mut self) -> Result<Expr, TemplateError> {
        let left = self.parse_unary()?;
        if self.eat(&Token::Eq) {
            let right = self.parse_unary()?;
            return Ok(Expr::Eq(Box::new(left), Box::new(right)));
        }
        if self.eat(&Token::Ne) {
            let right = self.parse_unary()?;
            return Ok(Expr::Ne(Box::new(left), Box::new(right)));
        }
        Ok(left)
    }

    /// `!` binds tighter than comparison: `!a === b` is `(!a) === b`.
    fn parse_unary(&mut self) -> Result<Expr, TemplateError> {
        if self.eat(&Token::Not) {
            return Ok(Expr::Not(Box::new(self.parse_unary()?)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, TemplateError> {
        match self.next() {
            Some(Token::Str(text)) => Ok(Expr::Literal(Value::String(text))),
            Some(Token::Num(n)) => Ok(Expr::Literal(
                serde_json::Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null),
            )),
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                if !self.eat(&Token::RParen) {
                    return Err(TemplateError::syntax(self.offset, "missing `)` in expression"));
                }
                Ok(inner)
            }
            Some(Token::Ident(ident)) => match ident.as_str() {
                "true" => Ok(Expr::Literal(Value::Bool(true))),
                "false" => Ok(Expr::Literal(Value::Bool(false))),
                "null" | "undefined" => Ok(Expr::Literal(Value::Null)),
                _ => {
                    let mut path = vec![ident];
                    while self.eat(&Token::Dot) {
                        match self.next() {
                            Some(Token::Ident(field)) => path.push(field),
                            _ => {
                                return Err(TemplateError::syntax(
                                    self.offset,
                                    "expected a field name after `.`",
                                ));
                            }
                        }
                    }
                    Ok(Expr::Path(path))
                }
            },
            Some(token) => Err(TemplateError::syntax(
                self.offset,
                format!("unexpected {token:?} in expression"),
            )),
            None => Err(TemplateError::syntax(self.offset, "expression ended early")),
        }
    }
}
