//! Block structure and rendering of compiled templates.
//!
//! Control-flow markers (`${if (c) {}`, `${} else {}`, `${}}`, ...) thread
//! their braces through a frame stack; the result is a tree of [`Node`]s that
//! renders against a JSON scope.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use super::expr::{Expr, Scope, case_matches, display, truthy};
use crate::debug;

/// Matches the inner text of a control-flow marker.
static CONTROL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?-u)^\s*(?:(?:if|for|else|switch|case|default|break)\b|[{}])").unwrap()
});

/// Returns true if a marker's inner text is control flow rather than a value.
pub fn is_control(inner: &str) -> bool {
    CONTROL.is_match(inner)
}

// =============================================================================
// Tree
// =============================================================================

#[derive(Debug, Clone)]
pub enum Node {
    Text(String),
    Interp(Expr),
    If {
        branches: Vec<(Expr, Vec<Node>)>,
        otherwise: Option<Vec<Node>>,
    },
    For {
        binding: String,
        keys: bool,
        iter: Expr,
        body: Vec<Node>,
    },
    Switch {
        subject: Expr,
        body: Vec<SwitchItem>,
    },
    Block(Vec<Node>),
    Break,
}

#[derive(Debug, Clone)]
pub enum SwitchItem {
    Case(Expr),
    Default,
    Node(Node),
}

// =============================================================================
// Control tokens
// =============================================================================

#[derive(Debug)]
enum Control {
    If(Expr),
    ElseIf { closes: bool, cond: Expr },
    Else { closes: bool },
    Close,
    Open,
    For { binding: String, keys: bool, iter: Expr },
    Switch(Expr),
    Case(Expr),
    Default,
    Break,
}

fn strip_keyword<'a>(s: &'a str, keyword: &str) -> Option<&'a str> {
    let rest = s.strip_prefix(keyword)?;
    match rest.chars().next() {
        Some(c) if c.is_alphanumeric() || c == '_' || c == '$' => None,
        _ => Some(rest),
    }
}

/// Split `(inner) rest` into the parsed inner expression text and the rest.
fn parenthesized(s: &str) -> Result<(&str, &str), String> {
    let s = s.trim_start();
    if !s.starts_with('(') {
        return Err("expected `(`".into());
    }
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' | '`' => quote = Some(c),
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Ok((&s[1..i], &s[i + 1..]));
                }
            }
            _ => {}
        }
    }
    Err("unbalanced parentheses".into())
}

fn expect_open(rest: &str) -> Result<(), String> {
    if rest.trim() == "{" {
        Ok(())
    } else {
        Err("expected `{` after condition".into())
    }
}

fn expr(src: &str) -> Result<Expr, String> {
    Expr::parse(src.trim()).map_err(|e| e.to_string())
}

fn parse_else(rest: &str, closes: bool) -> Result<Control, String> {
    let rest = rest.trim();
    if rest == "{" {
        return Ok(Control::Else { closes });
    }
    let Some(rest) = strip_keyword(rest, "if") else {
        return Err("expected `{` or `if` after `else`".into());
    };
    let (cond, after) = parenthesized(rest)?;
    expect_open(after)?;
    Ok(Control::ElseIf {
        closes,
        cond: expr(cond)?,
    })
}

fn parse_for(rest: &str) -> Result<Control, String> {
    let (header, after) = parenthesized(rest)?;
    expect_open(after)?;

    let header = header.trim();
    let header = ["const ", "let ", "var "]
        .iter()
        .find_map(|kw| header.strip_prefix(kw))
        .unwrap_or(header)
        .trim_start();

    let (binding, keys, iter) = if let Some((b, i)) = header.split_once(" of ") {
        (b, false, i)
    } else if let Some((b, i)) = header.split_once(" in ") {
        (b, true, i)
    } else {
        return Err("expected `for (x of items)` or `for (k in items)`".into());
    };

    let binding = binding.trim();
    let valid = !binding.is_empty()
        && binding
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '$');
    if !valid {
        return Err(format!("invalid loop variable `{binding}`"));
    }

    Ok(Control::For {
        binding: binding.to_string(),
        keys,
        iter: expr(iter)?,
    })
}

fn parse_control(inner: &str) -> Result<Control, String> {
    let s = inner.trim();

    if let Some(rest) = s.strip_prefix('}') {
        let rest = rest.trim();
        if rest.is_empty() {
            return Ok(Control::Close);
        }
        return match strip_keyword(rest, "else") {
            Some(rest) => parse_else(rest, true),
            None => Err(format!("unexpected `{rest}` after `}}`")),
        };
    }
    if s == "{" {
        return Ok(Control::Open);
    }
    if let Some(rest) = strip_keyword(s, "else") {
        return parse_else(rest, false);
    }
    if let Some(rest) = strip_keyword(s, "if") {
        let (cond, after) = parenthesized(rest)?;
        expect_open(after)?;
        return Ok(Control::If(expr(cond)?));
    }
    if let Some(rest) = strip_keyword(s, "for") {
        return parse_for(rest);
    }
    if let Some(rest) = strip_keyword(s, "switch") {
        let (subject, after) = parenthesized(rest)?;
        expect_open(after)?;
        return Ok(Control::Switch(expr(subject)?));
    }
    if let Some(rest) = strip_keyword(s, "case") {
        let Some(value) = rest.trim().strip_suffix(':') else {
            return Err("expected `:` after case value".into());
        };
        return Ok(Control::Case(expr(value)?));
    }
    if let Some(rest) = strip_keyword(s, "default") {
        return match rest.trim() {
            ":" => Ok(Control::Default),
            _ => Err("expected `default:`".into()),
        };
    }
    if let Some(rest) = strip_keyword(s, "break") {
        return match rest.trim() {
            "" | ";" => Ok(Control::Break),
            _ => Err("unexpected text after `break`".into()),
        };
    }
    Err(format!("unknown control syntax `{s}`"))
}

// =============================================================================
// Builder
// =============================================================================

enum Frame {
    Root(Vec<Node>),
    Block(Vec<Node>),
    If {
        branches: Vec<(Expr, Vec<Node>)>,
        /// `None` once inside the `else` branch.
        cond: Option<Expr>,
        body: Vec<Node>,
    },
    For {
        binding: String,
        keys: bool,
        iter: Expr,
        body: Vec<Node>,
    },
    Switch {
        subject: Expr,
        items: Vec<SwitchItem>,
    },
}

pub struct Builder {
    stack: Vec<Frame>,
}

impl Builder {
    pub fn new() -> Self {
        Self {
            stack: vec![Frame::Root(Vec::new())],
        }
    }

    pub fn text(&mut self, text: &str) {
        self.push(Node::Text(text.to_string()));
    }

    pub fn interpolation(&mut self, inner: &str) -> Result<(), String> {
        self.push(Node::Interp(expr(inner)?));
        Ok(())
    }

    pub fn control(&mut self, inner: &str) -> Result<(), String> {
        match parse_control(inner)? {
            Control::If(cond) => self.stack.push(Frame::If {
                branches: Vec::new(),
                cond: Some(cond),
                body: Vec::new(),
            }),
            Control::ElseIf { closes, cond } => self.enter_else(closes, Some(cond))?,
            Control::Else { closes } => self.enter_else(closes, None)?,
            Control::Close => self.close()?,
            Control::Open => self.stack.push(Frame::Block(Vec::new())),
            Control::For {
                binding,
                keys,
                iter,
            } => self.stack.push(Frame::For {
                binding,
                keys,
                iter,
                body: Vec::new(),
            }),
            Control::Switch(subject) => self.stack.push(Frame::Switch {
                subject,
                items: Vec::new(),
            }),
            Control::Case(value) => self.switch_marker(SwitchItem::Case(value))?,
            Control::Default => self.switch_marker(SwitchItem::Default)?,
            Control::Break => {
                let breakable = self
                    .stack
                    .iter()
                    .any(|f| matches!(f, Frame::For { .. } | Frame::Switch { .. }));
                if !breakable {
                    return Err("`break` outside of `for` or `switch`".into());
                }
                self.push(Node::Break);
            }
        }
        Ok(())
    }

    pub fn finish(mut self) -> Result<Vec<Node>, String> {
        match (self.stack.pop(), self.stack.is_empty()) {
            (Some(Frame::Root(nodes)), true) => Ok(nodes),
            _ => Err("unclosed block: missing `${}}`".into()),
        }
    }

    fn push(&mut self, node: Node) {
        match self.stack.last_mut() {
            Some(
                Frame::Root(body)
                | Frame::Block(body)
                | Frame::If { body, .. }
                | Frame::For { body, .. },
            ) => body.push(node),
            Some(Frame::Switch { items, .. }) => items.push(SwitchItem::Node(node)),
            None => {}
        }
    }

    fn switch_marker(&mut self, item: SwitchItem) -> Result<(), String> {
        match self.stack.last_mut() {
            Some(Frame::Switch { items, .. }) => {
                items.push(item);
                Ok(())
            }
            _ => Err("`case`/`default` outside of `switch`".into()),
        }
    }

    fn close(&mut self) -> Result<(), String> {
        if self.stack.len() <= 1 {
            return Err("unexpected `}` without open block".into());
        }
        let node = match self.stack.pop() {
            Some(Frame::Block(body)) => Node::Block(body),
            Some(Frame::If {
                mut branches,
                cond,
                body,
            }) => match cond {
                Some(cond) => {
                    branches.push((cond, body));
                    Node::If {
                        branches,
                        otherwise: None,
                    }
                }
                None => Node::If {
                    branches,
                    otherwise: Some(body),
                },
            },
            Some(Frame::For {
                binding,
                keys,
                iter,
                body,
            }) => Node::For {
                binding,
                keys,
                iter,
                body,
            },
            Some(Frame::Switch { subject, items }) => Node::Switch {
                subject,
                body: items,
            },
            Some(Frame::Root(_)) | None => unreachable!("root frame is never popped here"),
        };
        self.push(node);
        Ok(())
    }

    /// Move to an `else`/`else if` branch.
    ///
    /// `closes` is true for `${} else {}`; otherwise the `if` was already
    /// closed with `${}}` and is reopened.
    fn enter_else(&mut self, closes: bool, next: Option<Expr>) -> Result<(), String> {
        if !closes {
            self.reopen_if()?;
        }
        match self.stack.last_mut() {
            Some(Frame::If {
                branches,
                cond,
                body,
            }) => {
                let Some(current) = cond.take() else {
                    return Err("`else` after `else`".into());
                };
                branches.push((current, std::mem::take(body)));
                *cond = next;
                Ok(())
            }
            _ => Err("`else` without matching `if`".into()),
        }
    }

    fn reopen_if(&mut self) -> Result<(), String> {
        let last = match self.stack.last_mut() {
            Some(
                Frame::Root(body)
                | Frame::Block(body)
                | Frame::If { body, .. }
                | Frame::For { body, .. },
            ) => {
                while matches!(body.last(), Some(Node::Text(t)) if t.trim().is_empty()) {
                    body.pop();
                }
                body.pop()
            }
            Some(Frame::Switch { items, .. }) => match items.pop() {
                Some(SwitchItem::Node(node)) => Some(node),
                Some(other) => {
                    items.push(other);
                    None
                }
                None => None,
            },
            None => None,
        };

        match last {
            Some(Node::If {
                mut branches,
                otherwise: None,
            }) => {
                let Some((cond, body)) = branches.pop() else {
                    return Err("`else` without matching `if`".into());
                };
                self.stack.push(Frame::If {
                    branches,
                    cond: Some(cond),
                    body,
                });
                Ok(())
            }
            Some(other) => {
                self.push(other);
                Err("`else` without matching `if`".into())
            }
            None => Err("`else` without matching `if`".into()),
        }
    }
}

// =============================================================================
// Rendering
// =============================================================================

enum Flow {
    Next,
    Break,
}

pub fn render(nodes: &[Node], scope: &mut Scope<'_>, out: &mut String) {
    render_nodes(nodes, scope, out);
}

fn render_nodes(nodes: &[Node], scope: &mut Scope<'_>, out: &mut String) -> Flow {
    for node in nodes {
        if let Flow::Break = render_node(node, scope, out) {
            return Flow::Break;
        }
    }
    Flow::Next
}

fn condition(cond: &Expr, scope: &Scope<'_>) -> bool {
    match cond.eval(scope) {
        Ok(v) => truthy(&v),
        Err(e) => {
            debug!("template"; "condition treated as false: {}", e);
            false
        }
    }
}

fn render_node(node: &Node, scope: &mut Scope<'_>, out: &mut String) -> Flow {
    match node {
        Node::Text(text) => out.push_str(text),
        Node::Interp(e) => match e.eval(scope) {
            Ok(v) => out.push_str(&display(&v)),
            Err(err) => debug!("template"; "interpolation skipped: {}", err),
        },
        Node::If {
            branches,
            otherwise,
        } => {
            for (cond, body) in branches {
                if condition(cond, scope) {
                    return render_nodes(body, scope, out);
                }
            }
            if let Some(body) = otherwise {
                return render_nodes(body, scope, out);
            }
        }
        Node::For {
            binding,
            keys,
            iter,
            body,
        } => {
            let items: Vec<Value> = match iter.eval(scope) {
                Ok(Value::Array(items)) if *keys => {
                    (0..items.len()).map(|i| Value::String(i.to_string())).collect()
                }
                Ok(Value::Array(items)) => items,
                Ok(Value::Object(map)) if *keys => map.keys().cloned().map(Value::String).collect(),
                Ok(Value::Object(map)) => map.values().cloned().collect(),
                Ok(_) => Vec::new(),
                Err(e) => {
                    debug!("template"; "loop skipped: {}", e);
                    Vec::new()
                }
            };
            for item in items {
                scope.push(binding, item);
                let flow = render_nodes(body, scope, out);
                scope.pop();
                if let Flow::Break = flow {
                    break;
                }
            }
        }
        Node::Switch { subject, body } => {
            let subject = subject.eval(scope).unwrap_or(Value::Null);
            let start = body
                .iter()
                .position(|item| match item {
                    SwitchItem::Case(value) => value
                        .eval(scope)
                        .is_ok_and(|v| case_matches(&subject, &v)),
                    _ => false,
                })
                .or_else(|| body.iter().position(|i| matches!(i, SwitchItem::Default)));

            if let Some(start) = start {
                for item in &body[start + 1..] {
                    if let SwitchItem::Node(node) = item
                        && let Flow::Break = render_node(node, scope, out)
                    {
                        break;
                    }
                }
            }
        }
        Node::Block(body) => return render_nodes(body, scope, out),
        Node::Break => return Flow::Break,
    }
    Flow::Next
}
