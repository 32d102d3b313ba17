//! Page template compiler.
//!
//! Turns page HTML with embedded `${...}` markers into a [`CompiledTemplate`]
//! that renders against a JSON context (`{ "this": .., "req": .. }`).
//!
//! # Module Structure
//!
//! - `scan` - `${...}` marker splitting (shared with the page parser)
//! - `expr` - restricted expression language (parser + interpreter)
//! - `program` - control-flow blocks and rendering
//! - `process` - attribute evaluation for fragment references
//!
//! # Example
//!
//! ```ignore
//! let tpl = template::compile("<h1>${this.title}</h1>${if (req.query.debug) {}<pre/>${}}")?;
//! let html = tpl.render(&json!({ "this": { "title": "Home" }, "req": { "query": {} } }));
//! ```

mod error;
pub mod expr;
mod process;
mod program;
pub mod scan;


pub use error::TemplateCompileError;
pub use expr::{EvalError, Expr, Scope, display, truthy};
pub use process::{ForwardedAttributes, condition_holds, process_expression};

use serde_json::Value;

use program::{Builder, Node};
use scan::Piece;

/// Executable form of a page template.
#[derive(Debug, Clone)]
pub struct CompiledTemplate {
    program: Program,
}

#[derive(Debug, Clone)]
enum Program {
    /// Template without markers: rendering returns the text as-is.
    Constant(String),
    Nodes(Vec<Node>),
}

impl CompiledTemplate {
    /// Render with `context` as the top-level scope.
    pub fn render(&self, context: &Value) -> String {
        match &self.program {
            Program::Constant(text) => text.clone(),
            Program::Nodes(nodes) => {
                let mut out = String::new();
                program::render(nodes, &mut Scope::new(context), &mut out);
                out
            }
        }
    }

    /// True if the template had no markers and renders a fixed string.
    pub fn is_constant(&self) -> bool {
        matches!(self.program, Program::Constant(_))
    }
}

/// Compile a template string.
pub fn compile(template: &str) -> Result<CompiledTemplate, TemplateCompileError> {
    if !template.contains("${") {
        return Ok(CompiledTemplate {
            program: Program::Constant(template.to_string()),
        });
    }

    let pieces = scan::split(template).map_err(|offset| {
        TemplateCompileError::new(
            format!("unterminated `${{` at byte {offset}"),
            excerpt(template, offset),
        )
    })?;

    // Only escaped markers: still a constant.
    if pieces.iter().all(|p| matches!(p, Piece::Text(_))) {
        let text: String = pieces
            .iter()
            .filter_map(|p| match p {
                Piece::Text(t) => Some(t.as_ref()),
                Piece::Expr(_) => None,
            })
            .collect();
        return Ok(CompiledTemplate {
            program: Program::Constant(text),
        });
    }

    let listing = listing(&pieces);
    let mut builder = Builder::new();
    for (index, piece) in pieces.iter().enumerate() {
        let step = match piece {
            Piece::Text(text) => {
                builder.text(text);
                Ok(())
            }
            Piece::Expr(inner) if program::is_control(inner) => builder.control(inner),
            Piece::Expr(inner) => builder.interpolation(inner),
        };
        step.map_err(|message| {
            TemplateCompileError::new(format!("{message} (piece {:04})", index + 1), &listing)
        })?;
    }

    let nodes = builder
        .finish()
        .map_err(|message| TemplateCompileError::new(message, &listing))?;

    Ok(CompiledTemplate {
        program: Program::Nodes(nodes),
    })
}

/// One line per piece, used for compile diagnostics.
fn listing(pieces: &[Piece<'_>]) -> String {
    let mut out = String::new();
    for (i, piece) in pieces.iter().enumerate() {
        let line = match piece {
            Piece::Text(text) => format!("{:04} text {:?}\n", i + 1, text),
            Piece::Expr(inner) if program::is_control(inner) => {
                format!("{:04} ctrl {}\n", i + 1, inner.trim())
            }
            Piece::Expr(inner) => format!("{:04} emit {}\n", i + 1, inner.trim()),
        };
        out.push_str(&line);
    }
    out
}

fn excerpt(template: &str, offset: usize) -> String {
    template
        .get(offset..)
        .map(|rest| rest.chars().take(60).collect())
        .unwrap_or_default()
}
