//! Parenthesized prefix text form for atoms.
//!
//! ```text
//! (ConceptNode "dog" (stv 0.9 0.8))
//! (InheritanceLink (ConceptNode "dog") (ConceptNode "mammal") (stv 1 0.9))
//! ```
//!
//! One record is one expression. Only the outermost atom carries a truth
//! value. Floats use Rust's shortest round-trip formatting, so
//! `parse(&render(e)) == e` holds exactly.

use super::kind::AtomType;
use super::types::{AtomExpr, TruthValue};
use crate::error::{Error, Result};

/// Reader output shared by the atom and pattern grammars.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SExpr {
    List(Vec<SExpr>, usize),
    Symbol(String, usize),
    Str(String, usize),
}

impl SExpr {
    pub(crate) fn offset(&self) -> usize {
        match self {
            Self::List(_, o) | Self::Symbol(_, o) | Self::Str(_, o) => *o,
        }
    }
}

/// Reader failure, mapped by callers to their own error variant.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SyntaxError {
    pub message: String,
    pub offset: usize,
}

impl SyntaxError {
    fn new(message: impl Into<String>, offset: usize) -> Self {
        Self {
            message: message.into(),
            offset,
        }
    }
}

/// Read every top-level expression in `input`.
pub(crate) fn read_all(input: &str) -> std::result::Result<Vec<SExpr>, SyntaxError> {
    let bytes = input.as_bytes();
    let mut pos = 0;
    // Each open list: (start offset, children so far)
    let mut stack: Vec<(usize, Vec<SExpr>)> = Vec::new();
    let mut top = Vec::new();

    while pos < bytes.len() {
        let c = bytes[pos];
        let item = match c {
            b' ' | b'\t' | b'\r' | b'\n' => {
                pos += 1;
                continue;
            }
            b';' => {
                while pos < bytes.len() && bytes[pos] != b'\n' {
                    pos += 1;
                }
                continue;
            }
            b'(' => {
                stack.push((pos, Vec::new()));
                pos += 1;
                continue;
            }
            b')' => {
                let (start, children) = stack
                    .pop()
                    .ok_or_else(|| SyntaxError::new("Unexpected ')'", pos))?;
                pos += 1;
                SExpr::List(children, start)
            }
            b'"' => {
                let start = pos;
                let (s, next) = read_string(input, pos)?;
                pos = next;
                SExpr::Str(s, start)
            }
            _ => {
                let start = pos;
                while pos < bytes.len()
                    && !matches!(bytes[pos], b' ' | b'\t' | b'\r' | b'\n' | b'(' | b')' | b'"')
                {
                    pos += 1;
                }
                SExpr::Symbol(input[start..pos].to_string(), start)
            }
        };

        match stack.last_mut() {
            Some((_, children)) => children.push(item),
            None => top.push(item),
        }
    }

    if let Some((start, _)) = stack.last() {
        return Err(SyntaxError::new("Unterminated '('", *start));
    }
    Ok(top)
}

fn read_string(input: &str, start: usize) -> std::result::Result<(String, usize), SyntaxError> {
    let mut out = String::new();
    let mut chars = input[start + 1..].char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '"' => return Ok((out, start + 1 + i + 1)),
            '\\' => match chars.next() {
                Some((_, '"')) => out.push('"'),
                Some((_, '\\')) => out.push('\\'),
                Some((_, 'n')) => out.push('\n'),
                Some((_, 't')) => out.push('\t'),
                Some((j, other)) => {
                    return Err(SyntaxError::new(
                        format!("Unknown escape '\\{}'", other),
                        start + 1 + j,
                    ))
                }
                None => break,
            },
            _ => out.push(c),
        }
    }
    Err(SyntaxError::new("Unterminated string", start))
}

/// Quote a node name for output.
pub(crate) fn quote(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 2);
    out.push('"');
    for c in name.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Render an atom expression.
pub fn render(expr: &AtomExpr) -> String {
    let mut out = String::new();
    render_into(expr, true, &mut out);
    out
}

fn render_into(expr: &AtomExpr, root: bool, out: &mut String) {
    out.push('(');
    out.push_str(expr.atom_type().name());
    match expr {
        AtomExpr::Node { name, .. } => {
            out.push(' ');
            out.push_str(&quote(name));
        }
        AtomExpr::Link { outgoing, .. } => {
            for child in outgoing {
                out.push(' ');
                render_into(child, false, out);
            }
        }
    }
    if root {
        if let Some(tv) = expr.tv() {
            out.push_str(&format!(" (stv {} {})", tv.strength, tv.confidence));
        }
    }
    out.push(')');
}

/// Parse a single atom expression.
pub fn parse(input: &str) -> Result<AtomExpr> {
    let exprs = read_all(input).map_err(|e| Error::parse(e.message, e.offset))?;
    match exprs.as_slice() {
        [one] => expr_to_atom(one, true),
        [] => Err(Error::parse("Empty input", 0)),
        [_, second, ..] => Err(Error::parse(
            "Trailing input after expression",
            second.offset(),
        )),
    }
}

/// Parse every atom expression in `input`, in order.
pub fn parse_many(input: &str) -> Result<Vec<AtomExpr>> {
    read_all(input)
        .map_err(|e| Error::parse(e.message, e.offset))?
        .iter()
        .map(|e| expr_to_atom(e, true))
        .collect()
}

fn expr_to_atom(expr: &SExpr, root: bool) -> Result<AtomExpr> {
    let (items, offset) = match expr {
        SExpr::List(items, offset) => (items, *offset),
        other => return Err(Error::parse("Expected '('", other.offset())),
    };
    let atom_type = match items.first() {
        Some(SExpr::Symbol(name, o)) => {
            AtomType::from_name(name).map_err(|e| Error::parse(e.to_string(), *o))?
        }
        _ => return Err(Error::parse("Expected atom type", offset)),
    };
    if atom_type.is_abstract() {
        return Err(Error::parse(
            format!("Abstract type {} cannot be instantiated", atom_type),
            offset,
        ));
    }

    let mut rest = &items[1..];
    let mut tv = None;
    if let Some(last @ SExpr::List(inner, _)) = rest.last() {
        if matches!(inner.first(), Some(SExpr::Symbol(s, _)) if s == "stv") {
            if !root {
                return Err(Error::parse(
                    "Truth values are only allowed on the outermost atom",
                    last.offset(),
                ));
            }
            tv = Some(parse_stv(inner, last.offset())?);
            rest = &rest[..rest.len() - 1];
        }
    }

    if atom_type.is_node() {
        match rest {
            [SExpr::Str(name, _)] => Ok(AtomExpr::Node {
                atom_type,
                name: name.clone(),
                tv,
            }),
            _ => Err(Error::parse(
                format!("{} expects exactly one quoted name", atom_type),
                offset,
            )),
        }
    } else {
        let outgoing = rest
            .iter()
            .map(|child| expr_to_atom(child, false))
            .collect::<Result<Vec<_>>>()?;
        Ok(AtomExpr::Link {
            atom_type,
            outgoing,
            tv,
        })
    }
}

pub(crate) fn parse_stv(items: &[SExpr], offset: usize) -> Result<TruthValue> {
    let number = |e: &SExpr| -> Result<f64> {
        match e {
            SExpr::Symbol(s, o) => s
                .parse::<f64>()
                .map_err(|_| Error::parse(format!("Invalid number '{}'", s), *o)),
            other => Err(Error::parse("Expected number", other.offset())),
        }
    };
    match items {
        [_, s, c] => TruthValue::new(number(s)?, number(c)?)
            .map_err(|e| Error::parse(e.to_string(), offset)),
        _ => Err(Error::parse("stv expects strength and confidence", offset)),
    }
}
