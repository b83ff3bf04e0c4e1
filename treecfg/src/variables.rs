//! `${…}` variable expansion: lexing, parsing, and lazy resolution.
//!
//! Syntax: `${path}` references another tree location; `${path:default}`
//! falls back to the default when the path cannot be satisfied; expansions
//! nest (`${a.${b}.c}`); `$$` escapes a literal `$`. Inside an expansion a
//! `$`-prefixed `}` or `:` is literal. Colons in a default are literal, so
//! URLs survive unescaped.
//!
//! Resolution is lazy and cycle-checked: every in-flight target path is held
//! in a per-resolution set, and revisiting one fails with `cyclic
//! reference`. `missing` and `cyclic` failures fall back, in order, to the
//! expansion default, the registered resolvers, and the optional no-op
//! resolver; any other failure is critical.

use std::fmt;

use crate::config::Config;
use crate::error::{Error, Reason, Result};
use crate::opts::Options;
use crate::path::Path;
use crate::value::Value;

/// An unresolved pointer at another tree location.
#[derive(Debug, Clone)]
pub(crate) struct Reference {
    path: Path,
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${{{}}}", self.path.render())
    }
}

impl Reference {
    pub(crate) fn new(path: Path) -> Self {
        Reference { path }
    }

    /// Resolve within the tree only, keeping the target path marked while
    /// chasing nested references so self-reference is caught.
    pub(crate) fn resolve_tree(&self, from: Option<&Config>, opts: &Options) -> Result<Value> {
        let key = self.path.render();
        let guard = opts.enter_resolve(&key)?;
        let Some(from) = from else {
            return Err(Error::missing(key));
        };
        let root = from.root();
        let found = self.path.get_value(&root, opts)?;
        let concrete = found.resolved(opts)?;
        drop(guard);
        Ok(concrete)
    }

    /// Resolve within the tree, falling back to the registered resolvers on
    /// a recoverable failure.
    pub(crate) fn resolve(&self, from: Option<&Config>, opts: &Options) -> Result<Value> {
        match self.resolve_tree(from, opts) {
            Ok(v) => Ok(v),
            Err(original) if original.is_recoverable() => {
                match opts.run_resolvers(&self.path.render()) {
                    Ok(s) => Ok(Value::str(s)),
                    Err(e) if e.is_recoverable() => Err(original),
                    Err(e) => Err(e),
                }
            }
            Err(e) => Err(e),
        }
    }
}

/// A `${left:right}` form; the right side substitutes when the left cannot
/// be satisfied.
#[derive(Debug, Clone)]
pub(crate) struct Expansion {
    left: Splice,
    right: Option<Splice>,
    sep: String,
}

impl fmt::Display for Expansion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.right {
            Some(right) => write!(f, "${{{}:{right}}}", self.left),
            None => write!(f, "${{{}}}", self.left),
        }
    }
}

impl Expansion {
    fn eval(&self, cfg: Option<&Config>, opts: &Options) -> Result<String> {
        let path_str = match self.left.eval(cfg, opts) {
            Ok(s) => s,
            Err(e) if e.is_recoverable() => return self.fallback(None, cfg, opts, e),
            Err(e) => return Err(e),
        };
        if path_str.is_empty() {
            return Err(Error::config(Reason::Message(
                "empty path after expansion".to_string(),
            )));
        }

        let path = Path::parse_with(
            &path_str,
            &self.sep,
            opts.max_idx,
            opts.enable_num_keys,
            false,
        );
        let reference = Reference::new(path);
        match reference
            .resolve_tree(cfg, opts)
            .and_then(|v| v.to_str(opts))
        {
            Ok(s) => Ok(s),
            Err(e) if e.is_recoverable() => self.fallback(Some(&path_str), cfg, opts, e),
            Err(e) => Err(e),
        }
    }

    /// Walk the fallback chain: default, then resolvers. The original error
    /// surfaces when no alternative produces a value.
    fn fallback(
        &self,
        name: Option<&str>,
        cfg: Option<&Config>,
        opts: &Options,
        original: Error,
    ) -> Result<String> {
        if let Some(right) = &self.right {
            match right.eval(cfg, opts) {
                Ok(s) => return Ok(s),
                Err(e) if e.is_recoverable() => {}
                Err(e) => return Err(e),
            }
        }
        if let Some(name) = name {
            match opts.run_resolvers(name) {
                Ok(s) => return Ok(s),
                Err(e) if e.is_recoverable() => {}
                Err(e) => return Err(e),
            }
        }
        Err(original)
    }
}

/// One piece of a parsed template.
#[derive(Debug, Clone)]
pub(crate) enum Piece {
    Str(String),
    Ref(Reference),
    Exp(Box<Expansion>),
}

impl fmt::Display for Piece {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Piece::Str(s) => f.write_str(s),
            Piece::Ref(r) => write!(f, "{r}"),
            Piece::Exp(e) => write!(f, "{e}"),
        }
    }
}

impl Piece {
    fn eval(&self, cfg: Option<&Config>, opts: &Options) -> Result<String> {
        match self {
            Piece::Str(s) => Ok(s.clone()),
            Piece::Ref(r) => r.resolve(cfg, opts)?.to_str(opts),
            Piece::Exp(e) => e.eval(cfg, opts),
        }
    }
}

/// Literal strings and expansions, concatenated on evaluation.
#[derive(Debug, Clone)]
pub(crate) struct Splice {
    pieces: Vec<Piece>,
}

impl fmt::Display for Splice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for piece in &self.pieces {
            write!(f, "{piece}")?;
        }
        Ok(())
    }
}

impl Splice {
    pub(crate) fn from_pieces(pieces: Vec<Piece>) -> Self {
        Splice { pieces }
    }

    pub(crate) fn eval(&self, cfg: Option<&Config>, opts: &Options) -> Result<String> {
        let mut out = String::new();
        for piece in &self.pieces {
            out.push_str(&piece.eval(cfg, opts)?);
        }
        Ok(out)
    }
}

// --- lexer ----------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Open,
    Close,
    Sep,
    Str(String),
}

fn lex(input: &str) -> Vec<Token> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut buf = String::new();
    let mut depth = 0usize;
    let mut i = 0usize;

    let flush = |tokens: &mut Vec<Token>, buf: &mut String| {
        if !buf.is_empty() {
            tokens.push(Token::Str(std::mem::take(buf)));
        }
    };

    while i < chars.len() {
        match chars[i] {
            '$' => match chars.get(i + 1).copied() {
                Some('{') => {
                    flush(&mut tokens, &mut buf);
                    tokens.push(Token::Open);
                    depth += 1;
                    i += 2;
                }
                Some('$') => {
                    buf.push('$');
                    i += 2;
                }
                Some(c @ ('}' | ':')) if depth > 0 => {
                    buf.push(c);
                    i += 2;
                }
                _ => {
                    buf.push('$');
                    i += 1;
                }
            },
            ':' if depth > 0 => {
                flush(&mut tokens, &mut buf);
                tokens.push(Token::Sep);
                i += 1;
            }
            '}' if depth > 0 => {
                flush(&mut tokens, &mut buf);
                tokens.push(Token::Close);
                depth -= 1;
                i += 1;
            }
            c => {
                buf.push(c);
                i += 1;
            }
        }
    }
    flush(&mut tokens, &mut buf);
    tokens
}

// --- parser ---------------------------------------------------------------

struct ParseState {
    is_var: bool,
    in_right: bool,
    left: Vec<Piece>,
    right: Vec<Piece>,
}

impl ParseState {
    fn top() -> Self {
        ParseState {
            is_var: false,
            in_right: false,
            left: Vec::new(),
            right: Vec::new(),
        }
    }

    fn var() -> Self {
        ParseState {
            is_var: true,
            ..ParseState::top()
        }
    }

    fn push(&mut self, piece: Piece) {
        if self.in_right {
            self.right.push(piece);
        } else {
            self.left.push(piece);
        }
    }
}

fn parse_error(msg: &str) -> Error {
    Error::config(Reason::Message(msg.to_string()))
}

/// Collapse a closed `${…}` into a single piece: a bare reference when the
/// left side is one plain string with no default, an expansion otherwise.
fn finish_state(state: ParseState, opts: &Options) -> Result<Piece> {
    if state.left.is_empty() {
        return Err(parse_error("empty expansion"));
    }

    if !state.in_right && state.left.len() == 1 {
        if let Piece::Str(s) = &state.left[0] {
            let path = Path::parse_with(
                s,
                &opts.path_sep,
                opts.max_idx,
                opts.enable_num_keys,
                false,
            );
            return Ok(Piece::Ref(Reference::new(path)));
        }
    }

    let left = Splice {
        pieces: state.left,
    };
    let right = state.in_right.then_some(Splice {
        pieces: state.right,
    });
    Ok(Piece::Exp(Box::new(Expansion {
        left,
        right,
        sep: opts.path_sep.clone(),
    })))
}

/// Parse a template string into pieces.
pub(crate) fn parse_template(input: &str, opts: &Options) -> Result<Vec<Piece>> {
    let mut stack = vec![ParseState::top()];

    for token in lex(input) {
        match token {
            Token::Open => stack.push(ParseState::var()),
            Token::Close => {
                let state = stack
                    .pop()
                    .ok_or_else(|| parse_error("unbalanced '}'"))?;
                let piece = finish_state(state, opts)?;
                let current = stack
                    .last_mut()
                    .ok_or_else(|| parse_error("unbalanced '}'"))?;
                current.push(piece);
            }
            Token::Sep => {
                let current = stack.last_mut().expect("parser stack never empty");
                if !current.is_var {
                    return Err(parse_error("default separator not within expansion"));
                }
                if current.in_right {
                    // a second ':' belongs to the default text
                    current.push(Piece::Str(":".to_string()));
                } else {
                    current.in_right = true;
                }
            }
            Token::Str(s) => {
                let current = stack.last_mut().expect("parser stack never empty");
                current.push(Piece::Str(s));
            }
        }
    }

    if stack.len() > 1 {
        return Err(parse_error("missing '}'"));
    }
    let top = stack.pop().expect("parser stack never empty");
    Ok(top.left)
}
