//! Textual paths: parsing, rendering, and tree descent.
//!
//! A path is a sequence of steps, each either a field name or a positional
//! index. Numeric steps are parsed as indices only up to a configurable
//! maximum so hostile inputs cannot force huge array allocations.

use crate::config::Config;
use crate::error::{Error, Reason, Result};
use crate::opts::Options;
use crate::value::{parse_int_prefixed, Value, ValueKind};

/// One step of a parsed path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Step {
    Named(String),
    Index(usize),
}

impl Step {
    fn render(&self) -> String {
        match self {
            Step::Named(name) => name.clone(),
            Step::Index(idx) => idx.to_string(),
        }
    }

    /// Read the value this step selects from `elem`, `None` when absent.
    fn get(&self, elem: &Value, opts: &Options) -> Result<Option<Value>> {
        match self {
            Step::Named(name) => {
                let cfg = elem
                    .to_config(opts)
                    .map_err(|_| expected_object(elem, self))?;
                Ok(cfg.get_raw(name))
            }
            Step::Index(idx) => {
                let Ok(cfg) = elem.to_config(opts) else {
                    // a scalar is its own zeroth element
                    if *idx == 0 {
                        return Ok(Some(elem.clone()));
                    }
                    return Err(expected_object(elem, self));
                };
                let len = cfg.array_len();
                if len == 0 {
                    // an object without positional elements counts one
                    if *idx == 0 {
                        return Ok(Some(elem.clone()));
                    }
                    return Err(Error::config_at(
                        Reason::IndexOutOfRange,
                        cfg.path_of(&self.render(), "."),
                    ));
                }
                if *idx >= len {
                    return Err(Error::config_at(
                        Reason::IndexOutOfRange,
                        cfg.path_of(&self.render(), "."),
                    ));
                }
                Ok(cfg.get_at_raw(*idx))
            }
        }
    }

    /// Store `value` under this step of `elem`, which must be a sub-tree.
    fn set(&self, elem: &Value, value: Value) -> Result<()> {
        let ValueKind::Sub(cfg) = &elem.kind else {
            return Err(expected_object(elem, self));
        };
        match self {
            Step::Named(name) => cfg.set_raw(name, value),
            Step::Index(idx) => cfg.set_at_raw(*idx, value),
        }
        Ok(())
    }

    fn remove(&self, elem: &Value, opts: &Options) -> Result<bool> {
        let cfg = elem
            .to_config(opts)
            .map_err(|_| expected_object(elem, self))?;
        Ok(match self {
            Step::Named(name) => cfg.del_raw(name),
            Step::Index(idx) => cfg.del_at_raw(*idx),
        })
    }
}

fn expected_object(elem: &Value, step: &Step) -> Error {
    let at = elem.path(".");
    let path = if at.is_empty() {
        step.render()
    } else {
        format!("{at}.{}", step.render())
    };
    Error::config_at(Reason::ExpectedObject, path)
}

/// A parsed path, carrying the separator it was parsed with so it can render
/// itself back.
#[derive(Debug, Clone)]
pub(crate) struct Path {
    steps: Vec<Step>,
    sep: String,
}

impl Path {
    /// Parse `input` under the given options.
    pub(crate) fn parse(input: &str, opts: &Options) -> Path {
        Path::parse_with(
            input,
            &opts.path_sep,
            opts.max_idx,
            opts.enable_num_keys,
            opts.escape_path,
        )
    }

    /// Parse `input`, then select element `idx` of the addressed field.
    pub(crate) fn parse_idx(input: &str, idx: Option<usize>, opts: &Options) -> Path {
        if input.is_empty() {
            return Path {
                sep: opts.path_sep.clone(),
                steps: idx.map(Step::Index).into_iter().collect(),
            };
        }
        let mut path = Path::parse(input, opts);
        if let Some(idx) = idx {
            path.steps.push(Step::Index(idx));
        }
        path
    }

    pub(crate) fn parse_with(
        input: &str,
        sep: &str,
        max_idx: u64,
        enable_num_keys: bool,
        escape_path: bool,
    ) -> Path {
        if escape_path && input.len() >= 2 && input.starts_with('[') && input.ends_with(']') {
            let literal = &input[1..input.len() - 1];
            return Path {
                sep: sep.to_string(),
                steps: vec![Step::Named(literal.to_string())],
            };
        }
        if sep.is_empty() {
            return Path {
                sep: String::new(),
                steps: vec![parse_step(input, max_idx, enable_num_keys)],
            };
        }

        let elems: Vec<&str> = input.split(sep).collect();
        // A lone numeric name keeps its legacy named-key treatment; steps of
        // a longer path are always eligible to be indices.
        let enable_num_keys = enable_num_keys && elems.len() == 1;
        let steps = elems
            .iter()
            .map(|e| parse_step(e, max_idx, enable_num_keys))
            .collect();
        Path {
            sep: sep.to_string(),
            steps,
        }
    }

    /// Render the path with its own separator, falling back to `.`.
    pub(crate) fn render(&self) -> String {
        let sep = if self.sep.is_empty() { "." } else { &self.sep };
        self.steps
            .iter()
            .map(Step::render)
            .collect::<Vec<_>>()
            .join(sep)
    }

    /// Whether a value exists at this path. Absence is a valid outcome, not
    /// an error.
    pub(crate) fn has(&self, cfg: &Config, opts: &Options) -> Result<bool> {
        let mut cur = Value::sub(cfg.clone());
        for step in &self.steps {
            match step.get(&cur, opts) {
                Ok(Some(next)) => cur = next,
                Ok(None) => return Ok(false),
                Err(e) if e.is_missing() => return Ok(false),
                Err(e) if matches!(e.reason(), Reason::IndexOutOfRange) => return Ok(false),
                Err(e) => return Err(e),
            }
        }
        Ok(true)
    }

    /// The value at this path; `missing` when any step is absent.
    pub(crate) fn get_value(&self, cfg: &Config, opts: &Options) -> Result<Value> {
        let mut cur = Value::sub(cfg.clone());
        for step in &self.steps {
            match step.get(&cur, opts)? {
                Some(next) => cur = next,
                None => {
                    let at = cur.path(".");
                    let path = if at.is_empty() {
                        step.render()
                    } else {
                        format!("{at}.{}", step.render())
                    };
                    return Err(Error::missing(path));
                }
            }
        }
        Ok(cur)
    }

    /// Store `value` at this path.
    ///
    /// Missing intermediate nodes are built bottom-up: the sub-tree for the
    /// remaining steps is assembled leaf-first and inserted in one piece, so
    /// every intermediate context points at its final parent.
    pub(crate) fn set_value(&self, cfg: &Config, opts: &Options, value: Value) -> Result<()> {
        if self.steps.is_empty() {
            return Err(Error::implementation(Reason::Missing));
        }

        let mut node = Value::sub(cfg.clone());
        let mut steps = self.steps.as_slice();

        // 1. descend while the required intermediate nodes exist
        while steps.len() > 1 {
            match steps[0].get(&node, opts) {
                Ok(Some(next)) if !next.is_nil() => {
                    node = next;
                    steps = &steps[1..];
                }
                Ok(_) => break,
                Err(e) if e.is_missing() => break,
                Err(e) if matches!(e.reason(), Reason::IndexOutOfRange) => break,
                Err(e) => return Err(e),
            }
        }

        // 2. build the missing tail bottom-up
        let mut value = value;
        while steps.len() > 1 {
            let last = &steps[steps.len() - 1];
            let next = Config::new();
            next.set_meta(value.meta().cloned());
            let holder = Value::sub(next);
            last.set(&holder, value)?;
            value = holder;
            steps = &steps[..steps.len() - 1];
        }

        // 3. insert the assembled sub-tree
        steps[0].set(&node, value)
    }

    /// Remove the value at this path; a missing intermediate means there is
    /// nothing to remove.
    pub(crate) fn remove(&self, cfg: &Config, opts: &Options) -> Result<bool> {
        if self.steps.is_empty() {
            return Ok(false);
        }

        let mut cur = Value::sub(cfg.clone());
        for step in &self.steps[..self.steps.len() - 1] {
            match step.get(&cur, opts) {
                Ok(Some(next)) => cur = next,
                Ok(None) => return Ok(false),
                Err(e) if e.is_missing() => return Ok(false),
                Err(e) if matches!(e.reason(), Reason::IndexOutOfRange) => return Ok(false),
                Err(e) => return Err(e),
            }
        }

        // resolve in case the last hop goes through a reference
        let target = Value::sub(cur.to_config(opts)?);
        self.steps[self.steps.len() - 1].remove(&target, opts)
    }
}

/// Parse one step. Numeric steps become indices when within the cap, unless
/// numeric keys are enabled for this input.
fn parse_step(input: &str, max_idx: u64, enable_num_keys: bool) -> Step {
    if !enable_num_keys {
        if let Some(idx) = parse_int_prefixed(input) {
            if idx >= 0 && idx.unsigned_abs() <= max_idx {
                return Step::Index(usize::try_from(idx).expect("bounded by max_idx"));
            }
        }
    }
    Step::Named(input.to_string())
}
