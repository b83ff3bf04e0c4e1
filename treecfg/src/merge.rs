//! Recursive tree merging with per-field strategies.
//!
//! Merging normalizes the source, then folds it into the destination:
//! object meets object recursively, everything else incoming-wins. Arrays
//! compose according to the strategy recorded on the enclosing field.

use crate::config::Config;
use crate::error::Result;
use crate::normalize::ToConfig;
use crate::opts::Options;
use crate::value::ValueKind;

/// How arrays (and whole sub-trees, for `Replace`) compose during a merge.
///
/// The absence of a strategy is the default behaviour: objects merge
/// recursively and arrays merge position-wise, with the longer arm's tail
/// appended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStrategy {
    /// Drop the old value entirely; use the new one.
    Replace,
    /// Old elements first, then the new ones.
    Append,
    /// New elements first, then the old ones.
    Prepend,
}

impl Config {
    /// Merge `from` into this tree.
    ///
    /// The source is normalized first and left untouched: values crossing
    /// over into this tree are copied. References stay unresolved through
    /// the merge.
    pub fn merge<S: ToConfig + ?Sized>(&self, from: &S, opts: &Options) -> Result<()> {
        let opts = opts.clone();
        let other = from.to_config(&opts)?;
        merge_trees(self, &other, None, &opts)
    }
}

/// Merge two nodes; `strategy` governs how their arrays compose.
fn merge_trees(
    to: &Config,
    from: &Config,
    strategy: Option<MergeStrategy>,
    opts: &Options,
) -> Result<()> {
    for name in from.keys() {
        let incoming = from.get_raw(&name).expect("key listed");

        let mut flags = to.field_flags(&name);
        flags.absorb(from.field_flags(&name));
        let field_strategy = flags.strategy;

        let recurse = !matches!(field_strategy, Some(MergeStrategy::Replace));
        let existing = to.get_raw(&name);
        match existing {
            Some(old) if recurse && old.is_sub() && incoming.is_sub() => {
                let (ValueKind::Sub(old_sub), ValueKind::Sub(inc_sub)) =
                    (&old.kind, &incoming.kind)
                else {
                    unreachable!("guarded by is_sub");
                };
                merge_trees(old_sub, inc_sub, field_strategy, opts)?;
            }
            _ => to.set_raw(&name, incoming),
        }
        to.tag_field(&name, flags);
    }

    merge_arrays(to, from, strategy, opts)
}

fn merge_arrays(
    to: &Config,
    from: &Config,
    strategy: Option<MergeStrategy>,
    opts: &Options,
) -> Result<()> {
    let from_len = from.array_len();
    if from_len == 0 {
        return Ok(());
    }

    match strategy {
        Some(MergeStrategy::Append) => {
            for idx in 0..from_len {
                to.push_raw(from.get_at_raw(idx).expect("index in range"));
            }
        }
        Some(MergeStrategy::Prepend) => {
            let old: Vec<_> = (0..to.array_len())
                .map(|i| to.get_at_raw(i).expect("index in range"))
                .collect();
            truncate_arr(to);
            for idx in 0..from_len {
                to.push_raw(from.get_at_raw(idx).expect("index in range"));
            }
            for value in old {
                to.push_raw(value);
            }
        }
        // replace-tagged fields never recurse into array merging
        Some(MergeStrategy::Replace) | None => {
            // position-wise; the longer arm's tail survives
            for idx in 0..from_len {
                let incoming = from.get_at_raw(idx).expect("index in range");
                match to.get_at_raw(idx) {
                    Some(old) if old.is_sub() && incoming.is_sub() => {
                        let (ValueKind::Sub(old_sub), ValueKind::Sub(inc_sub)) =
                            (&old.kind, &incoming.kind)
                        else {
                            unreachable!("guarded by is_sub");
                        };
                        merge_trees(old_sub, inc_sub, None, opts)?;
                    }
                    _ => to.set_at_raw(idx, incoming),
                }
            }
        }
    }
    Ok(())
}

fn truncate_arr(cfg: &Config) {
    cfg.node.borrow_mut().fields.array_mut().clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::FieldFlags;
    use crate::value::Value;

    fn leaf_int(cfg: &Config, name: &str, v: i64) {
        cfg.set_raw(name, Value::int(v));
    }

    fn sub_with(cfg: &Config, name: &str) -> Config {
        let child = Config::new();
        cfg.set_raw(name, Value::sub(child.clone()));
        child
    }

    #[test]
    fn objects_merge_recursively() {
        let opts = Options::new();
        let dst = Config::new();
        let a1 = sub_with(&dst, "a");
        leaf_int(&a1, "b", 1);

        let src = Config::new();
        let a2 = sub_with(&src, "a");
        leaf_int(&a2, "c", 2);

        dst.merge(&src, &opts).expect("merge");
        let merged = dst.child("a", None, &opts).expect("a");
        assert_eq!(merged.get_int("b", None, &opts).expect("b"), 1);
        assert_eq!(merged.get_int("c", None, &opts).expect("c"), 2);
    }

    #[test]
    fn incoming_scalar_replaces_subtree() {
        let opts = Options::new();
        let dst = Config::new();
        let a = sub_with(&dst, "a");
        leaf_int(&a, "b", 1);

        let src = Config::new();
        leaf_int(&src, "a", 7);

        dst.merge(&src, &opts).expect("merge");
        assert_eq!(dst.get_int("a", None, &opts).expect("a"), 7);
    }

    #[test]
    fn replace_strategy_drops_old_subtree() {
        let opts = Options::new();
        let dst = Config::new();
        let a1 = sub_with(&dst, "a");
        leaf_int(&a1, "b", 1);

        let src = Config::new();
        let a2 = sub_with(&src, "a");
        leaf_int(&a2, "c", 2);
        src.tag_field(
            "a",
            FieldFlags {
                redact: false,
                strategy: Some(MergeStrategy::Replace),
            },
        );

        dst.merge(&src, &opts).expect("merge");
        let merged = dst.child("a", None, &opts).expect("a");
        assert!(!merged.has_field("b"));
        assert_eq!(merged.get_int("c", None, &opts).expect("c"), 2);
    }

    #[test]
    fn default_array_merge_is_position_wise() {
        let opts = Options::new();
        let dst = Config::new();
        let list1 = sub_with(&dst, "list");
        list1.push_raw(Value::int(1));
        list1.push_raw(Value::int(2));
        list1.push_raw(Value::int(3));

        let src = Config::new();
        let list2 = sub_with(&src, "list");
        list2.push_raw(Value::int(10));

        dst.merge(&src, &opts).expect("merge");
        let merged = dst.child("list", None, &opts).expect("list");
        assert_eq!(merged.get_int("", Some(0), &opts).expect("0"), 10);
        assert_eq!(merged.get_int("", Some(1), &opts).expect("1"), 2);
        assert_eq!(merged.get_int("", Some(2), &opts).expect("2"), 3);
    }

    #[test]
    fn append_and_prepend_strategies() {
        for (strategy, expected) in [
            (MergeStrategy::Append, [1, 2]),
            (MergeStrategy::Prepend, [2, 1]),
        ] {
            let opts = Options::new();
            let dst = Config::new();
            let list1 = sub_with(&dst, "list");
            list1.push_raw(Value::int(1));

            let src = Config::new();
            let list2 = sub_with(&src, "list");
            list2.push_raw(Value::int(2));
            src.tag_field(
                "list",
                FieldFlags {
                    redact: false,
                    strategy: Some(strategy),
                },
            );

            dst.merge(&src, &opts).expect("merge");
            let merged = dst.child("list", None, &opts).expect("list");
            assert_eq!(merged.array_len(), 2);
            for (idx, want) in expected.iter().enumerate() {
                assert_eq!(
                    merged.get_int("", Some(idx), &opts).expect("element"),
                    *want
                );
            }
        }
    }

    #[test]
    fn merge_does_not_mutate_source() {
        let opts = Options::new();
        let dst = Config::new();
        let src = Config::new();
        let inner = sub_with(&src, "a");
        leaf_int(&inner, "b", 1);

        dst.merge(&src, &opts).expect("merge");
        leaf_int(&dst.child("a", None, &opts).expect("a"), "b2", 2);

        assert!(!src.child("a", None, &opts).expect("a").has_field("b2"));
        assert_eq!(inner.path("."), "a");
    }

    #[test]
    fn merge_empty_is_identity() {
        let opts = Options::new();
        let dst = Config::new();
        leaf_int(&dst, "x", 1);
        dst.merge(&Config::new(), &opts).expect("merge");
        assert_eq!(dst.keys(), vec!["x".to_string()]);
        assert_eq!(dst.get_int("x", None, &opts).expect("x"), 1);
    }
}
