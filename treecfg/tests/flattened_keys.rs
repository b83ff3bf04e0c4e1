//! Flattened-key rendering of whole trees.

use std::collections::HashSet;

use anyhow::Result;
use serde_json::json;
use treecfg::{Config, Options};

fn keys(cfg: &Config, opts: &Options) -> HashSet<String> {
    cfg.flattened_keys(opts).into_iter().collect()
}

#[test]
fn leaves_are_listed_exactly_once_without_inner_nodes() -> Result<()> {
    let opts = Options::new().path_sep(".");
    let cfg = Config::new();
    cfg.set_str("n.a.b.c", None, "h", &opts)?;
    cfg.set_int("n.a.d", None, 1, &opts)?;
    cfg.merge(
        &json!({"values": [{"j": 1, "k": 2}, {"j": 3, "o": 4}]}),
        &opts,
    )?;

    let expected: HashSet<String> = [
        "n.a.b.c",
        "n.a.d",
        "values.0.j",
        "values.0.k",
        "values.1.j",
        "values.1.o",
    ]
    .into_iter()
    .map(str::to_string)
    .collect();

    let flattened = cfg.flattened_keys(&opts);
    assert_eq!(flattened.len(), expected.len(), "no duplicates");
    assert_eq!(keys(&cfg, &opts), expected);
    Ok(())
}

#[test]
fn custom_separator_renders_indices_as_decimal() -> Result<()> {
    let opts = Options::new().path_sep("/");
    let cfg = Config::from_source(&json!({"list": [true, false]}), &opts)?;
    assert_eq!(
        keys(&cfg, &opts),
        ["list/0", "list/1"].into_iter().map(str::to_string).collect()
    );
    Ok(())
}

#[test]
fn empty_config_flattens_to_nothing() {
    let cfg = Config::new();
    assert!(cfg.flattened_keys(&Options::new()).is_empty());
}

#[test]
fn explicit_nil_is_a_leaf() -> Result<()> {
    let opts = Options::new().path_sep(".");
    let cfg = Config::from_source(&json!({"a": {"gone": null}}), &opts)?;
    assert_eq!(
        keys(&cfg, &opts),
        ["a.gone"].into_iter().map(str::to_string).collect()
    );
    Ok(())
}

#[test]
fn unresolved_references_are_leaves() -> Result<()> {
    let opts = Options::new().path_sep(".").var_exp();
    let cfg = Config::from_source(&json!({"a": "${b}", "b": "x"}), &opts)?;
    assert_eq!(
        keys(&cfg, &opts),
        ["a", "b"].into_iter().map(str::to_string).collect()
    );
    Ok(())
}

#[test]
fn removal_updates_the_flattened_view() -> Result<()> {
    let opts = Options::new().path_sep(".");
    let cfg = Config::from_source(&json!({"a": {"x": 1, "y": 2}}), &opts)?;
    cfg.remove("a.x", None, &opts)?;
    assert_eq!(
        keys(&cfg, &opts),
        ["a.y"].into_iter().map(str::to_string).collect()
    );
    Ok(())
}
