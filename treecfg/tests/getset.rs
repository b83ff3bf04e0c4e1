//! Path-based setters, getters, removal, and tree navigation.

use anyhow::Result;
use serde_json::json;
use treecfg::{Config, Options};

fn dotted() -> Options {
    Options::new().path_sep(".")
}

#[test]
fn nested_setter_builds_intermediate_nodes() -> Result<()> {
    let opts = dotted();
    let cfg = Config::new();
    cfg.set_int("sub.test", Some(0), 42, &opts)?;

    let sub = cfg.child("sub", Some(0), &opts)?;
    assert_eq!(sub.get_int("test", Some(0), &opts)?, 42);
    assert_eq!(sub.path("."), "sub");
    assert!(sub.parent().expect("parent").is_same(&cfg));
    Ok(())
}

#[test]
fn set_then_get_round_trips_for_every_kind() -> Result<()> {
    let opts = dotted();
    let cfg = Config::new();
    cfg.set_bool("flags.on", None, true, &opts)?;
    cfg.set_int("nums.int", None, -3, &opts)?;
    cfg.set_uint("nums.uint", None, 7, &opts)?;
    cfg.set_float("nums.float", None, 1.25, &opts)?;
    cfg.set_str("strs.greeting", None, "hello", &opts)?;

    assert!(cfg.get_bool("flags.on", None, &opts)?);
    assert_eq!(cfg.get_int("nums.int", None, &opts)?, -3);
    assert_eq!(cfg.get_uint("nums.uint", None, &opts)?, 7);
    assert!((cfg.get_float("nums.float", None, &opts)? - 1.25).abs() < f64::EPSILON);
    assert_eq!(cfg.get_str("strs.greeting", None, &opts)?, "hello");
    Ok(())
}

#[test]
fn set_child_copies_an_already_parented_tree() -> Result<()> {
    let opts = dotted();
    let first = Config::new();
    let child = Config::new();
    child.set_int("x", None, 1, &opts)?;
    first.set_child("a", None, &child, &opts)?;

    let second = Config::new();
    second.set_child("b", None, &child, &opts)?;
    second.set_int("b.x", None, 2, &opts)?;

    // the copy diverged; the original tree is untouched
    assert_eq!(first.get_int("a.x", None, &opts)?, 1);
    assert_eq!(second.get_int("b.x", None, &opts)?, 2);
    Ok(())
}

#[test]
fn indexed_setter_extends_arrays_with_nil_holes() -> Result<()> {
    let opts = dotted();
    let cfg = Config::new();
    cfg.set_str("list", Some(2), "third", &opts)?;

    assert_eq!(cfg.count_field("list"), Some(3));
    assert_eq!(cfg.get_str("list", Some(2), &opts)?, "third");
    assert!(cfg.has("list", Some(0), &opts)?);
    Ok(())
}

#[test]
fn has_and_remove_interact_correctly() -> Result<()> {
    let opts = dotted();
    let cfg = Config::from_source(&json!({"a": {"b": 1, "keep": 2}}), &opts)?;

    assert!(cfg.has("a.b", None, &opts)?);
    assert!(cfg.remove("a.b", None, &opts)?);
    assert!(!cfg.has("a.b", None, &opts)?);

    // unrelated path untouched
    assert_eq!(cfg.get_int("a.keep", None, &opts)?, 2);

    // removing again reports nothing removed
    assert!(!cfg.remove("a.b", None, &opts)?);
    Ok(())
}

#[test]
fn remove_positional_element_shifts_the_tail() -> Result<()> {
    let opts = dotted();
    let cfg = Config::from_source(&json!({"list": [10, 20, 30]}), &opts)?;
    assert!(cfg.remove("list", Some(1), &opts)?);
    assert_eq!(cfg.count_field("list"), Some(2));
    assert_eq!(cfg.get_int("list", Some(1), &opts)?, 30);
    Ok(())
}

#[test]
fn path_of_and_keys_reflect_structure() -> Result<()> {
    let opts = dotted();
    let cfg = Config::from_source(&json!({"outer": {"inner": {"leaf": 1}}}), &opts)?;
    let inner = cfg.child("outer.inner", None, &opts)?;
    assert_eq!(inner.path("."), "outer.inner");
    assert_eq!(inner.path_of("leaf", "."), "outer.inner.leaf");
    assert_eq!(inner.keys(), vec!["leaf".to_string()]);
    Ok(())
}

#[test]
fn escape_path_addresses_a_dotted_name() -> Result<()> {
    let opts = dotted().escape_path(true);
    let cfg = Config::new();
    cfg.set_int("[dotted.name]", None, 9, &opts)?;
    assert!(cfg.has_field("dotted.name"));
    assert_eq!(cfg.get_int("[dotted.name]", None, &opts)?, 9);
    Ok(())
}

#[test]
fn numeric_steps_beyond_max_idx_are_names() -> Result<()> {
    let opts = dotted().max_idx(10);
    let cfg = Config::new();
    cfg.set_int("list.99", None, 1, &opts)?;
    let list = cfg.child("list", None, &opts)?;
    assert!(list.has_field("99"));
    assert!(!list.is_array());
    Ok(())
}

#[test]
fn metadata_tags_travel_with_values() -> Result<()> {
    let opts = dotted().meta(treecfg::Meta::source("unit-test"));
    let cfg = Config::new();
    cfg.set_int("tagged", None, 1, &opts)?;
    let v = cfg.value_at("tagged", None, &opts)?;
    assert_eq!(v.meta().map(|m| m.source.as_str()), Some("unit-test"));

    let from = Config::from_source(&json!({"x": 1}), &opts)?;
    assert_eq!(from.meta().map(|m| m.source), Some("unit-test".to_string()));
    Ok(())
}

#[test]
fn is_array_distinguishes_node_shapes() -> Result<()> {
    let opts = dotted();
    let cfg = Config::from_source(&json!({"list": [1], "obj": {"a": 1}}), &opts)?;
    assert!(cfg.child("list", None, &opts)?.is_array());
    assert!(!cfg.child("obj", None, &opts)?.is_array());
    Ok(())
}
