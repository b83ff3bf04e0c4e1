//! Variable expansion: references, defaults, resolvers, cycle detection.

use anyhow::Result;
use serde_json::json;
use treecfg::{Config, Error, Options};

fn varexp() -> Options {
    Options::new().path_sep(".").var_exp()
}

#[test]
fn reference_resolves_within_the_tree() -> Result<()> {
    let opts = varexp();
    let cfg = Config::from_source(
        &json!({"base": "/var/app", "data": "${base}/data"}),
        &opts,
    )?;
    assert_eq!(cfg.get_str("data", None, &opts)?, "/var/app/data");
    Ok(())
}

#[test]
fn references_chase_through_references() -> Result<()> {
    let opts = varexp();
    let cfg = Config::from_source(
        &json!({"a": "${b}", "b": "${c}", "c": "leaf"}),
        &opts,
    )?;
    assert_eq!(cfg.get_str("a", None, &opts)?, "leaf");
    Ok(())
}

#[test]
fn nested_references_compose_paths() -> Result<()> {
    let opts = varexp();
    let cfg = Config::from_source(
        &json!({"selector": "blue", "themes": {"blue": "#00f"}, "color": "${themes.${selector}}"}),
        &opts,
    )?;
    assert_eq!(cfg.get_str("color", None, &opts)?, "#00f");
    Ok(())
}

#[test]
fn references_can_yield_typed_values() -> Result<()> {
    let opts = varexp();
    let cfg = Config::from_source(&json!({"port": 8080, "alias": "${port}"}), &opts)?;
    assert_eq!(cfg.get_int("alias", None, &opts)?, 8080);
    Ok(())
}

#[test]
fn self_reference_without_resolver_is_cyclic() -> Result<()> {
    let opts = varexp();
    let cfg = Config::from_source(&json!({"top": "${top}"}), &opts)?;
    let err = cfg.get_str("top", None, &opts).expect_err("cycle");
    assert!(err.is_cyclic());
    Ok(())
}

#[test]
fn self_reference_falls_back_to_a_resolver() -> Result<()> {
    let opts = varexp();
    let cfg = Config::from_source(&json!({"top": "${top}"}), &opts)?;

    let with_resolver = opts.clone().resolve(|name| {
        if name == "top" {
            Ok("found".to_string())
        } else {
            Err(Error::missing(name.to_string()))
        }
    });
    assert_eq!(cfg.get_str("top", None, &with_resolver)?, "found");
    Ok(())
}

#[test]
fn mutual_references_are_cyclic() -> Result<()> {
    let opts = varexp();
    let cfg = Config::from_source(&json!({"a": "${b}", "b": "${a}"}), &opts)?;
    let err = cfg.get_str("a", None, &opts).expect_err("cycle");
    assert!(err.is_cyclic());
    Ok(())
}

#[test]
fn cycle_state_is_discarded_between_lookups() -> Result<()> {
    let opts = varexp();
    let cfg = Config::from_source(&json!({"a": "${b}", "b": "ok"}), &opts)?;
    assert_eq!(cfg.get_str("a", None, &opts)?, "ok");
    assert_eq!(cfg.get_str("a", None, &opts)?, "ok");
    Ok(())
}

#[test]
fn plain_default_applies_when_path_is_missing() -> Result<()> {
    let opts = varexp();
    let cfg = Config::from_source(&json!({"val": "${missing:plain default}"}), &opts)?;
    assert_eq!(cfg.get_str("val", None, &opts)?, "plain default");
    Ok(())
}

#[test]
fn default_can_itself_be_a_reference() -> Result<()> {
    let opts = varexp();
    let cfg = Config::from_source(&json!({"x": "${a:${b}}", "b": "Z"}), &opts)?;
    assert_eq!(cfg.get_str("x", None, &opts)?, "Z");
    Ok(())
}

#[test]
fn colons_inside_a_default_are_literal() -> Result<()> {
    let opts = varexp();
    let cfg = Config::from_source(&json!({"url": "${a:http://host:1234}"}), &opts)?;
    assert_eq!(cfg.get_str("url", None, &opts)?, "http://host:1234");
    Ok(())
}

#[test]
fn present_path_ignores_the_default() -> Result<()> {
    let opts = varexp();
    let cfg = Config::from_source(&json!({"a": "actual", "v": "${a:fallback}"}), &opts)?;
    assert_eq!(cfg.get_str("v", None, &opts)?, "actual");
    Ok(())
}

#[test]
fn escaped_dollar_is_not_expanded() -> Result<()> {
    let opts = varexp();
    let cfg = Config::from_source(&json!({"tpl": "$${not.a.ref}"}), &opts)?;
    assert_eq!(cfg.get_str("tpl", None, &opts)?, "${not.a.ref}");
    Ok(())
}

#[test]
fn environment_resolver_reads_process_env() -> Result<()> {
    let _guard = test_helpers::env::set_var("TREECFG_VARIABLES_HOME", "/home/app");
    let opts = varexp().resolve_env();
    let cfg = Config::from_source(&json!({"home": "${TREECFG_VARIABLES_HOME}"}), &opts)?;
    assert_eq!(cfg.get_str("home", None, &opts)?, "/home/app");
    Ok(())
}

#[test]
fn tree_lookup_wins_over_the_environment() -> Result<()> {
    let _guard = test_helpers::env::set_var("TREECFG_VARIABLES_SHADOWED", "from-env");
    let opts = varexp().resolve_env();
    let cfg = Config::from_source(
        &json!({"TREECFG_VARIABLES_SHADOWED": "from-tree", "v": "${TREECFG_VARIABLES_SHADOWED}"}),
        &opts,
    )?;
    assert_eq!(cfg.get_str("v", None, &opts)?, "from-tree");
    Ok(())
}

#[test]
fn noop_resolver_keeps_the_template() -> Result<()> {
    let opts = varexp().resolve_noop();
    let cfg = Config::from_source(&json!({"v": "${not.there}"}), &opts)?;
    assert_eq!(cfg.get_str("v", None, &opts)?, "${not.there}");
    Ok(())
}

#[test]
fn resolvers_run_in_registration_order() -> Result<()> {
    let opts = varexp()
        .resolve(|_| Err(Error::missing("first")))
        .resolve(|_| Ok("second".to_string()))
        .resolve(|_| Ok("third".to_string()));
    let cfg = Config::from_source(&json!({"v": "${missing}"}), &opts)?;
    assert_eq!(cfg.get_str("v", None, &opts)?, "second");
    Ok(())
}

#[test]
fn missing_without_alternatives_surfaces_missing() -> Result<()> {
    let opts = varexp();
    let cfg = Config::from_source(&json!({"v": "${absent.path}"}), &opts)?;
    let err = cfg.get_str("v", None, &opts).expect_err("missing");
    assert!(err.is_missing());
    Ok(())
}

#[test]
fn splices_concatenate_literals_and_references() -> Result<()> {
    let opts = varexp();
    let cfg = Config::from_source(
        &json!({"host": "example.org", "port": 443, "url": "https://${host}:${port}/api"}),
        &opts,
    )?;
    assert_eq!(cfg.get_str("url", None, &opts)?, "https://example.org:443/api");
    Ok(())
}

#[test]
fn expansion_survives_merging_unresolved() -> Result<()> {
    let opts = varexp();
    let cfg = Config::from_source(&json!({"v": "${name}"}), &opts)?;
    cfg.merge(&json!({"name": "late"}), &opts)?;
    assert_eq!(cfg.get_str("v", None, &opts)?, "late");
    Ok(())
}
