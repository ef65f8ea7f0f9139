//! Integration test: rule-set files end-to-end via Checker and GraphReducer.
//!
//! Uses fixture files under `tests/fixtures/rules/` to verify that the
//! full TOML → DTO → RuleSet → Checker / GraphReducer pipeline classifies
//! and reduces a small dependency graph correctly.

use std::path::PathBuf;
use std::sync::Arc;

use dep_lint_core::declarative;
use dep_lint_core::{
    Checker, Config, Dependency, EngineConfig, GraphReducer, Item, ItemType, Outcome, RuleSet,
    Severity,
};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures/rules")
        .join(name)
}

fn load_fixture() -> Arc<RuleSet> {
    declarative::load_rules_from_file(&fixture("main.toml"), &EngineConfig::default())
        .expect("fixture rules should load")
}

fn class_type(set: &RuleSet) -> Arc<ItemType> {
    set.item_type("CLASS")
        .cloned()
        .expect("CLASS type should be declared")
}

fn dep(t: &Arc<ItemType>, using: [&str; 2], used: [&str; 2], count: usize) -> Dependency {
    Dependency::new(
        Item::new(t, using).expect("arity"),
        Item::new(t, used).expect("arity"),
        count,
    )
}

fn fixture_dependencies(t: &Arc<ItemType>) -> Vec<Dependency> {
    vec![
        dep(t, ["com.acme.billing.core", "Invoice"], ["com.acme.billing.api", "Money"], 3),
        dep(t, ["com.acme.billing.core", "Invoice"], ["com.acme.shipping.api", "Parcel"], 5),
        dep(t, ["com.acme.shipping.core", "Parcel"], ["com.acme.billing.api", "Money"], 2),
        dep(t, ["com.acme.shipping.core", "Parcel"], ["com.acme.shipping.util", "LegacyDate"], 1),
        dep(t, ["com.acme.billing.core", "Invoice"], ["java.util", "List"], 4),
        dep(t, ["org.other", "X"], ["java.util", "List"], 1),
        dep(t, ["com.acme.billing.core", "Payment"], ["com.acme.shipping.api", "Label"], 2),
    ]
}

// ── Checking ──

#[test]
fn classifies_fixture_graph() {
    let rules = load_fixture();
    assert!(rules.all_skipped().is_empty(), "{:#?}", rules.all_skipped());
    let t = class_type(&rules);
    let mut deps = fixture_dependencies(&t);

    let mut checker = Checker::builder()
        .rule_set(Arc::clone(&rules))
        .build()
        .expect("checker should build");
    let result = checker.check(&mut deps);

    assert_eq!(result.dependencies_checked, 7);
    assert_eq!(
        result.violations.len(),
        5,
        "{:#?}",
        result
            .violations
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
    );
    assert_eq!(result.by_outcome(Outcome::Questionable).len(), 2);
    assert_eq!(result.by_outcome(Outcome::Forbidden).len(), 1);
    assert_eq!(result.by_outcome(Outcome::Unmatched).len(), 2);
    assert_eq!(result.count_by_severity(), (3, 2, 0));
    assert!(result.has_violations_at(Severity::Error));

    let forbidden = result.by_outcome(Outcome::Forbidden)[0];
    assert_eq!(forbidden.used, "com.acme.shipping.util:LegacyDate");
    assert_eq!(forbidden.group.as_deref(), Some("default"));

    assert_eq!(deps[0].bad_count(), 0);
    assert_eq!(deps[1].questionable_count(), 5);
    assert_eq!(deps[2].bad_count(), 2);
    assert_eq!(deps[3].bad_count(), 1);
    assert_eq!(deps[5].bad_count(), 1);
}

#[test]
fn reports_rules_that_never_matched() {
    let rules = load_fixture();
    let t = class_type(&rules);
    let mut deps = fixture_dependencies(&t);
    let mut checker = Checker::builder()
        .rule_set(Arc::clone(&rules))
        .build()
        .expect("checker should build");
    checker.check(&mut deps);

    let unused: Vec<String> = rules
        .unused_rules()
        .iter()
        .map(|r| r.text().to_string())
        .collect();
    assert_eq!(unused, ["** ---! com.acme.billing.internal.**"]);
}

// ── Reduction ──

#[test]
fn reduces_fixture_graph_to_modules() {
    let rules = load_fixture();
    let t = class_type(&rules);
    let mut deps = fixture_dependencies(&t);
    let mut checker = Checker::builder()
        .rule_set(Arc::clone(&rules))
        .build()
        .expect("checker should build");
    checker.check(&mut deps);

    let reducer = GraphReducer::from_rule_set(&rules);
    assert_eq!(reducer.projections().len(), 2);
    let graph = reducer.reduce(&deps);

    assert_eq!(graph.dropped, 1);
    let edges: Vec<(String, usize, usize, usize)> = graph
        .dependencies
        .iter()
        .map(|d| {
            (
                d.to_string(),
                d.count(),
                d.questionable_count(),
                d.bad_count(),
            )
        })
        .collect();
    assert_eq!(
        edges,
        [
            ("billing -> billing".to_string(), 3, 0, 0),
            ("billing -> shipping".to_string(), 7, 7, 0),
            ("shipping -> billing".to_string(), 2, 0, 2),
            ("shipping -> shipping".to_string(), 1, 0, 1),
            ("billing -> jdk".to_string(), 4, 0, 0),
        ]
    );
    assert!(rules.unused_projections().is_empty());
}

// ── Pattern language examples ──

const CLASS_TYPE: &str = r#"
[[item-types]]
name = "CLASS"
fields = ["NAMESPACE", "CLASS"]
"#;

fn check_inline(rules_toml: &str, pairs: &[([&str; 2], [&str; 2])]) -> Vec<Outcome> {
    let set = declarative::load_rules_from_toml(&format!("{CLASS_TYPE}\n{rules_toml}"))
        .expect("inline rules should load");
    let t = class_type(&set);
    let mut group = set.default_group().clone();
    pairs
        .iter()
        .map(|(using, used)| group.classify(&dep(&t, *using, *used, 1)).outcome)
        .collect()
}

#[test]
fn wildcard_matches_namespace_prefix() {
    let outcomes = check_inline(
        "[[rules]]\nrule = \"** ---> A.*:B\"\n",
        &[(["x", "y"], ["A.Foo", "B"]), (["x", "y"], ["A.Foo", "C"])],
    );
    assert_eq!(outcomes, [Outcome::Allowed, Outcome::Unmatched]);
}

#[test]
fn backreference_correlates_packages() {
    let outcomes = check_inline(
        "[[rules]]\nrule = '(*):* ---> \\1:*'\n",
        &[(["Pkg1", "X"], ["Pkg1", "Y"]), (["Pkg1", "X"], ["Pkg2", "Y"])],
    );
    assert_eq!(outcomes, [Outcome::Allowed, Outcome::Unmatched]);
}

#[test]
fn forbidden_wins_over_allowed() {
    let outcomes = check_inline(
        r#"
[[rules]]
rule = "** ---> **:*"

[[rules]]
rule = "** ---! **:Legacy*"
"#,
        &[(["app", "Main"], ["lib", "LegacyUtil"]), (["app", "Main"], ["lib", "Util"])],
    );
    assert_eq!(outcomes, [Outcome::Forbidden, Outcome::Allowed]);
}

#[test]
fn projection_merges_parallel_edges() {
    let set = declarative::load_rules_from_toml(&format!(
        "{CLASS_TYPE}\n[[projections]]\nsource = \"com.acme.*:**\"\ntargets = ['\\1']\n"
    ))
    .expect("inline rules should load");
    let t = class_type(&set);
    let deps = vec![
        dep(&t, ["com.acme.billing", "Invoice"], ["com.acme.shipping", "Parcel"], 3),
        dep(&t, ["com.acme.billing", "Payment"], ["com.acme.shipping", "Label"], 5),
    ];

    let graph = GraphReducer::from_rule_set(&set).reduce(&deps);
    assert_eq!(graph.dependencies.len(), 1);
    let edge = &graph.dependencies[0];
    assert_eq!(edge.using().values(), ["billing".to_string(), String::new()]);
    assert_eq!(edge.count(), 8);
}

// ── Configuration ──

#[test]
fn engine_config_applies_to_loaded_types() {
    let dir = tempfile::tempdir().expect("tempdir");
    let rules_path = dir.path().join("rules.toml");
    std::fs::write(
        &rules_path,
        format!("{CLASS_TYPE}\n[[rules]]\nrule = \"** ---> com.acme.**\"\n"),
    )
    .expect("write rules");

    let config = Config::parse("[engine]\nignore_case = true\ncache_capacity = 16\n")
        .expect("config should parse");
    let rules = declarative::load_rules_from_file(&rules_path, &config.engine)
        .expect("rules should load");
    let t = class_type(&rules);
    assert!(t.ignore_case());

    let mut checker = Checker::builder().rule_set(rules).build().expect("checker");
    let mut deps = vec![dep(&t, ["x", "X"], ["COM.ACME.Billing", "Y"], 1)];
    assert!(checker.check(&mut deps).violations.is_empty());
}
