// tests/delta_reconciliation.rs

mod common;
use crate::common::init_tracing;

use std::path::PathBuf;

use suitewatch::engine::DeltaEngine;
use suitewatch::errors::SuitewatchError;
use suitewatch::suite::SuiteSpec;
use suitewatch::WatchConfig;
use suitewatch_test_utils::builders::{SuiteDirBuilder, modify_after_delay};
use suitewatch_test_utils::fake_suite::FakeSuiteFactory;

fn engine_with(factory: FakeSuiteFactory) -> DeltaEngine<FakeSuiteFactory> {
    DeltaEngine::new(WatchConfig::default(), factory).unwrap()
}

fn suite_dir(root: &std::path::Path, name: &str) -> PathBuf {
    SuiteDirBuilder::new(root.join(name))
        .with_code_file("thing.go")
        .with_test_file("thing_test.go")
        .build()
}

#[test]
fn first_pass_reports_every_suite_as_new() {
    init_tracing();
    let tmp = tempfile::tempdir().unwrap();
    let a = suite_dir(tmp.path(), "a");
    let b = suite_dir(tmp.path(), "b");

    let factory = FakeSuiteFactory::new();
    let probe = factory.clone();
    let mut engine = engine_with(factory);

    let specs = vec![SuiteSpec::new(&a), SuiteSpec::new(&b)];
    let (delta, errors) = engine.delta(&specs);

    assert!(errors.is_empty());
    assert_eq!(delta.new_suites, vec![a.clone(), b.clone()]);
    assert!(delta.modified_suites.is_empty());
    assert!(delta.removed_suites.is_empty());
    assert_eq!(probe.constructed(), vec![a, b]);

    // Nothing happened since: the follow-up pass is empty.
    let (delta, errors) = engine.delta(&specs);
    assert!(errors.is_empty());
    assert!(delta.is_empty());
}

#[test]
fn an_edit_marks_the_suite_until_it_runs() {
    init_tracing();
    let tmp = tempfile::tempdir().unwrap();
    let a = suite_dir(tmp.path(), "a");
    let specs = vec![SuiteSpec::new(&a)];

    let mut engine = engine_with(FakeSuiteFactory::new());
    engine.delta(&specs);

    modify_after_delay(&a.join("thing.go"), "package code // edited, longer\n");

    // First pass after the edit: the sweep sees the digest move and the
    // suite's timestamps put it over its last run.
    let (delta, _) = engine.delta(&specs);
    assert_eq!(delta.modified_packages, vec![a.clone()]);
    assert_eq!(delta.modified_suites, vec![a.clone()]);

    // The digest change was consumed, but the suite still has not run, so
    // it keeps being reported through its timestamps.
    let (delta, _) = engine.delta(&specs);
    assert!(delta.modified_packages.is_empty());
    assert_eq!(delta.modified_suites, vec![a.clone()]);

    engine.will_run(&SuiteSpec::new(&a)).unwrap();

    let (delta, _) = engine.delta(&specs);
    assert!(delta.is_empty());
}

#[test]
fn removed_suites_are_dropped_and_rediscovered_as_new() {
    init_tracing();
    let tmp = tempfile::tempdir().unwrap();
    let a = suite_dir(tmp.path(), "a");

    let mut engine = engine_with(FakeSuiteFactory::new());

    let (delta, _) = engine.delta(&[SuiteSpec::new(&a)]);
    assert_eq!(delta.new_suites, vec![a.clone()]);

    let (delta, _) = engine.delta(&[]);
    assert_eq!(delta.removed_suites, vec![a.clone()]);

    // Dropped state: running it now is an error, and providing it again
    // makes it a brand-new suite.
    let err = engine.will_run(&SuiteSpec::new(&a)).unwrap_err();
    match err {
        SuitewatchError::UnknownSuite(path) => assert_eq!(path, a),
        other => panic!("expected UnknownSuite, got {other:?}"),
    }

    let (delta, _) = engine.delta(&[SuiteSpec::new(&a)]);
    assert_eq!(delta.new_suites, vec![a]);
}

#[test]
fn construction_failures_are_isolated_and_retried() {
    init_tracing();
    let tmp = tempfile::tempdir().unwrap();
    let good = suite_dir(tmp.path(), "good");
    let bad = suite_dir(tmp.path(), "bad");

    let factory = FakeSuiteFactory::new().failing_construction_for(&bad);
    let mut engine = engine_with(factory);

    let specs = vec![SuiteSpec::new(&good), SuiteSpec::new(&bad)];
    let (delta, errors) = engine.delta(&specs);

    assert_eq!(delta.new_suites, vec![good.clone()]);
    let err = errors.get(&bad).expect("the bad suite should carry an error");
    assert!(matches!(err, SuitewatchError::Other(_)));
    assert!(err.to_string().contains("scripted construction failure"));

    // The failed suite stays unknown and is retried on the next pass.
    let (delta, errors) = engine.delta(&specs);
    assert!(delta.new_suites.is_empty());
    assert!(errors.contains_key(&bad));
    assert!(engine.will_run(&SuiteSpec::new(&bad)).is_err());
    engine.will_run(&SuiteSpec::new(&good)).unwrap();
}

#[test]
fn shared_dependency_marks_every_dependent_suite() {
    init_tracing();
    let tmp = tempfile::tempdir().unwrap();
    let a = suite_dir(tmp.path(), "a");
    let b = suite_dir(tmp.path(), "b");
    let shared = suite_dir(tmp.path(), "shared");

    let factory = FakeSuiteFactory::new()
        .with_dependency(&a, &shared)
        .with_dependency(&b, &shared);
    let mut engine = engine_with(factory);

    let specs = vec![SuiteSpec::new(&a), SuiteSpec::new(&b)];
    engine.delta(&specs);

    modify_after_delay(&shared.join("thing.go"), "package code // edited, longer\n");

    // Both suites count the shared directory once; the tie breaks by path.
    let (delta, _) = engine.delta(&specs);
    assert_eq!(delta.modified_suites, vec![a, b]);
}

#[test]
fn modified_suites_order_by_descending_change_count() {
    init_tracing();
    let tmp = tempfile::tempdir().unwrap();
    // Deliberately give the most-affected suite the lexicographically later
    // path, so count ordering is distinguishable from path ordering.
    let zz = suite_dir(tmp.path(), "zz");
    let aa = suite_dir(tmp.path(), "aa");
    let dep_one = suite_dir(tmp.path(), "dep_one");
    let dep_two = suite_dir(tmp.path(), "dep_two");

    let factory = FakeSuiteFactory::new()
        .with_dependency(&zz, &dep_one)
        .with_dependency(&zz, &dep_two);
    let mut engine = engine_with(factory);

    let specs = vec![SuiteSpec::new(&zz), SuiteSpec::new(&aa)];
    engine.delta(&specs);

    modify_after_delay(&dep_one.join("thing.go"), "package code // edited, longer\n");
    modify_after_delay(&dep_two.join("thing.go"), "package code // edited, longer\n");
    modify_after_delay(&aa.join("thing.go"), "package code // edited, longer\n");

    let (delta, _) = engine.delta(&specs);
    assert_eq!(delta.modified_suites, vec![zz, aa]);
}

#[test]
fn pruning_follows_suite_removal() {
    init_tracing();
    let tmp = tempfile::tempdir().unwrap();
    let a = suite_dir(tmp.path(), "a");
    let b = suite_dir(tmp.path(), "b");
    let shared = suite_dir(tmp.path(), "shared");

    let factory = FakeSuiteFactory::new()
        .with_dependency(&a, &shared)
        .with_dependency(&b, &shared);
    let mut engine = engine_with(factory);

    engine.delta(&[SuiteSpec::new(&a), SuiteSpec::new(&b)]);
    assert!(engine.registry().get(&shared).is_some());

    // Dropping b keeps the shared directory alive through a, but b's own
    // directory loses its last user.
    let (delta, _) = engine.delta(&[SuiteSpec::new(&a)]);
    assert_eq!(delta.removed_suites, vec![b.clone()]);
    assert!(engine.registry().get(&shared).is_some());
    assert!(engine.registry().get(&b).is_none());

    // Dropping a as well clears the registry entirely.
    engine.delta(&[]);
    assert!(engine.registry().get(&shared).is_none());
    assert!(engine.registry().get(&a).is_none());
}

#[test]
fn failing_run_marking_propagates_the_error() {
    init_tracing();
    let tmp = tempfile::tempdir().unwrap();
    let a = suite_dir(tmp.path(), "a");

    let factory = FakeSuiteFactory::new().failing_mark_for(&a);
    let mut engine = engine_with(factory);
    engine.delta(&[SuiteSpec::new(&a)]);

    let err = engine.will_run(&SuiteSpec::new(&a)).unwrap_err();
    assert!(matches!(err, SuitewatchError::Other(_)));
    assert!(err.to_string().contains("scripted mark failure"));
}

#[test]
fn duplicate_specs_collapse_to_one_suite() {
    init_tracing();
    let tmp = tempfile::tempdir().unwrap();
    let a = suite_dir(tmp.path(), "a");

    let factory = FakeSuiteFactory::new();
    let probe = factory.clone();
    let mut engine = engine_with(factory);

    let (delta, errors) = engine.delta(&[SuiteSpec::new(&a), SuiteSpec::new(&a)]);
    assert!(errors.is_empty());
    assert_eq!(delta.new_suites, vec![a.clone()]);
    assert_eq!(probe.constructed(), vec![a]);
}

#[test]
fn delta_serializes_for_change_reporting() {
    init_tracing();
    let tmp = tempfile::tempdir().unwrap();
    let a = suite_dir(tmp.path(), "a");

    let mut engine = engine_with(FakeSuiteFactory::new());
    let (delta, _) = engine.delta(&[SuiteSpec::new(&a)]);

    let rendered = toml::to_string(&delta).unwrap();
    assert!(rendered.contains("new_suites"));
    assert!(rendered.contains(a.to_str().unwrap()));
}

#[test]
fn deleted_suite_directory_keeps_the_suite_marked() {
    init_tracing();
    let tmp = tempfile::tempdir().unwrap();
    let a = suite_dir(tmp.path(), "a");
    let specs = vec![SuiteSpec::new(&a)];

    let mut engine = engine_with(FakeSuiteFactory::new());
    engine.delta(&specs);

    suitewatch_test_utils::builders::remove_dir(&a);

    // A vanished directory is a change on every pass, and the suite counts
    // it through the deleted flag.
    let (delta, _) = engine.delta(&specs);
    assert_eq!(delta.modified_packages, vec![a.clone()]);
    assert_eq!(delta.modified_suites, vec![a.clone()]);

    let (delta, _) = engine.delta(&specs);
    assert_eq!(delta.modified_packages, vec![a.clone()]);
    assert_eq!(delta.modified_suites, vec![a.clone()]);
}
