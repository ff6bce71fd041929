mod common;

use cucumber_api::{Config, FunctionSource, Suite, Variable};

use self::common::{feature, registry, RecordingHook, TestEvaluator};

#[tokio::test]
async fn hooks_observe_the_run() {
    let hook = RecordingHook::default();
    let suite = Suite::new(TestEvaluator, registry()).with_hook(hook.clone());

    let result = suite.run_feature(feature("vetoed.feature").await, None).await;

    assert_eq!(result.scenarios.len(), 2);
    assert_eq!(
        hook.events(),
        [
            "before feature vetoed",
            "before scenario kept",
            "after step def value = 1",
            "after scenario kept",
            "before scenario skipped",
            "after step def value = 2",
            "after scenario skipped",
            "after feature vetoed.feature",
        ],
    );
}

#[tokio::test]
async fn before_feature_veto_runs_nothing() {
    let hook = RecordingHook { veto_feature: true, ..RecordingHook::default() };
    let suite = Suite::new(TestEvaluator, registry()).with_hook(hook.clone());

    let result = suite.run_feature(feature("vetoed.feature").await, None).await;

    assert!(result.is_empty());
    assert_eq!(hook.events(), ["before feature vetoed"]);
}

#[tokio::test]
async fn before_scenario_veto_drops_the_scenario() {
    let hook = RecordingHook {
        veto_scenario: Some("skipped".into()),
        ..RecordingHook::default()
    };
    let suite = Suite::new(TestEvaluator, registry()).with_hook(hook.clone());

    let result = suite.run_feature(feature("vetoed.feature").await, None).await;

    let names = result.scenarios.iter().map(|s| s.scenario.name.as_str()).collect::<Vec<_>>();
    assert_eq!(names, ["kept"]);
    assert!(!hook.events().contains(&"after scenario skipped".to_owned()));
}

#[tokio::test]
async fn configured_after_functions_run() {
    let config = Config {
        after_scenario: Some(Variable::Function(FunctionSource::new("() => missing"))),
        after_feature: Some(Variable::Function(FunctionSource::new("() => 1"))),
        ..Config::default()
    };
    let suite = Suite::new(TestEvaluator, registry()).with_config(config);

    let result = suite.run_feature(feature("vetoed.feature").await, None).await;

    // A failing after-scenario function is only logged.
    assert!(!result.is_failed(), "{}", result.error_message());
    assert_eq!(result.passed_count(), 2);
}
