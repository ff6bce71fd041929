mod common;

use cucumber_api::Suite;

use self::common::{feature, registry, TestEvaluator};

#[tokio::test]
async fn dynamic_outline_skips_non_map_rows() {
    let suite = Suite::new(TestEvaluator, registry()).max_concurrent_scenarios(2);

    let result = suite.run_feature(feature("dynamic.feature").await, None).await;

    let users = result
        .scenarios
        .iter()
        .filter(|s| s.scenario.name.starts_with("user"))
        .collect::<Vec<_>>();
    let names = users.iter().map(|s| s.scenario.name.as_str()).collect::<Vec<_>>();
    assert_eq!(names, ["user Billie", "user Bob"]);
    assert!(users.iter().all(|s| !s.is_failed()), "{}", result.failure_summary());
    assert_eq!(
        users.iter().map(|s| s.scenario.example_index).collect::<Vec<_>>(),
        [Some(0), Some(2)],
    );
}

#[tokio::test]
async fn failed_expansion_is_reported_as_a_failed_scenario() {
    let suite = Suite::new(TestEvaluator, registry());

    let result = suite.run_feature(feature("dynamic.feature").await, None).await;

    let broken = result
        .scenarios
        .iter()
        .find(|s| s.scenario.name == "broken")
        .expect("expansion failure must be reported");
    assert!(broken.is_failed());
    assert!(
        broken.error_message().is_some_and(|m| m.contains("missing")),
        "unexpected error: {:?}",
        broken.error_message(),
    );
    assert_eq!(result.failed_count(), 1);
}

#[tokio::test]
async fn static_rows_bind_their_columns() {
    let suite = Suite::new(TestEvaluator, registry());

    let result = suite.run_feature(feature("ordered.feature").await, None).await;

    let rows = result
        .scenarios
        .iter()
        .filter(|s| s.scenario.is_outline_example())
        .map(|s| s.scenario.example_data.clone().unwrap_or_default()["n"].clone())
        .collect::<Vec<_>>();
    assert_eq!(rows, ["a", "b", "c"]);
}
