mod common;

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use cucumber_api::{
    parser::Basic, Config, NativeFn, Suite, Variable, Vars,
};

use self::common::{feature, registry, RecordingTransport, TestEvaluator};

fn scenario<'r>(
    result: &'r cucumber_api::FeatureResult,
    name: &str,
) -> &'r cucumber_api::ScenarioResult {
    result
        .scenarios
        .iter()
        .find(|s| s.scenario.name == name)
        .unwrap_or_else(|| panic!("no scenario `{name}` in {:?}", result.scenarios))
}

#[tokio::test]
async fn feature_calls_bind_results() {
    let suite = Suite::new(TestEvaluator, registry());

    let result = suite.run_feature(feature("callers.feature").await, None).await;

    for name in ["plain call", "call with argument", "shared call", "loop call"] {
        let sc = scenario(&result, name);
        assert!(!sc.is_failed(), "`{name}` failed: {:?}", sc.error_message());
    }
}

#[tokio::test]
async fn loop_over_a_non_map_fails_with_its_index() {
    let suite = Suite::new(TestEvaluator, registry());

    let result = suite.run_feature(feature("callers.feature").await, None).await;

    let failed = scenario(&result, "loop over a non-map");
    let message = failed.error_message().expect("loop call must fail");
    assert!(message.contains("loop index 1"), "unexpected error: {message}");
    assert_eq!(result.failed_count(), 1);
}

#[tokio::test]
async fn loop_collects_every_failed_iteration() {
    let text = "\
Feature: looping

  Scenario: loop
    * calling 'classpath:tests/features/picky.feature' as r with [{ \"n\": 1 }, { \"n\": 2 }, { \"n\": 3 }]
";
    let looping = Arc::new(Basic::new().parse_str(text, None).unwrap());
    let suite = Suite::new(TestEvaluator, registry());

    let result = suite.run_feature(looping, None).await;

    let message = result.error_message();
    assert!(
        message.contains("feature call (loop) failed at index 1"),
        "unexpected error: {message}",
    );
    assert!(
        message.contains("feature call (loop) failed at index 2"),
        "unexpected error: {message}",
    );
    assert!(!message.contains("index 0"), "unexpected error: {message}");
}

#[tokio::test]
async fn called_feature_selects_by_tag() {
    let suite = Suite::new(TestEvaluator, registry());

    let result = suite.run_feature(feature("selecting.feature").await, None).await;

    assert!(!result.is_failed(), "{}", result.error_message());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn callonce_runs_once_per_key_under_concurrency() {
    let transport = RecordingTransport::default();
    let suite = Suite::new(TestEvaluator, registry())
        .with_transport(transport.clone())
        .max_concurrent_scenarios(4);

    let result = suite.run_feature(feature("once.feature").await, None).await;

    assert!(!result.is_failed(), "{}", result.error_message());
    let requests = transport.requests.lock().unwrap();
    // One plain and one shared-scope `callonce` line.
    assert_eq!(requests.len(), 2, "requests: {requests:?}");
    assert!(requests.iter().all(|r| r.path == "/counted"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn callonce_is_shared_across_features_when_configured() {
    let transport = RecordingTransport::default();
    let suite = Suite::new(TestEvaluator, registry())
        .with_transport(transport.clone())
        .with_config(Config { shared_call_once: true, ..Config::default() })
        .max_concurrent_scenarios(4);
    let once = feature("once.feature").await;

    let results = suite.run([Arc::clone(&once), once]).await;

    assert!(results.iter().all(|r| !r.is_failed()));
    assert_eq!(transport.requests.lock().unwrap().len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn callsingle_runs_once_per_suite() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = {
        let calls = Arc::clone(&calls);
        NativeFn::new("counter", move |_| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            Ok(serde_json::json!({ "token": "t", "n": n }).into())
        })
    };
    let mut args = Vars::new();
    _ = args.insert("counter".into(), Variable::Native(counter));

    let text = "\
Feature: single

  Scenario: one
    * callsingle counter as auth
    * match auth.n == 0

  Scenario: two
    * callsingle counter as auth
    * match auth.n == 0

  Scenario: three
    * callsingle counter as auth
    * match auth.token == 't'
";
    let single = Arc::new(Basic::new().parse_str(text, None).unwrap());
    let suite = Suite::new(TestEvaluator, registry()).max_concurrent_scenarios(3);

    let (a, b) = tokio::join!(
        suite.run_feature(Arc::clone(&single), Some(args.clone())),
        suite.run_feature(single, Some(args)),
    );

    assert!(!a.is_failed(), "{}", a.error_message());
    assert!(!b.is_failed(), "{}", b.error_message());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn missing_feature_fails_the_calling_step() {
    let text = "\
Feature: missing

  Scenario: call
    * calling 'nowhere.feature' as result
";
    let missing = Arc::new(Basic::new().parse_str(text, None).unwrap());
    let suite = Suite::new(TestEvaluator, registry());

    let result = suite.run_feature(missing, None).await;

    let message = result.error_message();
    assert!(message.contains("nowhere.feature"), "unexpected error: {message}");
}
