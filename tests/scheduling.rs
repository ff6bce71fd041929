mod common;

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use cucumber_api::{parser::Basic, Suite, WorkScheduler, WorkerPool};
use futures::stream;
use rand::Rng as _;

use self::common::{feature, registry, TestEvaluator};

fn names(result: &cucumber_api::FeatureResult) -> Vec<&str> {
    result.scenarios.iter().map(|s| s.scenario.name.as_str()).collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn results_keep_declaration_order_with_a_pool() {
    let suite = Suite::new(TestEvaluator, registry()).max_concurrent_scenarios(4);

    let result = suite.run_feature(feature("ordered.feature").await, None).await;

    assert_eq!(
        names(&result),
        ["first", "second", "row a", "row b", "row c", "last"],
        "failures: {}",
        result.failure_summary(),
    );
    assert!(!result.is_failed(), "{}", result.failure_summary());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn results_keep_declaration_order_under_random_delays() {
    let mut rng = rand::thread_rng();
    let mut text = String::from("Feature: random\n");
    for i in 0..12 {
        let millis = rng.gen_range(0..25);
        text.push_str(&format!(
            "\n  Scenario: scenario {i}\n    * delay {millis}\n    * def value = {i}\n",
        ));
    }
    let random = Arc::new(Basic::new().parse_str(&text, None).unwrap());
    let suite = Suite::new(TestEvaluator, registry()).max_concurrent_scenarios(4);

    let result = suite.run_feature(random, None).await;

    let expected = (0..12).map(|i| format!("scenario {i}")).collect::<Vec<_>>();
    assert_eq!(names(&result), expected, "delays:\n{text}");
    assert_eq!(result.passed_count(), 12, "{}", result.failure_summary());
}

#[tokio::test]
async fn results_keep_declaration_order_without_a_pool() {
    let suite = Suite::new(TestEvaluator, registry());

    let result = suite.run_feature(feature("ordered.feature").await, None).await;

    assert_eq!(
        names(&result),
        ["first", "second", "row a", "row b", "row c", "last"],
    );
    assert_eq!(result.passed_count(), 6);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn scheduler_completes_after_every_random_delay() {
    let pool = WorkerPool::new(3);
    let done = Arc::new(AtomicUsize::new(0));
    let delays = (0..20)
        .map(|_| rand::thread_rng().gen_range(0..15))
        .collect::<Vec<u64>>();

    let finished = WorkScheduler::new(Some(pool))
        .execute(
            stream::iter(delays),
            |_| false,
            |millis| {
                let done = Arc::clone(&done);
                async move {
                    tokio::time::sleep(Duration::from_millis(millis)).await;
                    _ = done.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, String>(())
                }
            },
            || done.load(Ordering::SeqCst),
        )
        .await;

    assert_eq!(finished, 20, "completion ran before every item finished");
}

#[tokio::test]
async fn features_run_in_the_given_order() {
    let suite = Suite::new(TestEvaluator, registry()).max_concurrent_scenarios(2);
    let features = vec![
        feature("ordered.feature").await,
        feature("tagged.feature").await,
        feature("failing.feature").await,
    ];

    let results = suite.run(features).await;

    let names = results.iter().map(|r| r.feature.as_str()).collect::<Vec<_>>();
    assert_eq!(names, ["ordered.feature", "tagged.feature", "failing.feature"]);
    assert!(results[2].is_failed());
}
