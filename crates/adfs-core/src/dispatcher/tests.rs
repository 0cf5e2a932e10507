use super::*;
use crate::test_support::{FakeRunner, RecordingSink, test_registry};
use std::time::Instant;

fn dispatcher(runner: Arc<FakeRunner>) -> (CommandDispatcher, Arc<HistoryRing>) {
    let history = Arc::new(HistoryRing::new(100));
    let dispatcher = CommandDispatcher::new(
        Arc::new(test_registry()),
        runner,
        history.clone(),
        CommandSettings::default(),
    );
    (dispatcher, history)
}

fn targets(names: &[&str]) -> Vec<ProfileId> {
    names.iter().map(|name| name.to_string()).collect()
}

fn result_for<'a>(report: &'a DispatchReport, profile: &str) -> &'a ExecutionResult {
    report
        .results
        .iter()
        .find(|result| result.profile == profile)
        .unwrap()
}

#[tokio::test]
async fn all_dev_failures_skip_the_rest() {
    let runner = Arc::new(FakeRunner::default());
    runner.set("dev-1", 1, Duration::ZERO);
    runner.set("dev-2", 2, Duration::ZERO);
    let (dispatcher, history) = dispatcher(runner.clone());
    let sink = Arc::new(RecordingSink::default());
    let request = dispatcher.request("aws s3 ls", targets(&["dev-1", "dev-2", "prod-1"]), None);

    let report = dispatcher
        .dispatch(request, sink.clone(), CancellationToken::new())
        .await;

    let prod = result_for(&report, "prod-1");
    assert!(prod.skipped);
    assert!(!prod.success);
    assert_eq!(prod.error.as_deref(), Some("skipped due to dev profile failure"));
    assert!(!runner.ran().contains(&"prod-1".to_string()));
    assert!(!sink.events().iter().any(|event| matches!(
        event,
        Event::CommandStarted { profile, .. } if profile == "prod-1"
    )));
    let entry = &history.list()[0];
    assert_eq!(entry.failure_count, 2);
    assert_eq!(entry.skipped_count, 1);
    assert_eq!(entry.total, 3);
}

#[tokio::test]
async fn one_dev_success_lets_others_run() {
    let runner = Arc::new(FakeRunner::default());
    runner.set("dev-1", 1, Duration::ZERO);
    runner.set("prod-1", 3, Duration::ZERO);
    let (dispatcher, _) = dispatcher(runner.clone());
    let request = dispatcher.request("aws s3 ls", targets(&["dev-1", "dev-2", "prod-1"]), None);

    let report = dispatcher
        .dispatch(request, Arc::new(RecordingSink::default()), CancellationToken::new())
        .await;

    let prod = result_for(&report, "prod-1");
    assert!(!prod.skipped);
    assert_eq!(prod.exit_code, Some(3));
    assert!(runner.ran().contains(&"prod-1".to_string()));
    assert!(result_for(&report, "dev-2").success);
}

#[tokio::test]
async fn dev_batch_runs_before_others() {
    let runner = Arc::new(FakeRunner::default());
    runner.set("dev-1", 0, Duration::from_millis(30));
    let (dispatcher, _) = dispatcher(runner.clone());
    let request = dispatcher.request("ls", targets(&["np-1", "dev-1"]), None);
    dispatcher
        .dispatch(request, Arc::new(RecordingSink::default()), CancellationToken::new())
        .await;
    assert_eq!(runner.ran(), targets(&["dev-1", "np-1"]));
}

#[tokio::test]
async fn non_dev_profiles_run_concurrently() {
    let runner = Arc::new(FakeRunner::default());
    let names = ["np-1", "np-2", "np-3", "prod-1", "prod-2"];
    for name in names {
        runner.set(name, 0, Duration::from_millis(200));
    }
    let (dispatcher, _) = dispatcher(runner);
    let request = dispatcher.request("ls", targets(&names), None);

    let started = Instant::now();
    let report = dispatcher
        .dispatch(request, Arc::new(RecordingSink::default()), CancellationToken::new())
        .await;
    let elapsed = started.elapsed();

    assert_eq!(report.results.len(), 5);
    assert!(report.all_succeeded());
    assert!(elapsed < Duration::from_millis(600), "took {elapsed:?}");
}

#[tokio::test]
async fn each_execution_emits_started_output_complete() {
    let runner = Arc::new(FakeRunner::default());
    let (dispatcher, _) = dispatcher(runner);
    let sink = Arc::new(RecordingSink::default());
    let request = dispatcher.request("ls", targets(&["np-1"]), None);
    let request_id = request.request_id;
    dispatcher
        .dispatch(request, sink.clone(), CancellationToken::new())
        .await;

    let events = sink.events();
    assert_eq!(events.len(), 3);
    assert!(matches!(&events[0], Event::CommandStarted { request_id: id, .. } if *id == request_id));
    assert!(matches!(&events[1], Event::CommandOutput { output, is_error: false, .. } if output == "np-1"));
    assert!(matches!(&events[2], Event::CommandComplete(result) if result.success));
}

#[tokio::test]
async fn timeout_is_reported_distinctly() {
    let runner = Arc::new(FakeRunner::default());
    runner.set("np-2", 0, Duration::from_secs(5));
    let (dispatcher, _) = dispatcher(runner);
    let request = dispatcher.request("sleep 5", targets(&["np-2"]), Some(1));
    let report = dispatcher
        .dispatch(request, Arc::new(RecordingSink::default()), CancellationToken::new())
        .await;
    let result = result_for(&report, "np-2");
    assert!(result.timed_out);
    assert_eq!(result.error.as_deref(), Some("Command timed out after 1 seconds"));
}

#[tokio::test]
async fn cancellation_stops_events_and_keeps_finished_results() {
    let runner = Arc::new(FakeRunner::default());
    runner.set("np-1", 0, Duration::ZERO);
    runner.set("np-2", 0, Duration::from_secs(10));
    let (dispatcher, history) = dispatcher(runner);
    let sink = Arc::new(RecordingSink::default());
    let cancel = CancellationToken::new();
    let request = dispatcher.request("ls", targets(&["np-1", "np-2"]), None);

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });
    let report = dispatcher.dispatch(request, sink.clone(), cancel).await;

    assert!(report.cancelled);
    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].profile, "np-1");
    assert!(!sink.events().iter().any(|event| matches!(
        event,
        Event::CommandComplete(result) if result.profile == "np-2"
    )));
    let entry = &history.list()[0];
    assert_eq!(entry.success_count, 1);
    assert_eq!(entry.total, 2);
}

#[tokio::test]
async fn crashed_execution_still_completes_its_profile() {
    let runner = Arc::new(FakeRunner::default());
    runner.crash("np-2");
    let (dispatcher, history) = dispatcher(runner.clone());
    let sink = Arc::new(RecordingSink::default());
    let request = dispatcher.request("aws s3 ls", targets(&["np-1", "np-2"]), None);

    let report = dispatcher
        .dispatch(request, sink.clone(), CancellationToken::new())
        .await;

    assert_eq!(report.results.len(), 2);
    let crashed = result_for(&report, "np-2");
    assert!(!crashed.success);
    assert!(!crashed.skipped);
    assert_eq!(crashed.error.as_deref(), Some("Command terminated by signal"));
    assert!(result_for(&report, "np-1").success);

    let completions = sink
        .events()
        .iter()
        .filter(|event| matches!(
            event,
            Event::CommandComplete(result) if result.profile == "np-2"
        ))
        .count();
    assert_eq!(completions, 1);
    let entry = &history.list()[0];
    assert_eq!(entry.success_count, 1);
    assert_eq!(entry.failure_count, 1);
}
