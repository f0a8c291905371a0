use std::sync::Arc;
use std::time::{Duration, Instant};

use weft::error::ApiError;
use weft::router::ExecutionRouter;
use weft::schedule::{DependencyAnalyzer, ParallelScheduler, SchedulerConfig, Task, TaskOptions};

use crate::integration::support::{write_skill, Fixture, RecordingBackend};

fn scheduler(
    fixture: &Fixture,
    backend: Arc<RecordingBackend>,
    config: SchedulerConfig,
) -> ParallelScheduler {
    let factory = fixture.factory(backend);
    let router = Arc::new(ExecutionRouter::new(Arc::clone(&factory)));
    ParallelScheduler::new(factory, router, config)
}

fn worker_fixture() -> Fixture {
    let fixture = Fixture::new();
    write_skill(&fixture, "worker", "Does work");
    fixture
}

fn ids(tasks: &[Task]) -> Vec<&str> {
    tasks.iter().map(|task| task.id.as_str()).collect()
}

#[test]
fn independent_tasks_share_the_first_wave() {
    let tasks = vec![
        Task::for_resource("X", "skill:worker", "x"),
        Task::for_resource("Y", "skill:worker", "y").with_dependencies(["X"]),
        Task::for_resource("Z", "skill:worker", "z"),
    ];
    let groups = DependencyAnalyzer::group(tasks).unwrap();
    assert_eq!(groups.len(), 2);
    assert_eq!(ids(&groups[0].tasks), vec!["X", "Z"]);
    assert_eq!(ids(&groups[1].tasks), vec!["Y"]);
    assert_eq!(groups[1].level, 1);
}

#[test]
fn three_cycle_is_rejected() {
    let tasks = vec![
        Task::for_resource("a", "skill:worker", "a").with_dependencies(["c"]),
        Task::for_resource("b", "skill:worker", "b").with_dependencies(["a"]),
        Task::for_resource("c", "skill:worker", "c").with_dependencies(["b"]),
    ];
    match DependencyAnalyzer::group(tasks) {
        Err(ApiError::DependencyCycle(stuck)) => assert_eq!(stuck.len(), 3),
        other => panic!("expected cycle error, got {:?}", other.map(|g| g.len())),
    }
}

#[tokio::test]
async fn cycle_fails_before_any_task_runs() {
    let fixture = worker_fixture();
    let backend = Arc::new(RecordingBackend::new());
    let scheduler = scheduler(&fixture, backend.clone(), SchedulerConfig::default());

    let tasks = vec![
        Task::for_resource("free", "skill:worker", "free"),
        Task::for_resource("a", "skill:worker", "a").with_dependencies(["b"]),
        Task::for_resource("b", "skill:worker", "b").with_dependencies(["a"]),
    ];
    assert!(matches!(
        scheduler.execute(tasks).await,
        Err(ApiError::DependencyCycle(_))
    ));
    assert_eq!(backend.call_count(), 0);
}

#[tokio::test]
async fn structural_errors_abort_the_batch() {
    let fixture = worker_fixture();
    let scheduler = scheduler(&fixture, Arc::new(RecordingBackend::new()), SchedulerConfig::default());

    assert!(matches!(
        scheduler.execute(Vec::new()).await,
        Err(ApiError::InvalidBatch(_))
    ));
    let duplicate = vec![
        Task::for_resource("same", "skill:worker", "one"),
        Task::for_resource("same", "skill:worker", "two"),
    ];
    assert!(matches!(
        scheduler.execute(duplicate).await,
        Err(ApiError::InvalidBatch(_))
    ));
}

#[tokio::test]
async fn level_zero_failure_does_not_stop_later_waves() {
    let fixture = worker_fixture();
    let backend = Arc::new(RecordingBackend::new().failing_on("BROKEN"));
    let scheduler = scheduler(&fixture, backend.clone(), SchedulerConfig::default());

    let tasks = vec![
        Task::for_resource("bad", "skill:worker", "BROKEN input"),
        Task::for_resource("good", "skill:worker", "fine input"),
        Task::for_resource("next", "skill:worker", "after good").with_dependencies(["good"]),
    ];
    let batch = scheduler.execute(tasks).await.unwrap();

    assert_eq!(batch.total_tasks, 3);
    assert_eq!(batch.groups, 2);
    assert_eq!(batch.failed, 1);
    assert_eq!(batch.successful, 2);
    assert!(!batch.is_success());
    assert!(batch.result_for("next").unwrap().success);
    assert_eq!(
        batch.result_for("bad").unwrap().error.as_deref(),
        Some("recorder rejected the prompt")
    );
}

#[tokio::test]
async fn dependents_of_failed_tasks_are_skipped() {
    let fixture = worker_fixture();
    let backend = Arc::new(RecordingBackend::new().failing_on("BROKEN"));
    let scheduler = scheduler(&fixture, backend.clone(), SchedulerConfig::default());

    let tasks = vec![
        Task::for_resource("bad", "skill:worker", "BROKEN"),
        Task::for_resource("child", "skill:worker", "child").with_dependencies(["bad"]),
        Task::for_resource("grandchild", "skill:worker", "grandchild")
            .with_dependencies(["child"]),
    ];
    let batch = scheduler.execute(tasks).await.unwrap();

    assert_eq!(batch.failed, 3);
    assert_eq!(backend.call_count(), 1);
    let child = batch.result_for("child").unwrap();
    assert_eq!(child.attempts, 0);
    assert!(child.error.as_deref().unwrap().contains("'bad'"));
    assert!(batch
        .result_for("grandchild")
        .unwrap()
        .error
        .as_deref()
        .unwrap()
        .contains("'child'"));
}

#[tokio::test]
async fn dependents_run_when_skipping_is_disabled() {
    let fixture = worker_fixture();
    let backend = Arc::new(RecordingBackend::new().failing_on("BROKEN"));
    let config = SchedulerConfig {
        skip_dependents_of_failed: false,
        ..SchedulerConfig::default()
    };
    let scheduler = scheduler(&fixture, backend.clone(), config);

    let tasks = vec![
        Task::for_resource("bad", "skill:worker", "BROKEN"),
        Task::for_resource("child", "skill:worker", "child").with_dependencies(["bad"]),
    ];
    let batch = scheduler.execute(tasks).await.unwrap();
    assert!(batch.result_for("child").unwrap().success);
    assert_eq!(backend.call_count(), 2);
}

#[tokio::test]
async fn retries_rerun_failed_tasks() {
    let fixture = worker_fixture();
    let backend = Arc::new(RecordingBackend::new().failing_on("BROKEN"));
    let scheduler = scheduler(&fixture, backend.clone(), SchedulerConfig::default());

    let options = TaskOptions {
        retries: 2,
        ..TaskOptions::default()
    };
    let tasks = vec![Task::for_resource("flaky", "skill:worker", "BROKEN").with_options(options)];
    let batch = scheduler.execute(tasks).await.unwrap();

    assert_eq!(batch.result_for("flaky").unwrap().attempts, 3);
    assert_eq!(backend.call_count(), 3);
}

#[tokio::test]
async fn unavailable_resource_fails_without_retry() {
    let fixture = worker_fixture();
    let backend = Arc::new(RecordingBackend::new());
    let scheduler = scheduler(&fixture, backend.clone(), SchedulerConfig::default());

    let options = TaskOptions {
        retries: 3,
        ..TaskOptions::default()
    };
    let tasks = vec![Task::for_resource("ghost", "skill:ghost", "boo").with_options(options)];
    let batch = scheduler.execute(tasks).await.unwrap();

    let result = batch.result_for("ghost").unwrap();
    assert!(!result.success);
    assert_eq!(result.attempts, 1);
    assert!(result.error.as_deref().unwrap().contains("skill:ghost"));
    assert_eq!(backend.call_count(), 0);
}

#[tokio::test]
async fn worker_limit_bounds_concurrency() {
    let fixture = worker_fixture();
    let backend = Arc::new(RecordingBackend::new().with_delay(Duration::from_millis(150)));
    let scheduler = scheduler(&fixture, backend.clone(), SchedulerConfig::default());

    let tasks: Vec<Task> = (0..4)
        .map(|i| Task::for_resource(format!("t{}", i), "skill:worker", format!("job {}", i)))
        .collect();
    let started = Instant::now();
    let batch = scheduler.execute_tasks(tasks, 2).await.unwrap();
    let elapsed = started.elapsed();

    assert!(batch.is_success());
    assert_eq!(batch.groups, 1);
    assert!(elapsed >= Duration::from_millis(290), "{:?}", elapsed);
    assert!(elapsed < Duration::from_millis(580), "{:?}", elapsed);
}

#[tokio::test]
async fn cancellation_stops_queued_tasks_and_later_waves() {
    let fixture = worker_fixture();
    let backend = Arc::new(RecordingBackend::new().with_delay(Duration::from_millis(100)));
    let scheduler = scheduler(&fixture, backend.clone(), SchedulerConfig::default());
    let handle = scheduler.cancellation_handle();

    let tasks = vec![
        Task::for_resource("first", "skill:worker", "first"),
        Task::for_resource("queued", "skill:worker", "queued"),
        Task::for_resource("later", "skill:worker", "later").with_dependencies(["first"]),
    ];
    let (batch, _) = tokio::join!(scheduler.execute_tasks(tasks, 1), async {
        tokio::time::sleep(Duration::from_millis(40)).await;
        handle.cancel();
    });
    let batch = batch.unwrap();

    assert!(batch.cancelled);
    assert!(!batch.is_success());
    assert_eq!(batch.task_results.len(), 1);
    assert!(batch.result_for("first").unwrap().success);
    assert_eq!(backend.call_count(), 1);
}

#[tokio::test]
async fn cancellation_does_not_carry_into_the_next_batch() {
    let fixture = worker_fixture();
    let backend = Arc::new(RecordingBackend::new().with_delay(Duration::from_millis(50)));
    let scheduler = scheduler(&fixture, backend.clone(), SchedulerConfig::default());
    let handle = scheduler.cancellation_handle();

    let first = vec![
        Task::for_resource("a", "skill:worker", "a"),
        Task::for_resource("b", "skill:worker", "b").with_dependencies(["a"]),
    ];
    let (first, _) = tokio::join!(scheduler.execute_tasks(first, 1), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.cancel();
    });
    assert!(first.unwrap().cancelled);

    let second = scheduler
        .execute_tasks(vec![Task::for_resource("c", "skill:worker", "c")], 1)
        .await
        .unwrap();
    assert!(!second.cancelled);
    assert_eq!(second.successful, 1);
    assert!(second.result_for("c").unwrap().success);
    assert_eq!(backend.call_count(), 2);
}

#[tokio::test]
async fn panicking_task_is_recorded_as_failure() {
    let fixture = worker_fixture();
    let backend = Arc::new(RecordingBackend::new().panicking_on("EXPLODE"));
    let scheduler = scheduler(&fixture, backend, SchedulerConfig::default());

    let tasks = vec![
        Task::for_resource("boom", "skill:worker", "EXPLODE"),
        Task::for_resource("calm", "skill:worker", "calm"),
    ];
    let batch = scheduler.execute(tasks).await.unwrap();

    assert_eq!(batch.failed, 1);
    let boom = batch.result_for("boom").unwrap();
    assert_eq!(boom.error.as_deref(), Some("task panicked"));
    assert!(batch.result_for("calm").unwrap().success);
}
