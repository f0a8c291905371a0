use std::sync::Arc;
use std::time::{Duration, Instant};

use weft::backend::Backend;
use weft::error::ApiError;
use weft::executor::ExecutionParams;
use weft::orchestrator::{HandleOptions, Outcome};

use crate::integration::support::{descriptor, write_skill, Fixture, RecordingBackend};

fn auth_fixture() -> Fixture {
    let fixture = Fixture::new();
    fixture.write(
        "skills/login/SKILL.md",
        &descriptor("login", "Implement login flows", "tags: [auth]\n", "Login skill."),
    );
    write_skill(&fixture, "signup", "Implement signup forms");
    fixture
}

#[tokio::test]
async fn independent_clauses_run_in_parallel() {
    let fixture = auth_fixture();
    let backend = Arc::new(RecordingBackend::new().with_delay(Duration::from_millis(200)));
    let orchestrator = fixture.orchestrator(backend.clone());

    let started = Instant::now();
    let outcome = orchestrator
        .handle("implement login, implement signup")
        .await
        .unwrap();
    let elapsed = started.elapsed();

    let batch = match outcome {
        Outcome::Batch(batch) => batch,
        Outcome::Single(result) => panic!("expected a batch, got {:?}", result),
    };
    assert_eq!(batch.total_tasks, 2);
    assert_eq!(batch.groups, 1);
    assert_eq!(batch.successful, 2);
    assert_eq!(
        batch.result_for("subtask-1").unwrap().namespace.as_deref(),
        Some("skill:login")
    );
    assert_eq!(
        batch.result_for("subtask-2").unwrap().namespace.as_deref(),
        Some("skill:signup")
    );
    assert!(elapsed >= Duration::from_millis(200), "{:?}", elapsed);
    assert!(elapsed < Duration::from_millis(390), "ran serially: {:?}", elapsed);

    let mut calls = backend.calls();
    calls.sort();
    assert_eq!(calls, vec!["implement login", "implement signup"]);
}

#[tokio::test]
async fn single_request_routes_to_best_candidate() {
    let fixture = auth_fixture();
    let backend = Arc::new(RecordingBackend::new());
    let orchestrator = fixture.orchestrator(backend.clone());

    let outcome = orchestrator.handle("fix the login page").await.unwrap();
    assert!(outcome.is_success());
    match outcome {
        Outcome::Single(result) => {
            assert_eq!(result.namespace.as_deref(), Some("skill:login"));
            assert_eq!(result.output, "done: fix the login page");
            assert_eq!(result.attempts, 1);
        }
        Outcome::Batch(_) => panic!("expected a single result"),
    }
    assert_eq!(orchestrator.router().stats().get("skill:login").successes, 1);
}

#[tokio::test]
async fn unmatched_request_fails_cleanly() {
    let fixture = auth_fixture();
    let orchestrator = fixture.orchestrator(Arc::new(RecordingBackend::new()));

    let outcome = orchestrator.handle("water the plants").await.unwrap();
    assert!(!outcome.is_success());
}

#[tokio::test]
async fn explicit_resource_and_backend_overrides() {
    let fixture = auth_fixture();
    let backend = Arc::new(RecordingBackend::new());
    let alternate = Arc::new(RecordingBackend::named("alternate"));
    let orchestrator =
        fixture.orchestrator_with(vec![backend.clone() as Arc<dyn Backend>, alternate.clone()]);

    let options = HandleOptions {
        resource: Some("skill:signup".to_string()),
        backend: Some("alternate".to_string()),
        ..HandleOptions::default()
    };
    let outcome = orchestrator.handle_with("anything at all", &options).await.unwrap();
    assert!(outcome.is_success());
    assert_eq!(alternate.calls(), vec!["anything at all"]);
    assert_eq!(backend.call_count(), 0);

    let missing = HandleOptions {
        resource: Some("skill:nope".to_string()),
        ..HandleOptions::default()
    };
    assert!(matches!(
        orchestrator.handle_with("x", &missing).await,
        Err(ApiError::ResourceNotFound(_))
    ));
}

#[tokio::test]
async fn slash_command_is_not_decomposed() {
    let fixture = auth_fixture();
    fixture.write(
        "commands/release.md",
        &descriptor("release", "Cut a release", "", "Prepare release notes for {request}."),
    );
    let backend = Arc::new(RecordingBackend::new());
    let orchestrator = fixture.orchestrator(backend.clone());

    let outcome = orchestrator
        .handle("/release v2, implement login, implement signup")
        .await
        .unwrap();
    match outcome {
        Outcome::Single(result) => {
            assert_eq!(result.namespace.as_deref(), Some("command:release"));
        }
        Outcome::Batch(_) => panic!("explicit command must not be decomposed"),
    }
    assert_eq!(
        backend.calls(),
        vec!["Prepare release notes for v2, implement login, implement signup."]
    );
}

#[tokio::test]
async fn submitted_batch_runs_in_dependency_waves() {
    let fixture = auth_fixture();
    let backend = Arc::new(RecordingBackend::new());
    let orchestrator = fixture.orchestrator(backend.clone());

    let text = "\
---TASK---
id: accounts
resource: skill:signup
---CONTENT---
Create the accounts table.
---END---

---TASK---
id: session
dependencies: accounts
---CONTENT---
implement login
---END---
";
    let batch = orchestrator.submit_batch(text).await.unwrap();

    assert!(batch.is_success());
    assert_eq!(batch.groups, 2);
    assert_eq!(batch.task_results[0].task_id.as_deref(), Some("accounts"));
    assert_eq!(
        batch.result_for("session").unwrap().namespace.as_deref(),
        Some("skill:login")
    );
    assert_eq!(backend.calls(), vec!["Create the accounts table.", "implement login"]);
}

#[tokio::test]
async fn malformed_batch_is_a_protocol_error() {
    let fixture = auth_fixture();
    let backend = Arc::new(RecordingBackend::new());
    let orchestrator = fixture.orchestrator(backend.clone());

    let result = orchestrator
        .submit_batch("---TASK---\nid: a\n---CONTENT---\nbody\n")
        .await;
    assert!(matches!(result, Err(ApiError::Protocol { .. })));
    assert_eq!(backend.call_count(), 0);
}

#[tokio::test]
async fn backend_resources_pass_requests_through() {
    let fixture = auth_fixture();
    fixture.write(
        "backends/alternate.md",
        &descriptor("alternate", "Alternate engine", "", "Raw access."),
    );
    let backend = Arc::new(RecordingBackend::new());
    let alternate = Arc::new(RecordingBackend::named("alternate"));
    let orchestrator =
        fixture.orchestrator_with(vec![backend.clone() as Arc<dyn Backend>, alternate.clone()]);

    let executor = orchestrator
        .factory()
        .create_executor("backend:alternate")
        .unwrap();
    assert_eq!(executor.kind(), "backend");
    let result = executor
        .execute("request: raw prompt", &ExecutionParams::default())
        .await;
    assert!(result.success);
    assert_eq!(alternate.calls(), vec!["raw prompt"]);
    assert_eq!(backend.call_count(), 0);

    let intent = orchestrator.analyze("alternate engine");
    assert!(intent
        .candidates
        .iter()
        .all(|candidate| candidate.namespace != "backend:alternate"));
}

#[tokio::test]
async fn rescan_picks_up_new_resources_and_drops_executors() {
    let fixture = auth_fixture();
    let orchestrator = fixture.orchestrator(Arc::new(RecordingBackend::new()));

    let before = orchestrator.factory().create_executor("skill:login").unwrap();
    assert_eq!(orchestrator.factory().cached_count(), 1);

    write_skill(&fixture, "audit", "Audit access logs");
    let state = orchestrator.rescan().unwrap();
    assert_eq!(state.resource_count, 3);
    assert_eq!(orchestrator.factory().cached_count(), 0);
    assert!(orchestrator.registry().exists("skill:audit"));

    let after = orchestrator.factory().create_executor("skill:login").unwrap();
    assert!(!Arc::ptr_eq(&before, &after));
    let result = before.execute("still works", &ExecutionParams::default()).await;
    assert!(result.success);
}

#[tokio::test]
async fn content_exposes_parsed_sections() {
    let fixture = Fixture::new();
    fixture.write(
        "agents/planner.md",
        &descriptor(
            "planner",
            "Plans work",
            "",
            "You plan.\n\n# User Prompt Template\nPlan: {request}",
        ),
    );
    let backend = Arc::new(RecordingBackend::new());
    let orchestrator = fixture.orchestrator(backend.clone());

    let content = orchestrator.content("agent:planner").unwrap();
    assert_eq!(content.meta("description"), Some("Plans work"));
    assert!(content.section("User Prompt Template").is_some());

    let options = HandleOptions {
        resource: Some("agent:planner".to_string()),
        ..HandleOptions::default()
    };
    orchestrator.handle_with("the sprint", &options).await.unwrap();
    assert_eq!(backend.calls(), vec!["You plan.\n\nPlan: the sprint"]);

    assert!(matches!(
        orchestrator.content("agent:ghost"),
        Err(ApiError::ResourceNotFound(_))
    ));
}
