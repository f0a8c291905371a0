use std::sync::Arc;
use std::time::Duration;

use weft::executor::ExecutionParams;
use weft::intent::{Candidate, Intent};
use weft::router::ExecutionRouter;

use crate::integration::support::{descriptor, write_skill, Fixture, RecordingBackend};

fn three_skills(fixture: &Fixture) {
    fixture.write(
        "skills/a.md",
        &descriptor("a", "First choice", "enabled: false\n", "Body."),
    );
    fixture.write(
        "skills/b.md",
        &descriptor("b", "Second choice", "dependencies: [\"skill:ghost\"]\n", "Body."),
    );
    write_skill(fixture, "c", "Third choice");
}

fn ranked_intent(request: &str) -> Intent {
    Intent::new(request)
        .with_candidates(vec![
            Candidate::new("skill:a", 0.9),
            Candidate::new("skill:b", 0.7),
            Candidate::new("skill:c", 0.5),
        ])
        .finalize()
}

#[tokio::test]
async fn unavailable_candidates_are_skipped() {
    let fixture = Fixture::new();
    three_skills(&fixture);
    let backend = Arc::new(RecordingBackend::new());
    let router = ExecutionRouter::new(fixture.factory(backend.clone()));

    let result = router.route(&ranked_intent("summarize the release")).await;

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.namespace.as_deref(), Some("skill:c"));
    assert_eq!(backend.calls(), vec!["summarize the release"]);
    assert_eq!(router.stats().get("skill:a").attempts, 0);
    assert_eq!(router.stats().get("skill:b").attempts, 0);
    assert_eq!(router.stats().get("skill:c").successes, 1);
}

#[tokio::test]
async fn failing_candidates_fall_back_in_score_order() {
    let fixture = Fixture::new();
    fixture.write(
        "skills/first.md",
        &descriptor("first", "First", "", "# System Prompt\nREJECT me\n"),
    );
    write_skill(&fixture, "second", "Second");
    let backend = Arc::new(RecordingBackend::new().failing_on("REJECT"));
    let router = ExecutionRouter::new(fixture.factory(backend.clone()));

    let intent = Intent::new("ship it")
        .with_candidates(vec![
            Candidate::new("skill:second", 0.4),
            Candidate::new("skill:first", 0.8),
        ])
        .finalize();
    let result = router.route(&intent).await;

    assert!(result.success);
    assert_eq!(result.namespace.as_deref(), Some("skill:second"));
    assert_eq!(backend.call_count(), 2);
    assert_eq!(router.stats().get("skill:first").failures, 1);
    assert_eq!(router.stats().success_rate("skill:first"), Some(0.0));
}

#[tokio::test]
async fn exhausted_candidates_name_the_last_failure() {
    let fixture = Fixture::new();
    write_skill(&fixture, "only", "Only option");
    let backend = Arc::new(RecordingBackend::new().failing_on("deploy"));
    let router = ExecutionRouter::new(fixture.factory(backend));

    let intent = Intent::new("deploy now")
        .with_candidates(vec![
            Candidate::new("skill:only", 0.6),
            Candidate::new("skill:only", 0.3),
        ])
        .finalize();
    let result = router.route(&intent).await;

    assert!(!result.success);
    let error = result.error.unwrap();
    assert!(error.contains("skill:only"), "{}", error);
    assert!(error.contains("recorder rejected the prompt"), "{}", error);
    assert_eq!(router.stats().get("skill:only").attempts, 1);
}

#[tokio::test]
async fn empty_try_list_fails_without_backend_calls() {
    let fixture = Fixture::new();
    let backend = Arc::new(RecordingBackend::new());
    let router = ExecutionRouter::new(fixture.factory(backend.clone()));

    let result = router.route(&Intent::new("anything").finalize()).await;
    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("no candidate resources"));
    assert_eq!(backend.call_count(), 0);
}

#[tokio::test]
async fn entity_is_tried_before_higher_scores() {
    let fixture = Fixture::new();
    write_skill(&fixture, "pinned", "Pinned");
    write_skill(&fixture, "popular", "Popular");
    let backend = Arc::new(RecordingBackend::new());
    let router = ExecutionRouter::new(fixture.factory(backend));

    let intent = Intent::new("go")
        .with_candidates(vec![
            Candidate::new("skill:popular", 0.95),
            Candidate::new("skill:pinned", 0.2),
        ])
        .with_entity("skill:pinned")
        .finalize();
    let result = router.route(&intent).await;
    assert_eq!(result.namespace.as_deref(), Some("skill:pinned"));
}

#[tokio::test]
async fn templates_render_sections_and_placeholders() {
    let fixture = Fixture::new();
    fixture.write(
        "prompts/summary.md",
        &descriptor(
            "summary",
            "Summaries",
            "",
            "# System Prompt\nYou write for {audience}.\n\n# User Prompt Template\nSummarize: {{request}} ({missing})\n",
        ),
    );
    fixture.write(
        "commands/commit.md",
        &descriptor("commit", "Commit changes", "", "Write a commit message."),
    );
    let backend = Arc::new(RecordingBackend::new());
    let factory = fixture.factory(backend.clone());

    let prompt = factory.create_executor("prompt:summary").unwrap();
    let params = ExecutionParams::default().with_variable("audience", "maintainers");
    let result = prompt.execute("request: the diff", &params).await;
    assert!(result.success);

    let command = factory.create_executor("command:commit").unwrap();
    command
        .execute("/commit staged changes", &ExecutionParams::default())
        .await;

    let calls = backend.calls();
    assert_eq!(
        calls[0],
        "You write for maintainers.\n\nSummarize: the diff ({missing})"
    );
    assert_eq!(calls[1], "Write a commit message.\n\nstaged changes");
}

#[tokio::test]
async fn unparseable_content_fails_fast() {
    let fixture = Fixture::new();
    fixture.write("skills/broken.md", "---\nname: broken\n");
    let backend = Arc::new(RecordingBackend::new());
    let factory = fixture.factory(backend.clone());

    let executor = factory.create_executor("skill:broken").unwrap();
    let result = executor.execute("anything", &ExecutionParams::default()).await;
    assert!(!result.success);
    assert!(result.error.unwrap().contains("front matter"));
    assert_eq!(backend.call_count(), 0);
}

#[tokio::test]
async fn timeout_is_reported_as_that_execution_failing() {
    let fixture = Fixture::new();
    write_skill(&fixture, "slow", "Slow");
    let backend = Arc::new(RecordingBackend::new().with_delay(Duration::from_secs(5)));
    let factory = fixture.factory(backend);

    let executor = factory.create_executor("skill:slow").unwrap();
    let params = ExecutionParams {
        timeout: Some(Duration::from_millis(50)),
        ..ExecutionParams::default()
    };
    let result = executor.execute("wait", &params).await;
    assert!(!result.success);
    assert!(result.error.unwrap().contains("timed out"));
}
