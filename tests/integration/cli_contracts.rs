use std::fs;

use clap::Parser;
use weft::tooling::cli::{Cli, CliContext, CommandOutput};

use crate::integration::support::{descriptor, write_skill, Fixture};

fn fixture() -> Fixture {
    let fixture = Fixture::new();
    write_skill(&fixture, "login", "Implement login flows");
    fixture.write(
        "commands/deploy.md",
        &descriptor("deploy", "Ship the build", "enabled: false\n", "Deploy it."),
    );
    fixture
}

async fn run(fixture: &Fixture, config_extra: &str, args: &[&str]) -> CommandOutput {
    let config = fixture.write_config(config_extra);
    let workspace = fixture.workspace().display().to_string();
    let config = config.display().to_string();
    let mut argv = vec!["weft", "--workspace", workspace.as_str(), "--config", config.as_str()];
    argv.extend_from_slice(args);

    let cli = Cli::try_parse_from(argv).unwrap();
    let context = CliContext::new(&cli).unwrap();
    context.execute(&cli.command).await.unwrap()
}

fn json(output: &CommandOutput) -> serde_json::Value {
    serde_json::from_str(&output.text).unwrap()
}

#[tokio::test]
async fn resources_list_json_contract() {
    let fixture = fixture();
    let output = run(&fixture, "", &["resources", "list", "--format", "json"]).await;
    let parsed = json(&output);
    let items = parsed.as_array().expect("resource array");
    assert_eq!(items.len(), 1, "disabled resources are hidden by default");
    assert_eq!(items[0]["namespace"], "skill:login");
    assert_eq!(items[0]["type"], "skill");
    assert!(items[0]["enabled"].as_bool().unwrap());

    let output = run(&fixture, "", &["resources", "list", "--all", "--format", "json"]).await;
    assert_eq!(json(&output).as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn resources_show_json_contract() {
    let fixture = fixture();
    let output = run(&fixture, "", &["resources", "show", "command:deploy", "--format", "json"]).await;
    let parsed = json(&output);
    assert_eq!(parsed["resource"]["namespace"], "command:deploy");
    assert_eq!(parsed["available"], false);
    assert!(parsed["unavailable_reason"]
        .as_str()
        .unwrap()
        .contains("disabled"));
    assert_eq!(parsed["sections"]["body"].as_str().unwrap().trim(), "Deploy it.");
}

#[tokio::test]
async fn run_json_contract_with_echo_backend() {
    let fixture = fixture();
    let output = run(
        &fixture,
        "",
        &["run", "--format", "json", "fix", "the", "login", "page"],
    )
    .await;
    assert!(output.success);
    let parsed = json(&output);
    assert_eq!(parsed["kind"], "single");
    assert_eq!(parsed["success"], true);
    assert_eq!(parsed["namespace"], "skill:login");
    assert_eq!(parsed["output"], "fix the login page");
    assert!(parsed["duration_seconds"].as_f64().is_some());
}

#[tokio::test]
async fn run_reports_failure_without_erroring() {
    let fixture = fixture();
    let output = run(&fixture, "", &["run", "water", "the", "plants"]).await;
    assert!(!output.success);
    assert!(output.text.contains("no candidate resources"));
}

#[tokio::test]
async fn intent_json_contract() {
    let fixture = fixture();
    let output = run(&fixture, "", &["intent", "--format", "json", "implement", "login"]).await;
    let parsed = json(&output);
    assert_eq!(parsed["raw_request"], "implement login");
    assert_eq!(parsed["task_type"], "code_generation");
    assert_eq!(parsed["candidates"][0]["namespace"], "skill:login");
    assert_eq!(parsed["enable_parallel"], false);
}

#[tokio::test]
async fn batch_file_contract() {
    let fixture = fixture();
    let batch = fixture.dir.path().join("tasks.txt");
    fs::write(
        &batch,
        "---TASK---\nid: one\nresource: skill:login\n---CONTENT---\nfirst\n---END---\n\
         ---TASK---\nid: two\ndependencies: one\nresource: skill:login\n---CONTENT---\nsecond\n---END---\n",
    )
    .unwrap();
    let path = batch.display().to_string();

    let output = run(&fixture, "", &["batch", path.as_str(), "--format", "json"]).await;
    assert!(output.success);
    let parsed = json(&output);
    assert_eq!(parsed["total_tasks"], 2);
    assert_eq!(parsed["groups"], 2);
    assert_eq!(parsed["successful"], 2);
    assert_eq!(parsed["task_results"][1]["task_id"], "two");
}

#[tokio::test]
async fn backends_list_and_validate() {
    let fixture = fixture();
    let extra = "\n[backends.broken]\nbackend_type = \"command\"\n";

    let output = run(&fixture, extra, &["backends", "list", "--format", "json"]).await;
    let parsed = json(&output);
    assert_eq!(parsed["default"], "echo");
    assert!(parsed["backends"]["echo"].is_null());
    assert!(parsed["backends"]["broken"].is_string());

    let output = run(&fixture, extra, &["backends", "validate"]).await;
    assert!(!output.success);
    assert!(output.text.contains("broken"));
}

#[tokio::test]
async fn scan_and_clear_cache() {
    let fixture = fixture();
    let output = run(&fixture, "", &["resources", "scan"]).await;
    assert!(output.text.contains("Resources:"));
    assert!(fixture.cache_dir().join("scan_meta.json").exists());

    let output = run(&fixture, "", &["resources", "clear-cache"]).await;
    assert!(output.text.contains("cleared"));
    assert!(!fixture.cache_dir().join("scan_meta.json").exists());
}
