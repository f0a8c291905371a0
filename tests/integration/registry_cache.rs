use std::fs;
use std::sync::Arc;

use weft::backend::BackendRegistry;
use weft::executor::ExecutorFactory;
use weft::resource::{Availability, LoadSource, MarkdownContentProvider, ResourceType};

use crate::integration::support::{descriptor, write_skill, Fixture};

#[test]
fn load_without_changes_returns_identical_metadata() {
    let fixture = Fixture::new();
    write_skill(&fixture, "login", "Implement login flows");
    fixture.write(
        "agents/reviewer.md",
        &descriptor("reviewer", "Reviews code", "tags: [review, quality]\npriority: 3\n", "Be strict."),
    );

    let registry = fixture.registry();
    let first = registry.load(false).unwrap();
    let before = registry.list_all();
    let second = registry.load(false).unwrap();

    assert_eq!(first.source, LoadSource::Scan);
    assert_eq!(second.source, LoadSource::Cache);
    assert_eq!(first.content_hash, second.content_hash);
    assert_eq!(registry.list_all(), before);
    assert_eq!(registry.scan_count(), 1);

    let reviewer = registry.get("agent:reviewer").unwrap();
    assert_eq!(reviewer.priority, 3);
    assert_eq!(reviewer.tags, vec!["review", "quality"]);
}

#[test]
fn fresh_registry_reads_persisted_cache() {
    let fixture = Fixture::new();
    write_skill(&fixture, "login", "Implement login flows");
    fixture.registry().load(false).unwrap();

    let registry = fixture.registry();
    let state = registry.load(false).unwrap();
    assert_eq!(state.source, LoadSource::Cache);
    assert_eq!(registry.scan_count(), 0);
    assert!(registry.exists("skill:login"));
}

#[test]
fn invalidate_then_load_reflects_changes() {
    let fixture = Fixture::new();
    let path = write_skill(&fixture, "login", "Implement login flows");
    let registry = fixture.registry();
    registry.load(false).unwrap();
    registry.load(false).unwrap();
    assert_eq!(registry.scan_count(), 1);

    registry.invalidate().unwrap();
    assert!(registry.exists("skill:login"), "invalidate keeps the in-memory map");
    assert!(!fixture.cache_dir().join("scan_meta.json").exists());
    assert!(!fixture.cache_dir().join("resources.json").exists());

    fs::write(&path, descriptor("login", "Passwordless login", "", "Body.")).unwrap();
    let state = registry.load(false).unwrap();
    assert_eq!(state.source, LoadSource::Scan);
    assert_eq!(registry.scan_count(), 2);
    assert_eq!(registry.get("skill:login").unwrap().description, "Passwordless login");
}

#[test]
fn edited_sources_change_the_hash_and_force_a_scan() {
    let fixture = Fixture::new();
    write_skill(&fixture, "login", "Implement login flows");
    let registry = fixture.registry();
    let first = registry.load(false).unwrap();

    write_skill(&fixture, "signup", "Implement signup forms");
    let second = registry.load(false).unwrap();
    assert_ne!(first.content_hash, second.content_hash);
    assert_eq!(second.source, LoadSource::Scan);
    assert!(registry.exists("skill:signup"));
}

#[test]
fn corrupt_cache_is_treated_as_absent() {
    let fixture = Fixture::new();
    write_skill(&fixture, "login", "Implement login flows");
    fixture.registry().load(false).unwrap();
    fs::write(fixture.cache_dir().join("resources.json"), "{ not json").unwrap();

    let registry = fixture.registry();
    let state = registry.load(false).unwrap();
    assert_eq!(state.source, LoadSource::Scan);
    assert!(registry.exists("skill:login"));
}

#[test]
fn availability_follows_enabled_flags_and_dependencies() {
    let fixture = Fixture::new();
    write_skill(&fixture, "base", "Base skill");
    fixture.write(
        "skills/off.md",
        &descriptor("off", "Disabled skill", "enabled: false\n", "Body."),
    );
    fixture.write(
        "skills/needs-base.md",
        &descriptor("needs-base", "Uses base", "dependencies: [\"skill:base\"]\n", "Body."),
    );
    fixture.write(
        "skills/needs-off.md",
        &descriptor("needs-off", "Uses off", "dependencies: [\"skill:off\"]\n", "Body."),
    );
    let registry = fixture.registry();
    registry.load(false).unwrap();

    assert!(registry.is_available("skill:needs-base"));
    assert_eq!(registry.availability("skill:off"), Availability::Disabled);
    assert_eq!(
        registry.availability("skill:needs-off"),
        Availability::UnsatisfiedDependency("skill:off".to_string())
    );
    assert_eq!(registry.availability("skill:ghost"), Availability::Missing);
    assert_eq!(registry.list_by_type(ResourceType::Skill, true).len(), 3);
    assert_eq!(registry.list_by_type(ResourceType::Skill, false).len(), 4);
}

#[test]
fn executor_survives_invalidate_and_reload() {
    let fixture = Fixture::new();
    write_skill(&fixture, "login", "Implement login flows");
    let registry = fixture.registry();
    registry.load(false).unwrap();
    let factory = ExecutorFactory::new(
        Arc::clone(&registry),
        Arc::new(MarkdownContentProvider::new()),
        Arc::new(BackendRegistry::new(Some("echo".to_string()))),
    );

    let first = factory.create_executor("skill:login").unwrap();
    let second = factory.create_executor("skill:login").unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    registry.invalidate().unwrap();
    registry.load(false).unwrap();
    let third = factory.create_executor("skill:login").unwrap();
    assert!(Arc::ptr_eq(&first, &third));
    assert_eq!(first.namespace(), "skill:login");
}

#[cfg(unix)]
#[test]
fn symlink_loop_in_sources_does_not_block_loading() {
    let fixture = Fixture::new();
    write_skill(&fixture, "login", "Implement login flows");
    std::os::unix::fs::symlink(fixture.sources(), fixture.sources().join("skills/loop")).unwrap();

    let registry = fixture.registry();
    let first = registry.load(false).unwrap();
    assert_eq!(first.source, LoadSource::Scan);
    assert!(registry.exists("skill:login"));

    let second = registry.load(false).unwrap();
    assert_eq!(second.source, LoadSource::Cache);
    assert_eq!(first.content_hash, second.content_hash);
}
