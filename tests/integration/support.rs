use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tempfile::TempDir;
use weft::backend::{Backend, BackendOutput, BackendRegistry, BackendRequest};
use weft::config::WeftConfig;
use weft::error::ApiError;
use weft::executor::ExecutorFactory;
use weft::orchestrator::Orchestrator;
use weft::resource::{MarkdownContentProvider, RegistrySettings, ResourceRegistry};

pub const RECORDER: &str = "recorder";

/// Resource roots and a cache directory inside one temp dir.
pub struct Fixture {
    pub dir: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("resources")).unwrap();
        fs::create_dir_all(dir.path().join("workspace")).unwrap();
        Self { dir }
    }

    pub fn sources(&self) -> PathBuf {
        self.dir.path().join("resources")
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.dir.path().join("cache")
    }

    pub fn workspace(&self) -> PathBuf {
        self.dir.path().join("workspace")
    }

    /// Write a descriptor relative to the resource root.
    pub fn write(&self, relative: &str, text: &str) -> PathBuf {
        let path = self.sources().join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, text).unwrap();
        path
    }

    pub fn settings(&self) -> RegistrySettings {
        RegistrySettings {
            sources: vec![self.sources()],
            cache_dir: Some(self.cache_dir()),
            cache_ttl: Duration::from_secs(3600),
        }
    }

    pub fn registry(&self) -> Arc<ResourceRegistry> {
        Arc::new(ResourceRegistry::new(
            self.settings(),
            Arc::new(MarkdownContentProvider::new()),
        ))
    }

    /// Registry loaded from this fixture plus a factory whose default backend is `backend`.
    pub fn factory(&self, backend: Arc<dyn Backend>) -> Arc<ExecutorFactory> {
        let registry = self.registry();
        registry.load(false).unwrap();
        let mut backends = BackendRegistry::new(Some(backend.name().to_string()));
        backends.register(backend);
        Arc::new(ExecutorFactory::new(
            registry,
            Arc::new(MarkdownContentProvider::new()),
            Arc::new(backends),
        ))
    }

    pub fn orchestrator(&self, backend: Arc<dyn Backend>) -> Orchestrator {
        self.orchestrator_with(vec![backend])
    }

    /// Orchestrator over this fixture. The first backend is the default.
    pub fn orchestrator_with(&self, backends: Vec<Arc<dyn Backend>>) -> Orchestrator {
        let config = WeftConfig {
            default_backend: backends.first().map(|b| b.name().to_string()),
            ..WeftConfig::default()
        };
        let mut builder =
            Orchestrator::builder(config, self.workspace()).registry_settings(self.settings());
        for backend in backends {
            builder = builder.backend(backend);
        }
        builder.build().unwrap()
    }

    /// TOML config pointing the registry at this fixture.
    pub fn write_config(&self, extra: &str) -> PathBuf {
        let path = self.dir.path().join("config.toml");
        let text = format!(
            "default_backend = \"echo\"\n\n[registry]\nsources = [{:?}]\ncache_dir = {:?}\n\n[logging]\nenabled = false\n{}\n",
            self.sources().display().to_string(),
            self.cache_dir().display().to_string(),
            extra
        );
        fs::write(&path, text).unwrap();
        path
    }
}

/// Descriptor text with front matter.
pub fn descriptor(name: &str, description: &str, extra_meta: &str, body: &str) -> String {
    format!(
        "---\nname: {}\ndescription: {}\n{}---\n{}\n",
        name, description, extra_meta, body
    )
}

pub fn write_skill(fixture: &Fixture, name: &str, description: &str) -> PathBuf {
    fixture.write(
        &format!("skills/{}.md", name),
        &descriptor(name, description, "", "Skill body."),
    )
}

/// Backend double: records prompts, optionally sleeps, and fails any prompt
/// containing a configured marker.
pub struct RecordingBackend {
    name: String,
    delay: Duration,
    fail_marker: Option<String>,
    panic_marker: Option<String>,
    calls: Mutex<Vec<String>>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::named(RECORDER)
    }

    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            delay: Duration::ZERO,
            fail_marker: None,
            panic_marker: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing_on(mut self, marker: &str) -> Self {
        self.fail_marker = Some(marker.to_string());
        self
    }

    pub fn panicking_on(mut self, marker: &str) -> Self {
        self.panic_marker = Some(marker.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl Backend for RecordingBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, request: BackendRequest) -> Result<BackendOutput, ApiError> {
        self.calls.lock().push(request.prompt.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(marker) = &self.panic_marker {
            if request.prompt.contains(marker.as_str()) {
                panic!("backend double asked to panic");
            }
        }
        if let Some(marker) = &self.fail_marker {
            if request.prompt.contains(marker.as_str()) {
                return Err(ApiError::BackendFailed(format!(
                    "{} rejected the prompt",
                    self.name
                )));
            }
        }
        Ok(BackendOutput {
            text: format!("done: {}", request.prompt),
        })
    }
}
