//! Shared test helpers: scripted fetchers and transformers for pipeline tests.

use crate::error::{Error, Result};
use crate::fetch::SourceFetcher;
use crate::transformer::Transformer;
use crate::types::{ImportTask, StudyId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Records how many instrumented operations run at once
#[derive(Debug, Default)]
pub(crate) struct ConcurrencyProbe {
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl ConcurrencyProbe {
    pub(crate) fn enter(&self) {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    pub(crate) fn exit(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }

    pub(crate) fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

/// Fetcher that writes the location string as file content, or fails on request
#[derive(Debug, Default)]
pub(crate) struct StubFetcher {
    failures: HashMap<String, String>,
    delay: Duration,
    probe: Option<Arc<ConcurrencyProbe>>,
    calls: AtomicUsize,
}

impl StubFetcher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn failing(mut self, location: &str, reason: &str) -> Self {
        self.failures.insert(location.to_string(), reason.to_string());
        self
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn with_probe(mut self, probe: Arc<ConcurrencyProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceFetcher for StubFetcher {
    async fn fetch(&self, location: &str, dest: &Path) -> Result<u64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(probe) = &self.probe {
            probe.enter();
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(probe) = &self.probe {
            probe.exit();
        }
        if let Some(reason) = self.failures.get(location) {
            return Err(Error::Other(reason.clone()));
        }
        tokio::fs::write(dest, location.as_bytes()).await?;
        Ok(location.len() as u64)
    }
}

/// What a [`StubTransformer`] does when invoked
#[derive(Debug, Clone)]
pub(crate) enum Behavior {
    Succeed(String),
    Fail(String),
    Panic,
}

/// Transformer with scripted behavior and optional concurrency instrumentation
pub(crate) struct StubTransformer {
    behavior: Behavior,
    delay: Duration,
    probe: Option<Arc<ConcurrencyProbe>>,
}

impl StubTransformer {
    pub(crate) fn new(behavior: Behavior) -> Self {
        Self {
            behavior,
            delay: Duration::ZERO,
            probe: None,
        }
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn with_probe(mut self, probe: Arc<ConcurrencyProbe>) -> Self {
        self.probe = Some(probe);
        self
    }
}

#[async_trait]
impl Transformer for StubTransformer {
    async fn transform(&self, staged_file: &Path) -> Result<String> {
        assert!(staged_file.exists(), "transform called before staging");

        if let Some(probe) = &self.probe {
            probe.enter();
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(probe) = &self.probe {
            probe.exit();
        }

        match &self.behavior {
            Behavior::Succeed(message) => Ok(message.clone()),
            Behavior::Fail(reason) => Err(Error::Transform(reason.clone())),
            Behavior::Panic => panic!("transformer exploded"),
        }
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}

/// Build a task staged under `base` with source location `/sources/<study>.tsv`
pub(crate) fn stub_task(base: &Path, study: &str, transformer: StubTransformer) -> ImportTask {
    ImportTask {
        study_id: StudyId::from(study),
        staging_path: base.join(study.to_lowercase()),
        source_location: format!("/sources/{}.tsv", study),
        transformer: Arc::new(transformer),
    }
}
