//! Scripted collaborators for driving import runs without a network

use async_trait::async_trait;
use somatic_etl::{Error, Result, SourceFetcher, Transformer, TransformerFactory};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Source location used for `study` in these fixtures
pub fn source_for(study: &str) -> String {
    format!("/registry/{}/ssm.tsv", study)
}

/// Staging directory name used for `study` in these fixtures
pub fn directory_for(study: &str) -> String {
    study.to_lowercase()
}

/// Records the highest number of instrumented steps running at once
#[derive(Debug, Default)]
pub struct ConcurrencyProbe {
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl ConcurrencyProbe {
    fn enter(&self) {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }

    /// Highest concurrency observed
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

/// Fetcher writing a small TSV per location, failing for scripted locations
#[derive(Default)]
pub struct ScriptedFetcher {
    failures: HashMap<String, String>,
    delay: Duration,
    probe: Option<Arc<ConcurrencyProbe>>,
    calls: AtomicUsize,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make fetching `study`'s source fail with `reason`
    pub fn fail_study(mut self, study: &str, reason: &str) -> Self {
        self.failures.insert(source_for(study), reason.to_string());
        self
    }

    /// Slow every fetch down by `delay`
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Record fetch concurrency in `probe`
    pub fn with_probe(mut self, probe: Arc<ConcurrencyProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Number of fetch calls made so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceFetcher for ScriptedFetcher {
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
        let body = format!("icgc_mutation_id\tsource\nMU1\t{}\n", location);
        tokio::fs::write(dest, body.as_bytes()).await?;
        Ok(body.len() as u64)
    }
}

/// Transformer answering `<STUDY>:done`, or failing when scripted to
pub struct ScriptedTransformer {
    study: String,
    failure: Option<String>,
    delay: Duration,
    probe: Option<Arc<ConcurrencyProbe>>,
}

#[async_trait]
impl Transformer for ScriptedTransformer {
    async fn transform(&self, staged_file: &Path) -> Result<String> {
        if let Some(probe) = &self.probe {
            probe.enter();
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(probe) = &self.probe {
            probe.exit();
        }

        if let Some(reason) = &self.failure {
            return Err(Error::Transform(reason.clone()));
        }
        let content = tokio::fs::read_to_string(staged_file).await?;
        if !content.starts_with("icgc_mutation_id") {
            return Err(Error::Transform("missing header".into()));
        }
        Ok(format!("{}:done", self.study))
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Factory deriving the study from the staging directory name
#[derive(Default)]
pub struct ScriptedTransformerFactory {
    failures: HashMap<String, String>,
    delay: Duration,
    probe: Option<Arc<ConcurrencyProbe>>,
}

impl ScriptedTransformerFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make transforming `study` fail with `reason`
    pub fn fail_study(mut self, study: &str, reason: &str) -> Self {
        self.failures
            .insert(directory_for(study), reason.to_string());
        self
    }

    /// Slow every transform down by `delay`
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Record transform concurrency in `probe`
    pub fn with_probe(mut self, probe: Arc<ConcurrencyProbe>) -> Self {
        self.probe = Some(probe);
        self
    }
}

impl TransformerFactory for ScriptedTransformerFactory {
    fn build(&self, staging_path: &Path) -> Arc<dyn Transformer> {
        let directory = staging_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();

        Arc::new(ScriptedTransformer {
            study: directory.to_uppercase(),
            failure: self.failures.get(&directory).cloned(),
            delay: self.delay,
            probe: self.probe.clone(),
        })
    }
}
