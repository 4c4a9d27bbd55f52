use std::path::Path;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::info;

use crate::aggregate::{ResolutionAggregator, ResolutionTable};
use crate::client::IdMappingClient;
use crate::config::{ResolverConfig, TARGET_DOWNLOAD_FILE};
use crate::domain::UnresolvedAccession;
use crate::error::ResolveError;
use crate::extract::{AccessionExtractor, EntityIndex};
use crate::fetch::{FetchStats, ResultFetcher};
use crate::submit::JobSubmitter;

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink: Send + Sync {
    fn event(&self, event: ProgressEvent);
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolutionReport {
    pub source: String,
    pub generated_at: String,
    pub entities: usize,
    pub accessions: usize,
    pub submitted: usize,
    pub table: ResolutionTable,
    pub unresolved: Vec<UnresolvedAccession>,
    pub fetch: FetchStats,
}

impl ResolutionReport {
    fn empty(source: String) -> Self {
        Self {
            source,
            generated_at: chrono::Utc::now().to_rfc3339(),
            entities: 0,
            accessions: 0,
            submitted: 0,
            table: ResolutionTable::default(),
            unresolved: Vec::new(),
            fetch: FetchStats::default(),
        }
    }
}

#[derive(Clone)]
pub struct Resolver<C: IdMappingClient> {
    client: C,
    config: ResolverConfig,
}

impl<C: IdMappingClient> Resolver<C> {
    pub fn new(client: C, config: ResolverConfig) -> Self {
        Self { client, config }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub async fn resolve_dir(
        &self,
        source_dir: &Path,
        sink: &dyn ProgressSink,
    ) -> Result<ResolutionReport, ResolveError> {
        self.resolve_file(&source_dir.join(TARGET_DOWNLOAD_FILE), sink)
            .await
    }

    pub async fn resolve_file(
        &self,
        path: &Path,
        sink: &dyn ProgressSink,
    ) -> Result<ResolutionReport, ResolveError> {
        let extractor = AccessionExtractor::open(path, self.config.header_rows)?;
        sink.event(ProgressEvent {
            message: format!("phase=Extract; scanning {}", path.display()),
            elapsed: None,
        });
        let start = Instant::now();
        let index = extractor.index()?;
        sink.event(ProgressEvent {
            message: format!("phase=Extract; {} entities", index.len()),
            elapsed: Some(start.elapsed()),
        });
        self.resolve_index(&index, path.display().to_string(), sink)
            .await
    }

    pub async fn resolve_index(
        &self,
        index: &EntityIndex,
        source: String,
        sink: &dyn ProgressSink,
    ) -> Result<ResolutionReport, ResolveError> {
        let mut report = ResolutionReport::empty(source);
        report.entities = index.len();
        if index.is_empty() {
            info!("no entities with accessions; skipping remote resolution");
            return Ok(report);
        }

        let accessions = index.unique_accessions();
        report.accessions = accessions.len();

        sink.event(ProgressEvent {
            message: format!("phase=Submit; {} accessions", accessions.len()),
            elapsed: None,
        });
        let start = Instant::now();
        let submission = JobSubmitter::new(&self.client)
            .submit_all(accessions)
            .await;
        report.submitted = submission.submitted();
        sink.event(ProgressEvent {
            message: format!(
                "phase=Submit; {} jobs, {} failed",
                submission.jobs.len(),
                submission.failed.len()
            ),
            elapsed: Some(start.elapsed()),
        });

        sink.event(ProgressEvent {
            message: format!("phase=Fetch; {} jobs", submission.jobs.len()),
            elapsed: None,
        });
        let start = Instant::now();
        let fetched = ResultFetcher::new(&self.client, &self.config)
            .fetch_all(submission.jobs)
            .await;
        sink.event(ProgressEvent {
            message: format!(
                "phase=Fetch; {} mapped in {} batches",
                fetched.mappings.len(),
                fetched.stats.batches
            ),
            elapsed: Some(start.elapsed()),
        });

        sink.event(ProgressEvent {
            message: "phase=Aggregate; merging by entity".to_string(),
            elapsed: None,
        });
        report.table =
            ResolutionAggregator::new(self.config.attribution).aggregate(&fetched.mappings, index);
        report.unresolved = submission.failed;
        report.unresolved.extend(fetched.unresolved);
        report.fetch = fetched.stats;

        info!(
            entities = report.entities,
            resolved = report.table.len(),
            unresolved_accessions = report.unresolved.len(),
            "resolution complete"
        );
        Ok(report)
    }
}
