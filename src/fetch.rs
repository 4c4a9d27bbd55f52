use std::collections::HashSet;

use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::client::{FetchOutcome, IdMappingClient};
use crate::config::ResolverConfig;
use crate::domain::{Accession, Job, JobState, RawMapping, UnresolvedAccession, UnresolvedReason};
use crate::error::ResolveError;

#[derive(Debug, Clone, Default, Serialize)]
pub struct FetchStats {
    pub batches: usize,
    pub passes: u32,
    pub transient_failures: usize,
}

#[derive(Debug, Clone, Default)]
pub struct FetchReport {
    pub mappings: Vec<RawMapping>,
    pub unresolved: Vec<UnresolvedAccession>,
    pub stats: FetchStats,
}

pub struct ResultFetcher<'a, C: IdMappingClient> {
    client: &'a C,
    config: &'a ResolverConfig,
}

impl<'a, C: IdMappingClient> ResultFetcher<'a, C> {
    pub fn new(client: &'a C, config: &'a ResolverConfig) -> Self {
        Self { client, config }
    }

    pub async fn fetch_all(&self, jobs: Vec<Job>) -> FetchReport {
        let mut tracked: Vec<(Accession, JobState)> = jobs
            .into_iter()
            .map(|job| (job.accession, JobState::Submitted(job.job_id)))
            .collect();
        let mut report = FetchReport::default();

        loop {
            let queue: Vec<usize> = tracked
                .iter()
                .enumerate()
                .filter(|(_, (_, state))| state.job_id().is_some())
                .map(|(position, _)| position)
                .collect();
            if queue.is_empty() {
                break;
            }
            if report.stats.passes > 0 {
                let delay = self.config.retry_delay(report.stats.passes);
                info!(
                    pending = queue.len(),
                    delay_ms = delay.as_millis() as u64,
                    "retrying unfinished jobs"
                );
                tokio::time::sleep(delay).await;
            }
            report.stats.passes += 1;

            let chunks: Vec<&[usize]> = queue.chunks(self.config.batch_size.max(1)).collect();
            let last = chunks.len() - 1;
            for (chunk_no, chunk) in chunks.into_iter().enumerate() {
                report.stats.batches += 1;
                let batch = report.stats.batches;
                let outcomes = self.fetch_batch(&tracked, chunk).await;

                let mut transient = false;
                for (position, outcome) in outcomes {
                    let (accession, state) = &mut tracked[position];
                    let previous = std::mem::replace(state, JobState::Pending);
                    *state = match outcome {
                        Ok(FetchOutcome::Mapped(mapping)) => {
                            debug!(
                                accession = %accession,
                                canonical_id = %mapping.canonical_id,
                                "mapped"
                            );
                            let canonical_id = mapping.canonical_id.clone();
                            report.mappings.push(mapping);
                            JobState::Resolved(canonical_id)
                        }
                        Ok(FetchOutcome::NotFound { detail }) => {
                            info!(
                                accession = %accession,
                                detail = %detail,
                                "cannot be found on uniprot"
                            );
                            JobState::NotFound
                        }
                        Ok(FetchOutcome::Pending) => {
                            debug!(accession = %accession, "job still running");
                            previous.fail(self.config.max_attempts)
                        }
                        Err(err) if err.is_transient() => {
                            transient = true;
                            report.stats.transient_failures += 1;
                            warn!(
                                accession = %accession,
                                batch,
                                error = %err,
                                "transient fetch failure"
                            );
                            previous.fail(self.config.max_attempts)
                        }
                        Err(err) => {
                            warn!(
                                accession = %accession,
                                batch,
                                error = %err,
                                "fetch rejected"
                            );
                            JobState::Unresolved(UnresolvedReason::Rejected {
                                message: err.to_string(),
                            })
                        }
                    };
                }

                let work_left = chunk_no < last
                    || tracked.iter().any(|(_, state)| state.is_retryable());
                if transient && work_left {
                    let cooldown = self.config.cooldown();
                    warn!(
                        batch,
                        cooldown_secs = cooldown.as_secs(),
                        "cooling down after connection failure"
                    );
                    tokio::time::sleep(cooldown).await;
                }
            }
        }

        // One entry per accession, and none for accessions that mapped.
        let mut seen: HashSet<Accession> = report
            .mappings
            .iter()
            .map(|mapping| mapping.accession.clone())
            .collect();
        for (accession, state) in tracked {
            if seen.contains(&accession) {
                continue;
            }
            if matches!(state, JobState::NotFound | JobState::Unresolved(_)) {
                seen.insert(accession.clone());
            }
            match state {
                JobState::NotFound => report
                    .unresolved
                    .push(UnresolvedAccession::new(accession, UnresolvedReason::NotFound)),
                JobState::Unresolved(reason) => {
                    if let UnresolvedReason::RetriesExhausted { attempts } = &reason {
                        warn!(accession = %accession, attempts, "giving up on job");
                    }
                    report
                        .unresolved
                        .push(UnresolvedAccession::new(accession, reason));
                }
                _ => {}
            }
        }

        info!(
            mapped = report.mappings.len(),
            unresolved = report.unresolved.len(),
            batches = report.stats.batches,
            "fetch phase complete"
        );
        report
    }

    // Results are tagged with the job position; completion order is irrelevant.
    async fn fetch_batch(
        &self,
        tracked: &[(Accession, JobState)],
        chunk: &[usize],
    ) -> Vec<(usize, Result<FetchOutcome, ResolveError>)> {
        let requests = chunk.iter().filter_map(|&position| {
            tracked[position].1.job_id().map(|job_id| async move {
                (position, self.client.fetch_results(job_id).await)
            })
        });

        let limit = self.config.batch_timeout();
        match tokio::time::timeout(limit, join_all(requests)).await {
            Ok(results) => results,
            Err(_) => chunk
                .iter()
                .map(|&position| (position, Err(ResolveError::BatchTimeout(limit.as_secs()))))
                .collect(),
        }
    }
}
