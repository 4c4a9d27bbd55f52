use std::collections::BTreeSet;

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::client::IdMappingClient;
use crate::domain::{Accession, Job, JobState, UnresolvedAccession, UnresolvedReason};

#[derive(Debug, Clone, Default)]
pub struct SubmissionReport {
    pub jobs: Vec<Job>,
    pub failed: Vec<UnresolvedAccession>,
}

impl SubmissionReport {
    pub fn submitted(&self) -> usize {
        self.jobs.len()
    }
}

pub struct JobSubmitter<'a, C: IdMappingClient> {
    client: &'a C,
}

impl<'a, C: IdMappingClient> JobSubmitter<'a, C> {
    pub fn new(client: &'a C) -> Self {
        Self { client }
    }

    pub async fn submit_all<I>(&self, accessions: I) -> SubmissionReport
    where
        I: IntoIterator<Item = Accession>,
    {
        let unique: BTreeSet<Accession> = accessions.into_iter().collect();
        if unique.is_empty() {
            return SubmissionReport::default();
        }

        let mut tracked: Vec<(Accession, JobState)> = unique
            .into_iter()
            .map(|accession| (accession, JobState::Pending))
            .collect();
        info!(accessions = tracked.len(), "submitting id mapping jobs");

        let outcomes = join_all(
            tracked
                .iter()
                .map(|(accession, _)| self.client.submit(accession)),
        )
        .await;

        for ((accession, state), outcome) in tracked.iter_mut().zip(outcomes) {
            *state = match outcome {
                Ok(job_id) => {
                    debug!(accession = %accession, job_id = %job_id, "job submitted");
                    JobState::Submitted(job_id)
                }
                Err(err) => {
                    warn!(accession = %accession, error = %err, "job submission failed");
                    JobState::Unresolved(UnresolvedReason::SubmissionFailed {
                        message: err.to_string(),
                    })
                }
            };
        }

        let mut report = SubmissionReport::default();
        for (accession, state) in tracked {
            match state {
                JobState::Submitted(job_id) => report.jobs.push(Job { accession, job_id }),
                JobState::Unresolved(reason) => {
                    report.failed.push(UnresolvedAccession::new(accession, reason))
                }
                _ => {}
            }
        }
        info!(
            submitted = report.jobs.len(),
            failed = report.failed.len(),
            "submission phase complete"
        );
        report
    }
}
