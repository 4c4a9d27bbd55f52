use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::ResolveError;

macro_rules! string_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ResolveError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    return Err(ResolveError::EmptyIdentifier);
                }
                Ok(Self(trimmed.to_string()))
            }
        }
    };
}

string_id!(EntityId);
string_id!(Accession);
string_id!(CanonicalId);
string_id!(JobId);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub accession: Accession,
    pub job_id: JobId,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct RawMapping {
    pub accession: Accession,
    pub canonical_id: CanonicalId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolutionRecord {
    pub entity_id: EntityId,
    pub canonical_ids: BTreeSet<CanonicalId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Submitted(JobId),
    Resolved(CanonicalId),
    NotFound,
    Failed { job_id: JobId, attempts: u32 },
    Unresolved(UnresolvedReason),
}

impl JobState {
    // Records one more failed fetch. Jobs that reach `max_attempts` become
    // `Unresolved`; the rest stay `Failed` and are re-enqueued.
    pub fn fail(self, max_attempts: u32) -> JobState {
        let (job_id, attempts) = match self {
            JobState::Submitted(job_id) => (job_id, 1),
            JobState::Failed { job_id, attempts } => (job_id, attempts + 1),
            other => return other,
        };
        if attempts >= max_attempts {
            JobState::Unresolved(UnresolvedReason::RetriesExhausted { attempts })
        } else {
            JobState::Failed { job_id, attempts }
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, JobState::Failed { .. })
    }

    pub fn job_id(&self) -> Option<&JobId> {
        match self {
            JobState::Submitted(job_id) | JobState::Failed { job_id, .. } => Some(job_id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum UnresolvedReason {
    SubmissionFailed { message: String },
    NotFound,
    RetriesExhausted { attempts: u32 },
    Rejected { message: String },
}

impl fmt::Display for UnresolvedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnresolvedReason::SubmissionFailed { message } => {
                write!(f, "submission failed: {message}")
            }
            UnresolvedReason::NotFound => write!(f, "not found"),
            UnresolvedReason::RetriesExhausted { attempts } => {
                write!(f, "gave up after {attempts} attempts")
            }
            UnresolvedReason::Rejected { message } => write!(f, "rejected: {message}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnresolvedAccession {
    pub accession: Accession,
    pub reason: UnresolvedReason,
}

impl UnresolvedAccession {
    pub fn new(accession: Accession, reason: UnresolvedReason) -> Self {
        Self { accession, reason }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum AttributionPolicy {
    #[default]
    AllOwners,
    LastMatch,
}

impl fmt::Display for AttributionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributionPolicy::AllOwners => write!(f, "all-owners"),
            AttributionPolicy::LastMatch => write!(f, "last-match"),
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parse_ids_trims_whitespace() {
        let acc: Accession = "  P00533 ".parse().unwrap();
        assert_eq!(acc.as_str(), "P00533");
        let err = "   ".parse::<EntityId>().unwrap_err();
        assert_matches!(err, ResolveError::EmptyIdentifier);
    }

    #[test]
    fn job_state_retry_ceiling() {
        let job_id: JobId = "abc123".parse().unwrap();
        let state = JobState::Submitted(job_id.clone()).fail(3);
        assert_eq!(
            state,
            JobState::Failed {
                job_id: job_id.clone(),
                attempts: 1
            }
        );
        let state = state.fail(3);
        assert!(state.is_retryable());
        let state = state.fail(3);
        assert_eq!(
            state,
            JobState::Unresolved(UnresolvedReason::RetriesExhausted { attempts: 3 })
        );
    }

    #[test]
    fn single_attempt_gives_up_immediately() {
        let job_id: JobId = "abc".parse().unwrap();
        let state = JobState::Submitted(job_id).fail(1);
        assert_matches!(
            state,
            JobState::Unresolved(UnresolvedReason::RetriesExhausted { attempts: 1 })
        );
    }

    #[test]
    fn fail_leaves_terminal_states_alone() {
        assert_eq!(JobState::NotFound.fail(3), JobState::NotFound);
    }
}
