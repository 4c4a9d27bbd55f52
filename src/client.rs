use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::Value;

use crate::config::ResolverConfig;
use crate::domain::{Accession, CanonicalId, JobId, RawMapping};
use crate::error::{ResolveError, is_retryable_status};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Mapped(RawMapping),
    NotFound { detail: String },
    Pending,
}

#[async_trait]
pub trait IdMappingClient: Send + Sync {
    async fn submit(&self, accession: &Accession) -> Result<JobId, ResolveError>;
    async fn fetch_results(&self, job_id: &JobId) -> Result<FetchOutcome, ResolveError>;
}

#[derive(Clone)]
pub struct UniprotIdMappingClient {
    client: Client,
    base_url: String,
    from: String,
    to: String,
    submit_attempts: u32,
    retry_base_delay: Duration,
}

impl UniprotIdMappingClient {
    pub fn new(config: &ResolverConfig) -> Result<Self, ResolveError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("ttd-resolve/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| ResolveError::Http(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout())
            .build()
            .map_err(|err| ResolveError::Http(err.to_string()))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            from: config.from_namespace.clone(),
            to: config.to_namespace.clone(),
            submit_attempts: config.max_attempts,
            retry_base_delay: config.retry_delay(1),
        })
    }

    pub fn run_url(&self) -> String {
        format!("{}/idmapping/run", self.base_url)
    }

    pub fn results_url(&self, job_id: &JobId) -> String {
        format!(
            "{}/idmapping/uniprotkb/results/{}",
            self.base_url,
            job_id.as_str()
        )
    }

    async fn send_with_retries<F>(&self, mut make_req: F) -> Result<Response, ResolveError>
    where
        F: FnMut() -> RequestBuilder + Send,
    {
        let mut attempt = 1u32;
        loop {
            let response = make_req().send().await;
            let retry = match &response {
                Ok(resp) => is_retryable_status(resp.status().as_u16()),
                Err(err) => is_connection_error(err),
            };
            if retry && attempt < self.submit_attempts {
                tokio::time::sleep(self.retry_base_delay * attempt).await;
                attempt += 1;
                continue;
            }
            return response.map_err(classify_error);
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RunResponse {
    job_id: String,
}

#[async_trait]
impl IdMappingClient for UniprotIdMappingClient {
    async fn submit(&self, accession: &Accession) -> Result<JobId, ResolveError> {
        let url = self.run_url();
        let form = [
            ("from", self.from.as_str()),
            ("to", self.to.as_str()),
            ("ids", accession.as_str()),
        ];
        let response = self
            .send_with_retries(|| self.client.post(&url).form(&form))
            .await?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(classify_error)?;
        if !response_ok(status) {
            return Err(ResolveError::Status {
                status,
                message: body,
            });
        }
        let run: RunResponse =
            serde_json::from_str(&body).map_err(|err| ResolveError::Decode(err.to_string()))?;
        run.job_id
            .parse()
            .map_err(|_| ResolveError::Decode("empty jobId".to_string()))
    }

    async fn fetch_results(&self, job_id: &JobId) -> Result<FetchOutcome, ResolveError> {
        let response = self
            .client
            .get(self.results_url(job_id))
            .send()
            .await
            .map_err(classify_error)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(classify_error)?;
        if response_ok(status) {
            return interpret_results(&body);
        }
        // UniProt answers unknown or failed jobs with a 4xx carrying `messages`.
        if !is_retryable_status(status) {
            if let Ok(outcome @ FetchOutcome::NotFound { .. }) = interpret_results(&body) {
                return Ok(outcome);
            }
        }
        Err(ResolveError::Status {
            status,
            message: body,
        })
    }
}

fn response_ok(status: u16) -> bool {
    (200..300).contains(&status)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResultsPayload {
    #[serde(default)]
    results: Option<Vec<ResultEntry>>,
    #[serde(default)]
    failed_ids: Option<Vec<String>>,
    #[serde(default)]
    messages: Option<Vec<Value>>,
    #[serde(default)]
    job_status: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResultEntry {
    from: String,
    to: ResultTarget,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResultTarget {
    primary_accession: String,
}

// Classifies a results body. Only the first hit of `results` is used.
pub fn interpret_results(body: &str) -> Result<FetchOutcome, ResolveError> {
    let payload: ResultsPayload =
        serde_json::from_str(body).map_err(|err| ResolveError::Decode(err.to_string()))?;

    if let Some(messages) = payload.messages {
        let detail = messages
            .iter()
            .map(|message| match message {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join("; ");
        let detail = match payload.url {
            Some(url) => format!("{url}: {detail}"),
            None => detail,
        };
        return Ok(FetchOutcome::NotFound { detail });
    }

    if let Some(status) = payload.job_status.as_deref() {
        if matches!(status, "NEW" | "RUNNING") {
            return Ok(FetchOutcome::Pending);
        }
    }

    match payload.results.and_then(|results| results.into_iter().next()) {
        Some(entry) => {
            let accession: Accession = entry
                .from
                .parse()
                .map_err(|_| ResolveError::Decode("result without `from`".to_string()))?;
            let canonical_id: CanonicalId = entry
                .to
                .primary_accession
                .parse()
                .map_err(|_| ResolveError::Decode("result without primaryAccession".to_string()))?;
            Ok(FetchOutcome::Mapped(RawMapping {
                accession,
                canonical_id,
            }))
        }
        None => {
            let detail = match payload.failed_ids {
                Some(ids) if !ids.is_empty() => format!("failed ids: {}", ids.join(", ")),
                _ => "empty results".to_string(),
            };
            Ok(FetchOutcome::NotFound { detail })
        }
    }
}

fn is_connection_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request() || err.is_body()
}

fn classify_error(err: reqwest::Error) -> ResolveError {
    if is_connection_error(&err) {
        ResolveError::Connection(err.to_string())
    } else {
        ResolveError::Http(err.to_string())
    }
}
