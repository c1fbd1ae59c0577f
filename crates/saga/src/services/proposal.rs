//! Proposal query client: remote lookup of a proposal's approval state.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use common::ProposalId;
use domain::{ProposalSnapshot, ProposalStatus};
use http::header::ACCEPT;
use http::{Request, StatusCode, Uri};
use http_body_util::{BodyExt, Empty};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use thiserror::Error;

/// Default client-side timeout for proposal lookups.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors returned by the proposal query client.
#[derive(Debug, Error)]
pub enum ProposalClientError {
    /// The proposal service did not answer within the timeout.
    #[error("Proposal service timed out")]
    Timeout,

    /// The proposal service could not be reached.
    #[error("Proposal service unreachable: {0}")]
    Connection(String),

    /// The proposal service answered with a body that is not a proposal.
    #[error("Invalid proposal service response: {0}")]
    InvalidResponse(String),

    /// The configured base URL cannot form a request URI.
    #[error("Invalid proposal service URL: {0}")]
    InvalidUrl(String),
}

/// Looks up proposals owned by the proposal service.
///
/// Lookups are never retried here.
#[async_trait]
pub trait ProposalQueryClient: Send + Sync {
    /// Returns the proposal, or `None` if the service does not know it.
    async fn get_proposal(
        &self,
        id: ProposalId,
    ) -> Result<Option<ProposalSnapshot>, ProposalClientError>;
}

/// HTTP client for `GET {base_url}/api/propostas/{id}`.
///
/// Any non-2xx response means the proposal is absent. A body describing a
/// different proposal is an invalid response. The timeout bounds the whole
/// exchange, body included. Plain `http://` base URLs only.
#[derive(Clone)]
pub struct HttpProposalClient {
    http: Client<HttpConnector, Empty<Bytes>>,
    base_url: String,
    timeout: Duration,
}

impl std::fmt::Debug for HttpProposalClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpProposalClient")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl HttpProposalClient {
    /// Creates a client with the given base URL and request timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ProposalClientError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        base_url
            .parse::<Uri>()
            .map_err(|e| ProposalClientError::InvalidUrl(format!("{base_url}: {e}")))?;

        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(timeout));
        let http = Client::builder(TokioExecutor::new()).build(connector);

        Ok(Self {
            http,
            base_url,
            timeout,
        })
    }

    /// Returns the lookup URL for a proposal.
    pub fn proposal_url(&self, id: ProposalId) -> String {
        format!("{}/api/propostas/{}", self.base_url, id)
    }

    async fn fetch(&self, request: Request<Empty<Bytes>>) -> Result<(StatusCode, Bytes), ProposalClientError> {
        let response = self
            .http
            .request(request)
            .await
            .map_err(|e| ProposalClientError::Connection(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Ok((status, Bytes::new()));
        }

        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e| ProposalClientError::Connection(e.to_string()))?
            .to_bytes();
        Ok((status, body))
    }
}

#[async_trait]
impl ProposalQueryClient for HttpProposalClient {
    #[tracing::instrument(skip(self), fields(proposal_id = %id))]
    async fn get_proposal(
        &self,
        id: ProposalId,
    ) -> Result<Option<ProposalSnapshot>, ProposalClientError> {
        let url = self.proposal_url(id);
        let request = Request::get(url.as_str())
            .header(ACCEPT, "application/json")
            .body(Empty::new())
            .map_err(|e| ProposalClientError::InvalidUrl(format!("{url}: {e}")))?;

        let outcome = match tokio::time::timeout(self.timeout, self.fetch(request)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(ProposalClientError::Timeout),
        };
        let (status, body) = outcome.inspect_err(|e| {
            metrics::counter!("proposal_lookups_total", "outcome" => "error").increment(1);
            tracing::warn!(error = %e, "proposal lookup failed");
        })?;

        if !status.is_success() {
            metrics::counter!("proposal_lookups_total", "outcome" => "absent").increment(1);
            tracing::info!(status = status.as_u16(), "proposal service returned no proposal");
            return Ok(None);
        }

        let snapshot = ProposalSnapshot::from_json(&body)
            .map_err(|e| ProposalClientError::InvalidResponse(e.to_string()))
            .and_then(|snapshot| {
                if snapshot.id == id {
                    Ok(snapshot)
                } else {
                    Err(ProposalClientError::InvalidResponse(format!(
                        "asked for proposal {id}, got {}",
                        snapshot.id
                    )))
                }
            })
            .inspect_err(|e| {
                metrics::counter!("proposal_lookups_total", "outcome" => "invalid").increment(1);
                tracing::warn!(error = %e, "proposal service returned an unusable body");
            })?;

        metrics::counter!("proposal_lookups_total", "outcome" => "found").increment(1);
        tracing::debug!(status = %snapshot.status, "proposal fetched");
        Ok(Some(snapshot))
    }
}

#[derive(Debug, Default)]
struct InMemoryProposalState {
    proposals: HashMap<ProposalId, ProposalSnapshot>,
    fail_with: Option<FailureMode>,
    delay: Option<Duration>,
}

#[derive(Debug, Clone, Copy)]
enum FailureMode {
    Timeout,
    Unreachable,
}

/// In-memory proposal service for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProposalClient {
    state: Arc<RwLock<InMemoryProposalState>>,
    lookups: Arc<AtomicUsize>,
}

impl InMemoryProposalClient {
    /// Creates an empty proposal service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a proposal with the given status.
    pub fn insert(&self, id: ProposalId, status: ProposalStatus) {
        self.insert_snapshot(ProposalSnapshot::new(id, status));
    }

    /// Registers a full proposal snapshot.
    pub fn insert_snapshot(&self, snapshot: ProposalSnapshot) {
        self.write().proposals.insert(snapshot.id, snapshot);
    }

    /// Makes every lookup time out.
    pub fn set_fail_with_timeout(&self, fail: bool) {
        self.write().fail_with = fail.then_some(FailureMode::Timeout);
    }

    /// Makes every lookup fail as if the service were down.
    pub fn set_unreachable(&self, fail: bool) {
        self.write().fail_with = fail.then_some(FailureMode::Unreachable);
    }

    /// Delays every lookup by `delay`.
    pub fn set_delay(&self, delay: Option<Duration>) {
        self.write().delay = delay;
    }

    /// Returns the number of lookups performed.
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, InMemoryProposalState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ProposalQueryClient for InMemoryProposalClient {
    async fn get_proposal(
        &self,
        id: ProposalId,
    ) -> Result<Option<ProposalSnapshot>, ProposalClientError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);

        let (result, delay) = {
            let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
            let result = match state.fail_with {
                Some(FailureMode::Timeout) => Err(ProposalClientError::Timeout),
                Some(FailureMode::Unreachable) => Err(ProposalClientError::Connection(
                    "proposal service unreachable".to_string(),
                )),
                None => Ok(state.proposals.get(&id).cloned()),
            };
            (result, state.delay)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        result
    }
}
