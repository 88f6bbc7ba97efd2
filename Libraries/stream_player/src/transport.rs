use std::sync::Mutex;
use std::time::Instant;

use bytes::{Bytes, BytesMut};
use reqwest::header::RANGE;
use reqwest::Client;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::error::{PlayerError, Result};
use crate::estimator::{ProgressTracker, SharedEstimator};
use crate::orchestrator::{FragmentRequest, FragmentResponse, FragmentTransport, RequestHandle};

/// Downloads the manifest document as text.
pub async fn fetch_manifest(client: &Client, url: &str) -> Result<String> {
    let response = client.get(url).send().await?;
    if !response.status().is_success() {
        return Err(PlayerError::transport(format!("{} fetching manifest {}", response.status(), url)));
    }
    Ok(response.text().await?)
}

/// Performs fragment requests on the tokio runtime and sends completions to the player loop.
///
/// Every received chunk is reported to the shared estimator as a progress sample.
pub struct HttpTransport {
    client: Client,
    estimator: SharedEstimator,
    completions: UnboundedSender<FragmentResponse>,
}

impl HttpTransport {
    pub fn new(client: Client, estimator: SharedEstimator, completions: UnboundedSender<FragmentResponse>) -> Self {
        Self { client, estimator, completions }
    }
}

impl FragmentTransport for HttpTransport {
    fn issue(&self, request: FragmentRequest) -> RequestHandle {
        let cancel = CancellationToken::new();
        let handle = RequestHandle::new(request.id, cancel.clone());
        let client = self.client.clone();
        let estimator = self.estimator.clone();
        let completions = self.completions.clone();

        tokio::spawn(async move {
            let result = tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("{} request {} aborted", request.track, request.id);
                    return;
                }
                result = fetch_fragment(&client, &request, &estimator) => result,
            };
            let response = FragmentResponse { id: request.id, track: request.track, result };
            if completions.send(response).is_err() {
                debug!("player gone, dropping completion of request {}", request.id);
            }
        });
        handle
    }
}

async fn fetch_fragment(client: &Client, request: &FragmentRequest, estimator: &SharedEstimator) -> Result<(u16, Bytes)> {
    let mut builder = client.get(&request.url);
    if let Some(range) = request.range_header() {
        builder = builder.header(RANGE, range);
    }
    let started = Instant::now();
    let mut response = builder.send().await.map_err(|e| {
        error!("Fetch failed for {}: {}", request.url, e);
        PlayerError::from(e)
    })?;
    let status = response.status().as_u16();

    let mut progress = ProgressTracker::new();
    let mut body = BytesMut::new();
    progress.report(0, elapsed_ms(started), estimator);
    while let Some(chunk) = response.chunk().await? {
        body.extend_from_slice(&chunk);
        progress.report(body.len() as u64, elapsed_ms(started), estimator);
    }
    debug!("{} request {}: status {}, {} bytes", request.track, request.id, status, body.len());
    Ok((status, body.freeze()))
}

fn elapsed_ms(since: Instant) -> f64 {
    since.elapsed().as_secs_f64() * 1000.0
}

/// Transport that only records what it was asked to do. Completions are fed back by hand.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    issued: Mutex<Vec<(FragmentRequest, CancellationToken)>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_issued<T>(&self, f: impl FnOnce(&mut Vec<(FragmentRequest, CancellationToken)>) -> T) -> T {
        let mut guard = self.issued.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }

    pub fn requests(&self) -> Vec<FragmentRequest> {
        self.with_issued(|issued| issued.iter().map(|(r, _)| r.clone()).collect())
    }

    pub fn last(&self) -> Option<FragmentRequest> {
        self.with_issued(|issued| issued.last().map(|(r, _)| r.clone()))
    }

    pub fn len(&self) -> usize {
        self.with_issued(|issued| issued.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the request with `id` issued for `request.track` was cancelled.
    pub fn was_cancelled(&self, request: &FragmentRequest) -> bool {
        self.with_issued(|issued| {
            issued
                .iter()
                .any(|(r, token)| r.id == request.id && r.track == request.track && token.is_cancelled())
        })
    }
}

impl FragmentTransport for RecordingTransport {
    fn issue(&self, request: FragmentRequest) -> RequestHandle {
        let cancel = CancellationToken::new();
        let handle = RequestHandle::new(request.id, cancel.clone());
        self.with_issued(|issued| issued.push((request, cancel)));
        handle
    }
}
