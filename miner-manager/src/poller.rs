//! Device polling: fetch, decode and translate each target.

use std::sync::Arc;
use std::time::Instant;

use miner_manager_common::{Record, current_timestamp_nanos};
use serde_json::Value;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::config::PollerConfig;
use crate::status::RawStatus;
use crate::translate::translate;

/// Error type for polling a single device.
#[derive(Debug, thiserror::Error)]
pub enum PollError {
    #[error("Request failed: {0}")]
    Transport(String),
    #[error("Unexpected HTTP status: {0}")]
    Status(u16),
    #[error("Invalid status document: {0}")]
    Decode(String),
    #[error("Poll task failed: {0}")]
    Task(String),
    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

/// Outcome of one scrape across all targets.
#[derive(Debug, Clone, Default)]
pub struct ScrapeReport {
    /// Timestamp shared by every record.
    pub timestamp_ns: u64,
    /// Records in target order.
    pub records: Vec<Record>,
    /// Number of targets visited.
    pub targets: usize,
    /// Targets that could not be fetched or decoded.
    pub failures: usize,
    /// Targets that answered but reported no fields.
    pub empty: usize,
}

impl ScrapeReport {
    /// Newline-joined records, without a trailing newline.
    pub fn body(&self) -> String {
        self.records
            .iter()
            .map(Record::to_line)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Polls mining devices over HTTP.
#[derive(Clone)]
pub struct Poller {
    client: reqwest::Client,
    status_path: String,
    concurrency: usize,
}

/// Shareable poller handle.
pub type SharedPoller = Arc<Poller>;

impl Poller {
    /// Create a poller from configuration.
    pub fn new(config: &PollerConfig) -> Result<Self, PollError> {
        let builder = reqwest::Client::builder()
            .timeout(config.timeout())
            .no_proxy();

        Self::with_client_builder(builder, config)
    }

    fn with_client_builder(
        builder: reqwest::ClientBuilder,
        config: &PollerConfig,
    ) -> Result<Self, PollError> {
        let client = builder
            .build()
            .map_err(|e| PollError::Client(e.to_string()))?;

        Ok(Self {
            client,
            status_path: config.status_path.clone(),
            concurrency: config.concurrency.max(1),
        })
    }

    /// URL of the status document for `target`.
    pub fn status_url(&self, target: &str) -> String {
        format!("http://{}{}", target, self.status_path)
    }

    /// Fetch and decode one device's status document.
    pub async fn fetch(&self, target: &str) -> Result<RawStatus, PollError> {
        let response = self
            .client
            .get(self.status_url(target))
            .send()
            .await
            .map_err(|e| PollError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PollError::Status(status.as_u16()));
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| PollError::Decode(e.to_string()))?;

        RawStatus::from_value(value)
            .ok_or_else(|| PollError::Decode("expected a JSON object".to_string()))
    }

    /// Poll one device and translate its status.
    ///
    /// `Ok(None)` means the device answered but reported nothing usable.
    pub async fn poll_target(
        &self,
        target: &str,
        timestamp_ns: u64,
    ) -> Result<Option<Record>, PollError> {
        let status = self.fetch(target).await?;
        Ok(translate(&status, timestamp_ns))
    }

    /// Poll every target once and collect the records in target order.
    ///
    /// Failures are logged and skipped; this never fails as a whole.
    pub async fn scrape(&self, targets: &[String]) -> ScrapeReport {
        let started = Instant::now();
        let timestamp_ns = current_timestamp_nanos();
        let semaphore = Arc::new(Semaphore::new(self.concurrency));

        let handles: Vec<_> = targets
            .iter()
            .cloned()
            .map(|target| {
                let poller = self.clone();
                let semaphore = semaphore.clone();
                tokio::spawn(async move {
                    let _permit = semaphore
                        .acquire_owned()
                        .await
                        .map_err(|e| PollError::Task(e.to_string()))?;
                    poller.poll_target(&target, timestamp_ns).await
                })
            })
            .collect();

        let mut report = ScrapeReport {
            timestamp_ns,
            targets: targets.len(),
            ..Default::default()
        };

        for (target, handle) in targets.iter().zip(handles) {
            let result = handle
                .await
                .unwrap_or_else(|e| Err(PollError::Task(e.to_string())));

            match result {
                Ok(Some(record)) => {
                    debug!(device = %target, fields = record.fields.len(), "Device polled");
                    report.records.push(record);
                }
                Ok(None) => {
                    debug!(device = %target, "Device reported no numeric fields");
                    report.empty += 1;
                }
                Err(e) => {
                    warn!(device = %target, error = %e, "Failed to poll device");
                    report.failures += 1;
                }
            }
        }

        info!(
            targets = report.targets,
            records = report.records.len(),
            failures = report.failures,
            empty = report.empty,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Scrape complete"
        );

        report
    }

    /// Maximum number of devices polled at once.
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }
}
