//! Long-poll watch client.
//!
//! Follows a form's analytics endpoint, printing a breakdown each time the
//! server reports fresher data, and re-polling with the returned marker.

use crate::models::{DistributionSnapshot, LongPollResponse};
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::StatusCode;
use std::time::Duration;
use tracing::{debug, info};

/// Settings for a watch session.
#[derive(Debug, Clone)]
pub struct WatchOptions {
    /// Base URL of the server, without a trailing slash.
    pub server_url: String,
    pub form_id: String,
    /// Freshness baseline for the first request.
    pub since: i64,
    /// Stop after this many snapshots; unbounded when `None`.
    pub max_updates: Option<usize>,
    pub request_timeout_secs: u64,
    pub show_progress: bool,
}

/// Result of one long-poll round trip.
#[derive(Debug, Clone, PartialEq)]
pub enum PollResult {
    Update(LongPollResponse),
    /// Server released the request without a body (shutting down).
    Closed,
}

/// HTTP client that drives the long-poll loop.
pub struct WatchClient {
    options: WatchOptions,
    http_client: reqwest::Client,
}

impl WatchClient {
    pub fn new(options: WatchOptions) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(options.request_timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            options,
            http_client,
        })
    }

    /// URL of the long-poll endpoint for a given baseline.
    pub fn longpoll_url(&self, since: i64) -> String {
        format!(
            "{}/api/forms/{}/analytics/longpoll?since={}",
            self.options.server_url.trim_end_matches('/'),
            self.options.form_id,
            since
        )
    }

    /// Issue a single long-poll request.
    pub async fn poll_once(&self, since: i64) -> Result<PollResult> {
        let url = self.longpoll_url(since);
        debug!("GET {}", url);

        let response = self.http_client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                anyhow::anyhow!(
                    "Request timed out after {}s",
                    self.options.request_timeout_secs
                )
            } else if e.is_connect() {
                anyhow::anyhow!("Cannot connect to server at {}", self.options.server_url)
            } else {
                anyhow::anyhow!("Failed to send request: {}", e)
            }
        })?;

        match response.status() {
            StatusCode::NO_CONTENT => return Ok(PollResult::Closed),
            StatusCode::NOT_FOUND => {
                anyhow::bail!("Form not found: {}", self.options.form_id)
            }
            status if !status.is_success() => {
                let body = response.text().await.unwrap_or_default();
                anyhow::bail!("Server error {}: {}", status, body);
            }
            _ => {}
        }

        let body: LongPollResponse = response
            .json()
            .await
            .context("Failed to parse long-poll response")?;
        Ok(PollResult::Update(body))
    }

    /// Poll until `max_updates` snapshots were printed or the server closes.
    ///
    /// Returns the number of snapshots received.
    pub async fn run(&self) -> Result<usize> {
        let mut since = self.options.since;
        let mut updates = 0;

        let spinner = self.options.show_progress.then(|| {
            let pb = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}")
            {
                pb.set_style(style);
            }
            pb.enable_steady_tick(Duration::from_millis(120));
            pb
        });

        loop {
            if let Some(pb) = &spinner {
                pb.set_message(format!("Waiting for responses newer than {}", since));
            }

            match self.poll_once(since).await? {
                PollResult::Update(LongPollResponse::Snapshot(snapshot)) => {
                    since = snapshot.last_response_ms;
                    updates += 1;

                    let text = render_snapshot(&snapshot);
                    match &spinner {
                        Some(pb) => pb.suspend(|| println!("{}", text)),
                        None => println!("{}", text),
                    }

                    if self.options.max_updates.is_some_and(|max| updates >= max) {
                        break;
                    }
                }
                PollResult::Update(LongPollResponse::Timeout { last_response_ms, .. }) => {
                    debug!("No new responses, re-polling");
                    since = last_response_ms;
                }
                PollResult::Closed => {
                    info!("Server closed the long-poll, stopping");
                    break;
                }
            }
        }

        if let Some(pb) = spinner {
            pb.finish_and_clear();
        }

        Ok(updates)
    }
}

/// Plain-text breakdown of a snapshot for terminal output.
pub fn render_snapshot(snapshot: &DistributionSnapshot) -> String {
    let mut out = format!(
        "📊 {} response(s) as of {}\n",
        snapshot.response_count, snapshot.last_response_ms
    );

    for field in &snapshot.per_field {
        out.push_str(&format!("\n  {} ({})\n", field.label, field.summary));
        for bar in &field.bars {
            out.push_str(&format!("    {:<20} {}\n", bar.label, bar.value));
        }
        if let Some(avg) = field.average {
            out.push_str(&format!("    average: {:.2}\n", avg));
        }
    }

    out
}
