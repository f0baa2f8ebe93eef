//! HTTP adapter for a CollateX server
//!
//! The request runs on a worker thread so a cancelled call returns at once;
//! the worker drops the connection when it sees the call was abandoned.

use crate::started_at;
use collation_core::{
    AlignmentEngine, CancelFlag, EngineError, EngineInput, EngineRun, RunDetails,
};
use serde::Serialize;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::{Duration, Instant};
use tracing::{info, warn};

const ENGINE_NAME: &str = "collatex-http";
const MAX_DETAIL_CHARS: usize = 500;
const POLL_INTERVAL: Duration = Duration::from_millis(20);

pub struct CollatexHttp {
    base_url: String,
    client: reqwest::blocking::Client,
    timeout: Duration,
}

#[derive(Serialize)]
struct CollateRequest<'a> {
    #[serde(flatten)]
    input: &'a EngineInput,
    algorithm: &'static str,
    joined: bool,
}

pub(crate) fn truncate_detail(detail: &str) -> String {
    let detail = detail.trim();
    if detail.chars().count() > MAX_DETAIL_CHARS {
        let cut: String = detail.chars().take(MAX_DETAIL_CHARS).collect();
        format!("{}...", cut)
    } else {
        detail.to_string()
    }
}

impl CollatexHttp {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, EngineError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EngineError::Unavailable(format!("cannot build HTTP client: {}", e)))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn map_send_error(&self, e: reqwest::Error) -> EngineError {
        if e.is_timeout() {
            EngineError::Timeout(self.timeout)
        } else if e.is_connect() {
            EngineError::Unavailable(format!("cannot reach {}: {}", self.base_url, e))
        } else {
            EngineError::Failed {
                status: "request_error".to_string(),
                detail: e.to_string(),
            }
        }
    }
}

impl CollatexHttp {
    /// POST `body` to `url` and read the reply, giving up as soon as
    /// `cancel` is raised.
    fn send_cancellable(
        &self,
        url: &str,
        body: Vec<u8>,
        cancel: &CancelFlag,
    ) -> Result<(reqwest::StatusCode, String), EngineError> {
        let (tx, rx) = mpsc::channel();
        let client = self.client.clone();
        let worker_url = url.to_string();
        let worker_cancel = cancel.clone();
        std::thread::spawn(move || {
            let reply = client
                .post(&worker_url)
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .header(reqwest::header::ACCEPT, "application/json")
                .body(body)
                .send()
                .and_then(|resp| {
                    let status = resp.status();
                    if worker_cancel.is_cancelled() {
                        // Dropping the response closes the connection.
                        return Ok((status, String::new()));
                    }
                    resp.text().map(|text| (status, text))
                });
            let _ = tx.send(reply);
        });

        loop {
            match rx.recv_timeout(POLL_INTERVAL) {
                Ok(reply) => {
                    return reply.map_err(|e| {
                        let err = self.map_send_error(e);
                        warn!(engine = ENGINE_NAME, url = %url, error = %err, "Alignment request failed");
                        err
                    });
                }
                Err(RecvTimeoutError::Timeout) if cancel.is_cancelled() => {
                    info!(engine = ENGINE_NAME, url = %url, "Alignment request cancelled");
                    return Err(EngineError::Cancelled);
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(EngineError::Failed {
                        status: "request_error".to_string(),
                        detail: "request worker stopped without a reply".to_string(),
                    });
                }
            }
        }
    }
}

impl AlignmentEngine for CollatexHttp {
    fn name(&self) -> &str {
        ENGINE_NAME
    }

    fn check_environment(&self) -> Result<(), EngineError> {
        // Any HTTP answer means the server is up.
        self.client
            .get(&self.base_url)
            .send()
            .map(|_| ())
            .map_err(|e| self.map_send_error(e))
    }

    fn align(&self, input: &EngineInput, cancel: &CancelFlag) -> Result<EngineRun, EngineError> {
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        let url = format!("{}/collate", self.base_url);
        let started = started_at();
        let start = Instant::now();
        let req = serde_json::to_vec(&CollateRequest {
            input,
            algorithm: "dekker",
            joined: false,
        })
        .map_err(std::io::Error::other)?;

        let (status, body) = self.send_cancellable(&url, req, cancel)?;
        if !status.is_success() {
            warn!(engine = ENGINE_NAME, status = %status, "Alignment engine returned an error status");
            return Err(EngineError::Failed {
                status: format!("HTTP {}", status.as_u16()),
                detail: truncate_detail(&body),
            });
        }

        let output: serde_json::Value = serde_json::from_str(&body)
            .map_err(|e| EngineError::InvalidResponse(format!("{}: {}", e, truncate_detail(&body))))?;

        let duration_ms = start.elapsed().as_millis() as u64;
        info!(
            engine = ENGINE_NAME,
            witnesses = input.witness_count(),
            duration_ms,
            "Alignment finished"
        );

        Ok(EngineRun {
            output,
            details: RunDetails {
                engine: ENGINE_NAME.to_string(),
                started_at: started,
                duration_ms,
            },
        })
    }
}
