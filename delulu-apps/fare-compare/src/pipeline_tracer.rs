//!  Delulu Fare Compare
//!
//!  Copyright (C) 2026  Mamy Ratsimbazafy
//!
//!  This program is free software: you can redistribute it and/or modify
//!  it under the terms of the GNU Affero General Public License as published by
//!  the Free Software Foundation, either version 3 of the License, or
//!  (at your option) any later version.
//!
//!  This program is distributed in the hope that it will be useful,
//!  but WITHOUT ANY WARRANTY; without even the implied warranty of
//!  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
//!  GNU Affero General Public License for more details.
//!
//!  You should have received a copy of the GNU Affero General Public License
//!  along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! # Pipeline Tracer
//!
//! Append-only stage events for one request. Each event is also emitted as a
//! `tracing` record. One tracer per request, never shared.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Start,
    End,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEvent {
    pub request_id: String,
    pub stage: String,
    pub status: StageStatus,
    pub ts: DateTime<Local>,
    pub latency_ms: f64,
    pub offers_count: Option<usize>,
    pub message: String,
    pub error: Option<String>,
}

/// An open stage, closed by [`PipelineTracer::finish`] or [`PipelineTracer::fail`]
#[must_use]
#[derive(Debug)]
pub struct StageSpan {
    stage: String,
    message: String,
    started: Instant,
}

impl StageSpan {
    fn elapsed_ms(&self) -> f64 {
        (self.started.elapsed().as_secs_f64() * 100_000.0).round() / 100.0
    }
}

#[derive(Debug, Clone)]
pub struct PipelineTracer {
    request_id: String,
    events: Vec<TraceEvent>,
}

impl PipelineTracer {
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            events: Vec::new(),
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    fn push(
        &mut self,
        span: &StageSpan,
        status: StageStatus,
        latency_ms: f64,
        offers_count: Option<usize>,
        error: Option<String>,
    ) {
        self.events.push(TraceEvent {
            request_id: self.request_id.clone(),
            stage: span.stage.clone(),
            status,
            ts: Local::now(),
            latency_ms,
            offers_count,
            message: span.message.clone(),
            error,
        });
    }

    pub fn begin(&mut self, stage: &str, message: impl Into<String>) -> StageSpan {
        let span = StageSpan {
            stage: stage.to_string(),
            message: message.into(),
            started: Instant::now(),
        };
        tracing::info!("[{}] {} started {}", self.request_id, stage, span.message);
        self.push(&span, StageStatus::Start, 0.0, None, None);
        span
    }

    pub fn finish(&mut self, span: StageSpan, offers_count: Option<usize>) {
        let latency = span.elapsed_ms();
        tracing::info!(
            "[{}] {} done in {:.2} ms, offers: {:?}",
            self.request_id,
            span.stage,
            latency,
            offers_count
        );
        self.push(&span, StageStatus::End, latency, offers_count, None);
    }

    pub fn fail(&mut self, span: StageSpan, error: &dyn fmt::Display) {
        let latency = span.elapsed_ms();
        let error = error.to_string();
        tracing::warn!("[{}] {} failed: {}", self.request_id, span.stage, error);
        self.push(&span, StageStatus::Error, latency, None, Some(error));
    }

    /// NDJSON for `.jsonl` paths, one pretty JSON array otherwise
    pub fn render(&self, path: &Path) -> Result<String> {
        let ndjson = path.extension().is_some_and(|ext| ext == "jsonl");
        if ndjson {
            let mut out = String::new();
            for event in &self.events {
                out.push_str(&serde_json::to_string(event)?);
                out.push('\n');
            }
            Ok(out)
        } else {
            Ok(serde_json::to_string_pretty(&self.events)?)
        }
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        let body = self.render(path)?;
        tokio::fs::write(path, body)
            .await
            .with_context(|| format!("Failed to write trace to {}", path.display()))?;
        tracing::debug!("[{}] trace written to {}", self.request_id, path.display());
        Ok(())
    }
}
