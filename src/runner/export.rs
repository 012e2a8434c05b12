use std::path::Path;

use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};

use crate::error::MetricsError;
use crate::registration::{OutcomeKind, RegistrationOutcome, SampleStatus};

/// One JSON line per sample.
#[derive(Debug, Serialize)]
pub struct SampleRecord<'outcome> {
    pub timestamp: String,
    pub label: &'outcome str,
    pub endpoint: Option<&'outcome str>,
    pub status: SampleStatus,
    pub kind: OutcomeKind,
    pub response_code: &'outcome str,
    pub message: &'outcome str,
    pub registration_id: Option<&'outcome str>,
    pub elapsed_ms: u64,
    /// Raw diagnostic payload, base64 encoded.
    pub payload: String,
}

impl<'outcome> SampleRecord<'outcome> {
    #[must_use]
    pub fn from_outcome(outcome: &'outcome RegistrationOutcome, finished_at: DateTime<Utc>) -> Self {
        Self {
            timestamp: finished_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            label: outcome.label(),
            endpoint: outcome.endpoint(),
            status: outcome.status(),
            kind: outcome.kind(),
            response_code: outcome.response_code(),
            message: outcome.message(),
            registration_id: outcome.registration_id(),
            elapsed_ms: outcome.elapsed_ms(),
            payload: B64.encode(outcome.payload()),
        }
    }
}

/// Buffered JSONL writer for [`SampleRecord`]s.
pub struct SampleWriter {
    out: BufWriter<File>,
}

impl SampleWriter {
    /// Creates (or truncates) the output file.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be created.
    pub async fn create(path: &Path) -> Result<Self, MetricsError> {
        let file = File::create(path)
            .await
            .map_err(|source| MetricsError::Io {
                context: "create sample output",
                source,
            })?;
        Ok(Self {
            out: BufWriter::new(file),
        })
    }

    /// # Errors
    ///
    /// Returns an error when the record cannot be serialized or written.
    pub async fn write(&mut self, record: &SampleRecord<'_>) -> Result<(), MetricsError> {
        let mut line =
            serde_json::to_vec(record).map_err(|source| MetricsError::Serialize { source })?;
        line.push(b'\n');
        self.out
            .write_all(&line)
            .await
            .map_err(|source| MetricsError::Io {
                context: "write sample output",
                source,
            })
    }

    /// Flushes buffered lines to disk.
    ///
    /// # Errors
    ///
    /// Returns an error when the flush fails.
    pub async fn finish(mut self) -> Result<(), MetricsError> {
        self.out.flush().await.map_err(|source| MetricsError::Io {
            context: "flush sample output",
            source,
        })
    }
}
