use std::time::{Duration, Instant};

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

use crate::decoder::{decode_response, DecodeError};
use crate::normalizer::normalize_table;
use crate::query_planner::FetchDescriptor;
use crate::row::Row;
use crate::view_state::PageState;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("endpoint returned HTTP {status}")]
    Status { status: u16 },
}

impl SourceError {
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }
}

/// Why a fetch did not produce rows. Both kinds look the same to the user;
/// the split is kept for logs and diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchFailure {
    #[error("network error: {0}")]
    Network(#[source] SourceError),
    #[error("decode error: {0}")]
    Decode(#[source] DecodeError),
}

#[async_trait]
pub trait SheetSource {
    /// Returns the raw, still enveloped response body for one window.
    async fn fetch_page(&self, descriptor: &FetchDescriptor) -> Result<String, SourceError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchRequest {
    pub sequence: u64,
    pub page: PageState,
    pub descriptor: FetchDescriptor,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchCompletion {
    pub request: FetchRequest,
    pub result: Result<Vec<Row>, FetchFailure>,
    pub elapsed: Duration,
}

#[derive(Debug)]
pub struct FetchRunner<S: SheetSource> {
    source: S,
}

impl<S: SheetSource> FetchRunner<S> {
    #[must_use]
    pub fn new(source: S) -> Self {
        Self { source }
    }

    #[must_use]
    pub fn source(&self) -> &S {
        &self.source
    }

    pub async fn execute(&self, request: FetchRequest) -> FetchCompletion {
        let started_at = Instant::now();
        let result = match self.source.fetch_page(&request.descriptor).await {
            Ok(body) => decode_response(&body)
                .map(|table| normalize_table(&table))
                .map_err(FetchFailure::Decode),
            Err(error) => Err(FetchFailure::Network(error)),
        };
        let elapsed = started_at.elapsed();

        match &result {
            Ok(rows) => debug!(
                sequence = request.sequence,
                offset = request.descriptor.offset,
                rows = rows.len(),
                elapsed_ms = elapsed.as_millis(),
                "fetch settled"
            ),
            Err(failure) => warn!(
                sequence = request.sequence,
                offset = request.descriptor.offset,
                error = %failure,
                "fetch failed"
            ),
        }

        FetchCompletion {
            request,
            result,
            elapsed,
        }
    }
}
