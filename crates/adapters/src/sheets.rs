use std::time::Duration;

use async_trait::async_trait;
use fmv_core::config::ViewerConfig;
use fmv_core::fetch_runner::{SheetSource, SourceError};
use fmv_core::query_planner::FetchDescriptor;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum SheetsAdapterError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

#[derive(Debug, Clone)]
pub struct GvizHttpSource {
    client: reqwest::Client,
    endpoint_base: String,
    dataset_id: String,
}

impl GvizHttpSource {
    pub fn new(
        endpoint_base: impl Into<String>,
        dataset_id: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, SheetsAdapterError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            endpoint_base: endpoint_base.into(),
            dataset_id: dataset_id.into(),
        })
    }

    pub fn from_config(config: &ViewerConfig) -> Result<Self, SheetsAdapterError> {
        Self::new(
            config.endpoint_base.clone(),
            config.dataset_id.clone(),
            config.request_timeout_secs.map(Duration::from_secs),
        )
    }

    #[must_use]
    pub fn dataset_id(&self) -> &str {
        &self.dataset_id
    }

    #[must_use]
    pub fn query_url(&self, descriptor: &FetchDescriptor) -> String {
        query_url(&self.endpoint_base, &self.dataset_id, descriptor)
    }
}

#[async_trait]
impl SheetSource for GvizHttpSource {
    async fn fetch_page(&self, descriptor: &FetchDescriptor) -> Result<String, SourceError> {
        let url = self.query_url(descriptor);
        debug!(%url, "requesting sheet window");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(to_source_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(to_source_error)?;
        debug!(bytes = body.len(), "received sheet window");
        Ok(body)
    }
}

fn query_url(endpoint_base: &str, dataset_id: &str, descriptor: &FetchDescriptor) -> String {
    format!(
        "{}/{}/gviz/tq?tqx=out:json&tq={}",
        endpoint_base.trim_end_matches('/'),
        urlencoding::encode(dataset_id),
        urlencoding::encode(&descriptor.to_query())
    )
}

fn to_source_error(error: reqwest::Error) -> SourceError {
    SourceError::transport(error.to_string())
}
