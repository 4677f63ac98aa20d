use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

use crate::{
    api::dto::{
        CurrentClimateDto, HistoryEntryDto, HistoryResponse, InfraredDto, ServoActivatedDto,
        ServoLogEntryDto, ServoStateDto,
    },
    config::DashboardConfig,
};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("HTTP error {status}: {message}")]
    Http { status: StatusCode, message: String },
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Typed access to the query and dispenser endpoints of the monitor API.
#[derive(Clone)]
pub struct DashboardClient {
    base_url: String,
    http: Client,
}

impl DashboardClient {
    pub fn new(config: &DashboardConfig) -> Result<Self, ClientError> {
        let http = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self {
            base_url: config.api_url.clone(),
            http,
        })
    }

    /// Latest climate reading, `None` before the first report.
    pub async fn current(&self) -> Result<Option<CurrentClimateDto>, ClientError> {
        self.get("/api/get-dht").await
    }

    /// Recent climate readings, oldest first.
    pub async fn history(&self) -> Result<Vec<HistoryEntryDto>, ClientError> {
        let resp: HistoryResponse = self.get("/api/get-dht-history").await?;
        Ok(resp.data)
    }

    pub async fn presence(&self) -> Result<Option<InfraredDto>, ClientError> {
        self.get("/api/get-infrared").await
    }

    pub async fn dispenser(&self) -> Result<ServoStateDto, ClientError> {
        self.get("/api/servo").await
    }

    pub async fn servo_log(&self) -> Result<Vec<ServoLogEntryDto>, ClientError> {
        self.get("/api/get-servo-log").await
    }

    /// Record a dispenser activation.
    pub async fn dispense(&self) -> Result<ServoActivatedDto, ClientError> {
        let url = format!("{}/api/servo", self.base_url);
        debug!(url = %url, "POST");
        let response = self.http.post(&url).send().await?;
        decode(response).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "GET");
        let response = self.http.get(&url).send().await?;
        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let status = response.status();
    if !status.is_success() {
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "unknown error".to_owned());
        return Err(ClientError::Http { status, message });
    }

    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}
