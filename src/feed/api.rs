use crate::error::{FeedError, Result};
use crate::models::message::{decode_devices, decode_positions};
use crate::models::{Device, Sample};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// The upstream tracking platform's REST surface.
#[async_trait]
pub trait PositionApi: Send + Sync {
    async fn get_devices(&self) -> Result<Vec<Device>>;

    /// Latest position per device, optionally restricted to `device_ids`.
    async fn get_positions(&self, device_ids: Option<&[String]>) -> Result<Vec<Sample>>;

    async fn get_positions_history(
        &self,
        device_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Sample>>;
}

#[derive(Debug, Clone)]
pub struct HttpPositionApi {
    client: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
}

impl HttpPositionApi {
    pub fn new(base_url: &str, username: &str, password: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        debug!(path, "GET");
        let response = self
            .client
            .get(self.url(path))
            .basic_auth(&self.username, Some(&self.password))
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FeedError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl PositionApi for HttpPositionApi {
    async fn get_devices(&self) -> Result<Vec<Device>> {
        let raw: Vec<Value> = self.get_json("/api/devices", &[]).await?;
        Ok(decode_devices(raw))
    }

    async fn get_positions(&self, device_ids: Option<&[String]>) -> Result<Vec<Sample>> {
        let query: Vec<(&str, String)> = device_ids
            .unwrap_or_default()
            .iter()
            .map(|id| ("deviceId", id.clone()))
            .collect();
        let raw: Vec<Value> = self.get_json("/api/positions", &query).await?;
        Ok(decode_positions(raw))
    }

    async fn get_positions_history(
        &self,
        device_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Sample>> {
        let query = [
            ("deviceId", device_id.to_string()),
            ("from", from.to_rfc3339_opts(SecondsFormat::Secs, true)),
            ("to", to.to_rfc3339_opts(SecondsFormat::Secs, true)),
        ];
        let raw: Vec<Value> = self.get_json("/api/positions", &query).await?;
        Ok(decode_positions(raw))
    }
}
