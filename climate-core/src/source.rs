use std::{fmt::Debug, time::Duration};

use async_trait::async_trait;
use reqwest::Client;

use crate::error::FetchError;

pub mod openweather;
pub mod trends;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceId {
    ReverseGeocode,
    CurrentWeather,
    AirQuality,
    Forecast,
    Co2Trend,
    TemperatureTrend,
}

impl SourceId {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceId::ReverseGeocode => "reverse-geocode",
            SourceId::CurrentWeather => "current-weather",
            SourceId::AirQuality => "air-quality",
            SourceId::Forecast => "forecast",
            SourceId::Co2Trend => "co2-trend",
            SourceId::TemperatureTrend => "temperature-trend",
        }
    }

    pub const fn all() -> &'static [SourceId] {
        &[
            SourceId::ReverseGeocode,
            SourceId::CurrentWeather,
            SourceId::AirQuality,
            SourceId::Forecast,
            SourceId::Co2Trend,
            SourceId::TemperatureTrend,
        ]
    }
}

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One remote dataset: a single async fetch yielding a typed value or a
/// [`FetchError`]. Implementations must turn every internal failure into the
/// error value.
#[async_trait]
pub trait DataSource: Send + Sync + Debug {
    /// `Coordinate` for location-bound sources, `()` otherwise.
    type Input: Send + Sync;
    type Output: Send;

    fn id(&self) -> SourceId;

    async fn fetch(&self, input: &Self::Input) -> Result<Self::Output, FetchError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total tries, including the first. Zero is treated as one.
    pub attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub const fn once() -> Self {
        Self {
            attempts: 1,
            backoff: Duration::ZERO,
        }
    }

    pub fn with_retries(retries: u32) -> Self {
        Self {
            attempts: retries.saturating_add(1),
            backoff: Duration::from_millis(500),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::once()
    }
}

/// Fetch from `source`, retrying transient failures per `policy`.
///
/// Always settles: the returned `Result` is the final outcome and has already
/// been logged.
pub async fn fetch_settled<S>(
    source: &S,
    input: &S::Input,
    policy: RetryPolicy,
) -> Result<S::Output, FetchError>
where
    S: DataSource + ?Sized,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;

    loop {
        tracing::debug!(source = %source.id(), attempt, "fetching");

        match source.fetch(input).await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < attempts => {
                tracing::warn!(
                    source = %source.id(),
                    attempt,
                    error = %err,
                    "transient failure, retrying"
                );
                tokio::time::sleep(policy.backoff).await;
                attempt += 1;
            }
            Err(err) => {
                tracing::warn!(source = %source.id(), attempt, error = %err, "fetch failed");
                return Err(err);
            }
        }
    }
}

/// Shared HTTP client builder; every adapter uses the same timeout.
pub fn http_client(timeout: Duration) -> anyhow::Result<Client> {
    use anyhow::Context;

    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("climate-dashboard/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")
}

/// GET `url` and return the body, failing on transport errors and non-2xx.
pub(crate) async fn get_text<Q>(http: &Client, url: &str, query: &Q) -> Result<String, FetchError>
where
    Q: serde::Serialize + ?Sized,
{
    let res = http.get(url).query(query).send().await?;

    let status = res.status();
    let body = res.text().await?;

    if !status.is_success() {
        return Err(FetchError::Status {
            status: status.as_u16(),
            body: truncate_body(&body),
        });
    }

    Ok(body)
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() > MAX {
        let mut end = MAX;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &body[..end])
    } else {
        body.to_string()
    }
}
