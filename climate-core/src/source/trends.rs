use async_trait::async_trait;
use reqwest::Client;

use crate::{
    dataset::{parse_co2_weekly, parse_temperature_annual},
    error::FetchError,
    model::TimeSeries,
};

use super::{DataSource, SourceId, get_text};

pub const DEFAULT_RELAY_URL: &str = "https://api.allorigins.win/raw";
pub const DEFAULT_CO2_URL: &str = "https://gml.noaa.gov/webdata/ccgg/trends/co2_weekly_mlo.csv";
pub const DEFAULT_TEMPERATURE_URL: &str =
    "https://data.giss.nasa.gov/gistemp/tabledata_v4/GLB.Ts+dSST.csv";

/// Fetches plain-text documents, optionally re-served through a relay that
/// takes the target as its `url` query parameter.
#[derive(Debug, Clone)]
pub struct CsvFetcher {
    relay: Option<String>,
    http: Client,
}

impl CsvFetcher {
    pub fn new(relay: Option<String>, http: Client) -> Self {
        Self {
            relay: relay.filter(|r| !r.trim().is_empty()),
            http,
        }
    }

    pub async fn fetch_text(&self, target: &str) -> Result<String, FetchError> {
        match &self.relay {
            Some(relay) => get_text(&self.http, relay, &[("url", target)]).await,
            None => get_text(&self.http, target, &[] as &[(&str, &str)]).await,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Co2TrendSource {
    fetcher: CsvFetcher,
    url: String,
}

impl Co2TrendSource {
    pub fn new(fetcher: CsvFetcher, url: impl Into<String>) -> Self {
        Self {
            fetcher,
            url: url.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TemperatureTrendSource {
    fetcher: CsvFetcher,
    url: String,
}

impl TemperatureTrendSource {
    pub fn new(fetcher: CsvFetcher, url: impl Into<String>) -> Self {
        Self {
            fetcher,
            url: url.into(),
        }
    }
}

#[async_trait]
impl DataSource for Co2TrendSource {
    type Input = ();
    type Output = TimeSeries;

    fn id(&self) -> SourceId {
        SourceId::Co2Trend
    }

    async fn fetch(&self, _: &()) -> Result<TimeSeries, FetchError> {
        let text = self.fetcher.fetch_text(&self.url).await?;
        non_empty(parse_co2_weekly(&text))
    }
}

#[async_trait]
impl DataSource for TemperatureTrendSource {
    type Input = ();
    type Output = TimeSeries;

    fn id(&self) -> SourceId {
        SourceId::TemperatureTrend
    }

    async fn fetch(&self, _: &()) -> Result<TimeSeries, FetchError> {
        let text = self.fetcher.fetch_text(&self.url).await?;
        non_empty(parse_temperature_annual(&text))
    }
}

fn non_empty(series: TimeSeries) -> Result<TimeSeries, FetchError> {
    if series.is_empty() { Err(FetchError::Empty) } else { Ok(series) }
}
