use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Offset, Utc};
use reqwest::Client;
use serde::Deserialize;

use crate::{
    error::FetchError,
    lookup::{AqiLabel, air_quality_label, wind_direction},
    model::{
        AirQualitySample, Coordinate, CurrentConditions, Place, TimeSeries, TimeSeriesPoint,
        WeatherSnapshot,
    },
    sky,
};

use super::{DataSource, SourceId, get_text};

pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org";

/// Above this temperature (°C) a heat alert is raised.
pub const HEAT_ALERT_C: f64 = 40.0;

/// Above this 1-hour rainfall (mm) a heavy-rain alert is raised.
pub const HEAVY_RAIN_MM: f64 = 20.0;

/// AQI index from which an air-quality alert is raised.
pub const POOR_AQI: i64 = 4;

/// The forecast endpoint returns 3-hourly entries; every 8th is one day apart.
pub const FORECAST_STRIDE: usize = 8;

/// Shared OpenWeather client; the four location-bound sources wrap it.
#[derive(Debug, Clone)]
pub struct OpenWeatherApi {
    api_key: String,
    base_url: String,
    http: Client,
}

impl OpenWeatherApi {
    pub fn new(api_key: String, base_url: impl Into<String>, http: Client) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            api_key,
            base_url,
            http,
        }
    }

    async fn get(
        &self,
        path: &str,
        at: &Coordinate,
        extra: &[(&str, &str)],
    ) -> Result<String, FetchError> {
        let url = format!("{}/{}", self.base_url, path);
        let lat = at.latitude.to_string();
        let lon = at.longitude.to_string();

        let mut query = vec![("lat", lat.as_str()), ("lon", lon.as_str())];
        query.extend_from_slice(extra);
        query.push(("appid", self.api_key.as_str()));

        get_text(&self.http, &url, &query).await
    }
}

#[derive(Debug, Clone)]
pub struct ReverseGeocodeSource(pub OpenWeatherApi);

#[derive(Debug, Clone)]
pub struct CurrentWeatherSource(pub OpenWeatherApi);

#[derive(Debug, Clone)]
pub struct AirQualitySource(pub OpenWeatherApi);

#[derive(Debug, Clone)]
pub struct ForecastSource(pub OpenWeatherApi);

#[async_trait]
impl DataSource for ReverseGeocodeSource {
    type Input = Coordinate;
    type Output = Place;

    fn id(&self) -> SourceId {
        SourceId::ReverseGeocode
    }

    async fn fetch(&self, at: &Coordinate) -> Result<Place, FetchError> {
        let body = self.0.get("geo/1.0/reverse", at, &[("limit", "1")]).await?;
        parse_reverse_geocode(&body)
    }
}

#[async_trait]
impl DataSource for CurrentWeatherSource {
    type Input = Coordinate;
    type Output = CurrentConditions;

    fn id(&self) -> SourceId {
        SourceId::CurrentWeather
    }

    async fn fetch(&self, at: &Coordinate) -> Result<CurrentConditions, FetchError> {
        let body = self.0.get("data/2.5/weather", at, &[("units", "metric")]).await?;
        parse_current_weather(&body)
    }
}

#[async_trait]
impl DataSource for AirQualitySource {
    type Input = Coordinate;
    type Output = AirQualitySample;

    fn id(&self) -> SourceId {
        SourceId::AirQuality
    }

    async fn fetch(&self, at: &Coordinate) -> Result<AirQualitySample, FetchError> {
        let body = self.0.get("data/2.5/air_pollution", at, &[]).await?;
        parse_air_quality(&body)
    }
}

#[async_trait]
impl DataSource for ForecastSource {
    type Input = Coordinate;
    type Output = TimeSeries;

    fn id(&self) -> SourceId {
        SourceId::Forecast
    }

    async fn fetch(&self, at: &Coordinate) -> Result<TimeSeries, FetchError> {
        let body = self.0.get("data/2.5/forecast", at, &[("units", "metric")]).await?;
        parse_forecast(&body)
    }
}

#[derive(Debug, Deserialize)]
struct OwPlace {
    name: Option<String>,
    country: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    temp_min: f64,
    temp_max: f64,
    humidity: u8,
}

#[derive(Debug, Deserialize)]
struct OwWind {
    speed: f64,
    deg: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct OwRain {
    #[serde(rename = "1h")]
    one_hour: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    main: OwMain,
    wind: OwWind,
    #[serde(default)]
    weather: Vec<OwWeather>,
    rain: Option<OwRain>,
}

#[derive(Debug, Deserialize)]
struct OwAqiMain {
    aqi: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct OwAqiEntry {
    main: Option<OwAqiMain>,
}

#[derive(Debug, Deserialize)]
struct OwAirResponse {
    #[serde(default)]
    list: Vec<OwAqiEntry>,
}

#[derive(Debug, Deserialize)]
struct OwForecastMain {
    temp: f64,
}

#[derive(Debug, Deserialize)]
struct OwForecastEntry {
    dt: i64,
    main: OwForecastMain,
}

#[derive(Debug, Deserialize)]
struct OwCity {
    /// Shift in seconds from UTC.
    timezone: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct OwForecastResponse {
    list: Vec<OwForecastEntry>,
    city: Option<OwCity>,
}

/// First match of a reverse-geocode array. An empty array is still a place,
/// just an unnamed one.
pub fn parse_reverse_geocode(body: &str) -> Result<Place, FetchError> {
    let places: Vec<OwPlace> = serde_json::from_str(body)?;
    let first = places.into_iter().next();

    let name = first
        .as_ref()
        .and_then(|p| p.name.clone())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "Unknown".to_string());
    let country = first.and_then(|p| p.country).filter(|c| !c.is_empty());

    Ok(Place { name, country })
}

pub fn parse_current_weather(body: &str) -> Result<CurrentConditions, FetchError> {
    let parsed: OwCurrentResponse = serde_json::from_str(body)?;

    let condition_text = parsed
        .weather
        .into_iter()
        .next()
        .map(|w| w.description)
        .unwrap_or_default();
    let rain_1h_mm = parsed.rain.and_then(|r| r.one_hour);

    let snapshot = WeatherSnapshot {
        temperature_c: parsed.main.temp,
        min_c: parsed.main.temp_min,
        max_c: parsed.main.temp_max,
        humidity_pct: parsed.main.humidity,
        wind_speed_kmh: parsed.wind.speed * 3.6,
        wind_direction: wind_direction(parsed.wind.deg),
        condition_text,
    };

    let mut alerts = Vec::new();
    if snapshot.temperature_c > HEAT_ALERT_C {
        alerts.push("High temperature alert — take precautions.".to_string());
    }
    if rain_1h_mm.is_some_and(|mm| mm > HEAVY_RAIN_MM) {
        alerts.push("Heavy rainfall in the past hour.".to_string());
    }

    Ok(CurrentConditions {
        sky: sky::classify(Some(&snapshot.condition_text)),
        snapshot,
        rain_1h_mm,
        alerts,
    })
}

/// A response without an index is a valid "unavailable" sample, not an error.
pub fn parse_air_quality(body: &str) -> Result<AirQualitySample, FetchError> {
    let parsed: OwAirResponse = serde_json::from_str(body)?;

    let index = parsed
        .list
        .into_iter()
        .next()
        .and_then(|e| e.main)
        .and_then(|m| m.aqi);
    let label = index.map(air_quality_label).unwrap_or(AqiLabel::Unknown);

    Ok(AirQualitySample { index, label })
}

/// Reduce the 3-hourly forecast to one point per day (entries 0, 8, 16, …),
/// labelled like "Mon, Jan 1" in the forecast location's local time.
pub fn parse_forecast(body: &str) -> Result<TimeSeries, FetchError> {
    let parsed: OwForecastResponse = serde_json::from_str(body)?;

    let offset = parsed
        .city
        .and_then(|c| c.timezone)
        .and_then(FixedOffset::east_opt)
        .unwrap_or_else(|| Utc.fix());

    let points: Vec<TimeSeriesPoint> = parsed
        .list
        .iter()
        .step_by(FORECAST_STRIDE)
        .map(|entry| {
            let when = DateTime::from_timestamp(entry.dt, 0).ok_or_else(|| {
                FetchError::Malformed(format!("forecast timestamp {} out of range", entry.dt))
            })?;
            let label = when.with_timezone(&offset).format("%a, %b %-d").to_string();
            let temp = (entry.main.temp * 10.0).round() / 10.0;
            Ok(TimeSeriesPoint::new(label, temp))
        })
        .collect::<Result<_, FetchError>>()?;

    if points.is_empty() {
        return Err(FetchError::Empty);
    }

    Ok(TimeSeries::new(points))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::WindDirection;
    use crate::sky::SkyCondition;
    use pretty_assertions::assert_eq;

    #[test]
    fn reverse_geocode_first_match() {
        let body = r#"[{"name":"Lisbon","lat":38.7,"lon":-9.1,"country":"PT"},{"name":"Other"}]"#;
        let place = parse_reverse_geocode(body).unwrap();
        assert_eq!(place.to_string(), "Lisbon, PT");
    }

    #[test]
    fn reverse_geocode_empty_array_is_unknown() {
        let place = parse_reverse_geocode("[]").unwrap();
        assert_eq!(
            place,
            Place {
                name: "Unknown".into(),
                country: None
            }
        );
    }

    #[test]
    fn reverse_geocode_error_object_is_malformed() {
        let err = parse_reverse_geocode(r#"{"cod":401,"message":"Invalid API key"}"#).unwrap_err();
        assert!(matches!(err, FetchError::Malformed(_)));
    }

    const CURRENT: &str = r#"{
        "weather": [{"id": 500, "main": "Rain", "description": "light rain"}],
        "main": {
            "temp": 17.26, "feels_like": 16.9,
            "temp_min": 15.1, "temp_max": 18.8, "humidity": 81
        },
        "wind": {"speed": 4.1, "deg": 230},
        "rain": {"1h": 0.45},
        "name": "Porto"
    }"#;

    #[test]
    fn current_weather_snapshot() {
        let current = parse_current_weather(CURRENT).unwrap();
        let w = &current.snapshot;

        assert_eq!(w.temperature_c, 17.26);
        assert_eq!(w.min_c, 15.1);
        assert_eq!(w.max_c, 18.8);
        assert_eq!(w.humidity_pct, 81);
        assert!((w.wind_speed_kmh - 14.76).abs() < 1e-9);
        assert_eq!(w.wind_direction, WindDirection::SW);
        assert_eq!(w.condition_text, "light rain");
        assert_eq!(current.sky, Some(SkyCondition::Rainy));
        assert_eq!(current.rain_1h_mm, Some(0.45));
        assert!(current.alerts.is_empty());
    }

    #[test]
    fn current_weather_raises_heat_and_rain_alerts() {
        let body = r#"{
            "weather": [{"description": "heavy intensity rain"}],
            "main": {"temp": 41.5, "temp_min": 39.0, "temp_max": 43.0, "humidity": 30},
            "wind": {"speed": 1.0},
            "rain": {"1h": 22.5}
        }"#;
        let current = parse_current_weather(body).unwrap();
        assert_eq!(
            current.alerts,
            vec!["High temperature alert — take precautions.", "Heavy rainfall in the past hour."]
        );
        assert_eq!(current.snapshot.wind_direction, WindDirection::Unknown);
    }

    #[test]
    fn current_weather_thresholds_are_strict() {
        let body = r#"{
            "weather": [],
            "main": {"temp": 40.0, "temp_min": 40.0, "temp_max": 40.0, "humidity": 10},
            "wind": {"speed": 0.0, "deg": 0},
            "rain": {"1h": 20.0}
        }"#;
        let current = parse_current_weather(body).unwrap();
        assert!(current.alerts.is_empty());
        assert_eq!(current.sky, None);
    }

    #[test]
    fn current_weather_missing_main_is_malformed() {
        let err = parse_current_weather(r#"{"wind": {"speed": 1.0}}"#).unwrap_err();
        assert!(matches!(err, FetchError::Malformed(_)));
    }

    #[test]
    fn air_quality_index_and_label() {
        let body = r#"{"coord":{"lon":50,"lat":50},"list":[{"main":{"aqi":4},"components":{}}]}"#;
        let sample = parse_air_quality(body).unwrap();
        assert_eq!(
            sample,
            AirQualitySample {
                index: Some(4),
                label: AqiLabel::Poor
            }
        );
    }

    #[test]
    fn air_quality_without_index_is_unavailable() {
        for body in [r#"{"list":[]}"#, r#"{}"#, r#"{"list":[{"components":{}}]}"#] {
            let sample = parse_air_quality(body).unwrap();
            assert_eq!(
                sample,
                AirQualitySample {
                    index: None,
                    label: AqiLabel::Unknown
                }
            );
        }
    }

    fn forecast_body(entries: usize, timezone: Option<i32>) -> String {
        // 2024-01-01T00:00:00Z, a Monday.
        let start = 1_704_067_200_i64;
        let list: Vec<String> = (0..entries)
            .map(|i| {
                format!(
                    r#"{{"dt":{},"main":{{"temp":{},"humidity":50}},"dt_txt":"-"}}"#,
                    start + i as i64 * 3 * 3600,
                    i as f64 + 0.04
                )
            })
            .collect();
        let city = match timezone {
            Some(tz) => format!(r#","city":{{"name":"X","country":"Y","timezone":{tz}}}"#),
            None => String::new(),
        };
        format!(r#"{{"cnt":{entries},"list":[{}]{city}}}"#, list.join(","))
    }

    #[test]
    fn forecast_stride_eight_over_forty_entries() {
        let series = parse_forecast(&forecast_body(40, Some(0))).unwrap();

        assert_eq!(series.len(), 5);
        assert_eq!(series.values(), vec![0.0, 8.0, 16.0, 24.0, 32.0]);
        assert_eq!(
            series.labels(),
            vec!["Mon, Jan 1", "Tue, Jan 2", "Wed, Jan 3", "Thu, Jan 4", "Fri, Jan 5"]
        );
    }

    #[test]
    fn forecast_labels_follow_city_timezone() {
        let series = parse_forecast(&forecast_body(9, Some(-3600))).unwrap();
        assert_eq!(series.labels(), vec!["Sun, Dec 31", "Mon, Jan 1"]);
    }

    #[test]
    fn forecast_without_city_uses_utc() {
        let series = parse_forecast(&forecast_body(1, None)).unwrap();
        assert_eq!(series.labels(), vec!["Mon, Jan 1"]);
    }

    #[test]
    fn forecast_empty_list_is_empty_result() {
        assert_eq!(parse_forecast(r#"{"list":[]}"#), Err(FetchError::Empty));
    }
}
