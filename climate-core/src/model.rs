use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoordinateError;
use crate::lookup::{AqiLabel, WindDirection};
use crate::sky::SkyCondition;

/// A validated position on the globe.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, CoordinateError> {
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(CoordinateError::Latitude(latitude));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(CoordinateError::Longitude(longitude));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Lat: {:.4}, Lon: {:.4}", self.latitude, self.longitude)
    }
}

/// Result of a reverse-geocode lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Place {
    pub name: String,
    pub country: Option<String>,
}

impl std::fmt::Display for Place {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.country {
            Some(country) => write!(f, "{}, {}", self.name, country),
            None => f.write_str(&self.name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub temperature_c: f64,
    pub min_c: f64,
    pub max_c: f64,
    pub humidity_pct: u8,
    pub wind_speed_kmh: f64,
    pub wind_direction: WindDirection,
    pub condition_text: String,
}

/// Current weather plus everything derived from it while parsing.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentConditions {
    pub snapshot: WeatherSnapshot,
    /// `None` when the description was absent or empty.
    pub sky: Option<SkyCondition>,
    pub rain_1h_mm: Option<f64>,
    /// Domain alerts raised by this observation (heat, heavy rain).
    pub alerts: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AirQualitySample {
    /// `None` when the provider answered without an index.
    pub index: Option<i64>,
    pub label: AqiLabel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    pub label: String,
    pub value: f64,
}

impl TimeSeriesPoint {
    pub fn new(label: impl Into<String>, value: f64) -> Self {
        Self {
            label: label.into(),
            value,
        }
    }
}

/// Ordered series; insertion order is chronological order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries(Vec<TimeSeriesPoint>);

impl TimeSeries {
    pub fn new(points: Vec<TimeSeriesPoint>) -> Self {
        Self(points)
    }

    pub fn points(&self) -> &[TimeSeriesPoint] {
        &self.0
    }

    pub fn labels(&self) -> Vec<String> {
        self.0.iter().map(|p| p.label.clone()).collect()
    }

    pub fn values(&self) -> Vec<f64> {
        self.0.iter().map(|p| p.value).collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<TimeSeriesPoint>> for TimeSeries {
    fn from(points: Vec<TimeSeriesPoint>) -> Self {
        Self(points)
    }
}

/// Summary of one completed refresh cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle: u64,
    pub located: bool,
    /// `(source name, reason)` for every fetch that did not succeed.
    pub failures: Vec<(String, String)>,
    pub completed_at: DateTime<Utc>,
}

impl CycleReport {
    pub fn is_clean(&self) -> bool {
        self.located && self.failures.is_empty()
    }
}
