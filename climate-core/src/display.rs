//! Presentation contract.
//!
//! A [`DisplaySink`] is whatever actually draws: a terminal, a web page, a
//! test recorder. [`Presenter`] sits in front of it and owns the state that
//! must stay consistent across refreshes: live chart handles, the current sky
//! category and the alert log.

use std::collections::HashMap;

use chrono::{DateTime, Local, Utc};

use crate::alert::{Alert, AlertLog};
use crate::model::{AirQualitySample, Coordinate, CurrentConditions, Place, TimeSeries};
use crate::sky::SkyCondition;

/// Neutral placeholder for a field with no data.
pub const PLACEHOLDER: &str = "--";

/// Discrete text slots on the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    LocationName,
    LocationCoords,
    Temperature,
    TemperatureRange,
    Humidity,
    Wind,
    WindDirection,
    AqiValue,
    AqiStatus,
    LastUpdated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChartId {
    Forecast,
    Co2,
    TemperatureAnomaly,
}

impl ChartId {
    pub const fn all() -> &'static [ChartId] {
        &[ChartId::Forecast, ChartId::Co2, ChartId::TemperatureAnomaly]
    }

    pub fn title(&self) -> &'static str {
        match self {
            ChartId::Forecast => "Daily Temp (°C)",
            ChartId::Co2 => "CO₂ (ppm)",
            ChartId::TemperatureAnomaly => "Global Temp Anomaly (°C)",
        }
    }

    pub fn kind(&self) -> ChartKind {
        match self {
            ChartId::Forecast | ChartId::Co2 => ChartKind::Line,
            ChartId::TemperatureAnomaly => ChartKind::Bar,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    Line,
    /// Bars; positive and negative values are drawn distinctly.
    Bar,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartData {
    pub id: ChartId,
    pub title: &'static str,
    pub kind: ChartKind,
    pub labels: Vec<String>,
    pub values: Vec<f64>,
}

impl ChartData {
    pub fn from_series(id: ChartId, series: &TimeSeries) -> Self {
        Self {
            id,
            title: id.title(),
            kind: id.kind(),
            labels: series.labels(),
            values: series.values(),
        }
    }
}

pub trait DisplaySink: Send {
    /// Handle to a drawn chart; released through [`DisplaySink::dispose_chart`].
    type Chart: Send;

    fn set_text(&mut self, field: Field, text: &str);

    fn set_sky(&mut self, sky: SkyCondition);

    fn create_chart(&mut self, data: &ChartData) -> Self::Chart;

    fn dispose_chart(&mut self, chart: Self::Chart);

    /// Show a message where a chart would be.
    fn chart_placeholder(&mut self, id: ChartId, message: &str);

    fn set_alerts(&mut self, alerts: &[Alert]);

    fn set_refresh_enabled(&mut self, enabled: bool);
}

pub struct Presenter<S: DisplaySink> {
    sink: S,
    charts: HashMap<ChartId, S::Chart>,
    sky: SkyCondition,
    alerts: AlertLog,
}

impl<S: DisplaySink> Presenter<S> {
    pub fn new(mut sink: S) -> Self {
        let sky = SkyCondition::default();
        sink.set_sky(sky);
        Self {
            sink,
            charts: HashMap::new(),
            sky,
            alerts: AlertLog::new(),
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sky(&self) -> SkyCondition {
        self.sky
    }

    pub fn alerts(&self) -> &AlertLog {
        &self.alerts
    }

    pub fn has_chart(&self, id: ChartId) -> bool {
        self.charts.contains_key(&id)
    }

    pub fn alert(&mut self, message: impl Into<String>) {
        self.alerts.push(message);
        self.sink.set_alerts(self.alerts.as_slice());
    }

    pub fn clear_alerts(&mut self) {
        self.alerts.clear();
        self.sink.set_alerts(&[]);
    }

    pub fn set_refresh_enabled(&mut self, enabled: bool) {
        self.sink.set_refresh_enabled(enabled);
    }

    pub fn show_location(&mut self, text: &str) {
        self.sink.set_text(Field::LocationName, text);
    }

    pub fn show_place(&mut self, place: &Place) {
        self.show_location(&place.to_string());
    }

    pub fn show_coords(&mut self, coord: &Coordinate) {
        self.sink.set_text(Field::LocationCoords, &coord.to_string());
    }

    pub fn coords_unavailable(&mut self) {
        self.sink.set_text(Field::LocationCoords, PLACEHOLDER);
    }

    pub fn show_weather(&mut self, current: &CurrentConditions) {
        let w = &current.snapshot;
        self.sink.set_text(Field::Temperature, &format!("{:.1}°C", w.temperature_c));
        self.sink.set_text(
            Field::TemperatureRange,
            &format!("Min: {:.1}°C | Max: {:.1}°C", w.min_c, w.max_c),
        );
        self.sink.set_text(Field::Humidity, &format!("{}%", w.humidity_pct));
        self.sink.set_text(Field::Wind, &format!("{:.1} km/h", w.wind_speed_kmh));
        self.sink.set_text(Field::WindDirection, w.wind_direction.as_str());

        // An empty description keeps whatever sky was showing.
        if let Some(sky) = current.sky {
            self.sky = sky;
            self.sink.set_sky(sky);
        }
    }

    /// Replace every weather field with a placeholder; `headline` goes in the
    /// temperature slot.
    pub fn weather_unavailable(&mut self, headline: &str) {
        self.sink.set_text(Field::Temperature, headline);
        for field in [Field::TemperatureRange, Field::Humidity, Field::Wind, Field::WindDirection] {
            self.sink.set_text(field, PLACEHOLDER);
        }
    }

    pub fn show_air_quality(&mut self, sample: &AirQualitySample) {
        match sample.index {
            Some(index) => {
                self.sink.set_text(Field::AqiValue, &index.to_string());
                self.sink.set_text(Field::AqiStatus, sample.label.as_str());
            }
            None => self.air_quality_unavailable("Unavailable"),
        }
    }

    pub fn air_quality_unavailable(&mut self, status: &str) {
        self.sink.set_text(Field::AqiValue, PLACEHOLDER);
        self.sink.set_text(Field::AqiStatus, status);
    }

    /// Draw `series` on chart `id`, disposing the chart it replaces first.
    pub fn replace_chart(&mut self, id: ChartId, series: &TimeSeries) {
        self.dispose(id);
        let chart = self.sink.create_chart(&ChartData::from_series(id, series));
        self.charts.insert(id, chart);
    }

    /// Dispose chart `id` (if drawn) and show `message` in its place.
    pub fn chart_unavailable(&mut self, id: ChartId, message: &str) {
        self.dispose(id);
        self.sink.chart_placeholder(id, message);
    }

    pub fn show_last_updated(&mut self, at: DateTime<Utc>) {
        let local = at.with_timezone(&Local);
        let text = format!("Last updated: {}", local.format("%Y-%m-%d %H:%M:%S"));
        self.sink.set_text(Field::LastUpdated, &text);
    }

    fn dispose(&mut self, id: ChartId) {
        if let Some(old) = self.charts.remove(&id) {
            self.sink.dispose_chart(old);
        }
    }
}

impl<S: DisplaySink> Drop for Presenter<S> {
    fn drop(&mut self) {
        for (_, chart) in self.charts.drain() {
            self.sink.dispose_chart(chart);
        }
    }
}

impl<S: DisplaySink> std::fmt::Debug for Presenter<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Presenter")
            .field("charts", &self.charts.keys().collect::<Vec<_>>())
            .field("sky", &self.sky)
            .field("alerts", &self.alerts.len())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory sink used by presenter and orchestrator tests.

    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    pub enum ChartEvent {
        Created(u64, ChartId),
        Disposed(u64, ChartId),
        Placeholder(ChartId, String),
    }

    #[derive(Debug)]
    pub struct RecordedChart {
        pub serial: u64,
        pub id: ChartId,
    }

    #[derive(Debug, Default)]
    pub struct RecordingSink {
        pub texts: BTreeMap<Field, String>,
        pub sky: Option<SkyCondition>,
        pub charts: Vec<ChartEvent>,
        pub chart_data: BTreeMap<ChartId, ChartData>,
        pub alerts: Vec<String>,
        pub refresh_enabled: Vec<bool>,
        /// Shared so disposals stay observable after the presenter is dropped.
        pub disposed: Arc<Mutex<Vec<ChartId>>>,
        next_serial: u64,
    }

    impl RecordingSink {
        pub fn text(&self, field: Field) -> Option<&str> {
            self.texts.get(&field).map(String::as_str)
        }

        pub fn live_charts(&self) -> Vec<ChartId> {
            let mut live = Vec::new();
            for event in &self.charts {
                match event {
                    ChartEvent::Created(_, id) => live.push(*id),
                    ChartEvent::Disposed(_, id) => live.retain(|c| c != id),
                    ChartEvent::Placeholder(..) => {}
                }
            }
            live
        }

        pub fn placeholder(&self, id: ChartId) -> Option<&str> {
            self.charts.iter().rev().find_map(|e| match e {
                ChartEvent::Placeholder(c, msg) if *c == id => Some(msg.as_str()),
                _ => None,
            })
        }
    }

    impl DisplaySink for RecordingSink {
        type Chart = RecordedChart;

        fn set_text(&mut self, field: Field, text: &str) {
            self.texts.insert(field, text.to_string());
        }

        fn set_sky(&mut self, sky: SkyCondition) {
            self.sky = Some(sky);
        }

        fn create_chart(&mut self, data: &ChartData) -> RecordedChart {
            let serial = self.next_serial;
            self.next_serial += 1;
            self.charts.push(ChartEvent::Created(serial, data.id));
            self.chart_data.insert(data.id, data.clone());
            RecordedChart {
                serial,
                id: data.id,
            }
        }

        fn dispose_chart(&mut self, chart: RecordedChart) {
            self.charts.push(ChartEvent::Disposed(chart.serial, chart.id));
            self.disposed.lock().unwrap().push(chart.id);
            self.chart_data.remove(&chart.id);
        }

        fn chart_placeholder(&mut self, id: ChartId, message: &str) {
            self.charts.push(ChartEvent::Placeholder(id, message.to_string()));
        }

        fn set_alerts(&mut self, alerts: &[Alert]) {
            self.alerts = alerts.iter().map(|a| a.message.clone()).collect();
        }

        fn set_refresh_enabled(&mut self, enabled: bool) {
            self.refresh_enabled.push(enabled);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{ChartEvent, RecordingSink};
    use super::*;
    use crate::lookup::{AqiLabel, WindDirection};
    use crate::model::{TimeSeriesPoint, WeatherSnapshot};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn series(n: usize) -> TimeSeries {
        (0..n)
            .map(|i| TimeSeriesPoint::new(format!("d{i}"), i as f64))
            .collect::<Vec<_>>()
            .into()
    }

    fn conditions(description: &str, sky: Option<SkyCondition>) -> CurrentConditions {
        CurrentConditions {
            snapshot: WeatherSnapshot {
                temperature_c: 21.44,
                min_c: 18.0,
                max_c: 24.96,
                humidity_pct: 63,
                wind_speed_kmh: 12.6,
                wind_direction: WindDirection::SW,
                condition_text: description.to_string(),
            },
            sky,
            rain_1h_mm: None,
            alerts: Vec::new(),
        }
    }

    #[test]
    fn replace_disposes_previous_chart_first() {
        let mut p = Presenter::new(RecordingSink::default());
        p.replace_chart(ChartId::Co2, &series(3));
        p.replace_chart(ChartId::Co2, &series(4));

        assert_eq!(
            p.sink().charts,
            vec![
                ChartEvent::Created(0, ChartId::Co2),
                ChartEvent::Disposed(0, ChartId::Co2),
                ChartEvent::Created(1, ChartId::Co2),
            ]
        );
        assert_eq!(p.sink().chart_data[&ChartId::Co2].values.len(), 4);
    }

    #[test]
    fn unavailable_chart_is_disposed_and_replaced_by_placeholder() {
        let mut p = Presenter::new(RecordingSink::default());
        p.replace_chart(ChartId::Forecast, &series(5));
        p.chart_unavailable(ChartId::Forecast, "Error loading forecast");

        assert!(!p.has_chart(ChartId::Forecast));
        assert!(p.sink().live_charts().is_empty());
        assert_eq!(
            p.sink().placeholder(ChartId::Forecast),
            Some("Error loading forecast")
        );
    }

    #[test]
    fn dropping_presenter_disposes_live_charts() {
        let sink = RecordingSink::default();
        let disposed = Arc::clone(&sink.disposed);
        {
            let mut p = Presenter::new(sink);
            p.replace_chart(ChartId::Co2, &series(2));
            p.replace_chart(ChartId::TemperatureAnomaly, &series(2));
            assert!(disposed.lock().unwrap().is_empty());
        }

        let mut disposed = disposed.lock().unwrap().clone();
        disposed.sort();
        assert_eq!(disposed, vec![ChartId::Co2, ChartId::TemperatureAnomaly]);
    }

    #[test]
    fn weather_fields_and_sky() {
        let mut p = Presenter::new(RecordingSink::default());
        p.show_weather(&conditions("light rain", Some(SkyCondition::Rainy)));

        let sink = p.sink();
        assert_eq!(sink.text(Field::Temperature), Some("21.4°C"));
        assert_eq!(
            sink.text(Field::TemperatureRange),
            Some("Min: 18.0°C | Max: 25.0°C")
        );
        assert_eq!(sink.text(Field::Humidity), Some("63%"));
        assert_eq!(sink.text(Field::Wind), Some("12.6 km/h"));
        assert_eq!(sink.text(Field::WindDirection), Some("SW"));
        assert_eq!(p.sky(), SkyCondition::Rainy);
    }

    #[test]
    fn empty_description_keeps_prior_sky() {
        let mut p = Presenter::new(RecordingSink::default());
        assert_eq!(p.sky(), SkyCondition::Clear);

        p.show_weather(&conditions("mist", Some(SkyCondition::Foggy)));
        p.show_weather(&conditions("", None));
        assert_eq!(p.sky(), SkyCondition::Foggy);
        assert_eq!(p.sink().sky, Some(SkyCondition::Foggy));
    }

    #[test]
    fn air_quality_without_index_is_unavailable() {
        let mut p = Presenter::new(RecordingSink::default());
        p.show_air_quality(&AirQualitySample {
            index: None,
            label: AqiLabel::Unknown,
        });
        assert_eq!(p.sink().text(Field::AqiValue), Some(PLACEHOLDER));
        assert_eq!(p.sink().text(Field::AqiStatus), Some("Unavailable"));

        p.show_air_quality(&AirQualitySample {
            index: Some(2),
            label: AqiLabel::Fair,
        });
        assert_eq!(p.sink().text(Field::AqiValue), Some("2"));
        assert_eq!(p.sink().text(Field::AqiStatus), Some("Fair"));
    }

    #[test]
    fn alerts_are_forwarded_most_recent_first() {
        let mut p = Presenter::new(RecordingSink::default());
        p.alert("one");
        p.alert("two");
        assert_eq!(p.sink().alerts, vec!["two", "one"]);

        p.clear_alerts();
        assert!(p.sink().alerts.is_empty());
        assert!(p.alerts().is_empty());
    }
}
