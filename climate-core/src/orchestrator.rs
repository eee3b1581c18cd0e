//! Refresh cycle state machine.
//!
//! One cycle: acquire a location, fetch the location-bound sources
//! concurrently, then fetch the global trend datasets concurrently, then
//! stamp "last updated". Every source settles before the cycle completes and
//! no single failure stops its siblings.
//!
//! Manual triggers and the periodic timer both go through [`Orchestrator::run`],
//! which never starts a cycle while another is active.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use chrono::{DateTime, Utc};
use tokio::{
    sync::{mpsc, watch},
    time::{Instant, MissedTickBehavior},
};

use crate::{
    config::Config,
    display::{ChartId, DisplaySink, PLACEHOLDER, Presenter},
    error::{FetchError, LocationError},
    location::{LocationOptions, LocationSource},
    model::{AirQualitySample, Coordinate, CurrentConditions, CycleReport, Place, TimeSeries},
    source::{
        DataSource, RetryPolicy, SourceId, fetch_settled, http_client,
        openweather::{
            self, AirQualitySource, CurrentWeatherSource, ForecastSource, OpenWeatherApi,
            ReverseGeocodeSource,
        },
        trends::{Co2TrendSource, CsvFetcher, TemperatureTrendSource},
    },
};

pub type LocatedSource<T> = Box<dyn DataSource<Input = Coordinate, Output = T>>;
pub type GlobalSource<T> = Box<dyn DataSource<Input = (), Output = T>>;

/// The OpenWeather-backed sources, all keyed by the device position.
#[derive(Debug)]
pub struct LocalSources {
    pub geocode: LocatedSource<Place>,
    pub weather: LocatedSource<CurrentConditions>,
    pub air_quality: LocatedSource<AirQualitySample>,
    pub forecast: LocatedSource<TimeSeries>,
}

/// The six remote datasets a cycle draws from.
#[derive(Debug)]
pub struct Sources {
    /// `None` when no API key is configured; only the trends load then.
    pub local: Option<LocalSources>,
    pub co2: GlobalSource<TimeSeries>,
    pub temperature: GlobalSource<TimeSeries>,
}

impl Sources {
    /// Build the HTTP-backed sources described by `config`.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let http = http_client(config.request_timeout())?;

        let local = match config.api_key.as_deref() {
            Some(api_key) => {
                let api = OpenWeatherApi::new(
                    api_key.to_owned(),
                    &config.endpoints.openweather,
                    http.clone(),
                );
                Some(LocalSources {
                    geocode: Box::new(ReverseGeocodeSource(api.clone())),
                    weather: Box::new(CurrentWeatherSource(api.clone())),
                    air_quality: Box::new(AirQualitySource(api.clone())),
                    forecast: Box::new(ForecastSource(api)),
                })
            }
            None => {
                tracing::warn!("no OpenWeather API key configured, local weather disabled");
                None
            }
        };

        let csv = CsvFetcher::new(config.endpoints.relay.clone(), http);
        Ok(Self {
            local,
            co2: Box::new(Co2TrendSource::new(csv.clone(), &config.endpoints.co2_csv)),
            temperature: Box::new(TemperatureTrendSource::new(
                csv,
                &config.endpoints.temperature_csv,
            )),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorOptions {
    pub location: LocationOptions,
    pub retry: RetryPolicy,
    pub refresh_interval: Duration,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            location: LocationOptions::default(),
            retry: RetryPolicy::default(),
            refresh_interval: Duration::from_secs(5 * 60),
        }
    }
}

impl OrchestratorOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            retry: RetryPolicy::with_retries(config.retries),
            refresh_interval: config.refresh_interval(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    AwaitingLocation,
    FetchingPrimary,
    FetchingSecondary,
}

impl std::fmt::Display for CycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            CycleState::Idle => "idle",
            CycleState::AwaitingLocation => "awaiting-location",
            CycleState::FetchingPrimary => "fetching-primary",
            CycleState::FetchingSecondary => "fetching-secondary",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    Accepted,
    /// A cycle is already running; the request was dropped.
    Ignored,
}

/// The manual refresh button. Cloneable; the orchestrator's [`run`] loop
/// stops once every handle is dropped.
///
/// [`run`]: Orchestrator::run
#[derive(Debug, Clone)]
pub struct RefreshHandle {
    tx: mpsc::Sender<()>,
    busy: Arc<AtomicBool>,
    completed: watch::Receiver<u64>,
}

impl RefreshHandle {
    /// Ask for a refresh. Ignored while a cycle is running.
    pub fn request(&self) -> TriggerOutcome {
        let claimed = self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire);
        if claimed.is_err() {
            tracing::debug!("refresh already in progress, ignoring trigger");
            return TriggerOutcome::Ignored;
        }

        match self.tx.try_send(()) {
            Ok(()) => TriggerOutcome::Accepted,
            Err(_) => {
                self.busy.store(false, Ordering::Release);
                TriggerOutcome::Ignored
            }
        }
    }

    /// Whether the trigger surface is currently disabled.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn cycles_completed(&self) -> u64 {
        *self.completed.borrow()
    }

    /// Receiver that changes each time a cycle completes.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.completed.clone()
    }
}

/// Receiving side of [`trigger_channel`], consumed by [`Orchestrator::run`].
#[derive(Debug)]
pub struct RefreshTriggers {
    rx: mpsc::Receiver<()>,
    busy: Arc<AtomicBool>,
    completed: watch::Sender<u64>,
}

pub fn trigger_channel() -> (RefreshHandle, RefreshTriggers) {
    let (tx, rx) = mpsc::channel(1);
    let (completed_tx, completed_rx) = watch::channel(0);
    let busy = Arc::new(AtomicBool::new(false));

    let handle = RefreshHandle {
        tx,
        busy: Arc::clone(&busy),
        completed: completed_rx,
    };
    let triggers = RefreshTriggers {
        rx,
        busy,
        completed: completed_tx,
    };
    (handle, triggers)
}

pub struct Orchestrator<S: DisplaySink> {
    location: Box<dyn LocationSource>,
    sources: Sources,
    presenter: Presenter<S>,
    options: OrchestratorOptions,
    state: CycleState,
    cycles: u64,
    last_updated: Option<DateTime<Utc>>,
}

impl<S: DisplaySink> Orchestrator<S> {
    pub fn new(
        location: Box<dyn LocationSource>,
        sources: Sources,
        sink: S,
        options: OrchestratorOptions,
    ) -> Self {
        Self {
            location,
            sources,
            presenter: Presenter::new(sink),
            options,
            state: CycleState::Idle,
            cycles: 0,
            last_updated: None,
        }
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    pub fn cycles_completed(&self) -> u64 {
        self.cycles
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.last_updated
    }

    pub fn presenter(&self) -> &Presenter<S> {
        &self.presenter
    }

    /// Serve refresh requests and the periodic timer until every
    /// [`RefreshHandle`] is dropped. The first timer tick is one full
    /// interval after start; request a refresh for an immediate load.
    pub async fn run(&mut self, mut triggers: RefreshTriggers) {
        let period = self.options.refresh_interval;
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                msg = triggers.rx.recv() => {
                    if msg.is_none() {
                        tracing::debug!("all refresh handles dropped, stopping");
                        break;
                    }
                    tracing::debug!("manual refresh");
                }
                _ = ticker.tick() => {
                    if triggers.busy.swap(true, Ordering::AcqRel) {
                        // A manual request got in first; its message is queued.
                        continue;
                    }
                    tracing::debug!("periodic refresh");
                }
            }

            let report = self.refresh().await;
            triggers.busy.store(false, Ordering::Release);
            triggers.completed.send_replace(report.cycle);
        }
    }

    /// Run one complete cycle. Always completes; failures end up as alerts
    /// and placeholders.
    pub async fn refresh(&mut self) -> CycleReport {
        self.presenter.set_refresh_enabled(false);
        self.presenter.clear_alerts();
        let mut failures = Vec::new();

        self.transition(CycleState::AwaitingLocation);
        let located = match acquire_location(self.location.as_ref(), self.options.location).await {
            Ok(coord) => {
                self.presenter.show_coords(&coord);
                if self.sources.local.is_some() {
                    self.resolve_place(&coord, &mut failures).await;

                    self.transition(CycleState::FetchingPrimary);
                    self.fetch_primary(&coord, &mut failures).await;
                } else {
                    self.local_weather_disabled();
                }
                true
            }
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    "location unavailable, skipping location-bound sources"
                );
                self.location_unavailable(err);
                false
            }
        };

        self.transition(CycleState::FetchingSecondary);
        self.fetch_secondary(&mut failures).await;

        let now = Utc::now();
        self.cycles += 1;
        self.last_updated = Some(now);
        self.presenter.show_last_updated(now);

        self.transition(CycleState::Idle);
        self.presenter.set_refresh_enabled(true);

        tracing::info!(
            cycle = self.cycles,
            located,
            failures = failures.len(),
            "refresh complete"
        );

        CycleReport {
            cycle: self.cycles,
            located,
            failures,
            completed_at: now,
        }
    }

    fn transition(&mut self, next: CycleState) {
        tracing::debug!(from = %self.state, to = %next, "cycle state");
        self.state = next;
    }

    /// A failed lookup falls back to a generic label without an alert.
    async fn resolve_place(&mut self, coord: &Coordinate, failures: &mut Vec<(String, String)>) {
        let Some(local) = &self.sources.local else {
            return;
        };
        match fetch_settled(local.geocode.as_ref(), coord, self.options.retry).await {
            Ok(place) => self.presenter.show_place(&place),
            Err(err) => {
                record(failures, SourceId::ReverseGeocode, &err);
                self.presenter.show_location("Location found");
            }
        }
    }

    fn local_weather_disabled(&mut self) {
        let p = &mut self.presenter;
        p.show_location("Location found");
        p.weather_unavailable(PLACEHOLDER);
        p.air_quality_unavailable("Unavailable");
        p.chart_unavailable(ChartId::Forecast, "Forecast unavailable");
        p.alert("No OpenWeather API key configured. Local weather is unavailable.");
    }

    fn location_unavailable(&mut self, err: LocationError) {
        let (label, alert) = match err {
            LocationError::PermissionDenied => (
                "Location denied",
                "Location permission denied. Some features require location access.",
            ),
            LocationError::Unsupported => (
                "Geolocation not supported",
                "Geolocation is not supported. Local weather is unavailable.",
            ),
            LocationError::Timeout => (
                "Location unavailable",
                "Timed out waiting for location. Local weather is unavailable.",
            ),
        };

        let p = &mut self.presenter;
        p.show_location(label);
        p.coords_unavailable();
        p.weather_unavailable(PLACEHOLDER);
        p.air_quality_unavailable("Unavailable");
        p.chart_unavailable(ChartId::Forecast, "Forecast unavailable");
        p.alert(alert);
    }

    async fn fetch_primary(&mut self, coord: &Coordinate, failures: &mut Vec<(String, String)>) {
        let retry = self.options.retry;
        let Some(s) = &self.sources.local else {
            return;
        };
        let (weather, air, forecast) = tokio::join!(
            fetch_settled(s.weather.as_ref(), coord, retry),
            fetch_settled(s.air_quality.as_ref(), coord, retry),
            fetch_settled(s.forecast.as_ref(), coord, retry),
        );

        let p = &mut self.presenter;

        match weather {
            Ok(current) => {
                p.show_weather(&current);
                for alert in &current.alerts {
                    p.alert(alert.as_str());
                }
            }
            Err(err) => {
                record(failures, SourceId::CurrentWeather, &err);
                p.weather_unavailable("Error loading weather");
                p.alert("Unable to fetch current weather.");
            }
        }

        match air {
            Ok(sample) => {
                p.show_air_quality(&sample);
                if sample.index.is_some_and(|i| i >= openweather::POOR_AQI) {
                    p.alert(format!(
                        "Air quality is poor ({}). Limit outdoor exposure.",
                        sample.label
                    ));
                }
            }
            Err(err) => {
                record(failures, SourceId::AirQuality, &err);
                p.air_quality_unavailable("Error");
                p.alert("Unable to fetch air quality data.");
            }
        }

        match forecast {
            Ok(series) => p.replace_chart(ChartId::Forecast, &series),
            Err(err) => {
                record(failures, SourceId::Forecast, &err);
                p.chart_unavailable(ChartId::Forecast, "Error loading forecast");
                p.alert("Unable to fetch forecast data.");
            }
        }
    }

    async fn fetch_secondary(&mut self, failures: &mut Vec<(String, String)>) {
        let retry = self.options.retry;
        let s = &self.sources;
        let (co2, temperature) = tokio::join!(
            fetch_settled(s.co2.as_ref(), &(), retry),
            fetch_settled(s.temperature.as_ref(), &(), retry),
        );

        let p = &mut self.presenter;

        match co2 {
            Ok(series) => p.replace_chart(ChartId::Co2, &series),
            Err(err) => {
                record(failures, SourceId::Co2Trend, &err);
                if err.is_transport() {
                    p.chart_unavailable(ChartId::Co2, "Error loading CO₂ data");
                    p.alert("Unable to fetch CO₂ data (CORS/network issue).");
                } else {
                    p.chart_unavailable(ChartId::Co2, "CO₂ data unavailable");
                    p.alert("CO₂ data unavailable or malformed.");
                }
            }
        }

        match temperature {
            Ok(series) => p.replace_chart(ChartId::TemperatureAnomaly, &series),
            Err(err) => {
                record(failures, SourceId::TemperatureTrend, &err);
                if err.is_transport() {
                    p.chart_unavailable(
                        ChartId::TemperatureAnomaly,
                        "Error loading temperature data",
                    );
                    p.alert("Unable to fetch temperature anomaly data.");
                } else {
                    p.chart_unavailable(
                        ChartId::TemperatureAnomaly,
                        "Temperature data unavailable",
                    );
                    p.alert("Temperature anomaly data unavailable or malformed.");
                }
            }
        }
    }
}

impl<S: DisplaySink> std::fmt::Debug for Orchestrator<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("state", &self.state)
            .field("cycles", &self.cycles)
            .field("last_updated", &self.last_updated)
            .finish_non_exhaustive()
    }
}

/// A fix that does not arrive within `opts.timeout` is a failure.
async fn acquire_location(
    location: &dyn LocationSource,
    opts: LocationOptions,
) -> Result<Coordinate, LocationError> {
    match tokio::time::timeout(opts.timeout, location.locate(&opts)).await {
        Ok(result) => result,
        Err(_) => Err(LocationError::Timeout),
    }
}

fn record(failures: &mut Vec<(String, String)>, id: SourceId, err: &FetchError) {
    failures.push((id.to_string(), err.to_string()));
}
