//! Core library for the `climate` dashboard.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - Data sources for local weather, air quality, forecast and global trends
//! - Tolerant parsers for the CO₂ and temperature-anomaly datasets
//! - The refresh orchestrator and the presentation contract it drives
//!
//! It is used by `climate-cli`, but any front end implementing
//! [`DisplaySink`] can drive the same orchestrator.

pub mod alert;
pub mod config;
pub mod dataset;
pub mod display;
pub mod error;
pub mod location;
pub mod lookup;
pub mod model;
pub mod orchestrator;
pub mod sky;
pub mod source;

pub use alert::{Alert, AlertLog};
pub use config::Config;
pub use display::{ChartData, ChartId, ChartKind, DisplaySink, Field, Presenter};
pub use error::{FetchError, LocationError};
pub use location::{CachedLocation, DeniedLocation, FixedLocation, LocationOptions, LocationSource};
pub use model::{Coordinate, CycleReport, TimeSeries, TimeSeriesPoint};
pub use orchestrator::{
    CycleState, Orchestrator, OrchestratorOptions, RefreshHandle, Sources, TriggerOutcome,
    trigger_channel,
};
pub use sky::SkyCondition;
pub use source::{DataSource, RetryPolicy, SourceId};
