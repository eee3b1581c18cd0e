use std::{io::BufRead, time::Duration};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use climate_core::{
    CachedLocation, Config, Coordinate, DeniedLocation, FixedLocation, LocationSource,
    Orchestrator, OrchestratorOptions, Sources, TriggerOutcome, trigger_channel,
};
use inquire::{Confirm, CustomType, Password};

use crate::console::ConsoleSink;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "climate", version, about = "Local weather and global climate trends")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store the OpenWeather API key and an optional fixed location.
    Configure,

    /// Refresh once and print the dashboard.
    Show {
        #[command(flatten)]
        location: LocationArgs,
    },

    /// Keep the dashboard up to date. Press Enter to refresh now, Ctrl-C to quit.
    Watch {
        #[command(flatten)]
        location: LocationArgs,

        /// Seconds between automatic refreshes; defaults to the configured interval.
        #[arg(long)]
        interval: Option<u64>,
    },
}

#[derive(Debug, Args)]
pub struct LocationArgs {
    /// Latitude to use instead of the configured location.
    #[arg(long, allow_hyphen_values = true, requires = "lon")]
    lat: Option<f64>,

    /// Longitude to use instead of the configured location.
    #[arg(long, allow_hyphen_values = true, requires = "lat")]
    lon: Option<f64>,

    /// Do not share any location; only global trends are loaded.
    #[arg(long, conflicts_with_all = ["lat", "lon"])]
    no_location: bool,
}

impl LocationArgs {
    fn source(&self, config: &Config) -> anyhow::Result<Box<dyn LocationSource>> {
        if self.no_location {
            return Ok(Box::new(DeniedLocation));
        }

        let coord = match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => {
                Some(Coordinate::new(lat, lon).context("Invalid --lat/--lon")?)
            }
            _ => config.coordinate()?,
        };

        Ok(Box::new(CachedLocation::new(FixedLocation(coord))))
    }
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure => configure(),
            Command::Show { location } => show(&location).await,
            Command::Watch { location, interval } => watch(&location, interval).await,
        }
    }
}

fn configure() -> anyhow::Result<()> {
    let mut config = Config::load()?;

    let api_key = Password::new("OpenWeather API key:")
        .without_confirmation()
        .with_help_message("Get one at https://openweathermap.org/api")
        .prompt()?;
    config.set_api_key(api_key);
    config.require_api_key()?;

    let fixed = Confirm::new("Use a fixed location?")
        .with_default(config.location.is_some())
        .with_help_message("Without one, only global CO₂ and temperature trends are shown")
        .prompt()?;

    let coord = if fixed {
        let lat = CustomType::<f64>::new("Latitude:").prompt()?;
        let lon = CustomType::<f64>::new("Longitude:").prompt()?;
        Some(Coordinate::new(lat, lon)?)
    } else {
        None
    };
    config.set_location(coord);

    config.save()?;
    println!(
        "Saved configuration to {}",
        Config::config_file_path()?.display()
    );
    Ok(())
}

async fn show(location: &LocationArgs) -> anyhow::Result<()> {
    let config = Config::load()?;
    let sources = Sources::from_config(&config)?;
    let options = OrchestratorOptions::from_config(&config);

    let location = location.source(&config)?;
    let mut orchestrator = Orchestrator::new(location, sources, ConsoleSink::default(), options);
    let report = orchestrator.refresh().await;

    let finished = report.completed_at.with_timezone(&chrono::Local);
    for (source, reason) in &report.failures {
        tracing::debug!(%source, %reason, %finished, "source failed");
    }
    Ok(())
}

async fn watch(location: &LocationArgs, interval: Option<u64>) -> anyhow::Result<()> {
    let config = Config::load()?;
    let sources = Sources::from_config(&config)?;
    let mut options = OrchestratorOptions::from_config(&config);
    if let Some(secs) = interval {
        options.refresh_interval = Duration::from_secs(secs.max(1));
    }

    let location = location.source(&config)?;
    let mut orchestrator = Orchestrator::new(location, sources, ConsoleSink::default(), options);
    let (handle, triggers) = trigger_channel();

    handle.request();

    // Plain thread: a blocking stdin read must not hold up runtime shutdown.
    let manual = handle.clone();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            if line.is_err() {
                break;
            }
            if manual.request() == TriggerOutcome::Ignored {
                println!("Refresh already in progress.");
            }
        }
    });

    tokio::select! {
        _ = orchestrator.run(triggers) => {}
        res = tokio::signal::ctrl_c() => {
            res.context("Failed to listen for Ctrl-C")?;
            tracing::info!("interrupted, shutting down");
        }
    }

    drop(handle);
    Ok(())
}
