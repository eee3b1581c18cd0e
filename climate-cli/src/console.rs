//! Terminal rendering of the dashboard.

use std::{collections::BTreeMap, fmt::Write as _};

use climate_core::{
    Alert, ChartData, ChartId, ChartKind, DisplaySink, Field, SkyCondition,
    display::PLACEHOLDER,
};

const BAR_WIDTH: usize = 30;

#[derive(Debug)]
pub struct ConsoleChart {
    id: ChartId,
    serial: u64,
}

/// Collects updates and prints the whole dashboard once a cycle finishes.
#[derive(Debug, Default)]
pub struct ConsoleSink {
    fields: BTreeMap<Field, String>,
    sky: SkyCondition,
    charts: BTreeMap<ChartId, (u64, ChartData)>,
    placeholders: BTreeMap<ChartId, String>,
    alerts: Vec<String>,
    next_serial: u64,
}

impl ConsoleSink {
    fn field(&self, field: Field) -> &str {
        self.fields
            .get(&field)
            .map(String::as_str)
            .unwrap_or(PLACEHOLDER)
    }

    pub fn render(&self) -> String {
        let mut out = String::new();

        let _ = writeln!(out, "=== Climate dashboard ({} sky) ===", self.sky);
        let _ = writeln!(
            out,
            "Location:    {} ({})",
            self.field(Field::LocationName),
            self.field(Field::LocationCoords)
        );
        let _ = writeln!(
            out,
            "Temperature: {}  {}",
            self.field(Field::Temperature),
            self.field(Field::TemperatureRange)
        );
        let _ = writeln!(out, "Humidity:    {}", self.field(Field::Humidity));
        let _ = writeln!(
            out,
            "Wind:        {} {}",
            self.field(Field::Wind),
            self.field(Field::WindDirection)
        );
        let _ = writeln!(
            out,
            "Air quality: {} ({})",
            self.field(Field::AqiValue),
            self.field(Field::AqiStatus)
        );

        for id in ChartId::all() {
            let _ = writeln!(out);
            match (self.charts.get(id), self.placeholders.get(id)) {
                (Some((_, data)), _) => render_chart(&mut out, data),
                (None, Some(message)) => {
                    let _ = writeln!(out, "{}\n  {message}", id.title());
                }
                (None, None) => {
                    let _ = writeln!(out, "{}\n  Loading…", id.title());
                }
            }
        }

        if !self.alerts.is_empty() {
            let _ = writeln!(out, "\nAlerts:");
            for alert in &self.alerts {
                let _ = writeln!(out, "  ! {alert}");
            }
        }

        let _ = writeln!(out, "\n{}", self.field(Field::LastUpdated));
        out
    }
}

fn render_chart(out: &mut String, data: &ChartData) {
    let _ = writeln!(out, "{}", data.title);

    let label_width = data
        .labels
        .iter()
        .map(|l| l.chars().count())
        .max()
        .unwrap_or(0);
    let lo = data.values.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = data.values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let peak = lo.abs().max(hi.abs());

    for (label, value) in data.labels.iter().zip(&data.values) {
        let bar = match data.kind {
            ChartKind::Line => {
                let span = hi - lo;
                let len = if span > 0.0 {
                    1 + ((value - lo) / span * (BAR_WIDTH - 1) as f64) as usize
                } else {
                    BAR_WIDTH / 2
                };
                "█".repeat(len)
            }
            ChartKind::Bar => {
                let len = if peak > 0.0 {
                    (value.abs() / peak * BAR_WIDTH as f64).round() as usize
                } else {
                    0
                };
                if *value >= 0.0 {
                    "█".repeat(len)
                } else {
                    "░".repeat(len)
                }
            }
        };
        let _ = writeln!(out, "  {label:<label_width$}  {bar} {value:.2}");
    }
}

impl DisplaySink for ConsoleSink {
    type Chart = ConsoleChart;

    fn set_text(&mut self, field: Field, text: &str) {
        self.fields.insert(field, text.to_string());
    }

    fn set_sky(&mut self, sky: SkyCondition) {
        self.sky = sky;
    }

    fn create_chart(&mut self, data: &ChartData) -> ConsoleChart {
        let serial = self.next_serial;
        self.next_serial += 1;
        self.placeholders.remove(&data.id);
        self.charts.insert(data.id, (serial, data.clone()));
        ConsoleChart {
            id: data.id,
            serial,
        }
    }

    fn dispose_chart(&mut self, chart: ConsoleChart) {
        let current = self.charts.get(&chart.id).map(|(serial, _)| *serial);
        if current == Some(chart.serial) {
            self.charts.remove(&chart.id);
        }
    }

    fn chart_placeholder(&mut self, id: ChartId, message: &str) {
        self.placeholders.insert(id, message.to_string());
    }

    fn set_alerts(&mut self, alerts: &[Alert]) {
        self.alerts = alerts.iter().map(|a| a.message.clone()).collect();
    }

    fn set_refresh_enabled(&mut self, enabled: bool) {
        if enabled {
            println!("{}", self.render());
        } else {
            tracing::info!("refreshing");
        }
    }
}
