//! Parsers for the two scientific datasets shown on the dashboard.
//!
//! Both are tolerant: a row that does not yield a number is skipped, never
//! fatal. An empty result is a valid outcome; callers decide whether it
//! warrants an alert.

use std::sync::LazyLock;

use regex::Regex;

use crate::model::{TimeSeries, TimeSeriesPoint};

/// Weekly CO₂ rows kept (one year).
pub const CO2_WINDOW: usize = 52;

/// Annual temperature rows kept.
pub const TEMPERATURE_WINDOW: usize = 30;

/// Column holding the January–December mean in the annual table.
pub const ANNUAL_MEAN_COLUMN: usize = 13;

static CO2_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\s,]+").expect("separator pattern is valid"));

static YEAR_ROW: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{4},").expect("year pattern is valid"));

/// Parse the weekly CO₂ table: `#` lines are comments, columns are separated
/// by any run of whitespace or commas. Column 2 is the label, column 3 the
/// concentration.
pub fn parse_co2_weekly(text: &str) -> TimeSeries {
    let points = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let mut cols = CO2_SEPARATOR.split(line).skip(2);
            let label = cols.next()?;
            let value = parse_number(cols.next()?)?;
            Some(TimeSeriesPoint::new(label, value))
        })
        .collect();

    last_n(points, CO2_WINDOW)
}

/// Parse the annual global temperature anomaly table. Only lines starting
/// with a four-digit year and a comma are data rows.
pub fn parse_temperature_annual(text: &str) -> TimeSeries {
    let points = text
        .lines()
        .map(str::trim)
        .filter(|line| YEAR_ROW.is_match(line))
        .filter_map(|line| {
            let cols: Vec<&str> = line.split(',').collect();
            let value = parse_number(cols.get(ANNUAL_MEAN_COLUMN)?)?;
            Some(TimeSeriesPoint::new(cols[0], value))
        })
        .collect();

    last_n(points, TEMPERATURE_WINDOW)
}

/// Accepts finite decimal numbers only; `***` or `NaN` placeholders are skipped.
fn parse_number(token: &str) -> Option<f64> {
    token.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn last_n(mut points: Vec<TimeSeriesPoint>, n: usize) -> TimeSeries {
    let start = points.len().saturating_sub(n);
    points.drain(..start);
    TimeSeries::new(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn co2_row(i: usize) -> String {
        format!(
            "2023,{},{},{}.5,{:.2}",
            1 + i % 12,
            1 + i % 28,
            2023 + i,
            410.0 + i as f64
        )
    }

    #[test]
    fn co2_keeps_last_52_in_order() {
        let mut text =
            String::from("# NOAA weekly CO2\n# columns: year,month,day,decimal,average\n\n");
        for i in 0..60 {
            text.push_str(&co2_row(i));
            text.push('\n');
            if i == 30 {
                text.push_str("   \n# mid-file note\n");
            }
        }

        let series = parse_co2_weekly(&text);
        assert_eq!(series.len(), 52);

        let first = &series.points()[0];
        assert_eq!(first.label, format!("{}", 1 + 8 % 28));
        assert_eq!(first.value, 2031.5);

        let values = series.values();
        assert!(values.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(*values.last().unwrap(), 2082.5);
    }

    #[test]
    fn co2_returns_all_when_fewer_than_window() {
        let text: String = (0..10).map(|i| co2_row(i) + "\n").collect();
        assert_eq!(parse_co2_weekly(&text).len(), 10);
    }

    #[test]
    fn co2_mixed_separators() {
        let text = "  2024   5 12  2024.3600   424.61\n2024,\t5,19,2024.3792,425.01\n";
        let series = parse_co2_weekly(text);
        assert_eq!(series.labels(), vec!["12", "19"]);
        assert_eq!(series.values(), vec![2024.36, 2024.3792]);
    }

    #[test]
    fn co2_non_numeric_rows_yield_empty_series() {
        let text = "2024,5,12,n/a,424.61\n2024,5,19,missing,425.01\n2024,5\n";
        let series = parse_co2_weekly(text);
        assert!(series.is_empty());
    }

    #[test]
    fn co2_skips_short_rows() {
        let text = "2024,5\n2024,5,19,2024.38,425.01\n";
        assert_eq!(parse_co2_weekly(text).len(), 1);
    }

    fn temp_row(year: usize, annual: &str) -> String {
        format!("{year},.10,.20,.30,.40,.50,.60,.70,.80,.90,1.0,1.1,1.2,{annual},.5,.6,.7,.8,.9")
    }

    #[test]
    fn temperature_accepts_year_rows_only() {
        let text = format!(
            "Land-Ocean: Global Means\n{}\n{}\n",
            "Year,Jan,Feb,Mar,Apr,May,Jun,Jul,Aug,Sep,Oct,Nov,Dec,J-D,D-N,DJF,MAM,JJA,SON",
            "2023,1.2,1.2,1.2,1.2,1.2,1.2,1.2,1.2,1.2,1.2,1.2,1.2,0.85"
        );
        let series = parse_temperature_annual(&text);
        assert_eq!(series.points(), &[TimeSeriesPoint::new("2023", 0.85)]);
    }

    #[test]
    fn temperature_keeps_last_30_valid_rows() {
        let mut text = String::new();
        for year in 1950..2000 {
            let annual = format!("{:.2}", (year - 1950) as f64 / 100.0);
            text.push_str(&temp_row(year, &annual));
            text.push('\n');
        }
        // current year is incomplete upstream
        text.push_str(&temp_row(2000, "***"));
        text.push_str("\nYear,Jan,Feb\n");

        let series = parse_temperature_annual(&text);
        assert_eq!(series.len(), 30);
        assert_eq!(series.points()[0].label, "1970");
        assert_eq!(series.points()[29].label, "1999");
        assert_eq!(series.points()[29].value, 0.49);
    }

    #[test]
    fn temperature_skips_rows_missing_annual_column() {
        let text = "1999,.1,.2\n2000,.1,.2,.3,.4,.5,.6,.7,.8,.9,1.0,1.1,1.2,-.03\n";
        let series = parse_temperature_annual(text);
        assert_eq!(series.points(), &[TimeSeriesPoint::new("2000", -0.03)]);
    }

    #[test]
    fn temperature_requires_exactly_four_leading_digits() {
        let text = "12345,.1,.2,.3,.4,.5,.6,.7,.8,.9,1.0,1.1,1.2,.9\n";
        assert!(parse_temperature_annual(text).is_empty());
    }

    #[test]
    fn temperature_year_must_be_ascii_digits() {
        let text = "２０２３,.1,.2,.3,.4,.5,.6,.7,.8,.9,1.0,1.1,1.2,.85\n";
        assert!(parse_temperature_annual(text).is_empty());
    }
}
