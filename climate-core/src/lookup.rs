//! Code-to-label tables for wind headings and AQI buckets.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WindDirection {
    N,
    NNE,
    NE,
    ENE,
    E,
    ESE,
    SE,
    SSE,
    S,
    SSW,
    SW,
    WSW,
    W,
    WNW,
    NW,
    NNW,
    /// Heading was missing or not a number.
    Unknown,
}

impl WindDirection {
    /// Compass points clockwise from north, 22.5° apart.
    pub const COMPASS: [WindDirection; 16] = [
        WindDirection::N,
        WindDirection::NNE,
        WindDirection::NE,
        WindDirection::ENE,
        WindDirection::E,
        WindDirection::ESE,
        WindDirection::SE,
        WindDirection::SSE,
        WindDirection::S,
        WindDirection::SSW,
        WindDirection::SW,
        WindDirection::WSW,
        WindDirection::W,
        WindDirection::WNW,
        WindDirection::NW,
        WindDirection::NNW,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WindDirection::N => "N",
            WindDirection::NNE => "NNE",
            WindDirection::NE => "NE",
            WindDirection::ENE => "ENE",
            WindDirection::E => "E",
            WindDirection::ESE => "ESE",
            WindDirection::SE => "SE",
            WindDirection::SSE => "SSE",
            WindDirection::S => "S",
            WindDirection::SSW => "SSW",
            WindDirection::SW => "SW",
            WindDirection::WSW => "WSW",
            WindDirection::W => "W",
            WindDirection::WNW => "WNW",
            WindDirection::NW => "NW",
            WindDirection::NNW => "NNW",
            WindDirection::Unknown => "--",
        }
    }
}

impl std::fmt::Display for WindDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map a heading in degrees to the nearest of the 16 compass points.
pub fn wind_direction(degrees: Option<f64>) -> WindDirection {
    let Some(deg) = degrees.filter(|d| d.is_finite()) else {
        return WindDirection::Unknown;
    };

    let sector = (deg.rem_euclid(360.0) / 22.5).round() as usize;
    WindDirection::COMPASS[sector % 16]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AqiLabel {
    Good,
    Fair,
    Moderate,
    Poor,
    VeryPoor,
    Unknown,
}

impl AqiLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AqiLabel::Good => "Good",
            AqiLabel::Fair => "Fair",
            AqiLabel::Moderate => "Moderate",
            AqiLabel::Poor => "Poor",
            AqiLabel::VeryPoor => "Very Poor",
            AqiLabel::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for AqiLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn air_quality_label(index: i64) -> AqiLabel {
    match index {
        1 => AqiLabel::Good,
        2 => AqiLabel::Fair,
        3 => AqiLabel::Moderate,
        4 => AqiLabel::Poor,
        5 => AqiLabel::VeryPoor,
        _ => AqiLabel::Unknown,
    }
}
