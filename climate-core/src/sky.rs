use serde::{Deserialize, Serialize};

/// Background category derived from the weather description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SkyCondition {
    #[default]
    Clear,
    Cloudy,
    Rainy,
    Thunder,
    Foggy,
}

impl SkyCondition {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkyCondition::Clear => "clear",
            SkyCondition::Cloudy => "cloudy",
            SkyCondition::Rainy => "rainy",
            SkyCondition::Thunder => "thunder",
            SkyCondition::Foggy => "foggy",
        }
    }
}

impl std::fmt::Display for SkyCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a free-text description. First match wins, so "thunderstorm with
/// rain" is Rainy. Returns `None` for an absent or empty description.
pub fn classify(description: Option<&str>) -> Option<SkyCondition> {
    let text = description.map(str::trim).filter(|d| !d.is_empty())?;
    let text = text.to_lowercase();

    let sky = if text.contains("clear") {
        SkyCondition::Clear
    } else if text.contains("cloud") {
        SkyCondition::Cloudy
    } else if text.contains("rain") {
        SkyCondition::Rainy
    } else if text.contains("thunder") {
        SkyCondition::Thunder
    } else if ["fog", "mist", "haze"].iter().any(|w| text.contains(*w)) {
        SkyCondition::Foggy
    } else {
        SkyCondition::Clear
    };

    Some(sky)
}
