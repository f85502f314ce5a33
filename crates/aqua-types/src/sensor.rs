use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 传感器类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorType {
    Ph,
    Ammonia,
    Nitrite,
    Nitrate,
    DissolvedOxygen,
    Orp,
    Salinity,
    Temperature,
    Turbidity,
    WaterLevel,
    TotalOrganicCarbon,
    FishActivity,
    FeedingResponse,
    BacteriaDensity,
}

impl SensorType {
    /// 所有已知的传感器类型
    pub const ALL: [SensorType; 14] = [
        SensorType::Ph,
        SensorType::Ammonia,
        SensorType::Nitrite,
        SensorType::Nitrate,
        SensorType::DissolvedOxygen,
        SensorType::Orp,
        SensorType::Salinity,
        SensorType::Temperature,
        SensorType::Turbidity,
        SensorType::WaterLevel,
        SensorType::TotalOrganicCarbon,
        SensorType::FishActivity,
        SensorType::FeedingResponse,
        SensorType::BacteriaDensity,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SensorType::Ph => "ph",
            SensorType::Ammonia => "ammonia",
            SensorType::Nitrite => "nitrite",
            SensorType::Nitrate => "nitrate",
            SensorType::DissolvedOxygen => "dissolved_oxygen",
            SensorType::Orp => "orp",
            SensorType::Salinity => "salinity",
            SensorType::Temperature => "temperature",
            SensorType::Turbidity => "turbidity",
            SensorType::WaterLevel => "water_level",
            SensorType::TotalOrganicCarbon => "total_organic_carbon",
            SensorType::FishActivity => "fish_activity",
            SensorType::FeedingResponse => "feeding_response",
            SensorType::BacteriaDensity => "bacteria_density",
        }
    }

    /// 默认显示名称（限值配置未提供时使用）
    pub fn default_display_name(&self) -> &'static str {
        match self {
            SensorType::Ph => "pH",
            SensorType::Ammonia => "Ammonia",
            SensorType::Nitrite => "Nitrite",
            SensorType::Nitrate => "Nitrate",
            SensorType::DissolvedOxygen => "Dissolved Oxygen",
            SensorType::Orp => "ORP",
            SensorType::Salinity => "Salinity",
            SensorType::Temperature => "Temperature",
            SensorType::Turbidity => "Turbidity",
            SensorType::WaterLevel => "Water Level",
            SensorType::TotalOrganicCarbon => "Total Organic Carbon",
            SensorType::FishActivity => "Fish Activity",
            SensorType::FeedingResponse => "Feeding Response",
            SensorType::BacteriaDensity => "Bacteria Density",
        }
    }

    /// 默认单位
    pub fn default_unit(&self) -> &'static str {
        match self {
            SensorType::Ph => "pH",
            SensorType::Ammonia | SensorType::Nitrite | SensorType::Nitrate => "mg/L",
            SensorType::DissolvedOxygen | SensorType::TotalOrganicCarbon => "mg/L",
            SensorType::Orp => "mV",
            SensorType::Salinity => "ppt",
            SensorType::Temperature => "°C",
            SensorType::Turbidity => "NTU",
            SensorType::WaterLevel => "cm",
            SensorType::FishActivity | SensorType::FeedingResponse => "%",
            SensorType::BacteriaDensity => "CFU/mL",
        }
    }
}

impl fmt::Display for SensorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SensorType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        SensorType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| format!("unknown sensor type: {}", s))
    }
}
