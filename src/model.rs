use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeterStatus {
    Operational,
    Fault,
    Offline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildingType {
    Residential,
    Commercial,
    Industrial,
}

impl BuildingType {
    /// Consumption above which a reading may be flagged as peak load, in kWh.
    pub fn peak_load_threshold(self) -> f64 {
        match self {
            BuildingType::Residential => 5.0,
            BuildingType::Commercial => 15.0,
            BuildingType::Industrial => 50.0,
        }
    }
}

/// One simulated meter measurement, as published to Kafka.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    pub id: String,
    pub meter_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "consumptionKWh")]
    pub consumption_kwh: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub region: String,
    pub status: MeterStatus,
    pub building_type: BuildingType,
    pub peak_load: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_reading_wire_format() {
        let reading = Reading {
            id: "7d9f1c1e-0000-4000-8000-000000000001".to_string(),
            meter_id: "meter-000042".to_string(),
            timestamp: "2024-05-01T12:00:00Z".parse().unwrap(),
            consumption_kwh: 1.25,
            latitude: 40.75,
            longitude: -73.95,
            region: "Urban".to_string(),
            status: MeterStatus::Fault,
            building_type: BuildingType::Commercial,
            peak_load: false,
        };

        let value = serde_json::to_value(&reading).unwrap();
        assert_eq!(
            value,
            json!({
                "id": "7d9f1c1e-0000-4000-8000-000000000001",
                "meterId": "meter-000042",
                "timestamp": "2024-05-01T12:00:00Z",
                "consumptionKWh": 1.25,
                "latitude": 40.75,
                "longitude": -73.95,
                "region": "Urban",
                "status": "fault",
                "buildingType": "commercial",
                "peakLoad": false
            })
        );
    }
}
