//! Synthetic smart-meter reading generator.
//!
//! A [`ReadingGenerator`] builds a fixed table of [`MeterProfile`]s once and
//! then fabricates one [`Reading`] per call by picking a meter at random and
//! applying time-of-day, fault, and offline effects to its base consumption.
//! No I/O happens here.

use crate::config::{GeneratorConfig, Region};
use crate::model::{BuildingType, MeterStatus, Reading};
use chrono::{Local, Timelike, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

/// Source of records for the generation stage.
pub trait RecordSource: Send + 'static {
    fn next_record(&mut self) -> Reading;
}

/// Immutable per-meter attributes fixed at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct MeterProfile {
    pub meter_id: String,
    pub region: String,
    pub latitude: f64,
    pub longitude: f64,
    pub building_type: BuildingType,
    pub base_consumption: f64,
    /// 0.0 or 1.0: whether the meter can report peak load at all.
    pub peak_load_propensity: f64,
    /// 0.0 or 1.0: whether the meter can report faults at all.
    pub fault_propensity: f64,
}

pub struct ReadingGenerator {
    meters: Arc<[MeterProfile]>,
    fault_probability: f64,
    offline_probability: f64,
    peak_load_modeling: bool,
    seed: Option<u64>,
    rng: StdRng,
}

impl ReadingGenerator {
    /// Builds the meter profile table from the configuration.
    ///
    /// With `seed` set, both the profile table and the reading stream are
    /// reproducible.
    pub fn new(config: &GeneratorConfig) -> Self {
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let meters: Vec<MeterProfile> = (0..config.meter_count)
            .map(|i| build_profile(i, &config.regions, &mut rng))
            .collect();

        Self {
            meters: meters.into(),
            fault_probability: config.fault_probability,
            offline_probability: config.offline_probability,
            peak_load_modeling: config.peak_load_modeling,
            seed: config.seed,
            rng,
        }
    }

    /// Returns a generator sharing this profile table with its own random stream.
    pub fn fork(&self, stream: u64) -> Self {
        let rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(
                seed.wrapping_add(stream.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15)),
            ),
            None => StdRng::from_entropy(),
        };

        Self {
            meters: Arc::clone(&self.meters),
            fault_probability: self.fault_probability,
            offline_probability: self.offline_probability,
            peak_load_modeling: self.peak_load_modeling,
            seed: self.seed,
            rng,
        }
    }

    pub fn meters(&self) -> &[MeterProfile] {
        &self.meters
    }

    pub fn generate(&mut self) -> Reading {
        let meter = &self.meters[self.rng.gen_range(0..self.meters.len())];
        let now = Utc::now();

        let status = if self.rng.gen::<f64>() < self.fault_probability && meter.fault_propensity > 0.0
        {
            MeterStatus::Fault
        } else if self.rng.gen::<f64>() < self.offline_probability {
            MeterStatus::Offline
        } else {
            MeterStatus::Operational
        };

        let hour = now.with_timezone(&Local).hour();
        let mut consumption = meter.base_consumption;
        if (8..=20).contains(&hour) {
            consumption *= 1.0 + 0.5 * self.rng.gen::<f64>();
        } else {
            consumption *= 0.4 + 0.3 * self.rng.gen::<f64>();
        }

        match status {
            MeterStatus::Fault => {
                if self.rng.gen::<f64>() < 0.5 {
                    consumption *= 2.0 + self.rng.gen::<f64>();
                } else {
                    consumption *= 0.3;
                }
            }
            MeterStatus::Offline => consumption = 0.0,
            MeterStatus::Operational => {}
        }

        let peak_load = self.peak_load_modeling
            && consumption > meter.building_type.peak_load_threshold()
            && self.rng.gen::<f64>() < meter.peak_load_propensity;

        let id = uuid::Builder::from_random_bytes(self.rng.gen()).into_uuid();

        Reading {
            id: id.to_string(),
            meter_id: meter.meter_id.clone(),
            timestamp: now,
            consumption_kwh: consumption,
            latitude: meter.latitude,
            longitude: meter.longitude,
            region: meter.region.clone(),
            status,
            building_type: meter.building_type,
            peak_load,
        }
    }
}

impl RecordSource for ReadingGenerator {
    fn next_record(&mut self) -> Reading {
        self.generate()
    }
}

fn build_profile(index: usize, regions: &[Region], rng: &mut StdRng) -> MeterProfile {
    let region = select_region(regions, rng.gen());

    let latitude = rng.gen::<f64>() * (region.max_lat - region.min_lat) + region.min_lat;
    let longitude = rng.gen::<f64>() * (region.max_long - region.min_long) + region.min_long;

    let building_type = match rng.gen::<f64>() {
        x if x < 0.7 => BuildingType::Residential,
        x if x < 0.9 => BuildingType::Commercial,
        _ => BuildingType::Industrial,
    };

    let base_consumption = match building_type {
        BuildingType::Residential => 0.5 + rng.gen::<f64>() * 1.5,
        BuildingType::Commercial => 3.0 + rng.gen::<f64>() * 7.0,
        BuildingType::Industrial => 15.0 + rng.gen::<f64>() * 25.0,
    };

    // 80% of meters never report peak load or faults
    let peak_load_propensity = if rng.gen::<f64>() < 0.8 { 0.0 } else { 1.0 };
    let fault_propensity = if rng.gen::<f64>() < 0.8 { 0.0 } else { 1.0 };

    MeterProfile {
        meter_id: format!("meter-{:06}", index + 1),
        region: region.name.clone(),
        latitude,
        longitude,
        building_type,
        base_consumption,
        peak_load_propensity,
        fault_propensity,
    }
}

fn select_region(regions: &[Region], roll: f64) -> &Region {
    let mut cumulative = 0.0;
    for region in regions {
        cumulative += region.meter_share;
        if roll <= cumulative {
            return region;
        }
    }
    &regions[regions.len() - 1]
}
