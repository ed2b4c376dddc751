//! Wheat development: cardinal-temperature thermal time, crown temperature,
//! vernalization and photoperiod responses.

use chrono::Datelike;
use serde::{Deserialize, Serialize};

use super::{DailyDevelopment, DevelopmentMemory, PhenologyModel, PhenologyState};
use crate::error::EngineError;
use crate::reference_et::daylength_hours;
use crate::weather::{Site, WeatherRecord};

// Daylength above which photoperiod no longer slows juvenile development [h]
const CRITICAL_DAYLENGTH: f64 = 20.0;

/// Genetic coefficients of one wheat cultivar. Thermal times are in °C·day
/// and count from the previous stage.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WheatCultivar {
    pub name: String,
    pub base_temp: f64,
    pub optimum_temp: f64,
    pub ceiling_temp: f64,
    pub emergence_tt: f64,     // Sowing -> Emergence
    pub juvenile_tt: f64,      // Emergence -> EndJuvenile
    pub anthesis_tt: f64,      // EndJuvenile -> Anthesis
    pub grain_filling_tt: f64, // Anthesis -> EndGrainFilling
    pub harvest_tt: f64,       // EndGrainFilling -> Harvest
    /// Vernalization days needed for full satisfaction, 0 for spring types.
    #[serde(default)]
    pub vernalization_days: f64,
    #[serde(default)]
    pub vernalization_sensitivity: f64,
    #[serde(default)]
    pub min_vernalization_factor: f64,
    /// Development lost per hour² of daylength below 20 h.
    #[serde(default)]
    pub photoperiod_sensitivity: f64,
}

/// Temperature near the crown, shielded from air frost. Warm extremes pass
/// through but never beyond the development ceiling.
pub fn crown_temperature(air_temp: f64, ceiling_temp: f64) -> f64 {
    if air_temp < 0.0 {
        2.0 + 0.805 * air_temp
    } else {
        air_temp.min(ceiling_temp)
    }
}

/// Daily thermal time from a mean temperature. Rises one-for-one above the
/// base, falls linearly from the optimum to zero at the ceiling.
pub fn thermal_time(t_mean: f64, base: f64, optimum: f64, ceiling: f64) -> f64 {
    if t_mean <= base || t_mean >= ceiling {
        0.0
    } else if t_mean <= optimum {
        t_mean - base
    } else {
        (optimum - base) * (ceiling - t_mean) / (ceiling - optimum)
    }
}

/// Vernalization days earned in one day from crown temperature extremes.
pub fn daily_vernalization(crown_min: f64, crown_max: f64) -> f64 {
    if crown_min >= 15.0 || crown_max <= 0.0 {
        return 0.0;
    }
    let crown_mean = 0.5 * (crown_min + crown_max);
    let cold = 1.4 - 0.0778 * crown_mean;
    let range = 0.5 + 13.44 * crown_mean / (crown_max - crown_min + 3.0).powi(2);
    cold.min(range).min(1.0).max(0.0)
}

impl WheatCultivar {
    pub fn vernalization_factor(&self, vernalization_days: f64) -> f64 {
        if self.vernalization_days <= 0.0 {
            return 1.0;
        }
        let satisfied = (vernalization_days / self.vernalization_days).min(1.0);
        (1.0 - self.vernalization_sensitivity * (1.0 - satisfied)).clamp(self.min_vernalization_factor, 1.0)
    }

    pub fn photoperiod_factor(&self, daylength: f64) -> f64 {
        let deficit = (CRITICAL_DAYLENGTH - daylength).max(0.0);
        (1.0 - self.photoperiod_sensitivity * deficit.powi(2)).clamp(0.0, 1.0)
    }
}

impl PhenologyModel for WheatCultivar {
    fn crop(&self) -> &str {
        "wheat"
    }

    fn cultivar(&self) -> &str {
        &self.name
    }

    fn validate(&self) -> Result<(), EngineError> {
        let thresholds = [
            ("emergence_tt", self.emergence_tt),
            ("juvenile_tt", self.juvenile_tt),
            ("anthesis_tt", self.anthesis_tt),
            ("grain_filling_tt", self.grain_filling_tt),
            ("harvest_tt", self.harvest_tt),
        ];
        for (name, value) in thresholds {
            if !value.is_finite() || value <= 0.0 {
                return Err(EngineError::cultivar(&self.name, format!("{name} must be positive, got {value}")));
            }
        }
        if !(self.base_temp < self.optimum_temp && self.optimum_temp < self.ceiling_temp) {
            return Err(EngineError::cultivar(
                &self.name,
                "cardinal temperatures must satisfy base < optimum < ceiling",
            ));
        }
        if !self.vernalization_days.is_finite() || self.vernalization_days < 0.0 {
            return Err(EngineError::cultivar(&self.name, "vernalization_days must not be negative"));
        }
        let fractions = [
            ("vernalization_sensitivity", self.vernalization_sensitivity),
            ("min_vernalization_factor", self.min_vernalization_factor),
            ("photoperiod_sensitivity", self.photoperiod_sensitivity),
        ];
        for (name, value) in fractions {
            if !(0.0..=1.0).contains(&value) {
                return Err(EngineError::cultivar(&self.name, format!("{name} must lie in [0, 1], got {value}")));
            }
        }
        Ok(())
    }

    fn threshold(&self, state: PhenologyState) -> Option<f64> {
        match state {
            PhenologyState::Sown => Some(self.emergence_tt),
            PhenologyState::Emerged => Some(self.juvenile_tt),
            PhenologyState::EndJuvenile => Some(self.anthesis_tt),
            PhenologyState::Anthesis => Some(self.grain_filling_tt),
            PhenologyState::EndGrainFilling => Some(self.harvest_tt),
            PhenologyState::NotSown | PhenologyState::Harvest => None,
        }
    }

    fn develop(
        &self,
        state: PhenologyState,
        record: &WeatherRecord,
        site: &Site,
        memory: &mut DevelopmentMemory,
    ) -> DailyDevelopment {
        let crown_min = crown_temperature(record.tmin, self.ceiling_temp);
        let crown_max = crown_temperature(record.tmax, self.ceiling_temp);
        let tt = |t_mean: f64| thermal_time(t_mean, self.base_temp, self.optimum_temp, self.ceiling_temp);

        match state {
            PhenologyState::NotSown | PhenologyState::Harvest => DailyDevelopment::NONE,
            PhenologyState::Sown => {
                memory.vernalization_days += daily_vernalization(crown_min, crown_max);
                DailyDevelopment {
                    thermal_time: tt(0.5 * (crown_min + crown_max)),
                    factor: 1.0,
                }
            }
            PhenologyState::Emerged => {
                memory.vernalization_days += daily_vernalization(crown_min, crown_max);
                let daylength = daylength_hours(site.latitude_deg, record.date.ordinal());
                let factor =
                    self.vernalization_factor(memory.vernalization_days) * self.photoperiod_factor(daylength);
                DailyDevelopment {
                    thermal_time: tt(record.tmean()) * factor,
                    factor,
                }
            }
            _ => DailyDevelopment {
                thermal_time: tt(record.tmean()),
                factor: 1.0,
            },
        }
    }
}
