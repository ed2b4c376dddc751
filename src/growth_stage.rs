// FAO-56 growth stages derived from phenology dates, and the basal crop
// coefficient (Kcb) curve over them.
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::phenology::{PhenologyStageDate, Stage};

// Defaults used for the climate adjustment when a record lacks them
const DEFAULT_WIND_SPEED: f64 = 2.0; // m/s
const DEFAULT_RH_MIN: f64 = 45.0; // %

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FaoStage {
    Initial,
    Development,
    Mid,
    Late,
}

impl FaoStage {
    pub fn label(self) -> &'static str {
        match self {
            FaoStage::Initial => "Initial",
            FaoStage::Development => "Development",
            FaoStage::Mid => "Mid",
            FaoStage::Late => "Late",
        }
    }
}

/// Crop parameters for the water balance. Depths in cm, height in m.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CropWaterParameters {
    pub kcb_ini: f64,
    pub kcb_mid: f64,
    pub kcb_end: f64,
    pub min_root_depth_cm: f64,
    pub max_root_depth_cm: f64,
    pub max_height_m: f64,
    /// Tabulated depletion fraction p at ETc = 5 mm/day.
    pub depletion_fraction: f64,
    /// Share of Anthesis -> EndGrainFilling before senescence starts.
    pub senescence_fraction: f64,
}

impl CropWaterParameters {
    pub fn validate(&self) -> Result<(), EngineError> {
        let invalid = |reason: &str| Err(EngineError::InvalidWaterParameters(reason.to_string()));
        let kcb = [self.kcb_ini, self.kcb_mid, self.kcb_end];
        if kcb.iter().any(|k| !k.is_finite() || *k < 0.0 || *k > 2.0) {
            return invalid("Kcb values must lie in [0, 2]");
        }
        if !(self.min_root_depth_cm > 0.0 && self.min_root_depth_cm <= self.max_root_depth_cm) {
            return invalid("root depths must satisfy 0 < min <= max");
        }
        if !self.max_root_depth_cm.is_finite() || !self.max_height_m.is_finite() || self.max_height_m < 0.0 {
            return invalid("maximum root depth and height must be finite and non-negative");
        }
        if !(0.0..1.0).contains(&self.depletion_fraction) {
            return invalid("depletion fraction must lie in [0, 1)");
        }
        if !(0.0..=1.0).contains(&self.senescence_fraction) {
            return invalid("senescence fraction must lie in [0, 1]");
        }
        Ok(())
    }
}

/// Dates that bound the FAO-56 stages. A boundary the crop never reached is
/// `None`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StageBoundaries {
    pub emergence: Option<NaiveDate>,
    pub anthesis: Option<NaiveDate>,
    pub senescence: Option<NaiveDate>,
    pub harvest: Option<NaiveDate>,
}

impl StageBoundaries {
    pub fn from_stages(stages: &[PhenologyStageDate], senescence_fraction: f64) -> Self {
        let date_of = |stage: Stage| stages.iter().find(|s| s.stage == stage).map(|s| s.date);
        let anthesis = date_of(Stage::Anthesis);
        let senescence = match (anthesis, date_of(Stage::EndGrainFilling)) {
            (Some(start), Some(end)) => {
                let offset = ((end - start).num_days() as f64 * senescence_fraction).round() as i64;
                Some(start + chrono::Duration::days(offset))
            }
            _ => None,
        };
        StageBoundaries {
            emergence: date_of(Stage::Emergence),
            anthesis,
            senescence,
            harvest: date_of(Stage::Harvest),
        }
    }
}

/// Map a date to its FAO-56 stage. Each boundary date belongs to the stage
/// it opens; past the last boundary reached the last known stage holds.
pub fn growth_stage(date: NaiveDate, bounds: &StageBoundaries) -> FaoStage {
    let reached = |boundary: Option<NaiveDate>| boundary.is_some_and(|b| date >= b);
    if !reached(bounds.emergence) {
        FaoStage::Initial
    } else if !reached(bounds.anthesis) {
        FaoStage::Development
    } else if !reached(bounds.senescence) {
        FaoStage::Mid
    } else {
        FaoStage::Late
    }
}

// Fraction of the way from `start` to `end`; 0 when the end is unknown
fn progress(date: NaiveDate, start: Option<NaiveDate>, end: Option<NaiveDate>) -> f64 {
    match (start, end) {
        (Some(start), Some(end)) if end > start => {
            ((date - start).num_days() as f64 / (end - start).num_days() as f64).clamp(0.0, 1.0)
        }
        (Some(_), Some(_)) => 1.0,
        _ => 0.0,
    }
}

/// Basal crop coefficient for `date`: flat in the initial and mid stages,
/// linear ramps through development and late season.
pub fn basal_kc(date: NaiveDate, bounds: &StageBoundaries, params: &CropWaterParameters) -> (FaoStage, f64) {
    let stage = growth_stage(date, bounds);
    let kcb = match stage {
        FaoStage::Initial => params.kcb_ini,
        FaoStage::Development => {
            let f = progress(date, bounds.emergence, bounds.anthesis);
            params.kcb_ini + (params.kcb_mid - params.kcb_ini) * f
        }
        FaoStage::Mid => params.kcb_mid,
        FaoStage::Late => {
            let f = progress(date, bounds.senescence, bounds.harvest);
            params.kcb_mid + (params.kcb_end - params.kcb_mid) * f
        }
    };
    (stage, kcb)
}

/// FAO-56 eq. 70 correction of mid and late season Kcb for sub-humid
/// reference conditions. Values at or below 0.45 are left alone. Missing or
/// non-finite wind and humidity take the reference values.
pub fn adjust_kcb_for_climate(
    kcb: f64,
    wind_speed: Option<f64>,
    rh_min: Option<f64>,
    height_m: f64,
) -> f64 {
    if kcb <= 0.45 {
        return kcb;
    }
    let wind_speed = wind_speed
        .filter(|v| v.is_finite())
        .unwrap_or(DEFAULT_WIND_SPEED)
        .clamp(1.0, 6.0);
    let rh_min = rh_min
        .filter(|v| v.is_finite())
        .unwrap_or(DEFAULT_RH_MIN)
        .clamp(20.0, 80.0);
    let height = height_m.clamp(0.1, 10.0);
    kcb + (0.04 * (wind_speed - 2.0) - 0.004 * (rh_min - 45.0)) * (height / 3.0).powf(0.3)
}
