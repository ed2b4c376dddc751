// Root zone water uptake: how much of the crop's transpiration demand the
// root zone can meet, and how deep the roots reach.
use crate::growth_stage::CropWaterParameters;

// FAO-56 bounds on the ET-adjusted depletion fraction
const P_MIN: f64 = 0.1;
const P_MAX: f64 = 0.8;

// Depletion fraction p corrected for evaporative demand (FAO-56 Table 22
// footnote): droughtier when ETc is high, more tolerant when it is low.
pub fn adjusted_depletion_fraction(p_table: f64, etc: f64) -> f64 {
    (p_table + 0.04 * (5.0 - etc)).clamp(P_MIN, P_MAX)
}

// Readily available water [mm]
pub fn readily_available_water(taw: f64, p_table: f64, etc: f64) -> f64 {
    adjusted_depletion_fraction(p_table, etc) * taw
}

/// Water stress coefficient Ks (FAO-56 eq. 84).
///
/// Water is freely available while depletion stays within RAW; beyond it the
/// uptake falls linearly to zero at TAW.
pub fn stress_coefficient(dr: f64, taw: f64, raw: f64) -> f64 {
    if dr <= raw {
        1.0
    } else if taw - raw <= 0.0 {
        0.0
    } else {
        ((taw - dr) / (taw - raw)).clamp(0.0, 1.0)
    }
}

// Root depth and plant height follow canopy development, measured as the
// share of the Kcb rise from initial to mid season that has happened.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RootGrowth {
    pub root_depth_cm: f64,
    pub height_m: f64,
}

impl RootGrowth {
    pub fn new(params: &CropWaterParameters, max_soil_depth_cm: f64) -> Self {
        RootGrowth {
            root_depth_cm: params.min_root_depth_cm.min(max_soil_depth_cm),
            height_m: 0.0,
        }
    }

    // Grow towards the targets for today's Kcb; never shrinks
    pub fn grow(&mut self, kcb: f64, params: &CropWaterParameters, max_soil_depth_cm: f64) {
        let span = params.kcb_mid - params.kcb_ini;
        let development = if span > 0.0 {
            ((kcb - params.kcb_ini) / span).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let max_root = params.max_root_depth_cm.min(max_soil_depth_cm);
        let root_range = params.max_root_depth_cm - params.min_root_depth_cm;
        let target_root = params.min_root_depth_cm + root_range * development;
        self.root_depth_cm = self.root_depth_cm.max(target_root.min(max_root));
        self.height_m = self.height_m.max(params.max_height_m * development);
    }
}
