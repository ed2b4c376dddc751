// Soil surface evaporation: the Ke half of the dual crop coefficient.
//
// The top soil layer dries in two stages. While its depletion De is within
// REW evaporation runs at the energy-limited rate; past REW it is reduced by
// Kr until the layer reaches TEW and evaporation stops.
use crate::growth_stage::adjust_kcb_for_climate;

// Kc of bare or sparse canopy with no surface water (FAO-56 Kc_min)
const KC_MIN: f64 = 0.15;
// Exposed and wetted fraction never drops below this (FAO-56 eq. 75)
const MAX_CANOPY_COVER: f64 = 0.99;

/// Upper bound on Kc after rain (FAO-56 eq. 72).
pub fn kc_max(kcb: f64, wind_speed: Option<f64>, rh_min: Option<f64>, height_m: f64) -> f64 {
    adjust_kcb_for_climate(1.2, wind_speed, rh_min, height_m).max(kcb + 0.05)
}

/// Effective canopy cover fc (FAO-56 eq. 76).
pub fn canopy_cover(kcb: f64, kc_max: f64, height_m: f64) -> f64 {
    if kcb <= KC_MIN || kc_max <= KC_MIN {
        return 0.0;
    }
    ((kcb - KC_MIN) / (kc_max - KC_MIN))
        .clamp(0.0, 1.0)
        .powf(1.0 + 0.5 * height_m)
        .min(MAX_CANOPY_COVER)
}

/// Evaporation reduction coefficient Kr (FAO-56 eq. 74).
pub fn evaporation_reduction(de: f64, tew: f64, rew: f64) -> f64 {
    if de <= rew {
        1.0
    } else if tew <= rew {
        0.0
    } else {
        ((tew - de) / (tew - rew)).clamp(0.0, 1.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfaceEvaporation {
    pub ke: f64,
    pub kc_max: f64,
    pub few: f64, // Exposed and wetted soil fraction
    pub kr: f64,
}

// Surface evaporation layer of one simulation, depths in mm
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfaceLayer {
    pub tew: f64,
    pub rew: f64,
    pub depletion: f64, // De
}

impl SurfaceLayer {
    pub fn new(tew: f64, rew: f64, depletion: f64) -> Self {
        SurfaceLayer {
            tew,
            rew,
            depletion: depletion.clamp(0.0, tew),
        }
    }

    /// Ke for today's canopy (FAO-56 eq. 71), from yesterday's De.
    pub fn coefficient(
        &self,
        kcb: f64,
        wind_speed: Option<f64>,
        rh_min: Option<f64>,
        height_m: f64,
    ) -> SurfaceEvaporation {
        let kc_max = kc_max(kcb, wind_speed, rh_min, height_m);
        let few = 1.0 - canopy_cover(kcb, kc_max, height_m);
        let kr = evaporation_reduction(self.depletion, self.tew, self.rew);
        let ke = (kr * (kc_max - kcb)).min(few * kc_max).max(0.0);
        SurfaceEvaporation { ke, kc_max, few, kr }
    }

    // Update De with effective rain and the day's evaporation (FAO-56 eq. 77);
    // water beyond field capacity drains to the layer below.
    pub fn update(&mut self, effective_rain: f64, evaporation: f64, few: f64) {
        let from_exposed = if few > 0.0 { evaporation / few } else { 0.0 };
        self.depletion = (self.depletion - effective_rain + from_exposed).clamp(0.0, self.tew);
    }
}
