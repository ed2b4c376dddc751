use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::EngineError;
use crate::evaporation::SurfaceLayer;
use crate::growth_stage::{CropWaterParameters, FaoStage, StageBoundaries, adjust_kcb_for_climate, basal_kc};
use crate::reference_et::{EtMethod, reference_et};
use crate::root_uptake::{RootGrowth, readily_available_water, stress_coefficient};
use crate::runoff::{check_curve_number, daily_runoff};
use crate::soil::SoilProfileDerived;
use crate::weather::{Site, WeatherRecord};

// Slack allowed when checking the daily invariants [mm]
const TOLERANCE: f64 = 1e-9;

/// One simulated day of the root zone water balance. Water depths in mm.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DailyBalanceState {
    pub date: NaiveDate,
    pub growth_stage: FaoStage,
    pub days_in_stage: u32,
    pub root_depth_cm: f64,
    pub plant_height_m: f64,
    pub kcb: f64,
    pub ke: f64,
    pub kc_act: f64,
    pub et_ref: f64,
    pub etc: f64,
    pub rain: f64,
    pub runoff: f64,
    pub deep_percolation: f64,
    pub depletion: f64,
    pub taw: f64,
    pub raw: f64,
    pub ks: f64,
    pub evaporation_depletion: f64,
}

// Daily dual crop coefficient water balance of one root zone
pub struct WaterBalance<'a> {
    soil: &'a SoilProfileDerived,
    crop: &'a CropWaterParameters,
    site: Site,
    et_method: EtMethod,
    curve_number: Option<f64>,
    roots: RootGrowth,
    surface: SurfaceLayer,
    depletion: f64, // Dr [mm]
    taw: f64,       // TAW of the current root zone [mm]
    stage: Option<FaoStage>,
    days_in_stage: u32,
}

impl<'a> WaterBalance<'a> {
    pub fn new(
        soil: &'a SoilProfileDerived,
        crop: &'a CropWaterParameters,
        site: Site,
        et_method: EtMethod,
        curve_number: Option<f64>,
    ) -> Result<Self, EngineError> {
        crop.validate()?;
        let curve_number = curve_number.map(check_curve_number).transpose()?;
        let roots = RootGrowth::new(crop, soil.max_depth_cm);
        let taw = soil.available_water_to(roots.root_depth_cm);
        let dry = 1.0 - soil.initial_fraction;
        Ok(WaterBalance {
            soil,
            crop,
            site,
            et_method,
            curve_number,
            roots,
            surface: SurfaceLayer::new(
                soil.total_evaporable_water,
                soil.readily_evaporable_water,
                dry * soil.total_evaporable_water,
            ),
            depletion: dry * taw,
            taw,
            stage: None,
            days_in_stage: 0,
        })
    }

    pub fn depletion(&self) -> f64 {
        self.depletion
    }

    /// Advance the balance by one day. Returns the day's state and whether
    /// ETref had to fall back to the temperature method.
    pub fn advance(
        &mut self,
        record: &WeatherRecord,
        bounds: &StageBoundaries,
    ) -> Result<(DailyBalanceState, bool), EngineError> {
        let (stage, base_kcb) = basal_kc(record.date, bounds, self.crop);
        if self.stage == Some(stage) {
            self.days_in_stage += 1;
        } else {
            self.stage = Some(stage);
            self.days_in_stage = 1;
        }

        // Roots and canopy; soil newly reached by roots is at the initial wetness
        self.roots.grow(base_kcb, self.crop, self.soil.max_depth_cm);
        let taw = self.soil.available_water_to(self.roots.root_depth_cm);
        if taw > self.taw {
            self.depletion = (self.depletion + (1.0 - self.soil.initial_fraction) * (taw - self.taw)).min(taw);
            self.taw = taw;
        }
        let height = self.roots.height_m;
        let kcb = match stage {
            FaoStage::Mid | FaoStage::Late => {
                adjust_kcb_for_climate(base_kcb, record.wind_speed, record.rh_min, height)
            }
            FaoStage::Initial | FaoStage::Development => base_kcb,
        };

        let et = reference_et(record, &self.site, self.et_method);
        let et_ref = et.value;
        let surface = self.surface.coefficient(kcb, record.wind_speed, record.rh_min, height);

        // Stress
        let raw = readily_available_water(taw, self.crop.depletion_fraction, (kcb + surface.ke) * et_ref);
        let ks = stress_coefficient(self.depletion, taw, raw);
        let mut etc = (ks * kcb + surface.ke) * et_ref;

        // Rain in, crop water out; excess drains, extraction stops at TAW
        let runoff = self.curve_number.map_or(0.0, |cn| daily_runoff(record.precip, cn));
        let effective_rain = record.precip - runoff;
        let mut depletion = self.depletion - effective_rain + etc;
        let mut deep_percolation = 0.0;
        if depletion < 0.0 {
            deep_percolation = -depletion;
            depletion = 0.0;
        }
        if depletion > taw {
            etc = taw - (self.depletion - effective_rain);
            depletion = taw;
        }

        let evaporation = (surface.ke * et_ref).min(etc);
        self.surface.update(effective_rain, evaporation, surface.few);
        self.depletion = depletion;

        let state = DailyBalanceState {
            date: record.date,
            growth_stage: stage,
            days_in_stage: self.days_in_stage,
            root_depth_cm: self.roots.root_depth_cm,
            plant_height_m: height,
            kcb,
            ke: surface.ke,
            kc_act: if et_ref > 0.0 { etc / et_ref } else { ks * kcb + surface.ke },
            et_ref,
            etc,
            rain: record.precip,
            runoff,
            deep_percolation,
            depletion,
            taw,
            raw,
            ks,
            evaporation_depletion: self.surface.depletion,
        };
        check_invariants(&state)?;
        Ok((state, et.fell_back))
    }
}

fn check_invariants(state: &DailyBalanceState) -> Result<(), EngineError> {
    let fail = |detail: String| {
        Err(EngineError::InternalConsistency {
            date: state.date,
            detail,
        })
    };
    if !(state.depletion >= -TOLERANCE && state.depletion <= state.taw + TOLERANCE) {
        return fail(format!("Dr {} outside [0, TAW {}]", state.depletion, state.taw));
    }
    if !(0.0..=1.0).contains(&state.ks) {
        return fail(format!("Ks {} outside [0, 1]", state.ks));
    }
    if !(state.etc >= -TOLERANCE) {
        return fail(format!("ETc {} is negative", state.etc));
    }
    Ok(())
}

/// The daily series of one run plus the days ETref fell back to Hargreaves.
#[derive(Clone, Debug, PartialEq)]
pub struct BalanceRun {
    pub days: Vec<DailyBalanceState>,
    pub et_fallback_days: Vec<NaiveDate>,
}

/// Run the water balance over every record in `weather`.
pub fn run_water_balance(
    soil: &SoilProfileDerived,
    crop: &CropWaterParameters,
    site: Site,
    et_method: EtMethod,
    curve_number: Option<f64>,
    weather: &[WeatherRecord],
    bounds: &StageBoundaries,
) -> Result<BalanceRun, EngineError> {
    let mut balance = WaterBalance::new(soil, crop, site, et_method, curve_number)?;
    let mut days = Vec::with_capacity(weather.len());
    let mut et_fallback_days = Vec::new();
    for record in weather {
        let (state, fell_back) = balance.advance(record, bounds)?;
        if fell_back {
            warn!(date = %record.date, "Penman-Monteith inputs missing, using Hargreaves");
            et_fallback_days.push(record.date);
        }
        days.push(state);
    }
    if let Some(last) = days.last() {
        debug!(days = days.len(), final_depletion = last.depletion, "Water balance finished");
    }
    Ok(BalanceRun {
        days,
        et_fallback_days,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::soil::{SoilLayer, SoilProfile};
    use approx::assert_abs_diff_eq;
    use chrono::Days;

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2022, 4, 1).unwrap()
    }

    fn soil(initial_fraction: f64) -> SoilProfileDerived {
        SoilProfile::new(
            "Silt loam",
            "B",
            vec![
                SoilLayer::new(0.0, 30.0, 0.30, 0.12, 0.46),
                SoilLayer::new(30.0, 150.0, 0.28, 0.13, 0.44),
            ],
        )
        .derive(150.0, initial_fraction)
        .unwrap()
    }

    fn crop() -> CropWaterParameters {
        CropWaterParameters {
            kcb_ini: 0.15,
            kcb_mid: 1.10,
            kcb_end: 0.25,
            min_root_depth_cm: 20.0,
            max_root_depth_cm: 120.0,
            max_height_m: 1.0,
            depletion_fraction: 0.55,
            senescence_fraction: 0.5,
        }
    }

    fn bounds() -> StageBoundaries {
        StageBoundaries {
            emergence: Some(start() + Days::new(7)),
            anthesis: Some(start() + Days::new(50)),
            senescence: Some(start() + Days::new(70)),
            harvest: Some(start() + Days::new(90)),
        }
    }

    fn weather(days: u64, tmin: f64, tmax: f64, rain: impl Fn(u64) -> f64) -> Vec<WeatherRecord> {
        (0..days)
            .map(|i| WeatherRecord::new(start() + Days::new(i), tmin, tmax, rain(i)))
            .collect()
    }

    fn site() -> Site {
        Site::new(40.0, 200.0)
    }

    fn run(soil: &SoilProfileDerived, weather: &[WeatherRecord]) -> BalanceRun {
        run_water_balance(soil, &crop(), site(), EtMethod::Hargreaves, None, weather, &bounds()).unwrap()
    }

    #[test]
    fn invariants_hold_every_day() {
        let soil = soil(0.5);
        let weather = weather(91, 8.0, 27.0, |i| if i % 9 == 0 { 35.0 } else { 0.0 });
        let result = run(&soil, &weather);
        assert_eq!(result.days.len(), 91);
        for day in &result.days {
            assert!(day.depletion >= 0.0 && day.depletion <= day.taw);
            assert!((0.0..=1.0).contains(&day.ks));
            assert!(day.etc >= 0.0);
            assert!(day.raw <= day.taw);
        }
    }

    #[test]
    fn depletion_grows_without_rain() {
        let soil = soil(0.9);
        let weather = weather(91, 10.0, 30.0, |_| 0.0);
        let result = run(&soil, &weather);
        assert!(result.days[0].etc > 0.0);
        for pair in result.days.windows(2) {
            assert!(pair[1].depletion >= pair[0].depletion);
        }
        let last = result.days.last().unwrap();
        assert!(last.ks < 1.0);
    }

    #[test]
    fn full_profile_without_demand_stays_full() {
        let soil = soil(1.0);
        // no temperature range: Hargreaves ETref is zero
        let weather = weather(91, 15.0, 15.0, |_| 0.0);
        let result = run(&soil, &weather);
        for day in &result.days {
            assert_eq!(day.et_ref, 0.0);
            assert_eq!(day.depletion, 0.0);
            assert_eq!(day.ks, 1.0);
        }
    }

    #[test]
    fn heavy_rain_drains_below_root_zone() {
        let soil = soil(0.8);
        let weather = weather(3, 10.0, 20.0, |i| if i == 1 { 120.0 } else { 0.0 });
        let result = run(&soil, &weather);
        let wet = &result.days[1];
        assert_eq!(wet.depletion, 0.0);
        let before = result.days[0].depletion;
        assert_abs_diff_eq!(wet.deep_percolation, 120.0 - before - wet.etc, epsilon = 1e-9);
    }

    #[test]
    fn runoff_reduces_infiltration() {
        let soil = soil(0.2);
        let weather = weather(3, 10.0, 20.0, |i| if i == 1 { 60.0 } else { 0.0 });
        let with_runoff =
            run_water_balance(&soil, &crop(), site(), EtMethod::Hargreaves, Some(85.0), &weather, &bounds())
                .unwrap();
        let without = run(&soil, &weather);
        let (wet, dry) = (&with_runoff.days[1], &without.days[1]);
        assert!(wet.runoff > 0.0);
        assert_eq!(dry.runoff, 0.0);
        // both profiles refill; the water lost to runoff no longer drains
        assert_eq!(wet.depletion, 0.0);
        assert_eq!(dry.depletion, 0.0);
        assert_abs_diff_eq!(dry.deep_percolation - wet.deep_percolation, wet.runoff, epsilon = 1e-9);
    }

    #[test]
    fn depletion_tracks_daily_state() {
        let soil = soil(0.6);
        let crop = crop();
        let mut balance = WaterBalance::new(&soil, &crop, site(), EtMethod::Hargreaves, None).unwrap();
        assert_abs_diff_eq!(balance.depletion(), 0.4 * soil.available_water_to(20.0), epsilon = 1e-9);
        for record in weather(10, 6.0, 26.0, |_| 0.0).iter() {
            let (state, fell_back) = balance.advance(record, &bounds()).unwrap();
            assert!(!fell_back);
            assert_eq!(balance.depletion(), state.depletion);
        }
    }

    #[test]
    fn non_finite_wind_falls_back_instead_of_failing() {
        let soil = soil(0.5);
        let weather: Vec<WeatherRecord> = weather(60, 8.0, 24.0, |_| 0.0)
            .into_iter()
            .map(|record| {
                let mut record = record.with_radiation(20.0, 2.0, 80.0, 40.0);
                record.wind_speed = Some(f64::NAN);
                record
            })
            .collect();
        let result =
            run_water_balance(&soil, &crop(), site(), EtMethod::PenmanMonteith, None, &weather, &bounds())
                .unwrap();
        assert_eq!(result.et_fallback_days.len(), 60);
        let mid = &result.days[55];
        assert_eq!(mid.growth_stage, FaoStage::Mid);
        assert!(mid.kcb.is_finite() && mid.etc.is_finite() && mid.depletion.is_finite());
    }

    #[test]
    fn stages_follow_boundaries() {
        let soil = soil(0.5);
        let weather = weather(91, 8.0, 24.0, |_| 2.0);
        let result = run(&soil, &weather);
        assert_eq!(result.days[6].growth_stage, FaoStage::Initial);
        assert_eq!(result.days[7].growth_stage, FaoStage::Development);
        assert_eq!(result.days[7].days_in_stage, 1);
        assert_eq!(result.days[49].days_in_stage, 43);
        assert_eq!(result.days[50].growth_stage, FaoStage::Mid);
        assert_eq!(result.days[70].growth_stage, FaoStage::Late);
        for pair in result.days.windows(2) {
            assert!(pair[1].root_depth_cm >= pair[0].root_depth_cm);
            assert!(pair[1].plant_height_m >= pair[0].plant_height_m);
        }
        assert_abs_diff_eq!(result.days[60].root_depth_cm, 120.0, epsilon = 1e-9);
    }

    #[test]
    fn missing_radiation_is_reported() {
        let soil = soil(0.5);
        let mut weather = weather(5, 8.0, 24.0, |_| 0.0);
        for record in weather.iter_mut().skip(2) {
            *record = record.clone().with_radiation(20.0, 2.0, 80.0, 40.0);
        }
        let result =
            run_water_balance(&soil, &crop(), site(), EtMethod::PenmanMonteith, None, &weather, &bounds()).unwrap();
        assert_eq!(result.et_fallback_days, vec![start(), start() + Days::new(1)]);
    }

    #[test]
    fn non_finite_state_is_an_internal_failure() {
        let state = DailyBalanceState {
            date: start(),
            growth_stage: FaoStage::Initial,
            days_in_stage: 1,
            root_depth_cm: 20.0,
            plant_height_m: 0.0,
            kcb: 0.15,
            ke: 0.5,
            kc_act: 0.65,
            et_ref: 4.0,
            etc: 2.6,
            rain: 0.0,
            runoff: 0.0,
            deep_percolation: 0.0,
            depletion: f64::NAN,
            taw: 36.0,
            raw: 19.8,
            ks: 1.0,
            evaporation_depletion: 3.0,
        };
        assert!(matches!(
            check_invariants(&state),
            Err(EngineError::InternalConsistency { .. })
        ));
    }
}
