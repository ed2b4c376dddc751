//! One crop/soil/station/realization combination, run end to end.
//!
//! A [`SimulationUnit`] owns or shares only immutable inputs, so any number
//! of units can run at once. Everything a run needs is passed in; the only
//! run-wide value is the [`RunContext`] used to label log output.

use std::fmt;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, info_span};

use crate::error::EngineError;
use crate::growth_stage::{CropWaterParameters, StageBoundaries};
use crate::phenology::{CropModel, PhenologyModel, PhenologyResult, run_phenology};
use crate::reference_et::EtMethod;
use crate::runoff::{check_curve_number, curve_number};
use crate::soil::{SoilProfile, SoilProfileDerived};
use crate::water_balance::{DailyBalanceState, run_water_balance};
use crate::weather::{Site, WeatherSeries};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitId {
    pub crop: String,
    pub soil: String,
    pub station: String,
    pub realization: u32,
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}/r{}", self.crop, self.soil, self.station, self.realization)
    }
}

/// Planting scenario and run bounds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub planting_date: NaiveDate,
    /// Starting water content as a fraction of field capacity.
    pub initial_fraction: f64,
    /// Start the balance this early when it precedes planting.
    pub pre_season_start: Option<NaiveDate>,
    /// Last day to simulate if harvest has not come before.
    pub end_bound: Option<NaiveDate>,
    pub et_method: EtMethod,
    pub depth_cap_cm: f64,
    /// Explicit curve number, takes precedence over `land_use`.
    pub curve_number: Option<f64>,
    /// Land use for the curve number lookup against the soil's hydrologic group.
    pub land_use: Option<String>,
}

impl Scenario {
    fn resolve_curve_number(&self, soil: &SoilProfile) -> Result<Option<f64>, EngineError> {
        match (self.curve_number, &self.land_use) {
            (Some(cn), _) => check_curve_number(cn).map(Some),
            (None, Some(land_use)) => curve_number(&soil.hydro_group, land_use).map(Some),
            (None, None) => Ok(None),
        }
    }
}

/// Labels every unit of one run in the logs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunContext {
    pub run_id: String,
}

impl RunContext {
    pub fn new(run_id: impl Into<String>) -> Self {
        RunContext { run_id: run_id.into() }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum UnitStatus {
    /// Harvest was reached and the balance runs to harvest day.
    Complete,
    /// The weather ran out before harvest; results stop at its last day.
    Partial,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct UnitResult {
    pub id: UnitId,
    pub status: UnitStatus,
    pub soil: SoilProfileDerived,
    pub phenology: PhenologyResult,
    pub balance: Vec<DailyBalanceState>,
    pub et_fallback_days: Vec<NaiveDate>,
}

#[derive(Clone, Debug)]
pub struct SimulationUnit {
    pub id: UnitId,
    pub site: Site,
    pub weather: Arc<WeatherSeries>,
    pub soil: Arc<SoilProfile>,
    pub crop: CropModel,
    pub water: CropWaterParameters,
    pub scenario: Scenario,
}

impl SimulationUnit {
    /// Phenology first, then the water balance over the same window cut at
    /// harvest.
    pub fn run(&self, ctx: &RunContext) -> Result<UnitResult, EngineError> {
        let span = info_span!("unit", run = %ctx.run_id, unit = %self.id);
        let _enter = span.enter();

        let scenario = &self.scenario;
        self.crop.validate()?;
        self.water.validate()?;
        let soil = self.soil.derive(scenario.depth_cap_cm, scenario.initial_fraction)?;
        let curve_number = scenario.resolve_curve_number(&self.soil)?;

        let planting = scenario.planting_date;
        let start = scenario.pre_season_start.map_or(planting, |date| date.min(planting));
        let last = self.weather.last_date();
        let end = scenario.end_bound.map_or(last, |date| date.min(last));
        let window = self.weather.window(start, end)?;

        let phenology = run_phenology(&self.crop, window, &self.site, planting)?;
        let bounds = StageBoundaries::from_stages(&phenology.stages, self.water.senescence_fraction);
        let balance_window = match bounds.harvest {
            Some(harvest) => &window[..=(harvest - start).num_days() as usize],
            None => window,
        };
        let balance = run_water_balance(
            &soil,
            &self.water,
            self.site,
            scenario.et_method,
            curve_number,
            balance_window,
            &bounds,
        )?;

        let status = if phenology.complete {
            UnitStatus::Complete
        } else {
            UnitStatus::Partial
        };
        info!(
            ?status,
            stages = phenology.stages.len(),
            days = balance.days.len(),
            et_fallbacks = balance.et_fallback_days.len(),
            "Unit finished"
        );

        Ok(UnitResult {
            id: self.id.clone(),
            status,
            soil,
            phenology,
            balance: balance.days,
            et_fallback_days: balance.et_fallback_days,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phenology::{Stage, WheatCultivar};
    use crate::soil::SoilLayer;
    use crate::weather::WeatherRecord;
    use chrono::Days;

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 3, 1).unwrap()
    }

    fn unit(days: u64) -> SimulationUnit {
        let records = (0..days)
            .map(|i| WeatherRecord::new(start() + Days::new(i), 8.0, 22.0, if i % 10 == 3 { 12.0 } else { 0.0 }))
            .collect();
        SimulationUnit {
            id: UnitId {
                crop: "wheat".to_string(),
                soil: "loam".to_string(),
                station: "STN1".to_string(),
                realization: 3,
            },
            site: Site::new(-33.9, 150.0),
            weather: Arc::new(WeatherSeries::new(records).unwrap()),
            soil: Arc::new(SoilProfile::new(
                "loam",
                "B",
                vec![
                    SoilLayer::new(0.0, 25.0, 0.28, 0.12, 0.44),
                    SoilLayer::new(25.0, 150.0, 0.30, 0.15, 0.45),
                ],
            )),
            crop: CropModel::Wheat(WheatCultivar {
                name: "Test".to_string(),
                base_temp: 0.0,
                optimum_temp: 26.0,
                ceiling_temp: 34.0,
                emergence_tt: 100.0,
                juvenile_tt: 300.0,
                anthesis_tt: 500.0,
                grain_filling_tt: 600.0,
                harvest_tt: 50.0,
                vernalization_days: 0.0,
                vernalization_sensitivity: 0.0,
                min_vernalization_factor: 0.0,
                photoperiod_sensitivity: 0.0,
            }),
            water: CropWaterParameters {
                kcb_ini: 0.15,
                kcb_mid: 1.10,
                kcb_end: 0.25,
                min_root_depth_cm: 10.0,
                max_root_depth_cm: 120.0,
                max_height_m: 1.0,
                depletion_fraction: 0.55,
                senescence_fraction: 0.5,
            },
            scenario: Scenario {
                planting_date: start() + Days::new(15),
                initial_fraction: 0.5,
                pre_season_start: Some(start() + Days::new(5)),
                end_bound: None,
                et_method: EtMethod::Hargreaves,
                depth_cap_cm: 150.0,
                curve_number: None,
                land_use: Some("small grain good".to_string()),
            },
        }
    }

    #[test]
    fn complete_run_ends_at_harvest() {
        let result = unit(200).run(&RunContext::new("test")).unwrap();
        assert_eq!(result.status, UnitStatus::Complete);
        let harvest = result.phenology.date_of(Stage::Harvest).unwrap();
        assert_eq!(result.balance.first().unwrap().date, start() + Days::new(5));
        assert_eq!(result.balance.last().unwrap().date, harvest);
        assert_eq!(result.id.to_string(), "wheat/loam/STN1/r3");
    }

    #[test]
    fn short_weather_gives_partial_result() {
        let result = unit(60).run(&RunContext::new("test")).unwrap();
        assert_eq!(result.status, UnitStatus::Partial);
        assert!(!result.phenology.complete);
        assert_eq!(result.balance.last().unwrap().date, start() + Days::new(59));
    }

    #[test]
    fn end_bound_truncates() {
        let mut u = unit(200);
        u.scenario.end_bound = Some(start() + Days::new(40));
        let result = u.run(&RunContext::new("test")).unwrap();
        assert_eq!(result.status, UnitStatus::Partial);
        assert_eq!(result.balance.len(), 36);
    }

    #[test]
    fn configuration_errors_fail_the_unit() {
        let mut u = unit(200);
        u.scenario.initial_fraction = 1.5;
        assert!(matches!(
            u.run(&RunContext::new("test")),
            Err(EngineError::InvalidInitialFraction(_))
        ));

        let mut u = unit(200);
        u.scenario.land_use = Some("vineyard".to_string());
        assert!(u.run(&RunContext::new("test")).is_err());

        for cn in [0.0, 120.0, f64::NAN] {
            let mut u = unit(200);
            u.scenario.curve_number = Some(cn);
            let err = u.run(&RunContext::new("test")).unwrap_err();
            assert!(matches!(err, EngineError::InvalidCurveNumber(_)));
            assert_eq!(err.kind(), crate::error::ErrorKind::Configuration);
        }

        let mut u = unit(200);
        u.scenario.pre_season_start = Some(start() - Days::new(10));
        assert!(matches!(
            u.run(&RunContext::new("test")),
            Err(EngineError::DateOutsideWeather { .. })
        ));
    }
}
