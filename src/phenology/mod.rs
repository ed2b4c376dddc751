//! Crop development state machine.
//!
//! A [`PhenologyModel`] turns one day of weather into thermal time for the
//! phase the crop is in and says how much thermal time each phase needs.
//! [`run_phenology`] walks the weather day by day and records the date of
//! every stage transition. The state machine knows nothing about wheat; the
//! wheat-specific temperature, vernalization and photoperiod responses live
//! in [`wheat`].

pub mod wheat;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::EngineError;
use crate::weather::{Site, WeatherRecord};

pub use wheat::WheatCultivar;

/// Development states in the only order they can be visited.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PhenologyState {
    NotSown,
    Sown,
    Emerged,
    EndJuvenile,
    Anthesis,
    EndGrainFilling,
    Harvest,
}

impl PhenologyState {
    pub fn next(self) -> Option<PhenologyState> {
        use PhenologyState::*;
        match self {
            NotSown => Some(Sown),
            Sown => Some(Emerged),
            Emerged => Some(EndJuvenile),
            EndJuvenile => Some(Anthesis),
            Anthesis => Some(EndGrainFilling),
            EndGrainFilling => Some(Harvest),
            Harvest => None,
        }
    }

    /// The stage whose date marks entry into this state.
    pub fn entry_stage(self) -> Option<Stage> {
        match self {
            PhenologyState::NotSown => None,
            PhenologyState::Sown => Some(Stage::Sowing),
            PhenologyState::Emerged => Some(Stage::Emergence),
            PhenologyState::EndJuvenile => Some(Stage::EndJuvenile),
            PhenologyState::Anthesis => Some(Stage::Anthesis),
            PhenologyState::EndGrainFilling => Some(Stage::EndGrainFilling),
            PhenologyState::Harvest => Some(Stage::Harvest),
        }
    }
}

/// Reported developmental stages.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Stage {
    Sowing,
    Emergence,
    EndJuvenile,
    Anthesis,
    /// Physiological maturity.
    EndGrainFilling,
    Harvest,
}

impl Stage {
    pub fn label(self) -> &'static str {
        match self {
            Stage::Sowing => "Sowing",
            Stage::Emergence => "Emergence",
            Stage::EndJuvenile => "EndJuvenile",
            Stage::Anthesis => "Anthesis",
            Stage::EndGrainFilling => "EndGrainFilling",
            Stage::Harvest => "Harvest",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PhenologyStageDate {
    pub stage: Stage,
    pub date: NaiveDate,
    pub day_of_year: u32,
    pub days_after_planting: i64,
}

impl PhenologyStageDate {
    fn new(stage: Stage, date: NaiveDate, planting: NaiveDate) -> Self {
        PhenologyStageDate {
            stage,
            date,
            day_of_year: date.ordinal(),
            days_after_planting: (date - planting).num_days(),
        }
    }
}

/// Running totals a model keeps between days of one run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DevelopmentMemory {
    pub vernalization_days: f64,
}

/// One day of development as computed by a model.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DailyDevelopment {
    /// Effective thermal time, already scaled by `factor`.
    pub thermal_time: f64,
    /// Combined vernalization and photoperiod scaling, 1 when not applied.
    pub factor: f64,
}

impl DailyDevelopment {
    pub const NONE: DailyDevelopment = DailyDevelopment {
        thermal_time: 0.0,
        factor: 1.0,
    };
}

/// Development rules of one crop.
pub trait PhenologyModel {
    fn crop(&self) -> &str;

    fn cultivar(&self) -> &str;

    fn validate(&self) -> Result<(), EngineError>;

    /// Thermal time needed to leave `state`, or `None` for states that are
    /// not left by thermal time.
    fn threshold(&self, state: PhenologyState) -> Option<f64>;

    fn develop(
        &self,
        state: PhenologyState,
        record: &WeatherRecord,
        site: &Site,
        memory: &mut DevelopmentMemory,
    ) -> DailyDevelopment;
}

/// The phenology variants this engine can run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "crop", rename_all = "snake_case")]
pub enum CropModel {
    Wheat(WheatCultivar),
}

impl PhenologyModel for CropModel {
    fn crop(&self) -> &str {
        match self {
            CropModel::Wheat(cultivar) => cultivar.crop(),
        }
    }

    fn cultivar(&self) -> &str {
        match self {
            CropModel::Wheat(cultivar) => PhenologyModel::cultivar(cultivar),
        }
    }

    fn validate(&self) -> Result<(), EngineError> {
        match self {
            CropModel::Wheat(cultivar) => cultivar.validate(),
        }
    }

    fn threshold(&self, state: PhenologyState) -> Option<f64> {
        match self {
            CropModel::Wheat(cultivar) => cultivar.threshold(state),
        }
    }

    fn develop(
        &self,
        state: PhenologyState,
        record: &WeatherRecord,
        site: &Site,
        memory: &mut DevelopmentMemory,
    ) -> DailyDevelopment {
        match self {
            CropModel::Wheat(cultivar) => cultivar.develop(state, record, site, memory),
        }
    }
}

/// End-of-day development log.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PhenologyDay {
    pub date: NaiveDate,
    pub state: PhenologyState,
    pub thermal_time: f64,
    pub phase_thermal_time: f64,
    pub total_thermal_time: f64,
    pub vernalization_days: f64,
    pub development_factor: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PhenologyResult {
    pub crop: String,
    pub cultivar: String,
    pub stages: Vec<PhenologyStageDate>,
    /// Harvest was reached inside the weather window.
    pub complete: bool,
    pub final_state: PhenologyState,
    pub daily: Vec<PhenologyDay>,
}

impl PhenologyResult {
    pub fn date_of(&self, stage: Stage) -> Option<NaiveDate> {
        self.stages.iter().find(|s| s.stage == stage).map(|s| s.date)
    }
}

/// Run the stage state machine over `weather`, sowing on `planting`.
///
/// Sowing is triggered by date and consumes no thermal time, so the sowing
/// day's thermal time already counts towards emergence. A phase ends on the
/// first day its accumulated thermal time reaches the threshold; the next
/// phase starts from zero the following day and any overshoot is dropped.
pub fn run_phenology<M: PhenologyModel + ?Sized>(
    model: &M,
    weather: &[WeatherRecord],
    site: &Site,
    planting: NaiveDate,
) -> Result<PhenologyResult, EngineError> {
    model.validate()?;
    let (Some(first), Some(last)) = (weather.first(), weather.last()) else {
        return Err(EngineError::InvalidWeather {
            date: planting,
            reason: "no weather for phenology".to_string(),
        });
    };
    if planting < first.date || planting > last.date {
        return Err(EngineError::DateOutsideWeather {
            date: planting,
            first: first.date,
            last: last.date,
        });
    }

    let mut state = PhenologyState::NotSown;
    let mut memory = DevelopmentMemory::default();
    let mut phase_tt = 0.0;
    let mut total_tt = 0.0;
    let mut stages = Vec::new();
    let mut daily = Vec::new();

    for record in weather {
        if state == PhenologyState::Harvest {
            break;
        }
        if state == PhenologyState::NotSown {
            if record.date < planting {
                continue;
            }
            state = PhenologyState::Sown;
            stages.push(PhenologyStageDate::new(Stage::Sowing, record.date, planting));
        }

        let development = model.develop(state, record, site, &mut memory);
        phase_tt += development.thermal_time;
        total_tt += development.thermal_time;

        if let Some(threshold) = model.threshold(state) {
            if phase_tt >= threshold {
                if let Some(next) = state.next() {
                    state = next;
                    phase_tt = 0.0;
                    if let Some(stage) = next.entry_stage() {
                        debug!(stage = stage.label(), date = %record.date, "Stage reached");
                        stages.push(PhenologyStageDate::new(stage, record.date, planting));
                    }
                }
            }
        }

        daily.push(PhenologyDay {
            date: record.date,
            state,
            thermal_time: development.thermal_time,
            phase_thermal_time: phase_tt,
            total_thermal_time: total_tt,
            vernalization_days: memory.vernalization_days,
            development_factor: development.factor,
        });
    }

    Ok(PhenologyResult {
        crop: model.crop().to_string(),
        cultivar: model.cultivar().to_string(),
        stages,
        complete: state == PhenologyState::Harvest,
        final_state: state,
        daily,
    })
}
