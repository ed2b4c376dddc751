//! Crop phenology and FAO-56 dual crop coefficient water balance.
//!
//! A [`SimulationUnit`] runs wheat development from planting to harvest on
//! daily weather, maps the phenology dates onto FAO-56 growth stages and
//! then steps the root-zone water balance day by day. Independent units are
//! fanned out over threads with [`WorkerPool`].

pub mod batch;
pub mod config;
pub mod error;
pub mod evaporation;
pub mod growth_stage;
pub mod phenology;
pub mod reference_et;
pub mod root_uptake;
pub mod runoff;
pub mod simulation;
pub mod soil;
pub mod water_balance;
pub mod weather;

pub use batch::{BatchSummary, UnitReport, WorkerPool};
pub use config::{CropLibrary, RunSettings};
pub use error::{EngineError, ErrorKind};
pub use growth_stage::{CropWaterParameters, FaoStage, StageBoundaries};
pub use phenology::{
    CropModel, PhenologyModel, PhenologyResult, PhenologyStageDate, Stage, WheatCultivar, run_phenology,
};
pub use reference_et::EtMethod;
pub use simulation::{RunContext, Scenario, SimulationUnit, UnitId, UnitResult, UnitStatus};
pub use soil::{SoilLayer, SoilProfile, SoilProfileDerived};
pub use water_balance::{DailyBalanceState, WaterBalance, run_water_balance};
pub use weather::{Site, WeatherRecord, WeatherSeries};
