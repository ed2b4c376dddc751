//! Crop parameter library and run settings.
//!
//! Parameters live in one TOML file:
//!
//! ```toml
//! [settings]
//! et_method = "penman_monteith"
//! depth_cap_cm = 150.0
//! workers = 4
//! pre_season_days = 30
//!
//! [[cultivars]]
//! crop = "wheat"
//! name = "Kariega"
//! base_temp = 0.0
//! # ...
//!
//! [water.wheat]
//! kcb_ini = 0.15
//! # ...
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::{Days, NaiveDate};
use serde::Deserialize;
use tracing::info;

use crate::error::EngineError;
use crate::growth_stage::CropWaterParameters;
use crate::phenology::{CropModel, PhenologyModel};
use crate::reference_et::EtMethod;
use crate::simulation::Scenario;

fn default_depth_cap() -> f64 {
    150.0
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct RunSettings {
    #[serde(default)]
    pub et_method: EtMethod,
    /// Deepest soil the roots may use [cm].
    #[serde(default = "default_depth_cap")]
    pub depth_cap_cm: f64,
    /// Worker threads for batch runs, 0 for one per core.
    #[serde(default)]
    pub workers: usize,
    /// Days of bare-soil balance simulated before planting.
    #[serde(default)]
    pub pre_season_days: u32,
}

impl Default for RunSettings {
    fn default() -> Self {
        RunSettings {
            et_method: EtMethod::default(),
            depth_cap_cm: default_depth_cap(),
            workers: 0,
            pre_season_days: 0,
        }
    }
}

impl RunSettings {
    /// Scenario for one planting date and initial condition under these
    /// settings.
    pub fn scenario(&self, planting_date: NaiveDate, initial_fraction: f64) -> Scenario {
        let pre_season_start = match self.pre_season_days {
            0 => None,
            days => planting_date.checked_sub_days(Days::new(u64::from(days))),
        };
        Scenario {
            planting_date,
            initial_fraction,
            pre_season_start,
            end_bound: None,
            et_method: self.et_method,
            depth_cap_cm: self.depth_cap_cm,
            curve_number: None,
            land_use: None,
        }
    }
}

/// Cultivars and crop water parameters, validated on load.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct CropLibrary {
    #[serde(default)]
    pub settings: RunSettings,
    #[serde(default)]
    cultivars: Vec<CropModel>,
    #[serde(default)]
    water: BTreeMap<String, CropWaterParameters>,
}

impl CropLibrary {
    pub fn from_toml_str(toml_str: &str) -> Result<Self, EngineError> {
        let library: CropLibrary = toml::from_str(toml_str)?;
        for cultivar in &library.cultivars {
            cultivar.validate()?;
        }
        for params in library.water.values() {
            params.validate()?;
        }
        Ok(library)
    }

    pub fn from_file(path: &Path) -> Result<Self, EngineError> {
        let toml_str = fs::read_to_string(path)?;
        let library = Self::from_toml_str(&toml_str)?;
        info!(
            path = %path.display(),
            cultivars = library.cultivars.len(),
            crops = library.water.len(),
            "Loaded crop parameters"
        );
        Ok(library)
    }

    /// Look up a cultivar by name, ignoring case.
    pub fn cultivar(&self, name: &str) -> Result<&CropModel, EngineError> {
        let wanted = name.to_lowercase();
        self.cultivars
            .iter()
            .find(|model| model.cultivar().to_lowercase() == wanted)
            .ok_or_else(|| EngineError::UnknownCultivar(name.to_string()))
    }

    pub fn water_parameters(&self, crop: &str) -> Result<&CropWaterParameters, EngineError> {
        self.water
            .get(&crop.to_lowercase())
            .ok_or_else(|| EngineError::UnknownCrop(crop.to_string()))
    }

    pub fn cultivar_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.cultivars.iter().map(|model| model.cultivar())
    }
}
