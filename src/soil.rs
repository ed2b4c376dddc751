use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

// Depth of the surface layer that dries by evaporation (FAO-56 Ze) [cm]
pub const EVAPORATION_LAYER_CM: f64 = 10.0;

// FAO-56 Table 19 range for readily evaporable water [mm]
const REW_MIN: f64 = 2.0;
const REW_MAX: f64 = 12.0;

const DEPTH_TOLERANCE: f64 = 1e-6;

// Soil layer definition, volumetric water contents in [cm³/cm³]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SoilLayer {
    pub depth_top: f64,      // Start depth of layer [cm]
    pub depth_bottom: f64,   // End depth of layer [cm]
    pub field_capacity: f64, // Drained upper limit
    pub wilting_point: f64,  // Lower limit
    pub saturation: f64,     // Saturated water content
}

impl SoilLayer {
    pub fn new(depth_top: f64, depth_bottom: f64, field_capacity: f64, wilting_point: f64, saturation: f64) -> Self {
        SoilLayer {
            depth_top,
            depth_bottom,
            field_capacity,
            wilting_point,
            saturation,
        }
    }

    pub fn thickness(&self) -> f64 {
        self.depth_bottom - self.depth_top
    }

    // Plant-available water in mm per cm of this layer
    fn available_per_cm(&self) -> f64 {
        (self.field_capacity - self.wilting_point) * 10.0
    }

    // Overlap of this layer with [0, depth] [cm]
    fn span_to(&self, depth: f64) -> f64 {
        (depth.min(self.depth_bottom) - self.depth_top).max(0.0)
    }
}

// Soil profile managing multiple layers
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SoilProfile {
    pub name: String, // name of soils like "Dailey loamy sand, 3 to 9 percent slopes"
    #[serde(default)]
    pub hydro_group: String, // Hydrological group like "A", "B", "C"
    pub layers: Vec<SoilLayer>,
}

#[derive(Deserialize)]
struct SoilLibraryFile {
    soils: Vec<SoilProfile>,
}

impl SoilProfile {
    pub fn new(name: impl Into<String>, hydro_group: impl Into<String>, layers: Vec<SoilLayer>) -> Self {
        SoilProfile {
            name: name.into(),
            hydro_group: hydro_group.into(),
            layers,
        }
    }

    /// Parse every `[[soils]]` entry of a TOML soil library, validating each.
    pub fn library_from_toml_str(toml_str: &str) -> Result<Vec<SoilProfile>, EngineError> {
        let file: SoilLibraryFile = toml::from_str(toml_str)?;
        for soil in &file.soils {
            soil.validate()?;
        }
        Ok(file.soils)
    }

    /// Look up one soil by name (case-insensitive) in a TOML soil library.
    pub fn from_toml_str(toml_str: &str, soil_name: &str) -> Result<SoilProfile, EngineError> {
        let wanted = soil_name.to_lowercase();
        Self::library_from_toml_str(toml_str)?
            .into_iter()
            .find(|soil| soil.name.to_lowercase() == wanted)
            .ok_or_else(|| EngineError::UnknownSoil(soil_name.to_string()))
    }

    pub fn from_toml_file(path: &Path, soil_name: &str) -> Result<SoilProfile, EngineError> {
        let toml_str = fs::read_to_string(path)?;
        Self::from_toml_str(&toml_str, soil_name)
    }

    pub fn bottom(&self) -> f64 {
        self.layers.last().map(|layer| layer.depth_bottom).unwrap_or(0.0)
    }

    /// Layers must tile the profile from the surface down with plausible
    /// water contents.
    pub fn validate(&self) -> Result<(), EngineError> {
        let invalid = |reason: String| EngineError::InvalidSoilProfile(format!("{}: {reason}", self.name));
        if self.layers.is_empty() {
            return Err(invalid("no layers".to_string()));
        }
        let mut expected_top = 0.0;
        for (i, layer) in self.layers.iter().enumerate() {
            if (layer.depth_top - expected_top).abs() > DEPTH_TOLERANCE {
                return Err(invalid(format!(
                    "layer {i} starts at {} cm, expected {expected_top} cm",
                    layer.depth_top
                )));
            }
            if layer.depth_bottom <= layer.depth_top {
                return Err(invalid(format!("layer {i} has non-increasing depths")));
            }
            let contents = [layer.field_capacity, layer.wilting_point, layer.saturation];
            if contents.iter().any(|v| !v.is_finite() || *v <= 0.0 || *v > 1.0) {
                return Err(invalid(format!("layer {i} has water contents outside (0, 1]")));
            }
            if layer.wilting_point >= layer.field_capacity {
                return Err(invalid(format!("layer {i} wilting point is not below field capacity")));
            }
            if layer.field_capacity > layer.saturation {
                return Err(invalid(format!("layer {i} field capacity exceeds saturation")));
            }
            expected_top = layer.depth_bottom;
        }
        Ok(())
    }

    /// Derive the water-holding quantities used by the daily balance.
    ///
    /// `depth_cap_cm` limits the usable depth to the lesser of the cap and the
    /// profile bottom; `initial_fraction` is the starting water content as a
    /// fraction of field capacity (1.0 = full).
    pub fn derive(&self, depth_cap_cm: f64, initial_fraction: f64) -> Result<SoilProfileDerived, EngineError> {
        self.validate()?;
        if !(0.0..=1.0).contains(&initial_fraction) {
            return Err(EngineError::InvalidInitialFraction(initial_fraction));
        }
        if !depth_cap_cm.is_finite() || depth_cap_cm <= 0.0 {
            return Err(EngineError::InvalidSoilProfile(format!(
                "{}: depth cap {depth_cap_cm} cm must be positive",
                self.name
            )));
        }

        let max_depth_cm = depth_cap_cm.min(self.bottom());
        let layers: Vec<SoilLayer> = self
            .layers
            .iter()
            .filter(|layer| layer.depth_top < max_depth_cm)
            .map(|layer| SoilLayer {
                depth_bottom: layer.depth_bottom.min(max_depth_cm),
                ..layer.clone()
            })
            .collect();

        let total_available_water = available_water(&layers, max_depth_cm);

        let ze = EVAPORATION_LAYER_CM.min(max_depth_cm);
        let total_evaporable_water: f64 = layers
            .iter()
            .map(|layer| (layer.field_capacity - 0.5 * layer.wilting_point) * 10.0 * layer.span_to(ze))
            .sum();
        let readily_evaporable_water = available_water(&layers, ze)
            .clamp(REW_MIN, REW_MAX)
            .min(total_evaporable_water);

        Ok(SoilProfileDerived {
            max_depth_cm,
            total_available_water,
            available_water_per_cm: total_available_water / max_depth_cm,
            total_evaporable_water,
            readily_evaporable_water,
            initial_fraction,
            initial_depletion: (1.0 - initial_fraction) * total_available_water,
            layers,
        })
    }
}

fn available_water(layers: &[SoilLayer], depth: f64) -> f64 {
    layers
        .iter()
        .map(|layer| layer.available_per_cm() * layer.span_to(depth))
        .sum()
}

/// Water-holding properties of one soil for one initial condition. Water
/// quantities are in mm.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SoilProfileDerived {
    pub max_depth_cm: f64,
    pub total_available_water: f64,
    pub available_water_per_cm: f64,
    pub total_evaporable_water: f64,
    pub readily_evaporable_water: f64,
    pub initial_fraction: f64,
    pub initial_depletion: f64,
    layers: Vec<SoilLayer>,
}

impl SoilProfileDerived {
    /// Total available water between the surface and `depth_cm`, never
    /// counting soil below the usable maximum depth.
    pub fn available_water_to(&self, depth_cm: f64) -> f64 {
        available_water(&self.layers, depth_cm.clamp(0.0, self.max_depth_cm))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn loam() -> SoilProfile {
        SoilProfile::new(
            "Test loam",
            "B",
            vec![
                SoilLayer::new(0.0, 20.0, 0.30, 0.10, 0.45),
                SoilLayer::new(20.0, 60.0, 0.32, 0.12, 0.45),
                SoilLayer::new(60.0, 120.0, 0.28, 0.14, 0.40),
            ],
        )
    }

    #[test]
    fn total_available_water_integrates_layers() {
        let derived = loam().derive(500.0, 1.0).unwrap();
        // 20*2 + 40*2 + 60*1.4 mm
        assert_abs_diff_eq!(derived.total_available_water, 204.0, epsilon = 1e-9);
        assert_abs_diff_eq!(derived.max_depth_cm, 120.0);
        assert_abs_diff_eq!(derived.available_water_per_cm, 1.7, epsilon = 1e-9);
        assert_eq!(derived.initial_depletion, 0.0);
    }

    #[test]
    fn depth_cap_clips_profile() {
        let derived = loam().derive(40.0, 0.5).unwrap();
        assert_abs_diff_eq!(derived.max_depth_cm, 40.0);
        assert_abs_diff_eq!(derived.total_available_water, 80.0, epsilon = 1e-9);
        assert_abs_diff_eq!(derived.initial_depletion, 40.0, epsilon = 1e-9);
        assert_abs_diff_eq!(derived.available_water_to(30.0), 60.0, epsilon = 1e-9);
        assert_abs_diff_eq!(derived.available_water_to(90.0), 80.0, epsilon = 1e-9);
    }

    #[test]
    fn evaporable_water_uses_surface_layer() {
        let derived = loam().derive(150.0, 0.2).unwrap();
        // (0.30 - 0.05) * 10 * 10
        assert_abs_diff_eq!(derived.total_evaporable_water, 25.0, epsilon = 1e-9);
        // available water over 10 cm is 20 mm, capped at 12
        assert_abs_diff_eq!(derived.readily_evaporable_water, 12.0);
        assert_abs_diff_eq!(derived.initial_depletion, 0.8 * 204.0, epsilon = 1e-9);
        assert!(derived.initial_depletion <= derived.total_available_water);
    }

    #[test]
    fn rejects_out_of_range_initial_fraction() {
        assert!(matches!(
            loam().derive(100.0, 1.2),
            Err(EngineError::InvalidInitialFraction(f)) if f == 1.2
        ));
        assert!(loam().derive(100.0, -0.1).is_err());
    }

    #[test]
    fn rejects_broken_profiles() {
        let mut empty = loam();
        empty.layers.clear();
        assert!(matches!(empty.validate(), Err(EngineError::InvalidSoilProfile(_))));

        let mut overlap = loam();
        overlap.layers[1].depth_top = 15.0;
        assert!(overlap.validate().is_err());

        let mut inverted = loam();
        inverted.layers[2].depth_bottom = 60.0;
        assert!(inverted.validate().is_err());

        let mut dry = loam();
        dry.layers[0].wilting_point = 0.30;
        assert!(dry.validate().is_err());

        assert!(loam().derive(0.0, 0.5).is_err());
    }

    #[test]
    fn loads_library_from_toml() {
        let toml_str = r#"
            [[soils]]
            name = "Clay loam"
            hydro_group = "C"

            [[soils.layers]]
            depth_top = 0.0
            depth_bottom = 30.0
            field_capacity = 0.36
            wilting_point = 0.22
            saturation = 0.48

            [[soils.layers]]
            depth_top = 30.0
            depth_bottom = 90.0
            field_capacity = 0.34
            wilting_point = 0.21
            saturation = 0.46
        "#;
        let soil = SoilProfile::from_toml_str(toml_str, "CLAY LOAM").unwrap();
        assert_eq!(soil.hydro_group, "C");
        assert_eq!(soil.layers.len(), 2);
        assert_abs_diff_eq!(soil.bottom(), 90.0);
        assert!(matches!(
            SoilProfile::from_toml_str(toml_str, "sand"),
            Err(EngineError::UnknownSoil(_))
        ));
    }
}
