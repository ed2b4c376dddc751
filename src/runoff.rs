//! NRCS runoff curve number and daily surface runoff.
//!
//! Runoff is taken off the day's rain before it reaches the root zone, so the
//! water balance only sees effective precipitation. Depths are in millimetres.

use crate::error::EngineError;

/**
Calculates the NRCS Curve Number (CN) for average antecedent moisture condition (AMC II).

A lookup over the hydrologic soil group carried by the soil profile and the
land use of the simulated field.

# Arguments
* `hydro_group` - Hydrologic soil group ("A", "B", "C", "D").
* `land_use` - Land use description (e.g., "small grain good", "row crops fair").

# Errors
`InvalidSoilProfile` if the soil group or land use is not recognized.
*/
pub fn curve_number(hydro_group: &str, land_use: &str) -> Result<f64, EngineError> {
    match (
        hydro_group.trim().to_uppercase().as_str(),
        land_use.trim().to_lowercase().as_str(),
    ) {
        // Small grain, straight row, good condition
        ("A", "small grain good") => Ok(63.0),
        ("B", "small grain good") => Ok(75.0),
        ("C", "small grain good") => Ok(83.0),
        ("D", "small grain good") => Ok(87.0),

        // Small grain, straight row, poor condition
        ("A", "small grain poor") => Ok(65.0),
        ("B", "small grain poor") => Ok(76.0),
        ("C", "small grain poor") => Ok(84.0),
        ("D", "small grain poor") => Ok(88.0),

        // Row crops, straight row, good condition
        ("A", "row crops good") => Ok(67.0),
        ("B", "row crops good") => Ok(78.0),
        ("C", "row crops good") => Ok(85.0),
        ("D", "row crops good") => Ok(89.0),

        // Row crops, straight row, poor condition
        ("A", "row crops poor") => Ok(72.0),
        ("B", "row crops poor") => Ok(81.0),
        ("C", "row crops poor") => Ok(88.0),
        ("D", "row crops poor") => Ok(91.0),

        // Fallow, bare soil
        ("A", "fallow") => Ok(77.0),
        ("B", "fallow") => Ok(86.0),
        ("C", "fallow") => Ok(91.0),
        ("D", "fallow") => Ok(94.0),

        _ => Err(EngineError::InvalidSoilProfile(format!(
            "no curve number for soil group '{hydro_group}' and land use '{land_use}'"
        ))),
    }
}

/// Curve numbers are defined on (0, 100].
pub fn check_curve_number(cn: f64) -> Result<f64, EngineError> {
    if cn > 0.0 && cn <= 100.0 {
        Ok(cn)
    } else {
        Err(EngineError::InvalidCurveNumber(cn))
    }
}

/**
Calculates the daily runoff depth using the NRCS Curve Number method.

This uses the metric version of the formula, with depths in millimeters.

# Arguments
- `rain` - Precipitation in mm for the day.
- `cn` - Curve number (from `curve_number` or provided).

# Returns
The estimated runoff depth in mm, never more than `rain`.
*/
pub fn daily_runoff(rain: f64, cn: f64) -> f64 {
    if rain <= 0.0 || cn <= 0.0 {
        return 0.0;
    }
    if cn >= 100.0 {
        return rain;
    }

    // Maximum potential retention (S) in mm
    let s = (25400.0 / cn) - 254.0;

    // Initial abstraction (Ia = 0.2 * S)
    let ia = 0.2 * s;

    if rain <= ia {
        return 0.0;
    }

    // Runoff depth Q = (P - Ia)^2 / (P - Ia + S)
    ((rain - ia).powi(2) / (rain - ia + s)).min(rain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn looks_up_curve_numbers() {
        assert_eq!(curve_number("b", "Small Grain Good").unwrap(), 75.0);
        assert_eq!(curve_number(" D ", "fallow").unwrap(), 94.0);
        assert!(matches!(
            curve_number("E", "fallow"),
            Err(EngineError::InvalidSoilProfile(_))
        ));
        assert!(curve_number("A", "orchard").is_err());
    }

    #[test]
    fn no_runoff_below_initial_abstraction() {
        // CN 75: S = 84.67 mm, Ia = 16.93 mm
        assert_eq!(daily_runoff(0.0, 75.0), 0.0);
        assert_eq!(daily_runoff(15.0, 75.0), 0.0);
    }

    #[test]
    fn runoff_above_initial_abstraction() {
        let s: f64 = 25400.0 / 75.0 - 254.0;
        let ia = 0.2 * s;
        let expected = (50.0 - ia).powi(2) / (50.0 - ia + s);
        assert_abs_diff_eq!(daily_runoff(50.0, 75.0), expected, epsilon = 1e-12);
        assert_abs_diff_eq!(daily_runoff(50.0, 75.0), 9.29, epsilon = 0.01);
    }

    #[test]
    fn curve_number_range() {
        assert_eq!(check_curve_number(100.0).unwrap(), 100.0);
        assert_eq!(check_curve_number(75.0).unwrap(), 75.0);
        for cn in [0.0, -5.0, 100.5, f64::NAN] {
            assert!(matches!(check_curve_number(cn), Err(EngineError::InvalidCurveNumber(_))));
        }
    }

    #[test]
    fn runoff_never_exceeds_rain() {
        for rain in [1.0, 10.0, 100.0, 400.0] {
            for cn in [40.0, 75.0, 98.0, 100.0] {
                let q = daily_runoff(rain, cn);
                assert!((0.0..=rain).contains(&q));
            }
        }
    }
}
