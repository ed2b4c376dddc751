//! Reference evapotranspiration (ETref) for a single day.
//!
//! Two interchangeable methods following FAO Irrigation and Drainage Paper 56:
//! the temperature-range Hargreaves equation, usable with nothing but Tmin and
//! Tmax, and the Penman-Monteith combination equation, which also needs solar
//! radiation, wind speed and relative humidity. All values are in mm/day.
//!
//! The solar geometry helpers here are also used by the phenology model for
//! daylength.

use std::f64::consts::PI;

use chrono::Datelike;
use serde::{Deserialize, Serialize};

use crate::weather::{Site, WeatherRecord};

const SOLAR_CONSTANT: f64 = 0.0820; // MJ m^-2 min^-1
const STEFAN_BOLTZMANN: f64 = 4.903e-9; // MJ K^-4 m^-2 day^-1

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EtMethod {
    #[default]
    Hargreaves,
    PenmanMonteith,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EtEstimate {
    pub value: f64,
    pub method: EtMethod,
    /// Penman-Monteith was requested but the record lacked its inputs.
    pub fell_back: bool,
}

/// Solar declination [rad] for a day of year (FAO-56 eq. 24).
pub fn solar_declination(doy: u32) -> f64 {
    0.409 * (2.0 * PI / 365.0 * doy as f64 - 1.39).sin()
}

/// Sunset hour angle [rad] (FAO-56 eq. 25), clamped for polar day and night.
pub fn sunset_hour_angle(latitude_deg: f64, doy: u32) -> f64 {
    let phi = latitude_deg.to_radians();
    (-phi.tan() * solar_declination(doy).tan()).clamp(-1.0, 1.0).acos()
}

/// Extraterrestrial radiation Ra [MJ m^-2 day^-1] (FAO-56 eq. 21).
pub fn extraterrestrial_radiation(latitude_deg: f64, doy: u32) -> f64 {
    let phi = latitude_deg.to_radians();
    let dr = 1.0 + 0.033 * (2.0 * PI / 365.0 * doy as f64).cos();
    let delta = solar_declination(doy);
    let ws = sunset_hour_angle(latitude_deg, doy);
    let ra = 24.0 * 60.0 / PI
        * SOLAR_CONSTANT
        * dr
        * (ws * phi.sin() * delta.sin() + phi.cos() * delta.cos() * ws.sin());
    ra.max(0.0)
}

/// Maximum possible daylight hours N (FAO-56 eq. 34).
pub fn daylength_hours(latitude_deg: f64, doy: u32) -> f64 {
    24.0 / PI * sunset_hour_angle(latitude_deg, doy)
}

// Saturation vapour pressure [kPa] at temperature t [°C]
fn saturation_vapour_pressure(t: f64) -> f64 {
    0.6108 * (17.27 * t / (t + 237.3)).exp()
}

pub fn hargreaves(record: &WeatherRecord, site: &Site) -> f64 {
    let ra = extraterrestrial_radiation(site.latitude_deg, record.date.ordinal());
    let range = (record.tmax - record.tmin).max(0.0);
    (0.0023 * (record.tmean() + 17.8) * range.sqrt() * 0.408 * ra).max(0.0)
}

/// FAO-56 Penman-Monteith for a grass reference surface, soil heat flux
/// neglected at the daily step. Returns `None` when any of radiation, wind
/// or the two humidity extremes is absent.
pub fn penman_monteith(record: &WeatherRecord, site: &Site) -> Option<f64> {
    let rs = record.solar_radiation.filter(|v| v.is_finite())?;
    let u2 = record.wind_speed.filter(|v| v.is_finite())?;
    let rh_max = record.rh_max.filter(|v| v.is_finite())?;
    let rh_min = record.rh_min.filter(|v| v.is_finite())?;

    let t = record.tmean();
    let z = site.elevation_m;
    let pressure = 101.3 * ((293.0 - 0.0065 * z) / 293.0).powf(5.26);
    let gamma = 0.000665 * pressure;
    let delta = 4098.0 * saturation_vapour_pressure(t) / (t + 237.3).powi(2);

    let e_tmax = saturation_vapour_pressure(record.tmax);
    let e_tmin = saturation_vapour_pressure(record.tmin);
    let es = 0.5 * (e_tmax + e_tmin);
    let ea = 0.5 * (e_tmin * rh_max / 100.0 + e_tmax * rh_min / 100.0);

    let ra = extraterrestrial_radiation(site.latitude_deg, record.date.ordinal());
    let rso = (0.75 + 2e-5 * z) * ra;
    let relative_shortwave = if rso > 0.0 { (rs / rso).min(1.0) } else { 0.0 };
    let rns = 0.77 * rs;
    let rnl = STEFAN_BOLTZMANN
        * 0.5
        * ((record.tmax + 273.16).powi(4) + (record.tmin + 273.16).powi(4))
        * (0.34 - 0.14 * ea.max(0.0).sqrt())
        * (1.35 * relative_shortwave - 0.35);
    let rn = rns - rnl;

    let numerator = 0.408 * delta * rn + gamma * 900.0 / (t + 273.0) * u2 * (es - ea);
    let denominator = delta + gamma * (1.0 + 0.34 * u2);
    Some((numerator / denominator).max(0.0))
}

/// Daily ETref with the configured method, degrading to Hargreaves when the
/// record cannot feed Penman-Monteith.
pub fn reference_et(record: &WeatherRecord, site: &Site, method: EtMethod) -> EtEstimate {
    match method {
        EtMethod::Hargreaves => EtEstimate {
            value: hargreaves(record, site),
            method,
            fell_back: false,
        },
        EtMethod::PenmanMonteith => match penman_monteith(record, site) {
            Some(value) => EtEstimate {
                value,
                method,
                fell_back: false,
            },
            None => EtEstimate {
                value: hargreaves(record, site),
                method: EtMethod::Hargreaves,
                fell_back: true,
            },
        },
    }
}
