use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

// Location constants needed by the radiation and daylength formulas
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Site {
    pub latitude_deg: f64, // Decimal degrees, negative south
    pub elevation_m: f64,  // Metres above sea level
}

impl Site {
    pub fn new(latitude_deg: f64, elevation_m: f64) -> Self {
        Site {
            latitude_deg,
            elevation_m,
        }
    }
}

// One calendar day of weather
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeatherRecord {
    pub date: NaiveDate,
    pub tmin: f64,   // Minimum air temperature [°C]
    pub tmax: f64,   // Maximum air temperature [°C]
    pub precip: f64, // Precipitation [mm/day]
    #[serde(default)]
    pub solar_radiation: Option<f64>, // [MJ/m²/day]
    #[serde(default)]
    pub wind_speed: Option<f64>, // At 2 m [m/s]
    #[serde(default)]
    pub rh_max: Option<f64>, // [%]
    #[serde(default)]
    pub rh_min: Option<f64>, // [%]
}

impl WeatherRecord {
    // Temperature and rain only, enough for the temperature-based ET method
    pub fn new(date: NaiveDate, tmin: f64, tmax: f64, precip: f64) -> Self {
        WeatherRecord {
            date,
            tmin,
            tmax,
            precip,
            solar_radiation: None,
            wind_speed: None,
            rh_max: None,
            rh_min: None,
        }
    }

    pub fn with_radiation(mut self, solar_radiation: f64, wind_speed: f64, rh_max: f64, rh_min: f64) -> Self {
        self.solar_radiation = Some(solar_radiation);
        self.wind_speed = Some(wind_speed);
        self.rh_max = Some(rh_max);
        self.rh_min = Some(rh_min);
        self
    }

    pub fn tmean(&self) -> f64 {
        0.5 * (self.tmin + self.tmax)
    }

    fn check(&self) -> Result<(), EngineError> {
        let invalid = |reason: &str| EngineError::InvalidWeather {
            date: self.date,
            reason: reason.to_string(),
        };
        if !self.tmin.is_finite() || !self.tmax.is_finite() {
            return Err(invalid("temperature is missing"));
        }
        if !self.precip.is_finite() {
            return Err(invalid("precipitation is missing"));
        }
        if self.precip < 0.0 {
            return Err(invalid("precipitation is negative"));
        }
        if self.tmin > self.tmax {
            return Err(invalid("tmin exceeds tmax"));
        }
        Ok(())
    }
}

/// Contiguous daily weather, one record per calendar day.
///
/// Contiguity is checked once at construction so that lookups by date are a
/// plain offset from the first record.
#[derive(Clone, Debug, PartialEq)]
pub struct WeatherSeries {
    records: Vec<WeatherRecord>,
}

impl WeatherSeries {
    pub fn new(records: Vec<WeatherRecord>) -> Result<Self, EngineError> {
        let Some(first) = records.first() else {
            return Err(EngineError::InvalidWeather {
                date: NaiveDate::MIN,
                reason: "weather series is empty".to_string(),
            });
        };
        first.check()?;
        for pair in records.windows(2) {
            let expected = pair[0]
                .date
                .checked_add_days(Days::new(1))
                .unwrap_or(NaiveDate::MAX);
            if pair[1].date != expected {
                return Err(EngineError::WeatherGap {
                    expected,
                    found: pair[1].date,
                });
            }
            pair[1].check()?;
        }
        Ok(WeatherSeries { records })
    }

    pub fn first_date(&self) -> NaiveDate {
        self.records[0].date
    }

    pub fn last_date(&self) -> NaiveDate {
        self.records[self.records.len() - 1].date
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[WeatherRecord] {
        &self.records
    }

    pub fn get(&self, date: NaiveDate) -> Option<&WeatherRecord> {
        let offset = (date - self.first_date()).num_days();
        usize::try_from(offset).ok().and_then(|i| self.records.get(i))
    }

    // Records from `start` to `end` inclusive; both ends must be covered
    pub fn window(&self, start: NaiveDate, end: NaiveDate) -> Result<&[WeatherRecord], EngineError> {
        let first = self.first_date();
        let last = self.last_date();
        for date in [start, end] {
            if date < first || date > last {
                return Err(EngineError::DateOutsideWeather { date, first, last });
            }
        }
        let from = (start - first).num_days() as usize;
        let to = (end - first).num_days() as usize;
        Ok(if from <= to { &self.records[from..=to] } else { &[] })
    }
}
