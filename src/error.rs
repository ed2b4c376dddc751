//! Error types for the simulation engine.
//!
//! Every fallible operation returns [`EngineError`]. Callers that only need to
//! decide whether a failure is a bad input, a hole in the weather data or an
//! engine defect can use [`EngineError::kind`].

use chrono::NaiveDate;

/// Broad failure classes used when reporting per-unit outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid parameters. Fatal to the unit, never retried.
    Configuration,
    /// The weather series cannot cover the requested window.
    DataGap,
    /// A daily invariant failed after clamping. Always a defect.
    InternalConsistency,
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Cultivar coefficients that the phenology model cannot run with.
    #[error("invalid coefficients for cultivar '{cultivar}': {reason}")]
    InvalidCultivar {
        /// Cultivar name as configured.
        cultivar: String,
        /// What is wrong with it.
        reason: String,
    },

    #[error("invalid crop water parameters: {0}")]
    InvalidWaterParameters(String),

    #[error("invalid soil profile: {0}")]
    InvalidSoilProfile(String),

    /// Initial condition must be a fraction of field capacity.
    #[error("initial-condition fraction {0} is outside [0, 1]")]
    InvalidInitialFraction(f64),

    #[error("curve number {0} is outside (0, 100]")]
    InvalidCurveNumber(f64),

    #[error("unknown cultivar '{0}'")]
    UnknownCultivar(String),

    #[error("no water parameters for crop '{0}'")]
    UnknownCrop(String),

    #[error("unknown soil '{0}'")]
    UnknownSoil(String),

    #[error("failed to read parameter file: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("failed to parse parameter TOML: {source}")]
    Toml {
        #[from]
        source: toml::de::Error,
    },

    /// The weather series skips or repeats a calendar day.
    #[error("weather series gap: expected {expected}, found {found}")]
    WeatherGap {
        /// The date that should have come next.
        expected: NaiveDate,
        /// The date that was actually there.
        found: NaiveDate,
    },

    #[error("invalid weather record on {date}: {reason}")]
    InvalidWeather { date: NaiveDate, reason: String },

    /// A date the simulation needs is not covered by the weather series.
    #[error("{date} is outside the weather series ({first}..={last})")]
    DateOutsideWeather {
        date: NaiveDate,
        first: NaiveDate,
        last: NaiveDate,
    },

    /// A daily water balance invariant did not hold after clamping.
    #[error("internal consistency failure on {date}: {detail}")]
    InternalConsistency { date: NaiveDate, detail: String },

    #[error("failed to build worker pool: {source}")]
    WorkerPool {
        #[from]
        source: rayon::ThreadPoolBuildError,
    },
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::WeatherGap { .. } | Self::InvalidWeather { .. } | Self::DateOutsideWeather { .. } => {
                ErrorKind::DataGap
            }
            Self::InternalConsistency { .. } => ErrorKind::InternalConsistency,
            _ => ErrorKind::Configuration,
        }
    }

    pub(crate) fn cultivar(cultivar: &str, reason: impl Into<String>) -> Self {
        Self::InvalidCultivar {
            cultivar: cultivar.to_string(),
            reason: reason.into(),
        }
    }
}
