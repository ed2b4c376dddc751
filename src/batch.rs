use rayon::ThreadPoolBuilder;
use rayon::prelude::*;
use tracing::{info, warn};

use crate::error::{EngineError, ErrorKind};
use crate::simulation::{RunContext, SimulationUnit, UnitId, UnitResult, UnitStatus};

/// Outcome of one unit. A failed unit never takes the others down with it.
#[derive(Debug)]
pub struct UnitReport {
    pub id: UnitId,
    pub outcome: Result<UnitResult, EngineError>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub complete: usize,
    pub partial: usize,
    pub configuration_errors: usize,
    pub data_gaps: usize,
    pub internal_errors: usize,
}

impl BatchSummary {
    pub fn from_reports(reports: &[UnitReport]) -> Self {
        let mut summary = BatchSummary::default();
        for report in reports {
            match &report.outcome {
                Ok(result) if result.status == UnitStatus::Complete => summary.complete += 1,
                Ok(_) => summary.partial += 1,
                Err(err) => match err.kind() {
                    ErrorKind::Configuration => summary.configuration_errors += 1,
                    ErrorKind::DataGap => summary.data_gaps += 1,
                    ErrorKind::InternalConsistency => summary.internal_errors += 1,
                },
            }
        }
        summary
    }

    pub fn failed(&self) -> usize {
        self.configuration_errors + self.data_gaps + self.internal_errors
    }
}

/// Runs independent units on a fixed number of threads.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WorkerPool {
    /// 0 lets rayon pick one thread per core.
    pub threads: usize,
}

impl WorkerPool {
    pub fn new(threads: usize) -> Self {
        WorkerPool { threads }
    }

    /// Run every unit and return one report per unit in input order.
    ///
    /// Only failing to build the pool is an error here; unit failures are
    /// carried in each report.
    pub fn run_all(&self, units: &[SimulationUnit], ctx: &RunContext) -> Result<Vec<UnitReport>, EngineError> {
        let pool = ThreadPoolBuilder::new().num_threads(self.threads).build()?;
        let reports: Vec<UnitReport> = pool.install(|| {
            units
                .par_iter()
                .map(|unit| {
                    let outcome = unit.run(ctx);
                    if let Err(err) = &outcome {
                        warn!(run = %ctx.run_id, unit = %unit.id, kind = ?err.kind(), "Unit failed: {err}");
                    }
                    UnitReport {
                        id: unit.id.clone(),
                        outcome,
                    }
                })
                .collect()
        });

        let summary = BatchSummary::from_reports(&reports);
        info!(
            run = %ctx.run_id,
            units = reports.len(),
            complete = summary.complete,
            partial = summary.partial,
            failed = summary.failed(),
            "Batch finished"
        );
        Ok(reports)
    }
}
