//! Straight-line stage runner.
//!
//! Stages run strictly in order on a single [`Record`]. A stage failure is
//! recorded on the record and every later stage becomes a passthrough; the
//! orchestrator never retries a stage.
use crate::error::StageError;
use crate::record::Record;
use std::time::Instant;

/// One step of a document run.
pub trait Stage {
    fn name(&self) -> &'static str;

    /// Advance the record. Implementations may assume `record.error` is unset.
    fn run(&mut self, record: &mut Record) -> Result<(), StageError>;
}

/// Execute one stage as a record-to-record function, honoring short-circuit.
pub fn step(stage: &mut dyn Stage, mut record: Record) -> Record {
    if let Some(err) = record.error() {
        tracing::debug!(
            stage = stage.name(),
            failed_stage = err.stage(),
            "skip stage after earlier failure"
        );
        return record;
    }
    let start = Instant::now();
    tracing::info!(stage = stage.name(), "stage start");
    match stage.run(&mut record) {
        Ok(()) => {
            tracing::info!(
                stage = stage.name(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "stage complete"
            );
        }
        Err(err) => {
            tracing::error!(
                stage = stage.name(),
                failed = err.stage(),
                message = err.message(),
                "stage failed"
            );
            record.error = Some(err);
        }
    }
    record
}

/// An ordered list of stages.
#[derive(Default)]
pub struct Pipeline<'a> {
    stages: Vec<Box<dyn Stage + 'a>>,
}

impl<'a> Pipeline<'a> {
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    /// Append a stage to the end of the pipeline.
    pub fn then(mut self, stage: impl Stage + 'a) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    /// Thread the record through every stage in order.
    pub fn run(&mut self, record: Record) -> Record {
        self.stages
            .iter_mut()
            .fold(record, |record, stage| step(stage.as_mut(), record))
    }
}
