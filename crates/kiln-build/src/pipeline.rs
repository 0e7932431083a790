//! The pipeline driver: an explicit ordered list of stages executed over a
//! stream of assets.
//!
//! A [`Stage`] sees every asset in its input order via [`Stage::process`]
//! and may emit zero or more assets per input. After the input is
//! exhausted, [`Stage::flush`] runs once per stage in pipeline order, and
//! anything a flush emits flows through the remaining stages. This is how
//! buffering stages (rejoin, bundle, push manifest) drain.
//!
//! A stage returning an error is fatal to its pipeline; per-record
//! transform failures are recovered inside the transform stage and never
//! reach the driver.

use crate::asset::Asset;
use crate::Result;

/// One transform or structural step in a pipeline.
pub trait Stage: Send {
    /// Stable name for logs and errors.
    fn name(&self) -> &'static str;

    /// Handle one asset, pushing any number of output assets.
    fn process(&mut self, asset: Asset, out: &mut Vec<Asset>) -> Result<()>;

    /// Called once after all input has been processed.
    fn flush(&mut self, _out: &mut Vec<Asset>) -> Result<()> {
        Ok(())
    }
}

/// An ordered list of stages bound to one build variant.
///
/// Owns no assets persistently: records flow through `run` and are not
/// retained after emission.
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    pub fn new(stages: Vec<Box<dyn Stage>>) -> Self {
        Self { stages }
    }

    /// Drive every input through the stage list, then cascade flushes.
    /// Consumes the pipeline: it is constructed once per variant and torn
    /// down when its stream completes or errors.
    pub fn run(mut self, inputs: Vec<Asset>) -> Result<Vec<Asset>> {
        let mut output = Vec::new();
        for asset in inputs {
            feed(&mut self.stages, 0, asset, &mut output)?;
        }
        for i in 0..self.stages.len() {
            let mut flushed = Vec::new();
            self.stages[i].flush(&mut flushed)?;
            for asset in flushed {
                feed(&mut self.stages, i + 1, asset, &mut output)?;
            }
        }
        Ok(output)
    }
}

fn feed(
    stages: &mut [Box<dyn Stage>],
    from: usize,
    asset: Asset,
    output: &mut Vec<Asset>,
) -> Result<()> {
    if from >= stages.len() {
        output.push(asset);
        return Ok(());
    }
    let mut emitted = Vec::new();
    stages[from].process(asset, &mut emitted)?;
    for next in emitted {
        feed(stages, from + 1, next, output)?;
    }
    Ok(())
}
