//! Training diagnostics as plain data.
//!
//! Nothing here draws. Loss curves and mapping scatters are collected as arrays and can be
//! written as CSV for whatever plotting tool is at hand.

use crate::{Error, Result};
use ndarray::Array2;
use std::fmt;
use std::io::Write;

/// Which optimization phase a loss curve belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainPhase {
    /// Training the dual potentials `(u, v)`.
    Dual,
    /// Training the transport map `f` against fixed potentials.
    Mapping,
}

impl fmt::Display for TrainPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrainPhase::Dual => f.write_str("dual"),
            TrainPhase::Mapping => f.write_str("mapping"),
        }
    }
}

/// Per-iteration losses for one phase: last training batch vs. validation data.
#[derive(Debug, Clone, PartialEq)]
pub struct LossCurve {
    pub phase: TrainPhase,
    /// Optimizer label (e.g. `"sgd"`, `"adam"`).
    pub optimizer: String,
    pub lr: f32,
    pub eps: f32,
    /// Loss on the training batch of each iteration.
    pub batch: Vec<f32>,
    /// Loss on the fixed validation batch at each iteration.
    pub validation: Vec<f32>,
    /// Validation loss before the first step, if recorded.
    pub initial: Option<f32>,
}

impl LossCurve {
    pub fn new(phase: TrainPhase, optimizer: impl Into<String>, lr: f32, eps: f32) -> Self {
        Self {
            phase,
            optimizer: optimizer.into(),
            lr,
            eps,
            batch: Vec::new(),
            validation: Vec::new(),
            initial: None,
        }
    }

    /// Record the validation loss of the untrained parameters.
    pub fn set_initial(&mut self, validation_loss: f32) {
        self.initial = Some(validation_loss);
    }

    pub fn push(&mut self, batch_loss: f32, validation_loss: f32) {
        self.batch.push(batch_loss);
        self.validation.push(validation_loss);
    }

    pub fn len(&self) -> usize {
        self.batch.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batch.is_empty()
    }

    /// Last `(batch, validation)` pair, if any.
    pub fn last(&self) -> Option<(f32, f32)> {
        Some((*self.batch.last()?, *self.validation.last()?))
    }

    /// True when training did not lower the validation loss below its initial value,
    /// or the last validation loss is not finite.
    ///
    /// Without a recorded initial value only finiteness is checked.
    pub fn stalled(&self) -> bool {
        match (self.initial, self.validation.last()) {
            (_, None) => false,
            (_, Some(last)) if !last.is_finite() => true,
            (Some(init), Some(&last)) => last >= init,
            (None, Some(_)) => false,
        }
    }

    /// Human-readable title, e.g. `Training mapping f, optimizer = sgd, lr = 0.01, eps = 0.05`.
    pub fn title(&self) -> String {
        let head = match self.phase {
            TrainPhase::Dual => "Training dual parameters (u, v)",
            TrainPhase::Mapping => "Training mapping f",
        };
        format!(
            "{head}, optimizer = {}, lr = {}, eps = {}",
            self.optimizer, self.lr, self.eps
        )
    }

    /// Write `iter,batch,validation` rows (with a header).
    pub fn write_csv<W: Write>(&self, mut w: W) -> Result<()> {
        writeln!(w, "iter,batch,validation")?;
        for (i, (b, v)) in self.batch.iter().zip(&self.validation).enumerate() {
            writeln!(w, "{i},{b},{v}")?;
        }
        Ok(())
    }
}

/// Source samples, target samples, and the map's image of the source samples (all 2-D).
#[derive(Debug, Clone)]
pub struct MappingScatter {
    pub mu: Array2<f32>,
    pub nu: Array2<f32>,
    pub mapped: Array2<f32>,
}

impl MappingScatter {
    fn series(&self) -> [(&'static str, &Array2<f32>); 3] {
        [("mu", &self.mu), ("nu", &self.nu), ("mapped", &self.mapped)]
    }

    /// Write `series,x,y` rows (with a header); series are `mu`, `nu`, `mapped`.
    ///
    /// Fails with [`Error::Shape`] before writing anything if a series is not 2-D.
    pub fn write_csv<W: Write>(&self, mut w: W) -> Result<()> {
        if self.series().iter().any(|(_, pts)| pts.ncols() != 2) {
            return Err(Error::Shape("scatter series must have exactly 2 columns"));
        }
        writeln!(w, "series,x,y")?;
        for (name, pts) in self.series() {
            for row in pts.rows() {
                writeln!(w, "{name},{},{}", row[0], row[1])?;
            }
        }
        Ok(())
    }
}
