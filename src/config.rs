//! Evaluator configuration: closed variant types plus the immutable `NeuralOtConfig`.
//!
//! Names arrive as strings from experiment scripts; parsing is where invalid values are
//! rejected. Once a `NeuralOtConfig` exists, every field is a valid variant by construction.

use crate::{Error, Result};
use core::fmt;
use core::str::FromStr;

fn allowed_list(names: &[&str]) -> String {
    names
        .iter()
        .map(|n| format!("`{n}`"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Regularization applied to the OT dual.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RegMode {
    /// Squared-norm (L2) regularization; yields sparse plans.
    #[default]
    Quadratic,
    /// Entropic (KL) regularization; Sinkhorn-type dual.
    Entropic,
}

impl RegMode {
    pub const ALL: [RegMode; 2] = [RegMode::Quadratic, RegMode::Entropic];

    pub fn name(self) -> &'static str {
        match self {
            RegMode::Quadratic => "quadratic",
            RegMode::Entropic => "entropic",
        }
    }
}

impl fmt::Display for RegMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RegMode {
    type Err = Error;

    /// Accepts `quadratic`/`l2` and `entropic`/`entropy` (case-insensitive).
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "quadratic" | "l2" => Ok(RegMode::Quadratic),
            "entropic" | "entropy" => Ok(RegMode::Entropic),
            _ => Err(Error::Config {
                field: "reg_mode",
                value: s.to_string(),
                allowed: allowed_list(&RegMode::ALL.map(RegMode::name)),
            }),
        }
    }
}

/// Ground cost used for the coupling cost `c` and for the mapping cost `d`.
///
/// Currently a singleton set. Adding a variant (e.g. `L1`) makes every `match` on it
/// a compile error until the new cost is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CostType {
    /// \(\|x - y\|_2^2\).
    #[default]
    SquaredEuclidean,
}

impl CostType {
    pub const ALL: [CostType; 1] = [CostType::SquaredEuclidean];

    pub fn name(self) -> &'static str {
        match self {
            CostType::SquaredEuclidean => "squared_euclidean",
        }
    }

    fn parse_field(s: &str, field: &'static str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "squared_euclidean" | "sqeuclidean" | "l2" => Ok(CostType::SquaredEuclidean),
            _ => Err(Error::Config {
                field,
                value: s.to_string(),
                allowed: allowed_list(&CostType::ALL.map(CostType::name)),
            }),
        }
    }
}

impl fmt::Display for CostType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CostType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        CostType::parse_field(s, "cost_type")
    }
}

/// Accumulator width for batch means.
///
/// Per-sample values are always `f32`; `F64` only widens the reductions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Precision {
    #[default]
    F32,
    F64,
}

impl Precision {
    pub const ALL: [Precision; 2] = [Precision::F32, Precision::F64];

    pub fn name(self) -> &'static str {
        match self {
            Precision::F32 => "f32",
            Precision::F64 => "f64",
        }
    }

    /// Mean of `xs` accumulated at this precision. Empty input gives `NaN`.
    pub fn mean(self, xs: impl IntoIterator<Item = f32>) -> f32 {
        match self {
            Precision::F32 => {
                let (mut s, mut n) = (0.0f32, 0usize);
                for x in xs {
                    s += x;
                    n += 1;
                }
                s / n as f32
            }
            Precision::F64 => {
                let (mut s, mut n) = (0.0f64, 0usize);
                for x in xs {
                    s += x as f64;
                    n += 1;
                }
                (s / n as f64) as f32
            }
        }
    }
}

impl FromStr for Precision {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "f32" | "float32" => Ok(Precision::F32),
            "f64" | "float64" => Ok(Precision::F64),
            _ => Err(Error::Config {
                field: "precision",
                value: s.to_string(),
                allowed: allowed_list(&Precision::ALL.map(Precision::name)),
            }),
        }
    }
}

/// Where the transport map should live.
///
/// The `ndarray` baselines are host-only and treat every target as `Cpu`; backends with
/// real devices (see the `burn` feature) map this onto their own device type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ComputeTarget {
    #[default]
    Cpu,
    Accelerator(usize),
}

impl fmt::Display for ComputeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComputeTarget::Cpu => f.write_str("cpu"),
            ComputeTarget::Accelerator(i) => write!(f, "accelerator:{i}"),
        }
    }
}

impl FromStr for ComputeTarget {
    type Err = Error;

    /// Accepts `cpu`, `cuda`, `gpu`, `cuda:N`, `gpu:N`.
    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_ascii_lowercase();
        let err = || Error::Config {
            field: "target",
            value: s.to_string(),
            allowed: "`cpu`, `cuda[:N]`, `gpu[:N]`".to_string(),
        };
        match lower.split_once(':') {
            None => match lower.as_str() {
                "cpu" => Ok(ComputeTarget::Cpu),
                "cuda" | "gpu" => Ok(ComputeTarget::Accelerator(0)),
                _ => Err(err()),
            },
            Some((kind, ordinal)) if kind == "cuda" || kind == "gpu" => ordinal
                .parse::<usize>()
                .map(ComputeTarget::Accelerator)
                .map_err(|_| err()),
            Some(_) => Err(err()),
        }
    }
}

/// Immutable evaluator configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct NeuralOtConfig {
    /// Regularization mode of the dual.
    pub reg_mode: RegMode,
    /// Regularization strength `ε` (positive, finite).
    pub eps: f32,
    /// Ground cost `c` inside the coupling term.
    pub coupling_cost: CostType,
    /// Cost `d` between targets and mapped points in the mapping loss.
    pub mapping_cost: CostType,
    /// Accumulator width for batch means.
    pub precision: Precision,
    /// Placement of the transport map.
    pub target: ComputeTarget,
}

impl NeuralOtConfig {
    pub const DEFAULT_EPS: f32 = 0.05;

    /// Build a config from string names, as an experiment script would pass them.
    ///
    /// Fails with [`Error::Config`] naming the first offending field.
    pub fn from_names(
        reg_mode: &str,
        eps: f32,
        coupling_cost: &str,
        mapping_cost: &str,
    ) -> Result<Self> {
        let cfg = Self {
            reg_mode: reg_mode.parse()?,
            eps,
            coupling_cost: CostType::parse_field(coupling_cost, "coupling_cost")?,
            mapping_cost: CostType::parse_field(mapping_cost, "mapping_cost")?,
            ..Default::default()
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn with_reg_mode(mut self, reg_mode: RegMode) -> Self {
        self.reg_mode = reg_mode;
        self
    }

    pub fn with_eps(mut self, eps: f32) -> Self {
        self.eps = eps;
        self
    }

    pub fn with_precision(mut self, precision: Precision) -> Self {
        self.precision = precision;
        self
    }

    pub fn with_target(mut self, target: ComputeTarget) -> Self {
        self.target = target;
        self
    }

    /// Check the numeric fields (the enum fields are valid by construction).
    pub fn validate(&self) -> Result<()> {
        if !self.eps.is_finite() || self.eps <= 0.0 {
            return Err(Error::Config {
                field: "eps",
                value: self.eps.to_string(),
                allowed: "positive finite reals".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for NeuralOtConfig {
    fn default() -> Self {
        Self {
            reg_mode: RegMode::default(),
            eps: Self::DEFAULT_EPS,
            coupling_cost: CostType::default(),
            mapping_cost: CostType::default(),
            precision: Precision::default(),
            target: ComputeTarget::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reg_mode_accepts_aliases() {
        assert_eq!("l2".parse::<RegMode>().unwrap(), RegMode::Quadratic);
        assert_eq!("Entropy".parse::<RegMode>().unwrap(), RegMode::Entropic);
        assert_eq!("entropic".parse::<RegMode>().unwrap(), RegMode::Entropic);
    }

    #[test]
    fn unknown_reg_mode_lists_both_modes() {
        let err = "uniform".parse::<RegMode>().unwrap_err();
        match err {
            Error::Config {
                field,
                value,
                allowed,
            } => {
                assert_eq!(field, "reg_mode");
                assert_eq!(value, "uniform");
                assert!(allowed.contains("quadratic"));
                assert!(allowed.contains("entropic"));
            }
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn mapping_cost_l1_is_rejected_with_field_name() {
        let err = NeuralOtConfig::from_names("quadratic", 0.1, "l2", "L1").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("mapping_cost"), "{msg}");
        assert!(msg.contains("`squared_euclidean`"), "{msg}");
        assert!(msg.contains("L1"), "{msg}");
    }

    #[test]
    fn eps_must_be_positive_and_finite() {
        for eps in [0.0, -1.0, f32::NAN, f32::INFINITY] {
            assert!(NeuralOtConfig::from_names("quadratic", eps, "l2", "l2").is_err());
        }
    }

    #[test]
    fn compute_target_parsing() {
        assert_eq!("cpu".parse::<ComputeTarget>().unwrap(), ComputeTarget::Cpu);
        assert_eq!(
            "cuda:1".parse::<ComputeTarget>().unwrap(),
            ComputeTarget::Accelerator(1)
        );
        assert_eq!(
            "gpu".parse::<ComputeTarget>().unwrap(),
            ComputeTarget::Accelerator(0)
        );
        assert!("tpu".parse::<ComputeTarget>().is_err());
        assert!("cuda:x".parse::<ComputeTarget>().is_err());
    }

    #[test]
    fn precision_mean_agrees_on_small_inputs() {
        let xs = [1.0f32, 2.0, 3.0, 4.0];
        assert_eq!(Precision::F32.mean(xs), 2.5);
        assert_eq!(Precision::F64.mean(xs), 2.5);
        assert!(Precision::F64.mean(core::iter::empty()).is_nan());
    }
}
