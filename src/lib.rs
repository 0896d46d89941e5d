//! # neural-ot
//!
//! Regularized optimal transport duals and transport-map fitting (Seguy et al. style).
//!
//! The crate is intentionally small:
//!
//! - it evaluates the **regularized OT dual loss** for a pair of dual potentials \((u, v)\),
//! - it evaluates the **mapping-fitting loss** that trains a transport map \(f\) against
//!   fixed potentials,
//! - it ships boring CPU baselines (quadratic potentials, affine maps) and SGD loops so the
//!   whole two-step scheme runs without an ML framework.
//!
//! ## Public invariants (must not change)
//!
//! - **Only squared Euclidean ground cost.** Cost types are a closed enum; unsupported names
//!   fail at parse time with [`Error::Config`].
//! - **No hidden stabilization**: the entropic formulas are evaluated directly, so
//!   `exp((u + v - c) / ε)` can overflow for small `ε`. Scale your data.
//! - **Determinism knobs are explicit**: training configs carry a `seed`.
//! - **Backend-agnostic by default**: the default feature set uses `ndarray` only.
//!   - The `burn` feature adds autodiff tensor versions of the losses and MLP training loops.
//!
//! ## The two losses
//!
//! With \(c(x, y) = \|x - y\|^2\) and \(t = u(x) + v(y) - c(x, y)\):
//!
//! | mode | \(H_\varepsilon(t)\) | \(F_\varepsilon(t)\) |
//! |---|---|---|
//! | quadratic | \(\max(t, 0) / (2\varepsilon)\) | \(-\max(t, 0)^2 / (4\varepsilon)\) |
//! | entropic | \(\exp(t / \varepsilon)\) | \(-\varepsilon \exp(t / \varepsilon)\) |
//!
//! - dual loss: \(-\operatorname{mean}(u + v + F_\varepsilon)\) (minimizing it maximizes the dual),
//! - mapping loss: \(\operatorname{mean}(\|y - f(x)\|^2 \cdot H_\varepsilon)\).
//!
//! Note \(\partial F_\varepsilon / \partial t = -H_\varepsilon\) in both modes, which is what
//! [`evaluator::NeuralOt::dual_loss_grad`] uses.
//!
//! ## References
//!
//! - Seguy et al., *Large-Scale Optimal Transport and Mapping Estimation* (ICLR 2018):
//!   the dual SGD scheme and the barycentric mapping loss.
//! - Genevay et al., *Stochastic Optimization for Large-scale Optimal Transport* (NeurIPS 2016).
//! - Peyré & Cuturi, *Computational Optimal Transport* (2019).
//!
//! ## Module map
//!
//! - `config`: regularization mode, cost types, precision, compute target, `NeuralOtConfig`
//! - `cost`: pairwise squared distances
//! - `regularizer`: \(H_\varepsilon\), \(F_\varepsilon\)
//! - `evaluator`: `NeuralOt`, the loss evaluator
//! - `potential` / `map`: traits + CPU baselines
//! - `sampler`: seeded Gaussian / Gaussian-ring samplers
//! - `train`: dual and mapping SGD loops
//! - `diagnostics`: loss curves and 2-D mapping scatters (CSV export)
//! - `metrics`: map-quality metrics (entropic OT cost, sliced Wasserstein)
//! - `burn_ot` (feature `burn`): tensor losses, MLP potentials and maps, Adam loops

pub mod config;
pub mod cost;
pub mod diagnostics;
pub mod evaluator;
pub mod map;
pub mod metrics;
pub mod potential;
pub mod regularizer;
pub mod sampler;
pub mod train;

#[cfg(feature = "burn")]
pub mod burn_ot;

pub use config::{ComputeTarget, CostType, NeuralOtConfig, Precision, RegMode};
pub use evaluator::NeuralOt;

/// neural-ot error variants.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid {field} `{value}`: allowed values are {allowed}")]
    Config {
        field: &'static str,
        value: String,
        allowed: String,
    },
    #[error("shape mismatch: {0}")]
    Shape(&'static str),
    #[error("domain error: {0}")]
    Domain(&'static str),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
