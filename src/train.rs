//! SGD loops for the two-step scheme: fit the dual potentials, then fit the map.
//!
//! Both loops draw independent batches `x ~ μ`, `y ~ ν` every step, so pairs `(x_i, y_i)`
//! are samples of \(\mu \otimes \nu\). The regularized plan enters only through the
//! per-pair weight \(H_\varepsilon\).
//!
//! The contract is the same as the rest of the crate: deterministic given the seed,
//! no hidden normalization, losses recorded every step.

use crate::diagnostics::{LossCurve, TrainPhase};
use crate::evaluator::NeuralOt;
use crate::map::{TrainableMap, TransportMap};
use crate::potential::{DualPotential, TrainablePotential};
use crate::sampler::Sampler;
use crate::{Error, Result};
use ndarray::Array2;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

const LOG_EVERY: usize = 100;

/// Training configuration for the dual phase.
///
/// The default `lr` suits `ε ≈ 1` on unit-scale data. With small `ε` (in particular
/// entropic mode) the first steps overshoot; lower `lr` or rescale the data, and check
/// [`LossCurve::stalled`] on the result.
#[derive(Debug, Clone)]
pub struct DualTrainConfig {
    /// SGD learning rate for both potentials.
    pub lr: f32,
    /// Number of SGD steps.
    pub steps: usize,
    /// Pairs per batch.
    pub batch_size: usize,
    /// RNG seed.
    pub seed: u64,
}

impl Default for DualTrainConfig {
    fn default() -> Self {
        Self {
            lr: 1e-2,
            steps: 2_000,
            batch_size: 64,
            seed: 123,
        }
    }
}

/// Training configuration for the mapping phase.
#[derive(Debug, Clone)]
pub struct MapTrainConfig {
    /// SGD learning rate for the map.
    pub lr: f32,
    /// Number of SGD steps.
    pub steps: usize,
    /// Pairs per batch.
    pub batch_size: usize,
    /// RNG seed.
    pub seed: u64,
}

impl Default for MapTrainConfig {
    fn default() -> Self {
        Self {
            lr: 1e-2,
            steps: 1_000,
            batch_size: 64,
            seed: 321,
        }
    }
}

/// Fixed validation pairs, drawn once and reused across steps and phases.
#[derive(Debug, Clone)]
pub struct Validation {
    pub x: Array2<f32>,
    pub y: Array2<f32>,
}

impl Validation {
    pub fn sample(mu: &Sampler, nu: &Sampler, n: usize, seed: u64) -> Result<Self> {
        check_samplers(mu, nu)?;
        if n == 0 {
            return Err(Error::Domain("validation size must be >= 1"));
        }
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        Ok(Self {
            x: mu.sample(n, &mut rng)?,
            y: nu.sample(n, &mut rng)?,
        })
    }
}

fn check_samplers(mu: &Sampler, nu: &Sampler) -> Result<()> {
    if mu.dim() != nu.dim() {
        return Err(Error::Shape("μ and ν samplers must have the same dimension"));
    }
    Ok(())
}

fn check_loop(lr: f32, steps: usize, batch_size: usize) -> Result<()> {
    if steps == 0 || batch_size == 0 {
        return Err(Error::Domain("steps and batch_size must be >= 1"));
    }
    if !lr.is_finite() || lr <= 0.0 {
        return Err(Error::Domain("lr must be positive and finite"));
    }
    Ok(())
}

/// Dual loss of the current potentials on the validation pairs.
pub fn validation_dual_loss<M, U, V>(ot: &NeuralOt<M>, u: &U, v: &V, val: &Validation) -> f32
where
    M: TransportMap,
    U: DualPotential,
    V: DualPotential,
{
    let uv = u.eval(&val.x.view());
    let vv = v.eval(&val.y.view());
    ot.dual_loss(&uv.view(), &vv.view(), &val.x.view(), &val.y.view())
}

/// Mapping loss of the evaluator's current map on the validation pairs.
pub fn validation_mapping_loss<M, U, V>(ot: &NeuralOt<M>, u: &U, v: &V, val: &Validation) -> f32
where
    M: TransportMap,
    U: DualPotential,
    V: DualPotential,
{
    let uv = u.eval(&val.x.view());
    let vv = v.eval(&val.y.view());
    let mapped = ot.apply_map(&val.x.view());
    ot.mapping_loss(
        &uv.view(),
        &vv.view(),
        &val.x.view(),
        &val.y.view(),
        &mapped.view(),
    )
}

/// Maximize the regularized dual over `(u, v)` by SGD on [`NeuralOt::dual_loss`].
pub fn train_dual<M, U, V>(
    ot: &NeuralOt<M>,
    mu: &Sampler,
    nu: &Sampler,
    u: &mut U,
    v: &mut V,
    cfg: &DualTrainConfig,
    val: &Validation,
) -> Result<LossCurve>
where
    M: TransportMap,
    U: TrainablePotential,
    V: TrainablePotential,
{
    check_samplers(mu, nu)?;
    check_loop(cfg.lr, cfg.steps, cfg.batch_size)?;

    let mut curve = LossCurve::new(TrainPhase::Dual, "sgd", cfg.lr, ot.config().eps);
    curve.set_initial(validation_dual_loss(ot, u, v, val));
    let mut rng = ChaCha8Rng::seed_from_u64(cfg.seed);
    log::info!(
        "{:<32}{:<16}{:<16}",
        "training dual potentials",
        format!("steps={}", cfg.steps),
        format!("batch={}", cfg.batch_size)
    );

    for step in 0..cfg.steps {
        let x = mu.sample(cfg.batch_size, &mut rng)?;
        let y = nu.sample(cfg.batch_size, &mut rng)?;
        let uv = u.eval(&x.view());
        let vv = v.eval(&y.view());

        let loss = ot.dual_loss(&uv.view(), &vv.view(), &x.view(), &y.view());
        // ∂loss/∂u_i and ∂loss/∂v_i coincide.
        let grad = ot.dual_loss_grad(&uv.view(), &vv.view(), &x.view(), &y.view());
        u.sgd_step(&x.view(), &grad.view(), cfg.lr);
        v.sgd_step(&y.view(), &grad.view(), cfg.lr);

        let val_loss = validation_dual_loss(ot, u, v, val);
        curve.push(loss, val_loss);
        if !val_loss.is_finite() {
            log::warn!("dual validation loss is not finite at step {step}; consider a larger eps");
        }
        if step % LOG_EVERY == 0 {
            log::debug!("dual step {step:>6} batch {loss:>12.5} validation {val_loss:>12.5}");
        }
    }

    if let Some((last, last_val)) = curve.last() {
        log::info!("{:<32}{:<16}{:<16}", "finished dual potentials", last, last_val);
    }
    if curve.stalled() {
        log::warn!(
            "dual validation loss did not drop below its initial value (eps={}, lr={}); lower lr or rescale the data",
            ot.config().eps,
            cfg.lr
        );
    }
    Ok(curve)
}

/// Fit the evaluator's map against fixed potentials by SGD on [`NeuralOt::mapping_loss`].
pub fn train_map<M, U, V>(
    ot: &mut NeuralOt<M>,
    mu: &Sampler,
    nu: &Sampler,
    u: &U,
    v: &V,
    cfg: &MapTrainConfig,
    val: &Validation,
) -> Result<LossCurve>
where
    M: TrainableMap,
    U: DualPotential,
    V: DualPotential,
{
    check_samplers(mu, nu)?;
    check_loop(cfg.lr, cfg.steps, cfg.batch_size)?;

    let mut curve = LossCurve::new(TrainPhase::Mapping, "sgd", cfg.lr, ot.config().eps);
    curve.set_initial(validation_mapping_loss(ot, u, v, val));
    let mut rng = ChaCha8Rng::seed_from_u64(cfg.seed);
    ot.map_mut().set_training(true);
    log::info!(
        "{:<32}{:<16}{:<16}",
        "training transport map",
        format!("steps={}", cfg.steps),
        format!("batch={}", cfg.batch_size)
    );

    for step in 0..cfg.steps {
        let x = mu.sample(cfg.batch_size, &mut rng)?;
        let y = nu.sample(cfg.batch_size, &mut rng)?;
        let uv = u.eval(&x.view());
        let vv = v.eval(&y.view());
        let mapped = ot.apply_map(&x.view());

        let loss = ot.mapping_loss(&uv.view(), &vv.view(), &x.view(), &y.view(), &mapped.view());
        let grad = ot.mapping_loss_grad(
            &uv.view(),
            &vv.view(),
            &x.view(),
            &y.view(),
            &mapped.view(),
        );
        ot.map_mut().sgd_step(&x.view(), &grad.view(), cfg.lr);

        let val_loss = validation_mapping_loss(ot, u, v, val);
        curve.push(loss, val_loss);
        if step % LOG_EVERY == 0 {
            log::debug!("map step {step:>6} batch {loss:>12.5} validation {val_loss:>12.5}");
        }
    }

    if let Some((last, last_val)) = curve.last() {
        log::info!("{:<32}{:<16}{:<16}", "finished transport map", last, last_val);
    }
    if curve.batch.iter().all(|&l| l == 0.0) {
        log::warn!("H_eps vanished on every batch; the map was never updated");
    } else if curve.stalled() {
        log::warn!("mapping validation loss did not drop below its initial value");
    }
    Ok(curve)
}
