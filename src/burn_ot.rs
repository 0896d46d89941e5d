//! Burn-backed (opt-in) regularized OT losses and MLP training loops.
//!
//! The ndarray evaluator supplies analytic sensitivities for its baselines. Here the same
//! formulas are written on autodiff tensors instead, so MLP potentials and an MLP transport
//! map can be trained by letting Burn differentiate through the scalar losses.
//!
//! Shapes:
//! - samples `x`, `y`, `mapped`: `[batch, d]`
//! - potential values `u`, `v`: `[batch, 1]` (column vectors)

use burn_core as burn;

use burn::module::Module;
use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};
use burn_autodiff::Autodiff;
use burn_ndarray::NdArray;
use burn_nn::{Linear, LinearConfig, Relu};
use burn_optim::{AdamConfig, GradientsParams, LearningRate, Optimizer};
use ndarray::{Array2, ArrayView2};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::config::{ComputeTarget, CostType, NeuralOtConfig, RegMode};
use crate::diagnostics::{LossCurve, TrainPhase};
use crate::sampler::Sampler;
use crate::train::Validation;
use crate::{Error, Result};

/// Default burn backend: ndarray + autodiff.
pub type BurnBackend = Autodiff<NdArray<f32>>;

/// Two-layer ReLU MLP, used as transport map (`d → d`) or dual potential (`d → 1`).
#[derive(Module, Debug)]
pub struct BurnMlp<B: Backend> {
    l1: Linear<B>,
    l2: Linear<B>,
}

impl<B: Backend> BurnMlp<B> {
    pub fn new(device: &B::Device, d_in: usize, hidden: usize, d_out: usize) -> Self {
        let l1 = LinearConfig::new(d_in, hidden).init(device);
        let l2 = LinearConfig::new(hidden, d_out).init(device);
        Self { l1, l2 }
    }

    /// A transport map on `R^d`.
    pub fn map(device: &B::Device, d: usize, hidden: usize) -> Self {
        Self::new(device, d, hidden, d)
    }

    /// A scalar dual potential on `R^d`.
    pub fn potential(device: &B::Device, d: usize, hidden: usize) -> Self {
        Self::new(device, d, hidden, 1)
    }

    pub fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        let h = Relu.forward(self.l1.forward(x));
        self.l2.forward(h)
    }
}

/// The pair of dual potentials `(u, v)`, trained jointly.
#[derive(Module, Debug)]
pub struct DualPair<B: Backend> {
    pub u: BurnMlp<B>,
    pub v: BurnMlp<B>,
}

impl<B: Backend> DualPair<B> {
    pub fn new(device: &B::Device, d: usize, hidden: usize) -> Self {
        Self {
            u: BurnMlp::potential(device, d, hidden),
            v: BurnMlp::potential(device, d, hidden),
        }
    }
}

/// Row-wise squared distance, `[batch, 1]`.
pub fn sq_dist_rows_t<B: Backend>(x: Tensor<B, 2>, y: Tensor<B, 2>) -> Tensor<B, 2> {
    (x - y).powf_scalar(2.0).sum_dim(1)
}

/// \(H_\varepsilon\) applied to a slack tensor.
pub fn h_eps_t<B: Backend>(mode: RegMode, eps: f32, t: Tensor<B, 2>) -> Tensor<B, 2> {
    match mode {
        RegMode::Quadratic => t.clamp_min(0.0).div_scalar(2.0 * eps),
        RegMode::Entropic => t.div_scalar(eps).exp(),
    }
}

/// \(F_\varepsilon\) applied to a slack tensor.
pub fn f_eps_t<B: Backend>(mode: RegMode, eps: f32, t: Tensor<B, 2>) -> Tensor<B, 2> {
    match mode {
        RegMode::Quadratic => t
            .clamp_min(0.0)
            .powf_scalar(2.0)
            .div_scalar(4.0 * eps)
            .neg(),
        RegMode::Entropic => t.div_scalar(eps).exp().mul_scalar(-eps),
    }
}

/// Tensor form of the dual loss, \(-\operatorname{mean}(u + v + F_\varepsilon)\), shape `[1]`.
pub fn dual_loss_t<B: Backend>(
    mode: RegMode,
    eps: f32,
    u: Tensor<B, 2>,
    v: Tensor<B, 2>,
    c: Tensor<B, 2>,
) -> Tensor<B, 1> {
    let t = u.clone() + v.clone() - c;
    (u + v + f_eps_t(mode, eps, t)).mean().neg()
}

/// Tensor form of the mapping loss, \(\operatorname{mean}(d \cdot H_\varepsilon)\), shape `[1]`.
///
/// `c` is the coupling cost `c(x, y)`, `d` the mapping cost `d(y, f(x))`.
pub fn mapping_loss_t<B: Backend>(
    mode: RegMode,
    eps: f32,
    u: Tensor<B, 2>,
    v: Tensor<B, 2>,
    c: Tensor<B, 2>,
    d: Tensor<B, 2>,
) -> Tensor<B, 1> {
    (d * h_eps_t(mode, eps, u + v - c)).mean()
}

/// Tensor counterpart of [`crate::NeuralOt`], owning an MLP transport map on `device`.
#[derive(Debug)]
pub struct BurnNeuralOt<B: Backend> {
    config: NeuralOtConfig,
    device: B::Device,
    map: BurnMlp<B>,
}

impl<B: Backend> BurnNeuralOt<B> {
    /// Validate `config` and move `map` to `device`.
    ///
    /// Placement follows `device`, not `config.target`; a non-`Cpu` target is logged so
    /// the two can be told apart.
    pub fn new(config: NeuralOtConfig, map: BurnMlp<B>, device: B::Device) -> Result<Self> {
        config.validate()?;
        if config.target != ComputeTarget::Cpu {
            log::debug!(
                "burn evaluator: config target {} is not used, placing map on {:?}",
                config.target,
                device
            );
        }
        let map = map.to_device(&device);
        Ok(Self {
            config,
            device,
            map,
        })
    }

    pub fn config(&self) -> &NeuralOtConfig {
        &self.config
    }

    pub fn device(&self) -> &B::Device {
        &self.device
    }

    pub fn map(&self) -> &BurnMlp<B> {
        &self.map
    }

    /// Swap in a new map (moved to this evaluator's device); returns the old one.
    pub fn replace_map(&mut self, map: BurnMlp<B>) -> BurnMlp<B> {
        std::mem::replace(&mut self.map, map.to_device(&self.device))
    }

    fn coupling_cost(&self, x: Tensor<B, 2>, y: Tensor<B, 2>) -> Tensor<B, 2> {
        match self.config.coupling_cost {
            CostType::SquaredEuclidean => sq_dist_rows_t(x, y),
        }
    }

    fn slack(
        &self,
        u: Tensor<B, 2>,
        v: Tensor<B, 2>,
        x: Tensor<B, 2>,
        y: Tensor<B, 2>,
    ) -> Tensor<B, 2> {
        u + v - self.coupling_cost(x, y)
    }

    pub fn h_eps_batch(
        &self,
        u: Tensor<B, 2>,
        v: Tensor<B, 2>,
        x: Tensor<B, 2>,
        y: Tensor<B, 2>,
    ) -> Tensor<B, 2> {
        let t = self.slack(u, v, x, y);
        h_eps_t(self.config.reg_mode, self.config.eps, t)
    }

    pub fn f_eps_batch(
        &self,
        u: Tensor<B, 2>,
        v: Tensor<B, 2>,
        x: Tensor<B, 2>,
        y: Tensor<B, 2>,
    ) -> Tensor<B, 2> {
        let t = self.slack(u, v, x, y);
        f_eps_t(self.config.reg_mode, self.config.eps, t)
    }

    /// \(-\operatorname{mean}(u + v + F_\varepsilon)\), shape `[1]`.
    pub fn dual_loss(
        &self,
        u: Tensor<B, 2>,
        v: Tensor<B, 2>,
        x: Tensor<B, 2>,
        y: Tensor<B, 2>,
    ) -> Tensor<B, 1> {
        let c = self.coupling_cost(x, y);
        dual_loss_t(self.config.reg_mode, self.config.eps, u, v, c)
    }

    /// \(\operatorname{mean}(d(y, f(x)) \cdot H_\varepsilon)\), shape `[1]`.
    pub fn mapping_loss(
        &self,
        u: Tensor<B, 2>,
        v: Tensor<B, 2>,
        x: Tensor<B, 2>,
        y: Tensor<B, 2>,
        mapped: Tensor<B, 2>,
    ) -> Tensor<B, 1> {
        let d = match self.config.mapping_cost {
            CostType::SquaredEuclidean => sq_dist_rows_t(y.clone(), mapped),
        };
        let c = self.coupling_cost(x, y);
        mapping_loss_t(self.config.reg_mode, self.config.eps, u, v, c, d)
    }
}

/// Training configuration for the Burn loops.
#[derive(Debug, Clone)]
pub struct BurnTrainConfig {
    /// Adam learning rate.
    pub lr: LearningRate,
    /// Number of optimizer steps.
    pub steps: usize,
    /// Pairs per batch.
    pub batch_size: usize,
    /// Seed for batch sampling.
    pub seed: u64,
}

impl Default for BurnTrainConfig {
    fn default() -> Self {
        Self {
            lr: 1e-3,
            steps: 1_000,
            batch_size: 128,
            seed: 123,
        }
    }
}

/// Copy an `(n, d)` ndarray batch into a Burn tensor.
pub fn to_tensor<B: Backend>(device: &B::Device, x: &ArrayView2<f32>) -> Tensor<B, 2> {
    let (n, d) = x.dim();
    let data = TensorData::new(x.iter().copied().collect::<Vec<f32>>(), [n, d]);
    Tensor::from_data(data, device)
}

/// Copy a `[n, d]` Burn tensor back into ndarray.
pub fn to_array<B: Backend>(x: Tensor<B, 2>) -> Result<Array2<f32>> {
    let [n, d] = x.dims();
    let flat = x
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|_| Error::Domain("tensor data is not convertible to f32"))?;
    Array2::from_shape_vec((n, d), flat).map_err(|_| Error::Shape("tensor data length mismatch"))
}

fn scalar<B: Backend>(t: Tensor<B, 1>) -> Result<f32> {
    t.into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|_| Error::Domain("loss is not convertible to f32"))?
        .first()
        .copied()
        .ok_or(Error::Shape("loss tensor is empty"))
}

fn check_cfg(cfg: &BurnTrainConfig, mu: &Sampler, nu: &Sampler) -> Result<()> {
    if mu.dim() != nu.dim() {
        return Err(Error::Shape("μ and ν samplers must have the same dimension"));
    }
    if cfg.steps == 0 || cfg.batch_size == 0 {
        return Err(Error::Domain("steps and batch_size must be >= 1"));
    }
    if !cfg.lr.is_finite() || cfg.lr <= 0.0 {
        return Err(Error::Domain("lr must be positive and finite"));
    }
    Ok(())
}

/// Train MLP dual potentials with Adam on the dual loss.
pub fn train_dual_burn(
    ot: &BurnNeuralOt<BurnBackend>,
    duals: DualPair<BurnBackend>,
    mu: &Sampler,
    nu: &Sampler,
    cfg: &BurnTrainConfig,
    val: &Validation,
) -> Result<(DualPair<BurnBackend>, LossCurve)> {
    check_cfg(cfg, mu, nu)?;
    let device = ot.device().clone();
    let mut duals = duals.to_device(&device);
    let mut optim = AdamConfig::new().init::<BurnBackend, DualPair<BurnBackend>>();
    let mut rng = ChaCha8Rng::seed_from_u64(cfg.seed);
    let mut curve = LossCurve::new(TrainPhase::Dual, "adam", cfg.lr as f32, ot.config().eps);

    let xv = to_tensor::<BurnBackend>(&device, &val.x.view());
    let yv = to_tensor::<BurnBackend>(&device, &val.y.view());
    let u0 = duals.u.forward(xv.clone()).detach();
    let v0 = duals.v.forward(yv.clone()).detach();
    curve.set_initial(scalar(ot.dual_loss(u0, v0, xv.clone(), yv.clone()))?);

    log::info!("{:<32}{:<16}", "training dual potentials (burn)", cfg.steps);
    for step in 0..cfg.steps {
        let x = to_tensor::<BurnBackend>(&device, &mu.sample(cfg.batch_size, &mut rng)?.view());
        let y = to_tensor::<BurnBackend>(&device, &nu.sample(cfg.batch_size, &mut rng)?.view());

        let u = duals.u.forward(x.clone());
        let v = duals.v.forward(y.clone());
        let loss = ot.dual_loss(u, v, x, y);
        let batch_loss = scalar(loss.clone())?;

        let grads = loss.backward();
        let grads = GradientsParams::from_grads(grads, &duals);
        duals = optim.step(cfg.lr, duals, grads);

        let uv = duals.u.forward(xv.clone()).detach();
        let vv = duals.v.forward(yv.clone()).detach();
        let val_loss = scalar(ot.dual_loss(uv, vv, xv.clone(), yv.clone()))?;
        curve.push(batch_loss, val_loss);
        if step % 100 == 0 {
            log::debug!("burn dual step {step:>6} batch {batch_loss:>12.5} validation {val_loss:>12.5}");
        }
    }
    Ok((duals, curve))
}

/// Train the evaluator's MLP map with Adam on the mapping loss, potentials held fixed.
pub fn train_map_burn(
    ot: &mut BurnNeuralOt<BurnBackend>,
    duals: &DualPair<BurnBackend>,
    mu: &Sampler,
    nu: &Sampler,
    cfg: &BurnTrainConfig,
    val: &Validation,
) -> Result<LossCurve> {
    check_cfg(cfg, mu, nu)?;
    let device = ot.device().clone();
    let mut map = ot.map().clone();
    let mut optim = AdamConfig::new().init::<BurnBackend, BurnMlp<BurnBackend>>();
    let mut rng = ChaCha8Rng::seed_from_u64(cfg.seed);
    let mut curve = LossCurve::new(TrainPhase::Mapping, "adam", cfg.lr as f32, ot.config().eps);

    let xv = to_tensor::<BurnBackend>(&device, &val.x.view());
    let yv = to_tensor::<BurnBackend>(&device, &val.y.view());
    let uv = duals.u.forward(xv.clone()).detach();
    let vv = duals.v.forward(yv.clone()).detach();
    let mapped0 = map.forward(xv.clone()).detach();
    curve.set_initial(scalar(ot.mapping_loss(
        uv.clone(),
        vv.clone(),
        xv.clone(),
        yv.clone(),
        mapped0,
    ))?);

    log::info!("{:<32}{:<16}", "training transport map (burn)", cfg.steps);
    for step in 0..cfg.steps {
        let x = to_tensor::<BurnBackend>(&device, &mu.sample(cfg.batch_size, &mut rng)?.view());
        let y = to_tensor::<BurnBackend>(&device, &nu.sample(cfg.batch_size, &mut rng)?.view());

        let u = duals.u.forward(x.clone()).detach();
        let v = duals.v.forward(y.clone()).detach();
        let mapped = map.forward(x.clone());
        let loss = ot.mapping_loss(u, v, x, y, mapped);
        let batch_loss = scalar(loss.clone())?;

        let grads = loss.backward();
        let grads = GradientsParams::from_grads(grads, &map);
        map = optim.step(cfg.lr, map, grads);

        let mapped_v = map.forward(xv.clone()).detach();
        let val_loss = scalar(ot.mapping_loss(
            uv.clone(),
            vv.clone(),
            xv.clone(),
            yv.clone(),
            mapped_v,
        ))?;
        curve.push(batch_loss, val_loss);
        if step % 100 == 0 {
            log::debug!("burn map step {step:>6} batch {batch_loss:>12.5} validation {val_loss:>12.5}");
        }
    }
    ot.replace_map(map);
    Ok(curve)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::NeuralOt;
    use crate::map::AffineMap;
    use ndarray::{array, Array1};

    type B = BurnBackend;

    fn device() -> <B as Backend>::Device {
        <B as Backend>::Device::default()
    }

    fn column(device: &<B as Backend>::Device, v: &Array1<f32>) -> Tensor<B, 2> {
        let n = v.len();
        Tensor::from_data(TensorData::new(v.to_vec(), [n, 1]), device)
    }

    #[test]
    fn tensor_losses_match_ndarray_losses() {
        let dev = device();
        let x = array![[0.0f32, 0.0], [1.0, 0.0], [0.2, 0.4], [1.0, 1.0]];
        let y = array![[0.5f32, 0.0], [0.0, 1.0], [0.3, 0.3], [1.5, 1.0]];
        let u = array![0.9f32, 0.2, 1.4, -0.3];
        let v = array![0.4f32, 0.1, 0.3, 0.2];
        let mapped = array![[0.4f32, 0.1], [0.2, 0.8], [0.3, 0.2], [1.0, 1.0]];

        for mode in RegMode::ALL {
            let cfg = NeuralOtConfig::default().with_reg_mode(mode).with_eps(0.5);
            let cpu = NeuralOt::new(cfg.clone(), AffineMap::identity(2)).unwrap();
            let gpu =
                BurnNeuralOt::<B>::new(cfg, BurnMlp::map(&dev, 2, 4), dev.clone()).unwrap();

            let want = cpu.dual_loss(&u.view(), &v.view(), &x.view(), &y.view());
            let got = scalar(gpu.dual_loss(
                column(&dev, &u),
                column(&dev, &v),
                to_tensor(&dev, &x.view()),
                to_tensor(&dev, &y.view()),
            ))
            .unwrap();
            assert!((want - got).abs() < 1e-4, "{mode}: {want} vs {got}");

            let want =
                cpu.mapping_loss(&u.view(), &v.view(), &x.view(), &y.view(), &mapped.view());
            let got = scalar(gpu.mapping_loss(
                column(&dev, &u),
                column(&dev, &v),
                to_tensor(&dev, &x.view()),
                to_tensor(&dev, &y.view()),
                to_tensor(&dev, &mapped.view()),
            ))
            .unwrap();
            assert!((want - got).abs() < 1e-4, "{mode}: {want} vs {got}");
        }
    }

    #[test]
    fn tensor_round_trip_preserves_layout() {
        let dev = device();
        let x = array![[1.0f32, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let back = to_array(to_tensor::<B>(&dev, &x.view())).unwrap();
        assert_eq!(back, x);
    }

    #[test]
    fn accelerator_target_still_places_on_the_given_device() {
        let dev = device();
        let cfg = NeuralOtConfig::default().with_target(ComputeTarget::Accelerator(1));
        let mut ot = BurnNeuralOt::<B>::new(cfg, BurnMlp::map(&dev, 2, 4), dev.clone()).unwrap();
        assert_eq!(ot.config().target, ComputeTarget::Accelerator(1));
        ot.replace_map(BurnMlp::map(&dev, 2, 4));
        let x = Tensor::<B, 2>::zeros([3, 2], &dev);
        assert_eq!(ot.map().forward(x).dims(), [3, 2]);
    }

    #[test]
    fn mlp_shapes() {
        let dev = device();
        let x = Tensor::<B, 2>::zeros([5, 3], &dev);
        assert_eq!(BurnMlp::<B>::map(&dev, 3, 8).forward(x.clone()).dims(), [5, 3]);
        assert_eq!(BurnMlp::<B>::potential(&dev, 3, 8).forward(x).dims(), [5, 1]);
    }

    #[test]
    fn burn_training_smoke() {
        let dev = device();
        let mu = Sampler::standard_normal(2);
        let nu = Sampler::Gaussian {
            mean: vec![1.0, 1.0],
            std: 0.5,
        };
        let val = Validation::sample(&mu, &nu, 32, 3).unwrap();
        let cfg = NeuralOtConfig::default().with_eps(1.0);
        let mut ot = BurnNeuralOt::<B>::new(cfg, BurnMlp::map(&dev, 2, 16), dev.clone()).unwrap();
        let train_cfg = BurnTrainConfig {
            steps: 3,
            batch_size: 16,
            ..Default::default()
        };

        let (duals, dual_curve) =
            train_dual_burn(&ot, DualPair::new(&dev, 2, 16), &mu, &nu, &train_cfg, &val).unwrap();
        assert_eq!(dual_curve.len(), 3);
        assert!(dual_curve.initial.is_some());
        let map_curve = train_map_burn(&mut ot, &duals, &mu, &nu, &train_cfg, &val).unwrap();
        assert_eq!(map_curve.len(), 3);
        assert!(map_curve.batch.iter().all(|l| l.is_finite() && *l >= 0.0));
    }
}
