//! The OT loss evaluator.
//!
//! `NeuralOt` bundles a validated [`NeuralOtConfig`] with the current transport map and
//! evaluates the regularized dual formulas batch-wise. Every loss method is a pure function
//! of its arguments; the only mutation is [`NeuralOt::replace_map`].
//!
//! Batch conventions:
//! - `x`: samples from μ, `(n, d)`; `y`: samples from ν, `(n, d)`; pairs are `(x_i, y_i)`.
//! - `u`, `v`: potential values `u(x_i)`, `v(y_i)`, length `n`.
//!
//! Shapes are not validated; mismatches panic inside `ndarray`.

use crate::config::{CostType, NeuralOtConfig};
use crate::cost::{sq_dist, sq_dist_rows};
use crate::diagnostics::MappingScatter;
use crate::map::TransportMap;
use crate::{Error, Result};
use ndarray::{Array1, Array2, ArrayD, ArrayView1, ArrayView2, ArrayViewD, Axis};

/// Regularized OT dual / mapping loss evaluator.
#[derive(Debug, Clone)]
pub struct NeuralOt<M> {
    config: NeuralOtConfig,
    map: M,
}

impl<M: TransportMap> NeuralOt<M> {
    /// Validate `config` and take ownership of the initial map.
    pub fn new(config: NeuralOtConfig, mut map: M) -> Result<Self> {
        config.validate()?;
        map.place(config.target);
        log::debug!(
            "neural-ot evaluator: reg_mode={} eps={} target={}",
            config.reg_mode,
            config.eps,
            config.target
        );
        Ok(Self { config, map })
    }

    pub fn config(&self) -> &NeuralOtConfig {
        &self.config
    }

    pub fn map(&self) -> &M {
        &self.map
    }

    pub fn map_mut(&mut self) -> &mut M {
        &mut self.map
    }

    pub fn into_map(self) -> M {
        self.map
    }

    /// Swap in a new transport map (placed on the configured target); returns the old one.
    pub fn replace_map(&mut self, mut map: M) -> M {
        map.place(self.config.target);
        std::mem::replace(&mut self.map, map)
    }

    /// Apply the current map to a batch.
    pub fn apply_map(&self, x: &ArrayView2<f32>) -> Array2<f32> {
        self.map.apply(x)
    }

    /// Pairwise squared distance; see [`crate::cost::sq_dist`] for the shape rules.
    pub fn sq_dist(&self, x: &ArrayViewD<f32>, y: &ArrayViewD<f32>) -> ArrayD<f32> {
        sq_dist(x, y)
    }

    /// Ground cost `c(x_i, y_i)` per pair.
    fn coupling_cost(&self, x: &ArrayView2<f32>, y: &ArrayView2<f32>) -> Array1<f32> {
        match self.config.coupling_cost {
            CostType::SquaredEuclidean => sq_dist_rows(x, y),
        }
    }

    /// Slack `u + v - c` per pair.
    fn slack(
        &self,
        u: &ArrayView1<f32>,
        v: &ArrayView1<f32>,
        x: &ArrayView2<f32>,
        y: &ArrayView2<f32>,
    ) -> Array1<f32> {
        let c = self.coupling_cost(x, y);
        &(u + v) - &c
    }

    /// \(H_\varepsilon\) per pair (nonnegative).
    pub fn h_eps_batch(
        &self,
        u: &ArrayView1<f32>,
        v: &ArrayView1<f32>,
        x: &ArrayView2<f32>,
        y: &ArrayView2<f32>,
    ) -> Array1<f32> {
        let t = self.slack(u, v, x, y);
        self.config.reg_mode.h_eps_array(&t.view(), self.config.eps)
    }

    /// \(F_\varepsilon\) per pair (nonpositive).
    pub fn f_eps_batch(
        &self,
        u: &ArrayView1<f32>,
        v: &ArrayView1<f32>,
        x: &ArrayView2<f32>,
        y: &ArrayView2<f32>,
    ) -> Array1<f32> {
        let t = self.slack(u, v, x, y);
        self.config.reg_mode.f_eps_array(&t.view(), self.config.eps)
    }

    /// Negative empirical dual objective: \(-\operatorname{mean}(u + v + F_\varepsilon)\).
    ///
    /// Minimizing this maximizes the regularized OT dual.
    pub fn dual_loss(
        &self,
        u: &ArrayView1<f32>,
        v: &ArrayView1<f32>,
        x: &ArrayView2<f32>,
        y: &ArrayView2<f32>,
    ) -> f32 {
        let f = self.f_eps_batch(u, v, x, y);
        let terms = u.iter().zip(v.iter()).zip(f.iter()).map(|((a, b), c)| a + b + c);
        -self.config.precision.mean(terms)
    }

    /// Sensitivity of [`Self::dual_loss`] w.r.t. each `u_i` (identical for each `v_i`):
    /// \(-(1 - H_{\varepsilon,i}) / n\).
    pub fn dual_loss_grad(
        &self,
        u: &ArrayView1<f32>,
        v: &ArrayView1<f32>,
        x: &ArrayView2<f32>,
        y: &ArrayView2<f32>,
    ) -> Array1<f32> {
        let n = u.len() as f32;
        self.h_eps_batch(u, v, x, y).mapv(|h| -(1.0 - h) / n)
    }

    /// Mapping cost `d(y_i, f(x_i))` per pair.
    fn mapping_cost(&self, y: &ArrayView2<f32>, mapped: &ArrayView2<f32>) -> Array1<f32> {
        match self.config.mapping_cost {
            CostType::SquaredEuclidean => sq_dist_rows(y, mapped),
        }
    }

    /// Barycentric mapping loss: \(\operatorname{mean}(d(y, f(x)) \cdot H_\varepsilon)\).
    ///
    /// `mapped` is the map's image of `x` (computed by the caller so that any
    /// differentiation stays on the caller's side).
    pub fn mapping_loss(
        &self,
        u: &ArrayView1<f32>,
        v: &ArrayView1<f32>,
        x: &ArrayView2<f32>,
        y: &ArrayView2<f32>,
        mapped: &ArrayView2<f32>,
    ) -> f32 {
        let d = self.mapping_cost(y, mapped);
        let h = self.h_eps_batch(u, v, x, y);
        self.config
            .precision
            .mean(d.iter().zip(h.iter()).map(|(a, b)| a * b))
    }

    /// Sensitivity of [`Self::mapping_loss`] w.r.t. `mapped`:
    /// \(2 H_{\varepsilon,i} (f(x_i) - y_i) / n\).
    pub fn mapping_loss_grad(
        &self,
        u: &ArrayView1<f32>,
        v: &ArrayView1<f32>,
        x: &ArrayView2<f32>,
        y: &ArrayView2<f32>,
        mapped: &ArrayView2<f32>,
    ) -> Array2<f32> {
        let n = y.nrows() as f32;
        let h = self.h_eps_batch(u, v, x, y);
        let scale = h.mapv(|hi| 2.0 * hi / n).insert_axis(Axis(1));
        match self.config.mapping_cost {
            CostType::SquaredEuclidean => (mapped - y) * &scale,
        }
    }

    /// Collect a 2-D scatter of μ samples, ν samples and the map's image of the μ samples.
    ///
    /// The map is switched to evaluation mode while it is applied and restored afterwards.
    /// `sample_mu` receives the number of points to draw (matching `nu_val`).
    pub fn scatter_2d(
        &mut self,
        nu_val: &ArrayView2<f32>,
        sample_mu: impl FnOnce(usize) -> Result<Array2<f32>>,
    ) -> Result<MappingScatter> {
        if nu_val.ncols() != 2 {
            return Err(Error::Shape("scatter_2d requires 2-D ν samples"));
        }
        let mu = sample_mu(nu_val.nrows())?;
        if mu.ncols() != 2 {
            return Err(Error::Shape("scatter_2d requires 2-D μ samples"));
        }

        let was_training = self.map.is_training();
        self.map.set_training(false);
        let mapped = self.map.apply(&mu.view());
        self.map.set_training(was_training);

        Ok(MappingScatter {
            mu,
            nu: nu_val.to_owned(),
            mapped,
        })
    }
}
