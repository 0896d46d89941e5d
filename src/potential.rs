//! Dual potentials \(u\), \(v\).
//!
//! The evaluator never calls a potential itself: callers evaluate `u(x)`, `v(y)` and pass
//! the values in. These traits exist so the training loops can be generic.

use crate::{Error, Result};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

/// A scalar function over a distribution's support, evaluated batch-wise.
pub trait DualPotential {
    /// One value per row of `x`.
    fn eval(&self, x: &ArrayView2<f32>) -> Array1<f32>;
}

/// A potential whose parameters can follow per-sample loss sensitivities.
pub trait TrainablePotential: DualPotential {
    /// Apply one SGD step given `grad[i] = ∂loss/∂φ(x_i)`.
    fn sgd_step(&mut self, x: &ArrayView2<f32>, grad: &ArrayView1<f32>, lr: f32);
}

/// \(\varphi(x) = w \cdot [x;\ \|x\|^2;\ 1]\).
///
/// Quadratic in `x`, which is the exact form of the unregularized OT potentials between
/// Gaussians that differ by a translation; a reasonable baseline elsewhere.
#[derive(Debug, Clone)]
pub struct QuadraticPotential {
    /// Weights with length `d + 2` (linear part, squared-norm coefficient, bias).
    w: Array1<f32>,
}

impl QuadraticPotential {
    pub fn new_zeros(d: usize) -> Self {
        Self {
            w: Array1::zeros(d + 2),
        }
    }

    /// Wrap explicit weights laid out as `[linear (d), squared-norm, bias]`.
    pub fn from_weights(w: Array1<f32>) -> Result<Self> {
        if w.len() < 2 {
            return Err(Error::Shape("quadratic potential needs at least 2 weights"));
        }
        Ok(Self { w })
    }

    pub fn weights(&self) -> &Array1<f32> {
        &self.w
    }

    pub fn d(&self) -> usize {
        self.w.len() - 2
    }

    /// Feature map `[x, ‖x‖², 1]` for every row.
    pub fn features(x: &ArrayView2<f32>) -> Array2<f32> {
        let (n, d) = x.dim();
        let mut phi = Array2::<f32>::zeros((n, d + 2));
        for i in 0..n {
            let mut sq = 0.0f32;
            for k in 0..d {
                let v = x[[i, k]];
                phi[[i, k]] = v;
                sq += v * v;
            }
            phi[[i, d]] = sq;
            phi[[i, d + 1]] = 1.0;
        }
        phi
    }
}

impl DualPotential for QuadraticPotential {
    fn eval(&self, x: &ArrayView2<f32>) -> Array1<f32> {
        debug_assert_eq!(x.ncols(), self.d());
        Self::features(x).dot(&self.w)
    }
}

impl TrainablePotential for QuadraticPotential {
    fn sgd_step(&mut self, x: &ArrayView2<f32>, grad: &ArrayView1<f32>, lr: f32) {
        debug_assert_eq!(x.nrows(), grad.len());
        // ∂loss/∂w = Σ_i grad_i · φ(x_i)
        let g = Self::features(x).t().dot(grad);
        self.w.scaled_add(-lr, &g);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn features_layout() {
        let x = array![[1.0f32, 2.0], [0.0, -3.0]];
        let phi = QuadraticPotential::features(&x.view());
        assert_eq!(phi.row(0).to_vec(), vec![1.0, 2.0, 5.0, 1.0]);
        assert_eq!(phi.row(1).to_vec(), vec![0.0, -3.0, 9.0, 1.0]);
    }

    #[test]
    fn zero_potential_evaluates_to_zero() {
        let p = QuadraticPotential::new_zeros(3);
        let x = array![[1.0f32, 2.0, 3.0], [4.0, 5.0, 6.0]];
        assert!(p.eval(&x.view()).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn from_weights_checks_the_layout() {
        assert!(matches!(
            QuadraticPotential::from_weights(array![1.0f32]),
            Err(Error::Shape(_))
        ));
        let p = QuadraticPotential::from_weights(array![1.0f32, 0.0, 0.5, 2.0]).unwrap();
        assert_eq!(p.d(), 2);
        let x = array![[1.0f32, 1.0]];
        // 1·1 + 0·1 + 0.5·2 + 2
        assert_eq!(p.eval(&x.view())[0], 4.0);
    }

    #[test]
    fn sgd_step_on_negative_grad_raises_values() {
        let mut p = QuadraticPotential::new_zeros(2);
        let x = array![[1.0f32, 0.0], [0.0, 1.0]];
        let grad = array![-1.0f32, -1.0];
        p.sgd_step(&x.view(), &grad.view(), 0.1);
        assert!(p.eval(&x.view()).iter().all(|&v| v > 0.0));
    }
}
