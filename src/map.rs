//! Transport maps \(f: \mathbb{R}^d \to \mathbb{R}^d\).
//!
//! The evaluator owns a map but never needs it for loss math; it only applies it for
//! diagnostics and for the mapping-phase training loop.

use crate::config::ComputeTarget;
use ndarray::{Array1, Array2, ArrayView2, Axis};

/// A batch-wise point map.
pub trait TransportMap {
    /// Map every row of `x`.
    fn apply(&self, x: &ArrayView2<f32>) -> Array2<f32>;

    /// Switch between training and evaluation behavior (dropout, batch norm, ...).
    fn set_training(&mut self, _training: bool) {}

    /// Whether the map is currently in training mode.
    fn is_training(&self) -> bool {
        true
    }

    /// Move parameters to `target`. Host-only maps ignore this.
    fn place(&mut self, _target: ComputeTarget) {}
}

/// A map whose parameters can follow output sensitivities.
pub trait TrainableMap: TransportMap {
    /// Apply one SGD step given `grad_out[i] = ∂loss/∂f(x_i)`.
    fn sgd_step(&mut self, x: &ArrayView2<f32>, grad_out: &ArrayView2<f32>, lr: f32);
}

/// \(f(x) = A x + b\).
#[derive(Debug, Clone)]
pub struct AffineMap {
    /// Linear part `A` with shape `(d, d)`.
    pub a: Array2<f32>,
    /// Offset `b` with length `d`.
    pub b: Array1<f32>,
    training: bool,
}

impl AffineMap {
    /// The identity map on `R^d`.
    pub fn identity(d: usize) -> Self {
        Self {
            a: Array2::eye(d),
            b: Array1::zeros(d),
            training: true,
        }
    }

    /// The constant-zero map on `R^d`.
    pub fn new_zeros(d: usize) -> Self {
        Self {
            a: Array2::zeros((d, d)),
            b: Array1::zeros(d),
            training: true,
        }
    }

    pub fn d(&self) -> usize {
        self.b.len()
    }
}

impl TransportMap for AffineMap {
    fn apply(&self, x: &ArrayView2<f32>) -> Array2<f32> {
        debug_assert_eq!(x.ncols(), self.d());
        // rows: x_i A^T + b
        x.dot(&self.a.t()) + &self.b
    }

    fn set_training(&mut self, training: bool) {
        self.training = training;
    }

    fn is_training(&self) -> bool {
        self.training
    }
}

impl TrainableMap for AffineMap {
    fn sgd_step(&mut self, x: &ArrayView2<f32>, grad_out: &ArrayView2<f32>, lr: f32) {
        debug_assert_eq!(x.dim(), grad_out.dim());
        // ∂loss/∂A = Σ_i g_i x_i^T, ∂loss/∂b = Σ_i g_i
        let ga = grad_out.t().dot(x);
        let gb = grad_out.sum_axis(Axis(0));
        self.a.scaled_add(-lr, &ga);
        self.b.scaled_add(-lr, &gb);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn identity_is_identity() {
        let f = AffineMap::identity(2);
        let x = array![[1.0f32, -2.0], [0.5, 3.0]];
        assert_eq!(f.apply(&x.view()), x);
    }

    #[test]
    fn apply_uses_row_convention() {
        let mut f = AffineMap::new_zeros(2);
        f.a = array![[0.0f32, 1.0], [2.0, 0.0]];
        f.b = array![10.0f32, 20.0];
        let x = array![[1.0f32, 2.0]];
        // A x + b = [2, 2] + [10, 20]
        assert_eq!(f.apply(&x.view()), array![[12.0f32, 22.0]]);
    }

    #[test]
    fn sgd_on_squared_error_moves_toward_target() {
        let mut f = AffineMap::new_zeros(2);
        let x = array![[1.0f32, 0.0], [0.0, 1.0], [1.0, 1.0]];
        let y = array![[2.0f32, 1.0], [1.0, 3.0], [3.0, 4.0]];
        let err = |f: &AffineMap| (&f.apply(&x.view()) - &y).mapv(|r| r * r).sum();
        let before = err(&f);
        for _ in 0..1_000 {
            let g = (&f.apply(&x.view()) - &y) * 2.0 / 3.0;
            f.sgd_step(&x.view(), &g.view(), 0.1);
        }
        assert!(err(&f) < 1e-3 * before, "err={} before={}", err(&f), before);
    }

    #[test]
    fn training_flag_round_trips() {
        let mut f = AffineMap::identity(1);
        assert!(f.is_training());
        f.set_training(false);
        assert!(!f.is_training());
    }
}
