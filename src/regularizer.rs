//! The regularization kernels \(H_\varepsilon\) and \(F_\varepsilon\).
//!
//! Both are functions of the slack \(t = u + v - c\):
//!
//! - quadratic: \(H = \max(t,0)/(2\varepsilon)\), \(F = -\max(t,0)^2/(4\varepsilon)\)
//! - entropic: \(H = e^{t/\varepsilon}\), \(F = -\varepsilon e^{t/\varepsilon}\)
//!
//! In both modes \(F' = -H\). `H` is the (unnormalized) density of the regularized plan
//! w.r.t. \(\mu \otimes \nu\); it weights the mapping loss.

use crate::config::RegMode;
use ndarray::{Array1, ArrayView1};

impl RegMode {
    /// \(H_\varepsilon(t)\). Nonnegative in both modes.
    #[inline]
    pub fn h_eps(self, t: f32, eps: f32) -> f32 {
        match self {
            RegMode::Quadratic => t.max(0.0) / (2.0 * eps),
            RegMode::Entropic => (t / eps).exp(),
        }
    }

    /// \(F_\varepsilon(t)\). Nonpositive in both modes.
    #[inline]
    pub fn f_eps(self, t: f32, eps: f32) -> f32 {
        match self {
            RegMode::Quadratic => {
                let r = t.max(0.0);
                -(r * r) / (4.0 * eps)
            }
            RegMode::Entropic => -eps * (t / eps).exp(),
        }
    }

    /// Elementwise \(H_\varepsilon\) over a slack vector.
    pub fn h_eps_array(self, t: &ArrayView1<f32>, eps: f32) -> Array1<f32> {
        t.mapv(|x| self.h_eps(x, eps))
    }

    /// Elementwise \(F_\varepsilon\) over a slack vector.
    pub fn f_eps_array(self, t: &ArrayView1<f32>, eps: f32) -> Array1<f32> {
        t.mapv(|x| self.f_eps(x, eps))
    }
}
