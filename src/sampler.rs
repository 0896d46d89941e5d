//! Seeded batch samplers for synthetic μ / ν experiments.
//!
//! Randomness always comes from a caller-provided RNG; nothing here owns a seed.

use crate::{Error, Result};
use ndarray::Array2;
use rand_distr::{Distribution, StandardNormal};

/// A synthetic distribution over `R^d`.
#[derive(Debug, Clone, PartialEq)]
pub enum Sampler {
    /// Isotropic Gaussian `N(mean, std² I)`.
    Gaussian { mean: Vec<f32>, std: f32 },
    /// Uniform mixture of `modes` isotropic Gaussians on a circle of `radius` around
    /// `center` (2-D only), e.g. the classic "8 gaussians" target.
    GaussianRing {
        modes: usize,
        radius: f32,
        std: f32,
        center: [f32; 2],
    },
}

impl Sampler {
    /// Standard normal in `R^d`.
    pub fn standard_normal(d: usize) -> Self {
        Sampler::Gaussian {
            mean: vec![0.0; d],
            std: 1.0,
        }
    }

    /// Eight Gaussians on a circle of radius `radius` around the origin.
    pub fn eight_gaussians(radius: f32, std: f32) -> Self {
        Sampler::GaussianRing {
            modes: 8,
            radius,
            std,
            center: [0.0, 0.0],
        }
    }

    /// Dimension of the samples.
    pub fn dim(&self) -> usize {
        match self {
            Sampler::Gaussian { mean, .. } => mean.len(),
            Sampler::GaussianRing { .. } => 2,
        }
    }

    /// Centers of the mixture components (a single row for `Gaussian`).
    pub fn centers(&self) -> Array2<f32> {
        match self {
            Sampler::Gaussian { mean, .. } => {
                Array2::from_shape_vec((1, mean.len()), mean.clone())
                    .unwrap_or_else(|_| Array2::zeros((1, 0)))
            }
            Sampler::GaussianRing {
                modes,
                radius,
                center,
                ..
            } => {
                let mut c = Array2::<f32>::zeros((*modes, 2));
                for k in 0..*modes {
                    let a = 2.0 * core::f32::consts::PI * (k as f32) / (*modes as f32);
                    c[[k, 0]] = center[0] + radius * a.cos();
                    c[[k, 1]] = center[1] + radius * a.sin();
                }
                c
            }
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            Sampler::Gaussian { mean, std } => {
                if mean.is_empty() {
                    return Err(Error::Domain("gaussian mean must be non-empty"));
                }
                if mean.iter().any(|m| !m.is_finite()) {
                    return Err(Error::Domain("gaussian mean must be finite"));
                }
                if !std.is_finite() || *std <= 0.0 {
                    return Err(Error::Domain("std must be positive and finite"));
                }
            }
            Sampler::GaussianRing {
                modes, radius, std, ..
            } => {
                if *modes == 0 {
                    return Err(Error::Domain("ring must have at least one mode"));
                }
                if !radius.is_finite() || *radius < 0.0 {
                    return Err(Error::Domain("radius must be finite and >= 0"));
                }
                if !std.is_finite() || *std <= 0.0 {
                    return Err(Error::Domain("std must be positive and finite"));
                }
            }
        }
        Ok(())
    }

    /// Draw `n` samples as an `(n, dim)` batch.
    pub fn sample(&self, n: usize, rng: &mut impl rand::Rng) -> Result<Array2<f32>> {
        self.validate()?;
        let centers = self.centers();
        let (k, d) = centers.dim();
        let std = match self {
            Sampler::Gaussian { std, .. } | Sampler::GaussianRing { std, .. } => *std,
        };

        let mut out = Array2::<f32>::zeros((n, d));
        for i in 0..n {
            let c = if k == 1 { 0 } else { rng.random_range(0..k) };
            for j in 0..d {
                let z: f32 = StandardNormal.sample(rng);
                out[[i, j]] = centers[[c, j]] + std * z;
            }
        }
        Ok(out)
    }
}
