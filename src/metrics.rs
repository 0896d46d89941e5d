//! Map-quality metrics (small + explicit).
//!
//! These compare the map's image of μ samples against ν samples. They are evaluation
//! signals only; none of them is differentiated through.

use crate::cost::sq_dist_rows;
use crate::{Error, Result};
use ndarray::{Array1, Array2, ArrayView2};

/// Entropic OT cost \(\langle C, P\rangle\) between two uniformly weighted point clouds,
/// with squared Euclidean `C`.
///
/// Runs `wass`'s log-domain Sinkhorn until the max marginal error drops below `tol`.
/// Returns `(cost, iterations)`.
///
/// This is **not** the Sinkhorn divergence (no debiasing terms).
pub fn entropic_ot_cost(
    xs: &ArrayView2<f32>,
    ys: &ArrayView2<f32>,
    reg: f32,
    max_iter: usize,
    tol: f32,
) -> Result<(f32, usize)> {
    let m = xs.nrows();
    let n = ys.nrows();
    if m == 0 || n == 0 || xs.ncols() == 0 {
        return Err(Error::Domain("xs and ys must be non-empty"));
    }
    if xs.ncols() != ys.ncols() {
        return Err(Error::Shape("xs and ys must have the same dimension"));
    }
    if !reg.is_finite() || reg <= 0.0 {
        return Err(Error::Domain("reg must be positive and finite"));
    }
    if max_iter == 0 {
        return Err(Error::Domain("max_iter must be >= 1"));
    }
    if !tol.is_finite() || tol <= 0.0 {
        return Err(Error::Domain("tol must be positive and finite"));
    }

    let a = Array1::<f32>::from_elem(m, 1.0 / (m as f32));
    let b = Array1::<f32>::from_elem(n, 1.0 / (n as f32));

    let cost: Array2<f32> = wass::sq_euclidean_cost_matrix(&xs.to_owned(), &ys.to_owned());
    let (_plan, dist, iters) =
        wass::sinkhorn_log_with_convergence(&a, &b, &cost, reg, max_iter, tol)
            .map_err(|_| Error::Domain("sinkhorn did not converge"))?;
    log::debug!("sinkhorn converged in {iters} iterations");
    Ok((dist, iters))
}

/// Sliced 1-Wasserstein distance between two point clouds.
///
/// Averages the 1-D W₁ distance over `n_projections` random directions drawn from a
/// `seed`-ed RNG. Point counts may differ.
pub fn sliced_wasserstein(
    xs: &ArrayView2<f32>,
    ys: &ArrayView2<f32>,
    n_projections: usize,
    seed: u64,
) -> Result<f32> {
    if xs.ncols() != ys.ncols() {
        return Err(Error::Shape("xs and ys must have the same dimension"));
    }
    if xs.nrows() == 0 || ys.nrows() == 0 || xs.ncols() == 0 {
        return Err(Error::Domain("xs and ys must be non-empty"));
    }
    if n_projections == 0 {
        return Err(Error::Domain("n_projections must be >= 1"));
    }
    Ok(wass::sliced_wasserstein(
        &xs.to_owned(),
        &ys.to_owned(),
        n_projections,
        seed,
        1.0,
    ))
}

/// Mean squared displacement \(\operatorname{mean}_i \|x_i - y_i\|^2\) of paired rows.
pub fn mean_sq_displacement(xs: &ArrayView2<f32>, ys: &ArrayView2<f32>) -> Result<f32> {
    if xs.dim() != ys.dim() {
        return Err(Error::Shape("xs and ys must have the same shape"));
    }
    if xs.nrows() == 0 {
        return Err(Error::Domain("xs and ys must be non-empty"));
    }
    let d = sq_dist_rows(xs, ys);
    let s: f64 = d.iter().map(|&v| v as f64).sum();
    Ok((s / d.len() as f64) as f32)
}
