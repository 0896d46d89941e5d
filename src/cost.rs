//! Squared Euclidean ground cost.
//!
//! Shapes are not validated here: a mismatch panics inside `ndarray` arithmetic, the same
//! way a tensor framework would raise on a bad broadcast.

use ndarray::{arr0, Array1, ArrayD, ArrayView2, ArrayViewD, Axis};

/// Pairwise squared distance with batch-shape dependent reduction.
///
/// - If the inputs have a batch dimension (`ndim > 1`), returns one value per sample,
///   summed over axis 1, with shape `(batch, 1)`.
/// - Otherwise (a single vector or scalar), returns a 0-dimensional array holding the
///   full sum.
///
/// Panics if `x` and `y` cannot be broadcast together.
pub fn sq_dist(x: &ArrayViewD<f32>, y: &ArrayViewD<f32>) -> ArrayD<f32> {
    let diff = x - y;
    let sq = diff.mapv(|d| d * d);
    if sq.ndim() > 1 {
        sq.sum_axis(Axis(1)).insert_axis(Axis(1))
    } else {
        arr0(sq.sum()).into_dyn()
    }
}

/// Row-wise squared distance `‖x_i - y_i‖²` for two `(batch, dim)` batches.
///
/// Panics if the shapes differ.
pub fn sq_dist_rows(x: &ArrayView2<f32>, y: &ArrayView2<f32>) -> Array1<f32> {
    assert_eq!(x.dim(), y.dim(), "x and y batches must have the same shape");
    let n = x.nrows();
    let mut out = Array1::<f32>::zeros(n);
    for i in 0..n {
        let mut s = 0.0f32;
        for (a, b) in x.row(i).iter().zip(y.row(i).iter()) {
            let d = a - b;
            s += d * d;
        }
        out[i] = s;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2, IxDyn};
    use proptest::prelude::*;

    #[test]
    fn batch_input_gives_one_value_per_sample() {
        let x = array![[0.0f32, 0.0]].into_dyn();
        let y = array![[3.0f32, 4.0]].into_dyn();
        let d = sq_dist(&x.view(), &y.view());
        assert_eq!(d.shape(), &[1, 1]);
        assert_eq!(d[IxDyn(&[0, 0])], 25.0);
    }

    #[test]
    fn vector_input_is_fully_reduced() {
        let x = array![1.0f32, 2.0, 3.0].into_dyn();
        let y = array![1.0f32, 0.0, 0.0].into_dyn();
        let d = sq_dist(&x.view(), &y.view());
        assert_eq!(d.ndim(), 0);
        assert_eq!(d[IxDyn(&[])], 13.0);
    }

    #[test]
    fn equal_scalars_are_zero_apart() {
        let x = arr0(2.5f32).into_dyn();
        let d = sq_dist(&x.view(), &x.view());
        assert_eq!(d.ndim(), 0);
        assert_eq!(d[IxDyn(&[])], 0.0);
    }

    #[test]
    fn rows_match_dynamic_form() {
        let x = array![[0.0f32, 0.0], [1.0, 1.0], [-2.0, 0.5]];
        let y = array![[3.0f32, 4.0], [1.0, 1.0], [0.0, 0.0]];
        let rows = sq_dist_rows(&x.view(), &y.view());
        let dynamic = sq_dist(&x.view().into_dyn(), &y.view().into_dyn());
        for i in 0..3 {
            assert_eq!(rows[i], dynamic[IxDyn(&[i, 0])]);
        }
        assert_eq!(rows.to_vec(), vec![25.0, 0.0, 4.25]);
    }

    #[test]
    #[should_panic(expected = "same shape")]
    fn rows_panic_on_shape_mismatch() {
        let x = Array2::<f32>::zeros((2, 3));
        let y = Array2::<f32>::zeros((2, 2));
        sq_dist_rows(&x.view(), &y.view());
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 128,
            .. ProptestConfig::default()
        })]
        #[test]
        fn prop_sq_dist_rows_nonnegative_and_symmetric(
            xs in prop::collection::vec(-10.0f32..10.0, 12),
            ys in prop::collection::vec(-10.0f32..10.0, 12),
        ) {
            let x = Array2::from_shape_vec((4, 3), xs).unwrap();
            let y = Array2::from_shape_vec((4, 3), ys).unwrap();
            let dxy = sq_dist_rows(&x.view(), &y.view());
            let dyx = sq_dist_rows(&y.view(), &x.view());
            prop_assert!(dxy.iter().all(|&d| d >= 0.0));
            prop_assert_eq!(dxy, dyx);
        }
    }
}
