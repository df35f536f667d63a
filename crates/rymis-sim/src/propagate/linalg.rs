//! Small dense kernels used by the propagators.

use faer::{Mat, Side};
use ndarray::Array2;
use num_complex::Complex64;

/// `⟨a|b⟩`.
pub(crate) fn dot(a: &[Complex64], b: &[Complex64]) -> Complex64 {
    a.iter().zip(b).map(|(x, y)| x.conj() * y).sum()
}

/// `‖a‖₂`.
pub(crate) fn norm(a: &[Complex64]) -> f64 {
    a.iter().map(Complex64::norm_sqr).sum::<f64>().sqrt()
}

/// `y += alpha · x`.
pub(crate) fn axpy(alpha: Complex64, x: &[Complex64], y: &mut [Complex64]) {
    for (yi, xi) in y.iter_mut().zip(x) {
        *yi += alpha * *xi;
    }
}

/// Eigen-decomposition of a real symmetric tridiagonal matrix.
///
/// `diag` has length `m`, `off` length `m − 1`. The matrix is assembled
/// densely and handed to faer's self-adjoint solver. Returns the eigenvalues
/// in ascending order and an `m × m` matrix whose columns are the matching
/// orthonormal eigenvectors, or `None` if the solver does not converge.
pub(crate) fn symmetric_tridiagonal_eigen(
    diag: &[f64],
    off: &[f64],
) -> Option<(Vec<f64>, Array2<f64>)> {
    let m = diag.len();
    let t = Mat::<f64>::from_fn(m, m, |i, j| {
        if i == j {
            diag[i]
        } else if j == i + 1 {
            off[i]
        } else if i == j + 1 {
            off[j]
        } else {
            0.0
        }
    });
    let evd = t.self_adjoint_eigen(Side::Lower).ok()?;
    let u = evd.U();
    let s = evd.S().column_vector();

    let values = (0..m).map(|l| s[l]).collect();
    let vectors = Array2::from_shape_fn((m, m), |(k, l)| u[(k, l)]);
    Some((values, vectors))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reconstruct(values: &[f64], vectors: &Array2<f64>, i: usize, j: usize) -> f64 {
        (0..values.len())
            .map(|k| vectors[[i, k]] * values[k] * vectors[[j, k]])
            .sum()
    }

    #[test]
    fn two_by_two() {
        let (values, vectors) = symmetric_tridiagonal_eigen(&[1.0, 1.0], &[1.0]).unwrap();
        assert!((values[0] - 0.0).abs() < 1e-12);
        assert!((values[1] - 2.0).abs() < 1e-12);
        assert!((reconstruct(&values, &vectors, 0, 1) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn reconstructs_random_tridiagonal() {
        let diag = [0.3, -1.2, 2.5, 0.7, -0.4, 1.1];
        let off = [0.9, -0.5, 1.3, 0.2, -2.0];
        let (values, vectors) = symmetric_tridiagonal_eigen(&diag, &off).unwrap();
        let m = diag.len();
        for i in 0..m {
            for j in 0..m {
                let expected = if i == j {
                    diag[i]
                } else if j == i + 1 {
                    off[i]
                } else if i == j + 1 {
                    off[j]
                } else {
                    0.0
                };
                assert!((reconstruct(&values, &vectors, i, j) - expected).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn single_element() {
        let (values, vectors) = symmetric_tridiagonal_eigen(&[4.0], &[]).unwrap();
        assert!((values[0] - 4.0).abs() < 1e-12);
        assert!((vectors[[0, 0]].abs() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn eigenvectors_are_orthonormal_for_lanczos_sized_input() {
        let m = 30;
        let diag: Vec<f64> = (0..m).map(|i| ((i * 7) % 11) as f64 - 5.0).collect();
        let off: Vec<f64> = (0..m - 1).map(|i| 0.5 + (i % 3) as f64).collect();
        let (values, vectors) = symmetric_tridiagonal_eigen(&diag, &off).unwrap();

        assert!(values.windows(2).all(|w| w[0] <= w[1]));
        for a in 0..m {
            for b in 0..m {
                let overlap: f64 = (0..m).map(|k| vectors[[k, a]] * vectors[[k, b]]).sum();
                let expected = if a == b { 1.0 } else { 0.0 };
                assert!((overlap - expected).abs() < 1e-10);
            }
        }
        for i in 0..m {
            assert!((reconstruct(&values, &vectors, i, i) - diag[i]).abs() < 1e-10);
        }
    }
}
