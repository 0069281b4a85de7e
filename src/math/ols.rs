//! Penalised least squares solver.
//!
//! The additive model is linear in its coefficients once the design matrix is
//! built, so fitting reduces to:
//!
//! ```text
//! minimize Σ (y_i - x_i^T β)^2 + Σ λ_j β_j^2
//! ```
//!
//! Implementation choices:
//! - The ridge term is folded into an augmented system: one extra row
//!   `sqrt(λ_j) · e_j` with target 0 per penalised column.
//! - We solve the augmented (tall) system with SVD, which copes with the
//!   near-collinear columns that appear when a holiday indicator is almost
//!   never active or two changepoints sit on adjacent rows.
//!   (Nalgebra's `QR::solve` is intended for square systems and will panic
//!   for non-square matrices.)

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Solve `min ||y - Xβ||² + Σ λ_j β_j²`.
///
/// `penalties` must have one entry per column of `x`; zero means unpenalised.
pub fn solve_ridge(x: &DMatrix<f64>, y: &DVector<f64>, penalties: &[f64]) -> Option<DVector<f64>> {
    let n = x.nrows();
    let p = x.ncols();
    if penalties.len() != p || y.len() != n {
        return None;
    }

    let penalised: Vec<(usize, f64)> = penalties
        .iter()
        .copied()
        .enumerate()
        .filter(|&(_, lambda)| lambda > 0.0)
        .collect();

    let rows = n + penalised.len();
    let mut x_aug = DMatrix::<f64>::zeros(rows, p);
    x_aug.view_mut((0, 0), (n, p)).copy_from(x);
    for (row, &(col, lambda)) in penalised.iter().enumerate() {
        x_aug[(n + row, col)] = lambda.sqrt();
    }

    let mut y_aug = DVector::<f64>::zeros(rows);
    y_aug.rows_mut(0, n).copy_from(y);

    solve_least_squares(&x_aug, &y_aug)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn least_squares_solves_simple_system() {
        // Fit y = 2 + 3x on x = [0,1,2]
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0]);

        let beta = solve_least_squares(&x, &y).unwrap();
        assert!((beta[0] - 2.0).abs() < 1e-10);
        assert!((beta[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn ridge_with_zero_penalty_matches_ols() {
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0]);

        let beta = solve_ridge(&x, &y, &[0.0, 0.0]).unwrap();
        assert!((beta[0] - 2.0).abs() < 1e-10);
        assert!((beta[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn ridge_penalty_shrinks_coefficient() {
        // Single column, y = 2x. Closed form: β = Σxy / (Σx² + λ).
        let x = DMatrix::from_row_slice(2, 1, &[1.0, 1.0]);
        let y = DVector::from_row_slice(&[2.0, 2.0]);

        let beta = solve_ridge(&x, &y, &[2.0]).unwrap();
        assert!((beta[0] - 1.0).abs() < 1e-10, "got {}", beta[0]);
    }

    #[test]
    fn ridge_rejects_mismatched_penalties() {
        let x = DMatrix::from_row_slice(2, 1, &[1.0, 1.0]);
        let y = DVector::from_row_slice(&[2.0, 2.0]);
        assert!(solve_ridge(&x, &y, &[1.0, 1.0]).is_none());
    }
}
