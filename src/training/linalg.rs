//! Small dense linear-algebra helpers shared by the linear learners

use crate::error::{Result, SelectionError};
use ndarray::{Array1, Array2, Axis};

/// Solve `A x = b` for symmetric positive definite `A` via Cholesky.
/// Retries once with a small diagonal ridge when `A` is only semi-definite.
pub(crate) fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    if let Some(x) = cholesky_solve_once(a, b) {
        return Some(x);
    }
    let n = a.nrows();
    let trace: f64 = a.diag().iter().map(|v| v.abs()).sum();
    let ridge = (1e-8 * trace / n.max(1) as f64).max(1e-12);
    let mut a_reg = a.clone();
    for k in 0..n {
        a_reg[[k, k]] += ridge;
    }
    cholesky_solve_once(&a_reg, b)
}

fn cholesky_solve_once(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    if n != a.ncols() || n != b.len() {
        return None;
    }

    let mut l = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in 0..=i {
            let mut sum = 0.0;
            for k in 0..j {
                sum += l[[i, k]] * l[[j, k]];
            }
            if i == j {
                let diag = a[[i, i]] - sum;
                if diag <= 0.0 || !diag.is_finite() {
                    return None;
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }

    // L z = b
    let mut z = Array1::<f64>::zeros(n);
    for i in 0..n {
        let mut sum = 0.0;
        for j in 0..i {
            sum += l[[i, j]] * z[j];
        }
        z[i] = (b[i] - sum) / l[[i, i]];
    }

    // L^T x = z
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let mut sum = 0.0;
        for j in (i + 1)..n {
            sum += l[[j, i]] * x[j];
        }
        x[i] = (z[i] - sum) / l[[i, i]];
    }

    Some(x)
}

/// Solve a general square system with partially pivoted Gaussian elimination
pub(crate) fn gauss_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    if n != a.ncols() || n != b.len() {
        return None;
    }
    let mut m = a.clone();
    let mut rhs = b.clone();

    for col in 0..n {
        let pivot_row = (col..n).max_by(|&r1, &r2| {
            m[[r1, col]]
                .abs()
                .partial_cmp(&m[[r2, col]].abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        })?;
        if m[[pivot_row, col]].abs() < 1e-12 {
            return None;
        }
        if pivot_row != col {
            for j in 0..n {
                m.swap([col, j], [pivot_row, j]);
            }
            rhs.swap(col, pivot_row);
        }
        for row in (col + 1)..n {
            let factor = m[[row, col]] / m[[col, col]];
            if factor == 0.0 {
                continue;
            }
            for j in col..n {
                m[[row, j]] -= factor * m[[col, j]];
            }
            rhs[row] -= factor * rhs[col];
        }
    }

    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let mut sum = rhs[i];
        for j in (i + 1)..n {
            sum -= m[[i, j]] * x[j];
        }
        x[i] = sum / m[[i, i]];
    }
    Some(x)
}

/// Solve the (optionally ridge-regularised) normal equations `(XᵀX + αI) w = Xᵀy`
pub(crate) fn solve_normal_equations(x: &Array2<f64>, y: &Array1<f64>, alpha: f64) -> Result<Array1<f64>> {
    let mut xtx = x.t().dot(x);
    for i in 0..xtx.nrows() {
        xtx[[i, i]] += alpha;
    }
    let xty = x.t().dot(y);
    cholesky_solve(&xtx, &xty)
        .or_else(|| gauss_solve(&xtx, &xty))
        .ok_or_else(|| {
            SelectionError::ComputationError("singular system in least squares".to_string())
        })
}

/// Inverse of a symmetric positive definite matrix, column by column
pub(crate) fn spd_inverse(a: &Array2<f64>) -> Option<Array2<f64>> {
    let n = a.nrows();
    let mut inv = Array2::<f64>::zeros((n, n));
    for j in 0..n {
        let mut e = Array1::<f64>::zeros(n);
        e[j] = 1.0;
        let col = cholesky_solve(a, &e)?;
        inv.column_mut(j).assign(&col);
    }
    Some(inv)
}

/// Column means and the centred copy of `x`
pub(crate) fn center_columns(x: &Array2<f64>) -> (Array1<f64>, Array2<f64>) {
    let mean = x
        .mean_axis(Axis(0))
        .unwrap_or_else(|| Array1::zeros(x.ncols()));
    let centered = x - &mean.view().insert_axis(Axis(0));
    (mean, centered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_cholesky_solve() {
        let a = array![[4.0, 2.0], [2.0, 3.0]];
        let b = array![2.0, 1.0];
        let x = cholesky_solve(&a, &b).unwrap();
        let back = a.dot(&x);
        assert!((back[0] - 2.0).abs() < 1e-10);
        assert!((back[1] - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_gauss_solve_non_symmetric() {
        let a = array![[0.0, 1.0], [2.0, 1.0]];
        let b = array![3.0, 5.0];
        let x = gauss_solve(&a, &b).unwrap();
        assert!((x[0] - 1.0).abs() < 1e-10);
        assert!((x[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn test_singular_system() {
        let a = array![[1.0, 2.0], [2.0, 4.0]];
        assert!(gauss_solve(&a, &array![1.0, 2.0]).is_none());
    }
}
