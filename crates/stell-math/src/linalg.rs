//! Linear algebra utilities.
//!
//! Dense LU with partial pivoting for the Newton stages, normal-equation
//! least squares, and a small Jacobi SVD / pseudoinverse for fitting.

use ndarray::{Array1, Array2};
use stell_types::error::{StellError, StellResult};

/// LU factorisation `P A = L U` stored compactly.
#[derive(Debug, Clone)]
pub struct LuFactors {
    lu: Array2<f64>,
    perm: Vec<usize>,
}

/// Factor a square matrix with partial pivoting.
///
/// A pivot below `n·ε·max|A|` is reported as a singular matrix.
pub fn lu_factor(a: &Array2<f64>) -> StellResult<LuFactors> {
    let (n, m) = a.dim();
    if n != m {
        return Err(StellError::LinAlg(format!(
            "LU needs a square matrix, got {n}x{m}"
        )));
    }
    if a.iter().any(|v| !v.is_finite()) {
        return Err(StellError::LinAlg(
            "matrix has non-finite entries".to_string(),
        ));
    }

    let scale = a.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
    let threshold = (n.max(1) as f64) * f64::EPSILON * scale;
    let mut lu = a.clone();
    let mut perm: Vec<usize> = (0..n).collect();

    for col in 0..n {
        let mut pivot_row = col;
        let mut pivot_val = lu[[col, col]].abs();
        for row in (col + 1)..n {
            let v = lu[[row, col]].abs();
            if v > pivot_val {
                pivot_val = v;
                pivot_row = row;
            }
        }
        if pivot_val <= threshold || scale == 0.0 {
            return Err(StellError::LinAlg(format!(
                "singular matrix: pivot {pivot_val:.3e} in column {col} (scale {scale:.3e})"
            )));
        }
        if pivot_row != col {
            perm.swap(col, pivot_row);
            for k in 0..n {
                lu.swap([col, k], [pivot_row, k]);
            }
        }

        let pivot = lu[[col, col]];
        for row in (col + 1)..n {
            let factor = lu[[row, col]] / pivot;
            lu[[row, col]] = factor;
            if factor != 0.0 {
                for k in (col + 1)..n {
                    lu[[row, k]] -= factor * lu[[col, k]];
                }
            }
        }
    }

    Ok(LuFactors { lu, perm })
}

impl LuFactors {
    pub fn dim(&self) -> usize {
        self.perm.len()
    }

    /// Solve `A x = b` with the stored factors.
    pub fn solve(&self, b: &Array1<f64>) -> StellResult<Array1<f64>> {
        let n = self.dim();
        if b.len() != n {
            return Err(StellError::dimension("LU solve", n, b.len()));
        }
        let mut x: Array1<f64> = self.perm.iter().map(|&p| b[p]).collect();

        for i in 1..n {
            let mut sum = x[i];
            for j in 0..i {
                sum -= self.lu[[i, j]] * x[j];
            }
            x[i] = sum;
        }
        for i in (0..n).rev() {
            let mut sum = x[i];
            for j in (i + 1)..n {
                sum -= self.lu[[i, j]] * x[j];
            }
            x[i] = sum / self.lu[[i, i]];
        }
        Ok(x)
    }
}

/// Solve `A x = b` for square `A`.
pub fn lu_solve(a: &Array2<f64>, b: &Array1<f64>) -> StellResult<Array1<f64>> {
    lu_factor(a)?.solve(b)
}

/// Solve `A x = b` followed by one step of iterative refinement.
pub fn lu_solve_refined(a: &Array2<f64>, b: &Array1<f64>) -> StellResult<Array1<f64>> {
    let factors = lu_factor(a)?;
    let mut x = factors.solve(b)?;
    let r = b - &a.dot(&x);
    x += &factors.solve(&r)?;
    Ok(x)
}

/// Least-squares solution of an overdetermined `A x ≈ b` via the normal
/// equations.
pub fn lstsq(a: &Array2<f64>, b: &Array1<f64>) -> StellResult<Array1<f64>> {
    if a.nrows() != b.len() {
        return Err(StellError::dimension("lstsq rhs", a.nrows(), b.len()));
    }
    if a.nrows() < a.ncols() {
        return Err(StellError::LinAlg(format!(
            "lstsq needs at least as many rows as columns, got {}x{}",
            a.nrows(),
            a.ncols()
        )));
    }
    let ata = a.t().dot(a);
    let atb = a.t().dot(b);
    lu_solve(&ata, &atb)
}

/// Simple SVD for small matrices using one-sided Jacobi rotations.
///
/// Returns (U, sigma, Vt) where A ≈ U * diag(sigma) * Vt.
/// Intended for fitting problems with a few dozen columns.
///
/// Matches `numpy.linalg.svd(A, full_matrices=False)`.
pub fn svd_small(a: &Array2<f64>) -> (Array2<f64>, Array1<f64>, Array2<f64>) {
    let (m, n) = a.dim();
    let k = m.min(n);

    let mut ata = a.t().dot(a);
    let trace: f64 = (0..n).map(|i| ata[[i, i]].abs()).sum();
    let tiny = 1e-15 * trace.max(f64::MIN_POSITIVE);

    // Jacobi eigenvalue iteration on A^T*A to get V and sigma^2
    let mut v = Array2::eye(n);
    let max_sweeps = 100;

    for _ in 0..max_sweeps {
        let mut off_diag = 0.0;
        for i in 0..n {
            for j in (i + 1)..n {
                off_diag += ata[[i, j]].abs();
            }
        }
        if off_diag < 1e-14 * trace.max(f64::MIN_POSITIVE) {
            break;
        }

        for i in 0..n {
            for j in (i + 1)..n {
                if ata[[i, j]].abs() < tiny {
                    continue;
                }
                let tau = (ata[[j, j]] - ata[[i, i]]) / (2.0 * ata[[i, j]]);
                let t = if tau >= 0.0 {
                    1.0 / (tau + (1.0 + tau * tau).sqrt())
                } else {
                    -1.0 / (-tau + (1.0 + tau * tau).sqrt())
                };
                let cos = 1.0 / (1.0 + t * t).sqrt();
                let sin = t * cos;

                let aii = ata[[i, i]];
                let ajj = ata[[j, j]];
                let aij = ata[[i, j]];
                ata[[i, i]] = cos * cos * aii - 2.0 * sin * cos * aij + sin * sin * ajj;
                ata[[j, j]] = sin * sin * aii + 2.0 * sin * cos * aij + cos * cos * ajj;
                ata[[i, j]] = 0.0;
                ata[[j, i]] = 0.0;

                for r in 0..n {
                    if r == i || r == j {
                        continue;
                    }
                    let ri = ata[[r, i]];
                    let rj = ata[[r, j]];
                    ata[[r, i]] = cos * ri - sin * rj;
                    ata[[i, r]] = ata[[r, i]];
                    ata[[r, j]] = sin * ri + cos * rj;
                    ata[[j, r]] = ata[[r, j]];
                }

                for r in 0..n {
                    let vi = v[[r, i]];
                    let vj = v[[r, j]];
                    v[[r, i]] = cos * vi - sin * vj;
                    v[[r, j]] = sin * vi + cos * vj;
                }
            }
        }
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| ata[[j, j]].total_cmp(&ata[[i, i]]));

    let mut sigma = Array1::zeros(k);
    let mut vt = Array2::zeros((k, n));
    for (idx, &col) in order.iter().take(k).enumerate() {
        sigma[idx] = ata[[col, col]].max(0.0).sqrt();
        for j in 0..n {
            vt[[idx, j]] = v[[j, col]];
        }
    }

    // U = A V diag(1/sigma)
    let mut u = Array2::zeros((m, k));
    for idx in 0..k {
        if sigma[idx] > 1e-14 {
            let inv_s = 1.0 / sigma[idx];
            let col = a.dot(&vt.row(idx));
            for i in 0..m {
                u[[i, idx]] = col[i] * inv_s;
            }
        }
    }

    (u, sigma, vt)
}

/// Pseudoinverse with SVD, dropping singular values below
/// `rcond · sigma_max`.
pub fn pinv_svd(a: &Array2<f64>, rcond: f64) -> Array2<f64> {
    let (u, sigma, vt) = svd_small(a);
    let (m, n) = a.dim();
    let cutoff = rcond * sigma.iter().cloned().fold(0.0, f64::max);

    let mut result = Array2::zeros((n, m));
    for idx in 0..sigma.len() {
        if sigma[idx] > cutoff && sigma[idx] > 0.0 {
            let inv_s = 1.0 / sigma[idx];
            for i in 0..n {
                for j in 0..m {
                    result[[i, j]] += vt[[idx, i]] * inv_s * u[[j, idx]];
                }
            }
        }
    }

    result
}
