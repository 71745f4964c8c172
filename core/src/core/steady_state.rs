use crate::{complex, Complex, SimError, SolverConfig, SparseMatrix};

/// GMRES(restart) for a general complex linear system `A x = b`, given
/// only a matrix-vector product — used both by
/// [`SteadyStateSolver::solve`] (over the stabilized Liouvillian) and by
/// the implicit Rosenbrock-W stepper's per-step linear solve
/// (`(I - h*gamma*A) k = rhs`), which never materializes `(I - h*gamma*A)`
/// as its own sparse matrix. Preconditioned by a diagonal (Jacobi)
/// scaling — the additive-Schwarz preconditioner the spec names is a
/// distributed-memory domain-decomposition scheme that only makes sense
/// across multiple row-partitioned processes (Section 5); single-process
/// Jacobi scaling is this crate's in-process stand-in (documented in
/// DESIGN.md).
pub fn gmres(
    matvec: impl Fn(&[Complex<f64>]) -> Vec<Complex<f64>>,
    diag_precond: &[Complex<f64>],
    b: &[Complex<f64>],
    x0: Vec<Complex<f64>>,
    config: &SolverConfig,
) -> Result<(Vec<Complex<f64>>, usize, f64), SimError> {
    let n = b.len();
    let mut x = x0;
    let b_norm = norm(b).max(1e-300);
    let mut total_iters = 0usize;

    loop {
        let ax = matvec(&x);
        let mut r: Vec<Complex<f64>> = (0..n).map(|i| b[i] - ax[i]).collect();
        precondition(&mut r, diag_precond);
        let beta = norm(&r);
        let resid = beta / b_norm;
        if resid <= config.rel_tol {
            return Ok((x, total_iters, resid));
        }
        if total_iters >= config.max_iterations {
            return Err(SimError::NumericalFailure(format!(
                "GMRES did not converge: residual {:.3e} after {} iterations",
                resid, total_iters
            )));
        }

        let m = config.gmres_restart.min(n).max(1);
        let mut v: Vec<Vec<Complex<f64>>> = Vec::with_capacity(m + 1);
        v.push(r.iter().map(|c| *c / complex!(beta, 0.0)).collect());
        let mut h = vec![vec![complex!(0.0, 0.0); m]; m + 1];
        let mut cs = vec![complex!(0.0, 0.0); m];
        let mut sn = vec![complex!(0.0, 0.0); m];
        let mut g = vec![complex!(0.0, 0.0); m + 1];
        g[0] = complex!(beta, 0.0);

        let mut k_used = 0;
        for k in 0..m {
            k_used = k + 1;
            total_iters += 1;
            let mut w = matvec(&v[k]);
            precondition(&mut w, diag_precond);
            for i in 0..=k {
                let hik = inner(&v[i], &w);
                h[i][k] = hik;
                for j in 0..n {
                    w[j] = w[j] - hik * v[i][j];
                }
            }
            let hk1k = norm(&w);
            h[k + 1][k] = complex!(hk1k, 0.0);
            if hk1k > 1e-300 {
                v.push(w.iter().map(|c| *c / complex!(hk1k, 0.0)).collect());
            } else {
                v.push(vec![complex!(0.0, 0.0); n]);
            }

            for i in 0..k {
                let temp = cs[i].get_conjugate() * h[i][k] + sn[i].get_conjugate() * h[i + 1][k];
                h[i + 1][k] = -sn[i] * h[i][k] + cs[i] * h[i + 1][k];
                h[i][k] = temp;
            }
            let (c, s) = givens(h[k][k], h[k + 1][k]);
            cs[k] = c;
            sn[k] = s;
            h[k][k] = c.get_conjugate() * h[k][k] + s.get_conjugate() * h[k + 1][k];
            h[k + 1][k] = complex!(0.0, 0.0);
            let g_k = g[k];
            g[k] = c.get_conjugate() * g_k;
            g[k + 1] = -s * g_k;

            if total_iters >= config.max_iterations {
                break;
            }
            if g[k + 1].abs() / b_norm <= config.rel_tol {
                break;
            }
        }

        let mut y = vec![complex!(0.0, 0.0); k_used];
        for i in (0..k_used).rev() {
            let mut sum = g[i];
            for j in (i + 1)..k_used {
                sum = sum - h[i][j] * y[j];
            }
            y[i] = sum / h[i][i];
        }
        for i in 0..n {
            let mut delta = complex!(0.0, 0.0);
            for j in 0..k_used {
                delta = delta + v[j][i] * y[j];
            }
            x[i] = x[i] + delta;
        }
    }
}

fn precondition(r: &mut [Complex<f64>], diag: &[Complex<f64>]) {
    for (ri, di) in r.iter_mut().zip(diag.iter()) {
        if di.real != 0.0 || di.imaginary != 0.0 {
            *ri = *ri / *di;
        }
    }
}

fn inner(a: &[Complex<f64>], b: &[Complex<f64>]) -> Complex<f64> {
    let mut acc = complex!(0.0, 0.0);
    for (x, y) in a.iter().zip(b.iter()) {
        acc = acc + x.get_conjugate() * *y;
    }
    acc
}

fn norm(v: &[Complex<f64>]) -> f64 {
    v.iter().map(|c| c.norm2()).sum::<f64>().sqrt()
}

fn givens(a: Complex<f64>, b: Complex<f64>) -> (Complex<f64>, Complex<f64>) {
    if b.real == 0.0 && b.imaginary == 0.0 {
        return (complex!(1.0, 0.0), complex!(0.0, 0.0));
    }
    let scale = (a.norm2() + b.norm2()).sqrt();
    let c = complex!(a.abs() / scale, 0.0);
    let s = if a.abs() > 1e-300 {
        (a / complex!(a.abs(), 0.0)).get_conjugate() * b / complex!(scale, 0.0)
    } else {
        complex!(b.abs() / scale, 0.0)
    };
    (c, s)
}

/// Adds the stabilization row to the Liouvillian and solves `L x = b`
/// for the physical steady state (4.6). Row 0 gets `+1` at every
/// flattened-diagonal column `i*(D+1)` (`sum rho_ii = 1`); `b` is zero
/// except `b[0] = 1`. The stabilization row is removed before any
/// subsequent `time_step` call (tracked via `stabilized`, a one-bit
/// flag per Section 3 Lifecycle / Section 6 `stab_added`).
pub struct SteadyStateSolver {
    config: SolverConfig,
    stabilized: bool,
}

impl SteadyStateSolver {
    pub fn new(config: SolverConfig) -> Self {
        SteadyStateSolver {
            config,
            stabilized: false,
        }
    }

    pub fn is_stabilized(&self) -> bool {
        self.stabilized
    }

    /// Solves for the steady state of the assembled Liouvillian `full_a`
    /// (dimension `D^2`). `dim` is the Schrödinger-space `D`.
    pub fn solve(
        &mut self,
        full_a: &mut SparseMatrix<f64>,
        dim: usize,
    ) -> Result<Vec<Complex<f64>>, SimError> {
        if self.stabilized {
            return Err(SimError::InvalidState(
                "steady_state called while already stabilized".into(),
            ));
        }
        let n = dim * dim;
        let stab_cols: Vec<usize> = (0..dim).map(|i| i * (dim + 1)).collect();
        for &c in &stab_cols {
            full_a.add_assembled(0, c, complex!(1.0, 0.0));
        }
        self.stabilized = true;

        let mut b = vec![complex!(0.0, 0.0); n];
        b[0] = complex!(1.0, 0.0);

        let diag: Vec<Complex<f64>> = (0..n).map(|i| full_a.get(i, i)).collect();
        let full_a_ref = &*full_a;
        let result = gmres(
            |x| {
                let mut y = vec![complex!(0.0, 0.0); n];
                full_a_ref.mul_vec(x, &mut y);
                y
            },
            &diag,
            &b,
            vec![complex!(0.0, 0.0); n],
            &self.config,
        );

        for &c in &stab_cols {
            full_a.add_assembled(0, c, complex!(-1.0, 0.0));
        }
        self.stabilized = false;

        match &result {
            Ok((_, iters, resid)) => {
                tracing::info!(iterations = iters, residual = resid, "steady-state GMRES converged");
            }
            Err(e) => {
                tracing::warn!(error = %e, "steady-state GMRES failed to converge");
            }
        }
        let (x, _iters, _resid) = result?;
        Ok(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn gmres_solves_identity_exactly() {
        let n = 3;
        let b = vec![complex!(1.0, 0.0), complex!(2.0, 0.0), complex!(3.0, 0.0)];
        let diag = vec![complex!(1.0, 0.0); n];
        let (x, _iters, resid) = gmres(
            |v| v.to_vec(),
            &diag,
            &b,
            vec![complex!(0.0, 0.0); n],
            &SolverConfig::default(),
        )
        .unwrap();
        assert!(resid < 1e-8);
        for i in 0..n {
            assert_abs_diff_eq!(x[i].real, b[i].real, epsilon = 1e-6);
        }
    }
}
