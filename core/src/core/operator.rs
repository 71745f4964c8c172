use crate::{complex, Complex, Matrix};

/// One of the symbolic single-site operators the parser and the Kron
/// assembler both honour. `N_op`, `Raise`, `Lower` are bosonic-ladder
/// aliases of `A`/`ADagger` kept distinct so the parser can accept either
/// spelling (`original_source`'s term grammar uses both).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SiteOp {
    I,
    X,
    Y,
    Z,
    Sp,
    Sm,
    NOp,
    A,
    ADagger,
}

impl SiteOp {
    pub fn from_str(s: &str) -> Option<SiteOp> {
        match s.to_ascii_uppercase().as_str() {
            "I" => Some(SiteOp::I),
            "X" => Some(SiteOp::X),
            "Y" => Some(SiteOp::Y),
            "Z" => Some(SiteOp::Z),
            "SP" => Some(SiteOp::Sp),
            "SM" => Some(SiteOp::Sm),
            "N" | "N_OP" => Some(SiteOp::NOp),
            "A" | "LOWER" => Some(SiteOp::A),
            "ADAG" | "ADAGGER" | "A_DAG" | "RAISE" => Some(SiteOp::ADagger),
            _ => None,
        }
    }

    /// The canonical wire spelling `from_str` maps back to this same
    /// variant from — used by the parser's term serializer (Section 8
    /// invariant 3: `parse(serialize(t)) = t`).
    pub fn wire_name(&self) -> &'static str {
        match self {
            SiteOp::I => "I",
            SiteOp::X => "X",
            SiteOp::Y => "Y",
            SiteOp::Z => "Z",
            SiteOp::Sp => "SP",
            SiteOp::Sm => "SM",
            SiteOp::NOp => "N",
            SiteOp::A => "A",
            SiteOp::ADagger => "ADAG",
        }
    }

    /// Dense `d x d` matrix of this operator at level count `d`. For
    /// `{I, X, Y, Z, SP, SM}` only the top-left `2x2` block is non-zero
    /// (4.1: "standard Pauli/identity on a two-level projection of the
    /// site"); `A`/`ADagger`/`N_op` are full bosonic-ladder operators
    /// that act across all `d` levels.
    pub fn dense_matrix(&self, d: usize) -> Matrix<f64> {
        let mut m = Matrix::zeros(d, d);
        match self {
            SiteOp::I => {
                for i in 0..d {
                    m.set(i, i, complex!(1.0, 0.0));
                }
            }
            SiteOp::X => {
                if d >= 2 {
                    m.set(0, 1, complex!(1.0, 0.0));
                    m.set(1, 0, complex!(1.0, 0.0));
                }
            }
            SiteOp::Y => {
                if d >= 2 {
                    m.set(0, 1, complex!(0.0, -1.0));
                    m.set(1, 0, complex!(0.0, 1.0));
                }
            }
            SiteOp::Z => {
                if d >= 1 {
                    m.set(0, 0, complex!(1.0, 0.0));
                }
                if d >= 2 {
                    m.set(1, 1, complex!(-1.0, 0.0));
                }
            }
            SiteOp::Sp => {
                // |1><0|
                if d >= 2 {
                    m.set(1, 0, complex!(1.0, 0.0));
                }
            }
            SiteOp::Sm => {
                // |0><1|
                if d >= 2 {
                    m.set(0, 1, complex!(1.0, 0.0));
                }
            }
            SiteOp::A => {
                // a|n> = sqrt(n) |n-1>
                for n in 1..d {
                    m.set(n - 1, n, complex!((n as f64).sqrt(), 0.0));
                }
            }
            SiteOp::ADagger => {
                // a^dagger|n> = sqrt(n+1) |n+1>
                for n in 0..d.saturating_sub(1) {
                    m.set(n + 1, n, complex!(((n + 1) as f64).sqrt(), 0.0));
                }
            }
            SiteOp::NOp => {
                // number operator: a^dagger a, diagonal with eigenvalue n
                for n in 0..d {
                    m.set(n, n, complex!(n as f64, 0.0));
                }
            }
        }
        m
    }
}

/// A qudit: index into the site list, uniform level count, and the
/// partial dimensions used by the Kron embedding identity
/// `O_p = I_{n_before} x O x I_{n_after}` (4.1).
#[derive(Debug, Clone, Copy)]
pub struct Site {
    pub index: usize,
    pub levels: usize,
    pub n_before: usize,
    pub n_after: usize,
}

/// Owns the per-site level count, assigns tensor positions, and computes
/// the global Hilbert-space dimension `D = levels^num_sites`. Created
/// once after `num_qubits` is fixed (Section 6: `create_qubits` may be
/// called only once per instance) and lives for the simulation's
/// lifetime.
#[derive(Debug, Clone)]
pub struct OperatorRegistry {
    levels: usize,
    sites: Vec<Site>,
}

impl OperatorRegistry {
    /// Rejects `num_sites == 0` per the Section 9 Open Question decision
    /// (DESIGN.md): the source's signed-long `num_qubits` silently
    /// permitted non-positive values, which this crate (operating on
    /// `usize`) simply rules out by construction for negatives and
    /// rejects explicitly for zero.
    pub fn new(num_sites: usize, levels: usize) -> Result<Self, crate::SimError> {
        if num_sites == 0 {
            return Err(crate::SimError::ContractViolation(
                "num_sites must be positive".into(),
            ));
        }
        if levels < 2 {
            return Err(crate::SimError::ContractViolation(
                "levels must be at least 2".into(),
            ));
        }
        let mut sites = Vec::with_capacity(num_sites);
        let mut n_before = 1usize;
        for i in 0..num_sites {
            sites.push(Site {
                index: i,
                levels,
                n_before,
                n_after: 0,
            });
            n_before *= levels;
        }
        let dim = n_before;
        for s in sites.iter_mut() {
            s.n_after = dim / (s.n_before * s.levels);
        }
        Ok(OperatorRegistry { levels, sites })
    }

    pub fn num_sites(&self) -> usize {
        self.sites.len()
    }

    pub fn levels(&self) -> usize {
        self.levels
    }

    /// Global Schrödinger-space dimension `D`.
    pub fn dim(&self) -> usize {
        self.levels.pow(self.sites.len() as u32)
    }

    pub fn site(&self, index: usize) -> Result<Site, crate::SimError> {
        self.sites.get(index).copied().ok_or_else(|| {
            crate::SimError::ContractViolation(format!(
                "site index {} out of range for {} sites",
                index,
                self.sites.len()
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_dimensions_agree_with_global_dim() {
        let reg = OperatorRegistry::new(3, 2).unwrap();
        assert_eq!(reg.dim(), 8);
        let s1 = reg.site(1).unwrap();
        assert_eq!(s1.n_before, 2);
        assert_eq!(s1.n_after, 2);
    }

    #[test]
    fn rejects_zero_sites() {
        assert!(OperatorRegistry::new(0, 2).is_err());
    }

    #[test]
    fn ladder_operator_matches_sqrt_n() {
        let m = SiteOp::A.dense_matrix(3);
        assert!((m.get(0, 1).real - 1.0).abs() < 1e-12);
        assert!((m.get(1, 2).real - (2.0f64).sqrt()).abs() < 1e-12);
    }
}
