use crate::{complex, Complex, Matrix, OperatorRegistry, SimError, SiteOp, SparseMatrix};

/// A site-operator contribution already embedded in the full `D x D`
/// Schrödinger-space basis: a list of non-zero `(row, col, value)`
/// triples. Kept as a plain list rather than a [`SparseMatrix`] because
/// the Hamiltonian builder needs to add these into several different
/// matrices (`ham_A`, `full_A`, the per-term `TD[k]` scratch) without
/// re-deriving the embedding each time.
pub type Embedding = Vec<(usize, usize, Complex<f64>)>;

/// Expands symbolic single- or two-site operators into their `D x D`
/// Schrödinger-space contributions, and provides the Liouville-space
/// helpers (`left_mult`/`right_mult`/commutator/Lindblad dissipator) used
/// once any decay term is present. `D x D` here, not `D^2 x D^2` — the
/// Liouville helpers operate on embeddings already produced for the
/// Schrödinger space and lift them into the flattened density-matrix
/// space on demand.
pub struct KronAssembler<'a> {
    registry: &'a OperatorRegistry,
}

impl<'a> KronAssembler<'a> {
    pub fn new(registry: &'a OperatorRegistry) -> Self {
        KronAssembler { registry }
    }

    /// `O_p = I_{n_before} x O x I_{n_after}` (4.1). Iterates only the
    /// dense operator's own non-zero entries, so the cost is
    /// `O(n_before * n_after * nnz(O))`, not `O(D^2)`.
    pub fn embed_single(&self, op: SiteOp, site: usize, coeff: Complex<f64>) -> Result<Embedding, SimError> {
        let s = self.registry.site(site)?;
        let local = op.dense_matrix(s.levels);
        let mut out = Vec::new();
        for i in 0..s.levels {
            for j in 0..s.levels {
                let v = local.get(i, j);
                if v.real == 0.0 && v.imaginary == 0.0 {
                    continue;
                }
                for b in 0..s.n_before {
                    for a in 0..s.n_after {
                        let row = (b * s.levels + i) * s.n_after + a;
                        let col = (b * s.levels + j) * s.n_after + a;
                        out.push((row, col, coeff * v));
                    }
                }
            }
        }
        Ok(out)
    }

    /// Product of two single-site operators on distinct sites. Rejects
    /// same-site pairs per the Section 9 Open Question decision
    /// (DESIGN.md): the assembler's embedding identity only has a
    /// well-defined meaning for two distinct tensor factors.
    pub fn embed_two(
        &self,
        op1: SiteOp,
        site1: usize,
        op2: SiteOp,
        site2: usize,
        coeff: Complex<f64>,
    ) -> Result<Embedding, SimError> {
        if site1 == site2 {
            return Err(SimError::ContractViolation(format!(
                "two-operator term on the same site {} is not supported",
                site1
            )));
        }
        let e1 = self.embed_single(op1, site1, complex!(1.0, 0.0))?;
        let e2 = self.embed_single(op2, site2, coeff)?;
        Ok(multiply_embeddings(&e1, &e2, self.registry.dim()))
    }
}

/// Sparse matrix product of two `D x D` embeddings, each already
/// expanded into the full space. Used for two-operator terms: the
/// Assembler "multiplies the two single-operator sparse contributions
/// symbolically" (4.1) rather than building the two full Kron products
/// and multiplying dense `D x D` matrices.
fn multiply_embeddings(a: &Embedding, b: &Embedding, dim: usize) -> Embedding {
    use std::collections::HashMap;
    let mut b_by_row: HashMap<usize, Vec<(usize, Complex<f64>)>> = HashMap::new();
    for &(r, c, v) in b {
        b_by_row.entry(r).or_default().push((c, v));
    }
    let mut acc: HashMap<(usize, usize), Complex<f64>> = HashMap::new();
    for &(r, k, v_a) in a {
        if let Some(row) = b_by_row.get(&k) {
            for &(c, v_b) in row {
                let entry = acc.entry((r, c)).or_insert(complex!(0.0, 0.0));
                *entry = *entry + v_a * v_b;
            }
        }
    }
    let _ = dim;
    acc.into_iter().map(|((r, c), v)| (r, c, v)).collect()
}

/// Write every entry of `embedding` into `target` as a zero-valued
/// contribution, establishing the non-zero pattern before assembly
/// (4.1: "must emit a zero contribution for every non-zero position it
/// will later update").
pub fn pre_register(target: &mut SparseMatrix<f64>, embedding: &Embedding) {
    for &(r, c, _) in embedding {
        target.add(r, c, complex!(0.0, 0.0));
    }
}

/// Add `coeff * embedding` into `target` (`ADD_VALUES`).
pub fn add_embedding(target: &mut SparseMatrix<f64>, embedding: &Embedding, coeff: Complex<f64>) {
    for &(r, c, v) in embedding {
        target.add(r, c, coeff * v);
    }
}

/// Left multiplication `(H rho)_ij = sum_k H_ik rho_kj`, lifted into the
/// `D^2 x D^2` row-major-flattened Liouville space (`x[i*dim+j] =
/// rho_ij`): for each non-zero `H_{r,c}`, contributes at `(row = r*dim +
/// j, col = c*dim + j)` for every `j`.
pub fn liouville_left_mult(target: &mut SparseMatrix<f64>, dim: usize, h: &Embedding, coeff: Complex<f64>) {
    for &(r, c, v) in h {
        for j in 0..dim {
            target.add(r * dim + j, c * dim + j, coeff * v);
        }
    }
}

/// Right multiplication `(rho H)_ij = sum_k rho_ik H_kj`: for each
/// non-zero `H_{r,c}`, contributes at `(row = i*dim + c, col = i*dim +
/// r)` for every `i`.
pub fn liouville_right_mult(target: &mut SparseMatrix<f64>, dim: usize, h: &Embedding, coeff: Complex<f64>) {
    for &(r, c, v) in h {
        for i in 0..dim {
            target.add(i * dim + c, i * dim + r, coeff * v);
        }
    }
}

/// `-i * coeff * [H, rho]`, i.e. the unitary part of the Liouville–von
/// Neumann equation contributed by one Hamiltonian term embedding.
pub fn liouville_commutator(target: &mut SparseMatrix<f64>, dim: usize, h: &Embedding, coeff: Complex<f64>) {
    let unit = complex!(0.0, -1.0) * coeff;
    liouville_left_mult(target, dim, h, unit);
    liouville_right_mult(target, dim, h, -unit);
}

/// Assembled-matrix counterparts of [`liouville_left_mult`] /
/// [`liouville_right_mult`] used by the integrator's per-step RHS
/// rebuild, which accumulates into an already-frozen scratch matrix
/// rather than one still collecting pending contributions.
pub fn liouville_left_mult_assembled(target: &mut SparseMatrix<f64>, dim: usize, h: &Embedding, coeff: Complex<f64>) {
    for &(r, c, v) in h {
        for j in 0..dim {
            target.add_assembled(r * dim + j, c * dim + j, coeff * v);
        }
    }
}

pub fn liouville_right_mult_assembled(target: &mut SparseMatrix<f64>, dim: usize, h: &Embedding, coeff: Complex<f64>) {
    for &(r, c, v) in h {
        for i in 0..dim {
            target.add_assembled(i * dim + c, i * dim + r, coeff * v);
        }
    }
}

/// Pre-register the non-zero pattern a commutator contribution will
/// touch, without writing a value (see [`pre_register`]).
pub fn liouville_commutator_pattern(target: &mut SparseMatrix<f64>, dim: usize, h: &Embedding) {
    for &(r, c, _) in h {
        for j in 0..dim {
            target.add(r * dim + j, c * dim + j, complex!(0.0, 0.0));
            target.add(j * dim + r, j * dim + c, complex!(0.0, 0.0));
        }
    }
}

/// `kappa * (L rho L^dagger - 1/2 {L^dagger L, rho})`, the standard
/// Lindblad dissipator, added directly into the `D^2 x D^2` Liouvillian.
/// `l` is the collapse operator's `D x D` embedding; `l_dag_l` is the
/// (separately pre-computed) embedding of `L^dagger L`.
pub fn add_lindblad(
    target: &mut SparseMatrix<f64>,
    dim: usize,
    l: &Embedding,
    l_dag_l: &Embedding,
    kappa: f64,
) {
    // L rho L^dagger: (L rho L^dagger)_ij = sum_{k,l} L_ik * conj(L_jl) * rho_kl
    for &(i, k, l_ik) in l {
        for &(j, lcol, l_jl) in l {
            let v = complex!(kappa, 0.0) * l_ik * l_jl.get_conjugate();
            target.add(i * dim + j, k * dim + lcol, v);
        }
    }
    let half = complex!(-0.5 * kappa, 0.0);
    liouville_left_mult(target, dim, l_dag_l, half);
    liouville_right_mult(target, dim, l_dag_l, half);
}

/// Pre-register the non-zero pattern of a Lindblad dissipator.
pub fn lindblad_pattern(target: &mut SparseMatrix<f64>, dim: usize, l: &Embedding, l_dag_l: &Embedding) {
    for &(i, k, _) in l {
        for &(j, lcol, _) in l {
            target.add(i * dim + j, k * dim + lcol, complex!(0.0, 0.0));
        }
    }
    for &(r, c, _) in l_dag_l {
        for j in 0..dim {
            target.add(r * dim + j, c * dim + j, complex!(0.0, 0.0));
            target.add(j * dim + r, j * dim + c, complex!(0.0, 0.0));
        }
    }
}

/// `L^dagger L` as a `D x D` embedding, from `L`'s embedding. `L` here is
/// always a single-site embedding of one symbolic operator (`SM` for
/// qubit decay), so this is computed via the conjugate-transpose
/// definition rather than a generic sparse-matrix multiply.
pub fn dagger_mul(l: &Embedding) -> Embedding {
    let mut dagger: Embedding = l.iter().map(|&(r, c, v)| (c, r, v.get_conjugate())).collect();
    dagger.sort_by_key(|&(r, c, _)| (r, c));
    multiply_embeddings(&dagger, l, 0)
}

/// Dense `D x D` operator acting on the full space, used by gate
/// application where a small dense matrix is cheaper to build than a
/// sparse one (gate targets are few qubits, the rest is identity).
pub fn embed_single_dense(registry: &OperatorRegistry, op: &Matrix<f64>, site: usize) -> Result<Matrix<f64>, SimError> {
    let s = registry.site(site)?;
    let dim = registry.dim();
    let mut out = Matrix::zeros(dim, dim);
    for i in 0..s.levels {
        for j in 0..s.levels {
            let v = op.get(i, j);
            for b in 0..s.n_before {
                for a in 0..s.n_after {
                    let row = (b * s.levels + i) * s.n_after + a;
                    let col = (b * s.levels + j) * s.n_after + a;
                    out.set(row, col, v);
                }
            }
        }
    }
    Ok(out)
}

/// Dense `D x D` embedding of a `2^k x 2^k` gate unitary (`k` in `{1,
/// 2}`) acting on `targets`, used by the integrator's gate-application
/// event. Unlike [`embed_single_dense`], this handles the two-qubit
/// case and works directly in the mixed-radix digit decomposition of
/// the global index (`digit_i = (idx / n_after_i) % levels_i`), since a
/// `Kron`-product view of a two-target gate would need the targets
/// adjacent in tensor order, which callers cannot guarantee.
pub fn embed_gate_dense(
    registry: &OperatorRegistry,
    gate: &Matrix<f64>,
    targets: &[usize],
) -> Result<Matrix<f64>, SimError> {
    let sites: Vec<_> = targets
        .iter()
        .map(|&t| registry.site(t))
        .collect::<Result<_, _>>()?;
    for s in &sites {
        if s.levels != 2 {
            return Err(SimError::ContractViolation(format!(
                "gate targets must be two-level sites, site {} has {} levels",
                s.index, s.levels
            )));
        }
    }
    let k = sites.len();
    let gate_dim = 1usize << k;
    if gate.rows != gate_dim || gate.cols != gate_dim {
        return Err(SimError::ContractViolation(format!(
            "gate matrix is {}x{}, expected {}x{} for {} target(s)",
            gate.rows, gate.cols, gate_dim, gate_dim, k
        )));
    }

    let dim = registry.dim();
    let mut out = Matrix::zeros(dim, dim);
    for r in 0..dim {
        let mut combined_row = 0usize;
        for s in &sites {
            combined_row = combined_row * 2 + (r / s.n_after) % s.levels;
        }
        for combined_col in 0..gate_dim {
            let v = gate.get(combined_row, combined_col);
            if v.real == 0.0 && v.imaginary == 0.0 {
                continue;
            }
            let mut c = r;
            let mut remaining = combined_col;
            for (i, s) in sites.iter().enumerate() {
                let shift = k - i - 1;
                let digit = (remaining >> shift) & 1;
                remaining &= (1 << shift) - 1;
                let old_digit = (c / s.n_after) % s.levels;
                let delta = (digit as isize - old_digit as isize) * s.n_after as isize;
                c = (c as isize + delta) as usize;
            }
            out.set(r, c, v);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::OperatorRegistry;

    #[test]
    fn single_embedding_respects_identity_on_other_sites() {
        let reg = OperatorRegistry::new(2, 2).unwrap();
        let ka = KronAssembler::new(&reg);
        let e = ka.embed_single(SiteOp::X, 0, complex!(1.0, 0.0)).unwrap();
        // X on site 0 in a 2-qubit space: basis |00> <-> |10>, |01> <-> |11>.
        let mut found = vec![false; 4];
        for &(r, c, v) in &e {
            if (r, c) == (2, 0) || (r, c) == (0, 2) || (r, c) == (3, 1) || (r, c) == (1, 3) {
                assert!((v.real - 1.0).abs() < 1e-12);
                found[match (r, c) {
                    (2, 0) => 0,
                    (0, 2) => 1,
                    (3, 1) => 2,
                    _ => 3,
                }] = true;
            }
        }
        assert!(found.iter().all(|&b| b));
    }

    #[test]
    fn same_site_two_operator_term_is_rejected() {
        let reg = OperatorRegistry::new(2, 2).unwrap();
        let ka = KronAssembler::new(&reg);
        let r = ka.embed_two(SiteOp::X, 0, SiteOp::Z, 0, complex!(1.0, 0.0));
        assert!(r.is_err());
    }

    #[test]
    fn embed_gate_dense_targets_correct_qubit() {
        let reg = OperatorRegistry::new(2, 2).unwrap();
        let x = crate::PAULI_X.clone();
        let full = embed_gate_dense(&reg, &x, &[1]).unwrap();
        // X on site 1 (least-significant qubit): |00> <-> |01>, |10> <-> |11>.
        assert!((full.get(0, 1).real - 1.0).abs() < 1e-12);
        assert!((full.get(2, 3).real - 1.0).abs() < 1e-12);
        assert!((full.get(0, 2).real).abs() < 1e-12);
    }
}
