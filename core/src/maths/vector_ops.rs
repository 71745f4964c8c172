use crate::{complex, Complex, Float, Vector};

/// The computational basis state `|index>` in a `dim`-dimensional space.
pub fn basis_state<T: Float>(index: usize, dim: usize) -> Vector<T> {
    let mut v = Vector::zeros(dim);
    v.set(index, complex!(T::one(), T::zero()));
    v
}

/// `a ⊗ b` for state vectors (used when composing per-site basis states
/// into a full tensor-product initial condition).
pub fn kron_vec<T: Float>(a: &Vector<T>, b: &Vector<T>) -> Vector<T> {
    let mut out = Vector::zeros(a.size() * b.size());
    for i in 0..a.size() {
        for j in 0..b.size() {
            out.set(i * b.size() + j, a.get(i) * b.get(j));
        }
    }
    out
}

/// Diagonal populations `|x_i|^2` of a Schrödinger-space state vector.
pub fn populations<T: Float>(state: &Vector<T>) -> Vec<T> {
    state.data.iter().map(|c: &Complex<T>| c.norm2()).collect()
}

/// Diagonal populations of a Liouville-space (flattened `D x D` density
/// matrix) state vector: the real part of `rho[i*dim+i]`.
pub fn populations_liouville<T: Float>(state: &Vector<T>, dim: usize) -> Vec<T> {
    (0..dim).map(|i| state.get(i * dim + i).real).collect()
}
