use crate::{complex, Complex, Float};
use std::collections::HashMap;

/// Sparse `rows x cols` matrix in compressed form, built from accumulated
/// `(row, col) -> value` contributions (`PETSc`'s `MatSetValues(ADD_VALUES)`).
///
/// Construction happens in two phases, mirroring the PETSc assembly model
/// the original engine was built against: positions are added with
/// [`SparseMatrix::add`] (repeated adds to the same position accumulate),
/// then [`SparseMatrix::assemble`] freezes the non-zero pattern into CSR
/// form. After assembly, [`SparseMatrix::update`] may only touch positions
/// that already existed at assembly time — this is `SAME_NONZERO_PATTERN`.
#[derive(Clone, Debug)]
pub struct SparseMatrix<T: Float> {
    pub rows: usize,
    pub cols: usize,
    pending: HashMap<(usize, usize), Complex<T>>,
    // CSR form, populated once assembled.
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
    values: Vec<Complex<T>>,
    assembled: bool,
}

impl<T: Float> SparseMatrix<T> {
    pub fn new(rows: usize, cols: usize) -> Self {
        SparseMatrix {
            rows,
            cols,
            pending: HashMap::new(),
            row_ptr: Vec::new(),
            col_idx: Vec::new(),
            values: Vec::new(),
            assembled: false,
        }
    }

    pub fn is_assembled(&self) -> bool {
        self.assembled
    }

    /// `ADD_VALUES`: accumulate `v` into position `(row, col)`. Legal before
    /// assembly, and after assembly only for positions already present in
    /// the frozen pattern (debug-checked; the crate's own callers never
    /// violate this since the assembler pre-registers every position it
    /// will later touch).
    pub fn add(&mut self, row: usize, col: usize, v: Complex<T>) {
        debug_assert!(row < self.rows && col < self.cols, "index out of bounds");
        if self.assembled {
            self.update(row, col, v);
            return;
        }
        let entry = self
            .pending
            .entry((row, col))
            .or_insert_with(|| complex!(T::zero(), T::zero()));
        *entry = *entry + v;
    }

    /// Freeze the accumulated `(row, col)` contributions into CSR storage.
    /// Idempotent: re-assembling after more `add` calls (to already-known
    /// positions) re-derives CSR from the same pattern plus updated values.
    pub fn assemble(&mut self) {
        let mut by_row: Vec<Vec<(usize, Complex<T>)>> = vec![Vec::new(); self.rows];
        for (&(r, c), &v) in self.pending.iter() {
            by_row[r].push((c, v));
        }
        for row in by_row.iter_mut() {
            row.sort_by_key(|(c, _)| *c);
        }

        let mut row_ptr = Vec::with_capacity(self.rows + 1);
        let mut col_idx = Vec::new();
        let mut values = Vec::new();
        row_ptr.push(0);
        for row in &by_row {
            for &(c, v) in row {
                col_idx.push(c);
                values.push(v);
            }
            row_ptr.push(col_idx.len());
        }

        self.row_ptr = row_ptr;
        self.col_idx = col_idx;
        self.values = values;
        self.assembled = true;
    }

    /// Overwrite the value at an already-assembled position with `v`
    /// (not accumulate). Used by the integrator's RHS rebuild, which
    /// re-derives each time-dependent entry from scratch every step
    /// rather than accumulating drift across calls. No-op if `(row,
    /// col)` is not part of the frozen pattern — callers are expected to
    /// have pre-registered a zero contribution for every position they
    /// will update (see `KronAssembler::assemble_into`).
    pub fn update(&mut self, row: usize, col: usize, v: Complex<T>) {
        debug_assert!(self.assembled, "update called before assemble");
        if let Some(pos) = self.find(row, col) {
            self.values[pos] = v;
        }
    }

    /// Add (rather than overwrite) into an already-assembled position.
    pub fn add_assembled(&mut self, row: usize, col: usize, v: Complex<T>) {
        debug_assert!(self.assembled, "add_assembled called before assemble");
        if let Some(pos) = self.find(row, col) {
            self.values[pos] = self.values[pos] + v;
        }
    }

    fn find(&self, row: usize, col: usize) -> Option<usize> {
        let start = self.row_ptr[row];
        let end = self.row_ptr[row + 1];
        self.col_idx[start..end]
            .binary_search(&col)
            .ok()
            .map(|i| start + i)
    }

    pub fn get(&self, row: usize, col: usize) -> Complex<T> {
        self.find(row, col)
            .map(|p| self.values[p])
            .unwrap_or(complex!(T::zero(), T::zero()))
    }

    /// Zero every value while keeping the non-zero pattern intact.
    pub fn zero_values(&mut self) {
        for v in self.values.iter_mut() {
            *v = complex!(T::zero(), T::zero());
        }
    }

    /// Copy another matrix's values into `self` at matching positions.
    /// Both matrices must already be assembled with `other`'s pattern a
    /// subset of `self`'s (true for `full_A`/`ham_A` copied into the
    /// integrator's scratch matrix before per-step time-dependent adds).
    pub fn copy_values_from(&mut self, other: &SparseMatrix<T>) {
        debug_assert_eq!(self.rows, other.rows);
        debug_assert_eq!(self.cols, other.cols);
        for r in 0..other.rows {
            let start = other.row_ptr[r];
            let end = other.row_ptr[r + 1];
            for i in start..end {
                let c = other.col_idx[i];
                self.update(r, c, other.values[i]);
            }
        }
    }

    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    pub fn row_entries(&self, row: usize) -> impl Iterator<Item = (usize, Complex<T>)> + '_ {
        let start = self.row_ptr[row];
        let end = self.row_ptr[row + 1];
        (start..end).map(move |i| (self.col_idx[i], self.values[i]))
    }

    /// `y = self * x`.
    pub fn mul_vec(&self, x: &[Complex<T>], y: &mut [Complex<T>]) {
        debug_assert_eq!(x.len(), self.cols);
        debug_assert_eq!(y.len(), self.rows);
        for r in 0..self.rows {
            let mut acc = complex!(T::zero(), T::zero());
            for (c, v) in self.row_entries(r) {
                acc = acc + v * x[c];
            }
            y[r] = acc;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_before_assembly() {
        let mut m = SparseMatrix::<f64>::new(2, 2);
        m.add(0, 0, complex!(1.0, 0.0));
        m.add(0, 0, complex!(2.0, 0.0));
        m.assemble();
        assert_eq!(m.get(0, 0).real, 3.0);
    }

    #[test]
    fn update_respects_pattern() {
        let mut m = SparseMatrix::<f64>::new(2, 2);
        m.add(0, 0, complex!(0.0, 0.0));
        m.assemble();
        m.update(0, 0, complex!(5.0, 0.0));
        assert_eq!(m.get(0, 0).real, 5.0);
        // (0, 1) was never pre-registered: update is a silent no-op.
        m.update(0, 1, complex!(9.0, 0.0));
        assert_eq!(m.get(0, 1).real, 0.0);
    }

    #[test]
    fn mul_vec_identity() {
        let mut m = SparseMatrix::<f64>::new(2, 2);
        m.add(0, 0, complex!(1.0, 0.0));
        m.add(1, 1, complex!(1.0, 0.0));
        m.assemble();
        let x = vec![complex!(3.0, 0.0), complex!(4.0, 0.0)];
        let mut y = vec![complex!(0.0, 0.0); 2];
        m.mul_vec(&x, &mut y);
        assert_eq!(y[0].real, 3.0);
        assert_eq!(y[1].real, 4.0);
    }
}
