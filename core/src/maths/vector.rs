use crate::{complex, Complex, Float};
use core::ops;

/// Dense complex vector: a Schrödinger-space state (dimension `D`) or a
/// row-major-flattened density matrix (dimension `D^2`) in Liouville mode.
#[derive(Clone, Debug)]
pub struct Vector<T: Float> {
    pub data: Vec<Complex<T>>,
}

impl<T: Float> Vector<T> {
    pub fn new(data: Vec<Complex<T>>) -> Self {
        Vector { data }
    }

    pub fn zeros(n: usize) -> Self {
        Vector {
            data: vec![complex!(T::zero(), T::zero()); n],
        }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn get(&self, i: usize) -> Complex<T> {
        self.data[i]
    }

    pub fn set(&mut self, i: usize, v: Complex<T>) {
        self.data[i] = v;
    }

    /// `sqrt(sum |x_i|^2)`.
    pub fn norm(&self) -> T {
        let mut acc = T::zero();
        for x in &self.data {
            acc = acc + x.norm2();
        }
        T::sqrt(acc)
    }

    pub fn normalize(&mut self) {
        let n = self.norm();
        if n == T::zero() {
            return;
        }
        // `Complex<T> / T` (the `impl_ops!(Div, ..., real)` arm) only
        // scales the real part; dividing by a full complex scalar here
        // scales both real and imaginary parts.
        let divisor = complex!(n, T::zero());
        for x in self.data.iter_mut() {
            *x = *x / divisor;
        }
    }

    /// `sum_i conj(a_i) * b_i`.
    pub fn inner_product(&self, other: &Vector<T>) -> Complex<T> {
        let mut acc = complex!(T::zero(), T::zero());
        for (a, b) in self.data.iter().zip(other.data.iter()) {
            acc = acc + a.get_conjugate() * *b;
        }
        acc
    }

    pub fn scale(&self, c: Complex<T>) -> Vector<T> {
        Vector {
            data: self.data.iter().map(|x| *x * c).collect(),
        }
    }
}

impl<T: Float> ops::Add for Vector<T> {
    type Output = Vector<T>;

    fn add(self, other: Vector<T>) -> Vector<T> {
        Vector {
            data: self
                .data
                .into_iter()
                .zip(other.data)
                .map(|(a, b)| a + b)
                .collect(),
        }
    }
}

impl<T: Float> ops::Sub for Vector<T> {
    type Output = Vector<T>;

    fn sub(self, other: Vector<T>) -> Vector<T> {
        Vector {
            data: self
                .data
                .into_iter()
                .zip(other.data)
                .map(|(a, b)| a - b)
                .collect(),
        }
    }
}
