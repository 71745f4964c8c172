use core::ops::{Add, Div, Mul, Neg, Sub};

/// Scalar field used throughout the maths layer. `f64` is the only
/// implementor in practice, but keeping the bound generic (rather than
/// hard-coding `f64` everywhere) is what lets `Complex<T>`, `Matrix<T>`
/// and `Vector<T>` stay free of a direct `libm`/`std::f64` dependency.
pub trait Float:
    Copy
    + Clone
    + PartialEq
    + PartialOrd
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
{
    fn zero() -> Self;
    fn one() -> Self;
    fn sqrt(self) -> Self;
    fn atan2(y: Self, x: Self) -> Self;
    fn sin(self) -> Self;
    fn cos(self) -> Self;
    fn exp(self) -> Self;
    fn abs(self) -> Self;
    fn powi(self, n: i32) -> Self;
    fn from_usize(n: usize) -> Self;
    fn from_f64(v: f64) -> Self;
    fn to_f64(self) -> f64;
}

impl Float for f64 {
    fn zero() -> Self {
        0.0
    }

    fn one() -> Self {
        1.0
    }

    fn sqrt(self) -> Self {
        libm::sqrt(self)
    }

    fn atan2(y: Self, x: Self) -> Self {
        libm::atan2(y, x)
    }

    fn sin(self) -> Self {
        libm::sin(self)
    }

    fn cos(self) -> Self {
        libm::cos(self)
    }

    fn exp(self) -> Self {
        libm::exp(self)
    }

    fn abs(self) -> Self {
        libm::fabs(self)
    }

    fn powi(self, n: i32) -> Self {
        libm::pow(self, n as f64)
    }

    fn from_usize(n: usize) -> Self {
        n as f64
    }

    fn from_f64(v: f64) -> Self {
        v
    }

    fn to_f64(self) -> f64 {
        self
    }
}
