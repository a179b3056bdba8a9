use core::fmt::{Debug, Display};
use core::hash::Hash;
use core::iter::{Product, Sum};
use core::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign};

use capss_util::bits_u64;
use num::bigint::BigUint;
use rand::rngs::OsRng;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::ops::Square;

/// Sampling
pub trait Sample: Sized {
    /// Samples a single value using `rng`.
    fn sample<R>(rng: &mut R) -> Self
    where
        R: rand::RngCore + ?Sized;

    /// Samples a single value using the [`OsRng`].
    #[inline]
    fn rand() -> Self {
        Self::sample(&mut OsRng)
    }

    /// Samples a [`Vec`] of values of length `n` using [`OsRng`].
    #[inline]
    fn rand_vec(n: usize) -> Vec<Self> {
        (0..n).map(|_| Self::rand()).collect()
    }

    /// Samples a [`Vec`] of values of length `n` using `rng`.
    #[inline]
    fn sample_vec<R>(rng: &mut R, n: usize) -> Vec<Self>
    where
        R: rand::RngCore + ?Sized,
    {
        (0..n).map(|_| Self::sample(rng)).collect()
    }

    /// Samples an array of values of length `N` using [`OsRng`].
    #[inline]
    fn rand_array<const N: usize>() -> [Self; N] {
        Self::rand_vec(N)
            .try_into()
            .ok()
            .expect("This conversion can never fail.")
    }
}

/// A finite field.
pub trait Field:
    'static
    + Copy
    + Eq
    + Hash
    + Neg<Output = Self>
    + Add<Self, Output = Self>
    + AddAssign<Self>
    + Sum
    + Sub<Self, Output = Self>
    + SubAssign<Self>
    + Mul<Self, Output = Self>
    + MulAssign<Self>
    + Square
    + Product
    + Div<Self, Output = Self>
    + DivAssign<Self>
    + Debug
    + Default
    + Display
    + Sample
    + Send
    + Sync
    + Serialize
    + DeserializeOwned
{
    const ZERO: Self;
    const ONE: Self;
    const TWO: Self;
    const NEG_ONE: Self;

    /// The bit length of the field order.
    const BITS: usize;

    /// `log2` of the field order as a real number, rounded slightly down.
    /// Challenge decoding uses this to budget how many base-`n` digits and
    /// spare proof-of-work bits fit into one uniform field element.
    const LOG2_ORDER: f64;

    fn order() -> BigUint;

    fn characteristic() -> BigUint {
        Self::order()
    }

    #[inline]
    fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    #[inline]
    fn is_nonzero(&self) -> bool {
        *self != Self::ZERO
    }

    #[inline]
    fn is_one(&self) -> bool {
        *self == Self::ONE
    }

    #[inline]
    fn double(&self) -> Self {
        *self + *self
    }

    #[inline]
    fn cube(&self) -> Self {
        self.square() * *self
    }

    /// Compute the multiplicative inverse of this field element.
    fn try_inverse(&self) -> Option<Self>;

    fn inverse(&self) -> Self {
        self.try_inverse().expect("Tried to invert zero")
    }

    /// Inverts a slice of field elements with a single field inversion, using
    /// Montgomery's trick. All inputs must be nonzero.
    fn batch_multiplicative_inverse(x: &[Self]) -> Vec<Self> {
        let n = x.len();
        if n == 0 {
            return Vec::new();
        }

        // Cumulative products x[0], x[0]x[1], ..., then peel individual
        // inverses off the inverted running product.
        let mut prefixes = Vec::with_capacity(n);
        let mut acc = Self::ONE;
        for &xi in x {
            prefixes.push(acc);
            acc *= xi;
        }

        let mut inv = acc.inverse();
        let mut result = vec![Self::ZERO; n];
        for i in (0..n).rev() {
            result[i] = prefixes[i] * inv;
            inv *= x[i];
        }

        for (&ri, &xi) in result.iter().zip(x) {
            debug_assert_eq!(ri * xi, Self::ONE);
        }

        result
    }

    /// Returns `n`. Assumes that `n` is already in canonical form, i.e. `n < Self::order()`.
    fn from_canonical_u64(n: u64) -> Self;

    /// Returns `n`. Assumes that `n` is already in canonical form, i.e. `n < Self::order()`.
    fn from_canonical_u32(n: u32) -> Self {
        Self::from_canonical_u64(n as u64)
    }

    /// Returns `n`. Assumes that `n` is already in canonical form, i.e. `n < Self::order()`.
    fn from_canonical_usize(n: usize) -> Self {
        Self::from_canonical_u64(n as u64)
    }

    fn from_bool(b: bool) -> Self {
        Self::from_canonical_u64(b as u64)
    }

    /// Returns `n % Self::characteristic()`.
    fn from_noncanonical_u128(n: u128) -> Self;

    /// Returns `n % Self::characteristic()`.
    fn from_noncanonical_u64(n: u64) -> Self;

    fn exp_power_of_2(&self, power_log: usize) -> Self {
        let mut res = *self;
        for _ in 0..power_log {
            res = res.square();
        }
        res
    }

    fn exp_u64(&self, power: u64) -> Self {
        let mut current = *self;
        let mut product = Self::ONE;

        for j in 0..bits_u64(power) {
            if ((power >> j) & 1) != 0 {
                product *= current;
            }
            current = current.square();
        }
        product
    }

    fn powers(&self) -> Powers<Self> {
        self.shifted_powers(Self::ONE)
    }

    fn shifted_powers(&self, start: Self) -> Powers<Self> {
        Powers {
            base: *self,
            current: start,
        }
    }

    /// Equivalent to *self + x * y, but may be cheaper.
    #[inline]
    fn multiply_accumulate(&self, x: Self, y: Self) -> Self {
        // Default implementation.
        *self + x * y
    }
}

/// A prime field.
pub trait PrimeField: Field {
    fn to_canonical_biguint(&self) -> BigUint;
}

/// A finite field of order less than 2^64.
pub trait Field64: Field {
    const ORDER: u64;
}

/// A finite field of prime order less than 2^64.
pub trait PrimeField64: PrimeField + Field64 {
    fn to_canonical_u64(&self) -> u64;

    fn to_noncanonical_u64(&self) -> u64;

    #[inline(always)]
    fn to_canonical(&self) -> Self {
        Self::from_canonical_u64(self.to_canonical_u64())
    }
}

/// An iterator over the powers of a certain base element `b`: `b^0, b^1, b^2, ...`.
#[must_use = "iterators are lazy and do nothing unless consumed"]
#[derive(Clone, Debug)]
pub struct Powers<F: Field> {
    base: F,
    current: F,
}

impl<F: Field> Iterator for Powers<F> {
    type Item = F;

    fn next(&mut self) -> Option<F> {
        let result = self.current;
        self.current *= self.base;
        Some(result)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (usize::MAX, None)
    }
}

#[cfg(test)]
mod tests {
    use super::{Field, Sample};
    use crate::goldilocks_field::GoldilocksField;

    type F = GoldilocksField;

    #[test]
    fn batch_inversion() {
        let xs = F::rand_vec(37);
        let invs = F::batch_multiplicative_inverse(&xs);
        for (&x, &inv) in xs.iter().zip(&invs) {
            assert_eq!(x * inv, F::ONE);
        }
        assert!(F::batch_multiplicative_inverse(&[]).is_empty());
    }

    #[test]
    fn exp_u64_matches_powers() {
        let x = F::rand();
        let mut powers = x.powers();
        for i in 0..20u64 {
            assert_eq!(powers.next().unwrap(), x.exp_u64(i));
        }
    }
}
