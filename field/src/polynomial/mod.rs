use core::cmp::max;
use core::iter::Sum;
use core::ops::{Add, AddAssign, Mul, MulAssign, Neg, Sub, SubAssign};

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

use crate::types::Field;

/// A polynomial in coefficient form.
///
/// The commitment layers treat polynomials as dense vectors of a fixed
/// length: a committed polynomial of degree `d` always carries `d + 1`
/// coefficients, trailing zeros included, because transcripts serialize the
/// full coefficient vector.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct PolynomialCoeffs<F: Field> {
    pub coeffs: Vec<F>,
}

impl<F: Field> PolynomialCoeffs<F> {
    pub fn new(coeffs: Vec<F>) -> Self {
        PolynomialCoeffs { coeffs }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn zero(len: usize) -> Self {
        Self::new(vec![F::ZERO; len])
    }

    pub fn is_zero(&self) -> bool {
        self.coeffs.iter().all(|x| x.is_zero())
    }

    /// The number of coefficients. This does not filter out any zero coefficients, so it is not
    /// necessarily related to the degree.
    pub fn len(&self) -> usize {
        self.coeffs.len()
    }

    /// The nominal degree: one less than the coefficient count.
    pub fn degree(&self) -> usize {
        self.len()
            .checked_sub(1)
            .expect("degree of an empty polynomial")
    }

    /// Degree of the polynomial + 1, or 0 for a polynomial with no non-zero coefficients.
    pub fn degree_plus_one(&self) -> usize {
        (0usize..self.len())
            .rev()
            .find(|&i| self.coeffs[i].is_nonzero())
            .map_or(0, |i| i + 1)
    }

    pub fn eval(&self, x: F) -> F {
        self.coeffs
            .iter()
            .rev()
            .fold(F::ZERO, |acc, &c| acc * x + c)
    }

    /// Evaluates the polynomial at every point of `xs`.
    pub fn eval_multiple(&self, xs: &[F]) -> Vec<F> {
        xs.iter().map(|&x| self.eval(x)).collect()
    }

    pub fn pad(&mut self, new_len: usize) -> Result<()> {
        ensure!(
            new_len >= self.len(),
            "Trying to pad a polynomial of length {} to a length of {}.",
            self.len(),
            new_len
        );
        self.coeffs.resize(new_len, F::ZERO);
        Ok(())
    }

    pub fn padded(&self, new_len: usize) -> Self {
        let mut poly = self.clone();
        poly.pad(new_len).unwrap();
        poly
    }

    /// Removes any leading zero coefficients.
    pub fn trimmed(&self) -> Self {
        let coeffs = self.coeffs[..self.degree_plus_one()].to_vec();
        Self { coeffs }
    }

    /// Divides out an exact linear factor `(X - root)`, returning a
    /// polynomial with one coefficient fewer.
    ///
    /// The caller must guarantee that `root` is indeed a root; synthetic
    /// division silently drops the remainder otherwise.
    pub fn remove_linear_factor(&self, root: F) -> Self {
        let n = self.len();
        debug_assert!(n >= 2);
        let mut out = vec![F::ZERO; n - 1];
        out[n - 2] = self.coeffs[n - 1];
        for i in (0..n - 2).rev() {
            out[i] = self.coeffs[i + 1].multiply_accumulate(root, out[i + 1]);
        }
        debug_assert_eq!(self.eval(root), F::ZERO);
        Self::new(out)
    }

    /// Multiplies by the monic linear factor `(X - root)`.
    pub fn mul_by_linear(&self, root: F) -> Self {
        let n = self.len();
        let mut out = vec![F::ZERO; n + 1];
        let neg_root = -root;
        out[n] = self.coeffs[n - 1];
        for i in (1..n).rev() {
            out[i] = self.coeffs[i - 1].multiply_accumulate(neg_root, self.coeffs[i]);
        }
        out[0] = neg_root * self.coeffs[0];
        Self::new(out)
    }
}

impl<F: Field> PartialEq for PolynomialCoeffs<F> {
    fn eq(&self, other: &Self) -> bool {
        let max_terms = self.coeffs.len().max(other.coeffs.len());
        for i in 0..max_terms {
            let self_i = self.coeffs.get(i).cloned().unwrap_or(F::ZERO);
            let other_i = other.coeffs.get(i).cloned().unwrap_or(F::ZERO);
            if self_i != other_i {
                return false;
            }
        }
        true
    }
}

impl<F: Field> Eq for PolynomialCoeffs<F> {}

impl<F: Field> From<Vec<F>> for PolynomialCoeffs<F> {
    fn from(coeffs: Vec<F>) -> Self {
        Self::new(coeffs)
    }
}

impl<F: Field> Add for &PolynomialCoeffs<F> {
    type Output = PolynomialCoeffs<F>;

    fn add(self, rhs: Self) -> Self::Output {
        let len = max(self.len(), rhs.len());
        let a = self.padded(len).coeffs;
        let b = rhs.padded(len).coeffs;
        let coeffs = a.into_iter().zip(b).map(|(x, y)| x + y).collect();
        PolynomialCoeffs::new(coeffs)
    }
}

impl<F: Field> Sum for PolynomialCoeffs<F> {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::empty(), |acc, p| &acc + &p)
    }
}

impl<F: Field> Sub for &PolynomialCoeffs<F> {
    type Output = PolynomialCoeffs<F>;

    fn sub(self, rhs: Self) -> Self::Output {
        let len = max(self.len(), rhs.len());
        let mut coeffs = self.padded(len).coeffs;
        for (i, &c) in rhs.coeffs.iter().enumerate() {
            coeffs[i] -= c;
        }
        PolynomialCoeffs::new(coeffs)
    }
}

impl<F: Field> Neg for &PolynomialCoeffs<F> {
    type Output = PolynomialCoeffs<F>;

    fn neg(self) -> Self::Output {
        PolynomialCoeffs::new(self.coeffs.iter().map(|&x| -x).collect())
    }
}

impl<F: Field> AddAssign<&Self> for PolynomialCoeffs<F> {
    fn add_assign(&mut self, rhs: &Self) {
        let len = max(self.len(), rhs.len());
        self.coeffs.resize(len, F::ZERO);
        for (l, &r) in self.coeffs.iter_mut().zip(&rhs.coeffs) {
            *l += r;
        }
    }
}

impl<F: Field> SubAssign<&Self> for PolynomialCoeffs<F> {
    fn sub_assign(&mut self, rhs: &Self) {
        let len = max(self.len(), rhs.len());
        self.coeffs.resize(len, F::ZERO);
        for (l, &r) in self.coeffs.iter_mut().zip(&rhs.coeffs) {
            *l -= r;
        }
    }
}

impl<F: Field> Mul<F> for &PolynomialCoeffs<F> {
    type Output = PolynomialCoeffs<F>;

    fn mul(self, rhs: F) -> Self::Output {
        let coeffs = self.coeffs.iter().map(|&x| rhs * x).collect();
        PolynomialCoeffs::new(coeffs)
    }
}

impl<F: Field> MulAssign<F> for PolynomialCoeffs<F> {
    fn mul_assign(&mut self, rhs: F) {
        self.coeffs.iter_mut().for_each(|x| *x *= rhs);
    }
}

impl<F: Field> Mul for &PolynomialCoeffs<F> {
    type Output = PolynomialCoeffs<F>;

    /// Schoolbook product; the output carries `deg(a) + deg(b) + 1`
    /// coefficients. The committed polynomials are small enough that an
    /// FFT-based product would not pay for itself.
    fn mul(self, rhs: Self) -> Self::Output {
        let mut coeffs = vec![F::ZERO; self.len() + rhs.len() - 1];
        for (i, &a) in self.coeffs.iter().enumerate() {
            for (j, &b) in rhs.coeffs.iter().enumerate() {
                coeffs[i + j] = coeffs[i + j].multiply_accumulate(a, b);
            }
        }
        PolynomialCoeffs::new(coeffs)
    }
}

#[cfg(test)]
mod tests {
    use rand::{thread_rng, Rng};

    use super::*;
    use crate::goldilocks_field::GoldilocksField;
    use crate::types::Sample;

    type F = GoldilocksField;

    #[test]
    fn test_polynomial_multiplication() {
        let mut rng = thread_rng();
        let (a_deg, b_deg) = (rng.gen_range(1..100), rng.gen_range(1..100));
        let a = PolynomialCoeffs::new(F::rand_vec(a_deg + 1));
        let b = PolynomialCoeffs::new(F::rand_vec(b_deg + 1));
        let m = &a * &b;
        assert_eq!(m.len(), a_deg + b_deg + 1);
        for _ in 0..100 {
            let x = F::rand();
            assert_eq!(m.eval(x), a.eval(x) * b.eval(x));
        }
    }

    #[test]
    fn test_linear_factors() {
        let root = F::rand();
        let p = PolynomialCoeffs::new(F::rand_vec(10));
        let q = p.mul_by_linear(root);
        assert_eq!(q.eval(root), F::ZERO);
        assert_eq!(q.remove_linear_factor(root), p);

        let x = F::rand();
        assert_eq!(q.eval(x), p.eval(x) * (x - root));
    }

    #[test]
    fn test_add_sub() {
        let a = PolynomialCoeffs::new(F::rand_vec(7));
        let b = PolynomialCoeffs::new(F::rand_vec(4));
        let x = F::rand();
        assert_eq!((&a + &b).eval(x), a.eval(x) + b.eval(x));
        assert_eq!((&a - &b).eval(x), a.eval(x) - b.eval(x));
    }

    #[test]
    fn eq_ignores_trailing_zeros() {
        assert_eq!(
            PolynomialCoeffs::<F>::new(vec![F::ONE]),
            PolynomialCoeffs::new(vec![F::ONE, F::ZERO])
        );
        assert_ne!(
            PolynomialCoeffs::<F>::new(vec![F::ZERO]),
            PolynomialCoeffs::new(vec![F::ZERO, F::ONE])
        );
    }
}
