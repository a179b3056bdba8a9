//! Interpolation over arbitrary point sets.
//!
//! The commitment layers interpolate over small consecutive-integer domains,
//! so everything here is the quadratic Lagrange construction with batched
//! denominator inversion; no FFT.

use crate::polynomial::PolynomialCoeffs;
use crate::types::Field;

/// The monic polynomial vanishing on all of `roots`; `roots.len() + 1`
/// coefficients.
pub fn vanishing_poly<F: Field>(roots: &[F]) -> PolynomialCoeffs<F> {
    let mut p = PolynomialCoeffs::new(vec![F::ONE]);
    for &root in roots {
        p = p.mul_by_linear(root);
    }
    p
}

fn lagrange_denominators<F: Field>(points: &[F]) -> Vec<F> {
    let n = points.len();
    F::batch_multiplicative_inverse(
        &(0..n)
            .map(|i| {
                (0..n)
                    .filter(|&j| j != i)
                    .map(|j| points[i] - points[j])
                    .product::<F>()
            })
            .collect::<Vec<_>>(),
    )
}

/// The Lagrange basis polynomial for `points[ind]`: the unique polynomial of
/// degree `points.len() - 1` taking 1 at `points[ind]` and 0 at the others.
pub fn lagrange_basis<F: Field>(points: &[F], ind: usize) -> PolynomialCoeffs<F> {
    let numerator = vanishing_poly(points).remove_linear_factor(points[ind]);
    let denominator: F = points
        .iter()
        .enumerate()
        .filter(|&(j, _)| j != ind)
        .map(|(_, &pj)| points[ind] - pj)
        .product();
    &numerator * denominator.inverse()
}

/// Computes the unique polynomial with `points.len()` coefficients matching
/// `evals` on `points`. The points must be pairwise distinct.
pub fn interpolate<F: Field>(evals: &[F], points: &[F]) -> PolynomialCoeffs<F> {
    let n = points.len();
    assert_eq!(evals.len(), n);

    // All Lagrange numerators share the vanishing polynomial; peel one linear
    // factor off per basis element instead of rebuilding each product.
    let vanishing = vanishing_poly(points);
    let inv_denominators = lagrange_denominators(points);

    let mut result: PolynomialCoeffs<F> = PolynomialCoeffs::zero(n);
    for i in 0..n {
        let basis = vanishing.remove_linear_factor(points[i]);
        let scale = inv_denominators[i] * evals[i];
        for (acc, &c) in result.coeffs.iter_mut().zip(&basis.coeffs) {
            *acc = acc.multiply_accumulate(scale, c);
        }
    }
    result
}

/// Rebuilds a polynomial with `degree + 1` coefficients from its high-order
/// coefficients (positions `m..=degree`, where `m = points.len()`) together
/// with `m` evaluations.
///
/// The low part is whatever interpolates the evaluations once the high
/// part's contribution `x^m * high(x)` has been subtracted out.
pub fn restore_from_high<F: Field>(
    high: &[F],
    evals: &[F],
    points: &[F],
    degree: usize,
) -> PolynomialCoeffs<F> {
    let m = points.len();
    assert_eq!(evals.len(), m);
    assert_eq!(high.len(), degree + 1 - m);

    let high_poly = PolynomialCoeffs::new(high.to_vec());
    let shifted_evals: Vec<F> = points
        .iter()
        .zip(evals)
        .map(|(&x, &e)| e - high_poly.eval(x) * x.exp_u64(m as u64))
        .collect();

    let mut coeffs = interpolate(&shifted_evals, points).coeffs;
    coeffs.extend_from_slice(high);
    debug_assert_eq!(coeffs.len(), degree + 1);
    PolynomialCoeffs::new(coeffs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::goldilocks_field::GoldilocksField;
    use crate::types::Sample;

    type F = GoldilocksField;

    #[test]
    fn interpolate_then_evaluate_is_identity() {
        for n in 1..12 {
            let points: Vec<F> = (0..n).map(F::from_canonical_usize).collect();
            let evals = F::rand_vec(n);
            let p = interpolate(&evals, &points);
            assert_eq!(p.len(), n);
            for (&x, &e) in points.iter().zip(&evals) {
                assert_eq!(p.eval(x), e);
            }
        }
    }

    #[test]
    fn vanishing_poly_vanishes_exactly_on_roots() {
        let roots = F::rand_vec(9);
        let v = vanishing_poly(&roots);
        for &r in &roots {
            assert_eq!(v.eval(r), F::ZERO);
        }
        let x = F::rand();
        if !roots.contains(&x) {
            assert!(v.eval(x).is_nonzero());
        }
    }

    #[test]
    fn lagrange_basis_is_indicator() {
        let points: Vec<F> = (0..7u32).map(F::from_canonical_u32).collect();
        for i in 0..points.len() {
            let l = lagrange_basis(&points, i);
            for (j, &x) in points.iter().enumerate() {
                let expected = if i == j { F::ONE } else { F::ZERO };
                assert_eq!(l.eval(x), expected);
            }
        }
    }

    #[test]
    fn restore_matches_original() {
        let degree = 11;
        let m = 4;
        let p = PolynomialCoeffs::<F>::new(F::rand_vec(degree + 1));
        let points: Vec<F> = (10..10 + m).map(F::from_canonical_usize).collect();
        let evals = p.eval_multiple(&points);
        let restored = restore_from_high(&p.coeffs[m..], &evals, &points, degree);
        assert_eq!(restored, p);
    }
}
