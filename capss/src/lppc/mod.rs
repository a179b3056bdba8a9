//! LPPC: linearly-preprocessed polynomial-constraint statements.
//!
//! A statement is a packed witness matrix (`nb_wit_rows` rows of
//! `packing_factor` entries, each row interpolated into one witness
//! polynomial over the packing points) constrained two ways:
//!
//! - polynomial constraints: fixed-degree outputs that must vanish on every
//!   packing point;
//! - linear constraints: outputs whose sum over the packing points must
//!   equal a public value.
//!
//! Implementors supply both the polynomial-domain and the evaluation-domain
//! views of their constraints; the PIOP batches either side with the same
//! challenge coefficients.

pub mod regular_perm;

use anyhow::{ensure, Result};
use capss_field::interpolation::interpolate;
use capss_field::polynomial::PolynomialCoeffs;

use crate::hash::hash_types::RichField;

#[derive(Clone, Debug)]
pub struct LppcParams {
    /// Number of rows in the matrix witness.
    pub nb_wit_rows: usize,
    /// Packing factor: number of columns in the matrix witness.
    pub packing_factor: usize,
    /// Degree of the polynomial constraints.
    pub constraint_degree: usize,
    pub nb_poly_constraints: usize,
    pub nb_linear_constraints: usize,
}

impl LppcParams {
    /// Size of the packed witness in field elements.
    pub fn witness_size(&self) -> usize {
        self.nb_wit_rows * self.packing_factor
    }
}

pub trait Lppc<F: RichField> {
    fn params(&self) -> &LppcParams;

    /// The polynomial-constraint outputs, one polynomial per constraint,
    /// for a witness given as row polynomials.
    fn constraint_poly_polynomials(
        &self,
        wit_polys: &[PolynomialCoeffs<F>],
        packing_points: &[F],
    ) -> Vec<PolynomialCoeffs<F>>;

    /// The linear-constraint outputs, one polynomial per constraint.
    fn constraint_linear_polynomials(
        &self,
        wit_polys: &[PolynomialCoeffs<F>],
        packing_points: &[F],
    ) -> Vec<PolynomialCoeffs<F>>;

    /// The batched linear-constraint outputs: for each challenge row, the
    /// combination of all linear constraints by its coefficients.
    fn constraint_linear_polynomials_batched(
        &self,
        wit_polys: &[PolynomialCoeffs<F>],
        packing_points: &[F],
        gammas: &[Vec<F>],
    ) -> Vec<PolynomialCoeffs<F>> {
        let per_constraint = self.constraint_linear_polynomials(wit_polys, packing_points);
        gammas
            .iter()
            .map(|row| {
                let mut combined = PolynomialCoeffs::empty();
                for (poly, &gamma) in per_constraint.iter().zip(row) {
                    combined += &(poly * gamma);
                }
                combined
            })
            .collect()
    }

    /// The public outputs of the linear constraints.
    fn linear_result(&self) -> Vec<F>;

    /// Evaluation-domain counterpart of [`Self::constraint_poly_polynomials`]:
    /// `out[j][i]` is constraint `i`'s output at `eval_points[j]`, computed
    /// from the witness rows' evaluations there.
    fn constraint_poly_evals(
        &self,
        eval_points: &[F],
        wit_evals: &[Vec<F>],
        packing_points: &[F],
    ) -> Vec<Vec<F>>;

    /// Evaluation-domain counterpart of [`Self::constraint_linear_polynomials`].
    fn constraint_linear_evals(
        &self,
        eval_points: &[F],
        wit_evals: &[Vec<F>],
        packing_points: &[F],
    ) -> Vec<Vec<F>>;
}

/// Checks a packed witness against every constraint of the statement,
/// without any masking randomness. Used by key generation sanity checks and
/// tests.
pub fn test_witness<F: RichField, L: Lppc<F>>(lppc: &L, witness: &[F]) -> Result<()> {
    let params = lppc.params();
    let pf = params.packing_factor;
    ensure!(witness.len() == params.witness_size(), "lppc: wrong witness size");

    let packing_points: Vec<F> = (0..pf).map(F::from_canonical_usize).collect();

    let wit_polys: Vec<PolynomialCoeffs<F>> = (0..params.nb_wit_rows)
        .map(|i| interpolate(&witness[i * pf..(i + 1) * pf], &packing_points))
        .collect();

    let in_ppol = lppc.constraint_poly_polynomials(&wit_polys, &packing_points);
    ensure!(
        in_ppol.len() == params.nb_poly_constraints,
        "lppc: wrong polynomial constraint count"
    );
    for (i, poly) in in_ppol.iter().enumerate() {
        for &pt in &packing_points {
            ensure!(
                poly.eval(pt).is_zero(),
                "lppc: polynomial constraint {i} does not vanish"
            );
        }
    }

    let in_plin = lppc.constraint_linear_polynomials(&wit_polys, &packing_points);
    let vt = lppc.linear_result();
    ensure!(
        in_plin.len() == params.nb_linear_constraints && vt.len() == params.nb_linear_constraints,
        "lppc: wrong linear constraint count"
    );
    for (i, (poly, &expected)) in in_plin.iter().zip(&vt).enumerate() {
        let sum: F = packing_points.iter().map(|&pt| poly.eval(pt)).sum();
        ensure!(sum == expected, "lppc: linear constraint {i} does not hold");
    }

    Ok(())
}
