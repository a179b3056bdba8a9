//! One permutation round, forward and in verification form.
//!
//! A round is ARK (add round keys), the MDS layer, then the S-box layer.
//! The verifier never inverts the S-box: for each Flystel column it checks
//! the two residues
//!
//! ```text
//! R1 = (y - v)^alpha - (x - beta * y^2)
//! R2 = u - (beta * v^2 + delta) - (x - beta * y^2)
//! ```
//!
//! where `(x, y)` is the state after ARK and MDS and `(u, v)` the next
//! round state. Both vanish exactly when the round was computed honestly.

use capss_field::polynomial::PolynomialCoeffs;

use super::mds::apply_mds_layer;
use super::RegularPermutation;
use crate::hash::hash_types::RichField;

/// The forward round function on a state vector.
pub fn compute_round_function<F: RichField, P: RegularPermutation<F> + ?Sized>(
    perm: &P,
    in_state: &[F],
    round_cst: &[F],
) -> Vec<F> {
    let mut state: Vec<F> = in_state
        .iter()
        .zip(round_cst)
        .map(|(&s, &c)| s + c)
        .collect();
    apply_mds_layer(&mut state, perm.generator());
    perm.apply_sbox_layer(&state)
}

/// The round verification residues on scalar states: `state_size` values,
/// `R1` for the columns then `R2`.
pub fn round_verification_residues<F: RichField, P: RegularPermutation<F> + ?Sized>(
    perm: &P,
    in_state: &[F],
    out_state: &[F],
    round_cst: &[F],
) -> Vec<F> {
    let (alpha, beta, delta) = perm.sbox_parameters();
    let state_size = perm.state_size();
    let nb_cols = state_size / 2;

    let mut state: Vec<F> = in_state
        .iter()
        .zip(round_cst)
        .map(|(&s, &c)| s + c)
        .collect();
    apply_mds_layer(&mut state, perm.generator());

    let mut out = vec![F::ZERO; state_size];
    for i in 0..nb_cols {
        let x = state[i];
        let y = state[nb_cols + i];
        let u = out_state[i];
        let v = out_state[nb_cols + i];

        let t = x - beta * y.square();
        out[i] = (y - v).exp_u64(alpha) - t;
        out[nb_cols + i] = u - (beta * v.square() + delta) - t;
    }
    out
}

/// The same residues with the states given as polynomials; every output
/// carries `alpha * wit_poly_degree + 1` coefficients.
pub fn round_verification_residue_polys<F: RichField, P: RegularPermutation<F> + ?Sized>(
    perm: &P,
    in_state: &[PolynomialCoeffs<F>],
    out_state: &[PolynomialCoeffs<F>],
    round_cst: &[PolynomialCoeffs<F>],
    wit_poly_degree: usize,
) -> Vec<PolynomialCoeffs<F>> {
    let (alpha, beta, delta) = perm.sbox_parameters();
    let state_size = perm.state_size();
    let nb_cols = state_size / 2;
    let out_len = alpha as usize * wit_poly_degree + 1;

    let mut state: Vec<PolynomialCoeffs<F>> = in_state
        .iter()
        .zip(round_cst)
        .map(|(s, c)| s + c)
        .collect();
    apply_mds_layer(&mut state, perm.generator());

    let mut out = Vec::with_capacity(state_size);
    let mut out_r2 = Vec::with_capacity(nb_cols);
    for i in 0..nb_cols {
        let x = &state[i];
        let y = &state[nb_cols + i];
        let u = &out_state[i];
        let v = &out_state[nb_cols + i];

        // t = x - beta * y^2
        let t = x - &(&(y * y) * beta);

        // R1 = (y - v)^alpha - t
        let y_minus_v = y - v;
        let mut r1 = y_minus_v.clone();
        for _ in 1..alpha {
            r1 = &r1 * &y_minus_v;
        }
        out.push((&r1 - &t).padded(out_len));

        // R2 = u - (beta * v^2 + delta) - t
        let mut qv = &(v * v) * beta;
        qv.coeffs[0] += delta;
        out_r2.push((&(u - &qv) - &t).padded(out_len));
    }
    out.extend(out_r2);
    out
}

#[cfg(test)]
mod tests {
    use capss_field::goldilocks_field::GoldilocksField;
    use capss_field::interpolation::interpolate;
    use capss_field::types::{Field, Sample};

    use super::*;
    use crate::anemoi::AnemoiGoldilocks;

    type F = GoldilocksField;

    #[test]
    fn residues_vanish_on_honest_rounds() {
        let perm = AnemoiGoldilocks;
        let t = perm.state_size();
        let in_state = F::rand_vec(t);
        let cst = &perm.round_keys()[..t];

        let out_state = compute_round_function(&perm, &in_state, cst);
        let residues = round_verification_residues(&perm, &in_state, &out_state, cst);
        assert!(residues.iter().all(|r| r.is_zero()));

        // A corrupted output state breaks at least one residue.
        let mut bad = out_state;
        bad[2] += F::ONE;
        let residues = round_verification_residues(&perm, &in_state, &bad, cst);
        assert!(residues.iter().any(|r| r.is_nonzero()));
    }

    #[test]
    fn residue_polys_match_scalar_residues() {
        // Interpolate two consecutive states at two points; the residue
        // polynomials must evaluate to the scalar residues at each point.
        let perm = AnemoiGoldilocks;
        let t = perm.state_size();
        let points: Vec<F> = vec![F::from_canonical_u32(0), F::from_canonical_u32(1)];
        let cst = &perm.round_keys()[..t];

        let in0 = F::rand_vec(t);
        let in1 = F::rand_vec(t);
        let out0 = compute_round_function(&perm, &in0, cst);
        let out1 = F::rand_vec(t);

        let wit_degree = 1;
        let in_polys: Vec<_> = (0..t)
            .map(|i| interpolate(&[in0[i], in1[i]], &points))
            .collect();
        let out_polys: Vec<_> = (0..t)
            .map(|i| interpolate(&[out0[i], out1[i]], &points))
            .collect();
        let cst_polys: Vec<_> = cst
            .iter()
            .map(|&c| PolynomialCoeffs::new(vec![c, F::ZERO]))
            .collect();

        let residue_polys =
            round_verification_residue_polys(&perm, &in_polys, &out_polys, &cst_polys, wit_degree);

        for (num, &pt) in points.iter().enumerate() {
            let in_state = if num == 0 { &in0 } else { &in1 };
            let out_state = if num == 0 { &out0 } else { &out1 };
            let scalar = round_verification_residues(&perm, in_state, out_state, cst);
            for i in 0..t {
                assert_eq!(residue_polys[i].eval(pt), scalar[i]);
            }
        }
    }
}
