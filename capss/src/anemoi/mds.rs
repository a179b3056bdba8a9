//! The Anemoi MDS layer, for states of 1 to 4 Flystel columns.
//!
//! The layer acts identically on scalars and on polynomials (the
//! verification side applies it to witness-row polynomials), so the
//! sequence of additions and generator multiplications is written once over
//! a small value abstraction.

use capss_field::polynomial::PolynomialCoeffs;
use capss_field::types::Field;

pub(crate) trait MdsValue<F: Field>: Clone {
    fn add(&self, other: &Self) -> Self;
    fn mul_gen(&self, generator: F) -> Self;
}

impl<F: Field> MdsValue<F> for F {
    fn add(&self, other: &Self) -> Self {
        *self + *other
    }

    fn mul_gen(&self, generator: F) -> Self {
        *self * generator
    }
}

impl<F: Field> MdsValue<F> for PolynomialCoeffs<F> {
    fn add(&self, other: &Self) -> Self {
        self + other
    }

    fn mul_gen(&self, generator: F) -> Self {
        self * generator
    }
}

fn mds_internal<F: Field, T: MdsValue<F>>(state: &mut [T], g: F) {
    match state.len() {
        3 => {
            // tmp = state[0] + g * state[2]
            let tmp = state[0].add(&state[2].mul_gen(g));
            // state[2] += state[1]
            state[2] = state[2].add(&state[1]);
            // state[0] = tmp + state[2]; state[1] += tmp
            state[0] = tmp.add(&state[2]);
            state[1] = state[1].add(&tmp);
        }
        4 => {
            state[0] = state[0].add(&state[1]);
            state[2] = state[2].add(&state[3]);
            state[3] = state[3].add(&state[0].mul_gen(g));
            state[1] = state[1].add(&state[2]).mul_gen(g);
            state[0] = state[0].add(&state[1]);
            state[2] = state[2].add(&state[3].mul_gen(g));
            state[1] = state[1].add(&state[2]);
            state[3] = state[3].add(&state[0]);
        }
        n => panic!("unsupported MDS column count {n}"),
    }
}

/// Applies the MDS layer in place; `state.len()` must be 2, 4, 6 or 8.
pub(crate) fn apply_mds_layer<F: Field, T: MdsValue<F>>(state: &mut [T], g: F) {
    let nb_cols = state.len() / 2;
    debug_assert_eq!(state.len() % 2, 0);

    match nb_cols {
        1 => {
            state[1] = state[1].add(&state[0]);
            state[0] = state[0].add(&state[1]);
        }
        2 => {
            state[0] = state[0].add(&state[1].mul_gen(g));
            state[1] = state[1].add(&state[0].mul_gen(g));
            state[3] = state[3].add(&state[2].mul_gen(g));
            state[2] = state[2].add(&state[3].mul_gen(g));
            state.swap(2, 3);

            state[2] = state[2].add(&state[0]);
            state[3] = state[3].add(&state[1]);
            state[0] = state[0].add(&state[2]);
            state[1] = state[1].add(&state[3]);
        }
        3 | 4 => {
            mds_internal(&mut state[..nb_cols], g);
            state[nb_cols..].rotate_left(1);
            mds_internal(&mut state[nb_cols..], g);

            // PHT layer.
            for i in 0..nb_cols {
                state[nb_cols + i] = state[nb_cols + i].add(&state[i]);
            }
            for i in 0..nb_cols {
                state[i] = state[i].add(&state[nb_cols + i]);
            }
        }
        n => panic!("unsupported MDS column count {n}"),
    }
}

#[cfg(test)]
mod tests {
    use capss_field::goldilocks_field::GoldilocksField;
    use capss_field::types::Sample;

    use super::*;

    type F = GoldilocksField;

    #[test]
    fn scalar_and_polynomial_layers_agree() {
        let g = F::from_canonical_u64(7);
        for state_size in [2, 4, 6, 8] {
            let polys: Vec<PolynomialCoeffs<F>> = (0..state_size)
                .map(|_| PolynomialCoeffs::new(F::rand_vec(5)))
                .collect();
            let x = F::rand();
            let mut scalars: Vec<F> = polys.iter().map(|p| p.eval(x)).collect();

            let mut poly_state = polys;
            apply_mds_layer(&mut poly_state, g);
            apply_mds_layer(&mut scalars, g);

            // The layer is linear, so it commutes with evaluation.
            for (p, &s) in poly_state.iter().zip(&scalars) {
                assert_eq!(p.eval(x), s);
            }
        }
    }

    #[test]
    fn layer_is_invertible() {
        // An MDS layer must at least be a bijection: distinct inputs map to
        // distinct outputs. Spot-check via a perturbation.
        let g = F::from_canonical_u64(7);
        let a = F::rand_vec(8);
        let mut b = a.clone();
        b[3] += F::ONE;
        let (mut ma, mut mb) = (a, b);
        apply_mds_layer(&mut ma, g);
        apply_mds_layer(&mut mb, g);
        assert_ne!(ma, mb);
    }
}
