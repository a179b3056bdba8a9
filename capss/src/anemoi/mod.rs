//! The Anemoi-style regular permutation used as the one-way function.
//!
//! The signature core only needs a narrow view of the permutation: its
//! shape, the S-box parameters, the round keys, and the forward S-box
//! layer. The MDS layer and the round verification residues are defined
//! here ([`mds`], [`round`]) on top of that view.

pub mod mds;
pub mod round;

use std::sync::OnceLock;

use capss_field::goldilocks_field::GoldilocksField;
use capss_field::ops::Square;
use capss_field::types::{Field, Sample};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::hash::hash_types::RichField;

/// The permutation surface the regular-permutation statement is built on.
pub trait RegularPermutation<F: RichField>: Sync {
    /// State width; must be even (the S-box acts on column pairs).
    fn state_size(&self) -> usize;

    fn nb_rounds(&self) -> usize;

    /// Extra witness entries per round; zero for Anemoi, whose rounds are
    /// verified from the states alone.
    fn round_wit_size(&self) -> usize;

    /// Algebraic degree of the round verification residues (the S-box
    /// exponent alpha).
    fn verification_degree(&self) -> usize;

    /// `(alpha, beta, delta)` of the Flystel S-box.
    fn sbox_parameters(&self) -> (u64, F, F);

    /// The field generator `g` used by the MDS layer.
    fn generator(&self) -> F;

    /// All round keys, `nb_rounds * state_size` elements, row per round.
    fn round_keys(&self) -> &[F];

    /// Forward S-box layer over a full state.
    fn apply_sbox_layer(&self, state: &[F]) -> Vec<F>;
}

/// Anemoi with 8 state cells (4 Flystel columns) over Goldilocks:
/// `alpha = 7`, `beta = g = 7`, `delta = g^-1`, 10 rounds.
#[derive(Debug, Default)]
pub struct AnemoiGoldilocks;

type F = GoldilocksField;

const STATE_SIZE: usize = 8;
const NB_COLS: usize = STATE_SIZE / 2;
const NB_ROUNDS: usize = 10;
const ALPHA: u64 = 7;
/// `7^-1 mod (p - 1)`, the exponent computing seventh roots.
const ALPHA_INV_EXP: u64 = 10540996611094048183;
const GENERATOR: u64 = 7;

fn round_keys() -> &'static [F] {
    static KEYS: OnceLock<Vec<F>> = OnceLock::new();
    KEYS.get_or_init(|| {
        // Deterministic constants: ChaCha8 seeded with zero, sampled
        // uniformly from the field.
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        F::sample_vec(&mut rng, NB_ROUNDS * STATE_SIZE)
    })
}

impl RegularPermutation<F> for AnemoiGoldilocks {
    fn state_size(&self) -> usize {
        STATE_SIZE
    }

    fn nb_rounds(&self) -> usize {
        NB_ROUNDS
    }

    fn round_wit_size(&self) -> usize {
        0
    }

    fn verification_degree(&self) -> usize {
        ALPHA as usize
    }

    fn sbox_parameters(&self) -> (u64, F, F) {
        let beta = F::from_canonical_u64(GENERATOR);
        (ALPHA, beta, beta.inverse())
    }

    fn generator(&self) -> F {
        F::from_canonical_u64(GENERATOR)
    }

    fn round_keys(&self) -> &[F] {
        round_keys()
    }

    fn apply_sbox_layer(&self, state: &[F]) -> Vec<F> {
        debug_assert_eq!(state.len(), STATE_SIZE);
        let (_, beta, delta) = self.sbox_parameters();

        let mut out = vec![F::ZERO; STATE_SIZE];
        for i in 0..NB_COLS {
            let x = state[i];
            let y = state[NB_COLS + i];
            // Open Flystel: u = t + beta * v^2 + delta with t = x - beta * y^2
            // and v = y - t^(1/alpha).
            let t = x - beta * y.square();
            let v = y - t.exp_u64(ALPHA_INV_EXP);
            let u = t + beta * v.square() + delta;
            out[i] = u;
            out[NB_COLS + i] = v;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alpha_inverse_exponent() {
        // 7 * ALPHA_INV_EXP = 1 mod (p - 1), so x -> x^ALPHA_INV_EXP
        // inverts x -> x^7.
        let x = F::rand();
        assert_eq!(x.exp_u64(ALPHA).exp_u64(ALPHA_INV_EXP), x);
        assert_eq!(x.exp_u64(ALPHA_INV_EXP).exp_u64(ALPHA), x);
    }

    #[test]
    fn sbox_satisfies_flystel_relations() {
        let perm = AnemoiGoldilocks;
        let (_, beta, delta) = perm.sbox_parameters();
        let state = F::rand_vec(STATE_SIZE);
        let out = perm.apply_sbox_layer(&state);
        for i in 0..NB_COLS {
            let (x, y) = (state[i], state[NB_COLS + i]);
            let (u, v) = (out[i], out[NB_COLS + i]);
            let t = x - beta * y.square();
            assert_eq!((y - v).exp_u64(ALPHA), t);
            assert_eq!(u - (beta * v.square() + delta), t);
        }
    }

    #[test]
    fn round_keys_are_stable() {
        let a = round_keys();
        let b = round_keys();
        assert_eq!(a.len(), NB_ROUNDS * STATE_SIZE);
        assert_eq!(a, b);
    }
}
