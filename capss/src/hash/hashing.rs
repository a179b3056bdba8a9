//! The field XOF used for every commitment and challenge hash.
//!
//! A duplex sponge in overwrite mode over a width-12 permutation. Short
//! inputs with digest-sized outputs cost exactly one permutation call, which
//! is the amortised 2-to-1 / 4-to-1 node compression the Merkle layer relies
//! on: absorbing a chunk shorter than the rate leaves the remaining rate
//! elements at zero, i.e. the input is implicitly zero-padded.

use static_assertions::const_assert;

use crate::hash::hash_types::{Digest, RichField, NUM_DIGEST_ELTS};

pub const SPONGE_RATE: usize = 8;
pub const SPONGE_CAPACITY: usize = 4;
pub const SPONGE_WIDTH: usize = SPONGE_RATE + SPONGE_CAPACITY;

// Digests must fit in one squeeze, and a pair of them in one absorb, for
// the node compressions to cost a single permutation.
const_assert!(NUM_DIGEST_ELTS <= SPONGE_RATE);
const_assert!(2 * NUM_DIGEST_ELTS <= SPONGE_RATE);

/// Permutation that can be used in the sponge construction for the field XOF.
pub trait Permuter: Sized {
    fn permute(input: [Self; SPONGE_WIDTH]) -> [Self; SPONGE_WIDTH];
}

/// Hash a message without any padding step. Note that this can enable
/// length-extension attacks. However, it is still collision-resistant in
/// cases where the input has a fixed length.
pub fn field_xof<F: RichField>(inputs: &[F], num_outputs: usize) -> Vec<F> {
    if num_outputs == 0 {
        return Vec::new();
    }

    let mut state = [F::ZERO; SPONGE_WIDTH];

    // Absorb all input chunks.
    for input_chunk in inputs.chunks(SPONGE_RATE) {
        // Overwrite the first r elements with the inputs. This differs from a standard sponge,
        // where we would xor or add in the inputs. This is a well-known variant, though,
        // sometimes called "overwrite mode".
        state[..input_chunk.len()].copy_from_slice(input_chunk);
        state = F::permute(state);
    }

    // Squeeze until we have the desired number of outputs.
    let mut outputs = Vec::with_capacity(num_outputs);
    loop {
        for &item in state.iter().take(SPONGE_RATE) {
            outputs.push(item);
            if outputs.len() == num_outputs {
                return outputs;
            }
        }
        state = F::permute(state);
    }
}

pub fn xof_to_digest<F: RichField>(inputs: &[F]) -> Digest<F> {
    Digest::from_vec(field_xof(inputs, NUM_DIGEST_ELTS))
}

/// A one-way compression of two digests into one; a single permutation call.
pub fn compress<F: RichField>(x: Digest<F>, y: Digest<F>) -> Digest<F> {
    let mut perm_inputs = [F::ZERO; SPONGE_WIDTH];
    perm_inputs[..NUM_DIGEST_ELTS].copy_from_slice(&x.elements);
    perm_inputs[NUM_DIGEST_ELTS..2 * NUM_DIGEST_ELTS].copy_from_slice(&y.elements);
    Digest {
        elements: F::permute(perm_inputs)[..NUM_DIGEST_ELTS]
            .try_into()
            .unwrap(),
    }
}

#[cfg(test)]
mod tests {
    use capss_field::goldilocks_field::GoldilocksField;
    use capss_field::types::{Field, Sample};

    use super::*;

    type F = GoldilocksField;

    #[test]
    fn deterministic_and_length_correct() {
        let input = F::rand_vec(13);
        let a = field_xof(&input, 29);
        let b = field_xof(&input, 29);
        assert_eq!(a, b);
        assert_eq!(a.len(), 29);
        // A prefix request returns a prefix.
        assert_eq!(field_xof(&input, 4), a[..4].to_vec());
    }

    #[test]
    fn compress_matches_xof_of_concatenation() {
        let x = Digest::<F>::rand();
        let y = Digest::<F>::rand();
        let mut cat = x.to_vec();
        cat.extend(y.to_vec());
        assert_eq!(compress(x, y), xof_to_digest(&cat));
    }

    #[test]
    fn short_input_is_zero_padded() {
        // Absorbing less than the rate equals absorbing the zero-padded block.
        let short = F::rand_vec(3);
        let mut padded = short.clone();
        padded.resize(SPONGE_RATE, F::ZERO);
        assert_eq!(field_xof(&short, 8), field_xof(&padded, 8));
    }
}
