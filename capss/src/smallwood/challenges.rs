//! Fiat-Shamir challenges of the outer argument.

use crate::hash::hash_types::{nonce_to_field, Digest, Nonce, RichField};
use crate::hash::hashing::field_xof;

/// Derives the PCS opening points from `(nonce, h_piop)`.
///
/// With `opening_pow_bits > 0`, one extra element is squeezed and its low
/// bits form the grinding value; the prover regrinds until it is zero and
/// the verifier rejects anything else.
pub(crate) fn piop_opening_challenge<F: RichField>(
    opening_pow_bits: u32,
    nonce: &Nonce,
    h_piop: &Digest<F>,
    nb_opened_evals: usize,
) -> (Vec<F>, u32) {
    let mut input = vec![nonce_to_field(nonce)];
    input.extend(h_piop.elements);

    if opening_pow_bits > 0 {
        let mut output = field_xof::<F>(&input, nb_opened_evals + 1);
        let pow_element = output.pop().unwrap();
        let bytes = pow_element.to_canonical_u64().to_le_bytes();
        let vpow = (u32::from(bytes[0]) | (u32::from(bytes[1]) << 8)) & ((1 << opening_pow_bits) - 1);
        (output, vpow)
    } else {
        (field_xof::<F>(&input, nb_opened_evals), 0)
    }
}

/// Maps the signed message into field elements for transcript binding.
///
/// Seven-byte little-endian chunks always lie below the modulus; the
/// trailing length element separates messages that differ only by zero
/// padding.
pub(crate) fn message_to_fields<F: RichField>(message: &[u8]) -> Vec<F> {
    let mut out: Vec<F> = message
        .chunks(7)
        .map(|chunk| {
            let mut buf = [0u8; 8];
            buf[..chunk.len()].copy_from_slice(chunk);
            F::from_canonical_u64(u64::from_le_bytes(buf))
        })
        .collect();
    out.push(F::from_canonical_u64(message.len() as u64));
    out
}

#[cfg(test)]
mod tests {
    use capss_field::goldilocks_field::GoldilocksField;
    use capss_field::types::Sample;

    use super::*;
    use crate::hash::hash_types::nonce_from_counter;

    type F = GoldilocksField;

    #[test]
    fn challenge_lengths_and_determinism() {
        let h = Digest::<F>::rand();
        let nonce = nonce_from_counter(7);
        let (points, vpow) = piop_opening_challenge(0, &nonce, &h, 3);
        assert_eq!(points.len(), 3);
        assert_eq!(vpow, 0);
        assert_eq!(piop_opening_challenge(0, &nonce, &h, 3).0, points);

        let (points_pow, vpow_pow) = piop_opening_challenge(8, &nonce, &h, 3);
        // The first elements agree; only the grinding element is extra.
        assert_eq!(points_pow, points);
        assert!(vpow_pow < 1 << 8);
    }

    #[test]
    fn message_encoding_is_injective_on_padding() {
        let a = message_to_fields::<F>(b"abc");
        let b = message_to_fields::<F>(b"abc\0");
        assert_ne!(a, b);
        assert_eq!(a.len(), 2);
        assert_eq!(message_to_fields::<F>(&[0u8; 14]).len(), 3);
    }
}
