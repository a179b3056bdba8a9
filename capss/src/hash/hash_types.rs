use anyhow::ensure;
use capss_field::goldilocks_field::GoldilocksField;
use capss_field::types::{Field, PrimeField64, Sample};
use serde::{Deserialize, Serialize};

use crate::hash::hashing::Permuter;

/// A prime-order field with the features we need to use it as the base field
/// of the commitment stack: 64-bit canonical access plus the sponge
/// permutation backing the XOF.
pub trait RichField: PrimeField64 + Permuter {}

impl RichField for GoldilocksField {}

/// Digests are this many field elements (32 bytes over a 64-bit field).
pub const NUM_DIGEST_ELTS: usize = 4;

/// Salts are this many field elements.
pub const NUM_SALT_ELTS: usize = 4;

/// Grinding nonces are 32-bit little-endian counters.
pub const NONCE_SIZE: usize = 4;

/// Optional per-leaf commitment tapes are this many field elements
/// (16 bytes over a 64-bit field).
pub const NUM_TAPE_ELTS: usize = 2;

/// A hash digest represented as field elements.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Digest<F: Field> {
    pub elements: [F; NUM_DIGEST_ELTS],
}

impl<F: Field> Digest<F> {
    pub const ZERO: Self = Self {
        elements: [F::ZERO; NUM_DIGEST_ELTS],
    };

    pub fn from_vec(elements: Vec<F>) -> Self {
        debug_assert!(elements.len() == NUM_DIGEST_ELTS);
        Self {
            elements: elements.try_into().unwrap(),
        }
    }

    pub fn to_vec(&self) -> Vec<F> {
        self.elements.to_vec()
    }
}

impl<F: Field> From<[F; NUM_DIGEST_ELTS]> for Digest<F> {
    fn from(elements: [F; NUM_DIGEST_ELTS]) -> Self {
        Self { elements }
    }
}

impl<F: Field> TryFrom<&[F]> for Digest<F> {
    type Error = anyhow::Error;

    fn try_from(elements: &[F]) -> Result<Self, Self::Error> {
        ensure!(elements.len() == NUM_DIGEST_ELTS);
        Ok(Self {
            elements: elements.try_into().unwrap(),
        })
    }
}

impl<F: Field> Sample for Digest<F> {
    #[inline]
    fn sample<R>(rng: &mut R) -> Self
    where
        R: rand::RngCore + ?Sized,
    {
        Self {
            elements: core::array::from_fn(|_| F::sample(rng)),
        }
    }
}

/// The fresh salt drawn once per signature.
pub type Salt<F> = [F; NUM_SALT_ELTS];

/// A grinding nonce, serialized little-endian into proofs.
pub type Nonce = [u8; NONCE_SIZE];

/// The nonce's counter value as a field element, the form in which it enters
/// challenge hashes.
pub fn nonce_to_field<F: Field>(nonce: &Nonce) -> F {
    F::from_canonical_u32(u32::from_le_bytes(*nonce))
}

pub fn nonce_from_counter(counter: u32) -> Nonce {
    counter.to_le_bytes()
}
