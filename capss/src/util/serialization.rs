//! Little-endian byte (de)serialization of field elements and digests.
//!
//! Proofs and keys cross the API boundary as byte strings; every field
//! element is its canonical value in 8 little-endian bytes, and the reader
//! rejects non-canonical encodings.

use anyhow::{ensure, Result};
use capss_field::types::PrimeField64;

use crate::hash::hash_types::{Digest, Nonce, RichField, NONCE_SIZE, NUM_DIGEST_ELTS};

/// Byte size of one serialized field element.
pub const FELT_BYTES: usize = core::mem::size_of::<u64>();

/// Byte size of one serialized digest.
pub const DIGEST_BYTES: usize = NUM_DIGEST_ELTS * FELT_BYTES;

#[derive(Debug, Default)]
pub struct FieldWriter {
    bytes: Vec<u8>,
}

impl FieldWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }

    pub fn write_field<F: PrimeField64>(&mut self, x: F) {
        self.bytes.extend_from_slice(&x.to_canonical_u64().to_le_bytes());
    }

    pub fn write_fields<F: PrimeField64>(&mut self, xs: &[F]) {
        for &x in xs {
            self.write_field(x);
        }
    }

    pub fn write_digest<F: RichField>(&mut self, digest: &Digest<F>) {
        self.write_fields(&digest.elements);
    }

    pub fn write_digests<F: RichField>(&mut self, digests: &[Digest<F>]) {
        for digest in digests {
            self.write_digest(digest);
        }
    }
}

#[derive(Clone, Debug)]
pub struct FieldReader<'a> {
    bytes: &'a [u8],
}

impl<'a> FieldReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        ensure!(self.bytes.len() >= n, "buffer too short: {} < {n}", self.bytes.len());
        let (head, tail) = self.bytes.split_at(n);
        self.bytes = tail;
        Ok(head)
    }

    pub fn read_field<F: PrimeField64>(&mut self) -> Result<F> {
        let raw = u64::from_le_bytes(self.read_bytes(FELT_BYTES)?.try_into().unwrap());
        ensure!(raw < F::ORDER, "non-canonical field element");
        Ok(F::from_canonical_u64(raw))
    }

    pub fn read_fields<F: PrimeField64>(&mut self, n: usize) -> Result<Vec<F>> {
        (0..n).map(|_| self.read_field()).collect()
    }

    pub fn read_digest<F: RichField>(&mut self) -> Result<Digest<F>> {
        Ok(Digest::from_vec(self.read_fields(NUM_DIGEST_ELTS)?))
    }

    pub fn read_digests<F: RichField>(&mut self, n: usize) -> Result<Vec<Digest<F>>> {
        (0..n).map(|_| self.read_digest()).collect()
    }

    pub fn read_nonce(&mut self) -> Result<Nonce> {
        Ok(self.read_bytes(NONCE_SIZE)?.try_into().unwrap())
    }
}

#[cfg(test)]
mod tests {
    use capss_field::goldilocks_field::GoldilocksField;
    use capss_field::types::{Field64, Sample};

    use super::*;

    type F = GoldilocksField;

    #[test]
    fn round_trip() {
        let xs = F::rand_vec(9);
        let digest = Digest::<F>::rand();
        let mut writer = FieldWriter::new();
        writer.write_fields(&xs);
        writer.write_digest(&digest);
        writer.write_bytes(&[1, 2, 3]);

        let bytes = writer.into_bytes();
        let mut reader = FieldReader::new(&bytes);
        assert_eq!(reader.read_fields::<F>(9).unwrap(), xs);
        assert_eq!(reader.read_digest::<F>().unwrap(), digest);
        assert_eq!(reader.read_bytes(3).unwrap(), &[1, 2, 3]);
        assert!(reader.is_empty());
        assert!(reader.read_bytes(1).is_err());
    }

    #[test]
    fn non_canonical_rejected() {
        let bytes = F::ORDER.to_le_bytes();
        let mut reader = FieldReader::new(&bytes);
        assert!(reader.read_field::<F>().is_err());
    }
}
