//! The CAPSS signature API.
//!
//! Keys serialize as `iv || y` for the public key, with the secret input
//! appended for the secret key; field elements cross the boundary as
//! canonical 8-byte little-endian values and all integers are
//! little-endian. An attached signature is
//! `u32_le(signature_length) || message || signature`.

mod variants;

use anyhow::{ensure, Result};
use rand::rngs::OsRng;

use crate::lppc::test_witness;
use crate::util::serialization::{FieldReader, FieldWriter, FELT_BYTES};
pub use self::variants::NB_VARIANTS;
use self::variants::F;

const SIG_LEN_PREFIX: usize = core::mem::size_of::<u32>();

/// Public key, secret key and maximal signature byte sizes of a variant.
pub fn get_sizes(variant: u32) -> Result<(usize, usize, usize)> {
    let (lppc_cfg, sw) = variants::build(variant)?;
    let pk_size = lppc_cfg.serialized_size();
    let sk_size = pk_size + lppc_cfg.secret_size() * FELT_BYTES;
    Ok((pk_size, sk_size, sw.max_proof_size()))
}

/// Generates a keypair from the given randomness source. The secret key
/// contains the public key as a prefix.
pub fn keypair_from_rng<R: rand::RngCore + ?Sized>(
    variant: u32,
    rng: &mut R,
) -> Result<(Vec<u8>, Vec<u8>)> {
    let (lppc_cfg, _sw) = variants::build(variant)?;
    let (lppc, secret) = lppc_cfg.random_instance(rng);

    // The sampled instance must be provable; anything else is a bug.
    let witness = lppc.build_witness(&secret)?;
    test_witness(&lppc, &witness)?;

    let pk = lppc.serialize();
    let mut sk = FieldWriter::new();
    sk.write_bytes(&pk);
    sk.write_fields(&secret);
    Ok((pk, sk.into_bytes()))
}

pub fn keypair(variant: u32) -> Result<(Vec<u8>, Vec<u8>)> {
    keypair_from_rng(variant, &mut OsRng)
}

/// Signs `message`, returning the detached signature.
pub fn sign_detached(variant: u32, message: &[u8], sk: &[u8]) -> Result<Vec<u8>> {
    let (lppc_cfg, sw) = variants::build(variant)?;
    ensure!(
        sk.len() == lppc_cfg.serialized_size() + lppc_cfg.secret_size() * FELT_BYTES,
        "wrong secret key size"
    );

    let lppc = lppc_cfg.instance_from_bytes(&sk[..lppc_cfg.serialized_size()])?;
    let mut reader = FieldReader::new(&sk[lppc_cfg.serialized_size()..]);
    let secret = reader.read_fields::<F>(lppc_cfg.secret_size())?;

    let witness = lppc.build_witness(&secret)?;
    sw.prove(&lppc, &witness, message)
}

/// Signs `message`, returning the attached signed message
/// `u32_le(signature_length) || message || signature`.
pub fn sign_attached(variant: u32, message: &[u8], sk: &[u8]) -> Result<Vec<u8>> {
    let signature = sign_detached(variant, message, sk)?;
    let mut out = Vec::with_capacity(SIG_LEN_PREFIX + message.len() + signature.len());
    out.extend_from_slice(&(signature.len() as u32).to_le_bytes());
    out.extend_from_slice(message);
    out.extend_from_slice(&signature);
    Ok(out)
}

/// Verifies a detached signature.
pub fn verify_detached(variant: u32, message: &[u8], signature: &[u8], pk: &[u8]) -> Result<()> {
    let (lppc_cfg, sw) = variants::build(variant)?;
    let lppc = lppc_cfg.instance_from_bytes(pk)?;
    sw.verify(&lppc, message, signature)
}

/// Verifies an attached signed message and returns the embedded message.
pub fn verify_attached(variant: u32, signed_message: &[u8], pk: &[u8]) -> Result<Vec<u8>> {
    ensure!(
        signed_message.len() >= SIG_LEN_PREFIX,
        "signed message too short for its length prefix"
    );
    let signature_len =
        u32::from_le_bytes(signed_message[..SIG_LEN_PREFIX].try_into().unwrap()) as usize;
    ensure!(
        signature_len + SIG_LEN_PREFIX <= signed_message.len(),
        "signed message too short for its signature"
    );

    let message_len = signed_message.len() - signature_len - SIG_LEN_PREFIX;
    let message = &signed_message[SIG_LEN_PREFIX..SIG_LEN_PREFIX + message_len];
    let signature = &signed_message[SIG_LEN_PREFIX + message_len..];

    verify_detached(variant, message, signature, pk)?;
    Ok(message.to_vec())
}

#[cfg(test)]
mod tests {
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    use super::*;

    fn fixed_message() -> [u8; 32] {
        let mut message = [0u8; 32];
        message[..4].copy_from_slice(&[1, 2, 3, 4]);
        message
    }

    #[test]
    fn variant0_sign_verify_fixed_seed() {
        let mut rng = ChaCha8Rng::seed_from_u64(0x5eed);
        let (pk, sk) = keypair_from_rng(0, &mut rng).unwrap();
        let (pk_size, sk_size, sig_max) = get_sizes(0).unwrap();
        assert_eq!(pk.len(), pk_size);
        assert_eq!(sk.len(), sk_size);
        assert_eq!(&sk[..pk.len()], &pk[..]);

        let message = fixed_message();
        let signature = sign_detached(0, &message, &sk).unwrap();
        assert!(signature.len() <= sig_max);
        verify_detached(0, &message, &signature, &pk).unwrap();
    }

    #[test]
    fn variant1_many_keypairs() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut successes = 0;
        for _ in 0..64 {
            let (pk, sk) = keypair_from_rng(1, &mut rng).unwrap();
            let message: [u8; 32] = rng.gen();
            let signature = sign_detached(1, &message, &sk).unwrap();
            verify_detached(1, &message, &signature, &pk).unwrap();
            successes += 1;
        }
        assert_eq!(successes, 64);
    }

    #[test]
    fn variant2_attached_round_trip() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let (pk, sk) = keypair_from_rng(2, &mut rng).unwrap();
        let message = fixed_message();
        let signed = sign_attached(2, &message, &sk).unwrap();
        let opened = verify_attached(2, &signed, &pk).unwrap();
        assert_eq!(opened, message);
    }

    #[test]
    fn tampered_signature_rejected() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let (pk, sk) = keypair_from_rng(2, &mut rng).unwrap();
        let message = fixed_message();
        let signature = sign_detached(2, &message, &sk).unwrap();
        verify_detached(2, &message, &signature, &pk).unwrap();

        // Flipping the first byte corrupts the grinding nonce.
        let mut bad = signature.clone();
        bad[0] ^= 1;
        assert!(verify_detached(2, &message, &bad, &pk).is_err());

        // Truncation by one byte.
        assert!(verify_detached(2, &message, &signature[..signature.len() - 1], &pk).is_err());

        // Every byte of the signature is binding.
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        for _ in 0..8 {
            let mut bad = signature.clone();
            let pos = rng.gen_range(0..bad.len());
            bad[pos] ^= 1 << rng.gen_range(0..8);
            assert!(verify_detached(2, &message, &bad, &pk).is_err(), "byte {pos}");
        }

        // Signing a different message does not verify against this one.
        let signature_other = sign_detached(2, b"another message entirely", &sk).unwrap();
        assert!(verify_detached(2, &message, &signature_other, &pk).is_err());
    }

    #[test]
    fn short_signed_message_rejected() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let (pk, _sk) = keypair_from_rng(2, &mut rng).unwrap();

        // Shorter than the length prefix.
        assert!(verify_attached(2, &[1, 2, 3], &pk).is_err());

        // Length prefix promising more than the buffer holds.
        let mut bogus = vec![0u8; 16];
        bogus[..4].copy_from_slice(&1000u32.to_le_bytes());
        assert!(verify_attached(2, &bogus, &pk).is_err());
    }

    #[test]
    fn unknown_variant_rejected() {
        assert!(get_sizes(NB_VARIANTS).is_err());
        assert!(keypair(99).is_err());
    }
}
