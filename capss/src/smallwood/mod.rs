//! SmallWood: the non-interactive argument assembling PCS and PIOP.
//!
//! Commit-time data flows downward (witness polynomials into the PCS, whose
//! transcript seeds the PIOP challenges); a grinding loop picks the opening
//! points; the proof carries everything the verifier needs to replay each
//! transcript layer and compare the final PIOP hash.

mod challenges;
mod prover;
mod verifier;

use anyhow::Result;

use crate::decs::ChallengeFormat;
use crate::hash::hash_types::{RichField, NONCE_SIZE, NUM_SALT_ELTS};
use crate::hash::merkle_tree::MerkleTreeConfig;
use crate::lppc::LppcParams;
use crate::pcs::{Pcs, PcsConfig};
use crate::piop::{input_degrees, Piop, PiopConfig};
use crate::util::serialization::{DIGEST_BYTES, FELT_BYTES};

#[derive(Clone, Debug)]
pub struct SmallWoodConfig {
    pub rho: usize,
    /// Evaluation points opened on the committed polynomials.
    pub nb_opened_evals: usize,
    /// PCS stacking factor.
    pub beta: usize,
    pub piop_format_challenge: ChallengeFormat,
    /// Extra grinding bits on the opening challenge; zero disables it.
    pub opening_pow_bits: u32,
    pub decs_nb_evals: usize,
    pub decs_nb_opened_evals: usize,
    pub decs_eta: usize,
    pub decs_pow_bits: u32,
    pub decs_use_commitment_tapes: bool,
    pub decs_format_challenge: ChallengeFormat,
    pub decs_tree: Option<MerkleTreeConfig>,
}

#[derive(Debug)]
pub struct SmallWood<F: RichField> {
    params: LppcParams,
    piop: Piop<F>,
    pcs: Pcs<F>,
    nb_opened_evals: usize,
    rho: usize,
    opening_pow_bits: u32,
    proof_size_without_pcs: usize,
}

impl<F: RichField> SmallWood<F> {
    pub fn new(params: LppcParams, cfg: &SmallWoodConfig) -> Result<Self> {
        let piop_cfg = PiopConfig {
            rho: cfg.rho,
            nb_opened_evals: cfg.nb_opened_evals,
            format_challenge: cfg.piop_format_challenge,
        };
        let (wit_degree, mask_poly_degree, mask_lin_degree) = input_degrees(&params, &piop_cfg);

        // Committed polynomials: the witness rows, then the polynomial- and
        // linear-constraint masks.
        let nb_polys = params.nb_wit_rows + 2 * cfg.rho;
        let mut degrees = vec![wit_degree; params.nb_wit_rows];
        degrees.extend(vec![mask_poly_degree; cfg.rho]);
        degrees.extend(vec![mask_lin_degree; cfg.rho]);

        let pcs = Pcs::new(PcsConfig {
            degrees,
            nb_opened_evals: cfg.nb_opened_evals,
            mu: params.packing_factor,
            beta: cfg.beta,
            decs_nb_evals: cfg.decs_nb_evals,
            decs_nb_opened_evals: cfg.decs_nb_opened_evals,
            decs_eta: cfg.decs_eta,
            decs_pow_bits: cfg.decs_pow_bits,
            decs_use_commitment_tapes: cfg.decs_use_commitment_tapes,
            decs_format_challenge: cfg.decs_format_challenge,
            decs_tree: cfg.decs_tree.clone(),
        })?;
        let piop = Piop::new(params.clone(), &piop_cfg)?;

        let proof_size_without_pcs = NONCE_SIZE
            + NUM_SALT_ELTS * FELT_BYTES
            + DIGEST_BYTES
            + piop.proof_size()
            + cfg.nb_opened_evals * nb_polys * FELT_BYTES;

        Ok(Self {
            params,
            piop,
            pcs,
            nb_opened_evals: cfg.nb_opened_evals,
            rho: cfg.rho,
            opening_pow_bits: cfg.opening_pow_bits,
            proof_size_without_pcs,
        })
    }

    /// Upper bound on the proof (signature) byte size.
    pub fn max_proof_size(&self) -> usize {
        self.proof_size_without_pcs + self.pcs.max_proof_size()
    }

    fn nb_committed_polys(&self) -> usize {
        self.params.nb_wit_rows + 2 * self.rho
    }
}

#[cfg(test)]
mod tests {
    use rand::thread_rng;

    use super::*;
    use crate::anemoi::AnemoiGoldilocks;
    use crate::lppc::regular_perm::RegularPermConfig;

    type F = capss_field::goldilocks_field::GoldilocksField;

    fn small_test_config() -> SmallWoodConfig {
        SmallWoodConfig {
            rho: 1,
            nb_opened_evals: 1,
            beta: 1,
            piop_format_challenge: ChallengeFormat::Powers,
            opening_pow_bits: 0,
            decs_nb_evals: 256,
            decs_nb_opened_evals: 8,
            decs_eta: 2,
            decs_pow_bits: 4,
            decs_use_commitment_tapes: false,
            decs_format_challenge: ChallengeFormat::Powers,
            decs_tree: None,
        }
    }

    #[test]
    fn prove_verify_round_trip() {
        let perm_cfg = RegularPermConfig::<F, _>::new(AnemoiGoldilocks, 7, 1, 1).unwrap();
        let sw = SmallWood::<F>::new(perm_cfg.params().clone(), &small_test_config()).unwrap();

        let (lppc, secret) = perm_cfg.random_instance(&mut thread_rng());
        let witness = lppc.build_witness(&secret).unwrap();

        let message = b"attack at dawn";
        let proof = sw.prove(&lppc, &witness, message).unwrap();
        assert!(proof.len() <= sw.max_proof_size());
        sw.verify(&lppc, message, &proof).unwrap();

        // Binding: a different message must not verify.
        assert!(sw.verify(&lppc, b"attack at dusk", &proof).is_err());

        // A different instance must not verify.
        let (other, _) = perm_cfg.random_instance(&mut thread_rng());
        assert!(sw.verify(&other, message, &proof).is_err());
    }

    #[test]
    fn opening_pow_bits_grind() {
        let perm_cfg = RegularPermConfig::<F, _>::new(AnemoiGoldilocks, 7, 1, 1).unwrap();
        let mut cfg = small_test_config();
        cfg.opening_pow_bits = 3;
        let sw = SmallWood::<F>::new(perm_cfg.params().clone(), &cfg).unwrap();

        let (lppc, secret) = perm_cfg.random_instance(&mut thread_rng());
        let witness = lppc.build_witness(&secret).unwrap();
        let proof = sw.prove(&lppc, &witness, b"msg").unwrap();
        sw.verify(&lppc, b"msg", &proof).unwrap();
    }
}
