//! The built-in parameter sets.
//!
//! Every variant proves the same Anemoi statement (batching factor 7, one
//! IV cell, one output cell); they trade Merkle tree shape, opened-
//! evaluation count and grinding cost against signature size.

use anyhow::{ensure, Result};
use capss_field::goldilocks_field::GoldilocksField;

use crate::anemoi::AnemoiGoldilocks;
use crate::decs::ChallengeFormat;
use crate::hash::merkle_tree::MerkleTreeConfig;
use crate::lppc::regular_perm::RegularPermConfig;
use crate::smallwood::{SmallWood, SmallWoodConfig};

pub(crate) type F = GoldilocksField;

#[derive(Clone, Copy, Debug)]
struct VariantParams {
    batching_factor: usize,
    iv_size: usize,
    y_size: usize,
    tree_height: usize,
    tree_arity: usize,
    tree_nb_leaves: usize,
    rho: usize,
    piop_nb_opened_evals: usize,
    beta: usize,
    decs_nb_opened_evals: usize,
    decs_eta: usize,
    decs_pow_bits: u32,
}

const VARIANTS: [VariantParams; 3] = [
    VariantParams {
        batching_factor: 7,
        iv_size: 1,
        y_size: 1,
        tree_height: 14,
        tree_arity: 2,
        tree_nb_leaves: 16384,
        rho: 1,
        piop_nb_opened_evals: 1,
        beta: 1,
        decs_nb_opened_evals: 13,
        decs_eta: 2,
        decs_pow_bits: 8,
    },
    VariantParams {
        batching_factor: 7,
        iv_size: 1,
        y_size: 1,
        tree_height: 6,
        tree_arity: 4,
        tree_nb_leaves: 4096,
        rho: 1,
        piop_nb_opened_evals: 1,
        beta: 1,
        decs_nb_opened_evals: 17,
        decs_eta: 2,
        decs_pow_bits: 7,
    },
    VariantParams {
        batching_factor: 7,
        iv_size: 1,
        y_size: 1,
        tree_height: 5,
        tree_arity: 4,
        tree_nb_leaves: 1024,
        rho: 1,
        piop_nb_opened_evals: 1,
        beta: 1,
        decs_nb_opened_evals: 24,
        decs_eta: 2,
        decs_pow_bits: 8,
    },
];

pub const NB_VARIANTS: u32 = VARIANTS.len() as u32;

/// Builds the statement family and proof system of a variant.
pub(crate) fn build(
    variant: u32,
) -> Result<(RegularPermConfig<F, AnemoiGoldilocks>, SmallWood<F>)> {
    ensure!(variant < NB_VARIANTS, "unknown signature variant {variant}");
    let params = &VARIANTS[variant as usize];

    let lppc_cfg = RegularPermConfig::new(
        AnemoiGoldilocks,
        params.batching_factor,
        params.iv_size,
        params.y_size,
    )?;

    let sw = SmallWood::new(
        lppc_cfg.params().clone(),
        &SmallWoodConfig {
            rho: params.rho,
            nb_opened_evals: params.piop_nb_opened_evals,
            beta: params.beta,
            piop_format_challenge: ChallengeFormat::Powers,
            opening_pow_bits: 0,
            decs_nb_evals: params.tree_nb_leaves,
            decs_nb_opened_evals: params.decs_nb_opened_evals,
            decs_eta: params.decs_eta,
            decs_pow_bits: params.decs_pow_bits,
            decs_use_commitment_tapes: false,
            decs_format_challenge: ChallengeFormat::Powers,
            decs_tree: Some(MerkleTreeConfig {
                nb_leaves: params.tree_nb_leaves,
                height: params.tree_height,
                arities: vec![params.tree_arity; params.tree_height],
                truncated: 0,
            }),
        },
    )?;

    Ok((lppc_cfg, sw))
}
