//! DECS: the degree-enforcing commitment scheme.
//!
//! Polynomials are committed through their evaluations over the integer
//! domain `{0, ..., nb_evals - 1}`: every point becomes one salted Merkle
//! leaf. Degree enforcement comes from the DEC polynomials, masked random
//! linear combinations of the committed polynomials whose full coefficient
//! vectors enter the transcript; a cheating prover cannot produce consistent
//! DEC polynomials of the committed degree for out-of-degree data.

pub mod challenge;

use anyhow::{ensure, Result};
use capss_field::interpolation::restore_from_high;
use capss_field::polynomial::PolynomialCoeffs;

use crate::hash::hash_types::{
    Digest, Nonce, RichField, Salt, NUM_DIGEST_ELTS, NUM_TAPE_ELTS,
};
use crate::hash::hashing::{field_xof, xof_to_digest};
use crate::hash::merkle_tree::{MerkleKey, MerkleTree, MerkleTreeConfig};
use crate::util::serialization::{FieldReader, FieldWriter, DIGEST_BYTES, FELT_BYTES};
use self::challenge::OpeningPlan;

/// How the batching coefficients are derived from the commitment hash.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ChallengeFormat {
    /// One random element per repetition; coefficients are its powers.
    Powers,
    /// Every coefficient uniform and independent.
    Uniform,
    /// A small uniform matrix times a power matrix. Bounds evaluation cost
    /// while keeping rows independent.
    Structured,
}

#[derive(Clone, Debug)]
pub struct DecsConfig {
    pub nb_polys: usize,
    pub poly_degree: usize,
    pub nb_evals: usize,
    pub nb_opened_evals: usize,
    pub eta: usize,
    pub pow_bits: u32,
    pub use_commitment_tapes: bool,
    pub format_challenge: ChallengeFormat,
    /// Tree shape; `None` means a binary tree over `nb_evals` leaves.
    pub tree: Option<MerkleTreeConfig>,
}

#[derive(Debug)]
pub struct Decs<F: RichField> {
    cfg: DecsConfig,
    tree: MerkleTree,
    opening_plan: OpeningPlan,
    _phantom: core::marker::PhantomData<F>,
}

/// Everything the committer must retain to open later. Dropped after the
/// opening completes.
#[derive(Debug)]
pub struct DecsKey<F: RichField> {
    committed_polys: Vec<PolynomialCoeffs<F>>,
    masking_polys: Vec<PolynomialCoeffs<F>>,
    dec_polys: Vec<PolynomialCoeffs<F>>,
    mt_key: MerkleKey<F>,
    commitment_tapes: Option<Vec<[F; NUM_TAPE_ELTS]>>,
}

impl<F: RichField> Decs<F> {
    pub fn new(cfg: DecsConfig) -> Result<Self> {
        ensure!(cfg.nb_polys > 0, "decs: no polynomials to commit");
        ensure!(cfg.nb_evals > 0, "decs: no evaluation points");
        ensure!(
            cfg.nb_opened_evals <= cfg.nb_evals,
            "decs: cannot open {} of {} evaluations",
            cfg.nb_opened_evals,
            cfg.nb_evals
        );
        ensure!(cfg.eta < 32, "decs: eta {} out of range", cfg.eta);
        ensure!(cfg.pow_bits < 32, "decs: pow_bits {} out of range", cfg.pow_bits);

        let tree_cfg = cfg
            .tree
            .clone()
            .unwrap_or_else(|| MerkleTreeConfig::binary(cfg.nb_evals));
        let tree = MerkleTree::new(&tree_cfg)?;
        ensure!(
            tree.nb_leaves() == cfg.nb_evals,
            "decs: tree has {} leaves for {} evaluations",
            tree.nb_leaves(),
            cfg.nb_evals
        );

        let opening_plan = OpeningPlan::new::<F>(cfg.nb_evals, cfg.nb_opened_evals, cfg.pow_bits)?;

        Ok(Self {
            cfg,
            tree,
            opening_plan,
            _phantom: core::marker::PhantomData,
        })
    }

    pub fn config(&self) -> &DecsConfig {
        &self.cfg
    }

    /// Transcript length in field elements: the commitment hash plus the
    /// full DEC coefficient vectors.
    pub fn transcript_len(&self) -> usize {
        NUM_DIGEST_ELTS + self.cfg.eta * (self.cfg.poly_degree + 1)
    }

    /// Upper bound on the opening proof size in bytes.
    pub fn max_proof_size(&self) -> usize {
        let m = self.cfg.nb_opened_evals;
        let mut size = self.tree.max_auth_len(m) * DIGEST_BYTES;
        size += (self.cfg.eta * m + self.cfg.eta * (self.cfg.poly_degree + 1 - m)) * FELT_BYTES;
        if self.cfg.use_commitment_tapes {
            size += m * NUM_TAPE_ELTS * FELT_BYTES;
        }
        size
    }

    fn leaf_hash(&self, salt: &Salt<F>, evals: &[F], tape: Option<&[F; NUM_TAPE_ELTS]>) -> Digest<F> {
        let mut input = salt.to_vec();
        input.extend_from_slice(evals);
        if let Some(tape) = tape {
            input.extend_from_slice(tape);
        }
        xof_to_digest(&input)
    }

    fn root_hash(&self, salt: &Salt<F>, root: &Digest<F>) -> Digest<F> {
        let mut input = salt.to_vec();
        input.extend(root.elements);
        xof_to_digest(&input)
    }

    /// Derives the `eta x nb_polys` batching coefficients from the
    /// commitment hash.
    fn derive_challenge(&self, hash_mt: &Digest<F>) -> Vec<Vec<F>> {
        let eta = self.cfg.eta;
        let nb_polys = self.cfg.nb_polys;
        derive_batching_coefficients(
            self.cfg.format_challenge,
            &hash_mt.elements,
            eta,
            nb_polys,
        )
    }

    /// Commits to `polys`, returning the transcript (as field elements) and
    /// the opening key.
    pub fn commit(
        &self,
        salt: &Salt<F>,
        polys: &[PolynomialCoeffs<F>],
    ) -> Result<(Vec<F>, DecsKey<F>)> {
        let degree = self.cfg.poly_degree;
        ensure!(polys.len() == self.cfg.nb_polys, "decs: wrong polynomial count");
        ensure!(
            polys.iter().all(|p| p.len() == degree + 1),
            "decs: committed polynomials must carry degree + 1 coefficients"
        );

        let masking_polys: Vec<PolynomialCoeffs<F>> = (0..self.cfg.eta)
            .map(|_| PolynomialCoeffs::new(F::rand_vec(degree + 1)))
            .collect();

        let commitment_tapes: Option<Vec<[F; NUM_TAPE_ELTS]>> = self
            .cfg
            .use_commitment_tapes
            .then(|| (0..self.cfg.nb_evals).map(|_| F::rand_array()).collect());

        // One leaf per evaluation point: all committed and masking
        // polynomials evaluated there, hashed with the salt (and tape).
        let leaves: Vec<Digest<F>> = (0..self.cfg.nb_evals)
            .map(|num| {
                let point = F::from_canonical_usize(num);
                let evals: Vec<F> = polys
                    .iter()
                    .chain(&masking_polys)
                    .map(|p| p.eval(point))
                    .collect();
                self.leaf_hash(salt, &evals, commitment_tapes.as_ref().map(|t| &t[num]))
            })
            .collect();

        let (root, mt_key) = self.tree.expand(salt, &leaves);
        let hash_mt = self.root_hash(salt, &root);

        let gammas = self.derive_challenge(&hash_mt);
        let dec_polys: Vec<PolynomialCoeffs<F>> = (0..self.cfg.eta)
            .map(|k| {
                let mut dec = masking_polys[k].clone();
                for (j, poly) in polys.iter().enumerate() {
                    dec += &(poly * gammas[k][j]);
                }
                dec
            })
            .collect();

        let mut transcript = hash_mt.to_vec();
        for dec in &dec_polys {
            transcript.extend_from_slice(&dec.coeffs);
        }

        let key = DecsKey {
            committed_polys: polys.to_vec(),
            masking_polys,
            dec_polys,
            mt_key,
            commitment_tapes,
        };
        Ok((transcript, key))
    }

    /// Opens the committed polynomials at `eval_points` (ascending leaf
    /// indices encoded as field elements). Returns the opening proof and the
    /// committed polynomials' evaluations, one row per point.
    pub fn open(
        &self,
        key: &DecsKey<F>,
        eval_points: &[F],
    ) -> Result<(Vec<u8>, Vec<Vec<F>>)> {
        let m = self.cfg.nb_opened_evals;
        let degree = self.cfg.poly_degree;
        ensure!(eval_points.len() == m, "decs: wrong opening count");

        let leaf_indices: Vec<usize> = eval_points
            .iter()
            .map(|p| (p.to_canonical_u64() & 0xFFFF_FFFF) as usize)
            .collect();
        let auth = self.tree.open_multi(&key.mt_key, &leaf_indices)?;

        let mut proof = FieldWriter::new();
        proof.write_digests(&auth);

        let mut evals = Vec::with_capacity(m);
        for (j, &point) in eval_points.iter().enumerate() {
            evals.push(
                key.committed_polys
                    .iter()
                    .map(|p| p.eval(point))
                    .collect::<Vec<F>>(),
            );

            let masking_evals: Vec<F> =
                key.masking_polys.iter().map(|p| p.eval(point)).collect();
            proof.write_fields(&masking_evals);
            if let Some(tapes) = &key.commitment_tapes {
                proof.write_fields(&tapes[leaf_indices[j]]);
            }
        }

        for dec in &key.dec_polys {
            proof.write_fields(&dec.coeffs[m..=degree]);
        }

        Ok((proof.into_bytes(), evals))
    }

    /// Rebuilds the commit-time transcript from an opening. The caller
    /// compares it (or a hash of it) against the transcript it used.
    pub fn recompute_transcript(
        &self,
        salt: &Salt<F>,
        eval_points: &[F],
        evals: &[Vec<F>],
        proof: &[u8],
    ) -> Result<Vec<F>> {
        let m = self.cfg.nb_opened_evals;
        let eta = self.cfg.eta;
        let degree = self.cfg.poly_degree;
        ensure!(eval_points.len() == m, "decs: wrong opening count");
        ensure!(evals.len() == m, "decs: wrong evaluation row count");

        let mut fixed_size = (eta * m + eta * (degree + 1 - m)) * FELT_BYTES;
        if self.cfg.use_commitment_tapes {
            fixed_size += m * NUM_TAPE_ELTS * FELT_BYTES;
        }
        ensure!(proof.len() >= fixed_size, "decs: opening proof too short");
        let auth_size = proof.len() - fixed_size;
        ensure!(auth_size % DIGEST_BYTES == 0, "decs: misaligned authentication path");

        let mut reader = FieldReader::new(proof);
        let auth = reader.read_digests::<F>(auth_size / DIGEST_BYTES)?;

        let leaf_indices: Vec<usize> = eval_points
            .iter()
            .map(|p| (p.to_canonical_u64() & 0xFFFF_FFFF) as usize)
            .collect();

        // Rebuild the opened leaf hashes from the supplied evaluations plus
        // the masking values (and tapes) in the proof.
        let mut masking_evals = Vec::with_capacity(m);
        let mut opened_leaves = Vec::with_capacity(m);
        for j in 0..m {
            ensure!(
                evals[j].len() == self.cfg.nb_polys,
                "decs: wrong evaluation row width"
            );
            let row_masking = reader.read_fields::<F>(eta)?;
            let mut all_evals = evals[j].clone();
            all_evals.extend_from_slice(&row_masking);

            let tape: Option<[F; NUM_TAPE_ELTS]> = if self.cfg.use_commitment_tapes {
                Some(reader.read_fields::<F>(NUM_TAPE_ELTS)?.try_into().unwrap())
            } else {
                None
            };
            opened_leaves.push(self.leaf_hash(salt, &all_evals, tape.as_ref()));
            masking_evals.push(row_masking);
        }

        let root = self
            .tree
            .retrieve_root(salt, &leaf_indices, &opened_leaves, &auth)?;
        let hash_mt = self.root_hash(salt, &root);

        let gammas = self.derive_challenge(&hash_mt);
        let mut transcript = hash_mt.to_vec();
        for k in 0..eta {
            // The opened row of a DEC polynomial is the batched combination
            // of the opened evaluations plus the masking value.
            let dec_evals: Vec<F> = (0..m)
                .map(|i| {
                    let combined = evals[i]
                        .iter()
                        .zip(&gammas[k])
                        .fold(F::ZERO, |acc, (&e, &g)| acc.multiply_accumulate(e, g));
                    combined + masking_evals[i][k]
                })
                .collect();

            let high = reader.read_fields::<F>(degree + 1 - m)?;
            let dec = restore_from_high(&high, &dec_evals, eval_points, degree);
            transcript.extend_from_slice(&dec.coeffs);
        }

        Ok(transcript)
    }

    /// Grinds the opening challenge: increments a 32-bit nonce until the
    /// transcript hash yields acceptable, pairwise distinct leaf indices.
    pub fn get_opening_challenge(&self, trans_hash: &Digest<F>) -> (Vec<F>, Nonce) {
        let mut counter = 0u32;
        loop {
            let nonce = counter.to_le_bytes();
            if let Some(indices) = self.opening_plan.draw(&nonce, trans_hash) {
                log::debug!("decs: opening challenge found after {} attempts", counter + 1);
                let points = indices
                    .into_iter()
                    .map(|i| F::from_canonical_usize(i))
                    .collect();
                return (points, nonce);
            }
            counter = counter.wrapping_add(1);
        }
    }

    /// Verifier-side replay of one grinding attempt.
    pub fn recompute_opening_challenge(
        &self,
        trans_hash: &Digest<F>,
        nonce: &Nonce,
    ) -> Result<Vec<F>> {
        let indices = self
            .opening_plan
            .draw(nonce, trans_hash)
            .ok_or_else(|| anyhow::anyhow!("decs: opening challenge proof of work failed"))?;
        Ok(indices
            .into_iter()
            .map(|i| F::from_canonical_usize(i))
            .collect())
    }
}

/// Shared coefficient derivation for the DECS and PIOP batching challenges.
pub(crate) fn derive_batching_coefficients<F: RichField>(
    format: ChallengeFormat,
    seed: &[F],
    rows: usize,
    cols: usize,
) -> Vec<Vec<F>> {
    match format {
        ChallengeFormat::Powers => {
            let r = field_xof(seed, rows);
            r.into_iter()
                .map(|rk| rk.powers().skip(1).take(cols).collect())
                .collect()
        }
        ChallengeFormat::Uniform => {
            let flat = field_xof(seed, rows * cols);
            flat.chunks(cols).map(|chunk| chunk.to_vec()).collect()
        }
        ChallengeFormat::Structured => {
            // rows x (rows + 1) uniform entries followed by rows + 1 power
            // seeds; the product bounds the evaluator's work while keeping
            // the rows independent.
            let flat = field_xof(seed, (rows + 1) + (rows + 1) * rows);
            let mat_rnd: Vec<&[F]> = flat[..rows * (rows + 1)].chunks(rows + 1).collect();
            let seeds = &flat[rows * (rows + 1)..];
            let mat_powers: Vec<Vec<F>> = seeds
                .iter()
                .map(|s| s.powers().take(cols).collect())
                .collect();
            (0..rows)
                .map(|k| {
                    (0..cols)
                        .map(|j| {
                            (0..rows + 1).fold(F::ZERO, |acc, i| {
                                acc.multiply_accumulate(mat_rnd[k][i], mat_powers[i][j])
                            })
                        })
                        .collect()
                })
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use capss_field::goldilocks_field::GoldilocksField;
    use capss_field::types::{Field, Sample};

    use super::*;

    type F = GoldilocksField;

    fn test_config(format: ChallengeFormat, tapes: bool) -> DecsConfig {
        DecsConfig {
            nb_polys: 3,
            poly_degree: 12,
            nb_evals: 64,
            nb_opened_evals: 5,
            eta: 2,
            pow_bits: 2,
            use_commitment_tapes: tapes,
            format_challenge: format,
            tree: None,
        }
    }

    fn round_trip(cfg: DecsConfig) {
        let decs = Decs::<F>::new(cfg.clone()).unwrap();
        let salt: Salt<F> = F::rand_array();
        let polys: Vec<_> = (0..cfg.nb_polys)
            .map(|_| capss_field::polynomial::PolynomialCoeffs::new(F::rand_vec(cfg.poly_degree + 1)))
            .collect();

        let (transcript, key) = decs.commit(&salt, &polys).unwrap();
        assert_eq!(transcript.len(), decs.transcript_len());

        let trans_hash = crate::hash::hashing::xof_to_digest(&transcript);
        let (eval_points, nonce) = decs.get_opening_challenge(&trans_hash);
        assert_eq!(
            decs.recompute_opening_challenge(&trans_hash, &nonce).unwrap(),
            eval_points
        );

        let (proof, evals) = decs.open(&key, &eval_points).unwrap();
        assert!(proof.len() <= decs.max_proof_size());
        let recomputed = decs
            .recompute_transcript(&salt, &eval_points, &evals, &proof)
            .unwrap();
        assert_eq!(recomputed, transcript);
    }

    #[test]
    fn commit_open_recompute_all_formats() {
        round_trip(test_config(ChallengeFormat::Powers, false));
        round_trip(test_config(ChallengeFormat::Uniform, false));
        round_trip(test_config(ChallengeFormat::Structured, false));
    }

    #[test]
    fn commit_open_recompute_with_tapes() {
        round_trip(test_config(ChallengeFormat::Powers, true));
    }

    #[test]
    fn tampered_proof_changes_transcript() {
        let cfg = test_config(ChallengeFormat::Powers, false);
        let decs = Decs::<F>::new(cfg.clone()).unwrap();
        let salt: Salt<F> = F::rand_array();
        let polys: Vec<_> = (0..cfg.nb_polys)
            .map(|_| capss_field::polynomial::PolynomialCoeffs::new(F::rand_vec(cfg.poly_degree + 1)))
            .collect();
        let (transcript, key) = decs.commit(&salt, &polys).unwrap();
        let trans_hash = crate::hash::hashing::xof_to_digest(&transcript);
        let (eval_points, _nonce) = decs.get_opening_challenge(&trans_hash);
        let (proof, mut evals) = decs.open(&key, &eval_points).unwrap();

        evals[0][0] += F::ONE;
        match decs.recompute_transcript(&salt, &eval_points, &evals, &proof) {
            Ok(recomputed) => assert_ne!(recomputed, transcript),
            Err(_) => (),
        }
    }

    #[test]
    fn invalid_configs_rejected() {
        let mut cfg = test_config(ChallengeFormat::Powers, false);
        cfg.eta = 32;
        assert!(Decs::<F>::new(cfg).is_err());

        let mut cfg = test_config(ChallengeFormat::Powers, false);
        cfg.pow_bits = 32;
        assert!(Decs::<F>::new(cfg).is_err());

        let mut cfg = test_config(ChallengeFormat::Powers, false);
        cfg.nb_opened_evals = cfg.nb_evals + 1;
        assert!(Decs::<F>::new(cfg).is_err());
    }
}
