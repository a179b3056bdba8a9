//! LVCS: the linear vector commitment scheme.
//!
//! Commits the rows of a matrix and later opens arbitrary linear
//! combinations of them. Each row is extended with `m` uniform columns of
//! interpolation slack, interpolated into a polynomial over fixed points
//! (the data columns followed by the extension columns) and committed with
//! the DECS; soundness of the opened combinations reduces to the DECS
//! degree bound.

use anyhow::{ensure, Result};
use capss_field::interpolation::interpolate;
use capss_field::matrix::{mat_inverse, mat_mul, mat_vec_mul};
use capss_field::polynomial::PolynomialCoeffs;

use crate::decs::{ChallengeFormat, Decs, DecsConfig, DecsKey};
use crate::hash::hash_types::{Digest, RichField, Salt, NONCE_SIZE};
use crate::hash::hashing::xof_to_digest;
use crate::hash::merkle_tree::MerkleTreeConfig;
use crate::util::serialization::{FieldReader, FieldWriter, FELT_BYTES};

#[derive(Clone, Debug)]
pub struct LvcsConfig {
    pub nb_rows: usize,
    pub nb_cols: usize,
    /// Number of row combinations opened later.
    pub nb_opened_combi: usize,
    pub decs_nb_evals: usize,
    pub decs_nb_opened_evals: usize,
    pub decs_eta: usize,
    pub decs_pow_bits: u32,
    pub decs_use_commitment_tapes: bool,
    pub decs_format_challenge: ChallengeFormat,
    pub decs_tree: Option<MerkleTreeConfig>,
}

#[derive(Debug)]
pub struct Lvcs<F: RichField> {
    nb_rows: usize,
    nb_cols: usize,
    nb_opened_evals: usize,
    nb_opened_combi: usize,
    /// Data column `j` lives at point `m + j`; the random extension columns
    /// at points `0..m`, the DECS opening domain.
    interpolation_points: Vec<F>,
    decs: Decs<F>,
}

#[derive(Debug)]
pub struct LvcsKey<F: RichField> {
    extended_rows: Vec<Vec<F>>,
    decs_key: DecsKey<F>,
}

impl<F: RichField> Lvcs<F> {
    pub fn new(cfg: LvcsConfig) -> Result<Self> {
        ensure!(
            cfg.nb_opened_combi <= cfg.nb_rows,
            "lvcs: cannot open {} combinations of {} rows",
            cfg.nb_opened_combi,
            cfg.nb_rows
        );

        let m = cfg.decs_nb_opened_evals;
        let decs = Decs::new(DecsConfig {
            nb_polys: cfg.nb_rows,
            poly_degree: cfg.nb_cols + m - 1,
            nb_evals: cfg.decs_nb_evals,
            nb_opened_evals: m,
            eta: cfg.decs_eta,
            pow_bits: cfg.decs_pow_bits,
            use_commitment_tapes: cfg.decs_use_commitment_tapes,
            format_challenge: cfg.decs_format_challenge,
            tree: cfg.decs_tree.clone(),
        })?;

        let interpolation_points = (0..cfg.nb_cols)
            .map(|i| F::from_canonical_usize(m + i))
            .chain((0..m).map(F::from_canonical_usize))
            .collect();

        Ok(Self {
            nb_rows: cfg.nb_rows,
            nb_cols: cfg.nb_cols,
            nb_opened_evals: m,
            nb_opened_combi: cfg.nb_opened_combi,
            interpolation_points,
            decs,
        })
    }

    pub fn nb_opened_evals(&self) -> usize {
        self.nb_opened_evals
    }

    pub fn transcript_len(&self) -> usize {
        self.decs.transcript_len()
    }

    pub fn max_proof_size(&self) -> usize {
        let m = self.nb_opened_evals;
        let rcombi = self.nb_opened_combi * m * FELT_BYTES;
        let subset = m * (self.nb_rows - self.nb_opened_combi) * FELT_BYTES;
        NONCE_SIZE + self.decs.max_proof_size() + rcombi + subset
    }

    fn opening_hash(&self, prtranscript: &[F], extended_combis: &[Vec<F>]) -> Digest<F> {
        let mut input = prtranscript.to_vec();
        for combi in extended_combis {
            input.extend_from_slice(combi);
        }
        xof_to_digest(&input)
    }

    pub fn commit(&self, salt: &Salt<F>, rows: &[Vec<F>]) -> Result<(Vec<F>, LvcsKey<F>)> {
        ensure!(rows.len() == self.nb_rows, "lvcs: wrong row count");
        ensure!(
            rows.iter().all(|row| row.len() == self.nb_cols),
            "lvcs: wrong row width"
        );

        let extended_rows: Vec<Vec<F>> = rows
            .iter()
            .map(|row| {
                let mut extended = row.clone();
                extended.extend(F::rand_vec(self.nb_opened_evals));
                extended
            })
            .collect();

        let polys: Vec<PolynomialCoeffs<F>> = extended_rows
            .iter()
            .map(|row| interpolate(row, &self.interpolation_points))
            .collect();

        let (transcript, decs_key) = self.decs.commit(salt, &polys)?;
        Ok((
            transcript,
            LvcsKey {
                extended_rows,
                decs_key,
            },
        ))
    }

    /// Opens the row combinations given by `coeffs` (one row of
    /// coefficients per opened combination). `fullrank_cols` names the
    /// coefficient columns forming an invertible square block; the verifier
    /// uses it to solve back the committed evaluations. Returns the opening
    /// proof and the combination values over the data columns.
    pub fn open(
        &self,
        key: &LvcsKey<F>,
        coeffs: &[Vec<F>],
        fullrank_cols: &[usize],
        prtranscript: &[F],
    ) -> Result<(Vec<u8>, Vec<Vec<F>>)> {
        ensure!(coeffs.len() == self.nb_opened_combi, "lvcs: wrong combination count");
        ensure!(fullrank_cols.len() == self.nb_opened_combi, "lvcs: wrong pivot count");

        let extended_combis = mat_mul(coeffs, &key.extended_rows);
        let combi: Vec<Vec<F>> = extended_combis
            .iter()
            .map(|row| row[..self.nb_cols].to_vec())
            .collect();

        let trans_hash = self.opening_hash(prtranscript, &extended_combis);
        let (eval_points, nonce) = self.decs.get_opening_challenge(&trans_hash);
        let (decs_proof, evals) = self.decs.open(&key.decs_key, &eval_points)?;

        let mut proof = FieldWriter::new();
        for row in &extended_combis {
            proof.write_fields(&row[self.nb_cols..]);
        }
        proof.write_bytes(&nonce);
        for row in &evals {
            // Only the rows outside the invertible block travel; the others
            // are recomputed by solving the combination system.
            let subset: Vec<F> = (0..self.nb_rows)
                .filter(|k| !fullrank_cols.contains(k))
                .map(|k| row[k])
                .collect();
            proof.write_fields(&subset);
        }
        proof.write_bytes(&decs_proof);

        Ok((proof.into_bytes(), combi))
    }

    pub fn recompute_transcript(
        &self,
        salt: &Salt<F>,
        coeffs: &[Vec<F>],
        fullrank_cols: &[usize],
        prtranscript: &[F],
        combi: &[Vec<F>],
        proof: &[u8],
    ) -> Result<Vec<F>> {
        let m = self.nb_opened_evals;
        let r = self.nb_opened_combi;
        ensure!(coeffs.len() == r && combi.len() == r, "lvcs: wrong combination count");

        let mut reader = FieldReader::new(proof);
        let extended_combis: Vec<Vec<F>> = combi
            .iter()
            .map(|row| {
                ensure!(row.len() == self.nb_cols, "lvcs: wrong combination width");
                let mut extended = row.clone();
                extended.extend(reader.read_fields::<F>(m)?);
                Ok(extended)
            })
            .collect::<Result<_>>()?;

        let trans_hash = self.opening_hash(prtranscript, &extended_combis);
        let nonce = reader.read_nonce()?;
        let eval_points = self.decs.recompute_opening_challenge(&trans_hash, &nonce)?;

        // Expected combination values at the opened points, from the
        // interpolated extended combinations.
        let combi_polys: Vec<PolynomialCoeffs<F>> = extended_combis
            .iter()
            .map(|row| interpolate(row, &self.interpolation_points))
            .collect();
        let expected: Vec<Vec<F>> = eval_points
            .iter()
            .map(|&x| combi_polys.iter().map(|p| p.eval(x)).collect())
            .collect();

        // Split the coefficient matrix at the pivot columns and invert the
        // square block.
        ensure!(
            fullrank_cols.windows(2).all(|w| w[0] < w[1])
                && fullrank_cols.iter().all(|&c| c < self.nb_rows)
                && fullrank_cols.len() == r,
            "lvcs: invalid pivot columns"
        );
        let mut pivot_block = vec![vec![F::ZERO; r]; r];
        let mut rest_block = vec![vec![F::ZERO; self.nb_rows - r]; r];
        for j in 0..r {
            let mut ind = 0;
            for k in 0..self.nb_rows {
                if ind < r && fullrank_cols[ind] == k {
                    pivot_block[j][ind] = coeffs[j][k];
                    ind += 1;
                } else {
                    rest_block[j][k - ind] = coeffs[j][k];
                }
            }
        }
        let pivot_inv = mat_inverse(&pivot_block)
            .ok_or_else(|| anyhow::anyhow!("lvcs: pivot block is singular"))?;

        let mut evals = Vec::with_capacity(m);
        for j in 0..m {
            let subset = reader.read_fields::<F>(self.nb_rows - r)?;
            let known = mat_vec_mul(&rest_block, &subset);
            let rhs: Vec<F> = expected[j]
                .iter()
                .zip(&known)
                .map(|(&e, &k)| e - k)
                .collect();
            let solved = mat_vec_mul(&pivot_inv, &rhs);

            let mut row = vec![F::ZERO; self.nb_rows];
            let mut ind = 0;
            for k in 0..self.nb_rows {
                if ind < r && fullrank_cols[ind] == k {
                    row[k] = solved[ind];
                    ind += 1;
                } else {
                    row[k] = subset[k - ind];
                }
            }
            evals.push(row);
        }

        let decs_proof = reader.read_bytes(reader.remaining())?;
        self.decs
            .recompute_transcript(salt, &eval_points, &evals, decs_proof)
    }
}

#[cfg(test)]
mod tests {
    use capss_field::goldilocks_field::GoldilocksField;
    use capss_field::types::Sample;

    use super::*;

    type F = GoldilocksField;

    fn test_config() -> LvcsConfig {
        LvcsConfig {
            nb_rows: 6,
            nb_cols: 11,
            nb_opened_combi: 3,
            decs_nb_evals: 128,
            decs_nb_opened_evals: 4,
            decs_eta: 2,
            decs_pow_bits: 2,
            decs_use_commitment_tapes: false,
            decs_format_challenge: ChallengeFormat::Powers,
            decs_tree: None,
        }
    }

    #[test]
    fn commit_open_recompute() {
        let cfg = test_config();
        let lvcs = Lvcs::<F>::new(cfg.clone()).unwrap();
        let salt: Salt<F> = F::rand_array();
        let rows: Vec<Vec<F>> = (0..cfg.nb_rows).map(|_| F::rand_vec(cfg.nb_cols)).collect();

        let (transcript, key) = lvcs.commit(&salt, &rows).unwrap();

        // Random coefficients; the first r columns are invertible with
        // overwhelming probability.
        let coeffs: Vec<Vec<F>> = (0..cfg.nb_opened_combi)
            .map(|_| F::rand_vec(cfg.nb_rows))
            .collect();
        let fullrank_cols: Vec<usize> = (0..cfg.nb_opened_combi).collect();
        let prtranscript = F::rand_vec(4);

        let (proof, combi) = lvcs.open(&key, &coeffs, &fullrank_cols, &prtranscript).unwrap();
        assert!(proof.len() <= lvcs.max_proof_size());

        // The opened combinations are the actual row combinations.
        for (c_row, combo) in coeffs.iter().zip(&combi) {
            for col in 0..cfg.nb_cols {
                let direct: F = (0..cfg.nb_rows).map(|r| c_row[r] * rows[r][col]).sum();
                assert_eq!(combo[col], direct);
            }
        }

        let recomputed = lvcs
            .recompute_transcript(&salt, &coeffs, &fullrank_cols, &prtranscript, &combi, &proof)
            .unwrap();
        assert_eq!(recomputed, transcript);
    }

    #[test]
    fn singular_pivot_block_is_rejected() {
        let cfg = test_config();
        let lvcs = Lvcs::<F>::new(cfg.clone()).unwrap();
        let salt: Salt<F> = F::rand_array();
        let rows: Vec<Vec<F>> = (0..cfg.nb_rows).map(|_| F::rand_vec(cfg.nb_cols)).collect();
        let (_transcript, key) = lvcs.commit(&salt, &rows).unwrap();

        // Two identical coefficient rows make the pivot block singular.
        let mut coeffs: Vec<Vec<F>> = (0..cfg.nb_opened_combi)
            .map(|_| F::rand_vec(cfg.nb_rows))
            .collect();
        coeffs[1] = coeffs[0].clone();
        let fullrank_cols: Vec<usize> = (0..cfg.nb_opened_combi).collect();
        let prtranscript = F::rand_vec(4);

        let (proof, combi) = lvcs.open(&key, &coeffs, &fullrank_cols, &prtranscript).unwrap();
        assert!(lvcs
            .recompute_transcript(&salt, &coeffs, &fullrank_cols, &prtranscript, &combi, &proof)
            .is_err());
    }
}
