//! PCS: the polynomial commitment scheme.
//!
//! Packs polynomials of possibly different degrees column-wise into a
//! `(mu + m)`-row matrix, stacks `beta` column blocks into one LVCS row
//! block, and commits the stacked matrix with the LVCS. Opening an
//! evaluation point `r` opens the row combination with coefficients
//! `(1, r, ..., r^{mu+m-1})` per block, from which the claimed evaluation
//! is reassembled column by column.

use anyhow::{ensure, Result};
use capss_field::polynomial::PolynomialCoeffs;
use capss_util::ceil_div_usize;

use crate::decs::ChallengeFormat;
use crate::hash::hash_types::{RichField, Salt};
use crate::hash::merkle_tree::MerkleTreeConfig;
use crate::lvcs::{Lvcs, LvcsConfig, LvcsKey};
use crate::util::serialization::{FieldReader, FieldWriter, FELT_BYTES};

#[derive(Clone, Debug)]
pub struct PcsConfig {
    pub degrees: Vec<usize>,
    pub nb_opened_evals: usize,
    /// Rows of the unstacked packing; the witness packing factor.
    pub mu: usize,
    /// Stacking factor: how many unstacked column blocks share an LVCS row.
    pub beta: usize,
    pub decs_nb_evals: usize,
    pub decs_nb_opened_evals: usize,
    pub decs_eta: usize,
    pub decs_pow_bits: u32,
    pub decs_use_commitment_tapes: bool,
    pub decs_format_challenge: ChallengeFormat,
    pub decs_tree: Option<MerkleTreeConfig>,
}

#[derive(Debug)]
pub struct Pcs<F: RichField> {
    degrees: Vec<usize>,
    widths: Vec<usize>,
    deltas: Vec<usize>,
    nb_opened_evals: usize,
    mu: usize,
    beta: usize,
    nb_unstacked_rows: usize,
    nb_unstacked_cols: usize,
    nb_lvcs_rows: usize,
    nb_lvcs_cols: usize,
    nb_opened_combi: usize,
    fullrank_cols: Vec<usize>,
    lvcs: Lvcs<F>,
}

#[derive(Debug)]
pub struct PcsKey<F: RichField> {
    lvcs_key: LvcsKey<F>,
}

impl<F: RichField> Pcs<F> {
    pub fn new(cfg: PcsConfig) -> Result<Self> {
        let m = cfg.nb_opened_evals;
        let mu = cfg.mu;
        let beta = cfg.beta;
        ensure!(!cfg.degrees.is_empty(), "pcs: no polynomials");
        ensure!(mu > 0 && beta > 0 && m > 0, "pcs: degenerate parameters");

        let mut widths = Vec::with_capacity(cfg.degrees.len());
        let mut deltas = Vec::with_capacity(cfg.degrees.len());
        let mut nb_unstacked_cols = 0;
        for &degree in &cfg.degrees {
            ensure!(degree >= m, "pcs: degree {degree} below the opening count {m}");
            let width = ceil_div_usize(degree + 1 - m, mu);
            let delta = mu * width + m - (degree + 1);
            // A single-column polynomial must fill its whole column, or its
            // degree bound is not enforced.
            ensure!(
                width != 1 || delta == 0,
                "pcs: degree {degree} does not fill one column (mu {mu}, m {m})"
            );
            widths.push(width);
            deltas.push(delta);
            nb_unstacked_cols += width;
        }

        let nb_unstacked_rows = mu + m;
        let nb_lvcs_rows = nb_unstacked_rows * beta;
        let nb_lvcs_cols = ceil_div_usize(nb_unstacked_cols, beta);
        let nb_opened_combi = beta * m;

        let fullrank_cols: Vec<usize> = (0..beta)
            .flat_map(|i| (0..m).map(move |j| i * (mu + m) + j))
            .collect();

        let lvcs = Lvcs::new(LvcsConfig {
            nb_rows: nb_lvcs_rows,
            nb_cols: nb_lvcs_cols,
            nb_opened_combi,
            decs_nb_evals: cfg.decs_nb_evals,
            decs_nb_opened_evals: cfg.decs_nb_opened_evals,
            decs_eta: cfg.decs_eta,
            decs_pow_bits: cfg.decs_pow_bits,
            decs_use_commitment_tapes: cfg.decs_use_commitment_tapes,
            decs_format_challenge: cfg.decs_format_challenge,
            decs_tree: cfg.decs_tree.clone(),
        })?;

        Ok(Self {
            degrees: cfg.degrees,
            widths,
            deltas,
            nb_opened_evals: m,
            mu,
            beta,
            nb_unstacked_rows,
            nb_unstacked_cols,
            nb_lvcs_rows,
            nb_lvcs_cols,
            nb_opened_combi,
            fullrank_cols,
            lvcs,
        })
    }

    pub fn nb_polys(&self) -> usize {
        self.degrees.len()
    }

    pub fn transcript_len(&self) -> usize {
        self.lvcs.transcript_len()
    }

    pub fn max_proof_size(&self) -> usize {
        let partial: usize = self.widths.iter().map(|&w| w - 1).sum();
        self.lvcs.max_proof_size() + self.nb_opened_evals * partial * FELT_BYTES
    }

    pub fn commit(
        &self,
        salt: &Salt<F>,
        polys: &[PolynomialCoeffs<F>],
    ) -> Result<(Vec<F>, PcsKey<F>)> {
        let m = self.nb_opened_evals;
        let mu = self.mu;
        ensure!(polys.len() == self.nb_polys(), "pcs: wrong polynomial count");

        let mut rows = vec![vec![F::ZERO; self.nb_unstacked_cols]; self.nb_unstacked_rows];
        let mut offset = 0;
        for (j, poly) in polys.iter().enumerate() {
            let width = self.widths[j];
            let delta = self.deltas[j];
            ensure!(
                poly.len() == self.degrees[j] + 1,
                "pcs: polynomial {j} must carry degree + 1 coefficients"
            );

            // Coefficients go down the columns; the final column only uses
            // rows `delta..`.
            let mut ind = 0;
            for i in 0..width - 1 {
                for k in 0..mu {
                    rows[k][offset + i] = poly.coeffs[ind];
                    ind += 1;
                }
            }
            for k in delta..self.nb_unstacked_rows {
                rows[k][offset + width - 1] = poly.coeffs[ind];
                ind += 1;
            }
            debug_assert_eq!(ind, self.degrees[j] + 1);

            // Hiding randomness: each opened-evaluation row gets fresh
            // values in this block, compensated one column later so the
            // evaluation reassembly still yields P(r).
            if width > 1 {
                for i in 0..m {
                    let rnd = F::rand_vec(width - 1);
                    rows[mu + i][offset..offset + width - 1].copy_from_slice(&rnd);
                    for (col, &r) in rnd[..width - 2].iter().enumerate() {
                        rows[i][offset + 1 + col] -= r;
                    }
                    rows[delta + i][offset + width - 1] -= rnd[width - 2];
                }
                for i in 0..delta {
                    rows[i][offset + width - 1] = F::ZERO;
                }
            }

            offset += width;
        }

        // Stack `beta` unstacked column blocks per LVCS row; the tail of the
        // last block is zero-padded.
        let stacked = self.stack_rows(&rows);
        let (transcript, lvcs_key) = self.lvcs.commit(salt, &stacked)?;
        Ok((transcript, PcsKey { lvcs_key }))
    }

    fn stack_rows(&self, rows: &[Vec<F>]) -> Vec<Vec<F>> {
        (0..self.nb_lvcs_rows)
            .map(|i| {
                let unstacked_row = i % self.nb_unstacked_rows;
                let offset = (i / self.nb_unstacked_rows) * self.nb_lvcs_cols;
                let mut out = vec![F::ZERO; self.nb_lvcs_cols];
                if offset < self.nb_unstacked_cols {
                    let take = self.nb_lvcs_cols.min(self.nb_unstacked_cols - offset);
                    out[..take].copy_from_slice(&rows[unstacked_row][offset..offset + take]);
                }
                out
            })
            .collect()
    }

    /// The LVCS coefficient rows for the opened points: row `j * beta + k`
    /// carries the powers `(1, r_j, ..., r_j^{mu+m-1})` in block `k`.
    fn build_coefficients(&self, eval_points: &[F]) -> Vec<Vec<F>> {
        let span = self.mu + self.nb_opened_evals;
        let mut coeffs = vec![vec![F::ZERO; self.nb_lvcs_rows]; self.nb_opened_combi];
        for (j, &point) in eval_points.iter().enumerate() {
            let powers: Vec<F> = point.powers().take(span).collect();
            for k in 0..self.beta {
                coeffs[j * self.beta + k][k * span..(k + 1) * span].copy_from_slice(&powers);
            }
        }
        coeffs
    }

    /// The per-column multiplier sequence used to fold one polynomial's
    /// combination values back into its evaluation at `point`.
    fn column_multiplier_step(&self, pow: &mut F, col: usize, width: usize, delta: usize, point: F, r_to_mu: F) {
        if col + 2 < width {
            *pow *= r_to_mu;
        } else if col + 2 == width {
            *pow *= point.exp_u64((self.mu - delta) as u64);
        }
    }

    /// Opens every committed polynomial at each of `eval_points`. Returns
    /// the opening proof and the evaluations `evals[j][k] = P_k(r_j)`.
    pub fn open(
        &self,
        key: &PcsKey<F>,
        eval_points: &[F],
        prtranscript: &[F],
    ) -> Result<(Vec<u8>, Vec<Vec<F>>)> {
        let m = self.nb_opened_evals;
        ensure!(eval_points.len() == m, "pcs: wrong opening count");

        let coeffs = self.build_coefficients(eval_points);
        let (lvcs_proof, combi) =
            self.lvcs
                .open(&key.lvcs_key, &coeffs, &self.fullrank_cols, prtranscript)?;

        let mut proof = FieldWriter::new();
        proof.write_bytes(&lvcs_proof);

        let mut evals = vec![vec![F::ZERO; self.nb_polys()]; m];
        for (j, &point) in eval_points.iter().enumerate() {
            let r_to_mu = point.exp_u64(self.mu as u64);

            let mut num_col = 0;
            let mut num_combi = self.beta * j;
            for k in 0..self.nb_polys() {
                let width = self.widths[k];
                let delta = self.deltas[k];
                let mut eval = F::ZERO;
                let mut pow = F::ONE;
                let mut partial = Vec::with_capacity(width - 1);
                for i in 0..width {
                    let value = combi[num_combi][num_col];
                    if i > 0 {
                        partial.push(value);
                    }
                    eval = eval.multiply_accumulate(value, pow);
                    self.column_multiplier_step(&mut pow, i, width, delta, point, r_to_mu);
                    num_col += 1;
                    if num_col >= self.nb_lvcs_cols {
                        num_col = 0;
                        num_combi += 1;
                    }
                }
                proof.write_fields(&partial);
                evals[j][k] = eval;
            }

            // Any zero-padded stacking columns must carry zero combination
            // values; anything else means a corrupted key.
            if num_combi < self.beta * (j + 1) {
                for col in num_col..self.nb_lvcs_cols {
                    ensure!(
                        combi[num_combi][col].is_zero(),
                        "pcs: nonzero combination in a padding column"
                    );
                }
            }
        }

        Ok((proof.into_bytes(), evals))
    }

    pub fn recompute_transcript(
        &self,
        salt: &Salt<F>,
        eval_points: &[F],
        prtranscript: &[F],
        evals: &[Vec<F>],
        proof: &[u8],
    ) -> Result<Vec<F>> {
        let m = self.nb_opened_evals;
        ensure!(eval_points.len() == m, "pcs: wrong opening count");
        ensure!(evals.len() == m, "pcs: wrong evaluation row count");

        let coeffs = self.build_coefficients(eval_points);

        let partial: usize = self.widths.iter().map(|&w| w - 1).sum();
        let partial_size = m * partial * FELT_BYTES;
        ensure!(proof.len() >= partial_size, "pcs: opening proof too short");
        let lvcs_proof = &proof[..proof.len() - partial_size];
        let mut reader = FieldReader::new(&proof[proof.len() - partial_size..]);

        // Rebuild the opened combinations: the transmitted values fill every
        // column but the first of each polynomial block, whose value is
        // pinned by the claimed evaluation.
        let mut combi = vec![vec![F::ZERO; self.nb_lvcs_cols]; self.nb_opened_combi];
        for (j, &point) in eval_points.iter().enumerate() {
            let r_to_mu = point.exp_u64(self.mu as u64);

            let mut unstacked = vec![F::ZERO; self.nb_unstacked_cols];
            let mut poly_ind = 0;
            for k in 0..self.nb_polys() {
                let width = self.widths[k];
                let delta = self.deltas[k];
                ensure!(
                    evals[j].len() == self.nb_polys(),
                    "pcs: wrong evaluation row width"
                );
                let partial = reader.read_fields::<F>(width - 1)?;
                unstacked[poly_ind + 1..poly_ind + width].copy_from_slice(&partial);

                let mut sum = F::ZERO;
                let mut pow = F::ONE;
                for i in 0..width - 1 {
                    self.column_multiplier_step(&mut pow, i, width, delta, point, r_to_mu);
                    sum = sum.multiply_accumulate(unstacked[poly_ind + 1 + i], pow);
                }
                unstacked[poly_ind] = evals[j][k] - sum;
                poly_ind += width;
            }

            for i in 0..self.beta {
                let row = j * self.beta + i;
                let offset = i * self.nb_lvcs_cols;
                if offset < self.nb_unstacked_cols {
                    let take = self.nb_lvcs_cols.min(self.nb_unstacked_cols - offset);
                    combi[row][..take].copy_from_slice(&unstacked[offset..offset + take]);
                }
            }
        }

        self.lvcs.recompute_transcript(
            salt,
            &coeffs,
            &self.fullrank_cols,
            prtranscript,
            &combi,
            lvcs_proof,
        )
    }
}

#[cfg(test)]
mod tests {
    use capss_field::goldilocks_field::GoldilocksField;
    use capss_field::types::Sample;

    use super::*;

    type F = GoldilocksField;

    fn test_config(degrees: Vec<usize>, mu: usize, beta: usize) -> PcsConfig {
        PcsConfig {
            degrees,
            nb_opened_evals: 2,
            mu,
            beta,
            decs_nb_evals: 256,
            decs_nb_opened_evals: 5,
            decs_eta: 2,
            decs_pow_bits: 2,
            decs_use_commitment_tapes: false,
            decs_format_challenge: ChallengeFormat::Powers,
            decs_tree: None,
        }
    }

    fn round_trip(cfg: PcsConfig) {
        let pcs = Pcs::<F>::new(cfg.clone()).unwrap();
        let salt: Salt<F> = F::rand_array();
        let polys: Vec<PolynomialCoeffs<F>> = cfg
            .degrees
            .iter()
            .map(|&d| PolynomialCoeffs::new(F::rand_vec(d + 1)))
            .collect();

        let (transcript, key) = pcs.commit(&salt, &polys).unwrap();

        let eval_points = F::rand_vec(cfg.nb_opened_evals);
        let prtranscript = F::rand_vec(4);
        let (proof, evals) = pcs.open(&key, &eval_points, &prtranscript).unwrap();
        assert!(proof.len() <= pcs.max_proof_size());

        // The opened values are the actual evaluations.
        for (j, &point) in eval_points.iter().enumerate() {
            for (k, poly) in polys.iter().enumerate() {
                assert_eq!(evals[j][k], poly.eval(point), "poly {k} at point {j}");
            }
        }

        let recomputed = pcs
            .recompute_transcript(&salt, &eval_points, &prtranscript, &evals, &proof)
            .unwrap();
        assert_eq!(recomputed, transcript);
    }

    #[test]
    fn uniform_degrees() {
        // mu = 3, m = 2: degree 13 -> width 4, delta 0.
        round_trip(test_config(vec![13, 13, 13], 3, 1));
    }

    #[test]
    fn mixed_degrees_and_deltas() {
        // Widths 4, 3, 1 with nonzero delta on the middle polynomial.
        round_trip(test_config(vec![13, 9, 4], 3, 1));
    }

    #[test]
    fn stacked_blocks() {
        round_trip(test_config(vec![13, 13, 9, 4, 4], 3, 2));
    }

    #[test]
    fn underfilled_single_column_rejected() {
        // degree 3 with mu = 3, m = 2: width 1 but delta != 0.
        assert!(Pcs::<F>::new(test_config(vec![3], 3, 1)).is_err());
    }
}
