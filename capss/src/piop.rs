//! The polynomial IOP batching all LPPC constraints.
//!
//! From the committed witness polynomials, the prover derives per-repetition
//! batched constraint polynomials: the polynomial constraints are combined,
//! divided by the vanishing polynomial of the packing points and masked; the
//! linear constraints are combined and masked with a polynomial whose values
//! sum to zero over the packing points, so the public linear result stays
//! enforced. The verifier recomputes both from the opened evaluations and
//! the transmitted high-order coefficients.

use anyhow::{ensure, Result};
use capss_field::interpolation::{lagrange_basis, restore_from_high};
use capss_field::polynomial::PolynomialCoeffs;
use itertools::izip;

use crate::decs::{derive_batching_coefficients, ChallengeFormat};
use crate::hash::hash_types::{RichField, NUM_DIGEST_ELTS};
use crate::hash::hashing::xof_to_digest;
use crate::lppc::{Lppc, LppcParams};
use crate::util::serialization::{FieldReader, FieldWriter, FELT_BYTES};

#[derive(Clone, Debug)]
pub struct PiopConfig {
    /// Number of batching repetitions.
    pub rho: usize,
    /// Number of evaluation points opened on the committed polynomials.
    pub nb_opened_evals: usize,
    pub format_challenge: ChallengeFormat,
}

/// The degrees of the committed polynomials: witness rows, polynomial-
/// constraint masks and linear-constraint masks.
pub fn input_degrees(params: &LppcParams, cfg: &PiopConfig) -> (usize, usize, usize) {
    let mu = params.packing_factor;
    let m = cfg.nb_opened_evals;
    let wit_degree = mu + m - 1;
    let mask_poly_degree = params.constraint_degree * (mu + m - 1) - mu;
    let mask_lin_degree = (mu + m - 1) + (mu - 1);
    (wit_degree, mask_poly_degree, mask_lin_degree)
}

#[derive(Debug)]
pub struct Piop<F: RichField> {
    params: LppcParams,
    rho: usize,
    nb_opened_evals: usize,
    format_challenge: ChallengeFormat,
    packing_points: Vec<F>,
    out_ppol_degree: usize,
    out_plin_degree: usize,
}

impl<F: RichField> Piop<F> {
    pub fn new(params: LppcParams, cfg: &PiopConfig) -> Result<Self> {
        ensure!(cfg.rho > 0, "piop: zero repetitions");
        ensure!(cfg.nb_opened_evals > 0, "piop: zero opened evaluations");
        let mu = params.packing_factor;
        let m = cfg.nb_opened_evals;
        let out_ppol_degree = params.constraint_degree * (mu + m - 1) - mu;
        let out_plin_degree = (mu + m - 1) + (mu - 1);

        let packing_points = (0..mu).map(F::from_canonical_usize).collect();

        Ok(Self {
            params,
            rho: cfg.rho,
            nb_opened_evals: m,
            format_challenge: cfg.format_challenge,
            packing_points,
            out_ppol_degree,
            out_plin_degree,
        })
    }

    pub fn packing_points(&self) -> &[F] {
        &self.packing_points
    }

    /// Proof size in bytes: the high coefficients of both output
    /// polynomials, per repetition.
    pub fn proof_size(&self) -> usize {
        self.rho
            * ((self.out_ppol_degree + 1 - self.nb_opened_evals)
                + (self.out_plin_degree - self.nb_opened_evals))
            * FELT_BYTES
    }

    /// Transcript length in field elements: the constraint-challenge hash,
    /// then per repetition the full batched-constraint polynomial and the
    /// batched linear polynomial without its constant term.
    pub fn transcript_len(&self) -> usize {
        NUM_DIGEST_ELTS + self.rho * ((self.out_ppol_degree + 1) + self.out_plin_degree)
    }

    fn derive_gammas(&self, in_transcript: &[F]) -> (Vec<F>, Vec<Vec<F>>) {
        let hash_fpp = xof_to_digest(in_transcript);
        let nb_max_constraints = self
            .params
            .nb_poly_constraints
            .max(self.params.nb_linear_constraints);
        let gammas = derive_batching_coefficients(
            self.format_challenge,
            &hash_fpp.elements,
            self.rho,
            nb_max_constraints,
        );
        (hash_fpp.to_vec(), gammas)
    }

    /// Samples the committed polynomials: witness rows interpolated with `m`
    /// random high coefficients, uniform polynomial-constraint masks, and
    /// linear-constraint masks with zero sum over the packing points.
    pub fn prepare_input_polynomials(
        &self,
        witness: &[F],
    ) -> Result<(
        Vec<PolynomialCoeffs<F>>,
        Vec<PolynomialCoeffs<F>>,
        Vec<PolynomialCoeffs<F>>,
    )> {
        let mu = self.params.packing_factor;
        let m = self.nb_opened_evals;
        ensure!(
            witness.len() == self.params.witness_size(),
            "piop: wrong witness size"
        );

        let wit_polys = (0..self.params.nb_wit_rows)
            .map(|i| {
                let evals = &witness[i * mu..(i + 1) * mu];
                restore_from_high(&F::rand_vec(m), evals, &self.packing_points, mu + m - 1)
            })
            .collect();

        let pmask_polys = (0..self.rho)
            .map(|_| PolynomialCoeffs::new(F::rand_vec(self.out_ppol_degree + 1)))
            .collect();

        let lmask_polys = (0..self.rho)
            .map(|_| self.random_sum_zero_poly())
            .collect();

        Ok((wit_polys, pmask_polys, lmask_polys))
    }

    /// A random polynomial of the linear-mask degree whose evaluations over
    /// the packing points sum to zero: the constant term soaks up the sum.
    fn random_sum_zero_poly(&self) -> PolynomialCoeffs<F> {
        let mut coeffs = vec![F::ZERO];
        coeffs.extend(F::rand_vec(self.out_plin_degree));
        let mut poly = PolynomialCoeffs::new(coeffs);

        let sum: F = self.packing_points.iter().map(|&pt| poly.eval(pt)).sum();
        let count = F::from_canonical_usize(self.packing_points.len());
        poly.coeffs[0] = -(sum / count);
        poly
    }

    /// The prover side: batches the constraints into the output transcript
    /// and the high-coefficient proof.
    pub fn run<L: Lppc<F>>(
        &self,
        lppc: &L,
        in_transcript: &[F],
        wit_polys: &[PolynomialCoeffs<F>],
        pmask_polys: &[PolynomialCoeffs<F>],
        lmask_polys: &[PolynomialCoeffs<F>],
    ) -> Result<(Vec<F>, Vec<u8>)> {
        let m = self.nb_opened_evals;
        let ext_len = self.out_ppol_degree + self.params.packing_factor + 1;

        let (hash_fpp, gammas) = self.derive_gammas(in_transcript);

        let in_ppol = lppc.constraint_poly_polynomials(wit_polys, &self.packing_points);
        ensure!(
            in_ppol.len() == self.params.nb_poly_constraints,
            "piop: wrong polynomial constraint count"
        );
        let in_plin =
            lppc.constraint_linear_polynomials_batched(wit_polys, &self.packing_points, &gammas);

        let mut transcript = hash_fpp;
        let mut proof = FieldWriter::new();
        for num_rep in 0..self.rho {
            // Batched polynomial constraints, divided by the vanishing
            // polynomial of the packing points. The division is exact for an
            // honest witness; this is where cheating witnesses die.
            let mut out_ppol = PolynomialCoeffs::zero(ext_len);
            for (num, poly) in in_ppol.iter().enumerate() {
                out_ppol += &(poly * gammas[num_rep][num]);
            }
            ensure!(out_ppol.len() == ext_len, "piop: constraint degree overflow");
            for &pt in &self.packing_points {
                out_ppol = out_ppol.remove_linear_factor(pt);
            }
            out_ppol += &pmask_polys[num_rep];

            let mut out_plin = in_plin[num_rep].padded(self.out_plin_degree + 1);
            out_plin += &lmask_polys[num_rep];

            transcript.extend_from_slice(&out_ppol.coeffs);
            transcript.extend_from_slice(&out_plin.coeffs[1..]);
            proof.write_fields(&out_ppol.coeffs[m..]);
            proof.write_fields(&out_plin.coeffs[m + 1..]);
        }

        Ok((transcript, proof.into_bytes()))
    }

    /// The verifier side: recomputes the output transcript from the opened
    /// evaluations and the proof.
    pub fn recompute_transcript<L: Lppc<F>>(
        &self,
        lppc: &L,
        in_transcript: &[F],
        eval_points: &[F],
        wit_evals: &[Vec<F>],
        pmask_evals: &[Vec<F>],
        lmask_evals: &[Vec<F>],
        proof: &[u8],
    ) -> Result<Vec<F>> {
        let m = self.nb_opened_evals;
        ensure!(eval_points.len() == m, "piop: wrong opening count");
        for (i, &r) in eval_points.iter().enumerate() {
            ensure!(
                eval_points[..i].iter().all(|&s| s != r),
                "piop: repeated opened point"
            );
        }

        let (hash_fpp, gammas) = self.derive_gammas(in_transcript);

        let in_epol = lppc.constraint_poly_evals(eval_points, wit_evals, &self.packing_points);
        let in_elin = lppc.constraint_linear_evals(eval_points, wit_evals, &self.packing_points);
        let vt = lppc.linear_result();

        // Vanishing products at the opened points; rejects points colliding
        // with a packing point.
        let inv_vanishing_at: Vec<F> = eval_points
            .iter()
            .map(|&r| {
                let prod: F = self.packing_points.iter().map(|&pt| r - pt).product();
                prod.try_inverse()
                    .ok_or_else(|| anyhow::anyhow!("piop: opened point hits a packing point"))
            })
            .collect::<Result<_>>()?;

        // The Lagrange correction enforcing the public linear result: the
        // basis polynomial of the extra point 0 among the opened points.
        let mut points_with_zero = eval_points.to_vec();
        points_with_zero.push(F::ZERO);
        let lag = lagrange_basis(&points_with_zero, m);
        let correction_factor: F = self.packing_points.iter().map(|&pt| lag.eval(pt)).sum();

        let mut reader = FieldReader::new(proof);
        let mut transcript = hash_fpp;
        for num_rep in 0..self.rho {
            // Opened values of the batched polynomial constraint.
            let out_epol: Vec<F> = izip!(&in_epol, pmask_evals, &inv_vanishing_at)
                .map(|(epol_row, pmask_row, &inv_vanishing)| {
                    let combined = epol_row
                        .iter()
                        .zip(&gammas[num_rep])
                        .fold(F::ZERO, |acc, (&e, &g)| acc.multiply_accumulate(e, g));
                    combined * inv_vanishing + pmask_row[num_rep]
                })
                .collect();
            let high = reader.read_fields::<F>(self.out_ppol_degree + 1 - m)?;
            let out_ppol = restore_from_high(&high, &out_epol, eval_points, self.out_ppol_degree);

            // Opened values of the batched linear constraint, restored with
            // a zero constant term, then corrected so the packing-point sum
            // matches the public result.
            let mut out_elin: Vec<F> = izip!(&in_elin, lmask_evals)
                .map(|(elin_row, lmask_row)| {
                    let combined = elin_row
                        .iter()
                        .zip(&gammas[num_rep])
                        .fold(F::ZERO, |acc, (&e, &g)| acc.multiply_accumulate(e, g));
                    combined + lmask_row[num_rep]
                })
                .collect();
            out_elin.push(F::ZERO);
            let high = reader.read_fields::<F>(self.out_plin_degree - m)?;
            let mut out_plin =
                restore_from_high(&high, &out_elin, &points_with_zero, self.out_plin_degree);

            let expected: F = vt
                .iter()
                .zip(&gammas[num_rep])
                .fold(F::ZERO, |acc, (&v, &g)| acc.multiply_accumulate(v, g));
            let actual: F = self
                .packing_points
                .iter()
                .map(|&pt| out_plin.eval(pt))
                .sum();
            let res = (expected - actual) / correction_factor;
            out_plin += &(&lag * res);

            transcript.extend_from_slice(&out_ppol.coeffs);
            transcript.extend_from_slice(&out_plin.coeffs[1..]);
        }

        Ok(transcript)
    }
}

#[cfg(test)]
mod tests {
    use capss_field::types::{Field, Sample};
    use rand::thread_rng;

    use super::*;
    use crate::anemoi::AnemoiGoldilocks;
    use crate::lppc::regular_perm::RegularPermConfig;

    type F = capss_field::goldilocks_field::GoldilocksField;

    fn piop_round_trip(format: ChallengeFormat, rho: usize, m: usize) {
        let perm_cfg = RegularPermConfig::<F, _>::new(AnemoiGoldilocks, 7, 1, 1).unwrap();
        let (lppc, secret) = perm_cfg.random_instance(&mut thread_rng());
        let witness = lppc.build_witness(&secret).unwrap();

        let piop = Piop::<F>::new(
            perm_cfg.params().clone(),
            &PiopConfig {
                rho,
                nb_opened_evals: m,
                format_challenge: format,
            },
        )
        .unwrap();

        let (wit_polys, pmask, lmask) = piop.prepare_input_polynomials(&witness).unwrap();
        let in_transcript = F::rand_vec(8);
        let (transcript, proof) = piop
            .run(&lppc, &in_transcript, &wit_polys, &pmask, &lmask)
            .unwrap();
        assert_eq!(transcript.len(), piop.transcript_len());
        assert_eq!(proof.len(), piop.proof_size());

        // Open everything at arbitrary points away from the packing points.
        let eval_points: Vec<F> = (0..m)
            .map(|i| F::from_canonical_usize(1000 + 37 * i))
            .collect();
        let wit_evals: Vec<Vec<F>> = eval_points
            .iter()
            .map(|&r| wit_polys.iter().map(|p| p.eval(r)).collect())
            .collect();
        let pmask_evals: Vec<Vec<F>> = eval_points
            .iter()
            .map(|&r| pmask.iter().map(|p| p.eval(r)).collect())
            .collect();
        let lmask_evals: Vec<Vec<F>> = eval_points
            .iter()
            .map(|&r| lmask.iter().map(|p| p.eval(r)).collect())
            .collect();

        let recomputed = piop
            .recompute_transcript(
                &lppc,
                &in_transcript,
                &eval_points,
                &wit_evals,
                &pmask_evals,
                &lmask_evals,
                &proof,
            )
            .unwrap();
        assert_eq!(recomputed, transcript);
    }

    #[test]
    fn run_and_recompute_agree() {
        piop_round_trip(ChallengeFormat::Powers, 1, 1);
    }

    #[test]
    fn run_and_recompute_agree_more_repetitions() {
        piop_round_trip(ChallengeFormat::Uniform, 2, 3);
        piop_round_trip(ChallengeFormat::Structured, 2, 2);
    }

    #[test]
    fn tampered_witness_evaluation_changes_transcript() {
        let perm_cfg = RegularPermConfig::<F, _>::new(AnemoiGoldilocks, 7, 1, 1).unwrap();
        let (lppc, secret) = perm_cfg.random_instance(&mut thread_rng());
        let witness = lppc.build_witness(&secret).unwrap();
        let piop = Piop::<F>::new(
            perm_cfg.params().clone(),
            &PiopConfig {
                rho: 1,
                nb_opened_evals: 1,
                format_challenge: ChallengeFormat::Powers,
            },
        )
        .unwrap();
        let (wit_polys, pmask, lmask) = piop.prepare_input_polynomials(&witness).unwrap();
        let in_transcript = F::rand_vec(8);
        let (transcript, proof) = piop
            .run(&lppc, &in_transcript, &wit_polys, &pmask, &lmask)
            .unwrap();

        let r = F::from_canonical_usize(4242);
        let mut wit_evals = vec![wit_polys.iter().map(|p| p.eval(r)).collect::<Vec<F>>()];
        wit_evals[0][0] += F::ONE;
        let pmask_evals = vec![pmask.iter().map(|p| p.eval(r)).collect::<Vec<F>>()];
        let lmask_evals = vec![lmask.iter().map(|p| p.eval(r)).collect::<Vec<F>>()];

        let recomputed = piop
            .recompute_transcript(
                &lppc,
                &in_transcript,
                &[r],
                &wit_evals,
                &pmask_evals,
                &lmask_evals,
                &proof,
            )
            .unwrap();
        assert_ne!(recomputed, transcript);
    }
}
