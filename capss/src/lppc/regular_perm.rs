//! The LPPC statement for one regular-permutation preimage.
//!
//! Statement: there is a secret `x` such that applying the permutation's
//! rounds to `(iv || x)` yields a state whose first `y_size` entries equal
//! the public `y`. Rounds are batched `b` at a time: one witness column per
//! batch, holding the batch's input state, all intermediate states and any
//! per-round witnesses; columns are chained by linear constraints.

use anyhow::{ensure, Result};
use capss_field::interpolation::{interpolate, lagrange_basis};
use capss_field::polynomial::PolynomialCoeffs;

use capss_util::ceil_div_usize;

use super::{Lppc, LppcParams};
use crate::anemoi::round::{
    compute_round_function, round_verification_residue_polys, round_verification_residues,
};
use crate::anemoi::RegularPermutation;
use crate::hash::hash_types::RichField;
use crate::util::serialization::{FieldReader, FieldWriter, FELT_BYTES};

/// The statement family: permutation plus batching and input/output sizes.
/// Instances ([`RegularPermLppc`]) bind a concrete `(iv, y)` pair.
#[derive(Debug)]
pub struct RegularPermConfig<F: RichField, P: RegularPermutation<F>> {
    perm: P,
    params: LppcParams,
    state_size: usize,
    nb_rounds: usize,
    batching_factor: usize,
    iv_size: usize,
    y_size: usize,
    _phantom: core::marker::PhantomData<F>,
}

/// One statement instance: the public `(iv, y)`.
#[derive(Debug)]
pub struct RegularPermLppc<'a, F: RichField, P: RegularPermutation<F>> {
    cfg: &'a RegularPermConfig<F, P>,
    iv: Vec<F>,
    y: Vec<F>,
}

impl<F: RichField, P: RegularPermutation<F>> RegularPermConfig<F, P> {
    pub fn new(perm: P, batching_factor: usize, iv_size: usize, y_size: usize) -> Result<Self> {
        let state_size = perm.state_size();
        let nb_rounds = perm.nb_rounds();
        let round_wit_size = perm.round_wit_size();
        let verification_degree = perm.verification_degree();

        ensure!(batching_factor > 0, "regular perm: zero batching factor");
        ensure!(iv_size > 0 && y_size > 0, "regular perm: empty IV or output");
        ensure!(
            iv_size < state_size,
            "regular perm: IV size {iv_size} not below the state size {state_size}"
        );
        ensure!(
            y_size <= state_size,
            "regular perm: output size {y_size} above the state size {state_size}"
        );
        ensure!(
            round_wit_size == 0,
            "regular perm: per-round witnesses are not supported"
        );

        let packing_factor = ceil_div_usize(nb_rounds, batching_factor);
        let params = LppcParams {
            nb_wit_rows: state_size * (batching_factor + 1) + round_wit_size * batching_factor,
            packing_factor,
            constraint_degree: verification_degree,
            nb_poly_constraints: batching_factor * (state_size + round_wit_size),
            nb_linear_constraints: state_size * (packing_factor - 1) + iv_size + y_size,
        };

        Ok(Self {
            perm,
            params,
            state_size,
            nb_rounds,
            batching_factor,
            iv_size,
            y_size,
            _phantom: core::marker::PhantomData,
        })
    }

    pub fn params(&self) -> &LppcParams {
        &self.params
    }

    pub fn secret_size(&self) -> usize {
        self.state_size - self.iv_size
    }

    /// Byte size of a serialized instance: `iv || y`.
    pub fn serialized_size(&self) -> usize {
        (self.iv_size + self.y_size) * FELT_BYTES
    }

    pub fn instance(&self, iv: Vec<F>, y: Vec<F>) -> Result<RegularPermLppc<'_, F, P>> {
        ensure!(iv.len() == self.iv_size && y.len() == self.y_size, "regular perm: wrong instance sizes");
        Ok(RegularPermLppc { cfg: self, iv, y })
    }

    pub fn instance_from_bytes(&self, bytes: &[u8]) -> Result<RegularPermLppc<'_, F, P>> {
        let mut reader = FieldReader::new(bytes);
        let iv = reader.read_fields::<F>(self.iv_size)?;
        let y = reader.read_fields::<F>(self.y_size)?;
        self.instance(iv, y)
    }

    /// Samples a fresh statement: a random IV and secret, with the output
    /// computed by running the permutation.
    pub fn random_instance<R: rand::RngCore + ?Sized>(
        &self,
        rng: &mut R,
    ) -> (RegularPermLppc<'_, F, P>, Vec<F>) {
        let iv = F::sample_vec(rng, self.iv_size);
        let secret = F::sample_vec(rng, self.secret_size());

        let keys = self.perm.round_keys();
        let mut state = iv.clone();
        state.extend_from_slice(&secret);
        for num_round in 0..self.nb_rounds {
            let cst = &keys[num_round * self.state_size..][..self.state_size];
            state = compute_round_function(&self.perm, &state, cst);
        }
        let y = state[..self.y_size].to_vec();

        (RegularPermLppc { cfg: self, iv, y }, secret)
    }

    /// The round keys for logical round `num_round`; rounds past the
    /// permutation's count (batching slack) reuse the first row.
    fn round_cst(&self, num_round: usize) -> &[F] {
        let keys = self.perm.round_keys();
        let row = if num_round < self.nb_rounds { num_round } else { 0 };
        &keys[row * self.state_size..][..self.state_size]
    }

    /// The round-key value for `(round j of each batch, state cell i)`
    /// interpolated across the packing columns.
    fn round_cst_poly(&self, j: usize, i: usize, packing_points: &[F]) -> PolynomialCoeffs<F> {
        let values: Vec<F> = (0..self.params.packing_factor)
            .map(|k| self.round_cst(k * self.batching_factor + j)[i])
            .collect();
        interpolate(&values, packing_points)
    }

    /// The witness row holding the state cells the `y` constraint reads:
    /// the state at the start of batch round `b - offset` of the last
    /// column, i.e. the state right after round `nb_rounds`.
    fn y_row_offset(&self) -> usize {
        let offset = self.params.packing_factor * self.batching_factor - self.nb_rounds;
        (self.batching_factor - offset) * self.state_size
    }
}

impl<F: RichField, P: RegularPermutation<F>> RegularPermLppc<'_, F, P> {
    pub fn serialize(&self) -> Vec<u8> {
        let mut writer = FieldWriter::new();
        writer.write_fields(&self.iv);
        writer.write_fields(&self.y);
        writer.into_bytes()
    }

    /// Recomputes every round state from the secret and packs them into the
    /// witness matrix layout.
    pub fn build_witness(&self, secret: &[F]) -> Result<Vec<F>> {
        let cfg = self.cfg;
        let t = cfg.state_size;
        let b = cfg.batching_factor;
        let pf = cfg.params.packing_factor;
        ensure!(secret.len() == cfg.secret_size(), "regular perm: wrong secret size");

        let mut witness = vec![F::ZERO; cfg.params.witness_size()];
        let mut state = self.iv.clone();
        state.extend_from_slice(secret);

        for num_round in 0..b * pf {
            let col = num_round / b;
            if num_round % b == 0 {
                for i in 0..t {
                    witness[i * pf + col] = state[i];
                }
            }

            state = compute_round_function(&cfg.perm, &state, cfg.round_cst(num_round));

            let offset_row = ((num_round % b) + 1) * t;
            for i in 0..t {
                witness[(offset_row + i) * pf + col] = state[i];
            }
        }
        Ok(witness)
    }
}

impl<F: RichField, P: RegularPermutation<F>> Lppc<F> for RegularPermLppc<'_, F, P> {
    fn params(&self) -> &LppcParams {
        &self.cfg.params
    }

    fn constraint_poly_polynomials(
        &self,
        wit_polys: &[PolynomialCoeffs<F>],
        packing_points: &[F],
    ) -> Vec<PolynomialCoeffs<F>> {
        let cfg = self.cfg;
        let t = cfg.state_size;
        let wit_poly_degree = wit_polys[0].degree();

        let mut out = Vec::with_capacity(cfg.params.nb_poly_constraints);
        for j in 0..cfg.batching_factor {
            let cst_polys: Vec<PolynomialCoeffs<F>> = (0..t)
                .map(|i| cfg.round_cst_poly(j, i, packing_points).padded(wit_poly_degree + 1))
                .collect();
            out.extend(round_verification_residue_polys(
                &cfg.perm,
                &wit_polys[j * t..(j + 1) * t],
                &wit_polys[(j + 1) * t..(j + 2) * t],
                &cst_polys,
                wit_poly_degree,
            ));
        }
        out
    }

    fn constraint_linear_polynomials(
        &self,
        wit_polys: &[PolynomialCoeffs<F>],
        packing_points: &[F],
    ) -> Vec<PolynomialCoeffs<F>> {
        let cfg = self.cfg;
        let t = cfg.state_size;
        let b = cfg.batching_factor;
        let pf = cfg.params.packing_factor;
        let out_len = wit_polys[0].degree() + (pf - 1) + 1;

        let lag: Vec<PolynomialCoeffs<F>> = (0..pf)
            .map(|j| lagrange_basis(packing_points, j))
            .collect();

        let mut out = Vec::with_capacity(cfg.params.nb_linear_constraints);
        // Column chaining: the end state of column k equals the start state
        // of column k + 1.
        for j in 0..pf - 1 {
            for i in 0..t {
                let end = &(&lag[j] * &wit_polys[b * t + i]);
                let start = &(&lag[j + 1] * &wit_polys[i]);
                out.push((end - start).padded(out_len));
            }
        }
        for j in 0..cfg.iv_size {
            out.push((&lag[0] * &wit_polys[j]).padded(out_len));
        }
        let y_row = cfg.y_row_offset();
        for j in 0..cfg.y_size {
            out.push((&lag[pf - 1] * &wit_polys[y_row + j]).padded(out_len));
        }
        out
    }

    fn linear_result(&self) -> Vec<F> {
        let cfg = self.cfg;
        let mut vt = vec![F::ZERO; cfg.state_size * (cfg.params.packing_factor - 1)];
        vt.extend_from_slice(&self.iv);
        vt.extend_from_slice(&self.y);
        vt
    }

    fn constraint_poly_evals(
        &self,
        eval_points: &[F],
        wit_evals: &[Vec<F>],
        packing_points: &[F],
    ) -> Vec<Vec<F>> {
        let cfg = self.cfg;
        let t = cfg.state_size;

        eval_points
            .iter()
            .zip(wit_evals)
            .map(|(&point, row)| {
                let mut out = Vec::with_capacity(cfg.params.nb_poly_constraints);
                for j in 0..cfg.batching_factor {
                    let cst: Vec<F> = (0..t)
                        .map(|i| cfg.round_cst_poly(j, i, packing_points).eval(point))
                        .collect();
                    out.extend(round_verification_residues(
                        &cfg.perm,
                        &row[j * t..(j + 1) * t],
                        &row[(j + 1) * t..(j + 2) * t],
                        &cst,
                    ));
                }
                out
            })
            .collect()
    }

    fn constraint_linear_evals(
        &self,
        eval_points: &[F],
        wit_evals: &[Vec<F>],
        packing_points: &[F],
    ) -> Vec<Vec<F>> {
        let cfg = self.cfg;
        let t = cfg.state_size;
        let b = cfg.batching_factor;
        let pf = cfg.params.packing_factor;
        let y_row = cfg.y_row_offset();

        let lag: Vec<PolynomialCoeffs<F>> = (0..pf)
            .map(|j| lagrange_basis(packing_points, j))
            .collect();

        eval_points
            .iter()
            .zip(wit_evals)
            .map(|(&point, row)| {
                let lag_evals: Vec<F> = lag.iter().map(|l| l.eval(point)).collect();
                let mut out = Vec::with_capacity(cfg.params.nb_linear_constraints);
                for j in 0..pf - 1 {
                    for i in 0..t {
                        out.push(lag_evals[j] * row[b * t + i] - lag_evals[j + 1] * row[i]);
                    }
                }
                for j in 0..cfg.iv_size {
                    out.push(lag_evals[0] * row[j]);
                }
                for j in 0..cfg.y_size {
                    out.push(lag_evals[pf - 1] * row[y_row + j]);
                }
                out
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use capss_field::types::Field;
    use rand::thread_rng;

    use super::*;
    use crate::anemoi::AnemoiGoldilocks;
    use crate::lppc::test_witness;

    type F = capss_field::goldilocks_field::GoldilocksField;

    #[test]
    fn witness_satisfies_all_constraints() {
        let cfg = RegularPermConfig::<F, _>::new(AnemoiGoldilocks, 7, 1, 1).unwrap();
        let (lppc, secret) = cfg.random_instance(&mut thread_rng());
        let witness = lppc.build_witness(&secret).unwrap();
        test_witness(&lppc, &witness).unwrap();
    }

    #[test]
    fn wrong_secret_fails_constraints() {
        let cfg = RegularPermConfig::<F, _>::new(AnemoiGoldilocks, 7, 1, 1).unwrap();
        let (lppc, secret) = cfg.random_instance(&mut thread_rng());
        let mut bad_secret = secret;
        bad_secret[0] += F::ONE;
        let witness = lppc.build_witness(&bad_secret).unwrap();
        assert!(test_witness(&lppc, &witness).is_err());
    }

    #[test]
    fn instance_serialization_round_trip() {
        let cfg = RegularPermConfig::<F, _>::new(AnemoiGoldilocks, 3, 2, 4).unwrap();
        let (lppc, _secret) = cfg.random_instance(&mut thread_rng());
        let bytes = lppc.serialize();
        assert_eq!(bytes.len(), cfg.serialized_size());
        let restored = cfg.instance_from_bytes(&bytes).unwrap();
        assert_eq!(restored.iv, lppc.iv);
        assert_eq!(restored.y, lppc.y);
    }

    #[test]
    fn config_validation() {
        assert!(RegularPermConfig::<F, _>::new(AnemoiGoldilocks, 0, 1, 1).is_err());
        assert!(RegularPermConfig::<F, _>::new(AnemoiGoldilocks, 7, 8, 1).is_err());
        assert!(RegularPermConfig::<F, _>::new(AnemoiGoldilocks, 7, 1, 9).is_err());
        assert!(RegularPermConfig::<F, _>::new(AnemoiGoldilocks, 7, 0, 1).is_err());
    }
}
