//! The DECS opening challenge: grinding field elements into leaf indices.
//!
//! Each attempt hashes `(nonce, transcript hash)` to a few field elements;
//! an element is accepted only when its integer value stays below a
//! per-element cap, which leaves the configured number of proof-of-work bits
//! unused on top of the base-`nb_evals` digits it carries. Accepted elements
//! are digit-decoded into the opened leaf indices.
//!
//! The split of digits and spare bits across elements depends only on the
//! configuration, so it is planned once here and reused for every attempt.

use anyhow::{ensure, Result};
use capss_field::types::Field;
use capss_util::ceil_div_usize;

use crate::hash::hash_types::{nonce_to_field, Digest, Nonce, RichField};
use crate::hash::hashing::field_xof;

/// How one challenge element is interpreted: how many base-`nb_evals`
/// digits it contributes and the largest integer value it may take.
#[derive(Clone, Debug)]
pub struct OpeningPlan {
    nb_evals: usize,
    nb_opened_evals: usize,
    queries_per_element: Vec<usize>,
    cap_per_element: Vec<u128>,
}

impl OpeningPlan {
    pub fn new<F: Field>(nb_evals: usize, nb_opened_evals: usize, pow_bits: u32) -> Result<Self> {
        let log2_order = F::LOG2_ORDER;
        let log2_nb_evals = (nb_evals as f64).log2();
        let margin = 0.001;
        // How many indices fit into one element at most.
        let maxi = (log2_order / log2_nb_evals - margin).floor() as usize;
        ensure!(maxi >= 1, "opening plan: domain too large for one element");

        // Spread the indices over as few elements as possible, then add
        // spare elements until the fractional leftovers cover `pow_bits`.
        let mut delta = 0;
        loop {
            let size = ceil_div_usize(nb_opened_evals, maxi) + delta;
            let min_queries = nb_opened_evals / size;
            let max_queries = ceil_div_usize(nb_opened_evals, size);
            let nb_at_max = nb_opened_evals % size;

            let mut queries = Vec::with_capacity(size);
            let mut spare_bits = Vec::with_capacity(size);
            let mut acquired = 0f64;
            for i in 0..size {
                let q = if i < nb_at_max { max_queries } else { min_queries };
                let exact = log2_order - q as f64 * log2_nb_evals;
                let whole = exact.floor();
                queries.push(q);
                spare_bits.push(whole as u32);
                acquired += exact - whole;
            }

            // Greedily move whole bits from the elements into the
            // proof-of-work budget until it is covered.
            let mut covered = true;
            let mut ind = 0;
            while acquired < pow_bits as f64 {
                let missing = pow_bits - acquired.floor() as u32;
                let take = missing.min(spare_bits[ind]);
                acquired += take as f64;
                spare_bits[ind] -= take;
                ind += 1;
                if acquired < (pow_bits as f64) && ind >= size {
                    covered = false;
                    break;
                }
            }
            if !covered {
                delta += 1;
                continue;
            }

            let cap_per_element = queries
                .iter()
                .zip(&spare_bits)
                .map(|(&q, &bits)| {
                    let digits = (nb_evals as u128).pow(q.max(1) as u32);
                    digits
                        .checked_shl(bits)
                        .filter(|&cap| cap - 1 < (1 << F::BITS))
                        .map(|cap| cap - 1)
                        .ok_or_else(|| {
                            anyhow::anyhow!("opening plan: element cap exceeds the field width")
                        })
                })
                .collect::<Result<Vec<_>>>()?;

            return Ok(Self {
                nb_evals,
                nb_opened_evals,
                queries_per_element: queries,
                cap_per_element,
            });
        }
    }

    /// Number of challenge field elements per attempt.
    pub fn len(&self) -> usize {
        self.queries_per_element.len()
    }

    /// One grinding attempt: `None` when an element exceeds its cap (the
    /// proof of work fails) or the decoded indices collide.
    pub fn draw<F: RichField>(&self, nonce: &Nonce, trans_hash: &Digest<F>) -> Option<Vec<usize>> {
        let mut input = vec![nonce_to_field(nonce)];
        input.extend(trans_hash.elements);
        let elements = field_xof::<F>(&input, self.len());

        let mut values = Vec::with_capacity(self.len());
        for (element, &cap) in elements.iter().zip(&self.cap_per_element) {
            let value = element.to_canonical_u64() as u128;
            if value > cap {
                return None;
            }
            values.push(value);
        }

        let mut indices = Vec::with_capacity(self.nb_opened_evals);
        for (mut value, &q) in values.into_iter().zip(&self.queries_per_element) {
            for _ in 0..q {
                indices.push((value % self.nb_evals as u128) as usize);
                value /= self.nb_evals as u128;
            }
        }
        indices.sort_unstable();
        if indices.windows(2).any(|w| w[0] == w[1]) {
            return None;
        }
        Some(indices)
    }
}

#[cfg(test)]
mod tests {
    use capss_field::goldilocks_field::GoldilocksField;
    use capss_field::types::Sample;

    use super::*;
    use crate::hash::hash_types::nonce_from_counter;

    type F = GoldilocksField;

    #[test]
    fn plan_budgets_all_indices() {
        for (nb_evals, m, pow_bits) in [(16384, 13, 8), (4096, 17, 7), (1024, 24, 8)] {
            let plan = OpeningPlan::new::<F>(nb_evals, m, pow_bits).unwrap();
            assert_eq!(plan.queries_per_element.iter().sum::<usize>(), m);
            for &cap in &plan.cap_per_element {
                assert!(cap < u64::MAX as u128);
            }
        }
    }

    #[test]
    fn draw_is_deterministic_and_in_range() {
        let plan = OpeningPlan::new::<F>(1024, 24, 8).unwrap();
        let trans_hash = Digest::<F>::rand();

        let mut counter = 0u32;
        let indices = loop {
            let nonce = nonce_from_counter(counter);
            if let Some(indices) = plan.draw(&nonce, &trans_hash) {
                assert_eq!(plan.draw(&nonce, &trans_hash).unwrap(), indices);
                break indices;
            }
            counter += 1;
            assert!(counter < 1 << 20, "grinding should succeed long before this");
        };

        assert_eq!(indices.len(), 24);
        assert!(indices.windows(2).all(|w| w[0] < w[1]));
        assert!(indices.iter().all(|&i| i < 1024));
    }
}
