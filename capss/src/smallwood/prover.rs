use anyhow::{ensure, Result};
use log::debug;

use super::challenges::{message_to_fields, piop_opening_challenge};
use super::SmallWood;
use crate::hash::hash_types::{nonce_from_counter, RichField, Salt};
use crate::hash::hashing::xof_to_digest;
use crate::lppc::Lppc;
use crate::util::serialization::FieldWriter;

impl<F: RichField> SmallWood<F> {
    /// Produces a proof of knowledge of `witness` for `lppc`, bound to
    /// `message`. The proof is the signature.
    pub fn prove<L: Lppc<F>>(&self, lppc: &L, witness: &[F], message: &[u8]) -> Result<Vec<u8>> {
        ensure!(
            witness.len() == self.params.witness_size(),
            "smallwood: wrong witness size"
        );

        let salt: Salt<F> = F::rand_array();

        // Commit to the witness rows and the PIOP masks in one batch.
        let (wit_polys, pmask_polys, lmask_polys) = self.piop.prepare_input_polynomials(witness)?;
        let mut all_polys = wit_polys.clone();
        all_polys.extend(pmask_polys.iter().cloned());
        all_polys.extend(lmask_polys.iter().cloned());
        let (pcs_transcript, pcs_key) = self.pcs.commit(&salt, &all_polys)?;

        // The message is bound to the transcript before any challenge is
        // derived.
        let mut transcript_with_data = pcs_transcript;
        transcript_with_data.extend(message_to_fields::<F>(message));

        let (piop_transcript, piop_proof) = self.piop.run(
            lppc,
            &transcript_with_data,
            &wit_polys,
            &pmask_polys,
            &lmask_polys,
        )?;
        let h_piop = xof_to_digest(&piop_transcript);

        // Grind the opening challenge: the grinding value must be zero and
        // no opened point may collide with a packing point.
        let mut counter = 0u32;
        let (nonce, eval_points) = loop {
            let nonce = nonce_from_counter(counter);
            let (eval_points, vpow) = piop_opening_challenge(
                self.opening_pow_bits,
                &nonce,
                &h_piop,
                self.nb_opened_evals,
            );
            let distinct = eval_points
                .iter()
                .all(|pt| !self.piop.packing_points().contains(pt));
            if vpow == 0 && distinct {
                debug!("smallwood: opening challenge after {} attempts", counter + 1);
                break (nonce, eval_points);
            }
            counter = counter.wrapping_add(1);
        };

        let (pcs_proof, all_evals) = self.pcs.open(&pcs_key, &eval_points, &h_piop.elements)?;

        let mut proof = FieldWriter::new();
        proof.write_bytes(&nonce);
        proof.write_fields(&salt);
        proof.write_digest(&h_piop);
        proof.write_bytes(&piop_proof);
        proof.write_bytes(&pcs_proof);
        for row in &all_evals {
            proof.write_fields(row);
        }

        debug!(
            "smallwood: proof {} B (pcs {} B, piop {} B)",
            proof.len(),
            pcs_proof.len(),
            piop_proof.len()
        );
        Ok(proof.into_bytes())
    }
}
