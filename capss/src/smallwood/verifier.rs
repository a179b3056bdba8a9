use anyhow::{bail, ensure, Result};

use super::challenges::{message_to_fields, piop_opening_challenge};
use super::SmallWood;
use crate::hash::hash_types::{RichField, Salt, NUM_SALT_ELTS};
use crate::hash::hashing::xof_to_digest;
use crate::lppc::Lppc;
use crate::util::serialization::FieldReader;

impl<F: RichField> SmallWood<F> {
    /// Verifies a proof for `lppc` bound to `message`: replays the opening
    /// challenge, recomputes the PCS and PIOP transcripts from the opened
    /// data, and compares the final PIOP hash.
    pub fn verify<L: Lppc<F>>(&self, lppc: &L, message: &[u8], proof: &[u8]) -> Result<()> {
        ensure!(
            proof.len() >= self.proof_size_without_pcs,
            "smallwood: proof too short"
        );
        let pcs_proof_size = proof.len() - self.proof_size_without_pcs;

        let mut reader = FieldReader::new(proof);
        let nonce = reader.read_nonce()?;
        let salt: Salt<F> = reader
            .read_fields::<F>(NUM_SALT_ELTS)?
            .try_into()
            .expect("salt width");
        let h_piop = reader.read_digest::<F>()?;
        let piop_proof = reader.read_bytes(self.piop.proof_size())?;
        let pcs_proof = reader.read_bytes(pcs_proof_size)?;
        let all_evals: Vec<Vec<F>> = (0..self.nb_opened_evals)
            .map(|_| reader.read_fields::<F>(self.nb_committed_polys()))
            .collect::<Result<_>>()?;

        // Replay the opening challenge; the grinding value must be zero.
        let (eval_points, vpow) = piop_opening_challenge(
            self.opening_pow_bits,
            &nonce,
            &h_piop,
            self.nb_opened_evals,
        );
        if vpow != 0 {
            bail!("smallwood: opening challenge proof of work failed");
        }

        // Recompute the PCS transcript from the opened evaluations.
        let pcs_transcript = self.pcs.recompute_transcript(
            &salt,
            &eval_points,
            &h_piop.elements,
            &all_evals,
            pcs_proof,
        )?;
        let mut transcript_with_data = pcs_transcript;
        transcript_with_data.extend(message_to_fields::<F>(message));

        // Split the opened rows back into witness and mask evaluations.
        let nb_wit_rows = self.params.nb_wit_rows;
        let mut wit_evals = Vec::with_capacity(self.nb_opened_evals);
        let mut pmask_evals = Vec::with_capacity(self.nb_opened_evals);
        let mut lmask_evals = Vec::with_capacity(self.nb_opened_evals);
        for row in &all_evals {
            wit_evals.push(row[..nb_wit_rows].to_vec());
            pmask_evals.push(row[nb_wit_rows..nb_wit_rows + self.rho].to_vec());
            lmask_evals.push(row[nb_wit_rows + self.rho..].to_vec());
        }

        let piop_transcript = self.piop.recompute_transcript(
            lppc,
            &transcript_with_data,
            &eval_points,
            &wit_evals,
            &pmask_evals,
            &lmask_evals,
            piop_proof,
        )?;

        if xof_to_digest(&piop_transcript) != h_piop {
            bail!("smallwood: transcript hash mismatch");
        }
        Ok(())
    }
}
