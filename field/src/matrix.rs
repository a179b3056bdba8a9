//! Row-major dense matrices over a field.
//!
//! The linear commitment layer only needs multiplication and the inversion
//! of small square matrices (the opened-combination coefficient blocks), so
//! matrices stay plain `Vec<Vec<F>>` values.

use crate::types::Field;

/// `a (m x n) * b (n x p) -> (m x p)`.
pub fn mat_mul<F: Field>(a: &[Vec<F>], b: &[Vec<F>]) -> Vec<Vec<F>> {
    let n = a.first().map_or(0, |row| row.len());
    let p = b.first().map_or(0, |row| row.len());
    debug_assert!(a.iter().all(|row| row.len() == n));
    debug_assert_eq!(b.len(), n);

    a.iter()
        .map(|row| {
            (0..p)
                .map(|k| {
                    row.iter()
                        .zip(b)
                        .fold(F::ZERO, |acc, (&aij, brow)| acc.multiply_accumulate(aij, brow[k]))
                })
                .collect()
        })
        .collect()
}

/// `a (m x n) * v (n) -> (m)`.
pub fn mat_vec_mul<F: Field>(a: &[Vec<F>], v: &[F]) -> Vec<F> {
    a.iter()
        .map(|row| {
            debug_assert_eq!(row.len(), v.len());
            row.iter()
                .zip(v)
                .fold(F::ZERO, |acc, (&aij, &vj)| acc.multiply_accumulate(aij, vj))
        })
        .collect()
}

/// Inverts a square matrix by Gauss-Jordan elimination, or returns `None` if
/// it is singular.
pub fn mat_inverse<F: Field>(a: &[Vec<F>]) -> Option<Vec<Vec<F>>> {
    let n = a.len();
    debug_assert!(a.iter().all(|row| row.len() == n));

    // Work on [A | I] and reduce the left block to the identity.
    let mut work: Vec<Vec<F>> = a
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let mut extended = row.clone();
            extended.extend((0..n).map(|j| if i == j { F::ONE } else { F::ZERO }));
            extended
        })
        .collect();

    for col in 0..n {
        let pivot_row = (col..n).find(|&r| work[r][col].is_nonzero())?;
        work.swap(col, pivot_row);

        let pivot_inv = work[col][col].try_inverse()?;
        for x in work[col].iter_mut() {
            *x *= pivot_inv;
        }

        for row in 0..n {
            if row != col && work[row][col].is_nonzero() {
                let factor = work[row][col];
                for j in 0..2 * n {
                    let sub = factor * work[col][j];
                    work[row][j] -= sub;
                }
            }
        }
    }

    Some(work.into_iter().map(|row| row[n..].to_vec()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::goldilocks_field::GoldilocksField;
    use crate::types::Sample;

    type F = GoldilocksField;

    fn identity(n: usize) -> Vec<Vec<F>> {
        (0..n)
            .map(|i| {
                (0..n)
                    .map(|j| if i == j { F::ONE } else { F::ZERO })
                    .collect()
            })
            .collect()
    }

    #[test]
    fn inverse_of_random_matrix() {
        let n = 6;
        let a: Vec<Vec<F>> = (0..n).map(|_| F::rand_vec(n)).collect();
        // A uniform matrix is invertible with overwhelming probability.
        let inv = mat_inverse(&a).unwrap();
        assert_eq!(mat_mul(&a, &inv), identity(n));
        assert_eq!(mat_mul(&inv, &a), identity(n));
    }

    #[test]
    fn singular_matrix_is_rejected() {
        let row = F::rand_vec(4);
        let a = vec![row.clone(), row.clone(), F::rand_vec(4), F::rand_vec(4)];
        assert!(mat_inverse(&a).is_none());
    }

    #[test]
    fn mat_vec_matches_mat_mul() {
        let a: Vec<Vec<F>> = (0..5).map(|_| F::rand_vec(3)).collect();
        let v = F::rand_vec(3);
        let b: Vec<Vec<F>> = v.iter().map(|&x| vec![x]).collect();
        let via_mul: Vec<F> = mat_mul(&a, &b).into_iter().map(|r| r[0]).collect();
        assert_eq!(mat_vec_mul(&a, &v), via_mul);
    }
}
