//! Salted Merkle tree with per-level arities, truncation and multi-opening.
//!
//! Authentication paths are produced down to (not above) the truncation
//! depth `t`; the verifier receives the whole depth-`t` frontier and
//! recomputes the last `t` levels itself.

use std::collections::VecDeque;

use anyhow::{ensure, Result};
use capss_util::log2_ceil;

use crate::hash::hash_types::{Digest, RichField, Salt};
use crate::hash::hashing::xof_to_digest;

/// Tree shape description. Missing pieces are deduced: a zero `height` means
/// a binary tree of height `ceil(log2(nb_leaves))`; empty `arities` means
/// binary levels; a zero `nb_leaves` means as many leaves as the arities
/// allow.
#[derive(Clone, Debug, Default)]
pub struct MerkleTreeConfig {
    pub nb_leaves: usize,
    pub height: usize,
    pub arities: Vec<usize>,
    pub truncated: usize,
}

impl MerkleTreeConfig {
    pub fn binary(nb_leaves: usize) -> Self {
        Self {
            nb_leaves,
            ..Default::default()
        }
    }
}

/// The static shape of a tree: validated height, leaf count and arities.
///
/// `arities[h]` is the number of children of a node at depth `h`; leaves
/// live at depth `height`.
#[derive(Clone, Debug)]
pub struct MerkleTree {
    height: usize,
    nb_leaves: usize,
    arities: Vec<usize>,
    truncated: usize,
}

/// All node digests of an expanded tree, owned by the committer until the
/// opening phase. `nodes[depth]` holds the digests at that depth; the leaves
/// sit at `nodes[height]` and the root at `nodes[0][0]`.
#[derive(Clone, Debug)]
pub struct MerkleKey<F: RichField> {
    nodes: Vec<Vec<Digest<F>>>,
}

/// Compresses one sibling group into its parent digest.
///
/// The salt and parent index are part of the hashing interface; this
/// instantiation binds the salt at the leaf layer only and hashes the
/// concatenated children, like the reference hash set.
fn compress_nodes<F: RichField>(
    _parent_index: usize,
    _salt: &Salt<F>,
    children: &[Digest<F>],
) -> Digest<F> {
    let inputs: Vec<F> = children
        .iter()
        .flat_map(|digest| digest.elements)
        .collect();
    xof_to_digest(&inputs)
}

impl MerkleTree {
    pub fn new(cfg: &MerkleTreeConfig) -> Result<Self> {
        ensure!(
            cfg.nb_leaves > 0 || cfg.height > 0,
            "merkle: either the leaf count or the height must be given"
        );

        let (height, nb_leaves, arities) = if cfg.height != 0 {
            let height = cfg.height;
            let arities = if cfg.arities.is_empty() {
                ensure!(height < 32, "merkle: height {height} too large");
                vec![2; height]
            } else {
                ensure!(
                    cfg.arities.len() == height,
                    "merkle: {} arities for height {height}",
                    cfg.arities.len()
                );
                cfg.arities.clone()
            };
            let mut max_nb_leaves = 1u64;
            for &arity in &arities {
                ensure!(arity >= 2, "merkle: arity {arity} below 2");
                max_nb_leaves = max_nb_leaves
                    .checked_mul(arity as u64)
                    .filter(|&prod| prod <= 1 << 32)
                    .ok_or_else(|| anyhow::anyhow!("merkle: more than 2^32 leaf slots"))?;
            }
            let nb_leaves = if cfg.nb_leaves > 0 {
                ensure!(
                    cfg.nb_leaves as u64 <= max_nb_leaves,
                    "merkle: {} leaves do not fit under {} slots",
                    cfg.nb_leaves,
                    max_nb_leaves
                );
                cfg.nb_leaves
            } else {
                max_nb_leaves as usize
            };
            (height, nb_leaves, arities)
        } else {
            let height = log2_ceil(cfg.nb_leaves);
            (height, cfg.nb_leaves, vec![2; height])
        };

        ensure!(
            cfg.truncated < height || (cfg.truncated == 0 && height == 0),
            "merkle: truncation depth {} not below height {height}",
            cfg.truncated
        );

        Ok(Self {
            height,
            nb_leaves,
            arities,
            truncated: cfg.truncated,
        })
    }

    pub fn nb_leaves(&self) -> usize {
        self.nb_leaves
    }

    /// Upper bound on the digest count of any multi-opening of `nb_open`
    /// leaves: never more than all leaves, and never more than
    /// `(arity - 1) * nb_open` per level.
    pub fn max_auth_len(&self, nb_open: usize) -> usize {
        let per_level: usize = self.arities.iter().map(|&a| (a - 1) * nb_open).sum();
        per_level.min(self.nb_leaves)
    }

    /// Hashes all levels from the given leaf digests. Returns the root and
    /// the node material needed to open leaves later.
    pub fn expand<F: RichField>(
        &self,
        salt: &Salt<F>,
        leaves: &[Digest<F>],
    ) -> (Digest<F>, MerkleKey<F>) {
        assert_eq!(leaves.len(), self.nb_leaves);

        let mut nodes = vec![Vec::new(); self.height + 1];
        nodes[self.height] = leaves.to_vec();

        let mut last_index = self.nb_leaves - 1;
        for h in (0..self.height).rev() {
            let arity = self.arities[h];
            // The trailing group at this level may be short; it is
            // compressed as-is, without padding.
            let mut last_nb_children = (last_index + 1) % arity;
            if last_nb_children == 0 {
                last_nb_children = arity;
            }
            last_index /= arity;

            let mut level = Vec::with_capacity(last_index + 1);
            for parent_index in 0..=last_index {
                let nb_children = if parent_index == last_index {
                    last_nb_children
                } else {
                    arity
                };
                let children = &nodes[h + 1][arity * parent_index..][..nb_children];
                level.push(compress_nodes(parent_index, salt, children));
            }
            nodes[h] = level;
        }

        let root = nodes[0][0];
        (root, MerkleKey { nodes })
    }

    /// Opens the leaves at `indices` (strictly ascending), returning the
    /// authentication digests in emission order.
    pub fn open_multi<F: RichField>(
        &self,
        key: &MerkleKey<F>,
        indices: &[usize],
    ) -> Result<Vec<Digest<F>>> {
        let mut auth = Vec::new();
        self.walk_frontier(
            &[F::ZERO; crate::hash::hash_types::NUM_SALT_ELTS],
            indices,
            false,
            |node| {
                auth.push(key.nodes[node.depth][node.index]);
                Ok(Digest::ZERO)
            },
            |_popped| Ok(Digest::ZERO),
        )?;
        Ok(auth)
    }

    /// Recomputes the root from opened leaves and an authentication path, by
    /// mirroring [`Self::open_multi`]: auth digests are consumed in the
    /// exact order that the opener emitted them.
    pub fn retrieve_root<F: RichField>(
        &self,
        salt: &Salt<F>,
        indices: &[usize],
        opened_leaves: &[Digest<F>],
        auth: &[Digest<F>],
    ) -> Result<Digest<F>> {
        ensure!(
            opened_leaves.len() == indices.len(),
            "merkle: {} leaves for {} indices",
            opened_leaves.len(),
            indices.len()
        );

        let mut auth_iter = auth.iter();
        let mut leaf_iter = opened_leaves.iter();
        let frontier = self.walk_frontier(
            salt,
            indices,
            true,
            |_node| {
                auth_iter
                    .next()
                    .copied()
                    .ok_or_else(|| anyhow::anyhow!("merkle: authentication path exhausted"))
            },
            |popped| match popped {
                PoppedValue::Leaf => Ok(*leaf_iter.next().expect("one digest per index")),
                PoppedValue::Computed(digest) => Ok(digest),
            },
        )?;

        if self.truncated > 0 {
            // Recompute the truncated top from the revealed frontier.
            let top = MerkleTree {
                height: self.truncated,
                nb_leaves: frontier.len(),
                arities: self.arities[..self.truncated].to_vec(),
                truncated: 0,
            };
            let (root, _key) = top.expand(salt, &frontier);
            Ok(root)
        } else {
            debug_assert_eq!(frontier.len(), 1);
            Ok(frontier[0])
        }
    }

    /// Shared traversal of `open_multi` and `retrieve_root`.
    ///
    /// A FIFO of known nodes starts at the opened leaves. Each popped node
    /// walks its sibling group: siblings left of it come from the
    /// authentication path (`on_auth`), group members that are next in the
    /// queue are consumed, and the cursor then jumps past the group so that
    /// remaining right-hand siblings are also routed through `on_auth`.
    /// Parents are enqueued until the frontier reaches the truncation depth,
    /// whose node values are returned in index order.
    ///
    /// `on_auth` sees every authentication node in emission order; its
    /// return value is the digest used for recomputation (openers return a
    /// dummy). `value_of` maps a popped queue entry to its digest.
    fn walk_frontier<F, A, V>(
        &self,
        salt: &Salt<F>,
        indices: &[usize],
        hash_parents: bool,
        mut on_auth: A,
        mut value_of: V,
    ) -> Result<Vec<Digest<F>>>
    where
        F: RichField,
        A: FnMut(NodeRef) -> Result<Digest<F>>,
        V: FnMut(PoppedValue<F>) -> Result<Digest<F>>,
    {
        ensure!(!indices.is_empty(), "merkle: no indices to open");
        ensure!(
            indices.windows(2).all(|w| w[0] < w[1]),
            "merkle: leaf indices must be strictly ascending"
        );
        ensure!(
            *indices.last().unwrap() < self.nb_leaves,
            "merkle: leaf index out of range"
        );

        struct Entry<F: RichField> {
            index: usize,
            depth: usize,
            value: Option<Digest<F>>,
        }

        let mut queue: VecDeque<Entry<F>> = indices
            .iter()
            .map(|&index| Entry {
                index,
                depth: self.height,
                value: None,
            })
            .collect();

        let mut last_index = self.nb_leaves - 1;
        let mut current_depth = self.height;

        while queue.front().unwrap().depth != self.truncated {
            let entry = queue.pop_front().unwrap();
            let depth = entry.depth;
            let mut index = entry.index;
            let mut node = match entry.value {
                None => value_of(PoppedValue::Leaf)?,
                Some(digest) => value_of(PoppedValue::Computed(digest))?,
            };

            if depth < current_depth {
                // First node of a new level: shrink the level's last index.
                last_index /= self.arities[depth];
            }
            current_depth = depth;

            let arity = self.arities[depth - 1];
            let parent_index = index / arity;
            let first_sibling = index - index % arity;
            let next_first_sibling = (first_sibling + arity).min(last_index + 1);
            let nb_children = next_first_sibling - first_sibling;

            let mut children = Vec::with_capacity(nb_children);
            for i in 0..nb_children {
                if first_sibling + i < index {
                    children.push(on_auth(NodeRef {
                        depth,
                        index: first_sibling + i,
                    })?);
                } else {
                    // This position is the current known node; record it and
                    // advance to the next known node of the group, if any.
                    children.push(node);
                    let in_group = queue.front().is_some_and(|next| {
                        next.depth == depth && index < next.index && next.index < next_first_sibling
                    });
                    if in_group {
                        let next = queue.pop_front().unwrap();
                        index = next.index;
                        node = match next.value {
                            None => value_of(PoppedValue::Leaf)?,
                            Some(digest) => value_of(PoppedValue::Computed(digest))?,
                        };
                    } else {
                        index = next_first_sibling;
                    }
                }
            }

            let parent = if hash_parents {
                compress_nodes(parent_index, salt, &children)
            } else {
                Digest::ZERO
            };
            queue.push_back(Entry {
                index: parent_index,
                depth: depth - 1,
                value: Some(parent),
            });
        }

        if self.truncated == 0 {
            // Untruncated: the queue head is the root.
            let root = queue.pop_front().unwrap();
            return Ok(vec![match root.value {
                None => value_of(PoppedValue::Leaf)?,
                Some(digest) => value_of(PoppedValue::Computed(digest))?,
            }]);
        }

        // Flush the frontier at the truncation depth: queue entries appear
        // in index order, every other frontier node comes from the path.
        last_index /= self.arities[self.truncated];
        let mut frontier = Vec::with_capacity(last_index + 1);
        for i in 0..=last_index {
            let from_queue = queue.front().is_some_and(|next| next.index == i);
            if from_queue {
                let next = queue.pop_front().unwrap();
                frontier.push(match next.value {
                    None => value_of(PoppedValue::Leaf)?,
                    Some(digest) => value_of(PoppedValue::Computed(digest))?,
                });
            } else {
                frontier.push(on_auth(NodeRef {
                    depth: self.truncated,
                    index: i,
                })?);
            }
        }

        Ok(frontier)
    }
}

/// A node position handed to the authentication-path callback.
#[derive(Copy, Clone, Debug)]
struct NodeRef {
    depth: usize,
    index: usize,
}

enum PoppedValue<F: RichField> {
    /// An opened leaf, whose digest the caller supplies.
    Leaf,
    /// A parent computed during the traversal.
    Computed(Digest<F>),
}

#[cfg(test)]
mod tests {
    use capss_field::goldilocks_field::GoldilocksField;
    use capss_field::types::{Field, Sample};
    use rand::seq::index::sample;
    use rand::thread_rng;

    use super::*;

    type F = GoldilocksField;

    fn random_leaves(n: usize) -> Vec<Digest<F>> {
        (0..n).map(|_| Digest::rand()).collect()
    }

    fn check_round_trip(cfg: &MerkleTreeConfig, indices: &[usize]) {
        let tree = MerkleTree::new(cfg).unwrap();
        let salt: Salt<F> = F::rand_array();
        let leaves = random_leaves(tree.nb_leaves());

        let (root, key) = tree.expand(&salt, &leaves);
        let auth = tree.open_multi(&key, indices).unwrap();
        assert!(auth.len() <= tree.max_auth_len(indices.len()));

        let opened: Vec<_> = indices.iter().map(|&i| leaves[i]).collect();
        let retrieved = tree.retrieve_root(&salt, indices, &opened, &auth).unwrap();
        assert_eq!(retrieved, root);
    }

    #[test]
    fn binary_round_trip() {
        check_round_trip(&MerkleTreeConfig::binary(33), &[0, 1, 17, 32]);
    }

    #[test]
    fn arity_four_partial_tree() {
        // Height 6, arity 4, 1000 leaves out of 4096 slots.
        let cfg = MerkleTreeConfig {
            nb_leaves: 1000,
            height: 6,
            arities: vec![4; 6],
            truncated: 0,
        };
        check_round_trip(&cfg, &[0, 7, 15, 999]);
    }

    #[test]
    fn truncated_tree_round_trip() {
        for truncated in 1..4 {
            let cfg = MerkleTreeConfig {
                nb_leaves: 100,
                height: 5,
                arities: vec![3; 5],
                truncated,
            };
            check_round_trip(&cfg, &[1, 2, 50, 98, 99]);
        }
    }

    #[test]
    fn random_openings() {
        let mut rng = thread_rng();
        let cfg = MerkleTreeConfig {
            nb_leaves: 200,
            height: 4,
            arities: vec![4, 2, 4, 8],
            truncated: 1,
        };
        for q in [1, 3, 13] {
            let mut indices: Vec<usize> = sample(&mut rng, 200, q).into_iter().collect();
            indices.sort_unstable();
            check_round_trip(&cfg, &indices);
        }
    }

    #[test]
    fn rejects_bad_inputs() {
        let tree = MerkleTree::new(&MerkleTreeConfig::binary(16)).unwrap();
        let salt: Salt<F> = F::rand_array();
        let leaves = random_leaves(16);
        let (root, key) = tree.expand(&salt, &leaves);

        // Indices must be strictly ascending.
        assert!(tree.open_multi(&key, &[3, 3]).is_err());
        assert!(tree.open_multi(&key, &[5, 2]).is_err());

        // Short authentication paths are rejected.
        let auth = tree.open_multi(&key, &[4]).unwrap();
        let err = tree.retrieve_root(&salt, &[4], &[leaves[4]], &auth[..auth.len() - 1]);
        assert!(err.is_err());

        // A tampered path changes the root.
        let mut bad_auth = auth.clone();
        bad_auth[0].elements[0] += F::ONE;
        let bad_root = tree
            .retrieve_root(&salt, &[4], &[leaves[4]], &bad_auth)
            .unwrap();
        assert_ne!(bad_root, root);
    }

    #[test]
    fn config_validation() {
        assert!(MerkleTree::new(&MerkleTreeConfig::default()).is_err());
        // Arity below 2.
        assert!(MerkleTree::new(&MerkleTreeConfig {
            nb_leaves: 4,
            height: 2,
            arities: vec![1, 4],
            truncated: 0,
        })
        .is_err());
        // More leaves than slots.
        assert!(MerkleTree::new(&MerkleTreeConfig {
            nb_leaves: 9,
            height: 3,
            arities: vec![2; 3],
            truncated: 0,
        })
        .is_err());
        // Truncation not below height.
        assert!(MerkleTree::new(&MerkleTreeConfig {
            nb_leaves: 8,
            height: 3,
            arities: vec![2; 3],
            truncated: 3,
        })
        .is_err());
    }
}
